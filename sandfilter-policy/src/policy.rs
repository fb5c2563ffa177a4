// -*- coding: utf-8 -*-
//
// Copyright (C) 2024 Michael Büsch <m@bues.ch>
//
// Licensed under the Apache License version 2.0
// or the MIT license, at your option.
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::{
    broker::Broker,
    common::Common,
    content::{ContentParams, ContentPolicy},
    kernel::{Kernel, BLOCKED},
    media::MediaPolicy,
    opened_files::OpenedFiles,
    rdd::RddPolicy,
    socket::{SocketParams, SocketPolicy},
    state::{FilterState, SandboxInfo},
    sys::{IpcCall, SocketCall, MAX_SYSCALL_NR},
    traps::Trap,
    utility::UtilityPolicy,
};
use anyhow::{self as ah, format_err as err};
use sandfilter_bpf::{Action, Arch, Arg, Cond, Decision, Filter, SyscallArgs, BLOCKED_TRAP_DATA};
use std::{collections::BTreeMap, sync::Arc};

/// The decision tree type of all policies.
pub type Rule = Decision<Trap>;

/// A syscall policy for one kind of sandboxed process.
///
/// Implementations usually own a [Common] and delegate to it for everything
/// they don't handle themselves, passing `self` as the outer policy.
pub trait Policy {
    /// The rule for syscall number `nr`.
    fn evaluate_syscall(&self, nr: i64) -> Rule;

    /// The rule for a socket call.
    ///
    /// `has_args` is false for the multiplexed `socketcall(2)`, where the
    /// arguments are behind a pointer the filter can't follow.
    /// `None` means no opinion. It becomes [Policy::invalid_syscall].
    fn evaluate_socket_call(&self, call: SocketCall, has_args: bool) -> Option<Rule>;

    /// The rule for a System V IPC call.
    ///
    /// The call arguments start at syscall argument `arg_shift`.
    fn evaluate_ipc_call(&self, call: IpcCall, arg_shift: u8) -> Option<Rule>;

    fn prctl_policy(&self) -> Rule;

    /// The `clone` rule. `fail` is the rule for disallowed flags.
    fn clone_policy(&self, fail: Rule) -> Rule;

    /// Condition on the `flags` argument of send and receive calls.
    fn msg_flags_allowed(&self, flags: Arg) -> Cond;

    fn invalid_syscall(&self) -> Rule {
        Rule::Block
    }
}

/// Maps trap payloads to `SECCOMP_RET_DATA` and back.
#[derive(Debug, Default)]
pub struct TrapTable(Vec<Trap>);

impl TrapTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the data value for `trap`. Equal traps share one value.
    pub fn register(&mut self, trap: &Trap) -> ah::Result<u16> {
        if let Some(index) = self.0.iter().position(|t| t == trap) {
            // The table never grows beyond u16.
            return Ok(index as u16);
        }
        let index = u16::try_from(self.0.len())
            .ok()
            .filter(|i| *i < BLOCKED_TRAP_DATA)
            .ok_or_else(|| err!("Too many distinct traps in the policy"))?;
        self.0.push(trap.clone());
        Ok(index)
    }

    pub fn get(&self, data: u16) -> Option<&Trap> {
        self.0.get(usize::from(data))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &Trap)> {
        (0_u16..).zip(self.0.iter())
    }

    /// Run the handler the filter selected with `data`.
    ///
    /// Returns the syscall result, or [BLOCKED] for a policy violation.
    ///
    /// # Safety
    ///
    /// `args` must be the arguments of the trapped syscall in the current
    /// thread. Pointer arguments are dereferenced.
    pub unsafe fn dispatch(&self, data: u16, args: &SyscallArgs, kernel: &dyn Kernel) -> isize {
        if data == BLOCKED_TRAP_DATA {
            return BLOCKED;
        }
        match self.get(data) {
            // SAFETY: Forwarded from our caller.
            Some(trap) => unsafe { trap.run(args, kernel) },
            None => {
                log::error!("Unknown trap data {data} for syscall {}", args.nr);
                BLOCKED
            }
        }
    }
}

/// A filter program and the traps it refers to.
pub struct CompiledPolicy {
    pub filter: Filter,
    pub traps: TrapTable,
}

/// Evaluate `policy` for every syscall number it doesn't block outright.
pub fn evaluate_all(policy: &dyn Policy) -> BTreeMap<i64, Rule> {
    (0..=MAX_SYSCALL_NR)
        .filter_map(|nr| match policy.evaluate_syscall(nr) {
            Rule::Block => None,
            rule => Some((nr, rule)),
        })
        .collect()
}

/// Generate the filter program for `policy`.
pub fn compile_policy(
    policy: &dyn Policy,
    arch: Arch,
    block_action: Action,
) -> ah::Result<CompiledPolicy> {
    if Arch::native() != Some(arch) {
        return Err(err!(
            "Policy for {arch:?} can't be generated on this platform"
        ));
    }
    let rules = evaluate_all(policy);
    let mut traps = TrapTable::new();
    let filter = Filter::compile(
        &rules,
        &policy.invalid_syscall(),
        arch,
        block_action,
        |trap| traps.register(trap),
    )?;
    log::debug!(
        "Compiled {} syscall rules into {} instructions with {} traps",
        rules.len(),
        filter.len(),
        traps.len()
    );
    Ok(CompiledPolicy { filter, traps })
}

/// The kind of sandboxed process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProcessType {
    Content,
    Media,
    Rdd,
    Socket,
    Utility,
}

impl ProcessType {
    pub const ALL: [Self; 5] = [
        Self::Content,
        Self::Media,
        Self::Rdd,
        Self::Socket,
        Self::Utility,
    ];
}

impl std::str::FromStr for ProcessType {
    type Err = ah::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "content" => Ok(Self::Content),
            "media" | "gmp" => Ok(Self::Media),
            "rdd" => Ok(Self::Rdd),
            "socket" => Ok(Self::Socket),
            "utility" => Ok(Self::Utility),
            other => Err(err!("Unknown process type '{other}'")),
        }
    }
}

impl std::fmt::Display for ProcessType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Content => "content",
            Self::Media => "media",
            Self::Rdd => "rdd",
            Self::Socket => "socket",
            Self::Utility => "utility",
        };
        write!(f, "{name}")
    }
}

/// One of the concrete process policies.
#[derive(Debug)]
pub enum ProcessPolicy {
    Content(ContentPolicy),
    Media(MediaPolicy),
    Rdd(RddPolicy),
    Socket(SocketPolicy),
    Utility(UtilityPolicy),
}

/// Everything needed to build the policy of any process type.
#[derive(Clone)]
pub struct PolicyParams {
    pub broker: Arc<dyn Broker>,
    pub files: Arc<OpenedFiles>,
    pub content: ContentParams,
    pub socket: SocketParams,
    pub info: SandboxInfo,
    pub filter_state: Arc<FilterState>,
}

impl ProcessPolicy {
    pub fn new(ty: ProcessType, params: &PolicyParams) -> ah::Result<Self> {
        let info = params.info;
        let state = Arc::clone(&params.filter_state);
        let broker = Arc::clone(&params.broker);
        Ok(match ty {
            ProcessType::Content => Self::Content(ContentPolicy::new(
                broker,
                params.content.clone(),
                info,
                state,
            )?),
            ProcessType::Media => {
                Self::Media(MediaPolicy::new(Arc::clone(&params.files), info, state))
            }
            ProcessType::Rdd => Self::Rdd(RddPolicy::new(broker, info, state)),
            ProcessType::Socket => {
                Self::Socket(SocketPolicy::new(broker, params.socket, info, state))
            }
            ProcessType::Utility => Self::Utility(UtilityPolicy::new(broker, info, state)),
        })
    }

    pub fn process_type(&self) -> ProcessType {
        match self {
            Self::Content(_) => ProcessType::Content,
            Self::Media(_) => ProcessType::Media,
            Self::Rdd(_) => ProcessType::Rdd,
            Self::Socket(_) => ProcessType::Socket,
            Self::Utility(_) => ProcessType::Utility,
        }
    }

    fn inner(&self) -> &dyn Policy {
        match self {
            Self::Content(p) => p,
            Self::Media(p) => p,
            Self::Rdd(p) => p,
            Self::Socket(p) => p,
            Self::Utility(p) => p,
        }
    }

    pub fn common(&self) -> &Common {
        match self {
            Self::Content(p) => p.common(),
            Self::Media(p) => p.common(),
            Self::Rdd(p) => p.common(),
            Self::Socket(p) => p.common(),
            Self::Utility(p) => p.common(),
        }
    }
}

impl Policy for ProcessPolicy {
    fn evaluate_syscall(&self, nr: i64) -> Rule {
        self.inner().evaluate_syscall(nr)
    }

    fn evaluate_socket_call(&self, call: SocketCall, has_args: bool) -> Option<Rule> {
        self.inner().evaluate_socket_call(call, has_args)
    }

    fn evaluate_ipc_call(&self, call: IpcCall, arg_shift: u8) -> Option<Rule> {
        self.inner().evaluate_ipc_call(call, arg_shift)
    }

    fn prctl_policy(&self) -> Rule {
        self.inner().prctl_policy()
    }

    fn clone_policy(&self, fail: Rule) -> Rule {
        self.inner().clone_policy(fail)
    }

    fn msg_flags_allowed(&self, flags: Arg) -> Cond {
        self.inner().msg_flags_allowed(flags)
    }

    fn invalid_syscall(&self) -> Rule {
        self.inner().invalid_syscall()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        kernel::Linux,
        state::{FilterState, SandboxInfo},
    };
    use std::sync::Arc;

    #[test]
    fn test_trap_table_dedup() {
        let mut t = TrapTable::new();
        assert_eq!(t.register(&Trap::Sched).unwrap(), 0);
        assert_eq!(t.register(&Trap::Uname).unwrap(), 1);
        assert_eq!(t.register(&Trap::Sched).unwrap(), 0);
        assert_eq!(t.len(), 2);
        assert_eq!(t.get(1), Some(&Trap::Uname));
        assert_eq!(t.get(2), None);

        let state = Arc::new(FilterState::new());
        let a = t.register(&Trap::SetNoNewPrivs(Arc::clone(&state))).unwrap();
        let b = t.register(&Trap::SetNoNewPrivs(Arc::clone(&state))).unwrap();
        assert_eq!(a, b);
        let c = t.register(&Trap::SetNoNewPrivs(Arc::new(FilterState::new()))).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_dispatch_blocked_and_unknown() {
        let t = TrapTable::new();
        let args = SyscallArgs::new(0, [0; 6]);
        unsafe {
            assert_eq!(t.dispatch(BLOCKED_TRAP_DATA, &args, &Linux), BLOCKED);
            assert_eq!(t.dispatch(7, &args, &Linux), BLOCKED);
        }
    }

    #[test]
    fn test_dispatch_runs_handler() {
        let mut t = TrapTable::new();
        let data = t.register(&Trap::FcntlCloexec).unwrap();
        let args = SyscallArgs::new(0, [0, libc::F_SETFD as u64, 1, 0, 0, 0]);
        assert_eq!(unsafe { t.dispatch(data, &args, &Linux) }, 0);
    }

    #[test]
    fn test_process_type_names() {
        for ty in ProcessType::ALL {
            assert_eq!(ty.to_string().parse::<ProcessType>().unwrap(), ty);
        }
        assert_eq!("GMP".parse::<ProcessType>().unwrap(), ProcessType::Media);
        assert!("gpu".parse::<ProcessType>().is_err());
    }

    #[test]
    fn test_evaluate_all_skips_blocked() {
        let c = Common::new(None, SandboxInfo::default(), Arc::new(FilterState::new()));
        let rules = evaluate_all(&c);
        assert!(rules.contains_key(&libc::SYS_read.into()));
        assert!(!rules.contains_key(&libc::SYS_ptrace.into()));
        assert!(rules.values().all(|r| *r != Rule::Block));
    }

    #[test]
    fn test_compile_foreign_arch() {
        let c = Common::new(None, SandboxInfo::default(), Arc::new(FilterState::new()));
        let foreign = if Arch::native() == Some(Arch::X86_64) {
            Arch::Aarch64
        } else {
            Arch::X86_64
        };
        assert!(compile_policy(&c, foreign, Action::Trap).is_err());
    }
}

// vim: ts=4 sw=4 expandtab
