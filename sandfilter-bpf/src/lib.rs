// -*- coding: utf-8 -*-
//
// Copyright (C) 2024 Michael Büsch <m@bues.ch>
//
// Licensed under the Apache License version 2.0
// or the MIT license, at your option.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Decision trees for seccomp policies and their lowering to BPF.

#![forbid(unsafe_code)]

pub mod codegen;
pub mod dsl;
mod sim;

pub use crate::dsl::{
    all_of, any_of, switch, when, Arg, ArgLen, ArgValue, Cmp, Cond, Decision, IfChain, Masked,
    Switch, SyscallArgs, Verdict,
};
pub use codegen::BLOCKED_TRAP_DATA;

use anyhow::{self as ah, format_err as err};
use codegen::{
    SECCOMP_RET_ACTION_FULL, SECCOMP_RET_ALLOW, SECCOMP_RET_DATA, SECCOMP_RET_ERRNO,
    SECCOMP_RET_KILL_PROCESS, SECCOMP_RET_LOG, SECCOMP_RET_TRAP,
};
use seccompiler::BpfProgram;
use std::collections::BTreeMap;

#[cfg(feature = "de")]
use seccompiler::sock_filter;

#[cfg(feature = "install")]
use anyhow::Context as _;
#[cfg(feature = "install")]
use seccompiler::apply_filter_all_threads;

/// Returns `true` if seccomp filters can be generated for the running platform.
pub fn seccomp_supported() -> bool {
    Arch::native().is_some()
}

/// Architectures with a known `AUDIT_ARCH_*` value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arch {
    X86,
    X86_64,
    Arm,
    Aarch64,
    Riscv64,
}

impl Arch {
    /// The architecture this crate was built for.
    pub fn native() -> Option<Self> {
        if cfg!(target_arch = "x86_64") {
            Some(Self::X86_64)
        } else if cfg!(target_arch = "x86") {
            Some(Self::X86)
        } else if cfg!(target_arch = "aarch64") {
            Some(Self::Aarch64)
        } else if cfg!(target_arch = "arm") {
            Some(Self::Arm)
        } else if cfg!(target_arch = "riscv64") {
            Some(Self::Riscv64)
        } else {
            None
        }
    }

    /// The `AUDIT_ARCH_*` value the kernel puts into `seccomp_data`.
    pub const fn audit(self) -> u32 {
        match self {
            Self::X86 => 0x4000_0003,
            Self::X86_64 => 0xc000_003e,
            Self::Arm => 0x4000_0028,
            Self::Aarch64 => 0xc000_00b7,
            Self::Riscv64 => 0xc000_00f3,
        }
    }
}

impl TryFrom<&str> for Arch {
    type Error = ah::Error;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.trim() {
            "x86" | "i386" | "i686" => Ok(Self::X86),
            "x86_64" => Ok(Self::X86_64),
            "arm" => Ok(Self::Arm),
            "aarch64" => Ok(Self::Aarch64),
            "riscv64" => Ok(Self::Riscv64),
            other => Err(err!("Unsupported CPU ARCH '{other}'")),
        }
    }
}

/// Action to be performed, if a syscall is executed that the policy blocks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Action {
    /// Raise SIGSYS with [BLOCKED_TRAP_DATA]. The runtime reports and terminates.
    #[default]
    Trap,
    /// Kill the process.
    Kill,
    /// Only log the event and keep running. See the kernel logs.
    Log,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            Self::Trap => write!(f, "trap"),
            Self::Kill => write!(f, "kill"),
            Self::Log => write!(f, "log"),
        }
    }
}

impl std::str::FromStr for Action {
    type Err = ah::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().trim() {
            "trap" => Ok(Self::Trap),
            "kill" => Ok(Self::Kill),
            "log" => Ok(Self::Log),
            other => Err(err!(
                "Action '{other}' is not valid. Valid values are: trap, kill, log."
            )),
        }
    }
}

/// A decoded filter return value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterResult {
    KillProcess,
    Trap(u16),
    Errno(u16),
    Log,
    Allow,
}

impl TryFrom<u32> for FilterResult {
    type Error = ah::Error;

    fn try_from(ret: u32) -> Result<Self, Self::Error> {
        let data = (ret & SECCOMP_RET_DATA) as u16;
        match ret & SECCOMP_RET_ACTION_FULL {
            SECCOMP_RET_KILL_PROCESS => Ok(Self::KillProcess),
            SECCOMP_RET_TRAP => Ok(Self::Trap(data)),
            SECCOMP_RET_ERRNO => Ok(Self::Errno(data)),
            SECCOMP_RET_LOG => Ok(Self::Log),
            SECCOMP_RET_ALLOW => Ok(Self::Allow),
            other => Err(err!("Unknown seccomp return action {other:#x}")),
        }
    }
}

/// A compiled seccomp filter program.
pub struct Filter(BpfProgram);

impl Filter {
    /// Simple serialization, without serde.
    #[cfg(feature = "ser")]
    pub fn serialize(&self) -> Vec<u8> {
        let mut raw = Vec::with_capacity(self.0.len() * 8);
        for insn in &self.0 {
            raw.extend_from_slice(&insn.code.to_le_bytes());
            raw.push(insn.jt);
            raw.push(insn.jf);
            raw.extend_from_slice(&insn.k.to_le_bytes());
        }
        raw
    }

    /// Simple de-serialization, without serde.
    #[cfg(feature = "de")]
    pub fn deserialize(raw: &[u8]) -> ah::Result<Self> {
        if raw.len() % 8 != 0 {
            return Err(err!("Serialized BPF length {} is not a multiple of 8", raw.len()));
        }
        let bpf = raw
            .chunks_exact(8)
            .map(|c| sock_filter {
                code: u16::from_le_bytes([c[0], c[1]]),
                jt: c[2],
                jf: c[3],
                k: u32::from_le_bytes([c[4], c[5], c[6], c[7]]),
            })
            .collect();
        Ok(Self(bpf))
    }

    /// Lower a per-syscall rule map into a filter program.
    ///
    /// Syscalls not in `rules` get `default`. `trap_data` assigns the
    /// `SECCOMP_RET_DATA` value for each trap payload.
    pub fn compile<T>(
        rules: &BTreeMap<i64, Decision<T>>,
        default: &Decision<T>,
        arch: Arch,
        block_action: Action,
        trap_data: impl FnMut(&T) -> ah::Result<u16>,
    ) -> ah::Result<Self> {
        Ok(Self(codegen::generate(
            rules,
            default,
            arch,
            block_action,
            trap_data,
        )?))
    }

    /// Number of BPF instructions.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Run the program in user space, as the kernel would for `args`.
    pub fn simulate(&self, arch: Arch, args: &SyscallArgs) -> ah::Result<FilterResult> {
        sim::run(&self.0, arch.audit(), args)?.try_into()
    }

    #[cfg(feature = "install")]
    pub fn install(&self) -> ah::Result<()> {
        apply_filter_all_threads(&self.0).context("Apply seccomp filter")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    type D = Decision<u16>;

    fn sample_rules() -> BTreeMap<i64, D> {
        let mut rules = BTreeMap::new();
        rules.insert(0, Decision::Allow);
        rules.insert(
            9,
            when(Arg::int(2).eq(4_u32), Decision::Allow)
                .or_when(Arg::int(2).eq(12_u32), Decision::Error(libc::EPERM))
                .otherwise(Decision::Block),
        );
        rules.insert(
            56,
            when(
                Arg::word(0).masked(!0x0040_0000_u64).eq(0x003d_0f00_u64),
                Decision::Allow,
            )
            .otherwise(Decision::Trap(3)),
        );
        rules
    }

    #[test]
    fn test_filter_serialize() {
        let filter = Filter::compile(&sample_rules(), &D::Block, Arch::X86_64, Action::Kill, |t| {
            Ok(*t)
        })
        .unwrap();
        let filter2 = Filter::deserialize(&filter.serialize()).unwrap();
        assert_eq!(filter.0.len(), filter2.0.len());
        for i in 0..filter.0.len() {
            assert_eq!(filter.0[i], filter2.0[i]);
        }
        assert!(Filter::deserialize(&[0; 7]).is_err());
    }

    #[test]
    fn test_simulate_matches_resolve() {
        let rules = sample_rules();
        let filter =
            Filter::compile(&rules, &D::Block, Arch::X86_64, Action::Trap, |t| Ok(*t)).unwrap();
        let probe = |nr: i64, args: [u64; 6]| {
            let args = SyscallArgs::new(nr, args);
            let expected = match rules.get(&nr).unwrap_or(&D::Block).resolve(&args) {
                Verdict::Allow => FilterResult::Allow,
                Verdict::Error(e) => FilterResult::Errno(e as u16),
                Verdict::Block => FilterResult::Trap(BLOCKED_TRAP_DATA),
                Verdict::Trap(t) => FilterResult::Trap(*t),
            };
            assert_eq!(filter.simulate(Arch::X86_64, &args).unwrap(), expected);
        };
        probe(0, [0; 6]);
        probe(9, [0, 0, 4, 0, 0, 0]);
        probe(9, [0, 0, 0xffff_0000_0000_0004, 0, 0, 0]);
        probe(9, [0, 0, 12, 0, 0, 0]);
        probe(9, [0, 0, 13, 0, 0, 0]);
        probe(56, [0x003d_0f00, 0, 0, 0, 0, 0]);
        probe(56, [0x007d_0f00, 0, 0, 0, 0, 0]);
        probe(56, [0x1_003d_0f00, 0, 0, 0, 0, 0]);
        probe(56, [0x003d_0f01, 0, 0, 0, 0, 0]);
        probe(1, [0; 6]);
        probe(0x4000_0000, [0; 6]);
    }

    #[test]
    fn test_foreign_arch_is_killed() {
        let filter =
            Filter::compile(&sample_rules(), &D::Block, Arch::X86_64, Action::Trap, |t| Ok(*t))
                .unwrap();
        assert_eq!(
            filter
                .simulate(Arch::X86, &SyscallArgs::new(0, [0; 6]))
                .unwrap(),
            FilterResult::KillProcess
        );
    }

    #[test]
    fn test_log_action() {
        let filter =
            Filter::compile(&sample_rules(), &D::Block, Arch::Aarch64, Action::Log, |t| Ok(*t))
                .unwrap();
        assert_eq!(
            filter
                .simulate(Arch::Aarch64, &SyscallArgs::new(1, [0; 6]))
                .unwrap(),
            FilterResult::Log
        );
    }

    #[test]
    fn test_arch_from_str() {
        assert_eq!(Arch::try_from("x86_64").unwrap(), Arch::X86_64);
        assert!(Arch::try_from("sparc").is_err());
    }

    #[test]
    fn test_action_from_str() {
        assert_eq!(" Kill ".parse::<Action>().unwrap(), Action::Kill);
        assert_eq!("log".parse::<Action>().unwrap(), Action::Log);
        assert_eq!(Action::Trap.to_string(), "trap");
        assert!("off".parse::<Action>().is_err());
    }
}

// vim: ts=4 sw=4 expandtab
