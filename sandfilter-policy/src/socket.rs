// -*- coding: utf-8 -*-
//
// Copyright (C) 2024 Michael Büsch <m@bues.ch>
//
// Licensed under the Apache License version 2.0
// or the MIT license, at your option.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Policy for the socket process, which does networking on behalf of others.

use crate::{
    broker::Broker,
    common::{fcntl_lock_cmds, Common, IOCTL_TYPE_MASK, PR_SET_VMA, TTY_IOCTLS},
    policy::{Policy, Rule},
    state::{FilterState, SandboxInfo},
    sys::{IpcCall, SocketCall, Sys},
};
use sandfilter_bpf::{switch, when, Arg, Cond};
use std::sync::Arc;

/// Tunables of the socket process policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SocketParams {
    pub level: u32,
}

impl Default for SocketParams {
    fn default() -> Self {
        Self { level: 2 }
    }
}

#[derive(Debug)]
pub struct SocketPolicy {
    common: Common,
    params: SocketParams,
}

impl SocketPolicy {
    pub fn new(
        broker: Arc<dyn Broker>,
        params: SocketParams,
        info: SandboxInfo,
        filter_state: Arc<FilterState>,
    ) -> Self {
        Self {
            common: Common::new(Some(broker), info, filter_state).with_shmem(true),
            params,
        }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn params(&self) -> &SocketParams {
        &self.params
    }

    fn sys_rule(&self, sys: Sys) -> Rule {
        match sys {
            Sys::Getrusage => Rule::Allow,

            Sys::Ioctl => {
                let request = Arg::int(1);
                let common = self.common.evaluate_sys(self, sys);
                let fallback = if self.params.level < 2 {
                    when(
                        request.masked(IOCTL_TYPE_MASK).ne(TTY_IOCTLS),
                        Rule::Allow,
                    )
                    .otherwise(common)
                } else {
                    common
                };
                switch(request)
                    .cases(&[libc::FIOCLEX, libc::FIONBIO, libc::FIONREAD], Rule::Allow)
                    .default(fallback)
            }

            Sys::Fcntl => switch(Arg::int(1))
                .case(libc::F_DUPFD_CLOEXEC, Rule::Allow)
                .cases(&fcntl_lock_cmds(), Rule::Allow)
                .default(self.common.evaluate_sys(self, sys)),

            Sys::Getrlimit | Sys::Getresuid | Sys::Getresgid => Rule::Allow,
            Sys::Prlimit64 => self.common.prlimit_get_only(self),
            Sys::Uname => Rule::Allow,

            _ => self.common.evaluate_sys(self, sys),
        }
    }
}

impl Policy for SocketPolicy {
    fn evaluate_syscall(&self, nr: i64) -> Rule {
        match Sys::from_nr(nr) {
            Some(sys) => self.sys_rule(sys),
            None => self.invalid_syscall(),
        }
    }

    fn evaluate_socket_call(&self, call: SocketCall, has_args: bool) -> Option<Rule> {
        match call {
            SocketCall::Socket | SocketCall::Connect | SocketCall::Bind => Some(Rule::Allow),
            SocketCall::Recvmmsg | SocketCall::Sendmmsg => {
                Some(self.common.msg_flags_rule(self, has_args, 3))
            }
            SocketCall::Getsockopt
            | SocketCall::Setsockopt
            | SocketCall::Getsockname
            | SocketCall::Getpeername
            | SocketCall::Shutdown
            | SocketCall::Accept
            | SocketCall::Accept4 => Some(Rule::Allow),
            _ => self.common.evaluate_socket_call(self, call, has_args),
        }
    }

    fn evaluate_ipc_call(&self, _call: IpcCall, _arg_shift: u8) -> Option<Rule> {
        None
    }

    fn prctl_policy(&self) -> Rule {
        switch(Arg::int(0))
            .case(PR_SET_VMA, self.common.set_vma_rule(self))
            .cases(
                &[libc::PR_SET_NAME, libc::PR_SET_DUMPABLE, libc::PR_SET_PTRACER],
                Rule::Allow,
            )
            .default(self.invalid_syscall())
    }

    fn clone_policy(&self, fail: Rule) -> Rule {
        self.common.clone_policy(fail)
    }

    /// Everything but out-of-band data.
    fn msg_flags_allowed(&self, flags: Arg) -> Cond {
        flags.masked(libc::MSG_OOB).eq(0_i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::DenyBroker;
    use sandfilter_bpf::{SyscallArgs, Verdict};

    fn policy(level: u32) -> SocketPolicy {
        SocketPolicy::new(
            Arc::new(DenyBroker),
            SocketParams { level },
            SandboxInfo::default(),
            Arc::new(FilterState::new()),
        )
    }

    #[test]
    fn test_msg_oob() {
        let p = policy(2);
        let rule = p.evaluate_socket_call(SocketCall::Sendto, true).unwrap();
        let plain = [3, 0, 64, libc::MSG_DONTWAIT as u64, 0, 0];
        assert_eq!(rule.resolve(&SyscallArgs::new(0, plain)), Verdict::Allow);
        let more = [3, 0, 64, libc::MSG_MORE as u64, 0, 0];
        assert_eq!(rule.resolve(&SyscallArgs::new(0, more)), Verdict::Allow);
        let oob = [3, 0, 64, libc::MSG_OOB as u64, 0, 0];
        assert_eq!(rule.resolve(&SyscallArgs::new(0, oob)), Verdict::Block);
    }

    #[test]
    fn test_networking_allowed() {
        let p = policy(2);
        for call in [SocketCall::Socket, SocketCall::Connect, SocketCall::Bind] {
            assert_eq!(p.evaluate_socket_call(call, true), Some(Rule::Allow));
        }
        assert_eq!(p.evaluate_socket_call(SocketCall::Listen, true), None);
    }

    #[test]
    fn test_prctl_narrower() {
        let p = policy(2);
        let rule = p.prctl_policy();
        let seccomp = [libc::PR_GET_SECCOMP as u64, 0, 0, 0, 0, 0];
        assert_eq!(rule.resolve(&SyscallArgs::new(0, seccomp)), Verdict::Block);
        let name = [libc::PR_SET_NAME as u64, 0, 0, 0, 0, 0];
        assert_eq!(rule.resolve(&SyscallArgs::new(0, name)), Verdict::Allow);
    }

    #[test]
    fn test_ioctl_level() {
        let nr: i64 = libc::SYS_ioctl.into();
        let sockios = [3, 0x8913, 0, 0, 0, 0];
        let low = policy(1).evaluate_syscall(nr);
        let high = policy(2).evaluate_syscall(nr);
        assert_eq!(low.resolve(&SyscallArgs::new(nr, sockios)), Verdict::Allow);
        assert_eq!(high.resolve(&SyscallArgs::new(nr, sockios)), Verdict::Block);
        let fionread = [3, libc::FIONREAD as u64, 0, 0, 0, 0];
        assert_eq!(high.resolve(&SyscallArgs::new(nr, fionread)), Verdict::Allow);
    }
}

// vim: ts=4 sw=4 expandtab
