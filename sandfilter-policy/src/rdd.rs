// -*- coding: utf-8 -*-
//
// Copyright (C) 2024 Michael Büsch <m@bues.ch>
//
// Licensed under the Apache License version 2.0
// or the MIT license, at your option.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Policy for remote data decoder processes.

use crate::{
    broker::Broker,
    common::{ioctl_type, Common, IOCTL_TYPE_MASK},
    policy::{Policy, Rule},
    state::{FilterState, SandboxInfo},
    sys::{IpcCall, SocketCall, Sys},
};
use sandfilter_bpf::{switch, when, Arg, Cond};
use std::sync::Arc;

/// The System V key the GPU driver uses. Nothing else may be created.
const SYSV_IPC_KEY: u32 = 0x4400_5658;

#[derive(Debug)]
pub struct RddPolicy {
    common: Common,
}

impl RddPolicy {
    pub fn new(broker: Arc<dyn Broker>, info: SandboxInfo, filter_state: Arc<FilterState>) -> Self {
        Self {
            common: Common::new(Some(broker), info, filter_state).with_shmem(true),
        }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    fn ioctl_types() -> Vec<u32> {
        let mut types = vec![ioctl_type(b'd'), ioctl_type(b'b')];
        #[cfg(feature = "v4l2")]
        types.push(ioctl_type(b'V'));
        #[cfg(target_arch = "aarch64")]
        types.extend([ioctl_type(b'N'), ioctl_type(b'H')]);
        types
    }

    fn sys_rule(&self, sys: Sys) -> Rule {
        match sys {
            Sys::Getrusage => Rule::Allow,

            // DRM, DMA-BUF and hardware decoder drivers.
            Sys::Ioctl => switch(Arg::int(1).masked(IOCTL_TYPE_MASK))
                .cases(&Self::ioctl_types(), Rule::Allow)
                // Driver probing asks the filesystem.
                .case(ioctl_type(b'F'), Rule::Error(libc::ENOTTY))
                .default(self.common.evaluate_sys(self, sys)),

            Sys::Kcmp => self.common.kcmp_policy(self),
            Sys::Eventfd2 => Rule::Allow,

            Sys::SchedGetaffinity
            | Sys::SchedSetaffinity
            | Sys::SchedGetparam
            | Sys::SchedSetparam
            | Sys::SchedGetscheduler
            | Sys::SchedSetscheduler
            | Sys::SchedGetattr
            | Sys::SchedSetattr => self.common.sched_self_rule(),
            Sys::SchedGetPriorityMin | Sys::SchedGetPriorityMax => Rule::Allow,

            Sys::Uname => Rule::Allow,
            Sys::Mknod | Sys::Mknodat => Rule::Error(libc::EPERM),
            Sys::Fstatfs => Rule::Allow,

            Sys::Clone => self.clone_policy(Rule::Error(libc::EPERM)),
            Sys::Fork => Rule::Error(libc::ENOSYS),

            _ => self.common.evaluate_sys(self, sys),
        }
    }
}

impl Policy for RddPolicy {
    fn evaluate_syscall(&self, nr: i64) -> Rule {
        match Sys::from_nr(nr) {
            Some(sys) => self.sys_rule(sys),
            None => self.invalid_syscall(),
        }
    }

    fn evaluate_socket_call(&self, call: SocketCall, has_args: bool) -> Option<Rule> {
        match call {
            SocketCall::Getsockname | SocketCall::Getpeername | SocketCall::Shutdown => {
                Some(Rule::Allow)
            }
            SocketCall::Socket => Some(Rule::Error(libc::EACCES)),
            _ => self.common.evaluate_socket_call(self, call, has_args),
        }
    }

    fn evaluate_ipc_call(&self, call: IpcCall, arg_shift: u8) -> Option<Rule> {
        match call {
            IpcCall::Semget | IpcCall::Shmget => Some(
                when(Arg::int(arg_shift).eq(SYSV_IPC_KEY), Rule::Allow)
                    .otherwise(self.invalid_syscall()),
            ),
            IpcCall::Semctl
            | IpcCall::Semop
            | IpcCall::Semtimedop
            | IpcCall::Shmctl
            | IpcCall::Shmat
            | IpcCall::Shmdt => Some(Rule::Allow),
            _ => None,
        }
    }

    fn prctl_policy(&self) -> Rule {
        self.common.prctl_policy(self)
    }

    fn clone_policy(&self, fail: Rule) -> Rule {
        self.common.clone_policy(fail)
    }

    fn msg_flags_allowed(&self, flags: Arg) -> Cond {
        self.common.msg_flags_allowed(flags)
    }
}


// vim: ts=4 sw=4 expandtab
