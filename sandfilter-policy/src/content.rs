// -*- coding: utf-8 -*-
//
// Copyright (C) 2024 Michael Büsch <m@bues.ch>
//
// Licensed under the Apache License version 2.0
// or the MIT license, at your option.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Policy for content (web page) processes.
//!
//! The strictness follows the content sandbox level. Levels below 4 are
//! transitional and keep audio and socket access working.

use crate::{
    broker::Broker,
    common::{fcntl_lock_cmds, Common, IOCTL_TYPE_MASK, TTY_IOCTLS},
    policy::{Policy, Rule},
    state::{FilterState, SandboxInfo},
    sys::{IpcCall, SocketCall, Sys},
    traps::Trap,
};
use anyhow::{self as ah, format_err as err};
use sandfilter_bpf::{switch, when, Arg, Cond};
use std::sync::Arc;

const F_ADD_SEALS: libc::c_int = 1033;
const F_GET_SEALS: libc::c_int = 1034;

/// Tunables of the content process policy.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContentParams {
    /// The content sandbox level. Must be at least 2.
    pub level: u32,
    /// Extra syscall numbers to allow unconditionally.
    pub syscall_allow: Vec<i64>,
    /// Allow System V shared memory and semaphores.
    pub allow_sysv: bool,
    /// A RenderDoc capture is running and needs to accept connections.
    pub using_renderdoc: bool,
}

impl ContentParams {
    pub fn new(level: u32) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }
}

#[derive(Debug)]
pub struct ContentPolicy {
    common: Common,
    params: ContentParams,
}

impl ContentPolicy {
    pub fn new(
        broker: Arc<dyn Broker>,
        params: ContentParams,
        info: SandboxInfo,
        filter_state: Arc<FilterState>,
    ) -> ah::Result<Self> {
        if params.level < 2 {
            return Err(err!(
                "Content sandbox level {} has no seccomp policy",
                params.level
            ));
        }
        let common = Common::new(Some(broker), info, filter_state)
            .with_shmem(true)
            .with_unsafe_socketpair(true)
            .with_brokered_connect(true);
        Ok(Self { common, params })
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn params(&self) -> &ContentParams {
        &self.params
    }

    fn level(&self) -> u32 {
        self.params.level
    }

    fn sys_rule(&self, sys: Sys) -> Rule {
        match sys {
            Sys::Getppid => Rule::Trap(Trap::GetPPid),

            #[cfg(feature = "pulseaudio")]
            Sys::Fchown | Sys::Fchmod if self.level() < 4 => Rule::Allow,

            Sys::Fstatfs | Sys::Flock => Rule::Allow,

            // Only used to probe for character devices.
            Sys::Mknod | Sys::Mknodat => {
                let mode = Arg::int(if sys == Sys::Mknod { 1 } else { 2 });
                when(
                    mode.masked(libc::S_IFMT).eq(libc::S_IFCHR),
                    Rule::Error(libc::EPERM),
                )
                .otherwise(self.invalid_syscall())
            }

            Sys::Chown | Sys::Fchownat => Rule::Error(libc::EPERM),

            Sys::Select | Sys::Writev | Sys::Pwrite64 | Sys::Readahead => Rule::Allow,

            #[cfg(feature = "alsa")]
            Sys::Ioctl if self.level() < 4 => Rule::Allow,
            Sys::Ioctl => {
                let request = Arg::int(1);
                let common = self.common.evaluate_sys(self, sys);
                let fallback = if self.level() < 6 {
                    when(
                        request.masked(IOCTL_TYPE_MASK).ne(TTY_IOCTLS),
                        Rule::Allow,
                    )
                    .otherwise(common)
                } else {
                    common
                };
                switch(request)
                    .case(libc::FIOCLEX, Rule::Allow)
                    .case(libc::FIONBIO, Rule::Allow)
                    .default(fallback)
            }

            Sys::Fcntl => switch(Arg::int(1))
                .cases(&fcntl_lock_cmds(), Rule::Allow)
                .case(F_ADD_SEALS, Rule::Allow)
                .case(F_GET_SEALS, Rule::Allow)
                .default(self.common.evaluate_sys(self, sys)),

            Sys::Brk | Sys::Madvise => Rule::Allow,
            Sys::Mremap => when(Arg::int(3).eq(0_i32), Rule::Allow)
                .otherwise(self.common.evaluate_sys(self, sys)),
            // Single page queries only.
            Sys::Mincore => when(
                Arg::word(1).eq(self.common.info().page_size),
                Rule::Allow,
            )
            .otherwise(self.common.evaluate_sys(self, sys)),

            Sys::SetThreadArea | Sys::Getrusage | Sys::Times | Sys::Fsync | Sys::Msync => {
                Rule::Allow
            }

            Sys::Getpriority
            | Sys::Setpriority
            | Sys::SchedGetattr
            | Sys::SchedSetattr
            | Sys::SchedGetPriorityMin
            | Sys::SchedGetPriorityMax
            | Sys::SchedGetscheduler
            | Sys::SchedSetscheduler
            | Sys::SchedGetparam
            | Sys::SchedSetparam
            | Sys::SchedGetaffinity => Rule::Allow,
            Sys::SchedSetaffinity => Rule::Error(libc::EPERM),

            Sys::Pipe2 => when(
                Arg::int(1).only(libc::O_CLOEXEC | libc::O_NONBLOCK | libc::O_DIRECT),
                Rule::Allow,
            )
            .otherwise(self.invalid_syscall()),

            Sys::Getrlimit | Sys::Getresuid | Sys::Getresgid => Rule::Allow,
            Sys::Prlimit64 => self.common.prlimit_get_only(self),

            Sys::Umask if self.level() < 4 => Rule::Allow,

            // Liveness probes with signal 0 from legacy plugins.
            Sys::Kill if self.level() < 4 => when(
                Arg::int(1).eq(0_i32),
                Rule::Error(libc::EPERM),
            )
            .otherwise(self.invalid_syscall()),
            Sys::Kill => self.invalid_syscall(),

            Sys::Wait4 | Sys::Waitpid => Rule::Error(libc::ECHILD),
            Sys::Eventfd2 => Rule::Allow,
            Sys::RtTgsigqueueinfo => when(Arg::int(0).eq(self.common.pid()), Rule::Allow)
                .otherwise(self.invalid_syscall()),

            Sys::Mlock | Sys::Munlock => Rule::Allow,

            Sys::Clone => self.clone_policy(Rule::Error(libc::EPERM)),
            Sys::Fork => Rule::Error(libc::ENOSYS),

            Sys::Fadvise | Sys::Fallocate => Rule::Allow,
            Sys::GetMempolicy => Rule::Allow,
            Sys::SetMempolicy => Rule::Error(libc::ENOSYS),
            Sys::Kcmp => self.common.kcmp_policy(self),

            Sys::Uname | Sys::Sysinfo => Rule::Allow,

            _ => self.common.evaluate_sys(self, sys),
        }
    }
}

impl Policy for ContentPolicy {
    fn evaluate_syscall(&self, nr: i64) -> Rule {
        if self.params.syscall_allow.contains(&nr) {
            if self.common.info().verbose {
                log::info!("Allowing syscall nr {nr} via allow-list");
            }
            return Rule::Allow;
        }
        match Sys::from_nr(nr) {
            Some(sys) => self.sys_rule(sys),
            None => self.invalid_syscall(),
        }
    }

    fn evaluate_socket_call(&self, call: SocketCall, has_args: bool) -> Option<Rule> {
        match call {
            SocketCall::Socket | SocketCall::Connect if self.level() < 4 => Some(Rule::Allow),
            SocketCall::Getsockopt
            | SocketCall::Setsockopt
            | SocketCall::Getsockname
            | SocketCall::Getpeername
            | SocketCall::Shutdown => Some(Rule::Allow),
            SocketCall::Accept | SocketCall::Accept4 if self.params.using_renderdoc => {
                Some(Rule::Allow)
            }
            _ => self.common.evaluate_socket_call(self, call, has_args),
        }
    }

    fn evaluate_ipc_call(&self, call: IpcCall, _arg_shift: u8) -> Option<Rule> {
        let sysv = self.params.allow_sysv;
        match call {
            IpcCall::Shmget => Some(if sysv {
                Rule::Allow
            } else {
                // Fall back to POSIX shared memory.
                Rule::Error(libc::EPERM)
            }),
            IpcCall::Shmctl
            | IpcCall::Shmat
            | IpcCall::Shmdt
            | IpcCall::Semget
            | IpcCall::Semctl
            | IpcCall::Semop
                if sysv =>
            {
                Some(Rule::Allow)
            }
            _ => None,
        }
    }

    fn prctl_policy(&self) -> Rule {
        #[cfg(feature = "pulseaudio")]
        if self.level() < 4 {
            return switch(Arg::int(0))
                .case(libc::PR_GET_NAME, Rule::Allow)
                .default(self.common.prctl_policy(self));
        }
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
