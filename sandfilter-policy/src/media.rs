// -*- coding: utf-8 -*-
//
// Copyright (C) 2024 Michael Büsch <m@bues.ch>
//
// Licensed under the Apache License version 2.0
// or the MIT license, at your option.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Policy for media plugin processes.
//!
//! These have no broker. The few files a plugin opens are pre-opened and
//! handed out by [OpenedFiles].

use crate::{
    common::Common,
    opened_files::OpenedFiles,
    policy::{Policy, Rule},
    state::{FilterState, SandboxInfo},
    sys::{IpcCall, SocketCall, Sys},
    traps::Trap,
};
use sandfilter_bpf::{switch, Arg, Cond};
use std::sync::Arc;

#[derive(Debug)]
pub struct MediaPolicy {
    common: Common,
    files: Arc<OpenedFiles>,
}

impl MediaPolicy {
    pub fn new(files: Arc<OpenedFiles>, info: SandboxInfo, filter_state: Arc<FilterState>) -> Self {
        Self {
            common: Common::new(None, info, filter_state).with_shmem(true),
            files,
        }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn files(&self) -> &Arc<OpenedFiles> {
        &self.files
    }

    fn sys_rule(&self, sys: Sys) -> Rule {
        match sys {
            Sys::Open | Sys::Openat => Rule::Trap(Trap::MediaOpen(Arc::clone(&self.files))),
            Sys::Stat => Rule::Trap(Trap::MediaStat(Arc::clone(&self.files))),

            Sys::Brk | Sys::SchedGetPriorityMin | Sys::SchedGetPriorityMax => Rule::Allow,
            Sys::SchedGetparam | Sys::SchedGetscheduler | Sys::SchedSetscheduler => {
                self.common.sched_self_rule()
            }
            Sys::Times => Rule::Allow,
            Sys::Uname => Rule::Trap(Trap::Uname),
            Sys::Fcntl => Rule::Trap(Trap::FcntlCloexec),

            Sys::Madvise => switch(Arg::int(2))
                .cases(
                    &[
                        libc::MADV_DONTNEED,
                        libc::MADV_FREE,
                        libc::MADV_HUGEPAGE,
                        libc::MADV_NOHUGEPAGE,
                    ],
                    Rule::Allow,
                )
                .case(libc::MADV_MERGEABLE, Rule::Error(libc::EPERM))
                .default(Rule::Error(libc::ENOSYS)),

            // Nothing here is a symlink.
            Sys::Readlink | Sys::Readlinkat => Rule::Error(libc::EINVAL),

            _ => self.common.evaluate_sys(self, sys),
        }
    }
}

impl Policy for MediaPolicy {
    fn evaluate_syscall(&self, nr: i64) -> Rule {
        match Sys::from_nr(nr) {
            Some(sys) => self.sys_rule(sys),
            None => self.invalid_syscall(),
        }
    }

    fn evaluate_socket_call(&self, call: SocketCall, has_args: bool) -> Option<Rule> {
        self.common.evaluate_socket_call(self, call, has_args)
    }

    fn evaluate_ipc_call(&self, _call: IpcCall, _arg_shift: u8) -> Option<Rule> {
        None
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
