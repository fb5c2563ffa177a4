// -*- coding: utf-8 -*-
//
// Copyright (C) 2024 Michael Büsch <m@bues.ch>
//
// Licensed under the Apache License version 2.0
// or the MIT license, at your option.
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::{
    broker::Broker,
    common::{Common, PR_SET_VMA},
    policy::{Policy, Rule},
    state::{FilterState, SandboxInfo},
    sys::{IpcCall, SocketCall, Sys},
};
use sandfilter_bpf::{switch, Arg, Cond};
use std::sync::Arc;

/// Policy for generic utility processes.
#[derive(Debug)]
pub struct UtilityPolicy {
    common: Common,
}

impl UtilityPolicy {
    pub fn new(broker: Arc<dyn Broker>, info: SandboxInfo, filter_state: Arc<FilterState>) -> Self {
        Self {
            common: Common::new(Some(broker), info, filter_state).with_shmem(true),
        }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }
}

impl Policy for UtilityPolicy {
    fn evaluate_syscall(&self, nr: i64) -> Rule {
        let Some(sys) = Sys::from_nr(nr) else {
            return self.invalid_syscall();
        };
        match sys {
            Sys::Getrusage | Sys::GetMempolicy => Rule::Allow,
            Sys::SchedGetaffinity => self.common.sched_self_rule(),
            Sys::SetMempolicy => Rule::Error(libc::ENOSYS),
            _ => self.common.evaluate_sys(self, sys),
        }
    }

    fn evaluate_socket_call(&self, call: SocketCall, has_args: bool) -> Option<Rule> {
        self.common.evaluate_socket_call(self, call, has_args)
    }

    fn evaluate_ipc_call(&self, _call: IpcCall, _arg_shift: u8) -> Option<Rule> {
        None
    }

    fn prctl_policy(&self) -> Rule {
        switch(Arg::int(0))
            .case(PR_SET_VMA, self.common.set_vma_rule(self))
            .cases(
                &[
                    libc::PR_SET_NAME,
                    libc::PR_SET_DUMPABLE,
                    libc::PR_SET_PTRACER,
                    libc::PR_GET_PDEATHSIG,
                ],
                Rule::Allow,
            )
            .case(libc::PR_CAPBSET_READ, Rule::Error(libc::EINVAL))
            .default(self.invalid_syscall())
    }

    fn clone_policy(&self, fail: Rule) -> Rule {
        self.common.clone_policy(fail)
    }

    fn msg_flags_allowed(&self, flags: Arg) -> Cond {
        self.common.msg_flags_allowed(flags)
    }
}


// vim: ts=4 sw=4 expandtab
