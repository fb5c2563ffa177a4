// -*- coding: utf-8 -*-
//
// Copyright (C) 2024 Michael Büsch <m@bues.ch>
//
// Licensed under the Apache License version 2.0
// or the MIT license, at your option.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Seccomp syscall policies for sandboxed processes.
//!
//! A [Policy] maps every syscall number to a [Rule]. [compile_policy] turns
//! that into a BPF filter plus a [TrapTable], whose handlers the runtime
//! calls from its `SIGSYS` handler for every trapped syscall.

#[cfg(not(any(target_os = "linux", target_os = "android")))]
std::compile_error!("sandfilter-policy does not support non-Linux platforms.");

pub mod args;
pub mod broker;
pub mod common;
pub mod content;
pub mod kernel;
pub mod media;
pub mod opened_files;
pub mod policy;
pub mod rdd;
pub mod socket;
pub mod state;
pub mod sys;
pub mod traps;
pub mod utility;

pub use crate::{
    broker::{Broker, DenyBroker, FsOp},
    common::Common,
    content::{ContentParams, ContentPolicy},
    kernel::{Kernel, Linux, BLOCKED},
    media::MediaPolicy,
    opened_files::{OpenedFile, OpenedFiles},
    policy::{
        compile_policy, evaluate_all, CompiledPolicy, Policy, PolicyParams, ProcessPolicy,
        ProcessType, Rule, TrapTable,
    },
    rdd::RddPolicy,
    socket::{SocketParams, SocketPolicy},
    state::{FilterState, SandboxInfo},
    sys::{IpcCall, SocketCall, Sys},
    traps::Trap,
    utility::UtilityPolicy,
};

// vim: ts=4 sw=4 expandtab
