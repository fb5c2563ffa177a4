// -*- coding: utf-8 -*-
//
// Copyright (C) 2024 Michael Büsch <m@bues.ch>
//
// Licensed under the Apache License version 2.0
// or the MIT license, at your option.
// SPDX-License-Identifier: Apache-2.0 OR MIT

#![allow(dead_code)]

use libc::{c_int, mode_t};
use sandfilter_policy::{
    args::KernelStat, sys::MAX_SYSCALL_NR, Broker, FilterState, Kernel, OpenedFiles,
    PolicyParams, ProcessPolicy, ProcessType, SandboxInfo, Sys,
};
use std::{
    ffi::CStr,
    sync::{Arc, Mutex},
};

/// Records every broker request and answers with `reply`.
#[derive(Default)]
pub struct RecordingBroker {
    calls: Mutex<Vec<String>>,
    reply: isize,
    connect_fd: Mutex<Option<c_int>>,
}

impl RecordingBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The descriptor the next `connect` hands out.
    pub fn set_connect_fd(&self, fd: c_int) {
        *self.connect_fd.lock().unwrap() = Some(fd);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) -> isize {
        self.calls.lock().unwrap().push(call);
        self.reply
    }
}

impl Broker for RecordingBroker {
    fn open(&self, path: &CStr, flags: c_int) -> isize {
        self.record(format!("open {} {flags}", path.to_string_lossy()))
    }
    fn access(&self, path: &CStr, mode: c_int) -> isize {
        self.record(format!("access {} {mode}", path.to_string_lossy()))
    }
    fn stat(&self, path: &CStr, _buf: &mut KernelStat) -> isize {
        self.record(format!("stat {}", path.to_string_lossy()))
    }
    fn lstat(&self, path: &CStr, _buf: &mut KernelStat) -> isize {
        self.record(format!("lstat {}", path.to_string_lossy()))
    }
    fn chmod(&self, path: &CStr, mode: mode_t) -> isize {
        self.record(format!("chmod {} {mode:o}", path.to_string_lossy()))
    }
    fn link(&self, path: &CStr, path2: &CStr) -> isize {
        self.record(format!(
            "link {} {}",
            path.to_string_lossy(),
            path2.to_string_lossy()
        ))
    }
    fn symlink(&self, path: &CStr, path2: &CStr) -> isize {
        self.record(format!(
            "symlink {} {}",
            path.to_string_lossy(),
            path2.to_string_lossy()
        ))
    }
    fn rename(&self, path: &CStr, path2: &CStr) -> isize {
        self.record(format!(
            "rename {} {}",
            path.to_string_lossy(),
            path2.to_string_lossy()
        ))
    }
    fn mkdir(&self, path: &CStr, mode: mode_t) -> isize {
        self.record(format!("mkdir {} {mode:o}", path.to_string_lossy()))
    }
    fn rmdir(&self, path: &CStr) -> isize {
        self.record(format!("rmdir {}", path.to_string_lossy()))
    }
    fn unlink(&self, path: &CStr) -> isize {
        self.record(format!("unlink {}", path.to_string_lossy()))
    }
    fn readlink(&self, path: &CStr, _buf: &mut [u8]) -> isize {
        self.record(format!("readlink {}", path.to_string_lossy()))
    }
    fn connect(&self, addr: &[u8], ty: c_int) -> isize {
        self.record(format!("connect {} {ty}", addr.len()));
        match self.connect_fd.lock().unwrap().take() {
            Some(fd) => fd as isize,
            None => -(libc::ECONNREFUSED as isize),
        }
    }
}

/// A kernel that records raw syscalls instead of executing them.
///
/// The helper primitives that don't go through `syscall` run for real.
pub struct RecordingKernel {
    pub pid: i32,
    pub tid: i32,
    calls: Mutex<Vec<(i64, [usize; 6])>>,
}

impl RecordingKernel {
    pub fn new(pid: i32, tid: i32) -> Self {
        Self {
            pid,
            tid,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(i64, [usize; 6])> {
        self.calls.lock().unwrap().clone()
    }
}

impl Kernel for RecordingKernel {
    unsafe fn syscall(&self, nr: i64, args: [usize; 6]) -> isize {
        self.calls.lock().unwrap().push((nr, args));
        0
    }

    fn getpid(&self) -> i32 {
        self.pid
    }

    fn gettid(&self) -> i32 {
        self.tid
    }
}

pub fn info() -> SandboxInfo {
    SandboxInfo {
        has_seccomp_tsync: true,
        has_separate_socketcalls: true,
        verbose: false,
        page_size: 4096,
    }
}

pub fn params(broker: Arc<dyn Broker>, files: Arc<OpenedFiles>) -> PolicyParams {
    PolicyParams {
        broker,
        files,
        content: sandfilter_policy::ContentParams::new(4),
        socket: sandfilter_policy::SocketParams::default(),
        info: info(),
        filter_state: Arc::new(FilterState::new()),
    }
}

/// All process policies, with a shared recording broker.
pub fn all_policies(broker: Arc<RecordingBroker>) -> Vec<ProcessPolicy> {
    let params = params(broker, Arc::new(OpenedFiles::default()));
    ProcessType::ALL
        .into_iter()
        .map(|ty| ProcessPolicy::new(ty, &params).unwrap())
        .collect()
}

/// The number of logical syscall `sys` on this architecture.
pub fn nr_of(sys: Sys) -> Option<i64> {
    (0..=MAX_SYSCALL_NR).find(|nr| Sys::from_nr(*nr) == Some(sys))
}

// vim: ts=4 sw=4 expandtab
