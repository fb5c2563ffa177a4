// -*- coding: utf-8 -*-
//
// Copyright (C) 2024 Michael Büsch <m@bues.ch>
//
// Licensed under the Apache License version 2.0
// or the MIT license, at your option.
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::sync::atomic::{AtomicBool, Ordering};

/// Sandbox installation state of the process.
///
/// Without seccomp thread sync the filter is installed thread by thread.
/// While that is in progress the `PR_SET_NO_NEW_PRIVS` trap must not look
/// like a policy violation.
#[derive(Debug, Default)]
pub struct FilterState {
    installing: AtomicBool,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_installing(&self, installing: bool) {
        self.installing.store(installing, Ordering::SeqCst);
    }

    pub fn is_installing(&self) -> bool {
        self.installing.load(Ordering::SeqCst)
    }
}

/// Properties of the running system that change the generated policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SandboxInfo {
    /// `SECCOMP_FILTER_FLAG_TSYNC` is available.
    pub has_seccomp_tsync: bool,
    /// The kernel has separate socket syscalls next to `socketcall(2)`.
    pub has_separate_socketcalls: bool,
    /// Log allow-list overrides.
    pub verbose: bool,
    pub page_size: usize,
}

impl Default for SandboxInfo {
    fn default() -> Self {
        Self {
            has_seccomp_tsync: true,
            has_separate_socketcalls: cfg!(not(has_SYS_socketcall)),
            verbose: false,
            page_size: 4096,
        }
    }
}

const SECCOMP_SET_MODE_FILTER: libc::c_ulong = 1;
const SECCOMP_FILTER_FLAG_TSYNC: libc::c_ulong = 1;

impl SandboxInfo {
    /// Probe the running kernel.
    pub fn detect() -> Self {
        let page_size = nix::unistd::sysconf(nix::unistd::SysconfVar::PAGE_SIZE)
            .ok()
            .flatten()
            .and_then(|s| usize::try_from(s).ok())
            .unwrap_or(4096);
        Self {
            has_seccomp_tsync: probe_tsync(),
            has_separate_socketcalls: probe_separate_socketcalls(),
            verbose: false,
            page_size,
        }
    }
}

fn probe_tsync() -> bool {
    // A null program makes the kernel fail with EFAULT after the flags were
    // accepted, and with EINVAL if TSYNC is unknown.
    // SAFETY: The kernel does not install anything for a null program.
    let rv = unsafe {
        libc::syscall(
            libc::SYS_seccomp,
            SECCOMP_SET_MODE_FILTER,
            SECCOMP_FILTER_FLAG_TSYNC,
            std::ptr::null::<libc::c_void>(),
        )
    };
    rv < 0 && nix::errno::Errno::last() == nix::errno::Errno::EFAULT
}

#[cfg(has_SYS_socketcall)]
fn probe_separate_socketcalls() -> bool {
    // Direct socket syscalls have been wired up on x86-32 since Linux 4.3.
    let Ok(uts) = nix::sys::utsname::uname() else {
        return false;
    };
    let release = uts.release().to_string_lossy();
    let mut parts = release.split(|c: char| !c.is_ascii_digit());
    let major: u32 = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    let minor: u32 = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    (major, minor) >= (4, 3)
}

#[cfg(not(has_SYS_socketcall))]
fn probe_separate_socketcalls() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_state() {
        let s = FilterState::new();
        assert!(!s.is_installing());
        s.set_installing(true);
        assert!(s.is_installing());
        s.set_installing(false);
        assert!(!s.is_installing());
    }

    #[test]
    fn test_detect() {
        let info = SandboxInfo::detect();
        assert!(info.page_size.is_power_of_two());
        assert!(!info.verbose);
    }
}

// vim: ts=4 sw=4 expandtab
