// -*- coding: utf-8 -*-
//
// Copyright (C) 2024 Michael Büsch <m@bues.ch>
//
// Licensed under the Apache License version 2.0
// or the MIT license, at your option.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Typed decoding of raw syscall argument words.
//!
//! The integer accessors truncate exactly like the C ABI does. The pointer
//! accessors are `unsafe`: they trust that the faulting thread passed
//! pointers the kernel would have accepted for that syscall.

use libc::{c_int, c_ulong, mode_t};
use sandfilter_bpf::SyscallArgs;
use std::ffi::{c_char, CStr};

/// The kernel ABI `stat` structure used by the brokered stat calls.
#[cfg(any(has_SYS_stat64, has_SYS_fstatat64))]
pub type KernelStat = libc::stat64;
#[cfg(not(any(has_SYS_stat64, has_SYS_fstatat64)))]
pub type KernelStat = libc::stat;

pub fn int(args: &SyscallArgs, index: usize) -> c_int {
    args.args[index] as c_int
}

pub fn word(args: &SyscallArgs, index: usize) -> usize {
    args.args[index] as usize
}

pub fn mode(args: &SyscallArgs, index: usize) -> mode_t {
    args.args[index] as mode_t
}

/// A NUL terminated path argument, or `None` for a null pointer.
///
/// # Safety
///
/// A non-null word must point to a NUL terminated string that stays
/// valid while the returned reference is used.
pub unsafe fn path<'a>(args: &SyscallArgs, index: usize) -> Option<&'a CStr> {
    let ptr = word(args, index) as *const c_char;
    if ptr.is_null() {
        None
    } else {
        // SAFETY: Forwarded to the caller.
        Some(unsafe { CStr::from_ptr(ptr) })
    }
}

/// A caller supplied output buffer of `len` bytes.
///
/// # Safety
///
/// A non-null word must point to `len` writable bytes.
pub unsafe fn buffer<'a>(args: &SyscallArgs, index: usize, len: usize) -> Option<&'a mut [u8]> {
    let ptr = word(args, index) as *mut u8;
    if ptr.is_null() {
        None
    } else {
        // SAFETY: Forwarded to the caller.
        Some(unsafe { std::slice::from_raw_parts_mut(ptr, len) })
    }
}

/// A caller supplied input buffer of `len` bytes.
///
/// # Safety
///
/// A non-null word must point to `len` readable bytes.
pub unsafe fn bytes<'a>(args: &SyscallArgs, index: usize, len: usize) -> Option<&'a [u8]> {
    let ptr = word(args, index) as *const u8;
    if ptr.is_null() {
        None
    } else {
        // SAFETY: Forwarded to the caller.
        Some(unsafe { std::slice::from_raw_parts(ptr, len) })
    }
}

/// A pointer to a structure the kernel would fill in.
///
/// # Safety
///
/// A non-null word must point to a writable, aligned `T`.
pub unsafe fn out<'a, T>(args: &SyscallArgs, index: usize) -> Option<&'a mut T> {
    let ptr = word(args, index) as *mut T;
    // SAFETY: Forwarded to the caller.
    unsafe { ptr.as_mut() }
}

/// The argument block of a multiplexed `socketcall(2)`.
///
/// Only the first `count` words are read; the rest are zero.
///
/// # Safety
///
/// A non-null `args[1]` must point to at least `count` readable words.
pub unsafe fn socketcall_block(args: &SyscallArgs, count: usize) -> Option<SyscallArgs> {
    let ptr = word(args, 1) as *const c_ulong;
    if ptr.is_null() {
        return None;
    }
    let mut inner = SyscallArgs::new(args.nr, [0; 6]);
    for (i, slot) in inner.args.iter_mut().enumerate().take(count.min(6)) {
        // SAFETY: Forwarded to the caller.
        *slot = u64::from(unsafe { ptr.add(i).read() });
    }
    Some(inner)
}

/// Printable form of a path argument for diagnostics.
pub fn display(path: Option<&CStr>) -> std::borrow::Cow<'_, str> {
    match path {
        Some(path) => path.to_string_lossy(),
        None => "(null)".into(),
    }
}

pub fn is_absolute(path: &CStr) -> bool {
    path.to_bytes().first() == Some(&b'/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_truncates() {
        let args = SyscallArgs::new(0, [0xffff_ffff_ffff_ff9c, 0x1_0000_0002, 0, 0, 0, 0]);
        assert_eq!(int(&args, 0), libc::AT_FDCWD);
        assert_eq!(int(&args, 1), 2);
    }

    #[test]
    fn test_path() {
        let p = c"/tmp/x";
        let args = SyscallArgs::new(0, [p.as_ptr() as u64, 0, 0, 0, 0, 0]);
        let got = unsafe { path(&args, 0) }.unwrap();
        assert_eq!(got, p);
        assert!(is_absolute(got));
        assert!(unsafe { path(&args, 1) }.is_none());
        assert_eq!(display(None), "(null)");
        assert!(!is_absolute(c"rel/x"));
        assert!(!is_absolute(c""));
    }

    #[test]
    fn test_socketcall_block() {
        let block: [c_ulong; 6] = [1, 2, 3, 4, 5, 6];
        let args = SyscallArgs::new(7, [9, block.as_ptr() as u64, 0, 0, 0, 0]);
        let inner = unsafe { socketcall_block(&args, 4) }.unwrap();
        assert_eq!(inner.args, [1, 2, 3, 4, 0, 0]);
        let null = SyscallArgs::new(7, [9, 0, 0, 0, 0, 0]);
        assert!(unsafe { socketcall_block(&null, 6) }.is_none());
    }
}

// vim: ts=4 sw=4 expandtab
