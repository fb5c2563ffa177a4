// -*- coding: utf-8 -*-
//
// Copyright (C) 2024 Michael Büsch <m@bues.ch>
//
// Licensed under the Apache License version 2.0
// or the MIT license, at your option.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Filesystem brokering.
//!
//! Path based filesystem syscalls are not executed by the sandboxed process.
//! They are decoded here and forwarded to a [Broker], which asks a trusted
//! process to perform them.

use crate::{
    args::{self, KernelStat},
    kernel::{neg, Kernel, BLOCKED, SYS_FSTAT},
    sys::Sys,
};
use libc::{c_int, mode_t};
use sandfilter_bpf::SyscallArgs;
use std::ffi::CStr;

/// Client side of the file access broker.
///
/// Every method is one synchronous request to the broker process and
/// returns a descriptor or `0` on success and `-errno` on failure.
/// Methods may be called concurrently from several threads.
pub trait Broker: Send + Sync {
    fn open(&self, path: &CStr, flags: c_int) -> isize;
    fn access(&self, path: &CStr, mode: c_int) -> isize;
    fn stat(&self, path: &CStr, buf: &mut KernelStat) -> isize;
    fn lstat(&self, path: &CStr, buf: &mut KernelStat) -> isize;
    fn chmod(&self, path: &CStr, mode: mode_t) -> isize;
    fn link(&self, path: &CStr, path2: &CStr) -> isize;
    fn symlink(&self, path: &CStr, path2: &CStr) -> isize;
    fn rename(&self, path: &CStr, path2: &CStr) -> isize;
    fn mkdir(&self, path: &CStr, mode: mode_t) -> isize;
    fn rmdir(&self, path: &CStr) -> isize;
    fn unlink(&self, path: &CStr) -> isize;
    fn readlink(&self, path: &CStr, buf: &mut [u8]) -> isize;
    /// Return a new socket of type `ty`, connected to the unix socket `addr`.
    fn connect(&self, addr: &[u8], ty: c_int) -> isize;
}

/// A broker that refuses every request with `EACCES`.
///
/// Used where a policy needs a broker but nothing may be reached through it,
/// for example when a filter is only generated and inspected.
#[derive(Clone, Copy, Debug, Default)]
pub struct DenyBroker;

impl Broker for DenyBroker {
    fn open(&self, _path: &CStr, _flags: c_int) -> isize {
        neg(libc::EACCES)
    }
    fn access(&self, _path: &CStr, _mode: c_int) -> isize {
        neg(libc::EACCES)
    }
    fn stat(&self, _path: &CStr, _buf: &mut KernelStat) -> isize {
        neg(libc::EACCES)
    }
    fn lstat(&self, _path: &CStr, _buf: &mut KernelStat) -> isize {
        neg(libc::EACCES)
    }
    fn chmod(&self, _path: &CStr, _mode: mode_t) -> isize {
        neg(libc::EACCES)
    }
    fn link(&self, _path: &CStr, _path2: &CStr) -> isize {
        neg(libc::EACCES)
    }
    fn symlink(&self, _path: &CStr, _path2: &CStr) -> isize {
        neg(libc::EACCES)
    }
    fn rename(&self, _path: &CStr, _path2: &CStr) -> isize {
        neg(libc::EACCES)
    }
    fn mkdir(&self, _path: &CStr, _mode: mode_t) -> isize {
        neg(libc::EACCES)
    }
    fn rmdir(&self, _path: &CStr) -> isize {
        neg(libc::EACCES)
    }
    fn unlink(&self, _path: &CStr) -> isize {
        neg(libc::EACCES)
    }
    fn readlink(&self, _path: &CStr, _buf: &mut [u8]) -> isize {
        neg(libc::EACCES)
    }
    fn connect(&self, _addr: &[u8], _ty: c_int) -> isize {
        neg(libc::EACCES)
    }
}

/// A brokered filesystem operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FsOp {
    Open,
    Access,
    Stat,
    Lstat,
    Chmod,
    Link,
    Symlink,
    Rename,
    Mkdir,
    Rmdir,
    Unlink,
    Readlink,
    Openat,
    Faccessat,
    Faccessat2,
    Fchmodat,
    Linkat,
    Symlinkat,
    Renameat,
    Mkdirat,
    Unlinkat,
    Readlinkat,
}

impl FsOp {
    /// The brokered operation for a logical syscall.
    pub fn for_sys(sys: Sys) -> Option<Self> {
        Some(match sys {
            Sys::Open => Self::Open,
            Sys::Access => Self::Access,
            Sys::Stat => Self::Stat,
            Sys::Lstat => Self::Lstat,
            Sys::Chmod => Self::Chmod,
            Sys::Link => Self::Link,
            Sys::Symlink => Self::Symlink,
            Sys::Rename => Self::Rename,
            Sys::Mkdir => Self::Mkdir,
            Sys::Rmdir => Self::Rmdir,
            Sys::Unlink => Self::Unlink,
            Sys::Readlink => Self::Readlink,
            Sys::Openat => Self::Openat,
            Sys::Faccessat => Self::Faccessat,
            Sys::Faccessat2 => Self::Faccessat2,
            Sys::Fchmodat => Self::Fchmodat,
            Sys::Linkat => Self::Linkat,
            Sys::Symlinkat => Self::Symlinkat,
            Sys::Renameat => Self::Renameat,
            Sys::Mkdirat => Self::Mkdirat,
            Sys::Unlinkat => Self::Unlinkat,
            Sys::Readlinkat => Self::Readlinkat,
            _ => return None,
        })
    }
}

/// A path argument, or the result to return if it can't be used.
type PathArg<'a> = Result<&'a CStr, isize>;

/// # Safety
///
/// See [args::path].
unsafe fn path_arg<'a>(a: &SyscallArgs, index: usize) -> PathArg<'a> {
    // SAFETY: Forwarded to the caller.
    unsafe { args::path(a, index) }.ok_or(neg(libc::EFAULT))
}

/// True if `path` can't be resolved without knowing what `dirfd` refers to.
fn fd_relative(dirfd: c_int, path: &CStr) -> bool {
    dirfd != libc::AT_FDCWD && !args::is_absolute(path)
}

impl FsOp {
    /// Execute the operation for the raw syscall arguments.
    ///
    /// # Safety
    ///
    /// `a` must be the arguments of a trapped syscall of this operation,
    /// as passed by the faulting thread.
    pub unsafe fn run(self, a: &SyscallArgs, broker: &dyn Broker) -> isize {
        // SAFETY: Forwarded to the caller.
        match unsafe { self.run_inner(a, broker) } {
            Ok(rv) | Err(rv) => rv,
        }
    }

    unsafe fn run_inner(self, a: &SyscallArgs, broker: &dyn Broker) -> Result<isize, isize> {
        let int = |i| args::int(a, i);
        let mode = |i| args::mode(a, i);
        // SAFETY: The pointer decoding below follows the syscall ABI of self.
        unsafe {
            Ok(match self {
                Self::Open => broker.open(path_arg(a, 0)?, int(1)),
                Self::Access => broker.access(path_arg(a, 0)?, int(1)),
                Self::Stat => broker.stat(path_arg(a, 0)?, stat_buf(a, 1)?),
                Self::Lstat => broker.lstat(path_arg(a, 0)?, stat_buf(a, 1)?),
                Self::Chmod => broker.chmod(path_arg(a, 0)?, mode(1)),
                Self::Link => broker.link(path_arg(a, 0)?, path_arg(a, 1)?),
                Self::Symlink => broker.symlink(path_arg(a, 0)?, path_arg(a, 1)?),
                Self::Rename => broker.rename(path_arg(a, 0)?, path_arg(a, 1)?),
                Self::Mkdir => broker.mkdir(path_arg(a, 0)?, mode(1)),
                Self::Rmdir => broker.rmdir(path_arg(a, 0)?),
                Self::Unlink => {
                    let path = path_arg(a, 0)?;
                    if path.is_empty() {
                        return Err(neg(libc::ENOENT));
                    }
                    broker.unlink(path)
                }
                Self::Readlink => {
                    let path = path_arg(a, 0)?;
                    broker.readlink(path, readlink_buf(a, 1, 2)?)
                }
                Self::Openat => {
                    let (fd, path, flags) = (int(0), path_arg(a, 1)?, int(2));
                    if fd_relative(fd, path) {
                        log::error!(
                            "unsupported fd-relative openat({fd}, \"{}\", 0{flags:o})",
                            path.to_string_lossy()
                        );
                        return Err(BLOCKED);
                    }
                    broker.open(path, flags)
                }
                Self::Faccessat => {
                    // faccessat(2) has no flags argument.
                    let (fd, path, amode) = (int(0), path_arg(a, 1)?, int(2));
                    if fd_relative(fd, path) {
                        log::error!(
                            "unsupported fd-relative faccessat({fd}, \"{}\", {amode})",
                            path.to_string_lossy()
                        );
                        return Err(BLOCKED);
                    }
                    broker.access(path, amode)
                }
                Self::Faccessat2 => {
                    let (fd, path, amode, flags) = (int(0), path_arg(a, 1)?, int(2), int(3));
                    if fd_relative(fd, path) {
                        log::error!(
                            "unsupported fd-relative faccessat2({fd}, \"{}\", {amode}, {flags})",
                            path.to_string_lossy()
                        );
                        return Err(BLOCKED);
                    }
                    if flags & !libc::AT_EACCESS != 0 {
                        log::error!(
                            "unsupported flags {flags:#x} in faccessat2({fd}, \"{}\", {amode})",
                            path.to_string_lossy()
                        );
                        return Err(BLOCKED);
                    }
                    broker.access(path, amode)
                }
                Self::Fchmodat => {
                    let (fd, path, m, flags) = (int(0), path_arg(a, 1)?, mode(2), int(3));
                    if fd_relative(fd, path) {
                        log::error!(
                            "unsupported fd-relative fchmodat({fd}, \"{}\", 0{m:o}, {flags})",
                            path.to_string_lossy()
                        );
                        return Err(BLOCKED);
                    }
                    if flags != 0 {
                        log::error!(
                            "unsupported flags in fchmodat({fd}, \"{}\", 0{m:o}, {flags})",
                            path.to_string_lossy()
                        );
                        return Err(BLOCKED);
                    }
                    broker.chmod(path, m)
                }
                Self::Linkat => {
                    let (fd, path) = (int(0), path_arg(a, 1)?);
                    let (fd2, path2) = (int(2), path_arg(a, 3)?);
                    let flags = int(4);
                    if fd_relative(fd, path) || fd_relative(fd2, path2) {
                        log::error!(
                            "unsupported fd-relative linkat({fd}, \"{}\", {fd2}, \"{}\", {flags:#x})",
                            path.to_string_lossy(),
                            path2.to_string_lossy()
                        );
                        return Err(BLOCKED);
                    }
                    if flags != 0 {
                        log::error!(
                            "unsupported flags in linkat({fd}, \"{}\", {fd2}, \"{}\", {flags:#x})",
                            path.to_string_lossy(),
                            path2.to_string_lossy()
                        );
                        return Err(BLOCKED);
                    }
                    broker.link(path, path2)
                }
                Self::Symlinkat => {
                    // The link target is not resolved, only the new name.
                    let (target, fd2, path2) = (path_arg(a, 0)?, int(1), path_arg(a, 2)?);
                    if fd_relative(fd2, path2) {
                        log::error!(
                            "unsupported fd-relative symlinkat(\"{}\", {fd2}, \"{}\")",
                            target.to_string_lossy(),
                            path2.to_string_lossy()
                        );
                        return Err(BLOCKED);
                    }
                    broker.symlink(target, path2)
                }
                Self::Renameat => {
                    let (fd, path) = (int(0), path_arg(a, 1)?);
                    let (fd2, path2) = (int(2), path_arg(a, 3)?);
                    if fd_relative(fd, path) || fd_relative(fd2, path2) {
                        log::error!(
                            "unsupported fd-relative renameat({fd}, \"{}\", {fd2}, \"{}\")",
                            path.to_string_lossy(),
                            path2.to_string_lossy()
                        );
                        return Err(BLOCKED);
                    }
                    broker.rename(path, path2)
                }
                Self::Mkdirat => {
                    let (fd, path, m) = (int(0), path_arg(a, 1)?, mode(2));
                    if fd_relative(fd, path) {
                        log::error!(
                            "unsupported fd-relative mkdirat({fd}, \"{}\", 0{m:o})",
                            path.to_string_lossy()
                        );
                        return Err(BLOCKED);
                    }
                    broker.mkdir(path, m)
                }
                Self::Unlinkat => {
                    let (fd, path, flags) = (int(0), path_arg(a, 1)?, int(2));
                    if path.is_empty() {
                        return Err(neg(libc::ENOENT));
                    }
                    if fd_relative(fd, path) {
                        log::error!(
                            "unsupported fd-relative unlinkat({fd}, \"{}\", {flags:#x})",
                            path.to_string_lossy()
                        );
                        return Err(BLOCKED);
                    }
                    let bad_flags = flags & !libc::AT_REMOVEDIR;
                    if bad_flags != 0 {
                        log::error!(
                            "unsupported flags {bad_flags:#x} in unlinkat({fd}, \"{}\", {flags:#x})",
                            path.to_string_lossy()
                        );
                        return Err(BLOCKED);
                    }
                    if flags & libc::AT_REMOVEDIR == 0 {
                        broker.unlink(path)
                    } else {
                        broker.rmdir(path)
                    }
                }
                Self::Readlinkat => {
                    let (fd, path) = (int(0), path_arg(a, 1)?);
                    if fd_relative(fd, path) {
                        log::error!(
                            "unsupported fd-relative readlinkat({fd}, \"{}\", {:#x}, {})",
                            path.to_string_lossy(),
                            args::word(a, 2),
                            args::word(a, 3)
                        );
                        return Err(BLOCKED);
                    }
                    broker.readlink(path, readlink_buf(a, 2, 3)?)
                }
            })
        }
    }
}

/// # Safety
///
/// See [args::out].
unsafe fn stat_buf<'a>(a: &SyscallArgs, index: usize) -> Result<&'a mut KernelStat, isize> {
    // SAFETY: Forwarded to the caller.
    unsafe { args::out(a, index) }.ok_or(neg(libc::EFAULT))
}

/// # Safety
///
/// See [args::buffer].
unsafe fn readlink_buf<'a>(
    a: &SyscallArgs,
    index: usize,
    size_index: usize,
) -> Result<&'a mut [u8], isize> {
    let len = args::word(a, size_index);
    // SAFETY: Forwarded to the caller.
    unsafe { args::buffer(a, index, len) }.ok_or(neg(libc::EFAULT))
}

/// `fstatat(2)` and `newfstatat(2)`.
///
/// `fstatat(fd, "", buf, AT_EMPTY_PATH)` stats the descriptor itself and is
/// served locally, even without a broker.
///
/// # Safety
///
/// `a` must be the arguments of a trapped `fstatat` call, as passed by the
/// faulting thread.
pub unsafe fn stat_at(a: &SyscallArgs, broker: Option<&dyn Broker>, kernel: &dyn Kernel) -> isize {
    let fd = args::int(a, 0);
    // SAFETY: The ABI is fstatat(int, const char *, struct stat *, int).
    let path = unsafe { args::path(a, 1) };
    let flags = args::int(a, 3);

    if fd != libc::AT_FDCWD && flags & libc::AT_EMPTY_PATH != 0 && path.is_some_and(CStr::is_empty) {
        // SAFETY: The stat buffer is forwarded unchanged.
        return unsafe { kernel.syscall(SYS_FSTAT, [fd as usize, args::word(a, 2), 0, 0, 0, 0]) };
    }

    let Some(broker) = broker else {
        return BLOCKED;
    };

    // SAFETY: See above.
    let (path, buf) = match unsafe { (path_arg(a, 1), stat_buf(a, 2)) } {
        (Ok(path), Ok(buf)) => (path, buf),
        (Err(rv), _) | (_, Err(rv)) => return rv,
    };

    if fd_relative(fd, path) {
        log::error!(
            "unsupported fd-relative fstatat({fd}, \"{}\", {:#x}, {flags:#x})",
            path.to_string_lossy(),
            args::word(a, 2)
        );
        return BLOCKED;
    }

    let bad_flags = flags & !(libc::AT_SYMLINK_NOFOLLOW | libc::AT_NO_AUTOMOUNT);
    if bad_flags != 0 {
        log::error!(
            "unsupported flags {bad_flags:#x} in fstatat({fd}, \"{}\", {:#x}, {flags:#x})",
            path.to_string_lossy(),
            args::word(a, 2)
        );
        return BLOCKED;
    }

    if flags & libc::AT_SYMLINK_NOFOLLOW == 0 {
        broker.stat(path, buf)
    } else {
        broker.lstat(path, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every request and answers with a fixed value.
    #[derive(Default)]
    struct Log(Mutex<Vec<String>>);

    impl Log {
        fn push(&self, s: String) -> isize {
            self.0.lock().unwrap().push(s);
            0
        }

        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }
    }

    impl Broker for Log {
        fn open(&self, path: &CStr, flags: c_int) -> isize {
            self.push(format!("open {path:?} {flags}"))
        }
        fn access(&self, path: &CStr, mode: c_int) -> isize {
            self.push(format!("access {path:?} {mode}"))
        }
        fn stat(&self, path: &CStr, _buf: &mut KernelStat) -> isize {
            self.push(format!("stat {path:?}"))
        }
        fn lstat(&self, path: &CStr, _buf: &mut KernelStat) -> isize {
            self.push(format!("lstat {path:?}"))
        }
        fn chmod(&self, path: &CStr, mode: mode_t) -> isize {
            self.push(format!("chmod {path:?} {mode:o}"))
        }
        fn link(&self, path: &CStr, path2: &CStr) -> isize {
            self.push(format!("link {path:?} {path2:?}"))
        }
        fn symlink(&self, path: &CStr, path2: &CStr) -> isize {
            self.push(format!("symlink {path:?} {path2:?}"))
        }
        fn rename(&self, path: &CStr, path2: &CStr) -> isize {
            self.push(format!("rename {path:?} {path2:?}"))
        }
        fn mkdir(&self, path: &CStr, mode: mode_t) -> isize {
            self.push(format!("mkdir {path:?} {mode:o}"))
        }
        fn rmdir(&self, path: &CStr) -> isize {
            self.push(format!("rmdir {path:?}"))
        }
        fn unlink(&self, path: &CStr) -> isize {
            self.push(format!("unlink {path:?}"))
        }
        fn readlink(&self, path: &CStr, buf: &mut [u8]) -> isize {
            self.push(format!("readlink {path:?} {}", buf.len()))
        }
        fn connect(&self, addr: &[u8], ty: c_int) -> isize {
            self.push(format!("connect {} {ty}", addr.len()))
        }
    }

    fn p(s: &CStr) -> u64 {
        s.as_ptr() as u64
    }

    fn run(op: FsOp, a: [u64; 6], broker: &Log) -> isize {
        unsafe { op.run(&SyscallArgs::new(0, a), broker) }
    }

    const CWD: u64 = libc::AT_FDCWD as u32 as u64;

    #[test]
    fn test_plain_ops() {
        let b = Log::default();
        assert_eq!(run(FsOp::Open, [p(c"/a"), 2, 0, 0, 0, 0], &b), 0);
        assert_eq!(run(FsOp::Mkdir, [p(c"/d"), 0o755, 0, 0, 0, 0], &b), 0);
        assert_eq!(run(FsOp::Rename, [p(c"/a"), p(c"/b"), 0, 0, 0, 0], &b), 0);
        assert_eq!(
            b.take(),
            vec!["open \"/a\" 2", "mkdir \"/d\" 755", "rename \"/a\" \"/b\""]
        );
    }

    #[test]
    fn test_null_path() {
        let b = Log::default();
        assert_eq!(run(FsOp::Open, [0; 6], &b), neg(libc::EFAULT));
        assert!(b.take().is_empty());
    }

    #[test]
    fn test_at_variants() {
        let b = Log::default();
        assert_eq!(run(FsOp::Openat, [CWD, p(c"rel"), 0, 0, 0, 0], &b), 0);
        assert_eq!(run(FsOp::Openat, [5, p(c"/abs"), 0, 0, 0, 0], &b), 0);
        assert_eq!(run(FsOp::Openat, [5, p(c"rel"), 0, 0, 0, 0], &b), BLOCKED);
        assert_eq!(run(FsOp::Symlinkat, [p(c"target"), CWD, p(c"/l"), 0, 0, 0], &b), 0);
        assert_eq!(
            run(FsOp::Linkat, [CWD, p(c"/a"), 3, p(c"rel"), 0, 0], &b),
            BLOCKED
        );
        assert_eq!(
            b.take(),
            vec!["open \"rel\" 0", "open \"/abs\" 0", "symlink \"target\" \"/l\""]
        );
    }

    #[test]
    fn test_flag_validation() {
        let b = Log::default();
        let nofollow = libc::AT_SYMLINK_NOFOLLOW as u64;
        assert_eq!(run(FsOp::Fchmodat, [CWD, p(c"/a"), 0o600, nofollow, 0, 0], &b), BLOCKED);
        assert_eq!(run(FsOp::Linkat, [CWD, p(c"/a"), CWD, p(c"/b"), 0x400, 0], &b), BLOCKED);
        let eaccess = libc::AT_EACCESS as u64;
        assert_eq!(run(FsOp::Faccessat2, [CWD, p(c"/a"), 4, eaccess, 0, 0], &b), 0);
        assert_eq!(run(FsOp::Faccessat2, [CWD, p(c"/a"), 4, nofollow, 0, 0], &b), BLOCKED);
        let rmdir = libc::AT_REMOVEDIR as u64;
        assert_eq!(run(FsOp::Unlinkat, [CWD, p(c"/d"), rmdir, 0, 0, 0], &b), 0);
        assert_eq!(run(FsOp::Unlinkat, [CWD, p(c"/d"), 0x1, 0, 0, 0], &b), BLOCKED);
        assert_eq!(b.take(), vec!["access \"/a\" 4", "rmdir \"/d\""]);
    }

    #[test]
    fn test_readlink_buffer() {
        let b = Log::default();
        let mut buf = [0_u8; 16];
        let ptr = buf.as_mut_ptr() as u64;
        assert_eq!(run(FsOp::Readlinkat, [CWD, p(c"/l"), ptr, 16, 0, 0], &b), 0);
        assert_eq!(run(FsOp::Readlink, [p(c"/l"), 0, 16, 0, 0, 0], &b), neg(libc::EFAULT));
        assert_eq!(b.take(), vec!["readlink \"/l\" 16"]);
    }

    #[test]
    fn test_stat_at_flags() {
        let b = Log::default();
        let mut st: KernelStat = unsafe { std::mem::zeroed() };
        let buf = &mut st as *mut KernelStat as u64;
        let k = crate::kernel::Linux;
        let call = |a: [u64; 6]| unsafe { stat_at(&SyscallArgs::new(0, a), Some(&b), &k) };

        let nofollow = libc::AT_SYMLINK_NOFOLLOW as u64;
        let automount = libc::AT_NO_AUTOMOUNT as u64;
        assert_eq!(call([CWD, p(c"/s"), buf, 0, 0, 0]), 0);
        assert_eq!(call([CWD, p(c"/s"), buf, nofollow | automount, 0, 0]), 0);
        assert_eq!(call([CWD, p(c"/s"), buf, 0x8000, 0, 0]), BLOCKED);
        assert_eq!(call([3, p(c"s"), buf, 0, 0, 0]), BLOCKED);
        assert_eq!(b.take(), vec!["stat \"/s\"", "lstat \"/s\""]);
    }
}

// vim: ts=4 sw=4 expandtab
