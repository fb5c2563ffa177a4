// -*- coding: utf-8 -*-
//
// Copyright (C) 2024 Michael Büsch <m@bues.ch>
//
// Licensed under the Apache License version 2.0
// or the MIT license, at your option.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The primitive syscalls trap handlers are built on.
//!
//! All results use the raw kernel convention: a non-negative value on
//! success and `-errno` on failure.

use libc::{c_int, c_long};
use nix::errno::Errno;
use std::ffi::CStr;

/// Return value of a trap that found an unexpected syscall.
///
/// The SIGSYS handler treats this as a fatal policy violation.
pub const BLOCKED: isize = -(libc::ENOSYS as isize);

/// Negate an errno into the raw return convention.
pub const fn neg(errno: c_int) -> isize {
    -(errno as isize)
}

/// Convert the libc "return -1 and set errno" convention into `-errno`.
pub fn convert_error(rv: c_long) -> isize {
    if rv < 0 {
        neg(Errno::last() as c_int)
    } else {
        rv as isize
    }
}

#[cfg(has_SYS_fstat64)]
pub(crate) const SYS_FSTAT: i64 = libc::SYS_fstat64 as i64;
#[cfg(not(has_SYS_fstat64))]
pub(crate) const SYS_FSTAT: i64 = libc::SYS_fstat as i64;

#[cfg(has_SYS_fcntl64)]
const SYS_FCNTL: i64 = libc::SYS_fcntl64 as i64;
#[cfg(not(has_SYS_fcntl64))]
const SYS_FCNTL: i64 = libc::SYS_fcntl as i64;

pub trait Kernel: Send + Sync {
    /// Issue a raw syscall.
    ///
    /// # Safety
    ///
    /// Every pointer in `args` must be valid for the way syscall `nr`
    /// uses it.
    unsafe fn syscall(&self, nr: i64, args: [usize; 6]) -> isize;

    fn getpid(&self) -> i32;

    fn gettid(&self) -> i32;

    fn open(&self, path: &CStr, flags: c_int) -> isize {
        // SAFETY: path is NUL terminated and outlives the call.
        unsafe {
            self.syscall(
                libc::SYS_openat as i64,
                [
                    libc::AT_FDCWD as usize,
                    path.as_ptr() as usize,
                    flags as usize,
                    0,
                    0,
                    0,
                ],
            )
        }
    }

    fn close(&self, fd: c_int) -> isize {
        // SAFETY: No pointers.
        unsafe { self.syscall(libc::SYS_close as i64, [fd as usize, 0, 0, 0, 0, 0]) }
    }

    fn dup(&self, fd: c_int) -> isize {
        // SAFETY: No pointers.
        unsafe { self.syscall(libc::SYS_dup as i64, [fd as usize, 0, 0, 0, 0, 0]) }
    }

    /// `dup2` semantics, also on architectures that only have `dup3`.
    fn dup2(&self, oldfd: c_int, newfd: c_int) -> isize {
        if oldfd == newfd {
            let rv = self.fcntl(oldfd, libc::F_GETFD, 0);
            return if rv < 0 { rv } else { newfd as isize };
        }
        // SAFETY: No pointers.
        unsafe {
            self.syscall(
                libc::SYS_dup3 as i64,
                [oldfd as usize, newfd as usize, 0, 0, 0, 0],
            )
        }
    }

    fn fcntl(&self, fd: c_int, cmd: c_int, arg: c_int) -> isize {
        // SAFETY: Only used with integer argument commands.
        unsafe {
            self.syscall(
                SYS_FCNTL,
                [fd as usize, cmd as usize, arg as usize, 0, 0, 0],
            )
        }
    }

    fn socketpair(&self, domain: c_int, ty: c_int, protocol: c_int, fds: &mut [c_int; 2]) -> isize {
        // SAFETY: fds has room for two descriptors.
        unsafe {
            self.syscall(
                libc::SYS_socketpair as i64,
                [
                    domain as usize,
                    ty as usize,
                    protocol as usize,
                    fds.as_mut_ptr() as usize,
                    0,
                    0,
                ],
            )
        }
    }

    /// Read an `int` valued `SOL_SOCKET` option.
    fn getsockopt_int(&self, fd: c_int, optname: c_int) -> Result<c_int, isize> {
        let mut value: c_int = 0;
        let mut len = std::mem::size_of::<c_int>() as libc::socklen_t;
        // SAFETY: value and len are valid for writing.
        let rv = unsafe {
            self.syscall(
                libc::SYS_getsockopt as i64,
                [
                    fd as usize,
                    libc::SOL_SOCKET as usize,
                    optname as usize,
                    &mut value as *mut c_int as usize,
                    &mut len as *mut libc::socklen_t as usize,
                    0,
                ],
            )
        };
        if rv < 0 {
            return Err(rv);
        }
        if len as usize != std::mem::size_of::<c_int>() {
            return Err(neg(libc::EINVAL));
        }
        Ok(value)
    }
}

/// The running kernel.
#[derive(Clone, Copy, Debug, Default)]
pub struct Linux;

impl Kernel for Linux {
    unsafe fn syscall(&self, nr: i64, args: [usize; 6]) -> isize {
        let [a0, a1, a2, a3, a4, a5] = args;
        // SAFETY: Forwarded to the caller.
        let rv = unsafe { libc::syscall(nr as c_long, a0, a1, a2, a3, a4, a5) };
        convert_error(rv)
    }

    fn getpid(&self) -> i32 {
        nix::unistd::getpid().as_raw()
    }

    fn gettid(&self) -> i32 {
        // SAFETY: No arguments.
        unsafe { libc::syscall(libc::SYS_gettid) as i32 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::fd::AsRawFd;

    #[test]
    fn test_convert_error() {
        assert_eq!(convert_error(5), 5);
        Errno::set_raw(libc::EACCES);
        assert_eq!(convert_error(-1), -(libc::EACCES as isize));
    }

    #[test]
    fn test_linux_primitives() {
        let k = Linux;
        assert_eq!(k.getpid(), std::process::id() as i32);
        assert!(k.gettid() > 0);

        let file = tempfile::tempfile().unwrap();
        let fd = file.as_raw_fd();
        let fd2 = k.dup(fd);
        assert!(fd2 >= 0);
        assert_eq!(k.dup2(fd2 as c_int, fd2 as c_int), fd2);
        assert_eq!(k.close(fd2 as c_int), 0);
        assert_eq!(k.close(fd2 as c_int), neg(libc::EBADF));
        assert_eq!(k.open(c"/nonexistent/sandfilter", libc::O_RDONLY), neg(libc::ENOENT));
    }

    #[test]
    fn test_getsockopt_int() {
        let k = Linux;
        let mut fds = [-1; 2];
        assert_eq!(k.socketpair(libc::AF_UNIX, libc::SOCK_STREAM, 0, &mut fds), 0);
        assert_eq!(k.getsockopt_int(fds[0], libc::SO_DOMAIN), Ok(libc::AF_UNIX));
        assert_eq!(k.getsockopt_int(fds[0], libc::SO_TYPE), Ok(libc::SOCK_STREAM));
        k.close(fds[0]);
        k.close(fds[1]);
    }
}

// vim: ts=4 sw=4 expandtab
