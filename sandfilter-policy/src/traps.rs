// -*- coding: utf-8 -*-
//
// Copyright (C) 2024 Michael Büsch <m@bues.ch>
//
// Licensed under the Apache License version 2.0
// or the MIT license, at your option.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! User space handlers for trapped syscalls.
//!
//! A handler runs synchronously in the faulting thread. It gets the raw
//! argument words and returns the raw syscall result: the success value
//! or `-errno`. [BLOCKED] means the call should never have happened.

use crate::{
    args,
    broker::{self, Broker, FsOp},
    kernel::{neg, Kernel, BLOCKED, SYS_FSTAT},
    opened_files::OpenedFiles,
    state::FilterState,
    sys::{SocketCall, Sys},
};
use libc::c_int;
use sandfilter_bpf::SyscallArgs;
use std::{fmt, sync::Arc};

/// A trap handler together with the context it was registered with.
#[derive(Clone)]
pub enum Trap {
    /// sched_* calls that name a thread: only the calling thread may be named.
    Sched,
    /// `tkill(tid, sig)` re-issued as `tgkill(getpid(), tid, sig)`.
    TKillCompat,
    /// `PR_SET_NO_NEW_PRIVS` while filters are installed thread by thread.
    SetNoNewPrivs(Arc<FilterState>),
    /// `statfs` emulated with a local read-only open and `fstatfs`.
    StatFs,
    /// Datagram socket pairs are served as sequential packet pairs.
    SocketpairDatagram,
    /// Re-issue a multiplexed `socketcall(2)` as its separate syscall.
    SocketcallUnpack,
    /// `getppid` reports no parent.
    GetPPid,
    /// A brokered filesystem operation.
    Fs(FsOp, Arc<dyn Broker>),
    /// `fstatat`, which has a broker-less special case.
    StatAt(Option<Arc<dyn Broker>>),
    /// `socket` returns one half of a local socket pair.
    FakeSocket { legacy: bool },
    /// `connect` swaps in a socket connected by the broker.
    Connect {
        broker: Arc<dyn Broker>,
        legacy: bool,
    },
    /// `open`/`openat` served from the pre-opened files.
    MediaOpen(Arc<OpenedFiles>),
    /// `stat` served from the pre-opened files.
    MediaStat(Arc<OpenedFiles>),
    /// A fixed, minimal `uname`.
    Uname,
    /// Close-on-exec bookkeeping in a process that can't exec.
    FcntlCloexec,
}

fn same<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

impl PartialEq for Trap {
    fn eq(&self, other: &Self) -> bool {
        use Trap as T;
        match (self, other) {
            (T::SetNoNewPrivs(a), T::SetNoNewPrivs(b)) => same(a, b),
            (T::Fs(op_a, a), T::Fs(op_b, b)) => op_a == op_b && same(a, b),
            (T::StatAt(a), T::StatAt(b)) => match (a, b) {
                (Some(a), Some(b)) => same(a, b),
                (None, None) => true,
                _ => false,
            },
            (T::FakeSocket { legacy: a }, T::FakeSocket { legacy: b }) => a == b,
            (
                T::Connect {
                    broker: a,
                    legacy: la,
                },
                T::Connect {
                    broker: b,
                    legacy: lb,
                },
            ) => la == lb && same(a, b),
            (T::MediaOpen(a), T::MediaOpen(b)) | (T::MediaStat(a), T::MediaStat(b)) => same(a, b),
            (T::Sched, T::Sched)
            | (T::TKillCompat, T::TKillCompat)
            | (T::StatFs, T::StatFs)
            | (T::SocketpairDatagram, T::SocketpairDatagram)
            | (T::SocketcallUnpack, T::SocketcallUnpack)
            | (T::GetPPid, T::GetPPid)
            | (T::Uname, T::Uname)
            | (T::FcntlCloexec, T::FcntlCloexec) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for Trap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fs(op, _) => write!(f, "Fs({op:?})"),
            Self::StatAt(broker) => write!(f, "StatAt(broker={})", broker.is_some()),
            Self::FakeSocket { legacy } => write!(f, "FakeSocket(legacy={legacy})"),
            Self::Connect { legacy, .. } => write!(f, "Connect(legacy={legacy})"),
            other => f.write_str(other.name()),
        }
    }
}

impl fmt::Display for Trap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl Trap {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sched => "Sched",
            Self::TKillCompat => "TKillCompat",
            Self::SetNoNewPrivs(_) => "SetNoNewPrivs",
            Self::StatFs => "StatFs",
            Self::SocketpairDatagram => "SocketpairDatagram",
            Self::SocketcallUnpack => "SocketcallUnpack",
            Self::GetPPid => "GetPPid",
            Self::Fs(..) => "Fs",
            Self::StatAt(_) => "StatAt",
            Self::FakeSocket { .. } => "FakeSocket",
            Self::Connect { .. } => "Connect",
            Self::MediaOpen(_) => "MediaOpen",
            Self::MediaStat(_) => "MediaStat",
            Self::Uname => "Uname",
            Self::FcntlCloexec => "FcntlCloexec",
        }
    }

    /// Run the handler.
    ///
    /// # Safety
    ///
    /// `a` must be the arguments of the trapped syscall, as delivered to
    /// the SIGSYS handler of the faulting thread. Pointer arguments are
    /// dereferenced according to the ABI of `a.nr`.
    pub unsafe fn run(&self, a: &SyscallArgs, kernel: &dyn Kernel) -> isize {
        // SAFETY: Every handler below decodes `a` according to the ABI
        // of the syscall it was registered for.
        unsafe {
            match self {
                Self::Sched => sched(a, kernel),
                Self::TKillCompat => tkill(a, kernel),
                Self::SetNoNewPrivs(state) => {
                    if state.is_installing() {
                        neg(libc::ETXTBSY)
                    } else {
                        BLOCKED
                    }
                }
                Self::StatFs => statfs(a, kernel),
                Self::SocketpairDatagram => socketpair_datagram(a, kernel),
                Self::SocketcallUnpack => socketcall_unpack(a, kernel),
                Self::GetPPid => 0,
                Self::Fs(op, broker) => op.run(a, broker.as_ref()),
                Self::StatAt(broker) => broker::stat_at(a, broker.as_deref(), kernel),
                Self::FakeSocket { legacy } => match inner_args(a, *legacy, 3) {
                    Some(a) => fake_socket(args::int(&a, 0), args::int(&a, 1), args::int(&a, 2), kernel),
                    None => neg(libc::EFAULT),
                },
                Self::Connect { broker, legacy } => match inner_args(a, *legacy, 3) {
                    Some(a) => connect(&a, broker.as_ref(), kernel),
                    None => neg(libc::EFAULT),
                },
                Self::MediaOpen(files) => media_open(a, files, kernel),
                Self::MediaStat(files) => media_stat(a, files, kernel),
                Self::Uname => uname(a),
                Self::FcntlCloexec => fcntl_cloexec(a),
            }
        }
    }
}

/// The socket call arguments, read from the `socketcall(2)` block if `legacy`.
unsafe fn inner_args(a: &SyscallArgs, legacy: bool, count: usize) -> Option<SyscallArgs> {
    if legacy {
        // SAFETY: Forwarded to the caller.
        unsafe { args::socketcall_block(a, count) }
    } else {
        Some(*a)
    }
}

fn sched(a: &SyscallArgs, kernel: &dyn Kernel) -> isize {
    if a.args[0] != kernel.gettid() as u64 {
        return neg(libc::EPERM);
    }
    let mut words = a.args.map(|w| w as usize);
    words[0] = 0;
    // SAFETY: Same syscall and pointers as the trapped call.
    unsafe { kernel.syscall(a.nr, words) }
}

fn tkill(a: &SyscallArgs, kernel: &dyn Kernel) -> isize {
    let pid = kernel.getpid();
    // SAFETY: No pointers.
    unsafe {
        kernel.syscall(
            libc::SYS_tgkill as i64,
            [pid as usize, args::word(a, 0), args::word(a, 1), 0, 0, 0],
        )
    }
}

unsafe fn statfs(a: &SyscallArgs, kernel: &dyn Kernel) -> isize {
    // The kernel ABI differs from the libc one: statfs64 takes the
    // struct size before the buffer.
    // SAFETY: statfs(const char *, ...).
    let Some(path) = (unsafe { args::path(a, 0) }) else {
        return neg(libc::EFAULT);
    };
    let fd = kernel.open(path, libc::O_RDONLY | libc::O_LARGEFILE);
    if fd < 0 {
        return fd;
    }

    let rv = match Sys::from_nr(a.nr) {
        Some(Sys::Statfs) => {
            // SAFETY: The buffer is forwarded unchanged.
            unsafe {
                kernel.syscall(
                    libc::SYS_fstatfs as i64,
                    [fd as usize, args::word(a, 1), 0, 0, 0, 0],
                )
            }
        }
        #[cfg(has_SYS_fstatfs64)]
        Some(Sys::Statfs64) => {
            // SAFETY: Size and buffer are forwarded unchanged.
            unsafe {
                kernel.syscall(
                    libc::SYS_fstatfs64 as i64,
                    [fd as usize, args::word(a, 1), args::word(a, 2), 0, 0, 0],
                )
            }
        }
        _ => BLOCKED,
    };

    kernel.close(fd as c_int);
    rv
}

unsafe fn socketpair_datagram(a: &SyscallArgs, kernel: &dyn Kernel) -> isize {
    // SAFETY: socketpair(int, int, int, int[2]).
    let Some(fds) = (unsafe { args::out::<[c_int; 2]>(a, 3) }) else {
        return neg(libc::EFAULT);
    };
    kernel.socketpair(libc::AF_UNIX, libc::SOCK_SEQPACKET, 0, fds)
}

unsafe fn socketcall_unpack(a: &SyscallArgs, kernel: &dyn Kernel) -> isize {
    let Some(call) = SocketCall::from_code(a.args[0]) else {
        return BLOCKED;
    };
    let Some(nr) = call.separate_nr() else {
        log::error!("socketcall {call:?} has no separate syscall");
        return BLOCKED;
    };
    // send and recv are sendto and recvfrom without the address.
    let count = match call {
        SocketCall::Send | SocketCall::Recv => 4,
        _ => 6,
    };
    // SAFETY: The block holds `count` words for this call.
    let Some(inner) = (unsafe { args::socketcall_block(a, count) }) else {
        return neg(libc::EFAULT);
    };
    // SAFETY: The pointers are the caller's, passed on unchanged.
    unsafe { kernel.syscall(nr, inner.args.map(|w| w as usize)) }
}

fn fake_socket(domain: c_int, ty: c_int, protocol: c_int, kernel: &dyn Kernel) -> isize {
    if domain != libc::AF_UNIX {
        return neg(libc::EAFNOSUPPORT);
    }
    let mut fds = [-1; 2];
    let rv = kernel.socketpair(domain, ty, protocol, &mut fds);
    if rv < 0 {
        return rv;
    }
    kernel.close(fds[1]);
    fds[0] as isize
}

/// Replace the socket `fd` by one the broker connected.
///
/// This also works for re-connecting a real socket. Duplicates of the old
/// descriptor keep referring to the old socket.
unsafe fn connect(a: &SyscallArgs, broker: &dyn Broker, kernel: &dyn Kernel) -> isize {
    let fd = args::int(a, 0);
    if fd < 0 {
        return neg(libc::EBADF);
    }
    match kernel.getsockopt_int(fd, libc::SO_DOMAIN) {
        Ok(libc::AF_UNIX) => (),
        Ok(_) => return neg(libc::EAFNOSUPPORT),
        Err(rv) => return rv,
    }
    let ty = match kernel.getsockopt_int(fd, libc::SO_TYPE) {
        Ok(ty) => ty,
        Err(rv) => return rv,
    };
    let old_flags = kernel.fcntl(fd, libc::F_GETFL, 0);
    if old_flags < 0 {
        return old_flags;
    }

    // SAFETY: connect(int, const struct sockaddr *, socklen_t).
    let Some(addr) = (unsafe { args::bytes(a, 1, args::word(a, 2)) }) else {
        return neg(libc::EFAULT);
    };
    let new_fd = broker.connect(addr, ty);
    if new_fd < 0 {
        return new_fd;
    }
    let new_fd = new_fd as c_int;

    // Only O_NONBLOCK matters for a unix socket.
    let rv = kernel.fcntl(new_fd, libc::F_SETFL, old_flags as c_int & libc::O_NONBLOCK);
    if rv < 0 {
        kernel.close(new_fd);
        return rv;
    }
    let rv = kernel.dup2(new_fd, fd);
    kernel.close(new_fd);
    if rv < 0 {
        return rv;
    }
    0
}

unsafe fn media_open(a: &SyscallArgs, files: &OpenedFiles, kernel: &dyn Kernel) -> isize {
    let (path_index, flags_index) = match Sys::from_nr(a.nr) {
        Some(Sys::Open) => (0, 1),
        Some(Sys::Openat) => (1, 2),
        _ => return BLOCKED,
    };
    // SAFETY: open(const char *, int) and openat(int, const char *, int).
    let Some(path) = (unsafe { args::path(a, path_index) }) else {
        return neg(libc::EFAULT);
    };
    let flags = args::int(a, flags_index);
    if flags & libc::O_ACCMODE != libc::O_RDONLY {
        log::error!(
            "non-read-only open of file {} attempted (flags=0{flags:o})",
            path.to_string_lossy()
        );
        return neg(libc::EROFS);
    }
    files.take(path, kernel)
}

unsafe fn media_stat(a: &SyscallArgs, files: &OpenedFiles, kernel: &dyn Kernel) -> isize {
    // SAFETY: stat(const char *, struct stat *).
    let Some(path) = (unsafe { args::path(a, 0) }) else {
        return neg(libc::EFAULT);
    };
    let Some(fd) = files.peek(path) else {
        return neg(libc::ENOENT);
    };
    // SAFETY: The stat buffer is forwarded unchanged.
    unsafe { kernel.syscall(SYS_FSTAT, [fd as usize, args::word(a, 1), 0, 0, 0, 0]) }
}

fn copy_field(field: &mut [libc::c_char], value: &[u8]) {
    for (dst, src) in field.iter_mut().zip(value) {
        *dst = *src as libc::c_char;
    }
}

unsafe fn uname(a: &SyscallArgs) -> isize {
    // SAFETY: uname(struct utsname *).
    let Some(buf) = (unsafe { args::out::<libc::utsname>(a, 0) }) else {
        return neg(libc::EFAULT);
    };
    // SAFETY: utsname is plain character arrays.
    *buf = unsafe { std::mem::zeroed() };
    copy_field(&mut buf.sysname, b"Linux");
    copy_field(&mut buf.version, b"3");
    0
}

fn fcntl_cloexec(a: &SyscallArgs) -> isize {
    match args::int(a, 1) {
        libc::F_GETFD => libc::FD_CLOEXEC as isize,
        libc::F_SETFD => 0,
        _ => neg(libc::ENOSYS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::Linux;
    use std::ffi::CStr;

    fn run(trap: &Trap, nr: i64, a: [u64; 6]) -> isize {
        unsafe { trap.run(&SyscallArgs::new(nr, a), &Linux) }
    }

    #[test]
    fn test_trap_eq() {
        let s1 = Arc::new(FilterState::new());
        let s2 = Arc::new(FilterState::new());
        assert_eq!(Trap::SetNoNewPrivs(s1.clone()), Trap::SetNoNewPrivs(s1));
        assert_ne!(Trap::SetNoNewPrivs(s2), Trap::Sched);
        assert_eq!(
            Trap::FakeSocket { legacy: false },
            Trap::FakeSocket { legacy: false }
        );
        assert_ne!(
            Trap::FakeSocket { legacy: false },
            Trap::FakeSocket { legacy: true }
        );
        assert_eq!(Trap::StatAt(None), Trap::StatAt(None));
    }

    #[test]
    fn test_set_no_new_privs() {
        let state = Arc::new(FilterState::new());
        let trap = Trap::SetNoNewPrivs(state.clone());
        assert_eq!(run(&trap, 0, [0; 6]), BLOCKED);
        state.set_installing(true);
        assert_eq!(run(&trap, 0, [0; 6]), neg(libc::ETXTBSY));
    }

    #[test]
    fn test_fcntl_cloexec() {
        let get = [0, libc::F_GETFD as u64, 0, 0, 0, 0];
        let set = [0, libc::F_SETFD as u64, 0, 0, 0, 0];
        let other = [0, libc::F_SETFL as u64, 0, 0, 0, 0];
        assert_eq!(run(&Trap::FcntlCloexec, 0, get), libc::FD_CLOEXEC as isize);
        assert_eq!(run(&Trap::FcntlCloexec, 0, set), 0);
        assert_eq!(run(&Trap::FcntlCloexec, 0, other), neg(libc::ENOSYS));
    }

    #[test]
    fn test_uname() {
        let mut buf: libc::utsname = unsafe { std::mem::zeroed() };
        buf.nodename[0] = b'x' as libc::c_char;
        let ptr = &mut buf as *mut libc::utsname as u64;
        assert_eq!(run(&Trap::Uname, 0, [ptr, 0, 0, 0, 0, 0]), 0);
        let sysname = unsafe { CStr::from_ptr(buf.sysname.as_ptr()) };
        let version = unsafe { CStr::from_ptr(buf.version.as_ptr()) };
        assert_eq!(sysname, c"Linux");
        assert_eq!(version, c"3");
        assert_eq!(buf.nodename[0], 0);
    }

    #[test]
    fn test_fake_socket() {
        let inet = [libc::AF_INET as u64, libc::SOCK_STREAM as u64, 0, 0, 0, 0];
        let trap = Trap::FakeSocket { legacy: false };
        assert_eq!(run(&trap, 0, inet), neg(libc::EAFNOSUPPORT));

        let unix = [libc::AF_UNIX as u64, libc::SOCK_STREAM as u64, 0, 0, 0, 0];
        let fd = run(&trap, 0, unix);
        assert!(fd >= 0);
        assert_eq!(
            Linux.getsockopt_int(fd as c_int, libc::SO_DOMAIN),
            Ok(libc::AF_UNIX)
        );
        Linux.close(fd as c_int);

        let block: [libc::c_ulong; 3] = [libc::AF_UNIX as _, libc::SOCK_SEQPACKET as _, 0];
        let legacy = Trap::FakeSocket { legacy: true };
        let fd = run(&legacy, 0, [1, block.as_ptr() as u64, 0, 0, 0, 0]);
        assert!(fd >= 0);
        assert_eq!(
            Linux.getsockopt_int(fd as c_int, libc::SO_TYPE),
            Ok(libc::SOCK_SEQPACKET)
        );
        Linux.close(fd as c_int);
    }

    #[test]
    fn test_socketpair_datagram() {
        let mut fds: [c_int; 2] = [-1; 2];
        let ptr = fds.as_mut_ptr() as u64;
        let a = [libc::AF_UNIX as u64, libc::SOCK_DGRAM as u64, 0, ptr, 0, 0];
        assert_eq!(run(&Trap::SocketpairDatagram, 0, a), 0);
        assert_eq!(
            Linux.getsockopt_int(fds[0], libc::SO_TYPE),
            Ok(libc::SOCK_SEQPACKET)
        );
        Linux.close(fds[0]);
        Linux.close(fds[1]);
    }

    #[test]
    fn test_statfs() {
        let dir = tempfile::tempdir().unwrap();
        let path = std::ffi::CString::new(dir.path().to_str().unwrap()).unwrap();
        let mut buf: libc::statfs = unsafe { std::mem::zeroed() };
        let a = [
            path.as_ptr() as u64,
            &mut buf as *mut libc::statfs as u64,
            0,
            0,
            0,
            0,
        ];
        assert_eq!(run(&Trap::StatFs, libc::SYS_statfs as i64, a), 0);
        assert!(buf.f_bsize > 0);

        let missing = c"/nonexistent/sandfilter";
        let a = [missing.as_ptr() as u64, 0, 0, 0, 0, 0];
        assert_eq!(
            run(&Trap::StatFs, libc::SYS_statfs as i64, a),
            neg(libc::ENOENT)
        );
    }

    #[test]
    fn test_sched_other_thread() {
        let a = [1, 0, 0, 0, 0, 0];
        assert_eq!(
            run(&Trap::Sched, libc::SYS_sched_getscheduler as i64, a),
            neg(libc::EPERM)
        );
        let me = Linux.gettid() as u64;
        let rv = run(
            &Trap::Sched,
            libc::SYS_sched_getscheduler as i64,
            [me, 0, 0, 0, 0, 0],
        );
        assert!(rv >= 0);

        // The whole word names the thread, not just its low half.
        let high = (1_u64 << 32) | me;
        assert_eq!(
            run(
                &Trap::Sched,
                libc::SYS_sched_getscheduler as i64,
                [high, 0, 0, 0, 0, 0],
            ),
            neg(libc::EPERM)
        );
    }
}

// vim: ts=4 sw=4 expandtab
