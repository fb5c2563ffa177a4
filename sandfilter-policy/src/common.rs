// -*- coding: utf-8 -*-
//
// Copyright (C) 2024 Michael Büsch <m@bues.ch>
//
// Licensed under the Apache License version 2.0
// or the MIT license, at your option.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The baseline policy every sandboxed process shares.

use crate::{
    broker::{Broker, FsOp},
    policy::{Policy, Rule},
    state::{FilterState, SandboxInfo},
    sys::{IpcCall, SocketCall, Sys},
    traps::Trap,
};
use libc::c_int;
use sandfilter_bpf::{all_of, any_of, switch, when, Arg, Cond, Switch};
use std::sync::Arc;

/// `O_LARGEFILE` as the kernel sees it. libc defines it as 0 on 64 bit.
#[cfg(any(target_arch = "arm", target_arch = "aarch64"))]
pub(crate) const O_LARGEFILE_REAL: c_int = 0o400000;
#[cfg(not(any(target_arch = "arm", target_arch = "aarch64")))]
pub(crate) const O_LARGEFILE_REAL: c_int = 0o100000;

/// Internal file mode bit that `F_GETFL` may report.
const FMODE_NONOTIFY: c_int = 0x0400_0000;

const MAP_HUGE_MASK: c_int = 0x3f;
const MAP_HUGE_SHIFT: c_int = 26;
const MFD_HUGETLB: c_int = 0x4;

pub(crate) const MADV_GUARD_INSTALL: c_int = 102;
pub(crate) const MADV_GUARD_REMOVE: c_int = 103;

pub(crate) const PR_SET_VMA: c_int = 0x5356_4d41;
pub(crate) const PR_SET_VMA_ANON_NAME: c_int = 0;

const CLONE_DETACHED: c_int = 0x0040_0000;
const CLONE_THREAD_FLAGS: c_int = libc::CLONE_VM
    | libc::CLONE_FS
    | libc::CLONE_FILES
    | libc::CLONE_SIGHAND
    | libc::CLONE_THREAD
    | libc::CLONE_SYSVSEM
    | libc::CLONE_SETTLS
    | libc::CLONE_PARENT_SETTID
    | libc::CLONE_CHILD_CLEARTID;

#[cfg(target_pointer_width = "32")]
pub(crate) const F_SETLK64: c_int = 13;
#[cfg(target_pointer_width = "32")]
pub(crate) const F_SETLKW64: c_int = 14;

/// File locking `fcntl` commands of the target.
pub(crate) fn fcntl_lock_cmds() -> Vec<c_int> {
    let mut cmds = vec![libc::F_SETLK, libc::F_SETLKW];
    #[cfg(target_pointer_width = "32")]
    cmds.extend([F_SETLK64, F_SETLKW64]);
    cmds
}

/// The ioctl type byte.
pub(crate) const IOCTL_TYPE_MASK: u32 = 0xff00;
pub(crate) const TTY_IOCTLS: u32 = 0x5400;

pub(crate) const fn ioctl_type(c: u8) -> u32 {
    (c as u32) << 8
}

const KCMP_FILE: c_int = 0;

const CLOCKS: [libc::clockid_t; 8] = [
    libc::CLOCK_MONOTONIC,
    libc::CLOCK_MONOTONIC_COARSE,
    libc::CLOCK_MONOTONIC_RAW,
    libc::CLOCK_PROCESS_CPUTIME_ID,
    libc::CLOCK_REALTIME,
    libc::CLOCK_REALTIME_COARSE,
    libc::CLOCK_THREAD_CPUTIME_ID,
    libc::CLOCK_BOOTTIME,
];

const MADVISE_HINTS: [c_int; 6] = [
    libc::MADV_DONTNEED,
    libc::MADV_FREE,
    MADV_GUARD_INSTALL,
    MADV_GUARD_REMOVE,
    libc::MADV_HUGEPAGE,
    libc::MADV_NOHUGEPAGE,
];

/// Message flags IPC and the sandbox itself need, plus a few harmless ones.
const MSG_FLAGS_ALLOWED: c_int = libc::MSG_DONTWAIT
    | libc::MSG_NOSIGNAL
    | libc::MSG_CMSG_CLOEXEC
    | libc::MSG_PEEK
    | libc::MSG_WAITALL
    | libc::MSG_TRUNC;

/// State and rules shared by all process types.
///
/// The rule methods take the outermost policy as `outer`, so that the
/// overridable parts ([Policy::prctl_policy], [Policy::clone_policy],
/// the socket and IPC callbacks) resolve to the process type's version.
#[derive(Clone)]
pub struct Common {
    broker: Option<Arc<dyn Broker>>,
    may_create_shmem: bool,
    allow_unsafe_socketpair: bool,
    brokered_connect: bool,
    info: SandboxInfo,
    filter_state: Arc<FilterState>,
    pid: i32,
}

impl std::fmt::Debug for Common {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Common")
            .field("broker", &self.broker.is_some())
            .field("may_create_shmem", &self.may_create_shmem)
            .field("allow_unsafe_socketpair", &self.allow_unsafe_socketpair)
            .field("brokered_connect", &self.brokered_connect)
            .field("info", &self.info)
            .field("pid", &self.pid)
            .finish()
    }
}

impl Common {
    pub fn new(
        broker: Option<Arc<dyn Broker>>,
        info: SandboxInfo,
        filter_state: Arc<FilterState>,
    ) -> Self {
        Self {
            broker,
            may_create_shmem: false,
            allow_unsafe_socketpair: false,
            brokered_connect: false,
            info,
            filter_state,
            pid: nix::unistd::getpid().as_raw(),
        }
    }

    /// Allow `ftruncate` and `fallocate` for creating shared memory.
    pub fn with_shmem(mut self, may_create_shmem: bool) -> Self {
        self.may_create_shmem = may_create_shmem;
        self
    }

    /// Allow `socketpair` even without a broker.
    pub fn with_unsafe_socketpair(mut self, allow: bool) -> Self {
        self.allow_unsafe_socketpair = allow;
        self
    }

    /// Route `socket` and `connect` through the broker. Needs a broker.
    pub fn with_brokered_connect(mut self, brokered: bool) -> Self {
        self.brokered_connect = brokered;
        self
    }

    /// The process id the tgkill and kcmp rules are bound to.
    pub fn with_pid(mut self, pid: i32) -> Self {
        self.pid = pid;
        self
    }

    pub fn broker(&self) -> Option<&Arc<dyn Broker>> {
        self.broker.as_ref()
    }

    pub fn info(&self) -> &SandboxInfo {
        &self.info
    }

    pub fn pid(&self) -> i32 {
        self.pid
    }

    /// Filter the multiplexed call if the kernel lets us re-issue it.
    pub fn unpack_socketcall_or_allow(&self) -> Rule {
        if self.info.has_separate_socketcalls {
            Rule::Trap(Trap::SocketcallUnpack)
        } else {
            Rule::Allow
        }
    }

    /// The rule for a syscall number no policy handles.
    ///
    /// Dispatches the multiplexed `socketcall`/`ipc` and the separate
    /// socket and IPC syscalls to the socket and IPC callbacks.
    pub fn base(&self, outer: &dyn Policy, sys: Sys) -> Rule {
        match sys {
            Sys::Socketcall => {
                let sw: Switch<Trap> = switch(Arg::int(0));
                SocketCall::ALL
                    .into_iter()
                    .fold(sw, |sw, call| match outer.evaluate_socket_call(call, false) {
                        Some(rule) => sw.case(call as u32, rule),
                        None => sw,
                    })
                    .default(outer.invalid_syscall())
            }
            Sys::Ipc => {
                let sw: Switch<Trap> = switch(Arg::int(0).masked(0xffff_u32));
                IpcCall::ALL
                    .into_iter()
                    .fold(sw, |sw, call| match outer.evaluate_ipc_call(call, 1) {
                        Some(rule) => sw.case(call as u32, rule),
                        None => sw,
                    })
                    .default(outer.invalid_syscall())
            }
            sys => {
                if let Some(call) = sys.socket_call() {
                    outer
                        .evaluate_socket_call(call, true)
                        .unwrap_or_else(|| outer.invalid_syscall())
                } else if let Some(call) = sys.ipc_call() {
                    outer
                        .evaluate_ipc_call(call, 0)
                        .unwrap_or_else(|| outer.invalid_syscall())
                } else {
                    outer.invalid_syscall()
                }
            }
        }
    }

    fn brokered(&self, sys: Sys) -> Option<Rule> {
        match &self.broker {
            Some(broker) => {
                if let Some(op) = FsOp::for_sys(sys) {
                    return Some(Rule::Trap(Trap::Fs(op, Arc::clone(broker))));
                }
                match sys {
                    Sys::Fstatat => Some(Rule::Trap(Trap::StatAt(Some(Arc::clone(broker))))),
                    // No broker support; claim it doesn't exist.
                    Sys::Statx => Some(Rule::Error(libc::ENOSYS)),
                    _ => None,
                }
            }
            // fstatat(fd, "", AT_EMPTY_PATH) still works without a broker.
            None => match sys {
                Sys::Statx => Some(Rule::Error(libc::ENOSYS)),
                Sys::Fstatat => Some(Rule::Trap(Trap::StatAt(None))),
                _ => None,
            },
        }
    }

    pub fn evaluate_syscall(&self, outer: &dyn Policy, nr: i64) -> Rule {
        match Sys::from_nr(nr) {
            Some(sys) => self.evaluate_sys(outer, sys),
            None => outer.invalid_syscall(),
        }
    }

    pub fn evaluate_sys(&self, outer: &dyn Policy, sys: Sys) -> Rule {
        if let Some(rule) = self.brokered(sys) {
            return rule;
        }

        match sys {
            Sys::Gettimeofday | Sys::Time | Sys::Nanosleep => Rule::Allow,

            // A clock id can also name another process' CPU clock.
            Sys::ClockGettime | Sys::ClockGetres | Sys::ClockNanosleep => switch(Arg::int(0))
                .cases(&CLOCKS, Rule::Allow)
                .default(outer.invalid_syscall()),

            Sys::Futex => Rule::Allow,
            Sys::EpollCreate | Sys::EpollWait | Sys::EpollCtl | Sys::Poll => Rule::Allow,
            Sys::Pipe | Sys::Pipe2 => Rule::Allow,
            Sys::Fstat => Rule::Allow,

            Sys::Fcntl => {
                let ignored = libc::O_ACCMODE | O_LARGEFILE_REAL | libc::O_CLOEXEC | FMODE_NONOTIFY;
                let allowed = ignored | libc::O_APPEND | libc::O_NONBLOCK;
                let flags = Arg::int(2);
                switch(Arg::int(1))
                    .case(libc::F_GETFD, Rule::Allow)
                    .case(
                        libc::F_SETFD,
                        when(flags.only(libc::FD_CLOEXEC), Rule::Allow)
                            .otherwise(outer.invalid_syscall()),
                    )
                    .case(libc::F_GETFL, Rule::Allow)
                    // O_ASYNC in particular stays forbidden.
                    .case(
                        libc::F_SETFL,
                        when(flags.only(allowed), Rule::Allow).otherwise(outer.invalid_syscall()),
                    )
                    .case(libc::F_DUPFD_CLOEXEC, Rule::Allow)
                    .default(self.base(outer, sys))
            }

            Sys::Pread64 | Sys::Write | Sys::Read | Sys::Readv | Sys::Writev | Sys::Lseek => {
                Rule::Allow
            }
            Sys::Getdents => Rule::Allow,

            Sys::Ftruncate | Sys::Fallocate => {
                if self.may_create_shmem {
                    Rule::Allow
                } else {
                    outer.invalid_syscall()
                }
            }

            Sys::Dup => Rule::Allow,

            // ENOSYS is what a kernel without hugetlbfs says.
            Sys::Mmap => when(
                Arg::int(3).any_set(libc::MAP_HUGETLB | (MAP_HUGE_MASK << MAP_HUGE_SHIFT)),
                Rule::Error(libc::ENOSYS),
            )
            .otherwise(Rule::Allow),
            Sys::Munmap => Rule::Allow,

            Sys::MemfdCreate => when(
                Arg::int(1).any_set(MFD_HUGETLB | (MAP_HUGE_MASK << MAP_HUGE_SHIFT)),
                Rule::Error(libc::ENOSYS),
            )
            .otherwise(Rule::Allow),

            Sys::Mprotect => Rule::Allow,
            Sys::Brk => Rule::Allow,
            Sys::Mremap => when(Arg::int(3).only(libc::MREMAP_MAYMOVE), Rule::Allow)
                .otherwise(self.base(outer, sys)),

            Sys::Madvise => switch(Arg::int(2))
                .cases(&MADVISE_HINTS, Rule::Allow)
                .case(libc::MADV_MERGEABLE, Rule::Error(libc::EPERM))
                .default(outer.invalid_syscall()),

            Sys::Membarrier => Rule::Allow,

            Sys::Sigaltstack | Sys::Sigreturn | Sys::Sigprocmask | Sys::Sigaction => Rule::Allow,

            // Signals only within the process.
            Sys::Tgkill => {
                when(Arg::int(0).eq(self.pid), Rule::Allow).otherwise(outer.invalid_syscall())
            }
            Sys::Tkill => Rule::Trap(Trap::TKillCompat),

            Sys::SchedYield => Rule::Allow,

            Sys::Clone => outer.clone_policy(outer.invalid_syscall()),
            Sys::Clone3 => Rule::Error(libc::ENOSYS),
            Sys::SetRobustList => Rule::Allow,

            // PR_SET_NO_NEW_PRIVS tells whether a thread already has the
            // filter while it is installed thread by thread. Process types
            // override the prctl policy, never this rule.
            Sys::Prctl => {
                if self.info.has_seccomp_tsync {
                    outer.prctl_policy()
                } else {
                    when(
                        Arg::int(0).eq(libc::PR_SET_NO_NEW_PRIVS),
                        Rule::Trap(Trap::SetNoNewPrivs(Arc::clone(&self.filter_state))),
                    )
                    .otherwise(outer.prctl_policy())
                }
            }

            Sys::Getpriority | Sys::Setpriority => Rule::Error(libc::EACCES),
            Sys::SchedGetaffinity => Rule::Error(libc::ENOSYS),
            Sys::Getcpu => Rule::Allow,
            Sys::Getpid | Sys::Gettid => Rule::Allow,
            Sys::Close => Rule::Allow,
            Sys::RestartSyscall => Rule::Allow,
            Sys::Exit | Sys::ExitGroup => Rule::Allow,
            Sys::Getrandom => Rule::Allow,
            Sys::Getuid | Sys::Getgid | Sys::Geteuid | Sys::Getegid => Rule::Allow,

            // glibc's qsort falls back to assuming enough RAM.
            Sys::Sysinfo => Rule::Error(libc::EPERM),
            Sys::Rseq => Rule::Allow,

            // isatty() is false.
            Sys::Ioctl => {
                let request = Arg::int(1);
                when(
                    any_of([request.eq(libc::TCGETS), request.eq(libc::TIOCGWINSZ)]),
                    Rule::Error(libc::ENOTTY),
                )
                .otherwise(self.base(outer, sys))
            }

            Sys::Dup2 | Sys::Dup3 => {
                if self.brokered_connect {
                    Rule::Allow
                } else {
                    self.base(outer, sys)
                }
            }

            Sys::Statfs | Sys::Statfs64 => Rule::Trap(Trap::StatFs),
            Sys::Getcwd => Rule::Error(libc::ENOENT),

            _ => self.base(outer, sys),
        }
    }

    /// Rule for a send or receive call whose flags are argument `flags_index`.
    pub fn msg_flags_rule(&self, outer: &dyn Policy, has_args: bool, flags_index: u8) -> Rule {
        if has_args {
            when(outer.msg_flags_allowed(Arg::int(flags_index)), Rule::Allow)
                .otherwise(outer.invalid_syscall())
        } else {
            self.unpack_socketcall_or_allow()
        }
    }

    pub fn evaluate_socket_call(
        &self,
        outer: &dyn Policy,
        call: SocketCall,
        has_args: bool,
    ) -> Option<Rule> {
        match call {
            SocketCall::Recvmsg | SocketCall::Sendmsg => {
                Some(self.msg_flags_rule(outer, has_args, 2))
            }
            SocketCall::Recvfrom | SocketCall::Sendto | SocketCall::Recv | SocketCall::Send => {
                Some(self.msg_flags_rule(outer, has_args, 3))
            }
            SocketCall::Socketpair => {
                if self.broker.is_none() && !self.allow_unsafe_socketpair {
                    return None;
                }
                if !has_args {
                    return Some(self.unpack_socketcall_or_allow());
                }
                let ty = Arg::int(1).masked(!(libc::SOCK_CLOEXEC | libc::SOCK_NONBLOCK));
                Some(
                    when(
                        Arg::int(0).eq(libc::AF_UNIX),
                        switch(ty)
                            .case(libc::SOCK_STREAM, Rule::Allow)
                            .case(libc::SOCK_SEQPACKET, Rule::Allow)
                            .case(libc::SOCK_DGRAM, Rule::Trap(Trap::SocketpairDatagram))
                            .default(outer.invalid_syscall()),
                    )
                    .otherwise(outer.invalid_syscall()),
                )
            }
            SocketCall::Getsockopt => {
                if !has_args {
                    return Some(self.unpack_socketcall_or_allow());
                }
                let optname = Arg::int(2);
                Some(
                    when(
                        all_of([
                            Arg::int(1).eq(libc::SOL_SOCKET),
                            any_of([
                                optname.eq(libc::SO_SNDBUF),
                                optname.eq(libc::SO_DOMAIN),
                                optname.eq(libc::SO_TYPE),
                            ]),
                        ]),
                        Rule::Allow,
                    )
                    .otherwise(outer.invalid_syscall()),
                )
            }
            SocketCall::Socket if self.brokered_connect => {
                self.broker.as_ref().map(|_| {
                    Rule::Trap(Trap::FakeSocket { legacy: !has_args })
                })
            }
            SocketCall::Connect if self.brokered_connect => {
                self.broker.as_ref().map(|broker| {
                    Rule::Trap(Trap::Connect {
                        broker: Arc::clone(broker),
                        legacy: !has_args,
                    })
                })
            }
            _ => None,
        }
    }

    pub fn prctl_policy(&self, outer: &dyn Policy) -> Rule {
        switch(Arg::int(0))
            .case(PR_SET_VMA, self.set_vma_rule(outer))
            .cases(
                &[
                    libc::PR_GET_SECCOMP,
                    libc::PR_SET_NAME,
                    libc::PR_SET_DUMPABLE,
                    libc::PR_SET_PTRACER,
                ],
                Rule::Allow,
            )
            // libcap asks for capabilities.
            .case(libc::PR_CAPBSET_READ, Rule::Error(libc::EINVAL))
            .default(outer.invalid_syscall())
    }

    /// Naming anonymous memory mappings, and no other `PR_SET_VMA` operation.
    pub fn set_vma_rule(&self, outer: &dyn Policy) -> Rule {
        when(Arg::int(1).eq(PR_SET_VMA_ANON_NAME), Rule::Allow).otherwise(outer.invalid_syscall())
    }

    /// Thread creation as `pthread_create` does it, and nothing else.
    pub fn clone_policy(&self, fail: Rule) -> Rule {
        when(
            Arg::int(0).masked(!CLONE_DETACHED).eq(CLONE_THREAD_FLAGS),
            Rule::Allow,
        )
        .otherwise(fail)
    }

    pub fn msg_flags_allowed(&self, flags: Arg) -> Cond {
        flags.only(MSG_FLAGS_ALLOWED)
    }

    /// `kcmp(pid, pid, KCMP_FILE, ...)` on the own process, for Mesa.
    pub fn kcmp_policy(&self, outer: &dyn Policy) -> Rule {
        when(
            all_of([
                Arg::int(0).eq(self.pid),
                Arg::int(1).eq(self.pid),
                Arg::int(2).eq(KCMP_FILE),
            ]),
            Rule::Allow,
        )
        .otherwise(outer.invalid_syscall())
    }

    /// sched_* calls on the current thread: pid 0 passes, own tid is re-issued.
    pub fn sched_self_rule(&self) -> Rule {
        when(Arg::int(0).eq(0_i32), Rule::Allow).otherwise(Rule::Trap(Trap::Sched))
    }

    /// `prlimit64` only as `getrlimit`.
    pub fn prlimit_get_only(&self, outer: &dyn Policy) -> Rule {
        when(
            all_of([Arg::int(0).eq(0_i32), Arg::word(2).eq(0_u64)]),
            Rule::Allow,
        )
        .otherwise(outer.invalid_syscall())
    }
}

/// The common policy on its own.
impl Policy for Common {
    fn evaluate_syscall(&self, nr: i64) -> Rule {
        Common::evaluate_syscall(self, self, nr)
    }

    fn evaluate_socket_call(&self, call: SocketCall, has_args: bool) -> Option<Rule> {
        Common::evaluate_socket_call(self, self, call, has_args)
    }

    fn evaluate_ipc_call(&self, _call: IpcCall, _arg_shift: u8) -> Option<Rule> {
        None
    }

    fn prctl_policy(&self) -> Rule {
        Common::prctl_policy(self, self)
    }

    fn clone_policy(&self, fail: Rule) -> Rule {
        Common::clone_policy(self, fail)
    }

    fn msg_flags_allowed(&self, flags: Arg) -> Cond {
        Common::msg_flags_allowed(self, flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sandfilter_bpf::{SyscallArgs, Verdict};

    fn common() -> Common {
        Common::new(None, SandboxInfo::default(), Arc::new(FilterState::new()))
    }

    fn resolve(c: &Common, nr: libc::c_long, a: [u64; 6]) -> Verdict<'static, ()> {
        let rule = Policy::evaluate_syscall(c, nr.into());
        match rule.resolve(&SyscallArgs::new(nr.into(), a)) {
            Verdict::Allow => Verdict::Allow,
            Verdict::Error(e) => Verdict::Error(e),
            Verdict::Block => Verdict::Block,
            Verdict::Trap(_) => Verdict::Trap(&()),
        }
    }

    #[test]
    fn test_madvise() {
        let c = common();
        for advice in MADVISE_HINTS {
            let a = [0, 0, advice as u64, 0, 0, 0];
            assert_eq!(resolve(&c, libc::SYS_madvise, a), Verdict::Allow);
        }
        let a = [0, 0, libc::MADV_MERGEABLE as u64, 0, 0, 0];
        assert_eq!(resolve(&c, libc::SYS_madvise, a), Verdict::Error(libc::EPERM));
        let a = [0, 0, libc::MADV_WILLNEED as u64, 0, 0, 0];
        assert_eq!(resolve(&c, libc::SYS_madvise, a), Verdict::Block);
    }

    #[test]
    fn test_clone_flags() {
        let c = common();
        let exact = CLONE_THREAD_FLAGS as u32 as u64;
        let sys = libc::SYS_clone;
        assert_eq!(resolve(&c, sys, [exact, 0, 0, 0, 0, 0]), Verdict::Allow);
        let detached = exact | CLONE_DETACHED as u64;
        assert_eq!(resolve(&c, sys, [detached, 0, 0, 0, 0, 0]), Verdict::Allow);
        let missing = exact & !(libc::CLONE_SYSVSEM as u64);
        assert_eq!(resolve(&c, sys, [missing, 0, 0, 0, 0, 0]), Verdict::Block);
        let extra = exact | libc::CLONE_NEWNS as u64;
        assert_eq!(resolve(&c, sys, [extra, 0, 0, 0, 0, 0]), Verdict::Block);
        // fork style flags
        let fork = libc::SIGCHLD as u64;
        assert_eq!(resolve(&c, sys, [fork, 0, 0, 0, 0, 0]), Verdict::Block);
    }

    #[test]
    fn test_fcntl() {
        let c = common();
        let sys = crate::sys::Sys::from_nr(libc::SYS_fcntl.into());
        #[cfg(not(has_SYS_fcntl64))]
        {
            assert_eq!(sys, Some(Sys::Fcntl));
            let nr = libc::SYS_fcntl;
            let getfd = libc::F_GETFD as u64;
            let setfd = libc::F_SETFD as u64;
            let setfl = libc::F_SETFL as u64;
            assert_eq!(resolve(&c, nr, [0, getfd, 0, 0, 0, 0]), Verdict::Allow);
            let cloexec = libc::FD_CLOEXEC as u64;
            assert_eq!(resolve(&c, nr, [0, setfd, cloexec, 0, 0, 0]), Verdict::Allow);
            assert_eq!(resolve(&c, nr, [0, setfd, 2, 0, 0, 0]), Verdict::Block);
            let nonblock = (libc::O_NONBLOCK | libc::O_RDWR) as u64;
            assert_eq!(resolve(&c, nr, [0, setfl, nonblock, 0, 0, 0]), Verdict::Allow);
            let async_ = libc::O_ASYNC as u64;
            assert_eq!(resolve(&c, nr, [0, setfl, async_, 0, 0, 0]), Verdict::Block);
            let setown = libc::F_SETOWN as u64;
            assert_eq!(resolve(&c, nr, [0, setown, 0, 0, 0, 0]), Verdict::Block);
        }
        #[cfg(has_SYS_fcntl64)]
        let _ = sys;
    }

    #[test]
    fn test_soft_denials() {
        let c = common();
        assert_eq!(
            resolve(&c, libc::SYS_getcwd, [0; 6]),
            Verdict::Error(libc::ENOENT)
        );
        assert_eq!(
            resolve(&c, libc::SYS_sysinfo, [0; 6]),
            Verdict::Error(libc::EPERM)
        );
        assert_eq!(
            resolve(&c, libc::SYS_clone3, [0; 6]),
            Verdict::Error(libc::ENOSYS)
        );
        assert_eq!(
            resolve(&c, libc::SYS_statx, [0; 6]),
            Verdict::Error(libc::ENOSYS)
        );
    }

    #[test]
    fn test_tgkill_own_process() {
        let c = common().with_pid(4242);
        let a = [4242, 1, 15, 0, 0, 0];
        assert_eq!(resolve(&c, libc::SYS_tgkill, a), Verdict::Allow);
        let a = [4243, 1, 15, 0, 0, 0];
        assert_eq!(resolve(&c, libc::SYS_tgkill, a), Verdict::Block);
    }

    #[test]
    fn test_clock_ids() {
        let c = common();
        let nr = libc::SYS_clock_gettime;
        let mono = libc::CLOCK_MONOTONIC as u64;
        assert_eq!(resolve(&c, nr, [mono, 0, 0, 0, 0, 0]), Verdict::Allow);
        // CPU clock of pid 1.
        let other = (!1_i32 << 3) as u32 as u64;
        assert_eq!(resolve(&c, nr, [other, 0, 0, 0, 0, 0]), Verdict::Block);
    }

    #[test]
    fn test_prctl() {
        let c = common();
        let name = libc::PR_SET_NAME as u64;
        assert_eq!(resolve(&c, libc::SYS_prctl, [name, 0, 0, 0, 0, 0]), Verdict::Allow);
        let vma = PR_SET_VMA as u64;
        assert_eq!(resolve(&c, libc::SYS_prctl, [vma, 0, 0, 0, 0, 0]), Verdict::Allow);
        assert_eq!(resolve(&c, libc::SYS_prctl, [vma, 1, 0, 0, 0, 0]), Verdict::Block);
        let capbset = libc::PR_CAPBSET_READ as u64;
        assert_eq!(
            resolve(&c, libc::SYS_prctl, [capbset, 0, 0, 0, 0, 0]),
            Verdict::Error(libc::EINVAL)
        );
        let nnp = libc::PR_SET_NO_NEW_PRIVS as u64;
        assert_eq!(resolve(&c, libc::SYS_prctl, [nnp, 1, 0, 0, 0, 0]), Verdict::Block);

        let no_tsync = Common::new(
            None,
            SandboxInfo {
                has_seccomp_tsync: false,
                ..SandboxInfo::default()
            },
            Arc::new(FilterState::new()),
        );
        assert_eq!(
            resolve(&no_tsync, libc::SYS_prctl, [nnp, 1, 0, 0, 0, 0]),
            Verdict::Trap(&())
        );
    }

    #[test]
    fn test_mmap_hugetlb() {
        let c = common();
        let huge = (libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_HUGETLB) as u64;
        let plain = (libc::MAP_PRIVATE | libc::MAP_ANONYMOUS) as u64;
        #[cfg(not(has_SYS_mmap2))]
        {
            let nr = libc::SYS_mmap;
            assert_eq!(resolve(&c, nr, [0, 0, 0, huge, 0, 0]), Verdict::Error(libc::ENOSYS));
            assert_eq!(resolve(&c, nr, [0, 0, 0, plain, 0, 0]), Verdict::Allow);
        }
        #[cfg(has_SYS_mmap2)]
        let _ = (c, huge, plain);
    }

    #[test]
    fn test_socketpair_needs_broker_or_opt_in() {
        let c = common();
        assert!(Common::evaluate_socket_call(&c, &c, SocketCall::Socketpair, true).is_none());
        let c = common().with_unsafe_socketpair(true);
        let rule = Common::evaluate_socket_call(&c, &c, SocketCall::Socketpair, true).unwrap();
        let dgram = [libc::AF_UNIX as u64, libc::SOCK_DGRAM as u64, 0, 0, 0, 0];
        assert_eq!(
            rule.resolve(&SyscallArgs::new(0, dgram)),
            Verdict::Trap(&Trap::SocketpairDatagram)
        );
        let stream = [
            libc::AF_UNIX as u64,
            (libc::SOCK_STREAM | libc::SOCK_CLOEXEC) as u64,
            0,
            0,
            0,
            0,
        ];
        assert_eq!(rule.resolve(&SyscallArgs::new(0, stream)), Verdict::Allow);
        let inet = [libc::AF_INET as u64, libc::SOCK_STREAM as u64, 0, 0, 0, 0];
        assert_eq!(rule.resolve(&SyscallArgs::new(0, inet)), Verdict::Block);
    }

    #[test]
    fn test_unknown_is_blocked() {
        let c = common();
        assert_eq!(resolve(&c, libc::SYS_ptrace, [0; 6]), Verdict::Block);
        assert_eq!(resolve(&c, libc::SYS_mount, [0; 6]), Verdict::Block);
        assert_eq!(
            Policy::evaluate_syscall(&c, crate::sys::MAX_SYSCALL_NR),
            Rule::Block
        );
    }
}

// vim: ts=4 sw=4 expandtab
