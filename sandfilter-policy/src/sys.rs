// -*- coding: utf-8 -*-
//
// Copyright (C) 2024 Michael Büsch <m@bues.ch>
//
// Licensed under the Apache License version 2.0
// or the MIT license, at your option.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Logical syscall tags.
//!
//! The same operation may have zero, one or several syscall numbers,
//! depending on the architecture and the libc generation. The policies are
//! written against [Sys] and the table below maps the numbers of the build
//! target onto it. Numbers that are not in the table are unknown and denied.

use libc::c_long;

/// Highest syscall number that is evaluated when building a filter.
pub const MAX_SYSCALL_NR: i64 = 1023;

#[cfg(all(
    target_os = "linux",
    any(target_env = "gnu", target_env = "musl"),
    any(
        all(target_arch = "x86_64", target_pointer_width = "64"),
        target_arch = "x86",
        target_arch = "arm",
        target_arch = "aarch64",
        target_arch = "riscv64",
    ),
    not(all(has_SYS_read, has_SYS_openat)),
))]
std::compile_error!("The build script did not emit the syscall table for this target.");

/// A logical system call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Sys {
    // Filesystem, brokered
    Open,
    Access,
    Stat,
    Lstat,
    Chmod,
    Link,
    Mkdir,
    Symlink,
    Rename,
    Rmdir,
    Unlink,
    Readlink,
    Openat,
    Faccessat,
    Faccessat2,
    Fstatat,
    Statx,
    Fchmodat,
    Linkat,
    Mkdirat,
    Symlinkat,
    Renameat,
    Unlinkat,
    Readlinkat,
    // Filesystem, other
    Fstat,
    Statfs,
    Statfs64,
    Fstatfs,
    Getcwd,
    Mknod,
    Mknodat,
    Chown,
    Fchown,
    Fchownat,
    Fchmod,
    Flock,
    Umask,
    Fsync,
    Readahead,
    Fadvise,
    // Time
    Gettimeofday,
    Time,
    Nanosleep,
    ClockGettime,
    ClockGetres,
    ClockNanosleep,
    Times,
    // Synchronization and polling
    Futex,
    EpollCreate,
    EpollWait,
    EpollCtl,
    Poll,
    Select,
    Eventfd2,
    // I/O on descriptors
    Read,
    Write,
    Readv,
    Writev,
    Pread64,
    Pwrite64,
    Lseek,
    Getdents,
    Ftruncate,
    Fallocate,
    Fcntl,
    Ioctl,
    Pipe,
    Pipe2,
    Dup,
    Dup2,
    Dup3,
    Close,
    // Memory
    Mmap,
    Munmap,
    Mprotect,
    Mremap,
    Madvise,
    Mincore,
    Mlock,
    Munlock,
    Msync,
    Brk,
    MemfdCreate,
    Membarrier,
    GetMempolicy,
    SetMempolicy,
    // Signals
    Sigaltstack,
    Sigreturn,
    Sigprocmask,
    Sigaction,
    RtTgsigqueueinfo,
    Tgkill,
    Tkill,
    Kill,
    // Processes and threads
    Clone,
    Clone3,
    Fork,
    Wait4,
    Waitpid,
    Exit,
    ExitGroup,
    RestartSyscall,
    SetRobustList,
    SetThreadArea,
    Rseq,
    Prctl,
    Kcmp,
    Getpid,
    Gettid,
    Getppid,
    Getuid,
    Getgid,
    Geteuid,
    Getegid,
    Getresuid,
    Getresgid,
    Getrlimit,
    Prlimit64,
    Getrusage,
    Getpriority,
    Setpriority,
    Getcpu,
    Getrandom,
    Sysinfo,
    Uname,
    // Scheduler
    SchedYield,
    SchedGetaffinity,
    SchedSetaffinity,
    SchedGetattr,
    SchedSetattr,
    SchedGetparam,
    SchedSetparam,
    SchedGetscheduler,
    SchedSetscheduler,
    SchedGetPriorityMin,
    SchedGetPriorityMax,
    // Sockets
    Socketcall,
    Socket,
    Bind,
    Connect,
    Listen,
    Accept,
    Accept4,
    Getsockname,
    Getpeername,
    Socketpair,
    Send,
    Recv,
    Sendto,
    Recvfrom,
    Shutdown,
    Setsockopt,
    Getsockopt,
    Sendmsg,
    Recvmsg,
    Recvmmsg,
    Sendmmsg,
    // SysV IPC
    Ipc,
    Semop,
    Semget,
    Semctl,
    Semtimedop,
    Msgsnd,
    Msgrcv,
    Msgget,
    Msgctl,
    Shmat,
    Shmdt,
    Shmget,
    Shmctl,
}

impl Sys {
    /// Look up the logical operation of a syscall number of the build target.
    #[rustfmt::skip]
    pub fn from_nr(nr: i64) -> Option<Self> {
        let nr = c_long::try_from(nr).ok()?;
        Some(match nr {
            #[cfg(has_SYS_open)] libc::SYS_open => Self::Open,
            #[cfg(has_SYS_access)] libc::SYS_access => Self::Access,
            #[cfg(has_SYS_stat64)] libc::SYS_stat64 => Self::Stat,
            #[cfg(all(has_SYS_stat, not(has_SYS_stat64)))] libc::SYS_stat => Self::Stat,
            #[cfg(has_SYS_lstat64)] libc::SYS_lstat64 => Self::Lstat,
            #[cfg(all(has_SYS_lstat, not(has_SYS_lstat64)))] libc::SYS_lstat => Self::Lstat,
            #[cfg(has_SYS_chmod)] libc::SYS_chmod => Self::Chmod,
            #[cfg(has_SYS_link)] libc::SYS_link => Self::Link,
            #[cfg(has_SYS_mkdir)] libc::SYS_mkdir => Self::Mkdir,
            #[cfg(has_SYS_symlink)] libc::SYS_symlink => Self::Symlink,
            #[cfg(has_SYS_rename)] libc::SYS_rename => Self::Rename,
            #[cfg(has_SYS_rmdir)] libc::SYS_rmdir => Self::Rmdir,
            #[cfg(has_SYS_unlink)] libc::SYS_unlink => Self::Unlink,
            #[cfg(has_SYS_readlink)] libc::SYS_readlink => Self::Readlink,
            #[cfg(has_SYS_openat)] libc::SYS_openat => Self::Openat,
            #[cfg(has_SYS_faccessat)] libc::SYS_faccessat => Self::Faccessat,
            #[cfg(has_SYS_faccessat2)] libc::SYS_faccessat2 => Self::Faccessat2,
            #[cfg(has_SYS_fstatat64)] libc::SYS_fstatat64 => Self::Fstatat,
            #[cfg(all(has_SYS_newfstatat, not(has_SYS_fstatat64)))] libc::SYS_newfstatat => Self::Fstatat,
            #[cfg(has_SYS_statx)] libc::SYS_statx => Self::Statx,
            #[cfg(has_SYS_fchmodat)] libc::SYS_fchmodat => Self::Fchmodat,
            #[cfg(has_SYS_linkat)] libc::SYS_linkat => Self::Linkat,
            #[cfg(has_SYS_mkdirat)] libc::SYS_mkdirat => Self::Mkdirat,
            #[cfg(has_SYS_symlinkat)] libc::SYS_symlinkat => Self::Symlinkat,
            #[cfg(has_SYS_renameat)] libc::SYS_renameat => Self::Renameat,
            #[cfg(has_SYS_unlinkat)] libc::SYS_unlinkat => Self::Unlinkat,
            #[cfg(has_SYS_readlinkat)] libc::SYS_readlinkat => Self::Readlinkat,

            #[cfg(has_SYS_fstat64)] libc::SYS_fstat64 => Self::Fstat,
            #[cfg(all(has_SYS_fstat, not(has_SYS_fstat64)))] libc::SYS_fstat => Self::Fstat,
            #[cfg(has_SYS_statfs)] libc::SYS_statfs => Self::Statfs,
            #[cfg(has_SYS_statfs64)] libc::SYS_statfs64 => Self::Statfs64,
            #[cfg(has_SYS_fstatfs)] libc::SYS_fstatfs => Self::Fstatfs,
            #[cfg(has_SYS_fstatfs64)] libc::SYS_fstatfs64 => Self::Fstatfs,
            #[cfg(has_SYS_getcwd)] libc::SYS_getcwd => Self::Getcwd,
            #[cfg(has_SYS_mknod)] libc::SYS_mknod => Self::Mknod,
            #[cfg(has_SYS_mknodat)] libc::SYS_mknodat => Self::Mknodat,
            #[cfg(has_SYS_chown)] libc::SYS_chown => Self::Chown,
            #[cfg(has_SYS_fchown32)] libc::SYS_fchown32 => Self::Fchown,
            #[cfg(all(has_SYS_fchown, not(has_SYS_fchown32)))] libc::SYS_fchown => Self::Fchown,
            #[cfg(has_SYS_fchownat)] libc::SYS_fchownat => Self::Fchownat,
            #[cfg(has_SYS_fchmod)] libc::SYS_fchmod => Self::Fchmod,
            #[cfg(has_SYS_flock)] libc::SYS_flock => Self::Flock,
            #[cfg(has_SYS_umask)] libc::SYS_umask => Self::Umask,
            #[cfg(has_SYS_fsync)] libc::SYS_fsync => Self::Fsync,
            #[cfg(has_SYS_readahead)] libc::SYS_readahead => Self::Readahead,
            #[cfg(has_SYS_fadvise64)] libc::SYS_fadvise64 => Self::Fadvise,
            #[cfg(has_SYS_fadvise64_64)] libc::SYS_fadvise64_64 => Self::Fadvise,

            #[cfg(has_SYS_gettimeofday)] libc::SYS_gettimeofday => Self::Gettimeofday,
            #[cfg(has_SYS_time)] libc::SYS_time => Self::Time,
            #[cfg(has_SYS_nanosleep)] libc::SYS_nanosleep => Self::Nanosleep,
            #[cfg(has_SYS_clock_gettime)] libc::SYS_clock_gettime => Self::ClockGettime,
            #[cfg(has_SYS_clock_gettime64)] libc::SYS_clock_gettime64 => Self::ClockGettime,
            #[cfg(has_SYS_clock_getres)] libc::SYS_clock_getres => Self::ClockGetres,
            #[cfg(has_SYS_clock_getres_time64)] libc::SYS_clock_getres_time64 => Self::ClockGetres,
            #[cfg(has_SYS_clock_nanosleep)] libc::SYS_clock_nanosleep => Self::ClockNanosleep,
            #[cfg(has_SYS_clock_nanosleep_time64)] libc::SYS_clock_nanosleep_time64 => Self::ClockNanosleep,
            #[cfg(has_SYS_times)] libc::SYS_times => Self::Times,

            #[cfg(has_SYS_futex)] libc::SYS_futex => Self::Futex,
            #[cfg(has_SYS_futex_time64)] libc::SYS_futex_time64 => Self::Futex,
            #[cfg(has_SYS_epoll_create)] libc::SYS_epoll_create => Self::EpollCreate,
            #[cfg(has_SYS_epoll_create1)] libc::SYS_epoll_create1 => Self::EpollCreate,
            #[cfg(has_SYS_epoll_wait)] libc::SYS_epoll_wait => Self::EpollWait,
            #[cfg(has_SYS_epoll_pwait)] libc::SYS_epoll_pwait => Self::EpollWait,
            #[cfg(has_SYS_epoll_ctl)] libc::SYS_epoll_ctl => Self::EpollCtl,
            #[cfg(has_SYS_poll)] libc::SYS_poll => Self::Poll,
            #[cfg(has_SYS_ppoll)] libc::SYS_ppoll => Self::Poll,
            #[cfg(has_SYS_ppoll_time64)] libc::SYS_ppoll_time64 => Self::Poll,
            #[cfg(has_SYS__newselect)] libc::SYS__newselect => Self::Select,
            #[cfg(all(has_SYS_select, not(has_SYS__newselect)))] libc::SYS_select => Self::Select,
            #[cfg(has_SYS_pselect6)] libc::SYS_pselect6 => Self::Select,
            #[cfg(has_SYS_pselect6_time64)] libc::SYS_pselect6_time64 => Self::Select,
            #[cfg(has_SYS_eventfd2)] libc::SYS_eventfd2 => Self::Eventfd2,

            #[cfg(has_SYS_read)] libc::SYS_read => Self::Read,
            #[cfg(has_SYS_write)] libc::SYS_write => Self::Write,
            #[cfg(has_SYS_readv)] libc::SYS_readv => Self::Readv,
            #[cfg(has_SYS_writev)] libc::SYS_writev => Self::Writev,
            #[cfg(has_SYS_pread64)] libc::SYS_pread64 => Self::Pread64,
            #[cfg(has_SYS_pwrite64)] libc::SYS_pwrite64 => Self::Pwrite64,
            #[cfg(has_SYS_lseek)] libc::SYS_lseek => Self::Lseek,
            #[cfg(has_SYS__llseek)] libc::SYS__llseek => Self::Lseek,
            #[cfg(has_SYS_getdents)] libc::SYS_getdents => Self::Getdents,
            #[cfg(has_SYS_getdents64)] libc::SYS_getdents64 => Self::Getdents,
            #[cfg(has_SYS_ftruncate)] libc::SYS_ftruncate => Self::Ftruncate,
            #[cfg(has_SYS_ftruncate64)] libc::SYS_ftruncate64 => Self::Ftruncate,
            #[cfg(has_SYS_fallocate)] libc::SYS_fallocate => Self::Fallocate,
            #[cfg(has_SYS_fcntl64)] libc::SYS_fcntl64 => Self::Fcntl,
            #[cfg(all(has_SYS_fcntl, not(has_SYS_fcntl64)))] libc::SYS_fcntl => Self::Fcntl,
            #[cfg(has_SYS_ioctl)] libc::SYS_ioctl => Self::Ioctl,
            #[cfg(has_SYS_pipe)] libc::SYS_pipe => Self::Pipe,
            #[cfg(has_SYS_pipe2)] libc::SYS_pipe2 => Self::Pipe2,
            #[cfg(has_SYS_dup)] libc::SYS_dup => Self::Dup,
            #[cfg(has_SYS_dup2)] libc::SYS_dup2 => Self::Dup2,
            #[cfg(has_SYS_dup3)] libc::SYS_dup3 => Self::Dup3,
            #[cfg(has_SYS_close)] libc::SYS_close => Self::Close,

            #[cfg(has_SYS_mmap2)] libc::SYS_mmap2 => Self::Mmap,
            #[cfg(all(has_SYS_mmap, not(has_SYS_mmap2)))] libc::SYS_mmap => Self::Mmap,
            #[cfg(has_SYS_munmap)] libc::SYS_munmap => Self::Munmap,
            #[cfg(has_SYS_mprotect)] libc::SYS_mprotect => Self::Mprotect,
            #[cfg(has_SYS_mremap)] libc::SYS_mremap => Self::Mremap,
            #[cfg(has_SYS_madvise)] libc::SYS_madvise => Self::Madvise,
            #[cfg(has_SYS_mincore)] libc::SYS_mincore => Self::Mincore,
            #[cfg(has_SYS_mlock)] libc::SYS_mlock => Self::Mlock,
            #[cfg(has_SYS_munlock)] libc::SYS_munlock => Self::Munlock,
            #[cfg(has_SYS_msync)] libc::SYS_msync => Self::Msync,
            #[cfg(has_SYS_brk)] libc::SYS_brk => Self::Brk,
            #[cfg(has_SYS_memfd_create)] libc::SYS_memfd_create => Self::MemfdCreate,
            #[cfg(has_SYS_membarrier)] libc::SYS_membarrier => Self::Membarrier,
            #[cfg(has_SYS_get_mempolicy)] libc::SYS_get_mempolicy => Self::GetMempolicy,
            #[cfg(has_SYS_set_mempolicy)] libc::SYS_set_mempolicy => Self::SetMempolicy,

            #[cfg(has_SYS_sigaltstack)] libc::SYS_sigaltstack => Self::Sigaltstack,
            #[cfg(has_SYS_rt_sigreturn)] libc::SYS_rt_sigreturn => Self::Sigreturn,
            #[cfg(has_SYS_sigreturn)] libc::SYS_sigreturn => Self::Sigreturn,
            #[cfg(has_SYS_rt_sigprocmask)] libc::SYS_rt_sigprocmask => Self::Sigprocmask,
            #[cfg(has_SYS_sigprocmask)] libc::SYS_sigprocmask => Self::Sigprocmask,
            #[cfg(has_SYS_rt_sigaction)] libc::SYS_rt_sigaction => Self::Sigaction,
            #[cfg(has_SYS_sigaction)] libc::SYS_sigaction => Self::Sigaction,
            #[cfg(has_SYS_rt_tgsigqueueinfo)] libc::SYS_rt_tgsigqueueinfo => Self::RtTgsigqueueinfo,
            #[cfg(has_SYS_tgkill)] libc::SYS_tgkill => Self::Tgkill,
            #[cfg(has_SYS_tkill)] libc::SYS_tkill => Self::Tkill,
            #[cfg(has_SYS_kill)] libc::SYS_kill => Self::Kill,

            #[cfg(has_SYS_clone)] libc::SYS_clone => Self::Clone,
            #[cfg(has_SYS_clone3)] libc::SYS_clone3 => Self::Clone3,
            #[cfg(has_SYS_fork)] libc::SYS_fork => Self::Fork,
            #[cfg(has_SYS_wait4)] libc::SYS_wait4 => Self::Wait4,
            #[cfg(has_SYS_waitpid)] libc::SYS_waitpid => Self::Waitpid,
            #[cfg(has_SYS_exit)] libc::SYS_exit => Self::Exit,
            #[cfg(has_SYS_exit_group)] libc::SYS_exit_group => Self::ExitGroup,
            #[cfg(has_SYS_restart_syscall)] libc::SYS_restart_syscall => Self::RestartSyscall,
            #[cfg(has_SYS_set_robust_list)] libc::SYS_set_robust_list => Self::SetRobustList,
            #[cfg(has_SYS_set_thread_area)] libc::SYS_set_thread_area => Self::SetThreadArea,
            #[cfg(has_SYS_rseq)] libc::SYS_rseq => Self::Rseq,
            #[cfg(has_SYS_prctl)] libc::SYS_prctl => Self::Prctl,
            #[cfg(has_SYS_kcmp)] libc::SYS_kcmp => Self::Kcmp,
            #[cfg(has_SYS_getpid)] libc::SYS_getpid => Self::Getpid,
            #[cfg(has_SYS_gettid)] libc::SYS_gettid => Self::Gettid,
            #[cfg(has_SYS_getppid)] libc::SYS_getppid => Self::Getppid,
            #[cfg(has_SYS_getuid32)] libc::SYS_getuid32 => Self::Getuid,
            #[cfg(all(has_SYS_getuid, not(has_SYS_getuid32)))] libc::SYS_getuid => Self::Getuid,
            #[cfg(has_SYS_getgid32)] libc::SYS_getgid32 => Self::Getgid,
            #[cfg(all(has_SYS_getgid, not(has_SYS_getgid32)))] libc::SYS_getgid => Self::Getgid,
            #[cfg(has_SYS_geteuid32)] libc::SYS_geteuid32 => Self::Geteuid,
            #[cfg(all(has_SYS_geteuid, not(has_SYS_geteuid32)))] libc::SYS_geteuid => Self::Geteuid,
            #[cfg(has_SYS_getegid32)] libc::SYS_getegid32 => Self::Getegid,
            #[cfg(all(has_SYS_getegid, not(has_SYS_getegid32)))] libc::SYS_getegid => Self::Getegid,
            #[cfg(has_SYS_getresuid32)] libc::SYS_getresuid32 => Self::Getresuid,
            #[cfg(all(has_SYS_getresuid, not(has_SYS_getresuid32)))] libc::SYS_getresuid => Self::Getresuid,
            #[cfg(has_SYS_getresgid32)] libc::SYS_getresgid32 => Self::Getresgid,
            #[cfg(all(has_SYS_getresgid, not(has_SYS_getresgid32)))] libc::SYS_getresgid => Self::Getresgid,
            #[cfg(has_SYS_ugetrlimit)] libc::SYS_ugetrlimit => Self::Getrlimit,
            #[cfg(all(has_SYS_getrlimit, not(has_SYS_ugetrlimit)))] libc::SYS_getrlimit => Self::Getrlimit,
            #[cfg(has_SYS_prlimit64)] libc::SYS_prlimit64 => Self::Prlimit64,
            #[cfg(has_SYS_getrusage)] libc::SYS_getrusage => Self::Getrusage,
            #[cfg(has_SYS_getpriority)] libc::SYS_getpriority => Self::Getpriority,
            #[cfg(has_SYS_setpriority)] libc::SYS_setpriority => Self::Setpriority,
            #[cfg(has_SYS_getcpu)] libc::SYS_getcpu => Self::Getcpu,
            #[cfg(has_SYS_getrandom)] libc::SYS_getrandom => Self::Getrandom,
            #[cfg(has_SYS_sysinfo)] libc::SYS_sysinfo => Self::Sysinfo,
            #[cfg(has_SYS_uname)] libc::SYS_uname => Self::Uname,

            #[cfg(has_SYS_sched_yield)] libc::SYS_sched_yield => Self::SchedYield,
            #[cfg(has_SYS_sched_getaffinity)] libc::SYS_sched_getaffinity => Self::SchedGetaffinity,
            #[cfg(has_SYS_sched_setaffinity)] libc::SYS_sched_setaffinity => Self::SchedSetaffinity,
            #[cfg(has_SYS_sched_getattr)] libc::SYS_sched_getattr => Self::SchedGetattr,
            #[cfg(has_SYS_sched_setattr)] libc::SYS_sched_setattr => Self::SchedSetattr,
            #[cfg(has_SYS_sched_getparam)] libc::SYS_sched_getparam => Self::SchedGetparam,
            #[cfg(has_SYS_sched_setparam)] libc::SYS_sched_setparam => Self::SchedSetparam,
            #[cfg(has_SYS_sched_getscheduler)] libc::SYS_sched_getscheduler => Self::SchedGetscheduler,
            #[cfg(has_SYS_sched_setscheduler)] libc::SYS_sched_setscheduler => Self::SchedSetscheduler,
            #[cfg(has_SYS_sched_get_priority_min)] libc::SYS_sched_get_priority_min => Self::SchedGetPriorityMin,
            #[cfg(has_SYS_sched_get_priority_max)] libc::SYS_sched_get_priority_max => Self::SchedGetPriorityMax,

            #[cfg(has_SYS_socketcall)] libc::SYS_socketcall => Self::Socketcall,
            #[cfg(has_SYS_socket)] libc::SYS_socket => Self::Socket,
            #[cfg(has_SYS_bind)] libc::SYS_bind => Self::Bind,
            #[cfg(has_SYS_connect)] libc::SYS_connect => Self::Connect,
            #[cfg(has_SYS_listen)] libc::SYS_listen => Self::Listen,
            #[cfg(has_SYS_accept)] libc::SYS_accept => Self::Accept,
            #[cfg(has_SYS_accept4)] libc::SYS_accept4 => Self::Accept4,
            #[cfg(has_SYS_getsockname)] libc::SYS_getsockname => Self::Getsockname,
            #[cfg(has_SYS_getpeername)] libc::SYS_getpeername => Self::Getpeername,
            #[cfg(has_SYS_socketpair)] libc::SYS_socketpair => Self::Socketpair,
            #[cfg(has_SYS_send)] libc::SYS_send => Self::Send,
            #[cfg(has_SYS_recv)] libc::SYS_recv => Self::Recv,
            #[cfg(has_SYS_sendto)] libc::SYS_sendto => Self::Sendto,
            #[cfg(has_SYS_recvfrom)] libc::SYS_recvfrom => Self::Recvfrom,
            #[cfg(has_SYS_shutdown)] libc::SYS_shutdown => Self::Shutdown,
            #[cfg(has_SYS_setsockopt)] libc::SYS_setsockopt => Self::Setsockopt,
            #[cfg(has_SYS_getsockopt)] libc::SYS_getsockopt => Self::Getsockopt,
            #[cfg(has_SYS_sendmsg)] libc::SYS_sendmsg => Self::Sendmsg,
            #[cfg(has_SYS_recvmsg)] libc::SYS_recvmsg => Self::Recvmsg,
            #[cfg(has_SYS_recvmmsg)] libc::SYS_recvmmsg => Self::Recvmmsg,
            #[cfg(has_SYS_recvmmsg_time64)] libc::SYS_recvmmsg_time64 => Self::Recvmmsg,
            #[cfg(has_SYS_sendmmsg)] libc::SYS_sendmmsg => Self::Sendmmsg,

            #[cfg(has_SYS_ipc)] libc::SYS_ipc => Self::Ipc,
            #[cfg(has_SYS_semop)] libc::SYS_semop => Self::Semop,
            #[cfg(has_SYS_semget)] libc::SYS_semget => Self::Semget,
            #[cfg(has_SYS_semctl)] libc::SYS_semctl => Self::Semctl,
            #[cfg(has_SYS_semtimedop)] libc::SYS_semtimedop => Self::Semtimedop,
            #[cfg(has_SYS_msgsnd)] libc::SYS_msgsnd => Self::Msgsnd,
            #[cfg(has_SYS_msgrcv)] libc::SYS_msgrcv => Self::Msgrcv,
            #[cfg(has_SYS_msgget)] libc::SYS_msgget => Self::Msgget,
            #[cfg(has_SYS_msgctl)] libc::SYS_msgctl => Self::Msgctl,
            #[cfg(has_SYS_shmat)] libc::SYS_shmat => Self::Shmat,
            #[cfg(has_SYS_shmdt)] libc::SYS_shmdt => Self::Shmdt,
            #[cfg(has_SYS_shmget)] libc::SYS_shmget => Self::Shmget,
            #[cfg(has_SYS_shmctl)] libc::SYS_shmctl => Self::Shmctl,

            _ => return None,
        })
    }

    /// The socket operation of a separate socket syscall.
    pub fn socket_call(self) -> Option<SocketCall> {
        use SocketCall as S;
        Some(match self {
            Self::Socket => S::Socket,
            Self::Bind => S::Bind,
            Self::Connect => S::Connect,
            Self::Listen => S::Listen,
            Self::Accept => S::Accept,
            Self::Accept4 => S::Accept4,
            Self::Getsockname => S::Getsockname,
            Self::Getpeername => S::Getpeername,
            Self::Socketpair => S::Socketpair,
            Self::Send => S::Send,
            Self::Recv => S::Recv,
            Self::Sendto => S::Sendto,
            Self::Recvfrom => S::Recvfrom,
            Self::Shutdown => S::Shutdown,
            Self::Setsockopt => S::Setsockopt,
            Self::Getsockopt => S::Getsockopt,
            Self::Sendmsg => S::Sendmsg,
            Self::Recvmsg => S::Recvmsg,
            Self::Recvmmsg => S::Recvmmsg,
            Self::Sendmmsg => S::Sendmmsg,
            _ => return None,
        })
    }

    /// The SysV IPC operation of a separate IPC syscall.
    pub fn ipc_call(self) -> Option<IpcCall> {
        use IpcCall as I;
        Some(match self {
            Self::Semop => I::Semop,
            Self::Semget => I::Semget,
            Self::Semctl => I::Semctl,
            Self::Semtimedop => I::Semtimedop,
            Self::Msgsnd => I::Msgsnd,
            Self::Msgrcv => I::Msgrcv,
            Self::Msgget => I::Msgget,
            Self::Msgctl => I::Msgctl,
            Self::Shmat => I::Shmat,
            Self::Shmdt => I::Shmdt,
            Self::Shmget => I::Shmget,
            Self::Shmctl => I::Shmctl,
            _ => return None,
        })
    }
}

/// Operation codes of the multiplexed `socketcall(2)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SocketCall {
    Socket = 1,
    Bind = 2,
    Connect = 3,
    Listen = 4,
    Accept = 5,
    Getsockname = 6,
    Getpeername = 7,
    Socketpair = 8,
    Send = 9,
    Recv = 10,
    Sendto = 11,
    Recvfrom = 12,
    Shutdown = 13,
    Setsockopt = 14,
    Getsockopt = 15,
    Sendmsg = 16,
    Recvmsg = 17,
    Accept4 = 18,
    Recvmmsg = 19,
    Sendmmsg = 20,
}

impl SocketCall {
    pub const ALL: [Self; 20] = [
        Self::Socket,
        Self::Bind,
        Self::Connect,
        Self::Listen,
        Self::Accept,
        Self::Getsockname,
        Self::Getpeername,
        Self::Socketpair,
        Self::Send,
        Self::Recv,
        Self::Sendto,
        Self::Recvfrom,
        Self::Shutdown,
        Self::Setsockopt,
        Self::Getsockopt,
        Self::Sendmsg,
        Self::Recvmsg,
        Self::Accept4,
        Self::Recvmmsg,
        Self::Sendmmsg,
    ];

    pub fn from_code(code: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|c| *c as u64 == code)
    }

    /// The separate syscall that performs this operation, if the target has one.
    ///
    /// `send` and `recv` have no separate syscall on the multiplexing
    /// architectures and map onto `sendto` and `recvfrom`.
    #[rustfmt::skip]
    pub fn separate_nr(self) -> Option<i64> {
        let nr: c_long = match self {
            #[cfg(has_SYS_socketpair)] Self::Socketpair => libc::SYS_socketpair,
            #[cfg(has_SYS_getsockopt)] Self::Getsockopt => libc::SYS_getsockopt,
            #[cfg(has_SYS_sendmsg)] Self::Sendmsg => libc::SYS_sendmsg,
            #[cfg(has_SYS_recvmsg)] Self::Recvmsg => libc::SYS_recvmsg,
            #[cfg(has_SYS_sendto)] Self::Sendto | Self::Send => libc::SYS_sendto,
            #[cfg(has_SYS_recvfrom)] Self::Recvfrom | Self::Recv => libc::SYS_recvfrom,
            #[cfg(has_SYS_sendmmsg)] Self::Sendmmsg => libc::SYS_sendmmsg,
            #[cfg(has_SYS_recvmmsg)] Self::Recvmmsg => libc::SYS_recvmmsg,
            _ => return None,
        };
        Some(nr.into())
    }
}

/// Operation codes of the multiplexed `ipc(2)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum IpcCall {
    Semop = 1,
    Semget = 2,
    Semctl = 3,
    Semtimedop = 4,
    Msgsnd = 11,
    Msgrcv = 12,
    Msgget = 13,
    Msgctl = 14,
    Shmat = 21,
    Shmdt = 22,
    Shmget = 23,
    Shmctl = 24,
}

impl IpcCall {
    pub const ALL: [Self; 12] = [
        Self::Semop,
        Self::Semget,
        Self::Semctl,
        Self::Semtimedop,
        Self::Msgsnd,
        Self::Msgrcv,
        Self::Msgget,
        Self::Msgctl,
        Self::Shmat,
        Self::Shmdt,
        Self::Shmget,
        Self::Shmctl,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Name and number of every syscall the build script enabled.
    const KNOWN_SYSCALLS: &[(&str, c_long)] =
        include!(concat!(env!("OUT_DIR"), "/known_syscalls.rs"));

    /// Older variants that are not mapped when the newer one exists.
    const SUPERSEDED: &[(&str, &str)] = &[
        ("stat", "stat64"),
        ("lstat", "lstat64"),
        ("newfstatat", "fstatat64"),
        ("fstat", "fstat64"),
        ("fchown", "fchown32"),
        ("select", "_newselect"),
        ("fcntl", "fcntl64"),
        ("mmap", "mmap2"),
        ("getuid", "getuid32"),
        ("getgid", "getgid32"),
        ("geteuid", "geteuid32"),
        ("getegid", "getegid32"),
        ("getresuid", "getresuid32"),
        ("getresgid", "getresgid32"),
        ("getrlimit", "ugetrlimit"),
    ];

    fn is_known(name: &str) -> bool {
        KNOWN_SYSCALLS.iter().any(|(n, _)| *n == name)
    }

    #[test]
    fn test_known_numbers() {
        assert_eq!(Sys::from_nr(libc::SYS_read.into()), Some(Sys::Read));
        assert_eq!(Sys::from_nr(libc::SYS_openat.into()), Some(Sys::Openat));
        assert_eq!(Sys::from_nr(libc::SYS_madvise.into()), Some(Sys::Madvise));
        assert_eq!(Sys::from_nr(libc::SYS_futex.into()), Some(Sys::Futex));
        assert_eq!(Sys::from_nr(-1), None);
        assert_eq!(Sys::from_nr(MAX_SYSCALL_NR + 1), None);

        assert!(is_known("read"));
        assert!(is_known("openat"));
        for &(name, nr) in KNOWN_SYSCALLS {
            let nr = i64::from(nr);
            assert!((0..=MAX_SYSCALL_NR).contains(&nr), "SYS_{name} = {nr}");
            let superseded = SUPERSEDED
                .iter()
                .any(|(old, new)| *old == name && is_known(new));
            if superseded {
                continue;
            }
            assert!(Sys::from_nr(nr).is_some(), "SYS_{name} = {nr} does not resolve");
        }
    }

    #[test]
    fn test_socket_tags() {
        assert_eq!(Sys::Sendmsg.socket_call(), Some(SocketCall::Sendmsg));
        assert_eq!(Sys::Read.socket_call(), None);
        assert_eq!(Sys::Shmget.ipc_call(), Some(IpcCall::Shmget));
        assert_eq!(SocketCall::from_code(8), Some(SocketCall::Socketpair));
        assert_eq!(SocketCall::from_code(21), None);
        assert!(Sys::from_nr(libc::SYS_getpid.into())
            .and_then(Sys::socket_call)
            .is_none());
    }
}

// vim: ts=4 sw=4 expandtab
