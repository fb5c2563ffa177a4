// -*- coding: utf-8 -*-
//
// Copyright (C) 2024 Michael Büsch <m@bues.ch>
//
// Licensed under the Apache License version 2.0
// or the MIT license, at your option.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Emits a `has_SYS_<name>` cfg for every syscall number `libc` exports
//! for the build target.
//!
//! The tables list the `libc::SYS_*` constants that both the gnu and the
//! musl flavour of each architecture define.

use std::{env, fmt::Write as _, fs, path::Path};

/// Syscalls that every supported architecture has.
const COMMON: &[&str] = &[
    "openat",
    "faccessat",
    "faccessat2",
    "statx",
    "fchmodat",
    "linkat",
    "mkdirat",
    "symlinkat",
    "unlinkat",
    "readlinkat",
    "fstat",
    "statfs",
    "fstatfs",
    "getcwd",
    "mknodat",
    "fchown",
    "fchownat",
    "fchmod",
    "flock",
    "umask",
    "fsync",
    "readahead",
    "gettimeofday",
    "nanosleep",
    "clock_gettime",
    "clock_getres",
    "clock_nanosleep",
    "times",
    "futex",
    "epoll_create1",
    "epoll_pwait",
    "epoll_ctl",
    "ppoll",
    "pselect6",
    "eventfd2",
    "read",
    "write",
    "readv",
    "writev",
    "pread64",
    "pwrite64",
    "lseek",
    "getdents64",
    "ftruncate",
    "fallocate",
    "fcntl",
    "ioctl",
    "pipe2",
    "dup",
    "dup3",
    "close",
    "munmap",
    "mprotect",
    "mremap",
    "madvise",
    "mincore",
    "mlock",
    "munlock",
    "msync",
    "brk",
    "memfd_create",
    "membarrier",
    "get_mempolicy",
    "set_mempolicy",
    "sigaltstack",
    "rt_sigreturn",
    "rt_sigprocmask",
    "rt_sigaction",
    "rt_tgsigqueueinfo",
    "tgkill",
    "tkill",
    "kill",
    "clone",
    "clone3",
    "wait4",
    "exit",
    "exit_group",
    "restart_syscall",
    "set_robust_list",
    "prctl",
    "kcmp",
    "getpid",
    "gettid",
    "getppid",
    "getuid",
    "getgid",
    "geteuid",
    "getegid",
    "getresuid",
    "getresgid",
    "prlimit64",
    "getrusage",
    "getpriority",
    "setpriority",
    "getcpu",
    "getrandom",
    "sysinfo",
    "uname",
    "sched_yield",
    "sched_getaffinity",
    "sched_setaffinity",
    "sched_getattr",
    "sched_setattr",
    "sched_getparam",
    "sched_setparam",
    "sched_getscheduler",
    "sched_setscheduler",
    "sched_get_priority_min",
    "sched_get_priority_max",
    "socket",
    "bind",
    "connect",
    "listen",
    "accept4",
    "getsockname",
    "getpeername",
    "socketpair",
    "sendto",
    "recvfrom",
    "shutdown",
    "setsockopt",
    "getsockopt",
    "sendmsg",
    "recvmsg",
    "recvmmsg",
    "sendmmsg",
];

/// Additional syscalls of x86_64.
const X86_64: &[&str] = &[
    "open",
    "access",
    "stat",
    "lstat",
    "chmod",
    "link",
    "mkdir",
    "symlink",
    "rename",
    "rmdir",
    "unlink",
    "readlink",
    "newfstatat",
    "renameat",
    "mknod",
    "chown",
    "fadvise64",
    "time",
    "epoll_create",
    "epoll_wait",
    "poll",
    "select",
    "getdents",
    "pipe",
    "dup2",
    "mmap",
    "fork",
    "set_thread_area",
    "rseq",
    "getrlimit",
    "accept",
    "semop",
    "semget",
    "semctl",
    "semtimedop",
    "msgsnd",
    "msgrcv",
    "msgget",
    "msgctl",
    "shmat",
    "shmdt",
    "shmget",
    "shmctl",
];

/// Additional syscalls of x86.
const X86: &[&str] = &[
    "open",
    "access",
    "stat",
    "stat64",
    "lstat",
    "lstat64",
    "chmod",
    "link",
    "mkdir",
    "symlink",
    "rename",
    "rmdir",
    "unlink",
    "readlink",
    "fstatat64",
    "renameat",
    "fstat64",
    "statfs64",
    "fstatfs64",
    "mknod",
    "chown",
    "fchown32",
    "fadvise64",
    "fadvise64_64",
    "time",
    "epoll_create",
    "epoll_wait",
    "poll",
    "select",
    "_newselect",
    "_llseek",
    "getdents",
    "ftruncate64",
    "fcntl64",
    "pipe",
    "dup2",
    "mmap",
    "mmap2",
    "sigreturn",
    "sigprocmask",
    "sigaction",
    "fork",
    "waitpid",
    "set_thread_area",
    "getuid32",
    "getgid32",
    "geteuid32",
    "getegid32",
    "getresuid32",
    "getresgid32",
    "getrlimit",
    "ugetrlimit",
    "socketcall",
    "ipc",
];

/// Additional syscalls of arm.
const ARM: &[&str] = &[
    "open",
    "access",
    "stat",
    "stat64",
    "lstat",
    "lstat64",
    "chmod",
    "link",
    "mkdir",
    "symlink",
    "rename",
    "rmdir",
    "unlink",
    "readlink",
    "fstatat64",
    "renameat",
    "fstat64",
    "statfs64",
    "fstatfs64",
    "mknod",
    "chown",
    "fchown32",
    "epoll_create",
    "epoll_wait",
    "poll",
    "_newselect",
    "_llseek",
    "getdents",
    "ftruncate64",
    "fcntl64",
    "pipe",
    "dup2",
    "mmap2",
    "sigreturn",
    "sigprocmask",
    "sigaction",
    "fork",
    "getuid32",
    "getgid32",
    "geteuid32",
    "getegid32",
    "getresuid32",
    "getresgid32",
    "ugetrlimit",
    "accept",
    "send",
    "recv",
    "semop",
    "semget",
    "semctl",
    "semtimedop",
    "msgsnd",
    "msgrcv",
    "msgget",
    "msgctl",
    "shmat",
    "shmdt",
    "shmget",
    "shmctl",
];

/// Additional syscalls of aarch64.
const AARCH64: &[&str] = &[
    "newfstatat",
    "renameat",
    "fadvise64",
    "mmap",
    "rseq",
    "getrlimit",
    "accept",
    "semop",
    "semget",
    "semctl",
    "semtimedop",
    "msgsnd",
    "msgrcv",
    "msgget",
    "msgctl",
    "shmat",
    "shmdt",
    "shmget",
    "shmctl",
];

/// Additional syscalls of riscv64.
const RISCV64: &[&str] = &[
    "newfstatat",
    "fadvise64",
    "mmap",
    "rseq",
    "getrlimit",
    "accept",
    "semop",
    "semget",
    "semctl",
    "semtimedop",
    "msgsnd",
    "msgrcv",
    "msgget",
    "msgctl",
    "shmat",
    "shmdt",
    "shmget",
    "shmctl",
];

/// Names the policies refer to that `libc` does not export on any
/// supported architecture.
const NOT_EXPORTED: &[&str] = &[
    "clock_gettime64",
    "clock_getres_time64",
    "clock_nanosleep_time64",
    "futex_time64",
    "ppoll_time64",
    "pselect6_time64",
    "recvmmsg_time64",
];

const ARCH_TABLES: &[&[&str]] = &[X86_64, X86, ARM, AARCH64, RISCV64];

fn env_var(name: &str) -> String {
    env::var(name).unwrap_or_default()
}

fn arch_syscalls() -> Option<&'static [&'static str]> {
    if env_var("CARGO_CFG_TARGET_OS") != "linux" {
        return None;
    }
    if !matches!(env_var("CARGO_CFG_TARGET_ENV").as_str(), "gnu" | "musl") {
        return None;
    }
    match (
        env_var("CARGO_CFG_TARGET_ARCH").as_str(),
        env_var("CARGO_CFG_TARGET_POINTER_WIDTH").as_str(),
    ) {
        ("x86_64", "64") => Some(X86_64),
        ("x86", _) => Some(X86),
        ("arm", _) => Some(ARM),
        ("aarch64", _) => Some(AARCH64),
        ("riscv64", _) => Some(RISCV64),
        _ => None,
    }
}

fn main() {
    for name in COMMON
        .iter()
        .chain(ARCH_TABLES.iter().flat_map(|t| t.iter()))
        .chain(NOT_EXPORTED)
    {
        println!("cargo:rustc-check-cfg=cfg(has_SYS_{name})");
    }

    // Name and number of each emitted syscall, for the unit tests.
    let mut known = String::from("&[\n");
    if let Some(extra) = arch_syscalls() {
        for name in COMMON.iter().chain(extra) {
            println!("cargo:rustc-cfg=has_SYS_{name}");
            writeln!(known, "    (\"{name}\", libc::SYS_{name}),").unwrap();
        }
    } else {
        println!(
            "cargo:warning=No syscall table for target {}. All syscalls will be denied.",
            env_var("TARGET")
        );
    }
    known.push_str("]\n");

    let out_dir = env::var("OUT_DIR").expect("OUT_DIR is not set");
    fs::write(Path::new(&out_dir).join("known_syscalls.rs"), known)
        .expect("Failed to write known_syscalls.rs");

    println!("cargo:rerun-if-changed=build.rs");
}

// vim: ts=4 sw=4 expandtab
