// -*- coding: utf-8 -*-
//
// Copyright (C) 2024 Michael Büsch <m@bues.ch>
//
// Licensed under the Apache License version 2.0
// or the MIT license, at your option.
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::{command::dump::syscall_name, setup::Setup};
use anyhow::{self as ah, format_err as err, Context as _};
use sandfilter_bpf::{Action, Arch, FilterResult, SyscallArgs, Verdict, BLOCKED_TRAP_DATA};
use sandfilter_policy::{compile_policy, Policy, ProcessType, Trap, TrapTable};

pub fn describe_verdict(verdict: &Verdict<'_, Trap>) -> String {
    match verdict {
        Verdict::Allow => "allow".to_string(),
        Verdict::Error(errno) => format!("errno {errno}"),
        Verdict::Block => "block".to_string(),
        Verdict::Trap(trap) => format!("trap {}", trap.name()),
    }
}

pub fn describe_result(result: FilterResult, traps: &TrapTable) -> String {
    match result {
        FilterResult::Allow => "allow".to_string(),
        FilterResult::Errno(errno) => format!("errno {errno}"),
        FilterResult::Log => "log".to_string(),
        FilterResult::KillProcess => "kill".to_string(),
        FilterResult::Trap(BLOCKED_TRAP_DATA) => "block".to_string(),
        FilterResult::Trap(data) => match traps.get(data) {
            Some(trap) => format!("trap {}", trap.name()),
            None => format!("trap {data} (unknown)"),
        },
    }
}

pub fn run_check(
    setup: &Setup,
    process: ProcessType,
    action: Action,
    nr: i64,
    words: &[u64],
) -> ah::Result<()> {
    if words.len() > 6 {
        return Err(err!("A syscall has at most 6 arguments"));
    }
    let mut a = [0; 6];
    a[..words.len()].copy_from_slice(words);
    let args = SyscallArgs::new(nr, a);

    let policy = setup.policy(process)?;
    let rule = policy.evaluate_syscall(nr);
    println!(
        "{nr} {} {a:x?}: {}",
        syscall_name(nr),
        describe_verdict(&rule.resolve(&args))
    );

    let Some(arch) = Arch::native() else {
        log::warn!("BPF simulation is not available on this architecture");
        return Ok(());
    };
    let compiled = compile_policy(&policy, arch, action).context("Compile policy")?;
    let result = compiled.filter.simulate(arch, &args)?;
    println!("bpf: {}", describe_result(result, &compiled.traps));
    Ok(())
}


// vim: ts=4 sw=4 expandtab
