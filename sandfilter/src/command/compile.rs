// -*- coding: utf-8 -*-
//
// Copyright (C) 2024 Michael Büsch <m@bues.ch>
//
// Licensed under the Apache License version 2.0
// or the MIT license, at your option.
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::setup::Setup;
use anyhow::{self as ah, format_err as err, Context as _};
use sandfilter_bpf::{Action, Arch};
use sandfilter_policy::{compile_policy, ProcessType};
use std::path::Path;

/// Compile the policy for the native architecture and write the serialized program.
///
/// The trap table is printed, so that trap data values can be mapped back to handlers.
pub fn run_compile(
    setup: &Setup,
    process: ProcessType,
    action: Action,
    out: &Path,
) -> ah::Result<()> {
    let arch = Arch::native().ok_or_else(|| err!("Unsupported CPU architecture"))?;
    let policy = setup.policy(process)?;
    let compiled = compile_policy(&policy, arch, action).context("Compile policy")?;

    std::fs::write(out, compiled.filter.serialize())
        .with_context(|| format!("Write BPF program to {out:?}"))?;
    log::info!(
        "{process}: {} BPF instructions written to {out:?}",
        compiled.filter.len()
    );

    for (data, trap) in compiled.traps.iter() {
        println!("{data} {}", trap.name());
    }
    Ok(())
}

// vim: ts=4 sw=4 expandtab
