// -*- coding: utf-8 -*-
//
// Copyright (C) 2024 Michael Büsch <m@bues.ch>
//
// Licensed under the Apache License version 2.0
// or the MIT license, at your option.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Minimal interpreter for the instruction subset the code generator emits.

use crate::{
    codegen::{
        BPF_ABS, BPF_ALU, BPF_AND, BPF_JA, BPF_JEQ, BPF_JMP, BPF_JSET, BPF_K, BPF_LD, BPF_RET,
        BPF_W, OFFSET_ARCH, OFFSET_ARGS, OFFSET_NR,
    },
    dsl::SyscallArgs,
};
use anyhow::{self as ah, format_err as err};
use seccompiler::sock_filter;

fn load(arch: u32, data: &SyscallArgs, offset: u32) -> ah::Result<u32> {
    match offset {
        OFFSET_NR => Ok(data.nr as u32),
        OFFSET_ARCH => Ok(arch),
        o if o >= OFFSET_ARGS && o < OFFSET_ARGS + 6 * 8 && o % 4 == 0 => {
            let index = ((o - OFFSET_ARGS) / 8) as usize;
            let word = data.args[index];
            Ok(if (o - OFFSET_ARGS) % 8 == 0 {
                word as u32
            } else {
                (word >> 32) as u32
            })
        }
        o => Err(err!("Unsupported seccomp_data load at offset {o}")),
    }
}

/// Run `prog` on a `seccomp_data` image and return the filter result.
pub fn run(prog: &[sock_filter], arch: u32, data: &SyscallArgs) -> ah::Result<u32> {
    let mut acc: u32 = 0;
    let mut pc: usize = 0;
    loop {
        let Some(insn) = prog.get(pc) else {
            return Err(err!("BPF program counter {pc} out of range"));
        };
        pc += 1;
        match insn.code {
            c if c == BPF_LD | BPF_W | BPF_ABS => {
                acc = load(arch, data, insn.k)?;
            }
            c if c == BPF_ALU | BPF_AND | BPF_K => {
                acc &= insn.k;
            }
            c if c == BPF_JMP | BPF_JA => {
                pc += insn.k as usize;
            }
            c if c == BPF_JMP | BPF_JEQ | BPF_K => {
                pc += if acc == insn.k { insn.jt } else { insn.jf } as usize;
            }
            c if c == BPF_JMP | BPF_JSET | BPF_K => {
                pc += if acc & insn.k != 0 { insn.jt } else { insn.jf } as usize;
            }
            c if c == BPF_RET | BPF_K => {
                return Ok(insn.k);
            }
            c => return Err(err!("Unsupported BPF opcode {c:#x}")),
        }
    }
}

// vim: ts=4 sw=4 expandtab
