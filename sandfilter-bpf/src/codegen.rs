// -*- coding: utf-8 -*-
//
// Copyright (C) 2024 Michael Büsch <m@bues.ch>
//
// Licensed under the Apache License version 2.0
// or the MIT license, at your option.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Lowering of decision trees into classic BPF.
//!
//! The program is generated back to front. A [Label] is the position of an
//! instruction counted from the end of the program, so it stays valid while
//! more instructions are prepended. Conditional jumps only reach 255
//! instructions ahead; targets farther away go through a `JA` trampoline.

use crate::{
    dsl::{ArgLen, Cmp, Cond, Decision},
    Action, Arch,
};
use anyhow::{self as ah, format_err as err};
use seccompiler::sock_filter;
use std::collections::{BTreeMap, HashMap};

pub const BPF_LD: u16 = 0x00;
pub const BPF_ALU: u16 = 0x04;
pub const BPF_JMP: u16 = 0x05;
pub const BPF_RET: u16 = 0x06;
pub const BPF_W: u16 = 0x00;
pub const BPF_ABS: u16 = 0x20;
pub const BPF_AND: u16 = 0x50;
pub const BPF_JA: u16 = 0x00;
pub const BPF_JEQ: u16 = 0x10;
pub const BPF_JSET: u16 = 0x40;
pub const BPF_K: u16 = 0x00;

/// Kernel limit on the number of instructions.
pub const BPF_MAXINSNS: usize = 4096;

/// `struct seccomp_data` offsets.
pub const OFFSET_NR: u32 = 0;
pub const OFFSET_ARCH: u32 = 4;
pub const OFFSET_ARGS: u32 = 16;

/// Syscall numbers of the x32 ABI have this bit set.
const X32_SYSCALL_BIT: u32 = 0x4000_0000;

/// Trap data reserved for [Decision::Block].
pub const BLOCKED_TRAP_DATA: u16 = u16::MAX;

pub const SECCOMP_RET_KILL_PROCESS: u32 = 0x8000_0000;
pub const SECCOMP_RET_TRAP: u32 = 0x0003_0000;
pub const SECCOMP_RET_ERRNO: u32 = 0x0005_0000;
pub const SECCOMP_RET_LOG: u32 = 0x7ffc_0000;
pub const SECCOMP_RET_ALLOW: u32 = 0x7fff_0000;
pub const SECCOMP_RET_ACTION_FULL: u32 = 0xffff_0000;
pub const SECCOMP_RET_DATA: u32 = 0x0000_ffff;

type Label = usize;

struct CodeGen {
    /// Instructions in reverse order.
    rev: Vec<sock_filter>,
    rets: HashMap<u32, Label>,
    block: u32,
}

impl CodeGen {
    fn new(block_action: Action) -> Self {
        Self {
            rev: Vec::with_capacity(1024),
            rets: HashMap::new(),
            block: match block_action {
                Action::Trap => SECCOMP_RET_TRAP | u32::from(BLOCKED_TRAP_DATA),
                Action::Kill => SECCOMP_RET_KILL_PROCESS,
                Action::Log => SECCOMP_RET_LOG,
            },
        }
    }

    fn push(&mut self, insn: sock_filter) -> ah::Result<Label> {
        if self.rev.len() >= BPF_MAXINSNS {
            return Err(err!(
                "BPF program exceeds {BPF_MAXINSNS} instructions"
            ));
        }
        self.rev.push(insn);
        Ok(self.rev.len() - 1)
    }

    /// Distance from the next instruction to be pushed to `target`.
    fn distance(&self, target: Label) -> usize {
        self.rev.len() - target - 1
    }

    fn trampoline(&mut self, target: Label) -> ah::Result<Label> {
        let k = u32::try_from(self.distance(target))?;
        self.push(sock_filter {
            code: BPF_JMP | BPF_JA,
            jt: 0,
            jf: 0,
            k,
        })
    }

    /// Make `target` directly reachable by a conditional jump.
    fn near(&mut self, target: Label) -> ah::Result<Label> {
        if self.distance(target) > u8::MAX as usize {
            self.trampoline(target)
        } else {
            Ok(target)
        }
    }

    /// Prepend a statement that falls through to `next`.
    fn stmt(&mut self, code: u16, k: u32, next: Label) -> ah::Result<Label> {
        if self.distance(next) != 0 {
            self.trampoline(next)?;
        }
        self.push(sock_filter {
            code,
            jt: 0,
            jf: 0,
            k,
        })
    }

    fn jump(&mut self, code: u16, k: u32, jt: Label, jf: Label) -> ah::Result<Label> {
        let jt = self.near(jt)?;
        let jf = self.near(jf)?;
        // The second trampoline may have pushed the first one out of reach.
        let jt = self.near(jt)?;
        let jt_off = u8::try_from(self.distance(jt))?;
        let jf_off = u8::try_from(self.distance(jf))?;
        self.push(sock_filter {
            code,
            jt: jt_off,
            jf: jf_off,
            k,
        })
    }

    fn ret(&mut self, value: u32) -> ah::Result<Label> {
        if let Some(label) = self.rets.get(&value) {
            return Ok(*label);
        }
        let label = self.push(sock_filter {
            code: BPF_RET | BPF_K,
            jt: 0,
            jf: 0,
            k: value,
        })?;
        self.rets.insert(value, label);
        Ok(label)
    }

    /// One 32 bit half of a masked compare.
    fn half(&mut self, offset: u32, mask: u32, value: u32, t: Label, f: Label) -> ah::Result<Label> {
        if mask == 0 {
            // Nothing to compare. `value` is zero here, see Masked::eq.
            return Ok(t);
        }
        let mut next = self.jump(BPF_JMP | BPF_JEQ | BPF_K, value, t, f)?;
        if mask != u32::MAX {
            next = self.stmt(BPF_ALU | BPF_AND | BPF_K, mask, next)?;
        }
        self.stmt(BPF_LD | BPF_W | BPF_ABS, offset, next)
    }

    fn cmp(&mut self, cmp: &Cmp, t: Label, f: Label) -> ah::Result<Label> {
        let lo_offset = OFFSET_ARGS + u32::from(cmp.arg.index()) * 8;
        let lo = self.half(lo_offset, cmp.mask as u32, cmp.value as u32, t, f)?;
        match cmp.arg.len() {
            ArgLen::Dword => Ok(lo),
            ArgLen::Qword => self.half(
                lo_offset + 4,
                (cmp.mask >> 32) as u32,
                (cmp.value >> 32) as u32,
                lo,
                f,
            ),
        }
    }

    fn cond(&mut self, cond: &Cond, t: Label, f: Label) -> ah::Result<Label> {
        match cond {
            Cond::Const(true) => Ok(t),
            Cond::Const(false) => Ok(f),
            Cond::Cmp(cmp) => self.cmp(cmp, t, f),
            Cond::Not(c) => self.cond(c, f, t),
            Cond::All(conds) => {
                let mut next = t;
                for c in conds.iter().rev() {
                    next = self.cond(c, next, f)?;
                }
                Ok(next)
            }
            Cond::Any(conds) => {
                let mut next = f;
                for c in conds.iter().rev() {
                    next = self.cond(c, t, next)?;
                }
                Ok(next)
            }
        }
    }

    fn decision<T>(
        &mut self,
        decision: &Decision<T>,
        trap_data: &mut impl FnMut(&T) -> ah::Result<u16>,
    ) -> ah::Result<Label> {
        match decision {
            Decision::Allow => self.ret(SECCOMP_RET_ALLOW),
            Decision::Error(errno) => {
                let errno = u32::try_from(*errno)?;
                if errno > SECCOMP_RET_DATA {
                    return Err(err!("errno {errno} out of range"));
                }
                self.ret(SECCOMP_RET_ERRNO | errno)
            }
            Decision::Block => self.ret(self.block),
            Decision::Trap(t) => {
                let data = trap_data(t)?;
                if data == BLOCKED_TRAP_DATA {
                    return Err(err!("Trap data {data:#x} is reserved"));
                }
                self.ret(SECCOMP_RET_TRAP | u32::from(data))
            }
            Decision::If {
                cond,
                then,
                otherwise,
            } => {
                let f = self.decision(otherwise, trap_data)?;
                let t = self.decision(then, trap_data)?;
                self.cond(cond, t, f)
            }
        }
    }

    fn finish(mut self) -> Vec<sock_filter> {
        self.rev.reverse();
        self.rev
    }
}

/// Generate the complete filter program.
pub fn generate<T>(
    rules: &BTreeMap<i64, Decision<T>>,
    default: &Decision<T>,
    arch: Arch,
    block_action: Action,
    mut trap_data: impl FnMut(&T) -> ah::Result<u16>,
) -> ah::Result<Vec<sock_filter>> {
    let mut gen = CodeGen::new(block_action);

    let default = gen.decision(default, &mut trap_data)?;
    let mut bodies = Vec::with_capacity(rules.len());
    for (nr, decision) in rules {
        let nr = u32::try_from(*nr).map_err(|_| err!("Invalid syscall number {nr}"))?;
        bodies.push((nr, gen.decision(decision, &mut trap_data)?));
    }

    // Dispatch chain; the accumulator holds the syscall number.
    let mut next = default;
    for (nr, body) in bodies.iter().rev() {
        next = gen.jump(BPF_JMP | BPF_JEQ | BPF_K, *nr, *body, next)?;
    }
    if arch == Arch::X86_64 {
        let block = gen.ret(gen.block)?;
        next = gen.jump(BPF_JMP | BPF_JSET | BPF_K, X32_SYSCALL_BIT, block, next)?;
    }
    next = gen.stmt(BPF_LD | BPF_W | BPF_ABS, OFFSET_NR, next)?;

    let kill = gen.ret(SECCOMP_RET_KILL_PROCESS)?;
    next = gen.jump(BPF_JMP | BPF_JEQ | BPF_K, arch.audit(), next, kill)?;
    gen.stmt(BPF_LD | BPF_W | BPF_ABS, OFFSET_ARCH, next)?;

    Ok(gen.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::Arg;

    #[test]
    fn test_minimal_program() {
        let rules: BTreeMap<i64, Decision<u16>> = [(1, Decision::Allow)].into();
        let prog = generate(&rules, &Decision::Block, Arch::Aarch64, Action::Kill, |_| Ok(0)).unwrap();
        // ld arch, jeq arch, ld nr, jeq 1, ret allow, ret kill
        assert_eq!(prog.len(), 6);
        assert_eq!(prog[0].code, BPF_LD | BPF_W | BPF_ABS);
        assert_eq!(prog[0].k, OFFSET_ARCH);
        assert_eq!(prog[1].k, Arch::Aarch64.audit());
        assert_eq!(prog[2].k, OFFSET_NR);
        assert_eq!(prog[3].k, 1);
        assert!(prog.iter().all(|i| i.code != (BPF_JMP | BPF_JA)));
    }

    #[test]
    fn test_reserved_trap_data() {
        let rules: BTreeMap<i64, Decision<u16>> = [(1, Decision::Trap(0))].into();
        assert!(generate(&rules, &Decision::Block, Arch::X86_64, Action::Trap, |_| {
            Ok(BLOCKED_TRAP_DATA)
        })
        .is_err());
    }

    #[test]
    fn test_long_jumps() {
        // Enough distinct bodies to push early rules out of u8 jump range.
        let rules: BTreeMap<i64, Decision<u16>> = (0..200)
            .map(|nr| {
                (
                    nr,
                    crate::dsl::when(Arg::word(0).eq(nr as u64), Decision::Error(nr as i32 + 1))
                        .otherwise(Decision::Block),
                )
            })
            .collect();
        let prog = generate(&rules, &Decision::Block, Arch::X86_64, Action::Trap, |_| Ok(0)).unwrap();
        assert!(prog.iter().any(|i| i.code == (BPF_JMP | BPF_JA)));
    }
}

// vim: ts=4 sw=4 expandtab
