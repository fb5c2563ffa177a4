// -*- coding: utf-8 -*-
//
// Copyright (C) 2024 Michael Büsch <m@bues.ch>
//
// Licensed under the Apache License version 2.0
// or the MIT license, at your option.
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::setup::Setup;
use anyhow as ah;
use sandfilter_bpf::Decision;
use sandfilter_policy::{evaluate_all, ProcessType, Rule, Sys};
use std::fmt::Write as _;

/// Render a decision tree, one node per line.
pub fn render_rule(rule: &Rule, depth: usize, out: &mut String) {
    let pad = "    ".repeat(depth);
    let _ = match rule {
        Decision::Allow => writeln!(out, "{pad}allow"),
        Decision::Error(errno) => writeln!(out, "{pad}errno {errno}"),
        Decision::Block => writeln!(out, "{pad}block"),
        Decision::Trap(trap) => writeln!(out, "{pad}trap {}", trap.name()),
        Decision::If {
            cond,
            then,
            otherwise,
        } => {
            let _ = writeln!(out, "{pad}if {cond:?}");
            render_rule(then, depth + 1, out);
            let _ = writeln!(out, "{pad}else");
            render_rule(otherwise, depth + 1, out);
            Ok(())
        }
    };
}

pub fn syscall_name(nr: i64) -> String {
    match Sys::from_nr(nr) {
        Some(sys) => format!("{sys:?}"),
        None => "?".to_string(),
    }
}

pub fn run_dump(setup: &Setup, process: ProcessType) -> ah::Result<()> {
    log::debug!("{:?}", setup.params().info);
    let policy = setup.policy(process)?;
    let rules = evaluate_all(&policy);
    log::info!("{process}: {} syscalls not blocked", rules.len());

    let mut out = String::new();
    for (nr, rule) in &rules {
        let _ = writeln!(out, "{nr} {}:", syscall_name(*nr));
        render_rule(rule, 1, &mut out);
    }
    print!("{out}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sandfilter_bpf::{when, Arg};
    use sandfilter_policy::Trap;

    #[test]
    fn test_render() {
        let inner = when(Arg::int(1).eq(2_i32), Rule::Trap(Trap::Sched)).otherwise(Rule::Error(13));
        let rule = when(Arg::int(0).eq(1_i32), Rule::Allow).otherwise(inner);
        let mut out = String::new();
        render_rule(&rule, 0, &mut out);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 7);
        assert!(lines[0].starts_with("if "));
        assert_eq!(lines[1], "    allow");
        assert_eq!(lines[2], "else");
        assert!(lines[3].starts_with("    if "));
        assert_eq!(lines[4], "        trap Sched");
        assert_eq!(lines[5], "    else");
        assert_eq!(lines[6], "        errno 13");
    }

    #[test]
    fn test_syscall_name() {
        assert_eq!(syscall_name(-1), "?");
        let read = (0..=sandfilter_policy::sys::MAX_SYSCALL_NR)
            .find(|nr| Sys::from_nr(*nr) == Some(Sys::Read))
            .unwrap();
        assert_eq!(syscall_name(read), "Read");
    }
}

// vim: ts=4 sw=4 expandtab
