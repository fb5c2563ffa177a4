// -*- coding: utf-8 -*-
//
// Copyright (C) 2024 Michael Büsch <m@bues.ch>
//
// Licensed under the Apache License version 2.0
// or the MIT license, at your option.
// SPDX-License-Identifier: Apache-2.0 OR MIT

mod common;

use common::{all_policies, RecordingBroker};
use sandfilter_bpf::{
    Action, Arch, Cond, Decision, Filter, FilterResult, SyscallArgs, Verdict, BLOCKED_TRAP_DATA,
};
use sandfilter_policy::{compile_policy, evaluate_all, Policy, Rule, TrapTable};
use std::sync::Arc;

/// Argument words that flip the comparisons in `cond`.
fn collect_probes(cond: &Cond, probes: &mut Vec<(usize, u64)>) {
    match cond {
        Cond::Const(_) => (),
        Cond::Cmp(cmp) => {
            let index = cmp.arg.index() as usize;
            probes.push((index, cmp.value));
            probes.push((index, cmp.value ^ cmp.mask));
            probes.push((index, cmp.value | !cmp.mask));
        }
        Cond::Not(c) => collect_probes(c, probes),
        Cond::All(conds) | Cond::Any(conds) => {
            for c in conds {
                collect_probes(c, probes);
            }
        }
    }
}

fn rule_probes(rule: &Rule, probes: &mut Vec<(usize, u64)>) {
    if let Decision::If {
        cond,
        then,
        otherwise,
    } = rule
    {
        collect_probes(cond, probes);
        rule_probes(then, probes);
        rule_probes(otherwise, probes);
    }
}

/// Argument vectors for a rule: plain ones and ones built from its constants.
fn sample_args(rule: &Rule) -> Vec<[u64; 6]> {
    let mut probes = Vec::new();
    rule_probes(rule, &mut probes);
    let mut samples = vec![[0; 6], [u64::MAX; 6], [1, 2, 3, 4, 5, 6]];
    let mut combined = [0; 6];
    for (index, value) in probes {
        let mut a = [0; 6];
        a[index] = value;
        samples.push(a);
        combined[index] = value;
        samples.push(combined);
    }
    samples
}

fn expected(verdict: Verdict<'_, sandfilter_policy::Trap>, traps: &TrapTable) -> FilterResult {
    match verdict {
        Verdict::Allow => FilterResult::Allow,
        Verdict::Error(e) => FilterResult::Errno(e as u16),
        Verdict::Block => FilterResult::Trap(BLOCKED_TRAP_DATA),
        Verdict::Trap(trap) => {
            let data = traps
                .iter()
                .find(|(_, t)| *t == trap)
                .map(|(data, _)| data)
                .expect("Trap missing from the table");
            FilterResult::Trap(data)
        }
    }
}

fn check_agreement(policy: &dyn Policy, filter: &Filter, traps: &TrapTable, arch: Arch) {
    let rules = evaluate_all(policy);
    assert!(!rules.is_empty());
    for (nr, rule) in &rules {
        for a in sample_args(rule) {
            let args = SyscallArgs::new(*nr, a);
            let want = expected(rule.resolve(&args), traps);
            let got = filter.simulate(arch, &args).unwrap();
            assert_eq!(got, want, "syscall {nr} args {a:x?}");
        }
    }
    // Numbers without a rule hit the default.
    for nr in [-1, 4000, 0x4000_0000] {
        let args = SyscallArgs::new(nr, [0; 6]);
        if rules.contains_key(&nr) {
            continue;
        }
        assert_eq!(
            filter.simulate(arch, &args).unwrap(),
            FilterResult::Trap(BLOCKED_TRAP_DATA)
        );
    }
}

#[test]
fn test_filter_matches_rules() {
    let Some(arch) = Arch::native() else {
        return;
    };
    for policy in all_policies(Arc::new(RecordingBroker::new())) {
        let compiled = compile_policy(&policy, arch, Action::Trap).unwrap();
        assert!(!compiled.traps.is_empty(), "{}", policy.process_type());
        check_agreement(&policy, &compiled.filter, &compiled.traps, arch);
    }
}

#[test]
fn test_block_action_kill() {
    let Some(arch) = Arch::native() else {
        return;
    };
    let policies = all_policies(Arc::new(RecordingBroker::new()));
    let policy = &policies[0];
    let compiled = compile_policy(policy, arch, Action::Kill).unwrap();
    let args = SyscallArgs::new(libc::SYS_ptrace.into(), [0; 6]);
    assert_eq!(
        compiled.filter.simulate(arch, &args).unwrap(),
        FilterResult::KillProcess
    );
    let args = SyscallArgs::new(libc::SYS_getpid.into(), [0; 6]);
    assert_eq!(
        compiled.filter.simulate(arch, &args).unwrap(),
        FilterResult::Allow
    );
}

#[test]
fn test_serialized_filter_behaves_the_same() {
    let Some(arch) = Arch::native() else {
        return;
    };
    let policies = all_policies(Arc::new(RecordingBroker::new()));
    let compiled = compile_policy(&policies[1], arch, Action::Trap).unwrap();
    let restored = Filter::deserialize(&compiled.filter.serialize()).unwrap();
    assert_eq!(restored.len(), compiled.filter.len());
    check_agreement(&policies[1], &restored, &compiled.traps, arch);
}

// vim: ts=4 sw=4 expandtab
