// -*- coding: utf-8 -*-
//
// Copyright (C) 2024 Michael Büsch <m@bues.ch>
//
// Licensed under the Apache License version 2.0
// or the MIT license, at your option.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Decision trees over syscall arguments.
//!
//! A [Decision] is built once per syscall number and is either a terminal
//! disposition or a conditional branch whose [Cond] tests argument words
//! against constants.

/// The raw syscall evaluation context, as seen by the kernel filter and by traps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyscallArgs {
    pub nr: i64,
    pub args: [u64; 6],
}

impl SyscallArgs {
    pub const fn new(nr: i64, args: [u64; 6]) -> Self {
        Self { nr, args }
    }
}

/// Width of an argument comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArgLen {
    /// Only the low 32 bits of the argument word are compared.
    Dword,
    /// The full 64 bit argument word is compared.
    Qword,
}

impl ArgLen {
    const fn mask(self) -> u64 {
        match self {
            Self::Dword => u32::MAX as u64,
            Self::Qword => u64::MAX,
        }
    }
}

/// Constant values that can be compared against an argument word.
pub trait ArgValue: Copy {
    fn to_word(self) -> u64;
}

macro_rules! impl_arg_value {
    ($($ty:ty),*) => {
        $(
            impl ArgValue for $ty {
                #[allow(clippy::cast_lossless, clippy::cast_sign_loss)]
                fn to_word(self) -> u64 {
                    self as u64
                }
            }
        )*
    };
}

// Signed values sign-extend into the word, so a Dword compare sees the C `int` bits.
impl_arg_value!(i32, u32, i64, u64, usize, isize, u16, u8);

/// One of the six syscall argument words.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Arg {
    index: u8,
    len: ArgLen,
}

impl Arg {
    /// A C `int`-sized argument.
    pub const fn int(index: u8) -> Self {
        assert!(index < 6);
        Self {
            index,
            len: ArgLen::Dword,
        }
    }

    /// A native word sized argument (`long`, `size_t`, pointers).
    pub const fn word(index: u8) -> Self {
        assert!(index < 6);
        Self {
            index,
            len: if cfg!(target_pointer_width = "64") {
                ArgLen::Qword
            } else {
                ArgLen::Dword
            },
        }
    }

    pub const fn index(&self) -> u8 {
        self.index
    }

    pub const fn len(&self) -> ArgLen {
        self.len
    }

    /// Apply a bit mask before comparing.
    pub fn masked(self, mask: impl ArgValue) -> Masked {
        Masked {
            arg: self,
            mask: mask.to_word() & self.len.mask(),
        }
    }

    pub fn eq(self, value: impl ArgValue) -> Cond {
        Masked::from(self).eq(value)
    }

    pub fn ne(self, value: impl ArgValue) -> Cond {
        !self.eq(value)
    }

    /// True if no bits outside of `allowed` are set.
    pub fn only(self, allowed: impl ArgValue) -> Cond {
        self.masked(!allowed.to_word()).eq(0_u64)
    }

    /// True if any of the `bits` is set.
    pub fn any_set(self, bits: impl ArgValue) -> Cond {
        self.masked(bits).ne(0_u64)
    }
}

/// An argument with a bit mask applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Masked {
    arg: Arg,
    mask: u64,
}

impl From<Arg> for Masked {
    fn from(arg: Arg) -> Self {
        Self {
            arg,
            mask: arg.len.mask(),
        }
    }
}

impl Masked {
    pub fn eq(self, value: impl ArgValue) -> Cond {
        let value = value.to_word() & self.arg.len.mask();
        if value & !self.mask != 0 {
            // Bits outside of the mask can never compare equal.
            return Cond::Const(false);
        }
        Cond::Cmp(Cmp {
            arg: self.arg,
            mask: self.mask,
            value,
        })
    }

    pub fn ne(self, value: impl ArgValue) -> Cond {
        !self.eq(value)
    }
}

/// A masked equality test: `(arg & mask) == value`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Cmp {
    pub arg: Arg,
    pub mask: u64,
    pub value: u64,
}

impl Cmp {
    fn eval(&self, args: &SyscallArgs) -> bool {
        let word = args.args[self.arg.index as usize] & self.arg.len.mask();
        word & self.mask == self.value
    }
}

/// A boolean expression over syscall arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Cond {
    Const(bool),
    Cmp(Cmp),
    Not(Box<Cond>),
    All(Vec<Cond>),
    Any(Vec<Cond>),
}

impl Cond {
    pub fn eval(&self, args: &SyscallArgs) -> bool {
        match self {
            Self::Const(c) => *c,
            Self::Cmp(cmp) => cmp.eval(args),
            Self::Not(c) => !c.eval(args),
            Self::All(conds) => conds.iter().all(|c| c.eval(args)),
            Self::Any(conds) => conds.iter().any(|c| c.eval(args)),
        }
    }
}

impl std::ops::Not for Cond {
    type Output = Cond;

    fn not(self) -> Cond {
        match self {
            Self::Const(c) => Self::Const(!c),
            Self::Not(c) => *c,
            c => Self::Not(Box::new(c)),
        }
    }
}

pub fn all_of(conds: impl IntoIterator<Item = Cond>) -> Cond {
    Cond::All(conds.into_iter().collect())
}

pub fn any_of(conds: impl IntoIterator<Item = Cond>) -> Cond {
    Cond::Any(conds.into_iter().collect())
}

/// The disposition of one syscall.
#[derive(Clone, Debug, PartialEq)]
pub enum Decision<T> {
    /// Let the syscall proceed.
    Allow,
    /// Fail the syscall with this errno. The caller is expected to cope.
    Error(i32),
    /// The syscall was not expected. This is a policy violation.
    Block,
    /// Run a user space handler for the syscall.
    Trap(T),
    /// Branch on the syscall arguments.
    If {
        cond: Cond,
        then: Box<Decision<T>>,
        otherwise: Box<Decision<T>>,
    },
}

/// A resolved terminal disposition.
#[derive(Debug, PartialEq)]
pub enum Verdict<'a, T> {
    Allow,
    Error(i32),
    Block,
    Trap(&'a T),
}

impl<T> Decision<T> {
    /// Walk the tree for concrete arguments.
    pub fn resolve(&self, args: &SyscallArgs) -> Verdict<'_, T> {
        let mut node = self;
        loop {
            match node {
                Self::Allow => return Verdict::Allow,
                Self::Error(e) => return Verdict::Error(*e),
                Self::Block => return Verdict::Block,
                Self::Trap(t) => return Verdict::Trap(t),
                Self::If {
                    cond,
                    then,
                    otherwise,
                } => {
                    node = if cond.eval(args) { then } else { otherwise };
                }
            }
        }
    }

    /// Call `f` on every trap payload in the tree.
    pub fn for_each_trap(&self, f: &mut impl FnMut(&T)) {
        match self {
            Self::Trap(t) => f(t),
            Self::If {
                then, otherwise, ..
            } => {
                then.for_each_trap(f);
                otherwise.for_each_trap(f);
            }
            Self::Allow | Self::Error(_) | Self::Block => (),
        }
    }
}

/// Start an `if / else if / else` chain.
pub fn when<T>(cond: Cond, then: Decision<T>) -> IfChain<T> {
    IfChain {
        arms: vec![(cond, then)],
    }
}

pub struct IfChain<T> {
    arms: Vec<(Cond, Decision<T>)>,
}

impl<T> IfChain<T> {
    pub fn or_when(mut self, cond: Cond, then: Decision<T>) -> Self {
        self.arms.push((cond, then));
        self
    }

    pub fn otherwise(self, otherwise: Decision<T>) -> Decision<T> {
        self.arms
            .into_iter()
            .rev()
            .fold(otherwise, |otherwise, (cond, then)| match cond {
                Cond::Const(true) => then,
                Cond::Const(false) => otherwise,
                cond => Decision::If {
                    cond,
                    then: Box::new(then),
                    otherwise: Box::new(otherwise),
                },
            })
    }
}

/// Start a `switch` on a (masked) argument.
pub fn switch<T>(on: impl Into<Masked>) -> Switch<T> {
    Switch {
        on: on.into(),
        chain: None,
    }
}

pub struct Switch<T> {
    on: Masked,
    chain: Option<IfChain<T>>,
}

impl<T: Clone> Switch<T> {
    pub fn case(mut self, value: impl ArgValue, then: Decision<T>) -> Self {
        let cond = self.on.eq(value);
        self.chain = Some(match self.chain {
            None => when(cond, then),
            Some(chain) => chain.or_when(cond, then),
        });
        self
    }

    pub fn cases<V: ArgValue>(self, values: &[V], then: Decision<T>) -> Self {
        values
            .iter()
            .fold(self, |this, value| this.case(*value, then.clone()))
    }

    pub fn default(self, default: Decision<T>) -> Decision<T> {
        match self.chain {
            None => default,
            Some(chain) => chain.otherwise(default),
        }
    }
}


// vim: ts=4 sw=4 expandtab
