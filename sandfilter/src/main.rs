// -*- coding: utf-8 -*-
//
// Copyright (C) 2024 Michael Büsch <m@bues.ch>
//
// Licensed under the Apache License version 2.0
// or the MIT license, at your option.
// SPDX-License-Identifier: Apache-2.0 OR MIT

#![forbid(unsafe_code)]

mod command;
mod setup;

use crate::{
    command::{check::run_check, compile::run_compile, dump::run_dump},
    setup::Setup,
};
use anyhow::{self as ah, format_err as err, Context as _};
use clap::{CommandFactory as _, Parser, Subcommand};
use sandfilter_bpf::Action;
use sandfilter_conf::Config;
use sandfilter_policy::ProcessType;
use std::path::PathBuf;

/// Parse a syscall argument word. Accepts decimal, `0x` hex and negative numbers.
fn parse_word(s: &str) -> ah::Result<u64> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x") {
        Ok(u64::from_str_radix(hex, 16)?)
    } else if s.starts_with('-') {
        Ok(s.parse::<i64>()? as u64)
    } else {
        Ok(s.parse::<u64>()?)
    }
}

#[derive(Parser, Debug)]
struct Opts {
    /// Override the default path to the configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Show detailed information about what happens internally.
    #[arg(long)]
    verbose: bool,

    /// Override the `action` setting from the configuration file.
    ///
    /// This is what the filter does for blocked syscalls:
    /// trap, kill or log.
    #[arg(long)]
    action: Option<Action>,

    #[command(subcommand)]
    command: Option<Command>,

    /// Show version information and exit.
    #[arg(long, short = 'v')]
    version: bool,
}

impl Opts {
    /// Get the configuration path from command line or default.
    pub fn get_config(&self) -> PathBuf {
        if let Some(config) = &self.config {
            config.clone()
        } else {
            Config::get_default_path()
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the rule of every syscall the policy does not block outright.
    Dump {
        /// The process type: content, media, rdd, socket or utility.
        #[arg(long, short)]
        process: ProcessType,
    },

    /// Evaluate one syscall with concrete arguments.
    ///
    /// The decision tree and the compiled BPF program are both consulted.
    Check {
        /// The process type: content, media, rdd, socket or utility.
        #[arg(long, short)]
        process: ProcessType,

        /// The syscall number.
        nr: i64,

        /// Up to six argument words. Missing ones are zero.
        #[arg(num_args = 0..=6, value_parser = parse_word)]
        args: Vec<u64>,
    },

    /// Compile the policy into a BPF program and write it to a file.
    Compile {
        /// The process type: content, media, rdd, socket or utility.
        #[arg(long, short)]
        process: ProcessType,

        /// The output file.
        #[arg(long, short)]
        out: PathBuf,
    },
}

fn main() -> ah::Result<()> {
    let opts = Opts::parse();

    if opts.version {
        println!("sandfilter version {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let level = if opts.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    // Read the sandfilter.conf configuration file, if there is one.
    let mut conf = Config::new();
    let path = opts.get_config();
    if opts.config.is_some() || path.exists() {
        conf.load(&path).context("Configuration file")?;
    }
    conf.load_env();
    let action = opts.action.unwrap_or(conf.action());
    let setup = Setup::new(&conf, opts.verbose || conf.verbose());

    match opts.command {
        Some(Command::Dump { process }) => run_dump(&setup, process),
        Some(Command::Check { process, nr, args }) => {
            run_check(&setup, process, action, nr, &args)
        }
        Some(Command::Compile { process, out }) => run_compile(&setup, process, action, &out),
        None => {
            Opts::command()
                .print_help()
                .context("Failed to print help")?;
            println!();
            Err(err!(
                "'sandfilter' requires a subcommand but one was not provided. \
                Please run 'sandfilter --help' for more information."
            ))
        }
    }
}


// vim: ts=4 sw=4 expandtab
