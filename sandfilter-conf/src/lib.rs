// -*- coding: utf-8 -*-
//
// Copyright (C) 2024 Michael Büsch <m@bues.ch>
//
// Licensed under the Apache License version 2.0
// or the MIT license, at your option.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! This crate implements the configuration file parsing of `sandfilter`.
//!
//! Defaults for missing configuration files
//! or missing individual configuration entries are implemented here.

#![forbid(unsafe_code)]

mod ini;

use crate::ini::Ini;
use anyhow::{self as ah, format_err as err, Context as _};
use sandfilter_bpf::Action;
use sandfilter_policy::{ContentParams, SocketParams};
use std::path::{Path, PathBuf};

/// The default configuration path, relative to the install prefix.
const CONF_PATH: &str = "etc/sandfilter.conf";

const DEFAULT_CONTENT_LEVEL: u32 = 4;
const MIN_CONTENT_LEVEL: u32 = 2;
const DEFAULT_SOCKET_LEVEL: u32 = 2;

/// Raw SysV IPC is permitted for content processes, if this is set.
pub const ENV_ALLOW_SYSV: &str = "SANDBOX_ALLOW_SYSV";

/// Set while a RenderDoc capture is active.
pub const ENV_RENDERDOC: &str = "RENDERDOC_CAPTUREOPTS";

fn parse_bool(s: &str) -> ah::Result<bool> {
    let s = s.to_lowercase();
    let s = s.trim();
    match s {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(err!("Invalid boolean string")),
    }
}

fn parse_u32(s: &str) -> ah::Result<u32> {
    let s = s.trim();
    if let Some(s) = s.strip_prefix("0x") {
        Ok(u32::from_str_radix(s, 16)?)
    } else {
        Ok(s.parse::<u32>()?)
    }
}

fn parse_nr(s: &str) -> ah::Result<i64> {
    let s = s.trim();
    let nr = if let Some(s) = s.strip_prefix("0x") {
        i64::from_str_radix(s, 16)?
    } else {
        s.parse::<i64>()?
    };
    if nr < 0 {
        return Err(err!("Syscall number {nr} is negative"));
    }
    Ok(nr)
}

fn parse_abs_path(s: &str) -> ah::Result<PathBuf> {
    let path = PathBuf::from(s.trim());
    if !path.is_absolute() {
        return Err(err!("Path {path:?} is not absolute"));
    }
    Ok(path)
}

/// Split a comma separated string into a vec:
/// "a, b, c" -> vec!["a", " b", " c"]
/// A conversion function is applied before inserting into the vec.
fn split_commaitems<T, F>(value: &str, conv: F) -> ah::Result<Vec<T>>
where
    F: Fn(&str) -> ah::Result<T>,
{
    if value.trim().is_empty() {
        return Ok(vec![]);
    }
    let mut ret = Vec::with_capacity(8);
    for item in value.split(',') {
        ret.push(conv(item)?);
    }
    Ok(ret)
}

/// All options each section knows about.
const KNOWN_OPTIONS: [(&str, &[&str]); 4] = [
    ("GENERAL", &["verbose", "action"]),
    ("CONTENT", &["level", "syscall-allow"]),
    ("SOCKET", &["level"]),
    ("MEDIA", &["files"]),
];

fn check_options(ini: &Ini) -> ah::Result<()> {
    for (section, known) in KNOWN_OPTIONS {
        let Some(options) = ini.options_iter(section) else {
            continue;
        };
        for (name, _) in options {
            if !known.contains(&name.as_str()) {
                return Err(err!("[{section}] Unknown option '{name}'"));
            }
        }
    }
    Ok(())
}

fn get_verbose(ini: &Ini) -> ah::Result<bool> {
    if let Some(verbose) = ini.get("GENERAL", "verbose") {
        return parse_bool(verbose).context("[GENERAL] verbose");
    }
    Ok(false)
}

fn get_action(ini: &Ini) -> ah::Result<Action> {
    if let Some(action) = ini.get("GENERAL", "action") {
        return action.parse().context("[GENERAL] action");
    }
    Ok(Default::default())
}

fn get_content_level(ini: &Ini) -> ah::Result<u32> {
    if let Some(level) = ini.get("CONTENT", "level") {
        let level = parse_u32(level).context("[CONTENT] level")?;
        if level < MIN_CONTENT_LEVEL {
            return Err(err!(
                "[CONTENT] level = {level} is not valid. The minimum is {MIN_CONTENT_LEVEL}."
            ));
        }
        return Ok(level);
    }
    Ok(DEFAULT_CONTENT_LEVEL)
}

fn get_syscall_allow(ini: &Ini) -> ah::Result<Vec<i64>> {
    if let Some(list) = ini.get("CONTENT", "syscall-allow") {
        return split_commaitems(list, parse_nr).context("[CONTENT] syscall-allow");
    }
    Ok(vec![])
}

fn get_socket_level(ini: &Ini) -> ah::Result<u32> {
    if let Some(level) = ini.get("SOCKET", "level") {
        return parse_u32(level).context("[SOCKET] level");
    }
    Ok(DEFAULT_SOCKET_LEVEL)
}

fn get_media_files(ini: &Ini) -> ah::Result<Vec<PathBuf>> {
    if let Some(files) = ini.get("MEDIA", "files") {
        return split_commaitems(files, parse_abs_path).context("[MEDIA] files");
    }
    Ok(vec![])
}

/// Parsed sandfilter.conf.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    path: Option<PathBuf>,
    verbose: bool,
    action: Action,
    content_level: u32,
    syscall_allow: Vec<i64>,
    socket_level: u32,
    media_files: Vec<PathBuf>,
    allow_sysv: bool,
    using_renderdoc: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Create a new configuration instance with all-default values.
    pub fn new() -> Self {
        Self {
            path: None,
            verbose: false,
            action: Default::default(),
            content_level: DEFAULT_CONTENT_LEVEL,
            syscall_allow: vec![],
            socket_level: DEFAULT_SOCKET_LEVEL,
            media_files: vec![],
            allow_sysv: false,
            using_renderdoc: false,
        }
    }

    /// Get the default configuration file path.
    pub fn get_default_path() -> PathBuf {
        // The build-time environment variable SANDFILTER_CONF_PREFIX can be
        // used to give an additional prefix.
        let prefix = option_env!("SANDFILTER_CONF_PREFIX").unwrap_or("/");
        let mut path = PathBuf::new();
        path.push(prefix);
        path.push(CONF_PATH);
        path
    }

    /// Get the actual path the configuration was read from.
    pub fn get_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// (Re-)load a configuration from a file.
    pub fn load(&mut self, path: &Path) -> ah::Result<()> {
        let ini = Ini::new_from_file(path)
            .with_context(|| format!("Failed to load configuration {path:?}"))?;
        self.load_ini(&ini)?;
        self.path = Some(path.to_path_buf());
        Ok(())
    }

    /// (Re-)load a configuration from a string.
    pub fn load_str(&mut self, content: &str) -> ah::Result<()> {
        let mut ini = Ini::new();
        ini.parse_str(content)?;
        self.load_ini(&ini)
    }

    /// (Re-)load a configuration from a parsed [Ini] instance.
    fn load_ini(&mut self, ini: &Ini) -> ah::Result<()> {
        check_options(ini)?;
        let verbose = get_verbose(ini)?;
        let action = get_action(ini)?;
        let content_level = get_content_level(ini)?;
        let syscall_allow = get_syscall_allow(ini)?;
        let socket_level = get_socket_level(ini)?;
        let media_files = get_media_files(ini)?;

        self.verbose = verbose;
        self.action = action;
        self.content_level = content_level;
        self.syscall_allow = syscall_allow;
        self.socket_level = socket_level;
        self.media_files = media_files;
        Ok(())
    }

    /// Apply the environment escape hatches from the process environment.
    pub fn load_env(&mut self) {
        self.load_vars(|name| std::env::var_os(name).is_some());
    }

    /// Apply the environment escape hatches.
    ///
    /// `is_set` tells whether the named variable is present.
    pub fn load_vars<F>(&mut self, is_set: F)
    where
        F: Fn(&str) -> bool,
    {
        self.allow_sysv = is_set(ENV_ALLOW_SYSV);
        self.using_renderdoc = is_set(ENV_RENDERDOC);
    }

    /// Get the `verbose` option from `[GENERAL]` section.
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Get the `action` option from `[GENERAL]` section.
    pub fn action(&self) -> Action {
        self.action
    }

    /// Get the `level` option from `[CONTENT]` section.
    pub fn content_level(&self) -> u32 {
        self.content_level
    }

    /// Get the `syscall-allow` option from `[CONTENT]` section.
    pub fn syscall_allow(&self) -> &[i64] {
        &self.syscall_allow
    }

    /// Get the `level` option from `[SOCKET]` section.
    pub fn socket_level(&self) -> u32 {
        self.socket_level
    }

    /// Get the `files` option from `[MEDIA]` section.
    pub fn media_files(&self) -> &[PathBuf] {
        &self.media_files
    }

    /// Content policy tunables from the file and the environment.
    pub fn content_params(&self) -> ContentParams {
        ContentParams {
            level: self.content_level,
            syscall_allow: self.syscall_allow.clone(),
            allow_sysv: self.allow_sysv,
            using_renderdoc: self.using_renderdoc,
        }
    }

    /// Socket policy tunables.
    pub fn socket_params(&self) -> SocketParams {
        SocketParams {
            level: self.socket_level,
        }
    }
}


// vim: ts=4 sw=4 expandtab
