// -*- coding: utf-8 -*-
//
// Copyright (C) 2024 Michael Büsch <m@bues.ch>
//
// Licensed under the Apache License version 2.0
// or the MIT license, at your option.
// SPDX-License-Identifier: Apache-2.0 OR MIT

use anyhow::{self as ah, format_err as err, Context as _};
use std::{
    collections::{btree_map, BTreeMap},
    path::Path,
};

pub type IniSectionIter<'a> = btree_map::Iter<'a, String, String>;

type IniSection = BTreeMap<String, String>;

/// Simple `.ini` file parser.
///
/// A line ending in a backslash continues on the next line.
#[derive(Clone, Debug, Default)]
pub struct Ini {
    sections: BTreeMap<String, IniSection>,
}

impl Ini {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn new_from_file(path: &Path) -> ah::Result<Self> {
        let mut this = Self::new();
        this.read_file(path)?;
        Ok(this)
    }

    pub fn read_file(&mut self, path: &Path) -> ah::Result<()> {
        let buf = std::fs::read(path).context("Read configuration file")?;
        self.parse_bytes(buf)
    }

    pub fn parse_bytes(&mut self, content: Vec<u8>) -> ah::Result<()> {
        self.parse_str(
            &String::from_utf8(content)
                .context("Configuration content file to UTF-8 conversion")?,
        )
    }

    pub fn parse_str(&mut self, content: &str) -> ah::Result<()> {
        let mut sections: BTreeMap<String, IniSection> = BTreeMap::new();
        let mut current: Option<String> = None;
        let mut pending = String::new();

        for raw in content.lines() {
            let raw = raw.trim_start();
            if pending.is_empty() && raw.starts_with('#') {
                continue;
            }
            if let Some(part) = raw.trim_end().strip_suffix('\\') {
                pending.push_str(part);
                continue;
            }
            pending.push_str(raw);
            let line = std::mem::take(&mut pending);
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(name) = line.strip_prefix('[') {
                let Some(name) = name.strip_suffix(']') else {
                    return Err(err!("Invalid section name: '{line}'"));
                };
                let name = name.trim();
                if name.is_empty() {
                    return Err(err!("Section name is empty: '{line}'"));
                }
                if sections.insert(name.to_string(), IniSection::new()).is_some() {
                    return Err(err!("Duplicate section name: '{line}'"));
                }
                current = Some(name.to_string());
                continue;
            }

            let Some(section) = current.as_ref().and_then(|s| sections.get_mut(s)) else {
                return Err(err!("Option is not inside of a section: '{line}'"));
            };
            let Some((name, value)) = line.split_once('=') else {
                return Err(err!("Option has no equal sign '=': '{line}'"));
            };
            let name = name.trim_end();
            if name.is_empty() {
                return Err(err!("Option name is empty: '{line}'"));
            }
            if section
                .insert(name.to_string(), value.trim().to_string())
                .is_some()
            {
                return Err(err!("Duplicate option: '{name}'"));
            }
        }
        if !pending.is_empty() {
            return Err(err!("Line continuation at end of file"));
        }

        self.sections = sections;
        Ok(())
    }

    /// Get the value of an option from the given section.
    pub fn get(&self, section: &str, option: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|s| s.get(option))
            .map(|v| v.as_str())
    }

    /// Get an iterator over all options from a section.
    pub fn options_iter(&self, section: &str) -> Option<IniSectionIter> {
        self.sections.get(section).map(|s| s.iter())
    }
}


// vim: ts=4 sw=4 expandtab
