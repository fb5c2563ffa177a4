// -*- coding: utf-8 -*-
//
// Copyright (C) 2024 Michael Büsch <m@bues.ch>
//
// Licensed under the Apache License version 2.0
// or the MIT license, at your option.
// SPDX-License-Identifier: Apache-2.0 OR MIT

use anyhow as ah;
use sandfilter_conf::Config;
use sandfilter_policy::{
    DenyBroker, FilterState, OpenedFile, OpenedFiles, PolicyParams, ProcessPolicy, ProcessType,
    SandboxInfo,
};
use std::sync::Arc;

/// Everything the commands need to build a policy.
pub struct Setup {
    params: PolicyParams,
}

impl Setup {
    /// Build the policy parameters from the configuration and the running kernel.
    ///
    /// Brokered file system requests are refused, since this tool has no broker.
    /// Pre-opened media files that fail to open are left out.
    pub fn new(conf: &Config, verbose: bool) -> Self {
        let mut files = Vec::with_capacity(conf.media_files().len());
        for path in conf.media_files() {
            match OpenedFile::open(path, false) {
                Ok(file) => files.push(file),
                Err(e) => log::warn!("Media file {path:?} not available: {e}"),
            }
        }

        let mut info = SandboxInfo::detect();
        info.verbose = verbose;

        Self {
            params: PolicyParams {
                broker: Arc::new(DenyBroker),
                files: Arc::new(OpenedFiles::new(files)),
                content: conf.content_params(),
                socket: conf.socket_params(),
                info,
                filter_state: Arc::new(FilterState::new()),
            },
        }
    }

    pub fn params(&self) -> &PolicyParams {
        &self.params
    }

    pub fn policy(&self, ty: ProcessType) -> ah::Result<ProcessPolicy> {
        ProcessPolicy::new(ty, &self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("present.so");
        std::fs::write(&present, b"\x7fELF").unwrap();
        let missing = dir.path().join("missing.so");

        let mut conf = Config::new();
        conf.load_str(&format!(
            "[CONTENT]\nlevel = 3\n[MEDIA]\nfiles = {}, {}\n",
            present.display(),
            missing.display()
        ))
        .unwrap();

        let setup = Setup::new(&conf, true);
        assert_eq!(setup.params().files.len(), 1);
        assert_eq!(setup.params().content.level, 3);
        assert!(setup.params().info.verbose);
        for ty in ProcessType::ALL {
            assert_eq!(setup.policy(ty).unwrap().process_type(), ty);
        }
    }
}

// vim: ts=4 sw=4 expandtab
