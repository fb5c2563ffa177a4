// -*- coding: utf-8 -*-
//
// Copyright (C) 2024 Michael Büsch <m@bues.ch>
//
// Licensed under the Apache License version 2.0
// or the MIT license, at your option.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Files opened before the sandbox is entered.
//!
//! The media policy has no broker. Everything it may open is opened up front
//! and handed out by path from this table.

use crate::kernel::{neg, Kernel};
use anyhow::{self as ah, Context as _};
use std::{
    ffi::{CStr, CString},
    fs::File,
    os::{
        fd::{FromRawFd as _, IntoRawFd as _, OwnedFd, RawFd},
        unix::ffi::OsStrExt as _,
    },
    path::Path,
    sync::atomic::{AtomicI32, Ordering},
};

#[derive(Debug)]
pub struct OpenedFile {
    path: CString,
    fd: AtomicI32,
    dup: bool,
}

impl OpenedFile {
    /// Open `path` read-only.
    ///
    /// With `dup` every request gets a duplicate of the descriptor.
    /// Otherwise the descriptor is handed out exactly once.
    pub fn open(path: &Path, dup: bool) -> ah::Result<Self> {
        let file = File::open(path).context(format!("Open pre-opened file {path:?}"))?;
        Self::from_fd(
            CString::new(path.as_os_str().as_bytes()).context("Pre-opened file path")?,
            file.into(),
            dup,
        )
    }

    pub fn from_fd(path: CString, fd: OwnedFd, dup: bool) -> ah::Result<Self> {
        if path.as_bytes().first() != Some(&b'/') {
            return Err(ah::format_err!(
                "Pre-opened file path {path:?} is not absolute"
            ));
        }
        Ok(Self {
            path,
            fd: AtomicI32::new(fd.into_raw_fd()),
            dup,
        })
    }

    pub fn path(&self) -> &CStr {
        &self.path
    }

    fn take(&self, kernel: &dyn Kernel) -> isize {
        if self.dup {
            let fd = self.fd.load(Ordering::Acquire);
            if fd < 0 {
                return neg(libc::EBADF);
            }
            return kernel.dup(fd);
        }
        let fd = self.fd.swap(-1, Ordering::AcqRel);
        if fd < 0 {
            log::warn!(
                "Pre-opened file {} was already used",
                self.path.to_string_lossy()
            );
            return neg(libc::ENOENT);
        }
        fd as isize
    }

    fn peek(&self) -> Option<RawFd> {
        let fd = self.fd.load(Ordering::Acquire);
        (fd >= 0).then_some(fd)
    }
}

impl Drop for OpenedFile {
    fn drop(&mut self) {
        let fd = self.fd.swap(-1, Ordering::AcqRel);
        if fd >= 0 {
            // SAFETY: The descriptor was never handed out, so we still own it.
            drop(unsafe { OwnedFd::from_raw_fd(fd) });
        }
    }
}

/// Lookup table of pre-opened files.
#[derive(Debug, Default)]
pub struct OpenedFiles(Vec<OpenedFile>);

impl OpenedFiles {
    pub fn new(files: Vec<OpenedFile>) -> Self {
        Self(files)
    }

    fn find(&self, path: &CStr) -> Option<&OpenedFile> {
        let file = self.0.iter().find(|f| f.path() == path);
        if file.is_none() {
            log::warn!(
                "Attempt to open unexpected file {}",
                path.to_string_lossy()
            );
        }
        file
    }

    /// Hand out the descriptor for `path`, or `-ENOENT`.
    pub fn take(&self, path: &CStr, kernel: &dyn Kernel) -> isize {
        match self.find(path) {
            Some(file) => file.take(kernel),
            None => neg(libc::ENOENT),
        }
    }

    /// The descriptor for `path`, still owned by the table.
    pub fn peek(&self, path: &CStr) -> Option<RawFd> {
        self.find(path)?.peek()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::Linux;
    use std::io::Write as _;

    fn scratch() -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"plugin").unwrap();
        f
    }

    #[test]
    fn test_take_once() {
        let f = scratch();
        let files = OpenedFiles::new(vec![OpenedFile::open(f.path(), false).unwrap()]);
        let path = CString::new(f.path().as_os_str().as_bytes()).unwrap();
        assert!(files.peek(&path).is_some());
        let fd = files.take(&path, &Linux);
        assert!(fd >= 0);
        assert_eq!(files.take(&path, &Linux), neg(libc::ENOENT));
        assert!(files.peek(&path).is_none());
        drop(unsafe { OwnedFd::from_raw_fd(fd as RawFd) });
    }

    #[test]
    fn test_take_dup() {
        let f = scratch();
        let files = OpenedFiles::new(vec![OpenedFile::open(f.path(), true).unwrap()]);
        let path = CString::new(f.path().as_os_str().as_bytes()).unwrap();
        let fd1 = files.take(&path, &Linux);
        let fd2 = files.take(&path, &Linux);
        assert!(fd1 >= 0 && fd2 >= 0 && fd1 != fd2);
        Linux.close(fd1 as i32);
        Linux.close(fd2 as i32);
    }

    #[test]
    fn test_unknown_path() {
        let files = OpenedFiles::default();
        assert_eq!(files.take(c"/nope", &Linux), neg(libc::ENOENT));
        assert!(files.is_empty());
    }

    #[test]
    fn test_relative_path_rejected() {
        let fd: OwnedFd = tempfile::tempfile().unwrap().into();
        assert!(OpenedFile::from_fd(c"rel/lib.so".into(), fd, false).is_err());
    }
}

// vim: ts=4 sw=4 expandtab
