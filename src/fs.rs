// Copyright (c) 2026-present, segment-store contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Filesystem helpers for the atomic write-then-rename protocol the segment
//! store relies on for crash safety.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Deletes `path` if it exists, ignoring a `NotFound` error.
pub fn remove_best_effort(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Opens `path` for writing, failing if it already exists.
pub fn create_new(path: &Path) -> io::Result<File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}

/// Renames `from` to `to`. On the platforms this design targets (see the
/// crate's non-goals), a rename within a directory is atomic with respect to
/// concurrent readers and to a crash.
pub fn rename_atomic(from: &Path, to: &Path) -> io::Result<()> {
    fs::rename(from, to)
}

/// Builds the sibling temp path `tmp_<file_name>` used for the write-then-rename
/// protocol, e.g. `3.idx` -> `tmp_3.idx`.
pub fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|name| format!("tmp_{}", name.to_string_lossy()))
        .unwrap_or_else(|| "tmp_".to_string());

    match path.parent() {
        Some(parent) => parent.join(file_name),
        None => PathBuf::from(file_name),
    }
}

/// Returns whether `path` exists.
pub fn exists(path: &Path) -> io::Result<bool> {
    path.try_exists()
}

/// Lists every ordinal `N` for which `{dir}/N.idx` exists, unsorted.
///
/// This is used by the compaction recovery sweep, which must remove every
/// leftover segment file rather than stop at the first gap (see the crate's
/// design notes on `finish_compact`'s recovery sweep).
pub fn scan_ordinals(dir: &Path, idx_ext: &str) -> io::Result<Vec<u64>> {
    let suffix = format!(".{idx_ext}");
    let mut found = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };

        if let Some(stem) = name.strip_suffix(&suffix) {
            if let Ok(ordinal) = stem.parse::<u64>() {
                found.push(ordinal);
            }
        }
    }

    Ok(found)
}
