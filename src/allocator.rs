// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Per-directory assignment of names from the naming order

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// One planned rename, produced by a successful allocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameEvent {
    /// File that triggered the allocation
    pub source: PathBuf,
    /// Name taken from the naming order (no extension)
    pub name: String,
    /// Final path: directory, name and the source extension
    pub target: PathBuf,
}

/// Why an allocation was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refusal {
    /// Every name has been handed out
    Exhausted,
    /// The path is an earlier rename target or already had its attempt
    Duplicate,
}

impl fmt::Display for Refusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Refusal::Exhausted => f.write_str("naming order exhausted"),
            Refusal::Duplicate => f.write_str("already assigned"),
        }
    }
}

/// Hands out names of one directory's naming order, in order, at most once.
///
/// Owned by a single worker; not meant to be shared.
#[derive(Debug)]
pub struct NameAllocator {
    directory: PathBuf,
    names: Vec<String>,
    next_index: usize,
    consumed: HashSet<PathBuf>,
    attempted: HashSet<PathBuf>,
}

impl NameAllocator {
    /// Allocator for `directory`, handing out `names` front to back
    pub fn new(directory: impl Into<PathBuf>, names: Vec<String>) -> Self {
        Self {
            directory: directory.into(),
            names,
            next_index: 0,
            consumed: HashSet::new(),
            attempted: HashSet::new(),
        }
    }

    /// Directory rename targets are resolved in
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// True once every name has been handed out
    pub fn is_exhausted(&self) -> bool {
        self.next_index == self.names.len()
    }

    /// Number of names handed out so far
    pub fn assigned(&self) -> usize {
        self.next_index
    }

    /// Number of names still available
    pub fn remaining(&self) -> usize {
        self.names.len() - self.next_index
    }

    /// Take the next name for `source`.
    ///
    /// Paths produced as targets are remembered so a rename that shows up
    /// again as a create event does not consume a second slot. A source that
    /// already had its slot stays blocked until [`release`](Self::release):
    /// a file whose rename failed does not get a second name.
    pub fn allocate(&mut self, source: &Path) -> Result<RenameEvent, Refusal> {
        if self.is_exhausted() {
            return Err(Refusal::Exhausted);
        }
        if self.consumed.contains(source) || self.attempted.contains(source) {
            return Err(Refusal::Duplicate);
        }

        let name = self.names[self.next_index].clone();
        let file_name = match source.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{}.{}", name, ext),
            None => name.clone(),
        };
        let target = self.directory.join(file_name);

        self.next_index += 1;
        self.consumed.insert(target.clone());
        self.attempted.insert(source.to_path_buf());

        Ok(RenameEvent {
            source: source.to_path_buf(),
            name,
            target,
        })
    }

    /// Unblock `source` once the file behind it is gone, either renamed
    /// away or removed, so a new file dropped under that name is accepted
    pub fn release(&mut self, source: &Path) {
        self.attempted.remove(source);
    }
}
