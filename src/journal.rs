// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Append-only log of completed renames
//!
//! One JSON object per line, written as `Renamed` events arrive. Entries
//! carry the watched directory so a listing can be narrowed to one folder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::worker::SessionEvent;
use crate::Result;

/// A single completed rename
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub directory: PathBuf,
    pub original_path: PathBuf,
    pub new_path: PathBuf,
    pub name: String,
}

impl JournalEntry {
    pub fn new(directory: PathBuf, original_path: PathBuf, new_path: PathBuf, name: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            directory,
            original_path,
            new_path,
            name,
        }
    }

    /// Entry for a successful rename; other events are not journaled
    pub fn from_event(event: &SessionEvent) -> Option<Self> {
        match event {
            SessionEvent::Renamed { target, from, to, name } => Some(Self::new(
                target.resolved(),
                from.clone(),
                to.clone(),
                name.clone(),
            )),
            _ => None,
        }
    }

    /// Whether this rename happened in `directory`.
    ///
    /// A relative `directory` matches by trailing components, so the bare
    /// subdirectory name picks out its renames across working folders.
    pub fn is_in(&self, directory: &Path) -> bool {
        self.directory == directory || (directory.is_relative() && self.directory.ends_with(directory))
    }
}

/// JSON-lines rename journal
pub struct RenameJournal {
    path: PathBuf,
}

impl RenameJournal {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Append an entry to the journal
    pub fn append(&self, entry: &JournalEntry) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let json = serde_json::to_string(entry)?;
        writeln!(file, "{}", json)?;

        Ok(())
    }

    /// Journal `event` if it is a completed rename; returns whether it was
    pub fn record(&self, event: &SessionEvent) -> Result<bool> {
        match JournalEntry::from_event(event) {
            Some(entry) => self.append(&entry).map(|_| true),
            None => Ok(false),
        }
    }

    /// Read all journal entries, oldest first
    pub fn read_all(&self) -> Result<Vec<JournalEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&self.path)?);
        let mut entries = Vec::new();
        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::warn!("Skipping journal line {}: {}", number + 1, e),
            }
        }
        Ok(entries)
    }

    /// Newest `count` renames, optionally only those made in `directory`
    pub fn recent(&self, count: usize, directory: Option<&Path>) -> Result<Vec<JournalEntry>> {
        Ok(self
            .read_all()?
            .into_iter()
            .rev()
            .filter(|entry| directory.map_or(true, |dir| entry.is_in(dir)))
            .take(count)
            .collect())
    }

    /// Number of journaled renames per watched directory
    pub fn counts_by_directory(&self) -> Result<BTreeMap<PathBuf, usize>> {
        let mut counts = BTreeMap::new();
        for entry in self.read_all()? {
            *counts.entry(entry.directory).or_insert(0) += 1;
        }
        Ok(counts)
    }

    /// Remove the journal file
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    /// Location of the journal file
    pub fn path(&self) -> &Path {
        &self.path
    }
}
