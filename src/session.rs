// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Session input validation and workspace preparation

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

use crate::config::NamingOrder;
use crate::{AutoRenameError, Result};

/// One directory to monitor: `root/subdirectory`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct WatchTarget {
    pub root: PathBuf,
    pub subdirectory: String,
}

impl WatchTarget {
    pub fn new(root: impl Into<PathBuf>, subdirectory: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            subdirectory: subdirectory.into(),
        }
    }

    /// Directory actually watched
    pub fn resolved(&self) -> PathBuf {
        self.root.join(&self.subdirectory)
    }
}

impl fmt::Display for WatchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.resolved().display())
    }
}

/// Everything needed to start monitoring
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub root: PathBuf,
    pub subdirectories: Vec<String>,
    pub naming_order: NamingOrder,
}

impl SessionRequest {
    pub fn new(root: impl Into<PathBuf>, subdirectories: Vec<String>, naming_order: NamingOrder) -> Self {
        Self {
            root: root.into(),
            subdirectories,
            naming_order,
        }
    }

    /// Reject bad input before anything touches the disk
    pub fn validate(&self) -> Result<()> {
        if self.root.as_os_str().is_empty() {
            return Err(invalid("working folder is empty"));
        }
        if !self.root.exists() {
            return Err(invalid(format!("working folder {:?} does not exist", self.root)));
        }
        if !self.root.is_dir() {
            return Err(invalid(format!("working folder {:?} is not a directory", self.root)));
        }

        if self.subdirectories.is_empty() {
            return Err(invalid("no subdirectories given"));
        }
        let mut seen = HashSet::new();
        for sub in &self.subdirectories {
            if sub.trim().is_empty() {
                return Err(invalid("subdirectory name is empty"));
            }
            if !is_plain_name(sub) {
                return Err(invalid(format!("subdirectory {:?} must be a single folder name", sub)));
            }
            if !seen.insert(sub.as_str()) {
                return Err(invalid(format!("subdirectory {:?} listed twice", sub)));
            }
        }

        if let Some(pos) = self.naming_order.names().iter().position(|n| n.trim().is_empty()) {
            return Err(invalid(format!("naming order entry {} is empty", pos + 1)));
        }

        Ok(())
    }

    /// Targets in the order the subdirectories were given
    pub fn targets(&self) -> Vec<WatchTarget> {
        self.subdirectories
            .iter()
            .map(|sub| WatchTarget::new(&self.root, sub.as_str()))
            .collect()
    }

    /// Validate, optionally clear the working folder, then create every
    /// subdirectory. Returns the targets ready to watch.
    pub fn prepare_workspace(&self, clear_existing: bool) -> Result<Vec<WatchTarget>> {
        self.validate()?;

        if clear_existing {
            let removed = clear_directory(&self.root)?;
            info!("Cleared {} entries from {:?}", removed, self.root);
        }

        let targets = self.targets();
        for target in &targets {
            let dir = target.resolved();
            std::fs::create_dir_all(&dir)?;
            debug!("Ready: {:?}", dir);
        }

        Ok(targets)
    }
}

fn invalid(msg: impl Into<String>) -> AutoRenameError {
    AutoRenameError::Validation(msg.into())
}

fn is_plain_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Remove every entry directly under `dir`, recursing into directories.
/// Returns the number of top-level entries removed.
pub fn clear_directory(dir: &Path) -> Result<usize> {
    let pattern = glob::Pattern::escape(&dir.to_string_lossy());
    let pattern = format!("{}/*", pattern);

    let mut removed = 0;
    for entry in glob::glob(&pattern)? {
        let path = match entry {
            Ok(p) => p,
            Err(e) => return Err(e.into_error().into()),
        };
        let meta = std::fs::symlink_metadata(&path)?;
        if meta.is_dir() {
            std::fs::remove_dir_all(&path)?;
        } else {
            std::fs::remove_file(&path)?;
        }
        removed += 1;
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;
    use tokio_test::{assert_err, assert_ok};

    fn order(list: &[&str]) -> NamingOrder {
        NamingOrder::new(list.iter().map(|s| s.to_string()).collect())
    }

    fn subs(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_valid_request() {
        let dir = tempdir().unwrap();
        let req = SessionRequest::new(dir.path(), subs(&["a", "b"]), order(&["001"]));
        assert_ok!(req.validate());
    }

    #[test]
    fn test_rejects_bad_root() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("file.txt");
        fs::write(&file, b"x").unwrap();

        for root in [PathBuf::new(), dir.path().join("missing"), file] {
            let req = SessionRequest::new(root, subs(&["a"]), order(&["001"]));
            assert!(matches!(req.validate(), Err(AutoRenameError::Validation(_))));
        }
    }

    #[test]
    fn test_rejects_bad_subdirectories() {
        let dir = tempdir().unwrap();
        let cases: [&[&str]; 6] = [&[], &[""], &["  "], &["a", "a"], &["../up"], &["a/b"]];
        for case in cases {
            let req = SessionRequest::new(dir.path(), subs(case), order(&["001"]));
            assert_err!(req.validate(), "{:?}", case);
        }
    }

    #[test]
    fn test_rejects_empty_name_entry() {
        let dir = tempdir().unwrap();
        let req = SessionRequest::new(dir.path(), subs(&["a"]), order(&["001", ""]));
        let err = req.validate().unwrap_err();
        assert!(err.to_string().contains("entry 2"));
    }

    #[test]
    fn test_empty_naming_order_is_allowed() {
        let dir = tempdir().unwrap();
        let req = SessionRequest::new(dir.path(), subs(&["a"]), NamingOrder::default());
        assert_ok!(req.validate());
    }

    #[test]
    fn test_prepare_clears_root_and_creates_subdirectories() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("stale.jpg"), b"x").unwrap();
        fs::write(root.join(".hidden"), b"x").unwrap();
        fs::create_dir_all(root.join("old/nested")).unwrap();
        fs::write(root.join("old/nested/deep.png"), b"x").unwrap();

        let req = SessionRequest::new(root, subs(&["a", "b"]), order(&["001"]));
        let targets = req.prepare_workspace(true).unwrap();

        assert_eq!(targets, vec![WatchTarget::new(root, "a"), WatchTarget::new(root, "b")]);
        let mut left: Vec<_> = fs::read_dir(root)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        left.sort();
        assert_eq!(left, vec!["a", "b"]);
    }

    #[test]
    fn test_prepare_tolerates_existing_subdirectory() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("a")).unwrap();
        fs::write(root.join("a/keep.jpg"), b"x").unwrap();

        let req = SessionRequest::new(root, subs(&["a"]), order(&["001"]));
        req.prepare_workspace(false).unwrap();

        assert!(root.join("a/keep.jpg").exists());
    }

    #[test]
    fn test_validation_runs_before_clearing() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("precious.jpg"), b"x").unwrap();

        let req = SessionRequest::new(root, subs(&["a", ""]), order(&["001"]));
        assert_err!(req.prepare_workspace(true));
        assert!(root.join("precious.jpg").exists());
    }

    #[test]
    fn test_target_display_is_resolved_path() {
        let target = WatchTarget::new("/work", "a");
        assert_eq!(target.resolved(), PathBuf::from("/work/a"));
        assert_eq!(target.to_string(), "/work/a");
    }
}
