// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for autorename

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::filter::{ImageFilter, DEFAULT_IMAGE_EXTENSIONS};

/// Default wait between a create event and touching the file
pub const DEFAULT_STABILIZATION_MS: u64 = 500;

/// Ordered list of target base names, consumed front to back.
///
/// Persisted as a plain JSON array of strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NamingOrder(Vec<String>);

impl NamingOrder {
    pub fn new(names: Vec<String>) -> Self {
        Self(names)
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Load the naming order from a JSON file.
    ///
    /// A missing file means nothing has been configured yet and yields `None`.
    pub fn load(path: &Path) -> crate::Result<Option<Self>> {
        if !path.exists() {
            tracing::info!("Config file not found at {:?}, naming order not configured", path);
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)?;
        let order: Self = serde_json::from_str(&content)
            .map_err(|e| crate::AutoRenameError::Config(format!("Failed to parse config: {}", e)))?;
        Ok(Some(order))
    }

    /// Save the naming order to a JSON file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl From<Vec<String>> for NamingOrder {
    fn from(names: Vec<String>) -> Self {
        Self(names)
    }
}

/// Tunables for the rename engine
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Delay before a newly created file is renamed
    pub stabilization_delay: Duration,
    /// Extensions (without dot) treated as images
    pub image_extensions: Vec<String>,
}

impl EngineSettings {
    pub fn image_filter(&self) -> ImageFilter {
        ImageFilter::new(&self.image_extensions)
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            stabilization_delay: Duration::from_millis(DEFAULT_STABILIZATION_MS),
            image_extensions: DEFAULT_IMAGE_EXTENSIONS
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}
