// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for autorename

use thiserror::Error;

/// Result type alias for autorename operations
pub type Result<T> = std::result::Result<T, AutoRenameError>;

/// autorename error types
#[derive(Error, Debug)]
pub enum AutoRenameError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid session request: {0}")]
    Validation(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Pattern error: {0}")]
    Pattern(#[from] glob::PatternError),
}
