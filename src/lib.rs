// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! autorename: sequential renaming of images dropped into watched folders
//!
//! Each watched subdirectory hands out the names of a user-defined naming
//! order, in order, to image files as they appear. A session ends once every
//! directory has used up its names or the session is cancelled.

pub mod allocator;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod filter;
pub mod journal;
pub mod session;
pub mod watcher;
pub mod worker;

pub use config::{EngineSettings, NamingOrder};
pub use coordinator::{MonitorCoordinator, SessionHandle, SessionReport};
pub use error::{AutoRenameError, Result};
pub use session::{SessionRequest, WatchTarget};
pub use worker::{SessionEvent, WorkerOutcome};
