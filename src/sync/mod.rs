//! One-way sync from a local directory to an object-storage prefix.
//!
//! The remote prefix is listed up front, the local tree is walked once, and
//! each file is classified against the listing. Uploads and deletes run
//! through a bounded task pool.

pub mod diff;
pub mod engine;
pub mod error;
pub mod exclude;
pub mod executor;
pub mod fingerprint;
pub mod inventory;
pub mod path;
pub mod walker;

pub use diff::{DiffEngine, SkipReason, SyncDecision};
pub use engine::{SyncPhase, SyncSummary, Syncer};
pub use error::{Result, SyncError};
pub use exclude::ExcludePatterns;
pub use executor::{BatchReport, TaskPool};
pub use fingerprint::{fingerprint_bytes, fingerprint_file};
pub use inventory::RemoteInventory;
pub use walker::{LocalFileRecord, LocalWalker, WalkStream};
