//! # payload-dl
//!
//! Library-first orchestrator for OTA payload partition extraction.
//!
//! ## Design Philosophy
//!
//! payload-dl is designed to be:
//! - **Engine-agnostic** - the extraction engine is a pluggable black box
//! - **Sensible defaults** - works out of the box with zero configuration
//! - **Library-first** - no CLI or UI, purely a Rust crate for embedding
//! - **Snapshot-driven** - observers re-render from full state snapshots,
//!   no delta tracking required
//!
//! The orchestrator owns what the engine does not: concurrency admission
//! control, per-partition cooperative cancellation, progress aggregation,
//! and post-extraction hash verification, over a set of extraction jobs
//! whose count is only known once a manifest is loaded.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use payload_dl::{Config, ExtractSession, SourceKind};
//! use payload_dl::engine::CliEngine;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = Arc::new(CliEngine::from_path().ok_or("payload-dumper not found")?);
//!     let session = ExtractSession::new(SourceKind::LocalPayload, Config::default(), engine);
//!
//!     // Subscribe to state snapshots
//!     let mut snapshots = session.subscribe();
//!     tokio::spawn(async move {
//!         while snapshots.changed().await.is_ok() {
//!             let snapshot = snapshots.borrow().clone();
//!             for (name, state) in &snapshot.partitions {
//!                 println!("{}: {} ({:.0}%)", name, state.status, state.progress);
//!             }
//!         }
//!     });
//!
//!     session.load_manifest("/path/to/payload.bin", None).await?;
//!     session.select_all();
//!     session.request_batch_extraction();
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// External extraction engine boundary
pub mod engine;
/// Error types
pub mod error;
/// Payload manifest parsing
pub mod manifest;
/// Extraction session orchestration (decomposed into focused submodules)
pub mod session;
/// Core state and snapshot types
pub mod types;

pub(crate) mod state;
pub(crate) mod verify;

// Re-export commonly used types
pub use config::{Config, ConcurrencyLimit, EngineConfig, ExtractionConfig, NetworkConfig};
pub use engine::{CliEngine, EngineEvent, ExtractRequest, PayloadEngine, SourceSpec};
pub use error::{EngineError, Error, ManifestError, Result};
pub use manifest::{Partition, PayloadManifest};
pub use session::ExtractSession;
pub use types::{PartitionState, SessionPhase, SessionSnapshot, SourceKind};
