//! External extraction engine boundary
//!
//! The engine is a black box that reads a payload source and writes decoded
//! partition images to disk. This module defines the interface the
//! orchestrator consumes and nothing about how bytes are decoded.
//!
//! Engine calls are long-running and blocking from the orchestrator's point
//! of view; the session runs them inside `spawn_blocking`. Progress arrives
//! through a push-style callback whose return value is the engine's stop
//! signal (`false` = stop at the next opportunity).
//!
//! Severity of engine notices is decided *here*, once, at the adapter
//! boundary: implementations translate whatever loose status vocabulary their
//! engine speaks into the closed [`EngineEvent`] union. Nothing deeper in the
//! stack pattern-matches message text.

mod cli;

pub use cli::CliEngine;

use std::path::PathBuf;

use crate::error::Result;
use crate::types::SourceKind;

/// Addressable payload source plus the network identity used to reach it
#[derive(Clone, Debug)]
pub struct SourceSpec {
    /// Filesystem path or URL, depending on `kind`
    pub locator: String,
    /// How the locator should be interpreted
    pub kind: SourceKind,
    /// User-Agent for remote sources
    pub user_agent: Option<String>,
    /// Auth cookie for remote sources
    pub cookie: Option<String>,
}

/// One "extract this partition to this path" request
#[derive(Clone, Debug)]
pub struct ExtractRequest {
    /// Where the payload lives
    pub source: SourceSpec,
    /// Partition to extract
    pub partition: String,
    /// Where the decoded image must be written
    pub output_path: PathBuf,
    /// Patch-base directory for incremental partitions
    pub source_dir: Option<PathBuf>,
}

/// Closed union of everything an engine can report mid-extraction
///
/// `Warning` never stops the extraction; `Fatal` always does.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    /// Extraction of the partition has begun
    Started,
    /// Incremental progress
    Progress {
        /// Install operation currently being applied
        current_op: u64,
        /// Total install operations for this partition
        total_ops: u64,
        /// Overall percentage, 0.0 to 100.0
        percent: f64,
    },
    /// All operations applied, output file complete
    Completed,
    /// Non-fatal notice; extraction continues
    Warning(String),
    /// Fatal condition; the engine will stop and the output is unusable
    Fatal(String),
}

/// Interface to the external extraction engine
///
/// Implementations are free to shell out to a binary, call into a native
/// library, or script behavior for tests. Both operations are blocking and
/// must only be called from a blocking-friendly context.
pub trait PayloadEngine: Send + Sync {
    /// Enumerate the partitions in a source.
    ///
    /// Potentially slow (a network fetch for remote sources). Returns the
    /// manifest in its serialized JSON form; parsing is the orchestrator's
    /// job so the raw text can be surfaced to observers verbatim.
    fn list_partitions(&self, source: &SourceSpec) -> Result<String>;

    /// Extract one partition, reporting progress through `on_event`.
    ///
    /// The callback is invoked repeatedly until completion, a fatal notice,
    /// or a `false` return (the cooperative stop signal). Returning `Ok` does
    /// not by itself mean the output is good; the caller decides the outcome
    /// from the events it observed.
    fn extract_partition(
        &self,
        request: &ExtractRequest,
        on_event: &mut dyn FnMut(EngineEvent) -> bool,
    ) -> Result<()>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
