//! Core types for payload-dl

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::manifest::{Partition, PayloadManifest};

/// Kind of payload source a session operates on
///
/// Local and remote sources go through different engine entry points; archive
/// kinds point at a ZIP (or similar) wrapper that contains the payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// A payload file on the local filesystem
    LocalPayload,
    /// A local archive (e.g., OTA zip) wrapping a payload
    LocalArchive,
    /// A payload addressed by URL
    RemotePayload,
    /// A remote archive addressed by URL
    RemoteArchive,
}

impl SourceKind {
    /// Whether the locator is a URL rather than a filesystem path
    pub fn is_remote(&self) -> bool {
        matches!(self, SourceKind::RemotePayload | SourceKind::RemoteArchive)
    }

    /// Whether the payload is wrapped in an archive
    pub fn is_archive(&self) -> bool {
        matches!(self, SourceKind::LocalArchive | SourceKind::RemoteArchive)
    }

    /// Short label used for output directory naming and logging
    pub fn label(&self) -> &'static str {
        if self.is_remote() { "remote" } else { "local" }
    }
}

/// Session lifecycle phase
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "lowercase")]
pub enum SessionPhase {
    /// No source loaded
    Idle,
    /// Manifest listing in flight
    Loading,
    /// Manifest loaded, partitions available
    Loaded,
    /// Manifest load failed
    Error {
        /// Human-readable failure message
        message: String,
    },
}

/// Mutable per-partition lifecycle state, owned exclusively by the session
///
/// `has_job` is true from the moment extraction is requested until the task
/// fully terminates (it covers the queued sub-state); `is_extracting` is true
/// only once the task actually holds a permit and is running the engine.
/// Invariant: `is_extracting` implies `has_job`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PartitionState {
    /// The immutable partition this state tracks
    pub partition: Partition,
    /// Selected for batch operations
    pub selected: bool,
    /// An extraction task exists for this partition (queued or running)
    pub has_job: bool,
    /// The extraction task is actually running (permit held)
    pub is_extracting: bool,
    /// Extraction progress, 0.0 to 100.0
    pub progress: f32,
    /// Last human-readable event for this partition
    pub status: String,
    /// A verification pass is in flight
    pub is_verifying: bool,
    /// Verification progress, 0.0 to 100.0
    pub verify_progress: f32,
    /// Last human-readable verification event
    pub verify_status: String,
    /// Whether the last completed verification matched the expected hash
    pub verification_passed: bool,
}

impl PartitionState {
    /// Fresh state for a just-loaded partition
    pub fn new(partition: Partition) -> Self {
        Self {
            partition,
            selected: false,
            has_job: false,
            is_extracting: false,
            progress: 0.0,
            status: String::new(),
            is_verifying: false,
            verify_progress: 0.0,
            verify_status: String::new(),
            verification_passed: false,
        }
    }
}

/// Read-only, always-current view of one session
///
/// A new snapshot is published after every mutating operation; observers are
/// expected to re-render fully from each snapshot rather than track deltas.
#[derive(Clone, Debug, Serialize)]
pub struct SessionSnapshot {
    /// Current lifecycle phase
    pub phase: SessionPhase,
    /// Source kind this session was created for
    pub kind: SourceKind,
    /// Source locator (path or URL), once loaded
    pub source: Option<String>,
    /// Parsed manifest, once loaded
    pub manifest: Option<PayloadManifest>,
    /// Raw manifest text as returned by the engine
    pub raw_manifest: Option<String>,
    /// Per-partition state keyed by partition name
    pub partitions: BTreeMap<String, PartitionState>,
    /// Output directory created for this load
    pub output_dir: Option<PathBuf>,
    /// Patch-base directory for incremental partitions, if supplied
    pub source_dir: Option<PathBuf>,
}

impl SessionSnapshot {
    /// Empty snapshot for a just-created or reset session
    pub fn idle(kind: SourceKind) -> Self {
        Self {
            phase: SessionPhase::Idle,
            kind,
            source: None,
            manifest: None,
            raw_manifest: None,
            partitions: BTreeMap::new(),
            output_dir: None,
            source_dir: None,
        }
    }
}
