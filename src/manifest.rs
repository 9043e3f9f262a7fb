//! Payload manifest parsing
//!
//! The extraction engine's `list` operation returns a serialized manifest
//! describing every extractable partition in the source image. The raw JSON
//! text is kept verbatim in the session snapshot; this module provides the
//! typed view of it.

use serde::{Deserialize, Serialize};

use crate::error::{ManifestError, Result};

/// One named, independently extractable unit described by the manifest
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Partition {
    /// Partition name (unique key within a session)
    pub name: String,
    /// Declared size in bytes
    pub size_bytes: u64,
    /// Human-readable size (e.g., "64 MiB")
    pub size_readable: String,
    /// Number of install operations recorded for this partition
    pub operations_count: u64,
    /// Compression scheme label (e.g., "xz", "zstd")
    pub compression_type: String,
    /// Expected content hash, if the manifest declares one
    #[serde(default)]
    pub hash: Option<String>,
    /// Whether this is a differential/incremental entry that requires a
    /// source image directory as a patch base
    #[serde(default)]
    pub is_incremental: bool,
}

impl Partition {
    /// Whether this partition carries a usable expected hash.
    ///
    /// Some manifests declare an empty hash string rather than omitting the
    /// field; both mean "nothing to verify against".
    pub fn wants_verification(&self) -> bool {
        self.hash.as_deref().is_some_and(|h| !h.is_empty())
    }
}

/// Parsed manifest for one payload source
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PayloadManifest {
    /// Partitions listed by the source, in manifest order
    pub partitions: Vec<Partition>,
    /// Total partition count
    pub total_partitions: u64,
    /// Total install operation count across all partitions
    pub total_operations: u64,
    /// Total declared size in bytes
    pub total_size_bytes: u64,
    /// Human-readable total size
    pub total_size_readable: String,
    /// Security patch level embedded in the payload, if any
    #[serde(default)]
    pub security_patch_level: Option<String>,
}

impl PayloadManifest {
    /// Parse a manifest from the engine's serialized JSON form.
    ///
    /// Unknown keys are ignored so newer engines can add metadata without
    /// breaking older orchestrators.
    pub fn parse(raw: &str) -> Result<Self> {
        let manifest: PayloadManifest =
            serde_json::from_str(raw).map_err(|e| ManifestError::Parse(e.to_string()))?;
        if manifest.partitions.is_empty() {
            return Err(ManifestError::Empty.into());
        }
        Ok(manifest)
    }
}
