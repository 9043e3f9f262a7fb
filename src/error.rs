//! Error types for payload-dl
//!
//! This module provides the error taxonomy for the library:
//! - Manifest errors (listing/parsing failures, surfaced as a session-level
//!   `Error` phase and recoverable by retrying the load)
//! - Engine errors (launching or talking to the external extraction engine)
//! - Configuration and I/O errors
//!
//! Per-partition extraction failures are deliberately *not* part of this
//! taxonomy: they are confined to the affected partition's published state and
//! never propagate as `Err` values out of the orchestrator.

use thiserror::Error;

/// Result type alias for payload-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for payload-dl
///
/// This is the primary error type used throughout the library. Each variant
/// includes contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "output_base_dir")
        key: Option<String>,
    },

    /// Manifest listing or parsing failed
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// Extraction engine error
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Partition not found in the current session
    #[error("partition not found: {0}")]
    NotFound(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Manifest-related errors
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The engine returned data that could not be parsed as a manifest
    #[error("failed to parse manifest: {0}")]
    Parse(String),

    /// The manifest listed no partitions
    #[error("manifest contains no partitions")]
    Empty,
}

/// Errors reported by or about the external extraction engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Failed to locate or launch the engine binary
    #[error("failed to launch extraction engine: {0}")]
    Launch(String),

    /// The engine emitted output this adapter could not interpret
    #[error("engine protocol error: {0}")]
    Protocol(String),

    /// The engine reported a failure or exited unsuccessfully
    #[error("engine failed: {0}")]
    Failed(String),
}
