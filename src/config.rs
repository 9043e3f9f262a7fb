//! Configuration types for payload-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Extraction behavior configuration (output location, concurrency, verification)
///
/// Groups settings related to how partitions are extracted and checked.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Base directory for output; each load creates a fresh timestamped
    /// subdirectory under it (default: "./extracted")
    #[serde(default = "default_output_base_dir")]
    pub output_base_dir: PathBuf,

    /// Verify extracted partitions against their manifest hash (default: true)
    #[serde(default = "default_true")]
    pub verify_on_completion: bool,

    /// How many extractions may run concurrently (default: unlimited)
    #[serde(default)]
    pub concurrency: ConcurrencyLimit,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            output_base_dir: default_output_base_dir(),
            verify_on_completion: true,
            concurrency: ConcurrencyLimit::default(),
        }
    }
}

/// Concurrency admission policy for a session
///
/// The limit is fixed when the session is constructed; it cannot change for
/// the lifetime of the session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "limit", rename_all = "lowercase")]
pub enum ConcurrencyLimit {
    /// No admission gate; every requested extraction runs immediately
    #[default]
    Unlimited,
    /// One permit per available CPU
    Auto,
    /// Explicit permit count (clamped to at least 1)
    Custom(usize),
}

impl ConcurrencyLimit {
    /// Number of permits the admission gate should hold, or `None` for no gate
    pub fn permits(&self) -> Option<usize> {
        match self {
            ConcurrencyLimit::Unlimited => None,
            ConcurrencyLimit::Auto => Some(
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1),
            ),
            ConcurrencyLimit::Custom(n) => Some((*n).max(1)),
        }
    }
}

/// Network identity used for remote sources
///
/// Passed through to the engine unchanged; the orchestrator itself performs
/// no network I/O.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// User-Agent header value for remote fetches
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Auth cookie for remote fetches (default: none)
    #[serde(default)]
    pub cookie: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            cookie: None,
        }
    }
}

/// External engine binary configuration
///
/// Groups settings for locating the extraction engine executable.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Path to the payload-dumper executable (auto-detected if None)
    #[serde(default)]
    pub binary_path: Option<PathBuf>,

    /// Whether to search PATH for the engine binary if no explicit path is
    /// set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary_path: None,
            search_path: true,
        }
    }
}

/// Top-level configuration for payload-dl
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Extraction behavior
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Network identity for remote sources
    #[serde(default)]
    pub network: NetworkConfig,

    /// External engine binary discovery
    #[serde(default)]
    pub engine: EngineConfig,
}

fn default_output_base_dir() -> PathBuf {
    PathBuf::from("./extracted")
}

fn default_user_agent() -> String {
    format!("payload-dl/{}", env!("CARGO_PKG_VERSION"))
}

fn default_true() -> bool {
    true
}
