//! CLI-based extraction engine using an external payload-dumper binary
//!
//! The binary speaks a line-oriented protocol on stdout: `list` prints the
//! manifest JSON, `extract` prints one JSON progress record per line. Records
//! carry the engine's loosely-typed status vocabulary (integer status codes,
//! notices with a fatal marker embedded in free text); this adapter is the
//! one place that vocabulary is interpreted.

use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Command, Stdio};

use serde::Deserialize;

use super::{EngineEvent, ExtractRequest, PayloadEngine, SourceSpec};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};

/// Marker the engine embeds in a notice message to signal a fatal condition.
///
/// Matching is case-insensitive substring matching on this literal, a known
/// fragility of the engine's protocol that is confined to this adapter.
const FATAL_MARKER: &str = "fatal error:";

/// Raw progress record as printed by the engine, one JSON object per line
#[derive(Debug, Deserialize)]
struct RawRecord {
    status: i32,
    #[serde(default)]
    current_operation: u64,
    #[serde(default)]
    total_operations: u64,
    #[serde(default)]
    percentage: f64,
    #[serde(default)]
    notice_message: String,
}

/// Translate one raw record into the closed event union.
///
/// Returns `None` for status codes this adapter does not recognize; callers
/// skip those rather than failing the extraction.
fn classify(record: RawRecord) -> Option<EngineEvent> {
    match record.status {
        0 => Some(EngineEvent::Started),
        1 => Some(EngineEvent::Progress {
            current_op: record.current_operation,
            total_ops: record.total_operations,
            percent: record.percentage,
        }),
        2 => Some(EngineEvent::Completed),
        3 => {
            if record
                .notice_message
                .to_lowercase()
                .contains(FATAL_MARKER)
            {
                Some(EngineEvent::Fatal(record.notice_message))
            } else {
                Some(EngineEvent::Warning(record.notice_message))
            }
        }
        other => {
            tracing::warn!(status = other, "skipping unrecognized engine status code");
            None
        }
    }
}

/// CLI-based extraction engine using an external payload-dumper binary
///
/// # Examples
///
/// ```no_run
/// use payload_dl::engine::CliEngine;
///
/// // Create with explicit path
/// let engine = CliEngine::new("/usr/bin/payload-dumper".into());
///
/// // Or auto-discover from PATH
/// let engine = CliEngine::from_path().expect("payload-dumper not found in PATH");
/// ```
pub struct CliEngine {
    binary_path: PathBuf,
}

impl CliEngine {
    /// Create a new CLI engine with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Attempt to find payload-dumper in PATH
    pub fn from_path() -> Option<Self> {
        which::which("payload-dumper").ok().map(Self::new)
    }

    /// Build an engine from configuration: explicit path wins, then PATH
    /// search if enabled.
    pub fn from_config(config: &EngineConfig) -> Option<Self> {
        if let Some(ref path) = config.binary_path {
            return Some(Self::new(path.clone()));
        }
        if config.search_path {
            return Self::from_path();
        }
        None
    }

    fn source_args(command: &mut Command, source: &SourceSpec) {
        command.arg(&source.locator);
        if source.kind.is_archive() {
            command.arg("--archive");
        }
        if source.kind.is_remote() {
            if let Some(ref user_agent) = source.user_agent {
                command.arg("--user-agent").arg(user_agent);
            }
            if let Some(ref cookie) = source.cookie {
                command.arg("--cookie").arg(cookie);
            }
        }
    }
}

impl PayloadEngine for CliEngine {
    fn list_partitions(&self, source: &SourceSpec) -> Result<String> {
        let mut command = Command::new(&self.binary_path);
        command.arg("list");
        Self::source_args(&mut command, source);

        let output = command
            .output()
            .map_err(|e| EngineError::Launch(format!("failed to execute payload-dumper: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::Failed(format!(
                "list exited with {}: {}",
                output.status,
                stderr.trim()
            ))
            .into());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn extract_partition(
        &self,
        request: &ExtractRequest,
        on_event: &mut dyn FnMut(EngineEvent) -> bool,
    ) -> Result<()> {
        let mut command = Command::new(&self.binary_path);
        command
            .arg("extract")
            .arg("--partition")
            .arg(&request.partition)
            .arg("--out")
            .arg(&request.output_path);
        if let Some(ref source_dir) = request.source_dir {
            command.arg("--source-dir").arg(source_dir);
        }
        Self::source_args(&mut command, &request.source);

        let mut child = command
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| EngineError::Launch(format!("failed to execute payload-dumper: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Protocol("engine stdout unavailable".to_string()))?;

        let mut stopped = false;
        for line in BufReader::new(stdout).lines() {
            let line = line.map_err(|e| {
                EngineError::Protocol(format!("failed to read engine output: {}", e))
            })?;
            // The engine may interleave human-readable chatter; only JSON
            // object lines are protocol records.
            if !line.trim_start().starts_with('{') {
                continue;
            }
            let record: RawRecord = serde_json::from_str(&line)
                .map_err(|e| EngineError::Protocol(format!("bad progress record: {}", e)))?;

            let Some(event) = classify(record) else {
                continue;
            };

            if !on_event(event) {
                stopped = true;
                child.kill().ok();
                break;
            }
        }

        let status = child
            .wait()
            .map_err(|e| EngineError::Launch(format!("failed to reap payload-dumper: {}", e)))?;

        // A stop we requested is not an engine failure; the caller already
        // knows why it stopped.
        if !stopped && !status.success() {
            let mut stderr = String::new();
            if let Some(mut pipe) = child.stderr.take() {
                pipe.read_to_string(&mut stderr).ok();
            }
            return Err(EngineError::Failed(format!(
                "extract exited with {}: {}",
                status,
                stderr.trim()
            ))
            .into());
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "cli-payload-dumper"
    }
}
