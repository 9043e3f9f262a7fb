//! Extraction session orchestrator split into focused submodules.
//!
//! The `ExtractSession` struct and its methods are organized by domain:
//! - [`load`] - Manifest loading and session (re)seeding
//! - [`extract`] - Extraction task spawning and lifecycle
//! - [`control`] - Cancellation, selection, and reset
//! - [`bridge`] - Engine progress adaptation into state transitions

mod bridge;
mod control;
mod extract;
mod load;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Semaphore, watch};

use crate::config::Config;
use crate::engine::{PayloadEngine, SourceSpec};
use crate::manifest::PayloadManifest;
use crate::state::{CancelRegistry, StateMap};
use crate::types::{SessionPhase, SessionSnapshot, SourceKind};

/// Session fields that change together on load/reset, behind one lock
pub(crate) struct SessionInner {
    pub(crate) phase: SessionPhase,
    pub(crate) source: Option<String>,
    pub(crate) cookie: Option<String>,
    pub(crate) manifest: Option<PayloadManifest>,
    pub(crate) raw_manifest: Option<String>,
    pub(crate) output_dir: Option<PathBuf>,
    pub(crate) source_dir: Option<PathBuf>,
}

impl SessionInner {
    fn idle() -> Self {
        Self {
            phase: SessionPhase::Idle,
            source: None,
            cookie: None,
            manifest: None,
            raw_manifest: None,
            output_dir: None,
            source_dir: None,
        }
    }
}

/// One extraction-orchestration session (cloneable - all fields are Arc-wrapped)
///
/// A session supervises extraction jobs for exactly one source kind; a local
/// session and a remote session are two independent instances sharing no
/// state. The session exclusively owns all partition state; the engine never
/// sees or mutates it.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use payload_dl::{Config, ExtractSession, SourceKind};
/// use payload_dl::engine::CliEngine;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let engine = Arc::new(CliEngine::from_path().ok_or("payload-dumper not found")?);
///     let session = ExtractSession::new(SourceKind::LocalPayload, Config::default(), engine);
///
///     // Observers re-render fully from each snapshot
///     let mut snapshots = session.subscribe();
///     tokio::spawn(async move {
///         while snapshots.changed().await.is_ok() {
///             let snapshot = snapshots.borrow().clone();
///             println!("{:?}", snapshot.phase);
///         }
///     });
///
///     session.load_manifest("/tmp/payload.bin", None).await?;
///     session.request_extraction("boot");
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct ExtractSession {
    /// External extraction engine (trait object for pluggable implementations)
    pub(crate) engine: Arc<dyn PayloadEngine>,
    /// Configuration (read-only for the lifetime of the session)
    pub(crate) config: Arc<Config>,
    /// Source kind this session operates on
    pub(crate) kind: SourceKind,
    /// Per-partition mutable state, the only data shared across tasks
    pub(crate) states: StateMap,
    /// One cancellation token per in-flight partition
    pub(crate) cancellations: CancelRegistry,
    /// Admission gate; `None` means unlimited concurrency
    pub(crate) admission: Option<Arc<Semaphore>>,
    /// Load-scoped session fields (phase, locator, directories, manifest)
    pub(crate) inner: Arc<Mutex<SessionInner>>,
    /// Always-current snapshot channel; replaced after every mutation
    pub(crate) snapshot_tx: Arc<watch::Sender<SessionSnapshot>>,
}

impl ExtractSession {
    /// Create a new session for one source kind.
    ///
    /// The admission gate is sized here, once, from
    /// [`Config::extraction`](crate::config::ExtractionConfig); the
    /// concurrency limit is fixed for the lifetime of the session.
    pub fn new(kind: SourceKind, config: Config, engine: Arc<dyn PayloadEngine>) -> Self {
        let admission = config
            .extraction
            .concurrency
            .permits()
            .map(|permits| Arc::new(Semaphore::new(permits)));

        tracing::info!(
            engine = engine.name(),
            kind = kind.label(),
            permits = ?config.extraction.concurrency.permits(),
            "extraction session created"
        );

        let (snapshot_tx, _rx) = watch::channel(SessionSnapshot::idle(kind));

        Self {
            engine,
            config: Arc::new(config),
            kind,
            states: StateMap::new(),
            cancellations: CancelRegistry::new(),
            admission,
            inner: Arc::new(Mutex::new(SessionInner::idle())),
            snapshot_tx: Arc::new(snapshot_tx),
        }
    }

    /// Subscribe to session snapshots
    ///
    /// The receiver always holds the latest snapshot; a slow observer only
    /// ever skips intermediate states, never sees stale ones.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// The current snapshot
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Rebuild the snapshot from current state and publish it to all observers
    pub(crate) fn publish(&self) {
        let snapshot = {
            let inner = self.lock_inner();
            SessionSnapshot {
                phase: inner.phase.clone(),
                kind: self.kind,
                source: inner.source.clone(),
                manifest: inner.manifest.clone(),
                raw_manifest: inner.raw_manifest.clone(),
                partitions: self.states.clone_map(),
                output_dir: inner.output_dir.clone(),
                source_dir: inner.source_dir.clone(),
            }
        };
        self.snapshot_tx.send_replace(snapshot);
    }

    /// Source spec for engine calls, built from the loaded session fields
    pub(crate) fn source_spec(&self) -> Option<SourceSpec> {
        let inner = self.lock_inner();
        let locator = inner.source.clone()?;
        Some(SourceSpec {
            locator,
            kind: self.kind,
            user_agent: Some(self.config.network.user_agent.clone()),
            cookie: inner.cookie.clone(),
        })
    }

    /// Output path for a partition: `{output_dir}/{name}.img`
    pub(crate) fn output_path_for(&self, partition: &str) -> Option<PathBuf> {
        let inner = self.lock_inner();
        inner
            .output_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.img", partition)))
    }

    pub(crate) fn lock_inner(&self) -> std::sync::MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
