//! Shared test helpers for creating ExtractSession instances in tests.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::config::{Config, ConcurrencyLimit};
use crate::engine::{EngineEvent, ExtractRequest, PayloadEngine, SourceSpec};
use crate::error::{EngineError, Result};
use crate::session::ExtractSession;
use crate::types::SourceKind;
use tempfile::TempDir;

/// Sample manifest. Every mock extraction writes `b"abc"`, so boot (whose
/// declared hash is SHA-256 of `b"abc"`) verifies, system (bogus hash) fails
/// verification, and vendor (empty hash) skips it.
pub(crate) const SAMPLE_MANIFEST: &str = r#"{
    "partitions": [
        {
            "name": "boot",
            "size_bytes": 3,
            "size_readable": "3 B",
            "operations_count": 4,
            "compression_type": "xz",
            "hash": "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        },
        {
            "name": "system",
            "size_bytes": 3,
            "size_readable": "3 B",
            "operations_count": 9,
            "compression_type": "zstd",
            "hash": "deadbeef"
        },
        {
            "name": "vendor",
            "size_bytes": 3,
            "size_readable": "3 B",
            "operations_count": 7,
            "compression_type": "xz",
            "hash": ""
        }
    ],
    "total_partitions": 3,
    "total_operations": 20,
    "total_size_bytes": 9,
    "total_size_readable": "9 B"
}"#;

/// A counting gate for holding mock extractions open until the test says so
pub(crate) struct Gate {
    slots: Mutex<usize>,
    cv: Condvar,
}

impl Gate {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            slots: Mutex::new(0),
            cv: Condvar::new(),
        })
    }

    /// Allow one held extraction to proceed
    pub(crate) fn open_one(&self) {
        let mut slots = self.slots.lock().unwrap();
        *slots += 1;
        self.cv.notify_all();
    }

    /// Try to consume one slot, waiting at most `timeout`
    fn try_take(&self, timeout: Duration) -> bool {
        let mut slots = self.slots.lock().unwrap();
        if *slots == 0 {
            let (guard, _) = self.cv.wait_timeout(slots, timeout).unwrap();
            slots = guard;
        }
        if *slots > 0 {
            *slots -= 1;
            true
        } else {
            false
        }
    }
}

/// Scripted per-partition behavior for the mock engine
#[derive(Clone)]
pub(crate) enum MockBehavior {
    /// Started -> Progress(50) -> Completed
    Complete,
    /// Started -> Progress(40) -> fatal notice
    Fatal(String),
    /// Started, then the engine call itself errors out
    EngineError(String),
    /// Started, then emit Progress(40) until the gate opens, then Completed
    Hold(Arc<Gate>),
}

/// Scripted stand-in for the external extraction engine.
///
/// Writes `b"abc"` to the requested output path at the start of every
/// extraction so cleanup behavior is observable, and records every request
/// it receives.
pub(crate) struct MockEngine {
    manifest: String,
    list_error: Option<String>,
    list_gate: Option<Arc<Gate>>,
    behaviors: Mutex<HashMap<String, MockBehavior>>,
    /// Every extract request this engine actually received, in order
    pub(crate) requests: Arc<Mutex<Vec<ExtractRequest>>>,
}

impl MockEngine {
    pub(crate) fn new() -> Self {
        Self {
            manifest: SAMPLE_MANIFEST.to_string(),
            list_error: None,
            list_gate: None,
            behaviors: Mutex::new(HashMap::new()),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn with_manifest(mut self, manifest: &str) -> Self {
        self.manifest = manifest.to_string();
        self
    }

    pub(crate) fn with_list_error(mut self, message: &str) -> Self {
        self.list_error = Some(message.to_string());
        self
    }

    /// Block the list call until the gate is opened
    pub(crate) fn with_list_gate(mut self, gate: Arc<Gate>) -> Self {
        self.list_gate = Some(gate);
        self
    }

    pub(crate) fn with_behavior(self, partition: &str, behavior: MockBehavior) -> Self {
        self.behaviors
            .lock()
            .unwrap()
            .insert(partition.to_string(), behavior);
        self
    }

    /// Names of partitions whose extraction was actually invoked
    pub(crate) fn invoked(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.partition.clone())
            .collect()
    }
}

impl PayloadEngine for MockEngine {
    fn list_partitions(&self, _source: &SourceSpec) -> Result<String> {
        if let Some(ref gate) = self.list_gate {
            while !gate.try_take(Duration::from_millis(10)) {}
        }
        if let Some(ref message) = self.list_error {
            return Err(EngineError::Failed(message.clone()).into());
        }
        Ok(self.manifest.clone())
    }

    fn extract_partition(
        &self,
        request: &ExtractRequest,
        on_event: &mut dyn FnMut(EngineEvent) -> bool,
    ) -> Result<()> {
        self.requests.lock().unwrap().push(request.clone());
        std::fs::write(&request.output_path, b"abc")?;

        if !on_event(EngineEvent::Started) {
            return Ok(());
        }

        let behavior = self
            .behaviors
            .lock()
            .unwrap()
            .get(&request.partition)
            .cloned()
            .unwrap_or(MockBehavior::Complete);

        match behavior {
            MockBehavior::Complete => {
                if !on_event(EngineEvent::Progress {
                    current_op: 2,
                    total_ops: 4,
                    percent: 50.0,
                }) {
                    return Ok(());
                }
                on_event(EngineEvent::Completed);
                Ok(())
            }
            MockBehavior::Fatal(message) => {
                if !on_event(EngineEvent::Progress {
                    current_op: 1,
                    total_ops: 4,
                    percent: 40.0,
                }) {
                    return Ok(());
                }
                on_event(EngineEvent::Fatal(message));
                Ok(())
            }
            MockBehavior::EngineError(message) => Err(EngineError::Failed(message).into()),
            MockBehavior::Hold(gate) => {
                loop {
                    if gate.try_take(Duration::from_millis(10)) {
                        break;
                    }
                    if !on_event(EngineEvent::Progress {
                        current_op: 1,
                        total_ops: 4,
                        percent: 40.0,
                    }) {
                        return Ok(());
                    }
                }
                on_event(EngineEvent::Completed);
                Ok(())
            }
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Session backed by a mock engine, with output under a tempdir.
/// Returns the session and the tempdir (which must be kept alive).
pub(crate) fn create_test_session(
    engine: Arc<MockEngine>,
    concurrency: ConcurrencyLimit,
    verify: bool,
) -> (ExtractSession, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();

    let mut config = Config::default();
    config.extraction.output_base_dir = temp_dir.path().join("extracted");
    config.extraction.concurrency = concurrency;
    config.extraction.verify_on_completion = verify;

    let session = ExtractSession::new(SourceKind::LocalPayload, config, engine);
    (session, temp_dir)
}

/// Poll until `condition` holds, failing the test after a few seconds
pub(crate) async fn wait_until(description: &str, mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting until: {}", description);
}
