//! Extraction task spawning and lifecycle.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::OwnedSemaphorePermit;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::bridge::ProgressBridge;
use super::ExtractSession;
use crate::engine::ExtractRequest;
use crate::verify;

/// Clears `has_job` and publishes a final snapshot when the extraction task
/// exits, on every path including panics inside the task body.
struct JobGuard {
    session: ExtractSession,
    partition: String,
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        self.session.states.update(&self.partition, |s| {
            s.has_job = false;
            s.is_extracting = false;
        });
        self.session.publish();
    }
}

impl ExtractSession {
    /// Request extraction of one partition.
    ///
    /// Idempotent while a job exists: a partition with `has_job` already true
    /// is left untouched and no second task is spawned. Unknown partitions
    /// and sessions without a loaded manifest are a no-op.
    ///
    /// `has_job` is set before this method returns. An admission permit is
    /// reserved here when one is free, in which case the partition is
    /// published as "Starting" with `is_extracting` set; otherwise it is
    /// published as "Queued" and flips to "Starting" only once the spawned
    /// task acquires a permit. The caller is never blocked on a permit.
    pub fn request_extraction(&self, partition: &str) {
        let Some(state) = self.states.get(partition) else {
            warn!(partition = %partition, "extraction requested for unknown partition");
            return;
        };
        if state.has_job {
            debug!(partition = %partition, "extraction already in flight, ignoring request");
            return;
        }

        let (Some(source), Some(output_path)) =
            (self.source_spec(), self.output_path_for(partition))
        else {
            warn!(partition = %partition, "extraction requested with no loaded manifest");
            return;
        };
        let source_dir = self.lock_inner().source_dir.clone();

        let token = self.cancellations.begin(partition);

        // Queued vs running is decided by actual permit possession. The
        // permit is reserved here and rides along to the task, so a burst of
        // simultaneous requests cannot all observe the same free slot.
        let (permit, queued) = match &self.admission {
            Some(gate) => match Arc::clone(gate).try_acquire_owned() {
                Ok(permit) => (Some(permit), false),
                Err(_) => (None, true),
            },
            None => (None, false),
        };

        self.states.update(partition, |s| {
            s.has_job = true;
            s.is_extracting = !queued;
            s.progress = 0.0;
            s.status = if queued { "Queued" } else { "Starting" }.to_string();
            s.is_verifying = false;
            s.verify_progress = 0.0;
            s.verify_status = String::new();
            s.verification_passed = false;
        });
        self.publish();

        let request = ExtractRequest {
            source,
            partition: partition.to_string(),
            output_path,
            source_dir,
        };

        let session = self.clone();
        let partition = partition.to_string();
        tokio::spawn(async move {
            session.run_job(partition, request, token, permit).await;
        });
    }

    /// Request extraction of every currently selected, idle partition.
    ///
    /// Returns immediately; completion is observed through snapshots.
    pub fn request_batch_extraction(&self) {
        for (name, state) in self.states.clone_map() {
            if state.selected && !state.has_job {
                self.request_extraction(&name);
            }
        }
    }

    async fn run_job(
        self,
        partition: String,
        request: ExtractRequest,
        token: CancellationToken,
        permit: Option<OwnedSemaphorePermit>,
    ) {
        let _guard = JobGuard {
            session: self.clone(),
            partition: partition.clone(),
        };

        let _permit = match (permit, &self.admission) {
            // Permit reserved at request time
            (Some(permit), _) => Some(permit),
            (None, Some(gate)) => {
                tokio::select! {
                    // Cancelled while queued: the engine is never invoked
                    _ = token.cancelled() => {
                        debug!(partition = %partition, "cancelled while queued");
                        self.states.update(&partition, |s| {
                            s.is_extracting = false;
                            s.status = "Cancelled".to_string();
                        });
                        return;
                    }
                    permit = Arc::clone(gate).acquire_owned() => {
                        match permit {
                            Ok(p) => Some(p),
                            Err(_) => return, // gate closed, session tearing down
                        }
                    }
                }
            }
            (None, None) => None,
        };

        // The flag may have flipped between enqueueing and permit acquisition
        if token.is_cancelled() {
            self.states.update(&partition, |s| {
                s.is_extracting = false;
                s.status = "Cancelled".to_string();
            });
            return;
        }

        // Both flags in one update: a cancel racing the handoff must never
        // surface a snapshot where is_extracting holds without has_job.
        self.states.update(&partition, |s| {
            s.has_job = true;
            s.is_extracting = true;
            s.status = "Starting".to_string();
        });
        self.publish();

        // The engine call is an opaque, long-running blocking call; run it on
        // the blocking pool with a single-use bridge feeding state updates.
        let engine = Arc::clone(&self.engine);
        let bridge = ProgressBridge::new(self.clone(), partition.clone(), token.clone());
        let blocking_request = request.clone();
        let joined = tokio::task::spawn_blocking(move || {
            let mut bridge = bridge;
            let result =
                engine.extract_partition(&blocking_request, &mut |event| bridge.on_event(event));
            (bridge.finish(), result)
        })
        .await;

        let output_path = request.output_path;
        let (outcome, result) = match joined {
            Ok(pair) => pair,
            Err(join_error) => {
                error!(partition = %partition, error = %join_error, "extraction task panicked");
                remove_partial_output(&partition, &output_path).await;
                self.states.update(&partition, |s| {
                    s.is_extracting = false;
                    s.status = format!("Error: extraction task failed: {}", join_error);
                });
                return;
            }
        };

        if outcome.cancelled || token.is_cancelled() {
            // Best-effort cancellation means the engine may have kept writing
            // for a moment after the request; whatever it produced goes away.
            remove_partial_output(&partition, &output_path).await;
            self.states.update(&partition, |s| {
                s.is_extracting = false;
                s.status = "Cancelled".to_string();
            });
            return;
        }

        if let Some(message) = outcome.fatal {
            error!(partition = %partition, message = %message, "extraction failed");
            remove_partial_output(&partition, &output_path).await;
            // The bridge already recorded the fatal message as the status
            self.states.update(&partition, |s| s.is_extracting = false);
            return;
        }

        if let Err(e) = result {
            error!(partition = %partition, error = %e, "engine call failed");
            remove_partial_output(&partition, &output_path).await;
            self.states.update(&partition, |s| {
                s.is_extracting = false;
                s.status = format!("Error: {}", e);
            });
            return;
        }

        self.states.update(&partition, |s| {
            s.is_extracting = false;
            s.status = format!("Completed: {}", output_path.display());
        });
        self.publish();

        if self.config.extraction.verify_on_completion {
            let expected = self
                .states
                .get(&partition)
                .filter(|s| s.partition.wants_verification())
                .and_then(|s| s.partition.hash.clone());
            if let Some(expected) = expected {
                verify::run_verify_stage(&partition, &output_path, &expected, &self.states, || {
                    self.publish()
                })
                .await;
            }
        }
    }
}

/// Delete a partial output file after cancellation or failure.
///
/// A file that was never created is fine; any other deletion failure is
/// logged and otherwise ignored, since state bookkeeping still has to finish.
async fn remove_partial_output(partition: &str, output_path: &Path) {
    match tokio::fs::remove_file(output_path).await {
        Ok(()) => debug!(partition = %partition, path = ?output_path, "removed partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            warn!(partition = %partition, path = ?output_path, error = %e, "failed to remove partial output");
        }
    }
}
