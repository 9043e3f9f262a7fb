//! Session control: cancellation, selection, source directory, reset.

use tracing::{debug, info};

use super::{ExtractSession, SessionInner};

impl ExtractSession {
    /// Cancel a partition's extraction.
    ///
    /// Cancellation is cooperative: the token flips immediately and the
    /// running task observes it at its next progress event (or right after
    /// permit acquisition if it was still queued). Observable state is
    /// updated optimistically here so no observer sees a stale "running"
    /// status after this call returns; the task's own cleanup path deletes
    /// whatever output the engine produced in the meantime.
    pub fn cancel(&self, partition: &str) {
        let signalled = self.cancellations.cancel(partition);
        debug!(partition = %partition, signalled = signalled, "cancellation requested");

        self.states.update(partition, |s| {
            s.has_job = false;
            s.is_extracting = false;
            s.status = "Cancelled".to_string();
        });
        self.publish();
    }

    /// Toggle a partition's batch-selection flag.
    ///
    /// Partitions with a job in flight cannot be toggled.
    pub fn toggle_selection(&self, partition: &str) {
        self.states.update(partition, |s| {
            if !s.has_job {
                s.selected = !s.selected;
            }
        });
        self.publish();
    }

    /// Select every partition that does not currently have a job
    pub fn select_all(&self) {
        for name in self.states.names() {
            self.states.update(&name, |s| {
                if !s.has_job {
                    s.selected = true;
                }
            });
        }
        self.publish();
    }

    /// Clear every partition's selection flag
    pub fn deselect_all(&self) {
        for name in self.states.names() {
            self.states.update(&name, |s| s.selected = false);
        }
        self.publish();
    }

    /// Record the patch-base directory required by incremental partitions.
    ///
    /// May be supplied any time after load, before extracting a differential
    /// entry.
    pub fn set_source_directory(&self, source_dir: impl Into<std::path::PathBuf>) {
        let source_dir = source_dir.into();
        {
            let mut inner = self.lock_inner();
            inner.source_dir = Some(source_dir);
        }
        self.publish();
    }

    /// Cancel every outstanding task and return the session to `Idle`.
    ///
    /// All per-session maps are cleared; already-spawned tasks observe their
    /// cancelled tokens and unwind against a map that no longer knows them.
    pub fn reset(&self) {
        info!(kind = self.kind.label(), "session reset");

        self.cancellations.cancel_all();
        self.cancellations.clear();
        self.states.clear();
        {
            let mut inner = self.lock_inner();
            *inner = SessionInner::idle();
        }
        self.publish();
    }
}
