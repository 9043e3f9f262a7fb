//! Progress bridge: adapts engine events into partition state transitions.
//!
//! One bridge instance is bound to one partition and one extraction attempt,
//! and processes that attempt's events sequentially, which is what makes
//! per-partition publish order causal. It consumes only the closed
//! [`EngineEvent`] union; severity was already decided at the engine adapter.

use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::ExtractSession;
use crate::engine::EngineEvent;

/// What the bridge observed over the whole attempt, read by the extraction
/// task once the engine call returns
#[derive(Debug, Default)]
pub(crate) struct BridgeOutcome {
    pub(crate) cancelled: bool,
    pub(crate) fatal: Option<String>,
}

/// Single-use adapter from engine progress callbacks to state updates
pub(crate) struct ProgressBridge {
    session: ExtractSession,
    partition: String,
    token: CancellationToken,
    outcome: BridgeOutcome,
}

impl ProgressBridge {
    pub(crate) fn new(
        session: ExtractSession,
        partition: String,
        token: CancellationToken,
    ) -> Self {
        Self {
            session,
            partition,
            token,
            outcome: BridgeOutcome::default(),
        }
    }

    /// Process one engine event. Returns the engine's continue signal:
    /// `false` asks it to stop at the next opportunity.
    ///
    /// The cancellation token is consulted before any event is interpreted;
    /// once cancellation or a fatal notice has been observed, no further
    /// state mutation happens for this attempt.
    pub(crate) fn on_event(&mut self, event: EngineEvent) -> bool {
        if self.outcome.cancelled || self.outcome.fatal.is_some() {
            return false;
        }

        if self.token.is_cancelled() {
            self.outcome.cancelled = true;
            // cancel() already published "Cancelled" optimistically; keep the
            // state consistent with it rather than reviving a running status.
            self.session.states.update(&self.partition, |s| {
                s.is_extracting = false;
                s.status = "Cancelled".to_string();
            });
            self.session.publish();
            return false;
        }

        let mut stop = false;
        match event {
            EngineEvent::Started => {
                self.session.states.update(&self.partition, |s| {
                    s.progress = 0.0;
                    s.status = "Started".to_string();
                });
            }
            EngineEvent::Progress { percent, .. } => {
                self.session.states.update(&self.partition, |s| {
                    s.progress = percent as f32;
                    s.status = "Extracting".to_string();
                });
            }
            EngineEvent::Completed => {
                self.session.states.update(&self.partition, |s| {
                    s.progress = 100.0;
                    s.status = "Completed".to_string();
                });
            }
            EngineEvent::Warning(message) => {
                warn!(partition = %self.partition, message = %message, "engine warning");
                self.session.states.update(&self.partition, |s| {
                    s.status = format!("Warning: {}", message);
                });
            }
            EngineEvent::Fatal(message) => {
                self.session.states.update(&self.partition, |s| {
                    s.status = format!("Error: {}", message);
                });
                self.outcome.fatal = Some(message);
                stop = true;
            }
        }

        self.session.publish();
        !stop
    }

    /// Consume the bridge after the engine call returns
    pub(crate) fn finish(self) -> BridgeOutcome {
        self.outcome
    }
}
