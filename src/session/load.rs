//! Manifest loading and session (re)seeding.

use std::sync::Arc;

use tracing::{error, info};

use super::ExtractSession;
use crate::error::{Error, Result};
use crate::manifest::PayloadManifest;
use crate::types::SessionPhase;

impl ExtractSession {
    /// Load (or reload) the partition manifest for a source.
    ///
    /// Invokes the engine's list operation (a potentially slow, blocking
    /// call, a network fetch for remote sources), parses the returned manifest,
    /// and seeds one quiescent partition state per listed partition. A fresh
    /// timestamp-suffixed output directory is created under the configured
    /// base so repeated loads never collide.
    ///
    /// Outstanding jobs from a previous load are cancelled and their state
    /// discarded before reseeding; a failed load leaves the session in the
    /// `Error` phase with no partitions. Either way the session never carries
    /// stale partition state across loads.
    pub async fn load_manifest(
        &self,
        locator: impl Into<String>,
        cookie: Option<String>,
    ) -> Result<()> {
        let locator = locator.into();

        // Tear down whatever the previous load left running
        self.cancellations.cancel_all();
        self.cancellations.clear();

        {
            let mut inner = self.lock_inner();
            inner.phase = SessionPhase::Loading;
            inner.source = Some(locator.clone());
            inner.cookie = cookie;
        }
        self.publish();

        match self.list_and_seed(&locator).await {
            Ok(manifest) => {
                info!(
                    source = %locator,
                    kind = self.kind.label(),
                    partitions = manifest.partitions.len(),
                    "manifest loaded"
                );
                Ok(())
            }
            Err(e) => {
                error!(source = %locator, kind = self.kind.label(), error = %e, "manifest load failed");

                self.states.clear();
                {
                    let mut inner = self.lock_inner();
                    inner.phase = SessionPhase::Error {
                        message: e.to_string(),
                    };
                    inner.manifest = None;
                    inner.raw_manifest = None;
                    inner.output_dir = None;
                }
                self.publish();
                Err(e)
            }
        }
    }

    async fn list_and_seed(&self, locator: &str) -> Result<PayloadManifest> {
        let spec = self
            .source_spec()
            .ok_or_else(|| Error::Other("session has no source locator".to_string()))?;

        let engine = Arc::clone(&self.engine);
        let raw = tokio::task::spawn_blocking(move || engine.list_partitions(&spec))
            .await
            .map_err(|e| Error::Other(format!("list task failed: {}", e)))??;

        let manifest = PayloadManifest::parse(&raw)?;

        // Unique per-load output directory: {base}/{label}-{millis}
        let dir_name = format!(
            "{}-{}",
            self.kind.label(),
            chrono::Utc::now().timestamp_millis()
        );
        let output_dir = self.config.extraction.output_base_dir.join(dir_name);
        tokio::fs::create_dir_all(&output_dir).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "failed to create output directory '{}': {}",
                    output_dir.display(),
                    e
                ),
            ))
        })?;

        self.states.seed(manifest.partitions.iter().cloned());
        {
            let mut inner = self.lock_inner();
            inner.phase = SessionPhase::Loaded;
            inner.manifest = Some(manifest.clone());
            inner.raw_manifest = Some(raw);
            inner.output_dir = Some(output_dir);
            inner.source_dir = None;
        }
        self.publish();

        Ok(manifest)
    }
}
