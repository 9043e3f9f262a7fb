//! Post-extraction integrity verification
//!
//! Streams a completed output file through SHA-256 and compares the digest to
//! the hash the manifest declared for that partition. Verification failure is
//! never fatal to the overall operation: any I/O or digest problem is
//! reported on the partition's state and swallowed here.

use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

use crate::state::StateMap;

/// Read size per digest update; progress is published once per chunk
const VERIFY_CHUNK_SIZE: usize = 8192;

/// Execute the verify stage for one extracted partition.
///
/// Updates `is_verifying` / `verify_progress` / `verify_status` /
/// `verification_passed` on the partition's state and calls `publish` after
/// every mutation. `verify_progress` is monotonically non-decreasing and
/// reaches exactly 100 only once the whole file has been read.
pub(crate) async fn run_verify_stage(
    partition: &str,
    output_path: &Path,
    expected_hash: &str,
    states: &StateMap,
    publish: impl Fn(),
) {
    debug!(partition = %partition, path = ?output_path, "running verify stage");

    states.update(partition, |s| {
        s.is_verifying = true;
        s.verify_progress = 0.0;
        s.verify_status = "Verifying".to_string();
        s.verification_passed = false;
    });
    publish();

    match digest_file(partition, output_path, states, &publish).await {
        Ok(digest) => {
            let passed = digest.eq_ignore_ascii_case(expected_hash);
            debug!(
                partition = %partition,
                passed = passed,
                "verification complete"
            );

            states.update(partition, |s| {
                s.is_verifying = false;
                s.verify_progress = 100.0;
                s.verify_status = if passed {
                    "Verified".to_string()
                } else {
                    "Verification FAILED".to_string()
                };
                s.verification_passed = passed;
            });
        }
        Err(e) => {
            warn!(partition = %partition, error = %e, "verification error");

            states.update(partition, |s| {
                s.is_verifying = false;
                s.verify_status = format!("Verify error: {}", e);
            });
        }
    }
    publish();
}

/// Stream the file through SHA-256, publishing progress per chunk
async fn digest_file(
    partition: &str,
    output_path: &Path,
    states: &StateMap,
    publish: &impl Fn(),
) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(output_path).await?;
    let file_size = file.metadata().await?.len();

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; VERIFY_CHUNK_SIZE];
    let mut total_read: u64 = 0;

    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        total_read += read as u64;

        if file_size > 0 {
            let progress = (total_read as f32 * 100.0) / file_size as f32;
            states.update(partition, |s| s.verify_progress = progress);
            publish();
        }
    }

    Ok(format!("{:x}", hasher.finalize()))
}
