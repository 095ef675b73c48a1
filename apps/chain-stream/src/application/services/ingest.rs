//! Batch Ingest
//!
//! Moves batches from a [`BatchSource`] into the publisher until the source
//! ends, the publisher refuses, or the token is cancelled.
//!
//! A source can be paced, so the pump waits for room in the publisher's
//! FIFO rather than overflowing it.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::publisher::{BatchSubmitter, PublisherError};
use crate::application::ports::{BatchSource, SourceError};

/// Ingest errors.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The source failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The publisher rejected a batch.
    #[error("publisher rejected batch at height {height}: {source}")]
    Publisher {
        /// Height of the rejected batch.
        height: u64,
        /// Rejection reason.
        #[source]
        source: PublisherError,
    },
}

/// Pump `source` into `submitter`. Returns the number of batches submitted.
///
/// # Errors
///
/// Returns the first source failure or publisher rejection.
pub async fn pump<S>(
    source: &mut S,
    submitter: &BatchSubmitter,
    cancel: &CancellationToken,
) -> Result<u64, IngestError>
where
    S: BatchSource + ?Sized,
{
    let mut submitted = 0_u64;
    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                info!(submitted, "Ingest cancelled");
                return Ok(submitted);
            }
            next = source.next_batch() => next?,
        };

        let Some(batch) = next else {
            info!(submitted, "Batch source exhausted");
            return Ok(submitted);
        };

        let height = batch.height;
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                info!(submitted, height, "Ingest cancelled while waiting for the publisher");
                return Ok(submitted);
            }
            result = submitter.submit_wait(batch) => {
                result.map_err(|source| IngestError::Publisher { height, source })?;
            }
        }
        submitted += 1;
        debug!(height, "Submitted batch");
    }
}
