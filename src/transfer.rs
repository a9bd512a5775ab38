use anyhow::Result;
use tracing::{info, warn};

use crate::config::{Config, TransferRetryConfig};
use crate::inventory::filename_of;
use crate::storage::Storage;
use crate::types::TransferOutcome;
use crate::types::error::S3IngestError;

/// Moves one object into the destination bucket: copy, then delete the
/// source, retrying the pair with exponential backoff.
///
/// A retry always restarts from the copy, so an object whose delete
/// failed may be copied more than once.
#[derive(Clone)]
pub struct TransferWorker {
    storage: Storage,
    destination_bucket: String,
    destination_prefix: String,
    retry_config: TransferRetryConfig,
}

impl TransferWorker {
    pub fn new(config: &Config, storage: Storage) -> Self {
        Self {
            storage,
            destination_bucket: config.destination_bucket.clone(),
            destination_prefix: config.destination_prefix.clone(),
            retry_config: config.transfer_retry_config,
        }
    }

    /// Destination key: the configured prefix followed by the basename of
    /// the source key.
    pub fn destination_key(&self, object_key: &str) -> String {
        format!("{}{}", self.destination_prefix, filename_of(object_key))
    }

    /// Move `source_bucket/object_key`. Never fails outright; exhausting
    /// every attempt yields an error outcome for the key.
    pub async fn move_object(&self, source_bucket: &str, object_key: &str) -> TransferOutcome {
        let destination_key = self.destination_key(object_key);
        let max_attempts = self.retry_config.max_retries;
        let mut last_error = String::new();

        for attempt in 0..max_attempts {
            match self
                .copy_then_delete(source_bucket, object_key, &destination_key)
                .await
            {
                Ok(()) => {
                    info!(
                        source_bucket = source_bucket,
                        key = object_key,
                        destination_bucket = self.destination_bucket,
                        destination_key = destination_key,
                        attempt = attempt + 1,
                        "object moved."
                    );
                    return TransferOutcome::success(object_key);
                }
                Err(e) => {
                    last_error = format!("{e:#}");
                    warn!(
                        source_bucket = source_bucket,
                        key = object_key,
                        attempt = attempt + 1,
                        max_attempts = max_attempts,
                        error = last_error,
                        "move attempt {}/{} failed for key '{}'.",
                        attempt + 1,
                        max_attempts,
                        object_key,
                    );

                    if attempt + 1 < max_attempts {
                        tokio::time::sleep(self.retry_config.backoff_duration(attempt)).await;
                    }
                }
            }
        }

        let error = S3IngestError::Transfer {
            key: object_key.to_string(),
            attempts: max_attempts,
            message: last_error,
        };
        warn!(
            source_bucket = source_bucket,
            key = object_key,
            max_attempts = max_attempts,
            "{error}"
        );

        TransferOutcome::failure(Some(object_key), error.to_string())
    }

    async fn copy_then_delete(
        &self,
        source_bucket: &str,
        object_key: &str,
        destination_key: &str,
    ) -> Result<()> {
        self.storage
            .copy_object(
                source_bucket,
                object_key,
                &self.destination_bucket,
                destination_key,
            )
            .await?;
        self.storage.delete_object(source_bucket, object_key).await
    }
}
