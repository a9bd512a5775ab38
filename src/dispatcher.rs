//! Batch dispatch of queue-triggered moves.
//!
//! A batch is fanned out over a fixed pool of workers reading from one
//! shared queue. Outcomes are collected in the order units finish, and a
//! failure in one message never affects its siblings.

use serde::Deserialize;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::inventory;
use crate::normalizer::normalize;
use crate::storage::Storage;
use crate::transfer::TransferWorker;
use crate::types::error::S3IngestError;
use crate::types::{InventoryRecord, InvocationResult, QueueMessage, TransferOutcome};

const ERROR_MESSAGE_NO_RECORDS: &str = "message carries no storage event records";
const ERROR_MESSAGE_NO_LOCATION: &str = "storage event record has no bucket name or object key";

#[derive(Debug, Deserialize)]
struct BatchContainer {
    #[serde(rename = "Records")]
    records: Vec<BatchEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchEntry {
    #[serde(default)]
    message_id: Option<String>,
    body: String,
}

pub struct BatchDispatcher {
    config: Config,
    storage: Storage,
}

impl BatchDispatcher {
    pub fn new(config: Config, storage: Storage) -> Self {
        Self { config, storage }
    }

    /// Parse the trigger payload into its queue messages.
    ///
    /// Only the container itself is validated here; message bodies are
    /// left untouched. Any failure is a [`S3IngestError::TopLevel`].
    pub fn parse_batch(payload: &str) -> Result<Vec<QueueMessage>, S3IngestError> {
        let container: BatchContainer = serde_json::from_str(payload)
            .map_err(|e| S3IngestError::TopLevel(format!("malformed batch payload: {e}")))?;

        Ok(container
            .records
            .into_iter()
            .map(|entry| QueueMessage::new(entry.message_id, entry.body))
            .collect())
    }

    /// Entry point for one trigger invocation.
    ///
    /// Returns status 200 with per-message outcomes whenever the batch
    /// could be set up, even if every message failed; status 500 only
    /// when the container itself is unusable.
    pub async fn handle_event(&self, payload: &str) -> InvocationResult {
        match Self::parse_batch(payload) {
            Ok(messages) => InvocationResult::ok(self.dispatch_batch(messages).await),
            Err(e) => {
                error!(error = %e, "batch could not be set up.");
                InvocationResult::internal_error(e)
            }
        }
    }

    /// Move the object announced by each message through a pool of
    /// `worker_size` concurrent workers.
    pub async fn dispatch_batch(&self, messages: Vec<QueueMessage>) -> Vec<TransferOutcome> {
        let start_time = Instant::now();
        let message_count = messages.len();
        let worker_size = self.config.worker_size.max(1) as usize;

        let (work_sender, work_receiver) = async_channel::bounded::<QueueMessage>(worker_size);
        let (result_sender, result_receiver) = async_channel::unbounded::<TransferOutcome>();

        let mut workers = JoinSet::new();
        for worker_index in 0..worker_size.min(message_count.max(1)) {
            let transfer_worker = TransferWorker::new(&self.config, self.storage.clone());
            let work_receiver = work_receiver.clone();
            let result_sender = result_sender.clone();

            workers.spawn(async move {
                while let Ok(message) = work_receiver.recv().await {
                    let message_id = message.message_id.clone();
                    let transfer_worker = transfer_worker.clone();

                    let join_result = tokio::spawn(async move {
                        process_message(&transfer_worker, message).await
                    })
                    .await;

                    let outcome = match join_result {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            error!(
                                worker_index,
                                message_id = message_id,
                                "message task panicked: {}",
                                e
                            );
                            TransferOutcome::failure(None, format!("message task panicked: {e}"))
                                .with_message_id(message_id)
                        }
                    };

                    if result_sender.send(outcome).await.is_err() {
                        break;
                    }
                }
                debug!(worker_index, "transfer worker finished.");
            });
        }
        drop(work_receiver);
        drop(result_sender);

        for message in messages {
            if work_sender.send(message).await.is_err() {
                error!("all transfer workers stopped before the batch was queued.");
                break;
            }
        }
        work_sender.close();

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!("transfer worker task failed: {}", e);
            }
        }

        let mut outcomes = Vec::with_capacity(message_count);
        while let Ok(outcome) = result_receiver.recv().await {
            outcomes.push(outcome);
        }

        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        let failed = outcomes.len() - succeeded;
        let duration_sec = start_time.elapsed().as_secs_f64();
        if failed > 0 {
            warn!(
                messages = message_count,
                succeeded = succeeded,
                failed = failed,
                duration_sec = duration_sec,
                "batch finished with failures."
            );
        } else {
            info!(
                messages = message_count,
                succeeded = succeeded,
                failed = failed,
                duration_sec = duration_sec,
                "batch finished."
            );
        }

        outcomes
    }

    /// Inventory records for every record of every message, in message
    /// order. A message that cannot be normalised yields its error.
    pub fn inventory_batch(
        messages: &[QueueMessage],
    ) -> Vec<Result<Vec<InventoryRecord>, S3IngestError>> {
        messages
            .iter()
            .map(|message| {
                normalize(&message.body)
                    .map(|records| records.iter().map(inventory::extract).collect())
                    .inspect_err(|e| {
                        warn!(message_id = message.message_id, error = %e, "message skipped.");
                    })
            })
            .collect()
    }
}

/// Normalise one message and move the first object it announces.
async fn process_message(worker: &TransferWorker, message: QueueMessage) -> TransferOutcome {
    let QueueMessage { message_id, body } = message;

    let records = match normalize(&body) {
        Ok(records) => records,
        Err(e) => {
            warn!(message_id = message_id, error = %e, "message could not be normalized.");
            return TransferOutcome::failure(None, e.to_string()).with_message_id(message_id);
        }
    };

    if records.len() > 1 {
        debug!(
            message_id = message_id,
            records = records.len(),
            "only the first record of the message is moved."
        );
    }

    let Some(record) = records.first() else {
        let e = S3IngestError::Format(ERROR_MESSAGE_NO_RECORDS.to_string());
        warn!(message_id = message_id, error = %e, "message skipped.");
        return TransferOutcome::failure(None, e.to_string()).with_message_id(message_id);
    };

    let (Some(bucket), Some(key)) = (record.bucket_name(), record.object_key()) else {
        let e = S3IngestError::Format(ERROR_MESSAGE_NO_LOCATION.to_string());
        warn!(message_id = message_id, error = %e, "message skipped.");
        return TransferOutcome::failure(record.object_key(), e.to_string())
            .with_message_id(message_id);
    };

    worker
        .move_object(bucket, key)
        .await
        .with_message_id(message_id)
}
