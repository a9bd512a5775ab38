/*!
# Overview
s3ingest-rs moves and catalogues objects announced by S3 event
notifications delivered through a queue.

## Features
- **Message normalisation**: direct S3 events and SNS-wrapped events
- **Inventory records**: team/product taxonomy, path depths, filename and extension
- **Transfers**: copy then delete with exponential backoff, multipart copy for large objects
- **Batch dispatch**: bounded worker pool with per-message outcomes
- **Tag reports**: CSV report of resources carrying a marker tag
- **Library-First**: the s3ingest CLI is a thin wrapper over this library

Example usage
=============

```toml
[dependencies]
s3ingest-rs = "0.1"
tokio = { version = "1", features = ["full"] }
```

```no_run
use s3ingest_rs::config::args::parse_from_args;
use s3ingest_rs::storage::create_storage;
use s3ingest_rs::{BatchDispatcher, Config};

#[tokio::main]
async fn main() {
    let args = vec!["s3ingest", "--destination-bucket", "archive", "move"];
    let config = Config::try_from(parse_from_args(args).unwrap()).unwrap();

    let storage = create_storage(&config).await;
    let dispatcher = BatchDispatcher::new(config, storage);

    let payload = r#"{"Records":[{"messageId":"1","body":"{\"Records\":[]}"}]}"#;
    let result = dispatcher.handle_event(payload).await;
    println!("{}", serde_json::to_string(&result).unwrap());
}
```
*/

pub mod config;
pub mod dispatcher;
pub mod inventory;
pub mod normalizer;
pub mod report;
pub mod storage;
pub mod tagging;
pub mod transfer;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::Config;
pub use dispatcher::BatchDispatcher;
pub use inventory::extract;
pub use normalizer::normalize;
pub use report::TagReportGenerator;
pub use transfer::TransferWorker;
pub use types::error::S3IngestError;
pub use types::{
    InventoryRecord, InvocationResult, QueueMessage, RawStorageEventRecord, TransferOutcome,
    TransferStatus,
};
