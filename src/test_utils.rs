//! Shared test utilities for the s3ingest library crate.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use aws_smithy_types::checksum_config::RequestChecksumCalculation;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::{
    CLITimeoutConfig, ClientConfig, Config, RetryConfig, TransferRetryConfig,
};
use crate::storage::{Storage, StorageTrait};
use crate::tagging::{TagQuery, TagQueryTrait};
use crate::types::{
    AccessKeys, ClientConfigLocation, ResourceTag, S3Credentials, TaggedResource,
};

/// Initialise a dummy tracing subscriber for tests.
///
/// Uses `try_init` so that only the first call in a process actually
/// installs the subscriber; subsequent calls are silently ignored.
pub(crate) fn init_dummy_tracing_subscriber() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("dummy=trace")
        .try_init();
}

/// Config moving into `archive-bucket` with 4 workers and a 1ms backoff base.
pub(crate) fn make_test_config() -> Config {
    Config {
        worker_size: 4,
        transfer_retry_config: TransferRetryConfig {
            max_retries: 5,
            backoff_base_milliseconds: 1,
            max_backoff_milliseconds: None,
        },
        ..Config::for_destination("archive-bucket")
    }
}

pub(crate) fn make_test_client_config() -> ClientConfig {
    ClientConfig {
        client_config_location: ClientConfigLocation::default(),
        credential: S3Credentials::Credentials {
            access_keys: AccessKeys {
                access_key: "test".to_string(),
                secret_access_key: "test".to_string(),
                session_token: None,
            },
        },
        region: Some("us-east-1".to_string()),
        endpoint_url: Some("https://localhost:9000".to_string()),
        force_path_style: true,
        retry_config: RetryConfig {
            aws_max_attempts: 3,
            initial_backoff_milliseconds: 100,
        },
        cli_timeout_config: CLITimeoutConfig {
            operation_timeout_milliseconds: None,
            operation_attempt_timeout_milliseconds: None,
            connect_timeout_milliseconds: None,
            read_timeout_milliseconds: None,
        },
        disable_stalled_stream_protection: false,
        request_checksum_calculation: RequestChecksumCalculation::WhenRequired,
    }
}

/// Build a direct storage event body for one object.
pub(crate) fn make_event_body(bucket: &str, key: &str) -> String {
    serde_json::json!({
        "Records": [{
            "eventSource": "aws:s3",
            "s3": { "bucket": { "name": bucket }, "object": { "key": key } }
        }]
    })
    .to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CopyCall {
    pub source_bucket: String,
    pub source_key: String,
    pub destination_bucket: String,
    pub destination_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PutCall {
    pub bucket: String,
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: String,
}

/// Records every call; copy and delete fail a configurable number of
/// times per source key before succeeding. Copies can be slowed down per
/// key, and the peak number of concurrent copies is tracked.
#[derive(Clone, Default)]
pub(crate) struct MockStorage {
    pub copy_calls: Arc<Mutex<Vec<CopyCall>>>,
    pub delete_calls: Arc<Mutex<Vec<(String, String)>>>,
    pub put_calls: Arc<Mutex<Vec<PutCall>>>,
    copy_failures: Arc<Mutex<HashMap<String, u32>>>,
    delete_failures: Arc<Mutex<HashMap<String, u32>>>,
    put_fails: Arc<Mutex<bool>>,
    copy_delays: Arc<Mutex<HashMap<String, Duration>>>,
    default_copy_delay: Arc<Mutex<Option<Duration>>>,
    copies_in_flight: Arc<AtomicUsize>,
    max_copies_in_flight: Arc<AtomicUsize>,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` copies of `key`. `u32::MAX` never recovers.
    pub fn fail_copy(&self, key: &str, times: u32) {
        self.copy_failures
            .lock()
            .unwrap()
            .insert(key.to_string(), times);
    }

    pub fn fail_delete(&self, key: &str, times: u32) {
        self.delete_failures
            .lock()
            .unwrap()
            .insert(key.to_string(), times);
    }

    /// Every copy of `key` takes `delay` before returning.
    pub fn delay_copy(&self, key: &str, delay: Duration) {
        self.copy_delays
            .lock()
            .unwrap()
            .insert(key.to_string(), delay);
    }

    /// Every copy without a per-key delay takes `delay` before returning.
    pub fn delay_all_copies(&self, delay: Duration) {
        *self.default_copy_delay.lock().unwrap() = Some(delay);
    }

    pub fn max_copies_in_flight(&self) -> usize {
        self.max_copies_in_flight.load(Ordering::SeqCst)
    }

    pub fn fail_put(&self) {
        *self.put_fails.lock().unwrap() = true;
    }

    pub fn boxed(&self) -> Storage {
        Box::new(self.clone())
    }

    pub fn copy_count(&self) -> usize {
        self.copy_calls.lock().unwrap().len()
    }

    pub fn delete_count(&self) -> usize {
        self.delete_calls.lock().unwrap().len()
    }

    fn take_failure(failures: &Mutex<HashMap<String, u32>>, key: &str) -> bool {
        let mut failures = failures.lock().unwrap();
        match failures.get_mut(key) {
            Some(&mut 0) | None => false,
            Some(&mut u32::MAX) => true,
            Some(remaining) => {
                *remaining -= 1;
                true
            }
        }
    }
}

#[async_trait]
impl StorageTrait for MockStorage {
    async fn copy_object(
        &self,
        source_bucket: &str,
        source_key: &str,
        destination_bucket: &str,
        destination_key: &str,
    ) -> Result<()> {
        self.copy_calls.lock().unwrap().push(CopyCall {
            source_bucket: source_bucket.to_string(),
            source_key: source_key.to_string(),
            destination_bucket: destination_bucket.to_string(),
            destination_key: destination_key.to_string(),
        });

        let delay = self
            .copy_delays
            .lock()
            .unwrap()
            .get(source_key)
            .copied()
            .or(*self.default_copy_delay.lock().unwrap());
        if let Some(delay) = delay {
            let in_flight = self.copies_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_copies_in_flight.fetch_max(in_flight, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            self.copies_in_flight.fetch_sub(1, Ordering::SeqCst);
        }

        if Self::take_failure(&self.copy_failures, source_key) {
            return Err(anyhow!("AccessDenied: copy of {source_key} refused"));
        }
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.delete_calls
            .lock()
            .unwrap()
            .push((bucket.to_string(), key.to_string()));

        if Self::take_failure(&self.delete_failures, key) {
            return Err(anyhow!("InternalError: delete of {key} failed"));
        }
        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        if *self.put_fails.lock().unwrap() {
            return Err(anyhow!("AccessDenied: put of {key} refused"));
        }

        self.put_calls.lock().unwrap().push(PutCall {
            bucket: bucket.to_string(),
            key: key.to_string(),
            body,
            content_type: content_type.to_string(),
        });
        Ok(())
    }
}

/// Returns a fixed resource list, or an error when `fails` is set.
#[derive(Clone, Default)]
pub(crate) struct MockTagQuery {
    pub resources: Vec<TaggedResource>,
    pub fails: bool,
    pub calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockTagQuery {
    pub fn with_resources(resources: Vec<TaggedResource>) -> Self {
        Self {
            resources,
            ..Self::default()
        }
    }

    pub fn boxed(&self) -> TagQuery {
        Box::new(self.clone())
    }
}

#[async_trait]
impl TagQueryTrait for MockTagQuery {
    async fn list_resources_by_tag(&self, key: &str, value: &str) -> Result<Vec<TaggedResource>> {
        self.calls
            .lock()
            .unwrap()
            .push((key.to_string(), value.to_string()));

        if self.fails {
            return Err(anyhow!("AccessDeniedException: tag:GetResources not allowed"));
        }
        Ok(self.resources.clone())
    }
}

pub(crate) fn make_tagged_resource(arn: &str, tags: &[(&str, &str)]) -> TaggedResource {
    TaggedResource {
        arn: arn.to_string(),
        tags: tags
            .iter()
            .map(|(key, value)| ResourceTag {
                key: key.to_string(),
                value: value.to_string(),
            })
            .collect(),
    }
}
