pub mod args;

use std::time::Duration;

use aws_smithy_types::checksum_config::RequestChecksumCalculation;

use crate::types::{ClientConfigLocation, S3Credentials};

pub const DEFAULT_DESTINATION_PREFIX: &str = "processed/";
pub const DEFAULT_REPORT_BUCKET: &str = "deletion-candidate-reports";
pub const DEFAULT_REPORT_FOLDER: &str = "reports";
pub const DEFAULT_REPORT_TAG_KEY: &str = "DeletionCandidate";
pub const DEFAULT_REPORT_TAG_VALUE: &str = "yes";
pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_BACKOFF_BASE_MILLISECONDS: u64 = 1000;
pub const DEFAULT_WORKER_SIZE: u16 = 10;
pub const DEFAULT_MULTIPART_THRESHOLD: u64 = 5 * 1024 * 1024;
pub const DEFAULT_MULTIPART_PART_SIZE: u64 = 8 * 1024 * 1024;
pub const DEFAULT_MULTIPART_CONCURRENCY: u16 = 10;

/// Main configuration for s3ingest-rs.
///
/// Holds the destination of moved objects, the retry policy of the
/// transfer worker, the size of the batch worker pool, multipart copy
/// tuning, the tag report location, and AWS client settings.
///
/// Use [`Config::for_destination`] for a minimal configuration:
///
/// ```
/// use s3ingest_rs::Config;
///
/// let config = Config::for_destination("archive-bucket");
/// assert_eq!(config.destination_prefix, "processed/");
/// assert_eq!(config.worker_size, 10);
/// assert_eq!(config.transfer_retry_config.max_retries, 5);
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub destination_bucket: String,
    pub destination_prefix: String,
    pub worker_size: u16,
    pub transfer_retry_config: TransferRetryConfig,
    pub multipart_copy_config: MultipartCopyConfig,
    pub report_config: ReportConfig,
    pub client_config: Option<ClientConfig>,
    pub tracing_config: Option<TracingConfig>,
}

impl Config {
    /// Create a `Config` with defaults that moves objects into `bucket`.
    pub fn for_destination(bucket: &str) -> Self {
        Config {
            destination_bucket: bucket.to_string(),
            ..Config::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            destination_bucket: String::new(),
            destination_prefix: DEFAULT_DESTINATION_PREFIX.to_string(),
            worker_size: DEFAULT_WORKER_SIZE,
            transfer_retry_config: TransferRetryConfig::default(),
            multipart_copy_config: MultipartCopyConfig::default(),
            report_config: ReportConfig::default(),
            client_config: None,
            tracing_config: None,
        }
    }
}

/// Application-level retry policy of the transfer worker.
///
/// A failed attempt `n` (zero-based) is followed by a sleep of
/// `backoff_base_milliseconds * 2^n`, capped by `max_backoff_milliseconds`
/// when set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferRetryConfig {
    pub max_retries: u32,
    pub backoff_base_milliseconds: u64,
    pub max_backoff_milliseconds: Option<u64>,
}

impl Default for TransferRetryConfig {
    fn default() -> Self {
        TransferRetryConfig {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base_milliseconds: DEFAULT_BACKOFF_BASE_MILLISECONDS,
            max_backoff_milliseconds: None,
        }
    }
}

impl TransferRetryConfig {
    /// Sleep after the failed attempt with the given zero-based index.
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let multiplier = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
        let backoff = self.backoff_base_milliseconds.saturating_mul(multiplier);
        let backoff = match self.max_backoff_milliseconds {
            Some(ceiling) => backoff.min(ceiling),
            None => backoff,
        };
        Duration::from_millis(backoff)
    }
}

/// Large-object copy tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultipartCopyConfig {
    /// Objects larger than this are copied part by part.
    pub threshold: u64,
    pub part_size: u64,
    pub max_concurrency: u16,
}

impl Default for MultipartCopyConfig {
    fn default() -> Self {
        MultipartCopyConfig {
            threshold: DEFAULT_MULTIPART_THRESHOLD,
            part_size: DEFAULT_MULTIPART_PART_SIZE,
            max_concurrency: DEFAULT_MULTIPART_CONCURRENCY,
        }
    }
}

/// Where the tag report is written and which tag selects resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportConfig {
    pub bucket: String,
    pub folder: String,
    pub tag_key: String,
    pub tag_value: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        ReportConfig {
            bucket: DEFAULT_REPORT_BUCKET.to_string(),
            folder: DEFAULT_REPORT_FOLDER.to_string(),
            tag_key: DEFAULT_REPORT_TAG_KEY.to_string(),
            tag_value: DEFAULT_REPORT_TAG_VALUE.to_string(),
        }
    }
}

/// AWS client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_config_location: ClientConfigLocation,
    pub credential: S3Credentials,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
    pub retry_config: RetryConfig,
    pub cli_timeout_config: CLITimeoutConfig,
    pub disable_stalled_stream_protection: bool,
    pub request_checksum_calculation: RequestChecksumCalculation,
}

/// Retry configuration for AWS SDK operations.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub aws_max_attempts: u32,
    pub initial_backoff_milliseconds: u64,
}

/// Timeout configuration for AWS SDK operations.
#[derive(Debug, Clone)]
pub struct CLITimeoutConfig {
    pub operation_timeout_milliseconds: Option<u64>,
    pub operation_attempt_timeout_milliseconds: Option<u64>,
    pub connect_timeout_milliseconds: Option<u64>,
    pub read_timeout_milliseconds: Option<u64>,
}

/// Tracing (logging) configuration.
#[derive(Debug, Clone, Copy)]
pub struct TracingConfig {
    pub tracing_level: log::Level,
    pub json_tracing: bool,
    pub aws_sdk_tracing: bool,
    pub span_events_tracing: bool,
    pub disable_color_tracing: bool,
}
