use crate::config::{
    CLITimeoutConfig, ClientConfig, Config, DEFAULT_BACKOFF_BASE_MILLISECONDS,
    DEFAULT_DESTINATION_PREFIX, DEFAULT_MAX_RETRIES, DEFAULT_MULTIPART_CONCURRENCY,
    DEFAULT_REPORT_BUCKET, DEFAULT_REPORT_FOLDER, DEFAULT_REPORT_TAG_KEY,
    DEFAULT_REPORT_TAG_VALUE, DEFAULT_WORKER_SIZE, MultipartCopyConfig, ReportConfig,
    RetryConfig, TracingConfig, TransferRetryConfig,
};
use crate::types::{AccessKeys, ClientConfigLocation, S3Credentials};
use aws_smithy_types::checksum_config::RequestChecksumCalculation;
use clap::builder::NonEmptyStringValueParser;
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use std::ffi::OsString;
use std::path::PathBuf;

use value_parser::file_exist::is_file_exist;
use value_parser::human_bytes::{check_human_bytes, parse_human_bytes};
use value_parser::url::check_scheme;

pub mod value_parser;

#[cfg(test)]
mod tests;

// ---------------------------------------------------------------------------
// Default constants
// ---------------------------------------------------------------------------

const DEFAULT_MULTIPART_THRESHOLD: &str = "5MiB";
const DEFAULT_MULTIPART_PART_SIZE: &str = "8MiB";
const DEFAULT_AWS_MAX_ATTEMPTS: u32 = 10;
const DEFAULT_INITIAL_BACKOFF_MILLISECONDS: u64 = 100;
const DEFAULT_JSON_TRACING: bool = false;
const DEFAULT_AWS_SDK_TRACING: bool = false;
const DEFAULT_SPAN_EVENTS_TRACING: bool = false;
const DEFAULT_DISABLE_COLOR_TRACING: bool = false;
const DEFAULT_FORCE_PATH_STYLE: bool = false;
const DEFAULT_DISABLE_STALLED_STREAM_PROTECTION: bool = false;

/// S3 rejects multipart parts (other than the last) below this size.
const MIN_MULTIPART_PART_SIZE: u64 = 5 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Error messages
// ---------------------------------------------------------------------------

const ERROR_MESSAGE_DESTINATION_BUCKET_REQUIRED: &str =
    "Destination bucket is required for the move command (--destination-bucket or DESTINATION_BUCKET).";
const ERROR_MESSAGE_WORKER_SIZE_ZERO: &str = "Worker size must be at least 1.";
const ERROR_MESSAGE_MAX_RETRIES_ZERO: &str = "Max retries must be at least 1.";
const ERROR_MESSAGE_MULTIPART_CONCURRENCY_ZERO: &str = "Multipart concurrency must be at least 1.";
const ERROR_MESSAGE_MULTIPART_PART_SIZE_TOO_SMALL: &str =
    "Multipart part size must be at least 5MiB (S3 API limit).";
const ERROR_MESSAGE_REPORT_BUCKET_EMPTY: &str = "Report bucket must not be empty.";

// ---------------------------------------------------------------------------
// CLIArgs (clap-derived argument struct)
// ---------------------------------------------------------------------------

/// s3ingest - S3 ingestion utilities.
///
/// Every option can also be given as an environment variable named after
/// the option (e.g. DESTINATION_BUCKET, MAX_RETRIES, WORKER_SIZE).
///
/// Example:
///   s3ingest move --destination-bucket archive --event-file event.json
///   s3ingest inventory < event.json
///   s3ingest report --report-bucket reports-bucket
#[derive(Parser, Clone, Debug)]
#[command(name = "s3ingest", version, about, long_about = None)]
pub struct CLIArgs {
    #[command(subcommand)]
    pub command: Command,

    // -----------------------------------------------------------------------
    // Transfer options
    // -----------------------------------------------------------------------
    /// Bucket that moved objects are copied into.
    #[arg(long, env, global = true, value_parser = NonEmptyStringValueParser::new(), help_heading = "Transfer")]
    pub destination_bucket: Option<String>,

    /// Key prefix prepended to the basename of every moved object.
    #[arg(long, env, global = true, default_value = DEFAULT_DESTINATION_PREFIX, help_heading = "Transfer")]
    pub destination_prefix: String,

    /// Attempts per object before it is reported as failed. Default: 5.
    #[arg(long, env, global = true, default_value_t = DEFAULT_MAX_RETRIES, help_heading = "Transfer")]
    pub max_retries: u32,

    /// Backoff after the first failed attempt, doubled on every further failure. Default: 1000.
    #[arg(long, env, global = true, default_value_t = DEFAULT_BACKOFF_BASE_MILLISECONDS, help_heading = "Transfer")]
    pub backoff_base_milliseconds: u64,

    /// Upper bound for a single backoff sleep. Unbounded when not set.
    #[arg(long, env, global = true, help_heading = "Transfer")]
    pub max_backoff_milliseconds: Option<u64>,

    /// Number of messages processed concurrently per batch. Default: 10.
    #[arg(long, env, global = true, default_value_t = DEFAULT_WORKER_SIZE, help_heading = "Transfer")]
    pub worker_size: u16,

    /// Objects larger than this are copied with multipart upload.
    #[arg(
        long,
        env,
        global = true,
        default_value = DEFAULT_MULTIPART_THRESHOLD,
        value_parser = check_human_bytes,
        help_heading = "Transfer",
        long_help = r#"Objects larger than this size are copied part by part.
Allow suffixes: KB, KiB, MB, MiB, GB, GiB"#
    )]
    pub multipart_threshold: String,

    /// Part size used for multipart copies.
    #[arg(
        long,
        env,
        global = true,
        default_value = DEFAULT_MULTIPART_PART_SIZE,
        value_parser = check_human_bytes,
        help_heading = "Transfer"
    )]
    pub multipart_part_size: String,

    /// Parts copied concurrently for one large object. Default: 10.
    #[arg(long, env, global = true, default_value_t = DEFAULT_MULTIPART_CONCURRENCY, help_heading = "Transfer")]
    pub multipart_concurrency: u16,

    // -----------------------------------------------------------------------
    // Report options
    // -----------------------------------------------------------------------
    /// Bucket that receives the tag report.
    #[arg(long, env, global = true, default_value = DEFAULT_REPORT_BUCKET, help_heading = "Report")]
    pub report_bucket: String,

    /// Folder (key prefix) of the tag report.
    #[arg(long, env, global = true, default_value = DEFAULT_REPORT_FOLDER, help_heading = "Report")]
    pub report_folder: String,

    /// Tag key that marks resources for the report.
    #[arg(long, env, global = true, default_value = DEFAULT_REPORT_TAG_KEY, help_heading = "Report")]
    pub report_tag_key: String,

    /// Tag value that marks resources for the report.
    #[arg(long, env, global = true, default_value = DEFAULT_REPORT_TAG_VALUE, help_heading = "Report")]
    pub report_tag_value: String,

    // -----------------------------------------------------------------------
    // Logging options
    // -----------------------------------------------------------------------
    /// Verbosity level. -q (quiet), default (normal), -v, -vv, -vvv.
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Output logs in JSON format.
    #[arg(long, env, global = true, default_value_t = DEFAULT_JSON_TRACING, help_heading = "Logging")]
    pub json_tracing: bool,

    /// Enable AWS SDK tracing.
    #[arg(long, env, global = true, default_value_t = DEFAULT_AWS_SDK_TRACING, help_heading = "Logging")]
    pub aws_sdk_tracing: bool,

    /// Enable tracing span events.
    #[arg(long, env, global = true, default_value_t = DEFAULT_SPAN_EVENTS_TRACING, help_heading = "Logging")]
    pub span_events_tracing: bool,

    /// Disable colored output in logs.
    #[arg(long, env, global = true, default_value_t = DEFAULT_DISABLE_COLOR_TRACING, help_heading = "Logging")]
    pub disable_color_tracing: bool,

    // -----------------------------------------------------------------------
    // AWS SDK retry options
    // -----------------------------------------------------------------------
    /// Maximum retry attempts inside the AWS SDK. Default: 10.
    #[arg(long, env, global = true, default_value_t = DEFAULT_AWS_MAX_ATTEMPTS, help_heading = "Retry")]
    pub aws_max_attempts: u32,

    /// Initial backoff in milliseconds for AWS SDK retries. Default: 100.
    #[arg(long, env, global = true, default_value_t = DEFAULT_INITIAL_BACKOFF_MILLISECONDS, help_heading = "Retry")]
    pub initial_backoff_milliseconds: u64,

    // -----------------------------------------------------------------------
    // Timeout options
    // -----------------------------------------------------------------------
    /// Overall operation timeout in milliseconds.
    #[arg(long, env, global = true, help_heading = "Timeout")]
    pub operation_timeout_milliseconds: Option<u64>,

    /// Per-attempt operation timeout in milliseconds.
    #[arg(long, env, global = true, help_heading = "Timeout")]
    pub operation_attempt_timeout_milliseconds: Option<u64>,

    /// Connection timeout in milliseconds.
    #[arg(long, env, global = true, help_heading = "Timeout")]
    pub connect_timeout_milliseconds: Option<u64>,

    /// Read timeout in milliseconds.
    #[arg(long, env, global = true, help_heading = "Timeout")]
    pub read_timeout_milliseconds: Option<u64>,

    // -----------------------------------------------------------------------
    // AWS configuration
    // -----------------------------------------------------------------------
    /// AWS config file path.
    #[arg(long, env, global = true, help_heading = "AWS")]
    pub aws_config_file: Option<PathBuf>,

    /// AWS shared credentials file path.
    #[arg(long, env, global = true, help_heading = "AWS")]
    pub aws_shared_credentials_file: Option<PathBuf>,

    /// AWS profile. If not set, the default credential chain is used.
    #[arg(long, env, global = true, value_parser = NonEmptyStringValueParser::new(), help_heading = "AWS")]
    pub profile: Option<String>,

    /// AWS access key ID.
    #[arg(long, env, global = true, value_parser = NonEmptyStringValueParser::new(), requires = "secret_access_key", help_heading = "AWS")]
    pub access_key: Option<String>,

    /// AWS secret access key.
    #[arg(long, env, global = true, value_parser = NonEmptyStringValueParser::new(), requires = "access_key", help_heading = "AWS")]
    pub secret_access_key: Option<String>,

    /// AWS session token.
    #[arg(long, env, global = true, value_parser = NonEmptyStringValueParser::new(), help_heading = "AWS")]
    pub session_token: Option<String>,

    /// AWS region.
    #[arg(long, env, global = true, value_parser = NonEmptyStringValueParser::new(), help_heading = "AWS")]
    pub region: Option<String>,

    /// Custom S3-compatible endpoint URL (e.g. LocalStack, MinIO).
    #[arg(long, env, global = true, value_parser = check_scheme, help_heading = "AWS")]
    pub endpoint_url: Option<String>,

    /// Force path-style access (required for some S3-compatible services).
    #[arg(long, env, global = true, default_value_t = DEFAULT_FORCE_PATH_STYLE, help_heading = "AWS")]
    pub force_path_style: bool,

    /// Disable stalled stream protection.
    #[arg(long, env, global = true, default_value_t = DEFAULT_DISABLE_STALLED_STREAM_PROTECTION, help_heading = "AWS")]
    pub disable_stalled_stream_protection: bool,
}

#[derive(Subcommand, Clone, Debug, PartialEq)]
pub enum Command {
    /// Move the objects announced in a queue trigger payload to the destination bucket.
    Move {
        /// Trigger payload file. Read from stdin when omitted.
        #[arg(long, value_parser = is_file_exist)]
        event_file: Option<PathBuf>,
    },
    /// Print one inventory record per object announced in a queue trigger payload.
    Inventory {
        /// Trigger payload file. Read from stdin when omitted.
        #[arg(long, value_parser = is_file_exist)]
        event_file: Option<PathBuf>,
    },
    /// Write a CSV report of every resource carrying the report tag.
    Report,
}

// ---------------------------------------------------------------------------
// parse_from_args (public API)
// ---------------------------------------------------------------------------

/// Parse command-line arguments into a `CLIArgs` struct.
///
/// # Example
///
/// ```
/// use s3ingest_rs::config::args::{Command, parse_from_args};
///
/// let args = vec!["s3ingest", "move", "--destination-bucket", "archive"];
/// let cli_args = parse_from_args(args).unwrap();
/// assert_eq!(cli_args.command, Command::Move { event_file: None });
/// assert_eq!(cli_args.destination_bucket.as_deref(), Some("archive"));
/// ```
pub fn parse_from_args<I, T>(args: I) -> Result<CLIArgs, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    CLIArgs::try_parse_from(args)
}

/// Parse arguments and build a Config in one step.
pub fn build_config_from_args<I, T>(args: I) -> Result<Config, String>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli_args = CLIArgs::try_parse_from(args).map_err(|e| e.to_string())?;
    Config::try_from(cli_args)
}

// ---------------------------------------------------------------------------
// Validation and Config conversion
// ---------------------------------------------------------------------------

impl CLIArgs {
    fn validate(&self) -> Result<(), String> {
        if matches!(self.command, Command::Move { .. }) && self.destination_bucket.is_none() {
            return Err(ERROR_MESSAGE_DESTINATION_BUCKET_REQUIRED.to_string());
        }
        if self.worker_size == 0 {
            return Err(ERROR_MESSAGE_WORKER_SIZE_ZERO.to_string());
        }
        if self.max_retries == 0 {
            return Err(ERROR_MESSAGE_MAX_RETRIES_ZERO.to_string());
        }
        if self.multipart_concurrency == 0 {
            return Err(ERROR_MESSAGE_MULTIPART_CONCURRENCY_ZERO.to_string());
        }
        if self.report_bucket.is_empty() {
            return Err(ERROR_MESSAGE_REPORT_BUCKET_EMPTY.to_string());
        }
        Ok(())
    }

    fn build_multipart_copy_config(&self) -> Result<MultipartCopyConfig, String> {
        let threshold = parse_human_bytes(&self.multipart_threshold)
            .map_err(|e| format!("Invalid multipart-threshold: {e}"))?;
        let part_size = parse_human_bytes(&self.multipart_part_size)
            .map_err(|e| format!("Invalid multipart-part-size: {e}"))?;
        if part_size < MIN_MULTIPART_PART_SIZE {
            return Err(ERROR_MESSAGE_MULTIPART_PART_SIZE_TOO_SMALL.to_string());
        }

        Ok(MultipartCopyConfig {
            threshold,
            part_size,
            max_concurrency: self.multipart_concurrency,
        })
    }

    fn build_client_config(&self) -> Option<ClientConfig> {
        let credential = if let Some(ref profile) = self.profile {
            S3Credentials::Profile(profile.clone())
        } else if let Some(ref access_key) = self.access_key {
            S3Credentials::Credentials {
                access_keys: AccessKeys {
                    access_key: access_key.clone(),
                    secret_access_key: self.secret_access_key.clone().unwrap_or_default(),
                    session_token: self.session_token.clone(),
                },
            }
        } else {
            S3Credentials::FromEnvironment
        };

        Some(ClientConfig {
            client_config_location: ClientConfigLocation {
                aws_config_file: self.aws_config_file.clone(),
                aws_shared_credentials_file: self.aws_shared_credentials_file.clone(),
            },
            credential,
            region: self.region.clone(),
            endpoint_url: self.endpoint_url.clone(),
            force_path_style: self.force_path_style,
            retry_config: RetryConfig {
                aws_max_attempts: self.aws_max_attempts,
                initial_backoff_milliseconds: self.initial_backoff_milliseconds,
            },
            cli_timeout_config: CLITimeoutConfig {
                operation_timeout_milliseconds: self.operation_timeout_milliseconds,
                operation_attempt_timeout_milliseconds: self.operation_attempt_timeout_milliseconds,
                connect_timeout_milliseconds: self.connect_timeout_milliseconds,
                read_timeout_milliseconds: self.read_timeout_milliseconds,
            },
            disable_stalled_stream_protection: self.disable_stalled_stream_protection,
            request_checksum_calculation: RequestChecksumCalculation::WhenRequired,
        })
    }

    fn build_tracing_config(&self) -> Option<TracingConfig> {
        let log_level = self.verbosity.log_level()?;

        Some(TracingConfig {
            tracing_level: log_level,
            json_tracing: self.json_tracing,
            aws_sdk_tracing: self.aws_sdk_tracing,
            span_events_tracing: self.span_events_tracing,
            disable_color_tracing: self.disable_color_tracing,
        })
    }
}

impl TryFrom<CLIArgs> for Config {
    type Error = String;

    fn try_from(args: CLIArgs) -> Result<Self, Self::Error> {
        args.validate()?;

        let multipart_copy_config = args.build_multipart_copy_config()?;
        let client_config = args.build_client_config();
        let tracing_config = args.build_tracing_config();

        Ok(Config {
            destination_bucket: args.destination_bucket.clone().unwrap_or_default(),
            destination_prefix: args.destination_prefix.clone(),
            worker_size: args.worker_size,
            transfer_retry_config: TransferRetryConfig {
                max_retries: args.max_retries,
                backoff_base_milliseconds: args.backoff_base_milliseconds,
                max_backoff_milliseconds: args.max_backoff_milliseconds,
            },
            multipart_copy_config,
            report_config: ReportConfig {
                bucket: args.report_bucket.clone(),
                folder: args.report_folder.clone(),
                tag_key: args.report_tag_key.clone(),
                tag_value: args.report_tag_value.clone(),
            },
            client_config,
            tracing_config,
        })
    }
}
