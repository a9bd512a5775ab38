use super::*;
use crate::config::Config;
use crate::test_utils::init_dummy_tracing_subscriber;
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Basic parsing tests
// ---------------------------------------------------------------------------

#[test]
fn parse_minimal_move_args() {
    init_dummy_tracing_subscriber();

    let args = vec!["s3ingest", "--destination-bucket", "archive", "move"];
    let cli = parse_from_args(args).unwrap();
    assert_eq!(cli.command, Command::Move { event_file: None });
    assert_eq!(cli.destination_bucket.as_deref(), Some("archive"));
    assert_eq!(cli.destination_prefix, "processed/");
    assert_eq!(cli.max_retries, 5);
    assert_eq!(cli.backoff_base_milliseconds, 1000);
    assert!(cli.max_backoff_milliseconds.is_none());
    assert_eq!(cli.worker_size, 10);
}

#[test]
fn parse_global_options_after_subcommand() {
    let args = vec![
        "s3ingest",
        "move",
        "--destination-bucket",
        "archive",
        "--worker-size",
        "4",
    ];
    let cli = parse_from_args(args).unwrap();
    assert_eq!(cli.destination_bucket.as_deref(), Some("archive"));
    assert_eq!(cli.worker_size, 4);
}

#[test]
fn parse_inventory_and_report_subcommands() {
    let cli = parse_from_args(vec!["s3ingest", "inventory"]).unwrap();
    assert_eq!(cli.command, Command::Inventory { event_file: None });

    let cli = parse_from_args(vec!["s3ingest", "report"]).unwrap();
    assert_eq!(cli.command, Command::Report);
}

#[test]
fn parse_event_file_must_exist() {
    let args = vec!["s3ingest", "move", "--event-file", "./no/such/event.json"];
    assert!(parse_from_args(args).is_err());

    let args = vec!["s3ingest", "inventory", "--event-file", "Cargo.toml"];
    let cli = parse_from_args(args).unwrap();
    assert_eq!(
        cli.command,
        Command::Inventory {
            event_file: Some(PathBuf::from("Cargo.toml"))
        }
    );
}

#[test]
fn parse_missing_subcommand() {
    assert!(parse_from_args(vec!["s3ingest"]).is_err());
}

#[test]
fn parse_transfer_options() {
    let args = vec![
        "s3ingest",
        "--destination-prefix",
        "landing/",
        "--max-retries",
        "3",
        "--backoff-base-milliseconds",
        "250",
        "--max-backoff-milliseconds",
        "4000",
        "--multipart-threshold",
        "64MiB",
        "--multipart-part-size",
        "16MiB",
        "--multipart-concurrency",
        "4",
        "report",
    ];
    let cli = parse_from_args(args).unwrap();
    assert_eq!(cli.destination_prefix, "landing/");
    assert_eq!(cli.max_retries, 3);
    assert_eq!(cli.backoff_base_milliseconds, 250);
    assert_eq!(cli.max_backoff_milliseconds, Some(4000));
    assert_eq!(cli.multipart_threshold, "64MiB");
    assert_eq!(cli.multipart_part_size, "16MiB");
    assert_eq!(cli.multipart_concurrency, 4);
}

#[test]
fn parse_invalid_human_bytes() {
    let args = vec!["s3ingest", "--multipart-threshold", "lots", "report"];
    assert!(parse_from_args(args).is_err());
}

#[test]
fn parse_report_options() {
    let args = vec![
        "s3ingest",
        "--report-bucket",
        "audit",
        "--report-folder",
        "weekly",
        "--report-tag-key",
        "Cleanup",
        "--report-tag-value",
        "true",
        "report",
    ];
    let cli = parse_from_args(args).unwrap();
    assert_eq!(cli.report_bucket, "audit");
    assert_eq!(cli.report_folder, "weekly");
    assert_eq!(cli.report_tag_key, "Cleanup");
    assert_eq!(cli.report_tag_value, "true");
}

#[test]
fn parse_aws_config_options() {
    let args = vec![
        "s3ingest",
        "--profile",
        "prod",
        "--region",
        "us-west-2",
        "--endpoint-url",
        "https://minio.local:9000",
        "--force-path-style",
        "report",
    ];
    let cli = parse_from_args(args).unwrap();
    assert_eq!(cli.profile.as_deref(), Some("prod"));
    assert_eq!(cli.region.as_deref(), Some("us-west-2"));
    assert_eq!(cli.endpoint_url.as_deref(), Some("https://minio.local:9000"));
    assert!(cli.force_path_style);
}

#[test]
fn parse_endpoint_url_requires_http_scheme() {
    let args = vec!["s3ingest", "--endpoint-url", "ftp://minio.local", "report"];
    assert!(parse_from_args(args).is_err());
}

#[test]
fn parse_access_key_requires_secret() {
    let args = vec!["s3ingest", "--access-key", "AKIA", "report"];
    assert!(parse_from_args(args).is_err());
}

#[test]
fn parse_logging_options() {
    let args = vec![
        "s3ingest",
        "-vvv",
        "--json-tracing",
        "--disable-color-tracing",
        "report",
    ];
    let cli = parse_from_args(args).unwrap();
    assert!(cli.json_tracing);
    assert!(cli.disable_color_tracing);
}

#[test]
fn parse_retry_and_timeout_options() {
    let args = vec![
        "s3ingest",
        "--aws-max-attempts",
        "3",
        "--initial-backoff-milliseconds",
        "50",
        "--operation-timeout-milliseconds",
        "30000",
        "--connect-timeout-milliseconds",
        "1000",
        "report",
    ];
    let cli = parse_from_args(args).unwrap();
    assert_eq!(cli.aws_max_attempts, 3);
    assert_eq!(cli.initial_backoff_milliseconds, 50);
    assert_eq!(cli.operation_timeout_milliseconds, Some(30000));
    assert_eq!(cli.connect_timeout_milliseconds, Some(1000));
    assert!(cli.read_timeout_milliseconds.is_none());
}

// ---------------------------------------------------------------------------
// Config conversion tests
// ---------------------------------------------------------------------------

#[test]
fn config_from_minimal_move_args() {
    init_dummy_tracing_subscriber();

    let args = vec!["s3ingest", "--destination-bucket", "archive", "move"];
    let cli = parse_from_args(args).unwrap();
    let config = Config::try_from(cli).unwrap();
    assert_eq!(config.destination_bucket, "archive");
    assert_eq!(config.destination_prefix, "processed/");
    assert_eq!(config.worker_size, 10);
    assert_eq!(config.transfer_retry_config.max_retries, 5);
    assert_eq!(config.multipart_copy_config.threshold, 5 * 1024 * 1024);
    assert_eq!(config.multipart_copy_config.part_size, 8 * 1024 * 1024);
    assert!(config.client_config.is_some());
}

#[test]
fn config_from_full_args() {
    let args = vec![
        "s3ingest",
        "--destination-bucket",
        "archive",
        "--destination-prefix",
        "landing/",
        "--max-retries",
        "2",
        "--backoff-base-milliseconds",
        "10",
        "--max-backoff-milliseconds",
        "15",
        "--worker-size",
        "3",
        "--multipart-threshold",
        "1GiB",
        "--multipart-part-size",
        "64MiB",
        "--report-bucket",
        "audit",
        "--aws-max-attempts",
        "4",
        "move",
    ];
    let config = build_config_from_args(args).unwrap();
    assert_eq!(config.destination_prefix, "landing/");
    assert_eq!(
        config.transfer_retry_config,
        TransferRetryConfig {
            max_retries: 2,
            backoff_base_milliseconds: 10,
            max_backoff_milliseconds: Some(15),
        }
    );
    assert_eq!(config.worker_size, 3);
    assert_eq!(config.multipart_copy_config.threshold, 1024 * 1024 * 1024);
    assert_eq!(config.multipart_copy_config.part_size, 64 * 1024 * 1024);
    assert_eq!(config.report_config.bucket, "audit");
    assert_eq!(
        config.client_config.unwrap().retry_config.aws_max_attempts,
        4
    );
}

#[test]
fn config_move_requires_destination_bucket() {
    let cli = parse_from_args(vec!["s3ingest", "move"]).unwrap();
    let result = Config::try_from(cli);
    assert_eq!(
        result.unwrap_err(),
        ERROR_MESSAGE_DESTINATION_BUCKET_REQUIRED
    );
}

#[test]
fn config_inventory_and_report_do_not_need_destination_bucket() {
    let config = build_config_from_args(vec!["s3ingest", "inventory"]).unwrap();
    assert!(config.destination_bucket.is_empty());

    let config = build_config_from_args(vec!["s3ingest", "report"]).unwrap();
    assert_eq!(config.report_config.bucket, "deletion-candidate-reports");
}

#[test]
fn config_validates_worker_size_zero() {
    let args = vec!["s3ingest", "--worker-size", "0", "report"];
    let result = build_config_from_args(args);
    assert_eq!(result.unwrap_err(), ERROR_MESSAGE_WORKER_SIZE_ZERO);
}

#[test]
fn config_validates_max_retries_zero() {
    let args = vec!["s3ingest", "--max-retries", "0", "report"];
    let result = build_config_from_args(args);
    assert_eq!(result.unwrap_err(), ERROR_MESSAGE_MAX_RETRIES_ZERO);
}

#[test]
fn config_validates_multipart_concurrency_zero() {
    let args = vec!["s3ingest", "--multipart-concurrency", "0", "report"];
    let result = build_config_from_args(args);
    assert_eq!(result.unwrap_err(), ERROR_MESSAGE_MULTIPART_CONCURRENCY_ZERO);
}

#[test]
fn config_validates_part_size_minimum() {
    let args = vec!["s3ingest", "--multipart-part-size", "1MiB", "report"];
    let result = build_config_from_args(args);
    assert_eq!(
        result.unwrap_err(),
        ERROR_MESSAGE_MULTIPART_PART_SIZE_TOO_SMALL
    );
}

#[test]
fn config_tracing_config_none_when_silent() {
    let args = vec!["s3ingest", "-qq", "report"];
    let config = build_config_from_args(args).unwrap();
    assert!(config.tracing_config.is_none());
}

#[test]
fn config_tracing_config_default_is_warn() {
    let config = build_config_from_args(vec!["s3ingest", "report"]).unwrap();
    assert_eq!(
        config.tracing_config.unwrap().tracing_level,
        log::Level::Warn
    );
}

#[test]
fn config_tracing_config_trace_with_very_verbose() {
    let args = vec!["s3ingest", "-vvv", "--json-tracing", "report"];
    let config = build_config_from_args(args).unwrap();
    let tracing_config = config.tracing_config.unwrap();
    assert_eq!(tracing_config.tracing_level, log::Level::Trace);
    assert!(tracing_config.json_tracing);
}

#[test]
fn config_client_config_from_profile() {
    let args = vec!["s3ingest", "--profile", "myprofile", "report"];
    let config = build_config_from_args(args).unwrap();
    let client_config = config.client_config.unwrap();
    assert!(matches!(client_config.credential, S3Credentials::Profile(ref p) if p == "myprofile"));
}

#[test]
fn config_client_config_from_access_keys() {
    let args = vec![
        "s3ingest",
        "--access-key",
        "AKIA",
        "--secret-access-key",
        "secret123",
        "--session-token",
        "token",
        "report",
    ];
    let config = build_config_from_args(args).unwrap();
    let client_config = config.client_config.unwrap();
    let S3Credentials::Credentials { access_keys } = client_config.credential else {
        panic!("expected access key credentials");
    };
    assert_eq!(access_keys.access_key, "AKIA");
    assert_eq!(access_keys.secret_access_key, "secret123");
    assert_eq!(access_keys.session_token.as_deref(), Some("token"));
}

#[test]
fn build_config_from_args_error() {
    let result = build_config_from_args(vec!["s3ingest", "--bogus", "report"]);
    assert!(result.is_err());
}

proptest! {
    #[test]
    fn prop_retry_options_round_trip_into_config(
        max_retries in 1u32..100,
        base in 0u64..100_000,
        workers in 1u16..512,
    ) {
        let args = vec![
            "s3ingest".to_string(),
            "--max-retries".to_string(),
            max_retries.to_string(),
            "--backoff-base-milliseconds".to_string(),
            base.to_string(),
            "--worker-size".to_string(),
            workers.to_string(),
            "report".to_string(),
        ];
        let config = build_config_from_args(args).unwrap();
        prop_assert_eq!(config.transfer_retry_config.max_retries, max_retries);
        prop_assert_eq!(config.transfer_retry_config.backoff_base_milliseconds, base);
        prop_assert_eq!(config.worker_size, workers);
    }
}
