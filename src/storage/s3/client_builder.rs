use std::time::Duration;

use aws_config::meta::region::RegionProviderChain;
use aws_config::profile::profile_file::{ProfileFileKind, ProfileFiles};
use aws_config::retry::RetryConfig;
use aws_config::stalled_stream_protection::StalledStreamProtectionConfig;
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, ConfigLoader, Region, SdkConfig};
use aws_sdk_s3::config::Credentials;

use crate::config::ClientConfig;
use crate::types::S3Credentials;

const CREDENTIALS_PROVIDER_NAME: &str = "s3ingest";

/// Load the shared SDK configuration when no client options were given.
pub async fn load_default_sdk_config() -> SdkConfig {
    aws_config::defaults(BehaviorVersion::latest()).load().await
}

impl ClientConfig {
    /// S3 client honouring every option of this configuration.
    pub async fn create_client(&self) -> aws_sdk_s3::Client {
        let sdk_config = self.load_sdk_config().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(self.force_path_style)
            .request_checksum_calculation(self.request_checksum_calculation.clone())
            .build();

        aws_sdk_s3::Client::from_conf(s3_config)
    }

    /// Shared SDK configuration (credentials, region, endpoint, retry and
    /// timeouts), usable for any AWS service client.
    pub async fn load_sdk_config(&self) -> SdkConfig {
        let mut config_loader = self.load_config_credential(aws_config::defaults(
            BehaviorVersion::latest(),
        ));

        config_loader = config_loader.region(self.build_region_provider());

        if let Some(endpoint_url) = &self.endpoint_url {
            config_loader = config_loader.endpoint_url(endpoint_url);
        }

        config_loader = config_loader
            .retry_config(self.build_retry_config())
            .timeout_config(self.build_timeout_config());

        if self.disable_stalled_stream_protection {
            config_loader =
                config_loader.stalled_stream_protection(StalledStreamProtectionConfig::disabled());
        }

        config_loader.load().await
    }

    fn load_config_credential(&self, mut config_loader: ConfigLoader) -> ConfigLoader {
        match &self.credential {
            S3Credentials::Credentials { access_keys } => {
                let credentials = Credentials::new(
                    access_keys.access_key.to_string(),
                    access_keys.secret_access_key.to_string(),
                    access_keys.session_token.clone(),
                    None,
                    CREDENTIALS_PROVIDER_NAME,
                );
                config_loader = config_loader.credentials_provider(credentials);
            }
            S3Credentials::Profile(profile_name) => {
                config_loader = config_loader
                    .profile_name(profile_name)
                    .profile_files(self.build_profile_files());
            }
            S3Credentials::FromEnvironment => {
                if self.has_custom_profile_files() {
                    config_loader = config_loader.profile_files(self.build_profile_files());
                }
            }
        }
        config_loader
    }

    fn has_custom_profile_files(&self) -> bool {
        self.client_config_location.aws_config_file.is_some()
            || self
                .client_config_location
                .aws_shared_credentials_file
                .is_some()
    }

    fn build_profile_files(&self) -> ProfileFiles {
        let mut builder = ProfileFiles::builder();

        builder = match &self.client_config_location.aws_config_file {
            Some(path) => builder.with_file(ProfileFileKind::Config, path),
            None => builder.include_default_config_file(true),
        };
        builder = match &self.client_config_location.aws_shared_credentials_file {
            Some(path) => builder.with_file(ProfileFileKind::Credentials, path),
            None => builder.include_default_credentials_file(true),
        };

        builder.build()
    }

    fn build_region_provider(&self) -> RegionProviderChain {
        match &self.region {
            Some(region) => RegionProviderChain::first_try(Region::new(region.clone())),
            None => RegionProviderChain::default_provider(),
        }
    }

    fn build_retry_config(&self) -> RetryConfig {
        RetryConfig::standard()
            .with_max_attempts(self.retry_config.aws_max_attempts)
            .with_initial_backoff(Duration::from_millis(
                self.retry_config.initial_backoff_milliseconds,
            ))
    }

    fn build_timeout_config(&self) -> TimeoutConfig {
        let timeouts = &self.cli_timeout_config;
        let mut builder = TimeoutConfig::builder();
        builder
            .set_operation_timeout(
                timeouts
                    .operation_timeout_milliseconds
                    .map(Duration::from_millis),
            )
            .set_operation_attempt_timeout(
                timeouts
                    .operation_attempt_timeout_milliseconds
                    .map(Duration::from_millis),
            )
            .set_connect_timeout(timeouts.connect_timeout_milliseconds.map(Duration::from_millis))
            .set_read_timeout(timeouts.read_timeout_milliseconds.map(Duration::from_millis));
        builder.build()
    }
}
