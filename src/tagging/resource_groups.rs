use anyhow::{Result, anyhow};
use async_trait::async_trait;
use aws_sdk_resourcegroupstagging::Client;
use aws_sdk_resourcegroupstagging::types::TagFilter;
use std::sync::Arc;
use tracing::{debug, error};

use crate::config::Config;
use crate::storage::s3::client_builder::load_default_sdk_config;
use crate::storage::s3::extract_sdk_error_details;
use crate::tagging::{TagQuery, TagQueryTrait};
use crate::types::error::S3IngestError;
use crate::types::{ResourceTag, TaggedResource};

/// Tag lookup backed by the Resource Groups Tagging API.
#[derive(Clone)]
pub struct ResourceGroupsTagQuery {
    client: Arc<Client>,
}

impl ResourceGroupsTagQuery {
    pub async fn create(config: &Config) -> TagQuery {
        let sdk_config = match &config.client_config {
            Some(client_config) => client_config.load_sdk_config().await,
            None => load_default_sdk_config().await,
        };

        Box::new(ResourceGroupsTagQuery {
            client: Arc::new(Client::new(&sdk_config)),
        })
    }
}

#[async_trait]
impl TagQueryTrait for ResourceGroupsTagQuery {
    async fn list_resources_by_tag(&self, key: &str, value: &str) -> Result<Vec<TaggedResource>> {
        let mut resources = Vec::new();

        let mut paginator = self
            .client
            .get_resources()
            .tag_filters(TagFilter::builder().key(key).values(value).build())
            .into_paginator()
            .send();

        while let Some(page) = paginator.next().await {
            let page = page.map_err(|e| {
                let (error_code, error_message) = extract_sdk_error_details(&e);
                error!(
                    tag_key = key,
                    tag_value = value,
                    error_code = error_code,
                    error_message = error_message,
                    "GetResources API call failed: {} ({}).",
                    error_code,
                    error_message,
                );
                anyhow!(e).context(S3IngestError::AwsSdk(format!(
                    "aws_sdk_resourcegroupstagging::client::get_resources() failed: {error_code} ({error_message})"
                )))
            })?;

            for mapping in page.resource_tag_mapping_list() {
                let Some(arn) = mapping.resource_arn() else {
                    continue;
                };
                resources.push(TaggedResource {
                    arn: arn.to_string(),
                    tags: mapping
                        .tags()
                        .iter()
                        .map(|tag| ResourceTag {
                            key: tag.key().to_string(),
                            value: tag.value().to_string(),
                        })
                        .collect(),
                });
            }
        }

        debug!(
            tag_key = key,
            tag_value = value,
            resources = resources.len(),
            "tagged resources listed."
        );

        Ok(resources)
    }
}
