pub mod client_builder;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_smithy_types::error::metadata::ProvideErrorMetadata;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::config::{Config, MultipartCopyConfig};
use crate::storage::{Storage, StorageTrait};
use crate::types::error::S3IngestError;

/// Extracts the S3 error code and message from an AWS SDK error.
///
/// For service errors (S3 API responses), returns the S3 error code
/// (e.g. "AccessDenied", "NoSuchKey") and the message from the response.
/// For other error types (network, timeout, construction failure),
/// returns "N/A" as the code and the full error description as the message.
pub(crate) fn extract_sdk_error_details<E: std::fmt::Display + ProvideErrorMetadata>(
    e: &SdkError<E>,
) -> (String, String) {
    if let Some(service_err) = e.as_service_error() {
        (
            service_err.code().unwrap_or("unknown").to_string(),
            service_err.message().unwrap_or("no message").to_string(),
        )
    } else {
        ("N/A".to_string(), e.to_string())
    }
}

/// `x-amz-copy-source` value: bucket, then the URL-encoded key.
fn copy_source(bucket: &str, key: &str) -> String {
    format!("{bucket}/{}", urlencoding::encode(key))
}

const MAX_PARTS: u64 = 10_000;

/// Inclusive byte ranges covering an object of `size` bytes.
///
/// The part size grows when needed so that the object never needs more
/// than [`MAX_PARTS`] parts.
fn part_ranges(size: u64, part_size: u64) -> Vec<(u64, u64)> {
    let part_size = part_size.max(size.div_ceil(MAX_PARTS)).max(1);
    let mut ranges = Vec::new();
    let mut start = 0;
    while start < size {
        let end = (start + part_size).min(size) - 1;
        ranges.push((start, end));
        start = end + 1;
    }
    ranges
}

/// S3 storage used to move objects and upload reports.
#[derive(Clone)]
pub struct S3Storage {
    client: Arc<Client>,
    multipart_copy_config: MultipartCopyConfig,
}

impl S3Storage {
    pub async fn create(config: &Config) -> Storage {
        let client = match &config.client_config {
            Some(client_config) => client_config.create_client().await,
            None => Client::new(&client_builder::load_default_sdk_config().await),
        };

        Box::new(S3Storage::from_client(
            client,
            config.multipart_copy_config,
        ))
    }

    pub fn from_client(client: Client, multipart_copy_config: MultipartCopyConfig) -> Self {
        S3Storage {
            client: Arc::new(client),
            multipart_copy_config,
        }
    }

    async fn head_object_size(&self, bucket: &str, key: &str) -> Result<u64> {
        let output = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let (s3_error_code, s3_error_message) = extract_sdk_error_details(&e);
                warn!(
                    bucket = bucket,
                    key = key,
                    s3_error_code = s3_error_code,
                    s3_error_message = s3_error_message,
                    "S3 HeadObject API call failed for s3://{}/{}: {} ({}).",
                    bucket, key, s3_error_code, s3_error_message,
                );
                anyhow!(e).context(S3IngestError::AwsSdk(format!(
                    "aws_sdk_s3::client::head_object() failed: {s3_error_code} ({s3_error_message})"
                )))
            })?;

        Ok(output.content_length().unwrap_or_default().max(0) as u64)
    }

    async fn copy_single(
        &self,
        source_bucket: &str,
        source_key: &str,
        destination_bucket: &str,
        destination_key: &str,
    ) -> Result<()> {
        self.client
            .copy_object()
            .copy_source(copy_source(source_bucket, source_key))
            .bucket(destination_bucket)
            .key(destination_key)
            .send()
            .await
            .map_err(|e| {
                let (s3_error_code, s3_error_message) = extract_sdk_error_details(&e);
                warn!(
                    source_bucket = source_bucket,
                    source_key = source_key,
                    destination_bucket = destination_bucket,
                    destination_key = destination_key,
                    s3_error_code = s3_error_code,
                    s3_error_message = s3_error_message,
                    "S3 CopyObject API call failed for s3://{}/{}: {} ({}).",
                    source_bucket, source_key, s3_error_code, s3_error_message,
                );
                anyhow!(e).context(S3IngestError::AwsSdk(format!(
                    "aws_sdk_s3::client::copy_object() failed: {s3_error_code} ({s3_error_message})"
                )))
            })?;

        Ok(())
    }

    async fn copy_multipart(
        &self,
        source_bucket: &str,
        source_key: &str,
        destination_bucket: &str,
        destination_key: &str,
        size: u64,
    ) -> Result<()> {
        let upload = self
            .client
            .create_multipart_upload()
            .bucket(destination_bucket)
            .key(destination_key)
            .send()
            .await
            .map_err(|e| {
                let (s3_error_code, s3_error_message) = extract_sdk_error_details(&e);
                warn!(
                    bucket = destination_bucket,
                    key = destination_key,
                    s3_error_code = s3_error_code,
                    s3_error_message = s3_error_message,
                    "S3 CreateMultipartUpload API call failed: {} ({}).",
                    s3_error_code,
                    s3_error_message,
                );
                anyhow!(e).context(S3IngestError::AwsSdk(format!(
                    "aws_sdk_s3::client::create_multipart_upload() failed: {s3_error_code} ({s3_error_message})"
                )))
            })?;

        let upload_id = upload
            .upload_id()
            .context("CreateMultipartUpload returned no upload id.")?
            .to_string();

        let result = match self
            .copy_parts(
                source_bucket,
                source_key,
                destination_bucket,
                destination_key,
                &upload_id,
                size,
            )
            .await
        {
            Ok(parts) => {
                self.complete_multipart(destination_bucket, destination_key, &upload_id, parts)
                    .await
            }
            Err(e) => Err(e),
        };

        if result.is_err() {
            self.abort_multipart(destination_bucket, destination_key, &upload_id)
                .await;
        }
        result
    }

    async fn complete_multipart(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<()> {
        self.client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| {
                let (s3_error_code, s3_error_message) = extract_sdk_error_details(&e);
                warn!(
                    bucket = bucket,
                    key = key,
                    upload_id = upload_id,
                    s3_error_code = s3_error_code,
                    s3_error_message = s3_error_message,
                    "S3 CompleteMultipartUpload API call failed: {} ({}).",
                    s3_error_code,
                    s3_error_message,
                );
                anyhow!(e).context(S3IngestError::AwsSdk(format!(
                    "aws_sdk_s3::client::complete_multipart_upload() failed: {s3_error_code} ({s3_error_message})"
                )))
            })?;

        Ok(())
    }

    async fn copy_parts(
        &self,
        source_bucket: &str,
        source_key: &str,
        destination_bucket: &str,
        destination_key: &str,
        upload_id: &str,
        size: u64,
    ) -> Result<Vec<CompletedPart>> {
        let semaphore = Arc::new(Semaphore::new(
            self.multipart_copy_config.max_concurrency.max(1) as usize,
        ));
        let source = copy_source(source_bucket, source_key);
        let mut join_set = JoinSet::new();

        for (index, (start, end)) in part_ranges(size, self.multipart_copy_config.part_size)
            .into_iter()
            .enumerate()
        {
            let part_number = (index + 1) as i32;
            let client = self.client.clone();
            let semaphore = semaphore.clone();
            let source = source.clone();
            let bucket = destination_bucket.to_string();
            let key = destination_key.to_string();
            let upload_id = upload_id.to_string();

            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await?;

                let output = client
                    .upload_part_copy()
                    .copy_source(source)
                    .copy_source_range(format!("bytes={start}-{end}"))
                    .bucket(&bucket)
                    .key(&key)
                    .upload_id(upload_id)
                    .part_number(part_number)
                    .send()
                    .await
                    .map_err(|e| {
                        let (s3_error_code, s3_error_message) = extract_sdk_error_details(&e);
                        warn!(
                            bucket = bucket,
                            key = key,
                            part_number = part_number,
                            s3_error_code = s3_error_code,
                            s3_error_message = s3_error_message,
                            "S3 UploadPartCopy API call failed: {} ({}).",
                            s3_error_code,
                            s3_error_message,
                        );
                        anyhow!(e).context(S3IngestError::AwsSdk(format!(
                            "aws_sdk_s3::client::upload_part_copy() failed: {s3_error_code} ({s3_error_message})"
                        )))
                    })?;

                let e_tag = output
                    .copy_part_result()
                    .and_then(|result| result.e_tag())
                    .map(str::to_string);

                Ok::<CompletedPart, anyhow::Error>(
                    CompletedPart::builder()
                        .set_e_tag(e_tag)
                        .part_number(part_number)
                        .build(),
                )
            });
        }

        let mut parts = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Ok(part)) => parts.push(part),
                Ok(Err(e)) => {
                    join_set.abort_all();
                    return Err(e);
                }
                Err(e) => {
                    join_set.abort_all();
                    return Err(anyhow!(e).context("upload part copy task failed."));
                }
            }
        }

        parts.sort_by_key(|part| part.part_number());
        debug!(
            bucket = destination_bucket,
            key = destination_key,
            parts = parts.len(),
            "all parts copied."
        );

        Ok(parts)
    }

    async fn abort_multipart(&self, bucket: &str, key: &str, upload_id: &str) {
        if let Err(e) = self
            .client
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
        {
            let (s3_error_code, s3_error_message) = extract_sdk_error_details(&e);
            error!(
                bucket = bucket,
                key = key,
                upload_id = upload_id,
                s3_error_code = s3_error_code,
                s3_error_message = s3_error_message,
                "S3 AbortMultipartUpload API call failed; the incomplete upload remains."
            );
        }
    }
}

#[async_trait]
impl StorageTrait for S3Storage {
    async fn copy_object(
        &self,
        source_bucket: &str,
        source_key: &str,
        destination_bucket: &str,
        destination_key: &str,
    ) -> Result<()> {
        let size = self.head_object_size(source_bucket, source_key).await?;

        if size > self.multipart_copy_config.threshold {
            debug!(
                source_bucket = source_bucket,
                source_key = source_key,
                size = size,
                "copying object with multipart upload."
            );
            self.copy_multipart(
                source_bucket,
                source_key,
                destination_bucket,
                destination_key,
                size,
            )
            .await
        } else {
            self.copy_single(source_bucket, source_key, destination_bucket, destination_key)
                .await
        }
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let (s3_error_code, s3_error_message) = extract_sdk_error_details(&e);
                warn!(
                    bucket = bucket,
                    key = key,
                    s3_error_code = s3_error_code,
                    s3_error_message = s3_error_message,
                    "S3 DeleteObject API call failed for s3://{}/{}: {} ({}).",
                    bucket, key, s3_error_code, s3_error_message,
                );
                anyhow!(e).context(S3IngestError::AwsSdk(format!(
                    "aws_sdk_s3::client::delete_object() failed: {s3_error_code} ({s3_error_message})"
                )))
            })?;

        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| {
                let (s3_error_code, s3_error_message) = extract_sdk_error_details(&e);
                error!(
                    bucket = bucket,
                    key = key,
                    s3_error_code = s3_error_code,
                    s3_error_message = s3_error_message,
                    "S3 PutObject API call failed for s3://{}/{}: {} ({}).",
                    bucket, key, s3_error_code, s3_error_message,
                );
                anyhow!(e).context(S3IngestError::AwsSdk(format!(
                    "aws_sdk_s3::client::put_object() failed: {s3_error_code} ({s3_error_message})"
                )))
            })?;

        Ok(())
    }
}
