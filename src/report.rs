use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use csv::{Terminator, WriterBuilder};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::ReportConfig;
use crate::storage::Storage;
use crate::tagging::TagQuery;
use crate::types::TaggedResource;
use crate::types::error::S3IngestError;

const REPORT_HEADER: [&str; 3] = ["aws_service", "resource_name", "resource_id"];
const REPORT_FILE_PREFIX: &str = "deletion_candidate_report_";
const REPORT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";
const REPORT_CONTENT_TYPE: &str = "text/csv";
const NAME_TAG_KEY: &str = "Name";

/// One CSV row of the tag report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub aws_service: String,
    pub resource_name: String,
    pub resource_id: String,
}

impl ReportRow {
    /// Service is the third `:` segment of the ARN, id its last `/`
    /// segment, and name the `Name` tag falling back to the id.
    pub fn from_resource(resource: &TaggedResource) -> Self {
        let aws_service = match resource.arn.split(':').nth(2) {
            Some(service) => service.to_string(),
            None => {
                warn!(arn = resource.arn, "resource ARN has no service segment.");
                String::new()
            }
        };
        let resource_id = resource
            .arn
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        let resource_name = resource
            .tags
            .iter()
            .find(|tag| tag.key == NAME_TAG_KEY)
            .map(|tag| tag.value.clone())
            .unwrap_or_else(|| resource_id.clone());

        ReportRow {
            aws_service,
            resource_name,
            resource_id,
        }
    }
}

/// Render rows as CSV, header first, one `\n`-terminated line per row.
pub fn render_csv(rows: &[ReportRow]) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer
        .write_record(REPORT_HEADER)
        .context("write CSV header")?;
    for (i, row) in rows.iter().enumerate() {
        writer
            .serialize(row)
            .with_context(|| format!("serialize CSV row #{}", i + 1))?;
    }

    writer
        .into_inner()
        .map_err(|e| e.into_error())
        .context("flush CSV report")
}

/// Object key of the report generated at `generated_at`.
pub fn report_key(folder: &str, generated_at: DateTime<Utc>) -> String {
    format!(
        "{folder}/{REPORT_FILE_PREFIX}{}.csv",
        generated_at.format(REPORT_TIMESTAMP_FORMAT)
    )
}

/// Lists tagged resources and publishes them as a CSV report.
pub struct TagReportGenerator {
    tag_query: TagQuery,
    storage: Storage,
    report_config: ReportConfig,
}

impl TagReportGenerator {
    pub fn new(report_config: ReportConfig, tag_query: TagQuery, storage: Storage) -> Self {
        Self {
            tag_query,
            storage,
            report_config,
        }
    }

    /// Generate the report stamped with the current UTC time.
    pub async fn generate(&self) -> Result<String> {
        self.generate_at(Utc::now()).await
    }

    /// Generate the report and return its `s3://` URI. Single pass, no
    /// retries beyond those of the SDK.
    pub async fn generate_at(&self, generated_at: DateTime<Utc>) -> Result<String> {
        let ReportConfig {
            bucket,
            folder,
            tag_key,
            tag_value,
        } = &self.report_config;

        let resources = self
            .tag_query
            .list_resources_by_tag(tag_key, tag_value)
            .await
            .with_context(|| {
                S3IngestError::Report(format!(
                    "listing resources tagged {tag_key}={tag_value} failed"
                ))
            })?;

        let rows: Vec<ReportRow> = resources.iter().map(ReportRow::from_resource).collect();
        let body = render_csv(&rows)
            .with_context(|| S3IngestError::Report("rendering CSV failed".to_string()))?;

        let key = report_key(folder, generated_at);
        self.storage
            .put_object(bucket, &key, body, REPORT_CONTENT_TYPE)
            .await
            .with_context(|| {
                S3IngestError::Report(format!("uploading s3://{bucket}/{key} failed"))
            })?;

        let uri = format!("s3://{bucket}/{key}");
        info!(uri = uri, resources = rows.len(), "tag report uploaded.");

        Ok(uri)
    }
}
