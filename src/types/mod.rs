use std::fmt;
use std::fmt::{Debug, Formatter};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use zeroize_derive::{Zeroize, ZeroizeOnDrop};

pub mod error;

/// One storage-change record exactly as it arrived in a notification.
///
/// The payload is kept verbatim so that a normalised message round-trips
/// unchanged; typed accessors read the fields the pipeline needs and
/// return `None` for anything missing or of the wrong shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawStorageEventRecord(Value);

impl RawStorageEventRecord {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// `s3.bucket.name`
    pub fn bucket_name(&self) -> Option<&str> {
        self.0.pointer("/s3/bucket/name").and_then(Value::as_str)
    }

    /// `s3.object.key`
    pub fn object_key(&self) -> Option<&str> {
        self.0.pointer("/s3/object/key").and_then(Value::as_str)
    }

    /// `s3.object.size`
    pub fn object_size(&self) -> Option<u64> {
        self.0.pointer("/s3/object/size").and_then(Value::as_u64)
    }

    /// `s3.object.eTag`
    pub fn e_tag(&self) -> Option<&str> {
        self.0.pointer("/s3/object/eTag").and_then(Value::as_str)
    }

    /// Top-level `eventTime`, unparsed.
    pub fn event_time(&self) -> Option<&str> {
        self.0.get("eventTime").and_then(Value::as_str)
    }
}

impl From<Value> for RawStorageEventRecord {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// One `/`-delimited component of an object key together with its position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathDepth {
    pub depth: usize,
    pub value: String,
}

/// Location, size and checksum of one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageInfo {
    pub bucket: Option<String>,
    pub key: Option<String>,
    #[serde(rename = "s3uri")]
    pub uri: String,
    pub filename: String,
    pub file_size: Option<u64>,
    pub file_ext: String,
    pub object_date: Option<DateTime<Utc>>,
    #[serde(rename = "eTag")]
    pub e_tag: Option<String>,
    pub file_depths: Vec<PathDepth>,
}

/// Canonical inventory record for one object, with its path taxonomy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub team: Option<String>,
    pub product: Option<String>,
    #[serde(rename = "storageinfo")]
    pub storage_info: StorageInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Success,
    Error,
}

/// Result of moving one object (or failing to get as far as a move).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferOutcome {
    pub status: TransferStatus,
    /// Source object key; `None` when the message could not be normalised.
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl TransferOutcome {
    pub fn success(key: &str) -> Self {
        Self {
            status: TransferStatus::Success,
            file: Some(key.to_string()),
            message_id: None,
            error: None,
        }
    }

    pub fn failure(key: Option<&str>, error: impl Into<String>) -> Self {
        Self {
            status: TransferStatus::Error,
            file: key.map(str::to_string),
            message_id: None,
            error: Some(error.into()),
        }
    }

    pub fn with_message_id(mut self, message_id: Option<String>) -> Self {
        self.message_id = message_id;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == TransferStatus::Success
    }
}

/// Invocation body: per-item outcomes on success, a description otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InvocationBody {
    Outcomes(Vec<TransferOutcome>),
    Error(String),
}

/// What a batch invocation reports back to the trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResult {
    pub status_code: u16,
    pub body: InvocationBody,
}

impl InvocationResult {
    pub fn ok(outcomes: Vec<TransferOutcome>) -> Self {
        Self {
            status_code: 200,
            body: InvocationBody::Outcomes(outcomes),
        }
    }

    pub fn internal_error(description: impl fmt::Display) -> Self {
        Self {
            status_code: 500,
            body: InvocationBody::Error(format!("Error: {description}")),
        }
    }

    pub fn outcomes(&self) -> &[TransferOutcome] {
        match &self.body {
            InvocationBody::Outcomes(outcomes) => outcomes,
            InvocationBody::Error(_) => &[],
        }
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes().iter().filter(|o| !o.is_success()).count()
    }
}

/// One queue message as delivered by the trigger.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueMessage {
    pub message_id: Option<String>,
    pub body: String,
}

impl QueueMessage {
    pub fn new(message_id: Option<String>, body: impl Into<String>) -> Self {
        Self {
            message_id,
            body: body.into(),
        }
    }
}

impl From<String> for QueueMessage {
    fn from(body: String) -> Self {
        Self::new(None, body)
    }
}

impl From<&str> for QueueMessage {
    fn from(body: &str) -> Self {
        Self::new(None, body)
    }
}

/// A tag attached to a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceTag {
    pub key: String,
    pub value: String,
}

/// A resource returned by the tag query, identified by its ARN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedResource {
    pub arn: String,
    pub tags: Vec<ResourceTag>,
}

/// AWS configuration file locations.
#[derive(Debug, Clone, Default)]
pub struct ClientConfigLocation {
    pub aws_config_file: Option<PathBuf>,
    pub aws_shared_credentials_file: Option<PathBuf>,
}

/// AWS credential sources.
#[derive(Debug, Clone)]
pub enum S3Credentials {
    Profile(String),
    Credentials { access_keys: AccessKeys },
    FromEnvironment,
}

/// AWS access key pair with secure zeroization.
///
/// The secret_access_key and session_token are securely cleared from memory
/// when this struct is dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AccessKeys {
    pub access_key: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl Debug for AccessKeys {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut keys = f.debug_struct("AccessKeys");
        let session_token = self
            .session_token
            .as_ref()
            .map_or("None", |_| "** redacted **");
        keys.field("access_key", &self.access_key)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &session_token);
        keys.finish()
    }
}
