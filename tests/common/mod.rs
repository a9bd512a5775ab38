//! Shared integration test infrastructure for s3ingest-rs.
//!
//! `InMemoryStorage` stands in for S3: objects live in a map keyed by
//! bucket and key, so a move is observable as the key disappearing from
//! one bucket and appearing in another.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use s3ingest_rs::storage::{Storage, StorageTrait};
use s3ingest_rs::tagging::{TagQuery, TagQueryTrait};
use s3ingest_rs::types::TaggedResource;
use serde_json::json;

type ObjectKey = (String, String);

#[derive(Clone, Default)]
pub struct InMemoryStorage {
    objects: Arc<Mutex<BTreeMap<ObjectKey, Vec<u8>>>>,
    content_types: Arc<Mutex<BTreeMap<ObjectKey, String>>>,
    denied_keys: Arc<Mutex<HashSet<String>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, bucket: &str, key: &str, body: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), body.to_vec());
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn content_type(&self, bucket: &str, key: &str) -> Option<String> {
        self.content_types
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect()
    }

    /// Every copy of `key` fails with AccessDenied.
    pub fn deny_copy(&self, key: &str) {
        self.denied_keys.lock().unwrap().insert(key.to_string());
    }

    pub fn boxed(&self) -> Storage {
        Box::new(self.clone())
    }
}

#[async_trait]
impl StorageTrait for InMemoryStorage {
    async fn copy_object(
        &self,
        source_bucket: &str,
        source_key: &str,
        destination_bucket: &str,
        destination_key: &str,
    ) -> Result<()> {
        if self.denied_keys.lock().unwrap().contains(source_key) {
            return Err(anyhow!("AccessDenied: s3://{source_bucket}/{source_key}"));
        }

        let body = self
            .get(source_bucket, source_key)
            .ok_or_else(|| anyhow!("NoSuchKey: s3://{source_bucket}/{source_key}"))?;
        self.put(destination_bucket, destination_key, &body);
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.objects
            .lock()
            .unwrap()
            .remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        self.put(bucket, key, &body);
        self.content_types
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), content_type.to_string());
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct StaticTagQuery {
    pub resources: Vec<TaggedResource>,
}

impl StaticTagQuery {
    pub fn boxed(&self) -> TagQuery {
        Box::new(self.clone())
    }
}

#[async_trait]
impl TagQueryTrait for StaticTagQuery {
    async fn list_resources_by_tag(&self, _key: &str, _value: &str) -> Result<Vec<TaggedResource>> {
        Ok(self.resources.clone())
    }
}

/// Direct S3 event body announcing one object.
pub fn direct_event(bucket: &str, key: &str) -> String {
    json!({
        "Records": [{
            "eventVersion": "2.1",
            "eventSource": "aws:s3",
            "eventTime": "2025-11-12T12:34:56.000Z",
            "eventName": "ObjectCreated:Put",
            "s3": {
                "bucket": { "name": bucket },
                "object": { "key": key, "size": 1024, "eTag": "d41d8cd98f00b204e9800998ecf8427e" }
            }
        }]
    })
    .to_string()
}

/// The same event wrapped in an SNS notification envelope.
pub fn sns_wrapped_event(bucket: &str, key: &str) -> String {
    json!({
        "Type": "Notification",
        "MessageId": "sns-1",
        "TopicArn": "arn:aws:sns:us-east-1:123456789012:uploads",
        "Message": direct_event(bucket, key)
    })
    .to_string()
}

/// Queue trigger payload carrying the given `(messageId, body)` pairs.
pub fn trigger_payload(messages: &[(&str, String)]) -> String {
    json!({
        "Records": messages
            .iter()
            .map(|(id, body)| json!({
                "messageId": id,
                "eventSource": "aws:sqs",
                "body": body
            }))
            .collect::<Vec<_>>()
    })
    .to_string()
}
