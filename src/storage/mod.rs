use anyhow::Result;
use async_trait::async_trait;
use dyn_clone::DynClone;

use crate::config::Config;

pub mod s3;

/// Type alias for a boxed Storage trait object.
pub type Storage = Box<dyn StorageTrait + Send + Sync>;

/// Object store operations needed to move objects and publish reports.
///
/// Every method addresses objects by full bucket and key; implementations
/// hold no per-bucket state so one instance serves any number of buckets.
#[async_trait]
pub trait StorageTrait: DynClone {
    /// Server-side copy of `source_bucket/source_key` to
    /// `destination_bucket/destination_key`, overwriting the destination.
    async fn copy_object(
        &self,
        source_bucket: &str,
        source_key: &str,
        destination_bucket: &str,
        destination_key: &str,
    ) -> Result<()>;

    /// Delete a single object. Deleting a missing key is not an error.
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()>;

    /// Upload `body` as a single object with the given content type.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<()>;
}

dyn_clone::clone_trait_object!(StorageTrait);

/// Create the S3-backed storage described by `config`.
pub async fn create_storage(config: &Config) -> Storage {
    s3::S3Storage::create(config).await
}
