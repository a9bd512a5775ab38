use anyhow::Result;
use async_trait::async_trait;
use dyn_clone::DynClone;

use crate::config::Config;
use crate::types::TaggedResource;

pub mod resource_groups;

pub type TagQuery = Box<dyn TagQueryTrait + Send + Sync>;

/// Account-wide lookup of resources by tag.
#[async_trait]
pub trait TagQueryTrait: DynClone {
    /// Every resource carrying `key=value`, across all result pages.
    async fn list_resources_by_tag(&self, key: &str, value: &str) -> Result<Vec<TaggedResource>>;
}

dyn_clone::clone_trait_object!(TagQueryTrait);

pub async fn create_tag_query(config: &Config) -> TagQuery {
    resource_groups::ResourceGroupsTagQuery::create(config).await
}
