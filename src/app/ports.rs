use crate::error::{FetchError, SinkError};
use crate::types::{Comment, MediaId, PostDetails, ProfileDetails, SourceItem};
use async_trait::async_trait;

/// Authenticated scraping session shared by all fetchers of a run.
/// Implementations serialize their own calls.
#[async_trait]
pub trait ScrapeSession: Send + Sync {
    async fn post(&self, media_id: MediaId) -> Result<PostDetails, FetchError>;
    async fn profile(&self, username: &str) -> Result<ProfileDetails, FetchError>;
    /// Top-level comments in arrival order.
    async fn comments(&self, media_id: MediaId) -> Result<Vec<Comment>, FetchError>;
    /// Ends the session once collection is over. Failures are not reported.
    async fn close(&self);
}

#[async_trait]
pub trait RegistryPort: Send + Sync {
    /// Every registry entry, active or not.
    async fn list_items(&self) -> crate::error::Result<Vec<SourceItem>>;
    /// Address used to update a single item.
    fn item_url(&self, id: &str) -> String;
    async fn deactivate(&self, item_url: &str) -> Result<(), SinkError>;
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), SinkError>;
}
