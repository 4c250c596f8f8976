use async_trait::async_trait;

use crate::{
    domain::{CreatedLink, ShortUrl},
    Result,
};

/// Hexagonal port for the remote URL shortener.
///
/// Exactly the operations the bot needs. Each failure is reported through the
/// closed set of [`crate::Error`] kinds:
/// - `expand`: `NotFound`
/// - `create`: `KeywordExists`, `InvalidUrl`
/// - `rename`: `NotFound`, `KeywordExists`
/// - `retarget` / `remove`: `NotFound`
/// - all of them: `Transport`
#[async_trait]
pub trait ShortenerGateway: Send + Sync {
    /// Public base URL of the instance, without trailing slash.
    fn base_url(&self) -> &str;

    async fn expand(&self, keyword: &str) -> Result<String>;

    async fn create(&self, url: &str, keyword: Option<&str>) -> Result<CreatedLink>;

    async fn rename(&self, old_keyword: &str, new_keyword: &str) -> Result<()>;

    async fn retarget(&self, keyword: &str, url: &str) -> Result<()>;

    async fn remove(&self, keyword: &str) -> Result<()>;

    async fn list_all(&self) -> Result<Vec<ShortUrl>>;
}

/// Key-value durability layer for conversation state.
///
/// Values are JSON documents; a missing key reads as `None`.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>>;
    async fn put(&self, key: &str, value: serde_json::Value) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
}
