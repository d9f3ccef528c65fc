//! Abstract blob store interface
//!
//! The gateway only needs three operations from durable storage: read a key,
//! write a key, list keys under a prefix in key order. Keys embed their
//! creation time, so key order is creation order.

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Read a blob; `None` when the key does not exist
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write a blob and return its resolvable URL
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String>;

    /// List keys under a prefix, ordered ascending by key
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Map a URL produced by [`BlobStore::put`] back to its key, when the
    /// URL belongs to this store
    fn key_for_url(&self, url: &str) -> Option<String>;
}
