use crate::domain::model::{ImageUpload, Listing, ListingSummary, ListingUpdate, Session};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Relational store holding the listings.
#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Case-insensitive substring match on title, in store order, at most `limit` rows.
    async fn search_titles(&self, query: &str, limit: usize) -> Result<Vec<ListingSummary>>;
    async fn list(&self) -> Result<Vec<Listing>>;
    async fn get(&self, id: &str) -> Result<Option<Listing>>;
    async fn insert(&self, listing: Listing) -> Result<Listing>;
    /// Returns `None` when no listing has `update.id`.
    async fn update(&self, update: ListingUpdate, now: DateTime<Utc>) -> Result<Option<Listing>>;
    /// Returns whether a listing was removed.
    async fn delete(&self, id: &str) -> Result<bool>;
}

/// File/object host for listing images. Returns the public URL of the stored image.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn put(&self, upload: &ImageUpload) -> Result<String>;
    /// Deletes an image previously returned by `put`. URLs this store does not
    /// own (external links, other hosts) are left alone and yield `false`.
    async fn remove(&self, url: &str) -> Result<bool>;
}

/// Hosted identity provider.
#[async_trait]
pub trait SessionVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Session>;
}
