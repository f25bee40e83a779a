// Adapters layer: concrete implementations of the domain ports (store, image hosting, identity).

pub mod identity;
pub mod local_images;
pub mod s3_images;
pub mod sqlite_store;

pub use identity::HttpSessionVerifier;
pub use local_images::LocalImageStore;
pub use sqlite_store::SqliteListingStore;

#[cfg(feature = "s3")]
pub use s3_images::S3ImageStore;
