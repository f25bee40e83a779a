pub mod adapters;
pub mod client;
pub mod config;
pub mod core;
pub mod domain;
pub mod server;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::ServeArgs;

pub use adapters::{HttpSessionVerifier, LocalImageStore, SqliteListingStore};
pub use client::ListingsClient;
pub use config::AppConfig;
pub use core::ListingService;
pub use server::{build_app, build_router, AppState};
pub use utils::error::{ListingError, Result};
