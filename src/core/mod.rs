pub mod service;

pub use crate::domain::model::{Listing, ListingSummary, ListingUpdate, NewListing};
pub use crate::domain::ports::{ImageStore, ListingStore, SessionVerifier};
pub use crate::utils::error::Result;
pub use service::ListingService;
