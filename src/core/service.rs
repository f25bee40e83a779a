use crate::domain::model::{
    normalize_tags, ImageUpload, Listing, ListingSummary, ListingUpdate, NewListing, MAX_IMAGES,
    MAX_SEARCH_RESULTS, MAX_TAG_LEN, MAX_TITLE_LEN,
};
use crate::domain::ports::{ImageStore, ListingStore};
use crate::utils::error::{ListingError, Result};
use crate::utils::validation::{require_text, validate_image_count, validate_image_url};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

pub const DEFAULT_MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Listing operations behind the HTTP surface. Each call validates its input,
/// forwards a single write statement to the store and returns the stored result.
/// Image files no listing references any more are removed after the write.
pub struct ListingService {
    store: Arc<dyn ListingStore>,
    images: Arc<dyn ImageStore>,
    max_image_bytes: usize,
}

impl ListingService {
    pub fn new(store: Arc<dyn ListingStore>, images: Arc<dyn ImageStore>) -> Self {
        Self {
            store,
            images,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }

    pub fn with_max_image_bytes(mut self, max_image_bytes: usize) -> Self {
        self.max_image_bytes = max_image_bytes;
        self
    }

    /// Suggestion lookup. A missing or blank query is an empty result, not an error.
    pub async fn search(&self, query: Option<&str>) -> Result<Vec<ListingSummary>> {
        let query = match query {
            Some(q) if !q.trim().is_empty() => q,
            _ => return Ok(Vec::new()),
        };

        let results = self.store.search_titles(query, MAX_SEARCH_RESULTS).await?;
        tracing::debug!("Search for {:?} matched {} listings", query, results.len());
        Ok(results)
    }

    pub async fn list(&self) -> Result<Vec<Listing>> {
        self.store.list().await
    }

    pub async fn get(&self, id: &str) -> Result<Listing> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| ListingError::NotFound { id: id.to_string() })
    }

    pub async fn create(&self, draft: NewListing, uploads: Vec<ImageUpload>) -> Result<Listing> {
        require_text("title", "Title", &draft.title, Some(MAX_TITLE_LEN))?;
        require_text("description", "Description", &draft.description, None)?;
        require_text("priceRange", "Price range", &draft.price_range, Some(MAX_TITLE_LEN))?;
        let tags = validated_tags(&draft.tags)?;
        validate_image_count(uploads.len())?;
        self.validate_uploads(&uploads)?;

        let images = self.store_images(&uploads).await?;
        let now = Utc::now();
        let listing = Listing {
            id: Uuid::new_v4().to_string(),
            title: draft.title.trim().to_string(),
            description: draft.description.trim().to_string(),
            price_range: draft.price_range.trim().to_string(),
            images,
            tags,
            created_at: now,
            updated_at: now,
        };

        let stored_images = listing.images.clone();
        let listing = match self.store.insert(listing).await {
            Ok(listing) => listing,
            Err(e) => {
                self.discard_images(&stored_images).await;
                return Err(e);
            }
        };
        tracing::info!("Created listing {} ({})", listing.id, listing.title);
        Ok(listing)
    }

    /// Replaces title, description, tags and images (and the price range when
    /// given) in one store statement. The identifier never changes.
    pub async fn update(&self, update: ListingUpdate) -> Result<Listing> {
        require_text("id", "Id", &update.id, None)?;
        require_text("title", "Title", &update.title, Some(MAX_TITLE_LEN))?;
        require_text("description", "Description", &update.description, None)?;
        if let Some(price_range) = &update.price_range {
            require_text("priceRange", "Price range", price_range, Some(MAX_TITLE_LEN))?;
        }
        validate_image_count(update.images.len())?;
        for image in &update.images {
            validate_image_url(image)?;
        }
        let tags = validated_tags(&update.tags)?;

        let id = update.id.clone();
        let previous = self.get(&id).await?;
        let update = ListingUpdate {
            title: update.title.trim().to_string(),
            description: update.description.trim().to_string(),
            price_range: update.price_range.map(|p| p.trim().to_string()),
            tags,
            ..update
        };

        let listing = self
            .store
            .update(update, Utc::now())
            .await?
            .ok_or(ListingError::NotFound { id })?;
        tracing::info!("Updated listing {}", listing.id);

        let dropped: Vec<String> = previous
            .images
            .into_iter()
            .filter(|url| !listing.images.contains(url))
            .collect();
        self.discard_images(&dropped).await;
        Ok(listing)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        require_text("id", "Id", id, None)?;
        let images = self
            .store
            .get(id)
            .await?
            .map(|listing| listing.images)
            .unwrap_or_default();
        if !self.store.delete(id).await? {
            return Err(ListingError::NotFound { id: id.to_string() });
        }
        tracing::info!("Deleted listing {}", id);
        self.discard_images(&images).await;
        Ok(())
    }

    /// Stores images for the edit flow, which then references the returned URLs.
    pub async fn upload_images(&self, uploads: Vec<ImageUpload>) -> Result<Vec<String>> {
        if uploads.is_empty() {
            return Err(ListingError::validation("images", "No images were provided."));
        }
        validate_image_count(uploads.len())?;
        self.validate_uploads(&uploads)?;
        self.store_images(&uploads).await
    }

    fn validate_uploads(&self, uploads: &[ImageUpload]) -> Result<()> {
        for upload in uploads {
            let label = upload.file_name.as_deref().unwrap_or("image");
            if !upload.content_type.starts_with("image/") {
                return Err(ListingError::validation(
                    "images",
                    format!("{} is not an image ({}).", label, upload.content_type),
                ));
            }
            if upload.bytes.is_empty() {
                return Err(ListingError::validation("images", format!("{} is empty.", label)));
            }
            if upload.bytes.len() > self.max_image_bytes {
                return Err(ListingError::validation(
                    "images",
                    format!(
                        "{} is larger than {} bytes.",
                        label, self.max_image_bytes
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Stores every upload or none: a failed `put` removes the ones already written.
    async fn store_images(&self, uploads: &[ImageUpload]) -> Result<Vec<String>> {
        let mut urls = Vec::with_capacity(uploads.len().min(MAX_IMAGES));
        for upload in uploads {
            match self.images.put(upload).await {
                Ok(url) => urls.push(url),
                Err(e) => {
                    self.discard_images(&urls).await;
                    return Err(e);
                }
            }
        }
        Ok(urls)
    }

    /// Best effort; a file that cannot be removed is only logged.
    async fn discard_images(&self, urls: &[String]) {
        for url in urls {
            if let Err(e) = self.images.remove(url).await {
                tracing::warn!("Failed to remove image {}: {}", url, e);
            }
        }
    }
}

fn validated_tags(tags: &[String]) -> Result<Vec<String>> {
    let tags = normalize_tags(tags);
    if let Some(tag) = tags.iter().find(|t| t.chars().count() > MAX_TAG_LEN) {
        return Err(ListingError::validation(
            "tags",
            format!("Tag \"{}\" must be at most {} characters.", tag, MAX_TAG_LEN),
        ));
    }
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::SqliteListingStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingImages {
        puts: AtomicUsize,
        fail_on_put: Option<usize>,
        removed: Mutex<Vec<String>>,
    }

    impl CountingImages {
        fn removed(&self) -> Vec<String> {
            self.removed.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ImageStore for CountingImages {
        async fn put(&self, _upload: &ImageUpload) -> Result<String> {
            let n = self.puts.fetch_add(1, Ordering::SeqCst);
            if self.fail_on_put == Some(n) {
                return Err(ListingError::ImageStore {
                    message: format!("disk full writing image {}", n),
                });
            }
            Ok(format!("/images/{}.jpg", n))
        }

        async fn remove(&self, url: &str) -> Result<bool> {
            self.removed.lock().unwrap().push(url.to_string());
            Ok(true)
        }
    }

    fn service() -> (ListingService, Arc<CountingImages>) {
        let store = Arc::new(SqliteListingStore::open_in_memory().unwrap());
        let images = Arc::new(CountingImages::default());
        (ListingService::new(store, images.clone()), images)
    }

    fn draft(title: &str) -> NewListing {
        NewListing {
            title: title.to_string(),
            description: "Well maintained, single owner".to_string(),
            price_range: "₹5,00,000 - ₹7,00,000".to_string(),
            tags: vec!["petrol".to_string(), " manual ".to_string(), "petrol".to_string()],
        }
    }

    fn jpeg() -> ImageUpload {
        ImageUpload::new(Some("car.jpg".into()), "image/jpeg", vec![0xFF, 0xD8, 0xFF])
    }

    #[tokio::test]
    async fn test_search_scenario_swift_vs_nexon() {
        let (service, _) = service();
        service.create(draft("Maruti Suzuki Swift"), vec![]).await.unwrap();
        service.create(draft("Tata Nexon"), vec![]).await.unwrap();

        let results = service.search(Some("Swift")).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Maruti Suzuki Swift");
    }

    #[tokio::test]
    async fn test_search_blank_query_is_empty_not_error() {
        let (service, _) = service();
        service.create(draft("Tata Nexon"), vec![]).await.unwrap();

        assert!(service.search(None).await.unwrap().is_empty());
        assert!(service.search(Some("")).await.unwrap().is_empty());
        assert!(service.search(Some("   \t")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_caps_results() {
        let (service, _) = service();
        for i in 0..12 {
            service.create(draft(&format!("Honda City {}", i)), vec![]).await.unwrap();
        }

        let results = service.search(Some("city")).await.unwrap();
        assert_eq!(results.len(), MAX_SEARCH_RESULTS);
    }

    #[tokio::test]
    async fn test_create_normalizes_and_stores_images() {
        let (service, images) = service();
        let listing = service.create(draft("  Tata Nexon "), vec![jpeg(), jpeg()]).await.unwrap();

        assert_eq!(listing.title, "Tata Nexon");
        assert_eq!(listing.tags, vec!["petrol", "manual"]);
        assert_eq!(listing.images, vec!["/images/0.jpg", "/images/1.jpg"]);
        assert_eq!(images.puts.load(Ordering::SeqCst), 2);
        assert_eq!(service.get(&listing.id).await.unwrap(), listing);
    }

    #[tokio::test]
    async fn test_create_with_eleven_images_stores_nothing() {
        let (service, images) = service();
        let err = service
            .create(draft("Tata Nexon"), vec![jpeg(); 11])
            .await
            .unwrap_err();

        assert!(matches!(err, ListingError::TooManyImages { count: 11, .. }));
        assert_eq!(images.puts.load(Ordering::SeqCst), 0);
        assert!(service.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_requires_fields_and_image_content() {
        let (service, _) = service();

        let mut missing = draft("Tata Nexon");
        missing.price_range = "  ".to_string();
        let err = service.create(missing, vec![]).await.unwrap_err();
        assert!(matches!(err, ListingError::Validation { ref field, .. } if field == "priceRange"));

        let text = ImageUpload::new(Some("notes.txt".into()), "text/plain", vec![1]);
        assert!(service.create(draft("Tata Nexon"), vec![text]).await.is_err());

        let service = service.with_max_image_bytes(2);
        assert!(service.create(draft("Tata Nexon"), vec![jpeg()]).await.is_err());
    }

    #[tokio::test]
    async fn test_update_preserves_id_and_replaces_fields() {
        let (service, _) = service();
        let created = service.create(draft("Tata Nexon"), vec![jpeg()]).await.unwrap();

        let updated = service
            .update(ListingUpdate {
                id: created.id.clone(),
                title: "Tata Nexon EV Max".to_string(),
                description: "Long range".to_string(),
                price_range: None,
                tags: vec!["electric".to_string()],
                images: vec!["https://cdn.example.com/nexon.jpg".to_string()],
            })
            .await
            .unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.title, "Tata Nexon EV Max");
        assert_eq!(updated.description, "Long range");
        assert_eq!(updated.price_range, created.price_range);
        assert_eq!(updated.tags, vec!["electric"]);
        assert_eq!(updated.images, vec!["https://cdn.example.com/nexon.jpg"]);
        assert_eq!(service.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_rejects_bad_input_and_missing_ids() {
        let (service, _) = service();
        let created = service.create(draft("Tata Nexon"), vec![]).await.unwrap();

        let too_many = ListingUpdate {
            id: created.id.clone(),
            title: "Tata Nexon".to_string(),
            description: "SUV".to_string(),
            images: (0..11).map(|i| format!("/images/{}.jpg", i)).collect(),
            ..Default::default()
        };
        assert!(matches!(
            service.update(too_many).await,
            Err(ListingError::TooManyImages { .. })
        ));

        let blob = ListingUpdate {
            id: created.id.clone(),
            title: "Tata Nexon".to_string(),
            description: "SUV".to_string(),
            images: vec!["blob:http://localhost:3000/1234".to_string()],
            ..Default::default()
        };
        assert!(service.update(blob).await.is_err());

        let ghost = ListingUpdate {
            id: "ghost".to_string(),
            title: "Ghost".to_string(),
            description: "None".to_string(),
            ..Default::default()
        };
        assert!(service.update(ghost).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let (service, _) = service();
        let created = service.create(draft("Tata Nexon"), vec![]).await.unwrap();

        service.delete(&created.id).await.unwrap();
        assert!(service.get(&created.id).await.unwrap_err().is_not_found());
        assert!(service.delete(&created.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_failed_create_removes_images_already_stored() {
        let store = Arc::new(SqliteListingStore::open_in_memory().unwrap());
        let images = Arc::new(CountingImages {
            fail_on_put: Some(1),
            ..Default::default()
        });
        let service = ListingService::new(store, images.clone());

        let err = service
            .create(draft("Tata Nexon"), vec![jpeg(), jpeg(), jpeg()])
            .await
            .unwrap_err();

        assert!(matches!(err, ListingError::ImageStore { .. }));
        assert_eq!(images.removed(), vec!["/images/0.jpg"]);
        assert!(service.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_removes_only_dropped_images() {
        let (service, images) = service();
        let created = service.create(draft("Tata Nexon"), vec![jpeg(), jpeg()]).await.unwrap();

        service
            .update(ListingUpdate {
                id: created.id.clone(),
                title: "Tata Nexon".to_string(),
                description: "SUV".to_string(),
                images: vec!["/images/1.jpg".to_string(), "/images/9.jpg".to_string()],
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(images.removed(), vec!["/images/0.jpg"]);
    }

    #[tokio::test]
    async fn test_delete_removes_listing_images() {
        let (service, images) = service();
        let created = service.create(draft("Tata Nexon"), vec![jpeg(), jpeg()]).await.unwrap();

        service.delete(&created.id).await.unwrap();
        assert_eq!(images.removed(), vec!["/images/0.jpg", "/images/1.jpg"]);

        assert!(service.delete(&created.id).await.is_err());
        assert_eq!(images.removed().len(), 2);
    }

    #[tokio::test]
    async fn test_upload_images_requires_at_least_one() {
        let (service, _) = service();
        assert!(service.upload_images(vec![]).await.is_err());
        assert_eq!(service.upload_images(vec![jpeg()]).await.unwrap().len(), 1);
    }
}
