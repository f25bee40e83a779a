use crate::domain::model::{
    content_type_for_extension, normalize_tags, parse_tag_input, ImageUpload, Listing,
    ListingUpdate, MAX_IMAGES, MAX_TITLE_LEN,
};
use crate::utils::error::{ListingError, Result};
use crate::utils::validation::{require_text, validate_image_count};
use std::path::Path;

/// State of the "new car" form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateForm {
    pub title: String,
    pub description: String,
    pub price_range: String,
    pub tags: Vec<String>,
    pub images: Vec<ImageUpload>,
}

impl CreateForm {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        price_range: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            price_range: price_range.into(),
            ..Default::default()
        }
    }

    pub fn set_tags_from_input(&mut self, input: &str) {
        self.tags = parse_tag_input(input);
    }

    /// Adds selected files. A selection that would push the form past the
    /// image cap is rejected as a whole and the form is left unchanged.
    pub fn add_images(&mut self, files: Vec<ImageUpload>) -> Result<()> {
        validate_image_count(self.images.len() + files.len())?;
        self.images.extend(files);
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        require_text("title", "Title", &self.title, Some(MAX_TITLE_LEN))?;
        require_text("description", "Description", &self.description, None)?;
        require_text("priceRange", "Price range", &self.price_range, Some(MAX_TITLE_LEN))?;
        validate_image_count(self.images.len())
    }
}

/// State of the edit form, seeded from the stored listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditForm {
    pub id: String,
    pub title: String,
    pub description: String,
    pub price_range: Option<String>,
    pub tags: Vec<String>,
    pub existing_images: Vec<String>,
    pub new_images: Vec<ImageUpload>,
}

impl EditForm {
    pub fn from_listing(listing: &Listing) -> Self {
        Self {
            id: listing.id.clone(),
            title: listing.title.clone(),
            description: listing.description.clone(),
            price_range: Some(listing.price_range.clone()),
            tags: listing.tags.clone(),
            existing_images: listing.images.clone(),
            new_images: Vec::new(),
        }
    }

    /// Tags as shown in the text input, e.g. `"electric, SUV"`.
    pub fn tags_input(&self) -> String {
        self.tags.join(", ")
    }

    pub fn set_tags_from_input(&mut self, input: &str) {
        self.tags = parse_tag_input(input);
    }

    pub fn total_images(&self) -> usize {
        self.existing_images.len() + self.new_images.len()
    }

    /// Drops a stored image from the listing. Returns `false` when the URL is
    /// not part of the form.
    pub fn remove_image(&mut self, url: &str) -> bool {
        let before = self.existing_images.len();
        self.existing_images.retain(|existing| existing != url);
        self.existing_images.len() != before
    }

    pub fn add_images(&mut self, files: Vec<ImageUpload>) -> Result<()> {
        validate_image_count(self.total_images() + files.len())?;
        self.new_images.extend(files);
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        require_text("title", "Title", &self.title, Some(MAX_TITLE_LEN))?;
        require_text("description", "Description", &self.description, None)?;
        if let Some(price_range) = &self.price_range {
            require_text("priceRange", "Price range", price_range, Some(MAX_TITLE_LEN))?;
        }
        validate_image_count(self.total_images())
    }

    /// The update request: kept images first, then the URLs of newly uploaded ones.
    pub fn to_update(&self, uploaded: Vec<String>) -> ListingUpdate {
        let mut images = self.existing_images.clone();
        images.extend(uploaded);

        ListingUpdate {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            price_range: self.price_range.clone(),
            tags: normalize_tags(&self.tags),
            images,
        }
    }
}

/// Reads an image file from disk, deriving its MIME type from the extension.
pub async fn read_image_file(path: impl AsRef<Path>) -> Result<ImageUpload> {
    let path = path.as_ref();
    let content_type = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(content_type_for_extension)
        .ok_or_else(|| {
            ListingError::validation(
                "images",
                format!("{} is not a supported image file.", path.display()),
            )
        })?;

    let bytes = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string);

    tracing::debug!("Read {} ({} bytes)", path.display(), bytes.len());
    Ok(ImageUpload::new(file_name, content_type, bytes))
}

/// Reads several image files, refusing the whole selection when it exceeds
/// the image cap.
pub async fn read_image_files<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<ImageUpload>> {
    validate_image_count(paths.len())?;

    let mut uploads = Vec::with_capacity(paths.len().min(MAX_IMAGES));
    for path in paths {
        uploads.push(read_image_file(path).await?);
    }
    Ok(uploads)
}
