use crate::domain::model::MAX_IMAGES;
use crate::utils::error::{ListingError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(ListingError::InvalidConfigValue {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(ListingError::InvalidConfigValue {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(ListingError::InvalidConfigValue {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

/// Public base for served images: an absolute http(s) URL or a root-relative
/// path such as `/images`.
pub fn validate_public_base(field_name: &str, base: &str) -> Result<()> {
    if base.starts_with('/') {
        return Ok(());
    }
    validate_url(field_name, base)
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(ListingError::InvalidConfigValue {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(ListingError::InvalidConfigValue {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(ListingError::InvalidConfigValue {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(ListingError::InvalidConfigValue {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ListingError::InvalidConfigValue {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

// Listing fields below report `Validation` errors, which are shown inline to the user.

pub fn require_text(field_name: &str, label: &str, value: &str, max_len: Option<usize>) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ListingError::validation(field_name, format!("{} is required.", label)));
    }

    if let Some(max_len) = max_len {
        if value.chars().count() > max_len {
            return Err(ListingError::validation(
                field_name,
                format!("{} must be at most {} characters.", label, max_len),
            ));
        }
    }

    Ok(())
}

pub fn validate_image_count(count: usize) -> Result<()> {
    if count > MAX_IMAGES {
        return Err(ListingError::TooManyImages {
            count,
            max: MAX_IMAGES,
        });
    }
    Ok(())
}

/// Stored image references are either absolute http(s) URLs or paths served
/// by this application (`/images/...`).
pub fn validate_image_url(url_str: &str) -> Result<()> {
    if url_str.starts_with('/') && !url_str.starts_with("//") {
        return Ok(());
    }

    match Url::parse(url_str) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => Err(ListingError::validation(
            "images",
            format!("Invalid image URL: {}", url_str),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("auth.session_url", "https://example.com").is_ok());
        assert!(validate_url("auth.session_url", "http://example.com").is_ok());
        assert!(validate_url("auth.session_url", "").is_err());
        assert!(validate_url("auth.session_url", "invalid-url").is_err());
        assert!(validate_url("auth.session_url", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_public_base() {
        assert!(validate_public_base("images.public_base_url", "/images").is_ok());
        assert!(validate_public_base("images.public_base_url", "https://cdn.example.com").is_ok());
        assert!(validate_public_base("images.public_base_url", "images").is_err());
    }

    #[test]
    fn test_require_text() {
        assert!(require_text("title", "Title", "Maruti Suzuki Swift", Some(200)).is_ok());
        assert!(require_text("title", "Title", "   ", Some(200)).is_err());
        assert!(require_text("title", "Title", &"x".repeat(201), Some(200)).is_err());
        assert!(require_text("description", "Description", &"x".repeat(5000), None).is_ok());
    }

    #[test]
    fn test_validate_image_count() {
        assert!(validate_image_count(0).is_ok());
        assert!(validate_image_count(10).is_ok());
        assert!(matches!(
            validate_image_count(11),
            Err(ListingError::TooManyImages { count: 11, max: 10 })
        ));
    }

    #[test]
    fn test_validate_image_url() {
        assert!(validate_image_url("/images/a.jpg").is_ok());
        assert!(validate_image_url("https://cdn.example.com/a.jpg").is_ok());
        assert!(validate_image_url("//evil.example.com/a.jpg").is_err());
        assert!(validate_image_url("blob:http://localhost/123").is_err());
        assert!(validate_image_url("not a url").is_err());
    }

    #[test]
    fn test_validate_positive_number_and_range() {
        assert!(validate_positive_number("server.port", 3000, 1).is_ok());
        assert!(validate_positive_number("server.port", 0, 1).is_err());
        assert!(validate_range("images.max_image_bytes", 5, 1, 10).is_ok());
        assert!(validate_range("images.max_image_bytes", 11, 1, 10).is_err());
    }
}
