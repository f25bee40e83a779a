use thiserror::Error;

#[derive(Error, Debug)]
pub enum ListingError {
    #[error("Validation error on {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Too many images: {count} (maximum is {max})")]
    TooManyImages { count: usize, max: usize },

    #[error("Malformed payload: {message}")]
    MalformedPayload { message: String },

    #[error("Listing not found: {id}")]
    NotFound { id: String },

    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: String },

    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Image store error: {message}")]
    ImageStore { message: String },

    #[error("Upstream service returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid value for {field} ({value}): {reason}")]
    InvalidConfigValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    NotFound,
    Auth,
    Store,
    Network,
    Config,
}

impl ListingError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } | Self::TooManyImages { .. } | Self::MalformedPayload { .. } => {
                ErrorCategory::Validation
            }
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Unauthorized { .. } => ErrorCategory::Auth,
            Self::Store(_)
            | Self::Io(_)
            | Self::Serialization(_)
            | Self::ImageStore { .. }
            | Self::Internal { .. } => ErrorCategory::Store,
            Self::Http(_) | Self::Upstream { .. } => ErrorCategory::Network,
            Self::Api { status, .. } => match status {
                400 | 413 | 422 => ErrorCategory::Validation,
                401 | 403 => ErrorCategory::Auth,
                404 => ErrorCategory::NotFound,
                _ => ErrorCategory::Network,
            },
            Self::Config { .. } | Self::InvalidConfigValue { .. } => ErrorCategory::Config,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.category() == ErrorCategory::NotFound
    }

    /// Message safe to show to an end user. Store and network failures are
    /// collapsed into a generic message; their details only go to the logs.
    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::Validation { message, .. } => message.clone(),
            Self::TooManyImages { max, .. } => format!("You can only upload up to {} images.", max),
            Self::MalformedPayload { message } => format!("Malformed request: {}", message),
            Self::NotFound { .. } => "Car not found.".to_string(),
            Self::Unauthorized { .. } => "Please sign in to continue.".to_string(),
            Self::Api { message, .. } => message.clone(),
            Self::Config { .. } | Self::InvalidConfigValue { .. } => self.to_string(),
            _ => "Something went wrong. Please try again.".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ListingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(
            ListingError::validation("title", "required").category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            ListingError::TooManyImages { count: 11, max: 10 }.category(),
            ErrorCategory::Validation
        );
        assert!(ListingError::NotFound { id: "x".into() }.is_not_found());
        assert!(ListingError::Api {
            status: 404,
            message: "Car not found.".into()
        }
        .is_not_found());
        assert_eq!(
            ListingError::Api {
                status: 503,
                message: "down".into()
            }
            .category(),
            ErrorCategory::Network
        );
    }

    #[test]
    fn test_store_errors_are_not_leaked_to_users() {
        let err = ListingError::Internal {
            message: "mutex poisoned at listings.rs".into(),
        };
        assert!(!err.user_friendly_message().contains("mutex"));

        let err = ListingError::validation("title", "Title is required");
        assert_eq!(err.user_friendly_message(), "Title is required");
    }
}
