use crate::core::service::DEFAULT_MAX_IMAGE_BYTES;
use crate::utils::error::{ListingError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_positive_number, validate_public_base,
    validate_range, validate_url, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub images: ImagesConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allowed CORS origins; empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesConfig {
    #[serde(default = "default_image_backend")]
    pub backend: String,
    #[serde(default = "default_image_directory")]
    pub directory: String,
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,
    pub s3: Option<S3Config>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    #[serde(default)]
    pub prefix: String,
    pub public_base_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub enabled: bool,
    pub session_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_max_body_bytes() -> usize {
    // ten images at the default per-image cap, plus form fields
    10 * DEFAULT_MAX_IMAGE_BYTES + 1024 * 1024
}

fn default_database_path() -> String {
    "./data/car-listings.db".to_string()
}

fn default_image_backend() -> String {
    "local".to_string()
}

fn default_image_directory() -> String {
    "./data/images".to_string()
}

fn default_public_base_url() -> String {
    "/images".to_string()
}

fn default_max_image_bytes() -> usize {
    DEFAULT_MAX_IMAGE_BYTES
}

fn default_log_format() -> String {
    "compact".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            backend: default_image_backend(),
            directory: default_image_directory(),
            public_base_url: default_public_base_url(),
            max_image_bytes: default_max_image_bytes(),
            s3: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
        }
    }
}

/// Where [`AppConfig::load_or_default`] got its values from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    /// The file was missing.
    Defaults(PathBuf),
}

impl ConfigSource {
    pub fn log(&self) {
        match self {
            Self::File(path) => tracing::info!("Loaded configuration from {}", path.display()),
            Self::Defaults(path) => tracing::warn!(
                "Configuration file {} not found, using defaults",
                path.display()
            ),
        }
    }
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// Loads `path` when it exists and falls back to defaults otherwise.
    /// Nothing is logged here: callers load the configuration before the
    /// logger exists and report the returned [`ConfigSource`] afterwards.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<(Self, ConfigSource)> {
        let path = path.as_ref();
        if path.exists() {
            let config = Self::from_file(path)?;
            Ok((config, ConfigSource::File(path.to_path_buf())))
        } else {
            Ok((Self::default(), ConfigSource::Defaults(path.to_path_buf())))
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ListingError::Config {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${S3_BUCKET})
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ListingError::Config {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn uses_local_images(&self) -> bool {
        self.images.backend == "local"
    }

    pub fn json_logs(&self) -> bool {
        self.logging.format == "json"
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_non_empty_string("server.host", &self.server.host)?;
        validate_positive_number("server.port", self.server.port as usize, 1)?;
        validate_positive_number("server.max_body_bytes", self.server.max_body_bytes, 1024)?;
        for origin in &self.server.cors_origins {
            validate_url("server.cors_origins", origin)?;
        }

        validate_path("database.path", &self.database.path)?;

        validate_range(
            "images.max_image_bytes",
            self.images.max_image_bytes,
            1,
            self.server.max_body_bytes,
        )?;

        match self.images.backend.as_str() {
            "local" => {
                validate_path("images.directory", &self.images.directory)?;
                validate_public_base("images.public_base_url", &self.images.public_base_url)?;
            }
            "s3" => {
                let s3 = self.images.s3.as_ref().ok_or_else(|| ListingError::Config {
                    message: "images.backend = \"s3\" requires an [images.s3] section".to_string(),
                })?;
                validate_s3_bucket_name("images.s3.bucket", &s3.bucket)?;
                validate_aws_region("images.s3.region", &s3.region)?;
                validate_url("images.s3.public_base_url", &s3.public_base_url)?;
            }
            other => {
                return Err(ListingError::InvalidConfigValue {
                    field: "images.backend".to_string(),
                    value: other.to_string(),
                    reason: "Supported backends: local, s3".to_string(),
                });
            }
        }

        if self.auth.enabled {
            let url = self.auth.session_url.as_deref().unwrap_or("");
            validate_url("auth.session_url", url)?;
        }

        match self.logging.format.as_str() {
            "compact" | "json" => Ok(()),
            other => Err(ListingError::InvalidConfigValue {
                field: "logging.format".to_string(),
                value: other.to_string(),
                reason: "Supported formats: compact, json".to_string(),
            }),
        }
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

fn validate_s3_bucket_name(field_name: &str, bucket_name: &str) -> Result<()> {
    if bucket_name.len() < 3 || bucket_name.len() > 63 {
        return Err(ListingError::InvalidConfigValue {
            field: field_name.to_string(),
            value: bucket_name.to_string(),
            reason: "S3 bucket name must be between 3 and 63 characters".to_string(),
        });
    }

    if !bucket_name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        return Err(ListingError::InvalidConfigValue {
            field: field_name.to_string(),
            value: bucket_name.to_string(),
            reason: "S3 bucket name can only contain lowercase letters, numbers, hyphens, and dots"
                .to_string(),
        });
    }

    if bucket_name.starts_with('-') || bucket_name.ends_with('-') {
        return Err(ListingError::InvalidConfigValue {
            field: field_name.to_string(),
            value: bucket_name.to_string(),
            reason: "S3 bucket name cannot start or end with a hyphen".to_string(),
        });
    }

    Ok(())
}

fn validate_aws_region(field_name: &str, region: &str) -> Result<()> {
    validate_non_empty_string(field_name, region)?;

    if !region
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(ListingError::InvalidConfigValue {
            field: field_name.to_string(),
            value: region.to_string(),
            reason: "AWS region can only contain lowercase letters, numbers, and hyphens"
                .to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.bind_address(), "0.0.0.0:3000");
        assert!(config.uses_local_images());
        assert!(!config.auth.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[server]
host = "127.0.0.1"
port = 8080
cors_origins = ["https://cars.example.com"]

[database]
path = "/var/lib/car-listings/cars.db"

[images]
backend = "s3"
max_image_bytes = 1048576

[images.s3]
bucket = "car-images"
region = "ap-south-1"
prefix = "listings"
public_base_url = "https://car-images.s3.ap-south-1.amazonaws.com"

[auth]
enabled = true
session_url = "https://identity.example.com/v1/session"

[logging]
format = "json"
"#;

        let config = AppConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.bind_address(), "127.0.0.1:8080");
        assert_eq!(config.images.s3.as_ref().unwrap().bucket, "car-images");
        assert!(!config.uses_local_images());
        assert!(config.json_logs());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("CAR_LISTINGS_TEST_DB", "/tmp/cars-test.db");

        let toml_content = r#"
[database]
path = "${CAR_LISTINGS_TEST_DB}"
"#;

        let config = AppConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.database.path, "/tmp/cars-test.db");

        std::env::remove_var("CAR_LISTINGS_TEST_DB");
    }

    #[test]
    fn test_config_validation() {
        let config = AppConfig::from_toml_str("[images]\nbackend = \"ftp\"\n").unwrap();
        assert!(config.validate().is_err());

        let config = AppConfig::from_toml_str("[images]\nbackend = \"s3\"\n").unwrap();
        assert!(config.validate().is_err());

        let config = AppConfig::from_toml_str("[auth]\nenabled = true\n").unwrap();
        assert!(config.validate().is_err());

        let config = AppConfig::from_toml_str(
            "[images]\nbackend = \"s3\"\n[images.s3]\nbucket = \"Car_Images\"\nregion = \"ap-south-1\"\npublic_base_url = \"https://cdn.example.com\"\n",
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = AppConfig::from_toml_str("[server\nport = ").unwrap_err();
        assert!(matches!(err, ListingError::Config { .. }));
    }

    #[test]
    fn test_config_from_file_and_missing_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"[server]\nport = 4000\n").unwrap();

        let config = AppConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.server.port, 4000);

        let (config, source) = AppConfig::load_or_default(temp_file.path()).unwrap();
        assert_eq!(config.server.port, 4000);
        assert_eq!(source, ConfigSource::File(temp_file.path().to_path_buf()));

        let (config, source) = AppConfig::load_or_default("/nonexistent/car-listings.toml").unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(
            source,
            ConfigSource::Defaults(PathBuf::from("/nonexistent/car-listings.toml"))
        );
    }
}
