use std::sync::Arc;

use anyhow::Context;
use car_listings::config::AppConfig;
use car_listings::domain::ports::ImageStore;
use car_listings::utils::{logger, validation::Validate};
use car_listings::{
    build_app, AppState, HttpSessionVerifier, ListingError, ListingService, LocalImageStore,
    ServeArgs, SqliteListingStore,
};
use clap::Parser;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ServeArgs::parse();

    let (mut config, source) = AppConfig::load_or_default(&args.config)
        .with_context(|| format!("loading configuration from {}", args.config))?;
    let overrides = args.apply_overrides(&mut config);

    // 初始化日誌
    if config.json_logs() {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("Starting car-listings server");
    source.log();
    for applied in &overrides {
        tracing::info!("{}", applied);
    }
    if args.verbose {
        tracing::debug!("Config: {:?}", config);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let store = SqliteListingStore::open(&config.database.path)
        .with_context(|| format!("opening database {}", config.database.path))?;
    tracing::info!("📁 Database: {}", config.database.path);

    let images = image_store(&config).await?;
    let service = ListingService::new(Arc::new(store), images)
        .with_max_image_bytes(config.images.max_image_bytes);

    let mut state = AppState::new(service);
    if config.auth.enabled {
        let session_url = config.auth.session_url.clone().unwrap_or_default();
        tracing::info!("🔐 Sessions verified against {}", session_url);
        state = state.with_verifier(Arc::new(HttpSessionVerifier::new(session_url)));
    }

    let app = build_app(state, &config);
    let address = config.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {}", address))?;

    car_listings::server::serve(listener, app)
        .await
        .context("server terminated unexpectedly")?;
    Ok(())
}

async fn image_store(config: &AppConfig) -> anyhow::Result<Arc<dyn ImageStore>> {
    match config.images.backend.as_str() {
        "local" => {
            tokio::fs::create_dir_all(&config.images.directory)
                .await
                .with_context(|| format!("creating image directory {}", config.images.directory))?;
            tracing::info!("🖼️  Images stored in {}", config.images.directory);
            Ok(Arc::new(LocalImageStore::new(
                &config.images.directory,
                &config.images.public_base_url,
            )))
        }
        #[cfg(feature = "s3")]
        "s3" => {
            let s3 = config.images.s3.clone().ok_or_else(|| ListingError::Config {
                message: "missing [images.s3] section".to_string(),
            })?;
            tracing::info!("🖼️  Images stored in s3://{}/{}", s3.bucket, s3.prefix);
            let store = car_listings::adapters::S3ImageStore::from_env(
                &s3.region,
                s3.bucket,
                s3.prefix,
                s3.public_base_url,
            )
            .await;
            Ok(Arc::new(store))
        }
        other => Err(ListingError::Config {
            message: format!(
                "image backend {:?} is not available in this build",
                other
            ),
        }
        .into()),
    }
}
