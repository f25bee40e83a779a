//! HTTP surface of the listing service.
//!
//! | Method | Path         | Body                      | Response                      |
//! |--------|--------------|---------------------------|-------------------------------|
//! | GET    | `/search`    | `?q=<text>`               | `{ cars: [{id, title}] }`     |
//! | GET    | `/cars`      |                           | all listings                  |
//! | POST   | `/cars`      | multipart form            | created listing               |
//! | POST   | `/cars/get`  | `{ id }`                  | listing or 404                |
//! | PUT    | `/cars`      | `{ id, title, ... }`      | updated listing               |
//! | DELETE | `/cars`      | `{ id }`                  | `{ success: true }` or 404    |
//! | POST   | `/cars/images` | multipart `images` files | `{ urls }`                   |
//!
//! Mutating routes take a [`Session`](crate::domain::model::Session), which
//! is only enforced when a session verifier is configured.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::core::ListingService;
use crate::domain::ports::SessionVerifier;

pub mod error;
pub mod routes;
pub mod session;

use routes::{
    create_handler, delete_handler, get_handler, health_handler, list_handler, search_handler,
    update_handler, upload_handler,
};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ListingService>,
    pub verifier: Option<Arc<dyn SessionVerifier>>,
}

impl AppState {
    pub fn new(service: ListingService) -> Self {
        Self {
            service: Arc::new(service),
            verifier: None,
        }
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn SessionVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }
}

/// Listing routes only, without static files or middleware.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/search", get(search_handler))
        .route(
            "/cars",
            get(list_handler)
                .post(create_handler)
                .put(update_handler)
                .delete(delete_handler),
        )
        .route("/cars/get", post(get_handler))
        .route("/cars/images", post(upload_handler))
        .with_state(state)
}

/// Full application: routes, local image files, CORS, tracing and body limit.
pub fn build_app(state: AppState, config: &AppConfig) -> Router {
    let mut app = build_router(state);

    if config.uses_local_images() {
        let mount = config.images.public_base_url.trim_end_matches('/');
        if mount.starts_with('/') && mount.len() > 1 {
            info!("Serving images from {} at {}", config.images.directory, mount);
            app = app.nest_service(mount, ServeDir::new(&config.images.directory));
        }
    }

    app.layer(DefaultBodyLimit::max(config.server.max_body_bytes))
        .layer(cors_layer(&config.server.cors_origins))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid CORS origin {}: {}", origin, e);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

pub async fn serve(listener: TcpListener, app: Router) -> std::io::Result<()> {
    if let Ok(address) = listener.local_addr() {
        info!("Server running on {}", address);
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
