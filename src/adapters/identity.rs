use crate::domain::model::Session;
use crate::domain::ports::SessionVerifier;
use crate::utils::error::{ListingError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct SessionResponse {
    #[serde(alias = "sub")]
    user_id: String,
}

/// Asks the hosted identity provider whether a bearer token belongs to a live session.
#[derive(Debug, Clone)]
pub struct HttpSessionVerifier {
    client: Client,
    session_url: String,
}

impl HttpSessionVerifier {
    pub fn new(session_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            session_url: session_url.into(),
        }
    }
}

#[async_trait]
impl SessionVerifier for HttpSessionVerifier {
    async fn verify(&self, token: &str) -> Result<Session> {
        tracing::debug!("Verifying session with {}", self.session_url);
        let response = self
            .client
            .get(&self.session_url)
            .bearer_auth(token)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let session: SessionResponse = response.json().await?;
                Ok(Session {
                    user_id: session.user_id,
                })
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ListingError::Unauthorized {
                reason: "session rejected by identity provider".to_string(),
            }),
            status => {
                let message = response.text().await.unwrap_or_default();
                Err(ListingError::Upstream {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}
