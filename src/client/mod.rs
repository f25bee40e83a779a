//! Typed client for the listing service and the models behind the
//! browse/detail/create/edit screens.

pub mod forms;
pub mod suggest;
pub mod views;

use crate::domain::api::{DeleteResponse, IdRequest, SearchResponse, UploadResponse};
use crate::domain::model::{ImageUpload, Listing, ListingSummary, ListingUpdate};
use crate::utils::error::{ListingError, Result};
use crate::utils::validation::validate_url;
use forms::{CreateForm, EditForm};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use url::Url;

#[derive(Debug, Clone)]
pub struct ListingsClient {
    http: Client,
    base_url: Url,
    token: Option<String>,
}

impl ListingsClient {
    pub fn new(base_url: &str) -> Result<Self> {
        validate_url("base_url", base_url)?;
        let mut base_url = Url::parse(base_url).map_err(|e| ListingError::Config {
            message: format!("Invalid base URL: {}", e),
        })?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            http: Client::new(),
            base_url,
            token: None,
        })
    }

    /// Bearer token issued by the identity provider, sent with mutating requests.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(|e| ListingError::Config {
            message: format!("Invalid endpoint {}: {}", path, e),
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Title suggestions. A blank query never reaches the server.
    pub async fn search(&self, query: &str) -> Result<Vec<ListingSummary>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let url = self.endpoint("search")?;
        tracing::debug!("Searching listings for {:?}", query);
        let response = self.http.get(url).query(&[("q", query)]).send().await?;
        let body: SearchResponse = parse_response(response).await?;
        Ok(body.cars)
    }

    pub async fn list(&self) -> Result<Vec<Listing>> {
        let response = self.http.get(self.endpoint("cars")?).send().await?;
        parse_response(response).await
    }

    pub async fn get(&self, id: &str) -> Result<Listing> {
        let response = self
            .http
            .post(self.endpoint("cars/get")?)
            .json(&IdRequest { id: id.to_string() })
            .send()
            .await?;
        parse_response(response).await
    }

    /// Validates the form first; an invalid form is rejected without any request.
    pub async fn create(&self, form: &CreateForm) -> Result<Listing> {
        form.validate()?;

        let mut multipart = Form::new()
            .text("title", form.title.clone())
            .text("description", form.description.clone())
            .text("priceRange", form.price_range.clone());
        if !form.tags.is_empty() {
            multipart = multipart.text("tags", form.tags.join(", "));
        }
        for image in &form.images {
            multipart = multipart.part("images", image_part(image)?);
        }

        let request = self.http.post(self.endpoint("cars")?).multipart(multipart);
        let response = self.authorized(request).send().await?;
        parse_response(response).await
    }

    pub async fn upload_images(&self, images: &[ImageUpload]) -> Result<Vec<String>> {
        let mut multipart = Form::new();
        for image in images {
            multipart = multipart.part("images", image_part(image)?);
        }

        let request = self
            .http
            .post(self.endpoint("cars/images")?)
            .multipart(multipart);
        let response = self.authorized(request).send().await?;
        let body: UploadResponse = parse_response(response).await?;
        Ok(body.urls)
    }

    pub async fn update(&self, update: &ListingUpdate) -> Result<Listing> {
        let request = self.http.put(self.endpoint("cars")?).json(update);
        let response = self.authorized(request).send().await?;
        parse_response(response).await
    }

    /// Submits the edit form: validates, uploads any new images, then replaces
    /// the listing's fields with the form's contents.
    pub async fn save_edit(&self, form: &EditForm) -> Result<Listing> {
        form.validate()?;

        let uploaded = if form.new_images.is_empty() {
            Vec::new()
        } else {
            self.upload_images(&form.new_images).await?
        };

        self.update(&form.to_update(uploaded)).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let request = self
            .http
            .delete(self.endpoint("cars")?)
            .json(&IdRequest { id: id.to_string() });
        let response = self.authorized(request).send().await?;
        let body: DeleteResponse = parse_response(response).await?;

        if !body.success {
            return Err(ListingError::Api {
                status: 200,
                message: "Failed to delete the car.".to_string(),
            });
        }
        Ok(())
    }
}

fn image_part(image: &ImageUpload) -> Result<Part> {
    let file_name = image
        .file_name
        .clone()
        .unwrap_or_else(|| format!("image.{}", image.extension()));
    Ok(Part::bytes(image.bytes.clone())
        .file_name(file_name)
        .mime_str(&image.content_type)?)
}

async fn parse_response<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|body| {
            body.get("message")
                .or_else(|| body.get("error"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| {
            if text.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string()
            } else {
                text
            }
        });

    tracing::debug!("Request failed with {}: {}", status, message);
    Err(ListingError::Api {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_keep_base_path() {
        let client = ListingsClient::new("https://cars.example.com/api").unwrap();
        assert_eq!(
            client.endpoint("cars/get").unwrap().as_str(),
            "https://cars.example.com/api/cars/get"
        );

        let client = ListingsClient::new("http://127.0.0.1:3000").unwrap();
        assert_eq!(
            client.endpoint("search").unwrap().as_str(),
            "http://127.0.0.1:3000/search"
        );
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        assert!(ListingsClient::new("localhost:3000").is_err());
        assert!(ListingsClient::new("").is_err());
    }
}
