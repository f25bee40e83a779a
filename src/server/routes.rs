use crate::domain::api::{
    DeleteResponse, IdRequest, SearchParams, SearchResponse, UploadResponse,
    SEARCH_FAILURE_MESSAGE,
};
use crate::domain::model::{
    parse_tag_input, ImageUpload, Listing, ListingUpdate, NewListing, Session, MAX_IMAGES,
};
use crate::server::error::ApiJson;
use crate::server::AppState;
use crate::utils::error::{ListingError, Result};
use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Store failures degrade to an empty suggestion list with a 500 status.
pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Response {
    match state.service.search(params.q.as_deref()).await {
        Ok(cars) => (StatusCode::OK, Json(SearchResponse { cars, error: None })).into_response(),
        Err(e) => {
            tracing::error!("Error searching cars: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(SearchResponse {
                    cars: Vec::new(),
                    error: Some(SEARCH_FAILURE_MESSAGE.to_string()),
                }),
            )
                .into_response()
        }
    }
}

pub async fn list_handler(State(state): State<AppState>) -> Result<Json<Vec<Listing>>> {
    Ok(Json(state.service.list().await?))
}

pub async fn get_handler(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<IdRequest>,
) -> Result<Json<Listing>> {
    Ok(Json(state.service.get(&request.id).await?))
}

pub async fn create_handler(
    State(state): State<AppState>,
    session: Session,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Listing>)> {
    let form = read_multipart(multipart).await?;
    let draft = NewListing {
        title: form.title.unwrap_or_default(),
        description: form.description.unwrap_or_default(),
        price_range: form.price_range.unwrap_or_default(),
        tags: form.tags,
    };

    tracing::debug!(
        "User {} creating listing with {} images",
        session.user_id,
        form.images.len()
    );
    let listing = state.service.create(draft, form.images).await?;
    Ok((StatusCode::CREATED, Json(listing)))
}

pub async fn update_handler(
    State(state): State<AppState>,
    session: Session,
    ApiJson(update): ApiJson<ListingUpdate>,
) -> Result<Json<Listing>> {
    tracing::debug!("User {} updating listing {}", session.user_id, update.id);
    Ok(Json(state.service.update(update).await?))
}

pub async fn delete_handler(
    State(state): State<AppState>,
    session: Session,
    ApiJson(request): ApiJson<IdRequest>,
) -> Result<Json<DeleteResponse>> {
    tracing::debug!("User {} deleting listing {}", session.user_id, request.id);
    state.service.delete(&request.id).await?;
    Ok(Json(DeleteResponse { success: true }))
}

pub async fn upload_handler(
    State(state): State<AppState>,
    session: Session,
    multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    let form = read_multipart(multipart).await?;
    tracing::debug!(
        "User {} uploading {} images",
        session.user_id,
        form.images.len()
    );
    let urls = state.service.upload_images(form.images).await?;
    Ok((StatusCode::CREATED, Json(UploadResponse { urls })))
}

#[derive(Debug, Default)]
struct ListingForm {
    title: Option<String>,
    description: Option<String>,
    price_range: Option<String>,
    tags: Vec<String>,
    images: Vec<ImageUpload>,
}

fn malformed(e: axum::extract::multipart::MultipartError) -> ListingError {
    ListingError::MalformedPayload {
        message: e.body_text(),
    }
}

/// Reads the create/upload form. Files beyond the image cap are drained
/// without being buffered and reported as a single `TooManyImages`.
async fn read_multipart(mut multipart: Multipart) -> Result<ListingForm> {
    let mut form = ListingForm::default();
    let mut overflow = 0usize;

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "images" | "images[]" => {
                if form.images.len() >= MAX_IMAGES {
                    overflow += 1;
                    continue;
                }
                let file_name = field.file_name().map(str::to_string);
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(malformed)?;
                form.images
                    .push(ImageUpload::new(file_name, content_type, bytes.to_vec()));
            }
            "title" => form.title = Some(field.text().await.map_err(malformed)?),
            "description" => form.description = Some(field.text().await.map_err(malformed)?),
            "priceRange" | "price_range" => {
                form.price_range = Some(field.text().await.map_err(malformed)?)
            }
            "tags" => {
                let text = field.text().await.map_err(malformed)?;
                form.tags.extend(parse_tag_input(&text));
            }
            other => tracing::debug!("Ignoring unknown form field {:?}", other),
        }
    }

    if overflow > 0 {
        return Err(ListingError::TooManyImages {
            count: MAX_IMAGES + overflow,
            max: MAX_IMAGES,
        });
    }

    Ok(form)
}
