//! HTTP routes over [`ImageService`].

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::error::RetrieveError;
use crate::format;
use crate::service::{ImageService, extension_of};

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
struct UploadResponse {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct FormatQuery {
    pub format: Option<String>,
}

fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(ErrorResponse { error: message.to_string() })).into_response()
}

pub fn router(service: ImageService, max_upload_bytes: usize) -> Router {
    Router::new()
        .route(
            "/images/upload",
            post(handle_image_upload).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/images/{name}", get(handle_image_fetch))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Splits `<id>.<format>` at its last dot. Ids never contain dots.
fn split_name(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((id, format)) if !format.is_empty() => (id, Some(format)),
        Some((id, _)) => (id, None),
        None => (name, None),
    }
}

pub async fn handle_image_upload(
    State(service): State<ImageService>,
    mut multipart: Multipart,
) -> Response {
    let mut upload = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() == Some("file") {
                    let file_name = field.file_name().unwrap_or("").to_string();
                    match field.bytes().await {
                        Ok(data) => upload = Some((file_name, data)),
                        Err(err) => {
                            return json_error(
                                StatusCode::BAD_REQUEST,
                                &format!("Failed to read file: {err}"),
                            );
                        }
                    }
                    break;
                }
            }
            Ok(None) => break,
            Err(err) => {
                return json_error(
                    StatusCode::BAD_REQUEST,
                    &format!("Failed to read form: {err}"),
                );
            }
        }
    }

    let Some((file_name, bytes)) = upload else {
        return json_error(StatusCode::BAD_REQUEST, "File is required");
    };
    if bytes.is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "File is empty");
    }
    if !format::is_allowed(&format::normalize(&extension_of(&file_name))) {
        return json_error(StatusCode::BAD_REQUEST, "Unsupported file type");
    }

    match service.store(&file_name, bytes.to_vec()).await {
        Ok(id) => (StatusCode::CREATED, Json(UploadResponse { id })).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "failed to store upload");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to store image")
        }
    }
}

pub async fn handle_image_fetch(
    State(service): State<ImageService>,
    Path(name): Path<String>,
    Query(query): Query<FormatQuery>,
) -> Response {
    let (id, suffix) = split_name(&name);
    let queried = query
        .format
        .as_deref()
        .filter(|value| !value.trim().is_empty());
    let requested = suffix.or(queried);
    match service.retrieve(id, requested).await {
        Ok(image) => (
            [(header::CONTENT_TYPE, image.content_type())],
            image.bytes,
        )
            .into_response(),
        Err(err) => retrieve_error_response(&err),
    }
}

fn retrieve_error_response(err: &RetrieveError) -> Response {
    match err {
        RetrieveError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "Image not found"),
        RetrieveError::BadFormat(_) => {
            json_error(StatusCode::BAD_REQUEST, "Unsupported image format")
        }
        RetrieveError::Conversion(err) => {
            tracing::error!(error = %err, "image conversion failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Image conversion failed")
        }
        RetrieveError::Storage(err) => {
            tracing::error!(error = %err, "image storage failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}
