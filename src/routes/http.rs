//! HTTP endpoint handlers. These are thin wrappers that forward to the pipeline.
//! Each handler is instrumented and logs the request id and resulting link.

use std::sync::Arc;
use axum::{
  extract::{multipart::MultipartRejection, Multipart, Path, Request, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{debug, info, instrument};

use crate::error::AppError;
use crate::logic::{generate_html, generate_pdf, ImageUpload};
use crate::protocol::*;
use crate::state::AppState;

/// Name of the multipart field carrying the picture.
const IMAGE_FIELD: &str = "image";

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip_all)]
pub async fn http_generate_html(
  State(state): State<Arc<AppState>>,
  multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<GenerateHtmlOut>, AppError> {
  let upload = read_image(multipart).await?;
  let generated = generate_html(&state, upload).await?;
  info!(target: "worksheet", id = %generated.id, url = %generated.url, "HTTP generate-html served");
  Ok(Json(GenerateHtmlOut { success: true, url: generated.url }))
}

#[instrument(level = "info", skip_all)]
pub async fn http_generate_pdf(
  State(state): State<Arc<AppState>>,
  multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<GeneratePdfOut>, AppError> {
  let upload = read_image(multipart).await?;
  let generated = generate_pdf(&state, upload).await?;
  info!(target: "worksheet", id = %generated.id, url = %generated.url, "HTTP generate-pdf served");
  Ok(Json(GeneratePdfOut { success: true, pdf_url: generated.url }))
}

/// `GET /view/<name>` and `GET /download/<name>`: a file from the output directory, or 404.
#[instrument(level = "info", skip_all, fields(%name))]
pub async fn http_artifact(
  State(state): State<Arc<AppState>>,
  Path(name): Path<String>,
  req: Request,
) -> Response {
  let Some(path) = state.store.resolve_output(&name).await else {
    debug!(target: "worksheet", %name, "Artifact not found");
    return (StatusCode::NOT_FOUND, Json(ErrorOut { error: format!("{name} not found") })).into_response();
  };
  match ServeFile::new(path).oneshot(req).await {
    Ok(resp) => resp.into_response(),
    Err(never) => match never {},
  }
}

/// Pull the `image` field out of the form. A body that is not multipart at all,
/// or an empty file, counts as a missing image.
async fn read_image(multipart: Result<Multipart, MultipartRejection>) -> Result<ImageUpload, AppError> {
  let mut multipart = multipart.map_err(|rejection| {
    debug!(target: "worksheet", %rejection, "Request is not multipart");
    AppError::MissingImage
  })?;

  while let Some(field) = multipart.next_field().await? {
    if field.name() != Some(IMAGE_FIELD) {
      continue;
    }
    let content_type = field.content_type().map(str::to_string);
    let bytes = field.bytes().await?;
    if bytes.is_empty() {
      return Err(AppError::MissingImage);
    }
    return Ok(ImageUpload { bytes: bytes.to_vec(), content_type });
  }
  Err(AppError::MissingImage)
}
