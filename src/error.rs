//! Error types and their HTTP mapping.
//!
//! Client input problems map to 400; everything that goes wrong after the
//! upload was accepted (model call, rendering, compiler, filesystem) maps to
//! 500 with the error text as message. Nothing is retried.

use axum::{
  extract::multipart::MultipartError,
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use thiserror::Error;
use tracing::{error, warn};

use crate::compiler::CompileError;
use crate::inference::InferenceError;
use crate::protocol::ErrorOut;

/// Fixed message for a request without an `image` field.
pub const MISSING_IMAGE_MESSAGE: &str = "Resim yüklenmedi";

#[derive(Debug, Error)]
pub enum AppError {
  #[error("{}", MISSING_IMAGE_MESSAGE)]
  MissingImage,

  #[error("invalid multipart body: {0}")]
  Multipart(#[from] MultipartError),

  #[error("inference is not configured (OPENAI_API_KEY is unset)")]
  InferenceDisabled,

  #[error(transparent)]
  Inference(#[from] InferenceError),

  #[error("template rendering failed: {0}")]
  Render(#[from] handlebars::RenderError),

  #[error(transparent)]
  Compile(#[from] CompileError),

  #[error("filesystem error: {0}")]
  Io(#[from] std::io::Error),
}

impl AppError {
  pub fn status(&self) -> StatusCode {
    match self {
      AppError::MissingImage => StatusCode::BAD_REQUEST,
      AppError::Multipart(e) => e.status(),
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      error!(target: "worksheet", error = %self, "Request failed");
    } else {
      warn!(target: "worksheet", error = %self, %status, "Rejected request");
    }
    (status, Json(ErrorOut { error: self.to_string() })).into_response()
  }
}
