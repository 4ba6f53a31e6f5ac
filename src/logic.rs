//! Document-generation pipeline shared by the two generate endpoints.
//!
//! upload → inference → render → [compile] → persist → link.
//! Any failure aborts the request; files written before the failure stay on disk.

use tracing::{info, instrument};

use crate::domain::ResponseShape;
use crate::error::AppError;
use crate::state::AppState;
use crate::store::RequestId;

/// Image taken from the multipart `image` field.
#[derive(Debug)]
pub struct ImageUpload {
  pub bytes: Vec<u8>,
  pub content_type: Option<String>,
}

/// Outcome of a successful generation.
#[derive(Debug)]
pub struct Generated {
  pub id: RequestId,
  pub url: String,
}

#[instrument(level = "info", skip(state, upload), fields(upload_len = upload.bytes.len()))]
pub async fn generate_html(state: &AppState, upload: ImageUpload) -> Result<Generated, AppError> {
  let id = state.store.reserve_id();
  let image_path = state.store.save_upload(&id, &upload.bytes, upload.content_type.as_deref()).await?;

  let inference = state.inference.as_ref().ok_or(AppError::InferenceDisabled)?;
  let set = inference
    .analyze_and_generate(&image_path, &state.config.prompts.html_instruction, ResponseShape::Tiered)
    .await?;

  let html = state.renderer.render_html(&set)?;
  let filename = id.filename("html");
  state.store.save_output(&filename, html.as_bytes()).await?;

  let url = state.config.view_url(&filename);
  info!(target: "worksheet", %id, topic = %set.topic, questions = set.questions.len(), %url, "HTML worksheet generated");
  Ok(Generated { id, url })
}

#[instrument(level = "info", skip(state, upload), fields(upload_len = upload.bytes.len()))]
pub async fn generate_pdf(state: &AppState, upload: ImageUpload) -> Result<Generated, AppError> {
  let id = state.store.reserve_id();
  let image_path = state.store.save_upload(&id, &upload.bytes, upload.content_type.as_deref()).await?;

  let inference = state.inference.as_ref().ok_or(AppError::InferenceDisabled)?;
  let set = inference
    .analyze_and_generate(&image_path, &state.config.prompts.pdf_instruction, ResponseShape::Flat)
    .await?;

  let (tex, fit) = state.renderer.render_latex(&set)?;
  let tex_path = state.store.save_output(&id.filename("tex"), tex.as_bytes()).await?;

  let pdf_path = state.compiler.compile(&tex_path, state.store.output_dir()).await?;
  // link whatever the compiler actually produced
  let filename = pdf_path
    .file_name()
    .and_then(|name| name.to_str())
    .map(str::to_string)
    .unwrap_or_else(|| id.filename("pdf"));

  let url = state.config.download_url(&filename);
  info!(target: "worksheet", %id, topic = %set.topic, ?fit, pdf = %pdf_path.display(), %url, "PDF worksheet generated");
  Ok(Generated { id, url })
}
