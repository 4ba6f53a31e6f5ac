//! Inference seam: an image plus an instruction in, a `ProblemSet` out.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{ProblemSet, ResponseShape};

#[derive(Debug, Error)]
pub enum InferenceError {
  #[error("cannot read image: {0}")]
  Image(#[from] std::io::Error),

  #[error("inference request failed: {0}")]
  Transport(#[from] reqwest::Error),

  #[error("inference HTTP {status}: {message}")]
  Status { status: u16, message: String },

  #[error("inference returned no content")]
  EmptyResponse,

  #[error("JSON parse error: {0}")]
  Parse(#[from] serde_json::Error),
}

#[async_trait]
pub trait InferenceClient: Send + Sync {
  /// Submit the image and instruction, asking for a JSON object of the given shape.
  async fn analyze_and_generate(
    &self,
    image_path: &Path,
    instruction: &str,
    shape: ResponseShape,
  ) -> Result<ProblemSet, InferenceError>;
}

/// Parse model text into a `ProblemSet`, tolerating a Markdown code fence.
pub fn parse_problem_set(text: &str, shape: ResponseShape) -> Result<ProblemSet, InferenceError> {
  let body = strip_code_fence(text.trim());
  if body.is_empty() {
    return Err(InferenceError::EmptyResponse);
  }
  let set = serde_json::from_str::<ProblemSet>(body)?;
  Ok(shape.conform(set))
}

fn strip_code_fence(s: &str) -> &str {
  let Some(rest) = s.strip_prefix("```") else { return s };
  // drop the info string ("json") up to the first newline
  let rest = rest.split_once('\n').map(|(_, r)| r).unwrap_or("");
  rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}
