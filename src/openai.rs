//! Minimal OpenAI-compatible vision client.
//!
//! We only call chat.completions with one image and request a strict JSON object.
//! Calls are instrumented and log model names, latencies, and response sizes (not contents).
//!
//! NOTE: We never log the API key or the image payload.

use std::path::Path;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::config::OpenAIConfig;
use crate::domain::{ProblemSet, ResponseShape};
use crate::inference::{parse_problem_set, InferenceClient, InferenceError};
use crate::util::{data_url, image_format, trunc_for_log};

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  api_key: String,
  pub base_url: String,
  pub vision_model: String,
  system: String,
}

impl OpenAI {
  /// Construct the client if the config carries an API key; otherwise return None.
  pub fn from_config(cfg: &OpenAIConfig, system: &str) -> Option<Self> {
    let api_key = cfg.api_key.clone()?;
    let client = match reqwest::Client::builder().timeout(cfg.timeout).build() {
      Ok(c) => c,
      Err(e) => {
        error!(target: "worksheet_backend", error = %e, "Cannot build HTTP client; inference disabled");
        return None;
      }
    };
    Some(Self {
      client,
      api_key,
      base_url: cfg.base_url.trim_end_matches('/').to_string(),
      vision_model: cfg.vision_model.clone(),
      system: system.to_string(),
    })
  }

  /// JSON-object chat completion with one image attached. Returns the raw message text.
  #[instrument(level = "info", skip(self, instruction, image_url), fields(model = %self.vision_model, image_len = image_url.len()))]
  async fn chat_vision_json(&self, instruction: &str, image_url: String) -> Result<String, InferenceError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: self.vision_model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: MessageContent::Text(self.system.clone()) },
        ChatMessageReq {
          role: "user".into(),
          content: MessageContent::Parts(vec![
            ContentPart::ImageUrl { image_url: ImageUrl { url: image_url } },
            ContentPart::Text { text: instruction.to_string() },
          ]),
        },
      ],
      temperature: 0.7,
      response_format: Some(ResponseFormat { r#type: "json_object".into() }),
      max_tokens: None,
    };

    let res = self.client.post(&url)
      .header(USER_AGENT, "worksheet-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or(body);
      return Err(InferenceError::Status { status: status.as_u16(), message });
    }

    let body: ChatCompletionResponse = res.json().await?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    Ok(body.choices.into_iter().next()
      .and_then(|c| c.message.content)
      .unwrap_or_default())
  }
}

#[async_trait]
impl InferenceClient for OpenAI {
  #[instrument(level = "info", skip(self, instruction), fields(image = %image_path.display(), shape = ?shape, instr_len = instruction.len()))]
  async fn analyze_and_generate(
    &self,
    image_path: &Path,
    instruction: &str,
    shape: ResponseShape,
  ) -> Result<ProblemSet, InferenceError> {
    let bytes = tokio::fs::read(image_path).await?;
    let format = image_format(&bytes, mime_guess::from_path(image_path).first_raw());
    let image_url = data_url(&format.mime, &bytes);

    let start = std::time::Instant::now();
    let result = self.chat_vision_json(instruction, image_url).await;
    let elapsed = start.elapsed();

    let text = match result {
      Ok(t) => {
        info!(?elapsed, response_len = t.len(), "Model response received successfully");
        t
      }
      Err(e) => {
        error!(?elapsed, error = %e, "Model call failed");
        return Err(e);
      }
    };

    parse_problem_set(&text, shape).map_err(|e| {
      error!(error = %e, response = %trunc_for_log(&text, 200), "Model response is not a valid problem set");
      e
    })
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: MessageContent }
#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent {
  Text(String),
  Parts(Vec<ContentPart>),
}
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
  Text { text: String },
  ImageUrl { image_url: ImageUrl },
}
#[derive(Serialize)]
struct ImageUrl { url: String }
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}
