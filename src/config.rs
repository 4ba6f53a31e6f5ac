//! Server configuration, built once at startup from the environment plus an
//! optional TOML file with prompt overrides.
//!
//! See `ServerConfig::from_env` for the variables and `Prompts` for the TOML schema.

use std::{path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{error, info, warn};

/// Everything the components need, passed by reference from `AppState`.
#[derive(Clone, Debug)]
pub struct ServerConfig {
  pub port: u16,
  /// Base used to build the links returned to clients (no trailing slash).
  pub public_base_url: String,
  pub upload_dir: PathBuf,
  pub output_dir: PathBuf,
  pub template_dir: Option<PathBuf>,
  pub latex_compiler: String,
  pub max_upload_bytes: usize,
  pub retention: Option<Duration>,
  pub openai: OpenAIConfig,
  pub prompts: Prompts,
}

#[derive(Clone, Debug)]
pub struct OpenAIConfig {
  /// Credential; inference is disabled when absent.
  pub api_key: Option<String>,
  pub base_url: String,
  pub vision_model: String,
  pub timeout: Duration,
}

/// Prompts sent with every image. Override them in TOML under `[prompts]`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub system: String,
  /// HTML worksheet: 7 questions split 4/2/1 across tiers, tier label per question.
  pub html_instruction: String,
  /// PDF worksheet: exactly 7 untiered questions.
  pub pdf_instruction: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      system: "You are a math teacher's assistant. Respond ONLY with strict JSON.".into(),
      html_instruction: r#"Bu matematik sorusunu analiz et. Konuyu ve kazanımı belirle.
Ardından bu konudan 7 adet özgün soru üret (4 temel, 2 orta, 1 yeni nesil).
Matematik ifadelerini LaTeX formatında ($...$) yaz.
SADECE şu JSON formatında yanıt ver:
{
  "konu": "...", "kazanim": "...",
  "sorular": [
    {"seviye": "Temel", "metin": "...", "A": "...", "B": "...", "C": "...", "D": "...", "E": "..."},
    {"seviye": "Orta", "metin": "...", "A": "...", "B": "...", "C": "...", "D": "...", "E": "..."},
    {"seviye": "Yeni Nesil", "metin": "...", "A": "...", "B": "...", "C": "...", "D": "...", "E": "..."}
  ]
}"#.into(),
      pdf_instruction: r#"Bu matematik sorusunu analiz et. Konuyu ve kazanımı belirle.
Ardından bu konudan tam olarak 7 adet özgün çoktan seçmeli soru üret.
Matematik ifadelerini LaTeX formatında ($...$) yaz; metin içinde %, &, # karakterlerini kaçır (\%, \&, \#).
SADECE şu JSON formatında yanıt ver:
{
  "konu": "...", "kazanim": "...",
  "sorular": [
    {"metin": "...", "A": "...", "B": "...", "C": "...", "D": "...", "E": "..."}
  ]
}"#.into(),
    }
  }
}

#[derive(Debug, Deserialize, Default)]
struct FileConfig {
  #[serde(default)]
  prompts: Option<Prompts>,
}

impl ServerConfig {
  /// Read the environment once. Unparseable numbers fall back to defaults with a warning.
  pub fn from_env() -> Self {
    let port = env_parse("PORT").unwrap_or(5000u16);
    let public_base_url = std::env::var("PUBLIC_BASE_URL")
      .or_else(|_| std::env::var("RENDER_EXTERNAL_URL"))
      .map(|u| u.trim_end_matches('/').to_string())
      .unwrap_or_else(|_| format!("http://127.0.0.1:{port}"));

    let openai = OpenAIConfig {
      api_key: std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
      base_url: std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into()),
      vision_model: std::env::var("OPENAI_VISION_MODEL").unwrap_or_else(|_| "gpt-4o".into()),
      timeout: Duration::from_secs(env_parse("OPENAI_TIMEOUT_SECS").unwrap_or(120)),
    };

    Self {
      port,
      public_base_url,
      upload_dir: std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".into()).into(),
      output_dir: std::env::var("OUTPUT_DIR").unwrap_or_else(|_| "outputs".into()).into(),
      template_dir: std::env::var("TEMPLATE_DIR").ok().map(PathBuf::from),
      latex_compiler: std::env::var("LATEX_COMPILER").unwrap_or_else(|_| "pdflatex".into()),
      max_upload_bytes: env_parse("MAX_UPLOAD_BYTES").unwrap_or(16 * 1024 * 1024),
      retention: env_parse::<u64>("ARTIFACT_RETENTION_SECS").map(Duration::from_secs),
      openai,
      prompts: load_prompts_from_env().unwrap_or_default(),
    }
  }

  /// Config rooted in a scratch directory, with inference disabled.
  #[cfg(test)]
  pub fn for_tests(root: &std::path::Path) -> Self {
    Self {
      port: 5000,
      public_base_url: "http://127.0.0.1:5000".into(),
      upload_dir: root.join("uploads"),
      output_dir: root.join("outputs"),
      template_dir: None,
      latex_compiler: "pdflatex".into(),
      max_upload_bytes: 1024 * 1024,
      retention: None,
      openai: OpenAIConfig {
        api_key: None,
        base_url: "http://127.0.0.1:9".into(),
        vision_model: "gpt-4o".into(),
        timeout: Duration::from_secs(1),
      },
      prompts: Prompts::default(),
    }
  }

  /// Link returned by `/generate-html`.
  pub fn view_url(&self, filename: &str) -> String {
    format!("{}/view/{}", self.public_base_url, filename)
  }

  /// Link returned by `/generate-pdf`.
  pub fn download_url(&self, filename: &str) -> String {
    format!("{}/download/{}", self.public_base_url, filename)
  }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
  let raw = std::env::var(key).ok()?;
  match raw.trim().parse::<T>() {
    Ok(v) => Some(v),
    Err(_) => {
      warn!(target: "worksheet_backend", %key, value = %raw, "Ignoring unparseable environment value");
      None
    }
  }
}

/// Attempt to load prompt overrides from WORKSHEET_CONFIG_PATH. On any parsing/IO error, returns None.
fn load_prompts_from_env() -> Option<Prompts> {
  let path = std::env::var("WORKSHEET_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_prompts(&s) {
      Ok(prompts) => {
        info!(target: "worksheet_backend", %path, "Loaded worksheet config (TOML)");
        prompts
      }
      Err(e) => {
        error!(target: "worksheet_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "worksheet_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

fn parse_prompts(s: &str) -> Result<Option<Prompts>, toml::de::Error> {
  Ok(toml::from_str::<FileConfig>(s)?.prompts)
}
