//! Worksheet generator backend
//!
//! - Axum HTTP API: upload a photo of a math problem, get back a practice worksheet
//! - OpenAI-compatible vision model generates the questions (via environment variables)
//! - HTML worksheets are served under /view, compiled PDFs under /download
//!
//! Important env variables:
//!   PORT                    : u16 (default 5000)
//!   PUBLIC_BASE_URL         : base of returned links (default http://127.0.0.1:$PORT)
//!   OPENAI_API_KEY          : required for generation
//!   OPENAI_BASE_URL         : default "https://api.openai.com/v1"
//!   OPENAI_VISION_MODEL     : default "gpt-4o"
//!   UPLOAD_DIR / OUTPUT_DIR : artifact directories (default "uploads" / "outputs")
//!   LATEX_COMPILER          : default "pdflatex"
//!   ARTIFACT_RETENTION_SECS : evict artifacts older than this (disabled by default)
//!   WORKSHEET_CONFIG_PATH   : path to TOML prompt overrides
//!   LOG_LEVEL               : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT              : "pretty" (default) or "json"

mod compiler;
mod config;
mod domain;
mod error;
mod inference;
mod logic;
mod openai;
mod protocol;
mod render;
mod routes;
mod state;
mod store;
mod telemetry;
mod util;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // One config object for the whole process; components borrow it through AppState.
  let config = ServerConfig::from_env();
  let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
  let retention = config.retention;

  let state = Arc::new(AppState::new(config)?);

  if let Some(max_age) = retention {
    tokio::spawn(store::run_retention(state.store.clone(), max_age));
  }

  let app = build_router(state);

  let listener = TcpListener::bind(addr).await?;
  info!(target: "worksheet_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  info!(target: "worksheet_backend", "HTTP server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    error!(target: "worksheet_backend", error = %e, "Cannot listen for Ctrl-C; running until killed");
    std::future::pending::<()>().await;
  }
  info!(target: "worksheet_backend", "Shutdown requested");
}
