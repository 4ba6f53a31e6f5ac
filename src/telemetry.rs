//! Log setup for the worksheet service.
//!
//! Targets:
//!   - `worksheet`: per-request pipeline (upload, render, compile, artifact lookups)
//!   - `worksheet_backend`: startup, template overrides, retention sweeps;
//!     `worksheet_backend::openai` carries model latency and token usage
//!   - `tower_http`: one span per HTTP request from the TraceLayer
//!
//! `LOG_LEVEL` replaces the default filter with full directives;
//! `LOG_FORMAT=json` switches to one JSON object per line.

use tracing_subscriber::EnvFilter;

/// Pipeline detail at debug, everything else at info.
const DEFAULT_FILTER: &str = "info,worksheet=debug,worksheet_backend=debug,tower_http=info,axum=info";

pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    // the two builders have different types, so each arm calls init itself
    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => {
            builder.json().init();
        }
        _ => {
            builder.init();
        }
    }
}
