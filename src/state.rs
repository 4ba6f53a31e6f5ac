//! Application state: configuration, artifact store, renderer, and the two
//! external collaborators (inference client, document compiler).
//!
//! Built once in `main` and shared as `Arc<AppState>`. Nothing in here is
//! mutated after startup; requests only share the filesystem.

use std::{io, sync::Arc};

use tracing::{info, instrument, warn};

use crate::compiler::{DocumentCompiler, PdfLatex};
use crate::config::ServerConfig;
use crate::inference::InferenceClient;
use crate::openai::OpenAI;
use crate::render::{Renderer, TemplateLoadError};
use crate::store::ArtifactStore;

pub struct AppState {
    pub config: ServerConfig,
    pub store: ArtifactStore,
    pub renderer: Renderer,
    /// None when no API key is configured; generation then fails with 500.
    pub inference: Option<Arc<dyn InferenceClient>>,
    pub compiler: Arc<dyn DocumentCompiler>,
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("cannot create artifact directories: {0}")]
    Store(#[from] io::Error),
    #[error(transparent)]
    Templates(#[from] TemplateLoadError),
}

impl AppState {
    /// Build state from config: create directories, compile templates, init OpenAI.
    #[instrument(level = "info", skip_all)]
    pub fn new(config: ServerConfig) -> Result<Self, StartupError> {
        let openai = OpenAI::from_config(&config.openai, &config.prompts.system);
        let inference = match openai {
            Some(oa) => {
                info!(target: "worksheet_backend", base_url = %oa.base_url, vision_model = %oa.vision_model, "OpenAI enabled.");
                Some(Arc::new(oa) as Arc<dyn InferenceClient>)
            }
            None => {
                warn!(target: "worksheet_backend", "OpenAI disabled (no OPENAI_API_KEY). Generation requests will fail.");
                None
            }
        };
        let compiler = Arc::new(PdfLatex::new(config.latex_compiler.clone()));
        Self::with_parts(config, inference, compiler)
    }

    /// Same as `new` but with caller-provided collaborators.
    pub fn with_parts(
        config: ServerConfig,
        inference: Option<Arc<dyn InferenceClient>>,
        compiler: Arc<dyn DocumentCompiler>,
    ) -> Result<Self, StartupError> {
        let store = ArtifactStore::open(&config.upload_dir, &config.output_dir)?;
        let renderer = Renderer::load(config.template_dir.as_deref())?;
        info!(
            target: "worksheet_backend",
            uploads = %store.upload_dir().display(),
            outputs = %store.output_dir().display(),
            public_base_url = %config.public_base_url,
            "Artifact store ready"
        );
        Ok(Self {
            config,
            store,
            renderer,
            inference,
            compiler,
        })
    }
}
