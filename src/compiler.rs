//! LaTeX → PDF compilation through an external executable.
//!
//! The compiler runs inside a private temporary directory; the PDF is copied
//! into the output directory only after a zero exit status, and lands there
//! through a rename, so a failed run never leaves a `.pdf` at the expected path.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, instrument};

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("cannot run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// Compiler output is logged, never returned to the client.
    #[error("{program} failed with {status}")]
    Failed { program: String, status: String },

    #[error("compiler produced no output at {}", path.display())]
    MissingOutput { path: PathBuf },

    #[error("compiler workspace error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait DocumentCompiler: Send + Sync {
    /// Compile `source_path` and place `<stem>.pdf` in `output_dir`.
    async fn compile(&self, source_path: &Path, output_dir: &Path) -> Result<PathBuf, CompileError>;
}

/// `pdflatex` (or any compatible engine) invoked non-interactively.
#[derive(Clone, Debug)]
pub struct PdfLatex {
    program: String,
}

impl PdfLatex {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl DocumentCompiler for PdfLatex {
    #[instrument(level = "info", skip(self), fields(program = %self.program, source = %source_path.display()))]
    async fn compile(&self, source_path: &Path, output_dir: &Path) -> Result<PathBuf, CompileError> {
        let workdir = tempfile::TempDir::with_prefix("latex")?;
        let start = std::time::Instant::now();
        let output = Command::new(&self.program)
            .arg("-interaction=nonstopmode")
            .arg("-halt-on-error")
            .arg("-output-directory")
            .arg(workdir.path())
            .arg(source_path)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| CompileError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        debug!(
            target: "worksheet",
            stdout = %String::from_utf8_lossy(&output.stdout),
            stderr = %String::from_utf8_lossy(&output.stderr),
            "Compiler output"
        );
        if !output.status.success() {
            return Err(CompileError::Failed {
                program: self.program.clone(),
                status: output.status.to_string(),
            });
        }

        let stem = source_path.file_stem().unwrap_or_default();
        let produced = workdir.path().join(stem).with_extension("pdf");
        if !produced.is_file() {
            return Err(CompileError::MissingOutput { path: produced });
        }
        let target = output_dir.join(stem).with_extension("pdf");
        publish(&produced, &target).await?;
        info!(target: "worksheet", elapsed = ?start.elapsed(), pdf = %target.display(), "PDF compiled");
        Ok(target)
    }
}

/// Copy `produced` next to `target` under a hidden name, then rename into place,
/// so `target` is either absent or complete.
async fn publish(produced: &Path, target: &Path) -> std::io::Result<()> {
    let mut partial = target.as_os_str().to_owned();
    partial.push(".partial");
    let partial = PathBuf::from(partial);
    let result = match tokio::fs::copy(produced, &partial).await {
        Ok(_) => tokio::fs::rename(&partial, target).await,
        Err(e) => Err(e),
    };
    if result.is_err() {
        let _ = tokio::fs::remove_file(&partial).await;
    }
    result
}
