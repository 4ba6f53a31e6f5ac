//! Artifact store: the uploads directory and the outputs directory.
//!
//! Every request gets a short random id; files are named `<id>.<ext>`.
//! Nothing is deduplicated. Files only go away through `sweep_expired`.

use std::{
    io,
    path::{Component, Path, PathBuf},
    time::{Duration, SystemTime},
};

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::util::image_format;

/// Opaque per-request token that namespaces the stored files.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    /// `<id>.<ext>`
    pub fn filename(&self, ext: &str) -> String {
        format!("{}.{}", self.0, ext)
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug)]
pub struct ArtifactStore {
    upload_dir: PathBuf,
    output_dir: PathBuf,
}

impl ArtifactStore {
    /// Open the store, creating both directories if absent.
    pub fn open(upload_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> io::Result<Self> {
        let store = Self {
            upload_dir: upload_dir.into(),
            output_dir: output_dir.into(),
        };
        std::fs::create_dir_all(&store.upload_dir)?;
        std::fs::create_dir_all(&store.output_dir)?;
        Ok(store)
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Eight hex chars of a v4 UUID.
    pub fn reserve_id(&self) -> RequestId {
        let mut id = Uuid::new_v4().simple().to_string();
        id.truncate(8);
        RequestId(id)
    }

    /// Persist the uploaded image; the extension follows the sniffed or declared image type.
    #[instrument(level = "debug", skip(self, bytes), fields(%id, len = bytes.len()))]
    pub async fn save_upload(
        &self,
        id: &RequestId,
        bytes: &[u8],
        content_type: Option<&str>,
    ) -> io::Result<PathBuf> {
        let format = image_format(bytes, content_type);
        let path = self.upload_dir.join(id.filename(format.extension));
        tokio::fs::write(&path, bytes).await?;
        debug!(target: "worksheet", path = %path.display(), mime = %format.mime, "Upload saved");
        Ok(path)
    }

    /// Write a finished document into the outputs directory.
    #[instrument(level = "debug", skip(self, bytes), fields(%filename, len = bytes.len()))]
    pub async fn save_output(&self, filename: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let path = self.output_path(filename);
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Where `filename` lives (or would live) in the outputs directory.
    pub fn output_path(&self, filename: &str) -> PathBuf {
        self.output_dir.join(filename)
    }

    /// Existing output file by bare name. Names with separators or `..` never resolve.
    pub async fn resolve_output(&self, filename: &str) -> Option<PathBuf> {
        let mut components = Path::new(filename).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => {}
            _ => return None,
        }
        let path = self.output_path(filename);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Some(path),
            _ => None,
        }
    }

    /// Delete regular files in both directories modified longer than `max_age` ago.
    /// Returns how many were removed; individual failures are logged and skipped.
    #[instrument(level = "debug", skip(self))]
    pub async fn sweep_expired(&self, max_age: Duration) -> io::Result<usize> {
        let cutoff = SystemTime::now()
            .checked_sub(max_age)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let mut removed = 0;
        for dir in [&self.upload_dir, &self.output_dir] {
            let mut entries = tokio::fs::read_dir(dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let meta = match entry.metadata().await {
                    Ok(m) if m.is_file() => m,
                    _ => continue,
                };
                let expired = meta.modified().map(|t| t <= cutoff).unwrap_or(false);
                if !expired {
                    continue;
                }
                match tokio::fs::remove_file(entry.path()).await {
                    Ok(()) => removed += 1,
                    Err(e) => {
                        warn!(target: "worksheet", path = %entry.path().display(), error = %e, "Could not evict artifact")
                    }
                }
            }
        }
        Ok(removed)
    }
}

/// Background eviction: sweep every `min(max_age, 1h)` for as long as the process runs.
pub async fn run_retention(store: ArtifactStore, max_age: Duration) {
    let period = max_age.min(Duration::from_secs(3600)).max(Duration::from_secs(1));
    let mut ticker = tokio::time::interval(period);
    info!(target: "worksheet_backend", ?max_age, ?period, "Artifact retention enabled");
    loop {
        ticker.tick().await;
        match store.sweep_expired(max_age).await {
            Ok(0) => {}
            Ok(removed) => info!(target: "worksheet_backend", removed, "Evicted expired artifacts"),
            Err(e) => warn!(target: "worksheet_backend", error = %e, "Artifact sweep failed"),
        }
    }
}
