//! Upload scratch space and rendered artifact storage

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::config::StorageConfig;

// helper.
macro_rules! regex {
    ($re:literal $(,)?) => {{
        static RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
        RE.get_or_init(|| regex::Regex::new($re).unwrap())
    }};
}

/// Owns the upload and output directories
#[derive(Debug, Clone)]
pub struct Storage {
    upload_dir: PathBuf,
    output_dir: PathBuf,
}

impl Storage {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            upload_dir: config.upload_dir.clone(),
            output_dir: config.output_dir.clone(),
        }
    }

    /// Create both directories if they do not exist yet.
    pub async fn prepare(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.upload_dir).await?;
        tokio::fs::create_dir_all(&self.output_dir).await?;
        Ok(())
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Allocate a fresh per-request directory under the upload dir.
    pub async fn scratch_dir(&self) -> std::io::Result<ScratchDir> {
        let path = self.upload_dir.join(Uuid::new_v4().simple().to_string());
        tokio::fs::create_dir_all(&path).await?;
        Ok(ScratchDir { path })
    }

    /// Pick a unique artifact name derived from the main upload's name.
    pub fn artifact_name(&self, main_file_name: &str) -> String {
        let sanitized = sanitize_file_name(main_file_name);
        let stem = Path::new(&sanitized)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("mix");
        let id = Uuid::new_v4().simple().to_string();
        format!("{}-{}.aac", stem, &id[..8])
    }

    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.output_dir.join(name)
    }

    /// Map a download identifier to an existing artifact file.
    ///
    /// Returns `None` for anything that is not a plain file name.
    pub async fn resolve_artifact(&self, name: &str) -> Option<PathBuf> {
        if !is_valid_artifact_name(name) {
            return None;
        }
        let path = self.output_dir.join(name);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Some(path),
            _ => None,
        }
    }
}

/// Whether `name` is a bare file name safe to join onto the output dir.
pub fn is_valid_artifact_name(name: &str) -> bool {
    regex!(r"^[A-Za-z0-9._-]+$").is_match(name) && !name.starts_with('.')
}

/// Reduce an uploaded file name to `[A-Za-z0-9._-]`, dropping any directory
/// part.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

/// A request's upload directory, removed when dropped
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = ?self.path, error = %e, "failed to remove upload dir");
            }
        }
    }
}
