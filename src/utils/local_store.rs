//! JSON snapshot on local disk, used when the gateway cannot be reached.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::model::AppState;

/// Bumped whenever the persisted layout changes.
pub const SCHEMA_KEY: &str = "LEAVE_DESK_DB_v2.8";

#[derive(Debug, Error)]
pub enum LocalStoreError {
    #[error("local store I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("local store at {path} is corrupt: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone)]
pub struct LocalStore {
    path: PathBuf,
}

impl LocalStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{SCHEMA_KEY}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` when nothing has been saved yet.
    pub fn load(&self) -> Result<Option<AppState>, LocalStoreError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(LocalStoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| LocalStoreError::Json {
                path: self.path.clone(),
                source,
            })
    }

    /// Writes to a sibling temp file first so a crash never leaves half a snapshot.
    pub fn save(&self, state: &AppState) -> Result<(), LocalStoreError> {
        let io = |source: std::io::Error| LocalStoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(io)?;
        }
        let body = serde_json::to_vec_pretty(state).map_err(|source| LocalStoreError::Json {
            path: self.path.clone(),
            source,
        })?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, body).map_err(io)?;
        std::fs::rename(&tmp, &self.path).map_err(io)
    }
}
