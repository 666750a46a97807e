//! Persistence of the global model.

use std::{
    io,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tokio::fs;
use tracing::debug;

use crate::model::Model;

/// Errors which can occur when saving or loading a checkpoint.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint I/O failed for `{}`: {}", .path.display(), .source)]
    Io { path: PathBuf, source: io::Error },
    #[error("invalid checkpoint: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A directory of model checkpoints, one per dataset and model.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Gets the checkpoint path of a model, i.e. `<dir>/<dataset>/<model>.ckpt`.
    pub fn path(&self, dataset: &str, model: &str) -> PathBuf {
        self.dir.join(dataset).join(format!("{}.ckpt", model))
    }

    /// Saves a model and returns the path it was saved to.
    pub async fn save(
        &self,
        dataset: &str,
        model_name: &str,
        model: &Model,
    ) -> Result<PathBuf, CheckpointError> {
        let path = self.path(dataset, model_name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| io_error(parent, source))?;
        }

        let json = serde_json::to_vec(model)?;
        fs::write(&path, json)
            .await
            .map_err(|source| io_error(&path, source))?;
        debug!("saved {} parameters to {}", model.len(), path.display());
        Ok(path)
    }

    /// Loads a previously saved model.
    pub async fn load(&self, dataset: &str, model_name: &str) -> Result<Model, CheckpointError> {
        let path = self.path(dataset, model_name);
        let json = fs::read(&path)
            .await
            .map_err(|source| io_error(&path, source))?;
        Ok(serde_json::from_slice(&json)?)
    }
}

fn io_error(path: &Path, source: io::Error) -> CheckpointError {
    CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    }
}
