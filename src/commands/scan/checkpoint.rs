use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::model::{Checkpoint, Record};
use crate::util::{fingerprint, now_utc_string, write_json_pretty};

#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
    source: String,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>, source: &Path) -> Self {
        Self {
            path: path.into(),
            source: source.display().to_string(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self, identifiers: &[String]) -> Option<Checkpoint> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no checkpoint present");
            return None;
        }

        let checkpoint = match read_checkpoint(&self.path) {
            Ok(checkpoint) => checkpoint,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "ignoring unreadable checkpoint");
                return None;
            }
        };

        if checkpoint.filename != self.source {
            warn!(
                saved_for = %checkpoint.filename,
                current = %self.source,
                "ignoring checkpoint saved for another spreadsheet"
            );
            return None;
        }

        if checkpoint.hash != fingerprint(identifiers) {
            warn!(path = %self.path.display(), "ignoring stale checkpoint, identifier list changed");
            return None;
        }

        if checkpoint.index > identifiers.len() {
            warn!(
                index = checkpoint.index,
                total = identifiers.len(),
                "ignoring checkpoint with cursor past the identifier list"
            );
            return None;
        }

        info!(
            path = %self.path.display(),
            cursor = checkpoint.index,
            total = identifiers.len(),
            records = checkpoint.items.len(),
            "resuming from checkpoint"
        );
        Some(checkpoint)
    }

    pub fn snapshot(&self, identifiers: &[String], cursor: usize, items: Vec<Record>) -> Checkpoint {
        Checkpoint {
            filename: self.source.clone(),
            hash: fingerprint(identifiers),
            index: cursor,
            cells: identifiers.to_vec(),
            items,
            saved_at: Some(now_utc_string()),
        }
    }

    pub fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        write_json_pretty(&self.path, checkpoint)
            .with_context(|| format!("failed to save checkpoint {}", self.path.display()))?;
        info!(
            path = %self.path.display(),
            cursor = checkpoint.index,
            records = checkpoint.items.len(),
            "saved checkpoint"
        );
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "removed checkpoint");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err)
                .with_context(|| format!("failed to remove checkpoint {}", self.path.display())),
        }
    }
}

pub fn read_checkpoint(path: &Path) -> Result<Checkpoint> {
    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("failed to parse {}", path.display()))
}
