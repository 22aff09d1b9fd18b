//! Checkpoint recovery and persistence
//!
//! Provides serialization to/from files with versioning.

use serde::{de::DeserializeOwned, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::state::{Checkpoint, CHECKPOINT_VERSION};
use crate::error::CheckpointError;
use crate::policy::traits::Policy;

/// Magic bytes identifying a binary checkpoint
const BINARY_MAGIC: &[u8; 4] = b"DMOE";

/// Format for checkpoint serialization
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CheckpointFormat {
    /// JSON format (human-readable, larger)
    Json,
    /// Binary format (compact, fast)
    #[default]
    Binary,
}

impl CheckpointFormat {
    /// File extension used for this format
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Binary => "ckpt",
        }
    }
}

/// Save a checkpoint to a file
pub fn save_checkpoint<P>(
    checkpoint: &Checkpoint<P>,
    path: impl AsRef<Path>,
    format: CheckpointFormat,
) -> Result<(), CheckpointError>
where
    P: Policy + Serialize,
{
    let path = path.as_ref();
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    match format {
        CheckpointFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, checkpoint)
                .map_err(|e| CheckpointError::Serialization(e.to_string()))?;
        }
        CheckpointFormat::Binary => {
            // Version header, then magic bytes
            writer.write_all(&CHECKPOINT_VERSION.to_le_bytes())?;
            writer.write_all(BINARY_MAGIC)?;
            bincode::serialize_into(&mut writer, checkpoint)
                .map_err(|e| CheckpointError::Serialization(e.to_string()))?;
        }
    }

    writer.flush()?;
    debug!(path = %path.display(), generation = checkpoint.generation, "checkpoint saved");
    Ok(())
}

/// Load a checkpoint from a file
///
/// The format is detected from the header.
pub fn load_checkpoint<P>(path: impl AsRef<Path>) -> Result<Checkpoint<P>, CheckpointError>
where
    P: Policy + DeserializeOwned,
{
    let path = path.as_ref();
    if !path.exists() {
        return Err(CheckpointError::NotFound(path.display().to_string()));
    }

    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let mut header = [0u8; 8];
    let is_binary = reader.read_exact(&mut header).is_ok() && &header[4..8] == BINARY_MAGIC;

    let checkpoint: Checkpoint<P> = if is_binary {
        let version = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        if version > CHECKPOINT_VERSION {
            return Err(CheckpointError::VersionMismatch {
                expected: CHECKPOINT_VERSION,
                found: version,
            });
        }
        bincode::deserialize_from(&mut reader)
            .map_err(|e| CheckpointError::Deserialization(e.to_string()))?
    } else {
        // JSON: re-read from the start
        drop(reader);
        let reader = BufReader::new(File::open(path)?);
        serde_json::from_reader(reader)
            .map_err(|e| CheckpointError::Deserialization(e.to_string()))?
    };

    if !checkpoint.is_compatible() {
        return Err(CheckpointError::VersionMismatch {
            expected: CHECKPOINT_VERSION,
            found: checkpoint.version,
        });
    }
    Ok(checkpoint)
}

/// Checkpoint manager for periodic saving
#[derive(Clone, Debug)]
pub struct CheckpointManager {
    /// Directory for checkpoint files
    pub directory: PathBuf,
    /// Base filename for checkpoints
    pub base_name: String,
    /// Serialization format
    pub format: CheckpointFormat,
    /// How many checkpoints to keep
    pub keep_n: usize,
    /// Save interval (generations)
    pub interval: usize,
    /// Current checkpoint index
    current_index: usize,
}

impl CheckpointManager {
    /// Create a new checkpoint manager
    pub fn new(directory: impl Into<PathBuf>, base_name: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            base_name: base_name.into(),
            format: CheckpointFormat::Binary,
            keep_n: 3,
            interval: 100,
            current_index: 0,
        }
    }

    /// Set the serialization format
    pub fn with_format(mut self, format: CheckpointFormat) -> Self {
        self.format = format;
        self
    }

    /// Set how many checkpoints to keep
    pub fn keep(mut self, n: usize) -> Self {
        self.keep_n = n;
        self
    }

    /// Set the save interval
    pub fn every(mut self, generations: usize) -> Self {
        self.interval = generations;
        self
    }

    /// Check if a checkpoint should be saved at this generation
    pub fn should_save(&self, generation: usize) -> bool {
        self.interval > 0 && generation > 0 && generation % self.interval == 0
    }

    fn path_for(&self, index: usize) -> PathBuf {
        self.directory.join(format!(
            "{}_{:04}.{}",
            self.base_name,
            index,
            self.format.extension()
        ))
    }

    /// Get the path for the current checkpoint
    pub fn current_path(&self) -> PathBuf {
        self.path_for(self.current_index)
    }

    /// Save a checkpoint and rotate old ones
    pub fn save<P>(&mut self, checkpoint: &Checkpoint<P>) -> Result<(), CheckpointError>
    where
        P: Policy + Serialize,
    {
        std::fs::create_dir_all(&self.directory)?;
        save_checkpoint(checkpoint, self.current_path(), self.format)?;

        self.current_index += 1;
        if self.current_index > self.keep_n {
            let old_path = self.path_for(self.current_index - self.keep_n - 1);
            if let Err(e) = std::fs::remove_file(&old_path) {
                warn!(path = %old_path.display(), error = %e, "failed to rotate checkpoint");
            }
        }

        Ok(())
    }

    /// Find and load the newest readable checkpoint
    pub fn load_latest<P>(&self) -> Result<Option<Checkpoint<P>>, CheckpointError>
    where
        P: Policy + DeserializeOwned,
    {
        if !self.directory.exists() {
            return Ok(None);
        }

        let prefix = format!("{}_", self.base_name);
        let suffix = format!(".{}", self.format.extension());
        let mut paths: Vec<PathBuf> = std::fs::read_dir(&self.directory)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .map(|n| n.to_string_lossy())
                    .is_some_and(|n| n.starts_with(&prefix) && n.ends_with(&suffix))
            })
            .collect();

        // Zero-padded indices sort lexically; newest first
        paths.sort();
        paths.reverse();

        for path in paths {
            match load_checkpoint(&path) {
                Ok(checkpoint) => return Ok(Some(checkpoint)),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable checkpoint");
                }
            }
        }

        Ok(None)
    }
}
