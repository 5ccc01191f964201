//! Persisted state
//!
//! The whole model as flat relational records. Saved as JSON or TOML, chosen
//! by the file extension. Loading only parses; invariants are checked when
//! the records are handed to [`ReleaseControl::from_snapshot`](crate::service::ReleaseControl::from_snapshot).

use crate::directory::{Group, Member};
use crate::error::StoreError;
use crate::securable::{Document, File, TopLevelObject};
use crate::taxonomy::Classification;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Every record of the model
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub classifications: Vec<Classification>,
    pub groups: Vec<Group>,
    pub members: Vec<Member>,
    pub documents: Vec<Document>,
    pub files: Vec<File>,
    /// Feeds, collectors, scrapers and submissions
    pub objects: Vec<TopLevelObject>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Toml,
}

impl Format {
    fn of(path: &Path) -> Result<Self, StoreError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(Format::Json),
            Some("toml") => Ok(Format::Toml),
            _ => Err(StoreError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

impl Snapshot {
    /// Parse a state file
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let format = Format::of(path)?;
        let text = std::fs::read_to_string(path)?;
        let snapshot: Snapshot = match format {
            Format::Json => serde_json::from_str(&text)?,
            Format::Toml => toml::from_str(&text)?,
        };
        debug!(
            path = %path.display(),
            classifications = snapshot.classifications.len(),
            groups = snapshot.groups.len(),
            documents = snapshot.documents.len(),
            "Loaded state"
        );
        Ok(snapshot)
    }

    /// Parse a state file, or start empty if it does not exist yet
    pub fn load_or_default(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            // Still reject an extension we could never write back
            Format::of(path)?;
            info!(path = %path.display(), "No state file yet, starting empty");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Write the state file, replacing it atomically
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let text = match Format::of(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, text)?;
        std::fs::rename(&tmp, path)?;
        info!(path = %path.display(), "Saved state");
        Ok(())
    }
}
