//! Persistence backends for the profile collection.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use profile_schema::{validate, NodeProfile, ProfileDocument};
use tracing::{debug, info};

use crate::{Result, StoreError};

/// File name of the persisted profile list inside a state directory.
pub const PROFILES_FILE: &str = "profiles.json";

/// Where the store keeps its profiles between runs.
pub trait ProfileStorage {
    fn load(&self) -> Result<Vec<NodeProfile>>;
    fn save(&mut self, profiles: &[NodeProfile]) -> Result<()>;
}

/// A JSON array of profile documents in a single file.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// `profiles.json` inside `state_dir`.
    pub fn in_dir<P: AsRef<Path>>(state_dir: P) -> Self {
        Self::new(state_dir.as_ref().join(PROFILES_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProfileStorage for JsonFileStorage {
    fn load(&self) -> Result<Vec<NodeProfile>> {
        if !self.path.exists() {
            debug!("No profile file at {}, starting empty", self.path.display());
            return Ok(Vec::new());
        }

        let json = fs::read_to_string(&self.path)?;
        let documents: Vec<ProfileDocument> = serde_json::from_str(&json)?;
        let profiles = documents
            .iter()
            .map(|document| {
                validate(document).map_err(|source| StoreError::CorruptProfile {
                    id: document.id.clone(),
                    path: self.path.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        info!("Loaded {} profiles from {}", profiles.len(), self.path.display());
        Ok(profiles)
    }

    fn save(&mut self, profiles: &[NodeProfile]) -> Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let documents: Vec<ProfileDocument> = profiles.iter().map(NodeProfile::to_document).collect();
        let json = serde_json::to_string_pretty(&documents)?;

        // Temp file in the same directory, then rename over the target.
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        debug!("Persisted {} profiles to {}", profiles.len(), self.path.display());
        Ok(())
    }
}

/// Keeps profiles in memory only.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    profiles: Vec<NodeProfile>,
    saves: usize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profiles(profiles: Vec<NodeProfile>) -> Self {
        Self { profiles, saves: 0 }
    }

    pub fn profiles(&self) -> &[NodeProfile] {
        &self.profiles
    }

    /// Number of times the collection was saved.
    pub fn saves(&self) -> usize {
        self.saves
    }
}

impl ProfileStorage for MemoryStorage {
    fn load(&self) -> Result<Vec<NodeProfile>> {
        Ok(self.profiles.clone())
    }

    fn save(&mut self, profiles: &[NodeProfile]) -> Result<()> {
        self.profiles = profiles.to_vec();
        self.saves += 1;
        Ok(())
    }
}
