use std::fs::create_dir_all;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ghclient::GitHubUser;
use platform_dirs::AppDirs;
use profile_store::{JsonFileStorage, PROFILES_FILE};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const APP_NAME: &str = "isoadm";
pub const SETTINGS_FILE: &str = "settings.json";
pub const AUTH_FILE: &str = "auth.json";

#[derive(Debug, Error)]
pub enum StateError {
    #[error("could not determine a configuration directory; pass --state-dir")]
    NoAppDir,
}

/// Per-user directory holding profiles, settings and GitHub credentials.
#[derive(Debug, Clone)]
pub struct StateDir {
    root: PathBuf,
}

impl StateDir {
    /// Use `dir` if given, else the platform config directory for isoadm.
    pub fn resolve(dir: Option<PathBuf>) -> Result<Self> {
        let root = match dir {
            Some(dir) => dir,
            None => {
                AppDirs::new(Some(APP_NAME), false)
                    .ok_or(StateError::NoAppDir)?
                    .config_dir
            }
        };
        create_dir_all(&root)
            .with_context(|| format!("creating state directory {}", root.display()))?;
        debug!("Using state directory {}", root.display());
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn profiles_file(&self) -> PathBuf {
        self.root.join(PROFILES_FILE)
    }

    pub fn settings_file(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE)
    }

    pub fn auth_file(&self) -> PathBuf {
        self.root.join(AUTH_FILE)
    }

    pub fn profile_storage(&self) -> JsonFileStorage {
        JsonFileStorage::in_dir(&self.root)
    }
}

/// Replace `path` with `contents` through a temp file in the same directory.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temporary file in {}", dir.display()))?;
    tmp.write_all(contents.as_bytes())?;
    tmp.persist(path)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// GitHub login state. Only the `github` commands read or write it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<GitHubUser>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

impl Credentials {
    pub fn load(state: &StateDir) -> Result<Self> {
        let path = state.auth_file();
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn save(&self, state: &StateDir) -> Result<()> {
        write_atomic(&state.auth_file(), &serde_json::to_string_pretty(self)?)
    }

    /// Forget the token and user; the OAuth client id stays configured.
    pub fn logout(&mut self) {
        self.token = None;
        self.user = None;
    }
}
