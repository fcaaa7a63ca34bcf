use anyhow::{bail, Context, Result};
use config::{Case, Config, Environment, File, FileFormat};
use profile_schema::grammar::parse_http_url;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::state::{write_atomic, StateDir};

pub const DEFAULT_GITHUB_OWNER: &str = "voldigoad3421";
pub const DEFAULT_GITHUB_REPO: &str = "proxmox-deployer";
pub const DEFAULT_ISO_URL: &str = "https://enterprise.proxmox.com/iso/proxmox-ve_8.4-1.iso";
pub const DEFAULT_ISO_CHECKSUM: &str =
    "sha256:c45a30b1c4d3895f4a5c0e80fceee6fd8e7f1f5c6c3e8d9b7a3f2e1c0d9b8a7f";
pub const DEFAULT_WORKFLOW_FILE: &str = "build-proxmox-iso.yml";
pub const DEFAULT_BRANCH: &str = "master";

const ENV_PREFIX: &str = "ISOADM";

/// Keys accepted by `settings set`.
pub const KEYS: [&str; 6] = [
    "githubOwner",
    "githubRepo",
    "defaultIsoUrl",
    "defaultIsoChecksum",
    "workflowFile",
    "branch",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    #[serde(alias = "githubowner")]
    pub github_owner: String,
    #[serde(alias = "githubrepo")]
    pub github_repo: String,
    #[serde(alias = "defaultisourl")]
    pub default_iso_url: String,
    #[serde(alias = "defaultisochecksum")]
    pub default_iso_checksum: String,
    #[serde(alias = "workflowfile")]
    pub workflow_file: String,
    pub branch: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            github_owner: DEFAULT_GITHUB_OWNER.to_string(),
            github_repo: DEFAULT_GITHUB_REPO.to_string(),
            default_iso_url: DEFAULT_ISO_URL.to_string(),
            default_iso_checksum: DEFAULT_ISO_CHECKSUM.to_string(),
            workflow_file: DEFAULT_WORKFLOW_FILE.to_string(),
            branch: DEFAULT_BRANCH.to_string(),
        }
    }
}

impl AppSettings {
    /// Effective settings: defaults, then `settings.json`, then `ISOADM_*`
    /// environment variables (`ISOADM_GITHUB_OWNER` and so on).
    pub fn load(state: &StateDir) -> Result<Self> {
        Self::layered(state, true)
    }

    /// Settings as stored on disk, without environment overrides.
    pub fn stored(state: &StateDir) -> Result<Self> {
        Self::layered(state, false)
    }

    fn layered(state: &StateDir, with_env: bool) -> Result<Self> {
        let defaults = Self::default();
        let mut builder = Config::builder()
            .set_default("githubOwner", defaults.github_owner)?
            .set_default("githubRepo", defaults.github_repo)?
            .set_default("defaultIsoUrl", defaults.default_iso_url)?
            .set_default("defaultIsoChecksum", defaults.default_iso_checksum)?
            .set_default("workflowFile", defaults.workflow_file)?
            .set_default("branch", defaults.branch)?
            .add_source(
                File::from(state.settings_file())
                    .format(FileFormat::Json)
                    .required(false),
            );
        if with_env {
            builder = builder.add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .convert_case(Case::Camel),
            );
        }

        let settings: Self = builder
            .build()
            .context("loading settings")?
            .try_deserialize()
            .context("invalid settings")?;
        debug!(?settings, "Loaded settings");
        Ok(settings)
    }

    pub fn save(&self, state: &StateDir) -> Result<()> {
        write_atomic(&state.settings_file(), &serde_json::to_string_pretty(self)?)?;
        info!("Saved settings to {}", state.settings_file().display());
        Ok(())
    }

    /// Restore the defaults on disk.
    pub fn reset(state: &StateDir) -> Result<Self> {
        let settings = Self::default();
        settings.save(state)?;
        Ok(settings)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        let value = match key {
            "githubOwner" => &self.github_owner,
            "githubRepo" => &self.github_repo,
            "defaultIsoUrl" => &self.default_iso_url,
            "defaultIsoChecksum" => &self.default_iso_checksum,
            "workflowFile" => &self.workflow_file,
            "branch" => &self.branch,
            _ => return None,
        };
        Some(value)
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        if value.is_empty() && key != "defaultIsoChecksum" {
            bail!("{key} cannot be empty");
        }
        if key == "defaultIsoUrl" && parse_http_url(value).is_none() {
            bail!("defaultIsoUrl must be an http(s) URL, got '{value}'");
        }
        let slot = match key {
            "githubOwner" => &mut self.github_owner,
            "githubRepo" => &mut self.github_repo,
            "defaultIsoUrl" => &mut self.default_iso_url,
            "defaultIsoChecksum" => &mut self.default_iso_checksum,
            "workflowFile" => &mut self.workflow_file,
            "branch" => &mut self.branch,
            _ => bail!("unknown setting '{key}' (expected one of: {})", KEYS.join(", ")),
        };
        *slot = value.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> (tempfile::TempDir, StateDir) {
        let dir = tempfile::tempdir().unwrap();
        let state = StateDir::resolve(Some(dir.path().to_path_buf())).unwrap();
        (dir, state)
    }

    #[test]
    fn test_defaults_without_file() {
        let (_dir, state) = state();
        assert_eq!(AppSettings::stored(&state).unwrap(), AppSettings::default());
    }

    #[test]
    fn test_partial_file_is_merged_with_defaults() {
        let (_dir, state) = state();
        std::fs::write(
            state.settings_file(),
            r#"{ "githubOwner": "zion-ops", "branch": "main" }"#,
        )
        .unwrap();

        let settings = AppSettings::stored(&state).unwrap();
        assert_eq!(settings.github_owner, "zion-ops");
        assert_eq!(settings.branch, "main");
        assert_eq!(settings.github_repo, DEFAULT_GITHUB_REPO);
        assert_eq!(settings.workflow_file, DEFAULT_WORKFLOW_FILE);
    }

    #[test]
    fn test_set_save_reset() {
        let (_dir, state) = state();
        let mut settings = AppSettings::stored(&state).unwrap();
        settings.set("githubRepo", "deployer").unwrap();
        settings.save(&state).unwrap();
        assert_eq!(AppSettings::stored(&state).unwrap().github_repo, "deployer");

        assert!(settings.set("githubrepo", "x").is_err());
        assert!(settings.set("defaultIsoUrl", "ftp://mirror/pve.iso").is_err());
        assert!(settings.set("branch", " ").is_err());

        AppSettings::reset(&state).unwrap();
        assert_eq!(AppSettings::stored(&state).unwrap(), AppSettings::default());
    }

    #[test]
    fn test_get_knows_every_key() {
        let settings = AppSettings::default();
        for key in KEYS {
            assert!(settings.get(key).is_some(), "{key}");
        }
        assert_eq!(settings.get("branch"), Some(DEFAULT_BRANCH));
    }
}
