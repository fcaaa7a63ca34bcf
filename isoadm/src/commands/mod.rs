use std::io::{Read, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Args;
use ghclient::RepoRef;
use profile_schema::NodeProfile;
use profile_store::{JsonFileStorage, ProfileStore};

use crate::config::AppSettings;
use crate::state::StateDir;

pub mod answer;
pub mod build;
pub mod github;
pub mod netboot;
pub mod profile;
pub mod settings;
pub mod transfer;

pub struct App {
    pub state: StateDir,
    pub settings: AppSettings,
}

impl App {
    pub fn open_store(&self) -> Result<ProfileStore<JsonFileStorage>> {
        let storage = self.state.profile_storage();
        ProfileStore::open(storage)
            .with_context(|| format!("opening {}", self.state.profiles_file().display()))
    }

    pub fn repo(&self) -> RepoRef {
        RepoRef::new(&self.settings.github_owner, &self.settings.github_repo)
    }
}

/// Profiles named on the command line, or all of them with `--all`.
#[derive(Debug, Clone, Args)]
pub struct Selection {
    /// Profile ids or names
    #[arg(required_unless_present = "all")]
    pub profiles: Vec<String>,

    /// Use every stored profile
    #[arg(long, conflicts_with = "profiles")]
    pub all: bool,
}

impl Selection {
    /// Resolve against `store`, keeping command-line order and dropping
    /// repeats.
    pub fn resolve(&self, store: &ProfileStore<JsonFileStorage>) -> Result<Vec<NodeProfile>> {
        if self.all {
            if store.is_empty() {
                bail!("there are no stored profiles");
            }
            return Ok(store.profiles().to_vec());
        }
        let mut selected: Vec<NodeProfile> = Vec::with_capacity(self.profiles.len());
        for key in &self.profiles {
            let profile = find(store, key)?;
            if !selected.iter().any(|p| p.id == profile.id) {
                selected.push(profile.clone());
            }
        }
        Ok(selected)
    }
}

pub fn find<'a>(store: &'a ProfileStore<JsonFileStorage>, key: &str) -> Result<&'a NodeProfile> {
    store
        .lookup(key)
        .with_context(|| format!("no profile with id or name '{key}'"))
}

/// Read a file, or stdin for `-`.
pub fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("reading stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

/// Write to a file, or stdout when `path` is `None` or `-`.
pub fn write_output(path: Option<&Path>, contents: &str) -> Result<()> {
    match path {
        Some(path) if path != Path::new("-") => {
            std::fs::write(path, contents)
                .with_context(|| format!("writing {}", path.display()))?;
            eprintln!("Wrote {}", path.display());
        }
        _ => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(contents.as_bytes())?;
            if !contents.ends_with('\n') {
                writeln!(stdout)?;
            }
        }
    }
    Ok(())
}
