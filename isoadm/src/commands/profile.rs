use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use profile_schema::{validate, NodeProfile, ProfileDocument};
use serde_json::{Map, Value};

use super::{find, read_input, App};

#[derive(Debug, Subcommand)]
pub enum ProfileCommand {
    /// List stored profiles
    List,

    /// Print a profile as JSON
    Show {
        /// Profile id or name
        profile: String,
    },

    /// Add a profile from a JSON document
    Add {
        /// Profile document, `-` for stdin
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Merge the top-level fields of a JSON object into a profile
    Update {
        /// Profile id or name
        profile: String,

        /// JSON object with the fields to replace, `-` for stdin
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Delete a profile
    Delete {
        /// Profile id or name
        profile: String,
    },

    /// Copy a profile under a new id and "<name> (copy)"
    Duplicate {
        /// Profile id or name
        profile: String,
    },

    /// Check a profile document without storing it
    Validate {
        /// Profile document, `-` for stdin
        #[arg(short, long)]
        file: PathBuf,
    },
}

pub fn run(app: &App, command: ProfileCommand) -> Result<()> {
    match command {
        ProfileCommand::List => list(app),
        ProfileCommand::Show { profile } => {
            let store = app.open_store()?;
            println!("{}", find(&store, &profile)?.to_document().to_json()?);
            Ok(())
        }
        ProfileCommand::Add { file } => {
            let draft = read_document(&file)?;
            let mut store = app.open_store()?;
            let profile = store.add(draft)?;
            println!("Added {} ({})", profile.name, profile.id);
            Ok(())
        }
        ProfileCommand::Update { profile, file } => {
            let text = read_input(&file)?;
            let patch: Map<String, Value> = serde_json::from_str(&text)
                .with_context(|| format!("{} is not a JSON object", file.display()))?;
            let mut store = app.open_store()?;
            let id = find(&store, &profile)?.id.clone();
            let updated = store.update(&id, patch)?;
            println!("Updated {} ({})", updated.name, updated.id);
            Ok(())
        }
        ProfileCommand::Delete { profile } => {
            let mut store = app.open_store()?;
            let id = store
                .lookup(&profile)
                .map(|p| p.id.clone())
                .unwrap_or(profile);
            if store.delete(&id)? {
                println!("Deleted {id}");
            } else {
                println!("No profile {id}, nothing to delete");
            }
            Ok(())
        }
        ProfileCommand::Duplicate { profile } => {
            let mut store = app.open_store()?;
            let id = find(&store, &profile)?.id.clone();
            let copy = store.duplicate(&id)?;
            println!("Added {} ({})", copy.name, copy.id);
            Ok(())
        }
        ProfileCommand::Validate { file } => {
            let document = read_document(&file)?;
            match validate(&document) {
                Ok(profile) => {
                    println!("{} is valid", profile.name);
                    Ok(())
                }
                Err(errors) => {
                    eprintln!("{:?}", miette::Report::new(errors));
                    bail!("{} is not a valid profile", file.display())
                }
            }
        }
    }
}

fn read_document(file: &Path) -> Result<ProfileDocument> {
    let text = read_input(file)?;
    ProfileDocument::from_json(&text)
        .with_context(|| format!("{} is not a profile document", file.display()))
}

fn list(app: &App) -> Result<()> {
    let store = app.open_store()?;
    if store.is_empty() {
        println!("No profiles. Add one with `isoadm profile add --file <profile.json>`.");
        return Ok(());
    }
    println!(
        "{:<34} {:<24} {:<32} {:<6} {}",
        "ID", "NAME", "FQDN", "FS", "NETWORK"
    );
    for profile in store.profiles() {
        println!("{}", row(profile));
    }
    Ok(())
}

fn row(profile: &NodeProfile) -> String {
    format!(
        "{:<34} {:<24} {:<32} {:<6} {}",
        profile.id,
        profile.name,
        profile.global.fqdn,
        profile.disk_setup.options.filesystem(),
        profile.network.source()
    )
}
