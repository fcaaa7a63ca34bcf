use anyhow::Result;
use clap::Subcommand;

use super::App;
use crate::config::{AppSettings, KEYS};

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    /// Print the effective settings
    Show,

    /// Change one setting
    Set {
        /// One of githubOwner, githubRepo, defaultIsoUrl, defaultIsoChecksum,
        /// workflowFile, branch
        key: String,
        value: String,
    },

    /// Restore the defaults
    Reset,
}

pub fn run(app: &App, command: SettingsCommand) -> Result<()> {
    match command {
        SettingsCommand::Show => {
            for key in KEYS {
                println!("{key} = {}", app.settings.get(key).unwrap_or_default());
            }
            println!("stateDir = {}", app.state.path().display());
        }
        SettingsCommand::Set { key, value } => {
            let mut settings = AppSettings::stored(&app.state)?;
            settings.set(&key, &value)?;
            settings.save(&app.state)?;
            println!("{key} = {}", settings.get(&key).unwrap_or_default());
        }
        SettingsCommand::Reset => {
            AppSettings::reset(&app.state)?;
            println!("Settings reset to defaults");
        }
    }
    Ok(())
}
