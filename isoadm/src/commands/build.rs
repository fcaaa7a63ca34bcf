use std::path::PathBuf;

use answerfile::{build_request_issue_url, render_manifest, BuildOptions, IsoSource};
use anyhow::Result;
use clap::{Args, Subcommand};

use super::{write_output, App, Selection};
use crate::config::AppSettings;

#[derive(Debug, Subcommand)]
pub enum BuildCommand {
    /// Print the build manifest for the selected profiles
    Manifest {
        #[command(flatten)]
        selection: Selection,

        #[command(flatten)]
        iso: IsoArgs,

        /// Ask the pipeline to publish a release
        #[arg(long)]
        publish: bool,

        /// Tag of the published release
        #[arg(long, requires = "publish")]
        tag: Option<String>,

        /// Output file, stdout if omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print a link to a pre-filled build request issue
    IssueUrl {
        #[command(flatten)]
        selection: Selection,

        #[command(flatten)]
        iso: IsoArgs,
    },
}

/// Which stock ISO the build starts from; the configured default URL
/// unless overridden.
#[derive(Debug, Clone, Args)]
pub struct IsoArgs {
    /// Use the ISO attached to this release of the build repository
    #[arg(long, conflicts_with_all = ["iso_url", "checksum"])]
    pub release_tag: Option<String>,

    /// Download the ISO from this URL
    #[arg(long)]
    pub iso_url: Option<String>,

    /// Checksum of the ISO at --iso-url
    #[arg(long, requires = "iso_url")]
    pub checksum: Option<String>,
}

impl IsoArgs {
    pub fn source(&self, settings: &AppSettings) -> IsoSource {
        if let Some(release_tag) = &self.release_tag {
            return IsoSource::Release {
                release_tag: release_tag.clone(),
            };
        }
        match &self.iso_url {
            Some(url) => IsoSource::Url {
                url: url.clone(),
                checksum: self.checksum.clone(),
            },
            None => IsoSource::Url {
                url: settings.default_iso_url.clone(),
                checksum: Some(settings.default_iso_checksum.clone())
                    .filter(|c| !c.is_empty()),
            },
        }
    }
}

pub fn run(app: &App, command: BuildCommand) -> Result<()> {
    match command {
        BuildCommand::Manifest {
            selection,
            iso,
            publish,
            tag,
            output,
        } => {
            let store = app.open_store()?;
            let profiles = selection.resolve(&store)?;
            let names: Vec<&str> = profiles.iter().map(|p| p.name.as_str()).collect();
            let options = BuildOptions {
                publish_release: publish,
                release_tag: tag,
            };
            let manifest = render_manifest(&names, &iso.source(&app.settings), &options)?;
            write_output(output.as_deref(), &manifest.to_json()?)
        }
        BuildCommand::IssueUrl { selection, iso } => {
            let store = app.open_store()?;
            let profiles = selection.resolve(&store)?;
            let url = build_request_issue_url(
                &app.settings.github_owner,
                &app.settings.github_repo,
                &profiles,
                &iso.source(&app.settings),
            )?;
            println!("{url}");
            Ok(())
        }
    }
}
