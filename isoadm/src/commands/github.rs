use std::collections::HashMap;

use answerfile::{file_stem, workflow_inputs};
use anyhow::{bail, Context, Result};
use clap::Subcommand;
use ghclient::{DeviceFlow, FileToPush, GitHubClient, GitHubError};
use profile_schema::NodeProfile;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::build::IsoArgs;
use super::{App, Selection};
use crate::state::Credentials;

/// Directory of the build repository holding one JSON file per profile.
pub const PROFILES_DIR: &str = "profiles";

#[derive(Debug, Subcommand)]
pub enum GithubCommand {
    /// Authorize isoadm through the GitHub device flow
    Login {
        /// OAuth app client id; remembered for later logins
        #[arg(long)]
        client_id: Option<String>,
    },

    /// Forget the stored token
    Logout,

    /// Show the account the stored token belongs to
    Whoami,

    /// Commit profile documents to the build repository
    Push {
        #[command(flatten)]
        selection: Selection,
    },

    /// Push profiles and start the ISO build workflow for them
    Dispatch {
        #[command(flatten)]
        selection: Selection,

        #[command(flatten)]
        iso: IsoArgs,
    },

    /// List recent runs of the build workflow
    Runs {
        #[arg(short, long, default_value_t = 10)]
        limit: u32,
    },

    /// List the artifacts of a workflow run
    Artifacts {
        run_id: u64,
    },
}

pub async fn run(app: &App, command: GithubCommand) -> Result<()> {
    match command {
        GithubCommand::Login { client_id } => login(app, client_id).await,
        GithubCommand::Logout => {
            let mut creds = Credentials::load(&app.state)?;
            creds.logout();
            creds.save(&app.state)?;
            println!("Logged out");
            Ok(())
        }
        GithubCommand::Whoami => {
            let mut creds = Credentials::load(&app.state)?;
            let user = client(&creds)?.verify_token().await?;
            match &user.name {
                Some(name) => println!("{} ({name})", user.login),
                None => println!("{}", user.login),
            }
            creds.user = Some(user);
            creds.save(&app.state)
        }
        GithubCommand::Push { selection } => {
            let client = client(&Credentials::load(&app.state)?)?;
            let profiles = selection.resolve(&app.open_store()?)?;
            push(app, &client, &profiles).await
        }
        GithubCommand::Dispatch { selection, iso } => {
            let client = client(&Credentials::load(&app.state)?)?;
            let profiles = selection.resolve(&app.open_store()?)?;
            let names: Vec<&str> = profiles.iter().map(|p| p.name.as_str()).collect();
            let inputs = workflow_inputs(&names, &iso.source(&app.settings))?;

            push(app, &client, &profiles).await?;
            client
                .trigger_workflow(
                    &app.repo(),
                    &app.settings.workflow_file,
                    &app.settings.branch,
                    &inputs,
                )
                .await?;
            println!(
                "Started {} on {} for {}",
                app.settings.workflow_file,
                app.repo(),
                names.join(", ")
            );
            Ok(())
        }
        GithubCommand::Runs { limit } => {
            let client = client(&Credentials::load(&app.state)?)?;
            let runs = client
                .workflow_runs(&app.repo(), &app.settings.workflow_file, limit)
                .await?;
            if runs.is_empty() {
                println!("No runs of {}", app.settings.workflow_file);
            }
            for run in runs {
                println!(
                    "{:<12} {:<20} {:<12} {:<10} {}",
                    run.id,
                    run.created_at,
                    run.status,
                    run.conclusion.as_deref().unwrap_or("-"),
                    run.html_url
                );
            }
            Ok(())
        }
        GithubCommand::Artifacts { run_id } => {
            let client = client(&Credentials::load(&app.state)?)?;
            let artifacts = client.run_artifacts(&app.repo(), run_id).await?;
            if artifacts.is_empty() {
                println!("Run {run_id} has no artifacts");
            }
            for artifact in artifacts {
                println!(
                    "{:<40} {:>12} {}",
                    artifact.name, artifact.size_in_bytes, artifact.archive_download_url
                );
            }
            Ok(())
        }
    }
}

fn client(creds: &Credentials) -> Result<GitHubClient> {
    match &creds.token {
        Some(token) => Ok(GitHubClient::new(token.clone())),
        None => Err(GitHubError::NotAuthenticated.into()),
    }
}

async fn login(app: &App, client_id: Option<String>) -> Result<()> {
    let mut creds = Credentials::load(&app.state)?;
    let client_id = client_id
        .or_else(|| creds.client_id.clone())
        .context("no OAuth client id configured; pass --client-id")?;

    let flow = DeviceFlow::new(client_id.clone());
    let code = flow.request_device_code().await?;
    println!(
        "Open {} and enter the code {}",
        code.verification_uri, code.user_code
    );

    let cancel = CancellationToken::new();
    let on_ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };
    let token = flow.poll_for_token(&code, &cancel).await;
    on_ctrl_c.abort();
    let token = token?;

    let user = GitHubClient::new(token.clone()).verify_token().await?;
    info!("Logged in as {}", user.login);
    println!("Logged in as {}", user.login);

    creds.token = Some(token);
    creds.user = Some(user);
    creds.client_id = Some(client_id);
    creds.save(&app.state)
}

/// One file per profile, as stored, named after the profile.
pub fn profile_files(profiles: &[NodeProfile]) -> Result<Vec<FileToPush>> {
    let mut owners: HashMap<String, &str> = HashMap::new();
    let mut files = Vec::with_capacity(profiles.len());
    for profile in profiles {
        let path = format!("{PROFILES_DIR}/{}.json", file_stem(&profile.name));
        if let Some(other) = owners.insert(path.clone(), &profile.name) {
            bail!(
                "profiles '{other}' and '{}' would both be pushed as {path}",
                profile.name
            );
        }
        files.push(FileToPush {
            path,
            content: profile.to_document().to_json()?,
        });
    }
    Ok(files)
}

pub fn commit_message(profiles: &[NodeProfile]) -> String {
    let names: Vec<&str> = profiles.iter().map(|p| p.name.as_str()).collect();
    format!("Update profiles: {}\n\nPushed from isoadm", names.join(", "))
}

async fn push(app: &App, client: &GitHubClient, profiles: &[NodeProfile]) -> Result<()> {
    let repo = app.repo();
    if !client.check_repo_access(&repo).await? {
        bail!("the stored token cannot access {repo}");
    }
    let files = profile_files(profiles)?;
    debug!(files = files.len(), %repo, "Pushing profiles");
    let commit = client
        .push_files(&repo, &files, &commit_message(profiles), &app.settings.branch)
        .await?;
    println!("Pushed {} profiles to {repo}@{} ({commit})", files.len(), app.settings.branch);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use profile_schema::{validate, ProfileDocument};

    fn profile(name: &str) -> NodeProfile {
        let document = ProfileDocument::from_json(&format!(
            r#"{{
                "id": "profile-{name}",
                "name": "{name}",
                "global": {{
                    "keyboard": "en-us", "country": "us",
                    "fqdn": "node.zion.local", "mailto": "ops@zion.local",
                    "timezone": "UTC", "rootPassword": "{{{{ROOT_PASSWORD}}}}"
                }},
                "network": {{ "source": "from-dhcp" }},
                "diskSetup": {{ "filesystem": "ext4" }},
                "createdAt": "2024-01-15T10:00:00.000Z",
                "updatedAt": "2024-01-15T10:00:00.000Z"
            }}"#
        ))
        .unwrap();
        validate(&document).unwrap()
    }

    #[test]
    fn test_profile_files() {
        let files = profile_files(&[profile("trinity"), profile("neo")]).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, "profiles/trinity.json");
        assert_eq!(files[1].path, "profiles/neo.json");

        let pushed = ProfileDocument::from_json(&files[0].content).unwrap();
        assert_eq!(pushed.name, "trinity");
        assert_eq!(pushed.global.root_password.as_deref(), Some("{{ROOT_PASSWORD}}"));
    }

    #[test]
    fn test_profile_files_stay_in_profiles_dir() {
        let files = profile_files(&[profile("../workflows/build")]).unwrap();
        assert_eq!(files[0].path, "profiles/-.-workflows-build.json");

        let err = profile_files(&[profile("rack a"), profile("rack/a")]).unwrap_err();
        assert!(err.to_string().contains("profiles/rack-a.json"));
    }

    #[test]
    fn test_commit_message() {
        assert_eq!(
            commit_message(&[profile("trinity"), profile("neo")]),
            "Update profiles: trinity, neo\n\nPushed from isoadm"
        );
    }

    #[test]
    fn test_missing_token() {
        let err = client(&Credentials::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GitHubError>(),
            Some(GitHubError::NotAuthenticated)
        ));
    }
}
