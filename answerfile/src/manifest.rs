//! Build requests handed to the ISO build pipeline.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use profile_schema::grammar::parse_http_url;
use profile_schema::NodeProfile;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{RenderError, Result};

pub const MANIFEST_VERSION: &str = "1.0";
pub const MANIFEST_FILE_NAME: &str = "build-manifest.json";
pub const BUILD_REQUEST_LABEL: &str = "build-request";

/// Where the build pipeline gets the stock Proxmox VE ISO from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum IsoSource {
    /// Download over HTTP(S), optionally verified against a checksum.
    #[serde(rename_all = "camelCase")]
    Url {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        checksum: Option<String>,
    },
    /// Asset of an existing GitHub release.
    #[serde(rename_all = "camelCase")]
    Release { release_tag: String },
}

impl IsoSource {
    pub fn kind(&self) -> &'static str {
        match self {
            IsoSource::Url { .. } => "url",
            IsoSource::Release { .. } => "release",
        }
    }

    fn check(&self) -> Result<()> {
        match self {
            IsoSource::Url { url, .. } if parse_http_url(url).is_none() => {
                Err(RenderError::IsoUrl(url.clone()))
            }
            IsoSource::Release { release_tag } if release_tag.trim().is_empty() => {
                Err(RenderError::EmptyReleaseTag)
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildOptions {
    pub publish_release: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_tag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildManifest {
    pub version: String,
    pub profiles: Vec<String>,
    pub iso_source: IsoSource,
    pub options: BuildOptions,
    pub generated_at: String,
}

impl BuildManifest {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub fn render_manifest<S: AsRef<str>>(
    profile_names: &[S],
    iso_source: &IsoSource,
    options: &BuildOptions,
) -> Result<BuildManifest> {
    render_manifest_at(profile_names, iso_source, options, Utc::now())
}

/// Like [`render_manifest`], stamped with `generated_at`.
pub fn render_manifest_at<S: AsRef<str>>(
    profile_names: &[S],
    iso_source: &IsoSource,
    options: &BuildOptions,
    generated_at: DateTime<Utc>,
) -> Result<BuildManifest> {
    if profile_names.is_empty() {
        return Err(RenderError::EmptyProfileList);
    }
    iso_source.check()?;

    Ok(BuildManifest {
        version: MANIFEST_VERSION.to_string(),
        profiles: profile_names.iter().map(|n| n.as_ref().to_string()).collect(),
        iso_source: iso_source.clone(),
        options: BuildOptions {
            publish_release: options.publish_release,
            release_tag: options
                .release_tag
                .as_deref()
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(str::to_string),
        },
        generated_at: generated_at.to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

/// `workflow_dispatch` inputs of the ISO build workflow.
pub fn workflow_inputs<S: AsRef<str>>(
    profile_names: &[S],
    iso_source: &IsoSource,
) -> Result<BTreeMap<String, String>> {
    if profile_names.is_empty() {
        return Err(RenderError::EmptyProfileList);
    }
    iso_source.check()?;

    let names: Vec<&str> = profile_names.iter().map(AsRef::as_ref).collect();
    let mut inputs = BTreeMap::new();
    inputs.insert("profiles".to_string(), names.join(","));
    inputs.insert("iso_source".to_string(), iso_source.kind().to_string());
    match iso_source {
        IsoSource::Url { url, .. } => {
            inputs.insert("iso_url".to_string(), url.clone());
        }
        IsoSource::Release { release_tag } => {
            inputs.insert("release_tag".to_string(), release_tag.clone());
        }
    }
    Ok(inputs)
}

/// Link to a pre-filled "new issue" form asking the build repository to
/// build ISOs for `profiles`.
pub fn build_request_issue_url(
    owner: &str,
    repo: &str,
    profiles: &[NodeProfile],
    iso_source: &IsoSource,
) -> Result<Url> {
    if profiles.is_empty() {
        return Err(RenderError::EmptyProfileList);
    }
    iso_source.check()?;

    let names: Vec<&str> = profiles.iter().map(|p| p.name.as_str()).collect();
    let title = format!("Build ISO: {}", names.join(", "));

    let mut body = String::from("## Build Request\n\n");
    body.push_str(&format!("**Profiles:** {}\n\n", names.join(", ")));
    match iso_source {
        IsoSource::Url { url, checksum } => {
            body.push_str("**ISO Source:** url\n");
            body.push_str(&format!("**ISO URL:** {url}\n"));
            if let Some(checksum) = checksum {
                body.push_str(&format!("**Checksum:** {checksum}\n"));
            }
        }
        IsoSource::Release { release_tag } => {
            body.push_str("**ISO Source:** release\n");
            body.push_str(&format!("**Release Tag:** {release_tag}\n"));
        }
    }
    body.push_str("\n### Profiles\n\n");
    for profile in profiles {
        body.push_str(&format!(
            "- **{}** ({}): {}, {}\n",
            profile.name,
            profile.global.fqdn,
            profile.disk_setup.options.filesystem(),
            profile.network.source()
        ));
    }

    let base = format!("https://github.com/{owner}/{repo}/issues/new");
    Ok(Url::parse_with_params(
        &base,
        [
            ("title", title.as_str()),
            ("body", body.as_str()),
            ("labels", BUILD_REQUEST_LABEL),
        ],
    )?)
}
