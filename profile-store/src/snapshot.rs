//! Versioned export snapshots.

use profile_schema::{NodeProfile, ProfileDocument};
use serde::{Deserialize, Serialize};

use crate::{Result, StoreError};

/// Snapshot format written by [`crate::ProfileStore::export_all`].
pub const SNAPSHOT_VERSION: &str = "1.0";

/// Download name of an exported snapshot.
pub const EXPORT_FILE_NAME: &str = "proxmox-profiles.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSnapshot {
    pub version: String,
    pub profiles: Vec<NodeProfile>,
    pub exported_at: String,
}

impl ProfileSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Check the snapshot envelope and pull out the raw profile documents.
///
/// Only the shape is checked here; the profiles themselves are validated by
/// the import.
pub fn parse_snapshot(text: &str) -> Result<Vec<ProfileDocument>> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| StoreError::ImportFormat(format!("not valid JSON: {e}")))?;
    let Some(envelope) = value.as_object() else {
        return Err(StoreError::ImportFormat(
            "snapshot must be a JSON object".to_string(),
        ));
    };

    let version = envelope
        .get("version")
        .and_then(|v| v.as_str())
        .ok_or_else(|| StoreError::ImportFormat("missing 'version'".to_string()))?;
    if !is_supported_version(version) {
        return Err(StoreError::ImportFormat(format!(
            "unsupported snapshot version '{version}'"
        )));
    }

    let profiles = envelope
        .get("profiles")
        .and_then(|v| v.as_array())
        .ok_or_else(|| StoreError::ImportFormat("missing 'profiles' array".to_string()))?;

    profiles
        .iter()
        .enumerate()
        .map(|(index, profile)| {
            serde_json::from_value::<ProfileDocument>(profile.clone()).map_err(|e| {
                StoreError::ImportFormat(format!("profile #{} is malformed: {e}", index + 1))
            })
        })
        .collect()
}

fn is_supported_version(version: &str) -> bool {
    let major = version.split('.').next().unwrap_or_default();
    major == "1"
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_envelope_checks() {
        assert_matches!(parse_snapshot("[]"), Err(StoreError::ImportFormat(_)));
        assert_matches!(parse_snapshot("{"), Err(StoreError::ImportFormat(_)));
        assert_matches!(
            parse_snapshot(r#"{"profiles": []}"#),
            Err(StoreError::ImportFormat(msg)) if msg.contains("version")
        );
        assert_matches!(
            parse_snapshot(r#"{"version": "2.0", "profiles": []}"#),
            Err(StoreError::ImportFormat(msg)) if msg.contains("2.0")
        );
        assert_matches!(
            parse_snapshot(r#"{"version": "1.0", "profiles": {}}"#),
            Err(StoreError::ImportFormat(msg)) if msg.contains("profiles")
        );
        assert_matches!(
            parse_snapshot(r#"{"version": "1.0", "profiles": [{"name": 7}]}"#),
            Err(StoreError::ImportFormat(msg)) if msg.contains("#1")
        );
    }

    #[test]
    fn test_minor_versions_accepted() {
        let documents = parse_snapshot(r#"{"version": "1.3", "profiles": [{"name": "neo"}]}"#).unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].name, "neo");
    }
}
