//! Profile identifiers.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use profile_schema::ProfileDocument;

const ID_PREFIX: &str = "profile";
const ID_SUFFIX_LEN: usize = 9;

/// A new identifier of the form `profile-<unix millis>-<9 random chars>`.
pub fn generate_id(now: DateTime<Utc>) -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{ID_PREFIX}-{}-{}",
        now.timestamp_millis(),
        &random[..ID_SUFFIX_LEN]
    )
}

/// Give `profile` an id that is not in `existing`.
///
/// Profiles whose id is free keep it. Otherwise `fresh_id` is called until it
/// yields an unused id.
pub fn resolve_id_collision(
    existing: &HashSet<String>,
    mut profile: ProfileDocument,
    mut fresh_id: impl FnMut() -> String,
) -> ProfileDocument {
    while existing.contains(&profile.id) {
        profile.id = fresh_id();
    }
    profile
}
