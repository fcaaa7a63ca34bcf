use std::collections::HashSet;

use chrono::{DateTime, SubsecRound, Utc};
use profile_schema::secrets::{redact_plaintext_password, with_build_secret_placeholder};
use profile_schema::{validate, NodeProfile, ProfileDocument, MAX_NAME_LEN, TIMESTAMP_FORMAT};
use tracing::{debug, info, warn};

use crate::ids::{generate_id, resolve_id_collision};
use crate::snapshot::{parse_snapshot, ProfileSnapshot, SNAPSHOT_VERSION};
use crate::storage::ProfileStorage;
use crate::{Result, StoreError};

const COPY_SUFFIX: &str = " (copy)";

/// Ordered collection of node profiles, keyed by id.
///
/// Every mutation validates first, then persists through the storage backend,
/// and only then updates the in-memory list. A failed save leaves the store
/// as it was.
#[derive(Debug)]
pub struct ProfileStore<S: ProfileStorage> {
    profiles: Vec<NodeProfile>,
    selected: HashSet<String>,
    storage: S,
}

impl<S: ProfileStorage> ProfileStore<S> {
    /// Load the persisted collection.
    pub fn open(storage: S) -> Result<Self> {
        let loaded = storage.load()?;

        // Ids must be unique even if the file was edited by hand.
        let mut seen = HashSet::new();
        let mut profiles = Vec::with_capacity(loaded.len());
        for mut profile in loaded {
            if seen.contains(&profile.id) {
                let fresh = Self::fresh_id_outside(&seen);
                warn!("Duplicate stored id {}, reassigned to {}", profile.id, fresh);
                profile.id = fresh;
            }
            seen.insert(profile.id.clone());
            profiles.push(profile);
        }

        Ok(Self {
            profiles,
            selected: HashSet::new(),
            storage,
        })
    }

    pub fn profiles(&self) -> &[NodeProfile] {
        &self.profiles
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn get(&self, id: &str) -> Option<&NodeProfile> {
        self.profiles.iter().find(|p| p.id == id)
    }

    /// First profile whose name matches, ignoring case.
    pub fn find_by_name(&self, name: &str) -> Option<&NodeProfile> {
        let name = name.to_lowercase();
        self.profiles.iter().find(|p| p.name.to_lowercase() == name)
    }

    /// Look a profile up by id, falling back to its name.
    pub fn lookup(&self, key: &str) -> Option<&NodeProfile> {
        self.get(key).or_else(|| self.find_by_name(key))
    }

    /// Validate `draft` and append it under a fresh id.
    pub fn add(&mut self, draft: ProfileDocument) -> Result<NodeProfile> {
        let now = now();
        let mut document = prepare(draft);
        document.id = self.fresh_id();
        document.created_at = timestamp(now);
        document.updated_at = timestamp(now);

        let profile = validate(&document)?;
        let mut next = self.profiles.clone();
        next.push(profile.clone());
        self.commit(next)?;

        info!("Added profile {} ({})", profile.name, profile.id);
        Ok(profile)
    }

    /// Merge top-level fields of `patch` over the profile `id`.
    ///
    /// Keys present in the patch replace the stored value wholesale; missing
    /// keys keep theirs. `id` and `createdAt` cannot be changed.
    pub fn update(
        &mut self,
        id: &str,
        patch: serde_json::Map<String, serde_json::Value>,
    ) -> Result<NodeProfile> {
        let index = self.index_of(id)?;
        let current = &self.profiles[index];

        let mut merged = match serde_json::to_value(current.to_document())? {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        for (key, value) in patch {
            if matches!(key.as_str(), "id" | "createdAt" | "updatedAt") {
                debug!("Ignoring immutable field {} in patch for {}", key, id);
                continue;
            }
            merged.insert(key, value);
        }

        let draft: ProfileDocument = serde_json::from_value(serde_json::Value::Object(merged))
            .map_err(|source| StoreError::Patch {
                id: id.to_string(),
                source,
            })?;
        let mut document = prepare(draft);
        document.id = current.id.clone();
        document.created_at = timestamp(current.created_at);
        document.updated_at = timestamp(now().max(current.updated_at));

        let profile = validate(&document)?;
        let mut next = self.profiles.clone();
        next[index] = profile.clone();
        self.commit(next)?;

        info!("Updated profile {} ({})", profile.name, profile.id);
        Ok(profile)
    }

    /// Remove the profile `id`. Returns whether anything was removed.
    pub fn delete(&mut self, id: &str) -> Result<bool> {
        self.selected.remove(id);
        let Some(index) = self.profiles.iter().position(|p| p.id == id) else {
            debug!("Delete of unknown profile {} ignored", id);
            return Ok(false);
        };

        let mut next = self.profiles.clone();
        let removed = next.remove(index);
        self.commit(next)?;

        info!("Deleted profile {} ({})", removed.name, removed.id);
        Ok(true)
    }

    /// Append a copy of `id` with a fresh id and `" (copy)"` added to its
    /// name. Long names are shortened so the copy's name stays within
    /// [`MAX_NAME_LEN`].
    pub fn duplicate(&mut self, id: &str) -> Result<NodeProfile> {
        let index = self.index_of(id)?;
        let original = &self.profiles[index];

        let now = now().max(original.updated_at);
        let mut document = original.to_document();
        document.id = self.fresh_id();
        document.name = copy_name(&original.name);
        document.created_at = timestamp(now);
        document.updated_at = timestamp(now);

        let profile = validate(&document)?;
        let mut next = self.profiles.clone();
        next.push(profile.clone());
        self.commit(next)?;

        info!("Duplicated profile {} as {}", id, profile.id);
        Ok(profile)
    }

    /// Append every document in `documents`.
    ///
    /// All documents are validated before anything is stored; a single
    /// invalid one rejects the whole batch. Ids that collide with a stored
    /// profile, or with an earlier document of the batch, are replaced.
    pub fn import_many(&mut self, documents: Vec<ProfileDocument>) -> Result<Vec<NodeProfile>> {
        let mut taken: HashSet<String> = self.profiles.iter().map(|p| p.id.clone()).collect();
        let mut imported = Vec::with_capacity(documents.len());

        for (index, draft) in documents.into_iter().enumerate() {
            let original_id = draft.id.clone();
            let mut document = resolve_id_collision(&taken, prepare(draft), || {
                generate_id(now())
            });
            if document.id.is_empty() {
                document.id = Self::fresh_id_outside(&taken);
            }
            if document.id != original_id {
                debug!("Imported profile id {} reassigned to {}", original_id, document.id);
            }

            let profile = validate(&document).map_err(|errors| {
                StoreError::ImportFormat(format!(
                    "profile #{} ('{}') is invalid: {errors}",
                    index + 1,
                    document.name
                ))
            })?;
            taken.insert(profile.id.clone());
            imported.push(profile);
        }

        let mut next = self.profiles.clone();
        next.extend(imported.iter().cloned());
        self.commit(next)?;

        info!("Imported {} profiles", imported.len());
        Ok(imported)
    }

    /// Import an exported snapshot document.
    pub fn import_snapshot(&mut self, text: &str) -> Result<Vec<NodeProfile>> {
        let documents = parse_snapshot(text)?;
        self.import_many(documents)
    }

    pub fn export_all(&self) -> ProfileSnapshot {
        self.export_all_at(now())
    }

    pub fn export_all_at(&self, exported_at: DateTime<Utc>) -> ProfileSnapshot {
        ProfileSnapshot {
            version: SNAPSHOT_VERSION.to_string(),
            profiles: self.profiles.clone(),
            exported_at: timestamp(exported_at),
        }
    }

    /// Flip the selection of `id`. Returns whether it is selected afterwards.
    pub fn toggle_selection(&mut self, id: &str) -> Result<bool> {
        self.index_of(id)?;
        if self.selected.remove(id) {
            Ok(false)
        } else {
            self.selected.insert(id.to_string());
            Ok(true)
        }
    }

    pub fn select_all(&mut self) {
        self.selected = self.profiles.iter().map(|p| p.id.clone()).collect();
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.contains(id)
    }

    /// Selected profiles, in store order.
    pub fn selected_profiles(&self) -> Vec<&NodeProfile> {
        self.profiles
            .iter()
            .filter(|p| self.selected.contains(&p.id))
            .collect()
    }

    fn index_of(&self, id: &str) -> Result<usize> {
        self.profiles
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn fresh_id(&self) -> String {
        let taken: HashSet<String> = self.profiles.iter().map(|p| p.id.clone()).collect();
        Self::fresh_id_outside(&taken)
    }

    fn fresh_id_outside(taken: &HashSet<String>) -> String {
        loop {
            let id = generate_id(now());
            if !taken.contains(&id) {
                return id;
            }
        }
    }

    fn commit(&mut self, next: Vec<NodeProfile>) -> Result<()> {
        self.storage.save(&next)?;
        self.profiles = next;
        Ok(())
    }
}

/// Strip plaintext secrets and fill the build placeholder.
fn prepare(mut document: ProfileDocument) -> ProfileDocument {
    if redact_plaintext_password(&mut document) {
        warn!(
            "Plaintext root password on profile '{}' replaced by build placeholder",
            document.name
        );
    }
    with_build_secret_placeholder(document)
}

fn copy_name(name: &str) -> String {
    let room = MAX_NAME_LEN - COPY_SUFFIX.chars().count();
    if name.chars().count() <= room {
        return format!("{name}{COPY_SUFFIX}");
    }
    let base: String = name.chars().take(room).collect();
    format!("{}{COPY_SUFFIX}", base.trim_end())
}

fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(TIMESTAMP_FORMAT, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use assert_matches::assert_matches;
    use profile_schema::{DiskSetupDocument, GlobalDocument, NetworkDocument, ZfsDocument};

    fn draft(name: &str) -> ProfileDocument {
        ProfileDocument {
            name: name.to_string(),
            global: GlobalDocument {
                keyboard: "en-us".into(),
                country: "us".into(),
                fqdn: format!("{}.zion.local", name.to_lowercase()),
                mailto: "ops@zion.local".into(),
                timezone: "UTC".into(),
                ..Default::default()
            },
            network: NetworkDocument {
                source: "from-dhcp".into(),
                ..Default::default()
            },
            disk_setup: DiskSetupDocument {
                filesystem: "zfs".into(),
                zfs: Some(ZfsDocument {
                    raid: "raid1".into(),
                    ..Default::default()
                }),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn store() -> ProfileStore<MemoryStorage> {
        ProfileStore::open(MemoryStorage::new()).unwrap()
    }

    #[test]
    fn test_add_assigns_identity() {
        let mut store = store();
        let profile = store.add(draft("trinity")).unwrap();
        assert!(profile.id.starts_with("profile-"));
        assert_eq!(profile.created_at, profile.updated_at);
        assert_eq!(
            profile.global.root_password.as_deref(),
            Some(profile_schema::ROOT_PASSWORD_PLACEHOLDER)
        );
        assert_eq!(store.storage().saves(), 1);
        assert_eq!(store.storage().profiles().len(), 1);
    }

    #[test]
    fn test_add_rejects_before_persisting() {
        let mut store = store();
        let mut bad = draft("trinity");
        bad.global.fqdn = "not a host".into();
        assert_matches!(store.add(bad), Err(StoreError::Validation(_)));
        assert!(store.is_empty());
        assert_eq!(store.storage().saves(), 0);
    }

    #[test]
    fn test_plaintext_password_never_stored() {
        let mut store = store();
        let mut doc = draft("trinity");
        doc.global.root_password = Some("correct horse".into());
        let profile = store.add(doc).unwrap();
        assert_eq!(
            profile.global.root_password.as_deref(),
            Some(profile_schema::ROOT_PASSWORD_PLACEHOLDER)
        );
    }

    #[test]
    fn test_update_merges_and_keeps_identity() {
        let mut store = store();
        let original = store.add(draft("trinity")).unwrap();

        let mut patch = serde_json::Map::new();
        patch.insert("description".into(), serde_json::json!("rack A"));
        patch.insert("id".into(), serde_json::json!("profile-hijack"));
        let updated = store.update(&original.id, patch).unwrap();

        assert_eq!(updated.id, original.id);
        assert_eq!(updated.created_at, original.created_at);
        assert!(updated.updated_at >= original.updated_at);
        assert_eq!(updated.description.as_deref(), Some("rack A"));
        assert_eq!(updated.global, original.global);
    }

    #[test]
    fn test_update_validates() {
        let mut store = store();
        let original = store.add(draft("trinity")).unwrap();

        let mut patch = serde_json::Map::new();
        patch.insert(
            "diskSetup".into(),
            serde_json::json!({ "filesystem": "btrfs" }),
        );
        assert_matches!(
            store.update(&original.id, patch),
            Err(StoreError::Validation(errors)) if errors.contains_path("diskSetup")
        );
        assert_eq!(store.get(&original.id), Some(&original));

        let mut patch = serde_json::Map::new();
        patch.insert("name".into(), serde_json::json!(42));
        assert_matches!(store.update(&original.id, patch), Err(StoreError::Patch { .. }));

        assert_matches!(
            store.update("profile-missing", serde_json::Map::new()),
            Err(StoreError::NotFound(id)) if id == "profile-missing"
        );
    }

    #[test]
    fn test_delete_is_idempotent_and_clears_selection() {
        let mut store = store();
        let profile = store.add(draft("trinity")).unwrap();
        store.toggle_selection(&profile.id).unwrap();

        assert!(store.delete(&profile.id).unwrap());
        assert!(!store.is_selected(&profile.id));
        assert!(!store.delete(&profile.id).unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn test_duplicate() {
        let mut store = store();
        let original = store.add(draft("trinity")).unwrap();
        let copy = store.duplicate(&original.id).unwrap();

        assert_eq!(copy.name, "trinity (copy)");
        assert_ne!(copy.id, original.id);
        assert!(copy.created_at >= original.created_at);
        assert!(copy.updated_at >= original.updated_at);
        assert_eq!(copy.global, original.global);
        assert_eq!(store.len(), 2);

        assert_matches!(store.duplicate("nope"), Err(StoreError::NotFound(_)));
    }

    #[test]
    fn test_duplicate_long_names_fit() {
        let mut store = store();
        for len in 43..=MAX_NAME_LEN {
            let original = store.add(draft(&"n".repeat(len))).unwrap();
            let copy = store.duplicate(&original.id).unwrap();
            assert_eq!(copy.name.chars().count(), MAX_NAME_LEN.min(len + 7));
            assert!(copy.name.ends_with(COPY_SUFFIX));
        }
    }

    #[test]
    fn test_copy_name() {
        assert_eq!(copy_name("neo"), "neo (copy)");
        let cut = format!("{} tail", "a".repeat(42));
        assert_eq!(copy_name(&cut), format!("{} (copy)", "a".repeat(42)));
        let wide = "ß".repeat(50);
        assert_eq!(copy_name(&wide).chars().count(), MAX_NAME_LEN);
    }

    #[test]
    fn test_selection() {
        let mut store = store();
        let a = store.add(draft("alpha")).unwrap();
        let b = store.add(draft("beta")).unwrap();
        let c = store.add(draft("gamma")).unwrap();

        assert!(store.toggle_selection(&c.id).unwrap());
        assert!(store.toggle_selection(&a.id).unwrap());
        let names: Vec<&str> = store.selected_profiles().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "gamma"]);

        assert!(!store.toggle_selection(&a.id).unwrap());
        store.select_all();
        assert_eq!(store.selected_profiles().len(), 3);
        assert!(store.is_selected(&b.id));
        store.clear_selection();
        assert!(store.selected_profiles().is_empty());

        assert_matches!(store.toggle_selection("nope"), Err(StoreError::NotFound(_)));
    }

    #[test]
    fn test_lookup_by_id_then_name() {
        let mut store = store();
        let profile = store.add(draft("Trinity")).unwrap();
        assert_eq!(store.lookup(&profile.id).map(|p| &p.id), Some(&profile.id));
        assert_eq!(store.lookup("trinity").map(|p| &p.id), Some(&profile.id));
        assert!(store.lookup("neo").is_none());
    }

    #[test]
    fn test_open_reassigns_duplicate_ids() {
        let mut seed = store();
        let profile = seed.add(draft("trinity")).unwrap();
        let storage = MemoryStorage::with_profiles(vec![profile.clone(), profile.clone()]);

        let store = ProfileStore::open(storage).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.profiles()[0].id, profile.id);
        assert_ne!(store.profiles()[1].id, profile.id);
    }
}
