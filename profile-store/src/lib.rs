//! Persisted, ordered collection of node profiles.
//!
//! [`ProfileStore`] owns the canonical profile list. Profiles leave it only
//! as copies; every change goes through one of its operations, which
//! validate the result, persist it through a [`ProfileStorage`] backend and
//! keep ids unique.

mod error;
pub mod ids;
pub mod snapshot;
pub mod storage;
mod store;

pub use error::{Result, StoreError};
pub use ids::{generate_id, resolve_id_collision};
pub use snapshot::{ProfileSnapshot, EXPORT_FILE_NAME, SNAPSHOT_VERSION};
pub use storage::{JsonFileStorage, MemoryStorage, ProfileStorage, PROFILES_FILE};
pub use store::ProfileStore;
