//! Node profile schema for Proxmox VE automated installations.
//!
//! A node profile is one installer answer configuration: system settings,
//! management network, disk layout and optional post-install hooks. This
//! crate holds:
//!
//! - the loose JSON [`ProfileDocument`] form profiles are stored, exported
//!   and edited in,
//! - the validated [`NodeProfile`] model whose variant-dependent parts are
//!   sum types,
//! - [`validate`], which turns the first into the second or reports every
//!   violated constraint with its field path.
//!
//! ```
//! use profile_schema::{validate, ProfileDocument};
//!
//! let document = ProfileDocument::from_json(r#"{
//!     "id": "profile-1",
//!     "name": "trinity",
//!     "global": {
//!         "keyboard": "en-us", "country": "us",
//!         "fqdn": "trinity.zion.local", "mailto": "ops@zion.local",
//!         "timezone": "UTC", "rootPasswordHashed": "$6$salt$hash"
//!     },
//!     "network": { "source": "from-dhcp" },
//!     "diskSetup": { "filesystem": "zfs", "zfs": { "raid": "raid1" } },
//!     "createdAt": "2024-01-15T10:00:00.000Z",
//!     "updatedAt": "2024-01-15T10:00:00.000Z"
//! }"#).unwrap();
//!
//! let profile = validate(&document).unwrap();
//! assert_eq!(profile.global.fqdn, "trinity.zion.local");
//! ```

pub mod document;
pub mod error;
pub mod grammar;
pub mod model;
pub mod secrets;
mod validate;

pub use document::{
    BtrfsDocument, DiskSetupDocument, FirstBootDocument, GlobalDocument, LvmDocument,
    NetworkDocument, ProfileDocument, WebhookDocument, ZfsDocument, TIMESTAMP_FORMAT,
};
pub use error::{FieldError, ValidationErrors};
pub use model::*;
pub use secrets::{ROOT_PASSWORD_PLACEHOLDER, ROOT_SSH_KEY_PLACEHOLDER};
pub use validate::{validate, MAX_DESCRIPTION_LEN, MAX_NAME_LEN, MIN_ROOT_PASSWORD_LEN};
