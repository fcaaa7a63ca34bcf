//! Build-time secret placeholders.
//!
//! Real secrets never live in a profile. The build pipeline replaces these
//! tokens with repository secrets (`ROOT_PASSWORD`, `ROOT_SSH_KEY`) when it
//! assembles the ISO.

use crate::document::ProfileDocument;

pub const ROOT_PASSWORD_PLACEHOLDER: &str = "{{ROOT_PASSWORD}}";
pub const ROOT_SSH_KEY_PLACEHOLDER: &str = "{{ROOT_SSH_KEY}}";

/// Name of the CI secret that replaces [`ROOT_PASSWORD_PLACEHOLDER`].
pub const ROOT_PASSWORD_SECRET: &str = "ROOT_PASSWORD";
/// Name of the CI secret that replaces [`ROOT_SSH_KEY_PLACEHOLDER`].
pub const ROOT_SSH_KEY_SECRET: &str = "ROOT_SSH_KEY";

pub fn is_placeholder(value: &str) -> bool {
    value == ROOT_PASSWORD_PLACEHOLDER || value == ROOT_SSH_KEY_PLACEHOLDER
}

/// Replace a plaintext root password with the placeholder.
///
/// Returns `true` when a real value was dropped.
pub fn redact_plaintext_password(document: &mut ProfileDocument) -> bool {
    match document.global.root_password.as_deref() {
        Some(value) if !value.is_empty() && value != ROOT_PASSWORD_PLACEHOLDER => {
            document.global.root_password = Some(ROOT_PASSWORD_PLACEHOLDER.to_string());
            true
        }
        _ => false,
    }
}

/// Fill in the password placeholder when neither a plaintext nor a hashed
/// password is set, so the profile passes the password-presence rule.
pub fn with_build_secret_placeholder(mut document: ProfileDocument) -> ProfileDocument {
    let missing = |value: &Option<String>| value.as_deref().map_or(true, str::is_empty);
    if missing(&document.global.root_password) && missing(&document.global.root_password_hashed) {
        document.global.root_password = Some(ROOT_PASSWORD_PLACEHOLDER.to_string());
    }
    document
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_fills_missing_password() {
        let document = with_build_secret_placeholder(ProfileDocument::default());
        assert_eq!(
            document.global.root_password.as_deref(),
            Some(ROOT_PASSWORD_PLACEHOLDER)
        );
    }

    #[test]
    fn test_hash_is_left_alone() {
        let mut document = ProfileDocument::default();
        document.global.root_password_hashed = Some("$6$salt$hash".into());
        let document = with_build_secret_placeholder(document);
        assert_eq!(document.global.root_password, None);
    }

    #[test]
    fn test_redact() {
        let mut document = ProfileDocument::default();
        document.global.root_password = Some("hunter22".into());
        assert!(redact_plaintext_password(&mut document));
        assert_eq!(
            document.global.root_password.as_deref(),
            Some(ROOT_PASSWORD_PLACEHOLDER)
        );
        assert!(!redact_plaintext_password(&mut document));
        assert!(is_placeholder(document.global.root_password.as_deref().unwrap()));
    }
}
