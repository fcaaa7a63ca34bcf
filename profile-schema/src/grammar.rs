//! Textual grammars for profile fields.

use url::Url;

const SSH_KEY_TYPES: &[&str] = &[
    "ssh-rsa",
    "ssh-ed25519",
    "ssh-dss",
    "ecdsa-sha2-nistp256",
    "ecdsa-sha2-nistp384",
    "ecdsa-sha2-nistp521",
];

fn is_hostname_label(label: &str) -> bool {
    let bytes = label.as_bytes();
    if bytes.is_empty() || bytes.len() > 63 {
        return false;
    }
    let edge_ok = |b: &u8| b.is_ascii_alphanumeric();
    edge_ok(&bytes[0])
        && edge_ok(&bytes[bytes.len() - 1])
        && bytes.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'-')
}

/// Dot-separated hostname labels. A single label is accepted.
pub fn is_fqdn(value: &str) -> bool {
    !value.is_empty() && value.len() <= 253 && value.split('.').all(is_hostname_label)
}

/// `local@domain.tld`: no whitespace, exactly one `@`, and a dot inside the
/// domain part with text on both sides.
pub fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    let clean = |s: &str| !s.is_empty() && !s.contains('@') && !s.chars().any(char::is_whitespace);
    if !clean(local) || !clean(domain) {
        return false;
    }
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

/// OpenSSH public key line: key type, base64 body, optional comment.
pub fn is_ssh_public_key(value: &str) -> bool {
    let mut parts = value.split_whitespace();
    let (Some(kind), Some(body)) = (parts.next(), parts.next()) else {
        return false;
    };
    SSH_KEY_TYPES.contains(&kind)
        && value.starts_with(kind)
        && body
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='))
}

/// IANA zone names such as `UTC` or `America/New_York`.
pub fn is_timezone(value: &str) -> bool {
    !value.is_empty()
        && !value.starts_with('/')
        && !value.ends_with('/')
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '_' | '-' | '+'))
}

/// Absolute `http`/`https` URL with a host.
pub fn parse_http_url(value: &str) -> Option<Url> {
    let url = Url::parse(value).ok()?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Some(url),
        _ => None,
    }
}
