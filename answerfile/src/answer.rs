//! Proxmox automated-installer answer files.
//!
//! The layout follows the `proxmox-auto-install-assistant` answer format:
//! kebab-case keys, one table per section, option objects and device
//! filters as nested tables.

use profile_schema::{
    BtrfsOptions, DeviceFilter, FilesystemOptions, FirstBootSource, LvmOptions, NetworkConfig,
    NodeProfile, ZfsOptions, ROOT_PASSWORD_PLACEHOLDER, ROOT_SSH_KEY_PLACEHOLDER,
};
use serde::Serialize;

use crate::Result;

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct Answer<'a> {
    global: GlobalSection<'a>,
    network: NetworkSection<'a>,
    disk_setup: DiskSection<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    first_boot: Option<FirstBootSection<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    post_installation_webhook: Option<WebhookSection<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct GlobalSection<'a> {
    keyboard: &'a str,
    country: &'a str,
    fqdn: &'a str,
    mailto: &'a str,
    timezone: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    root_password: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    root_password_hashed: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    root_ssh_keys: Option<Vec<&'a str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reboot_on_error: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reboot_mode: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct NetworkSection<'a> {
    source: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    cidr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gateway: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dns: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a DeviceFilter>,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct DiskSection<'a> {
    filesystem: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    disk_list: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter_match: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a DeviceFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    zfs: Option<ZfsSection<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lvm: Option<LvmSection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    btrfs: Option<BtrfsSection<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct ZfsSection<'a> {
    raid: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ashift: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    compress: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    checksum: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    arc_max: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    copies: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hdsize: Option<u64>,
}

#[derive(Serialize)]
struct LvmSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    hdsize: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    swapsize: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    maxroot: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    maxvz: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    minfree: Option<u64>,
}

#[derive(Serialize)]
struct BtrfsSection<'a> {
    raid: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    compress: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hdsize: Option<u64>,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct FirstBootSection<'a> {
    source: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ordering: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cert_fingerprint: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct WebhookSection<'a> {
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    cert_fingerprint: Option<&'a str>,
}

/// File name an answer file for `profile` is saved under.
pub fn answer_file_name(profile: &NodeProfile) -> String {
    format!("{}-answer.toml", file_stem(&profile.name))
}

/// A profile name usable as a single path component: characters outside
/// alphanumerics and `._-` become `-`, as does a leading dot.
pub fn file_stem(name: &str) -> String {
    let stem: String = name
        .trim()
        .chars()
        .enumerate()
        .map(|(i, c)| match c {
            '.' if i == 0 => '-',
            c if c.is_alphanumeric() || matches!(c, '.' | '_' | '-') => c,
            _ => '-',
        })
        .collect();
    if stem.is_empty() {
        "profile".to_string()
    } else {
        stem
    }
}

/// `text` on one line, with control characters blanked.
pub(crate) fn single_line(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

/// Render `profile` as an answer file.
///
/// A plaintext root password is never written. With
/// `include_secret_placeholders` set, the build-time placeholders stand in
/// for a missing password hash and a missing SSH key list; without it those
/// keys are left out.
pub fn render_answer(profile: &NodeProfile, include_secret_placeholders: bool) -> Result<String> {
    let answer = Answer {
        global: global_section(profile, include_secret_placeholders),
        network: network_section(&profile.network),
        disk_setup: disk_section(profile),
        first_boot: profile.first_boot.as_ref().map(|fb| FirstBootSection {
            source: fb.source.kind().into(),
            ordering: fb.ordering.as_ref().map(|o| o.as_ref()),
            url: match &fb.source {
                FirstBootSource::FromUrl(url) => Some(url.as_str()),
                FirstBootSource::FromIso => None,
            },
            cert_fingerprint: non_empty(fb.cert_fingerprint.as_deref()),
        }),
        post_installation_webhook: profile.post_install_webhook.as_ref().map(|hook| {
            WebhookSection {
                url: hook.url.as_str(),
                cert_fingerprint: non_empty(hook.cert_fingerprint.as_deref()),
            }
        }),
    };

    let mut out = header(profile);
    out.push_str(&toml::to_string(&answer)?);
    Ok(out)
}

fn header(profile: &NodeProfile) -> String {
    let name = single_line(&profile.name);
    format!(
        "# Proxmox VE automated installation answer file\n# Profile: {name}\n\n"
    )
}

fn global_section(profile: &NodeProfile, placeholders: bool) -> GlobalSection<'_> {
    let global = &profile.global;
    let hashed = non_empty(global.root_password_hashed.as_deref());
    let keys: Option<Vec<&str>> = global
        .root_ssh_keys
        .as_ref()
        .filter(|keys| !keys.is_empty())
        .map(|keys| keys.iter().map(String::as_str).collect());

    GlobalSection {
        keyboard: global.keyboard.as_ref(),
        country: global.country.as_ref(),
        fqdn: &global.fqdn,
        mailto: &global.mailto,
        timezone: &global.timezone,
        root_password: (placeholders && hashed.is_none()).then_some(ROOT_PASSWORD_PLACEHOLDER),
        root_password_hashed: hashed,
        root_ssh_keys: match keys {
            Some(keys) => Some(keys),
            None if placeholders => Some(vec![ROOT_SSH_KEY_PLACEHOLDER]),
            None => None,
        },
        reboot_on_error: global.reboot_on_error,
        reboot_mode: global.reboot_mode.as_ref().map(|m| m.as_ref()),
    }
}

fn network_section(network: &NetworkConfig) -> NetworkSection<'_> {
    let mut section = NetworkSection {
        source: match network {
            NetworkConfig::FromDhcp { .. } => "from-dhcp",
            NetworkConfig::FromAnswer { .. } => "from-answer",
        },
        cidr: None,
        gateway: None,
        dns: None,
        filter: non_empty_filter(network.filter()),
    };
    if let NetworkConfig::FromAnswer {
        cidr, gateway, dns, ..
    } = network
    {
        section.cidr = Some(cidr.to_string());
        section.gateway = Some(gateway.to_string());
        section.dns = Some(dns.to_string());
    }
    section
}

fn disk_section(profile: &NodeProfile) -> DiskSection<'_> {
    let disk = &profile.disk_setup;
    let mut section = DiskSection {
        filesystem: disk.options.filesystem().into(),
        disk_list: disk
            .disk_list
            .as_deref()
            .filter(|disks| !disks.is_empty()),
        filter_match: disk.filter_match.as_ref().map(|m| m.as_ref()),
        filter: non_empty_filter(disk.filter.as_ref()),
        zfs: None,
        lvm: None,
        btrfs: None,
    };
    match &disk.options {
        FilesystemOptions::Zfs(zfs) => section.zfs = Some(zfs_section(zfs)),
        FilesystemOptions::Ext4(lvm) | FilesystemOptions::Xfs(lvm) => {
            section.lvm = lvm_section(lvm)
        }
        FilesystemOptions::Btrfs(btrfs) => section.btrfs = Some(btrfs_section(btrfs)),
    }
    section
}

fn zfs_section(zfs: &ZfsOptions) -> ZfsSection<'_> {
    ZfsSection {
        raid: zfs.raid.as_ref(),
        ashift: zfs.ashift,
        compress: zfs.compress.as_ref().map(|c| c.as_ref()),
        checksum: zfs.checksum.as_ref().map(|c| c.as_ref()),
        arc_max: zfs.arc_max,
        copies: zfs.copies,
        hdsize: zfs.hdsize,
    }
}

// An empty lvm table would be a bare header.
fn lvm_section(lvm: &LvmOptions) -> Option<LvmSection> {
    if lvm.is_empty() {
        return None;
    }
    Some(LvmSection {
        hdsize: lvm.hdsize,
        swapsize: lvm.swapsize,
        maxroot: lvm.maxroot,
        maxvz: lvm.maxvz,
        minfree: lvm.minfree,
    })
}

fn btrfs_section(btrfs: &BtrfsOptions) -> BtrfsSection<'_> {
    BtrfsSection {
        raid: btrfs.raid.as_ref(),
        compress: btrfs.compress.as_ref().map(|c| c.as_ref()),
        hdsize: btrfs.hdsize,
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn non_empty_filter(filter: Option<&DeviceFilter>) -> Option<&DeviceFilter> {
    filter.filter(|f| !f.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use profile_schema::{validate, ProfileDocument};

    fn profile(json: &str) -> NodeProfile {
        validate(&ProfileDocument::from_json(json).unwrap()).unwrap()
    }

    const MINIMAL: &str = r#"{
        "id": "profile-1",
        "name": "neo",
        "global": {
            "keyboard": "en-us", "country": "us", "fqdn": "neo.zion.local",
            "mailto": "ops@zion.local", "timezone": "UTC",
            "rootPassword": "{{ROOT_PASSWORD}}"
        },
        "network": { "source": "from-dhcp", "filter": {} },
        "diskSetup": { "filesystem": "ext4", "lvm": {}, "diskList": [] },
        "createdAt": "2024-01-15T10:00:00.000Z",
        "updatedAt": "2024-01-15T10:00:00.000Z"
    }"#;

    #[test]
    fn test_minimal_profile() {
        let text = render_answer(&profile(MINIMAL), false).unwrap();
        assert!(text.starts_with(
            "# Proxmox VE automated installation answer file\n# Profile: neo\n\n[global]\n"
        ));

        let table: toml::Table = text.parse().unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table["global"]["keyboard"].as_str(), Some("en-us"));
        assert_eq!(table["global"].as_table().unwrap().len(), 5);
        assert_eq!(
            table["network"].as_table().unwrap().keys().collect::<Vec<_>>(),
            vec!["source"]
        );
        assert_eq!(
            table["disk-setup"].as_table().unwrap().keys().collect::<Vec<_>>(),
            vec!["filesystem"]
        );
        assert!(!text.contains("root-password"));
        assert!(!text.contains("[disk-setup.lvm]"));
    }

    #[test]
    fn test_placeholders() {
        let text = render_answer(&profile(MINIMAL), true).unwrap();
        assert!(text.contains("root-password = \"{{ROOT_PASSWORD}}\""));
        assert!(text.contains("root-ssh-keys = [\"{{ROOT_SSH_KEY}}\"]"));
    }

    #[test]
    fn test_hash_replaces_password_placeholder() {
        let json = MINIMAL.replace(
            r#""rootPassword": "{{ROOT_PASSWORD}}""#,
            r#""rootPasswordHashed": "$6$salt$hash""#,
        );
        let text = render_answer(&profile(&json), true).unwrap();
        assert!(text.contains("root-password-hashed = \"$6$salt$hash\""));
        assert!(!text.contains("root-password ="));
    }

    #[test]
    fn test_plaintext_never_rendered() {
        let json = MINIMAL.replace("{{ROOT_PASSWORD}}", "hunter22");
        for placeholders in [true, false] {
            let text = render_answer(&profile(&json), placeholders).unwrap();
            assert!(!text.contains("hunter22"));
        }
    }

    #[test]
    fn test_file_name() {
        assert_eq!(answer_file_name(&profile(MINIMAL)), "neo-answer.toml");
    }

    #[test]
    fn test_file_stem_stays_in_directory() {
        assert_eq!(file_stem("Neo 01"), "Neo-01");
        assert_eq!(file_stem("../../etc/passwd"), "-.-..-etc-passwd");
        assert_eq!(file_stem(".."), "-.");
        assert_eq!(file_stem("rack\\b"), "rack-b");
        assert_eq!(file_stem("pve_x.y-z"), "pve_x.y-z");
        assert_eq!(file_stem("  "), "profile");
    }

    #[test]
    fn test_header_is_single_line() {
        let json = MINIMAL.replace(r#""name": "neo""#, r#""name": "neo\n[global]""#);
        let text = render_answer(&profile(&json), false).unwrap();
        assert!(text.starts_with(
            "# Proxmox VE automated installation answer file\n# Profile: neo [global]\n\n"
        ));
        let table: toml::Table = text.parse().unwrap();
        assert_eq!(table.len(), 3);
    }
}
