//! JSON document form of a node profile.
//!
//! This is the shape profiles have in `profiles.json`, in export snapshots
//! and in files pushed to the build repository. Every field is kept loose
//! (plain strings, signed integers, optional sub-objects) so a malformed
//! document still deserializes and the validator can report every problem
//! with its field path instead of stopping at the first serde error.

use serde::{Deserialize, Serialize};

use crate::model::{
    DeviceFilter, FilesystemOptions, FirstBootSource, LvmOptions, NetworkConfig, NodeProfile,
};

/// Timestamp format used for `createdAt` / `updatedAt`.
pub const TIMESTAMP_FORMAT: chrono::SecondsFormat = chrono::SecondsFormat::Millis;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDocument {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub global: GlobalDocument,
    #[serde(default)]
    pub network: NetworkDocument,
    #[serde(default)]
    pub disk_setup: DiskSetupDocument,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_boot: Option<FirstBootDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_install_webhook: Option<WebhookDocument>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalDocument {
    #[serde(default)]
    pub keyboard: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub fqdn: String,
    #[serde(default)]
    pub mailto: String,
    #[serde(default)]
    pub timezone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_password_hashed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_ssh_keys: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reboot_on_error: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reboot_mode: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkDocument {
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<DeviceFilter>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskSetupDocument {
    #[serde(default)]
    pub filesystem: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_list: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<DeviceFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_match: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zfs: Option<ZfsDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lvm: Option<LvmDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub btrfs: Option<BtrfsDocument>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZfsDocument {
    #[serde(default)]
    pub raid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ashift: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compress: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arc_max: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copies: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hdsize: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LvmDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hdsize: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swapsize: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxroot: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxvz: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minfree: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BtrfsDocument {
    #[serde(default)]
    pub raid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compress: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hdsize: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirstBootDocument {
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordering: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_fingerprint: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookDocument {
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_fingerprint: Option<String>,
}

impl ProfileDocument {
    /// Parse a single profile document from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn size(value: Option<u64>) -> Option<i64> {
    value.and_then(|v| i64::try_from(v).ok())
}

fn small(value: Option<u32>) -> Option<i64> {
    value.map(i64::from)
}

fn lvm_document(options: &LvmOptions) -> LvmDocument {
    LvmDocument {
        hdsize: size(options.hdsize),
        swapsize: size(options.swapsize),
        maxroot: size(options.maxroot),
        maxvz: size(options.maxvz),
        minfree: size(options.minfree),
    }
}

impl From<&NodeProfile> for ProfileDocument {
    fn from(profile: &NodeProfile) -> Self {
        let global = &profile.global;
        let network = match &profile.network {
            NetworkConfig::FromDhcp { filter } => NetworkDocument {
                source: profile.network.source().to_string(),
                cidr: None,
                gateway: None,
                dns: None,
                filter: filter.clone(),
            },
            NetworkConfig::FromAnswer {
                cidr,
                gateway,
                dns,
                filter,
            } => NetworkDocument {
                source: profile.network.source().to_string(),
                cidr: Some(cidr.to_string()),
                gateway: Some(gateway.to_string()),
                dns: Some(dns.to_string()),
                filter: filter.clone(),
            },
        };

        let disk = &profile.disk_setup;
        let mut disk_setup = DiskSetupDocument {
            filesystem: disk.options.filesystem().to_string(),
            disk_list: disk.disk_list.clone(),
            filter: disk.filter.clone(),
            filter_match: disk.filter_match.map(|m| m.to_string()),
            ..Default::default()
        };
        match &disk.options {
            FilesystemOptions::Zfs(zfs) => {
                disk_setup.zfs = Some(ZfsDocument {
                    raid: zfs.raid.to_string(),
                    ashift: small(zfs.ashift),
                    compress: zfs.compress.map(|c| c.to_string()),
                    checksum: zfs.checksum.map(|c| c.to_string()),
                    arc_max: size(zfs.arc_max),
                    copies: small(zfs.copies),
                    hdsize: size(zfs.hdsize),
                })
            }
            FilesystemOptions::Ext4(lvm) | FilesystemOptions::Xfs(lvm) => {
                disk_setup.lvm = Some(lvm_document(lvm))
            }
            FilesystemOptions::Btrfs(btrfs) => {
                disk_setup.btrfs = Some(BtrfsDocument {
                    raid: btrfs.raid.to_string(),
                    compress: btrfs.compress.map(|c| c.to_string()),
                    hdsize: size(btrfs.hdsize),
                })
            }
        }

        ProfileDocument {
            id: profile.id.clone(),
            name: profile.name.clone(),
            description: profile.description.clone(),
            global: GlobalDocument {
                keyboard: global.keyboard.to_string(),
                country: global.country.to_string(),
                fqdn: global.fqdn.clone(),
                mailto: global.mailto.clone(),
                timezone: global.timezone.clone(),
                root_password: global.root_password.clone(),
                root_password_hashed: global.root_password_hashed.clone(),
                root_ssh_keys: global.root_ssh_keys.clone(),
                reboot_on_error: global.reboot_on_error,
                reboot_mode: global.reboot_mode.map(|m| m.to_string()),
            },
            network,
            disk_setup,
            first_boot: profile.first_boot.as_ref().map(|fb| FirstBootDocument {
                source: fb.source.kind().to_string(),
                ordering: fb.ordering.map(|o| o.to_string()),
                url: match &fb.source {
                    FirstBootSource::FromUrl(url) => Some(url.to_string()),
                    FirstBootSource::FromIso => None,
                },
                cert_fingerprint: fb.cert_fingerprint.clone(),
            }),
            post_install_webhook: profile
                .post_install_webhook
                .as_ref()
                .map(|hook| WebhookDocument {
                    url: hook.url.to_string(),
                    cert_fingerprint: hook.cert_fingerprint.clone(),
                }),
            created_at: profile.created_at.to_rfc3339_opts(TIMESTAMP_FORMAT, true),
            updated_at: profile.updated_at.to_rfc3339_opts(TIMESTAMP_FORMAT, true),
        }
    }
}

impl From<NodeProfile> for ProfileDocument {
    fn from(profile: NodeProfile) -> Self {
        ProfileDocument::from(&profile)
    }
}
