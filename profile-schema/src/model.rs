//! Validated node profile types.
//!
//! Values of these types only come out of [`crate::validate`], so every
//! invariant the validator checks holds for them. Variant-dependent options
//! are sum types: a ZFS disk setup cannot carry LVM options and a DHCP network
//! cannot carry a static address.

use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr, VariantNames};
use url::Url;

use crate::document::ProfileDocument;
use crate::error::ValidationErrors;

/// Selection filter on udev properties, e.g. `ID_NET_NAME = "enp*"`.
pub type DeviceFilter = BTreeMap<String, String>;

/// A named installer configuration for one Proxmox VE node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "ProfileDocument", try_from = "ProfileDocument")]
pub struct NodeProfile {
    /// Opaque identifier, assigned once by the store.
    pub id: String,
    /// Display name, also used as a file name stem and boot menu label.
    pub name: String,
    pub description: Option<String>,
    pub global: GlobalConfig,
    pub network: NetworkConfig,
    pub disk_setup: DiskSetup,
    pub first_boot: Option<FirstBoot>,
    pub post_install_webhook: Option<PostInstallWebhook>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ProfileDocument> for NodeProfile {
    type Error = ValidationErrors;

    fn try_from(document: ProfileDocument) -> Result<Self, Self::Error> {
        crate::validate(&document)
    }
}

impl NodeProfile {
    /// Convert back into the loose JSON document form.
    pub fn to_document(&self) -> ProfileDocument {
        ProfileDocument::from(self)
    }
}

/// System-level installer settings (`[global]` in the answer file).
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalConfig {
    pub keyboard: KeyboardLayout,
    pub country: Country,
    pub fqdn: String,
    pub mailto: String,
    pub timezone: String,
    /// Plaintext root password. The store only ever keeps the build-time
    /// placeholder here.
    pub root_password: Option<String>,
    pub root_password_hashed: Option<String>,
    pub root_ssh_keys: Option<Vec<String>>,
    pub reboot_on_error: Option<bool>,
    pub reboot_mode: Option<RebootMode>,
}

/// How the installed system configures its management interface.
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkConfig {
    FromDhcp {
        filter: Option<DeviceFilter>,
    },
    FromAnswer {
        cidr: Ipv4Cidr,
        gateway: Ipv4Addr,
        dns: Ipv4Addr,
        filter: Option<DeviceFilter>,
    },
}

impl NetworkConfig {
    pub fn source(&self) -> NetworkSource {
        match self {
            NetworkConfig::FromDhcp { .. } => NetworkSource::FromDhcp,
            NetworkConfig::FromAnswer { .. } => NetworkSource::FromAnswer,
        }
    }

    pub fn filter(&self) -> Option<&DeviceFilter> {
        match self {
            NetworkConfig::FromDhcp { filter } | NetworkConfig::FromAnswer { filter, .. } => {
                filter.as_ref()
            }
        }
    }
}

/// Target disk layout.
#[derive(Debug, Clone, PartialEq)]
pub struct DiskSetup {
    pub options: FilesystemOptions,
    pub disk_list: Option<Vec<String>>,
    pub filter: Option<DeviceFilter>,
    pub filter_match: Option<FilterMatch>,
}

/// Filesystem choice together with the options that belong to it.
#[derive(Debug, Clone, PartialEq)]
pub enum FilesystemOptions {
    Zfs(ZfsOptions),
    Ext4(LvmOptions),
    Xfs(LvmOptions),
    Btrfs(BtrfsOptions),
}

impl FilesystemOptions {
    pub fn filesystem(&self) -> Filesystem {
        match self {
            FilesystemOptions::Zfs(_) => Filesystem::Zfs,
            FilesystemOptions::Ext4(_) => Filesystem::Ext4,
            FilesystemOptions::Xfs(_) => Filesystem::Xfs,
            FilesystemOptions::Btrfs(_) => Filesystem::Btrfs,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ZfsOptions {
    pub raid: ZfsRaid,
    pub ashift: Option<u32>,
    pub compress: Option<ZfsCompress>,
    pub checksum: Option<ZfsChecksum>,
    /// ARC size cap in MiB.
    pub arc_max: Option<u64>,
    pub copies: Option<u32>,
    /// Target disk size in GiB.
    pub hdsize: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LvmOptions {
    pub hdsize: Option<u64>,
    pub swapsize: Option<u64>,
    pub maxroot: Option<u64>,
    pub maxvz: Option<u64>,
    pub minfree: Option<u64>,
}

impl LvmOptions {
    pub fn is_empty(&self) -> bool {
        self == &LvmOptions::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BtrfsOptions {
    pub raid: BtrfsRaid,
    pub compress: Option<BtrfsCompress>,
    pub hdsize: Option<u64>,
}

/// Post-install hook executed on first boot of the installed system.
#[derive(Debug, Clone, PartialEq)]
pub struct FirstBoot {
    pub source: FirstBootSource,
    pub ordering: Option<FirstBootOrdering>,
    pub cert_fingerprint: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FirstBootSource {
    FromIso,
    FromUrl(Url),
}

impl FirstBootSource {
    pub fn kind(&self) -> FirstBootSourceKind {
        match self {
            FirstBootSource::FromIso => FirstBootSourceKind::FromIso,
            FirstBootSource::FromUrl(_) => FirstBootSourceKind::FromUrl,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostInstallWebhook {
    pub url: Url,
    pub cert_fingerprint: Option<String>,
}

/// An IPv4 address with prefix length, e.g. `172.20.0.10/24`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Cidr {
    pub address: Ipv4Addr,
    pub prefix: u8,
}

impl FromStr for Ipv4Cidr {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (address, prefix) = s
            .split_once('/')
            .ok_or_else(|| format!("missing prefix length in '{s}'"))?;
        let address = address
            .parse::<Ipv4Addr>()
            .map_err(|e| format!("invalid address '{address}': {e}"))?;
        let prefix = prefix
            .parse::<u8>()
            .ok()
            .filter(|p| *p <= 32)
            .ok_or_else(|| format!("invalid prefix length '{prefix}'"))?;
        Ok(Ipv4Cidr { address, prefix })
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, IntoStaticStr, VariantNames,
)]
#[strum(serialize_all = "kebab-case")]
pub enum KeyboardLayout {
    EnUs,
    De,
    DeCh,
    Dk,
    Es,
    Fi,
    Fr,
    FrBe,
    FrCa,
    FrCh,
    Hu,
    Is,
    It,
    Jp,
    Lt,
    Mk,
    Nl,
    No,
    Pl,
    Pt,
    PtBr,
    Se,
    Si,
    Tr,
    Uk,
    Us,
}

/// ISO 3166-1 alpha-2 country codes known to the installer UI.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, IntoStaticStr, VariantNames,
)]
#[strum(serialize_all = "lowercase")]
pub enum Country {
    Us,
    Ca,
    Gb,
    De,
    Fr,
    Es,
    It,
    Nl,
    Be,
    Ch,
    At,
    Au,
    Nz,
    Jp,
    Kr,
    Cn,
    Sg,
    In,
    Br,
    Mx,
    Se,
    No,
    Dk,
    Fi,
    Pl,
    Cz,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, IntoStaticStr, VariantNames,
)]
#[strum(serialize_all = "kebab-case")]
pub enum RebootMode {
    Reboot,
    PowerOff,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, IntoStaticStr, VariantNames,
)]
#[strum(serialize_all = "kebab-case")]
pub enum NetworkSource {
    FromDhcp,
    FromAnswer,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, IntoStaticStr, VariantNames,
)]
#[strum(serialize_all = "lowercase")]
pub enum Filesystem {
    Zfs,
    Ext4,
    Xfs,
    Btrfs,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, IntoStaticStr, VariantNames,
)]
#[strum(serialize_all = "lowercase")]
pub enum FilterMatch {
    Any,
    All,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, IntoStaticStr, VariantNames,
)]
#[strum(serialize_all = "lowercase")]
pub enum ZfsRaid {
    Raid0,
    Raid1,
    Raid10,
    #[strum(serialize = "raidz-1")]
    Raidz1,
    #[strum(serialize = "raidz-2")]
    Raidz2,
    #[strum(serialize = "raidz-3")]
    Raidz3,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, IntoStaticStr, VariantNames,
)]
#[strum(serialize_all = "lowercase")]
pub enum ZfsCompress {
    On,
    Off,
    Lz4,
    Lzjb,
    Zle,
    Gzip,
    Zstd,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, IntoStaticStr, VariantNames,
)]
#[strum(serialize_all = "lowercase")]
pub enum ZfsChecksum {
    On,
    Fletcher4,
    Sha256,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, IntoStaticStr, VariantNames,
)]
#[strum(serialize_all = "lowercase")]
pub enum BtrfsRaid {
    Raid0,
    Raid1,
    Raid10,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, IntoStaticStr, VariantNames,
)]
#[strum(serialize_all = "lowercase")]
pub enum BtrfsCompress {
    On,
    Off,
    Zlib,
    Lzo,
    Zstd,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, IntoStaticStr, VariantNames,
)]
#[strum(serialize_all = "kebab-case")]
pub enum FirstBootSourceKind {
    FromIso,
    FromUrl,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, IntoStaticStr, VariantNames,
)]
#[strum(serialize_all = "kebab-case")]
pub enum FirstBootOrdering {
    BeforeNetwork,
    NetworkOnline,
    FullyUp,
}
