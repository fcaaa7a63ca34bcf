//! Profile validation.
//!
//! Validation runs in two passes over a [`ProfileDocument`]. The field pass
//! checks every field on its own and never stops early. The refinement pass
//! then checks the rules that span several fields (filesystem against its
//! options, network source against the static address fields, password
//! presence, first-boot source against its URL) and assembles the sum types
//! of [`NodeProfile`].

use std::net::Ipv4Addr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use strum::VariantNames;
use url::Url;

use crate::document::{
    BtrfsDocument, DiskSetupDocument, FirstBootDocument, GlobalDocument, LvmDocument,
    NetworkDocument, ProfileDocument, WebhookDocument, ZfsDocument,
};
use crate::error::{FieldError, ValidationErrors};
use crate::grammar;
use crate::model::*;

pub const MAX_NAME_LEN: usize = 50;
pub const MAX_DESCRIPTION_LEN: usize = 200;
pub const MIN_ROOT_PASSWORD_LEN: usize = 5;

/// Validate a candidate profile, reporting every violated constraint.
pub fn validate(candidate: &ProfileDocument) -> Result<NodeProfile, ValidationErrors> {
    let mut report = Report::default();

    // Field pass.
    check_identity(candidate, &mut report);
    let global = check_global(&candidate.global, &mut report);
    let network = check_network(&candidate.network, &mut report);
    let disk = check_disk(&candidate.disk_setup, &mut report);
    let first_boot = candidate
        .first_boot
        .as_ref()
        .map(|fb| check_first_boot(fb, &mut report));
    let webhook = candidate
        .post_install_webhook
        .as_ref()
        .map(|hook| check_webhook(hook, &mut report));
    let created_at = report.timestamp("createdAt", &candidate.created_at);
    let updated_at = report.timestamp("updatedAt", &candidate.updated_at);

    // Refinement pass.
    refine_password(&candidate.global, &mut report);
    let network = network.and_then(|n| refine_network(n, &mut report));
    let options = disk.options.and_then(|o| refine_disk(o, &mut report));
    let first_boot = first_boot.map(|fields| refine_first_boot(fields, &mut report));

    if !report.errors.is_empty() {
        return Err(ValidationErrors::new(report.errors));
    }

    let (Some(global), Some(network), Some(options), Some(created_at), Some(updated_at)) =
        (global, network, options, created_at, updated_at)
    else {
        report.fail("", "profile is incomplete");
        return Err(ValidationErrors::new(report.errors));
    };

    let first_boot = match first_boot {
        Some(Some(fb)) => Some(fb),
        Some(None) => {
            report.fail("firstBoot", "first-boot hook is incomplete");
            return Err(ValidationErrors::new(report.errors));
        }
        None => None,
    };

    let post_install_webhook = match webhook {
        Some(Some(hook)) => Some(hook),
        Some(None) => {
            report.fail("postInstallWebhook", "webhook is incomplete");
            return Err(ValidationErrors::new(report.errors));
        }
        None => None,
    };

    Ok(NodeProfile {
        id: candidate.id.clone(),
        name: candidate.name.clone(),
        description: candidate.description.clone(),
        global,
        network,
        disk_setup: DiskSetup {
            options,
            disk_list: disk.disk_list,
            filter: disk.filter,
            filter_match: disk.filter_match,
        },
        first_boot,
        post_install_webhook,
        created_at,
        updated_at,
    })
}

#[derive(Default)]
struct Report {
    errors: Vec<FieldError>,
}

impl Report {
    fn fail(&mut self, path: &str, message: impl Into<String>) {
        self.errors.push(FieldError {
            path: path.to_string(),
            message: message.into(),
        });
    }

    fn choice<T: FromStr + VariantNames>(&mut self, path: &str, what: &str, raw: &str) -> Option<T> {
        match raw.parse::<T>() {
            Ok(value) => Some(value),
            Err(_) => {
                self.fail(
                    path,
                    format!(
                        "Unsupported {what} '{raw}' (expected one of: {})",
                        T::VARIANTS.join(", ")
                    ),
                );
                None
            }
        }
    }

    fn optional_choice<T: FromStr + VariantNames>(
        &mut self,
        path: &str,
        what: &str,
        raw: Option<&str>,
    ) -> Option<T> {
        raw.and_then(|raw| self.choice(path, what, raw))
    }

    /// Range-checked optional number. `None` when absent or out of range.
    fn bounded(&mut self, path: &str, value: Option<i64>, min: i64, max: Option<i64>) -> Option<u64> {
        let value = value?;
        let in_range = value >= min && max.map_or(true, |max| value <= max);
        if !in_range {
            let message = match max {
                Some(max) => format!("Must be between {min} and {max}"),
                None => format!("Must be at least {min}"),
            };
            self.fail(path, message);
            return None;
        }
        u64::try_from(value).ok()
    }

    fn bounded_small(&mut self, path: &str, value: Option<i64>, min: i64, max: i64) -> Option<u32> {
        self.bounded(path, value, min, Some(max))
            .and_then(|v| u32::try_from(v).ok())
    }

    fn ipv4(&mut self, path: &str, raw: Option<&str>, message: &str) -> Option<Ipv4Addr> {
        let raw = raw?;
        match raw.parse::<Ipv4Addr>() {
            Ok(addr) => Some(addr),
            Err(_) => {
                self.fail(path, message);
                None
            }
        }
    }

    fn url(&mut self, path: &str, raw: &str) -> Option<Url> {
        let url = grammar::parse_http_url(raw);
        if url.is_none() {
            self.fail(path, "Invalid URL (expected an absolute http or https URL)");
        }
        url
    }

    fn timestamp(&mut self, path: &str, raw: &str) -> Option<DateTime<Utc>> {
        match DateTime::parse_from_rfc3339(raw) {
            Ok(ts) => Some(ts.with_timezone(&Utc)),
            Err(_) => {
                self.fail(path, "Invalid timestamp (expected RFC 3339 date-time)");
                None
            }
        }
    }
}

fn check_identity(candidate: &ProfileDocument, report: &mut Report) {
    if candidate.id.trim().is_empty() {
        report.fail("id", "Profile id is required");
    }
    let name_len = candidate.name.chars().count();
    if candidate.name.trim().is_empty() {
        report.fail("name", "Name is required");
    } else if name_len > MAX_NAME_LEN {
        report.fail(
            "name",
            format!("Name must be at most {MAX_NAME_LEN} characters"),
        );
    }
    if let Some(description) = &candidate.description {
        if description.chars().count() > MAX_DESCRIPTION_LEN {
            report.fail(
                "description",
                format!("Description must be at most {MAX_DESCRIPTION_LEN} characters"),
            );
        }
    }
}

fn check_global(global: &GlobalDocument, report: &mut Report) -> Option<GlobalConfig> {
    let keyboard = report.choice::<KeyboardLayout>("global.keyboard", "keyboard layout", &global.keyboard);
    let country = report.choice::<Country>("global.country", "country", &global.country);

    if !grammar::is_fqdn(&global.fqdn) {
        report.fail("global.fqdn", "Invalid FQDN format");
    }
    if !grammar::is_email(&global.mailto) {
        report.fail("global.mailto", "Invalid email format");
    }
    if !grammar::is_timezone(&global.timezone) {
        report.fail("global.timezone", "Invalid timezone name");
    }
    if let Some(password) = &global.root_password {
        if password.chars().count() < MIN_ROOT_PASSWORD_LEN {
            report.fail(
                "global.rootPassword",
                format!("Root password must be at least {MIN_ROOT_PASSWORD_LEN} characters"),
            );
        }
    }
    if let Some(keys) = &global.root_ssh_keys {
        for (index, key) in keys.iter().enumerate() {
            if !grammar::is_ssh_public_key(key) {
                report.fail(&format!("global.rootSshKeys.{index}"), "Invalid SSH key format");
            }
        }
    }
    let reboot_mode = match global.reboot_mode.as_deref() {
        Some(raw) => Some(report.choice::<RebootMode>("global.rebootMode", "reboot mode", raw)?),
        None => None,
    };

    Some(GlobalConfig {
        keyboard: keyboard?,
        country: country?,
        fqdn: global.fqdn.clone(),
        mailto: global.mailto.clone(),
        timezone: global.timezone.clone(),
        root_password: global.root_password.clone(),
        root_password_hashed: global.root_password_hashed.clone(),
        root_ssh_keys: global.root_ssh_keys.clone(),
        reboot_on_error: global.reboot_on_error,
        reboot_mode,
    })
}

struct NetworkFields {
    source: NetworkSource,
    cidr: Option<Ipv4Cidr>,
    gateway: Option<Ipv4Addr>,
    dns: Option<Ipv4Addr>,
    filter: Option<DeviceFilter>,
}

fn check_network(network: &NetworkDocument, report: &mut Report) -> Option<NetworkFields> {
    let source = report.choice::<NetworkSource>("network.source", "network source", &network.source);
    let cidr = match network.cidr.as_deref() {
        Some(raw) => match raw.parse::<Ipv4Cidr>() {
            Ok(cidr) => Some(cidr),
            Err(_) => {
                report.fail("network.cidr", "Invalid CIDR notation");
                None
            }
        },
        None => None,
    };
    let gateway = report.ipv4("network.gateway", network.gateway.as_deref(), "Invalid gateway IP");
    let dns = report.ipv4("network.dns", network.dns.as_deref(), "Invalid DNS IP");

    Some(NetworkFields {
        source: source?,
        cidr,
        gateway,
        dns,
        filter: network.filter.clone(),
    })
}

fn refine_network(fields: NetworkFields, report: &mut Report) -> Option<NetworkConfig> {
    match fields.source {
        NetworkSource::FromDhcp => Some(NetworkConfig::FromDhcp {
            filter: fields.filter,
        }),
        NetworkSource::FromAnswer => match (fields.cidr, fields.gateway, fields.dns) {
            (Some(cidr), Some(gateway), Some(dns)) => Some(NetworkConfig::FromAnswer {
                cidr,
                gateway,
                dns,
                filter: fields.filter,
            }),
            _ => {
                report.fail("network", "Static network config requires CIDR, gateway, and DNS");
                None
            }
        },
    }
}

enum DiskOptionFields {
    Zfs(Option<ZfsOptions>),
    Lvm(Filesystem, Option<LvmOptions>),
    Btrfs(Option<BtrfsOptions>),
}

struct DiskFields {
    options: Option<(DiskOptionFields, Presence)>,
    disk_list: Option<Vec<String>>,
    filter: Option<DeviceFilter>,
    filter_match: Option<FilterMatch>,
}

/// Which option objects the candidate carried, regardless of their validity.
struct Presence {
    zfs: bool,
    lvm: bool,
    btrfs: bool,
}

fn check_disk(disk: &DiskSetupDocument, report: &mut Report) -> DiskFields {
    let filesystem = report.choice::<Filesystem>("diskSetup.filesystem", "filesystem", &disk.filesystem);
    let filter_match = report.optional_choice::<FilterMatch>(
        "diskSetup.filterMatch",
        "filter match mode",
        disk.filter_match.as_deref(),
    );
    if let Some(disks) = &disk.disk_list {
        for (index, name) in disks.iter().enumerate() {
            if name.trim().is_empty() {
                report.fail(&format!("diskSetup.diskList.{index}"), "Disk name must not be empty");
            }
        }
    }

    // Option objects are checked even when they do not belong to the chosen
    // filesystem, so their own field errors are reported too.
    let zfs = disk.zfs.as_ref().and_then(|zfs| check_zfs(zfs, report));
    let lvm = disk.lvm.as_ref().and_then(|lvm| check_lvm(lvm, report));
    let btrfs = disk.btrfs.as_ref().and_then(|btrfs| check_btrfs(btrfs, report));

    let presence = Presence {
        zfs: disk.zfs.is_some(),
        lvm: disk.lvm.is_some(),
        btrfs: disk.btrfs.is_some(),
    };
    let options = filesystem.map(|fs| {
        let fields = match fs {
            Filesystem::Zfs => DiskOptionFields::Zfs(zfs),
            Filesystem::Ext4 | Filesystem::Xfs => DiskOptionFields::Lvm(fs, lvm),
            Filesystem::Btrfs => DiskOptionFields::Btrfs(btrfs),
        };
        (fields, presence)
    });

    DiskFields {
        options,
        disk_list: disk.disk_list.clone(),
        filter: disk.filter.clone(),
        filter_match,
    }
}

const FS_MISMATCH: &str = "Filesystem options must match selected filesystem type";

fn refine_disk(
    (fields, presence): (DiskOptionFields, Presence),
    report: &mut Report,
) -> Option<FilesystemOptions> {
    match fields {
        DiskOptionFields::Zfs(zfs) => {
            if !presence.zfs || presence.lvm || presence.btrfs {
                report.fail("diskSetup", FS_MISMATCH);
                return None;
            }
            zfs.map(FilesystemOptions::Zfs)
        }
        DiskOptionFields::Lvm(fs, lvm) => {
            if presence.zfs || presence.btrfs {
                report.fail("diskSetup", FS_MISMATCH);
                return None;
            }
            // A missing lvm object means "installer defaults".
            let lvm = if presence.lvm { lvm? } else { LvmOptions::default() };
            match fs {
                Filesystem::Xfs => Some(FilesystemOptions::Xfs(lvm)),
                _ => Some(FilesystemOptions::Ext4(lvm)),
            }
        }
        DiskOptionFields::Btrfs(btrfs) => {
            if !presence.btrfs || presence.zfs || presence.lvm {
                report.fail("diskSetup", FS_MISMATCH);
                return None;
            }
            btrfs.map(FilesystemOptions::Btrfs)
        }
    }
}

fn check_zfs(zfs: &ZfsDocument, report: &mut Report) -> Option<ZfsOptions> {
    let raid = report.choice::<ZfsRaid>("diskSetup.zfs.raid", "ZFS RAID level", &zfs.raid);
    let compress = report.optional_choice::<ZfsCompress>(
        "diskSetup.zfs.compress",
        "ZFS compression",
        zfs.compress.as_deref(),
    );
    let checksum = report.optional_choice::<ZfsChecksum>(
        "diskSetup.zfs.checksum",
        "ZFS checksum",
        zfs.checksum.as_deref(),
    );
    let ashift = report.bounded_small("diskSetup.zfs.ashift", zfs.ashift, 9, 16);
    let arc_max = report.bounded("diskSetup.zfs.arcMax", zfs.arc_max, 64, None);
    let copies = report.bounded_small("diskSetup.zfs.copies", zfs.copies, 1, 3);
    let hdsize = report.bounded("diskSetup.zfs.hdsize", zfs.hdsize, 1, None);

    let failed = (zfs.compress.is_some() && compress.is_none())
        || (zfs.checksum.is_some() && checksum.is_none())
        || (zfs.ashift.is_some() && ashift.is_none())
        || (zfs.arc_max.is_some() && arc_max.is_none())
        || (zfs.copies.is_some() && copies.is_none())
        || (zfs.hdsize.is_some() && hdsize.is_none());
    if failed {
        return None;
    }

    Some(ZfsOptions {
        raid: raid?,
        ashift,
        compress,
        checksum,
        arc_max,
        copies,
        hdsize,
    })
}

fn check_lvm(lvm: &LvmDocument, report: &mut Report) -> Option<LvmOptions> {
    let hdsize = report.bounded("diskSetup.lvm.hdsize", lvm.hdsize, 1, None);
    let swapsize = report.bounded("diskSetup.lvm.swapsize", lvm.swapsize, 0, None);
    let maxroot = report.bounded("diskSetup.lvm.maxroot", lvm.maxroot, 1, None);
    let maxvz = report.bounded("diskSetup.lvm.maxvz", lvm.maxvz, 0, None);
    let minfree = report.bounded("diskSetup.lvm.minfree", lvm.minfree, 0, None);

    let failed = (lvm.hdsize.is_some() && hdsize.is_none())
        || (lvm.swapsize.is_some() && swapsize.is_none())
        || (lvm.maxroot.is_some() && maxroot.is_none())
        || (lvm.maxvz.is_some() && maxvz.is_none())
        || (lvm.minfree.is_some() && minfree.is_none());
    if failed {
        return None;
    }

    Some(LvmOptions {
        hdsize,
        swapsize,
        maxroot,
        maxvz,
        minfree,
    })
}

fn check_btrfs(btrfs: &BtrfsDocument, report: &mut Report) -> Option<BtrfsOptions> {
    let raid = report.choice::<BtrfsRaid>("diskSetup.btrfs.raid", "Btrfs RAID level", &btrfs.raid);
    let compress = report.optional_choice::<BtrfsCompress>(
        "diskSetup.btrfs.compress",
        "Btrfs compression",
        btrfs.compress.as_deref(),
    );
    let hdsize = report.bounded("diskSetup.btrfs.hdsize", btrfs.hdsize, 1, None);

    if (btrfs.compress.is_some() && compress.is_none())
        || (btrfs.hdsize.is_some() && hdsize.is_none())
    {
        return None;
    }

    Some(BtrfsOptions {
        raid: raid?,
        compress,
        hdsize,
    })
}

struct FirstBootFields {
    kind: Option<FirstBootSourceKind>,
    ordering: Option<FirstBootOrdering>,
    url: Option<Url>,
    url_given: bool,
    cert_fingerprint: Option<String>,
    ok: bool,
}

fn check_first_boot(first_boot: &FirstBootDocument, report: &mut Report) -> FirstBootFields {
    let before = report.errors.len();
    let kind = report.choice::<FirstBootSourceKind>(
        "firstBoot.source",
        "first-boot source",
        &first_boot.source,
    );
    let ordering = report.optional_choice::<FirstBootOrdering>(
        "firstBoot.ordering",
        "first-boot ordering",
        first_boot.ordering.as_deref(),
    );
    let url = first_boot
        .url
        .as_deref()
        .and_then(|raw| report.url("firstBoot.url", raw));

    FirstBootFields {
        kind,
        ordering,
        url,
        url_given: first_boot.url.is_some(),
        cert_fingerprint: first_boot.cert_fingerprint.clone(),
        ok: report.errors.len() == before,
    }
}

fn refine_first_boot(fields: FirstBootFields, report: &mut Report) -> Option<FirstBoot> {
    let source = match fields.kind? {
        FirstBootSourceKind::FromIso => FirstBootSource::FromIso,
        FirstBootSourceKind::FromUrl => match fields.url {
            Some(url) => FirstBootSource::FromUrl(url),
            None => {
                if !fields.url_given {
                    report.fail("firstBoot.url", "URL is required when source is from-url");
                }
                return None;
            }
        },
    };
    if !fields.ok {
        return None;
    }
    Some(FirstBoot {
        source,
        ordering: fields.ordering,
        cert_fingerprint: fields.cert_fingerprint,
    })
}

fn check_webhook(hook: &WebhookDocument, report: &mut Report) -> Option<PostInstallWebhook> {
    let url = report.url("postInstallWebhook.url", &hook.url)?;
    Some(PostInstallWebhook {
        url,
        cert_fingerprint: hook.cert_fingerprint.clone(),
    })
}

fn refine_password(global: &GlobalDocument, report: &mut Report) {
    let present = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.is_empty());
    if !present(&global.root_password) && !present(&global.root_password_hashed) {
        report.fail(
            "global.rootPassword",
            "Either root password or hashed password is required",
        );
    }
}
