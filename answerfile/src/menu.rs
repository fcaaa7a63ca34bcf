//! Network boot artifacts: the iPXE profile menu, the chainload stub and a
//! matching dnsmasq snippet.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use profile_schema::NodeProfile;

use crate::answer::single_line;
use crate::{RenderError, Result};

/// Where the menu script is published below the base URL.
pub const MENU_PATH: &str = "netboot/ipxe/menu.ipxe";

const MENU_TIMEOUT_MS: u32 = 30000;
const KERNEL_ARGS: &str = "ro quiet ramdisk_size=16777216";

/// GitHub Pages URL of a build repository.
pub fn pages_base_url(owner: &str, repo: &str) -> String {
    format!("https://{owner}.github.io/{repo}")
}

/// iPXE label of a profile: its lowercased name, with anything outside
/// `[a-z0-9._-]` replaced by `-`.
pub fn menu_label(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '.' | '_' | '-' => c,
            _ => '-',
        })
        .collect()
}

/// Render the iPXE boot menu for `profiles`, in the given order.
///
/// Entry `i` (1-based) boots the i-th profile, with key `i` as shortcut for
/// the first nine; key `0` drops to the iPXE shell. Profiles whose names
/// map to the same label are rejected.
pub fn render_boot_menu(profiles: &[NodeProfile], base_url: &str) -> Result<String> {
    let base_url = base_url.trim_end_matches('/');
    let labels = labels(profiles)?;

    let mut lines = vec![
        "#!ipxe".to_string(),
        "# Proxmox Deployer - iPXE Boot Menu".to_string(),
        "# Auto-generated for your node profiles".to_string(),
        String::new(),
        "dhcp".to_string(),
        format!("set menu-timeout {MENU_TIMEOUT_MS}"),
        "set submenu-timeout ${menu-timeout}".to_string(),
        format!("set base-url {base_url}/netboot"),
        String::new(),
        ":start".to_string(),
        "menu Proxmox Deployer - Select Installation Profile".to_string(),
    ];
    for (index, (profile, label)) in profiles.iter().zip(&labels).enumerate() {
        // Shortcut keys are single characters, so only the first nine get one.
        let key = match index + 1 {
            n @ 1..=9 => format!("--key {n} "),
            _ => String::new(),
        };
        lines.push(format!("item {key}{label} {}", title(profile)));
    }
    lines.push("item --key 0 exit Exit to shell".to_string());
    let default = labels.first().map(String::as_str).unwrap_or("exit");
    lines.push(format!(
        "choose --timeout ${{menu-timeout}} --default {default} selected || goto exit"
    ));
    lines.push("goto ${selected}".to_string());

    for (profile, label) in profiles.iter().zip(&labels) {
        lines.push(String::new());
        lines.push(format!(":{label}"));
        lines.push(format!("echo Booting {}...", title(profile)));
        lines.push(format!("kernel ${{base-url}}/proxmox/vmlinuz {KERNEL_ARGS}"));
        lines.push(format!("initrd ${{base-url}}/proxmox/{label}-initrd.img"));
        lines.push("boot".to_string());
    }

    lines.push(String::new());
    lines.push(":exit".to_string());
    lines.push("echo Exiting to iPXE shell...".to_string());
    lines.push("shell".to_string());

    let mut out = lines.join("\n");
    out.push('\n');
    Ok(out)
}

fn title(profile: &NodeProfile) -> String {
    format!(
        "{} ({})",
        single_line(&profile.name),
        single_line(&profile.global.fqdn)
    )
}

fn labels(profiles: &[NodeProfile]) -> Result<Vec<String>> {
    let mut seen: HashMap<String, &str> = HashMap::new();
    let mut labels = Vec::with_capacity(profiles.len());
    for profile in profiles {
        let label = menu_label(&profile.name);
        // `exit` and `start` are taken by the menu itself.
        if let Some(first) = seen
            .get(&label)
            .copied()
            .or_else(|| matches!(label.as_str(), "exit" | "start").then_some("<menu>"))
        {
            return Err(RenderError::DuplicateMenuLabel {
                label,
                first: first.to_string(),
                second: profile.name.clone(),
            });
        }
        seen.insert(label.clone(), &profile.name);
        labels.push(label);
    }
    Ok(labels)
}

/// Minimal script that chainloads the published menu, for iPXE builds with
/// an embedded script.
pub fn render_chain_script(base_url: &str) -> String {
    format!(
        "#!ipxe\ndhcp\nchain {}/{MENU_PATH}\n",
        base_url.trim_end_matches('/')
    )
}

/// Network settings for [`render_dnsmasq`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsmasqOptions {
    pub tftp_root: String,
    pub range_start: Ipv4Addr,
    pub range_end: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub lease_time: String,
    pub router: Ipv4Addr,
    pub dns_server: Ipv4Addr,
}

impl Default for DnsmasqOptions {
    fn default() -> Self {
        Self {
            tftp_root: "/var/lib/tftpboot".to_string(),
            range_start: Ipv4Addr::new(172, 20, 0, 100),
            range_end: Ipv4Addr::new(172, 20, 0, 199),
            netmask: Ipv4Addr::new(255, 255, 255, 0),
            lease_time: "12h".to_string(),
            router: Ipv4Addr::new(172, 20, 0, 1),
            dns_server: Ipv4Addr::new(172, 20, 0, 1),
        }
    }
}

/// dnsmasq configuration that hands PXE clients an iPXE binary and then
/// chains them to the published menu.
pub fn render_dnsmasq(base_url: &str, options: &DnsmasqOptions) -> String {
    let base_url = base_url.trim_end_matches('/');
    let DnsmasqOptions {
        tftp_root,
        range_start,
        range_end,
        netmask,
        lease_time,
        router,
        dns_server,
    } = options;

    format!(
        "\
# dnsmasq iPXE configuration for Proxmox Deployer
# Add to /etc/dnsmasq.conf or /etc/dnsmasq.d/proxmox-deployer.conf

# Enable TFTP
enable-tftp
tftp-root={tftp_root}

# DHCP range for PXE clients
dhcp-range={range_start},{range_end},{netmask},{lease_time}

# UEFI clients
dhcp-match=set:efi-x86_64,option:client-arch,7
dhcp-match=set:efi-x86_64,option:client-arch,9
dhcp-boot=tag:efi-x86_64,ipxe.efi

# Legacy BIOS clients
dhcp-boot=tag:!efi-x86_64,undionly.kpxe

# Chain to the menu once iPXE is loaded
dhcp-match=set:ipxe,175
dhcp-boot=tag:ipxe,{base_url}/{MENU_PATH}

# Router and DNS
dhcp-option=option:router,{router}
dhcp-option=option:dns-server,{dns_server}
"
    )
}
