use answerfile::{
    build_request_issue_url, render_answer, render_boot_menu, IsoSource, RenderError,
};
use assert_matches::assert_matches;
use profile_schema::{
    validate, BtrfsDocument, DiskSetupDocument, FirstBootDocument, GlobalDocument, LvmDocument,
    NetworkDocument, NodeProfile, ProfileDocument, WebhookDocument, ZfsDocument,
};

fn document(name: &str) -> ProfileDocument {
    ProfileDocument {
        id: format!("profile-{name}"),
        name: name.to_string(),
        global: GlobalDocument {
            keyboard: "en-us".into(),
            country: "us".into(),
            fqdn: format!("{}.zion.local", name.to_lowercase()),
            mailto: "ops@zion.local".into(),
            timezone: "UTC".into(),
            root_password: Some("{{ROOT_PASSWORD}}".into()),
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
        created_at: "2024-01-15T10:00:00.000Z".into(),
        updated_at: "2024-01-15T10:00:00.000Z".into(),
        ..Default::default()
    }
}

fn profile(name: &str) -> NodeProfile {
    validate(&document(name)).unwrap()
}

/// Every `[section]` header must be followed by at least one key.
fn assert_no_empty_sections(text: &str) {
    let lines: Vec<&str> = text.lines().collect();
    for (i, line) in lines.iter().enumerate() {
        if line.starts_with('[') {
            let next = lines[i + 1..].iter().find(|l| !l.trim().is_empty());
            assert!(
                next.is_some_and(|l| !l.starts_with('[')),
                "empty section {line} in:\n{text}"
            );
        }
    }
}

#[test]
fn test_trinity_answer_file() {
    let text = render_answer(&profile("trinity"), true).unwrap();

    assert!(text.contains("fqdn = \"trinity.zion.local\""));
    assert!(text.contains("[disk-setup]"));
    assert!(text.contains("raid = \"raid1\""));
    assert!(!text.contains("lvm"));
    assert!(!text.contains("btrfs"));
    assert_no_empty_sections(&text);

    let table: toml::Table = text.parse().unwrap();
    assert_eq!(table["disk-setup"]["filesystem"].as_str(), Some("zfs"));
    assert_eq!(table["disk-setup"]["zfs"]["raid"].as_str(), Some("raid1"));
}

#[test]
fn test_rendering_is_deterministic() {
    let profile = profile("trinity");
    assert_eq!(
        render_answer(&profile, true).unwrap(),
        render_answer(&profile, true).unwrap()
    );
}

#[test]
fn test_full_answer_file() {
    let mut doc = document("morpheus");
    doc.global.root_password = None;
    doc.global.root_password_hashed = Some("$6$salt$hash".into());
    doc.global.root_ssh_keys = Some(vec!["ssh-ed25519 AAAAC3NzaC1lZDI1NTE5 ops@zion".into()]);
    doc.global.reboot_on_error = Some(true);
    doc.global.reboot_mode = Some("power-off".into());
    doc.network = NetworkDocument {
        source: "from-answer".into(),
        cidr: Some("172.20.0.21/24".into()),
        gateway: Some("172.20.0.1".into()),
        dns: Some("172.20.0.1".into()),
        filter: Some([("ID_NET_NAME".to_string(), "enp*".to_string())].into()),
    };
    doc.disk_setup = DiskSetupDocument {
        filesystem: "xfs".into(),
        disk_list: Some(vec!["sda".into()]),
        filter_match: Some("all".into()),
        lvm: Some(LvmDocument {
            hdsize: Some(200),
            swapsize: Some(0),
            ..Default::default()
        }),
        ..Default::default()
    };
    doc.first_boot = Some(FirstBootDocument {
        source: "from-url".into(),
        ordering: Some("fully-up".into()),
        url: Some("https://deploy.zion.local/first-boot.sh".into()),
        cert_fingerprint: None,
    });
    doc.post_install_webhook = Some(WebhookDocument {
        url: "https://hooks.zion.local/installed".into(),
        cert_fingerprint: Some("AB:CD".into()),
    });

    let text = render_answer(&validate(&doc).unwrap(), true).unwrap();
    assert_no_empty_sections(&text);
    let table: toml::Table = text.parse().unwrap();

    let global = &table["global"];
    assert_eq!(global["root-password-hashed"].as_str(), Some("$6$salt$hash"));
    assert!(global.get("root-password").is_none());
    assert_eq!(global["root-ssh-keys"].as_array().unwrap().len(), 1);
    assert_eq!(global["reboot-on-error"].as_bool(), Some(true));
    assert_eq!(global["reboot-mode"].as_str(), Some("power-off"));

    let network = &table["network"];
    assert_eq!(network["source"].as_str(), Some("from-answer"));
    assert_eq!(network["cidr"].as_str(), Some("172.20.0.21/24"));
    assert_eq!(network["filter"]["ID_NET_NAME"].as_str(), Some("enp*"));

    let disk = &table["disk-setup"];
    assert_eq!(disk["filesystem"].as_str(), Some("xfs"));
    assert_eq!(disk["filter-match"].as_str(), Some("all"));
    assert_eq!(disk["disk-list"].as_array().unwrap().len(), 1);
    assert_eq!(disk["lvm"]["hdsize"].as_integer(), Some(200));
    assert_eq!(disk["lvm"]["swapsize"].as_integer(), Some(0));
    assert!(disk["lvm"].get("maxroot").is_none());

    assert_eq!(table["first-boot"]["ordering"].as_str(), Some("fully-up"));
    assert_eq!(
        table["post-installation-webhook"]["cert-fingerprint"].as_str(),
        Some("AB:CD")
    );
}

#[test]
fn test_absent_optionals_are_omitted() {
    let mut doc = document("neo");
    doc.disk_setup = DiskSetupDocument {
        filesystem: "btrfs".into(),
        btrfs: Some(BtrfsDocument {
            raid: "raid0".into(),
            ..Default::default()
        }),
        ..Default::default()
    };
    let text = render_answer(&validate(&doc).unwrap(), false).unwrap();
    assert_no_empty_sections(&text);
    for key in [
        "first-boot",
        "post-installation-webhook",
        "cidr",
        "filter",
        "disk-list",
        "compress",
        "hdsize",
        "reboot",
        "root-ssh-keys",
    ] {
        assert!(!text.contains(key), "{key} should be absent:\n{text}");
    }
}

#[test]
fn test_boot_menu_entries_follow_input_order() {
    let profiles = vec![profile("Zion"), profile("Alpha"), profile("Trinity")];
    let menu = render_boot_menu(&profiles, "https://ops.github.io/deployer").unwrap();

    let items: Vec<&str> = menu.lines().filter(|l| l.starts_with("item ")).collect();
    assert_eq!(
        items,
        vec![
            "item --key 1 zion Zion (zion.zion.local)",
            "item --key 2 alpha Alpha (alpha.zion.local)",
            "item --key 3 trinity Trinity (trinity.zion.local)",
            "item --key 0 exit Exit to shell",
        ]
    );
    assert!(menu.contains("choose --timeout ${menu-timeout} --default zion selected || goto exit"));
    assert!(menu.contains(
        ":alpha\necho Booting Alpha (alpha.zion.local)...\n\
         kernel ${base-url}/proxmox/vmlinuz ro quiet ramdisk_size=16777216\n\
         initrd ${base-url}/proxmox/alpha-initrd.img\nboot\n"
    ));
    assert!(menu.starts_with("#!ipxe\n"));
    assert!(menu.contains("set base-url https://ops.github.io/deployer/netboot\n"));
}

#[test]
fn test_boot_menu_names_stay_on_one_line() {
    let mut doc = document("neo");
    doc.name = "neo\nshell".into();
    let menu = render_boot_menu(&[validate(&doc).unwrap()], "https://ops.github.io/deployer")
        .unwrap();

    assert!(menu.contains("item --key 1 neo-shell neo shell (neo.zion.local)\n"));
    assert!(menu.contains(":neo-shell\necho Booting neo shell (neo.zion.local)...\n"));
    let shells = menu.lines().filter(|l| l.trim() == "shell").count();
    assert_eq!(shells, 1);
    assert!(!menu.lines().any(|l| l.starts_with("shell (")));
}

#[test]
fn test_boot_menu_keys_stop_at_nine() {
    let profiles: Vec<NodeProfile> = (1..=11).map(|i| profile(&format!("node{i:02}"))).collect();
    let menu = render_boot_menu(&profiles, "https://ops.github.io/deployer").unwrap();

    assert!(menu.contains("item --key 9 node09 node09 (node09.zion.local)\n"));
    assert!(menu.contains("item node10 node10 (node10.zion.local)\n"));
    assert!(menu.contains("item node11 node11 (node11.zion.local)\n"));
    assert!(!menu.contains("--key 10"));
    assert!(!menu.contains("--key 11"));
}

#[test]
fn test_boot_menu_rejects_label_collisions() {
    let profiles = vec![profile("Trinity"), profile("trinity")];
    assert_matches!(
        render_boot_menu(&profiles, "https://ops.github.io/deployer"),
        Err(RenderError::DuplicateMenuLabel { label, .. }) if label == "trinity"
    );

    let profiles = vec![profile("exit")];
    assert_matches!(
        render_boot_menu(&profiles, "https://ops.github.io/deployer"),
        Err(RenderError::DuplicateMenuLabel { .. })
    );
}

#[test]
fn test_issue_url() {
    let url = build_request_issue_url(
        "ops",
        "deployer",
        &[profile("trinity"), profile("neo")],
        &IsoSource::Release {
            release_tag: "pve-8.4".into(),
        },
    )
    .unwrap();

    assert_eq!(url.host_str(), Some("github.com"));
    assert_eq!(url.path(), "/ops/deployer/issues/new");
    let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
    assert_eq!(params["title"], "Build ISO: trinity, neo");
    assert_eq!(params["labels"], "build-request");
    assert!(params["body"].contains("**Release Tag:** pve-8.4"));
    assert!(params["body"].contains("- **neo** (neo.zion.local): zfs, from-dhcp"));
}
