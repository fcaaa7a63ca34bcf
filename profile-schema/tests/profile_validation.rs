use assert_matches::assert_matches;
use profile_schema::{
    validate, BtrfsDocument, FilesystemOptions, LvmDocument, NetworkConfig, NodeProfile,
    ProfileDocument, ZfsDocument, ZfsRaid,
};

const TRINITY: &str = include_str!("fixtures/trinity.json");
const MORPHEUS: &str = include_str!("fixtures/morpheus-static.json");

fn trinity() -> ProfileDocument {
    ProfileDocument::from_json(TRINITY).expect("trinity fixture should parse")
}

fn morpheus() -> ProfileDocument {
    ProfileDocument::from_json(MORPHEUS).expect("morpheus fixture should parse")
}

#[test]
fn test_fixtures_validate() {
    let profile = validate(&trinity()).expect("trinity should validate");
    assert_eq!(profile.name, "trinity");
    assert_matches!(profile.network, NetworkConfig::FromDhcp { filter: Some(_) });
    assert_matches!(
        profile.disk_setup.options,
        FilesystemOptions::Zfs(ref zfs) if zfs.raid == ZfsRaid::Raid1
    );

    let profile = validate(&morpheus()).expect("morpheus should validate");
    match profile.network {
        NetworkConfig::FromAnswer { cidr, gateway, .. } => {
            assert_eq!(cidr.to_string(), "172.20.0.21/24");
            assert_eq!(gateway.to_string(), "172.20.0.1");
        }
        other => panic!("expected static network, got {other:?}"),
    }
    assert_matches!(profile.disk_setup.options, FilesystemOptions::Ext4(ref lvm) if lvm.hdsize == Some(200));
}

#[test]
fn test_document_round_trip_is_stable() {
    for fixture in [trinity(), morpheus()] {
        let profile = validate(&fixture).unwrap();
        let document = profile.to_document();
        assert_eq!(document, fixture);

        let first = document.to_json().unwrap();
        let reparsed = validate(&ProfileDocument::from_json(&first).unwrap()).unwrap();
        let second = reparsed.to_document().to_json().unwrap();
        assert_eq!(first, second);
    }
}

#[test]
fn test_node_profile_deserializes_through_validation() {
    let profile: NodeProfile = serde_json::from_str(TRINITY).unwrap();
    assert_eq!(profile.global.fqdn, "trinity.zion.local");

    let broken = TRINITY.replace("trinity.zion.local", "trinity..zion");
    let err = serde_json::from_str::<NodeProfile>(&broken).unwrap_err();
    assert!(err.to_string().contains("global.fqdn"), "{err}");
}

#[test]
fn test_zfs_requires_zfs_options() {
    let mut doc = trinity();
    doc.disk_setup.zfs = None;
    let errors = validate(&doc).unwrap_err();
    assert_eq!(
        errors.message_for("diskSetup"),
        Some("Filesystem options must match selected filesystem type")
    );
}

#[test]
fn test_zfs_forbids_lvm_and_btrfs() {
    let mut doc = trinity();
    doc.disk_setup.lvm = Some(LvmDocument::default());
    assert!(validate(&doc).unwrap_err().contains_path("diskSetup"));

    let mut doc = trinity();
    doc.disk_setup.btrfs = Some(BtrfsDocument {
        raid: "raid1".into(),
        ..Default::default()
    });
    assert!(validate(&doc).unwrap_err().contains_path("diskSetup"));
}

#[test]
fn test_ext4_forbids_zfs() {
    let mut doc = morpheus();
    doc.disk_setup.zfs = Some(ZfsDocument {
        raid: "raid0".into(),
        ..Default::default()
    });
    assert!(validate(&doc).unwrap_err().contains_path("diskSetup"));
}

#[test]
fn test_btrfs_requires_btrfs_options() {
    let mut doc = morpheus();
    doc.disk_setup.filesystem = "btrfs".into();
    doc.disk_setup.lvm = None;
    assert!(validate(&doc).unwrap_err().contains_path("diskSetup"));

    doc.disk_setup.btrfs = Some(BtrfsDocument {
        raid: "raid10".into(),
        compress: Some("zstd".into()),
        hdsize: Some(500),
    });
    let profile = validate(&doc).unwrap();
    assert_matches!(profile.disk_setup.options, FilesystemOptions::Btrfs(_));
}

#[test]
fn test_static_network_requires_all_fields() {
    for field in ["cidr", "gateway", "dns"] {
        let mut doc = morpheus();
        match field {
            "cidr" => doc.network.cidr = None,
            "gateway" => doc.network.gateway = None,
            _ => doc.network.dns = None,
        }
        let errors = validate(&doc).unwrap_err();
        assert_eq!(
            errors.message_for("network"),
            Some("Static network config requires CIDR, gateway, and DNS"),
            "missing {field}"
        );
    }
}

#[test]
fn test_dhcp_ignores_static_fields() {
    let mut doc = trinity();
    doc.network.cidr = Some("10.0.0.5/24".into());
    doc.network.gateway = Some("10.0.0.1".into());
    doc.network.dns = Some("10.0.0.1".into());

    let profile = validate(&doc).unwrap();
    assert_matches!(profile.network, NetworkConfig::FromDhcp { .. });
    let document = profile.to_document();
    assert_eq!(document.network.cidr, None);
    assert_eq!(document.network.dns, None);
}

#[test]
fn test_invalid_static_fields_are_reported_individually() {
    let mut doc = morpheus();
    doc.network.cidr = Some("172.20.0.21".into());
    doc.network.gateway = Some("172.20.0".into());
    let errors = validate(&doc).unwrap_err();
    assert!(errors.contains_path("network.cidr"));
    assert!(errors.contains_path("network.gateway"));
    assert!(errors.contains_path("network"));
}

#[test]
fn test_password_or_hash_required() {
    let mut doc = trinity();
    doc.global.root_password = None;
    doc.global.root_password_hashed = None;
    let errors = validate(&doc).unwrap_err();
    assert_eq!(
        errors.message_for("global.rootPassword"),
        Some("Either root password or hashed password is required")
    );
}

#[test]
fn test_every_violation_reported_at_once() {
    let mut doc = trinity();
    doc.name = "x".repeat(51);
    doc.global.mailto = "not-an-email".into();
    doc.global.country = "zz".into();
    doc.disk_setup.zfs.as_mut().unwrap().copies = Some(4);
    doc.disk_setup.zfs.as_mut().unwrap().compress = Some("brotli".into());
    doc.global.root_password = None;

    let errors = validate(&doc).unwrap_err();
    let paths: Vec<&str> = errors.errors().iter().map(|e| e.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "name",
            "global.country",
            "global.mailto",
            "diskSetup.zfs.compress",
            "diskSetup.zfs.copies",
            "global.rootPassword",
        ]
    );
    assert!(errors
        .message_for("global.country")
        .unwrap()
        .starts_with("Unsupported country 'zz'"));
}

#[test]
fn test_webhook_url_must_be_http() {
    let mut doc = trinity();
    doc.post_install_webhook.as_mut().unwrap().url = "file:///etc/passwd".into();
    let errors = validate(&doc).unwrap_err();
    assert!(errors.contains_path("postInstallWebhook.url"));
}

#[test]
fn test_validation_does_not_touch_candidate() {
    let doc = trinity();
    let before = doc.clone();
    let _ = validate(&doc);
    assert_eq!(doc, before);
}
