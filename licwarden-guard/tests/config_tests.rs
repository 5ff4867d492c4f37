mod common;

use licwarden_guard::{
    BuildFailurePolicy, Guard, GuardConfig, NamespacePolicy, PERMIT_ENV, SignatureKind,
};
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn defaults_match_installed_layout() {
    let config = GuardConfig::default();

    assert_eq!(config.registry.patterns[0], "/.epoch");
    assert!(config.registry.patterns.iter().any(|p| p == "/lic/*"));
    assert_eq!(config.registry.on_build_failure, BuildFailurePolicy::FailClosed);
    assert_eq!(config.policy.namespace, NamespacePolicy::Strict);
    assert_eq!(config.signature.kind, SignatureKind::Gpgv);
    assert_eq!(config.signature.program, Path::new("/lic/gpgv"));
    assert_eq!(config.paths.permit, Path::new("/lic/permit.asc"));
    assert_eq!(config.watchdog.interval(), Duration::from_secs(10));
}

#[test]
fn partial_file_overrides_only_named_fields() {
    let config = GuardConfig::parse(
        r#"
        [registry]
        on_build_failure = "fail-open"

        [policy]
        namespace = "permissive"

        [caller]
        trust_marker_symbols = false
        maintenance_declaration = false

        [watchdog]
        interval_secs = 0
        "#,
    )
    .unwrap();

    assert_eq!(config.registry.on_build_failure, BuildFailurePolicy::FailOpen);
    assert_eq!(config.registry.patterns, GuardConfig::default().registry.patterns);
    assert_eq!(config.policy.namespace, NamespacePolicy::Permissive);
    assert!(!config.caller.trust_marker_symbols);
    assert!(config.caller.event_loop_heuristic);
    assert!(!config.caller.maintenance_declaration);
    assert_eq!(config.watchdog.interval(), Duration::from_secs(1));
}

#[test]
fn defaults_allow_maintenance_and_poll_every_ten_seconds() {
    let config = GuardConfig::default();
    assert!(config.caller.maintenance_declaration);
    assert_eq!(config.watchdog.interval(), licwarden_guard::DEFAULT_INTERVAL);
    assert_eq!(config.watchdog.interval(), Duration::from_secs(10));
}

#[test]
fn unknown_keys_are_rejected() {
    assert!(GuardConfig::parse("[registry]\npaterns = []\n").is_err());
}

#[test]
fn load_from_falls_back_on_missing_or_malformed_file() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.toml");
    assert_eq!(GuardConfig::load_from(&missing), GuardConfig::default());

    let broken = dir.path().join("broken.toml");
    std::fs::write(&broken, "[policy\nnamespace = ").unwrap();
    assert_eq!(GuardConfig::load_from(&broken), GuardConfig::default());

    let good = dir.path().join("good.toml");
    std::fs::write(&good, "[paths]\nepoch = \"/tmp/epoch\"\n").unwrap();
    assert_eq!(
        GuardConfig::load_from(&good).paths.epoch,
        PathBuf::from("/tmp/epoch")
    );
}

#[test]
fn permit_location_env_override() {
    let config = GuardConfig::default().with_env(|key| {
        (key == PERMIT_ENV).then(|| "/run/permit.asc".to_string())
    });
    assert_eq!(config.paths.permit, Path::new("/run/permit.asc"));

    let config = GuardConfig::default().with_env(|_| Some(String::new()));
    assert_eq!(config.paths.permit, Path::new("/lic/permit.asc"));
}

#[test]
fn ed25519_verifier_requires_public_key() {
    let mut config = GuardConfig::default();
    config.signature.kind = SignatureKind::Ed25519;
    assert!(config.signature.verifier().is_err());

    config.signature.public_key = Some("zz".to_string());
    assert!(config.signature.verifier().is_err());

    let public = ed25519_dalek::SigningKey::from_bytes(&[7u8; 32])
        .verifying_key()
        .to_bytes();
    config.signature.public_key = Some(hex::encode(public));
    assert!(config.signature.verifier().is_ok());
}

#[test]
fn from_config_without_marker_trust() {
    let install = common::Install::new();
    let mut config = install.config();
    config.caller.trust_marker_symbols = false;
    config.caller.marker_symbols = vec!["malloc".to_string()];

    let guard = Guard::from_config(config).unwrap();
    let license = common::cpath(&install.paths.license);
    assert!(
        guard
            .check_unlink(licwarden_guard::Target::path(&license))
            .is_denied()
    );
}
