use licwarden_uninstall::{
    INSTALLED_PATHS, MAINTENANCE_SYMBOL, declare_maintenance, remove_entry, under_root, uninstall,
};
use pretty_assertions::assert_eq;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tempfile::TempDir;

fn populate(root: &Path) {
    for dir in ["lic", "lib", "lib64", "etc/profile.d"] {
        std::fs::create_dir_all(root.join(dir)).unwrap();
    }
    for installed in INSTALLED_PATHS {
        let path = under_root(root, installed);
        if !path.exists() {
            std::fs::write(path, b"x").unwrap();
        }
    }
}

#[test]
fn under_root_keeps_absolute_layout() {
    assert_eq!(
        under_root(Path::new("/mnt/target"), "/lic/license.asc"),
        Path::new("/mnt/target/lic/license.asc")
    );
    assert_eq!(under_root(Path::new("/"), "/.epoch"), Path::new("/.epoch"));
}

#[test]
fn license_directory_follows_its_files() {
    let lic = INSTALLED_PATHS.iter().position(|p| *p == "/lic").unwrap();
    for (i, path) in INSTALLED_PATHS.iter().enumerate() {
        if path.starts_with("/lic/") {
            assert!(i < lic, "{path} must be removed before /lic");
        }
    }
}

#[test]
fn removes_everything_installed() {
    let root = TempDir::new().unwrap();
    populate(root.path());

    let report = uninstall(root.path());
    assert!(report.is_success());
    assert_eq!(report.removed.len(), INSTALLED_PATHS.len());
    assert!(!root.path().join("lic").exists());
    assert!(root.path().join("etc/profile.d").exists());
}

#[test]
fn absent_paths_are_not_failures() {
    let root = TempDir::new().unwrap();
    std::fs::create_dir_all(root.path().join("lic")).unwrap();
    std::fs::write(root.path().join(".epoch"), b"id\n").unwrap();

    let report = uninstall(root.path());
    assert!(report.is_success());
    assert_eq!(report.removed.len(), 2);
    assert_eq!(report.absent.len(), INSTALLED_PATHS.len() - 2);
}

#[test]
fn non_empty_license_directory_is_reported() {
    let root = TempDir::new().unwrap();
    populate(root.path());
    std::fs::write(root.path().join("lic/unexpected"), b"x").unwrap();

    let report = uninstall(root.path());
    assert!(!report.is_success());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, root.path().join("lic"));
    assert!(!root.path().join("etc/ld.so.preload").exists());
}

#[test]
fn symlinks_are_removed_not_followed() {
    let root = TempDir::new().unwrap();
    let target = root.path().join("kept");
    std::fs::write(&target, b"keep").unwrap();
    let link = root.path().join("link");
    std::os::unix::fs::symlink(&target, &link).unwrap();

    assert!(remove_entry(&link).unwrap());
    assert!(target.exists());
    assert!(!remove_entry(&link).unwrap());
}

#[test]
fn permission_errors_are_surfaced() {
    // SAFETY: geteuid has no preconditions.
    if unsafe { libc::geteuid() } == 0 {
        return;
    }
    let root = TempDir::new().unwrap();
    let dir = root.path().join("locked");
    std::fs::create_dir(&dir).unwrap();
    let file = dir.join("file");
    std::fs::write(&file, b"x").unwrap();
    std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o555)).unwrap();

    let result = remove_entry(&file);
    std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o755)).unwrap();
    assert!(result.is_err());
}

#[test]
fn maintenance_declaration_without_guard_is_a_no_op() {
    assert_eq!(MAINTENANCE_SYMBOL.to_str().unwrap(), "licwarden_declare_maintenance");
    assert!(!declare_maintenance());
}
