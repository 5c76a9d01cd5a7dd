use chrono::Datelike;
use predicates::prelude::PredicateBooleanExt;

struct Setup {
    source: tempfile::TempDir,
    mount: tempfile::TempDir,
    config: std::path::PathBuf,
}

/// A source card with photos and a mount point holding the "Photos" share.
fn setup(base_path: &str) -> Setup {
    let source = tempfile::tempdir().unwrap();
    let mount = tempfile::tempdir().unwrap();
    std::fs::create_dir(mount.path().join("Photos")).unwrap();
    let config = mount.path().join("config.yaml");
    std::fs::write(
        &config,
        format!(
            "destinations:\n  - name: storage\n    host: nas\n    share: Photos\n    base_path: {base_path}\n    mount_point: {}\n",
            mount.path().display()
        ),
    )
    .unwrap();
    Setup {
        source,
        mount,
        config,
    }
}

fn create_photo(path: &std::path::Path, content: &str, modified: std::time::SystemTime) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
    filetime::set_file_mtime(path, filetime::FileTime::from_system_time(modified)).unwrap();
}

fn snapvault() -> assert_cmd::Command {
    assert_cmd::Command::cargo_bin("snapvault").unwrap()
}

#[test]
fn check_snapvault_help() {
    snapvault()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicates::str::contains("--source").and(predicates::str::contains("--workers")));
}

#[test]
fn test_version_runs() {
    snapvault().arg("--version").assert().success();
}

#[test]
fn test_missing_name_is_a_usage_error() {
    snapvault()
        .args(["--source", "/tmp"])
        .assert()
        .code(1)
        .stderr(predicates::str::contains("--name"));
}

#[test]
fn test_zero_workers_rejected() {
    snapvault()
        .args(["--source", "/tmp", "--name", "x", "--workers", "0"])
        .assert()
        .code(1);
}

#[test]
fn test_copy_to_mounted_share() {
    let setup = setup("Photoshoots");
    let modified = std::time::SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_736_942_400);
    create_photo(&setup.source.path().join("DCIM/IMG_001.jpg"), "first", modified);
    create_photo(&setup.source.path().join("DCIM/IMG_002.CR2"), "second", modified);
    create_photo(&setup.source.path().join("DCIM/readme.txt"), "skip me", modified);
    snapvault()
        .args([
            "--source",
            setup.source.path().to_str().unwrap(),
            "--name",
            "Wedding",
            "--config",
            setup.config.to_str().unwrap(),
            "--workers",
            "2",
        ])
        .assert()
        .success()
        .stdout(predicates::str::contains("files discovered: 2"));
    let date = chrono::DateTime::<chrono::Local>::from(modified)
        .format("%Y-%m-%d")
        .to_string();
    let dir = setup
        .mount
        .path()
        .join("Photos/Photoshoots")
        .join(format!("{} - Wedding", chrono::Local::now().year()))
        .join(date);
    assert_eq!(std::fs::read_to_string(dir.join("IMG_001.jpg")).unwrap(), "first");
    assert_eq!(std::fs::read_to_string(dir.join("IMG_002.CR2")).unwrap(), "second");
    assert!(!dir.join("readme.txt").exists());
}

#[test]
fn test_dry_run_writes_nothing() {
    let setup = setup("Photoshoots");
    create_photo(
        &setup.source.path().join("IMG_001.jpg"),
        "first",
        std::time::SystemTime::now(),
    );
    snapvault()
        .args([
            "--source",
            setup.source.path().to_str().unwrap(),
            "--name",
            "Wedding",
            "--config",
            setup.config.to_str().unwrap(),
            "--dry-run",
        ])
        .assert()
        .success()
        .stdout(predicates::str::contains("[dry run] storage:").and(predicates::str::contains("IMG_001.jpg")));
    assert!(!setup.mount.path().join("Photos/Photoshoots").exists());
}

#[test]
fn test_dry_run_sends_no_notifications() {
    let setup = setup("Photoshoots");
    let webhook = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let mut config = std::fs::read_to_string(&setup.config).unwrap();
    config.push_str(&format!(
        "notify:\n  webhook_url: http://{}/webhook\n",
        webhook.local_addr().unwrap()
    ));
    std::fs::write(&setup.config, config).unwrap();
    create_photo(
        &setup.source.path().join("IMG_001.jpg"),
        "first",
        std::time::SystemTime::now(),
    );
    snapvault()
        .args([
            "--source",
            setup.source.path().to_str().unwrap(),
            "--name",
            "Wedding",
            "--config",
            setup.config.to_str().unwrap(),
            "--dry-run",
        ])
        .assert()
        .success();
    webhook.set_nonblocking(true).unwrap();
    let accepted = webhook.accept();
    assert!(
        matches!(&accepted, Err(error) if error.kind() == std::io::ErrorKind::WouldBlock),
        "webhook contacted during a dry run: {accepted:?}"
    );
}

#[test]
fn test_unreachable_mount_fails() {
    let setup = setup("Photoshoots");
    create_photo(
        &setup.source.path().join("IMG_001.jpg"),
        "first",
        std::time::SystemTime::now(),
    );
    std::fs::remove_dir(setup.mount.path().join("Photos")).unwrap();
    snapvault()
        .args([
            "--source",
            setup.source.path().to_str().unwrap(),
            "--name",
            "Wedding",
            "--config",
            setup.config.to_str().unwrap(),
        ])
        .assert()
        .code(1);
}

#[test]
fn test_failed_copies_exit_with_2() {
    let setup = setup("Blocked");
    // a regular file where the base directory should be
    std::fs::write(setup.mount.path().join("Photos/Blocked"), "in the way").unwrap();
    create_photo(
        &setup.source.path().join("IMG_001.jpg"),
        "first",
        std::time::SystemTime::now(),
    );
    snapvault()
        .args([
            "--source",
            setup.source.path().to_str().unwrap(),
            "--name",
            "Wedding",
            "--config",
            setup.config.to_str().unwrap(),
        ])
        .assert()
        .code(2)
        .stdout(predicates::str::contains("=== Transfer Error Summary ==="));
}

#[test]
fn test_missing_config_fails() {
    let source = tempfile::tempdir().unwrap();
    snapvault()
        .args([
            "--source",
            source.path().to_str().unwrap(),
            "--name",
            "Wedding",
            "--config",
            source.path().join("missing.yaml").to_str().unwrap(),
        ])
        .assert()
        .code(1);
}

#[test]
fn test_unknown_destination_fails() {
    let setup = setup("Photoshoots");
    snapvault()
        .args([
            "--source",
            setup.source.path().to_str().unwrap(),
            "--name",
            "Wedding",
            "--config",
            setup.config.to_str().unwrap(),
            "--destination",
            "archive",
        ])
        .assert()
        .code(1);
}
