use anyhow::Result;

async fn open(
    connector: &dyn remote::Connector,
    target: &remote::Target,
) -> Result<remote::Connection> {
    let cancel = tokio_util::sync::CancellationToken::new();
    let timeout = std::time::Duration::from_secs(5);
    Ok(remote::Connection::open(connector, target, timeout, &cancel).await?)
}

/// Both backends must agree on directory and file semantics.
async fn check_share_contract(connection: &remote::Connection) -> Result<()> {
    let share = connection.share();
    share.mkdir("Photoshoots").await?;
    assert!(share.mkdir("Photoshoots").await.unwrap_err().is_already_exists());
    assert!(matches!(
        share.mkdir("missing/parent").await,
        Err(remote::Error::NotFound(_))
    ));
    assert!(matches!(
        share.mkdir("../escape").await,
        Err(remote::Error::InvalidPath(_))
    ));
    share.mkdir("Photoshoots/2025 - Wedding").await?;
    let mut data: &[u8] = b"jpeg bytes";
    let written = share
        .create_and_write("Photoshoots/2025 - Wedding/IMG_001.jpg", &mut data)
        .await?;
    assert_eq!(written, 10);
    // overwriting replaces the file
    let mut data: &[u8] = b"new";
    let written = share
        .create_and_write("Photoshoots/2025 - Wedding/IMG_001.jpg", &mut data)
        .await?;
    assert_eq!(written, 3);
    let mut data: &[u8] = b"orphan";
    assert!(share
        .create_and_write("Other/IMG_002.jpg", &mut data)
        .await
        .is_err());
    Ok(())
}

#[tokio::test]
async fn test_mounted_share_contract() -> Result<()> {
    let mount = tempfile::tempdir()?;
    std::fs::create_dir(mount.path().join("Photos"))?;
    let mut target = remote::Target::new("nas", "Photos");
    target.mount_point = Some(mount.path().to_path_buf());
    let connection = open(&remote::mounted::MountedConnector::new(), &target).await?;
    check_share_contract(&connection).await?;
    connection.close().await;
    assert_eq!(
        std::fs::read(mount.path().join("Photos/Photoshoots/2025 - Wedding/IMG_001.jpg"))?,
        b"new"
    );
    assert!(!mount.path().join("Photos/Other").exists());
    Ok(())
}

#[tokio::test]
async fn test_memory_share_contract() -> Result<()> {
    let connector = remote::memory::MemoryConnector::new();
    let connection = open(&connector, &remote::Target::new("nas", "Photos")).await?;
    check_share_contract(&connection).await?;
    connection.close().await;
    assert_eq!(
        connector.read("nas", "Photos", "Photoshoots/2025 - Wedding/IMG_001.jpg"),
        Some(b"new".to_vec())
    );
    assert_eq!(connector.open_sessions(), 0);
    Ok(())
}

#[tokio::test]
async fn test_missing_mount_point_is_reported() -> Result<()> {
    let mount = tempfile::tempdir()?;
    let mut target = remote::Target::new("nas", "Photos");
    target.mount_point = Some(mount.path().join("not-mounted"));
    let error = remote::Connection::open(
        &remote::mounted::MountedConnector::new(),
        &target,
        std::time::Duration::from_secs(5),
        &tokio_util::sync::CancellationToken::new(),
    )
    .await
    .unwrap_err();
    assert!(matches!(error, remote::Error::NotFound(_)));
    Ok(())
}
