use crate::common::new_fs;

#[tokio::test]
async fn create_then_remove_leaves_namespace_unchanged() {
    let fs = new_fs();
    fs.create("/a.txt", 0o644).await.unwrap();
    fs.remove("/a.txt").await.unwrap();

    let err = fs.get_attr("/a.txt").await.unwrap_err();
    assert_eq!(err, s3fs::error::Error::NotFound);
}

#[tokio::test]
async fn remove_of_missing_file_is_not_found() {
    let fs = new_fs();
    let err = fs.remove("/missing").await.unwrap_err();
    assert_eq!(err, s3fs::error::Error::NotFound);
}

#[tokio::test]
async fn create_twice_without_remove_is_already_exists() {
    let fs = new_fs();
    fs.create("/a.txt", 0o644).await.unwrap();
    let err = fs.create("/a.txt", 0o644).await.unwrap_err();
    assert_eq!(err, s3fs::error::Error::AlreadyExists);
}

#[tokio::test]
async fn remove_drops_buffered_fd_entity() {
    let fs = new_fs();
    fs.create("/a.txt", 0o644).await.unwrap();
    fs.write_file("/a.txt", b"data", 0).await.unwrap();
    fs.remove("/a.txt").await.unwrap();

    assert!(fs.get_attr("/a.txt").await.is_err());
}
