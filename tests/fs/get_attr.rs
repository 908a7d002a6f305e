use crate::common::new_fs;
use s3fs::fs::{S_IFDIR, S_IFREG};

#[tokio::test]
async fn write_then_read_small_file() {
    let fs = new_fs();
    fs.create("/a.txt", 0o644).await.unwrap();
    fs.write_file("/a.txt", b"hello", 0).await.unwrap();
    fs.flush("/a.txt").await.unwrap();

    let attr = fs.get_attr("/a.txt").await.unwrap();
    assert_eq!(attr.size, 5);
    assert_eq!(attr.mode & S_IFREG, S_IFREG);

    let data = fs.read_file("/a.txt", 0, 0).await.unwrap();
    assert_eq!(data, b"hello");
}

#[tokio::test]
async fn mkdir_synthesizes_directory_attrs() {
    let fs = new_fs();
    fs.mkdir("/d", 0o755).await.unwrap();
    let attr = fs.get_attr("/d").await.unwrap();
    assert_eq!(attr.mode & S_IFDIR, S_IFDIR);
    assert_eq!(attr.mode & 0o7777, 0o755);
}

#[tokio::test]
async fn repeated_get_attr_is_stable_within_ttl() {
    let fs = new_fs();
    fs.create("/a", 0o644).await.unwrap();
    let a = fs.get_attr("/a").await.unwrap();
    let b = fs.get_attr("/a").await.unwrap();
    assert_eq!(a.mode, b.mode);
    assert_eq!(a.size, b.size);
}

#[tokio::test]
async fn implicit_directory_from_children_has_no_marker() {
    let fs = new_fs();
    fs.create("/dir/file", 0o644).await.unwrap();
    let attr = fs.get_attr("/dir").await.unwrap();
    assert_eq!(attr.mode & S_IFDIR, S_IFDIR);
}

#[tokio::test]
async fn missing_path_is_not_found() {
    let fs = new_fs();
    let err = fs.get_attr("/missing").await.unwrap_err();
    assert_eq!(err, s3fs::error::Error::NotFound);
}
