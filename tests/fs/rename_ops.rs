use crate::common::new_fs;
use s3fs::fs::S_IFDIR;

#[tokio::test]
async fn rename_file_preserves_bytes() {
    let fs = new_fs();
    fs.create("/a.txt", 0o644).await.unwrap();
    fs.write_file("/a.txt", b"payload", 0).await.unwrap();
    fs.flush("/a.txt").await.unwrap();

    fs.rename("/a.txt", "/b.txt").await.unwrap();

    let data = fs.read_file("/b.txt", 0, 0).await.unwrap();
    assert_eq!(data, b"payload");
    assert_eq!(fs.get_attr("/a.txt").await.unwrap_err(), s3fs::error::Error::NotFound);
}

#[tokio::test]
async fn rename_directory_moves_all_children() {
    let fs = new_fs();
    fs.mkdir("/src", 0o755).await.unwrap();
    fs.create("/src/a.txt", 0o644).await.unwrap();
    fs.write_file("/src/a.txt", b"one", 0).await.unwrap();
    fs.flush("/src/a.txt").await.unwrap();
    fs.create("/src/b.txt", 0o644).await.unwrap();
    fs.write_file("/src/b.txt", b"two", 0).await.unwrap();
    fs.flush("/src/b.txt").await.unwrap();

    fs.rename("/src", "/dst").await.unwrap();

    let attr = fs.get_attr("/dst").await.unwrap();
    assert_eq!(attr.mode & S_IFDIR, S_IFDIR);
    assert_eq!(fs.read_file("/dst/a.txt", 0, 0).await.unwrap(), b"one");
    assert_eq!(fs.read_file("/dst/b.txt", 0, 0).await.unwrap(), b"two");
    assert!(fs.get_attr("/src/a.txt").await.is_err());
}

#[tokio::test]
async fn rename_of_missing_source_is_not_found() {
    let fs = new_fs();
    let err = fs.rename("/missing", "/also-missing").await.unwrap_err();
    assert_eq!(err, s3fs::error::Error::NotFound);
}
