use crate::common::new_fs;
use s3fs::fs::S_IFLNK;

#[tokio::test]
async fn symlink_then_readlink_round_trips_target() {
    let fs = new_fs();
    fs.symlink("/a.txt", "/link").await.unwrap();

    let target = fs.readlink("/link").await.unwrap();
    assert_eq!(target, "/a.txt");

    let attr = fs.get_attr("/link").await.unwrap();
    assert_eq!(attr.mode & S_IFLNK, S_IFLNK);
}

#[tokio::test]
async fn symlink_over_existing_path_is_already_exists() {
    let fs = new_fs();
    fs.create("/a.txt", 0o644).await.unwrap();
    let err = fs.symlink("/elsewhere", "/a.txt").await.unwrap_err();
    assert_eq!(err, s3fs::error::Error::AlreadyExists);
}

#[tokio::test]
async fn link_and_mknod_are_not_supported() {
    let fs = new_fs();
    assert_eq!(fs.link().await.unwrap_err(), s3fs::error::Error::NotSupported);
    assert_eq!(fs.mknod().await.unwrap_err(), s3fs::error::Error::NotSupported);
}
