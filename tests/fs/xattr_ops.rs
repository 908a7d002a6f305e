use crate::common::new_fs;

#[tokio::test]
async fn set_get_list_remove_xattr_round_trip_on_a_file() {
    let fs = new_fs();
    fs.create("/a.txt", 0o644).await.unwrap();

    fs.set_xattr("/a.txt", "user.note", b"hello").await.unwrap();
    let value = fs.get_xattr("/a.txt", "user.note").await.unwrap();
    assert_eq!(value, b"hello");

    let names = fs.list_xattr("/a.txt").await.unwrap();
    assert!(names.contains(&"user.note".to_string()));

    fs.remove_xattr("/a.txt", "user.note").await.unwrap();
    let err = fs.get_xattr("/a.txt", "user.note").await.unwrap_err();
    assert_eq!(err, s3fs::error::Error::NotFound);
}

#[tokio::test]
async fn xattr_round_trip_on_a_directory_targets_its_keep_marker() {
    let fs = new_fs();
    fs.mkdir("/d", 0o755).await.unwrap();

    fs.set_xattr("/d", "user.tag", b"dir-value").await.unwrap();
    let value = fs.get_xattr("/d", "user.tag").await.unwrap();
    assert_eq!(value, b"dir-value");

    let names = fs.list_xattr("/d").await.unwrap();
    assert_eq!(names, vec!["user.tag".to_string()]);
}

#[tokio::test]
async fn xattr_value_round_trips_non_utf8_bytes() {
    let fs = new_fs();
    fs.create("/a.txt", 0o644).await.unwrap();
    let raw: &[u8] = &[0xff, 0x00, 0x80, 0x7f];

    fs.set_xattr("/a.txt", "user.bin", raw).await.unwrap();
    let value = fs.get_xattr("/a.txt", "user.bin").await.unwrap();
    assert_eq!(value, raw);
}

#[tokio::test]
async fn list_xattr_on_object_with_none_is_empty() {
    let fs = new_fs();
    fs.create("/a.txt", 0o644).await.unwrap();
    let names = fs.list_xattr("/a.txt").await.unwrap();
    assert!(names.is_empty());
}
