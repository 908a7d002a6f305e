use crate::common::new_fs;

#[tokio::test]
async fn mkdir_then_rmdir_round_trips() {
    let fs = new_fs();
    fs.mkdir("/d", 0o755).await.unwrap();
    fs.rmdir("/d").await.unwrap();

    let err = fs.get_attr("/d").await.unwrap_err();
    assert_eq!(err, s3fs::error::Error::NotFound);
}

#[tokio::test]
async fn rmdir_rejects_non_empty_directory() {
    let fs = new_fs();
    fs.mkdir("/d", 0o755).await.unwrap();
    fs.create("/d/a.txt", 0o644).await.unwrap();

    let err = fs.rmdir("/d").await.unwrap_err();
    assert_eq!(err, s3fs::error::Error::NotEmpty);
}

#[tokio::test]
async fn listing_directory_with_only_keep_marker_returns_that_entry() {
    let fs = new_fs();
    fs.mkdir("/d", 0o755).await.unwrap();

    let entries = fs.read_dir("/d").await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, ".keep");
    assert!(!entries[0].is_dir);
}

#[tokio::test]
async fn mkdir_over_existing_directory_is_already_exists() {
    let fs = new_fs();
    fs.mkdir("/d", 0o755).await.unwrap();
    let err = fs.mkdir("/d", 0o755).await.unwrap_err();
    assert_eq!(err, s3fs::error::Error::AlreadyExists);
}

#[tokio::test]
async fn read_dir_lists_files_and_subdirectories_together() {
    let fs = new_fs();
    fs.mkdir("/d", 0o755).await.unwrap();
    fs.create("/d/a.txt", 0o644).await.unwrap();
    fs.mkdir("/d/sub", 0o755).await.unwrap();

    let mut names: Vec<String> = fs.read_dir("/d").await.unwrap().into_iter().map(|e| e.name).collect();
    names.sort();
    assert_eq!(names, vec![".keep", "a.txt", "sub"]);
}
