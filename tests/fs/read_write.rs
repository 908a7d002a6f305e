use crate::common::new_fs;

#[tokio::test]
async fn overwrite_from_offset_zero_truncates() {
    let fs = new_fs();
    fs.create("/a.txt", 0o644).await.unwrap();
    fs.write_file("/a.txt", b"hello world", 0).await.unwrap();
    fs.flush("/a.txt").await.unwrap();

    fs.write_file("/a.txt", b"hi", 0).await.unwrap();
    fs.flush("/a.txt").await.unwrap();

    let data = fs.read_file("/a.txt", 0, 0).await.unwrap();
    assert_eq!(data, b"hi");
    let attr = fs.get_attr("/a.txt").await.unwrap();
    assert_eq!(attr.size, 2);
}

#[tokio::test]
async fn append_beyond_size_extends_and_updates_mtime() {
    let fs = new_fs();
    fs.create("/a.txt", 0o644).await.unwrap();
    fs.write_file("/a.txt", b"hello", 0).await.unwrap();
    fs.flush("/a.txt").await.unwrap();
    let before = fs.get_attr("/a.txt").await.unwrap();

    fs.write_file("/a.txt", b" world", 5).await.unwrap();
    fs.flush("/a.txt").await.unwrap();

    let data = fs.read_file("/a.txt", 0, 0).await.unwrap();
    assert_eq!(data, b"hello world");
    let after = fs.get_attr("/a.txt").await.unwrap();
    assert_eq!(after.size, 11);
    assert!(after.mtime >= before.mtime);
}

#[tokio::test]
async fn partial_overwrite_in_the_middle_preserves_surrounding_bytes() {
    let fs = new_fs();
    fs.create("/a.txt", 0o644).await.unwrap();
    fs.write_file("/a.txt", b"0123456789", 0).await.unwrap();
    fs.flush("/a.txt").await.unwrap();

    fs.write_file("/a.txt", b"XYZ", 3).await.unwrap();
    fs.flush("/a.txt").await.unwrap();

    let data = fs.read_file("/a.txt", 0, 0).await.unwrap();
    assert_eq!(data, b"012XYZ6789");
}

#[tokio::test]
async fn read_with_zero_size_reads_to_eof() {
    let fs = new_fs();
    fs.create("/a.txt", 0o644).await.unwrap();
    fs.write_file("/a.txt", b"abcdef", 0).await.unwrap();
    fs.flush("/a.txt").await.unwrap();

    let data = fs.read_file("/a.txt", 2, 0).await.unwrap();
    assert_eq!(data, b"cdef");
}

#[tokio::test]
async fn read_before_any_flush_sees_buffered_bytes() {
    let fs = new_fs();
    fs.create("/a.txt", 0o644).await.unwrap();
    fs.write_file("/a.txt", b"buffered", 0).await.unwrap();

    let data = fs.read_file("/a.txt", 0, 0).await.unwrap();
    assert_eq!(data, b"buffered");
}
