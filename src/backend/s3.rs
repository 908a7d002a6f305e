//! S3 (or S3-compatible) [`Backend`] implementation.
//!
//! Translates to `ListObjectsV2`, `GetObject` (with a `Range` header),
//! `PutObject`, `HeadObject`, `DeleteObject`, `CopyObject` (with a
//! replace-metadata directive), and the multipart family. Multipart upload
//! and multipart copy trigger when a body or copy source is at least
//! [`MULTIPART_THRESHOLD`] bytes, split into [`PART_SIZE`]-sized parts.

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart, MetadataDirective};
use aws_sdk_s3::Client;

use super::{Attr, Backend, BackendError, Metadata};

/// Objects at or above this size use multipart upload / multipart copy.
pub const MULTIPART_THRESHOLD: usize = 5 * 1024 * 1024;

/// Size of each part in a multipart upload or copy.
pub const PART_SIZE: usize = 5 * 1024 * 1024;

/// S3 adapter. Safe to share across tasks: the underlying SDK client owns
/// its own connection pool.
pub struct S3Backend {
    client: Client,
    bucket: String,
}

impl S3Backend {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self { client, bucket: bucket.into() }
    }

    fn classify_sdk_error<E: std::fmt::Debug>(err: &E, msg: &str) -> BackendError {
        tracing::warn!(error = ?err, "{msg}");
        BackendError::Transient
    }

    async fn put_small(
        &self,
        path: &str,
        data: Vec<u8>,
        metadata: Metadata,
    ) -> Result<(), BackendError> {
        let mut req = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .body(ByteStream::from(data));
        for (k, v) in metadata {
            req = req.metadata(k, v);
        }
        req.send().await.map_err(|e| Self::classify_sdk_error(&e, "put_object failed"))?;
        Ok(())
    }

    async fn put_multipart(
        &self,
        path: &str,
        data: Vec<u8>,
        metadata: Metadata,
    ) -> Result<(), BackendError> {
        let mut create = self.client.create_multipart_upload().bucket(&self.bucket).key(path);
        for (k, v) in metadata {
            create = create.metadata(k, v);
        }
        let created = create
            .send()
            .await
            .map_err(|e| Self::classify_sdk_error(&e, "create_multipart_upload failed"))?;
        let upload_id = created.upload_id().ok_or(BackendError::Fatal)?.to_string();

        let mut completed = Vec::new();
        for (i, chunk) in data.chunks(PART_SIZE).enumerate() {
            let part_number = (i + 1) as i32;
            let uploaded = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(path)
                .upload_id(&upload_id)
                .part_number(part_number)
                .body(ByteStream::from(chunk.to_vec()))
                .send()
                .await
                .map_err(|e| Self::classify_sdk_error(&e, "upload_part failed"))?;
            let etag = uploaded.e_tag().unwrap_or_default().to_string();
            completed.push(CompletedPart::builder().e_tag(etag).part_number(part_number).build());
        }

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(path)
            .upload_id(&upload_id)
            .multipart_upload(CompletedMultipartUpload::builder().set_parts(Some(completed)).build())
            .send()
            .await
            .map_err(|e| Self::classify_sdk_error(&e, "complete_multipart_upload failed"))?;
        Ok(())
    }

    async fn rename_multipart(&self, old: &str, new: &str, size: i64) -> Result<(), BackendError> {
        let metadata = self.get_metadata(old).await?;
        let mut create = self.client.create_multipart_upload().bucket(&self.bucket).key(new);
        for (k, v) in metadata {
            create = create.metadata(k, v);
        }
        let created = create
            .send()
            .await
            .map_err(|e| Self::classify_sdk_error(&e, "create_multipart_upload failed"))?;
        let upload_id = created.upload_id().ok_or(BackendError::Fatal)?.to_string();
        let copy_source = format!("{}/{}", self.bucket, old);

        let mut completed = Vec::new();
        let mut offset: i64 = 0;
        let mut part_number = 1;
        while offset < size {
            let end = (offset + PART_SIZE as i64 - 1).min(size - 1);
            let uploaded = self
                .client
                .upload_part_copy()
                .bucket(&self.bucket)
                .key(new)
                .upload_id(&upload_id)
                .part_number(part_number)
                .copy_source(&copy_source)
                .copy_source_range(format!("bytes={offset}-{end}"))
                .send()
                .await
                .map_err(|e| Self::classify_sdk_error(&e, "upload_part_copy failed"))?;
            let etag =
                uploaded.copy_part_result().and_then(|r| r.e_tag()).unwrap_or_default().to_string();
            completed.push(CompletedPart::builder().e_tag(etag).part_number(part_number).build());
            offset = end + 1;
            part_number += 1;
        }

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(new)
            .upload_id(&upload_id)
            .multipart_upload(CompletedMultipartUpload::builder().set_parts(Some(completed)).build())
            .send()
            .await
            .map_err(|e| Self::classify_sdk_error(&e, "complete_multipart_upload failed"))?;

        self.delete(old).await
    }
}

fn attr_from_head(
    content_length: i64,
    last_modified: Option<SystemTime>,
    metadata: &Metadata,
) -> Attr {
    let mode = metadata
        .get("mode")
        .and_then(|s| u32::from_str_radix(s, 8).ok())
        .unwrap_or(0o100644);
    let uid = metadata.get("uid").and_then(|s| s.parse().ok()).unwrap_or(0);
    let gid = metadata.get("gid").and_then(|s| s.parse().ok()).unwrap_or(0);
    let mtime = metadata
        .get("mtime")
        .and_then(|s| s.parse::<u64>().ok())
        .map(|secs| UNIX_EPOCH + std::time::Duration::from_secs(secs))
        .or(last_modified)
        .unwrap_or(UNIX_EPOCH);
    Attr { mode, size: content_length, mtime, uid, gid }
}

#[async_trait]
impl Backend for S3Backend {
    async fn read(&self, path: &str) -> Result<Vec<u8>, BackendError> {
        self.read_range(path, 0, 0).await
    }

    async fn read_range(
        &self,
        path: &str,
        start: u64,
        end_inclusive: u64,
    ) -> Result<Vec<u8>, BackendError> {
        let mut req = self.client.get_object().bucket(&self.bucket).key(path);
        if start != 0 || end_inclusive != 0 {
            let range = if end_inclusive == 0 {
                format!("bytes={start}-")
            } else {
                format!("bytes={start}-{end_inclusive}")
            };
            req = req.range(range);
        }
        let resp = req.send().await.map_err(|e| {
            if is_not_found(&e) {
                BackendError::NotFound
            } else {
                Self::classify_sdk_error(&e, "get_object failed")
            }
        })?;
        let bytes = resp
            .body
            .collect()
            .await
            .map_err(|e| Self::classify_sdk_error(&e, "collecting get_object body failed"))?;
        Ok(bytes.into_bytes().to_vec())
    }

    async fn write(&self, path: &str, data: Vec<u8>) -> Result<(), BackendError> {
        self.write_with_metadata(path, data, Metadata::new()).await
    }

    async fn write_with_metadata(
        &self,
        path: &str,
        data: Vec<u8>,
        metadata: Metadata,
    ) -> Result<(), BackendError> {
        if data.len() >= MULTIPART_THRESHOLD {
            self.put_multipart(path, data, metadata).await
        } else {
            self.put_small(path, data, metadata).await
        }
    }

    async fn delete(&self, path: &str) -> Result<(), BackendError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| Self::classify_sdk_error(&e, "delete_object failed"))?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, BackendError> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let mut req = self.client.list_objects_v2().bucket(&self.bucket).prefix(prefix);
            if let Some(token) = &continuation {
                req = req.continuation_token(token);
            }
            let resp = req
                .send()
                .await
                .map_err(|e| Self::classify_sdk_error(&e, "list_objects_v2 failed"))?;
            for obj in resp.contents() {
                if let Some(key) = obj.key() {
                    keys.push(key.to_string());
                }
            }
            match resp.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }
        Ok(keys)
    }

    async fn get_attr(&self, path: &str) -> Result<Attr, BackendError> {
        let resp = self.client.head_object().bucket(&self.bucket).key(path).send().await.map_err(
            |e| {
                if is_not_found(&e) {
                    BackendError::NotFound
                } else {
                    Self::classify_sdk_error(&e, "head_object failed")
                }
            },
        )?;
        let metadata: Metadata = resp.metadata().cloned().unwrap_or_default();
        let last_modified = resp.last_modified().and_then(|t| t.to_owned().try_into().ok());
        Ok(attr_from_head(resp.content_length().unwrap_or(0), last_modified, &metadata))
    }

    async fn get_metadata(&self, path: &str) -> Result<Metadata, BackendError> {
        let resp = self.client.head_object().bucket(&self.bucket).key(path).send().await.map_err(
            |e| {
                if is_not_found(&e) {
                    BackendError::NotFound
                } else {
                    Self::classify_sdk_error(&e, "head_object failed")
                }
            },
        )?;
        Ok(resp.metadata().cloned().unwrap_or_default())
    }

    async fn rename(&self, old: &str, new: &str) -> Result<(), BackendError> {
        let attr = self.get_attr(old).await?;
        if attr.size as usize >= MULTIPART_THRESHOLD {
            return self.rename_multipart(old, new, attr.size).await;
        }
        let copy_source = format!("{}/{}", self.bucket, old);
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .key(new)
            .copy_source(copy_source)
            .metadata_directive(MetadataDirective::Copy)
            .send()
            .await
            .map_err(|e| Self::classify_sdk_error(&e, "copy_object failed"))?;
        self.delete(old).await
    }

    async fn exists(&self, path: &str) -> bool {
        self.client.head_object().bucket(&self.bucket).key(path).send().await.is_ok()
    }
}

fn is_not_found<E>(err: &aws_sdk_s3::error::SdkError<E>) -> bool
where
    E: std::fmt::Debug,
{
    // S3 surfaces missing keys/objects as a service error with a 404 status
    // on the raw HTTP response; the typed error variants differ per
    // operation (`NoSuchKey`, `NotFound`, ...) so we key off the status.
    matches!(
        err.raw_response().map(|r| r.status().as_u16()),
        Some(404)
    )
}
