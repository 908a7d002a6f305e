//! Metadata codec: parse/serialize mode, uid, gid, atime, mtime, ctime, and
//! `xattr-<name>` from/to the flat string-keyed user-metadata map the
//! backend accepts.
//!
//! The S3 adapter owns the wire-level `x-amz-meta-` prefix; nothing in this
//! module, or anywhere above [`crate::backend`], ever sees that prefix.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::backend::Metadata;

const XATTR_PREFIX: &str = "xattr-";

/// Encode a POSIX mode as the octal string the codec writes for `mode`.
pub fn encode_mode(mode: u32) -> String {
    format!("{mode:o}")
}

/// Decode a mode field, accepting either octal or decimal (spec: "accept
/// either").
pub fn decode_mode(s: &str) -> Option<u32> {
    u32::from_str_radix(s, 8).ok().or_else(|| s.parse().ok())
}

/// Encode a uid/gid as decimal.
pub fn encode_id(id: u32) -> String {
    id.to_string()
}

/// Decode a uid/gid, accepting decimal (and, defensively, octal-looking
/// input produced by a mode-style writer).
pub fn decode_id(s: &str) -> Option<u32> {
    s.parse().ok().or_else(|| u32::from_str_radix(s, 8).ok())
}

/// Encode a timestamp as unix seconds.
pub fn encode_time(time: SystemTime) -> String {
    let secs = time.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO).as_secs();
    secs.to_string()
}

/// Decode a unix-seconds timestamp field.
pub fn decode_time(s: &str) -> Option<SystemTime> {
    s.parse::<u64>().ok().map(|secs| UNIX_EPOCH + Duration::from_secs(secs))
}

/// The metadata key an xattr named `name` is stored under.
pub fn xattr_key(name: &str) -> String {
    format!("{XATTR_PREFIX}{name}")
}

/// Extract the xattr name from a metadata key, if it is one.
pub fn xattr_name(key: &str) -> Option<&str> {
    key.strip_prefix(XATTR_PREFIX)
}

/// Encode an opaque xattr value. Values may contain non-UTF-8 bytes, so they
/// are base64-encoded to round-trip losslessly through the string-keyed
/// metadata map.
pub fn encode_xattr_value(value: &[u8]) -> String {
    BASE64.encode(value)
}

/// Decode an opaque xattr value. Falls back to the raw bytes of the stored
/// string for values written before this encoding was adopted.
pub fn decode_xattr_value(stored: &str) -> Vec<u8> {
    BASE64.decode(stored).unwrap_or_else(|_| stored.as_bytes().to_vec())
}

/// Names of every xattr present in a metadata map.
pub fn list_xattrs(metadata: &Metadata) -> Vec<String> {
    metadata.keys().filter_map(|k| xattr_name(k).map(str::to_string)).collect()
}

/// POSIX attribute fields carried in an object's user-metadata, decoded
/// from the flat map.
#[derive(Debug, Clone, Copy)]
pub struct PosixAttr {
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub ctime: SystemTime,
}

impl PosixAttr {
    /// Decode whatever fields are present, defaulting anything missing.
    pub fn from_metadata(metadata: &Metadata, default_mode: u32) -> Self {
        let now = SystemTime::now();
        Self {
            mode: metadata.get("mode").and_then(|s| decode_mode(s)).unwrap_or(default_mode),
            uid: metadata.get("uid").and_then(|s| decode_id(s)).unwrap_or(0),
            gid: metadata.get("gid").and_then(|s| decode_id(s)).unwrap_or(0),
            atime: metadata.get("atime").and_then(|s| decode_time(s)).unwrap_or(now),
            mtime: metadata.get("mtime").and_then(|s| decode_time(s)).unwrap_or(now),
            ctime: metadata.get("ctime").and_then(|s| decode_time(s)).unwrap_or(now),
        }
    }

    /// Write the fields into a metadata map, preserving any existing xattr
    /// entries already present.
    pub fn merge_into(&self, metadata: &mut Metadata) {
        metadata.insert("mode".to_string(), encode_mode(self.mode));
        metadata.insert("uid".to_string(), encode_id(self.uid));
        metadata.insert("gid".to_string(), encode_id(self.gid));
        metadata.insert("atime".to_string(), encode_time(self.atime));
        metadata.insert("mtime".to_string(), encode_time(self.mtime));
        metadata.insert("ctime".to_string(), encode_time(self.ctime));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_round_trips_octal() {
        let encoded = encode_mode(0o755);
        assert_eq!(encoded, "755");
        assert_eq!(decode_mode(&encoded), Some(0o755));
    }

    #[test]
    fn mode_accepts_decimal_too() {
        assert_eq!(decode_mode("420"), Some(0o644));
    }

    #[test]
    fn time_round_trips() {
        let t = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let encoded = encode_time(t);
        assert_eq!(decode_time(&encoded), Some(t));
    }

    #[test]
    fn xattr_value_round_trips_non_utf8_bytes() {
        let raw = vec![0xff, 0x00, 0x80, b'x'];
        let encoded = encode_xattr_value(&raw);
        assert_eq!(decode_xattr_value(&encoded), raw);
    }

    #[test]
    fn xattr_key_and_name_are_inverse() {
        let key = xattr_key("user.comment");
        assert_eq!(xattr_name(&key), Some("user.comment"));
    }

    #[test]
    fn list_xattrs_filters_non_xattr_keys() {
        let mut metadata = Metadata::new();
        metadata.insert("mode".to_string(), "644".to_string());
        metadata.insert(xattr_key("user.a"), encode_xattr_value(b"1"));
        metadata.insert(xattr_key("user.b"), encode_xattr_value(b"2"));
        let mut names = list_xattrs(&metadata);
        names.sort();
        assert_eq!(names, vec!["user.a".to_string(), "user.b".to_string()]);
    }
}
