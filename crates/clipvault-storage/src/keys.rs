//! Shared key and ID derivation.
//!
//! Everything here is a pure function of configuration and the source key, so
//! packaged output paths can be recomputed without an ID registry.

use chrono::{DateTime, Utc};
use clipvault_core::constants::{MASTER_MANIFEST_NAME, POSTER_EXTENSION};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

use crate::traits::{StorageError, StorageResult};

/// Hex characters kept from the key digest (128 bits).
pub const VIDEO_ID_HEX_LEN: usize = 32;

const MAX_FILENAME_LEN: usize = 128;

/// Derive the stable video ID for a source key: `{tag}_{32 hex chars of sha256(key)}`.
pub fn video_id_for_key(tag: &str, key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    let hex = hex::encode(digest);
    format!("{}_{}", tag, &hex[..VIDEO_ID_HEX_LEN])
}

/// Join a normalized prefix and a relative path with a single `/`.
pub fn join_key(prefix: &str, rest: &str) -> String {
    let rest = rest.trim_start_matches('/');
    if prefix.is_empty() {
        rest.to_string()
    } else {
        format!("{}/{}", prefix.trim_end_matches('/'), rest)
    }
}

/// `{hls_prefix}/{video_id}/master.m3u8`
pub fn hls_manifest_key(hls_prefix: &str, video_id: &str) -> String {
    hls_object_key(hls_prefix, video_id, MASTER_MANIFEST_NAME)
}

/// `{hls_prefix}/{video_id}/{relative}` for any file of a packaged bundle.
pub fn hls_object_key(hls_prefix: &str, video_id: &str, relative: &str) -> String {
    join_key(&join_key(hls_prefix, video_id), relative)
}

/// `{poster_prefix}/{video_id}.jpg`
pub fn poster_key(poster_prefix: &str, video_id: &str) -> String {
    join_key(poster_prefix, &format!("{}.{}", video_id, POSTER_EXTENSION))
}

fn non_word_chars() -> StorageResult<&'static Regex> {
    static PATTERN: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"[^\w.\-]"))
        .as_ref()
        .map_err(|e| StorageError::InvalidKey(format!("filename pattern: {}", e)))
}

/// Replace every character outside `[A-Za-z0-9_.-]` with `_`.
///
/// Slashes and backslashes are replaced too, so the result is always a single
/// path segment. Overlong names keep their tail (and therefore their extension).
pub fn sanitize_filename(filename: &str) -> StorageResult<String> {
    let ascii: String = filename
        .chars()
        .map(|c| if c.is_ascii() { c } else { '_' })
        .collect();
    let sanitized = non_word_chars()?.replace_all(&ascii, "_").into_owned();
    if sanitized.len() > MAX_FILENAME_LEN {
        Ok(sanitized[sanitized.len() - MAX_FILENAME_LEN..].to_string())
    } else {
        Ok(sanitized)
    }
}

/// Destination key for a direct upload: `{upload_prefix}/{millis}-{sanitized filename}`.
pub fn inbox_key(
    upload_prefix: &str,
    filename: &str,
    now: DateTime<Utc>,
) -> StorageResult<String> {
    Ok(join_key(
        upload_prefix,
        &format!("{}-{}", now.timestamp_millis(), sanitize_filename(filename)?),
    ))
}

/// Reject keys that would land inside a packaging output prefix.
pub fn ensure_not_reserved(key: &str, reserved_prefixes: &[&str]) -> StorageResult<()> {
    for prefix in reserved_prefixes {
        let prefix = prefix.trim_matches('/');
        if prefix.is_empty() {
            continue;
        }
        if key == prefix || key.starts_with(&format!("{}/", prefix)) {
            return Err(StorageError::InvalidKey(format!(
                "key '{}' collides with reserved prefix '{}'",
                key, prefix
            )));
        }
    }
    Ok(())
}

/// Listing prefix sent to the store: a normalized folder followed by `/`.
pub fn folder_prefix(prefix: &str) -> Option<String> {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(format!("{}/", trimmed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;

    #[test]
    fn test_video_id_is_deterministic() {
        let a = video_id_for_key("b2", "videos/raw/clip123.mp4");
        let b = video_id_for_key("b2", "videos/raw/clip123.mp4");
        assert_eq!(a, b);
        assert!(a.starts_with("b2_"));
        assert_eq!(a.len(), 3 + VIDEO_ID_HEX_LEN);
        assert!(a[3..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_video_id_known_value() {
        // sha256("videos/raw/clip123.mp4") is stable across processes and platforms
        let digest = hex::encode(Sha256::digest(b"videos/raw/clip123.mp4"));
        assert_eq!(
            video_id_for_key("b2", "videos/raw/clip123.mp4"),
            format!("b2_{}", &digest[..32])
        );
    }

    #[test]
    fn test_video_id_does_not_leak_layout() {
        let id = video_id_for_key("b2", "videos/raw/clip123.mp4");
        assert!(!id.contains("videos"));
        assert!(!id.contains("clip123"));
    }

    #[test]
    fn test_video_ids_do_not_collide() {
        let mut seen = HashSet::new();
        for i in 0..50_000 {
            let key = format!("videos/inbox/{}-clip_{}.mp4", 1_700_000_000_000u64 + i, i % 97);
            assert!(seen.insert(video_id_for_key("b2", &key)), "collision at {}", key);
        }
        for i in 0..5_000 {
            let key = format!("videos/raw/batch{}/take{}.MOV", i / 100, i);
            assert!(seen.insert(video_id_for_key("b2", &key)), "collision at {}", key);
        }
    }

    #[test]
    fn test_output_paths() {
        assert_eq!(hls_manifest_key("hls", "b2_x"), "hls/b2_x/master.m3u8");
        assert_eq!(
            hls_object_key("hls", "b2_x", "v0/segment_000.ts"),
            "hls/b2_x/v0/segment_000.ts"
        );
        assert_eq!(poster_key("poster", "b2_x"), "poster/b2_x.jpg");
        assert_eq!(poster_key("", "b2_x"), "b2_x.jpg");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("my clip (1).mp4").unwrap(), "my_clip__1_.mp4");
        assert_eq!(sanitize_filename("../../etc/passwd").unwrap(), ".._.._etc_passwd");
        assert_eq!(sanitize_filename("C:\\fakepath\\a.mov").unwrap(), "C__fakepath_a.mov");
        assert_eq!(sanitize_filename("vidéo.mp4").unwrap(), "vid_o.mp4");
        let long = format!("{}.mp4", "a".repeat(300));
        let sanitized = sanitize_filename(&long).unwrap();
        assert_eq!(sanitized.len(), MAX_FILENAME_LEN);
        assert!(sanitized.ends_with(".mp4"));
    }

    #[test]
    fn test_inbox_key_is_single_segment_under_prefix() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let key = inbox_key("videos/inbox", "../hls/evil.mp4", now).unwrap();
        assert_eq!(key, "videos/inbox/1704067200000-.._hls_evil.mp4");
        assert_eq!(key.matches('/').count(), 2);
    }

    #[test]
    fn test_ensure_not_reserved() {
        assert!(ensure_not_reserved("videos/inbox/1-a.mp4", &["hls", "poster"]).is_ok());
        assert!(ensure_not_reserved("hls/b2_x/master.m3u8", &["hls", "poster"]).is_err());
        assert!(ensure_not_reserved("poster", &["hls", "poster"]).is_err());
        assert!(ensure_not_reserved("posters/a.mp4", &["hls", "poster"]).is_ok());
    }

    #[test]
    fn test_folder_prefix() {
        assert_eq!(folder_prefix("videos"), Some("videos/".to_string()));
        assert_eq!(folder_prefix("/videos/raw/"), Some("videos/raw/".to_string()));
        assert_eq!(folder_prefix(""), None);
    }
}
