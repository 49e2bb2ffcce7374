use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

pub fn now_utc_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn ensure_directory(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("failed to create directory: {}", path.display()))
}

pub fn fingerprint<S: AsRef<str>>(identifiers: &[S]) -> String {
    let mut hasher = Sha256::new();
    for identifier in identifiers {
        hasher.update(identifier.as_ref().as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        ensure_directory(parent)?;
    }

    let data = serde_json::to_vec_pretty(value)
        .with_context(|| format!("failed to serialize json: {}", path.display()))?;

    let tmp_path = temp_sibling(path);
    {
        let mut file = File::create(&tmp_path)
            .with_context(|| format!("failed to create json file: {}", tmp_path.display()))?;
        file.write_all(&data)
            .with_context(|| format!("failed to write json file: {}", tmp_path.display()))?;
        file.write_all(b"\n")
            .with_context(|| format!("failed to finalize json file: {}", tmp_path.display()))?;
        file.sync_all()
            .with_context(|| format!("failed to flush json file: {}", tmp_path.display()))?;
    }

    fs::rename(&tmp_path, path).with_context(|| {
        format!(
            "failed to replace {} with {}",
            path.display(),
            tmp_path.display()
        )
    })?;

    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_and_order_sensitive() {
        let ids = ["AP-1", "AP-2", "AP-3"];
        assert_eq!(fingerprint(&ids), fingerprint(&ids));
        assert_ne!(fingerprint(&ids), fingerprint(&["AP-3", "AP-2", "AP-1"]));
    }

    #[test]
    fn fingerprint_hashes_the_concatenation() {
        assert_eq!(fingerprint(&["AP-1", "AP-2"]), fingerprint(&["AP-1AP-2"]));
        assert_eq!(fingerprint::<&str>(&[]), fingerprint(&[""]));
    }

    #[test]
    fn write_json_pretty_replaces_target_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("state.json");

        write_json_pretty(&path, &serde_json::json!({ "index": 1 })).expect("first write");
        write_json_pretty(&path, &serde_json::json!({ "index": 2 })).expect("second write");

        let raw = fs::read_to_string(&path).expect("read back");
        assert!(raw.contains("\"index\": 2"));
        assert!(raw.ends_with('\n'));
        assert!(!temp_sibling(&path).exists());
    }
}
