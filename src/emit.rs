//! Artifact writer.
//!
//! A woven unit and its capture classes are committed together: everything
//! is encoded before anything touches disk, captures are written as
//! sibling files first, and the primary artifact is replaced last via a
//! temp file and an atomic rename so a failed run never leaves a
//! half-written primary behind.

use crate::codec;
use crate::transform::WovenUnit;
use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize)]
pub struct WrittenArtifact {
    pub path: String,
    pub content_hash: String,
    pub bytes: u64,
}

pub fn write_woven(primary_path: &Path, woven: &WovenUnit) -> Result<Vec<WrittenArtifact>> {
    let parent = primary_path.parent().unwrap_or_else(|| Path::new(""));

    let mut staged: Vec<(PathBuf, Vec<u8>)> = Vec::with_capacity(woven.captures.len() + 1);
    for capture in &woven.captures {
        let path = parent.join(format!(
            "{}.{}",
            capture.simple_name(),
            codec::ARTIFACT_EXTENSION
        ));
        staged.push((path, codec::encode(capture)?));
    }
    let primary_bytes = codec::encode(&woven.class)?;

    let mut written = Vec::with_capacity(staged.len() + 1);
    for (path, bytes) in &staged {
        std::fs::write(path, bytes)
            .with_context(|| format!("failed to write capture artifact {}", path.display()))?;
        written.push(artifact_record(path, bytes));
    }

    let mut tmp_os = primary_path.as_os_str().to_os_string();
    tmp_os.push(".tmp");
    let tmp = PathBuf::from(tmp_os);
    std::fs::write(&tmp, &primary_bytes)
        .with_context(|| format!("failed to write temp artifact {}", tmp.display()))?;
    std::fs::rename(&tmp, primary_path).with_context(|| {
        format!(
            "failed to replace primary artifact {}",
            primary_path.display()
        )
    })?;
    written.insert(0, artifact_record(primary_path, &primary_bytes));

    Ok(written)
}

fn artifact_record(path: &Path, bytes: &[u8]) -> WrittenArtifact {
    WrittenArtifact {
        path: path.to_string_lossy().to_string(),
        content_hash: hash_bytes(bytes),
        bytes: bytes.len() as u64,
    }
}

pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
