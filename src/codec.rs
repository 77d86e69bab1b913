//! Binary codec boundary for compiled class units.
//!
//! `decode` and `encode` are the only places the tool sees raw bytes: a
//! four-byte magic, a little-endian format version, then a bincode payload
//! of the structural model.

use crate::model::ClassUnit;
use anyhow::{Context, Result, bail};

const MAGIC: &[u8; 4] = b"ACLS";
const FORMAT_VERSION: u16 = 1;
const HEADER_LEN: usize = 6;

/// Filename suffix identifying compiled class artifacts.
pub const ARTIFACT_EXTENSION: &str = "class";

pub fn decode(bytes: &[u8]) -> Result<ClassUnit> {
    if bytes.len() < HEADER_LEN || &bytes[..4] != MAGIC {
        bail!("not a compiled class artifact (bad magic)");
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != FORMAT_VERSION {
        bail!("unsupported class artifact format version {version}");
    }
    bincode::deserialize(&bytes[HEADER_LEN..]).context("malformed class artifact payload")
}

pub fn encode(unit: &ClassUnit) -> Result<Vec<u8>> {
    let payload = bincode::serialize(unit)
        .with_context(|| format!("failed to serialize class unit {}", unit.name))?;
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}
