//! Driver: fans the per-unit weave pipeline out across a thread pool.
//!
//! Units are independent — the schema tables are read-only after load — so
//! every artifact is mapped, decoded, transactified and written with no
//! coordination. A unit either commits its primary plus capture outputs or
//! fails in place; failures are carried in the report and never abort the
//! rest of the run.

use crate::codec;
use crate::emit::{self, WrittenArtifact};
use crate::scan::collect_artifacts;
use crate::schema::SchemaTables;
use crate::transform::transactify;
use anyhow::{Context, Result};
use memmap2::Mmap;
use rayon::prelude::*;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Woven,
    Unchanged,
    Failed,
}

#[derive(Debug, Serialize)]
pub struct UnitReport {
    pub path: String,
    pub status: UnitStatus,
    pub woven_methods: Vec<String>,
    pub outputs: Vec<WrittenArtifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct WeaveReport {
    pub scanned: usize,
    pub woven_units: usize,
    pub unchanged_units: usize,
    pub failed_units: usize,
    pub duration_ms: u64,
    pub units: Vec<UnitReport>,
}

pub fn weave_paths(paths: &[PathBuf], schema: &SchemaTables) -> Result<WeaveReport> {
    let start = Instant::now();
    let artifacts = collect_artifacts(paths)?;

    let units: Vec<UnitReport> = artifacts
        .par_iter()
        .map(|path| weave_file(path, schema))
        .collect();

    let woven_units = units.iter().filter(|u| u.status == UnitStatus::Woven).count();
    let failed_units = units.iter().filter(|u| u.status == UnitStatus::Failed).count();

    Ok(WeaveReport {
        scanned: artifacts.len(),
        woven_units,
        unchanged_units: units.len() - woven_units - failed_units,
        failed_units,
        duration_ms: start.elapsed().as_millis() as u64,
        units,
    })
}

fn weave_file(path: &Path, schema: &SchemaTables) -> UnitReport {
    let start = Instant::now();
    match try_weave(path, schema) {
        Ok((woven_methods, outputs)) => UnitReport {
            path: path.to_string_lossy().to_string(),
            status: if woven_methods.is_empty() {
                UnitStatus::Unchanged
            } else {
                UnitStatus::Woven
            },
            woven_methods,
            outputs,
            error: None,
            duration_ms: start.elapsed().as_millis() as u64,
        },
        Err(err) => UnitReport {
            path: path.to_string_lossy().to_string(),
            status: UnitStatus::Failed,
            woven_methods: vec![],
            outputs: vec![],
            error: Some(format!("{err:#}")),
            duration_ms: start.elapsed().as_millis() as u64,
        },
    }
}

fn try_weave(
    path: &Path,
    schema: &SchemaTables,
) -> Result<(Vec<String>, Vec<WrittenArtifact>)> {
    let woven = {
        let file = File::open(path)
            .with_context(|| format!("failed to open artifact {}", path.display()))?;
        // SAFETY: The file is opened read-only and the map is dropped
        // before the artifact is rewritten below.
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("failed to map artifact {}", path.display()))?;
        let unit = codec::decode(&mmap)
            .with_context(|| format!("failed to decode {}", path.display()))?;
        transactify(unit, schema)
            .with_context(|| format!("failed to transform {}", path.display()))?
    };

    if woven.woven_methods.is_empty() {
        return Ok((vec![], vec![]));
    }

    let outputs = emit::write_woven(path, &woven)
        .with_context(|| format!("failed to persist outputs for {}", path.display()))?;
    Ok((woven.woven_methods, outputs))
}

/// Decode a single artifact for inspection, without touching it.
pub fn decode_artifact(path: &Path) -> Result<crate::model::ClassUnit> {
    let file =
        File::open(path).with_context(|| format!("failed to open artifact {}", path.display()))?;
    // SAFETY: read-only map over a file nothing writes while it is mapped.
    let mmap = unsafe { Mmap::map(&file) }
        .with_context(|| format!("failed to map artifact {}", path.display()))?;
    codec::decode(&mmap).with_context(|| format!("failed to decode {}", path.display()))
}
