use anyhow::{Result, bail};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use crate::codec::ARTIFACT_EXTENSION;

/// Expand a set of input paths into the compiled-class artifacts beneath
/// them. Files are taken as given (after a suffix check); directories are
/// walked recursively.
pub fn collect_artifacts(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut artifacts = Vec::new();
    for path in paths {
        if path.is_dir() {
            artifacts.extend(scan_dir(path));
        } else if is_artifact(path) {
            artifacts.push(path.clone());
        } else {
            bail!(
                "{} is not a .{ARTIFACT_EXTENSION} artifact or a directory",
                path.display()
            );
        }
    }
    artifacts.sort();
    artifacts.dedup();
    Ok(artifacts)
}

fn scan_dir(base_path: &Path) -> Vec<PathBuf> {
    let (tx, rx) = mpsc::channel();

    let walker = WalkBuilder::new(base_path)
        .hidden(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .build_parallel();

    walker.run(|| {
        let tx = tx.clone();
        Box::new(move |entry| {
            if let Ok(entry) = entry {
                let path = entry.path();
                if is_artifact(path) {
                    let _ = tx.send(path.to_path_buf());
                }
            }
            ignore::WalkState::Continue
        })
    });

    drop(tx);
    rx.iter().collect()
}

fn is_artifact(path: &Path) -> bool {
    path.is_file() && path.extension().is_some_and(|e| e == ARTIFACT_EXTENSION)
}
