//! Input discovery and output naming

use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};

/// Regular files in `dir` whose name contains `pattern`, sorted by name
pub fn discover_inputs<P: AsRef<Path>>(dir: P, pattern: &str) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let entries = std::fs::read_dir(dir).map_err(|e| PipelineError::io(dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| PipelineError::io(dir, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.contains(pattern));
        if matches {
            files.push(path);
        }
    }
    files.sort();
    log::debug!("Found {} files matching '{}' in {}", files.len(), pattern, dir.display());
    Ok(files)
}

/// File name with every occurrence of `pattern` removed
pub fn base_name<P: AsRef<Path>>(path: P, pattern: &str) -> String {
    let name = path
        .as_ref()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if pattern.is_empty() {
        name
    } else {
        name.replace(pattern, "")
    }
}

/// `{out_dir}/{base}_{label}_{suffix}`
pub fn output_path<P: AsRef<Path>>(out_dir: P, base: &str, label: &str, suffix: &str) -> PathBuf {
    out_dir.as_ref().join(format!("{}_{}_{}", base, label, suffix))
}

/// Create the output directory if needed
pub fn ensure_dir<P: AsRef<Path>>(dir: P) -> Result<()> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir).map_err(|e| PipelineError::io(dir, e))
}
