use std::path::{Path, PathBuf};

use crate::error::DatasetError;

/// One audio file in a dataset index, with its probed duration.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestEntry {
    pub path: PathBuf,
    pub duration_seconds: f64,
}

/// Reads a `path,duration` manifest. Blank lines are skipped; anything
/// else that does not parse is an error naming the offending line.
pub fn read_manifest(path: &Path) -> Result<Vec<ManifestEntry>, DatasetError> {
    let contents =
        std::fs::read_to_string(path).map_err(|e| DatasetError::io("read manifest", e))?;
    let mut entries = Vec::new();
    for (line_no, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        // Durations never hold commas, so split on the last one to keep
        // paths with commas intact.
        let (entry_path, duration) = line.rsplit_once(',').ok_or_else(|| {
            DatasetError::invalid_input(format!(
                "manifest line {} has no ',' separator: '{line}'",
                line_no + 1
            ))
        })?;
        let duration_seconds: f64 = duration.trim().parse().map_err(|_| {
            DatasetError::invalid_input(format!(
                "manifest line {} has a non-numeric duration: '{duration}'",
                line_no + 1
            ))
        })?;
        entries.push(ManifestEntry {
            path: PathBuf::from(entry_path),
            duration_seconds,
        });
    }
    Ok(entries)
}

/// Longest first, ties broken by path so reruns produce identical files.
pub fn sort_entries(entries: &mut [ManifestEntry]) {
    entries.sort_by(|a, b| {
        b.duration_seconds
            .total_cmp(&a.duration_seconds)
            .then_with(|| a.path.cmp(&b.path))
    });
}

pub fn write_manifest(path: &Path, entries: &[ManifestEntry]) -> Result<(), DatasetError> {
    let mut contents = String::new();
    for entry in entries {
        contents.push_str(&format!(
            "{},{}\n",
            entry.path.display(),
            entry.duration_seconds
        ));
    }
    std::fs::write(path, contents).map_err(|e| DatasetError::io("write manifest", e))
}
