//! Directory enumeration helpers.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{FlimError, Result};

/// Regular files in `dir` whose name ends with `suffix`, sorted by name so
/// batch order is deterministic.
pub fn files_with_suffix(dir: impl AsRef<Path>, suffix: &str) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let entries = fs::read_dir(dir).map_err(|e| FlimError::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| FlimError::io(dir, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        match path.file_name().and_then(|n| n.to_str()) {
            Some(name) if name.ends_with(suffix) => files.push(path),
            _ => {}
        }
    }
    files.sort();
    Ok(files)
}

/// File name of `path` with `suffix` stripped; the image base name used to
/// key models and feature maps.
pub fn basename(path: &Path, suffix: &str) -> String {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    name.strip_suffix(suffix).unwrap_or(name).to_string()
}

/// Creates a directory and its parents if missing.
pub fn make_dir(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    fs::create_dir_all(path).map_err(|e| FlimError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn enumerates_matching_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b-fpts.txt", "a-fpts.txt", "c.npy", "notes.md"] {
            File::create(dir.path().join(name)).unwrap();
        }
        let files = files_with_suffix(dir.path(), "-fpts.txt").unwrap();
        let names: Vec<String> = files.iter().map(|p| basename(p, "-fpts.txt")).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn basename_strips_only_the_suffix() {
        assert_eq!(basename(Path::new("/x/img01.npy"), ".npy"), "img01");
        assert_eq!(basename(Path::new("img01-fpts.txt"), "-fpts.txt"), "img01");
        assert_eq!(basename(Path::new("img01.txt"), ".npy"), "img01.txt");
    }
}
