// Phase 0 (precursor to Scan): enumerate the concrete files named by a
// session's source paths, which may mix individual files and directories.
// Grounded on the teacher's ingest file-walking (`walkdir` over a chosen
// root), generalized to accept a list of sources rather than a single root.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

pub fn discover_files(source_paths: &[String]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for source in source_paths {
        let path = Path::new(source);
        if path.is_file() {
            files.push(path.to_path_buf());
        } else if path.is_dir() {
            for entry in WalkDir::new(path).into_iter().filter_map(|e| e.ok()) {
                if entry.file_type().is_file() {
                    files.push(entry.into_path());
                }
            }
        }
    }
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn discover_files_walks_nested_directories() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"a").unwrap();
        std::fs::write(dir.path().join("sub").join("b.jpg"), b"b").unwrap();

        let found = discover_files(&[dir.path().display().to_string()]);
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn discover_files_accepts_a_single_file_path() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.jpg");
        std::fs::write(&file, b"a").unwrap();

        let found = discover_files(&[file.display().to_string()]);
        assert_eq!(found, vec![file]);
    }
}
