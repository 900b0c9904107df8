//! Enumerating project files by extension.

use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// Suffix of C sources.
pub const C_SUFFIX: &str = ".c";
/// Suffix of TeSSLa specification files.
pub const SPEC_SUFFIX: &str = ".tessla";
/// Suffix of compiled specifications.
pub const COMPILED_SPEC_SUFFIX: &str = ".tessla.json";

/// Directories holding third-party packages, never scanned.
const DEPENDENCY_DIRS: &[&str] = &["node_modules"];

/// Lists files under `root` whose name ends with `suffix`, sorted by path.
///
/// Hidden files and directories and dependency-module directories are
/// skipped. Unreadable entries are ignored.
#[must_use]
pub fn scan_files(root: &Path, suffix: &str) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_excluded(entry))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                debug!(root = %root.display(), error = %err, "Skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(suffix))
        .map(DirEntry::into_path)
        .collect()
}

/// C sources of the project.
#[must_use]
pub fn c_sources(root: &Path) -> Vec<PathBuf> {
    scan_files(root, C_SUFFIX)
}

/// Specification files of the project.
#[must_use]
pub fn spec_files(root: &Path) -> Vec<PathBuf> {
    scan_files(root, SPEC_SUFFIX)
}

/// Compiled specifications in a build directory.
#[must_use]
pub fn compiled_specs(output_dir: &Path) -> Vec<PathBuf> {
    scan_files(output_dir, COMPILED_SPEC_SUFFIX)
}

fn is_excluded(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.')
        || (entry.file_type().is_dir() && DEPENDENCY_DIRS.contains(&name.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_scan_by_suffix() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "main.c");
        touch(dir.path(), "lib/util.c");
        touch(dir.path(), "lib/util.h");
        touch(dir.path(), "spec.tessla");
        touch(dir.path(), "build/instrumented_x.tessla.json");

        assert_eq!(
            c_sources(dir.path()),
            vec![dir.path().join("lib/util.c"), dir.path().join("main.c")]
        );
        assert_eq!(spec_files(dir.path()), vec![dir.path().join("spec.tessla")]);
        assert_eq!(
            compiled_specs(&dir.path().join("build")),
            vec![dir.path().join("build/instrumented_x.tessla.json")]
        );
    }

    #[test]
    fn test_hidden_and_dependency_entries_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "main.c");
        touch(dir.path(), ".hidden.c");
        touch(dir.path(), ".git/objects/x.c");
        touch(dir.path(), "node_modules/pkg/binding.c");

        assert_eq!(c_sources(dir.path()), vec![dir.path().join("main.c")]);
    }

    #[test]
    fn test_missing_root_yields_nothing() {
        assert!(c_sources(Path::new("/definitely/not/here")).is_empty());
    }
}
