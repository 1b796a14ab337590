use crate::error::SourceError;
use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Supplies raw export documents to the importer.
pub trait SourceReader {
    /// Short label for the kind of source, recorded in rendered documents.
    fn kind(&self) -> &str;
    fn list(&self) -> Result<Vec<String>, SourceError>;
    fn read(&self, path: &str) -> Result<String, SourceError>;
}

/// JSON exports on the local filesystem: a single file or a directory tree.
#[derive(Debug, Clone)]
pub struct LocalSource {
    root: PathBuf,
}

impl LocalSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalSource { root: root.into() }
    }
}

impl SourceReader for LocalSource {
    fn kind(&self) -> &str {
        "local"
    }

    fn list(&self) -> Result<Vec<String>, SourceError> {
        if !self.root.exists() {
            return Err(SourceError::NotFound(self.root.display().to_string()));
        }
        if self.root.is_file() {
            return Ok(vec![self.root.display().to_string()]);
        }
        find_export_files(&self.root)
            .map(|paths| paths.iter().map(|p| p.display().to_string()).collect())
    }

    /// Reads a path as returned by [`list`](SourceReader::list); anything
    /// that does not sit under the root is refused.
    fn read(&self, path: &str) -> Result<String, SourceError> {
        let candidate = Path::new(path);
        let escapes = candidate.components().any(|c| c == Component::ParentDir);
        if escapes || !candidate.starts_with(&self.root) {
            return Err(SourceError::OutsideRoot {
                path: path.to_string(),
                root: self.root.display().to_string(),
            });
        }
        fs::read_to_string(candidate).map_err(|e| SourceError::ReadFailed {
            path: path.to_string(),
            source: e,
        })
    }
}

/// Every `*.json` file under `root`, sorted so runs visit sources in the same order.
pub fn find_export_files(root: &Path) -> Result<Vec<PathBuf>, SourceError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| SourceError::ListFailed {
            path: root.display().to_string(),
            message: e.to_string(),
        })?;
        let is_json = entry
            .path()
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if entry.file_type().is_file() && is_json {
            files.push(entry.path().to_path_buf());
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_export_files_recurses_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("b.json"), "{}").unwrap();
        fs::write(dir.path().join("a.JSON"), "{}").unwrap();
        fs::write(dir.path().join("nested/c.json"), "{}").unwrap();
        fs::write(dir.path().join("notes.txt"), "skip").unwrap();

        let files = find_export_files(dir.path()).unwrap();

        let names: Vec<String> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().display().to_string())
            .collect();
        assert_eq!(names, vec!["a.JSON", "b.json", "nested/c.json"]);
    }

    #[test]
    fn test_local_source_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("export.json");
        fs::write(&file, r#"{"highlights": []}"#).unwrap();

        let source = LocalSource::new(&file);

        let listed = source.list().unwrap();
        assert_eq!(listed, vec![file.display().to_string()]);
        assert_eq!(source.read(&listed[0]).unwrap(), r#"{"highlights": []}"#);
    }

    #[test]
    fn test_local_source_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let source = LocalSource::new(dir.path().join("missing"));

        assert!(matches!(source.list(), Err(SourceError::NotFound(_))));
    }

    #[test]
    fn test_read_missing_file_is_error() {
        let source = LocalSource::new("/");

        let result = source.read("/definitely/not/here.json");

        assert!(matches!(result, Err(SourceError::ReadFailed { .. })));
    }

    #[test]
    fn test_read_outside_root_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let outside = other.path().join("export.json");
        fs::write(&outside, "{}").unwrap();
        let source = LocalSource::new(dir.path());

        let direct = source.read(&outside.display().to_string());
        let climbing = source.read(&dir.path().join("../export.json").display().to_string());

        assert!(matches!(direct, Err(SourceError::OutsideRoot { .. })));
        assert!(matches!(climbing, Err(SourceError::OutsideRoot { .. })));
    }

    #[test]
    fn test_read_listed_paths_under_directory_root() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested/c.json"), "{\"entries\": []}").unwrap();
        let source = LocalSource::new(dir.path());

        let listed = source.list().unwrap();

        assert_eq!(listed.len(), 1);
        assert_eq!(source.read(&listed[0]).unwrap(), "{\"entries\": []}");
    }
}
