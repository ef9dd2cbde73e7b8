/*!
 * File and directory utilities.
 *
 * Thin wrappers over std::fs and walkdir used by catalogue loading and
 * output writing. All errors carry the offending path.
 */

use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub struct FileManager;

impl FileManager {
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_file()
    }

    pub fn dir_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_dir()
    }

    /// Create a directory and its parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path)
                .with_context(|| format!("Failed to create directory: {}", path.display()))?;
        }
        Ok(())
    }

    /// Find files with a specific extension under a directory, sorted by
    /// path for deterministic catalogue ordering
    pub fn find_files<P: AsRef<Path>>(dir: P, extension: &str) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        if !Self::dir_exists(dir) {
            return Err(anyhow!("Directory does not exist: {}", dir.display()));
        }

        let wanted = extension.trim_start_matches('.');
        let mut result = Vec::new();

        for entry in WalkDir::new(dir).follow_links(true) {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();

            if path.is_file() {
                if let Some(ext) = path.extension() {
                    if ext.to_string_lossy().eq_ignore_ascii_case(wanted) {
                        result.push(path.to_path_buf());
                    }
                }
            }
        }

        result.sort();
        Ok(result)
    }

    /// Find candidate reference catalogue files
    pub fn scan_xml_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
        Self::find_files(dir, "xml")
    }

    pub fn read_to_string<P: AsRef<Path>>(path: P) -> Result<String> {
        fs::read_to_string(&path)
            .with_context(|| format!("Failed to read file: {}", path.as_ref().display()))
    }

    /// Write a string to a file, creating parent directories as needed
    pub fn write_to_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            Self::ensure_dir(parent)?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write to file: {}", path.as_ref().display()))
    }

    /// Output path for a grafted document: `<stem>.<language>.xml` when a
    /// language code is known, `<stem>.xml` otherwise
    pub fn grafted_output_path<P1: AsRef<Path>, P2: AsRef<Path>>(
        translation_path: P1,
        output_dir: P2,
        language: Option<&str>,
    ) -> PathBuf {
        let stem = translation_path
            .as_ref()
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());

        let mut filename = stem;
        if let Some(code) = language {
            filename.push('.');
            filename.push_str(code);
        }
        filename.push_str(".xml");

        output_dir.as_ref().join(filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_findFiles_shouldFilterByExtensionCaseInsensitive() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.xml"), "<d/>").unwrap();
        fs::write(dir.path().join("b.XML"), "<d/>").unwrap();
        fs::write(dir.path().join("c.txt"), "text").unwrap();

        let found = FileManager::scan_xml_files(dir.path()).unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_findFiles_missingDir_shouldFail() {
        assert!(FileManager::find_files("/nonexistent/path/here", "xml").is_err());
    }

    #[test]
    fn test_findFiles_shouldReturnSortedPaths() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("zz.xml"), "<d/>").unwrap();
        fs::write(dir.path().join("aa.xml"), "<d/>").unwrap();

        let found = FileManager::scan_xml_files(dir.path()).unwrap();
        assert!(found[0] < found[1]);
    }

    #[test]
    fn test_writeToFile_shouldCreateParentDirs() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c.txt");

        FileManager::write_to_file(&nested, "content").unwrap();
        assert_eq!(FileManager::read_to_string(&nested).unwrap(), "content");
    }

    #[test]
    fn test_graftedOutputPath_shouldIncludeLanguageCode() {
        let path = FileManager::grafted_output_path(
            Path::new("/in/prayers-es.pdf"),
            Path::new("/out"),
            Some("es"),
        );
        assert_eq!(path, PathBuf::from("/out/prayers-es.es.xml"));

        let bare = FileManager::grafted_output_path(
            Path::new("/in/prayers-es.pdf"),
            Path::new("/out"),
            None,
        );
        assert_eq!(bare, PathBuf::from("/out/prayers-es.xml"));
    }
}
