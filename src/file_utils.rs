use anyhow::{Result, Context};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// @module: File and directory utilities for line-oriented documents

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_file()
    }

    // @checks: Directory existence
    pub fn dir_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_dir()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.as_os_str().is_empty() && !path.exists() {
            fs::create_dir_all(path)
                .with_context(|| format!("Failed to create directory: {:?}", path))?;
        }
        Ok(())
    }

    /// Find documents with one of the given extensions, sorted by path
    pub fn find_documents<P: AsRef<Path>>(dir: P, extensions: &[String]) -> Result<Vec<PathBuf>> {
        let mut result = Vec::new();

        for entry in WalkDir::new(dir.as_ref()).follow_links(true) {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();

            if path.is_file() && Self::has_extension(path, extensions) {
                result.push(path.to_path_buf());
            }
        }

        result.sort();
        Ok(result)
    }

    fn has_extension(path: &Path, extensions: &[String]) -> bool {
        path.extension().is_some_and(|ext| {
            let ext = ext.to_string_lossy();
            extensions
                .iter()
                .any(|wanted| ext.eq_ignore_ascii_case(wanted.trim_start_matches('.')))
        })
    }

    /// Path of `path` below `root` with forward slashes
    pub fn relative_path(root: &Path, path: &Path) -> String {
        let relative = path.strip_prefix(root).unwrap_or(path);
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Read a file to a string
    pub fn read_to_string<P: AsRef<Path>>(path: P) -> Result<String> {
        fs::read_to_string(&path)
            .with_context(|| format!("Failed to read file: {:?}", path.as_ref()))
    }

    /// Read a document as lines; `\r\n` and `\n` both end a line
    pub fn read_lines<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
        let content = Self::read_to_string(path)?;
        let content = content.strip_prefix('\u{feff}').unwrap_or(&content);
        Ok(content.lines().map(str::to_string).collect())
    }

    /// Like `read_lines`, but a missing file is an empty document
    pub fn read_lines_or_empty<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
        if Self::file_exists(&path) {
            Self::read_lines(path)
        } else {
            Ok(Vec::new())
        }
    }

    /// Write a string to a file
    pub fn write_to_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        // Ensure the parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            Self::ensure_dir(parent)?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write to file: {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Write lines joined by `\n`, with a final newline when non-empty
    pub fn write_lines<P: AsRef<Path>>(path: P, lines: &[String]) -> Result<()> {
        let mut content = lines.join("\n");
        if !lines.is_empty() {
            content.push('\n');
        }
        Self::write_to_file(path, &content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_readLines_withCrlfAndBom_shouldNormalize() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.md");
        fs::write(&path, "\u{feff}# Title\r\n\r\nText\r\n").unwrap();

        let lines = FileManager::read_lines(&path).unwrap();
        assert_eq!(lines, vec!["# Title", "", "Text"]);
    }

    #[test]
    fn test_writeLines_shouldRoundTripThroughReadLines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/out.md");
        let lines = vec!["a".to_string(), String::new(), "b".to_string()];

        FileManager::write_lines(&path, &lines).unwrap();
        assert_eq!(FileManager::read_to_string(&path).unwrap(), "a\n\nb\n");
        assert_eq!(FileManager::read_lines(&path).unwrap(), lines);
    }

    #[test]
    fn test_readLinesOrEmpty_withMissingFile_shouldReturnEmpty() {
        let dir = TempDir::new().unwrap();
        assert!(FileManager::read_lines_or_empty(dir.path().join("missing.md")).unwrap().is_empty());
    }

    #[test]
    fn test_findDocuments_shouldFilterByExtensionAndSort() {
        let dir = TempDir::new().unwrap();
        FileManager::write_to_file(dir.path().join("b.md"), "b").unwrap();
        FileManager::write_to_file(dir.path().join("guide/a.MDX"), "a").unwrap();
        FileManager::write_to_file(dir.path().join("image.png"), "x").unwrap();

        let extensions = vec!["md".to_string(), ".mdx".to_string()];
        let found = FileManager::find_documents(dir.path(), &extensions).unwrap();
        let relative: Vec<String> = found
            .iter()
            .map(|p| FileManager::relative_path(dir.path(), p))
            .collect();
        assert_eq!(relative, vec!["b.md", "guide/a.MDX"]);
    }
}
