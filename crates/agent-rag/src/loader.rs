//! Loading documents from disk

use std::path::Path;

use agent_core::error::{AgentError, Result};
use walkdir::WalkDir;

use crate::document::Document;

/// Extensions loaded when none are given
pub const DEFAULT_EXTENSIONS: &[&str] = &["md", "txt"];

/// Recursively load text files under `dir`, sorted by path.
///
/// Document ids are paths relative to `dir` with `/` separators. An empty
/// `extensions` slice means [`DEFAULT_EXTENSIONS`]. Files that are not valid
/// UTF-8 are skipped with a warning.
pub fn load_dir(dir: impl AsRef<Path>, extensions: &[&str]) -> Result<Vec<Document>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(AgentError::Config(format!("'{}' is not a directory", dir.display())));
    }
    let extensions = if extensions.is_empty() { DEFAULT_EXTENSIONS } else { extensions };

    let mut documents = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| AgentError::Io(std::io::Error::other(e.to_string())))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let matches = path
            .extension()
            .and_then(|x| x.to_str())
            .is_some_and(|x| extensions.iter().any(|e| e.eq_ignore_ascii_case(x)));
        if !matches {
            continue;
        }

        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                tracing::warn!(path = %path.display(), "Skipping non UTF-8 file");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let relative = path.strip_prefix(dir).unwrap_or(path);
        let id = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        documents.push(Document::new(id, text, path.display().to_string()));
    }

    tracing::debug!(dir = %dir.display(), documents = documents.len(), "Loaded documents");
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_dir_recursive_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("guides")).unwrap();
        std::fs::write(dir.path().join("z.md"), "last").unwrap();
        std::fs::write(dir.path().join("guides").join("setup.txt"), "setup").unwrap();
        std::fs::write(dir.path().join("a.MD"), "first").unwrap();
        std::fs::write(dir.path().join("image.png"), [0u8, 1, 2]).unwrap();

        let docs = load_dir(dir.path(), &[]).unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a.MD", "guides/setup.txt", "z.md"]);
        assert_eq!(docs[1].text, "setup");
    }

    #[test]
    fn test_extension_filter() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "a").unwrap();
        std::fs::write(dir.path().join("b.rst"), "b").unwrap();

        let docs = load_dir(dir.path(), &["rst"]).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "b.rst");
    }

    #[test]
    fn test_skips_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.txt"), [0xffu8, 0xfe, 0xfd]).unwrap();
        std::fs::write(dir.path().join("good.txt"), "ok").unwrap();
        assert_eq!(load_dir(dir.path(), &[]).unwrap().len(), 1);
    }

    #[test]
    fn test_missing_dir() {
        assert!(matches!(load_dir("/no/such/dir", &[]), Err(AgentError::Config(_))));
    }
}
