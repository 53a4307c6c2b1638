//! Target filename derivation and collision-safe file reservation.

use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};

use super::DownloadError;
use crate::models::DocumentId;

/// Longest stem kept after sanitizing
pub const MAX_STEM_CHARS: usize = 100;
/// Stem used when nothing usable remains
pub const DEFAULT_STEM: &str = "paper";
/// Suffixes tried before giving up on a stem
const MAX_COLLISION_SUFFIX: u32 = 1000;

/// Remove characters that are unsafe in filenames on any platform.
///
/// Strips `\ / * ? : " < > |` and control characters, trims whitespace and
/// dots, and truncates to [`MAX_STEM_CHARS`].
pub fn sanitize_stem(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .filter(|c| !matches!(c, '\\' | '/' | '*' | '?' | ':' | '"' | '<' | '>' | '|'))
        .filter(|c| !c.is_control())
        .collect();
    let truncated: String = cleaned
        .trim()
        .trim_matches('.')
        .chars()
        .take(MAX_STEM_CHARS)
        .collect();
    truncated.trim().to_string()
}

/// Stem for a download: `DOI_<doi>` when a DOI is known, else the suggested name
pub fn target_stem(suggested: &str, identifier: Option<&DocumentId>) -> String {
    let stem = match identifier {
        Some(DocumentId::Doi(doi)) => sanitize_stem(&format!("DOI_{}", doi.replace('/', "_"))),
        _ => sanitize_stem(suggested),
    };
    if stem.is_empty() {
        DEFAULT_STEM.to_string()
    } else {
        stem
    }
}

/// Atomically create `stem.pdf`, or `stem_1.pdf`, `stem_2.pdf`, ... in `dir`.
///
/// Uses `create_new`, so an existing file is never overwritten even when two
/// downloads race for the same name.
pub async fn reserve_file(dir: &Path, stem: &str) -> Result<(File, PathBuf), DownloadError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| DownloadError::io(dir, e))?;

    for suffix in 0..=MAX_COLLISION_SUFFIX {
        let name = if suffix == 0 {
            format!("{}.pdf", stem)
        } else {
            format!("{}_{}.pdf", stem, suffix)
        };
        let path = dir.join(name);

        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => return Ok((file, path)),
            Err(e) if e.kind() == IoErrorKind::AlreadyExists => continue,
            Err(e) => return Err(DownloadError::io(path, e)),
        }
    }

    Err(DownloadError::io(
        dir.join(format!("{}.pdf", stem)),
        std::io::Error::new(IoErrorKind::AlreadyExists, "no free filename left"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_reserved_characters() {
        assert_eq!(sanitize_stem("a/b\\c*d?e:f\"g<h>i|j"), "abcdefghij");
        assert_eq!(sanitize_stem("  title\twith\ncontrols  "), "titlewithcontrols");
        assert_eq!(sanitize_stem(&"x".repeat(250)).len(), MAX_STEM_CHARS);
        assert_eq!(sanitize_stem("///"), "");
    }

    #[test]
    fn test_target_stem() {
        let doi = DocumentId::Doi("10.1038/nature12373".to_string());
        assert_eq!(target_stem("ignored", Some(&doi)), "DOI_10.1038_nature12373");

        let arxiv = DocumentId::Arxiv("1706.03762".to_string());
        assert_eq!(target_stem("Attention", Some(&arxiv)), "Attention");
        assert_eq!(target_stem("", None), DEFAULT_STEM);
        assert_eq!(target_stem("???", None), DEFAULT_STEM);
    }

    #[tokio::test]
    async fn test_collision_suffixes() {
        let dir = tempfile::tempdir().unwrap();

        let (_, first) = reserve_file(dir.path(), "paper").await.unwrap();
        let (_, second) = reserve_file(dir.path(), "paper").await.unwrap();
        let (_, third) = reserve_file(dir.path(), "paper").await.unwrap();

        assert_eq!(first.file_name().unwrap(), "paper.pdf");
        assert_eq!(second.file_name().unwrap(), "paper_1.pdf");
        assert_eq!(third.file_name().unwrap(), "paper_2.pdf");
    }

    #[tokio::test]
    async fn test_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");

        let (_, path) = reserve_file(&nested, "x").await.unwrap();
        assert!(path.exists());
    }
}
