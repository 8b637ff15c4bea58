//! Locating and archiving the files a crawl exports

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

/// Give up looking for a free archive name after this many suffixes
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Collects artifact announcements during a run
#[derive(Debug, Clone, Default)]
pub struct ArtifactLocator {
    base_dir: Option<PathBuf>,
    announced: Vec<PathBuf>,
}

impl ArtifactLocator {
    /// Relative announcements resolve against `base_dir`, normally the
    /// subprocess working directory.
    pub fn new(base_dir: Option<PathBuf>) -> Self {
        Self {
            base_dir,
            announced: Vec::new(),
        }
    }

    pub fn record(&mut self, raw: &str) -> PathBuf {
        let path = self.resolve(raw.trim());
        if !self.announced.contains(&path) {
            info!("Artifact announced: {}", path.display());
            self.announced.push(path.clone());
        }
        path
    }

    pub fn announced(&self) -> &[PathBuf] {
        &self.announced
    }

    pub fn latest(&self) -> Option<&Path> {
        self.announced.last().map(PathBuf::as_path)
    }

    fn resolve(&self, raw: &str) -> PathBuf {
        let path = PathBuf::from(raw);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path,
        }
    }
}

/// Outcome of archiving one announced artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub source: PathBuf,
    pub archived: Option<PathBuf>,
    pub error: Option<String>,
}

/// Copies artifacts into the exports directory
#[derive(Debug, Clone)]
pub struct ArtifactArchiver {
    exports_dir: PathBuf,
}

impl ArtifactArchiver {
    pub fn new(exports_dir: PathBuf) -> Self {
        Self { exports_dir }
    }

    pub async fn archive_all(&self, sources: &[PathBuf]) -> Vec<ArtifactRecord> {
        let mut records = Vec::with_capacity(sources.len());
        for source in sources {
            records.push(self.archive(source).await);
        }
        records
    }

    /// Copy `source` to `<exports>/<millis>_<basename>`.
    ///
    /// Problems are recorded on the returned entry instead of failing.
    pub async fn archive(&self, source: &Path) -> ArtifactRecord {
        let failed = |error: String| {
            warn!("Artifact {} not archived: {}", source.display(), error);
            ArtifactRecord {
                source: source.to_path_buf(),
                archived: None,
                error: Some(error),
            }
        };

        match fs::metadata(source).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return failed("not a regular file".to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return failed("file does not exist".to_string())
            }
            Err(e) => return failed(format!("cannot stat file: {}", e)),
        }

        let Some(file_name) = source.file_name().and_then(|n| n.to_str()) else {
            return failed("path has no usable file name".to_string());
        };

        if let Err(e) = fs::create_dir_all(&self.exports_dir).await {
            return failed(format!("cannot create exports directory: {}", e));
        }

        let Some(target) = self
            .free_target(Utc::now().timestamp_millis(), file_name)
            .await
        else {
            return failed("no free archive name".to_string());
        };

        match fs::copy(source, &target).await {
            Ok(bytes) => {
                info!(
                    "Archived {} to {} ({} bytes)",
                    source.display(),
                    target.display(),
                    bytes
                );
                ArtifactRecord {
                    source: source.to_path_buf(),
                    archived: Some(target),
                    error: None,
                }
            }
            Err(e) => failed(format!("copy failed: {}", e)),
        }
    }

    async fn free_target(&self, millis: i64, file_name: &str) -> Option<PathBuf> {
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let candidate = self
                .exports_dir
                .join(archive_file_name(millis, file_name, attempt));
            match fs::try_exists(&candidate).await {
                Ok(false) => return Some(candidate),
                Ok(true) => continue,
                Err(_) => return None,
            }
        }
        None
    }
}

/// `<millis>_<name>`, with `_<n>` before the extension when `attempt > 0`
pub fn archive_file_name(millis: i64, file_name: &str, attempt: u32) -> String {
    if attempt == 0 {
        return format!("{}_{}", millis, file_name);
    }
    let path = Path::new(file_name);
    match (
        path.file_stem().and_then(|s| s.to_str()),
        path.extension().and_then(|e| e.to_str()),
    ) {
        (Some(stem), Some(ext)) => format!("{}_{}_{}.{}", millis, stem, attempt, ext),
        _ => format!("{}_{}_{}", millis, file_name, attempt),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_archive_file_name() {
        assert_eq!(archive_file_name(17, "courses.xlsx", 0), "17_courses.xlsx");
        assert_eq!(archive_file_name(17, "courses.xlsx", 2), "17_courses_2.xlsx");
        assert_eq!(archive_file_name(17, "README", 1), "17_README_1");
    }

    #[test]
    fn test_locator_resolves_relative_and_dedups() {
        let mut locator = ArtifactLocator::new(Some(PathBuf::from("/work")));
        locator.record("out/a.xlsx");
        locator.record("/abs/b.xlsx");
        locator.record("out/a.xlsx");

        assert_eq!(
            locator.announced(),
            &[PathBuf::from("/work/out/a.xlsx"), PathBuf::from("/abs/b.xlsx")]
        );
        assert_eq!(locator.latest(), Some(Path::new("/abs/b.xlsx")));
    }

    #[tokio::test]
    async fn test_archive_copies_file() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("result.xlsx");
        std::fs::write(&source, b"data").unwrap();

        let archiver = ArtifactArchiver::new(temp.path().join("exports"));
        let record = archiver.archive(&source).await;

        let archived = record.archived.unwrap();
        assert!(record.error.is_none());
        assert!(archived
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .ends_with("_result.xlsx"));
        assert_eq!(std::fs::read(archived).unwrap(), b"data");
    }

    #[tokio::test]
    async fn test_archive_same_file_twice_gets_distinct_names() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("result.xlsx");
        std::fs::write(&source, b"data").unwrap();

        let archiver = ArtifactArchiver::new(temp.path().join("exports"));
        let records = archiver
            .archive_all(&[source.clone(), source.clone()])
            .await;

        let first = records[0].archived.clone().unwrap();
        let second = records[1].archived.clone().unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_missing_artifact_is_recorded_not_fatal() {
        let temp = TempDir::new().unwrap();
        let archiver = ArtifactArchiver::new(temp.path().join("exports"));
        let record = archiver.archive(&temp.path().join("gone.xlsx")).await;

        assert!(record.archived.is_none());
        assert_eq!(record.error.as_deref(), Some("file does not exist"));
    }
}
