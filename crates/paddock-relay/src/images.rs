//! Listing of generated images

use std::path::Path;
use std::time::{Duration, SystemTime};

use tokio::time::Instant;

use crate::error::RelayError;

/// Cached directory listing owned by the relay state
///
/// A listing is reused until `ttl` elapses or a new image is written.
#[derive(Debug)]
pub struct ImageCatalog {
    entries: Vec<String>,
    last_fetch: Option<Instant>,
    ttl: Duration,
}

impl ImageCatalog {
    /// Empty catalog; the first `list` scans the directory
    pub const fn new(ttl: Duration) -> Self {
        Self {
            entries: Vec::new(),
            last_fetch: None,
            ttl,
        }
    }

    /// Image file names in `dir`, newest first
    pub async fn list(&mut self, dir: &Path) -> Result<Vec<String>, RelayError> {
        let fresh = self.last_fetch.is_some_and(|at| at.elapsed() < self.ttl);
        if !fresh {
            self.entries = scan(dir).await?;
            self.last_fetch = Some(Instant::now());
            tracing::debug!(dir = %dir.display(), images = self.entries.len(), "rescanned image directory");
        }
        Ok(self.entries.clone())
    }

    /// Force the next `list` to rescan
    pub fn invalidate(&mut self) {
        self.last_fetch = None;
    }
}

async fn scan(dir: &Path) -> Result<Vec<String>, RelayError> {
    let mut read_dir = match tokio::fs::read_dir(dir).await {
        Ok(read_dir) => read_dir,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut found: Vec<(SystemTime, String)> = Vec::new();
    while let Some(entry) = read_dir.next_entry().await? {
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        let is_image = mime_guess::from_path(&name)
            .first()
            .is_some_and(|mime| mime.type_() == mime_guess::mime::IMAGE);
        if is_image {
            found.push((metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH), name));
        }
    }

    found.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    Ok(found.into_iter().map(|(_, name)| name).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = ImageCatalog::new(Duration::from_secs(30));
        assert!(catalog.list(&dir.path().join("nope")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn only_images_are_listed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), b"png").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"txt").unwrap();
        std::fs::create_dir(dir.path().join("nested.png")).unwrap();

        let mut catalog = ImageCatalog::new(Duration::from_secs(30));
        assert_eq!(catalog.list(dir.path()).await.unwrap(), ["a.png"]);
    }

    #[tokio::test(start_paused = true)]
    async fn listing_is_cached_until_stale_or_invalidated() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = ImageCatalog::new(Duration::from_secs(30));
        std::fs::write(dir.path().join("first.png"), b"1").unwrap();
        assert_eq!(catalog.list(dir.path()).await.unwrap().len(), 1);

        std::fs::write(dir.path().join("second.png"), b"2").unwrap();
        assert_eq!(catalog.list(dir.path()).await.unwrap().len(), 1);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(catalog.list(dir.path()).await.unwrap().len(), 2);

        std::fs::write(dir.path().join("third.png"), b"3").unwrap();
        catalog.invalidate();
        assert_eq!(catalog.list(dir.path()).await.unwrap().len(), 3);
    }
}
