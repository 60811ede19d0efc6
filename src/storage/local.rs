//! Local filesystem storage implementation.
//!
//! Keeps the whole repository in `{root}/sites.json`. Each mutation loads
//! the file, applies the change and writes it back through a temp file and
//! rename, holding an async lock so there is a single writer at a time.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{Pattern, Site, SiteChange};
use crate::storage::{RepositoryState, SiteRepository};

const SITES_FILE: &str = "sites.json";

/// Local filesystem storage backend.
#[derive(Debug)]
pub struct LocalRepository {
    root_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl LocalRepository {
    /// Create a new LocalRepository rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn path(&self) -> PathBuf {
        self.root_dir.join(SITES_FILE)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        let path = self.path();
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Load the state, or an empty one if the file doesn't exist.
    async fn load(&self) -> Result<RepositoryState> {
        match tokio::fs::read(self.path()).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(RepositoryState::default()),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn save(&self, state: &RepositoryState) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(state)?;
        self.write_bytes(&bytes).await
    }

    /// Apply a mutation under the write lock and persist it if it succeeded.
    async fn mutate<T>(&self, f: impl FnOnce(&mut RepositoryState) -> Result<T>) -> Result<T> {
        let _guard = self.write_lock.lock().await;
        let mut state = self.load().await?;
        let value = f(&mut state)?;
        self.save(&state).await?;
        Ok(value)
    }
}

#[async_trait]
impl SiteRepository for LocalRepository {
    async fn list_sites(&self) -> Result<Vec<Site>> {
        Ok(self.load().await?.list_sites())
    }

    async fn get_site(&self, url: &str) -> Result<Site> {
        self.load().await?.get_site(url)
    }

    async fn insert_site(&self, url: &str) -> Result<Site> {
        let site = self.mutate(|s| s.insert_site(url)).await?;
        log::info!("Registered site id={} url={}", site.id, site.url);
        Ok(site)
    }

    async fn remove_site(&self, url: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut state = self.load().await?;
        let removed = state.remove_site(url)?;
        if removed {
            self.save(&state).await?;
            log::info!("Removed site {}", url);
        } else {
            log::warn!("No site registered under {}", url);
        }
        Ok(removed)
    }

    async fn latest_change(&self, site: &Site) -> Result<SiteChange> {
        self.load().await?.latest_change(site)
    }

    async fn changes(&self, site: &Site) -> Result<Vec<SiteChange>> {
        Ok(self.load().await?.changes(site))
    }

    async fn insert_change(
        &self,
        site: &Site,
        fingerprint: &str,
        pattern: &Pattern,
        timestamp: DateTime<Utc>,
    ) -> Result<SiteChange> {
        self.mutate(|s| s.insert_change(site, fingerprint, pattern, timestamp))
            .await
            .inspect_err(|e| {
                if matches!(e, AppError::Conflict(_)) {
                    log::error!("Rejected write for {}: {}", site.url, e);
                }
            })
    }
}
