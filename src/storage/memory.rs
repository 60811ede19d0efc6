//! In-process storage backend.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{Pattern, Site, SiteChange};
use crate::storage::{RepositoryState, SiteRepository};

/// Repository held entirely in memory. Every operation runs under one lock.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: Mutex<RepositoryState>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> RepositoryState {
        self.with(|state| state.clone())
    }

    fn with<T>(&self, f: impl FnOnce(&mut RepositoryState) -> T) -> T {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }
}

#[async_trait]
impl SiteRepository for MemoryRepository {
    async fn list_sites(&self) -> Result<Vec<Site>> {
        Ok(self.with(|s| s.list_sites()))
    }

    async fn get_site(&self, url: &str) -> Result<Site> {
        self.with(|s| s.get_site(url))
    }

    async fn insert_site(&self, url: &str) -> Result<Site> {
        self.with(|s| s.insert_site(url))
    }

    async fn remove_site(&self, url: &str) -> Result<bool> {
        self.with(|s| s.remove_site(url))
    }

    async fn latest_change(&self, site: &Site) -> Result<SiteChange> {
        self.with(|s| s.latest_change(site))
    }

    async fn changes(&self, site: &Site) -> Result<Vec<SiteChange>> {
        Ok(self.with(|s| s.changes(site)))
    }

    async fn insert_change(
        &self,
        site: &Site,
        fingerprint: &str,
        pattern: &Pattern,
        timestamp: DateTime<Utc>,
    ) -> Result<SiteChange> {
        self.with(|s| s.insert_change(site, fingerprint, pattern, timestamp))
    }
}
