//! Persistence of tracked sites and their observations.
//!
//! Two backends share one in-memory model, [`RepositoryState`]:
//!
//! - [`MemoryRepository`]: process-local, used by tests and dry runs
//! - [`LocalRepository`]: a single `sites.json` file, rewritten atomically
//!
//! ```text
//! {root}/
//! ├── config.toml      # Tracker configuration
//! └── sites.json       # Sites and their SiteChange rows
//! ```

pub mod local;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{Pattern, Site, SiteChange};
use crate::utils::url::normalize_site_url;

// Re-export for convenience
pub use local::LocalRepository;
pub use memory::MemoryRepository;

/// Trait for site/change storage backends.
#[async_trait]
pub trait SiteRepository: Send + Sync {
    /// All sites, ordered by id.
    async fn list_sites(&self) -> Result<Vec<Site>>;

    /// Site registered under `url`; `NotFound` otherwise.
    async fn get_site(&self, url: &str) -> Result<Site>;

    /// Register a new site; `Conflict` if the URL is already tracked.
    async fn insert_site(&self, url: &str) -> Result<Site>;

    /// Remove a site and all of its changes. Returns whether it existed;
    /// unknown or malformed URLs are a no-op.
    async fn remove_site(&self, url: &str) -> Result<bool>;

    /// Change with the greatest `check_timestamp`; `NotFound` if none.
    async fn latest_change(&self, site: &Site) -> Result<SiteChange>;

    /// Every change of a site, oldest first.
    async fn changes(&self, site: &Site) -> Result<Vec<SiteChange>>;

    /// Append one observation.
    async fn insert_change(
        &self,
        site: &Site,
        fingerprint: &str,
        pattern: &Pattern,
        timestamp: DateTime<Utc>,
    ) -> Result<SiteChange>;
}

/// Serialisable contents of a repository.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoryState {
    #[serde(default)]
    next_site_id: u64,
    #[serde(default)]
    next_change_id: u64,
    #[serde(default)]
    sites: Vec<Site>,
    #[serde(default)]
    changes: Vec<SiteChange>,
}

impl RepositoryState {
    pub fn list_sites(&self) -> Vec<Site> {
        let mut sites = self.sites.clone();
        sites.sort_by_key(|s| s.id);
        sites
    }

    pub fn get_site(&self, url: &str) -> Result<Site> {
        let url = normalize_site_url(url)?;
        self.sites
            .iter()
            .find(|s| s.url == url)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("Site with url={url} could not be found")))
    }

    pub fn insert_site(&mut self, url: &str) -> Result<Site> {
        let url = normalize_site_url(url)?;
        if self.sites.iter().any(|s| s.url == url) {
            return Err(AppError::conflict(format!("Site with url={url} already exists")));
        }

        self.next_site_id += 1;
        let site = Site {
            id: self.next_site_id,
            url,
        };
        self.sites.push(site.clone());
        Ok(site)
    }

    /// A URL that cannot be normalised was never registered, so it removes nothing.
    pub fn remove_site(&mut self, url: &str) -> Result<bool> {
        let Ok(url) = normalize_site_url(url) else {
            return Ok(false);
        };
        let Some(site_id) = self.sites.iter().find(|s| s.url == url).map(|s| s.id) else {
            return Ok(false);
        };

        self.sites.retain(|s| s.id != site_id);
        self.changes.retain(|c| c.site_id != site_id);
        Ok(true)
    }

    pub fn latest_change(&self, site: &Site) -> Result<SiteChange> {
        self.changes
            .iter()
            .filter(|c| c.site_id == site.id)
            // On equal timestamps the later insert wins.
            .max_by(|a, b| {
                a.check_timestamp
                    .cmp(&b.check_timestamp)
                    .then(a.id.cmp(&b.id))
            })
            .cloned()
            .ok_or_else(|| {
                AppError::not_found(format!("No SiteChange entry for site id={}", site.id))
            })
    }

    pub fn changes(&self, site: &Site) -> Vec<SiteChange> {
        let mut changes: Vec<SiteChange> = self
            .changes
            .iter()
            .filter(|c| c.site_id == site.id)
            .cloned()
            .collect();
        changes.sort_by(|a, b| {
            a.check_timestamp
                .cmp(&b.check_timestamp)
                .then(a.id.cmp(&b.id))
        });
        changes
    }

    pub fn insert_change(
        &mut self,
        site: &Site,
        fingerprint: &str,
        pattern: &Pattern,
        timestamp: DateTime<Utc>,
    ) -> Result<SiteChange> {
        if !self.sites.iter().any(|s| s.id == site.id) {
            return Err(AppError::not_found(format!(
                "Site id={} is not registered",
                site.id
            )));
        }
        if self
            .changes
            .iter()
            .any(|c| c.same_observation(site.id, fingerprint, timestamp))
        {
            return Err(AppError::conflict(format!(
                "Duplicate SiteChange for site id={} fingerprint={} at {}",
                site.id, fingerprint, timestamp
            )));
        }

        self.next_change_id += 1;
        let change = SiteChange {
            id: self.next_change_id,
            site_id: site.id,
            fingerprint: fingerprint.to_string(),
            pattern: pattern.clone(),
            check_timestamp: timestamp,
        };
        self.changes.push(change.clone());
        Ok(change)
    }
}
