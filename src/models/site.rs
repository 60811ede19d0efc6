// src/models/site.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Pattern;

/// A tracked website.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub id: u64,
    pub url: String,
}

/// One observation of a site, as persisted by a change-check strategy.
///
/// Rows are immutable. The latest row for a site (maximum `check_timestamp`)
/// is the baseline for the next check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteChange {
    pub id: u64,
    pub site_id: u64,
    pub fingerprint: String,
    #[serde(default)]
    pub pattern: Pattern,
    pub check_timestamp: DateTime<Utc>,
}

impl SiteChange {
    /// Whether this row carries the given (site, fingerprint, timestamp) triple.
    pub fn same_observation(&self, site_id: u64, fingerprint: &str, ts: DateTime<Utc>) -> bool {
        self.site_id == site_id && self.fingerprint == fingerprint && self.check_timestamp == ts
    }
}
