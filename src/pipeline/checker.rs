// src/pipeline/checker.rs

//! Batch orchestration of change checks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::sync::OwnedMutexGuard;
use tokio::time::Instant;

use crate::clock::{Clock, SystemClock};
use crate::error::{AppError, Result};
use crate::models::{CheckerConfig, Site};
use crate::services::{Fetcher, Notifier};
use crate::storage::SiteRepository;

use super::strategy::{ChangeCheckStrategy, CheckContext, build_strategy};

/// Summary of a check run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckReport {
    /// Sites whose check completed
    pub checked: usize,
    /// URLs reported as changed, in site order
    pub changed: Vec<String>,
    /// Sites whose fetch or check failed
    pub failed: usize,
    /// Sites not started before the deadline
    pub skipped: usize,
}

impl CheckReport {
    pub fn has_changes(&self) -> bool {
        !self.changed.is_empty()
    }

    /// Report lines handed to the notifier.
    pub fn lines(&self) -> Vec<String> {
        self.changed.iter().map(|url| format!("* {url}")).collect()
    }
}

enum SiteOutcome {
    Changed,
    Unchanged,
    Failed(AppError),
    Skipped,
}

/// One async lock per site id.
#[derive(Default)]
struct SiteLocks {
    inner: Mutex<HashMap<u64, Arc<tokio::sync::Mutex<()>>>>,
}

impl SiteLocks {
    async fn acquire(&self, site_id: u64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(map.entry(site_id).or_default())
        };
        lock.lock_owned().await
    }
}

/// Checks every registered site with one strategy and reports the changes.
pub struct ChangeChecker {
    repo: Arc<dyn SiteRepository>,
    fetcher: Arc<dyn Fetcher>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    strategy: Box<dyn ChangeCheckStrategy>,
    max_concurrent: usize,
    run_timeout: Option<Duration>,
    locks: SiteLocks,
}

impl ChangeChecker {
    /// Sequential checker on the system clock without a deadline.
    pub fn new(
        repo: Arc<dyn SiteRepository>,
        fetcher: Arc<dyn Fetcher>,
        notifier: Arc<dyn Notifier>,
        strategy: Box<dyn ChangeCheckStrategy>,
    ) -> Self {
        Self {
            repo,
            fetcher,
            notifier,
            clock: Arc::new(SystemClock),
            strategy,
            max_concurrent: 1,
            run_timeout: None,
            locks: SiteLocks::default(),
        }
    }

    /// Checker with strategy, concurrency and deadline taken from `config`.
    pub fn from_config(
        config: &CheckerConfig,
        repo: Arc<dyn SiteRepository>,
        fetcher: Arc<dyn Fetcher>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let strategy = build_strategy(config.strategy, config);
        let mut checker = Self::new(repo, fetcher, notifier, strategy)
            .with_concurrency(config.max_concurrent);
        checker.run_timeout = config.run_timeout();
        checker
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_concurrency(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Batch deadline, measured on the tokio timer. `Clock` sleeps are
    /// logical, so they never count against it.
    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = Some(timeout);
        self
    }

    pub fn strategy(&self) -> &dyn ChangeCheckStrategy {
        self.strategy.as_ref()
    }

    /// Check all sites and notify if any changed.
    pub async fn check_all(&self) -> Result<CheckReport> {
        let sites = self.repo.list_sites().await?;
        self.check_sites(sites).await
    }

    /// Check a single registered site and notify if it changed.
    pub async fn check_site(&self, url: &str) -> Result<CheckReport> {
        let site = self.repo.get_site(url).await?;
        self.check_sites(vec![site]).await
    }

    async fn check_sites(&self, sites: Vec<Site>) -> Result<CheckReport> {
        let deadline = self.run_timeout.map(|timeout| Instant::now() + timeout);
        log::info!(
            "Checking {} sites ({} strategy, {} at a time)",
            sites.len(),
            self.strategy.kind(),
            self.max_concurrent
        );

        let mut report = CheckReport::default();
        let mut results = stream::iter(sites)
            .map(|site| async move {
                let outcome = self.run_one(&site, deadline).await;
                (site, outcome)
            })
            .buffered(self.max_concurrent);

        while let Some((site, outcome)) = results.next().await {
            match outcome {
                SiteOutcome::Changed => {
                    report.checked += 1;
                    report.changed.push(site.url);
                }
                SiteOutcome::Unchanged => report.checked += 1,
                SiteOutcome::Failed(error) => {
                    report.failed += 1;
                    match error {
                        AppError::Conflict(_) => {
                            log::error!("Check of {} not recorded: {}", site.url, error)
                        }
                        _ => log::warn!("Skipping {} for this run: {}", site.url, error),
                    }
                }
                SiteOutcome::Skipped => {
                    report.skipped += 1;
                    log::warn!("Deadline expired, {} not checked", site.url);
                }
            }
        }

        if report.has_changes() {
            if let Err(e) = self.notifier.notify(&report.lines()).await {
                log::error!("Could not send change report: {}", e);
            }
        }

        log::info!(
            "Check complete: {} checked, {} changed, {} failed, {} skipped",
            report.checked,
            report.changed.len(),
            report.failed,
            report.skipped
        );

        Ok(report)
    }

    async fn run_one(&self, site: &Site, deadline: Option<Instant>) -> SiteOutcome {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return SiteOutcome::Skipped;
        }

        log::info!("Processing site: Id={}, URL={}", site.id, site.url);
        let _guard = self.locks.acquire(site.id).await;

        let ctx = CheckContext {
            repo: self.repo.as_ref(),
            fetcher: self.fetcher.as_ref(),
            clock: self.clock.as_ref(),
        };
        let check = self.strategy.check(&ctx, site);

        let result = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, check)
                .await
                .unwrap_or_else(|_| {
                    Err(AppError::Timeout(format!(
                        "batch deadline expired while checking {}",
                        site.url
                    )))
                }),
            None => check.await,
        };

        match result {
            Ok(true) => SiteOutcome::Changed,
            Ok(false) => SiteOutcome::Unchanged,
            Err(e) => SiteOutcome::Failed(e),
        }
    }
}
