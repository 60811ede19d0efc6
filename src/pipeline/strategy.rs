// src/pipeline/strategy.rs

//! Change-check strategy abstraction.

use async_trait::async_trait;

use crate::clock::Clock;
use crate::error::Result;
use crate::models::{CheckerConfig, Site, SiteChange, StrategyKind};
use crate::services::Fetcher;
use crate::storage::SiteRepository;

use super::invariance::InvarianceStrategy;
use super::naive::NaiveStrategy;

/// Collaborators a strategy works against for one check.
#[derive(Clone, Copy)]
pub struct CheckContext<'a> {
    pub repo: &'a dyn SiteRepository,
    pub fetcher: &'a dyn Fetcher,
    pub clock: &'a dyn Clock,
}

/// Decides whether a site changed since its latest stored observation.
///
/// A call writes at most one new `SiteChange` row. `Ok(true)` means the
/// change is reportable; bootstrap observations are stored but report `false`.
#[async_trait]
pub trait ChangeCheckStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    async fn check(&self, ctx: &CheckContext<'_>, site: &Site) -> Result<bool>;
}

/// Build the strategy selected in the configuration.
pub fn build_strategy(
    kind: StrategyKind,
    config: &CheckerConfig,
) -> Box<dyn ChangeCheckStrategy> {
    match kind {
        StrategyKind::Naive => Box::new(NaiveStrategy),
        StrategyKind::Invariance => Box::new(InvarianceStrategy::new(config.sample_delay())),
    }
}

/// Latest stored change, or `None` when the site was never observed.
pub(crate) async fn latest_change(
    repo: &dyn SiteRepository,
    site: &Site,
) -> Result<Option<SiteChange>> {
    match repo.latest_change(site).await {
        Ok(change) => Ok(Some(change)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}
