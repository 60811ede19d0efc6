// src/pipeline/naive.rs

//! Exact, single-sample comparison.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Pattern, Site, StrategyKind};

use super::fingerprint::fingerprint;
use super::strategy::{ChangeCheckStrategy, CheckContext, latest_change};

/// Compares the raw fingerprint of one sample with the latest stored one.
///
/// Any per-request variation of the page (timestamps, counters) counts as a
/// change.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaiveStrategy;

#[async_trait]
impl ChangeCheckStrategy for NaiveStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Naive
    }

    async fn check(&self, ctx: &CheckContext<'_>, site: &Site) -> Result<bool> {
        let timestamp = ctx.clock.now();
        let body = ctx.fetcher.fetch(&site.url).await?;
        let current = fingerprint(&body);

        let changed = match latest_change(ctx.repo, site).await? {
            Some(latest) if latest.fingerprint == current => {
                log::debug!("{}: unchanged ({})", site.url, current);
                return Ok(false);
            }
            Some(_) => true,
            None => {
                log::info!("{}: first observation", site.url);
                false
            }
        };

        ctx.repo
            .insert_change(site, &current, &Pattern::empty(), timestamp)
            .await?;
        log::info!("{}: stored fingerprint {}", site.url, current);

        Ok(changed)
    }
}
