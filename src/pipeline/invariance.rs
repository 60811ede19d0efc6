// src/pipeline/invariance.rs

//! Adaptive comparison that learns which lines of a page vary incidentally.
//!
//! Each check is a small state machine:
//!
//! ```text
//! no baseline ──▶ Bootstrapping ──▶ persist (not reported)
//! baseline ─────▶ Steady ── candidate == stored ──▶ done
//!                   │ candidate != stored
//!                   ▼
//!                 Suspect ── confirm == candidate ──▶ Confirmed ──▶ persist
//!                   │ confirm != candidate
//!                   ▼
//!                 PatternStale ──▶ persist relearned pattern
//!
//! line counts disagree anywhere ──▶ Bootstrapping (reported)
//! ```
//!
//! Transitions are pure functions over fetched samples. The driver in
//! [`InvarianceStrategy::check`] only performs the fetches, the waits and the
//! final write.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Pattern, Site, SiteChange, StrategyKind};

use super::fingerprint::{apply_pattern, create_pattern, fingerprint};
use super::strategy::{ChangeCheckStrategy, CheckContext, latest_change};

/// Where a single check currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckState {
    /// Learn a pattern from two fresh samples. `report` is false only for the
    /// very first observation of a site.
    Bootstrapping { report: bool },
    /// Compare one sample against the stored baseline.
    Steady { baseline: SiteChange },
    /// The sample differed; a confirmation sample decides why.
    Suspect {
        baseline: SiteChange,
        sample: String,
        candidate: String,
    },
    /// Genuine content change under the stored pattern.
    Confirmed { fingerprint: String, pattern: Pattern },
    /// The stored pattern no longer explains the page's volatility.
    PatternStale { sample: String, confirmation: String },
}

impl CheckState {
    pub fn name(&self) -> &'static str {
        match self {
            CheckState::Bootstrapping { .. } => "bootstrapping",
            CheckState::Steady { .. } => "steady",
            CheckState::Suspect { .. } => "suspect",
            CheckState::Confirmed { .. } => "confirmed",
            CheckState::PatternStale { .. } => "pattern-stale",
        }
    }
}

/// Final decision of a check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing to write.
    Unchanged,
    /// Write one row; `changed` is what the check reports.
    Persist {
        fingerprint: String,
        pattern: Pattern,
        changed: bool,
    },
}

/// Result of one transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Next(CheckState),
    Done(Outcome),
}

/// Bootstrapping: derive pattern and baseline fingerprint from two samples.
///
/// Samples with different line counts cannot be aligned; the first one is
/// then stored whole, with an empty pattern.
pub fn bootstrap(first: &str, second: &str, report: bool) -> Outcome {
    let learned = create_pattern(first, second)
        .and_then(|pattern| apply_pattern(&pattern, first).map(|fp| (fp, pattern)));

    let (fingerprint, pattern) = learned.unwrap_or_else(|e| {
        log::warn!("Bootstrap samples not comparable ({e}), storing full content");
        (fingerprint(first), Pattern::empty())
    });

    Outcome::Persist {
        fingerprint,
        pattern,
        changed: report,
    }
}

/// Steady: apply the stored pattern to a fresh sample.
pub fn steady(baseline: SiteChange, sample: String) -> Step {
    match apply_pattern(&baseline.pattern, &sample) {
        Ok(candidate) if candidate == baseline.fingerprint => Step::Done(Outcome::Unchanged),
        Ok(candidate) => Step::Next(CheckState::Suspect {
            baseline,
            sample,
            candidate,
        }),
        Err(e) => {
            log::debug!("Stored pattern invalid for new sample: {e}");
            Step::Next(CheckState::Bootstrapping { report: true })
        }
    }
}

/// Suspect: does the stored pattern reproduce the candidate on a second sample?
pub fn suspect(
    baseline: SiteChange,
    sample: String,
    candidate: String,
    confirmation: String,
) -> Step {
    match apply_pattern(&baseline.pattern, &confirmation) {
        Ok(confirm) if confirm == candidate => Step::Next(CheckState::Confirmed {
            fingerprint: candidate,
            pattern: baseline.pattern,
        }),
        Ok(_) => Step::Next(CheckState::PatternStale {
            sample,
            confirmation,
        }),
        Err(e) => {
            log::debug!("Stored pattern invalid for confirmation sample: {e}");
            Step::Next(CheckState::Bootstrapping { report: true })
        }
    }
}

/// PatternStale: relearn the pattern from the suspect and confirmation samples.
pub fn pattern_stale(sample: &str, confirmation: &str) -> Step {
    let relearned = create_pattern(sample, confirmation)
        .and_then(|pattern| apply_pattern(&pattern, sample).map(|fp| (fp, pattern)));

    match relearned {
        Ok((fingerprint, pattern)) => Step::Done(Outcome::Persist {
            fingerprint,
            pattern,
            changed: true,
        }),
        Err(e) => {
            log::debug!("Cannot relearn from unaligned samples: {e}");
            Step::Next(CheckState::Bootstrapping { report: true })
        }
    }
}

/// Change detection that tolerates incidental page volatility.
#[derive(Debug, Clone)]
pub struct InvarianceStrategy {
    sample_delay: Duration,
}

impl InvarianceStrategy {
    pub fn new(sample_delay: Duration) -> Self {
        Self { sample_delay }
    }

    pub fn sample_delay(&self) -> Duration {
        self.sample_delay
    }

    /// Fetch two samples separated by the sample delay.
    async fn sample_pair(&self, ctx: &CheckContext<'_>, url: &str) -> Result<(String, String)> {
        let first = ctx.fetcher.fetch(url).await?;
        ctx.clock.sleep(self.sample_delay).await;
        let second = ctx.fetcher.fetch(url).await?;
        Ok((first, second))
    }

    /// Drive the state machine to an outcome.
    pub async fn run(&self, ctx: &CheckContext<'_>, site: &Site) -> Result<Outcome> {
        let mut state = match latest_change(ctx.repo, site).await? {
            Some(baseline) => CheckState::Steady { baseline },
            None => CheckState::Bootstrapping { report: false },
        };

        loop {
            log::debug!("{}: {}", site.url, state.name());

            let step = match state {
                CheckState::Bootstrapping { report } => {
                    let (first, second) = self.sample_pair(ctx, &site.url).await?;
                    Step::Done(bootstrap(&first, &second, report))
                }
                CheckState::Steady { baseline } => {
                    let sample = ctx.fetcher.fetch(&site.url).await?;
                    steady(baseline, sample)
                }
                CheckState::Suspect {
                    baseline,
                    sample,
                    candidate,
                } => {
                    ctx.clock.sleep(self.sample_delay).await;
                    let confirmation = ctx.fetcher.fetch(&site.url).await?;
                    suspect(baseline, sample, candidate, confirmation)
                }
                CheckState::Confirmed {
                    fingerprint,
                    pattern,
                } => Step::Done(Outcome::Persist {
                    fingerprint,
                    pattern,
                    changed: true,
                }),
                CheckState::PatternStale {
                    sample,
                    confirmation,
                } => pattern_stale(&sample, &confirmation),
            };

            match step {
                Step::Next(next) => state = next,
                Step::Done(outcome) => return Ok(outcome),
            }
        }
    }
}

#[async_trait]
impl ChangeCheckStrategy for InvarianceStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Invariance
    }

    async fn check(&self, ctx: &CheckContext<'_>, site: &Site) -> Result<bool> {
        match self.run(ctx, site).await? {
            Outcome::Unchanged => {
                log::debug!("{}: unchanged", site.url);
                Ok(false)
            }
            Outcome::Persist {
                fingerprint,
                pattern,
                changed,
            } => {
                let timestamp = ctx.clock.now();
                ctx.repo
                    .insert_change(site, &fingerprint, &pattern, timestamp)
                    .await?;
                log::info!(
                    "{}: stored fingerprint {} (pattern [{}], changed: {})",
                    site.url,
                    fingerprint,
                    pattern,
                    changed
                );
                Ok(changed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::{MemoryRepository, SiteRepository};
    use crate::testing::ScriptedFetcher;
    use chrono::{DateTime, Utc};

    const URL: &str = "http://localhost/volatile";

    fn baseline(fingerprint: String, pattern: Pattern) -> SiteChange {
        SiteChange {
            id: 1,
            site_id: 1,
            fingerprint,
            pattern,
            check_timestamp: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    fn strategy() -> InvarianceStrategy {
        InvarianceStrategy::new(Duration::from_secs(2))
    }

    // --- pure transitions ---

    #[test]
    fn test_bootstrap_learns_pattern() {
        let outcome = bootstrap("<p>1</p><p>body", "<p>2</p><p>body", false);
        assert_eq!(
            outcome,
            Outcome::Persist {
                fingerprint: fingerprint("</p><p>body"),
                pattern: Pattern::from_indices(vec![0]),
                changed: false,
            }
        );
    }

    #[test]
    fn test_bootstrap_unaligned_samples_store_full_content() {
        let outcome = bootstrap("<a><b>", "<a>", false);
        assert_eq!(
            outcome,
            Outcome::Persist {
                fingerprint: fingerprint("<a><b>"),
                pattern: Pattern::empty(),
                changed: false,
            }
        );
    }

    #[test]
    fn test_steady_match_is_unchanged() {
        let base = baseline(fingerprint("<b>"), Pattern::from_indices(vec![0]));
        assert_eq!(
            steady(base, "<a>new<b>".to_string()),
            Step::Done(Outcome::Unchanged)
        );
    }

    #[test]
    fn test_steady_mismatch_becomes_suspect() {
        let base = baseline(fingerprint("<b>"), Pattern::from_indices(vec![0]));
        let step = steady(base.clone(), "<a><c>".to_string());
        assert_eq!(
            step,
            Step::Next(CheckState::Suspect {
                baseline: base,
                sample: "<a><c>".to_string(),
                candidate: fingerprint("<c>"),
            })
        );
    }

    #[test]
    fn test_steady_out_of_range_pattern_relearns() {
        let base = baseline(fingerprint("x"), Pattern::from_indices(vec![3]));
        assert_eq!(
            steady(base, "<a>".to_string()),
            Step::Next(CheckState::Bootstrapping { report: true })
        );
    }

    #[test]
    fn test_suspect_confirmed_keeps_pattern() {
        let pattern = Pattern::from_indices(vec![0]);
        let base = baseline(fingerprint("<b>"), pattern.clone());
        let step = suspect(
            base,
            "<a1><c>".to_string(),
            fingerprint("<c>"),
            "<a2><c>".to_string(),
        );
        assert_eq!(
            step,
            Step::Next(CheckState::Confirmed {
                fingerprint: fingerprint("<c>"),
                pattern,
            })
        );
    }

    #[test]
    fn test_suspect_disagreement_is_pattern_stale() {
        let base = baseline(fingerprint("<b><x>"), Pattern::from_indices(vec![0]));
        let step = suspect(
            base,
            "<a1><b><x1>".to_string(),
            fingerprint("<b><x1>"),
            "<a2><b><x2>".to_string(),
        );
        assert_eq!(
            step,
            Step::Next(CheckState::PatternStale {
                sample: "<a1><b><x1>".to_string(),
                confirmation: "<a2><b><x2>".to_string(),
            })
        );
    }

    #[test]
    fn test_pattern_stale_relearns() {
        let step = pattern_stale("<a1><b><x1>", "<a2><b><x2>");
        assert_eq!(
            step,
            Step::Done(Outcome::Persist {
                fingerprint: fingerprint("<b>"),
                pattern: Pattern::from_indices(vec![0, 2]),
                changed: true,
            })
        );
    }

    #[test]
    fn test_pattern_stale_unaligned_falls_back_to_bootstrap() {
        assert_eq!(
            pattern_stale("<a><b>", "<a>"),
            Step::Next(CheckState::Bootstrapping { report: true })
        );
    }

    // --- driver against fakes ---

    struct Harness {
        repo: MemoryRepository,
        clock: ManualClock,
        site: Site,
    }

    impl Harness {
        async fn new() -> Self {
            let repo = MemoryRepository::new();
            let site = repo.insert_site(URL).await.unwrap();
            Self {
                repo,
                clock: ManualClock::default(),
                site,
            }
        }

        async fn check(&self, fetcher: &ScriptedFetcher) -> bool {
            let ctx = CheckContext {
                repo: &self.repo,
                fetcher,
                clock: &self.clock,
            };
            self.clock.advance(Duration::from_secs(3600));
            strategy().check(&ctx, &self.site).await.unwrap()
        }

        async fn rows(&self) -> Vec<SiteChange> {
            self.repo.changes(&self.site).await.unwrap()
        }
    }

    #[tokio::test]
    async fn test_timestamp_prefix_is_absorbed() {
        let h = Harness::new().await;
        let fetcher = ScriptedFetcher::new().sequence(
            URL,
            &[
                "2024-01-01T00:00:00 body",
                "2024-01-01T00:00:01 body",
                "2024-01-01T00:00:02 body",
            ],
        );

        assert!(!h.check(&fetcher).await, "bootstrap is not reportable");
        let rows = h.rows().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].pattern, Pattern::from_indices(vec![0]));
        assert_eq!(h.clock.sleeps(), vec![Duration::from_secs(2)]);

        assert!(!h.check(&fetcher).await);
        assert_eq!(h.rows().await.len(), 1);
        assert_eq!(fetcher.fetch_count(URL), 3);
    }

    #[tokio::test]
    async fn test_added_paragraph_is_confirmed_change() {
        let h = Harness::new().await;
        let fetcher = ScriptedFetcher::new().sequence(
            URL,
            &[
                "2024-01-01T00:00:00 body",
                "2024-01-01T00:00:01 body",
                "2024-01-01T00:00:02 body<p>new paragraph</p>",
                "2024-01-01T00:00:03 body<p>new paragraph</p>",
            ],
        );

        assert!(!h.check(&fetcher).await);
        assert!(h.check(&fetcher).await);

        let rows = h.rows().await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].pattern, Pattern::from_indices(vec![0]));
        assert_eq!(rows[1].fingerprint, fingerprint("<p>new paragraph</p>"));
        assert_eq!(fetcher.fetch_count(URL), 4);
    }

    #[tokio::test]
    async fn test_moving_volatility_relearns_pattern() {
        let h = Harness::new().await;
        let fetcher = ScriptedFetcher::new().sequence(
            URL,
            &[
                "<t>00<p>body<c>7",
                "<t>01<p>body<c>7",
                // Counter starts ticking as well.
                "<t>02<p>body<c>8",
                "<t>03<p>body<c>9",
                "<t>04<p>body<c>10",
            ],
        );

        assert!(!h.check(&fetcher).await);
        assert!(h.check(&fetcher).await, "pattern adaptation is reported");

        let rows = h.rows().await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].pattern, Pattern::from_indices(vec![0, 2]));
        assert_eq!(rows[1].fingerprint, fingerprint("<p>body"));

        // The relearned pattern absorbs both fragments.
        assert!(!h.check(&fetcher).await);
        assert_eq!(h.rows().await.len(), 2);
    }

    #[tokio::test]
    async fn test_structural_change_relearns_from_scratch() {
        let h = Harness::new().await;
        let fetcher = ScriptedFetcher::new().sequence(
            URL,
            &[
                "<a><b><t>1",
                "<a><b><t>2",
                // Page shrinks below the stored index.
                "<a><t>3",
                "<a><t>4",
                "<a><t>5",
            ],
        );

        assert!(!h.check(&fetcher).await);
        assert_eq!(h.rows().await[0].pattern, Pattern::from_indices(vec![2]));

        assert!(h.check(&fetcher).await);
        let rows = h.rows().await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].pattern, Pattern::from_indices(vec![1]));
        assert_eq!(rows[1].fingerprint, fingerprint("<a>"));
    }

    #[tokio::test]
    async fn test_confirmation_shrunk_below_pattern_relearns() {
        let h = Harness::new().await;
        let fetcher = ScriptedFetcher::new().sequence(
            URL,
            &[
                "<a><b><t>1",
                "<a><b><t>2",
                // Suspect sample still fits the stored pattern...
                "<a><c><t>3",
                // ...the confirmation does not.
                "<a>",
                "<z>1",
                "<z>2",
            ],
        );

        assert!(!h.check(&fetcher).await);
        assert_eq!(h.rows().await[0].pattern, Pattern::from_indices(vec![2]));

        assert!(h.check(&fetcher).await);
        let rows = h.rows().await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].pattern, Pattern::from_indices(vec![0]));
        assert_eq!(rows[1].fingerprint, fingerprint(""));
        assert_eq!(fetcher.fetch_count(URL), 6);
    }

    #[tokio::test]
    async fn test_static_page_never_changes() {
        let h = Harness::new().await;
        let fetcher = ScriptedFetcher::new().always(URL, "<html>void</html>");

        for _ in 0..5 {
            assert!(!h.check(&fetcher).await);
        }

        let rows = h.rows().await;
        assert_eq!(rows.len(), 1);
        assert!(rows[0].pattern.is_empty());
        assert_eq!(rows[0].fingerprint, fingerprint("<html>void</html>"));
    }

    #[tokio::test]
    async fn test_fetch_failure_during_confirmation_writes_nothing() {
        let h = Harness::new().await;
        let fetcher = ScriptedFetcher::new().sequence(URL, &["<a>1", "<a>1", "<a>2"]);
        assert!(!h.check(&fetcher).await);

        let failing = ScriptedFetcher::new().sequence(URL, &["<a>2"]).then_fail(URL);
        let ctx = CheckContext {
            repo: &h.repo,
            fetcher: &failing,
            clock: &h.clock,
        };
        h.clock.advance(Duration::from_secs(60));
        assert!(strategy().check(&ctx, &h.site).await.is_err());
        assert_eq!(h.rows().await.len(), 1);
    }
}
