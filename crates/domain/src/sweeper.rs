//! Background retirement of idle baskets.

use std::sync::Arc;
use std::time::{Duration, Instant};

use audit_log::AuditSink;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::basket::{BasketService, RetireOutcome};
use crate::error::Result;
use crate::store::BasketStore;

/// Sweeper timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweeperConfig {
    /// Time between passes.
    pub interval: Duration,

    /// An open basket untouched for longer than this is retired.
    pub idle_timeout: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            idle_timeout: Duration::from_secs(1800),
        }
    }
}

/// Counts from one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Baskets the scan reported as idle.
    pub scanned: usize,
    pub retired: usize,
    /// Touched or closed between the scan and the retirement attempt.
    pub skipped: usize,
    pub failed: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.scanned == 0
    }
}

/// Periodically retires open baskets that have gone idle.
///
/// CHECKOUT, PAID and CANCELLED baskets are never touched.
pub struct ExpirySweeper<S: BasketStore, A: AuditSink> {
    service: Arc<BasketService<S, A>>,
    config: SweeperConfig,
}

impl<S, A> ExpirySweeper<S, A>
where
    S: BasketStore + 'static,
    A: AuditSink + 'static,
{
    pub fn new(service: Arc<BasketService<S, A>>, config: SweeperConfig) -> Self {
        Self { service, config }
    }

    pub fn config(&self) -> &SweeperConfig {
        &self.config
    }

    /// Runs one pass.
    ///
    /// Fails only if the scan itself fails. A basket that cannot be retired
    /// is counted in `failed` and the pass moves on.
    #[tracing::instrument(skip(self))]
    pub async fn sweep_once(&self) -> Result<SweepReport> {
        let started = Instant::now();
        let idle_timeout =
            chrono::Duration::from_std(self.config.idle_timeout).unwrap_or(chrono::Duration::MAX);
        let cutoff = self
            .service
            .now()
            .checked_sub_signed(idle_timeout)
            .unwrap_or(chrono::DateTime::<chrono::Utc>::MIN_UTC);

        let candidates = self.service.idle_baskets(cutoff).await?;
        let mut report = SweepReport {
            scanned: candidates.len(),
            ..SweepReport::default()
        };

        for basket in candidates {
            match self.service.retire_idle(basket.id(), cutoff).await {
                Ok(RetireOutcome::Retired) => report.retired += 1,
                Ok(RetireOutcome::Skipped) => report.skipped += 1,
                Err(err) => {
                    tracing::warn!(basket_id = %basket.id(), error = %err, "failed to retire idle basket");
                    metrics::counter!("basket_sweep_failures_total").increment(1);
                    report.failed += 1;
                }
            }
        }

        metrics::counter!("basket_sweeps_total").increment(1);
        metrics::counter!("basket_swept_total").increment(report.retired as u64);
        metrics::histogram!("basket_sweep_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        if !report.is_empty() {
            tracing::info!(
                scanned = report.scanned,
                retired = report.retired,
                skipped = report.skipped,
                failed = report.failed,
                "sweep finished"
            );
        }
        Ok(report)
    }

    /// Sweeps on every interval tick until `shutdown` flips to true or its
    /// sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            interval_secs = self.config.interval.as_secs(),
            idle_timeout_secs = self.config.idle_timeout.as_secs(),
            "expiry sweeper started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(err) = self.sweep_once().await {
                        tracing::warn!(error = %err, "sweep pass failed");
                        metrics::counter!("basket_sweep_failures_total").increment(1);
                    }
                }
                changed = shutdown.changed() => {
                    let stop = changed.is_err() || *shutdown.borrow();
                    if stop {
                        break;
                    }
                }
            }
        }

        tracing::info!("expiry sweeper stopped");
    }
}
