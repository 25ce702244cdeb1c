//! Periodic snapshot warm-up.
//!
//! Sweeps every family on a fixed interval and starts a background refresh
//! for any snapshot that is missing or older than its freshness window.
//! Requests keep being served from the snapshot in the meantime.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{Duration, MissedTickBehavior, interval};

use super::facade::CacheFacade;
use super::family::MetricFamily;
use super::refresh::TriggerOutcome;

/// Counters across warm-up sweeps.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WarmerState {
    /// Sweeps performed.
    pub sweeps: u64,
    /// Refreshes started.
    pub triggered: u64,
    /// Families skipped because their snapshot was fresh.
    pub fresh: u64,
    /// Families skipped because a refresh was already running.
    pub in_flight: u64,
}

impl WarmerState {
    fn record(&mut self, outcome: Option<&TriggerOutcome>) {
        match outcome {
            None => self.fresh += 1,
            Some(TriggerOutcome::Started(_)) => self.triggered += 1,
            Some(TriggerOutcome::AlreadyInFlight) => self.in_flight += 1,
        }
    }
}

/// Run warm-up sweeps until `shutdown` flips to `true` or its sender drops.
///
/// The first sweep happens immediately.
pub async fn run_warmer(
    facade: Arc<CacheFacade>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> WarmerState {
    let mut state = WarmerState::default();
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(interval_secs = every.as_secs(), "Snapshot warmer started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                state.sweeps += 1;
                for family in MetricFamily::ALL {
                    let outcome = facade.warm(*family);
                    state.record(outcome.as_ref());
                }
                tracing::debug!(sweep = state.sweeps, "Warm-up sweep done");
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    tracing::info!(
        sweeps = state.sweeps,
        triggered = state.triggered,
        "Snapshot warmer stopped"
    );
    state
}
