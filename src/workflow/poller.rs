//! Periodic read-only refresh.
//!
//! The poller is the only autonomous activity: it re-fetches and rederives on
//! a fixed interval and never submits actions.

use std::thread;
use std::time::Duration;

use crate::chronicle::{ActionClient, LedgerClient};
use crate::config::PollingConfig;
use crate::workflow::orchestrator::Orchestrator;

/// Ticks run and refreshes that failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub ticks: u64,
    pub failures: u64,
}

/// Fixed-interval refresh driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Poller {
    interval: Duration,
    /// Stop after this many ticks; `None` runs until the callback stops it.
    max_ticks: Option<u64>,
}

impl Poller {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_ticks: None,
        }
    }

    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = Some(max_ticks);
        self
    }

    /// Build from `[polling]`; `max_polls = 0` means unbounded.
    pub fn from_config(config: &PollingConfig) -> Self {
        let poller = Self::new(Duration::from_secs(config.interval_seconds));
        match config.max_polls {
            0 => poller,
            n => poller.with_max_ticks(n),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_ticks(&self) -> Option<u64> {
        self.max_ticks
    }

    /// Refresh, hand the orchestrator to `on_tick`, sleep, repeat.
    ///
    /// `on_tick` returns `false` to stop early. A failed refresh is counted
    /// and polling continues with the previous view.
    pub fn run<L, A, F>(&self, orchestrator: &mut Orchestrator<L, A>, mut on_tick: F) -> PollSummary
    where
        L: LedgerClient,
        A: ActionClient,
        F: FnMut(u64, &Orchestrator<L, A>) -> bool,
    {
        let mut summary = PollSummary::default();

        loop {
            summary.ticks += 1;
            if orchestrator.refresh().is_err() {
                summary.failures += 1;
            }
            tracing::debug!(
                tick = summary.ticks,
                failures = summary.failures,
                "poll tick"
            );

            if !on_tick(summary.ticks, orchestrator) {
                break;
            }
            if self.max_ticks.is_some_and(|max| summary.ticks >= max) {
                break;
            }
            thread::sleep(self.interval);
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chronicle::MemoryChronicle;
    use crate::core::{ReadinessSnapshot, TicketEntry};
    use crate::policy::QuarantinePolicy;
    use crate::workflow::SessionContext;
    use chrono::Utc;
    use std::sync::Arc;

    fn orchestrator() -> (
        Arc<MemoryChronicle>,
        Orchestrator<Arc<MemoryChronicle>, Arc<MemoryChronicle>>,
    ) {
        let chronicle = Arc::new(MemoryChronicle::new());
        let mut snapshot = ReadinessSnapshot::new("proj", Utc::now());
        snapshot.buckets.ready = vec![TicketEntry::new("T-1", "a")];
        chronicle.put_snapshot(snapshot);
        let orch = Orchestrator::new(
            Arc::clone(&chronicle),
            Arc::clone(&chronicle),
            QuarantinePolicy::default(),
            "codex",
            SessionContext::new("proj"),
        )
        .unwrap();
        (chronicle, orch)
    }

    #[test]
    fn test_runs_max_ticks_and_never_submits() {
        let (chronicle, mut orch) = orchestrator();
        let poller = Poller::new(Duration::ZERO).with_max_ticks(3);

        let mut seen = Vec::new();
        let summary = poller.run(&mut orch, |tick, o| {
            seen.push((tick, o.view().is_some()));
            true
        });

        assert_eq!(summary, PollSummary { ticks: 3, failures: 0 });
        assert_eq!(seen, vec![(1, true), (2, true), (3, true)]);
        assert_eq!(chronicle.read_count(), 3);
        assert_eq!(chronicle.submission_count(), 0);
    }

    #[test]
    fn test_callback_stops_polling() {
        let (_chronicle, mut orch) = orchestrator();
        let summary = Poller::new(Duration::ZERO).run(&mut orch, |tick, _| tick < 2);
        assert_eq!(summary.ticks, 2);
    }

    #[test]
    fn test_failures_counted_and_polling_continues() {
        let (chronicle, mut orch) = orchestrator();
        orch.refresh().unwrap();
        chronicle.fail_fetches(Some("down"));

        let summary = Poller::new(Duration::ZERO)
            .with_max_ticks(2)
            .run(&mut orch, |_, o| {
                assert!(o.view().is_some());
                assert!(o.last_error().is_some());
                true
            });

        assert_eq!(summary, PollSummary { ticks: 2, failures: 2 });
    }

    #[test]
    fn test_from_config() {
        let config = PollingConfig {
            interval_seconds: 7,
            max_polls: 0,
        };
        let poller = Poller::from_config(&config);
        assert_eq!(poller.interval(), Duration::from_secs(7));
        assert_eq!(poller.max_ticks(), None);

        let bounded = Poller::from_config(&PollingConfig {
            interval_seconds: 1,
            max_polls: 4,
        });
        assert_eq!(bounded.max_ticks(), Some(4));
    }
}
