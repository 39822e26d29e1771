// src/scheduler.rs
//! Refresh cycles: fetch pages from the newest one, merge each into the
//! collector and stop when the convergence policy says so.
//!
//! At most one cycle runs at a time. A tick that finds a cycle in progress is
//! dropped, not queued. The single-flight lock is separate from the store lock.

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::convergence::{ConvergencePolicy, Step, StopReason};
use crate::error::FetchError;
use crate::fetch::PageSource;
use crate::filter::{AlertPipeline, DispatchReport};
use crate::merge::{merge_descending, newly_added, validate_sequence};
use crate::message::Message;
use crate::store::CollectorState;

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub initial: bool,
    pub pages: u32,
    pub added: usize,
    pub total: usize,
    pub stop: StopReason,
    pub alerts: DispatchReport,
}

#[derive(Debug)]
pub enum TickOutcome {
    Completed(CycleReport),
    Failed(FetchError),
    Skipped,
}

pub struct RefreshScheduler {
    source: Arc<dyn PageSource>,
    state: Arc<CollectorState>,
    pipeline: Arc<AlertPipeline>,
    policy: ConvergencePolicy,
    look_back: bool,
    alert_on_backfill: bool,
    in_flight: Mutex<()>,
}

impl RefreshScheduler {
    pub fn new(
        source: Arc<dyn PageSource>,
        state: Arc<CollectorState>,
        pipeline: Arc<AlertPipeline>,
        policy: ConvergencePolicy,
    ) -> Self {
        Self {
            source,
            state,
            pipeline,
            policy,
            look_back: false,
            alert_on_backfill: true,
            in_flight: Mutex::new(()),
        }
    }

    /// Keep backfilling until `initial_target_count` even when the store is not empty.
    pub fn look_back(mut self, look_back: bool) -> Self {
        self.look_back = look_back;
        self
    }

    pub fn alert_on_backfill(mut self, enabled: bool) -> Self {
        self.alert_on_backfill = enabled;
        self
    }

    pub fn state(&self) -> &Arc<CollectorState> {
        &self.state
    }

    /// Run one cycle unless one is already running.
    pub async fn tick(&self) -> TickOutcome {
        let Ok(_guard) = self.in_flight.try_lock() else {
            counter!("harvester_cycles_skipped_total").increment(1);
            tracing::info!(feed = self.source.name(), "refresh already running, tick dropped");
            return TickOutcome::Skipped;
        };

        match self.run_cycle().await {
            Ok(report) => {
                counter!("harvester_cycles_total").increment(1);
                counter!("harvester_messages_added_total").increment(report.added as u64);
                gauge!("harvester_messages_stored").set(report.total as f64);
                tracing::info!(
                    feed = self.source.name(),
                    initial = report.initial,
                    pages = report.pages,
                    added = report.added,
                    total = report.total,
                    stop = ?report.stop,
                    alerts = report.alerts.matched,
                    "refresh cycle done"
                );
                TickOutcome::Completed(report)
            }
            Err(e) => {
                counter!("harvester_cycles_failed_total").increment(1);
                tracing::warn!(feed = self.source.name(), error = %e, "refresh cycle aborted");
                TickOutcome::Failed(e)
            }
        }
    }

    /// Tick every `period` on the runtime. Each tick runs on its own task so a
    /// slow cycle makes the following ticks skip instead of piling up.
    pub fn spawn(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let this = Arc::clone(&self);
                tokio::spawn(async move {
                    this.tick().await;
                });
            }
        })
    }

    /// Wait for a running cycle to finish. Used on shutdown.
    pub async fn wait_idle(&self) {
        let _guard = self.in_flight.lock().await;
    }

    fn is_backfill(&self, stored: usize) -> bool {
        if self.look_back {
            stored < self.policy.initial_target_count
        } else {
            stored == 0
        }
    }

    async fn run_cycle(&self) -> Result<CycleReport, FetchError> {
        let before = self.state.snapshot();
        let initial = self.is_backfill(before.len());
        let mut tracker = self.policy.tracker(initial);
        let mut current = Arc::clone(&before);
        let mut page_idx = self.source.first_page();

        let stop = loop {
            let page = match self.source.fetch_page(page_idx, self.policy.page_size).await {
                Ok(p) => p,
                Err(e) => {
                    tracing::debug!(page = page_idx, "fetch failed, keeping pages merged so far");
                    // Messages already installed still get their alerts.
                    self.alert_new(&before, &current, initial).await;
                    return Err(e);
                }
            };

            let size_before = current.len();
            let merged = merge_descending(current.as_slice(), &page);
            if merged.len() != size_before {
                check_consistency(&merged);
                let merged = Arc::new(merged);
                self.state.replace(Arc::clone(&merged));
                current = merged;
            }

            let step = tracker.observe(size_before, current.len());
            tracing::debug!(
                page = page_idx,
                fetched = page.len(),
                added = current.len() - size_before,
                total = current.len(),
                "page merged"
            );
            match step {
                Step::Continue => page_idx += 1,
                Step::Stop(reason) => break reason,
            }
        };

        let alerts = self.alert_new(&before, &current, initial).await;
        Ok(CycleReport {
            initial: tracker.is_initial(),
            pages: tracker.pages(),
            added: current.len() - before.len(),
            total: current.len(),
            stop,
            alerts,
        })
    }

    async fn alert_new(&self, before: &[Message], after: &[Message], initial: bool) -> DispatchReport {
        if before.len() == after.len() {
            return DispatchReport::default();
        }
        let fresh = newly_added(before, after);
        if initial && !self.alert_on_backfill {
            tracing::debug!(count = fresh.len(), "backfill, alerts suppressed");
            return DispatchReport {
                evaluated: fresh.len(),
                ..Default::default()
            };
        }
        self.pipeline.dispatch(&fresh).await
    }
}

/// A violation here is a merge defect, never an upstream data problem.
fn check_consistency(seq: &[Message]) {
    if let Err(v) = validate_sequence(seq) {
        tracing::error!(violation = %v, "merged sequence broke ordering invariant");
        debug_assert!(false, "merged sequence broke ordering invariant: {v}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::store::StoreSettings;

    /// Serves ids `start - page*size ..` downwards, `pages` pages deep.
    struct Countdown {
        start: i64,
        pages: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl PageSource for Countdown {
        async fn fetch_page(&self, page: u32, page_size: usize) -> Result<Vec<Message>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if page >= self.pages {
                return Ok(vec![]);
            }
            let top = self.start - (page as i64) * page_size as i64;
            Ok((0..page_size as i64)
                .map(|k| Message::new(top - k, "2021-01-01 10:00", "m"))
                .collect())
        }

        fn name(&self) -> &str {
            "countdown"
        }
    }

    fn policy() -> ConvergencePolicy {
        ConvergencePolicy {
            page_size: 10,
            initial_target_count: 1000,
            pause_count: 2,
            max_pages: None,
        }
    }

    fn state() -> Arc<CollectorState> {
        Arc::new(CollectorState::new(StoreSettings {
            initial_target_count: 1000,
            page_size: 10,
        }))
    }

    #[tokio::test]
    async fn backfill_stops_when_upstream_runs_dry() {
        let src = Arc::new(Countdown {
            start: 100,
            pages: 3,
            calls: AtomicU32::new(0),
        });
        let sched = RefreshScheduler::new(src.clone(), state(), Arc::default(), policy());
        let TickOutcome::Completed(r) = sched.tick().await else {
            panic!("cycle should complete");
        };
        assert!(r.initial);
        assert_eq!(r.total, 30);
        assert_eq!(r.stop, StopReason::NoGrowth { streak: 2 });
        assert_eq!(src.calls.load(Ordering::SeqCst), 5);
        // one write per growing page
        assert_eq!(sched.state().revision(), 3);
    }

    #[tokio::test]
    async fn look_back_resumes_backfill_below_target() {
        let st = state();
        st.replace(vec![Message::new(100, "t", "m")]);
        let src = Arc::new(Countdown {
            start: 100,
            pages: 3,
            calls: AtomicU32::new(0),
        });
        let sched = RefreshScheduler::new(src, st, Arc::default(), policy()).look_back(true);
        let TickOutcome::Completed(r) = sched.tick().await else {
            panic!("cycle should complete");
        };
        assert!(r.initial);
        assert_eq!(r.total, 30);
        assert_eq!(r.added, 29);
    }

    /// One fresh message per call, each call taking `delay`.
    struct Slow {
        delay: Duration,
        calls: AtomicU32,
    }

    #[async_trait]
    impl PageSource for Slow {
        async fn fetch_page(&self, _page: u32, _page_size: usize) -> Result<Vec<Message>, FetchError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) as i64;
            tokio::time::sleep(self.delay).await;
            Ok(vec![Message::new(1_000 + n, "2021-01-01 10:00", "m")])
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timer_drops_ticks_while_cycle_runs() {
        let st = Arc::new(CollectorState::with_messages(
            StoreSettings {
                initial_target_count: 1000,
                page_size: 10,
            },
            vec![Message::new(1, "2021-01-01 09:00", "seed")],
        ));
        let src = Arc::new(Slow {
            delay: Duration::from_secs(25),
            calls: AtomicU32::new(0),
        });
        let sched = Arc::new(RefreshScheduler::new(src.clone(), Arc::clone(&st), Arc::default(), policy()));
        let timer = Arc::clone(&sched).spawn(Duration::from_secs(10));

        // ticks at 0, 30 and 60 start cycles; 10, 20, 40 and 50 land mid-cycle
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(src.calls.load(Ordering::SeqCst), 3);
        assert_eq!(st.len(), 3);
        assert_eq!(st.revision(), 2);

        timer.abort();
        sched.wait_idle().await;
        assert_eq!(st.len(), 4);
    }
}
