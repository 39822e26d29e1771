// src/convergence.rs
//! Decides after every merged page whether a refresh cycle fetches another page.
//!
//! Rules, first match wins:
//! 1. no growth for `pause_count` consecutive pages → stop (upstream exhausted or stuck)
//! 2. regular cycle and fewer than `page_size` new messages → stop (caught up)
//! 3. backfill and the store reached `initial_target_count` → stop
//! 4. optional hard cap on pages per cycle → stop
//! otherwise continue with the next page.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvergencePolicy {
    pub page_size: usize,
    pub initial_target_count: usize,
    pub pause_count: u32,
    pub max_pages: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    NoGrowth { streak: u32 },
    CaughtUp { added: usize },
    TargetReached { total: usize },
    PageLimit { pages: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Stop(StopReason),
}

impl ConvergencePolicy {
    /// Fresh per-cycle tracker. `initial` marks a backfill cycle.
    pub fn tracker(&self, initial: bool) -> PageTracker {
        PageTracker {
            policy: *self,
            initial,
            no_growth_streak: 0,
            pages: 0,
        }
    }
}

/// Per-cycle state of the policy (the no-growth streak and page count).
#[derive(Debug, Clone)]
pub struct PageTracker {
    policy: ConvergencePolicy,
    initial: bool,
    no_growth_streak: u32,
    pages: u32,
}

impl PageTracker {
    pub fn is_initial(&self) -> bool {
        self.initial
    }

    pub fn pages(&self) -> u32 {
        self.pages
    }

    /// Feed the store sizes around one page merge. An empty page is a no-growth step.
    pub fn observe(&mut self, size_before: usize, size_after: usize) -> Step {
        self.pages += 1;
        let added = size_after.saturating_sub(size_before);

        if added == 0 {
            self.no_growth_streak += 1;
        } else {
            self.no_growth_streak = 0;
        }
        if self.no_growth_streak >= self.policy.pause_count.max(1) {
            return Step::Stop(StopReason::NoGrowth {
                streak: self.no_growth_streak,
            });
        }

        if !self.initial && added < self.policy.page_size {
            return Step::Stop(StopReason::CaughtUp { added });
        }

        if self.initial && size_after >= self.policy.initial_target_count {
            return Step::Stop(StopReason::TargetReached { total: size_after });
        }

        if let Some(max) = self.policy.max_pages {
            if self.pages >= max {
                return Step::Stop(StopReason::PageLimit { pages: self.pages });
            }
        }

        Step::Continue
    }
}
