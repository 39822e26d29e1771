// src/lib.rs
//! Incremental harvester for paginated live-news feeds.
//!
//! A refresh cycle pulls pages newest first, merges each page into the
//! collector, stops once the convergence policy is satisfied and hands the
//! new messages to the alert rules. Persistence and the inspection API only
//! read the collector.

pub mod api;
pub mod config;
pub mod convergence;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod merge;
pub mod message;
pub mod metrics;
pub mod notify;
pub mod persist;
pub mod scheduler;
pub mod store;

// ---- Re-exports for the binary and tests ----
pub use crate::api::create_router;
pub use crate::config::CollectorConfig;
pub use crate::convergence::{ConvergencePolicy, StopReason};
pub use crate::error::{AlertDeliveryError, FetchError, PersistenceError};
pub use crate::filter::{AlertPipeline, MatchRule, Matcher};
pub use crate::message::Message;
pub use crate::scheduler::{CycleReport, RefreshScheduler, TickOutcome};
pub use crate::store::{CollectorState, StoreSettings};
