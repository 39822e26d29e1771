// src/filter.rs
//! Match rules over freshly merged messages and their alert dispatch.
//!
//! Every rule is checked against every message, a message may fire several
//! rules. Each alert runs as its own task; a failed delivery is logged and
//! counted but never stops the remaining alerts.

use std::sync::Arc;

use metrics::counter;
use regex::Regex;
use serde::Serialize;
use tokio::task::JoinSet;

use crate::message::{plain_text, Message};
use crate::notify::AlertSink;

/// Predicate over a message body.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Body contains every keyword.
    AllOf(Vec<String>),
    /// Body contains at least one keyword.
    AnyOf(Vec<String>),
    Regex(Regex),
}

impl Matcher {
    pub fn matches(&self, body: &str) -> bool {
        match self {
            Matcher::AllOf(words) => words.iter().all(|w| body.contains(w.as_str())),
            Matcher::AnyOf(words) => words.iter().any(|w| body.contains(w.as_str())),
            Matcher::Regex(re) => re.is_match(body),
        }
    }
}

/// A predicate plus the channel its alerts go to.
#[derive(Clone)]
pub struct MatchRule {
    name: String,
    matcher: Matcher,
    title_prefix: Option<String>,
    sink: Arc<dyn AlertSink>,
}

impl MatchRule {
    pub fn new(name: impl Into<String>, matcher: Matcher, sink: Arc<dyn AlertSink>) -> Self {
        Self {
            name: name.into(),
            matcher,
            title_prefix: None,
            sink,
        }
    }

    /// Alert titles become `"{prefix} {created_at}"`.
    pub fn with_title_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.title_prefix = (!prefix.trim().is_empty()).then_some(prefix);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matches(&self, msg: &Message) -> bool {
        self.matcher.matches(&msg.body)
    }

    pub fn title_for(&self, msg: &Message) -> String {
        match &self.title_prefix {
            Some(p) => format!("{p} {}", msg.created_at),
            None => msg.created_at.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub evaluated: usize,
    pub matched: usize,
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Clone, Default)]
pub struct AlertPipeline {
    rules: Vec<MatchRule>,
}

impl AlertPipeline {
    pub fn new(rules: Vec<MatchRule>) -> Self {
        Self { rules }
    }

    pub fn add_rule(&mut self, rule: MatchRule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[MatchRule] {
        &self.rules
    }

    /// Evaluate all rules on `msgs` (in the given order) and wait for every alert to settle.
    pub async fn dispatch(&self, msgs: &[Message]) -> DispatchReport {
        let mut report = DispatchReport {
            evaluated: msgs.len(),
            ..Default::default()
        };
        if self.rules.is_empty() || msgs.is_empty() {
            return report;
        }

        let mut tasks = JoinSet::new();
        for msg in msgs {
            for rule in &self.rules {
                if !rule.matches(msg) {
                    continue;
                }
                report.matched += 1;
                tracing::debug!(rule = %rule.name, id = msg.id, "rule matched");

                let sink = Arc::clone(&rule.sink);
                let rule_name = rule.name.clone();
                let title = rule.title_for(msg);
                let content = plain_text(&msg.body);
                let id = msg.id;
                tasks.spawn(async move {
                    let res = sink.notify(&title, &content).await;
                    if let Err(e) = &res {
                        tracing::warn!(
                            rule = %rule_name,
                            channel = sink.channel_name(),
                            id,
                            error = %e,
                            "alert delivery failed"
                        );
                    }
                    res.is_ok()
                });
            }
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(true) => report.delivered += 1,
                Ok(false) => report.failed += 1,
                Err(e) => {
                    tracing::error!(error = %e, "alert task panicked");
                    report.failed += 1;
                }
            }
        }

        counter!("harvester_alerts_sent_total").increment(report.delivered as u64);
        counter!("harvester_alerts_failed_total").increment(report.failed as u64);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_of_needs_every_keyword() {
        let m = Matcher::AllOf(vec!["目标价".into(), "评级".into()]);
        assert!(m.matches("高盛维持评级，目标价上调"));
        assert!(!m.matches("目标价上调"));
    }

    #[test]
    fn any_of_and_regex() {
        let any = Matcher::AnyOf(vec!["PLUG".into(), "普拉格".into()]);
        assert!(any.matches("PLUG up 10%"));
        assert!(!any.matches("FCEL up"));

        let re = Matcher::Regex(Regex::new(r"(?i)price target \$\d+").unwrap());
        assert!(re.matches("New Price Target $42"));
    }

    #[test]
    fn title_prefix() {
        let rule = MatchRule::new("rate", Matcher::AnyOf(vec![]), Arc::new(crate::notify::LogNotifier))
            .with_title_prefix("Rate");
        let msg = Message::new(1, "2021-03-04 10:00", "x");
        assert_eq!(rule.title_for(&msg), "Rate 2021-03-04 10:00");

        let bare = MatchRule::new("bare", Matcher::AnyOf(vec![]), Arc::new(crate::notify::LogNotifier))
            .with_title_prefix("  ");
        assert_eq!(bare.title_for(&msg), "2021-03-04 10:00");
    }
}
