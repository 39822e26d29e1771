// tests/alert_pipeline.rs
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use feed_harvester::notify::AlertSink;
use feed_harvester::{AlertDeliveryError, AlertPipeline, MatchRule, Matcher, Message};

struct Recorder {
    name: &'static str,
    fail: bool,
    calls: Mutex<Vec<(String, String)>>,
}

impl Recorder {
    fn new(name: &'static str, fail: bool) -> Arc<Self> {
        Arc::new(Self {
            name,
            fail,
            calls: Mutex::new(vec![]),
        })
    }

    fn sorted_calls(&self) -> Vec<(String, String)> {
        let mut v = self.calls.lock().unwrap().clone();
        v.sort();
        v
    }
}

#[async_trait]
impl AlertSink for Recorder {
    async fn notify(&self, title: &str, content: &str) -> Result<(), AlertDeliveryError> {
        self.calls.lock().unwrap().push((title.into(), content.into()));
        if self.fail {
            return Err(AlertDeliveryError::Status(500));
        }
        Ok(())
    }

    fn channel_name(&self) -> &str {
        self.name
    }
}

fn msgs() -> Vec<Message> {
    vec![
        Message::new(3, "2021-03-04 10:03", "alpha one"),
        Message::new(2, "2021-03-04 10:02", "beta two"),
        Message::new(1, "2021-03-04 10:01", "alpha three"),
    ]
}

#[tokio::test]
async fn every_rule_sees_every_message() {
    let a = Recorder::new("a", false);
    let b = Recorder::new("b", false);
    let pipeline = AlertPipeline::new(vec![
        MatchRule::new("A", Matcher::AnyOf(vec!["alpha".into()]), a.clone()),
        MatchRule::new("B", Matcher::AnyOf(vec!["beta".into()]), b.clone()),
    ]);

    let report = pipeline.dispatch(&msgs()).await;
    assert_eq!(report.evaluated, 3);
    assert_eq!(report.matched, 3);
    assert_eq!(report.delivered, 3);
    assert_eq!(
        a.sorted_calls(),
        vec![
            ("2021-03-04 10:01".to_string(), "alpha three".to_string()),
            ("2021-03-04 10:03".to_string(), "alpha one".to_string()),
        ]
    );
    assert_eq!(
        b.sorted_calls(),
        vec![("2021-03-04 10:02".to_string(), "beta two".to_string())]
    );
}

#[tokio::test]
async fn one_message_can_fire_several_rules() {
    let a = Recorder::new("a", false);
    let pipeline = AlertPipeline::new(vec![
        MatchRule::new("rating", Matcher::AllOf(vec!["目标价".into(), "评级".into()]), a.clone())
            .with_title_prefix("Rate"),
        MatchRule::new("any", Matcher::AnyOf(vec!["评级".into()]), a.clone()),
    ]);
    let m = vec![Message::new(9, "2021-03-04 11:00", "维持评级，目标价上调")];
    let report = pipeline.dispatch(&m).await;
    assert_eq!(report.matched, 2);
    let titles: Vec<String> = a.sorted_calls().into_iter().map(|(t, _)| t).collect();
    assert_eq!(titles, vec!["2021-03-04 11:00", "Rate 2021-03-04 11:00"]);
}

#[tokio::test]
async fn failed_delivery_does_not_stop_the_rest() {
    let broken = Recorder::new("broken", true);
    let ok = Recorder::new("ok", false);
    let pipeline = AlertPipeline::new(vec![
        MatchRule::new("A", Matcher::AnyOf(vec!["alpha".into()]), broken.clone()),
        MatchRule::new("B", Matcher::AnyOf(vec!["beta".into()]), ok.clone()),
    ]);

    let report = pipeline.dispatch(&msgs()).await;
    assert_eq!(report.matched, 3);
    assert_eq!(report.failed, 2);
    assert_eq!(report.delivered, 1);
    assert_eq!(broken.sorted_calls().len(), 2);
    assert_eq!(ok.sorted_calls().len(), 1);
}

#[tokio::test]
async fn no_rules_no_alerts() {
    let report = AlertPipeline::default().dispatch(&msgs()).await;
    assert_eq!(report.matched, 0);
    assert_eq!(report.evaluated, 3);
}
