//! Sends one test alert through every configured channel, then runs a sample
//! message through the configured rules.

use chrono::Local;
use feed_harvester::config::{rules::build_pipeline, CollectorConfig};
use feed_harvester::Message;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();
    let cfg = CollectorConfig::load_default()?;

    for (name, ch) in &cfg.channels {
        let sink = ch.build(cfg.http_timeout_secs)?;
        match sink.notify("[TEST] feed-harvester", "test alert").await {
            Ok(()) => println!("{name} ({}): ok", sink.channel_name()),
            Err(e) => println!("{name} ({}): {e}", sink.channel_name()),
        }
    }

    let sample = std::env::args().nth(1).unwrap_or_else(|| "维持评级，目标价上调".to_string());
    let msg = Message::new(0, Local::now().format("%Y-%m-%d %H:%M").to_string(), sample);
    let report = build_pipeline(&cfg)?.dispatch(&[msg]).await;
    println!(
        "rules: {}, matched: {}, delivered: {}, failed: {}",
        cfg.rules.len(),
        report.matched,
        report.delivered,
        report.failed
    );
    Ok(())
}
