// src/metrics.rs
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the global Prometheus recorder and describe the harvester series.
/// Only one recorder can exist per process.
pub fn install() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    describe();
    Ok(handle)
}

pub fn describe() {
    describe_counter!("harvester_pages_fetched_total", "Feed pages fetched and decoded.");
    describe_histogram!("harvester_fetch_ms", "Page fetch + decode time in milliseconds.");
    describe_counter!("harvester_cycles_total", "Refresh cycles that ran to a stop rule.");
    describe_counter!("harvester_cycles_failed_total", "Refresh cycles aborted by a fetch error.");
    describe_counter!("harvester_cycles_skipped_total", "Ticks dropped because a cycle was running.");
    describe_counter!("harvester_messages_added_total", "Messages added to the collector.");
    describe_gauge!("harvester_messages_stored", "Messages currently held by the collector.");
    describe_counter!("harvester_alerts_sent_total", "Alerts delivered.");
    describe_counter!("harvester_alerts_failed_total", "Alerts that failed delivery.");
    describe_counter!("harvester_saves_total", "Snapshots written.");
    describe_counter!("harvester_save_errors_total", "Snapshot writes that failed.");
}
