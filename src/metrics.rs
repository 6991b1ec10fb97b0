//! Run metrics recorded through the `metrics` facade and rendered by the
//! Prometheus recorder for the Pushgateway push.

use crate::pipeline::PipelineResult;
use ::metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::{info, warn};

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Installs the global Prometheus recorder. Safe to call more than once.
pub fn init_metrics() {
    if HANDLE.get().is_some() {
        return;
    }
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = HANDLE.set(handle);
            describe();
            info!("Metrics recorder installed");
        }
        Err(e) => warn!("Metrics recorder install failed: {}", e),
    }
}

/// Text exposition of everything recorded so far.
pub fn render() -> Option<String> {
    HANDLE.get().map(|handle| handle.render())
}

fn describe() {
    describe_counter!("ig_rows_total", "Result rows by status");
    describe_counter!("ig_deactivations_total", "Registry items deactivated");
    describe_counter!("ig_deactivation_failures_total", "Registry deactivations that failed");
    describe_counter!("ig_upload_failures_total", "Snapshot uploads that failed");
    describe_histogram!("ig_run_duration_seconds", "Wall-clock duration of a run");
    describe_gauge!("ig_last_run_timestamp_seconds", "Unix time the last run finished");
}

/// Records the outcome of one run.
pub fn record_run(result: &PipelineResult, duration_secs: f64) {
    counter!("ig_rows_total", "status" => "ok").increment(result.ok_rows as u64);
    counter!("ig_rows_total", "status" => "error").increment(result.error_rows as u64);
    counter!("ig_deactivations_total").increment(result.deactivated as u64);
    counter!("ig_deactivation_failures_total").increment(result.deactivation_failures.len() as u64);
    if result.upload.is_err() {
        counter!("ig_upload_failures_total").increment(1);
    }
    histogram!("ig_run_duration_seconds").record(duration_secs);
    gauge!("ig_last_run_timestamp_seconds").set(chrono::Utc::now().timestamp() as f64);
}

/// Pushes the rendered snapshot to a Prometheus Pushgateway.
pub async fn push_pushgateway_metrics(base: &str, instance: &str) {
    let Some(body) = render() else {
        warn!("Metrics recorder not installed; skipping Pushgateway push");
        return;
    };
    let push_url = format!(
        "{}/metrics/job/{}/instance/{}",
        base.trim_end_matches('/'),
        "ig_scraper",
        instance
    );

    let push_res = reqwest::Client::new()
        .post(&push_url)
        .header("Content-Type", "text/plain; version=0.0.4")
        .body(body)
        .send()
        .await;

    match push_res {
        Ok(r) if r.status().is_success() => info!("Pushed metrics to Pushgateway"),
        Ok(r) => warn!("Pushgateway push responded with status {}", r.status().as_u16()),
        Err(e) => warn!("Failed to push metrics to Pushgateway: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SinkError;
    use uuid::Uuid;

    fn result(upload_failed: bool) -> PipelineResult {
        PipelineResult {
            run_id: Uuid::new_v4(),
            total_rows: 5,
            ok_rows: 3,
            error_rows: 2,
            deactivated: 1,
            deactivation_failures: Vec::new(),
            upload: if upload_failed {
                Err(SinkError::Upload {
                    key: "k".into(),
                    message: "HTTP 503".into(),
                })
            } else {
                Ok("k".into())
            },
            batch: Vec::new(),
        }
    }

    #[test]
    fn run_outcome_is_visible_in_rendered_snapshot() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        ::metrics::with_local_recorder(&recorder, || record_run(&result(true), 12.5));

        let text = handle.render();
        assert!(text.contains(r#"ig_rows_total{status="ok"} 3"#), "{text}");
        assert!(text.contains(r#"ig_rows_total{status="error"} 2"#), "{text}");
        assert!(text.contains("ig_deactivations_total 1"), "{text}");
        assert!(text.contains("ig_upload_failures_total 1"), "{text}");
        assert!(text.contains("ig_run_duration_seconds"), "{text}");
    }

    #[test]
    fn successful_upload_records_no_failure() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        ::metrics::with_local_recorder(&recorder, || record_run(&result(false), 1.0));

        assert!(!handle.render().contains("ig_upload_failures_total 1"));
    }
}
