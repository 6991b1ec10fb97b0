//! Batch driver: registry items in, one persisted snapshot out.

use crate::app::aggregate::{merge_row, select_deactivation_candidates, SourceOutcomes};
use crate::app::fetchers::{fetch_comments, fetch_post, fetch_profile_for_post};
use crate::app::ports::{ObjectStore, RegistryPort, ScrapeSession};
use crate::app::sink::{self, DeactivationReport};
use crate::config::{Config, DocumentOrient};
use crate::error::{Result, SinkError};
use crate::identifier::derive_ids;
use crate::infra::http_client::build_client;
use crate::infra::instagram::{InstagramEndpoints, InstagramSession, SessionSettings};
use crate::infra::registry::HttpRegistry;
use crate::infra::s3::S3Store;
use crate::infra::sigv4::SigningKey;
use crate::metrics::{push_pushgateway_metrics, record_run};
use crate::types::{FetchOutcome, ResultBatch, ResultRow, RowStatus, SourceItem};
use chrono::{DateTime, Local};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, instrument, warn, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub platform_name: String,
    pub orient: DocumentOrient,
    pub local_dir: Option<PathBuf>,
}

/// Summary of a complete run.
#[derive(Debug)]
pub struct PipelineResult {
    pub run_id: Uuid,
    pub total_rows: usize,
    pub ok_rows: usize,
    pub error_rows: usize,
    pub deactivated: usize,
    pub deactivation_failures: Vec<SinkError>,
    /// Object key of the uploaded snapshot.
    pub upload: std::result::Result<String, SinkError>,
    pub batch: ResultBatch,
}

pub struct Pipeline<'a> {
    registry: &'a dyn RegistryPort,
    store: &'a dyn ObjectStore,
    options: PipelineOptions,
}

/// Keeps only `active` items, in registry order.
pub fn active_items(items: Vec<SourceItem>) -> Vec<SourceItem> {
    items.into_iter().filter(|item| item.active).collect()
}

/// Local ISO-8601 run timestamp stamped on every row.
pub fn run_timestamp(run_at: &DateTime<Local>) -> String {
    run_at.naive_local().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

impl<'a> Pipeline<'a> {
    pub fn new(registry: &'a dyn RegistryPort, store: &'a dyn ObjectStore, options: PipelineOptions) -> Self {
        Self {
            registry,
            store,
            options,
        }
    }

    /// Derive, fetch and merge one item. Never fails: every problem ends
    /// up in the row's error columns.
    #[instrument(skip(self, session, item, run_timestamp), fields(item_id = %item.id))]
    pub async fn process_item(
        &self,
        session: &dyn ScrapeSession,
        item: &SourceItem,
        run_timestamp: &str,
    ) -> ResultRow {
        let ids = derive_ids(item.url_or_empty());

        let outcomes = match &ids.media_id {
            Ok(media_id) => {
                let post = fetch_post(session, *media_id).await;
                let profile = fetch_profile_for_post(session, &post).await;
                let comments = fetch_comments(session, *media_id).await;
                SourceOutcomes { post, profile, comments }
            }
            Err(e) => {
                warn!(url = item.url_or_empty(), "{}", e);
                let post = FetchOutcome::Failure(e.to_string());
                let profile = fetch_profile_for_post(session, &post).await;
                SourceOutcomes {
                    post,
                    profile,
                    comments: FetchOutcome::Failure(e.to_string()),
                }
            }
        };

        let local_url = self.registry.item_url(&item.id);
        let row = merge_row(item, ids, outcomes, local_url, run_timestamp);
        debug!(status = ?row.status, errors = ?row.error_message, "Merged row");
        row
    }

    /// One row per item, in input order. Items are processed strictly one
    /// after another on the shared session.
    pub async fn collect(
        &self,
        session: &dyn ScrapeSession,
        items: &[SourceItem],
        run_at: &DateTime<Local>,
    ) -> ResultBatch {
        let stamp = run_timestamp(run_at);
        let mut batch = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            batch.push(self.process_item(session, item, &stamp).await);
            if (i + 1) % 10 == 0 {
                info!("Processed {}/{} items", i + 1, items.len());
            }
        }
        batch
    }

    /// Deactivates gone items, then uploads the snapshot. Neither step
    /// aborts the other.
    pub async fn publish(
        &self,
        batch: &[ResultRow],
        run_at: &DateTime<Local>,
    ) -> (DeactivationReport, std::result::Result<String, SinkError>) {
        let candidates = select_deactivation_candidates(batch);
        let report = sink::deactivate_all(self.registry, &candidates).await;

        let key = sink::object_key(&self.options.platform_name, run_at);
        let upload = match sink::render_document(batch, self.options.orient) {
            Ok(document) => {
                if let Some(dir) = &self.options.local_dir {
                    match sink::write_local_copy(dir, &key, &document) {
                        Ok(path) => info!(path = %path.display(), "Wrote local copy"),
                        Err(e) => warn!("{}", e),
                    }
                }
                let uploaded = sink::upload(self.store, &key, document).await;
                uploaded.map(|()| key)
            }
            Err(e) => {
                warn!("{}", e);
                Err(e)
            }
        };
        (report, upload)
    }

    /// Collects on an open session, closes it, then publishes.
    pub async fn run(&self, run_id: Uuid, session: &dyn ScrapeSession, items: &[SourceItem]) -> PipelineResult {
        let run_at = Local::now();
        let batch = self.collect(session, items, &run_at).await;
        session.close().await;
        let (report, upload) = self.publish(&batch, &run_at).await;
        summarize(run_id, batch, report, upload)
    }
}

fn summarize(
    run_id: Uuid,
    batch: ResultBatch,
    report: DeactivationReport,
    upload: std::result::Result<String, SinkError>,
) -> PipelineResult {
    let ok_rows = batch.iter().filter(|row| row.status == RowStatus::Ok).count();
    let error_rows = batch.len() - ok_rows;

    PipelineResult {
        run_id,
        total_rows: batch.len(),
        ok_rows,
        error_rows,
        deactivated: report.deactivated,
        deactivation_failures: report.failures,
        upload,
        batch,
    }
}

/// Full production run wired from configuration.
pub async fn run(config: &Config) -> Result<PipelineResult> {
    let run_id = Uuid::new_v4();
    let span = info_span!("run", %run_id);
    execute(config, run_id).instrument(span).await
}

async fn execute(config: &Config, run_id: Uuid) -> Result<PipelineResult> {
    let started = Instant::now();
    let timeout = Duration::from_secs(config.tuning.scraper.timeout_seconds);
    let client = build_client(&config.user_agent, timeout)?;

    let registry = HttpRegistry::new(client.clone(), &config.api_url, &config.api_key);
    let store = S3Store::new(
        client,
        &config.endpoint_url,
        &config.bucket_name,
        SigningKey {
            access_key_id: config.aws_access_key_id.clone(),
            secret_access_key: config.aws_secret_access_key.clone(),
            region: config.aws_region.clone(),
            service: "s3".to_string(),
        },
    )?;

    let items = active_items(registry.list_items().await?);
    info!(active = items.len(), "Loaded active items");

    let session = InstagramSession::login(
        &config.ig_username,
        &config.ig_password,
        &config.user_agent,
        SessionSettings::from(&config.tuning.scraper),
        InstagramEndpoints::default(),
    )
    .await?;

    let pipeline = Pipeline::new(
        &registry,
        &store,
        PipelineOptions {
            platform_name: config.platform_name.clone(),
            orient: config.tuning.output.orient,
            local_dir: config.tuning.output.local_dir.clone(),
        },
    );

    let result = pipeline.run(run_id, &session, &items).await;

    record_run(&result, started.elapsed().as_secs_f64());
    if let Some(gateway) = &config.pushgateway_url {
        push_pushgateway_metrics(gateway, &config.platform_name).await;
    }

    info!(
        total = result.total_rows,
        ok = result.ok_rows,
        errors = result.error_rows,
        deactivated = result.deactivated,
        "Run finished"
    );
    Ok(result)
}
