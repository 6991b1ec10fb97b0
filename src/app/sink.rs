use crate::app::ports::{ObjectStore, RegistryPort};
use crate::config::DocumentOrient;
use crate::constants::OUTPUT_FILE_SUFFIX;
use crate::error::SinkError;
use crate::types::ResultRow;
use chrono::{DateTime, TimeZone};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, instrument, warn};

/// Outcome of the deactivation pass. Failures are reported, not raised.
#[derive(Debug, Default)]
pub struct DeactivationReport {
    pub deactivated: usize,
    pub failures: Vec<SinkError>,
}

/// `{platform}{dateEpoch}/{timeEpoch}_output.json`, where `dateEpoch` is
/// midnight of the run date in the run's own timezone.
pub fn object_key<Tz: TimeZone>(platform: &str, run_at: &DateTime<Tz>) -> String {
    let time_epoch = run_at.timestamp();
    let date_epoch = run_at
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| run_at.timezone().from_local_datetime(&midnight).earliest())
        .map(|midnight| midnight.timestamp())
        .unwrap_or(time_epoch);

    format!("{platform}{date_epoch}/{time_epoch}{OUTPUT_FILE_SUFFIX}")
}

/// Serializes the whole batch, error rows included.
pub fn render_document(batch: &[ResultRow], orient: DocumentOrient) -> Result<Vec<u8>, SinkError> {
    match orient {
        DocumentOrient::Records => Ok(serde_json::to_vec(batch)?),
        DocumentOrient::Columns => {
            let rows = batch
                .iter()
                .map(|row| match serde_json::to_value(row)? {
                    Value::Object(map) => Ok(map),
                    _ => Ok(Map::new()),
                })
                .collect::<Result<Vec<_>, serde_json::Error>>()?;

            // Union of columns; rows lacking a column get null
            let mut columns: BTreeMap<String, Map<String, Value>> = BTreeMap::new();
            for row in &rows {
                for key in row.keys() {
                    columns.entry(key.clone()).or_default();
                }
            }
            for (index, row) in rows.iter().enumerate() {
                for (column, cells) in columns.iter_mut() {
                    let value = row.get(column).cloned().unwrap_or(Value::Null);
                    cells.insert(index.to_string(), value);
                }
            }
            Ok(serde_json::to_vec(&columns)?)
        }
    }
}

#[instrument(skip(registry, candidates), fields(candidates = candidates.len()))]
pub async fn deactivate_all(registry: &dyn RegistryPort, candidates: &[&str]) -> DeactivationReport {
    let mut report = DeactivationReport::default();
    for target in candidates {
        match registry.deactivate(target).await {
            Ok(()) => report.deactivated += 1,
            Err(e) => {
                warn!("{}", e);
                report.failures.push(e);
            }
        }
    }
    info!(
        deactivated = report.deactivated,
        failed = report.failures.len(),
        "Deactivation pass finished"
    );
    report
}

/// Uploads the rendered document under `key`. Errors are logged and
/// handed back to the caller.
#[instrument(skip(store, document), fields(bytes = document.len()))]
pub async fn upload(store: &dyn ObjectStore, key: &str, document: Vec<u8>) -> Result<(), SinkError> {
    match store.put_object(key, document, "application/json").await {
        Ok(()) => {
            info!("Uploaded output document");
            Ok(())
        }
        Err(e) => {
            error!("Failed to Upload File Due to: {}", e);
            Err(e)
        }
    }
}

/// Writes `document` to `{dir}/{key}`, creating intermediate directories.
pub fn write_local_copy(dir: &Path, key: &str, document: &[u8]) -> Result<PathBuf, SinkError> {
    let path = dir.join(key);
    let write = || -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, document)
    };
    write().map_err(|source| SinkError::LocalCopy {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CommentThread, MediaId, PostDetails, PostOwner, RowStatus};
    use async_trait::async_trait;
    use chrono::{FixedOffset, Utc};
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    fn ok_row() -> ResultRow {
        ResultRow {
            post: Some(PostDetails {
                view_count: Some(5),
                like_count: Some(1),
                comment_count: Some(0),
                caption: Some("hi".into()),
                hashtags: vec![],
                mentions: vec!["friend".into()],
                duration: Some(7.5),
                owner: PostOwner {
                    username: "creator".into(),
                    id: "99".into(),
                },
                date_utc: "2024/02/03".into(),
                date_local: "2024/02/03".into(),
                typename: "GraphVideo".into(),
                location: None,
            }),
            post_error: String::new(),
            profile: None,
            profile_error: "ProfileEM: boom".into(),
            comments: CommentThread::default(),
            comment_error: String::new(),
            media_id: Some(MediaId(1)),
            short_code: Some("B".into()),
            url: Some("https://www.instagram.com/p/B/".into()),
            unique_id: "1".into(),
            local_url: "https://registry/posts/1?key=k".into(),
            scraper_running_timestamp: "2024-02-03T10:00:00".into(),
            error_message: BTreeSet::from(["".to_string(), "ProfileEM: boom".to_string()]),
            status: RowStatus::Error,
        }
    }

    fn dne_row() -> ResultRow {
        ResultRow {
            post: None,
            post_error: "DNE".into(),
            profile: None,
            profile_error: "ProfileEM: no username".into(),
            comments: CommentThread::default(),
            comment_error: "DNE".into(),
            unique_id: "2".into(),
            error_message: BTreeSet::from(["DNE".to_string()]),
            ..ok_row()
        }
    }

    #[test]
    fn object_key_uses_run_date_and_time_epochs() {
        let run_at = Utc.with_ymd_and_hms(2023, 10, 16, 8, 30, 0).unwrap();
        let key = object_key("instagram", &run_at);
        assert_eq!(key, "instagram1697414400/1697445000_output.json");
    }

    #[test]
    fn object_key_midnight_follows_the_run_timezone() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        // 01:00 local on the 16th is still the 15th in UTC
        let run_at = offset.with_ymd_and_hms(2023, 10, 16, 1, 0, 0).unwrap();
        let key = object_key("ig", &run_at);
        assert_eq!(key, "ig1697407200/1697410800_output.json");
    }

    #[test]
    fn records_orient_keeps_row_order_and_shape() {
        let bytes = render_document(&[ok_row(), dne_row()], DocumentOrient::Records).unwrap();
        let doc: Value = serde_json::from_slice(&bytes).unwrap();
        let rows = doc.as_array().unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["creator_username"], "creator");
        assert_eq!(rows[0]["Status"], "ERROR");
        assert_eq!(rows[1]["Error_Message"], serde_json::json!(["DNE"]));
        // Failed post columns are absent, comment sequences are not
        assert!(rows[1].get("video_view_count").is_none());
        assert_eq!(rows[1]["comment_id"], serde_json::json!([]));
    }

    #[test]
    fn columns_orient_fills_missing_cells_with_null() {
        let bytes = render_document(&[ok_row(), dne_row()], DocumentOrient::Columns).unwrap();
        let doc: Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(doc["video_view_count"]["0"], 5);
        assert_eq!(doc["video_view_count"]["1"], Value::Null);
        assert_eq!(doc["unique_id"]["1"], "2");
        assert_eq!(doc["Status"]["0"], "ERROR");
        assert!(doc.get("creator_media_count").is_none());
    }

    #[test]
    fn local_copy_lands_under_the_object_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_local_copy(dir.path(), "ig100/200_output.json", b"[]").unwrap();

        assert_eq!(path, dir.path().join("ig100").join("200_output.json"));
        assert_eq!(fs::read(&path).unwrap(), b"[]");
    }

    struct FlakyRegistry {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RegistryPort for FlakyRegistry {
        async fn list_items(&self) -> crate::error::Result<Vec<crate::types::SourceItem>> {
            Ok(Vec::new())
        }

        fn item_url(&self, id: &str) -> String {
            id.to_string()
        }

        async fn deactivate(&self, item_url: &str) -> Result<(), SinkError> {
            self.calls.lock().unwrap().push(item_url.to_string());
            if item_url.ends_with("bad") {
                return Err(SinkError::Deactivate {
                    target: item_url.to_string(),
                    message: "HTTP 500".into(),
                });
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn deactivation_continues_past_failures() {
        let registry = FlakyRegistry {
            calls: Mutex::new(Vec::new()),
        };
        let report = deactivate_all(&registry, &["a", "b-bad", "c"]).await;

        assert_eq!(report.deactivated, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(*registry.calls.lock().unwrap(), vec!["a", "b-bad", "c"]);
    }
}
