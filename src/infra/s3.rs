use crate::app::ports::ObjectStore;
use crate::error::{Result, ScraperError, SinkError};
use crate::infra::sigv4::{self, CanonicalRequest, SigningKey};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Url};
use tracing::debug;

/// Path-style S3-compatible bucket (`{endpoint}/{bucket}/{key}`).
pub struct S3Store {
    client: Client,
    endpoint: Url,
    bucket: String,
    signing_key: SigningKey,
}

impl S3Store {
    pub fn new(client: Client, endpoint_url: &str, bucket: &str, signing_key: SigningKey) -> Result<Self> {
        let endpoint = Url::parse(endpoint_url)
            .map_err(|e| ScraperError::Config(format!("invalid ENDPOINT_URL '{endpoint_url}': {e}")))?;
        if endpoint.host_str().is_none() {
            return Err(ScraperError::Config(format!(
                "ENDPOINT_URL '{endpoint_url}' has no host"
            )));
        }
        Ok(Self {
            client,
            endpoint,
            bucket: bucket.to_string(),
            signing_key,
        })
    }

    fn host(&self) -> String {
        let host = self.endpoint.host_str().unwrap_or_default();
        match self.endpoint.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    fn object_path(&self, key: &str) -> String {
        let prefix = self.endpoint.path().trim_end_matches('/');
        sigv4::encode_path(&format!("{prefix}/{}/{key}", self.bucket))
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put_object(&self, key: &str, body: Vec<u8>, content_type: &str) -> std::result::Result<(), SinkError> {
        let host = self.host();
        let path = self.object_path(key);
        let payload_hash = sigv4::sha256_hex(&body);
        let amz_date = sigv4::amz_date(&Utc::now());

        let request = CanonicalRequest {
            method: "PUT",
            path: &path,
            query: "",
            headers: vec![
                ("host", host.clone()),
                ("x-amz-content-sha256", payload_hash.clone()),
                ("x-amz-date", amz_date.clone()),
            ],
            payload_hash: &payload_hash,
        };
        let authorization = self.signing_key.authorization(&request, &amz_date);

        let url = format!("{}://{}{}", self.endpoint.scheme(), host, path);
        debug!(%url, "Uploading object");

        let upload_error = |message: String| SinkError::Upload {
            key: key.to_string(),
            message,
        };

        let resp = self
            .client
            .put(&url)
            .header(AUTHORIZATION, authorization)
            .header("x-amz-content-sha256", payload_hash)
            .header("x-amz-date", amz_date)
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| upload_error(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(upload_error(
                crate::infra::http_client::describe_failure(resp).await,
            ));
        }
        Ok(())
    }
}
