//! Authenticated Instagram session over the web and private JSON APIs.

use crate::app::ports::ScrapeSession;
use crate::config::ScraperTuning;
use crate::constants::{COMMENT_DATE_FORMAT, DATE_FORMAT};
use crate::error::{FetchError, Result, ScraperError};
use crate::infra::http_client::{build_session_client, describe_failure};
use crate::types::{Comment, MediaId, PostDetails, PostLocation, PostOwner, ProfileDetails};
use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderMap, REFERER, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

const IG_APP_ID: &str = "936619743392459";
const CSRF_COOKIE: &str = "csrftoken";
const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(30);
const MAX_BACKOFF: Duration = Duration::from_secs(600);

static HASHTAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#(\w+)").expect("hashtag pattern is valid"));
static MENTION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@(\w(?:[\w.]{0,28}\w)?)").expect("mention pattern is valid"));

#[derive(Debug, Clone)]
pub struct InstagramEndpoints {
    /// Browser site, used for login.
    pub web_base: String,
    /// Private API host, used for data calls.
    pub api_base: String,
}

impl Default for InstagramEndpoints {
    fn default() -> Self {
        Self {
            web_base: "https://www.instagram.com".to_string(),
            api_base: "https://i.instagram.com".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub request_delay: Duration,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl From<&ScraperTuning> for SessionSettings {
    fn from(tuning: &ScraperTuning) -> Self {
        Self {
            request_delay: Duration::from_millis(tuning.request_delay_ms),
            timeout: Duration::from_secs(tuning.timeout_seconds),
            max_retries: tuning.max_retries,
        }
    }
}

pub struct InstagramSession {
    client: Client,
    endpoints: InstagramEndpoints,
    settings: SessionSettings,
    csrf_token: String,
    // Held for the duration of every call so the session is never used
    // by two flows at once; also paces consecutive calls.
    last_call: Mutex<Option<Instant>>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    authenticated: Option<bool>,
    two_factor_required: Option<bool>,
    checkpoint_url: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MediaInfoResponse {
    #[serde(default)]
    items: Vec<MediaItem>,
}

#[derive(Debug, Deserialize)]
struct MediaItem {
    taken_at: i64,
    #[serde(default)]
    media_type: u8,
    play_count: Option<u64>,
    view_count: Option<u64>,
    like_count: Option<u64>,
    comment_count: Option<u64>,
    video_duration: Option<f64>,
    caption: Option<MediaCaption>,
    user: MediaUser,
    location: Option<MediaLocation>,
}

#[derive(Debug, Deserialize)]
struct MediaCaption {
    text: String,
}

#[derive(Debug, Deserialize)]
struct MediaUser {
    #[serde(default)]
    pk: Value,
    username: String,
}

#[derive(Debug, Deserialize)]
struct MediaLocation {
    #[serde(default)]
    pk: Value,
    name: String,
    short_name: Option<String>,
    lat: Option<f64>,
    lng: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ProfileInfoResponse {
    data: ProfileData,
}

#[derive(Debug, Deserialize)]
struct ProfileData {
    user: Option<ProfileUser>,
}

#[derive(Debug, Deserialize)]
struct ProfileUser {
    #[serde(default)]
    biography: String,
    external_url: Option<String>,
    edge_followed_by: EdgeCount,
    edge_follow: EdgeCount,
    edge_owner_to_timeline_media: EdgeCount,
}

#[derive(Debug, Deserialize)]
struct EdgeCount {
    count: u64,
}

#[derive(Debug, Deserialize)]
struct CommentsPage {
    #[serde(default)]
    comments: Vec<RawComment>,
    next_min_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawComment {
    #[serde(default)]
    pk: Value,
    text: String,
    created_at: i64,
    user: CommentUser,
}

#[derive(Debug, Deserialize)]
struct CommentUser {
    username: String,
}

fn id_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn csrf_from(resp: &Response) -> Option<String> {
    resp.cookies()
        .find(|cookie| cookie.name() == CSRF_COOKIE)
        .map(|cookie| cookie.value().to_string())
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Wait before retry `attempt` (0-based): the server's `Retry-After` if
/// given, else exponential backoff. Always capped at `MAX_BACKOFF`.
fn backoff_wait(attempt: u32, retry_after: Option<Duration>) -> Duration {
    retry_after
        .unwrap_or_else(|| {
            let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
            RATE_LIMIT_BACKOFF.saturating_mul(factor)
        })
        .min(MAX_BACKOFF)
}

/// Lower-cased hashtags in caption order. `&#..;` entities are skipped.
pub fn caption_hashtags(caption: &str) -> Vec<String> {
    HASHTAG_PATTERN
        .captures_iter(caption)
        .filter(|caps| {
            let start = caps.get(0).map(|m| m.start()).unwrap_or(0);
            !caption[..start].ends_with('&')
        })
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// Lower-cased `@mentions` in caption order; e-mail style `a@b` is skipped.
pub fn caption_mentions(caption: &str) -> Vec<String> {
    MENTION_PATTERN
        .captures_iter(caption)
        .filter(|caps| {
            let start = caps.get(0).map(|m| m.start()).unwrap_or(0);
            !caption[..start]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric())
        })
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

fn typename(media_type: u8) -> String {
    match media_type {
        1 => "GraphImage".to_string(),
        2 => "GraphVideo".to_string(),
        8 => "GraphSidecar".to_string(),
        other => format!("Unknown({other})"),
    }
}

fn utc_from_unix(seconds: i64) -> std::result::Result<DateTime<Utc>, FetchError> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| FetchError::Failed(format!("invalid timestamp {seconds}")))
}

impl MediaItem {
    fn into_details(self) -> std::result::Result<PostDetails, FetchError> {
        let taken_at = utc_from_unix(self.taken_at)?;
        let is_video = self.media_type == 2;
        let caption = self.caption.map(|c| c.text);
        let (hashtags, mentions) = caption
            .as_deref()
            .map(|text| (caption_hashtags(text), caption_mentions(text)))
            .unwrap_or_default();

        Ok(PostDetails {
            view_count: if is_video { self.play_count.or(self.view_count) } else { None },
            like_count: self.like_count,
            comment_count: self.comment_count,
            caption,
            hashtags,
            mentions,
            duration: if is_video { self.video_duration } else { None },
            owner: PostOwner {
                username: self.user.username,
                id: id_string(&self.user.pk),
            },
            date_utc: taken_at.format(DATE_FORMAT).to_string(),
            date_local: taken_at.with_timezone(&Local).format(DATE_FORMAT).to_string(),
            typename: typename(self.media_type),
            location: self.location.map(|loc| PostLocation {
                id: id_string(&loc.pk),
                name: loc.name,
                slug: loc.short_name,
                lat: loc.lat,
                lng: loc.lng,
            }),
        })
    }
}

impl InstagramSession {
    /// Opens the session: picks up a CSRF token from the web root, then
    /// submits the browser login form.
    #[instrument(skip(password, user_agent, settings, endpoints))]
    pub async fn login(
        username: &str,
        password: &str,
        user_agent: &str,
        settings: SessionSettings,
        endpoints: InstagramEndpoints,
    ) -> Result<Self> {
        let client = build_session_client(user_agent, settings.timeout)?;
        let web_root = format!("{}/", endpoints.web_base.trim_end_matches('/'));

        let resp = client.get(&web_root).send().await?;
        let csrf_token = csrf_from(&resp)
            .ok_or_else(|| ScraperError::Login("no csrftoken cookie on the login page".into()))?;

        let enc_password = format!(
            "#PWD_INSTAGRAM_BROWSER:0:{}:{}",
            Utc::now().timestamp(),
            password
        );
        let login_url = format!("{}api/v1/web/accounts/login/ajax/", web_root);
        let resp = client
            .post(&login_url)
            .header("X-CSRFToken", &csrf_token)
            .header("X-IG-App-ID", IG_APP_ID)
            .header("X-Requested-With", "XMLHttpRequest")
            .header(REFERER, &web_root)
            .form(&[
                ("username", username),
                ("enc_password", enc_password.as_str()),
                ("queryParams", "{}"),
                ("optIntoOneTap", "false"),
            ])
            .send()
            .await?;

        let csrf_token = csrf_from(&resp).unwrap_or(csrf_token);
        let status = resp.status();
        let body: LoginResponse = resp.json().await.map_err(|e| {
            ScraperError::Login(format!("unexpected login response (HTTP {}): {e}", status.as_u16()))
        })?;

        if body.two_factor_required.unwrap_or(false) {
            return Err(ScraperError::Login("two-factor authentication required".into()));
        }
        if let Some(checkpoint) = body.checkpoint_url {
            return Err(ScraperError::Login(format!("checkpoint required: {checkpoint}")));
        }
        if body.authenticated != Some(true) {
            return Err(ScraperError::Login(body.message.unwrap_or_else(|| {
                format!("Wrong password or user {username} does not exist")
            })));
        }

        info!("Logged in");
        Ok(Self {
            client,
            endpoints,
            settings,
            csrf_token,
            last_call: Mutex::new(None),
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.endpoints.api_base.trim_end_matches('/'), path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> std::result::Result<T, FetchError> {
        let mut last_call = self.last_call.lock().await;
        let mut attempt: u32 = 0;

        loop {
            if let Some(previous) = *last_call {
                let elapsed = previous.elapsed();
                if elapsed < self.settings.request_delay {
                    tokio::time::sleep(self.settings.request_delay - elapsed).await;
                }
            }
            *last_call = Some(Instant::now());

            let resp = self
                .client
                .get(url)
                .query(query)
                .header("X-IG-App-ID", IG_APP_ID)
                .header("X-CSRFToken", &self.csrf_token)
                .send()
                .await
                .map_err(|e| FetchError::Failed(e.to_string()))?;

            let status = resp.status();
            if status == StatusCode::TOO_MANY_REQUESTS && attempt < self.settings.max_retries {
                let wait = backoff_wait(attempt, retry_after(resp.headers()));
                warn!(attempt, wait_secs = wait.as_secs(), "Rate limited, backing off");
                tokio::time::sleep(wait).await;
                attempt += 1;
                continue;
            }
            if status == StatusCode::NOT_FOUND {
                return Err(FetchError::NotFound);
            }
            if !status.is_success() {
                let message = describe_failure(resp).await;
                if message.contains("Media not found") {
                    return Err(FetchError::NotFound);
                }
                return Err(FetchError::Failed(message));
            }

            return resp
                .json::<T>()
                .await
                .map_err(|e| FetchError::Failed(format!("unexpected response from {url}: {e}")));
        }
    }
}

#[async_trait]
impl ScrapeSession for InstagramSession {
    async fn post(&self, media_id: MediaId) -> std::result::Result<PostDetails, FetchError> {
        let url = self.api_url(&format!("/api/v1/media/{media_id}/info/"));
        let info: MediaInfoResponse = self.get_json(&url, &[]).await?;
        let item = info.items.into_iter().next().ok_or(FetchError::NotFound)?;
        item.into_details()
    }

    async fn profile(&self, username: &str) -> std::result::Result<ProfileDetails, FetchError> {
        let url = self.api_url("/api/v1/users/web_profile_info/");
        let info: ProfileInfoResponse = self
            .get_json(&url, &[("username", username.to_string())])
            .await?;
        let user = info.data.user.ok_or(FetchError::NotFound)?;
        Ok(ProfileDetails {
            media_count: user.edge_owner_to_timeline_media.count,
            follower_count: user.edge_followed_by.count,
            followee_count: user.edge_follow.count,
            external_url: user.external_url.filter(|u| !u.is_empty()),
            biography: user.biography,
        })
    }

    async fn comments(&self, media_id: MediaId) -> std::result::Result<Vec<Comment>, FetchError> {
        let url = self.api_url(&format!("/api/v1/media/{media_id}/comments/"));
        let mut comments = Vec::new();
        let mut min_id: Option<String> = None;

        loop {
            let mut query = vec![
                ("can_support_threading", "true".to_string()),
                ("permalink_enabled", "false".to_string()),
            ];
            if let Some(cursor) = &min_id {
                query.push(("min_id", cursor.clone()));
            }

            let page: CommentsPage = self.get_json(&url, &query).await?;
            for raw in page.comments {
                let created_at = utc_from_unix(raw.created_at)?;
                comments.push(Comment {
                    id: id_string(&raw.pk),
                    owner_username: raw.user.username,
                    text: raw.text,
                    created_at: created_at.format(COMMENT_DATE_FORMAT).to_string(),
                });
            }

            match page.next_min_id {
                Some(next) if min_id.as_deref() != Some(next.as_str()) => min_id = Some(next),
                _ => break,
            }
        }
        debug!(count = comments.len(), "Collected comments");
        Ok(comments)
    }

    /// Logs out. Failures are only logged.
    async fn close(&self) {
        let url = format!(
            "{}/api/v1/web/accounts/logout/ajax/",
            self.endpoints.web_base.trim_end_matches('/')
        );
        let result = self
            .client
            .post(&url)
            .header("X-CSRFToken", &self.csrf_token)
            .header("X-IG-App-ID", IG_APP_ID)
            .send()
            .await;
        match result {
            Ok(resp) if resp.status().is_success() => info!("Logged out"),
            Ok(resp) => debug!(status = resp.status().as_u16(), "Logout was not acknowledged"),
            Err(e) => debug!("Logout failed: {}", e),
        }
    }
}
