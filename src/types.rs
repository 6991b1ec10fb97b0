use crate::constants::DNE_TAG;
use crate::error::FetchError;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// One registry entry. Read once per run and never mutated locally.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceItem {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    /// Missing or null URLs are kept; the row fails at derivation.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub active: bool,
}

impl SourceItem {
    pub fn url_or_empty(&self) -> &str {
        self.url.as_deref().unwrap_or_default()
    }
}

fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}

/// Numeric media identifier decoded from a short code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaId(pub u64);

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of a single source fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
    Success(T),
    NotFound,
    Failure(String),
}

impl<T> FetchOutcome<T> {
    pub fn success(&self) -> Option<&T> {
        match self {
            FetchOutcome::Success(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_success(self) -> Option<T> {
        match self {
            FetchOutcome::Success(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchOutcome::NotFound)
    }

    /// Legacy error tag: empty on success, `DNE` when gone, otherwise the
    /// prefixed failure message.
    pub fn error_tag(&self, prefix: &str) -> String {
        match self {
            FetchOutcome::Success(_) => String::new(),
            FetchOutcome::NotFound => DNE_TAG.to_string(),
            FetchOutcome::Failure(message) => format!("{prefix}{message}"),
        }
    }
}

impl<T> From<Result<T, FetchError>> for FetchOutcome<T> {
    fn from(result: Result<T, FetchError>) -> Self {
        match result {
            Ok(value) => FetchOutcome::Success(value),
            Err(FetchError::NotFound) => FetchOutcome::NotFound,
            Err(FetchError::Failed(message)) => FetchOutcome::Failure(message),
        }
    }
}

/// Post owner as surfaced by a successful post fetch. The username is
/// mandatory, so holding one is what allows the profile stage to run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostOwner {
    #[serde(rename = "creator_username")]
    pub username: String,
    #[serde(rename = "creator_id")]
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostLocation {
    pub id: String,
    pub name: String,
    pub slug: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

/// Engagement and content fields of a post.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostDetails {
    #[serde(rename = "video_view_count")]
    pub view_count: Option<u64>,
    #[serde(rename = "video_like_count")]
    pub like_count: Option<u64>,
    #[serde(rename = "video_comment_count")]
    pub comment_count: Option<u64>,
    #[serde(rename = "video_caption")]
    pub caption: Option<String>,
    #[serde(rename = "video_hashtag")]
    pub hashtags: Vec<String>,
    #[serde(rename = "video_mention")]
    pub mentions: Vec<String>,
    #[serde(rename = "video_duration")]
    pub duration: Option<f64>,
    #[serde(flatten)]
    pub owner: PostOwner,
    #[serde(rename = "video_create_date_utc")]
    pub date_utc: String,
    #[serde(rename = "video_create_date_local")]
    pub date_local: String,
    #[serde(rename = "video_typename")]
    pub typename: String,
    #[serde(rename = "video_location")]
    pub location: Option<PostLocation>,
}

/// Creator aggregate fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileDetails {
    #[serde(rename = "creator_media_count")]
    pub media_count: u64,
    #[serde(rename = "creator_follwer_count")]
    pub follower_count: u64,
    #[serde(rename = "creator_follwee_count")]
    pub followee_count: u64,
    #[serde(rename = "link_in_bio")]
    pub external_url: Option<String>,
    #[serde(rename = "creator_biography")]
    pub biography: String,
}

/// One comment as returned by the scraping session.
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub id: String,
    pub owner_username: String,
    pub text: String,
    pub created_at: String,
}

/// Comments as co-indexed sequences, one slot per comment in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CommentThread {
    #[serde(rename = "comment_id")]
    pub ids: Vec<String>,
    #[serde(rename = "comment_owner_username")]
    pub owner_usernames: Vec<String>,
    #[serde(rename = "comment_text")]
    pub texts: Vec<String>,
    #[serde(rename = "comment_create_date")]
    pub created_dates: Vec<String>,
}

impl CommentThread {
    pub fn push(&mut self, comment: Comment) {
        self.ids.push(comment.id);
        self.owner_usernames.push(comment.owner_username);
        self.texts.push(comment.text);
        self.created_dates.push(comment.created_at);
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl FromIterator<Comment> for CommentThread {
    fn from_iter<I: IntoIterator<Item = Comment>>(iter: I) -> Self {
        let mut thread = CommentThread::default();
        for comment in iter {
            thread.push(comment);
        }
        thread
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RowStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "ERROR")]
    Error,
}

/// Merged record for one registry item, in the persisted column layout.
/// Post and profile columns are absent when their fetch failed; the
/// comment sequences are always present.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    #[serde(flatten)]
    pub post: Option<PostDetails>,
    #[serde(rename = "post_EM")]
    pub post_error: String,
    #[serde(flatten)]
    pub profile: Option<ProfileDetails>,
    #[serde(rename = "profile_EM")]
    pub profile_error: String,
    #[serde(flatten)]
    pub comments: CommentThread,
    #[serde(rename = "comment_EM")]
    pub comment_error: String,
    pub media_id: Option<MediaId>,
    pub short_code: Option<String>,
    pub url: Option<String>,
    pub unique_id: String,
    pub local_url: String,
    pub scraper_running_timestamp: String,
    #[serde(rename = "Error_Message")]
    pub error_message: BTreeSet<String>,
    #[serde(rename = "Status")]
    pub status: RowStatus,
}

/// Rows in registry order, one per active item.
pub type ResultBatch = Vec<ResultRow>;
