//! Joins the three source outcomes into one row and classifies it.

use crate::constants::{
    COMMENT_ERROR_PREFIX, DNE_TAG, ERROR_FRAGMENT_SEPARATOR, POST_ERROR_PREFIX,
    PROFILE_ERROR_PREFIX,
};
use crate::identifier::DerivedIds;
use crate::types::{
    CommentThread, FetchOutcome, PostDetails, ProfileDetails, ResultRow, RowStatus, SourceItem,
};
use std::collections::BTreeSet;

/// Everything fetched for one item.
#[derive(Debug, Clone)]
pub struct SourceOutcomes {
    pub post: FetchOutcome<PostDetails>,
    pub profile: FetchOutcome<ProfileDetails>,
    pub comments: FetchOutcome<CommentThread>,
}

impl SourceOutcomes {
    pub fn post_tag(&self) -> String {
        self.post.error_tag(POST_ERROR_PREFIX)
    }

    pub fn profile_tag(&self) -> String {
        self.profile.error_tag(PROFILE_ERROR_PREFIX)
    }

    pub fn comment_tag(&self) -> String {
        self.comments.error_tag(COMMENT_ERROR_PREFIX)
    }
}

/// Set of error fragments for a row. A gone post collapses to `{"DNE"}`;
/// otherwise the three tags are split on `&` and deduplicated, so a fully
/// successful row yields `{""}`.
pub fn derive_error_set(outcomes: &SourceOutcomes) -> BTreeSet<String> {
    if outcomes.post.is_not_found() {
        return BTreeSet::from([DNE_TAG.to_string()]);
    }

    [outcomes.post_tag(), outcomes.profile_tag(), outcomes.comment_tag()]
        .iter()
        .flat_map(|tag| tag.split(ERROR_FRAGMENT_SEPARATOR))
        .map(str::to_string)
        .collect()
}

/// `OK` only for exactly `{""}`; `{"DNE"}` is an error like any other.
pub fn derive_status(error_set: &BTreeSet<String>) -> RowStatus {
    if error_set.len() == 1 && error_set.contains("") {
        RowStatus::Ok
    } else {
        RowStatus::Error
    }
}

pub fn merge_row(
    item: &SourceItem,
    ids: DerivedIds,
    outcomes: SourceOutcomes,
    local_url: String,
    run_timestamp: &str,
) -> ResultRow {
    let error_message = derive_error_set(&outcomes);
    let status = derive_status(&error_message);
    let (post_error, profile_error, comment_error) =
        (outcomes.post_tag(), outcomes.profile_tag(), outcomes.comment_tag());

    ResultRow {
        post: outcomes.post.into_success(),
        post_error,
        profile: outcomes.profile.into_success(),
        profile_error,
        comments: outcomes.comments.into_success().unwrap_or_default(),
        comment_error,
        media_id: ids.media_id.ok(),
        short_code: ids.short_code,
        url: item.url.clone(),
        unique_id: item.id.clone(),
        local_url,
        scraper_running_timestamp: run_timestamp.to_string(),
        error_message,
        status,
    }
}

/// Rows whose error set is exactly `{"DNE"}`. A `DNE` mixed with other
/// fragments is not selected.
pub fn select_deactivation_candidates(batch: &[ResultRow]) -> Vec<&str> {
    batch
        .iter()
        .filter(|row| row.error_message.len() == 1 && row.error_message.contains(DNE_TAG))
        .map(|row| row.local_url.as_str())
        .collect()
}
