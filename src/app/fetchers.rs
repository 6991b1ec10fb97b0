//! Source fetchers. Each wraps one session call and isolates its failure
//! to its own outcome; none of them returns an error to the caller.

use crate::app::ports::ScrapeSession;
use crate::constants::NO_USERNAME_MESSAGE;
use crate::error::FetchError;
use crate::types::{
    CommentThread, FetchOutcome, MediaId, PostDetails, PostOwner, ProfileDetails,
};
use tracing::{debug, instrument, warn};

#[instrument(skip(session))]
pub async fn fetch_post(session: &dyn ScrapeSession, media_id: MediaId) -> FetchOutcome<PostDetails> {
    let outcome = FetchOutcome::from(session.post(media_id).await);
    match &outcome {
        FetchOutcome::Success(post) => debug!(owner = %post.owner.username, "Fetched post"),
        FetchOutcome::NotFound => debug!("Post no longer exists"),
        FetchOutcome::Failure(message) => warn!(%message, "Post fetch failed"),
    }
    outcome
}

/// Profiles are only fetched for an owner surfaced by a successful post.
/// A missing profile is a plain failure, never a `DNE`.
#[instrument(skip(session, owner), fields(username = %owner.username))]
pub async fn fetch_profile(session: &dyn ScrapeSession, owner: &PostOwner) -> FetchOutcome<ProfileDetails> {
    match session.profile(&owner.username).await {
        Ok(profile) => FetchOutcome::Success(profile),
        Err(FetchError::NotFound) => {
            warn!("Profile does not exist");
            FetchOutcome::Failure(format!("Profile {} does not exist.", owner.username))
        }
        Err(FetchError::Failed(message)) => {
            warn!(%message, "Profile fetch failed");
            FetchOutcome::Failure(message)
        }
    }
}

/// Second stage of the post pipeline: runs the profile fetch when the post
/// produced an owner, otherwise fails fast without calling the session.
pub async fn fetch_profile_for_post(
    session: &dyn ScrapeSession,
    post: &FetchOutcome<PostDetails>,
) -> FetchOutcome<ProfileDetails> {
    match post.success() {
        Some(details) => fetch_profile(session, &details.owner).await,
        None => FetchOutcome::Failure(NO_USERNAME_MESSAGE.to_string()),
    }
}

#[instrument(skip(session))]
pub async fn fetch_comments(session: &dyn ScrapeSession, media_id: MediaId) -> FetchOutcome<CommentThread> {
    match session.comments(media_id).await {
        Ok(comments) => {
            let thread: CommentThread = comments.into_iter().collect();
            debug!(count = thread.len(), "Fetched comments");
            FetchOutcome::Success(thread)
        }
        Err(e) => {
            if let FetchError::Failed(message) = &e {
                warn!(%message, "Comment fetch failed");
            }
            FetchOutcome::from(Err::<CommentThread, _>(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Comment, PostDetails, PostOwner};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubSession {
        post: Result<PostDetails, FetchError>,
        profile: Result<ProfileDetails, FetchError>,
        comments: Result<Vec<Comment>, FetchError>,
        profile_calls: AtomicUsize,
    }

    impl StubSession {
        fn new() -> Self {
            Self {
                post: Ok(sample_post()),
                profile: Ok(sample_profile()),
                comments: Ok(Vec::new()),
                profile_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ScrapeSession for StubSession {
        async fn post(&self, _media_id: MediaId) -> Result<PostDetails, FetchError> {
            self.post.clone()
        }

        async fn profile(&self, _username: &str) -> Result<ProfileDetails, FetchError> {
            self.profile_calls.fetch_add(1, Ordering::SeqCst);
            self.profile.clone()
        }

        async fn comments(&self, _media_id: MediaId) -> Result<Vec<Comment>, FetchError> {
            self.comments.clone()
        }

        async fn close(&self) {}
    }

    fn sample_post() -> PostDetails {
        PostDetails {
            view_count: Some(10),
            like_count: Some(2),
            comment_count: Some(1),
            caption: Some("hello #world".into()),
            hashtags: vec!["world".into()],
            mentions: vec![],
            duration: Some(12.5),
            owner: PostOwner {
                username: "creator".into(),
                id: "42".into(),
            },
            date_utc: "2024/01/01".into(),
            date_local: "2024/01/01".into(),
            typename: "GraphVideo".into(),
            location: None,
        }
    }

    fn sample_profile() -> ProfileDetails {
        ProfileDetails {
            media_count: 5,
            follower_count: 100,
            followee_count: 7,
            external_url: None,
            biography: "bio".into(),
        }
    }

    #[tokio::test]
    async fn post_not_found_is_dne() {
        let mut session = StubSession::new();
        session.post = Err(FetchError::NotFound);

        let outcome = fetch_post(&session, MediaId(1)).await;
        assert!(outcome.is_not_found());
        assert_eq!(outcome.error_tag("PostEM: "), "DNE");
    }

    #[tokio::test]
    async fn profile_is_skipped_without_an_owner() {
        let session = StubSession::new();
        let post: FetchOutcome<PostDetails> = FetchOutcome::Failure("HTTP 500".into());

        let profile = fetch_profile_for_post(&session, &post).await;
        assert_eq!(profile.error_tag("ProfileEM: "), "ProfileEM: no username");
        assert_eq!(session.profile_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_profile_is_not_dne() {
        let mut session = StubSession::new();
        session.profile = Err(FetchError::NotFound);
        let post = FetchOutcome::Success(sample_post());

        let profile = fetch_profile_for_post(&session, &post).await;
        assert_eq!(
            profile.error_tag("ProfileEM: "),
            "ProfileEM: Profile creator does not exist."
        );
        assert_eq!(session.profile_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn comments_are_co_indexed_in_arrival_order() {
        let mut session = StubSession::new();
        session.comments = Ok(vec![
            Comment {
                id: "1".into(),
                owner_username: "a".into(),
                text: "first".into(),
                created_at: "2024-01-01 10:00:00".into(),
            },
            Comment {
                id: "2".into(),
                owner_username: "b".into(),
                text: "second".into(),
                created_at: "2024-01-01 11:00:00".into(),
            },
        ]);

        let outcome = fetch_comments(&session, MediaId(9)).await;
        let thread = outcome.success().unwrap();
        assert_eq!(thread.ids, vec!["1", "2"]);
        assert_eq!(thread.texts, vec!["first", "second"]);
        assert_eq!(outcome.error_tag("CommentEM: "), "");
    }

    #[tokio::test]
    async fn comment_failure_keeps_message() {
        let mut session = StubSession::new();
        session.comments = Err(FetchError::Failed("login required".into()));

        let outcome = fetch_comments(&session, MediaId(9)).await;
        assert_eq!(outcome.error_tag("CommentEM: "), "CommentEM: login required");
    }
}
