use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    domain::{EngagementState, PostRecord},
    error::EngageError,
    page::PostAccessor,
};

use super::traversal::Candidate;

const UNKNOWN_AUTHOR: &str = "Unknown";

static SPONSOR_BADGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(promoted|sponsored)(\s*[·•|-]?\s*by\s+.+)?\s*$")
        .expect("valid sponsor badge regex")
});
static SELF_COMMENT_INDICATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\byou (commented|replied)\b").expect("valid self comment regex")
});
static SELF_LIKE_INDICATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\byou (liked|reacted to)\b").expect("valid self like regex")
});

#[derive(Debug, Clone)]
pub struct EngagementRead {
    pub state: EngagementState,
    pub ambiguity: Option<EngageError>,
}

#[derive(Debug, Clone)]
pub struct Classified {
    pub record: PostRecord,
    pub ambiguity: Option<EngageError>,
}

/// Everything read here is advisory: ambiguous reads resolve to "not an ad" and "not
/// engaged", and the scheduler re-reads engagement right before any write.
pub struct PostClassifier {
    identity: Option<String>,
}

impl PostClassifier {
    pub fn new(identity: Option<String>) -> Self {
        Self {
            identity: identity
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
        }
    }

    pub async fn classify(&self, candidate: &Candidate) -> Result<Classified, EngageError> {
        let content = candidate
            .content
            .clone()
            .ok_or(EngageError::ExtractionFailure)?;
        let post = candidate.handle.as_ref();
        let (author, is_advertisement, read) = futures::join!(
            post.author(),
            self.is_advertisement(post),
            self.engagement_status(post)
        );
        let author = author
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());

        Ok(Classified {
            record: PostRecord {
                id: candidate.id.clone(),
                content,
                author,
                is_advertisement,
                engagement: read.state,
            },
            ambiguity: read.ambiguity,
        })
    }

    /// Only structural markers count; the post text is never consulted.
    pub async fn is_advertisement(&self, post: &dyn PostAccessor) -> bool {
        let markers = post.ad_markers().await;
        markers.promoted_attribute
            || markers
                .badge_text
                .as_deref()
                .is_some_and(|badge| SPONSOR_BADGE.is_match(badge))
    }

    pub async fn engagement_status(&self, post: &dyn PostAccessor) -> EngagementRead {
        let indicators = post.activity_indicators().await;
        let mut ambiguity = None;

        let liked_by_control = match post.like_control().await {
            Some(control) => control.is_active().await,
            None => {
                ambiguity = Some(EngageError::ClassificationAmbiguous(
                    "like control not found; assuming not liked".into(),
                ));
                false
            }
        };
        let liked = liked_by_control
            || indicators
                .iter()
                .any(|line| SELF_LIKE_INDICATOR.is_match(line));

        let mut commented = indicators
            .iter()
            .any(|line| SELF_COMMENT_INDICATOR.is_match(line));
        if !commented {
            if let Some(identity) = &self.identity {
                commented = post
                    .comments()
                    .await
                    .iter()
                    .any(|entry| entry.author.trim().eq_ignore_ascii_case(identity));
            }
        }

        EngagementRead {
            state: EngagementState { liked, commented },
            ambiguity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{FeedFixture, FeedPage, PostFixture, PostHandle, SimulatedFeed};

    async fn single(fixture: PostFixture, identity: Option<&str>) -> (SimulatedFeed, PostHandle) {
        let mut feed = FeedFixture::with_posts(vec![fixture]);
        feed.identity = identity.map(str::to_string);
        let feed = SimulatedFeed::new(feed);
        let post = feed.find_candidate_posts().await.unwrap().remove(0);
        (feed, post)
    }

    #[tokio::test]
    async fn structural_markers_flag_ads() {
        let classifier = PostClassifier::new(None);
        let (_f, post) = single(PostFixture::new("Try our product").promoted(), None).await;
        assert!(classifier.is_advertisement(post.as_ref()).await);

        let (_f, post) = single(PostFixture::new("Try it").badge("Promoted by Acme"), None).await;
        assert!(classifier.is_advertisement(post.as_ref()).await);

        let (_f, post) = single(PostFixture::new("Try it").badge(" Sponsored "), None).await;
        assert!(classifier.is_advertisement(post.as_ref()).await);
    }

    #[tokio::test]
    async fn discussing_sponsored_content_is_not_an_ad() {
        let classifier = PostClassifier::new(None);
        let text = "Hot take: sponsored posts and promoted content are ruining feeds.";
        let (_f, post) = single(PostFixture::new(text), None).await;
        assert!(!classifier.is_advertisement(post.as_ref()).await);

        let (_f, post) = single(PostFixture::new(text).badge("3rd+ · Follow"), None).await;
        assert!(!classifier.is_advertisement(post.as_ref()).await);
    }

    #[tokio::test]
    async fn reads_pressed_like_and_comment_indicators() {
        let classifier = PostClassifier::new(None);
        let fixture = PostFixture::new("hello")
            .already_liked()
            .activity("You commented on this");
        let (_f, post) = single(fixture, None).await;
        let read = classifier.engagement_status(post.as_ref()).await;
        assert!(read.state.liked && read.state.commented);
        assert!(read.ambiguity.is_none());
    }

    #[tokio::test]
    async fn self_authored_comment_counts_as_commented() {
        let classifier = PostClassifier::new(Some("Jane Doe".into()));
        let fixture = PostFixture::new("hello").comment_from("jane doe", "Nice one");
        let (_f, post) = single(fixture, Some("Jane Doe")).await;
        assert!(classifier.engagement_status(post.as_ref()).await.state.commented);

        let other = PostClassifier::new(Some("John Roe".into()));
        assert!(!other.engagement_status(post.as_ref()).await.state.commented);
    }

    #[tokio::test]
    async fn missing_like_control_is_ambiguous_and_conservative() {
        let classifier = PostClassifier::new(None);
        let mut fixture = PostFixture::new("hello");
        fixture.like_control = false;
        let (_f, post) = single(fixture, None).await;
        let read = classifier.engagement_status(post.as_ref()).await;
        assert!(!read.state.liked);
        assert!(matches!(
            read.ambiguity,
            Some(EngageError::ClassificationAmbiguous(_))
        ));
    }

    #[tokio::test]
    async fn classify_defaults_author_and_requires_content() {
        let classifier = PostClassifier::new(None);
        let (_f, post) = single(PostFixture::new("Body text"), None).await;
        let candidate = Candidate {
            id: crate::domain::generate_post_id(None, "Body text", 0),
            content: Some("Body text".into()),
            handle: post.clone(),
        };
        let classified = classifier.classify(&candidate).await.unwrap();
        assert_eq!(classified.record.author, "Unknown");
        assert!(!classified.record.is_advertisement);

        let empty = Candidate {
            content: None,
            ..candidate
        };
        assert!(matches!(
            classifier.classify(&empty).await,
            Err(EngageError::ExtractionFailure)
        ));
    }
}
