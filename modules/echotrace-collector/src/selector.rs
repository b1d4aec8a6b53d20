//! Candidate ordering and query-shape selection for the submit batch.
//!
//! Eligibility checks that need the stores (existing payload, active job)
//! live in the submit loop itself; the pure parts are here.

use echotrace_common::{Platform, Post};
use listening_client::QueryInput;

/// How many awaiting posts to pull before ordering and capping. Priority
/// ordering has to happen over a window wider than the batch cap, or the
/// priority platform could be cut off by the store's creation-time order.
pub(crate) const SELECTION_WINDOW: i64 = 1000;

/// Order candidates: the priority platform's bucket is drained first, then
/// everything else, creation time ascending within each bucket.
pub fn order_candidates(posts: Vec<Post>, priority: Platform) -> Vec<Post> {
    let (mut first, rest): (Vec<Post>, Vec<Post>) =
        posts.into_iter().partition(|p| p.platform == priority);
    first.extend(rest);
    first
}

/// Build the query shape for a post. Mutually exclusive cascade:
/// platform-native content id, then account handle, then keyword terms.
/// A post carrying none of the three cannot be queried.
pub fn query_input_for(post: &Post) -> Option<QueryInput> {
    if let Some(content_id) = &post.content_id {
        return Some(QueryInput::ContentId {
            content_id: content_id.clone(),
        });
    }
    if let Some(handle) = &post.author_handle {
        return Some(QueryInput::Account {
            handle: handle.clone(),
        });
    }
    post.keyword_query.as_ref().map(|terms| QueryInput::Keyword {
        terms: terms.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use echotrace_common::PostStatus;
    use uuid::Uuid;

    fn post(platform: Platform, age_minutes: i64) -> Post {
        let created = Utc::now() - Duration::minutes(age_minutes);
        Post {
            id: Uuid::new_v4(),
            platform,
            country: "de".into(),
            campaign: "spring".into(),
            content_id: None,
            author_handle: None,
            keyword_query: None,
            target_override: None,
            observed_reply_count: None,
            status: PostStatus::Awaiting,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn priority_platform_drained_first() {
        // Input already creation-time ascending, mixed platforms.
        let posts = vec![
            post(Platform::Instagram, 50),
            post(Platform::TikTok, 40),
            post(Platform::Instagram, 30),
            post(Platform::TikTok, 20),
        ];
        let ordered = order_candidates(posts, Platform::TikTok);

        assert_eq!(ordered[0].platform, Platform::TikTok);
        assert_eq!(ordered[1].platform, Platform::TikTok);
        assert!(ordered[0].created_at < ordered[1].created_at);
        assert_eq!(ordered[2].platform, Platform::Instagram);
        assert!(ordered[2].created_at < ordered[3].created_at);
    }

    #[test]
    fn query_shape_cascade() {
        let mut p = post(Platform::X, 0);
        p.content_id = Some("c1".into());
        p.author_handle = Some("alice".into());
        p.keyword_query = Some("brand name".into());
        assert!(matches!(
            query_input_for(&p),
            Some(QueryInput::ContentId { .. })
        ));

        p.content_id = None;
        assert!(matches!(
            query_input_for(&p),
            Some(QueryInput::Account { .. })
        ));

        p.author_handle = None;
        assert!(matches!(
            query_input_for(&p),
            Some(QueryInput::Keyword { .. })
        ));

        p.keyword_query = None;
        assert!(query_input_for(&p).is_none());
    }
}
