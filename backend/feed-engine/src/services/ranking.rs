//! Time-decayed engagement ranking.
//!
//! `score = (likes*3 + comments*5 + bookmarks*4) / (age_hours + 1)`, forced
//! to zero once the post is older than the 14-day horizon. The score is
//! monotone in the counters for a fixed age, so descending-order reads of a
//! ranked index need no re-ranking at read time.
//!
//! Interaction mutations recompute the score for every hashtag of the post
//! and ship the updated index entries inside the same atomic write batch as
//! the counter change.

use crate::models::Post;
use crate::services::hashtags::extract_hashtags;
use crate::store::WriteOp;
use crate::{keys, models::Role};

pub const LIKE_WEIGHT: f64 = 3.0;
pub const COMMENT_WEIGHT: f64 = 5.0;
pub const BOOKMARK_WEIGHT: f64 = 4.0;

/// Posts older than this no longer rank (1,209,600,000 ms = 14 days).
pub const RANKING_HORIZON_MS: i64 = 14 * 24 * 60 * 60 * 1000;

const HOUR_MS: f64 = 3_600_000.0;

/// Weighted, time-decayed engagement score.
pub fn engagement_score(
    likes: u64,
    comments: u64,
    bookmarks: u64,
    created_at_ms: i64,
    now_ms: i64,
) -> f64 {
    let age_ms = (now_ms - created_at_ms).max(0);
    if now_ms - created_at_ms > RANKING_HORIZON_MS {
        return 0.0;
    }
    let weighted = likes as f64 * LIKE_WEIGHT
        + comments as f64 * COMMENT_WEIGHT
        + bookmarks as f64 * BOOKMARK_WEIGHT;
    let age_hours = age_ms as f64 / HOUR_MS;
    weighted / (age_hours + 1.0)
}

/// Index updates re-ranking `post` under every hashtag it carries, given the
/// post-mutation counter values. Meant to be appended to the mutation's own
/// write batch so counters and ranked scores move together.
pub fn rerank_ops(
    post: &Post,
    likes: u64,
    comments: u64,
    bookmarks: u64,
    now_ms: i64,
) -> Vec<WriteOp> {
    let score = engagement_score(likes, comments, bookmarks, post.created_at, now_ms);
    extract_hashtags(&post.content)
        .into_iter()
        .map(|tag| WriteOp::SortedAdd {
            key: keys::hashtag_ranked(&tag),
            member: post.id.to_string(),
            score,
        })
        .collect()
}

/// Model-engagement index update for one interaction, when the post's author
/// is a model. `weight` is the interaction's ranking weight; pass it negated
/// when the interaction is removed.
pub fn model_engagement_op(post: &Post, weight: f64) -> Option<WriteOp> {
    if post.author.role != Role::Model {
        return None;
    }
    Some(WriteOp::SortedIncr {
        key: keys::model_engagement(),
        member: post.author_id.to_string(),
        delta: weight,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuthorSnapshot;
    use uuid::Uuid;

    #[test]
    fn zero_age_score_is_exact_weighted_sum() {
        let score = engagement_score(2, 3, 4, 1_000, 1_000);
        assert_eq!(score, 2.0 * 3.0 + 3.0 * 5.0 + 4.0 * 4.0);
    }

    #[test]
    fn score_decays_with_age() {
        // One hour old: denominator is 2
        let score = engagement_score(10, 0, 0, 0, 3_600_000);
        assert_eq!(score, 15.0);
    }

    #[test]
    fn horizon_forces_zero_regardless_of_counts() {
        let just_inside = engagement_score(1000, 1000, 1000, 0, RANKING_HORIZON_MS);
        assert!(just_inside > 0.0);

        let past = engagement_score(1000, 1000, 1000, 0, RANKING_HORIZON_MS + 1);
        assert_eq!(past, 0.0);
    }

    #[test]
    fn horizon_constant_matches_fourteen_days() {
        assert_eq!(RANKING_HORIZON_MS, 1_209_600_000);
    }

    #[test]
    fn future_timestamps_clamp_to_zero_age() {
        let score = engagement_score(1, 0, 0, 2_000, 1_000);
        assert_eq!(score, 3.0);
    }

    #[test]
    fn rerank_targets_every_hashtag_once() {
        let post = Post {
            id: Uuid::new_v4(),
            author_id: Uuid::new_v4(),
            author: AuthorSnapshot {
                username: "a".into(),
                display_name: "A".into(),
                avatar_url: None,
                role: Role::User,
            },
            content: "#rust #redis #Rust".into(),
            media_url: None,
            created_at: 0,
            likes_count: 0,
            comments_count: 0,
            bookmarks_count: 0,
            banned: false,
            banned_by: None,
            banned_at: None,
        };
        let ops = rerank_ops(&post, 1, 0, 0, 0);
        assert_eq!(ops.len(), 2);
        match &ops[0] {
            WriteOp::SortedAdd { key, score, .. } => {
                assert_eq!(key, &keys::hashtag_ranked("rust"));
                assert_eq!(*score, 3.0);
            }
            other => panic!("unexpected op {other:?}"),
        }
    }

    #[test]
    fn model_engagement_only_for_model_authors() {
        let mut post = Post {
            id: Uuid::new_v4(),
            author_id: Uuid::new_v4(),
            author: AuthorSnapshot {
                username: "a".into(),
                display_name: "A".into(),
                avatar_url: None,
                role: Role::User,
            },
            content: String::new(),
            media_url: None,
            created_at: 0,
            likes_count: 0,
            comments_count: 0,
            bookmarks_count: 0,
            banned: false,
            banned_by: None,
            banned_at: None,
        };
        assert!(model_engagement_op(&post, LIKE_WEIGHT).is_none());

        post.author.role = Role::Model;
        let op = model_engagement_op(&post, -BOOKMARK_WEIGHT);
        match op {
            Some(WriteOp::SortedIncr { delta, .. }) => assert_eq!(delta, -4.0),
            other => panic!("unexpected op {other:?}"),
        }
    }
}
