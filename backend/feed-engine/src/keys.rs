//! Store and cache key formats.
//!
//! Every key used against the remote store or the in-process caches is built
//! here, so the formats have a single owner and authorization never parses
//! key strings back apart.

use uuid::Uuid;

use crate::models::Role;

// ---------------------------------------------------------------------------
// Remote store keys
// ---------------------------------------------------------------------------

/// Post hash
pub fn post(id: Uuid) -> String {
    format!("post:{id}")
}

/// User hash
pub fn user(id: Uuid) -> String {
    format!("user:{id}")
}

/// Set of user ids that liked a post
pub fn post_likers(id: Uuid) -> String {
    format!("post:{id}:likers")
}

/// Set of user ids that bookmarked a post
pub fn post_bookmarkers(id: Uuid) -> String {
    format!("post:{id}:bookmarkers")
}

/// Global chronological post index (score: creation time ms)
pub fn global_feed() -> String {
    "feed:posts".to_string()
}

/// Per-author chronological post index
pub fn author_posts(author_id: Uuid) -> String {
    format!("user:{author_id}:posts")
}

/// Per-hashtag chronological index
pub fn hashtag_posts(tag: &str) -> String {
    format!("hashtag:{tag}:posts")
}

/// Per-hashtag engagement-ranked index
pub fn hashtag_ranked(tag: &str) -> String {
    format!("hashtag:{tag}:ranked")
}

/// Per-user bookmark index (score: bookmark time ms)
pub fn bookmarks(user_id: Uuid) -> String {
    format!("user:{user_id}:bookmarks")
}

/// Set of user ids this user follows
pub fn following(user_id: Uuid) -> String {
    format!("user:{user_id}:following")
}

/// Set of user ids following this user
pub fn followers(user_id: Uuid) -> String {
    format!("user:{user_id}:followers")
}

/// Per-role newest-users index (score: account creation time ms)
pub fn newest_users(role: Role) -> String {
    format!("users:newest:{role}")
}

/// Global model-engagement index (score: accumulated interaction weight)
pub fn model_engagement() -> String {
    "models:engagement".to_string()
}

/// Schema capability set. Post creation adds [`AUTHOR_INDEX_CAPABILITY`];
/// its absence means the data predates per-author indexes and the following
/// feed must fall back to scanning the global index.
pub fn schema_capabilities() -> String {
    "schema:capabilities".to_string()
}

pub const AUTHOR_INDEX_CAPABILITY: &str = "author-posts-index";

// ---------------------------------------------------------------------------
// Response cache keys
// ---------------------------------------------------------------------------

pub const EXPLORE_PREFIX: &str = "explore:";
pub const FOLLOWING_PREFIX: &str = "following:";
pub const HASHTAG_PREFIX: &str = "hashtag:";
pub const BOOKMARKS_PREFIX: &str = "bookmarks:";
pub const SEARCH_USERS_PREFIX: &str = "search:users:";
pub const SEARCH_TAGS_PREFIX: &str = "search:tags:";
pub const SEARCH_MODELS_PREFIX: &str = "search:models:";

/// Every listing-key family the fan-out invalidation purges.
pub const LISTING_PREFIXES: &[&str] = &[
    EXPLORE_PREFIX,
    FOLLOWING_PREFIX,
    HASHTAG_PREFIX,
    BOOKMARKS_PREFIX,
    SEARCH_USERS_PREFIX,
    SEARCH_TAGS_PREFIX,
    SEARCH_MODELS_PREFIX,
];

fn viewer_tag(viewer: Option<Uuid>) -> String {
    viewer.map_or_else(|| "anon".to_string(), |v| v.to_string())
}

pub fn explore_response(viewer: Option<Uuid>, offset: u64, limit: u64, authors: bool) -> String {
    format!(
        "{EXPLORE_PREFIX}{}:{offset}:{limit}:{authors}",
        viewer_tag(viewer)
    )
}

pub fn following_response(viewer: Uuid, offset: u64, limit: u64, authors: bool) -> String {
    format!("{FOLLOWING_PREFIX}{viewer}:{offset}:{limit}:{authors}")
}

pub fn hashtag_response(
    viewer: Option<Uuid>,
    tag: &str,
    mode: &str,
    offset: u64,
    limit: u64,
    authors: bool,
) -> String {
    format!(
        "{HASHTAG_PREFIX}{tag}:{mode}:{}:{offset}:{limit}:{authors}",
        viewer_tag(viewer)
    )
}

pub fn bookmarks_response(viewer: Uuid, offset: u64, limit: u64, authors: bool) -> String {
    format!("{BOOKMARKS_PREFIX}{viewer}:{offset}:{limit}:{authors}")
}

pub fn newest_users_response(role: Role, limit: u64) -> String {
    format!("{SEARCH_USERS_PREFIX}{role}:{limit}")
}

pub fn hashtag_top_response(tags: &[String], per_tag: u64) -> String {
    // Length-prefix each tag so list boundaries stay unambiguous even when a
    // requested tag itself contains the separator.
    let encoded: Vec<String> = tags.iter().map(|t| format!("{}.{t}", t.len())).collect();
    format!("{SEARCH_TAGS_PREFIX}{}:{per_tag}", encoded.join(","))
}

pub fn top_models_response(limit: u64) -> String {
    format!("{SEARCH_MODELS_PREFIX}{limit}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_keys_sit_under_purged_prefixes() {
        let viewer = Uuid::new_v4();
        let keys = vec![
            explore_response(None, 0, 20, true),
            following_response(viewer, 0, 20, false),
            hashtag_response(Some(viewer), "rust", "ranked", 0, 10, true),
            bookmarks_response(viewer, 5, 10, true),
            newest_users_response(Role::Model, 10),
            hashtag_top_response(&["a".into(), "b".into()], 3),
            top_models_response(10),
        ];
        for key in keys {
            assert!(
                LISTING_PREFIXES.iter().any(|p| key.starts_with(p)),
                "key {key} not covered by invalidation prefixes"
            );
        }
    }

    #[test]
    fn tag_list_keys_encode_list_boundaries() {
        assert_ne!(
            hashtag_top_response(&["a,b".into()], 5),
            hashtag_top_response(&["a".into(), "b".into()], 5)
        );
        assert_ne!(
            hashtag_top_response(&["a".into(), "b,c".into()], 5),
            hashtag_top_response(&["a,b".into(), "c".into()], 5)
        );
    }

    #[test]
    fn anonymous_and_authed_explore_keys_differ() {
        let viewer = Uuid::new_v4();
        assert_ne!(
            explore_response(None, 0, 20, true),
            explore_response(Some(viewer), 0, 20, true)
        );
    }
}
