//! Domain model for the feed engine.
//!
//! Posts and users live in the remote store as field maps (hashes); the
//! `to_fields`/`from_fields` pairs own that encoding. A post carries a
//! denormalized snapshot of its author so listings never need a join at read
//! time; profile edits re-propagate the snapshot.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Verified caller identity, produced by the external identity provider.
#[derive(Debug, Clone, Copy)]
pub struct AuthContext {
    pub subject_id: Uuid,
    pub role: Role,
}

impl AuthContext {
    pub fn new(subject_id: Uuid, role: Role) -> Self {
        Self { subject_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Ownership check against a typed resource reference. Admins may modify
    /// anything; everyone else only their own resources.
    pub fn can_modify(&self, resource: &ResourceRef) -> bool {
        self.is_admin() || self.subject_id == resource.owner
    }
}

/// Kind half of a typed resource reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Post,
    User,
}

/// Typed `(kind, owner)` reference used for ownership checks, replacing any
/// string-pattern parsing of store keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub owner: Uuid,
}

impl ResourceRef {
    pub fn post(owner: Uuid) -> Self {
        Self {
            kind: ResourceKind::Post,
            owner,
        }
    }

    pub fn user(owner: Uuid) -> Self {
        Self {
            kind: ResourceKind::User,
            owner,
        }
    }
}

/// User role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Model => write!(f, "model"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "model" => Ok(Role::Model),
            "admin" => Ok(Role::Admin),
            _ => Err(()),
        }
    }
}

/// Hashtag feed ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashtagFeedMode {
    Chronological,
    Ranked,
}

impl HashtagFeedMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashtagFeedMode::Chronological => "chrono",
            HashtagFeedMode::Ranked => "ranked",
        }
    }
}

/// User profile
///
/// The sensitive subset (everything below `role` and the counters) is
/// stripped by the privacy redactor for any viewer other than the owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub role: Role,
    pub created_at: i64,
    pub followers_count: u64,
    pub following_count: u64,
    pub posts_count: u64,
    // Sensitive subset
    pub legal_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password_hash: Option<String>,
    pub birth_date: Option<String>,
    pub address: Option<String>,
    pub ip_address: Option<String>,
    pub device_id: Option<String>,
    pub billing_ref: Option<String>,
}

impl User {
    pub fn to_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("id".into(), self.id.to_string()),
            ("username".into(), self.username.clone()),
            ("display_name".into(), self.display_name.clone()),
            ("role".into(), self.role.to_string()),
            ("created_at".into(), self.created_at.to_string()),
            ("followers_count".into(), self.followers_count.to_string()),
            ("following_count".into(), self.following_count.to_string()),
            ("posts_count".into(), self.posts_count.to_string()),
        ];
        push_opt(&mut fields, "avatar_url", &self.avatar_url);
        push_opt(&mut fields, "bio", &self.bio);
        push_opt(&mut fields, "legal_name", &self.legal_name);
        push_opt(&mut fields, "email", &self.email);
        push_opt(&mut fields, "phone", &self.phone);
        push_opt(&mut fields, "password_hash", &self.password_hash);
        push_opt(&mut fields, "birth_date", &self.birth_date);
        push_opt(&mut fields, "address", &self.address);
        push_opt(&mut fields, "ip_address", &self.ip_address);
        push_opt(&mut fields, "device_id", &self.device_id);
        push_opt(&mut fields, "billing_ref", &self.billing_ref);
        fields
    }

    /// Decode a user from its stored field map. An empty or structurally
    /// broken map yields `None`; batch callers drop such items.
    pub fn from_fields(fields: &HashMap<String, String>) -> Option<Self> {
        Some(Self {
            id: parse_uuid(fields.get("id")?)?,
            username: fields.get("username")?.clone(),
            display_name: fields.get("display_name").cloned().unwrap_or_default(),
            avatar_url: fields.get("avatar_url").cloned(),
            bio: fields.get("bio").cloned(),
            role: fields.get("role").and_then(|r| r.parse().ok())?,
            created_at: parse_i64(fields.get("created_at")),
            followers_count: parse_u64(fields.get("followers_count")),
            following_count: parse_u64(fields.get("following_count")),
            posts_count: parse_u64(fields.get("posts_count")),
            legal_name: fields.get("legal_name").cloned(),
            email: fields.get("email").cloned(),
            phone: fields.get("phone").cloned(),
            password_hash: fields.get("password_hash").cloned(),
            birth_date: fields.get("birth_date").cloned(),
            address: fields.get("address").cloned(),
            ip_address: fields.get("ip_address").cloned(),
            device_id: fields.get("device_id").cloned(),
            billing_ref: fields.get("billing_ref").cloned(),
        })
    }
}

/// Author fields denormalized onto every post at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorSnapshot {
    pub username: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub role: Role,
}

impl AuthorSnapshot {
    pub fn of(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            display_name: user.display_name.clone(),
            avatar_url: user.avatar_url.clone(),
            role: user.role,
        }
    }
}

/// Post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub author: AuthorSnapshot,
    pub content: String,
    pub media_url: Option<String>,
    /// Creation time, epoch milliseconds
    pub created_at: i64,
    pub likes_count: u64,
    pub comments_count: u64,
    pub bookmarks_count: u64,
    pub banned: bool,
    pub banned_by: Option<Uuid>,
    pub banned_at: Option<i64>,
}

impl Post {
    pub fn resource(&self) -> ResourceRef {
        ResourceRef::post(self.author_id)
    }

    pub fn to_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("id".into(), self.id.to_string()),
            ("author_id".into(), self.author_id.to_string()),
            ("author_username".into(), self.author.username.clone()),
            (
                "author_display_name".into(),
                self.author.display_name.clone(),
            ),
            ("author_role".into(), self.author.role.to_string()),
            ("content".into(), self.content.clone()),
            ("created_at".into(), self.created_at.to_string()),
            ("likes_count".into(), self.likes_count.to_string()),
            ("comments_count".into(), self.comments_count.to_string()),
            ("bookmarks_count".into(), self.bookmarks_count.to_string()),
            ("banned".into(), if self.banned { "1" } else { "0" }.into()),
        ];
        push_opt(&mut fields, "author_avatar_url", &self.author.avatar_url);
        push_opt(&mut fields, "media_url", &self.media_url);
        if let Some(by) = self.banned_by {
            fields.push(("banned_by".into(), by.to_string()));
        }
        if let Some(at) = self.banned_at {
            fields.push(("banned_at".into(), at.to_string()));
        }
        fields
    }

    /// Decode a post from its stored field map; `None` for empty or broken
    /// maps, which batch callers treat as a vanished entity.
    pub fn from_fields(fields: &HashMap<String, String>) -> Option<Self> {
        Some(Self {
            id: parse_uuid(fields.get("id")?)?,
            author_id: parse_uuid(fields.get("author_id")?)?,
            author: AuthorSnapshot {
                username: fields.get("author_username").cloned().unwrap_or_default(),
                display_name: fields
                    .get("author_display_name")
                    .cloned()
                    .unwrap_or_default(),
                avatar_url: fields.get("author_avatar_url").cloned(),
                role: fields
                    .get("author_role")
                    .and_then(|r| r.parse().ok())
                    .unwrap_or(Role::User),
            },
            content: fields.get("content")?.clone(),
            media_url: fields.get("media_url").cloned(),
            created_at: parse_i64(fields.get("created_at")),
            likes_count: parse_u64(fields.get("likes_count")),
            comments_count: parse_u64(fields.get("comments_count")),
            bookmarks_count: parse_u64(fields.get("bookmarks_count")),
            banned: fields.get("banned").map(|b| b == "1").unwrap_or(false),
            banned_by: fields.get("banned_by").and_then(|v| parse_uuid(v)),
            banned_at: fields.get("banned_at").and_then(|v| v.parse().ok()),
        })
    }
}

/// One materialized listing entry: the post plus, when requested, its
/// (redacted) author and the viewer's interaction flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedItem {
    pub post: Post,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<User>,
    pub is_liked: bool,
    pub is_bookmarked: bool,
}

fn push_opt(fields: &mut Vec<(String, String)>, name: &str, value: &Option<String>) {
    if let Some(v) = value {
        fields.push((name.to_string(), v.clone()));
    }
}

fn parse_uuid(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw).ok()
}

fn parse_i64(raw: Option<&String>) -> i64 {
    raw.and_then(|v| v.parse().ok()).unwrap_or(0)
}

fn parse_u64(raw: Option<&String>) -> u64 {
    raw.and_then(|v| v.parse().ok()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            username: "alice".into(),
            display_name: "Alice".into(),
            avatar_url: Some("https://cdn/avatar.png".into()),
            bio: None,
            role: Role::Model,
            created_at: 1_700_000_000_000,
            followers_count: 7,
            following_count: 3,
            posts_count: 12,
            legal_name: Some("Alice Example".into()),
            email: Some("alice@example.com".into()),
            phone: None,
            password_hash: Some("argon2id$...".into()),
            birth_date: None,
            address: None,
            ip_address: Some("203.0.113.9".into()),
            device_id: None,
            billing_ref: None,
        }
    }

    #[test]
    fn user_field_round_trip() {
        let user = sample_user();
        let map: HashMap<_, _> = user.to_fields().into_iter().collect();
        let decoded = User::from_fields(&map).unwrap();
        assert_eq!(decoded, user);
    }

    #[test]
    fn post_field_round_trip_keeps_ban_audit() {
        let admin = Uuid::new_v4();
        let post = Post {
            id: Uuid::new_v4(),
            author_id: Uuid::new_v4(),
            author: AuthorSnapshot {
                username: "alice".into(),
                display_name: "Alice".into(),
                avatar_url: None,
                role: Role::User,
            },
            content: "hello #world".into(),
            media_url: None,
            created_at: 42,
            likes_count: 1,
            comments_count: 2,
            bookmarks_count: 3,
            banned: true,
            banned_by: Some(admin),
            banned_at: Some(99),
        };
        let map: HashMap<_, _> = post.to_fields().into_iter().collect();
        let decoded = Post::from_fields(&map).unwrap();
        assert_eq!(decoded, post);
    }

    #[test]
    fn empty_map_decodes_to_none() {
        let empty = HashMap::new();
        assert!(Post::from_fields(&empty).is_none());
        assert!(User::from_fields(&empty).is_none());
    }

    #[test]
    fn admin_can_modify_anyone_elses_post() {
        let admin = AuthContext::new(Uuid::new_v4(), Role::Admin);
        let other = Uuid::new_v4();
        assert!(admin.can_modify(&ResourceRef::post(other)));

        let user = AuthContext::new(Uuid::new_v4(), Role::User);
        assert!(!user.can_modify(&ResourceRef::post(other)));
        assert!(user.can_modify(&ResourceRef::post(user.subject_id)));
    }
}
