//! Privacy redaction of user profiles.
//!
//! Applied to every author profile embedded in aggregated listings and to
//! standalone profile reads. Pure function: the owner sees the full profile,
//! any other viewer gets a copy with the sensitive deny-list cleared.

use uuid::Uuid;

use crate::models::User;

/// Redact `profile` for `viewer`. `subject_id` is the profile owner's id;
/// when the viewer is the owner the profile passes through unchanged.
pub fn redact(profile: &User, subject_id: Uuid, viewer: Option<Uuid>) -> User {
    if viewer == Some(subject_id) {
        return profile.clone();
    }
    User {
        legal_name: None,
        email: None,
        phone: None,
        password_hash: None,
        birth_date: None,
        address: None,
        ip_address: None,
        device_id: None,
        billing_ref: None,
        ..profile.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn profile(id: Uuid) -> User {
        User {
            id,
            username: "alice".into(),
            display_name: "Alice".into(),
            avatar_url: Some("a.png".into()),
            bio: Some("hi".into()),
            role: Role::User,
            created_at: 1,
            followers_count: 2,
            following_count: 3,
            posts_count: 4,
            legal_name: Some("Alice Example".into()),
            email: Some("alice@example.com".into()),
            phone: Some("+1555".into()),
            password_hash: Some("hash".into()),
            birth_date: Some("1990-01-01".into()),
            address: Some("1 Main St".into()),
            ip_address: Some("203.0.113.9".into()),
            device_id: Some("dev-1".into()),
            billing_ref: Some("cus_123".into()),
        }
    }

    #[test]
    fn owner_sees_everything() {
        let id = Uuid::new_v4();
        let full = profile(id);
        assert_eq!(redact(&full, id, Some(id)), full);
    }

    #[test]
    fn other_viewers_lose_the_deny_list_only() {
        let id = Uuid::new_v4();
        let redacted = redact(&profile(id), id, Some(Uuid::new_v4()));
        assert!(redacted.legal_name.is_none());
        assert!(redacted.email.is_none());
        assert!(redacted.phone.is_none());
        assert!(redacted.password_hash.is_none());
        assert!(redacted.birth_date.is_none());
        assert!(redacted.address.is_none());
        assert!(redacted.ip_address.is_none());
        assert!(redacted.device_id.is_none());
        assert!(redacted.billing_ref.is_none());
        // Public fields survive
        assert_eq!(redacted.username, "alice");
        assert_eq!(redacted.followers_count, 2);
    }

    #[test]
    fn anonymous_viewer_is_redacted() {
        let id = Uuid::new_v4();
        assert!(redact(&profile(id), id, None).email.is_none());
    }

    #[test]
    fn redaction_is_idempotent() {
        let id = Uuid::new_v4();
        let viewer = Some(Uuid::new_v4());
        let once = redact(&profile(id), id, viewer);
        let twice = redact(&once, id, viewer);
        assert_eq!(once, twice);
    }
}
