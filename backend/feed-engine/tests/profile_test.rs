mod common;

use common::{auth, seed_user, setup};
use feed_engine::models::Role;
use feed_engine::store::KvStore;
use feed_engine::{
    keys, AppError, CreatePostInput, FeedQueryService, InteractionService, PostService,
    ProfileService, SocialGraphService, UpdateProfileInput,
};

fn post_input(content: &str) -> CreatePostInput {
    CreatePostInput {
        content: content.into(),
        media_url: None,
    }
}

#[tokio::test]
async fn profile_is_redacted_for_everyone_but_the_owner() {
    let env = setup();
    let alice = seed_user(&env, "alice", Role::User).await;
    let bob = seed_user(&env, "bob", Role::User).await;
    let profiles = ProfileService::new(env.ctx.clone());

    let own_view = profiles
        .get_user_profile(alice.id, Some(alice.id))
        .await
        .unwrap();
    assert_eq!(own_view.email, alice.email);
    assert_eq!(own_view.legal_name, alice.legal_name);

    let bob_view = profiles
        .get_user_profile(alice.id, Some(bob.id))
        .await
        .unwrap();
    assert_eq!(bob_view.username, alice.username);
    assert!(bob_view.email.is_none());
    assert!(bob_view.legal_name.is_none());
    assert!(bob_view.password_hash.is_none());
    assert!(bob_view.ip_address.is_none());

    let anon_view = profiles.get_user_profile(alice.id, None).await.unwrap();
    assert!(anon_view.email.is_none());

    let err = profiles
        .get_user_profile(uuid::Uuid::new_v4(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn empty_update_is_rejected() {
    let env = setup();
    let alice = seed_user(&env, "alice", Role::User).await;
    let profiles = ProfileService::new(env.ctx.clone());

    let err = profiles
        .update_profile(auth(&alice), UpdateProfileInput::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = profiles
        .update_profile(
            auth(&alice),
            UpdateProfileInput {
                username: Some("   ".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn profile_edit_propagates_to_snapshots_and_cached_listings() {
    let env = setup();
    let alice = seed_user(&env, "alice", Role::User).await;
    let posts = PostService::new(env.ctx.clone());
    let feeds = FeedQueryService::new(env.ctx.clone());
    let profiles = ProfileService::new(env.ctx.clone());

    posts
        .create_post(auth(&alice), post_input("hello"))
        .await
        .unwrap();

    // Prime the response cache with the old display name.
    let before = feeds.list_explore_feed(None, 0, 10, true).await.unwrap();
    assert_eq!(before[0].post.author.display_name, alice.display_name);

    profiles
        .update_profile(
            auth(&alice),
            UpdateProfileInput {
                display_name: Some("Alicia".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // Both the denormalized snapshot and the embedded profile reflect the
    // edit immediately; no stale cached payload is served.
    let after = feeds.list_explore_feed(None, 0, 10, true).await.unwrap();
    assert_eq!(after[0].post.author.display_name, "Alicia");
    assert_eq!(after[0].author.as_ref().unwrap().display_name, "Alicia");
}

#[tokio::test]
async fn profile_edit_reaches_posts_written_before_author_indexes() {
    let env = setup();
    let alice = seed_user(&env, "alice", Role::User).await;
    let feeds = FeedQueryService::new(env.ctx.clone());
    let profiles = ProfileService::new(env.ctx.clone());

    // Legacy data: no per-author index and no capability marker.
    common::seed_legacy_post(&env, &alice, "old data").await;
    let before = feeds.list_explore_feed(None, 0, 10, false).await.unwrap();
    assert_eq!(before[0].post.author.display_name, alice.display_name);

    profiles
        .update_profile(
            auth(&alice),
            UpdateProfileInput {
                display_name: Some("Renamed".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let after = feeds.list_explore_feed(None, 0, 10, false).await.unwrap();
    assert_eq!(after[0].post.author.display_name, "Renamed");
}

#[tokio::test]
async fn account_deletion_removes_posts_written_before_author_indexes() {
    let env = setup();
    let alice = seed_user(&env, "alice", Role::User).await;
    let feeds = FeedQueryService::new(env.ctx.clone());
    let profiles = ProfileService::new(env.ctx.clone());

    common::seed_legacy_post(&env, &alice, "old data").await;

    profiles.delete_user(auth(&alice), alice.id).await.unwrap();
    let explore = feeds.list_explore_feed(None, 0, 10, false).await.unwrap();
    assert!(explore.is_empty());
}

#[tokio::test]
async fn follow_then_unfollow_keeps_counters_in_lockstep() {
    let env = setup();
    let alice = seed_user(&env, "alice", Role::User).await;
    let bob = seed_user(&env, "bob", Role::User).await;
    let profiles = ProfileService::new(env.ctx.clone());
    let social = SocialGraphService::new(env.ctx.clone());

    let err = social.follow_user(auth(&bob), bob.id).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    social.follow_user(auth(&bob), alice.id).await.unwrap();
    let err = social.follow_user(auth(&bob), alice.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let alice_view = profiles.get_user_profile(alice.id, None).await.unwrap();
    let bob_view = profiles.get_user_profile(bob.id, None).await.unwrap();
    assert_eq!(alice_view.followers_count, 1);
    assert_eq!(bob_view.following_count, 1);

    social.unfollow_user(auth(&bob), alice.id).await.unwrap();
    let err = social.unfollow_user(auth(&bob), alice.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let alice_view = profiles.get_user_profile(alice.id, None).await.unwrap();
    let bob_view = profiles.get_user_profile(bob.id, None).await.unwrap();
    assert_eq!(alice_view.followers_count, 0);
    assert_eq!(bob_view.following_count, 0);
}

#[tokio::test]
async fn only_owner_or_admin_may_delete_an_account() {
    let env = setup();
    let alice = seed_user(&env, "alice", Role::User).await;
    let bob = seed_user(&env, "bob", Role::User).await;
    let profiles = ProfileService::new(env.ctx.clone());

    let err = profiles.delete_user(auth(&bob), alice.id).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn account_deletion_cascades() {
    let env = setup();
    let alice = seed_user(&env, "alice", Role::User).await;
    let bob = seed_user(&env, "bob", Role::User).await;
    let mira = seed_user(&env, "mira", Role::Model).await;
    let posts = PostService::new(env.ctx.clone());
    let feeds = FeedQueryService::new(env.ctx.clone());
    let profiles = ProfileService::new(env.ctx.clone());
    let social = SocialGraphService::new(env.ctx.clone());
    let interactions = InteractionService::new(env.ctx.clone());

    // Alice authors a post that bob bookmarks, bookmarks one of mira's
    // posts herself, and sits on both sides of the follow graph.
    let alices_post = posts
        .create_post(auth(&alice), post_input("mine #rust"))
        .await
        .unwrap();
    let miras_post = posts
        .create_post(auth(&mira), post_input("theirs"))
        .await
        .unwrap();
    interactions
        .bookmark_post(auth(&bob), alices_post.id)
        .await
        .unwrap();
    interactions
        .bookmark_post(auth(&alice), miras_post.id)
        .await
        .unwrap();
    social.follow_user(auth(&bob), alice.id).await.unwrap();
    social.follow_user(auth(&alice), mira.id).await.unwrap();

    profiles.delete_user(auth(&alice), alice.id).await.unwrap();

    // The profile and authored posts are gone everywhere.
    let err = profiles.get_user_profile(alice.id, None).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    let explore = feeds.list_explore_feed(None, 0, 10, false).await.unwrap();
    assert_eq!(explore.len(), 1);
    assert_eq!(explore[0].post.id, miras_post.id);

    // Bob's bookmark of the deleted post vanished with it.
    let bobs = feeds.list_bookmarks(bob.id, 0, 10, false).await.unwrap();
    assert!(bobs.is_empty());

    // Alice's bookmark on mira's post is unwound: membership, counter, and
    // the model-engagement weight it carried.
    assert!(!env
        .store
        .set_contains(&keys::post_bookmarkers(miras_post.id), &alice.id.to_string())
        .await
        .unwrap());
    assert_eq!(common::bookmarks_count(&env, miras_post.id).await, 0);
    assert_eq!(
        env.store
            .sorted_score(&keys::model_engagement(), &mira.id.to_string())
            .await
            .unwrap(),
        Some(0.0)
    );

    // Both sides of the follow graph are cleaned, counters included.
    let bob_view = profiles.get_user_profile(bob.id, None).await.unwrap();
    assert_eq!(bob_view.following_count, 0);
    let mira_view = profiles.get_user_profile(mira.id, None).await.unwrap();
    assert_eq!(mira_view.followers_count, 0);
    assert!(!env
        .store
        .set_contains(&keys::followers(mira.id), &alice.id.to_string())
        .await
        .unwrap());

    // And the role index no longer lists the account.
    assert_eq!(
        env.store
            .sorted_score(&keys::newest_users(Role::User), &alice.id.to_string())
            .await
            .unwrap(),
        None
    );
}
