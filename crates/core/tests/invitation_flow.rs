//! Invitation acceptance against a real store.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use aiponge_common::AppError;
use aiponge_common::config::InvitationConfig;
use aiponge_core::{
    AcceptInvitationError, CreateInvitationInput, CreatorMemberService, InvitationService,
};
use aiponge_db::entities::invitation::{self, InvitationState};
use aiponge_db::entities::user::UserRole;
use aiponge_db::repositories::{CreatorMemberRepository, InvitationRepository, UserRepository};
use aiponge_db::test_utils::{TestDatabase, seed_user};
use chrono::{Duration, Utc};
use futures::future::join_all;
use sea_orm::Set;

struct Fixture {
    db: TestDatabase,
    invitations: InvitationService,
    relationships: CreatorMemberService,
}

async fn setup(members: usize) -> Fixture {
    let db = TestDatabase::sqlite().await.unwrap();
    seed_user(db.connection(), "creator", UserRole::User).await.unwrap();
    for i in 0..members {
        seed_user(db.connection(), &format!("member{i}"), UserRole::User)
            .await
            .unwrap();
    }

    let conn = Arc::clone(&db.conn);
    let invitations = InvitationService::new(
        InvitationRepository::new(Arc::clone(&conn)),
        InvitationConfig::default(),
    );
    let relationships = CreatorMemberService::new(
        CreatorMemberRepository::new(Arc::clone(&conn)),
        UserRepository::new(conn),
    );

    Fixture {
        db,
        invitations,
        relationships,
    }
}

async fn invite(fx: &Fixture, max_uses: Option<i32>) -> invitation::Model {
    fx.invitations
        .create_invitation(
            "creator",
            CreateInvitationInput {
                max_uses,
                ..Default::default()
            },
        )
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_accepts_respect_single_use() {
    let fx = setup(8).await;
    let inv = invite(&fx, Some(1)).await;

    let handles = (0..8).map(|i| {
        let svc = fx.invitations.clone();
        let token = inv.token.clone();
        tokio::spawn(async move {
            svc.accept_invitation_atomically(&token, &format!("member{i}"))
                .await
        })
    });
    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();

    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| *e == AcceptInvitationError::MaxUsesReached)
    );

    let view = fx.invitations.get_by_token(&inv.token).await.unwrap();
    assert_eq!(view.invitation.use_count, 1);
    assert_eq!(view.state, InvitationState::Exhausted);
    assert_eq!(fx.relationships.list_members("creator").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_second_accept_by_same_member() {
    let fx = setup(1).await;
    let inv = invite(&fx, Some(5)).await;

    let relationship = fx
        .invitations
        .accept_invitation_atomically(&inv.token, "member0")
        .await
        .unwrap();
    let second = fx
        .invitations
        .accept_invitation_atomically(&inv.token, "member0")
        .await;

    assert_eq!(relationship.creator_id, "creator");
    assert_eq!(second.unwrap_err(), AcceptInvitationError::AlreadyFollowing);

    // The rejected attempt did not consume a use
    let view = fx.invitations.get_by_token(&inv.token).await.unwrap();
    assert_eq!(view.invitation.use_count, 1);
    assert_eq!(view.state, InvitationState::Accepted);
}

#[tokio::test]
async fn test_expired_wins_over_remaining_uses() {
    let fx = setup(1).await;
    let repo = InvitationRepository::new(Arc::clone(&fx.db.conn));
    repo.create(invitation::ActiveModel {
        id: Set("inv_expired".to_string()),
        creator_id: Set("creator".to_string()),
        token: Set("EXPIRED234".to_string()),
        max_uses: Set(Some(5)),
        use_count: Set(1),
        expires_at: Set(Some((Utc::now() - Duration::hours(1)).fixed_offset())),
        email: Set(None),
        created_at: Set((Utc::now() - Duration::days(2)).fixed_offset()),
        deleted_at: Set(None),
    })
    .await
    .unwrap();

    let result = fx
        .invitations
        .accept_invitation_atomically("EXPIRED234", "member0")
        .await;

    assert_eq!(result.unwrap_err(), AcceptInvitationError::Expired);
    assert!(
        !fx.relationships
            .is_following("creator", "member0")
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_unknown_and_revoked_tokens() {
    let fx = setup(1).await;
    let inv = invite(&fx, None).await;

    fx.invitations
        .revoke_invitation("creator", &inv.id)
        .await
        .unwrap();

    assert_eq!(
        fx.invitations
            .accept_invitation_atomically(&inv.token, "member0")
            .await
            .unwrap_err(),
        AcceptInvitationError::NotFound
    );
    assert_eq!(
        fx.invitations
            .accept_invitation_atomically("NOSUCHTOKN", "member0")
            .await
            .unwrap_err(),
        AcceptInvitationError::NotFound
    );
    assert!(matches!(
        fx.invitations.get_by_token(&inv.token).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_accept_after_unfollow_reactivates() {
    let fx = setup(1).await;
    let inv = invite(&fx, None).await;

    let first = fx
        .invitations
        .accept_invitation_atomically(&inv.token, "member0")
        .await
        .unwrap();
    fx.relationships
        .revoke_relationship("creator", "member0")
        .await
        .unwrap();
    assert!(
        !fx.relationships
            .is_following("creator", "member0")
            .await
            .unwrap()
    );

    let second = fx
        .invitations
        .accept_invitation_atomically(&inv.token, "member0")
        .await
        .unwrap();

    assert_eq!(second.id, first.id);
    assert!(second.is_active());
    assert!(
        fx.relationships
            .is_following("creator", "member0")
            .await
            .unwrap()
    );
    let view = fx.invitations.get_by_token(&inv.token).await.unwrap();
    assert_eq!(view.invitation.use_count, 2);
}

#[tokio::test]
async fn test_created_invitation_defaults() {
    let fx = setup(0).await;

    let inv = invite(&fx, None).await;
    let listed = fx.invitations.list_invitations("creator").await.unwrap();

    assert_eq!(inv.token.len(), 10);
    assert_eq!(inv.use_count, 0);
    assert!(inv.expires_at.is_none());
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].state, InvitationState::Pending);
}

#[tokio::test]
async fn test_only_owner_can_revoke() {
    let fx = setup(1).await;
    let inv = invite(&fx, None).await;

    let result = fx.invitations.revoke_invitation("member0", &inv.id).await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
    assert!(fx.invitations.get_by_token(&inv.token).await.is_ok());
}
