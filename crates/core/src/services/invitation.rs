//! Invitation service.
//!
//! Creators hand out invitation tokens; accepting one turns the token into a
//! creator-member relationship. Acceptance runs as a single transaction so
//! that concurrent accepts near the use limit cannot over-grant.

use aiponge_common::config::InvitationConfig;
use aiponge_common::{AppError, AppResult, IdGenerator};
use aiponge_db::entities::invitation::InvitationState;
use aiponge_db::entities::{creator_member, invitation};
use aiponge_db::repositories::creator_member::new_active;
use aiponge_db::repositories::{CreatorMemberRepository, InvitationRepository};
use chrono::{DateTime, Duration, FixedOffset, Utc};
use sea_orm::{DbErr, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

/// Input for creating an invitation.
#[derive(Debug, Default, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvitationInput {
    /// `None` allows unlimited uses.
    #[validate(range(min = 1))]
    pub max_uses: Option<i32>,
    /// `None` falls back to the configured default expiry.
    #[validate(range(min = 1, max = 87_600))]
    pub expires_in_hours: Option<i64>,
    #[validate(email)]
    pub email: Option<String>,
}

/// Why an acceptance was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AcceptInvitationError {
    #[error("Invitation not found")]
    NotFound,
    #[error("Invitation has expired")]
    Expired,
    #[error("Invitation has reached its maximum number of uses")]
    MaxUsesReached,
    #[error("Already following this creator")]
    AlreadyFollowing,
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),
}

impl AcceptInvitationError {
    /// Stable code reported to callers.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::Expired => "EXPIRED",
            Self::MaxUsesReached => "MAX_USES_REACHED",
            Self::AlreadyFollowing => "ALREADY_FOLLOWING",
            Self::TransactionFailed(_) => "TRANSACTION_FAILED",
        }
    }
}

impl From<DbErr> for AcceptInvitationError {
    fn from(err: DbErr) -> Self {
        Self::TransactionFailed(err.to_string())
    }
}

impl From<AcceptInvitationError> for AppError {
    fn from(err: AcceptInvitationError) -> Self {
        match err {
            AcceptInvitationError::NotFound => Self::NotFound(err.to_string()),
            AcceptInvitationError::Expired | AcceptInvitationError::MaxUsesReached => {
                Self::Gone(err.to_string())
            }
            AcceptInvitationError::AlreadyFollowing => Self::Conflict(err.to_string()),
            AcceptInvitationError::TransactionFailed(msg) => Self::Database(msg),
        }
    }
}

/// Serializable outcome of an acceptance.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptInvitationResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationship: Option<creator_member::Model>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl From<Result<creator_member::Model, AcceptInvitationError>> for AcceptInvitationResponse {
    fn from(result: Result<creator_member::Model, AcceptInvitationError>) -> Self {
        match result {
            Ok(relationship) => Self {
                success: true,
                relationship: Some(relationship),
                error: None,
                error_message: None,
            },
            Err(err) => Self {
                success: false,
                relationship: None,
                error: Some(err.code()),
                error_message: Some(err.to_string()),
            },
        }
    }
}

/// An invitation together with its derived lifecycle state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationView {
    #[serde(flatten)]
    pub invitation: invitation::Model,
    pub state: InvitationState,
}

impl InvitationView {
    fn at(invitation: invitation::Model, now: DateTime<Utc>) -> Self {
        let state = invitation.state_at(now);
        Self { invitation, state }
    }
}

/// Longest allowed invitation lifetime (ten years).
pub const MAX_EXPIRY_HOURS: i64 = 87_600;

/// Expiry instant `hours` after `now`.
fn expiry_after(now: DateTime<Utc>, hours: i64) -> AppResult<DateTime<FixedOffset>> {
    if !(1..=MAX_EXPIRY_HOURS).contains(&hours) {
        return Err(AppError::Validation(format!(
            "Invitation expiry must be between 1 and {MAX_EXPIRY_HOURS} hours, got {hours}"
        )));
    }

    Duration::try_hours(hours)
        .and_then(|d| now.checked_add_signed(d))
        .map(|at| at.fixed_offset())
        .ok_or_else(|| AppError::Validation(format!("Invitation expiry of {hours} hours overflows")))
}

/// Invitation service for business logic.
#[derive(Clone)]
pub struct InvitationService {
    invitation_repo: InvitationRepository,
    config: InvitationConfig,
    id_gen: IdGenerator,
}

impl InvitationService {
    /// Create a new invitation service.
    #[must_use]
    pub const fn new(invitation_repo: InvitationRepository, config: InvitationConfig) -> Self {
        Self {
            invitation_repo,
            config,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create an invitation to follow `creator_id`.
    pub async fn create_invitation(
        &self,
        creator_id: &str,
        input: CreateInvitationInput,
    ) -> AppResult<invitation::Model> {
        input.validate()?;

        let now = Utc::now();
        let expires_at = input
            .expires_in_hours
            .or(self.config.default_expiry_hours)
            .map(|hours| expiry_after(now, hours))
            .transpose()?;

        let model = invitation::ActiveModel {
            id: Set(self.id_gen.generate()),
            creator_id: Set(creator_id.to_string()),
            token: Set(self.id_gen.generate_invite_token(self.config.token_length)),
            max_uses: Set(input.max_uses),
            use_count: Set(0),
            expires_at: Set(expires_at),
            email: Set(input.email),
            created_at: Set(now.fixed_offset()),
            deleted_at: Set(None),
        };

        let invitation = self.invitation_repo.create(model).await?;
        tracing::info!(
            creator_id = %creator_id,
            invitation_id = %invitation.id,
            max_uses = ?invitation.max_uses,
            "Invitation created"
        );

        Ok(invitation)
    }

    /// Look up an invitation by token.
    pub async fn get_by_token(&self, token: &str) -> AppResult<InvitationView> {
        let invitation = self
            .invitation_repo
            .find_by_token(token)
            .await?
            .ok_or_else(|| AppError::NotFound("Invitation not found".to_string()))?;

        Ok(InvitationView::at(invitation, Utc::now()))
    }

    /// List a creator's invitations, newest first.
    pub async fn list_invitations(&self, creator_id: &str) -> AppResult<Vec<InvitationView>> {
        let now = Utc::now();
        Ok(self
            .invitation_repo
            .find_by_creator(creator_id)
            .await?
            .into_iter()
            .map(|inv| InvitationView::at(inv, now))
            .collect())
    }

    /// Revoke an invitation. Only its creator may do this.
    pub async fn revoke_invitation(&self, creator_id: &str, invitation_id: &str) -> AppResult<()> {
        let invitation = self
            .invitation_repo
            .find_by_id(invitation_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Invitation not found".to_string()))?;

        if invitation.creator_id != creator_id {
            return Err(AppError::Forbidden("Not your invitation".to_string()));
        }

        self.invitation_repo.soft_delete(invitation_id).await?;
        tracing::info!(invitation_id = %invitation_id, "Invitation revoked");

        Ok(())
    }

    /// Accept an invitation on behalf of `member_id`.
    ///
    /// Either the relationship is written and the use counted, or nothing
    /// changes. Store failures are reported as
    /// [`AcceptInvitationError::TransactionFailed`].
    pub async fn accept_invitation_atomically(
        &self,
        token: &str,
        member_id: &str,
    ) -> Result<creator_member::Model, AcceptInvitationError> {
        let result = self.accept_at(token, member_id, Utc::now()).await;

        match &result {
            Ok(relationship) => tracing::info!(
                creator_id = %relationship.creator_id,
                member_id = %member_id,
                "Invitation accepted"
            ),
            Err(AcceptInvitationError::TransactionFailed(msg)) => {
                tracing::warn!(member_id = %member_id, error = %msg, "Invitation acceptance failed");
            }
            Err(err) => {
                tracing::debug!(member_id = %member_id, code = err.code(), "Invitation rejected");
            }
        }

        result
    }

    async fn accept_at(
        &self,
        token: &str,
        member_id: &str,
        now: DateTime<Utc>,
    ) -> Result<creator_member::Model, AcceptInvitationError> {
        // Every early return drops `txn`, which rolls it back.
        let txn = self.invitation_repo.db().begin().await?;

        let invitation = InvitationRepository::find_by_token_on(&txn, token)
            .await?
            .ok_or(AcceptInvitationError::NotFound)?;

        if invitation.is_expired_at(now) {
            return Err(AcceptInvitationError::Expired);
        }
        if invitation.is_exhausted() {
            return Err(AcceptInvitationError::MaxUsesReached);
        }

        let existing =
            CreatorMemberRepository::find_by_pair_on(&txn, &invitation.creator_id, member_id)
                .await?;

        let relationship = match existing {
            Some(rel) if rel.is_active() => return Err(AcceptInvitationError::AlreadyFollowing),
            Some(rel) => CreatorMemberRepository::reactivate_on(&txn, rel).await?,
            None => {
                let model = new_active(self.id_gen.generate(), &invitation.creator_id, member_id);
                CreatorMemberRepository::create_on(&txn, model).await?
            }
        };

        let counted =
            InvitationRepository::increment_use_count_on(&txn, &invitation.id, invitation.max_uses)
                .await?;
        if counted == 0 {
            // A concurrent acceptance took the last use after our read.
            return Err(AcceptInvitationError::MaxUsesReached);
        }

        txn.commit().await?;
        Ok(relationship)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use aiponge_db::entities::creator_member::MemberStatus;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::sync::Arc;

    fn service(db: MockDatabase) -> InvitationService {
        let repo = InvitationRepository::new(Arc::new(db.into_connection()));
        InvitationService::new(repo, InvitationConfig::default())
    }

    fn create_test_invitation(
        max_uses: Option<i32>,
        use_count: i32,
        expires_in_hours: Option<i64>,
    ) -> invitation::Model {
        let now = Utc::now();
        invitation::Model {
            id: "inv1".to_string(),
            creator_id: "creator1".to_string(),
            token: "TOKEN23456".to_string(),
            max_uses,
            use_count,
            expires_at: expires_in_hours.map(|h| (now + Duration::hours(h)).fixed_offset()),
            email: None,
            created_at: now.fixed_offset(),
            deleted_at: None,
        }
    }

    fn create_test_relationship(status: MemberStatus) -> creator_member::Model {
        creator_member::Model {
            id: "rel1".to_string(),
            creator_id: "creator1".to_string(),
            member_id: "member1".to_string(),
            status,
            created_at: Utc::now().fixed_offset(),
            deleted_at: None,
        }
    }

    fn exec(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    #[tokio::test]
    async fn test_accept_not_found() {
        let svc = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<invitation::Model>::new()]),
        );

        let result = svc.accept_invitation_atomically("NOPE", "member1").await;

        assert_eq!(result.unwrap_err(), AcceptInvitationError::NotFound);
    }

    #[tokio::test]
    async fn test_accept_expired_takes_precedence_over_max_uses() {
        // Past expiry and uses remaining: must be EXPIRED, not MAX_USES_REACHED
        let svc = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_invitation(Some(5), 1, Some(-1))]]),
        );

        let result = svc.accept_invitation_atomically("TOKEN23456", "member1").await;

        assert_eq!(result.unwrap_err(), AcceptInvitationError::Expired);
    }

    #[tokio::test]
    async fn test_accept_max_uses_reached() {
        let svc = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_invitation(Some(2), 2, Some(24))]]),
        );

        let result = svc.accept_invitation_atomically("TOKEN23456", "member1").await;

        assert_eq!(result.unwrap_err(), AcceptInvitationError::MaxUsesReached);
    }

    #[tokio::test]
    async fn test_accept_already_following() {
        let svc = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_invitation(None, 3, None)]])
                .append_query_results([[create_test_relationship(MemberStatus::Active)]]),
        );

        let result = svc.accept_invitation_atomically("TOKEN23456", "member1").await;

        assert_eq!(result.unwrap_err(), AcceptInvitationError::AlreadyFollowing);
    }

    #[tokio::test]
    async fn test_accept_success_inserts_and_counts() {
        let svc = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_invitation(Some(1), 0, None)]])
                .append_query_results([Vec::<creator_member::Model>::new()])
                // INSERT ... RETURNING
                .append_query_results([[create_test_relationship(MemberStatus::Active)]])
                .append_exec_results([exec(1)]),
        );

        let relationship = svc
            .accept_invitation_atomically("TOKEN23456", "member1")
            .await
            .unwrap();

        assert_eq!(relationship.creator_id, "creator1");
        assert_eq!(relationship.member_id, "member1");
        assert!(relationship.is_active());
    }

    #[tokio::test]
    async fn test_accept_reactivates_revoked_relationship() {
        let reactivated = create_test_relationship(MemberStatus::Active);

        let svc = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_invitation(None, 0, None)]])
                .append_query_results([[create_test_relationship(MemberStatus::Revoked)]])
                // UPDATE ... RETURNING
                .append_query_results([[reactivated]])
                .append_exec_results([exec(1)]),
        );

        let relationship = svc
            .accept_invitation_atomically("TOKEN23456", "member1")
            .await
            .unwrap();

        assert_eq!(relationship.id, "rel1");
        assert_eq!(relationship.status, MemberStatus::Active);
    }

    #[tokio::test]
    async fn test_accept_lost_race_on_last_use() {
        let svc = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_invitation(Some(1), 0, None)]])
                .append_query_results([Vec::<creator_member::Model>::new()])
                .append_query_results([[create_test_relationship(MemberStatus::Active)]])
                .append_exec_results([exec(0)]),
        );

        let result = svc.accept_invitation_atomically("TOKEN23456", "member1").await;

        assert_eq!(result.unwrap_err(), AcceptInvitationError::MaxUsesReached);
    }

    #[tokio::test]
    async fn test_accept_store_error_is_transaction_failed() {
        let svc = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_errors([DbErr::Custom("connection reset".to_string())]),
        );

        let err = svc
            .accept_invitation_atomically("TOKEN23456", "member1")
            .await
            .unwrap_err();

        assert_eq!(err.code(), "TRANSACTION_FAILED");
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn test_error_codes_map_to_app_errors() {
        let status = |err: AcceptInvitationError| AppError::from(err).status_code().as_u16();

        assert_eq!(status(AcceptInvitationError::NotFound), 404);
        assert_eq!(status(AcceptInvitationError::Expired), 410);
        assert_eq!(status(AcceptInvitationError::MaxUsesReached), 410);
        assert_eq!(status(AcceptInvitationError::AlreadyFollowing), 409);
        assert_eq!(
            status(AcceptInvitationError::TransactionFailed("x".to_string())),
            500
        );
    }

    #[test]
    fn test_response_shape() {
        let ok = AcceptInvitationResponse::from(Ok(create_test_relationship(MemberStatus::Active)));
        assert!(ok.success);
        assert!(ok.error.is_none());

        let failed = AcceptInvitationResponse::from(Err(AcceptInvitationError::Expired));
        assert!(!failed.success);
        assert_eq!(failed.error, Some("EXPIRED"));
        assert!(failed.relationship.is_none());
    }

    #[tokio::test]
    async fn test_create_invitation_rejects_zero_max_uses() {
        let svc = service(MockDatabase::new(DatabaseBackend::Postgres));

        let input = CreateInvitationInput {
            max_uses: Some(0),
            ..Default::default()
        };
        let result = svc.create_invitation("creator1", input).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_invitation_rejects_huge_expiry() {
        let svc = service(MockDatabase::new(DatabaseBackend::Postgres));

        let input = CreateInvitationInput {
            expires_in_hours: Some(10_000_000_000),
            ..Default::default()
        };
        let result = svc.create_invitation("creator1", input).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_invitation_rejects_huge_default_expiry() {
        let repo = InvitationRepository::new(Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres).into_connection(),
        ));
        let config = InvitationConfig {
            default_expiry_hours: Some(i64::MAX),
            ..InvitationConfig::default()
        };
        let svc = InvitationService::new(repo, config);

        let result = svc
            .create_invitation("creator1", CreateInvitationInput::default())
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_expiry_after_bounds() {
        let now = Utc::now();

        assert_eq!(
            expiry_after(now, 24).unwrap(),
            (now + Duration::hours(24)).fixed_offset()
        );
        assert!(expiry_after(now, MAX_EXPIRY_HOURS).is_ok());
        assert!(expiry_after(now, MAX_EXPIRY_HOURS + 1).is_err());
        assert!(expiry_after(now, 0).is_err());
    }

    #[tokio::test]
    async fn test_revoke_requires_owner() {
        let svc = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_invitation(None, 0, None)]]),
        );

        let result = svc.revoke_invitation("someone_else", "inv1").await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_get_by_token_reports_state() {
        let svc = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_invitation(Some(3), 3, None)]]),
        );

        let view = svc.get_by_token("TOKEN23456").await.unwrap();

        assert_eq!(view.state, InvitationState::Exhausted);
    }
}
