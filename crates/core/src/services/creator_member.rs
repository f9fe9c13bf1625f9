//! Creator-member relationship service.
//!
//! A relationship means the member follows the creator and sees their
//! content. Everything here except invitation acceptance is idempotent: rows
//! are inserted with conflict-ignore and re-running a backfill inserts
//! nothing new.

use aiponge_common::{AppError, AppResult, IdGenerator};
use aiponge_db::entities::creator_member;
use aiponge_db::repositories::creator_member::new_active;
use aiponge_db::repositories::{CreatorMemberRepository, UserRepository};

/// Creator-member service for business logic.
#[derive(Clone)]
pub struct CreatorMemberService {
    relationship_repo: CreatorMemberRepository,
    user_repo: UserRepository,
    id_gen: IdGenerator,
}

impl CreatorMemberService {
    /// Create a new creator-member service.
    #[must_use]
    pub const fn new(relationship_repo: CreatorMemberRepository, user_repo: UserRepository) -> Self {
        Self {
            relationship_repo,
            user_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Make `member_id` follow `creator_id`, returning the pair's row.
    ///
    /// An existing row for the pair is returned as-is, whatever its status.
    pub async fn create_relationship(
        &self,
        creator_id: &str,
        member_id: &str,
    ) -> AppResult<creator_member::Model> {
        let model = new_active(self.id_gen.generate(), creator_id, member_id);
        let inserted = self
            .relationship_repo
            .insert_ignoring_conflicts(vec![model])
            .await?;

        if inserted > 0 {
            tracing::info!(creator_id = %creator_id, member_id = %member_id, "Relationship created");
        }

        self.relationship_repo
            .find_by_pair(creator_id, member_id)
            .await?
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "Relationship {creator_id} -> {member_id} missing after insert"
                ))
            })
    }

    /// Every user follows themself. Called on registration.
    pub async fn create_self_relationship(&self, user_id: &str) -> AppResult<creator_member::Model> {
        self.create_relationship(user_id, user_id).await
    }

    /// Make a member follow every librarian.
    pub async fn auto_follow_all_librarians(&self, member_id: &str) -> AppResult<u64> {
        let librarians = self.user_repo.find_librarian_ids().await?;
        let models = librarians
            .iter()
            .map(|librarian_id| new_active(self.id_gen.generate(), librarian_id, member_id))
            .collect();

        let inserted = self.relationship_repo.insert_ignoring_conflicts(models).await?;
        tracing::info!(
            member_id = %member_id,
            librarians = librarians.len(),
            inserted,
            "Auto-followed librarians"
        );

        Ok(inserted)
    }

    /// Make every user follow a librarian.
    pub async fn add_all_users_to_librarian(&self, librarian_id: &str) -> AppResult<u64> {
        let users = self.user_repo.find_all_ids().await?;
        let models = users
            .iter()
            .map(|user_id| new_active(self.id_gen.generate(), librarian_id, user_id))
            .collect();

        let inserted = self.relationship_repo.insert_ignoring_conflicts(models).await?;
        tracing::info!(
            librarian_id = %librarian_id,
            users = users.len(),
            inserted,
            "Added all users to librarian"
        );

        Ok(inserted)
    }

    /// Give every user their self relationship.
    pub async fn backfill_self_relationships(&self) -> AppResult<u64> {
        let users = self.user_repo.find_all_ids().await?;
        let models = users
            .iter()
            .map(|user_id| new_active(self.id_gen.generate(), user_id, user_id))
            .collect();

        let inserted = self.relationship_repo.insert_ignoring_conflicts(models).await?;
        tracing::info!(users = users.len(), inserted, "Backfilled self relationships");

        Ok(inserted)
    }

    /// Make every user follow every librarian.
    pub async fn backfill_librarian_relationships(&self) -> AppResult<u64> {
        let librarians = self.user_repo.find_librarian_ids().await?;
        if librarians.is_empty() {
            tracing::info!("No librarians, nothing to backfill");
            return Ok(0);
        }

        let users = self.user_repo.find_all_ids().await?;
        let models = librarians
            .iter()
            .flat_map(|librarian_id| {
                users
                    .iter()
                    .map(move |user_id| (librarian_id.as_str(), user_id.as_str()))
            })
            .map(|(librarian_id, user_id)| new_active(self.id_gen.generate(), librarian_id, user_id))
            .collect();

        let inserted = self.relationship_repo.insert_ignoring_conflicts(models).await?;
        tracing::info!(
            librarians = librarians.len(),
            users = users.len(),
            inserted,
            "Backfilled librarian relationships"
        );

        Ok(inserted)
    }

    /// Unfollow, or remove a member. The row is kept with status `revoked`.
    pub async fn revoke_relationship(&self, creator_id: &str, member_id: &str) -> AppResult<()> {
        if creator_id == member_id {
            return Err(AppError::BadRequest(
                "Cannot revoke a self relationship".to_string(),
            ));
        }

        let relationship = self
            .relationship_repo
            .find_active_by_pair(creator_id, member_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Relationship not found".to_string()))?;

        self.relationship_repo.revoke(&relationship.id).await?;
        tracing::info!(creator_id = %creator_id, member_id = %member_id, "Relationship revoked");

        Ok(())
    }

    /// Active members of a creator.
    pub async fn list_members(&self, creator_id: &str) -> AppResult<Vec<creator_member::Model>> {
        self.relationship_repo.find_members(creator_id).await
    }

    /// Creators a member actively follows.
    pub async fn list_following(&self, member_id: &str) -> AppResult<Vec<creator_member::Model>> {
        self.relationship_repo.find_following(member_id).await
    }

    /// Check whether `member_id` actively follows `creator_id`.
    pub async fn is_following(&self, creator_id: &str, member_id: &str) -> AppResult<bool> {
        Ok(self
            .relationship_repo
            .find_active_by_pair(creator_id, member_id)
            .await?
            .is_some())
    }
}
