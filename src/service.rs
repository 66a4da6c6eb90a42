use thiserror::Error;
use uuid::Uuid;

use crate::models::{NewUser, UserChanges, UserDto};
use crate::repository::{RepositoryError, RepositoryState};
use crate::validation::ValidationError;

#[derive(Debug, Error)]
pub enum UserError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("User not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid user id: {0}")]
    MalformedId(String),

    #[error(transparent)]
    Store(#[from] RepositoryError),
}

pub type UserResult<T> = Result<T, UserError>;

/// UserService
///
/// Thin orchestration over the repository: one call-through per operation, turning
/// records into `UserDto`s and a missing record into `UserError::NotFound`.
#[derive(Clone)]
pub struct UserService {
    repo: RepositoryState,
}

impl UserService {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    pub async fn list_users(&self) -> UserResult<Vec<UserDto>> {
        let users = self.repo.get_users().await?;
        Ok(users.into_iter().map(UserDto::from).collect())
    }

    pub async fn get_user(&self, id: &str) -> UserResult<UserDto> {
        let id = parse_id(id)?;
        let user = self
            .repo
            .get_user_by_id(id)
            .await?
            .ok_or(UserError::NotFound(id))?;
        Ok(user.into())
    }

    pub async fn create_user(&self, user: NewUser) -> UserResult<UserDto> {
        let created = self.repo.create_user(user).await?;
        tracing::info!(user_id = %created.id, "user created");
        Ok(created.into())
    }

    pub async fn update_user(&self, id: &str, changes: UserChanges) -> UserResult<UserDto> {
        let id = parse_id(id)?;
        let user = self
            .repo
            .update_user(id, changes)
            .await?
            .ok_or(UserError::NotFound(id))?;
        Ok(user.into())
    }

    /// Soft-deletes the user. An already-deleted user is still found and succeeds again.
    pub async fn delete_user(&self, id: &str) -> UserResult<()> {
        let id = parse_id(id)?;
        self.repo
            .delete_user(id)
            .await?
            .ok_or(UserError::NotFound(id))?;
        tracing::info!(user_id = %id, "user soft-deleted");
        Ok(())
    }
}

fn parse_id(id: &str) -> UserResult<Uuid> {
    Uuid::parse_str(id).map_err(|_| UserError::MalformedId(id.to_string()))
}
