use crate::models::{NewUser, User, UserChanges};
use async_trait::async_trait;
use sqlx::{PgPool, query_builder::QueryBuilder};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, email, name, age, city, zip_code, is_deleted";

/// RepositoryError
///
/// Failures raised by the store. These propagate to the controller unchanged; there
/// is no retry at this layer.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable")]
    Unavailable,

    #[error("Cast to {kind} failed for value {value} at path \"{path}\"")]
    Cast {
        path: String,
        kind: &'static str,
        value: String,
    },

    #[error("invalid update: {0}")]
    InvalidUpdate(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// UserRepository
///
/// The persistence contract for users. Reads and updates only see records with
/// `is_deleted = false`; `delete_user` is the one operation that does not filter on
/// the flag, so deleting an already-deleted user still finds it.
///
/// `Send + Sync + async_trait` keep the trait object (`Arc<dyn UserRepository>`)
/// usable across Axum's task boundaries.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, user: NewUser) -> RepositoryResult<User>;

    async fn get_user_by_id(&self, id: Uuid) -> RepositoryResult<Option<User>>;

    // Store-native order.
    async fn get_users(&self) -> RepositoryResult<Vec<User>>;

    /// Applies `changes` to a live record and returns the record after the update.
    async fn update_user(&self, id: Uuid, changes: UserChanges) -> RepositoryResult<Option<User>>;

    /// Sets the soft-delete flag, regardless of its current value.
    async fn delete_user(&self, id: Uuid) -> RepositoryResult<Option<User>>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn UserRepository>;

/// PostgresRepository
///
/// `UserRepository` backed by the `users` table.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PostgresRepository {
    /// create_user
    ///
    /// The id comes from the column default and `is_deleted` starts out false.
    async fn create_user(&self, user: NewUser) -> RepositoryResult<User> {
        let query = format!(
            "INSERT INTO users (email, name, age, city, zip_code) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(user.email)
            .bind(user.name)
            .bind(user.age)
            .bind(user.city)
            .bind(user.zip_code)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("create_user error: {:?}", e);
                e.into()
            })
    }

    async fn get_user_by_id(&self, id: Uuid) -> RepositoryResult<Option<User>> {
        let query =
            format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND is_deleted = false");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("get_user_by_id error: {:?}", e);
                e.into()
            })
    }

    async fn get_users(&self) -> RepositoryResult<Vec<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE is_deleted = false");
        sqlx::query_as::<_, User>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("get_users error: {:?}", e);
                e.into()
            })
    }

    /// update_user
    ///
    /// Builds the `SET` list from whichever fields the change set carries, using
    /// QueryBuilder for parameter binding. An empty change set is a plain lookup.
    async fn update_user(&self, id: Uuid, changes: UserChanges) -> RepositoryResult<Option<User>> {
        if changes.is_empty() {
            return self.get_user_by_id(id).await;
        }

        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new("UPDATE users SET ");
        {
            let mut set = builder.separated(", ");
            if let Some(email) = changes.email {
                set.push("email = ").push_bind_unseparated(email);
            }
            if let Some(name) = changes.name {
                set.push("name = ").push_bind_unseparated(name);
            }
            if let Some(age) = changes.age {
                set.push("age = ").push_bind_unseparated(age);
            }
            if let Some(city) = changes.city {
                set.push("city = ").push_bind_unseparated(city);
            }
            if let Some(zip_code) = changes.zip_code {
                set.push("zip_code = ").push_bind_unseparated(zip_code);
            }
            if let Some(is_deleted) = changes.is_deleted {
                set.push("is_deleted = ").push_bind_unseparated(is_deleted);
            }
        }
        builder.push(" WHERE id = ");
        builder.push_bind(id);
        builder.push(" AND is_deleted = false RETURNING ");
        builder.push(USER_COLUMNS);

        builder
            .build_query_as::<User>()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("update_user error: {:?}", e);
                e.into()
            })
    }

    async fn delete_user(&self, id: Uuid) -> RepositoryResult<Option<User>> {
        let query =
            format!("UPDATE users SET is_deleted = true WHERE id = $1 RETURNING {USER_COLUMNS}");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("delete_user error: {:?}", e);
                e.into()
            })
    }
}

/// InMemoryUserRepository
///
/// A process-local store for development and tests. Records are kept in insertion
/// order, which is the order `get_users` returns them in. `new_failing` builds a store
/// whose every operation fails, to simulate an outage.
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserRepository {
    users: Arc<RwLock<Vec<User>>>,
    /// When true, all operations return `RepositoryError::Unavailable`.
    pub should_fail: bool,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    fn check_available(&self) -> RepositoryResult<()> {
        if self.should_fail {
            tracing::error!("in-memory store is configured to fail");
            return Err(RepositoryError::Unavailable);
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create_user(&self, user: NewUser) -> RepositoryResult<User> {
        self.check_available()?;
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            name: user.name,
            age: user.age,
            city: user.city,
            zip_code: user.zip_code,
            is_deleted: false,
        };
        self.users.write().await.push(created.clone());
        tracing::debug!(user_id = %created.id, "created user");
        Ok(created)
    }

    async fn get_user_by_id(&self, id: Uuid) -> RepositoryResult<Option<User>> {
        self.check_available()?;
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.id == id && !u.is_deleted).cloned())
    }

    async fn get_users(&self) -> RepositoryResult<Vec<User>> {
        self.check_available()?;
        let users = self.users.read().await;
        Ok(users.iter().filter(|u| !u.is_deleted).cloned().collect())
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> RepositoryResult<Option<User>> {
        self.check_available()?;
        let mut users = self.users.write().await;
        Ok(users
            .iter_mut()
            .find(|u| u.id == id && !u.is_deleted)
            .map(|user| {
                changes.apply_to(user);
                user.clone()
            }))
    }

    async fn delete_user(&self, id: Uuid) -> RepositoryResult<Option<User>> {
        self.check_available()?;
        let mut users = self.users.write().await;
        Ok(users.iter_mut().find(|u| u.id == id).map(|user| {
            user.is_deleted = true;
            user.clone()
        }))
    }
}
