//! Users repository for database operations

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{error::AppResult, models::user::User};

/// User collection access
#[async_trait]
pub trait UsersStore: Send + Sync {
    async fn get_by_id(&self, id: &str) -> AppResult<Option<User>>;

    async fn exists(&self, id: &str) -> AppResult<bool>;

    /// Check if an email is already registered, optionally ignoring one user
    async fn email_exists(&self, email: &str, exclude_id: Option<&str>) -> AppResult<bool>;

    async fn insert(&self, user: &User) -> AppResult<()>;

    /// Overwrite every stored field of an existing user
    async fn save(&self, user: &User) -> AppResult<()>;

    async fn delete(&self, id: &str) -> AppResult<bool>;
}

#[derive(Clone)]
pub struct PgUsersRepository {
    pool: Pool<Postgres>,
}

impl PgUsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UsersStore for PgUsersRepository {
    async fn get_by_id(&self, id: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn exists(&self, id: &str) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn email_exists(&self, email: &str, exclude_id: Option<&str>) -> AppResult<bool> {
        let exists: bool = if let Some(id) = exclude_id {
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1) AND id != $2)")
                .bind(email)
                .bind(id)
                .fetch_one(&self.pool)
                .await?
        } else {
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1))")
                .bind(email)
                .fetch_one(&self.pool)
                .await?
        };
        Ok(exists)
    }

    async fn insert(&self, user: &User) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, first_name, last_name, email, provider_id, refresh_token)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&user.id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.provider_id)
        .bind(&user.refresh_token)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save(&self, user: &User) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET first_name = $2, last_name = $3, email = $4, provider_id = $5, refresh_token = $6
            WHERE id = $1
            "#,
        )
        .bind(&user.id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.provider_id)
        .bind(&user.refresh_token)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
