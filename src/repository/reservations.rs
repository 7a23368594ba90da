//! Reservations repository for database operations

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use chrono::{DateTime, Utc};

use crate::{error::AppResult, models::reservation::Reservation};

/// Reservation collection access
#[async_trait]
pub trait ReservationsStore: Send + Sync {
    async fn get_by_id(&self, id: &str) -> AppResult<Option<Reservation>>;

    async fn list(&self) -> AppResult<Vec<Reservation>>;

    async fn list_by_user(&self, user_id: &str) -> AppResult<Vec<Reservation>>;

    /// Reservations of a user that have not been returned yet
    async fn list_active_by_user(&self, user_id: &str) -> AppResult<Vec<Reservation>>;

    /// Most recent reservation of a book by a user
    async fn find_latest_by_user_and_book(
        &self,
        user_id: &str,
        book_id: &str,
    ) -> AppResult<Option<Reservation>>;

    async fn exists(&self, id: &str) -> AppResult<bool>;

    /// Insert or replace a reservation
    async fn save(&self, reservation: &Reservation) -> AppResult<()>;

    /// Stamp the returned date of a reservation that is still active.
    /// Returns false when it is missing or was already returned.
    async fn mark_returned(&self, id: &str, returned_at: DateTime<Utc>) -> AppResult<bool>;

    async fn delete(&self, id: &str) -> AppResult<bool>;

    /// Delete every reservation of a book, returning how many were removed
    async fn delete_by_book(&self, book_id: &str) -> AppResult<u64>;
}

#[derive(Clone)]
pub struct PgReservationsRepository {
    pool: Pool<Postgres>,
}

impl PgReservationsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReservationsStore for PgReservationsRepository {
    async fn get_by_id(&self, id: &str) -> AppResult<Option<Reservation>> {
        let reservation = sqlx::query_as::<_, Reservation>("SELECT * FROM reservations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(reservation)
    }

    async fn list(&self) -> AppResult<Vec<Reservation>> {
        let reservations =
            sqlx::query_as::<_, Reservation>("SELECT * FROM reservations ORDER BY start_date")
                .fetch_all(&self.pool)
                .await?;
        Ok(reservations)
    }

    async fn list_by_user(&self, user_id: &str) -> AppResult<Vec<Reservation>> {
        let reservations = sqlx::query_as::<_, Reservation>(
            "SELECT * FROM reservations WHERE user_id = $1 ORDER BY start_date",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(reservations)
    }

    async fn list_active_by_user(&self, user_id: &str) -> AppResult<Vec<Reservation>> {
        let reservations = sqlx::query_as::<_, Reservation>(
            r#"
            SELECT * FROM reservations
            WHERE user_id = $1 AND returned_date IS NULL
            ORDER BY start_date
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(reservations)
    }

    async fn find_latest_by_user_and_book(
        &self,
        user_id: &str,
        book_id: &str,
    ) -> AppResult<Option<Reservation>> {
        let reservation = sqlx::query_as::<_, Reservation>(
            r#"
            SELECT * FROM reservations
            WHERE user_id = $1 AND book_id = $2
            ORDER BY start_date DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(reservation)
    }

    async fn exists(&self, id: &str) -> AppResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM reservations WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn mark_returned(&self, id: &str, returned_at: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE reservations SET returned_date = $2 WHERE id = $1 AND returned_date IS NULL",
        )
        .bind(id)
        .bind(returned_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn save(&self, reservation: &Reservation) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO reservations (id, book_id, user_id, start_date, end_date, returned_date)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                book_id = EXCLUDED.book_id,
                user_id = EXCLUDED.user_id,
                start_date = EXCLUDED.start_date,
                end_date = EXCLUDED.end_date,
                returned_date = EXCLUDED.returned_date
            "#,
        )
        .bind(&reservation.id)
        .bind(&reservation.book_id)
        .bind(&reservation.user_id)
        .bind(reservation.start_date)
        .bind(reservation.end_date)
        .bind(reservation.returned_date)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM reservations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_book(&self, book_id: &str) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM reservations WHERE book_id = $1")
            .bind(book_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
