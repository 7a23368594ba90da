//! Books repository for database operations

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::book::Book,
};

/// Map a `UNIQUE (author, title)` violation to a conflict
fn author_title_conflict(e: sqlx::Error) -> AppError {
    if e.as_database_error().is_some_and(|db| db.is_unique_violation()) {
        AppError::Conflict("Title and author already exist".to_string())
    } else {
        AppError::Database(e)
    }
}

/// Book collection access
#[async_trait]
pub trait BooksStore: Send + Sync {
    async fn get_by_id(&self, id: &str) -> AppResult<Option<Book>>;

    async fn list(&self) -> AppResult<Vec<Book>>;

    async fn list_by_availability(&self, available: bool) -> AppResult<Vec<Book>>;

    async fn find_by_author_and_title(&self, author: &str, title: &str) -> AppResult<Option<Book>>;

    async fn exists(&self, id: &str) -> AppResult<bool>;

    async fn insert(&self, book: &Book) -> AppResult<()>;

    /// Overwrite title, author and description of an existing book
    async fn save(&self, book: &Book) -> AppResult<()>;

    /// Unconditionally set the availability flag. Returns false if the book is missing.
    async fn set_available(&self, id: &str, available: bool) -> AppResult<bool>;

    /// Flip availability from true to false in a single write.
    /// Returns false when the book was missing or already unavailable.
    async fn try_reserve(&self, id: &str) -> AppResult<bool>;

    async fn delete(&self, id: &str) -> AppResult<bool>;
}

#[derive(Clone)]
pub struct PgBooksRepository {
    pool: Pool<Postgres>,
}

impl PgBooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BooksStore for PgBooksRepository {
    async fn get_by_id(&self, id: &str) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(book)
    }

    async fn list(&self) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>("SELECT * FROM books ORDER BY title, author")
            .fetch_all(&self.pool)
            .await?;
        Ok(books)
    }

    async fn list_by_availability(&self, available: bool) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(
            "SELECT * FROM books WHERE available = $1 ORDER BY title, author",
        )
        .bind(available)
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }

    async fn find_by_author_and_title(&self, author: &str, title: &str) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(
            "SELECT * FROM books WHERE author = $1 AND title = $2",
        )
        .bind(author)
        .bind(title)
        .fetch_optional(&self.pool)
        .await?;
        Ok(book)
    }

    async fn exists(&self, id: &str) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn insert(&self, book: &Book) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO books (id, title, author, description, available)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&book.id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.description)
        .bind(book.available)
        .execute(&self.pool)
        .await
        .map_err(author_title_conflict)?;
        Ok(())
    }

    async fn save(&self, book: &Book) -> AppResult<()> {
        // Availability is owned by the reservation lifecycle and never written here
        sqlx::query(
            r#"
            UPDATE books SET title = $2, author = $3, description = $4
            WHERE id = $1
            "#,
        )
        .bind(&book.id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.description)
        .execute(&self.pool)
        .await
        .map_err(author_title_conflict)?;
        Ok(())
    }

    async fn set_available(&self, id: &str, available: bool) -> AppResult<bool> {
        let result = sqlx::query("UPDATE books SET available = $2 WHERE id = $1")
            .bind(id)
            .bind(available)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn try_reserve(&self, id: &str) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE books SET available = FALSE WHERE id = $1 AND available = TRUE",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
