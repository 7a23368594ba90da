//! Book catalog service

use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, CreateBook, UpdateBook},
        patch::{provided, Patch},
    },
    repository::Repository,
};

use super::reservations::ReservationsService;

#[derive(Clone)]
pub struct BooksService {
    repository: Repository,
    reservations: ReservationsService,
}

impl BooksService {
    pub fn new(repository: Repository, reservations: ReservationsService) -> Self {
        Self {
            repository,
            reservations,
        }
    }

    /// Get a book by ID
    pub async fn get_book(&self, id: &str) -> AppResult<Book> {
        self.repository
            .books
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    pub async fn get_books(&self) -> AppResult<Vec<Book>> {
        self.repository.books.list().await
    }

    /// Books not tied to an active reservation
    pub async fn get_available_books(&self) -> AppResult<Vec<Book>> {
        self.repository.books.list_by_availability(true).await
    }

    /// Cheap round trip to the book store
    pub async fn ping(&self) -> AppResult<()> {
        self.repository.books.exists("").await?;
        Ok(())
    }

    /// Add a book to the catalog. New books are always available.
    pub async fn add_book(&self, book: CreateBook) -> AppResult<Book> {
        let (Some(title), Some(author), Some(description)) = (
            provided(book.title.as_deref()),
            provided(book.author.as_deref()),
            provided(book.description.as_deref()),
        ) else {
            return Err(AppError::Validation(
                "Title, author and description are required".to_string(),
            ));
        };

        if self
            .repository
            .books
            .find_by_author_and_title(author, title)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict("Title and author already exist".to_string()));
        }

        let book = Book {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            author: author.to_string(),
            description: description.to_string(),
            available: true,
        };
        self.repository.books.insert(&book).await?;

        tracing::info!("Added book {} ({} by {})", book.id, book.title, book.author);
        Ok(book)
    }

    /// Update the non-blank fields of a book
    pub async fn update_book(&self, id: &str, update: UpdateBook) -> AppResult<Book> {
        let mut book = self.get_book(id).await?;
        let update = update.normalized();
        if update.is_empty() {
            return Ok(book);
        }

        let (previous_title, previous_author) = (book.title.clone(), book.author.clone());
        update.apply_to(&mut book);

        if book.title != previous_title || book.author != previous_author {
            let taken = self
                .repository
                .books
                .find_by_author_and_title(&book.author, &book.title)
                .await?
                .is_some_and(|other| other.id != book.id);
            if taken {
                return Err(AppError::Conflict("Title and author already exist".to_string()));
            }
        }

        self.repository.books.save(&book).await?;
        Ok(book)
    }

    /// Delete a book together with every reservation that references it
    pub async fn delete_book(&self, id: &str) -> AppResult<()> {
        if !self.repository.books.exists(id).await? {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }

        let removed = self.reservations.delete_reservations_by_book_id(id).await?;
        self.repository.books.delete(id).await?;

        tracing::info!("Deleted book {} and {} reservation(s)", id, removed);
        Ok(())
    }
}
