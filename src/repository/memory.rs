//! In-memory store backing all three collections.
//!
//! Each call takes the collection lock once, so single-record writes are
//! atomic; nothing spans collections. Used for local runs without Postgres
//! and as the persistence double in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tokio::sync::RwLock;

use crate::{
    error::AppResult,
    models::{book::Book, reservation::Reservation, user::User},
};

use super::{books::BooksStore, reservations::ReservationsStore, users::UsersStore};

#[derive(Default)]
pub struct MemoryStore {
    books: RwLock<IndexMap<String, Book>>,
    users: RwLock<IndexMap<String, User>>,
    reservations: RwLock<IndexMap<String, Reservation>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted_books(mut books: Vec<Book>) -> Vec<Book> {
    books.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.author.cmp(&b.author)));
    books
}

fn sorted_reservations(mut reservations: Vec<Reservation>) -> Vec<Reservation> {
    reservations.sort_by_key(|r| r.start_date);
    reservations
}

#[async_trait]
impl BooksStore for MemoryStore {
    async fn get_by_id(&self, id: &str) -> AppResult<Option<Book>> {
        Ok(self.books.read().await.get(id).cloned())
    }

    async fn list(&self) -> AppResult<Vec<Book>> {
        let books = self.books.read().await.values().cloned().collect();
        Ok(sorted_books(books))
    }

    async fn list_by_availability(&self, available: bool) -> AppResult<Vec<Book>> {
        let books = self
            .books
            .read()
            .await
            .values()
            .filter(|b| b.available == available)
            .cloned()
            .collect();
        Ok(sorted_books(books))
    }

    async fn find_by_author_and_title(&self, author: &str, title: &str) -> AppResult<Option<Book>> {
        Ok(self
            .books
            .read()
            .await
            .values()
            .find(|b| b.author == author && b.title == title)
            .cloned())
    }

    async fn exists(&self, id: &str) -> AppResult<bool> {
        Ok(self.books.read().await.contains_key(id))
    }

    async fn insert(&self, book: &Book) -> AppResult<()> {
        self.books.write().await.insert(book.id.clone(), book.clone());
        Ok(())
    }

    async fn save(&self, book: &Book) -> AppResult<()> {
        if let Some(stored) = self.books.write().await.get_mut(&book.id) {
            stored.title = book.title.clone();
            stored.author = book.author.clone();
            stored.description = book.description.clone();
        }
        Ok(())
    }

    async fn set_available(&self, id: &str, available: bool) -> AppResult<bool> {
        match self.books.write().await.get_mut(id) {
            Some(book) => {
                book.available = available;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn try_reserve(&self, id: &str) -> AppResult<bool> {
        match self.books.write().await.get_mut(id) {
            Some(book) if book.available => {
                book.available = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, id: &str) -> AppResult<bool> {
        Ok(self.books.write().await.shift_remove(id).is_some())
    }
}

#[async_trait]
impl UsersStore for MemoryStore {
    async fn get_by_id(&self, id: &str) -> AppResult<Option<User>> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn exists(&self, id: &str) -> AppResult<bool> {
        Ok(self.users.read().await.contains_key(id))
    }

    async fn email_exists(&self, email: &str, exclude_id: Option<&str>) -> AppResult<bool> {
        Ok(self.users.read().await.values().any(|u| {
            u.email.eq_ignore_ascii_case(email) && Some(u.id.as_str()) != exclude_id
        }))
    }

    async fn insert(&self, user: &User) -> AppResult<()> {
        self.users.write().await.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn save(&self, user: &User) -> AppResult<()> {
        if let Some(stored) = self.users.write().await.get_mut(&user.id) {
            *stored = user.clone();
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> AppResult<bool> {
        Ok(self.users.write().await.shift_remove(id).is_some())
    }
}

#[async_trait]
impl ReservationsStore for MemoryStore {
    async fn get_by_id(&self, id: &str) -> AppResult<Option<Reservation>> {
        Ok(self.reservations.read().await.get(id).cloned())
    }

    async fn list(&self) -> AppResult<Vec<Reservation>> {
        let reservations = self.reservations.read().await.values().cloned().collect();
        Ok(sorted_reservations(reservations))
    }

    async fn list_by_user(&self, user_id: &str) -> AppResult<Vec<Reservation>> {
        let reservations = self
            .reservations
            .read()
            .await
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        Ok(sorted_reservations(reservations))
    }

    async fn list_active_by_user(&self, user_id: &str) -> AppResult<Vec<Reservation>> {
        let reservations = self
            .reservations
            .read()
            .await
            .values()
            .filter(|r| r.user_id == user_id && r.is_active())
            .cloned()
            .collect();
        Ok(sorted_reservations(reservations))
    }

    async fn find_latest_by_user_and_book(
        &self,
        user_id: &str,
        book_id: &str,
    ) -> AppResult<Option<Reservation>> {
        Ok(self
            .reservations
            .read()
            .await
            .values()
            .filter(|r| r.user_id == user_id && r.book_id == book_id)
            .max_by_key(|r| r.start_date)
            .cloned())
    }

    async fn exists(&self, id: &str) -> AppResult<bool> {
        Ok(self.reservations.read().await.contains_key(id))
    }

    async fn save(&self, reservation: &Reservation) -> AppResult<()> {
        self.reservations
            .write()
            .await
            .insert(reservation.id.clone(), reservation.clone());
        Ok(())
    }

    async fn mark_returned(&self, id: &str, returned_at: DateTime<Utc>) -> AppResult<bool> {
        match self.reservations.write().await.get_mut(id) {
            Some(reservation) if reservation.is_active() => {
                reservation.returned_date = Some(returned_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, id: &str) -> AppResult<bool> {
        Ok(self.reservations.write().await.shift_remove(id).is_some())
    }

    async fn delete_by_book(&self, book_id: &str) -> AppResult<u64> {
        let mut reservations = self.reservations.write().await;
        let before = reservations.len();
        reservations.retain(|_, r| r.book_id != book_id);
        Ok((before - reservations.len()) as u64)
    }
}
