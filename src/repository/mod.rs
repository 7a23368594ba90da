//! Repository layer for persistence

pub mod books;
pub mod memory;
pub mod reservations;
pub mod users;

use std::sync::Arc;

use sqlx::{Pool, Postgres};

pub use books::BooksStore;
pub use reservations::ReservationsStore;
pub use users::UsersStore;

/// Main repository struct holding one store per collection
#[derive(Clone)]
pub struct Repository {
    pub books: Arc<dyn BooksStore>,
    pub users: Arc<dyn UsersStore>,
    pub reservations: Arc<dyn ReservationsStore>,
}

impl Repository {
    /// Create a repository backed by the given database pool
    pub fn postgres(pool: Pool<Postgres>) -> Self {
        Self {
            books: Arc::new(books::PgBooksRepository::new(pool.clone())),
            users: Arc::new(users::PgUsersRepository::new(pool.clone())),
            reservations: Arc::new(reservations::PgReservationsRepository::new(pool)),
        }
    }

    /// Create a repository backed by a fresh in-memory store
    pub fn in_memory() -> Self {
        let store = Arc::new(memory::MemoryStore::new());
        Self {
            books: store.clone(),
            users: store.clone(),
            reservations: store,
        }
    }
}
