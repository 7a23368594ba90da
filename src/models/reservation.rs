//! Reservation model and related types

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::book::Book;

/// Fixed reservation length
pub const RESERVATION_DAYS: i64 = 7;

/// Reservation record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Reservation {
    pub id: String,
    pub book_id: String,
    pub user_id: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    /// Set once the book is returned; `None` while the reservation is active
    pub returned_date: Option<DateTime<Utc>>,
}

impl Reservation {
    /// Start a new reservation at `now`
    pub fn new(book_id: &str, user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            book_id: book_id.to_string(),
            user_id: user_id.to_string(),
            start_date: now,
            end_date: now + Duration::days(RESERVATION_DAYS),
            returned_date: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.returned_date.is_none()
    }
}

/// Create reservation request
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CreateReservation {
    pub book_id: Option<String>,
    pub user_id: Option<String>,
}

/// Reservation joined with its book, for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ReservationAggregate {
    pub reservation_id: String,
    pub user_id: String,
    pub book_id: String,
    pub title: String,
    pub author: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
}

impl ReservationAggregate {
    pub fn from_parts(reservation: &Reservation, book: &Book) -> Self {
        Self {
            reservation_id: reservation.id.clone(),
            user_id: reservation.user_id.clone(),
            book_id: book.id.clone(),
            title: book.title.clone(),
            author: book.author.clone(),
            start_date: reservation.start_date,
            end_date: reservation.end_date,
            is_active: reservation.is_active(),
        }
    }
}
