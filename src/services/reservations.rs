//! Reservation lifecycle service.
//!
//! A reservation is created active, ends once when the book is returned, and
//! may be deleted in either state. This service is the only writer of a
//! book's availability flag.

use chrono::Utc;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::Book,
        patch::provided,
        reservation::{CreateReservation, Reservation, ReservationAggregate},
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct ReservationsService {
    repository: Repository,
}

impl ReservationsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Get a reservation by ID
    pub async fn get_reservation(&self, id: &str) -> AppResult<Reservation> {
        self.repository
            .reservations
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Reservation with id {} not found", id)))
    }

    pub async fn get_reservations(&self) -> AppResult<Vec<Reservation>> {
        self.repository.reservations.list().await
    }

    /// Reserve an available book for a user.
    ///
    /// The availability flip is a single conditional write, so two concurrent
    /// requests for the same book cannot both succeed.
    pub async fn add_reservation(&self, request: CreateReservation) -> AppResult<Reservation> {
        let (Some(book_id), Some(user_id)) = (
            provided(request.book_id.as_deref()),
            provided(request.user_id.as_deref()),
        ) else {
            return Err(AppError::Validation("Book id and user id are required".to_string()));
        };

        if !self.repository.users.exists(user_id).await? {
            return Err(AppError::NotFound(format!("User with id {} not found", user_id)));
        }
        if !self.repository.books.exists(book_id).await? {
            return Err(AppError::NotFound(format!("Book with id {} not found", book_id)));
        }
        if !self.repository.books.try_reserve(book_id).await? {
            return Err(AppError::Conflict(format!("Book {} is not available", book_id)));
        }

        let reservation = Reservation::new(book_id, user_id, Utc::now());
        if let Err(e) = self.repository.reservations.save(&reservation).await {
            // The book stays unavailable; nothing is rolled back
            tracing::error!(
                "Book {} marked unavailable but reservation {} was not saved",
                book_id,
                reservation.id
            );
            return Err(e);
        }

        tracing::info!(
            "Reservation {} created: book {} for user {} until {}",
            reservation.id,
            book_id,
            user_id,
            reservation.end_date
        );
        Ok(reservation)
    }

    /// Return the book of an active reservation.
    ///
    /// The returned date is stamped with a conditional write before the book
    /// is released, so a reservation can only be ended once.
    pub async fn end_reservation(&self, id: &str) -> AppResult<Reservation> {
        let reservation = self.get_reservation(id).await?;
        if !reservation.is_active() {
            return Err(AppError::Conflict(format!("Reservation {} already returned", id)));
        }
        if !self.repository.books.exists(&reservation.book_id).await? {
            return Err(AppError::NotFound(format!(
                "Book with id {} not found",
                reservation.book_id
            )));
        }

        let returned_at = Utc::now();
        if !self.repository.reservations.mark_returned(id, returned_at).await? {
            return Err(AppError::Conflict(format!("Reservation {} already returned", id)));
        }

        if !self.repository.books.set_available(&reservation.book_id, true).await? {
            tracing::error!(
                "Reservation {} returned but book {} disappeared before release",
                id,
                reservation.book_id
            );
        }

        tracing::info!("Reservation {} ended", id);
        Ok(Reservation {
            returned_date: Some(returned_at),
            ..reservation
        })
    }

    /// Delete a reservation record. Availability is left as is.
    pub async fn delete_reservation(&self, id: &str) -> AppResult<()> {
        if !self.repository.reservations.exists(id).await? {
            return Err(AppError::NotFound(format!("Reservation with id {} not found", id)));
        }
        self.repository.reservations.delete(id).await?;
        Ok(())
    }

    /// Delete every reservation of a book
    pub async fn delete_reservations_by_book_id(&self, book_id: &str) -> AppResult<u64> {
        if provided(Some(book_id)).is_none() {
            return Err(AppError::Validation("Book id is required".to_string()));
        }
        self.repository.reservations.delete_by_book(book_id).await
    }

    /// All reservations of a user, joined with their books
    pub async fn get_user_reservations(&self, user_id: &str) -> AppResult<Vec<ReservationAggregate>> {
        self.ensure_user(user_id).await?;
        let reservations = self.repository.reservations.list_by_user(user_id).await?;
        self.aggregate(reservations).await
    }

    /// Active reservations of a user, joined with their books
    pub async fn get_active_user_reservations(
        &self,
        user_id: &str,
    ) -> AppResult<Vec<ReservationAggregate>> {
        self.ensure_user(user_id).await?;
        let reservations = self.repository.reservations.list_active_by_user(user_id).await?;
        self.aggregate(reservations).await
    }

    /// Latest reservation of a given book by a user
    pub async fn get_user_reservation(
        &self,
        user_id: &str,
        book_id: &str,
    ) -> AppResult<ReservationAggregate> {
        self.ensure_user(user_id).await?;
        let reservation = self
            .repository
            .reservations
            .find_latest_by_user_and_book(user_id, book_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "No reservation of book {} by user {}",
                    book_id, user_id
                ))
            })?;
        let book = self.book_for(&reservation).await?;
        Ok(ReservationAggregate::from_parts(&reservation, &book))
    }

    async fn ensure_user(&self, user_id: &str) -> AppResult<()> {
        if self.repository.users.exists(user_id).await? {
            Ok(())
        } else {
            Err(AppError::Validation(format!("Unknown user {}", user_id)))
        }
    }

    async fn book_for(&self, reservation: &Reservation) -> AppResult<Book> {
        self.repository
            .books
            .get_by_id(&reservation.book_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Book with id {} not found", reservation.book_id))
            })
    }

    async fn aggregate(&self, reservations: Vec<Reservation>) -> AppResult<Vec<ReservationAggregate>> {
        let mut aggregates = Vec::with_capacity(reservations.len());
        for reservation in &reservations {
            let book = self.book_for(reservation).await?;
            aggregates.push(ReservationAggregate::from_parts(reservation, &book));
        }
        Ok(aggregates)
    }
}
