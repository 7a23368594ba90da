//! Data models for the reservation server

pub mod auth;
pub mod book;
pub mod patch;
pub mod reservation;
pub mod user;

// Re-export commonly used types
pub use auth::{AuthTokens, LoginRequest, Role};
pub use book::Book;
pub use patch::Patch;
pub use reservation::{Reservation, ReservationAggregate};
pub use user::User;
