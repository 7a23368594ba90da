//! API handlers for the library reservation REST endpoints

pub mod auth;
pub mod books;
pub mod health;
pub mod openapi;
pub mod reservations;
pub mod users;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    routing::{get, patch, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{error::AppError, AppState};

/// Raw `Authorization` header value of the request
pub struct BearerHeader(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for BearerHeader {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Forbidden("Missing authorization header".to_string()))?;

        Ok(BearerHeader(header.to_string()))
    }
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Authentication
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        // Users
        .route("/users", post(users::create_user))
        .route(
            "/users/:id",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        .route("/users/:id/reservations", get(reservations::get_user_reservations))
        .route(
            "/users/:id/reservations/active",
            get(reservations::get_active_user_reservations),
        )
        .route(
            "/users/:id/reservations/books/:book_id",
            get(reservations::get_user_reservation),
        )
        // Books
        .route("/books", get(books::list_books).post(books::create_book))
        .route("/books/available", get(books::list_available_books))
        .route(
            "/books/:id",
            get(books::get_book)
                .patch(books::update_book)
                .delete(books::delete_book),
        )
        // Reservations
        .route(
            "/reservations",
            get(reservations::list_reservations).post(reservations::create_reservation),
        )
        .route(
            "/reservations/:id",
            get(reservations::get_reservation).delete(reservations::delete_reservation),
        )
        .route("/reservations/:id/return", patch(reservations::end_reservation))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
