//! Reservation endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::reservation::{CreateReservation, Reservation, ReservationAggregate},
    AppState,
};

/// List all reservations
#[utoipa::path(
    get,
    path = "/reservations",
    tag = "reservations",
    responses(
        (status = 200, description = "All reservations", body = Vec<Reservation>)
    )
)]
pub async fn list_reservations(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Reservation>>> {
    let reservations = state.services.reservations.get_reservations().await?;
    Ok(Json(reservations))
}

/// Get a reservation
#[utoipa::path(
    get,
    path = "/reservations/{id}",
    tag = "reservations",
    params(
        ("id" = String, Path, description = "Reservation ID")
    ),
    responses(
        (status = 200, description = "Reservation", body = Reservation),
        (status = 404, description = "Reservation not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_reservation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Reservation>> {
    let reservation = state.services.reservations.get_reservation(&id).await?;
    Ok(Json(reservation))
}

/// Reserve an available book for a user
#[utoipa::path(
    post,
    path = "/reservations",
    tag = "reservations",
    request_body = CreateReservation,
    responses(
        (status = 201, description = "Reservation created", body = Reservation),
        (status = 400, description = "Missing book or user id", body = crate::error::ErrorResponse),
        (status = 404, description = "User or book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Book is not available", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_reservation(
    State(state): State<AppState>,
    Json(request): Json<CreateReservation>,
) -> AppResult<(StatusCode, Json<Reservation>)> {
    let reservation = state.services.reservations.add_reservation(request).await?;
    Ok((StatusCode::CREATED, Json(reservation)))
}

/// Return the reserved book
#[utoipa::path(
    patch,
    path = "/reservations/{id}/return",
    tag = "reservations",
    params(
        ("id" = String, Path, description = "Reservation ID")
    ),
    responses(
        (status = 200, description = "Reservation ended", body = Reservation),
        (status = 404, description = "Reservation not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Reservation already returned", body = crate::error::ErrorResponse)
    )
)]
pub async fn end_reservation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Reservation>> {
    let reservation = state.services.reservations.end_reservation(&id).await?;
    Ok(Json(reservation))
}

/// Delete a reservation record
#[utoipa::path(
    delete,
    path = "/reservations/{id}",
    tag = "reservations",
    params(
        ("id" = String, Path, description = "Reservation ID")
    ),
    responses(
        (status = 204, description = "Reservation deleted"),
        (status = 404, description = "Reservation not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_reservation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.services.reservations.delete_reservation(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Reservations of a user with book details
#[utoipa::path(
    get,
    path = "/users/{id}/reservations",
    tag = "reservations",
    params(
        ("id" = String, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User's reservations", body = Vec<ReservationAggregate>),
        (status = 400, description = "Unknown user", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_user_reservations(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<Vec<ReservationAggregate>>> {
    let reservations = state.services.reservations.get_user_reservations(&user_id).await?;
    Ok(Json(reservations))
}

/// Active reservations of a user with book details
#[utoipa::path(
    get,
    path = "/users/{id}/reservations/active",
    tag = "reservations",
    params(
        ("id" = String, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User's active reservations", body = Vec<ReservationAggregate>),
        (status = 400, description = "Unknown user", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_active_user_reservations(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<Vec<ReservationAggregate>>> {
    let reservations = state
        .services
        .reservations
        .get_active_user_reservations(&user_id)
        .await?;
    Ok(Json(reservations))
}

/// Latest reservation of a book by a user
#[utoipa::path(
    get,
    path = "/users/{id}/reservations/books/{book_id}",
    tag = "reservations",
    params(
        ("id" = String, Path, description = "User ID"),
        ("book_id" = String, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Reservation with book details", body = ReservationAggregate),
        (status = 400, description = "Unknown user", body = crate::error::ErrorResponse),
        (status = 404, description = "No reservation for this book", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_user_reservation(
    State(state): State<AppState>,
    Path((user_id, book_id)): Path<(String, String)>,
) -> AppResult<Json<ReservationAggregate>> {
    let reservation = state
        .services
        .reservations
        .get_user_reservation(&user_id, &book_id)
        .await?;
    Ok(Json(reservation))
}
