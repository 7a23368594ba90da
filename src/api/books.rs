//! Book catalog endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::book::{Book, CreateBook, UpdateBook},
    AppState,
};

/// List all books
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    responses(
        (status = 200, description = "All books", body = Vec<Book>)
    )
)]
pub async fn list_books(State(state): State<AppState>) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.books.get_books().await?;
    Ok(Json(books))
}

/// List books that can be reserved right now
#[utoipa::path(
    get,
    path = "/books/available",
    tag = "books",
    responses(
        (status = 200, description = "Available books", body = Vec<Book>)
    )
)]
pub async fn list_available_books(State(state): State<AppState>) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.books.get_available_books().await?;
    Ok(Json(books))
}

/// Get book details
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = String, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Book>> {
    let book = state.services.books.get_book(&id).await?;
    Ok(Json(book))
}

/// Add a book to the catalog
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 400, description = "Missing fields", body = crate::error::ErrorResponse),
        (status = 409, description = "Same title and author already exist", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_book(
    State(state): State<AppState>,
    Json(book): Json<CreateBook>,
) -> AppResult<(StatusCode, Json<Book>)> {
    let created = state.services.books.add_book(book).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update a book; blank fields keep their value
#[utoipa::path(
    patch,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = String, Path, description = "Book ID")
    ),
    request_body = UpdateBook,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<UpdateBook>,
) -> AppResult<Json<Book>> {
    let book = state.services.books.update_book(&id, update).await?;
    Ok(Json(book))
}

/// Delete a book and its reservations
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = String, Path, description = "Book ID")
    ),
    responses(
        (status = 204, description = "Book deleted"),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.services.books.delete_book(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
