//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{auth, books, health, reservations, users};

/// Registers the bearer scheme referenced by the session endpoints
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Library Reservation API",
        version = "1.0.0",
        description = "Book reservations for library users, with accounts held by an external identity provider",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    modifiers(&SecurityAddon),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::login,
        auth::logout,
        auth::me,
        // Users
        users::get_user,
        users::create_user,
        users::update_user,
        users::delete_user,
        // Books
        books::list_books,
        books::list_available_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        // Reservations
        reservations::list_reservations,
        reservations::get_reservation,
        reservations::create_reservation,
        reservations::end_reservation,
        reservations::delete_reservation,
        reservations::get_user_reservations,
        reservations::get_active_user_reservations,
        reservations::get_user_reservation,
    ),
    components(
        schemas(
            // Auth
            crate::models::auth::LoginRequest,
            crate::models::auth::AuthTokens,
            // Users
            crate::models::user::User,
            crate::models::user::CreateUser,
            crate::models::user::UpdateUser,
            // Books
            crate::models::book::Book,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            // Reservations
            crate::models::reservation::Reservation,
            crate::models::reservation::CreateReservation,
            crate::models::reservation::ReservationAggregate,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Login and logout through the identity provider"),
        (name = "users", description = "User management"),
        (name = "books", description = "Book catalog"),
        (name = "reservations", description = "Book reservations")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
