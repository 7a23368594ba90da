//! Business logic services

pub mod books;
pub mod identity;
pub mod reservations;
pub mod token_cache;
pub mod users;

use std::sync::Arc;

use crate::repository::Repository;

use identity::{IdentityProvider, IdentityService};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub identity: IdentityService,
    pub books: books::BooksService,
    pub users: users::UsersService,
    pub reservations: reservations::ReservationsService,
}

impl Services {
    /// Create all services over one repository and one identity provider
    pub fn new(
        repository: Repository,
        provider: Arc<dyn IdentityProvider>,
        claim_namespace: impl Into<String>,
    ) -> Self {
        let identity = IdentityService::new(provider, claim_namespace);
        let reservations = reservations::ReservationsService::new(repository.clone());

        Self {
            books: books::BooksService::new(repository.clone(), reservations.clone()),
            users: users::UsersService::new(repository, identity.clone()),
            reservations,
            identity,
        }
    }
}
