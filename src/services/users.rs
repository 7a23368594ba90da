//! User management and session service

use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        auth::{AuthTokens, LoginRequest, Role},
        patch::{provided, Patch},
        user::{CreateUser, UpdateUser, User},
    },
    repository::Repository,
};

use super::identity::IdentityService;

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    identity: IdentityService,
}

impl UsersService {
    pub fn new(repository: Repository, identity: IdentityService) -> Self {
        Self {
            repository,
            identity,
        }
    }

    /// Get a user by ID
    pub async fn get_user(&self, id: &str) -> AppResult<User> {
        self.repository
            .users
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    /// Register a user with the identity provider, then store it locally.
    ///
    /// The email is checked for uniqueness before anything is sent to the
    /// provider. A local insert failure leaves the remote account in place.
    #[tracing::instrument(skip(self, request), fields(email = ?request.email))]
    pub async fn create_user(&self, request: CreateUser) -> AppResult<User> {
        request.validate()?;

        let Some(password) = provided(request.password.as_deref()) else {
            return Err(AppError::Validation("Password is required".to_string()));
        };
        let Some(email) = provided(request.email.as_deref()) else {
            return Err(AppError::Validation("Email is required".to_string()));
        };

        if self.repository.users.email_exists(email, None).await? {
            return Err(AppError::Conflict("Email already exists".to_string()));
        }

        let mut user = User {
            id: Uuid::new_v4().to_string(),
            first_name: provided(request.first_name.as_deref()).unwrap_or_default().to_string(),
            last_name: provided(request.last_name.as_deref()).unwrap_or_default().to_string(),
            email: email.to_string(),
            provider_id: None,
            refresh_token: None,
        };

        let provider_id = self
            .identity
            .create_remote_account(&user, password, Role::User)
            .await?;
        user.provider_id = Some(provider_id);

        if let Err(e) = self.repository.users.insert(&user).await {
            tracing::error!(
                "Remote account {:?} created but local user {} was not stored",
                user.provider_id,
                user.id
            );
            return Err(e);
        }

        tracing::info!("Created user {}", user.id);
        Ok(user)
    }

    /// Update the non-blank fields of a user, remotely then locally
    pub async fn update_user(&self, id: &str, update: UpdateUser) -> AppResult<User> {
        let mut user = self.get_user(id).await?;
        let update = update.normalized();
        if update.is_empty() {
            return Ok(user);
        }
        update.validate()?;

        if let Some(ref email) = update.email {
            if self.repository.users.email_exists(email, Some(id)).await? {
                return Err(AppError::Conflict("Email already exists".to_string()));
            }
        }

        if let Some(ref provider_id) = user.provider_id {
            self.identity.update_remote_account(&update, provider_id).await?;
        }

        update.apply_to(&mut user);
        self.repository.users.save(&user).await?;
        Ok(user)
    }

    /// Delete the remote account, then the local user
    pub async fn delete_user(&self, id: &str) -> AppResult<()> {
        let user = self.get_user(id).await?;

        if let Some(ref provider_id) = user.provider_id {
            self.identity.delete_remote_account(provider_id).await?;
        }
        self.repository.users.delete(id).await?;

        tracing::info!("Deleted user {}", id);
        Ok(())
    }

    /// Log in through the provider and remember the issued refresh token
    pub async fn login(&self, request: LoginRequest) -> AppResult<AuthTokens> {
        let tokens = self.identity.login(&request).await?;

        let id_token = tokens
            .id_token
            .as_deref()
            .ok_or_else(|| AppError::Forbidden("Provider returned no id token".to_string()))?;
        let user_id = self.identity.user_id_from_token(id_token)?;

        let mut user = self.get_user(&user_id).await?;
        user.refresh_token = tokens.refresh_token.clone();
        self.repository.users.save(&user).await?;

        tracing::info!("User {} logged in", user.id);
        Ok(tokens)
    }

    /// Revoke the caller's stored refresh token, if any
    pub async fn logout(&self, authorization: &str) -> AppResult<()> {
        let mut user = self.current_user(authorization).await?;

        let Some(refresh_token) = provided(user.refresh_token.as_deref()).map(str::to_string) else {
            return Ok(());
        };

        self.identity.revoke_refresh_token(&refresh_token).await?;
        user.refresh_token = None;
        self.repository.users.save(&user).await?;

        tracing::info!("User {} logged out", user.id);
        Ok(())
    }

    /// Profile of the user identified by a bearer header
    pub async fn current_user(&self, authorization: &str) -> AppResult<User> {
        let user_id = self.identity.extract_user_id(authorization)?;
        self.get_user(&user_id).await
    }
}
