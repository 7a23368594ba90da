//! User model and related types

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::patch::{normalize, Patch};

/// Local user profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// Account id at the external identity provider
    pub provider_id: Option<String>,
    /// Last refresh token issued at login, never sent to clients
    #[serde(skip_serializing, default)]
    pub refresh_token: Option<String>,
}

/// Create user request
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct CreateUser {
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Update user request. Blank fields leave the stored value unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateUser {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
}

impl Patch for UpdateUser {
    fn normalized(self) -> Self {
        Self {
            first_name: normalize(self.first_name),
            last_name: normalize(self.last_name),
            email: normalize(self.email),
        }
    }

    fn is_empty(&self) -> bool {
        self.first_name.is_none() && self.last_name.is_none() && self.email.is_none()
    }
}

impl UpdateUser {
    /// Apply an already normalized update onto a stored user
    pub fn apply_to(&self, user: &mut User) {
        if let Some(ref first_name) = self.first_name {
            user.first_name = first_name.clone();
        }
        if let Some(ref last_name) = self.last_name {
            user.last_name = last_name.clone();
        }
        if let Some(ref email) = self.email {
            user.email = email.clone();
        }
    }
}
