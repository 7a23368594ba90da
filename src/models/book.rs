//! Book model and related types

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::patch::{normalize, Patch};

/// Book record as stored and returned to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: String,
    pub title: String,
    pub author: String,
    pub description: String,
    /// False while an active reservation references the book
    pub available: bool,
}

/// Create book request
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CreateBook {
    pub title: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
}

/// Update book request. Blank fields leave the stored value unchanged.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateBook {
    pub title: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
}

impl Patch for UpdateBook {
    fn normalized(self) -> Self {
        Self {
            title: normalize(self.title),
            author: normalize(self.author),
            description: normalize(self.description),
        }
    }

    fn is_empty(&self) -> bool {
        self.title.is_none() && self.author.is_none() && self.description.is_none()
    }
}

impl UpdateBook {
    /// Apply an already normalized update onto a stored book
    pub fn apply_to(&self, book: &mut Book) {
        if let Some(ref title) = self.title {
            book.title = title.clone();
        }
        if let Some(ref author) = self.author {
            book.author = author.clone();
        }
        if let Some(ref description) = self.description {
            book.description = description.clone();
        }
    }
}
