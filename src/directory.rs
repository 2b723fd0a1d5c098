//! External collaborators
//!
//! Identity, recipient search and property listings are owned by the rest of
//! the application. The messaging core only reads them through these types.

use crate::storage::ParticipantRole;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The signed-in user looking at the messaging screens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewer {
    /// Participant id
    pub id: String,
    /// Display name
    pub name: String,
    /// Avatar reference
    pub avatar: Option<String>,
    /// Marketplace role
    pub role: ParticipantRole,
}

impl Viewer {
    /// Create a viewer without an avatar
    pub fn new(id: &str, name: &str, role: ParticipantRole) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            avatar: None,
            role,
        }
    }
}

/// A user returned by recipient search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientCandidate {
    /// Participant id
    pub id: String,
    /// Display name
    pub name: String,
    /// Avatar reference
    pub avatar: Option<String>,
    /// Marketplace role
    pub role: ParticipantRole,
    /// Agency or brokerage, if any
    pub company: Option<String>,
}

/// A listing owned by a recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyListing {
    /// Property id
    pub id: String,
    /// Listing title
    pub title: String,
    /// Cover image reference
    pub image: Option<String>,
}

/// Free-text search over marketplace users
#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    /// Ranked candidates matching `query` with one of `roles`, never `exclude_id`
    async fn search(
        &self,
        query: &str,
        exclude_id: &str,
        roles: &[ParticipantRole],
        limit: usize,
    ) -> Result<Vec<RecipientCandidate>>;
}

/// Listings owned by a user
#[async_trait]
pub trait PropertyDirectory: Send + Sync {
    /// Properties owned by `owner_id`
    async fn list_owned_by(&self, owner_id: &str) -> Result<Vec<PropertyListing>>;
}
