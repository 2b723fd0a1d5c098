//! Conversation records and per-participant read state

use crate::storage::payload::ParticipantIds;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Marketplace role of a participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    /// Buyer, renter or other plain user
    User,
    /// Individual agent
    Agent,
    /// Agency account
    Agency,
    /// Marketplace administrator
    Admin,
}

impl ParticipantRole {
    /// Parse a persisted role string; unknown values map to `User`
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "user" => Self::User,
            "agent" => Self::Agent,
            "agency" => Self::Agency,
            "admin" => Self::Admin,
            other => {
                tracing::warn!("Unknown participant role '{}', treating as user", other);
                Self::User
            }
        }
    }

    /// Persisted form
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Agent => "agent",
            Self::Agency => "agency",
            Self::Admin => "admin",
        }
    }

    /// Whether this is a professional (agent or agency) account
    pub fn is_professional(&self) -> bool {
        matches!(self, Self::Agent | Self::Agency)
    }

    /// Roles this role starts conversations with
    pub fn counterpart_roles(&self) -> Vec<ParticipantRole> {
        match self {
            Self::User => vec![Self::Agent, Self::Agency],
            Self::Agent | Self::Agency => vec![Self::User],
            Self::Admin => vec![Self::User, Self::Agent, Self::Agency, Self::Admin],
        }
    }
}

/// Kind of conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationType {
    /// Question about a specific listing
    Inquiry,
    /// Free-form conversation
    General,
    /// Conversation with marketplace support
    Support,
}

impl ConversationType {
    /// Parse a persisted type string; unknown values map to `General`
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "inquiry" => Self::Inquiry,
            "general" => Self::General,
            "support" => Self::Support,
            other => {
                tracing::warn!("Unknown conversation type '{}', treating as general", other);
                Self::General
            }
        }
    }

    /// Persisted form
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inquiry => "inquiry",
            Self::General => "general",
            Self::Support => "support",
        }
    }
}

/// Listing a conversation is about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyRef {
    /// Property id in the listing directory
    pub id: String,
    /// Listing title at the time the conversation started
    pub title: String,
}

/// Represents a conversation between marketplace participants
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    /// Conversation ID
    pub id: String,
    /// Participant who created the conversation
    pub initiator_id: String,
    /// Display name of the initiator when the conversation was created
    pub initiator_name: String,
    /// Role of the initiator
    pub initiator_role: ParticipantRole,
    /// Ordered participant ids (initiator first)
    pub participant_ids: ParticipantIds,
    /// Conversation kind
    pub kind: ConversationType,
    /// Optional subject line
    pub subject: Option<String>,
    /// Listing the conversation is about
    pub property_ref: Option<PropertyRef>,
    /// Preview of the most recent message
    pub last_message_preview: String,
    /// Time of the most recent message
    pub last_message_at: DateTime<Utc>,
    /// Sender of the most recent message
    pub last_message_sender_id: String,
    /// Unread count per participant id
    pub unread: BTreeMap<String, u32>,
    /// Pinned by the user
    pub is_starred: bool,
    /// Notifications suppressed
    pub is_muted: bool,
    /// Hidden from the default list
    pub is_archived: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a conversation with zeroed read state
    pub fn new(
        id: String,
        initiator_id: String,
        initiator_name: String,
        initiator_role: ParticipantRole,
        participant_ids: ParticipantIds,
        kind: ConversationType,
        created_at: DateTime<Utc>,
    ) -> Self {
        let unread = participant_ids.iter().map(|p| (p.to_string(), 0)).collect();
        Self {
            id,
            last_message_sender_id: initiator_id.clone(),
            initiator_id,
            initiator_name,
            initiator_role,
            participant_ids,
            kind,
            subject: None,
            property_ref: None,
            last_message_preview: String::new(),
            last_message_at: created_at,
            unread,
            is_starred: false,
            is_muted: false,
            is_archived: false,
            created_at,
        }
    }

    /// Whether `participant_id` created this conversation
    pub fn is_initiator(&self, participant_id: &str) -> bool {
        self.initiator_id == participant_id
    }

    /// Unread count for one participant
    pub fn unread_for(&self, participant_id: &str) -> u32 {
        self.unread.get(participant_id).copied().unwrap_or(0)
    }

    /// Unread count of the initiator
    pub fn unread_for_initiator(&self) -> u32 {
        self.unread_for(&self.initiator_id)
    }

    /// Unread count of the first non-initiator participant
    pub fn unread_for_other_party(&self) -> u32 {
        self.participant_ids
            .other_than(&self.initiator_id)
            .map(|other| self.unread_for(other))
            .unwrap_or(0)
    }

    /// Apply the bookkeeping of a newly appended message
    ///
    /// Every participant except the sender gets one more unread message.
    /// Without a readable participant list the recipients fall back to the
    /// initiator, or to the other participants already tracked in `unread`
    /// when the initiator sends.
    pub fn record_message(&mut self, sender_id: &str, preview: String, at: DateTime<Utc>) {
        let recipients = self.recipients_of(sender_id);
        if recipients.is_empty() {
            tracing::warn!(
                "Conversation {} has no known recipient for {}, unread counters left untouched",
                self.id,
                sender_id
            );
        }
        for recipient in recipients {
            *self.unread.entry(recipient).or_insert(0) += 1;
        }

        self.last_message_preview = preview;
        self.last_message_at = at;
        self.last_message_sender_id = sender_id.to_string();
    }

    fn recipients_of(&self, sender_id: &str) -> Vec<String> {
        if !self.participant_ids.is_empty() {
            return self
                .participant_ids
                .iter()
                .filter(|p| *p != sender_id)
                .map(str::to_string)
                .collect();
        }

        if sender_id != self.initiator_id {
            return vec![self.initiator_id.clone()];
        }
        self.unread
            .keys()
            .filter(|p| *p != sender_id)
            .cloned()
            .collect()
    }

    /// Reset the viewer's unread counter
    ///
    /// Returns true if the counter was non-zero.
    pub fn mark_read_by(&mut self, viewer_id: &str) -> bool {
        match self.unread.get_mut(viewer_id) {
            Some(count) if *count > 0 => {
                *count = 0;
                true
            }
            _ => false,
        }
    }
}
