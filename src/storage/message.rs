//! Message structures and delivery status tracking

use crate::storage::payload::AttachmentRefs;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Message delivery status
///
/// Ordered: a status only ever moves forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Message stored but not yet seen by the recipient's client
    #[default]
    Sent,
    /// Message fetched by the recipient's client
    Delivered,
    /// Message viewed by the recipient
    Read,
}

impl MessageStatus {
    /// Parse a persisted status string; unknown values map to `Sent`
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sent" => Self::Sent,
            "delivered" => Self::Delivered,
            "read" => Self::Read,
            other => {
                tracing::debug!("Unknown message status '{}', treating as sent", other);
                Self::Sent
            }
        }
    }

    /// Persisted form
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Read => "read",
        }
    }
}

/// Reference to an earlier message this one answers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRef {
    /// ID of the message being answered
    pub id: String,
    /// Snippet of the answered message
    pub preview_text: String,
    /// Display name of the answered message's sender
    #[serde(default)]
    pub original_sender_name: String,
}

/// Listing card embedded in a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyInfo {
    /// Property id
    pub id: String,
    /// Listing title
    pub title: String,
    /// Cover image reference
    #[serde(default)]
    pub image: Option<String>,
}

/// Represents a stored message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message ID
    pub id: String,
    /// Conversation this message belongs to
    pub conversation_id: String,
    /// Sender participant ID
    pub sender_id: String,
    /// Sender display name at send time
    pub sender_name: String,
    /// Sender avatar at send time
    pub sender_avatar: Option<String>,
    /// Message text
    pub content: String,
    /// Attachment references
    pub attachment_refs: AttachmentRefs,
    /// Delivery status
    pub status: MessageStatus,
    /// Whether the content was edited after sending
    pub is_edited: bool,
    /// Time of the last edit
    pub edited_at: Option<DateTime<Utc>>,
    /// Message this one replies to
    pub reply_to: Option<ReplyRef>,
    /// Embedded listing card
    pub property_info: Option<PropertyInfo>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Tombstone time; a deleted message keeps its place in the thread
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Message {
    /// Create a new message
    pub fn new(
        id: String,
        conversation_id: String,
        sender_id: String,
        sender_name: String,
        content: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            conversation_id,
            sender_id,
            sender_name,
            sender_avatar: None,
            content,
            attachment_refs: AttachmentRefs::default(),
            status: MessageStatus::Sent,
            is_edited: false,
            edited_at: None,
            reply_to: None,
            property_info: None,
            created_at,
            deleted_at: None,
        }
    }

    /// Whether the message has been deleted
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Move the status forward
    ///
    /// Returns true if the status changed; a regression is ignored.
    pub fn advance_status(&mut self, next: MessageStatus) -> bool {
        if next > self.status {
            self.status = next;
            true
        } else {
            false
        }
    }

    /// Replace the content; only the original sender may edit
    pub fn edit(&mut self, editor_id: &str, content: String, at: DateTime<Utc>) -> Result<()> {
        if editor_id != self.sender_id {
            return Err(Error::NotPermitted(format!(
                "{} cannot edit message {} sent by {}",
                editor_id, self.id, self.sender_id
            )));
        }
        if self.is_deleted() {
            return Err(Error::Validation(format!("Message {} was deleted", self.id)));
        }
        if content.trim().is_empty() && self.attachment_refs.is_empty() {
            return Err(Error::Validation("Edited message cannot be empty".to_string()));
        }

        self.content = content;
        self.is_edited = true;
        self.edited_at = Some(at);
        Ok(())
    }

    /// Turn the message into a tombstone; only the original sender may delete
    pub fn tombstone(&mut self, actor_id: &str, at: DateTime<Utc>) -> Result<()> {
        if actor_id != self.sender_id {
            return Err(Error::NotPermitted(format!(
                "{} cannot delete message {} sent by {}",
                actor_id, self.id, self.sender_id
            )));
        }
        if self.is_deleted() {
            return Ok(());
        }

        self.content.clear();
        self.attachment_refs = AttachmentRefs::default();
        self.property_info = None;
        self.deleted_at = Some(at);
        Ok(())
    }

    /// Get human-readable delivery status indicator
    pub fn status_indicator(&self) -> &str {
        match self.status {
            MessageStatus::Sent => "✓",
            MessageStatus::Delivered => "✓✓",
            MessageStatus::Read => "👁",
        }
    }
}

/// Build the conversation-list preview for a message
pub fn preview_text(content: &str, attachment_count: usize, max_chars: usize) -> String {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return match attachment_count {
            0 => String::new(),
            1 => "Sent an attachment".to_string(),
            n => format!("Sent {} attachments", n),
        };
    }

    let mut chars = trimmed.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}…", head)
    } else {
        head
    }
}
