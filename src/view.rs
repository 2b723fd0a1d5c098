//! Per-viewer view models
//!
//! Pure functions projecting stored records into what the conversation list
//! and thread screens display for one particular viewer. They never fail and
//! never touch the store: the same inputs always give the same output.

use crate::storage::{
    Conversation, ConversationType, Message, MessageStatus, ParticipantRole, PropertyInfo,
    PropertyRef, ReplyRef,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Which side of the conversation a message came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Sent by the viewer
    Me,
    /// Sent by someone else
    Them,
}

impl Side {
    fn of(sender_id: &str, viewer_id: &str) -> Self {
        if sender_id == viewer_id {
            Self::Me
        } else {
            Self::Them
        }
    }
}

/// Name and avatar of the other participant, resolved by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedParticipant {
    /// Display name
    pub name: String,
    /// Avatar reference
    pub avatar: Option<String>,
}

/// Summary of the latest message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LastMessageView {
    /// Preview text
    pub content: String,
    /// Who sent it
    pub sender: Side,
    /// When it was sent
    pub at: DateTime<Utc>,
    /// True iff the viewer has nothing unread
    pub is_read: bool,
}

/// A conversation as one viewer sees it in the list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationView {
    /// Conversation ID
    pub id: String,
    /// The participant the viewer is talking to
    pub other_participant_id: String,
    /// Display name of that participant
    pub participant_name: String,
    /// Avatar of that participant
    pub participant_avatar: Option<String>,
    /// Conversation kind
    pub kind: ConversationType,
    /// Subject line
    pub subject: Option<String>,
    /// Listing the conversation is about
    pub property_ref: Option<PropertyRef>,
    /// Latest message summary
    pub last_message: LastMessageView,
    /// Messages the viewer has not seen
    pub unread_count: u32,
    /// Pinned
    pub is_starred: bool,
    /// Notifications suppressed
    pub is_muted: bool,
    /// Hidden from the default list
    pub is_archived: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// A message as one viewer sees it in a thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageView {
    /// Message ID
    pub id: String,
    /// Conversation ID
    pub conversation_id: String,
    /// Sender participant id
    pub sender_id: String,
    /// Which side sent it
    pub sender: Side,
    /// Sender display name
    pub sender_name: String,
    /// Sender avatar
    pub sender_avatar: Option<String>,
    /// Text, empty for deleted messages
    pub content: String,
    /// Attachment references
    pub attachments: Vec<String>,
    /// Delivery status
    pub status: MessageStatus,
    /// Content changed after sending
    pub is_edited: bool,
    /// Last edit time
    pub edited_at: Option<DateTime<Utc>>,
    /// Answered message
    pub reply_to: Option<ReplyRef>,
    /// Embedded listing card
    pub property_info: Option<PropertyInfo>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Tombstoned
    pub is_deleted: bool,
}

/// Generic label for a participant whose name cannot be resolved
///
/// Conversations are started across roles, so the unknown party of a user's
/// conversation is assumed to be an agent and vice versa.
pub fn fallback_label(raw: &Conversation, other_is_initiator: bool) -> &'static str {
    if raw.kind == ConversationType::Support {
        return "Support";
    }
    let role = if other_is_initiator {
        raw.initiator_role
    } else {
        match raw.initiator_role {
            ParticipantRole::User => ParticipantRole::Agent,
            ParticipantRole::Agent | ParticipantRole::Agency => ParticipantRole::User,
            ParticipantRole::Admin => ParticipantRole::User,
        }
    };
    match role {
        ParticipantRole::User => "Client",
        ParticipantRole::Agent => "Agent",
        ParticipantRole::Agency => "Agency",
        ParticipantRole::Admin => "Support",
    }
}

/// Project a conversation for `viewer_id`
///
/// `resolved` carries the other participant's profile when the caller could
/// look it up; it wins over the name stored on the record.
pub fn transform_conversation(
    raw: &Conversation,
    viewer_id: &str,
    resolved: Option<&ResolvedParticipant>,
) -> ConversationView {
    let other_participant_id = raw
        .participant_ids
        .other_than(viewer_id)
        .unwrap_or(raw.initiator_id.as_str())
        .to_string();
    let other_is_initiator = other_participant_id == raw.initiator_id;

    let resolved_name = resolved
        .map(|r| r.name.trim())
        .filter(|name| !name.is_empty());
    let stored_name = Some(raw.initiator_name.trim())
        .filter(|name| other_is_initiator && !name.is_empty());
    let participant_name = resolved_name
        .or(stored_name)
        .unwrap_or_else(|| fallback_label(raw, other_is_initiator))
        .to_string();

    let unread_count = raw.unread_for(viewer_id);

    ConversationView {
        id: raw.id.clone(),
        other_participant_id,
        participant_name,
        participant_avatar: resolved.and_then(|r| r.avatar.clone()),
        kind: raw.kind,
        subject: raw.subject.clone(),
        property_ref: raw.property_ref.clone(),
        last_message: LastMessageView {
            content: raw.last_message_preview.clone(),
            sender: Side::of(&raw.last_message_sender_id, viewer_id),
            at: raw.last_message_at,
            is_read: unread_count == 0,
        },
        unread_count,
        is_starred: raw.is_starred,
        is_muted: raw.is_muted,
        is_archived: raw.is_archived,
        created_at: raw.created_at,
    }
}

/// Project a message for `viewer_id`
pub fn transform_message(raw: &Message, viewer_id: &str) -> MessageView {
    let is_deleted = raw.is_deleted();
    MessageView {
        id: raw.id.clone(),
        conversation_id: raw.conversation_id.clone(),
        sender_id: raw.sender_id.clone(),
        sender: Side::of(&raw.sender_id, viewer_id),
        sender_name: raw.sender_name.clone(),
        sender_avatar: raw.sender_avatar.clone(),
        content: if is_deleted {
            String::new()
        } else {
            raw.content.clone()
        },
        attachments: if is_deleted {
            Vec::new()
        } else {
            raw.attachment_refs.as_slice().to_vec()
        },
        status: raw.status,
        is_edited: raw.is_edited,
        edited_at: raw.edited_at,
        reply_to: raw.reply_to.clone(),
        property_info: if is_deleted {
            None
        } else {
            raw.property_info.clone()
        },
        created_at: raw.created_at,
        is_deleted,
    }
}
