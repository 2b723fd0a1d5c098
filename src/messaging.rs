//! High-level messaging module
//!
//! This module provides the operations that change conversations and
//! messages. Each one keeps the unread bookkeeping and the message record
//! consistent by writing them in a single store batch.

use crate::directory::{PropertyListing, Viewer};
use crate::storage::message::preview_text;
use crate::storage::{
    AttachmentRefs, Conversation, ConversationPatch, ConversationRepository, ConversationType,
    Message, MessagePatch, MessageRepository, MessageStatus, ParticipantIds, PropertyInfo,
    PropertyRef, ReplyRef, Repositories, Settings,
};
use crate::{with_timeout, Error, Result};
use chrono::{DateTime, Utc};

/// A message about to be sent
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Message text
    pub content: String,
    /// Attachment references
    pub attachment_refs: AttachmentRefs,
    /// Message being answered
    pub reply_to: Option<ReplyRef>,
    /// Listing card to embed
    pub property_info: Option<PropertyInfo>,
}

impl OutgoingMessage {
    /// Plain text message
    pub fn text(content: &str) -> Self {
        Self {
            content: content.to_string(),
            ..Self::default()
        }
    }

    /// Whether there is nothing to send
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty() && self.attachment_refs.is_empty()
    }
}

/// Result of a successful send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedMessage {
    /// The stored message
    pub message: Message,
    /// The conversation after the message was recorded
    pub conversation: Conversation,
}

/// Everything needed to start a conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewConversation {
    /// Who starts it
    pub initiator: Viewer,
    /// Who it is with
    pub recipient_id: String,
    /// Conversation kind
    pub kind: ConversationType,
    /// Optional subject line
    pub subject: Option<String>,
    /// Listing the conversation is about
    pub property: Option<PropertyListing>,
    /// First message text
    pub content: String,
}

/// A conversation opened for reading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedConversation {
    /// The conversation with the viewer's counter reset
    pub conversation: Conversation,
    /// Messages in creation order
    pub messages: Vec<Message>,
}

/// Current time at the millisecond precision the store keeps
fn now() -> DateTime<Utc> {
    DateTime::from_timestamp_millis(Utc::now().timestamp_millis()).unwrap_or_default()
}

fn build_message(
    conversation_id: &str,
    sender: &Viewer,
    outgoing: OutgoingMessage,
) -> Message {
    let mut message = Message::new(
        uuid::Uuid::new_v4().to_string(),
        conversation_id.to_string(),
        sender.id.clone(),
        sender.name.clone(),
        outgoing.content.trim().to_string(),
        now(),
    );
    message.sender_avatar = sender.avatar.clone();
    message.attachment_refs = outgoing.attachment_refs;
    message.reply_to = outgoing.reply_to;
    message.property_info = outgoing.property_info;
    message
}

/// Create a conversation together with its first message
///
/// Both records are written in one batch: either both exist afterwards or
/// neither does, so a failed attempt can be retried with the same draft.
pub async fn start_conversation(
    repos: &Repositories,
    draft: NewConversation,
    settings: &Settings,
) -> Result<PostedMessage> {
    if draft.content.trim().is_empty() {
        return Err(Error::Validation("First message cannot be empty".to_string()));
    }
    if draft.recipient_id.trim().is_empty() || draft.recipient_id == draft.initiator.id {
        return Err(Error::Validation("A different recipient is required".to_string()));
    }

    let created_at = now();
    let mut conversation = Conversation::new(
        uuid::Uuid::new_v4().to_string(),
        draft.initiator.id.clone(),
        draft.initiator.name.clone(),
        draft.initiator.role,
        ParticipantIds::new(vec![draft.initiator.id.clone(), draft.recipient_id.clone()]),
        draft.kind,
        created_at,
    );
    conversation.subject = draft
        .subject
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let mut outgoing = OutgoingMessage::text(&draft.content);
    if let Some(property) = &draft.property {
        conversation.property_ref = Some(PropertyRef {
            id: property.id.clone(),
            title: property.title.clone(),
        });
        outgoing.property_info = Some(PropertyInfo {
            id: property.id.clone(),
            title: property.title.clone(),
            image: property.image.clone(),
        });
    }

    let mut message = build_message(&conversation.id, &draft.initiator, outgoing);
    message.created_at = created_at;
    conversation.record_message(
        &draft.initiator.id,
        preview_text(&message.content, message.attachment_refs.len(), settings.preview_chars),
        created_at,
    );

    repos
        .commit(vec![
            ConversationRepository::create_write(&conversation)?,
            MessageRepository::create_write(&message)?,
        ])
        .await?;

    tracing::info!(
        "Conversation {} started by {} with {}",
        conversation.id,
        draft.initiator.id,
        draft.recipient_id
    );
    Ok(PostedMessage {
        message,
        conversation,
    })
}

/// Append a message to a conversation
///
/// The message and the conversation's preview and unread counters are written
/// in one batch. Every participant except the sender gets one more unread
/// message. An empty message is rejected before the store is touched.
pub async fn post_message(
    repos: &Repositories,
    conversation_id: &str,
    sender: &Viewer,
    outgoing: OutgoingMessage,
    settings: &Settings,
) -> Result<PostedMessage> {
    if outgoing.is_empty() {
        return Err(Error::Validation("Message cannot be empty".to_string()));
    }

    let mut conversation = with_timeout(
        settings.fetch_timeout(),
        repos.conversations.get(conversation_id),
    )
    .await?
    .ok_or_else(|| Error::NotFound(format!("Conversation {}", conversation_id)))?;

    if !conversation.participant_ids.is_empty()
        && !conversation.participant_ids.contains(&sender.id)
    {
        return Err(Error::NotPermitted(format!(
            "{} is not part of conversation {}",
            sender.id, conversation_id
        )));
    }

    let message = build_message(conversation_id, sender, outgoing);
    conversation.record_message(
        &sender.id,
        preview_text(&message.content, message.attachment_refs.len(), settings.preview_chars),
        message.created_at,
    );

    repos
        .commit(vec![
            MessageRepository::create_write(&message)?,
            ConversationRepository::update_write(
                conversation_id,
                ConversationPatch::activity_of(&conversation),
            )?,
        ])
        .await?;

    tracing::info!("Message {} posted to {}", message.id, conversation_id);
    Ok(PostedMessage {
        message,
        conversation,
    })
}

/// Open a conversation for reading
///
/// Fetches the thread, marks the other side's messages as read and resets
/// the viewer's unread counter. Only participants may open it. Failing to
/// record the read state is logged and does not prevent the thread from
/// being shown.
pub async fn open_conversation(
    repos: &Repositories,
    conversation_id: &str,
    viewer: &Viewer,
    settings: &Settings,
) -> Result<OpenedConversation> {
    let mut conversation = with_timeout(
        settings.fetch_timeout(),
        repos.conversations.get(conversation_id),
    )
    .await?
    .ok_or_else(|| Error::NotFound(format!("Conversation {}", conversation_id)))?;

    if !conversation.participant_ids.is_empty()
        && !conversation.participant_ids.contains(&viewer.id)
    {
        return Err(Error::NotPermitted(format!(
            "{} is not part of conversation {}",
            viewer.id, conversation_id
        )));
    }

    let mut messages = with_timeout(
        settings.fetch_timeout(),
        repos
            .messages
            .list_for_conversation(conversation_id, settings.message_page_limit),
    )
    .await?;

    let mut writes = Vec::new();
    for message in messages.iter_mut() {
        if message.sender_id != viewer.id && message.advance_status(MessageStatus::Read) {
            writes.push(MessageRepository::update_write(
                &message.id,
                MessagePatch {
                    status: Some(MessageStatus::Read),
                    ..MessagePatch::default()
                },
            ));
        }
    }

    let mut read_conversation = conversation.clone();
    if read_conversation.mark_read_by(&viewer.id) {
        writes.push(ConversationRepository::update_write(
            conversation_id,
            ConversationPatch {
                unread: Some(read_conversation.unread.clone()),
                ..ConversationPatch::default()
            },
        )?);
    }

    if !writes.is_empty() {
        match repos.commit(writes).await {
            Ok(()) => conversation = read_conversation,
            Err(e) => {
                tracing::warn!(
                    "Failed to record read state of {} for {}: {}",
                    conversation_id,
                    viewer.id,
                    e
                );
            }
        }
    }

    Ok(OpenedConversation {
        conversation,
        messages,
    })
}

/// Mark the other side's sent messages as delivered
///
/// Returns the number of messages advanced.
pub async fn mark_delivered(
    repos: &Repositories,
    conversation_id: &str,
    viewer: &Viewer,
    settings: &Settings,
) -> Result<usize> {
    let messages = with_timeout(
        settings.fetch_timeout(),
        repos
            .messages
            .list_for_conversation(conversation_id, settings.message_page_limit),
    )
    .await?;

    let writes: Vec<_> = messages
        .into_iter()
        .filter(|m| m.sender_id != viewer.id && m.status < MessageStatus::Delivered)
        .map(|m| {
            MessageRepository::update_write(
                &m.id,
                MessagePatch {
                    status: Some(MessageStatus::Delivered),
                    ..MessagePatch::default()
                },
            )
        })
        .collect();

    let count = writes.len();
    if count > 0 {
        repos.commit(writes).await?;
        tracing::debug!("Marked {} messages delivered in {}", count, conversation_id);
    }
    Ok(count)
}

/// Edit the text of a message; only its sender may do so
pub async fn edit_message(
    repos: &Repositories,
    message_id: &str,
    editor: &Viewer,
    content: &str,
) -> Result<Message> {
    let mut message = repos
        .messages
        .get(message_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Message {}", message_id)))?;

    message.edit(&editor.id, content.trim().to_string(), now())?;

    let stored = repos
        .messages
        .update(
            message_id,
            MessagePatch {
                content: Some(message.content.clone()),
                is_edited: Some(true),
                edited_at: message.edited_at,
                ..MessagePatch::default()
            },
        )
        .await?;

    tracing::info!("Message {} edited by {}", message_id, editor.id);
    Ok(stored)
}

/// Delete a message, leaving a tombstone in the thread
pub async fn delete_message(
    repos: &Repositories,
    message_id: &str,
    actor: &Viewer,
) -> Result<Message> {
    let mut message = repos
        .messages
        .get(message_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Message {}", message_id)))?;

    if message.is_deleted() {
        return Ok(message);
    }
    message.tombstone(&actor.id, now())?;

    let stored = repos
        .messages
        .update(
            message_id,
            MessagePatch {
                content: Some(String::new()),
                deleted_at: message.deleted_at,
                attachment_refs: Some(AttachmentRefs::default()),
                clear_property_info: true,
                ..MessagePatch::default()
            },
        )
        .await?;

    tracing::info!("Message {} deleted by {}", message_id, actor.id);
    Ok(stored)
}
