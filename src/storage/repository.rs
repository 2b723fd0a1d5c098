//! Typed repositories over the document store
//!
//! This is the only place persisted documents are parsed. Serialized list
//! payloads, role/type/status strings and timestamps are converted into the
//! typed records once here; malformed fields degrade and are logged, and a
//! document that cannot be read at all is skipped.

use crate::storage::conversation::{Conversation, ConversationType, ParticipantRole, PropertyRef};
use crate::storage::message::{Message, MessageStatus, PropertyInfo, ReplyRef};
use crate::storage::payload::{AttachmentRefs, ParticipantIds};
use crate::storage::store::{Collection, Document, DocumentStore, Order, Query, Write};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

fn millis_to_time(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

/// Serialized list payload, whether stored as a JSON string or a raw array
fn list_payload(value: &Value) -> String {
    match value {
        Value::String(raw) => raw.clone(),
        Value::Array(_) => value.to_string(),
        Value::Null => String::new(),
        other => {
            tracing::warn!("List payload has unexpected JSON type: {}", other);
            String::new()
        }
    }
}

/// Parse an optional embedded object, degrading to `None`
fn optional_object<T: serde::de::DeserializeOwned>(value: Option<Value>, field: &str) -> Option<T> {
    match value {
        None | Some(Value::Null) => None,
        Some(value) => match serde_json::from_value(value) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!("Malformed {} field, ignoring: {}", field, e);
                None
            }
        },
    }
}

fn into_document<T: Serialize>(value: &T) -> Result<Document> {
    match serde_json::to_value(value)? {
        Value::Object(doc) => Ok(doc),
        _ => Err(Error::Storage("Record did not serialize to an object".to_string())),
    }
}

/// Persisted conversation document
#[derive(Debug, Serialize, Deserialize)]
struct ConversationDocument {
    id: String,
    #[serde(default)]
    initiator_id: String,
    #[serde(default)]
    initiator_name: String,
    #[serde(default)]
    initiator_role: String,
    #[serde(default)]
    participant_ids: Value,
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    property_ref: Option<Value>,
    #[serde(default)]
    last_message_preview: String,
    #[serde(default)]
    last_message_at: i64,
    #[serde(default)]
    last_message_sender_id: String,
    #[serde(default)]
    unread_counts: BTreeMap<String, u32>,
    #[serde(default, skip_serializing)]
    unread_for_initiator: Option<u32>,
    #[serde(default, skip_serializing)]
    unread_for_other_party: Option<u32>,
    #[serde(default)]
    is_starred: bool,
    #[serde(default)]
    is_muted: bool,
    #[serde(default)]
    is_archived: bool,
    #[serde(default)]
    created_at: i64,
}

impl ConversationDocument {
    fn from_record(conversation: &Conversation) -> Self {
        Self {
            id: conversation.id.clone(),
            initiator_id: conversation.initiator_id.clone(),
            initiator_name: conversation.initiator_name.clone(),
            initiator_role: conversation.initiator_role.as_str().to_string(),
            participant_ids: Value::String(conversation.participant_ids.to_payload()),
            kind: conversation.kind.as_str().to_string(),
            subject: conversation.subject.clone(),
            property_ref: conversation
                .property_ref
                .as_ref()
                .and_then(|p| serde_json::to_value(p).ok()),
            last_message_preview: conversation.last_message_preview.clone(),
            last_message_at: conversation.last_message_at.timestamp_millis(),
            last_message_sender_id: conversation.last_message_sender_id.clone(),
            unread_counts: conversation.unread.clone(),
            unread_for_initiator: None,
            unread_for_other_party: None,
            is_starred: conversation.is_starred,
            is_muted: conversation.is_muted,
            is_archived: conversation.is_archived,
            created_at: conversation.created_at.timestamp_millis(),
        }
    }

    fn into_record(self) -> Conversation {
        let participant_ids = ParticipantIds::parse(&list_payload(&self.participant_ids));
        if participant_ids.is_empty() {
            tracing::warn!("Conversation {} has no readable participants", self.id);
        }

        let mut unread = self.unread_counts;
        // Documents written with the two-counter layout
        if let Some(count) = self.unread_for_initiator {
            unread.entry(self.initiator_id.clone()).or_insert(count);
        }
        if let Some(count) = self.unread_for_other_party {
            if let Some(other) = participant_ids.other_than(&self.initiator_id) {
                unread.entry(other.to_string()).or_insert(count);
            }
        }

        Conversation {
            initiator_role: ParticipantRole::from_raw(&self.initiator_role),
            kind: ConversationType::from_raw(&self.kind),
            property_ref: optional_object::<PropertyRef>(self.property_ref, "property_ref"),
            last_message_at: millis_to_time(self.last_message_at),
            created_at: millis_to_time(self.created_at),
            id: self.id,
            initiator_id: self.initiator_id,
            initiator_name: self.initiator_name,
            participant_ids,
            subject: self.subject,
            last_message_preview: self.last_message_preview,
            last_message_sender_id: self.last_message_sender_id,
            unread,
            is_starred: self.is_starred,
            is_muted: self.is_muted,
            is_archived: self.is_archived,
        }
    }
}

/// Persisted message document
#[derive(Debug, Serialize, Deserialize)]
struct MessageDocument {
    id: String,
    #[serde(default)]
    conversation_id: String,
    #[serde(default)]
    sender_id: String,
    #[serde(default)]
    sender_name: String,
    #[serde(default)]
    sender_avatar: Option<String>,
    #[serde(default)]
    content: String,
    #[serde(default)]
    attachment_refs: Value,
    #[serde(default)]
    status: String,
    #[serde(default)]
    is_edited: bool,
    #[serde(default)]
    edited_at: Option<i64>,
    #[serde(default)]
    reply_to: Option<Value>,
    #[serde(default)]
    property_info: Option<Value>,
    #[serde(default)]
    created_at: i64,
    #[serde(default)]
    deleted_at: Option<i64>,
}

impl MessageDocument {
    fn from_record(message: &Message) -> Self {
        Self {
            id: message.id.clone(),
            conversation_id: message.conversation_id.clone(),
            sender_id: message.sender_id.clone(),
            sender_name: message.sender_name.clone(),
            sender_avatar: message.sender_avatar.clone(),
            content: message.content.clone(),
            attachment_refs: Value::String(message.attachment_refs.to_payload()),
            status: message.status.as_str().to_string(),
            is_edited: message.is_edited,
            edited_at: message.edited_at.map(|t| t.timestamp_millis()),
            reply_to: message
                .reply_to
                .as_ref()
                .and_then(|r| serde_json::to_value(r).ok()),
            property_info: message
                .property_info
                .as_ref()
                .and_then(|p| serde_json::to_value(p).ok()),
            created_at: message.created_at.timestamp_millis(),
            deleted_at: message.deleted_at.map(|t| t.timestamp_millis()),
        }
    }

    fn into_record(self) -> Message {
        Message {
            attachment_refs: AttachmentRefs::parse(&list_payload(&self.attachment_refs)),
            status: MessageStatus::from_raw(&self.status),
            edited_at: self.edited_at.map(millis_to_time),
            reply_to: optional_object::<ReplyRef>(self.reply_to, "reply_to"),
            property_info: optional_object::<PropertyInfo>(self.property_info, "property_info"),
            created_at: millis_to_time(self.created_at),
            deleted_at: self.deleted_at.map(millis_to_time),
            id: self.id,
            conversation_id: self.conversation_id,
            sender_id: self.sender_id,
            sender_name: self.sender_name,
            sender_avatar: self.sender_avatar,
            content: self.content,
            is_edited: self.is_edited,
        }
    }
}

/// Read a stored document into a record, skipping unreadable documents
fn decode<D, T>(doc: Document, into: impl FnOnce(D) -> T) -> Option<T>
where
    D: serde::de::DeserializeOwned,
{
    let id = doc.get("id").and_then(Value::as_str).unwrap_or("?").to_string();
    match serde_json::from_value::<D>(Value::Object(doc)) {
        Ok(parsed) => Some(into(parsed)),
        Err(e) => {
            tracing::warn!("Skipping unreadable document {}: {}", id, e);
            None
        }
    }
}

/// Partial update of a conversation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationPatch {
    /// New starred flag
    pub is_starred: Option<bool>,
    /// New muted flag
    pub is_muted: Option<bool>,
    /// New archived flag
    pub is_archived: Option<bool>,
    /// New last-message preview
    pub last_message_preview: Option<String>,
    /// New last-message time
    pub last_message_at: Option<DateTime<Utc>>,
    /// New last-message sender
    pub last_message_sender_id: Option<String>,
    /// Replacement unread map
    pub unread: Option<BTreeMap<String, u32>>,
}

impl ConversationPatch {
    /// Patch carrying the activity fields of a conversation after a new message
    pub fn activity_of(conversation: &Conversation) -> Self {
        Self {
            last_message_preview: Some(conversation.last_message_preview.clone()),
            last_message_at: Some(conversation.last_message_at),
            last_message_sender_id: Some(conversation.last_message_sender_id.clone()),
            unread: Some(conversation.unread.clone()),
            ..Self::default()
        }
    }

    fn into_document(self) -> Result<Document> {
        let mut doc = Document::new();
        if let Some(v) = self.is_starred {
            doc.insert("is_starred".into(), Value::Bool(v));
        }
        if let Some(v) = self.is_muted {
            doc.insert("is_muted".into(), Value::Bool(v));
        }
        if let Some(v) = self.is_archived {
            doc.insert("is_archived".into(), Value::Bool(v));
        }
        if let Some(v) = self.last_message_preview {
            doc.insert("last_message_preview".into(), Value::String(v));
        }
        if let Some(v) = self.last_message_at {
            doc.insert("last_message_at".into(), Value::from(v.timestamp_millis()));
        }
        if let Some(v) = self.last_message_sender_id {
            doc.insert("last_message_sender_id".into(), Value::String(v));
        }
        if let Some(v) = self.unread {
            doc.insert("unread_counts".into(), serde_json::to_value(v)?);
        }
        Ok(doc)
    }
}

/// Partial update of a message
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessagePatch {
    /// New content
    pub content: Option<String>,
    /// New edited flag
    pub is_edited: Option<bool>,
    /// New edit time
    pub edited_at: Option<DateTime<Utc>>,
    /// New status
    pub status: Option<MessageStatus>,
    /// Tombstone time
    pub deleted_at: Option<DateTime<Utc>>,
    /// Replacement attachments
    pub attachment_refs: Option<AttachmentRefs>,
    /// Clear the embedded listing card
    pub clear_property_info: bool,
}

impl MessagePatch {
    fn into_document(self) -> Document {
        let mut doc = Document::new();
        if let Some(v) = self.content {
            doc.insert("content".into(), Value::String(v));
        }
        if let Some(v) = self.is_edited {
            doc.insert("is_edited".into(), Value::Bool(v));
        }
        if let Some(v) = self.edited_at {
            doc.insert("edited_at".into(), Value::from(v.timestamp_millis()));
        }
        if let Some(v) = self.status {
            doc.insert("status".into(), Value::String(v.as_str().to_string()));
        }
        if let Some(v) = self.deleted_at {
            doc.insert("deleted_at".into(), Value::from(v.timestamp_millis()));
        }
        if let Some(v) = self.attachment_refs {
            doc.insert("attachment_refs".into(), Value::String(v.to_payload()));
        }
        if self.clear_property_info {
            doc.insert("property_info".into(), Value::Null);
        }
        doc
    }
}

/// Typed access to conversation documents
#[derive(Clone)]
pub struct ConversationRepository {
    store: Arc<dyn DocumentStore>,
}

impl ConversationRepository {
    /// Create a repository over a store
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Conversations a participant takes part in, most recent activity first
    ///
    /// Archived conversations are excluded unless `include_archived` is set.
    pub async fn list_for_participant(
        &self,
        participant_id: &str,
        include_archived: bool,
        limit: usize,
    ) -> Result<Vec<Conversation>> {
        let mut query = Query::new()
            .list_contains("participant_ids", participant_id)
            .order_by("last_message_at", Order::Descending)
            .limit(limit);
        if !include_archived {
            query = query.eq("is_archived", false);
        }

        let docs = self.store.list(Collection::Conversations, &query).await?;
        Ok(docs
            .into_iter()
            .filter_map(|doc| decode(doc, ConversationDocument::into_record))
            .collect())
    }

    /// Fetch one conversation
    pub async fn get(&self, id: &str) -> Result<Option<Conversation>> {
        let doc = self.store.get(Collection::Conversations, id).await?;
        Ok(doc.and_then(|doc| decode(doc, ConversationDocument::into_record)))
    }

    /// Insert a new conversation
    pub async fn create(&self, conversation: &Conversation) -> Result<()> {
        let doc = into_document(&ConversationDocument::from_record(conversation))?;
        self.store
            .create(Collection::Conversations, &conversation.id, doc)
            .await
    }

    /// Apply a partial update and return the stored result
    pub async fn update(&self, id: &str, patch: ConversationPatch) -> Result<Conversation> {
        let doc = self
            .store
            .update(Collection::Conversations, id, patch.into_document()?)
            .await?;
        decode(doc, ConversationDocument::into_record)
            .ok_or_else(|| Error::Storage(format!("Conversation {} is unreadable", id)))
    }

    /// Batch write inserting a conversation
    pub fn create_write(conversation: &Conversation) -> Result<Write> {
        Ok(Write::Create {
            collection: Collection::Conversations,
            id: conversation.id.clone(),
            doc: into_document(&ConversationDocument::from_record(conversation))?,
        })
    }

    /// Batch write applying a partial update
    pub fn update_write(id: &str, patch: ConversationPatch) -> Result<Write> {
        Ok(Write::Update {
            collection: Collection::Conversations,
            id: id.to_string(),
            patch: patch.into_document()?,
        })
    }
}

/// Typed access to message documents
#[derive(Clone)]
pub struct MessageRepository {
    store: Arc<dyn DocumentStore>,
}

impl MessageRepository {
    /// Create a repository over a store
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Messages of a conversation in creation order
    pub async fn list_for_conversation(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>> {
        let query = Query::new()
            .eq("conversation_id", conversation_id)
            .order_by("created_at", Order::Ascending)
            .limit(limit);

        let docs = self.store.list(Collection::Messages, &query).await?;
        Ok(docs
            .into_iter()
            .filter_map(|doc| decode(doc, MessageDocument::into_record))
            .collect())
    }

    /// Fetch one message
    pub async fn get(&self, id: &str) -> Result<Option<Message>> {
        let doc = self.store.get(Collection::Messages, id).await?;
        Ok(doc.and_then(|doc| decode(doc, MessageDocument::into_record)))
    }

    /// Insert a new message
    pub async fn create(&self, message: &Message) -> Result<()> {
        let doc = into_document(&MessageDocument::from_record(message))?;
        self.store.create(Collection::Messages, &message.id, doc).await
    }

    /// Apply a partial update and return the stored result
    pub async fn update(&self, id: &str, patch: MessagePatch) -> Result<Message> {
        let doc = self
            .store
            .update(Collection::Messages, id, patch.into_document())
            .await?;
        decode(doc, MessageDocument::into_record)
            .ok_or_else(|| Error::Storage(format!("Message {} is unreadable", id)))
    }

    /// Batch write inserting a message
    pub fn create_write(message: &Message) -> Result<Write> {
        Ok(Write::Create {
            collection: Collection::Messages,
            id: message.id.clone(),
            doc: into_document(&MessageDocument::from_record(message))?,
        })
    }

    /// Batch write applying a partial update
    pub fn update_write(id: &str, patch: MessagePatch) -> Write {
        Write::Update {
            collection: Collection::Messages,
            id: id.to_string(),
            patch: patch.into_document(),
        }
    }
}

/// Both repositories over one shared store
#[derive(Clone)]
pub struct Repositories {
    /// Conversation documents
    pub conversations: ConversationRepository,
    /// Message documents
    pub messages: MessageRepository,
    store: Arc<dyn DocumentStore>,
}

impl Repositories {
    /// Create both repositories over a store
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            conversations: ConversationRepository::new(store.clone()),
            messages: MessageRepository::new(store.clone()),
            store,
        }
    }

    /// Apply writes spanning both collections atomically
    pub async fn commit(&self, writes: Vec<Write>) -> Result<()> {
        self.store.commit(writes).await
    }
}
