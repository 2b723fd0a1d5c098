//! Local storage module
//!
//! This module handles persistent storage of the messaging core:
//! - Conversation and message records
//! - The document store they live in
//! - Configuration
//!
//! The module is organized into submodules:
//! - `conversation` - Conversation records and per-participant read state
//! - `message` - Message records, delivery status, edits and tombstones
//! - `payload` - Bounded lists parsed from serialized payloads
//! - `store` - Generic document store and its SQLite backend
//! - `repository` - Typed repositories, the single parsing boundary
//! - `settings` - Messaging settings and configuration

// Submodules
pub mod conversation;
pub mod message;
pub mod payload;
pub mod repository;
pub mod settings;
pub mod store;

// Re-export commonly used types
pub use conversation::{Conversation, ConversationType, ParticipantRole, PropertyRef};
pub use message::{Message, MessageStatus, PropertyInfo, ReplyRef};
pub use payload::{AttachmentRefs, ParticipantIds};
pub use repository::{
    ConversationPatch, ConversationRepository, MessagePatch, MessageRepository, Repositories,
};
pub use settings::Settings;
pub use store::{Collection, Document, DocumentStore, Query, SqliteStore, Write};
