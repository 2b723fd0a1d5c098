//! Serialized list payloads
//!
//! Participant ids and attachment references are persisted as JSON list
//! strings. They are parsed exactly once, when a document is read at the
//! repository boundary, into bounded ordered lists. Parsing never fails:
//! a malformed payload degrades to an empty list and is logged.

use crate::storage::settings::{MAX_ATTACHMENTS, MAX_PARTICIPANTS};
use serde::{Deserialize, Serialize};

/// Parse a serialized string list, keeping at most `max` entries
fn parse_string_list(raw: &str, field: &'static str, max: usize) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let values: Vec<serde_json::Value> = match serde_json::from_str(trimmed) {
        Ok(values) => values,
        Err(e) => {
            tracing::warn!("Malformed {} payload, using empty list: {}", field, e);
            return Vec::new();
        }
    };

    let mut items = Vec::with_capacity(values.len().min(max));
    for value in values {
        match value {
            serde_json::Value::String(s) if !s.trim().is_empty() => items.push(s),
            other => {
                tracing::warn!("Skipping non-string entry in {} payload: {}", field, other);
            }
        }
    }

    bound(items, field, max)
}

fn bound(mut items: Vec<String>, field: &'static str, max: usize) -> Vec<String> {
    if items.len() > max {
        tracing::warn!(
            "{} holds {} entries, truncating to {}",
            field,
            items.len(),
            max
        );
        items.truncate(max);
    }
    items
}

fn to_payload(items: &[String]) -> String {
    // Serializing a list of strings cannot fail
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

/// Ordered participant ids of a conversation (at most `MAX_PARTICIPANTS`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantIds(Vec<String>);

impl ParticipantIds {
    /// Build from ids, dropping duplicates and truncating past the ceiling
    pub fn new(ids: Vec<String>) -> Self {
        let mut unique: Vec<String> = Vec::with_capacity(ids.len());
        for id in ids {
            if !unique.contains(&id) {
                unique.push(id);
            }
        }
        Self(bound(unique, "participant_ids", MAX_PARTICIPANTS))
    }

    /// Parse a persisted payload; malformed input yields an empty list
    pub fn parse(raw: &str) -> Self {
        Self::new(parse_string_list(raw, "participant_ids", MAX_PARTICIPANTS))
    }

    /// Serialize for persistence
    pub fn to_payload(&self) -> String {
        to_payload(&self.0)
    }

    /// Whether `id` takes part in the conversation
    pub fn contains(&self, id: &str) -> bool {
        self.0.iter().any(|p| p == id)
    }

    /// First participant that is not `viewer_id`
    pub fn other_than(&self, viewer_id: &str) -> Option<&str> {
        self.0.iter().map(String::as_str).find(|p| *p != viewer_id)
    }

    /// Iterate in stored order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Number of participants
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the list is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Ordered attachment references of a message (at most `MAX_ATTACHMENTS`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttachmentRefs(Vec<String>);

impl AttachmentRefs {
    /// Build from references, truncating past the ceiling
    pub fn new(refs: Vec<String>) -> Self {
        Self(bound(refs, "attachment_refs", MAX_ATTACHMENTS))
    }

    /// Parse a persisted payload; malformed input yields an empty list
    pub fn parse(raw: &str) -> Self {
        Self(parse_string_list(raw, "attachment_refs", MAX_ATTACHMENTS))
    }

    /// Serialize for persistence
    pub fn to_payload(&self) -> String {
        to_payload(&self.0)
    }

    /// References in stored order
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Number of references
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no attachments
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
