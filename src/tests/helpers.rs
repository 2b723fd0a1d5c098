//! Shared test helpers
//!
//! `FlakyStore` wraps an in-memory `SqliteStore`, counts write calls and can
//! be told to reject every write, which is how store failures are simulated.

use crate::directory::{
    PropertyDirectory, PropertyListing, RecipientCandidate, RecipientDirectory, Viewer,
};
use crate::storage::{
    Collection, Conversation, ConversationType, Document, DocumentStore, Message, ParticipantIds,
    ParticipantRole, Query, Repositories, SqliteStore, Write,
};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// In-memory store with write counters and failure injection
pub struct FlakyStore {
    inner: SqliteStore,
    fail_writes: AtomicBool,
    creates: AtomicUsize,
    updates: AtomicUsize,
    commits: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: SqliteStore::new_in_memory().expect("Failed to create in-memory store"),
            fail_writes: AtomicBool::new(false),
            creates: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
            commits: AtomicUsize::new(0),
        })
    }

    /// Reject every following write until switched off again
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(Error::Storage("injected write failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn list(&self, collection: Collection, query: &Query) -> Result<Vec<Document>> {
        self.inner.list(collection, query).await
    }

    async fn create(&self, collection: Collection, id: &str, doc: Document) -> Result<()> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.create(collection, id, doc).await
    }

    async fn update(&self, collection: Collection, id: &str, patch: Document) -> Result<Document> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.update(collection, id, patch).await
    }

    async fn commit(&self, writes: Vec<Write>) -> Result<()> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.commit(writes).await
    }
}

/// Create a flaky store and repositories over it
pub fn create_test_repos() -> (Arc<FlakyStore>, Repositories) {
    let store = FlakyStore::new();
    let shared: Arc<dyn DocumentStore> = store.clone();
    (store, Repositories::new(shared))
}

/// Insert a hand-written document, bypassing the repositories
pub async fn insert_raw(store: &dyn DocumentStore, collection: Collection, value: serde_json::Value) {
    let serde_json::Value::Object(doc) = value else {
        panic!("Raw document must be a JSON object");
    };
    let id = doc
        .get("id")
        .and_then(|v| v.as_str())
        .expect("Raw document needs a string id")
        .to_string();
    store
        .create(collection, &id, doc)
        .await
        .expect("Failed to insert raw document");
}

pub fn ts(year: i32, month: u32, day: u32, hour: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, min, 0)
        .single()
        .expect("Failed to build timestamp")
}

pub fn user(id: &str, name: &str) -> Viewer {
    Viewer::new(id, name, ParticipantRole::User)
}

pub fn agent(id: &str, name: &str) -> Viewer {
    Viewer::new(id, name, ParticipantRole::Agent)
}

/// General conversation between `initiator` and `other_id`
pub fn create_test_conversation(id: &str, initiator: &Viewer, other_id: &str, at: DateTime<Utc>) -> Conversation {
    Conversation::new(
        id.to_string(),
        initiator.id.clone(),
        initiator.name.clone(),
        initiator.role,
        ParticipantIds::new(vec![initiator.id.clone(), other_id.to_string()]),
        ConversationType::General,
        at,
    )
}

pub fn create_test_message(id: &str, conversation_id: &str, sender: &Viewer, content: &str, at: DateTime<Utc>) -> Message {
    Message::new(
        id.to_string(),
        conversation_id.to_string(),
        sender.id.clone(),
        sender.name.clone(),
        content.to_string(),
        at,
    )
}

pub fn candidate(id: &str, name: &str, role: ParticipantRole) -> RecipientCandidate {
    RecipientCandidate {
        id: id.to_string(),
        name: name.to_string(),
        avatar: None,
        role,
        company: None,
    }
}

pub fn listing(id: &str, title: &str) -> PropertyListing {
    PropertyListing {
        id: id.to_string(),
        title: title.to_string(),
        image: Some(format!("{}.jpg", id)),
    }
}

/// Directory matching names by substring
///
/// Ignores `exclude_id` so that callers' own filtering is exercised.
pub struct FakeRecipients {
    pub candidates: Vec<RecipientCandidate>,
    pub delay: Option<Duration>,
    pub calls: AtomicUsize,
}

impl FakeRecipients {
    pub fn new(candidates: Vec<RecipientCandidate>) -> Self {
        Self {
            candidates,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RecipientDirectory for FakeRecipients {
    async fn search(
        &self,
        query: &str,
        _exclude_id: &str,
        roles: &[ParticipantRole],
        limit: usize,
    ) -> Result<Vec<RecipientCandidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let query = query.to_lowercase();
        Ok(self
            .candidates
            .iter()
            .filter(|c| c.name.to_lowercase().contains(&query) && roles.contains(&c.role))
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Listings keyed by owner
pub struct FakeProperties {
    pub listings: HashMap<String, Vec<PropertyListing>>,
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
}

impl FakeProperties {
    pub fn new(owner_id: &str, listings: Vec<PropertyListing>) -> Self {
        Self {
            listings: HashMap::from([(owner_id.to_string(), listings)]),
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PropertyDirectory for FakeProperties {
    async fn list_owned_by(&self, owner_id: &str) -> Result<Vec<PropertyListing>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Directory("listing service unavailable".to_string()));
        }
        Ok(self.listings.get(owner_id).cloned().unwrap_or_default())
    }
}
