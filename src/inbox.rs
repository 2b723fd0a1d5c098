//! Conversation list
//!
//! Holds the viewer's conversations in repository order (most recent activity
//! first) and filters them by a text query and a status mode. Flag changes
//! are written to the repository first; the list only changes once the write
//! is confirmed, and then it shows exactly what the store returned.

use crate::storage::{Conversation, ConversationPatch, ConversationRepository};
use crate::view::{transform_conversation, ConversationView, ResolvedParticipant};
use crate::{Error, Result};
use std::collections::HashMap;
use std::time::Duration;

/// Status mode of the list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    /// Every conversation
    #[default]
    All,
    /// Conversations with unread messages
    Unread,
    /// Starred conversations
    Starred,
}

/// Fetch state of the list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LoadState {
    /// Nothing requested yet
    #[default]
    Idle,
    /// A fetch is outstanding
    Loading,
    /// The last fetch succeeded
    Loaded,
    /// The last fetch failed; the previous list is still shown
    Failed(String),
}

/// Dismissible message shown after a failed action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Identifier used to dismiss it
    pub id: u64,
    /// Text
    pub message: String,
}

/// Token identifying one list fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshToken(u64);

/// Conversation list state
#[derive(Debug)]
pub struct InboxController {
    /// Viewer the list is projected for
    viewer_id: String,
    /// Conversations in repository order
    conversations: Vec<ConversationView>,
    /// Records the views were projected from, keyed by conversation id
    records: HashMap<String, Conversation>,
    /// Profiles of other participants, keyed by participant id
    resolved: HashMap<String, ResolvedParticipant>,
    /// Text query
    query: String,
    /// Status mode
    status_filter: StatusFilter,
    /// Whether archived conversations are fetched and shown
    show_archived: bool,
    /// Fetch state
    load_state: LoadState,
    /// Latest issued fetch
    generation: u64,
    /// Selected index within the visible list
    pub selected_index: usize,
    /// Pending notifications
    notifications: Vec<Notification>,
    next_notification_id: u64,
}

impl InboxController {
    /// Create an empty list for a viewer
    pub fn new(viewer_id: &str) -> Self {
        Self {
            viewer_id: viewer_id.to_string(),
            conversations: Vec::new(),
            records: HashMap::new(),
            resolved: HashMap::new(),
            query: String::new(),
            status_filter: StatusFilter::All,
            show_archived: false,
            load_state: LoadState::Idle,
            generation: 0,
            selected_index: 0,
            notifications: Vec::new(),
            next_notification_id: 1,
        }
    }

    /// All loaded conversations, unfiltered
    pub fn conversations(&self) -> &[ConversationView] {
        &self.conversations
    }

    /// Fetch state
    pub fn load_state(&self) -> &LoadState {
        &self.load_state
    }

    /// Current text query
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Current status mode
    pub fn status_filter(&self) -> StatusFilter {
        self.status_filter
    }

    /// Whether archived conversations are included
    pub fn show_archived(&self) -> bool {
        self.show_archived
    }

    /// Include or exclude archived conversations from the next fetch
    pub fn set_show_archived(&mut self, show: bool) {
        self.show_archived = show;
    }

    /// Set the text query
    pub fn set_query(&mut self, query: &str) {
        self.query = query.to_string();
        self.selected_index = 0;
    }

    /// Set the status mode
    pub fn set_status_filter(&mut self, filter: StatusFilter) {
        self.status_filter = filter;
        self.selected_index = 0;
    }

    /// Register the profile of another participant
    ///
    /// Already loaded conversations with that participant are re-projected.
    pub fn set_resolved(&mut self, participant_id: &str, profile: ResolvedParticipant) {
        self.resolved.insert(participant_id.to_string(), profile);
        let reprojected: Vec<(usize, ConversationView)> = self
            .conversations
            .iter()
            .enumerate()
            .filter(|(_, view)| view.other_participant_id == participant_id)
            .filter_map(|(index, view)| {
                self.records
                    .get(&view.id)
                    .map(|record| (index, self.project(record)))
            })
            .collect();
        for (index, view) in reprojected {
            self.conversations[index] = view;
        }
    }

    /// Whether a conversation passes the query and the status mode
    pub fn matches(&self, view: &ConversationView) -> bool {
        let query = self.query.trim().to_lowercase();
        let text_ok = query.is_empty()
            || view.participant_name.to_lowercase().contains(&query)
            || view
                .property_ref
                .as_ref()
                .is_some_and(|p| p.title.to_lowercase().contains(&query))
            || view
                .subject
                .as_ref()
                .is_some_and(|s| s.to_lowercase().contains(&query));

        let status_ok = match self.status_filter {
            StatusFilter::All => true,
            StatusFilter::Unread => view.unread_count > 0,
            StatusFilter::Starred => view.is_starred,
        };

        text_ok && status_ok
    }

    /// Conversations passing every filter, in repository order
    pub fn visible(&self) -> Vec<&ConversationView> {
        self.conversations.iter().filter(|v| self.matches(v)).collect()
    }

    /// Currently selected visible conversation
    pub fn selected(&self) -> Option<&ConversationView> {
        self.visible().get(self.selected_index).copied()
    }

    /// Move to next conversation
    pub fn next(&mut self) {
        let count = self.visible().len();
        if count > 0 {
            self.selected_index = (self.selected_index + 1) % count;
        }
    }

    /// Move to previous conversation
    pub fn previous(&mut self) {
        let count = self.visible().len();
        if count > 0 {
            if self.selected_index > 0 {
                self.selected_index -= 1;
            } else {
                self.selected_index = count - 1;
            }
        }
    }

    /// Start a list fetch
    pub fn begin_refresh(&mut self) -> RefreshToken {
        self.generation += 1;
        self.load_state = LoadState::Loading;
        RefreshToken(self.generation)
    }

    /// Apply a list fetch
    ///
    /// Returns false when the token was superseded and the result discarded.
    /// A failed fetch keeps the previously loaded list.
    pub fn finish_refresh(&mut self, token: RefreshToken, result: Result<Vec<Conversation>>) -> bool {
        if token.0 != self.generation {
            tracing::debug!("Discarding stale conversation fetch {}", token.0);
            return false;
        }

        match result {
            Ok(raw) => {
                let shown: Vec<Conversation> = raw
                    .into_iter()
                    .filter(|c| self.show_archived || !c.is_archived)
                    .collect();
                self.conversations = shown.iter().map(|c| self.project(c)).collect();
                self.records = shown.into_iter().map(|c| (c.id.clone(), c)).collect();
                self.load_state = LoadState::Loaded;
                self.clamp_selection();
            }
            Err(e) => {
                tracing::warn!("Failed to load conversations: {}", e);
                self.load_state = LoadState::Failed(e.to_string());
            }
        }
        true
    }

    /// Fetch the list from the repository
    pub async fn refresh(
        &mut self,
        repo: &ConversationRepository,
        limit: usize,
        timeout: Duration,
    ) -> bool {
        let token = self.begin_refresh();
        let result = crate::with_timeout(
            timeout,
            repo.list_for_participant(&self.viewer_id, self.show_archived, limit),
        )
        .await;
        self.finish_refresh(token, result)
    }

    /// Reflect a confirmed record in the list
    ///
    /// Known conversations are replaced in place; a new one is put first,
    /// where the repository order would place it.
    pub fn apply_confirmed(&mut self, conversation: &Conversation) {
        let view = self.project(conversation);
        let position = self.conversations.iter().position(|v| v.id == view.id);

        if conversation.is_archived && !self.show_archived {
            if let Some(index) = position {
                self.conversations.remove(index);
                self.records.remove(&conversation.id);
                self.clamp_selection();
            }
            return;
        }

        self.records
            .insert(conversation.id.clone(), conversation.clone());

        match position {
            Some(index) => self.conversations[index] = view,
            None => self.conversations.insert(0, view),
        }
    }

    /// Flip the starred flag once the store confirms it
    pub async fn toggle_star(&mut self, repo: &ConversationRepository, id: &str) -> Result<()> {
        let current = self.find(id)?.is_starred;
        let patch = ConversationPatch {
            is_starred: Some(!current),
            ..ConversationPatch::default()
        };
        self.write_flag(repo, id, patch, "star").await
    }

    /// Flip the muted flag once the store confirms it
    pub async fn toggle_mute(&mut self, repo: &ConversationRepository, id: &str) -> Result<()> {
        let current = self.find(id)?.is_muted;
        let patch = ConversationPatch {
            is_muted: Some(!current),
            ..ConversationPatch::default()
        };
        self.write_flag(repo, id, patch, "mute").await
    }

    /// Archive a conversation once the store confirms it
    pub async fn archive(&mut self, repo: &ConversationRepository, id: &str) -> Result<()> {
        self.find(id)?;
        let patch = ConversationPatch {
            is_archived: Some(true),
            ..ConversationPatch::default()
        };
        self.write_flag(repo, id, patch, "archive").await
    }

    /// Restore an archived conversation once the store confirms it
    pub async fn unarchive(&mut self, repo: &ConversationRepository, id: &str) -> Result<()> {
        self.find(id)?;
        let patch = ConversationPatch {
            is_archived: Some(false),
            ..ConversationPatch::default()
        };
        self.write_flag(repo, id, patch, "unarchive").await
    }

    /// Pending notifications
    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    /// Raise a notification
    pub fn notify(&mut self, message: String) -> u64 {
        let id = self.next_notification_id;
        self.next_notification_id += 1;
        self.notifications.push(Notification { id, message });
        id
    }

    /// Dismiss a notification
    pub fn dismiss(&mut self, id: u64) {
        self.notifications.retain(|n| n.id != id);
    }

    async fn write_flag(
        &mut self,
        repo: &ConversationRepository,
        id: &str,
        patch: ConversationPatch,
        action: &str,
    ) -> Result<()> {
        match repo.update(id, patch).await {
            Ok(stored) => {
                tracing::info!("Conversation {} {} confirmed", id, action);
                self.apply_confirmed(&stored);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Failed to {} conversation {}: {}", action, id, e);
                self.notify(format!("Could not {} conversation: {}", action, e));
                Err(e)
            }
        }
    }

    fn find(&self, id: &str) -> Result<&ConversationView> {
        self.conversations
            .iter()
            .find(|v| v.id == id)
            .ok_or_else(|| Error::NotFound(format!("Conversation {}", id)))
    }

    fn project(&self, conversation: &Conversation) -> ConversationView {
        let other = conversation
            .participant_ids
            .other_than(&self.viewer_id)
            .unwrap_or(conversation.initiator_id.as_str());
        transform_conversation(conversation, &self.viewer_id, self.resolved.get(other))
    }

    fn clamp_selection(&mut self) {
        let count = self.visible().len();
        if self.selected_index >= count {
            self.selected_index = count.saturating_sub(1);
        }
    }
}
