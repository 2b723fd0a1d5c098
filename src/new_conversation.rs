//! New conversation flow
//!
//! Two steps: pick a recipient, then write the first message. The flow is an
//! explicit state machine; every change goes through a named transition and
//! terminal states (`Submitted`, `Cancelled`) accept no further input.
//!
//! Searches and listing fetches are requested by the flow and executed by
//! the caller. Each request carries a token so that a response arriving after
//! a newer request, or after the step changed, is dropped.

use crate::directory::{
    PropertyDirectory, PropertyListing, RecipientCandidate, RecipientDirectory, Viewer,
};
use crate::messaging::{self, NewConversation, PostedMessage};
use crate::storage::{ConversationType, ParticipantRole, Repositories, Settings};
use crate::{with_timeout, Error, Result};
use std::time::{Duration, Instant};

/// Token identifying one recipient search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchToken(u64);

/// Token identifying one listing fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyToken(u64);

/// Recipient search the caller should run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Token to hand back with the results
    pub token: SearchToken,
    /// Text query
    pub query: String,
    /// The viewer, never a valid recipient
    pub exclude_id: String,
    /// Roles to search
    pub roles: Vec<ParticipantRole>,
    /// Maximum results
    pub limit: usize,
}

/// Listing fetch the caller should run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyRequest {
    /// Token to hand back with the listings
    pub token: PropertyToken,
    /// Owner whose listings are needed
    pub owner_id: String,
}

/// Recipient's listings, fetched on demand
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Listings {
    /// Not needed yet
    #[default]
    NotRequested,
    /// Fetch outstanding
    Loading,
    /// Fetched
    Loaded(Vec<PropertyListing>),
    /// Fetch failed; choosing inquiry again retries
    Failed(String),
}

/// Step of the flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowState {
    /// Searching for the person to write to
    RecipientSelection {
        /// Current query text
        query: String,
        /// Latest results
        results: Vec<RecipientCandidate>,
        /// A search is outstanding
        searching: bool,
        /// Last search failure
        error: Option<String>,
    },
    /// Writing the first message
    MessageComposition {
        /// Chosen recipient
        recipient: RecipientCandidate,
        /// Conversation kind
        kind: ConversationType,
        /// Recipient's listings
        listings: Listings,
        /// Listing attached to an inquiry
        property: Option<PropertyListing>,
        /// Optional subject line
        subject: Option<String>,
        /// First message text
        draft: String,
        /// A submit is outstanding
        submitting: bool,
        /// Last submit failure
        error: Option<String>,
    },
    /// Conversation created
    Submitted {
        /// The new conversation
        conversation_id: String,
    },
    /// Abandoned by the user
    Cancelled,
}

/// New conversation dialog
#[derive(Debug)]
pub struct NewConversationFlow {
    viewer: Viewer,
    state: FlowState,
    debounce: Duration,
    search_limit: usize,
    fetch_timeout: Duration,
    /// Query waiting for its debounce deadline
    pending_query: Option<(String, Instant)>,
    search_generation: u64,
    property_generation: u64,
}

impl NewConversationFlow {
    /// Start at recipient selection
    pub fn new(viewer: Viewer, settings: &Settings) -> Self {
        Self {
            viewer,
            state: FlowState::RecipientSelection {
                query: String::new(),
                results: Vec::new(),
                searching: false,
                error: None,
            },
            debounce: settings.search_debounce(),
            search_limit: settings.recipient_search_limit,
            fetch_timeout: settings.fetch_timeout(),
            pending_query: None,
            search_generation: 0,
            property_generation: 0,
        }
    }

    /// Start directly at message composition with a known recipient
    ///
    /// An invalid recipient (the viewer) leaves the flow at selection.
    pub fn with_recipient(viewer: Viewer, settings: &Settings, recipient: RecipientCandidate) -> Self {
        let mut flow = Self::new(viewer, settings);
        if let Err(e) = flow.select_recipient(recipient) {
            tracing::warn!("Ignoring preselected recipient: {}", e);
        }
        flow
    }

    /// Current step
    pub fn state(&self) -> &FlowState {
        &self.state
    }

    /// Whether the flow reached a terminal state
    pub fn is_finished(&self) -> bool {
        matches!(self.state, FlowState::Submitted { .. } | FlowState::Cancelled)
    }

    /// Roles the viewer can start conversations with
    pub fn search_roles(&self) -> Vec<ParticipantRole> {
        self.viewer.role.counterpart_roles()
    }

    /// Update the search text
    ///
    /// The search is only requested once the text has been stable for the
    /// debounce delay. Clearing the text clears the results.
    pub fn set_query(&mut self, text: &str, now: Instant) {
        let FlowState::RecipientSelection {
            query,
            results,
            searching,
            ..
        } = &mut self.state
        else {
            return;
        };

        *query = text.to_string();
        if text.trim().is_empty() {
            results.clear();
            *searching = false;
            self.pending_query = None;
            // Invalidate any search still in flight
            self.search_generation += 1;
            return;
        }
        self.pending_query = Some((text.trim().to_string(), now + self.debounce));
    }

    /// Release the debounced search once its deadline passed
    pub fn poll_search(&mut self, now: Instant) -> Option<SearchRequest> {
        let FlowState::RecipientSelection { searching, .. } = &mut self.state else {
            return None;
        };
        match &self.pending_query {
            Some((_, deadline)) if *deadline <= now => {}
            _ => return None,
        }
        let (query, _) = self.pending_query.take()?;

        self.search_generation += 1;
        *searching = true;
        Some(SearchRequest {
            token: SearchToken(self.search_generation),
            query,
            exclude_id: self.viewer.id.clone(),
            roles: self.viewer.role.counterpart_roles(),
            limit: self.search_limit,
        })
    }

    /// Apply search results
    ///
    /// Returns false when the results were stale and dropped. The viewer is
    /// removed even if the directory returned them.
    pub fn apply_search_results(
        &mut self,
        token: SearchToken,
        result: Result<Vec<RecipientCandidate>>,
    ) -> bool {
        let FlowState::RecipientSelection {
            results,
            searching,
            error,
            ..
        } = &mut self.state
        else {
            return false;
        };
        if token.0 != self.search_generation {
            tracing::debug!("Discarding stale recipient search {}", token.0);
            return false;
        }

        *searching = false;
        match result {
            Ok(found) => {
                *results = found
                    .into_iter()
                    .filter(|c| c.id != self.viewer.id)
                    .collect();
                *error = None;
            }
            Err(e) => {
                tracing::warn!("Recipient search failed: {}", e);
                *error = Some(format!("Search failed: {}", e));
            }
        }
        true
    }

    /// Run a search request against a directory and apply its results
    pub async fn run_search(&mut self, directory: &dyn RecipientDirectory, request: SearchRequest) -> bool {
        let result = with_timeout(
            self.fetch_timeout,
            directory.search(&request.query, &request.exclude_id, &request.roles, request.limit),
        )
        .await;
        self.apply_search_results(request.token, result)
    }

    /// Pick the recipient and move on to message composition
    pub fn select_recipient(&mut self, recipient: RecipientCandidate) -> Result<()> {
        if !matches!(self.state, FlowState::RecipientSelection { .. }) {
            return Err(Error::Validation("Recipient can only be chosen while searching".to_string()));
        }
        if recipient.id == self.viewer.id {
            return Err(Error::Validation("Cannot start a conversation with yourself".to_string()));
        }

        self.pending_query = None;
        self.search_generation += 1;
        tracing::debug!("Recipient {} selected", recipient.id);
        self.state = FlowState::MessageComposition {
            recipient,
            kind: ConversationType::General,
            listings: Listings::NotRequested,
            property: None,
            subject: None,
            draft: String::new(),
            submitting: false,
            error: None,
        };
        Ok(())
    }

    /// Choose the conversation kind
    ///
    /// Choosing an inquiry requests the recipient's listings the first time
    /// (or again after a failed fetch); the caller runs the returned request.
    pub fn choose_type(&mut self, chosen: ConversationType) -> Result<Option<PropertyRequest>> {
        if chosen == ConversationType::Support {
            return Err(Error::Validation("Support conversations are not started here".to_string()));
        }
        let FlowState::MessageComposition {
            recipient,
            kind,
            listings,
            property,
            ..
        } = &mut self.state
        else {
            return Err(Error::Validation("No recipient chosen yet".to_string()));
        };

        *kind = chosen;
        if chosen == ConversationType::General {
            *property = None;
            return Ok(None);
        }

        match listings {
            Listings::NotRequested | Listings::Failed(_) => {
                *listings = Listings::Loading;
                self.property_generation += 1;
                Ok(Some(PropertyRequest {
                    token: PropertyToken(self.property_generation),
                    owner_id: recipient.id.clone(),
                }))
            }
            Listings::Loading | Listings::Loaded(_) => Ok(None),
        }
    }

    /// Apply fetched listings
    ///
    /// Returns false when the fetch was stale and dropped.
    pub fn apply_properties(&mut self, token: PropertyToken, result: Result<Vec<PropertyListing>>) -> bool {
        let FlowState::MessageComposition { listings, .. } = &mut self.state else {
            return false;
        };
        if token.0 != self.property_generation {
            tracing::debug!("Discarding stale listing fetch {}", token.0);
            return false;
        }

        *listings = match result {
            Ok(found) => Listings::Loaded(found),
            Err(e) => {
                tracing::warn!("Listing fetch failed: {}", e);
                Listings::Failed(e.to_string())
            }
        };
        true
    }

    /// Run a listing request against a directory and apply its result
    pub async fn load_properties(&mut self, directory: &dyn PropertyDirectory, request: PropertyRequest) -> bool {
        let result = with_timeout(self.fetch_timeout, directory.list_owned_by(&request.owner_id)).await;
        self.apply_properties(request.token, result)
    }

    /// Attach one of the recipient's listings, or detach with `None`
    pub fn attach_property(&mut self, property_id: Option<&str>) -> Result<()> {
        let FlowState::MessageComposition {
            kind,
            listings,
            property,
            ..
        } = &mut self.state
        else {
            return Err(Error::Validation("No recipient chosen yet".to_string()));
        };

        let Some(property_id) = property_id else {
            *property = None;
            return Ok(());
        };
        if *kind != ConversationType::Inquiry {
            return Err(Error::Validation("Only inquiries carry a listing".to_string()));
        }
        let Listings::Loaded(available) = listings else {
            return Err(Error::Validation("Listings are not loaded".to_string()));
        };

        let chosen = available
            .iter()
            .find(|p| p.id == property_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Listing {}", property_id)))?;
        *property = Some(chosen);
        Ok(())
    }

    /// Set the first message text
    pub fn set_draft(&mut self, text: &str) {
        if let FlowState::MessageComposition { draft, .. } = &mut self.state {
            *draft = text.to_string();
        }
    }

    /// Set the subject line
    pub fn set_subject(&mut self, text: &str) {
        if let FlowState::MessageComposition { subject, .. } = &mut self.state {
            *subject = Some(text.to_string()).filter(|s| !s.trim().is_empty());
        }
    }

    /// Validate the draft and mark a submit in flight
    ///
    /// Returns `None` when not composing, already submitting, or the draft is
    /// empty (the error is recorded on the state).
    pub fn begin_submit(&mut self) -> Option<NewConversation> {
        let FlowState::MessageComposition {
            recipient,
            kind,
            property,
            subject,
            draft,
            submitting,
            error,
            ..
        } = &mut self.state
        else {
            return None;
        };
        if *submitting {
            return None;
        }
        if draft.trim().is_empty() {
            *error = Some("Write a message first".to_string());
            return None;
        }

        *submitting = true;
        *error = None;
        Some(NewConversation {
            initiator: self.viewer.clone(),
            recipient_id: recipient.id.clone(),
            kind: *kind,
            subject: subject.clone(),
            property: if *kind == ConversationType::Inquiry {
                property.clone()
            } else {
                None
            },
            content: draft.clone(),
        })
    }

    /// Conclude the in-flight submit
    ///
    /// Failure keeps the draft for a retry and records the error.
    pub fn finish_submit(&mut self, result: &Result<PostedMessage>) {
        match result {
            Ok(posted) => {
                tracing::info!("New conversation {} submitted", posted.conversation.id);
                self.state = FlowState::Submitted {
                    conversation_id: posted.conversation.id.clone(),
                };
            }
            Err(e) => {
                if let FlowState::MessageComposition {
                    submitting, error, ..
                } = &mut self.state
                {
                    *submitting = false;
                    *error = Some(format!("Could not start conversation: {}", e));
                }
            }
        }
    }

    /// Create the conversation and its first message
    ///
    /// Returns `Ok(None)` when there was nothing to submit.
    pub async fn submit(&mut self, repos: &Repositories, settings: &Settings) -> Result<Option<PostedMessage>> {
        let Some(draft) = self.begin_submit() else {
            return Ok(None);
        };
        let result = messaging::start_conversation(repos, draft, settings).await;
        self.finish_submit(&result);
        result.map(Some)
    }

    /// Abandon the flow
    ///
    /// Returns false when the flow already finished.
    pub fn cancel(&mut self) -> bool {
        if self.is_finished() {
            return false;
        }
        self.pending_query = None;
        self.search_generation += 1;
        self.property_generation += 1;
        self.state = FlowState::Cancelled;
        true
    }
}
