//! Message thread of one open conversation
//!
//! Orders the fetched messages, groups them by the viewer's calendar day,
//! decides which incoming messages carry an avatar and tells the view when it
//! has to jump to the latest message.

use crate::storage::Message;
use crate::view::{transform_message, MessageView, Side};
use crate::Result;
use chrono::{DateTime, Datelike, NaiveDate, TimeZone};

/// Messages of one calendar day
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateGroup {
    /// Day in the viewer's time zone
    pub date: NaiveDate,
    /// Header text
    pub label: String,
    /// Messages of that day, oldest first
    pub items: Vec<ThreadItem>,
}

/// A message placed in the thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadItem {
    /// The message
    pub message: MessageView,
    /// Whether the sender avatar is drawn next to it
    pub show_avatar: bool,
}

/// Header text for a day
///
/// `"Today"`, `"Yesterday"`, otherwise e.g. `"Monday, March 4"`.
pub fn date_label(date: NaiveDate, today: NaiveDate) -> String {
    if date == today {
        "Today".to_string()
    } else if today.pred_opt() == Some(date) {
        "Yesterday".to_string()
    } else {
        format!("{}, {} {}", date.format("%A"), date.format("%B"), date.day())
    }
}

/// Sort by creation time, ties broken by id
pub fn sort_messages(messages: &mut [MessageView]) {
    messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
}

/// Group messages by local calendar day
///
/// Messages are ordered by creation time first, so every day appears once.
/// Days are taken in the time zone of `now`. Within a day an incoming
/// message shows its avatar when it opens the day or follows one of the
/// viewer's own messages, so runs from the other side collapse to one avatar.
pub fn group_by_date<Tz: TimeZone>(messages: &[MessageView], now: &DateTime<Tz>) -> Vec<DateGroup> {
    let zone = now.timezone();
    let today = now.date_naive();
    let mut ordered = messages.to_vec();
    sort_messages(&mut ordered);
    let mut groups: Vec<DateGroup> = Vec::new();

    for message in &ordered {
        let date = message.created_at.with_timezone(&zone).date_naive();

        let starts_group = groups.last().is_none_or(|g| g.date != date);
        if starts_group {
            groups.push(DateGroup {
                date,
                label: date_label(date, today),
                items: Vec::new(),
            });
        }

        let Some(group) = groups.last_mut() else {
            continue;
        };
        let show_avatar = message.sender == Side::Them
            && group
                .items
                .last()
                .is_none_or(|prev| prev.message.sender == Side::Me);

        group.items.push(ThreadItem {
            message: message.clone(),
            show_avatar,
        });
    }

    groups
}

/// Token identifying one thread fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadToken(u64);

/// Thread state for the open conversation
#[derive(Debug)]
pub struct ThreadController {
    /// Viewer the messages are projected for
    viewer_id: String,
    /// Open conversation
    conversation_id: Option<String>,
    /// Messages, oldest first
    messages: Vec<MessageView>,
    /// Latest issued fetch
    generation: u64,
    /// Whether a fetch is outstanding
    pub is_loading: bool,
    /// Lines scrolled up from the latest message
    pub scroll_offset: usize,
    /// Set when the view must jump to the latest message
    scroll_to_latest: bool,
    /// Status message (load failures)
    pub status_message: Option<String>,
}

impl ThreadController {
    /// Create an empty thread for a viewer
    pub fn new(viewer_id: &str) -> Self {
        Self {
            viewer_id: viewer_id.to_string(),
            conversation_id: None,
            messages: Vec::new(),
            generation: 0,
            is_loading: false,
            scroll_offset: 0,
            scroll_to_latest: false,
            status_message: None,
        }
    }

    /// Open conversation, if any
    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    /// Ordered messages
    pub fn messages(&self) -> &[MessageView] {
        &self.messages
    }

    /// Most recent message
    pub fn latest(&self) -> Option<&MessageView> {
        self.messages.last()
    }

    /// Start fetching a conversation
    ///
    /// Switching to another conversation clears the thread; refreshing the
    /// open one keeps what is shown until the fetch completes.
    pub fn begin_load(&mut self, conversation_id: &str) -> LoadToken {
        if self.conversation_id.as_deref() != Some(conversation_id) {
            self.conversation_id = Some(conversation_id.to_string());
            self.messages.clear();
            self.scroll_offset = 0;
            self.scroll_to_latest = true;
        }
        self.generation += 1;
        self.is_loading = true;
        LoadToken(self.generation)
    }

    /// Apply a fetch result
    ///
    /// Returns false when the token was superseded and the result discarded.
    pub fn finish_load(&mut self, token: LoadToken, result: Result<Vec<Message>>) -> bool {
        if token.0 != self.generation {
            tracing::debug!("Discarding stale thread fetch {}", token.0);
            return false;
        }
        self.is_loading = false;

        match result {
            Ok(raw) => {
                let mut messages: Vec<MessageView> = raw
                    .iter()
                    .filter(|m| Some(m.conversation_id.as_str()) == self.conversation_id.as_deref())
                    .map(|m| transform_message(m, &self.viewer_id))
                    .collect();
                sort_messages(&mut messages);

                let changed = messages.len() != self.messages.len()
                    || messages.last().map(|m| &m.id) != self.messages.last().map(|m| &m.id);
                self.messages = messages;
                self.status_message = None;
                if changed {
                    self.request_scroll_to_latest();
                }
            }
            Err(e) => {
                tracing::warn!("Failed to load messages: {}", e);
                self.status_message = Some(format!("Failed to load messages: {}", e));
            }
        }
        true
    }

    /// Load a conversation in one step
    pub fn load(&mut self, conversation_id: &str, messages: Vec<Message>) {
        let token = self.begin_load(conversation_id);
        self.finish_load(token, Ok(messages));
    }

    /// Add or replace one message of the open conversation
    ///
    /// Returns false when the message belongs to another conversation.
    pub fn append(&mut self, message: &Message) -> bool {
        if self.conversation_id.as_deref() != Some(message.conversation_id.as_str()) {
            return false;
        }

        let view = transform_message(message, &self.viewer_id);
        match self.messages.iter_mut().find(|m| m.id == view.id) {
            Some(existing) => *existing = view,
            None => {
                self.messages.push(view);
                sort_messages(&mut self.messages);
                self.request_scroll_to_latest();
            }
        }
        true
    }

    /// Date-grouped thread as seen at `now`
    pub fn groups<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Vec<DateGroup> {
        group_by_date(&self.messages, now)
    }

    /// Consume the pending jump-to-latest request
    pub fn take_scroll_intent(&mut self) -> bool {
        std::mem::take(&mut self.scroll_to_latest)
    }

    /// Scroll towards older messages
    pub fn scroll_up(&mut self, max_offset: usize) {
        if self.scroll_offset < max_offset {
            self.scroll_offset += 1;
        }
    }

    /// Scroll towards the latest message
    pub fn scroll_down(&mut self) {
        if self.scroll_offset > 0 {
            self.scroll_offset -= 1;
        }
    }

    fn request_scroll_to_latest(&mut self) {
        self.scroll_offset = 0;
        self.scroll_to_latest = true;
    }
}
