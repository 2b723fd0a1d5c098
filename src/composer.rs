//! Message composer
//!
//! Owns the draft of one open conversation: text, staged attachments and the
//! reply context. Key events are interpreted here at the raw level so that
//! Enter and Shift+Enter behave the same on every front end. At most one send
//! is in flight per composer; further attempts are ignored, not queued.

use crate::directory::Viewer;
use crate::messaging::{self, OutgoingMessage, PostedMessage};
use crate::storage::message::preview_text;
use crate::storage::settings::MAX_ATTACHMENTS;
use crate::storage::{AttachmentRefs, PropertyInfo, ReplyRef, Repositories, Settings};
use crate::view::MessageView;
use crate::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Length of the quoted snippet kept in a reply context
const REPLY_PREVIEW_CHARS: usize = 80;

/// Counts local previews that are still alive
#[derive(Debug, Clone, Default)]
pub struct PreviewTracker {
    live: Arc<AtomicUsize>,
}

impl PreviewTracker {
    /// Create a tracker with no live previews
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a preview for a local attachment source
    pub fn create(&self, source: &str) -> PreviewHandle {
        self.live.fetch_add(1, Ordering::SeqCst);
        PreviewHandle {
            source: source.to_string(),
            live: self.live.clone(),
        }
    }

    /// Number of previews not yet released
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

/// Local preview of a staged attachment, released when dropped
#[derive(Debug)]
pub struct PreviewHandle {
    source: String,
    live: Arc<AtomicUsize>,
}

impl PreviewHandle {
    /// Source the preview was made from
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!("Released preview for {}", self.source);
    }
}

/// An attachment waiting to be sent
#[derive(Debug)]
pub struct StagedAttachment {
    /// Reference sent with the message
    pub reference: String,
    /// Local preview
    pub preview: PreviewHandle,
}

/// What a key press did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// The caller should send the draft now
    SendRequested,
    /// Text was inserted
    Inserted,
    /// Text was deleted
    Deleted,
    /// Reply mode was cancelled
    ReplyCancelled,
    /// Nothing happened
    Ignored,
}

/// Draft state of one conversation
#[derive(Debug)]
pub struct Composer {
    /// Draft text
    content: String,
    /// Staged attachments in order
    attachments: Vec<StagedAttachment>,
    /// Message being answered
    reply_to: Option<ReplyRef>,
    /// Listing card to embed
    property_info: Option<PropertyInfo>,
    /// A send is in flight
    sending: bool,
    /// Draft length limit in characters
    max_content_chars: usize,
    /// Attachment limit
    max_attachments: usize,
    /// Preview allocator
    previews: PreviewTracker,
    /// Status message (send failures)
    pub status_message: Option<String>,
}

impl Composer {
    /// Create an empty composer
    pub fn new(settings: &Settings, previews: PreviewTracker) -> Self {
        Self {
            content: String::new(),
            attachments: Vec::new(),
            reply_to: None,
            property_info: None,
            sending: false,
            max_content_chars: settings.max_content_chars,
            max_attachments: settings.max_attachments.min(MAX_ATTACHMENTS),
            previews,
            status_message: None,
        }
    }

    /// Draft text
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Staged attachments
    pub fn attachments(&self) -> &[StagedAttachment] {
        &self.attachments
    }

    /// Reply context, if any
    pub fn reply_to(&self) -> Option<&ReplyRef> {
        self.reply_to.as_ref()
    }

    /// Whether a send is in flight
    pub fn is_sending(&self) -> bool {
        self.sending
    }

    /// Whether the draft may be sent now
    pub fn can_send(&self) -> bool {
        (!self.content.trim().is_empty() || !self.attachments.is_empty()) && !self.sending
    }

    /// Replace the draft text, cut at the length limit
    pub fn set_content(&mut self, content: &str) {
        self.content = content.chars().take(self.max_content_chars).collect();
    }

    /// Add character to input
    ///
    /// Returns false when the draft is already at its limit.
    pub fn add_char(&mut self, c: char) -> bool {
        if self.content.chars().count() >= self.max_content_chars {
            return false;
        }
        self.content.push(c);
        true
    }

    /// Remove last character from input
    pub fn backspace(&mut self) -> bool {
        self.content.pop().is_some()
    }

    /// Interpret a raw key event
    ///
    /// Enter asks for a send and never inserts a newline; Shift+Enter inserts
    /// one newline and never sends.
    pub fn handle_key(&mut self, key: KeyEvent) -> KeyOutcome {
        if key.kind == KeyEventKind::Release {
            return KeyOutcome::Ignored;
        }

        match key.code {
            KeyCode::Enter if key.modifiers.contains(KeyModifiers::SHIFT) => {
                if self.add_char('\n') {
                    KeyOutcome::Inserted
                } else {
                    KeyOutcome::Ignored
                }
            }
            KeyCode::Enter => {
                if self.can_send() {
                    KeyOutcome::SendRequested
                } else {
                    KeyOutcome::Ignored
                }
            }
            KeyCode::Char(c)
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
            {
                if self.add_char(c) {
                    KeyOutcome::Inserted
                } else {
                    KeyOutcome::Ignored
                }
            }
            KeyCode::Backspace => {
                if self.backspace() {
                    KeyOutcome::Deleted
                } else {
                    KeyOutcome::Ignored
                }
            }
            KeyCode::Esc if self.reply_to.is_some() => {
                self.cancel_reply();
                KeyOutcome::ReplyCancelled
            }
            _ => KeyOutcome::Ignored,
        }
    }

    /// Stage local attachments
    ///
    /// Anything beyond the attachment limit is dropped without error.
    /// Returns the number actually staged.
    pub fn stage_attachments<I, S>(&mut self, sources: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut staged = 0;
        let mut dropped = 0;
        for source in sources {
            if self.attachments.len() >= self.max_attachments {
                dropped += 1;
                continue;
            }
            let source = source.as_ref();
            self.attachments.push(StagedAttachment {
                reference: source.to_string(),
                preview: self.previews.create(source),
            });
            staged += 1;
        }
        if dropped > 0 {
            tracing::debug!("Attachment limit reached, dropped {} extra", dropped);
        }
        staged
    }

    /// Remove one staged attachment, releasing its preview
    pub fn remove_attachment(&mut self, index: usize) -> Option<String> {
        if index < self.attachments.len() {
            Some(self.attachments.remove(index).reference)
        } else {
            None
        }
    }

    /// Answer an earlier message
    pub fn start_reply(&mut self, message: &MessageView) {
        self.reply_to = Some(ReplyRef {
            id: message.id.clone(),
            preview_text: preview_text(&message.content, message.attachments.len(), REPLY_PREVIEW_CHARS),
            original_sender_name: message.sender_name.clone(),
        });
    }

    /// Leave reply mode
    pub fn cancel_reply(&mut self) {
        self.reply_to = None;
    }

    /// Embed a listing card in the next message
    pub fn attach_property(&mut self, info: Option<PropertyInfo>) {
        self.property_info = info;
    }

    /// Clear the whole draft, releasing every preview
    pub fn clear(&mut self) {
        self.content.clear();
        self.attachments.clear();
        self.reply_to = None;
        self.property_info = None;
    }

    /// Take a snapshot of the draft and mark a send in flight
    ///
    /// Returns `None` when the draft is empty or a send is already in flight.
    pub fn begin_send(&mut self) -> Option<OutgoingMessage> {
        if !self.can_send() {
            tracing::debug!("Send ignored (sending: {})", self.sending);
            return None;
        }

        self.sending = true;
        self.status_message = None;
        Some(OutgoingMessage {
            content: self.content.trim().to_string(),
            attachment_refs: AttachmentRefs::new(
                self.attachments.iter().map(|a| a.reference.clone()).collect(),
            ),
            reply_to: self.reply_to.clone(),
            property_info: self.property_info.clone(),
        })
    }

    /// Conclude the in-flight send
    ///
    /// Success clears the draft; failure keeps it for a retry.
    pub fn finish_send<T>(&mut self, result: &Result<T>) {
        self.sending = false;
        match result {
            Ok(_) => self.clear(),
            Err(e) => {
                self.status_message = Some(format!("Message not sent: {}", e));
            }
        }
    }

    /// Send the draft to a conversation
    ///
    /// Returns `Ok(None)` when there was nothing to send.
    pub async fn send(
        &mut self,
        repos: &Repositories,
        conversation_id: &str,
        sender: &Viewer,
        settings: &Settings,
    ) -> Result<Option<PostedMessage>> {
        let Some(outgoing) = self.begin_send() else {
            return Ok(None);
        };

        let result =
            messaging::post_message(repos, conversation_id, sender, outgoing, settings).await;
        self.finish_send(&result);
        result.map(Some)
    }
}
