//! Messaging settings and configuration

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Hard ceiling on staged attachments per message
pub const MAX_ATTACHMENTS: usize = 5;

/// Hard ceiling on participants per conversation
pub const MAX_PARTICIPANTS: usize = 8;

/// Messaging settings
///
/// Persistent configuration for the messaging core.
/// Settings are stored in JSON format and can be loaded/saved from disk.
/// Missing fields fall back to their defaults.
///
/// # Example
/// ```rust,no_run
/// use propchat::storage::Settings;
///
/// // Load settings (returns default if file doesn't exist)
/// let settings = Settings::load("propchat.json").expect("Failed to load");
///
/// println!("Max message length: {}", settings.max_content_chars);
/// println!("Search debounce: {:?}", settings.search_debounce());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Maximum draft length in characters
    pub max_content_chars: usize,
    /// Maximum staged attachments per message (never above `MAX_ATTACHMENTS`)
    pub max_attachments: usize,
    /// Debounce delay for recipient search input in milliseconds
    pub search_debounce_ms: u64,
    /// Maximum recipient search results requested from the directory
    pub recipient_search_limit: usize,
    /// Maximum messages fetched when opening a conversation
    pub message_page_limit: usize,
    /// Maximum conversations fetched for the list
    pub conversation_page_limit: usize,
    /// Length of the last-message preview stored on the conversation
    pub preview_chars: usize,
    /// Upper bound for any single fetch in milliseconds
    pub fetch_timeout_ms: u64,
    /// Path of the SQLite document database
    pub database_path: String,
}

impl Settings {
    /// Load settings from a JSON file
    ///
    /// # Arguments
    /// * `path` - Path to the settings file
    ///
    /// # Returns
    /// The loaded settings, or default settings if file doesn't exist
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(path)
            .map_err(|e| Error::Storage(format!("Failed to read settings: {}", e)))?;

        // Handle empty file (return defaults)
        if data.trim().is_empty() {
            return Ok(Self::default());
        }

        let mut settings: Self = serde_json::from_str(&data)
            .map_err(|e| Error::Storage(format!("Failed to parse settings: {}", e)))?;

        settings.validate();

        Ok(settings)
    }

    /// Save settings to a JSON file
    ///
    /// # Arguments
    /// * `path` - Path to save the settings file
    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Storage(format!("Failed to create settings directory: {}", e)))?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Storage(format!("Failed to serialize settings: {}", e)))?;

        std::fs::write(path, json)
            .map_err(|e| Error::Storage(format!("Failed to write settings: {}", e)))?;

        Ok(())
    }

    /// Clamp values that would break the composer or the fetch loop
    pub fn validate(&mut self) {
        if self.max_attachments > MAX_ATTACHMENTS {
            tracing::warn!(
                "max_attachments {} exceeds ceiling, clamping to {}",
                self.max_attachments,
                MAX_ATTACHMENTS
            );
            self.max_attachments = MAX_ATTACHMENTS;
        }
        if self.max_content_chars == 0 {
            self.max_content_chars = Self::default().max_content_chars;
        }
        if self.preview_chars == 0 {
            self.preview_chars = Self::default().preview_chars;
        }
        if self.fetch_timeout_ms == 0 {
            self.fetch_timeout_ms = Self::default().fetch_timeout_ms;
        }
        if self.message_page_limit == 0 {
            self.message_page_limit = Self::default().message_page_limit;
        }
        if self.conversation_page_limit == 0 {
            self.conversation_page_limit = Self::default().conversation_page_limit;
        }
    }

    /// Search debounce as a `Duration`
    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    /// Fetch timeout as a `Duration`
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_content_chars: 5000,
            max_attachments: MAX_ATTACHMENTS,
            search_debounce_ms: 300,
            recipient_search_limit: 20,
            message_page_limit: 500,
            conversation_page_limit: 200,
            preview_chars: 100,
            fetch_timeout_ms: 15_000,
            database_path: "./app_data/propchat.db".to_string(),
        }
    }
}
