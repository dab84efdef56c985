//! Conversation message types.
//!
//! This module contains types for representing turns in a chat transcript,
//! including roles and message content.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents the author of a message in the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageRole {
    /// Message from the user.
    User,
    /// Message from the model.
    Bot,
}

/// A single turn in the conversation.
///
/// Each message has a stable identity for list-diffing, a role, text
/// content, and an optional reference to an externally stored image.
///
/// Messages are immutable once appended, except the most recent Bot
/// message, whose text grows in place while a reply streams in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Stable unique identity for display and diffing.
    pub id: Uuid,
    /// The author of the message.
    pub role: MessageRole,
    /// UTF-8 content. Empty only when an image stands in for text.
    pub text: String,
    /// Reference to an externally stored image, if any.
    pub image_path: Option<String>,
}

impl Message {
    /// Creates a user message with the given text and optional image reference.
    pub fn user(text: impl Into<String>, image_path: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: MessageRole::User,
            text: text.into(),
            image_path,
        }
    }

    /// Creates an empty bot message, ready to receive streamed text.
    pub fn bot() -> Self {
        Self {
            id: Uuid::new_v4(),
            role: MessageRole::Bot,
            text: String::new(),
            image_path: None,
        }
    }

    /// Returns true if this message carries an image reference.
    pub fn has_image(&self) -> bool {
        self.image_path.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message() {
        let msg = Message::user("describe this", Some("cat.jpg".to_string()));
        assert_eq!(msg.role, MessageRole::User);
        assert_eq!(msg.text, "describe this");
        assert!(msg.has_image());
    }

    #[test]
    fn test_bot_message_starts_empty() {
        let msg = Message::bot();
        assert_eq!(msg.role, MessageRole::Bot);
        assert!(msg.text.is_empty());
        assert!(!msg.has_image());
    }

    #[test]
    fn test_unique_ids() {
        let a = Message::user("one", None);
        let b = Message::user("one", None);
        assert_ne!(a.id, b.id);
    }
}
