//! Outbound messaging contract.
//!
//! The core never talks to a chat network directly. Anything that can send
//! a text with an optional inline keyboard, and edit the message a button
//! was pressed on, can drive the scheduler and the command router.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DeliveryError;

/// Inline button carrying opaque callback data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    pub data: String,
}

impl Button {
    pub fn new(label: impl Into<String>, data: impl ToString) -> Self {
        Self {
            label: label.into(),
            data: data.to_string(),
        }
    }
}

/// Rows of inline buttons.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row holding a single button.
    pub fn button(mut self, label: impl Into<String>, data: impl ToString) -> Self {
        self.rows.push(vec![Button::new(label, data)]);
        self
    }

    pub fn row(mut self, buttons: Vec<Button>) -> Self {
        if !buttons.is_empty() {
            self.rows.push(buttons);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Every callback payload on the keyboard, row by row.
    pub fn callback_data(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().flatten().map(|b| b.data.as_str())
    }
}

/// Result of editing a previously sent message.
///
/// "Nothing changed" is a normal outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Edited,
    Unchanged,
    /// The message is gone or too old to edit; callers usually send a new one.
    NotFound,
}

#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send(
        &self,
        user_id: i64,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), DeliveryError>;

    async fn edit_previous_message(
        &self,
        user_id: i64,
        message_id: i64,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<EditOutcome, DeliveryError>;

    /// Send a file, e.g. a data export.
    async fn send_document(
        &self,
        user_id: i64,
        filename: &str,
        content: Vec<u8>,
        caption: &str,
    ) -> Result<(), DeliveryError>;
}
