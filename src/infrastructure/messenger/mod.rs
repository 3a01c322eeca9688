//! Outbound side of the messaging platform.
//!
//! The service never talks to a chat platform directly. It hands
//! [`OutboundMessage`]s to a [`Messenger`], which is either an HTTP bridge
//! ([`HttpMessenger`]) or, without a configured bridge, a log sink
//! ([`LogMessenger`]).

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod http;
pub mod logging;

pub use http::HttpMessenger;
pub use logging::LogMessenger;

#[derive(Debug, thiserror::Error)]
pub enum MessengerError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("messaging bridge returned HTTP {0}")]
    HttpStatus(u16),
}

/// How a finished file is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Audio,
    Video,
    Document,
}

/// A selectable button: label shown to the user, data sent back on click.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Choice {
    pub label: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    Text {
        chat_id: i64,
        text: String,
        reply_to: Option<i64>,
    },
    Choices {
        chat_id: i64,
        text: String,
        reply_to: Option<i64>,
        rows: Vec<Vec<Choice>>,
    },
    File {
        chat_id: i64,
        kind: FileKind,
        path: PathBuf,
        caption: String,
    },
}

impl OutboundMessage {
    pub fn text(chat_id: i64, text: impl Into<String>, reply_to: Option<i64>) -> Self {
        OutboundMessage::Text {
            chat_id,
            text: text.into(),
            reply_to,
        }
    }
}

#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send(&self, message: OutboundMessage) -> Result<(), MessengerError>;
}
