use async_trait::async_trait;
use tracing::{debug, info};

use super::{Messenger, MessengerError, OutboundMessage};

/// Logs outbound messages instead of delivering them.
#[derive(Debug, Clone, Default)]
pub struct LogMessenger;

#[async_trait]
impl Messenger for LogMessenger {
    async fn send(&self, message: OutboundMessage) -> Result<(), MessengerError> {
        match &message {
            OutboundMessage::Text { chat_id, text, .. } => {
                info!(chat_id, text = %text, "📨 Outbound text");
            }
            OutboundMessage::Choices { chat_id, rows, .. } => {
                let choices = rows.iter().map(Vec::len).sum::<usize>();
                info!(chat_id, choices, "📨 Outbound choices");
                debug!(rows = %serde_json::to_string(rows).unwrap_or_default(), "Choice rows");
            }
            OutboundMessage::File {
                chat_id, kind, path, ..
            } => {
                info!(chat_id, ?kind, path = %path.display(), "📨 Outbound file");
            }
        }
        Ok(())
    }
}
