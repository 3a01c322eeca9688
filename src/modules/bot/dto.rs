use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Plain-text message forwarded by the messaging bridge.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct IncomingMessage {
    pub chat_id: i64,
    pub message_id: i64,
    #[validate(length(min = 1, max = 4096, message = "Text must be 1-4096 characters"))]
    pub text: String,
}

/// Button press forwarded by the messaging bridge.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct IncomingCallback {
    pub chat_id: i64,
    pub message_id: i64,
    /// `t=<token>;v=<variant-code>`
    #[validate(length(min = 1, max = 64, message = "Callback data must be 1-64 characters"))]
    pub data: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Greeted,
    Help,
    Ignored,
    NotALink,
    ChoicesSent,
    Queued,
    InvalidButton,
    QueueBusy,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DispatchResponse {
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
}

impl From<Outcome> for DispatchResponse {
    fn from(outcome: Outcome) -> Self {
        Self {
            outcome,
            token: None,
            job_id: None,
        }
    }
}
