use super::dto::{DispatchResponse, IncomingCallback, IncomingMessage};
use super::service::BotService;
use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::infrastructure::queue::job_queue::QueueError;
use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use validator::Validate;

fn failure_status(err: &anyhow::Error) -> StatusCode {
    match err.downcast_ref::<QueueError>() {
        Some(QueueError::Closed) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Handle a text message from a chat
#[utoipa::path(
    post,
    path = "/api/v1/bot/messages",
    request_body = IncomingMessage,
    responses(
        (status = 202, description = "Message handled", body = ApiResponse<DispatchResponse>),
        (status = 422, description = "Validation failed")
    ),
    tag = "Bot"
)]
pub async fn post_message(
    State(state): State<AppState>,
    Json(payload): Json<IncomingMessage>,
) -> impl IntoResponse {
    if let Err(e) = payload.validate() {
        return ApiError::from(e).into_response();
    }

    match BotService::handle_message(state, payload).await {
        Ok(resp) => ApiSuccess(ApiResponse::success(resp, "Message handled"), StatusCode::ACCEPTED)
            .into_response(),
        Err(e) => ApiError(e.to_string(), failure_status(&e)).into_response(),
    }
}

/// Handle a button press
#[utoipa::path(
    post,
    path = "/api/v1/bot/callbacks",
    request_body = IncomingCallback,
    responses(
        (status = 202, description = "Callback handled", body = ApiResponse<DispatchResponse>),
        (status = 422, description = "Validation failed"),
        (status = 503, description = "Job queue is shut down")
    ),
    tag = "Bot"
)]
pub async fn post_callback(
    State(state): State<AppState>,
    Json(payload): Json<IncomingCallback>,
) -> impl IntoResponse {
    if let Err(e) = payload.validate() {
        return ApiError::from(e).into_response();
    }

    match BotService::handle_callback(state, payload).await {
        Ok(resp) => ApiSuccess(ApiResponse::success(resp, "Callback handled"), StatusCode::ACCEPTED)
            .into_response(),
        Err(e) => ApiError(e.to_string(), failure_status(&e)).into_response(),
    }
}
