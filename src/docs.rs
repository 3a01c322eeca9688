use utoipa::OpenApi;
use crate::common::response::HealthResponse;
use crate::modules::bot::dto::*;
use crate::modules::bot::model::Variant;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health,
        crate::modules::bot::handler::post_message,
        crate::modules::bot::handler::post_callback,
    ),
    components(
        schemas(
            IncomingMessage, IncomingCallback, DispatchResponse, Outcome, Variant,
            HealthResponse,
        )
    ),
    tags(
        (name = "Bot", description = "Inbound chat messages and button presses"),
        (name = "Health", description = "Service status")
    )
)]
pub struct ApiDoc;
