use axum::{
    Json, Router,
    extract::{FromRequest, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_helpers::{
    ErrorResponse, HealthCheckFuture, JsonBody, ReadinessResponse,
    errors::responses::{
        BadRequestValidationResponse, DeliveryFailedResponse, MethodNotAllowedResponse,
        ServiceUnavailableResponse,
    },
    run_health_checks,
};
use std::sync::Arc;
use utoipa::OpenApi;
use validator::Validate;

use crate::config::RelayMode;
use crate::error::DispatchError;
use crate::models::{
    Channel, ChannelPolicy, DispatchOutcome, DispatchReceipt, EmailTarget, SendEmailRequest,
    SendMessageRequest, SendReceipt, SendWhatsAppRequest, SentResponse, WhatsAppTarget,
};
use crate::service::DispatchFacade;

const TAG: &str = "Notifications";

/// OpenAPI documentation for the relay API
#[derive(OpenApi)]
#[openapi(
    paths(send_email, send_whatsapp, send_message, ready),
    components(
        schemas(
            SendEmailRequest,
            SendWhatsAppRequest,
            SendMessageRequest,
            EmailTarget,
            WhatsAppTarget,
            SentResponse,
            DispatchReceipt,
            SendReceipt,
            Channel,
            ErrorResponse,
            ReadinessResponse
        ),
        responses(
            BadRequestValidationResponse,
            MethodNotAllowedResponse,
            DeliveryFailedResponse,
            ServiceUnavailableResponse
        )
    ),
    tags(
        (name = TAG, description = "Email and WhatsApp delivery endpoints")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
struct RelayState {
    facade: Arc<DispatchFacade>,
    mode: Arc<RelayMode>,
}

/// Create the relay router with all HTTP endpoints
pub fn router(facade: DispatchFacade, mode: RelayMode) -> Router {
    let state = RelayState {
        facade: Arc::new(facade),
        mode: Arc::new(mode),
    };

    Router::new()
        .route("/send-email", post(send_email).fallback(reject_method))
        .route("/send-whatsapp", post(send_whatsapp).fallback(reject_method))
        .route("/send-message", post(send_message).fallback(reject_method))
        .route("/ready", get(ready))
        .with_state(state)
}

/// Runs for every non-POST method before the body is read.
async fn reject_method() -> DispatchError {
    DispatchError::MethodNotAllowed
}

/// Send a plain-text email, optionally with an attachment
#[utoipa::path(
    post,
    path = "/send-email",
    tag = TAG,
    request_body = SendEmailRequest,
    responses(
        (status = 200, description = "Email sent", body = SentResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 405, response = MethodNotAllowedResponse),
        (status = 500, response = DeliveryFailedResponse)
    )
)]
async fn send_email(
    State(state): State<RelayState>,
    JsonBody(input): JsonBody<SendEmailRequest>,
) -> DispatchOutcome {
    state.facade.handle(ChannelPolicy::EmailOnly, input.into()).await
}

/// Send a WhatsApp message, optionally with media
#[utoipa::path(
    post,
    path = "/send-whatsapp",
    tag = TAG,
    request_body = SendWhatsAppRequest,
    responses(
        (status = 200, description = "WhatsApp message sent", body = SentResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 405, response = MethodNotAllowedResponse),
        (status = 500, response = DeliveryFailedResponse)
    )
)]
async fn send_whatsapp(
    State(state): State<RelayState>,
    JsonBody(input): JsonBody<SendWhatsAppRequest>,
) -> DispatchOutcome {
    state
        .facade
        .handle(ChannelPolicy::MessagingOnly, input.into())
        .await
}

/// Send one notification by email and then WhatsApp
///
/// When the relay runs in configuration mode the request body is ignored and the
/// recipients and content loaded at startup are used instead.
#[utoipa::path(
    post,
    path = "/send-message",
    tag = TAG,
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "Both messages sent", body = SentResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 405, response = MethodNotAllowedResponse),
        (status = 500, response = DeliveryFailedResponse)
    )
)]
async fn send_message(State(state): State<RelayState>, request: Request) -> Response {
    match state.mode.as_ref() {
        RelayMode::ConfigurationSourced(configured) => state
            .facade
            .handle_configured(configured)
            .await
            .into_response(),
        RelayMode::RequestSourced => {
            match JsonBody::<SendMessageRequest>::from_request(request, &state).await {
                Ok(JsonBody(input)) => state
                    .facade
                    .handle(ChannelPolicy::Both, input.into())
                    .await
                    .into_response(),
                Err(rejection) => rejection.into_response(),
            }
        }
    }
}

/// Readiness: every channel has credentials, and the configured notification is
/// complete when running in configuration mode
#[utoipa::path(
    get,
    path = "/ready",
    tag = TAG,
    responses(
        (status = 200, description = "All channels configured", body = ReadinessResponse),
        (status = 503, response = ServiceUnavailableResponse)
    )
)]
async fn ready(
    State(state): State<RelayState>,
) -> Result<(StatusCode, Json<ReadinessResponse>), (StatusCode, Json<ReadinessResponse>)> {
    let email = state.facade.email().credentials().map(|_| ());
    let messaging = state.facade.messaging().credentials().map(|_| ());

    let mut checks: Vec<(&str, HealthCheckFuture<'_>)> = vec![
        ("email", Box::pin(async move { email.map_err(|e| e.to_string()) })),
        ("whatsapp", Box::pin(async move { messaging.map_err(|e| e.to_string()) })),
    ];

    if let RelayMode::ConfigurationSourced(configured) = state.mode.as_ref() {
        let notification = configured
            .as_ref()
            .map_err(|gap| format!("Missing or invalid notification settings: {gap}"))
            .and_then(|job| {
                job.to_request()
                    .validate()
                    .map_err(|e| format!("Invalid notification settings: {e}"))
            });
        checks.push(("notification", Box::pin(async move { notification })));
    }

    run_health_checks(checks).await
}
