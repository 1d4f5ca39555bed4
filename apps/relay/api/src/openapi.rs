use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    components(
        schemas(axum_helpers::ErrorResponse)
    ),
    info(
        title = "Notification Relay API",
        version = "0.1.0",
        description = "Relays notifications to email (SMTP) and WhatsApp (Twilio)"
    )
)]
struct RelayInfo;

/// Relay API documentation: service info plus the notification endpoints,
/// which are served at the root.
pub struct ApiDoc;

impl OpenApi for ApiDoc {
    fn openapi() -> utoipa::openapi::OpenApi {
        let mut doc = RelayInfo::openapi();
        doc.merge(domain_notifications::ApiDoc::openapi());
        doc
    }
}
