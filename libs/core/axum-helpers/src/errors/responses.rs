//! Reusable OpenAPI response types for consistent API documentation.

use super::ErrorResponse;
use crate::server::health::ReadinessResponse;
#[allow(unused_imports)]
use serde_json::json;
use utoipa::ToResponse;

#[derive(ToResponse)]
#[response(
    description = "Bad Request - missing or malformed fields",
    content_type = "application/json",
    example = json!({
        "code": 1001,
        "error": "VALIDATION_ERROR",
        "message": "Missing 'to' parameter in request body"
    })
)]
pub struct BadRequestValidationResponse(pub ErrorResponse);

#[derive(ToResponse)]
#[response(
    description = "Method Not Allowed - relay routes only accept POST",
    content_type = "application/json",
    example = json!({
        "code": 1006,
        "error": "METHOD_NOT_ALLOWED",
        "message": "The HTTP method is not allowed for this resource"
    })
)]
pub struct MethodNotAllowedResponse(pub ErrorResponse);

#[derive(ToResponse)]
#[response(
    description = "Delivery failed - missing credentials, attachment or transport failure",
    content_type = "application/json",
    example = json!({
        "code": 3002,
        "error": "TRANSPORT_ERROR",
        "message": "Failed to send WhatsApp message: authentication failed",
        "details": { "channel": "whatsapp", "email_sent": true }
    })
)]
pub struct DeliveryFailedResponse(pub ErrorResponse);

#[derive(ToResponse)]
#[response(
    description = "Service Unavailable - at least one readiness check failed",
    content_type = "application/json",
    example = json!({
        "status": "not ready",
        "checks": { "email": "ok", "whatsapp": "TWILIO_AUTH_TOKEN not set" }
    })
)]
pub struct ServiceUnavailableResponse(pub ReadinessResponse);
