use super::shutdown::ShutdownCoordinator;
use crate::errors::handlers::not_found;
use crate::http::{cors::create_cors_layer, security::security_headers};
use axum::http::HeaderValue;
use axum::{Router, middleware};
use core_config::server::ServerConfig;
use std::future::IntoFuture;
use std::io;
use std::time::Duration;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Creates a configured Axum router with common middleware and documentation.
///
/// Sets up:
/// - OpenAPI documentation (Swagger UI at `/swagger-ui`, JSON at `/api-docs/openapi.json`)
/// - API routes merged at the root
/// - Tracing and security-header middleware
/// - CORS, only when `allowed_origins` is non-empty
/// - JSON 404 fallback
///
/// # Example
/// ```ignore
/// let routes = handlers::router(facade);
/// let router = create_router::<ApiDoc>(routes, &[]);
/// ```
pub fn create_router<T>(apis: Router, allowed_origins: &[HeaderValue]) -> Router
where
    T: OpenApi + 'static,
{
    let router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", T::openapi()))
        .merge(apis)
        .fallback(not_found)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(middleware::from_fn(security_headers));

    if allowed_origins.is_empty() {
        router
    } else {
        info!(origins = allowed_origins.len(), "CORS enabled");
        router.layer(create_cors_layer(allowed_origins.to_vec()))
    }
}

/// Serves `router` until SIGINT/SIGTERM, then drains in-flight requests.
///
/// Requests already in progress (an SMTP send, a Twilio call) get up to
/// `shutdown_timeout` to finish before the server stops waiting for them.
///
/// # Errors
/// Returns an error if the listener cannot bind or the server fails.
pub async fn create_production_app(
    router: Router,
    server_config: &ServerConfig,
    shutdown_timeout: Duration,
) -> io::Result<()> {
    let (coordinator, mut graceful_rx) = ShutdownCoordinator::new();
    let mut deadline_rx = coordinator.subscribe();

    let listener = tokio::net::TcpListener::bind(server_config.address()).await?;
    info!("Server starting on {}", listener.local_addr()?);

    let signal_handle = coordinator.clone();
    tokio::spawn(async move {
        signal_handle.wait_for_signal().await;
    });

    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = graceful_rx.recv().await;
        })
        .into_future();

    let drain_deadline = async move {
        let _ = deadline_rx.recv().await;
        tokio::time::sleep(shutdown_timeout).await;
    };

    tokio::select! {
        result = server => result.inspect_err(|e| {
            tracing::error!("Server encountered an error: {:?}", e);
        }),
        _ = drain_deadline => {
            warn!(
                "In-flight requests exceeded shutdown timeout of {:?}, forcing shutdown",
                shutdown_timeout
            );
            Ok(())
        }
    }
}
