//! REST API for the pack calculator.
//!
//! Exposes the pack size configuration and the calculation over HTTP and
//! serves the embedded web UI. Uses Axum as the web framework and supports CORS.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, OnceLock};

use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, Json, State};
use axum::{
    Router,
    http::{HeaderValue, StatusCode, Uri, header},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use rust_embed::RustEmbed;
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::{OpenApi, ToSchema};

use crate::config::ApiConfig;
use crate::error::ServiceError;
use crate::formatter::{PackLine, format_breakdown};
use crate::optimizer::Calculation;
use crate::rate_limit::RateLimiter;
use crate::service::PackService;

#[derive(Clone)]
pub struct ApiState {
    service: Arc<PackService>,
    limiter: Arc<RateLimiter>,
}

impl ApiState {
    pub fn new(service: Arc<PackService>, limiter: RateLimiter) -> Self {
        Self {
            service,
            limiter: Arc::new(limiter),
        }
    }
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

// SRI hashes verified against https://unpkg.com/swagger-ui-dist@5.17.14/.
const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>pack-it-now API Docs</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                window.ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                });
            };
        </script>
    </body>
    </html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// Embedded Web Assets (HTML, CSS, JS)
#[derive(RustEmbed)]
#[folder = "web/"]
struct WebAssets;

/// Replacement set of pack sizes.
#[derive(Deserialize, ToSchema)]
#[schema(example = json!({ "sizes": [23, 31, 53] }))]
pub struct UpdatePackSizesRequest {
    pub sizes: Vec<u64>,
}

/// Active pack sizes in increasing order.
#[derive(Serialize, ToSchema)]
#[schema(example = json!({ "sizes": [250, 500, 1000, 2000, 5000] }))]
pub struct PackSizesResponse {
    pub sizes: Vec<u64>,
}

#[derive(Deserialize, ToSchema)]
#[schema(example = json!({ "items": 12001 }))]
pub struct CalculateRequest {
    pub items: u64,
}

/// Result of a calculation.
///
/// # Fields
/// * `packs` - Pack sizes and quantities, largest size first
/// * `total_items` - Items shipped across all packs
/// * `excess` - Items shipped beyond the ordered quantity
/// * `pack_count` - Number of packs shipped
#[derive(Serialize, ToSchema)]
pub struct CalculateResponse {
    pub packs: Vec<PackLine>,
    pub total_items: u64,
    pub excess: u64,
    pub pack_count: u64,
}

impl CalculateResponse {
    fn from_calculation(calculation: &Calculation) -> Self {
        Self {
            packs: format_breakdown(&calculation.breakdown),
            total_items: calculation.total_items(),
            excess: calculation.excess(),
            pack_count: calculation.breakdown.pack_count(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
}

#[derive(Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
    details: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    details: impl Into<String>,
) -> Response {
    (status, Json(ErrorResponse::new(error, details))).into_response()
}

fn json_deserialize_error(err: JsonRejection) -> Response {
    error_response(StatusCode::BAD_REQUEST, "Invalid JSON data", err.body_text())
}

/// Rejects clients over their request limit with 429.
///
/// The client address comes from `ConnectInfo`; requests without it share one bucket.
async fn limit_requests(
    State(limiter): State<Arc<RateLimiter>>,
    request: axum::extract::Request,
    next: Next,
) -> Response {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    match limiter.check(client) {
        Ok(()) => next.run(request).await,
        Err(retry_after) => {
            let seconds = retry_after.as_secs().max(1);
            tracing::info!(%client, retry_after = seconds, "rate limit exceeded");
            let mut response = error_response(
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests",
                format!("Retry in {} seconds", seconds),
            );
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
            response
        }
    }
}

fn service_error(err: ServiceError) -> Response {
    match err {
        ServiceError::Config(err) => error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Invalid pack size configuration",
            err.to_string(),
        ),
        ServiceError::Optimizer(err) if err.is_user_error() => error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Invalid item quantity",
            err.to_string(),
        ),
        ServiceError::Optimizer(err) => {
            tracing::error!(error = %err, "calculation failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Calculation failed",
                err.to_string(),
            )
        }
        ServiceError::Store(err) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Pack sizes could not be saved",
            err.to_string(),
        ),
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(get_pack_sizes, set_pack_sizes, handle_calculate, handle_health),
    components(
        schemas(
            UpdatePackSizesRequest,
            PackSizesResponse,
            CalculateRequest,
            CalculateResponse,
            PackLine,
            HealthResponse,
            ErrorResponse
        )
    ),
    tags(
        (name = "packs", description = "Pack size configuration and calculation"),
        (name = "health", description = "Service health")
    )
)]
struct ApiDoc;

/// Builds the application router with all endpoints, docs and the web UI.
pub fn build_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // API endpoints, limited per client
    let api = Router::new()
        .route("/api/pack-sizes", get(get_pack_sizes).post(set_pack_sizes))
        .route("/api/calculate", post(handle_calculate))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state.limiter),
            limit_requests,
        ));

    Router::new()
        .merge(api)
        .route("/health", get(handle_health))
        // API documentation
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        // Web-UI (embedded)
        .route("/", get(serve_index))
        .route("/{*path}", get(serve_static))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Binds the configured address and serves until the server stops.
pub async fn start_api_server(config: ApiConfig, service: Arc<PackService>) -> std::io::Result<()> {
    let limiter = RateLimiter::per_minute(config.rate_limit_per_minute());
    let app = build_router(ApiState::new(service, limiter));

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(
        "Server running on http://{}:{}",
        config.display_host(),
        config.port()
    );
    if config.binds_to_all_interfaces() {
        tracing::info!("Local access: http://localhost:{}", config.port());
    }
    tracing::info!("API endpoints: GET/POST /api/pack-sizes, POST /api/calculate, GET /health");
    tracing::info!("Documentation: GET /docs, GET /docs/openapi.json");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
}

/// Handler for GET /api/pack-sizes.
#[utoipa::path(
    get,
    path = "/api/pack-sizes",
    responses(
        (status = 200, description = "Active pack sizes", body = PackSizesResponse),
        (status = TOO_MANY_REQUESTS, description = "Request limit exceeded", body = ErrorResponse)
    ),
    tag = "packs"
)]
async fn get_pack_sizes(State(state): State<ApiState>) -> Json<PackSizesResponse> {
    Json(PackSizesResponse {
        sizes: state.service.get_configuration(),
    })
}

/// Handler for POST /api/pack-sizes.
///
/// Replaces the active pack sizes. On error the previous sizes stay active.
#[utoipa::path(
    post,
    path = "/api/pack-sizes",
    request_body = UpdatePackSizesRequest,
    responses(
        (status = NO_CONTENT, description = "Pack sizes replaced"),
        (status = BAD_REQUEST, description = "Malformed request body", body = ErrorResponse),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Pack sizes rejected",
            body = ErrorResponse
        ),
        (status = TOO_MANY_REQUESTS, description = "Request limit exceeded", body = ErrorResponse),
        (
            status = INTERNAL_SERVER_ERROR,
            description = "Pack sizes could not be saved",
            body = ErrorResponse
        )
    ),
    tag = "packs"
)]
async fn set_pack_sizes(
    State(state): State<ApiState>,
    payload: Result<Json<UpdatePackSizesRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(err) => return json_deserialize_error(err),
    };

    // Persisting touches the filesystem.
    let service = Arc::clone(&state.service);
    let result = tokio::task::spawn_blocking(move || service.set_configuration(request.sizes)).await;

    match result {
        Ok(Ok(())) => StatusCode::NO_CONTENT.into_response(),
        Ok(Err(err)) => service_error(err),
        Err(err) => {
            tracing::error!(error = %err, "pack size update task failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Pack size update failed",
                err.to_string(),
            )
        }
    }
}

/// Handler for POST /api/calculate.
///
/// Returns the pack breakdown for the ordered number of items.
#[utoipa::path(
    post,
    path = "/api/calculate",
    request_body = CalculateRequest,
    responses(
        (status = 200, description = "Pack breakdown", body = CalculateResponse),
        (status = BAD_REQUEST, description = "Malformed request body", body = ErrorResponse),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Item quantity out of range",
            body = ErrorResponse
        ),
        (status = TOO_MANY_REQUESTS, description = "Request limit exceeded", body = ErrorResponse),
        (
            status = INTERNAL_SERVER_ERROR,
            description = "Calculation failed",
            body = ErrorResponse
        )
    ),
    tag = "packs"
)]
async fn handle_calculate(
    State(state): State<ApiState>,
    payload: Result<Json<CalculateRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(err) => return json_deserialize_error(err),
    };

    // The first calculation on a snapshot builds its graphs.
    let service = Arc::clone(&state.service);
    let result = tokio::task::spawn_blocking(move || service.calculate(request.items)).await;

    match result {
        Ok(Ok(calculation)) => (
            StatusCode::OK,
            Json(CalculateResponse::from_calculation(&calculation)),
        )
            .into_response(),
        Ok(Err(err)) => service_error(err),
        Err(err) => {
            tracing::error!(error = %err, "calculation task failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Calculation failed",
                err.to_string(),
            )
        }
    }
}

/// Handler for GET /health.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse)),
    tag = "health"
)]
async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Serves the index.html main page
async fn serve_index() -> Response {
    match WebAssets::get("index.html") {
        Some(content) => Html(content.data).into_response(),
        None => (StatusCode::NOT_FOUND, "404 Not Found").into_response(),
    }
}

/// Serves static assets (JS, CSS, etc.)
async fn serve_static(uri: Uri) -> Response {
    let path = uri.path().trim_start_matches('/');

    match WebAssets::get(path) {
        Some(content) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            ([(header::CONTENT_TYPE, mime.as_ref())], content.data).into_response()
        }
        None => (StatusCode::NOT_FOUND, "404 Not Found").into_response(),
    }
}

async fn serve_openapi_json() -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui() -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}
