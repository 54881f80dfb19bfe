//! REST API for the load planner.
//!
//! Exposes the capacity calculator and the placement grid over HTTP so a
//! front-end can render totals and 3D boxes without computing anything itself.
//! Every request works on a fresh grid; no state is kept between requests.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Router,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::OnceLock;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use utoipa::{OpenApi, ToSchema};

use crate::capacity::{
    FitResult, LoadReport, LoadSummary, ProductLoad, Remediation, compute_load,
};
use crate::config::{ApiConfig, PlannerConfig};
use crate::geometry::{Cell, GridDims};
use crate::model::{
    ContainerSpec, ItemFootprint, ItemId, ProductSpec, ProductVariant, TruckCatalog,
    ValidationError,
};
use crate::placement::{Placement, PlacementGrid, PlacementOutcome, ReflowEntry};
use crate::types::{Dimensional, Vec3};

#[derive(Clone)]
struct ApiState {
    planner: PlannerConfig,
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

// SRI hashes verified against https://unpkg.com/swagger-ui-dist@5.17.14/ on 2025-10-29.
const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>load-planner API Docs</title>
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
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-standalone-preset.js"
            integrity="sha384-2YH8WDRaj7V2OqU/trsmzSagmk/E2SutiCsGkdgoQwC9pNUJV1u/141DHB6jgs8t"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                const ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                    presets: [SwaggerUIBundle.presets.apis, SwaggerUIStandalonePreset],
                    layout: "StandaloneLayout",
                });
                window.ui = ui;
            };
        </script>
    </body>
    </html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// Explicit container dimensions in meters.
#[derive(Deserialize, Clone, ToSchema)]
#[schema(example = json!({ "width": 2.13, "height": 2.13, "length": 4.27 }))]
pub struct ContainerRequest {
    pub width: f64,
    pub height: f64,
    pub length: f64,
}

impl ContainerRequest {
    fn into_spec(self) -> Result<ContainerSpec, ValidationError> {
        ContainerSpec::new(self.width, self.height, self.length)
    }
}

/// Explicit footprint in meters.
#[derive(Deserialize, Clone, ToSchema)]
pub struct FootprintRequest {
    pub length: f64,
    pub width: f64,
    pub height: f64,
}

/// Picks the container: explicit dimensions win over a truck key.
fn resolve_container(
    truck: Option<&str>,
    container: Option<ContainerRequest>,
) -> Result<Option<ContainerSpec>, ValidationError> {
    match (container, truck) {
        (Some(container), _) => container.into_spec().map(Some),
        (None, Some(key)) => TruckCatalog::lookup(key).map(Some),
        (None, None) => Ok(None),
    }
}

#[derive(Deserialize, ToSchema)]
#[schema(
    example = json!({
        "truck": "14",
        "products": [
            { "id": 1, "width": 1.0, "height": 1.0, "length": 1.0, "requested_quantity": 10 }
        ]
    })
)]
pub struct LoadRequest {
    #[serde(default)]
    #[schema(nullable = true)]
    pub truck: Option<String>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub container: Option<ContainerRequest>,
    #[serde(default)]
    pub products: Vec<ProductSpec>,
}

#[derive(Deserialize, ToSchema)]
#[schema(
    example = json!({
        "truck": "17",
        "variant": "Product B",
        "items": [1, 2, 3]
    })
)]
pub struct LayoutRequest {
    #[serde(default)]
    #[schema(nullable = true)]
    pub truck: Option<String>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub container: Option<ContainerRequest>,
    /// Preset name ("Product A", "Product B", "Product C").
    #[serde(default)]
    #[schema(nullable = true)]
    pub variant: Option<String>,
    /// Explicit footprint, takes precedence over `variant`.
    #[serde(default)]
    #[schema(nullable = true)]
    pub footprint: Option<FootprintRequest>,
    /// Item ids in insertion order.
    #[serde(default)]
    pub items: Vec<ItemId>,
}

#[derive(Deserialize, ToSchema)]
pub struct DropRequest {
    pub layout: LayoutRequest,
    pub item_id: ItemId,
    pub position: Vec3,
}

#[derive(Debug)]
struct ValidatedLayoutRequest {
    container: ContainerSpec,
    footprint: ItemFootprint,
    items: Vec<ItemId>,
}

#[derive(Debug)]
enum LayoutRequestValidationError {
    InvalidContainer(ValidationError),
    InvalidFootprint(ValidationError),
}

impl LayoutRequest {
    fn into_validated(
        self,
        planner: &PlannerConfig,
    ) -> Result<ValidatedLayoutRequest, LayoutRequestValidationError> {
        let container = resolve_container(self.truck.as_deref(), self.container)
            .map_err(LayoutRequestValidationError::InvalidContainer)?
            .unwrap_or_else(|| planner.default_container());

        let footprint = match (self.footprint, self.variant) {
            (Some(footprint), _) => {
                ItemFootprint::new(footprint.length, footprint.width, footprint.height)
                    .map_err(LayoutRequestValidationError::InvalidFootprint)?
            }
            (None, Some(name)) => {
                let variant = ProductVariant::from_name(&name);
                if variant.name() != name.trim() {
                    tracing::debug!(
                        requested = %name,
                        used = variant.name(),
                        "unknown product variant"
                    );
                }
                variant.footprint()
            }
            (None, None) => ItemFootprint::default(),
        };

        Ok(ValidatedLayoutRequest {
            container,
            footprint,
            items: self.items,
        })
    }
}

/// Catalog entry as shown in the truck dropdown.
#[derive(Serialize, ToSchema)]
pub struct TruckResponse {
    pub key: String,
    pub width: f64,
    pub height: f64,
    pub length: f64,
    pub volume: f64,
}

#[derive(Serialize, ToSchema)]
pub struct NoticeResponse {
    pub product_id: ItemId,
    pub code: String,
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct LoadResponse {
    pub products: Vec<ProductLoad>,
    pub summary: LoadSummary,
    pub notices: Vec<NoticeResponse>,
    #[schema(nullable = true)]
    pub adjustment_message: Option<String>,
    pub total_quantity_text: String,
    pub remaining_space_text: String,
    pub is_complete: bool,
}

impl LoadResponse {
    pub fn from_report(report: LoadReport) -> Self {
        let notices = report
            .notices
            .iter()
            .map(|notice| NoticeResponse {
                product_id: notice.product_id(),
                code: notice.code().to_string(),
                message: notice.to_string(),
            })
            .collect();
        let adjustment_message = report.adjustment_message();
        let is_complete = report.is_complete();
        let total_quantity_text = report.summary.total_quantity_text();
        let remaining_space_text = report.summary.remaining_space_text();

        Self {
            products: report.products,
            summary: report.summary,
            notices,
            adjustment_message,
            total_quantity_text,
            remaining_space_text,
            is_complete,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct UnplacedItem {
    pub item_id: ItemId,
    pub reason_code: String,
    pub reason: String,
}

#[derive(Serialize, ToSchema)]
pub struct LayoutResponse {
    pub container: ContainerSpec,
    pub footprint: ItemFootprint,
    pub grid: GridDims,
    pub capacity: usize,
    pub placements: Vec<Placement>,
    pub unplaced: Vec<UnplacedItem>,
    pub is_complete: bool,
}

impl LayoutResponse {
    fn from_grid(grid: &PlacementGrid, entries: &[ReflowEntry]) -> Self {
        let unplaced: Vec<UnplacedItem> = entries
            .iter()
            .filter_map(|entry| match &entry.outcome {
                PlacementOutcome::Placed(_) => None,
                PlacementOutcome::Unplaced(reason) => Some(UnplacedItem {
                    item_id: entry.item,
                    reason_code: reason.code().to_string(),
                    reason: reason.to_string(),
                }),
            })
            .collect();

        Self {
            container: *grid.container(),
            footprint: *grid.footprint(),
            grid: grid.dims(),
            capacity: grid.capacity(),
            placements: grid.placements(),
            is_complete: unplaced.is_empty(),
            unplaced,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct DropResponse {
    pub dropped: Placement,
    pub layout: LayoutResponse,
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
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid JSON data",
        err.to_string(),
    )
}

fn validation_error(details: impl Into<String>) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid input data",
        details,
    )
}

fn container_config_error(details: impl Into<String>) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid container configuration",
        details,
    )
}

fn parse_layout_request(
    payload: Result<Json<LayoutRequest>, JsonRejection>,
    planner: &PlannerConfig,
) -> Result<ValidatedLayoutRequest, Response> {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(err) => return Err(json_deserialize_error(err)),
    };
    validate_layout(payload, planner)
}

fn validate_layout(
    payload: LayoutRequest,
    planner: &PlannerConfig,
) -> Result<ValidatedLayoutRequest, Response> {
    match payload.into_validated(planner) {
        Ok(validated) => Ok(validated),
        Err(LayoutRequestValidationError::InvalidContainer(err)) => {
            Err(container_config_error(err.to_string()))
        }
        Err(LayoutRequestValidationError::InvalidFootprint(err)) => {
            Err(validation_error(err.to_string()))
        }
    }
}

fn build_grid(
    request: &ValidatedLayoutRequest,
    planner: &PlannerConfig,
) -> Result<PlacementGrid, Response> {
    PlacementGrid::with_config(
        request.container,
        request.footprint,
        planner.placement_config(),
    )
    .map_err(|err| validation_error(err.to_string()))
}

#[derive(OpenApi)]
#[openapi(
    paths(handle_trucks, handle_load, handle_layout, handle_layout_drop, handle_layout_stream),
    components(
        schemas(
            TruckResponse,
            LoadRequest,
            ContainerRequest,
            FootprintRequest,
            LoadResponse,
            NoticeResponse,
            LayoutRequest,
            LayoutResponse,
            DropRequest,
            DropResponse,
            UnplacedItem,
            ErrorResponse,
            ProductSpec,
            ProductLoad,
            FitResult,
            LoadSummary,
            Remediation,
            ContainerSpec,
            ItemFootprint,
            Placement,
            Cell,
            GridDims,
            Vec3
        )
    ),
    tags(
        (name = "capacity", description = "Capacity calculation for a truck"),
        (name = "placement", description = "Grid placement of items inside a truck")
    )
)]
struct ApiDoc;

fn router(state: ApiState, serve_docs: bool) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let mut app = Router::new()
        .route("/trucks", get(handle_trucks))
        .route("/load", post(handle_load))
        .route("/layout", post(handle_layout))
        .route("/layout/drop", post(handle_layout_drop))
        .route("/layout_stream", post(handle_layout_stream));

    if serve_docs {
        app = app
            .route("/docs/openapi.json", get(serve_openapi_json))
            .route("/docs", get(serve_openapi_ui));
    }

    app.layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

/// Starts the API server and blocks until it terminates.
pub async fn start_api_server(
    config: ApiConfig,
    planner: PlannerConfig,
) -> Result<(), std::io::Error> {
    let app = router(ApiState { planner }, config.serve_docs());

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let display_host = config.display_host().to_string();
    tracing::info!("🚀 Server running on http://{}:{}", display_host, config.port());
    if config.binds_to_all_interfaces() && config.uses_default_host() {
        tracing::info!("💡 Local access: http://localhost:{}", config.port());
    }
    tracing::info!("📦 API Endpoints:");
    tracing::info!("   - GET  /trucks");
    tracing::info!("   - POST /load");
    tracing::info!("   - POST /layout");
    tracing::info!("   - POST /layout/drop");
    tracing::info!("   - POST /layout_stream");
    if config.serve_docs() {
        tracing::info!("📑 Documentation:");
        tracing::info!("   - GET /docs");
        tracing::info!("   - GET /docs/openapi.json");
    }

    axum::serve(listener, app).await
}

/// Handler for GET /trucks.
///
/// Lists the known truck sizes.
#[utoipa::path(
    get,
    path = "/trucks",
    responses((status = 200, description = "Known truck sizes", body = [TruckResponse])),
    tag = "capacity"
)]
async fn handle_trucks() -> impl IntoResponse {
    let trucks: Vec<TruckResponse> = TruckCatalog::entries()
        .iter()
        .map(|size| TruckResponse {
            key: size.key.to_string(),
            width: size.container.width,
            height: size.container.height,
            length: size.container.length,
            volume: size.container.volume(),
        })
        .collect();
    Json(trucks)
}

/// Handler for POST /load.
///
/// Computes per-product fits, totals and a reduction plan for one truck.
#[utoipa::path(
    post,
    path = "/load",
    request_body = LoadRequest,
    responses(
        (status = 200, description = "Load computed", body = LoadResponse),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Missing truck selection or invalid container",
            body = ErrorResponse
        )
    ),
    tag = "capacity"
)]
async fn handle_load(payload: Result<Json<LoadRequest>, JsonRejection>) -> impl IntoResponse {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(err) => return json_deserialize_error(err),
    };

    let container = match resolve_container(request.truck.as_deref(), request.container) {
        Ok(Some(container)) => container,
        Ok(None) => return validation_error("Please select a truck size."),
        Err(err) => return container_config_error(err.to_string()),
    };

    tracing::info!("📥 New load request: {} products", request.products.len());
    let report = compute_load(&container, &request.products);
    tracing::info!(
        "📦 Result: {} accepted units, {:.2} m³ remaining, over capacity: {}",
        report.summary.total_accepted_quantity,
        report.summary.remaining_volume,
        report.summary.over_capacity
    );

    (StatusCode::OK, Json(LoadResponse::from_report(report))).into_response()
}

/// Handler for POST /layout.
///
/// Places the given items in order on a fresh grid.
#[utoipa::path(
    post,
    path = "/layout",
    request_body = LayoutRequest,
    responses(
        (status = 200, description = "Items placed", body = LayoutResponse),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid container or footprint",
            body = ErrorResponse
        )
    ),
    tag = "placement"
)]
async fn handle_layout(
    State(state): State<ApiState>,
    payload: Result<Json<LayoutRequest>, JsonRejection>,
) -> impl IntoResponse {
    let request = match parse_layout_request(payload, &state.planner) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let mut grid = match build_grid(&request, &state.planner) {
        Ok(grid) => grid,
        Err(response) => return response,
    };
    let entries = grid.reflow(&request.items);
    let response = LayoutResponse::from_grid(&grid, &entries);
    tracing::info!(
        "📦 Layout: {} placed, {} unplaced, capacity {}",
        response.placements.len(),
        response.unplaced.len(),
        response.capacity
    );

    (StatusCode::OK, Json(response)).into_response()
}

/// Handler for POST /layout/drop.
///
/// Rebuilds the layout, then snaps the dropped item onto a free cell.
#[utoipa::path(
    post,
    path = "/layout/drop",
    request_body = DropRequest,
    responses(
        (status = 200, description = "Item snapped onto the grid", body = DropResponse),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid layout or unknown item",
            body = ErrorResponse
        )
    ),
    tag = "placement"
)]
async fn handle_layout_drop(
    State(state): State<ApiState>,
    payload: Result<Json<DropRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(DropRequest {
        layout,
        item_id,
        position,
    }) = match payload {
        Ok(payload) => payload,
        Err(err) => return json_deserialize_error(err),
    };
    let request = match validate_layout(layout, &state.planner) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let mut grid = match build_grid(&request, &state.planner) {
        Ok(grid) => grid,
        Err(response) => return response,
    };
    let entries = grid.reflow(&request.items);
    let dropped = match grid.drop_item(item_id, &position) {
        Ok(placement) => placement,
        Err(err) => return validation_error(err.to_string()),
    };

    let response = DropResponse {
        dropped,
        layout: LayoutResponse::from_grid(&grid, &entries),
    };
    (StatusCode::OK, Json(response)).into_response()
}

/// Handler for POST /layout_stream (SSE).
///
/// Streams placement events so the viewer can add boxes one by one.
#[utoipa::path(
    post,
    path = "/layout_stream",
    request_body = LayoutRequest,
    responses(
        (
            status = 200,
            description = "Streams placement events in real-time",
            content_type = "text/event-stream",
            body = String
        ),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid container or footprint",
            body = ErrorResponse
        )
    ),
    tag = "placement"
)]
async fn handle_layout_stream(
    State(state): State<ApiState>,
    payload: Result<Json<LayoutRequest>, JsonRejection>,
) -> impl IntoResponse {
    let request = match parse_layout_request(payload, &state.planner) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let mut grid = match build_grid(&request, &state.planner) {
        Ok(grid) => grid,
        Err(response) => return response,
    };
    let (tx, rx) = mpsc::channel::<String>(32);

    tokio::task::spawn_blocking(move || {
        grid.reflow_with_progress(&request.items, |evt| {
            if let Ok(json) = serde_json::to_string(evt) {
                // A closed receiver just means the client went away.
                let _ = tx.blocking_send(json);
            }
        });
    });

    let stream = ReceiverStream::new(rx)
        .map(|msg| Ok::<_, std::convert::Infallible>(Event::default().data(msg)));
    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(std::time::Duration::from_secs(10))
                .text("keep-alive"),
        )
        .into_response()
}

async fn serve_openapi_json() -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui() -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}
