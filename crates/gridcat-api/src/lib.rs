//! gridcat-api — REST API for gridcat.
//!
//! Serves the dynamic query endpoints and the network entity catalog.
//! Dynamic routes are two-tier: the static route `/api/custom/{name}`
//! resolves `name` through the shared [`RouteTable`](gridcat_routes::RouteTable)
//! on every request, so registering a route never touches the router.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/` | Liveness message |
//! | POST | `/api/create-endpoint/` | Register a dynamic query route |
//! | GET | `/api/custom/{name}` | Run a registered query |
//! | GET | `/api/endpoints/` | List registered routes |
//! | GET, POST | `/api/{kind}/` | List / create entities |
//! | GET, PUT, DELETE | `/api/{kind}/{id}` | Read / replace / delete an entity |
//!
//! `{kind}` is one of `substations`, `feeders`, `transformers`, `poles`,
//! `conductors`, `switches`, `fuses`.

pub mod entities;
pub mod error;
pub mod handlers;

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use gridcat_routes::Registrar;
use gridcat_store::{
    Catalog, ConductorPayload, EntityPayload, FeederPayload, FusePayload, PolePayload,
    QueryExecutor, SubstationPayload, SwitchPayload, TransformerPayload,
};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

pub use error::{ApiError, ErrorBody};

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub executor: Arc<dyn QueryExecutor>,
    pub catalog: Catalog,
    pub registrar: Registrar,
}

impl ApiState {
    pub fn new(executor: Arc<dyn QueryExecutor>, registrar: Registrar) -> Self {
        Self {
            catalog: Catalog::new(Arc::clone(&executor)),
            executor,
            registrar,
        }
    }
}

/// Build the complete API router.
pub fn build_router(state: ApiState, request_timeout: Duration) -> Router {
    let api_routes = Router::new()
        .route("/create-endpoint/", post(handlers::create_endpoint))
        .route("/custom/{name}", get(handlers::invoke_endpoint))
        .route("/endpoints/", get(handlers::list_endpoints));

    let api_routes = entity_routes::<SubstationPayload>(api_routes);
    let api_routes = entity_routes::<FeederPayload>(api_routes);
    let api_routes = entity_routes::<TransformerPayload>(api_routes);
    let api_routes = entity_routes::<PolePayload>(api_routes);
    let api_routes = entity_routes::<ConductorPayload>(api_routes);
    let api_routes = entity_routes::<SwitchPayload>(api_routes);
    let api_routes = entity_routes::<FusePayload>(api_routes);

    Router::new()
        .route("/", get(handlers::root))
        .nest("/api", api_routes)
        .with_state(state)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
}

fn entity_routes<P: EntityPayload>(router: Router<ApiState>) -> Router<ApiState> {
    let table = P::KIND.table();
    router
        .route(
            &format!("/{table}/"),
            get(entities::list_entities::<P>).post(entities::create_entity::<P>),
        )
        .route(
            &format!("/{table}/{{id}}"),
            get(entities::get_entity::<P>)
                .put(entities::update_entity::<P>)
                .delete(entities::delete_entity::<P>),
        )
}

/// A panicking handler fails only its own request.
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else {
        "handler panicked".to_string()
    };
    error!(%detail, "request handler panicked");
    ApiError::Unexpected(detail).into_response()
}
