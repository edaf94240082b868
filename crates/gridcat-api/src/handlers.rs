//! Dynamic route handlers.
//!
//! Registration commits a definition into the route table; invocation
//! looks the name up on every request and runs its query with the query
//! string bound as text parameters.

use std::collections::HashMap;

use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::{DateTime, Utc};
use gridcat_routes::route_path;
use gridcat_store::{BindParams, QueryResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ApiState;
use crate::error::ApiError;

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageBody {
    pub message: String,
}

impl MessageBody {
    fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

/// GET /
pub async fn root() -> Json<MessageBody> {
    MessageBody::new("Electric Network API is running")
}

/// Registration request body.
#[derive(Debug, Deserialize)]
pub struct CreateEndpointRequest {
    pub name: String,
    pub sql: String,
}

/// POST /api/create-endpoint/
pub async fn create_endpoint(
    State(state): State<ApiState>,
    Json(req): Json<CreateEndpointRequest>,
) -> Result<Json<MessageBody>, ApiError> {
    let definition = state.registrar.register(&req.name, &req.sql)?;
    Ok(MessageBody::new(format!(
        "Dynamic GET endpoint created at {}",
        route_path(&definition.name)
    )))
}

/// GET /api/custom/{name}
///
/// Repeated query keys resolve to the last value.
pub async fn invoke_endpoint(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<QueryResult>, ApiError> {
    let Some(route) = state.registrar.table().get(&name) else {
        return Err(ApiError::NotFound("Not Found".to_string()));
    };
    let params = BindParams::from_text_pairs(query);

    match state.executor.fetch_all(route.query(), &params).await {
        Ok(rows) => {
            debug!(route = %name, rows = rows.len(), "dynamic route served");
            Ok(Json(rows))
        }
        Err(e) => {
            warn!(route = %name, error = %e, "dynamic route failed");
            Err(e.into())
        }
    }
}

/// A registered route as listed by `GET /api/endpoints/`.
#[derive(Debug, Serialize, Deserialize)]
pub struct EndpointSummary {
    pub name: String,
    pub path: String,
    pub sql: String,
    pub parameters: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// GET /api/endpoints/
pub async fn list_endpoints(State(state): State<ApiState>) -> Json<Vec<EndpointSummary>> {
    let summaries = state
        .registrar
        .table()
        .list()
        .iter()
        .map(|def| EndpointSummary {
            name: def.name.clone(),
            path: route_path(&def.name),
            sql: def.query_text().to_string(),
            parameters: def.query().parameters().to_vec(),
            created_at: def.created_at,
        })
        .collect();
    Json(summaries)
}
