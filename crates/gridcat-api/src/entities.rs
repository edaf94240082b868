//! Entity catalog handlers, generic over the payload type.
//!
//! One set of handlers serves all seven kinds; the router instantiates
//! them per payload (`create_entity::<SubstationPayload>` and so on).

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use gridcat_store::{CatalogError, EntityKind, EntityPayload, Page, Row};
use tracing::warn;

use crate::ApiState;
use crate::error::ApiError;

fn not_found(kind: EntityKind) -> ApiError {
    ApiError::NotFound(format!("{} not found", kind.label()))
}

fn failed(kind: EntityKind, err: CatalogError) -> ApiError {
    if let CatalogError::Execution(e) = &err {
        warn!(kind = kind.table(), error = %e, "catalog operation failed");
    }
    err.into()
}

/// POST /api/{kind}/
pub async fn create_entity<P: EntityPayload>(
    State(state): State<ApiState>,
    Json(payload): Json<P>,
) -> Result<(StatusCode, Json<Row>), ApiError> {
    let row = state
        .catalog
        .create(&payload)
        .await
        .map_err(|e| failed(P::KIND, e))?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// GET /api/{kind}/?skip=&limit=
pub async fn list_entities<P: EntityPayload>(
    State(state): State<ApiState>,
    Query(page): Query<Page>,
) -> Result<Json<Vec<Row>>, ApiError> {
    let rows = state
        .catalog
        .list(P::KIND, page)
        .await
        .map_err(|e| failed(P::KIND, e))?;
    Ok(Json(rows))
}

/// GET /api/{kind}/{id}
pub async fn get_entity<P: EntityPayload>(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<Json<Row>, ApiError> {
    state
        .catalog
        .get(P::KIND, id)
        .await
        .map_err(|e| failed(P::KIND, e))?
        .map(Json)
        .ok_or_else(|| not_found(P::KIND))
}

/// PUT /api/{kind}/{id}
pub async fn update_entity<P: EntityPayload>(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Json(payload): Json<P>,
) -> Result<Json<Row>, ApiError> {
    state
        .catalog
        .update(id, &payload)
        .await
        .map_err(|e| failed(P::KIND, e))?
        .map(Json)
        .ok_or_else(|| not_found(P::KIND))
}

/// DELETE /api/{kind}/{id}
pub async fn delete_entity<P: EntityPayload>(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let existed = state
        .catalog
        .delete(P::KIND, id)
        .await
        .map_err(|e| failed(P::KIND, e))?;
    if existed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(P::KIND))
    }
}
