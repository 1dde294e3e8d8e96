//! API Handlers
//!
//! HTTP request handlers for each node endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::cluster::MemberId;
use crate::coordinator::{ClusterView, Coordinator};
use crate::error::{GridError, Result};
use crate::models::{
    DeleteResponse, EntriesResponse, GetResponse, HealthResponse, JoinRequest, KeysResponse,
    MapsResponse, MemberResponse, SetRequest, SetResponse, StatsResponse, UpdateRequest,
};
use crate::record::DEFAULT_MAP;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
}

impl AppState {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }
}

/// Handler for PUT /set
///
/// Writes the value to the cache and queues it for the store. The response
/// reports whether the store is currently degraded.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    set_in(&state, DEFAULT_MAP, req).await
}

/// Handler for GET /get/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    get_in(&state, DEFAULT_MAP, key).await
}

/// Handler for DELETE /del/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    delete_in(&state, DEFAULT_MAP, key).await
}

/// Handler for PATCH /update/:key
pub async fn update_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<UpdateRequest>,
) -> Result<Json<GetResponse>> {
    update_in(&state, DEFAULT_MAP, key, req).await
}

/// Handler for GET /keys
pub async fn keys_handler(State(state): State<AppState>) -> Result<Json<KeysResponse>> {
    let keys = state.coordinator.map(DEFAULT_MAP)?.keys().await?;
    Ok(Json(KeysResponse::new(keys)))
}

// == Named Maps ==

/// Handler for GET /maps
pub async fn maps_handler(State(state): State<AppState>) -> Result<Json<MapsResponse>> {
    let maps = state.coordinator.maps().await?;
    Ok(Json(MapsResponse::new(maps)))
}

/// Handler for PUT /maps/:map/set
pub async fn map_set_handler(
    State(state): State<AppState>,
    Path(map): Path<String>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    set_in(&state, &map, req).await
}

/// Handler for GET /maps/:map/get/:key
pub async fn map_get_handler(
    State(state): State<AppState>,
    Path((map, key)): Path<(String, String)>,
) -> Result<Json<GetResponse>> {
    get_in(&state, &map, key).await
}

/// Handler for DELETE /maps/:map/del/:key
pub async fn map_delete_handler(
    State(state): State<AppState>,
    Path((map, key)): Path<(String, String)>,
) -> Result<Json<DeleteResponse>> {
    delete_in(&state, &map, key).await
}

/// Handler for PATCH /maps/:map/update/:key
pub async fn map_update_handler(
    State(state): State<AppState>,
    Path((map, key)): Path<(String, String)>,
    Json(req): Json<UpdateRequest>,
) -> Result<Json<GetResponse>> {
    update_in(&state, &map, key, req).await
}

/// Handler for GET /maps/:map/keys
pub async fn map_keys_handler(
    State(state): State<AppState>,
    Path(map): Path<String>,
) -> Result<Json<KeysResponse>> {
    let keys = state.coordinator.map(&map)?.keys().await?;
    Ok(Json(KeysResponse::new(keys)))
}

/// Handler for GET /maps/:map/entries
///
/// Returns every live record of the map.
pub async fn map_entries_handler(
    State(state): State<AppState>,
    Path(map): Path<String>,
) -> Result<Json<EntriesResponse>> {
    let entries = state.coordinator.map(&map)?.entries().await?;
    Ok(Json(EntriesResponse::new(map, entries)))
}

async fn set_in(state: &AppState, map: &str, req: SetRequest) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(GridError::InvalidRequest(error_msg));
    }

    let record = state
        .coordinator
        .map(map)?
        .put(&req.key, req.value, req.ttl)
        .await?;

    Ok(Json(SetResponse::new(
        req.key,
        record.version,
        state.coordinator.is_degraded(),
    )))
}

async fn get_in(state: &AppState, map: &str, key: String) -> Result<Json<GetResponse>> {
    let record = state
        .coordinator
        .map(map)?
        .get(&key)
        .await?
        .ok_or(GridError::NotFound(key))?;

    Ok(Json(GetResponse::from(record)))
}

async fn delete_in(state: &AppState, map: &str, key: String) -> Result<Json<DeleteResponse>> {
    if !state.coordinator.map(map)?.delete(&key).await? {
        return Err(GridError::NotFound(key));
    }
    Ok(Json(DeleteResponse::new(key)))
}

async fn update_in(
    state: &AppState,
    map: &str,
    key: String,
    req: UpdateRequest,
) -> Result<Json<GetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(GridError::InvalidRequest(error_msg));
    }

    let record = state
        .coordinator
        .map(map)?
        .update_field(&key, &req.field, req.value)
        .await?
        .ok_or(GridError::NotFound(key))?;

    Ok(Json(GetResponse::from(record)))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.coordinator.stats().await;
    Json(StatsResponse::new(&stats.cache, stats.flush))
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::new(state.coordinator.health()))
}

// == Cluster ==

/// Handler for GET /cluster
pub async fn cluster_handler(State(state): State<AppState>) -> Json<ClusterView> {
    Json(state.coordinator.cluster().await)
}

/// Handler for POST /cluster/members
pub async fn join_handler(
    State(state): State<AppState>,
    Json(req): Json<JoinRequest>,
) -> Result<(StatusCode, Json<MemberResponse>)> {
    if let Some(error_msg) = req.validate() {
        return Err(GridError::InvalidRequest(error_msg));
    }

    let member = state
        .coordinator
        .join(MemberId::new(req.id), req.address)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(MemberResponse::new(member.id.as_str(), "joined")),
    ))
}

/// Handler for DELETE /cluster/members/:id
pub async fn leave_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MemberResponse>> {
    state.coordinator.leave(&MemberId::new(id.clone())).await?;
    Ok(Json(MemberResponse::new(id, "left")))
}

/// Handler for POST /cluster/members/:id/down
pub async fn down_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MemberResponse>> {
    state.coordinator.mark_down(&MemberId::new(id.clone())).await?;
    Ok(Json(MemberResponse::new(id, "marked down")))
}

/// Handler for POST /cluster/members/:id/up
pub async fn up_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MemberResponse>> {
    state.coordinator.mark_up(&MemberId::new(id.clone())).await?;
    Ok(Json(MemberResponse::new(id, "back up")))
}
