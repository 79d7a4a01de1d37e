//! api.rs — REST surface over the published network view
//!
//! Handlers read an `Arc<NetworkView>` clone and never touch the coordinator.
//! The one write (cooperative share) goes through the hub's command channel.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use bsm_types::{AgentId, BasicSafetyMessage, BrakeStatus, SensorPayload, TransmissionState, Vec3, VehicleType};
use serde::Serialize;
use serde_json::json;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};

use crate::error::ApiError;
use crate::hub::HubCommand;
use crate::stream;
use crate::threat::{ThreatLevel, ThreatRecord};
use crate::view::NetworkView;

pub type SharedView = Arc<RwLock<Arc<NetworkView>>>;

#[derive(Clone)]
pub struct AppState {
    pub view: SharedView,
    pub frames: broadcast::Sender<String>,
    pub commands: mpsc::Sender<HubCommand>,
}

impl AppState {
    pub async fn snapshot(&self) -> Arc<NetworkView> {
        Arc::clone(&*self.view.read().await)
    }
}

// ── Response types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Acceleration {
    pub longitudinal: f64,
    pub lateral: f64,
    pub vertical: f64,
    pub yaw_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dimensions {
    pub length: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BsmResponse {
    pub agent_id: AgentId,
    pub timestamp: f64,
    pub sequence_counter: u8,
    pub vehicle_type: VehicleType,
    pub position: Vec3,
    pub position_accuracy: f64,
    pub speed: f64,
    pub heading: f64,
    pub steering_angle: f64,
    pub acceleration: Acceleration,
    pub dimensions: Dimensions,
    pub brake_status: BrakeStatus,
    pub brake_pressure: f64,
    pub transmission_state: TransmissionState,
}

impl From<&BasicSafetyMessage> for BsmResponse {
    fn from(b: &BasicSafetyMessage) -> Self {
        Self {
            agent_id: b.agent_id,
            timestamp: b.timestamp,
            sequence_counter: b.sequence_counter,
            vehicle_type: b.vehicle_type,
            position: b.position,
            position_accuracy: b.position_accuracy,
            speed: b.speed,
            heading: b.heading,
            steering_angle: b.steering_angle,
            acceleration: Acceleration {
                longitudinal: b.accel_longitudinal,
                lateral: b.accel_lateral,
                vertical: b.accel_vertical,
                yaw_rate: b.yaw_rate,
            },
            dimensions: Dimensions {
                length: b.vehicle_length,
                width: b.vehicle_width,
                height: b.vehicle_height,
            },
            brake_status: b.brake_status,
            brake_pressure: b.brake_pressure,
            transmission_state: b.transmission_state,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NeighborInfo {
    pub agent_id: AgentId,
    pub distance: f64,
    /// |neighbor speed − subject speed|, m/s
    pub relative_speed: f64,
    pub bsm: BsmResponse,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreatInfo {
    pub other_agent_id: AgentId,
    pub level: ThreatLevel,
    /// `null` when the pair is not closing
    pub time_to_collision: Option<f64>,
    pub distance: f64,
    pub timestamp: f64,
}

impl From<&ThreatRecord> for ThreatInfo {
    fn from(t: &ThreatRecord) -> Self {
        Self {
            other_agent_id: t.other_agent_id,
            level: t.level,
            time_to_collision: t.time_to_collision.is_finite().then_some(t.time_to_collision),
            distance: t.distance,
            timestamp: t.timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStatsResponse {
    pub total_vehicles: usize,
    pub total_messages_sent: u64,
    pub average_neighbors: f64,
    pub max_neighbors: usize,
    pub cooperative_shares: u64,
    pub update_cycles: u64,
    pub update_rate_hz: f64,
    pub max_range_meters: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub agent_id: AgentId,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShareResponse {
    pub recipients: Vec<AgentId>,
}

// ── Router ────────────────────────────────────────────────────────────────────

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(|| async { "v2v-hub ok" }))
        .route("/vehicles", get(list_vehicles))
        .route("/vehicles/:id", get(get_vehicle))
        .route("/vehicles/:id/neighbors", get(get_neighbors))
        .route("/vehicles/:id/threats", get(get_threats))
        .route("/vehicles/:id/status", get(get_status))
        .route("/vehicles/:id/share", post(share_sensor_data))
        .route("/bsm", get(list_bsm))
        .route("/bsm/:id", get(get_vehicle))
        .route("/network/stats", get(network_stats))
        .route("/ws/v2v", get(stream::ws_handler))
        .with_state(state)
}

// ── Handlers ──────────────────────────────────────────────────────────────────

async fn index() -> Json<serde_json::Value> {
    Json(json!({
        "service": "v2v-hub",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "/vehicles",
            "/vehicles/{id}",
            "/vehicles/{id}/neighbors",
            "/vehicles/{id}/threats",
            "/vehicles/{id}/status",
            "/vehicles/{id}/share",
            "/bsm",
            "/bsm/{id}",
            "/network/stats",
            "/health",
            "/ws/v2v",
        ],
    }))
}

async fn list_vehicles(State(state): State<AppState>) -> Json<Vec<AgentId>> {
    Json(state.snapshot().await.agent_ids())
}

fn require_registered(view: &NetworkView, id: AgentId) -> Result<(), ApiError> {
    if view.is_registered(id) { Ok(()) } else { Err(ApiError::NotFound(id)) }
}

async fn get_vehicle(
    State(state): State<AppState>,
    Path(id): Path<AgentId>,
) -> Result<Json<BsmResponse>, ApiError> {
    let view = state.snapshot().await;
    require_registered(&view, id)?;
    let bsm = view.get_bsm(id).ok_or(ApiError::NoDataYet(id))?;
    Ok(Json(BsmResponse::from(&bsm)))
}

async fn get_neighbors(
    State(state): State<AppState>,
    Path(id): Path<AgentId>,
) -> Result<Json<Vec<NeighborInfo>>, ApiError> {
    let view = state.snapshot().await;
    require_registered(&view, id)?;
    let Some(ego) = view.get_bsm(id) else {
        return Ok(Json(Vec::new()));
    };

    let neighbors = view
        .get_neighbors(id)
        .iter()
        .map(|n| NeighborInfo {
            agent_id: n.agent_id,
            distance: view.get_distance(id, n.agent_id).unwrap_or_default(),
            relative_speed: (n.speed - ego.speed).abs(),
            bsm: BsmResponse::from(n),
        })
        .collect();
    Ok(Json(neighbors))
}

async fn get_threats(
    State(state): State<AppState>,
    Path(id): Path<AgentId>,
) -> Result<Json<Vec<ThreatInfo>>, ApiError> {
    let view = state.snapshot().await;
    require_registered(&view, id)?;
    Ok(Json(view.get_threats(id).iter().map(ThreatInfo::from).collect()))
}

async fn get_status(
    State(state): State<AppState>,
    Path(id): Path<AgentId>,
) -> Result<Json<StatusResponse>, ApiError> {
    let view = state.snapshot().await;
    require_registered(&view, id)?;
    Ok(Json(StatusResponse { agent_id: id, status: view.one_line_status(id) }))
}

async fn share_sensor_data(
    State(state): State<AppState>,
    Path(id): Path<AgentId>,
    Json(payload): Json<SensorPayload>,
) -> Result<Json<ShareResponse>, ApiError> {
    let (reply, rx) = oneshot::channel();
    state
        .commands
        .send(HubCommand::Share { agent_id: id, payload, reply })
        .await
        .map_err(|_| ApiError::Unavailable)?;
    let recipients = rx.await.map_err(|_| ApiError::Unavailable)?.ok_or(ApiError::NotFound(id))?;
    Ok(Json(ShareResponse { recipients }))
}

async fn list_bsm(State(state): State<AppState>) -> Json<Vec<BsmResponse>> {
    let view = state.snapshot().await;
    Json(view.get_all_bsm().iter().map(BsmResponse::from).collect())
}

async fn network_stats(State(state): State<AppState>) -> Json<NetworkStatsResponse> {
    let view = state.snapshot().await;
    let stats = view.get_network_stats();
    Json(NetworkStatsResponse {
        total_vehicles: view.vehicle_count(),
        total_messages_sent: stats.total_messages_sent,
        average_neighbors: stats.average_neighbors,
        max_neighbors: stats.max_neighbors,
        cooperative_shares: stats.cooperative_shares,
        update_cycles: stats.update_cycles,
        update_rate_hz: view.update_rate(),
        max_range_meters: view.max_range(),
    })
}
