// Integration tests for the REST surface

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use bsm_types::{KinematicSample, MotionSnapshot, Vec3};
use tokio::sync::{broadcast, mpsc, RwLock};
use tower::ServiceExt;
use v2v_hub::api::{create_router, AppState};
use v2v_hub::hub::HubCommand;
use v2v_hub::{NetworkConfig, NetworkCoordinator};

fn sample(x: f64, vx: f64) -> KinematicSample {
    KinematicSample {
        position: Vec3::new(x, 0.0, 0.0),
        velocity: Vec3::new(vx.abs(), 0.0, 0.0),
        heading_deg: if vx < 0.0 { 180.0 } else { 0.0 },
        half_extents: Vec3::new(2.25, 0.9, 0.75),
        ..Default::default()
    }
}

/// Agents 0..=2 at x = 0, 25, 60 (range 50) plus agent 9 registered but never updated.
fn create_test_network() -> NetworkCoordinator {
    let mut net = NetworkCoordinator::new(NetworkConfig::with_range(50.0));
    let mut snap = MotionSnapshot::new(1.0);
    for (id, x, vx) in [(0u32, 0.0, 10.0), (1, 25.0, -5.0), (2, 60.0, 0.0)] {
        net.register(id, id);
        snap.insert(id, sample(x, vx));
    }
    net.update(&snap, false);
    net.register(9, 9);
    net
}

/// Router over a fixed view; share commands are answered by a stand-in hub task.
fn create_test_app() -> Router {
    let mut net = create_test_network();
    let view = Arc::new(RwLock::new(net.view()));
    let (frames, _) = broadcast::channel(8);
    let (commands, mut rx) = mpsc::channel::<HubCommand>(8);

    tokio::spawn(async move {
        while let Some(cmd) = rx.recv().await {
            if let HubCommand::Share { agent_id, payload, reply } = cmd {
                let result = net
                    .view()
                    .is_registered(agent_id)
                    .then(|| net.enable_cooperative_sharing(agent_id, payload));
                let _ = reply.send(result);
            }
        }
    });

    create_router(AppState { view, frames, commands })
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_list_vehicles() {
    let (status, body) = get_json(create_test_app(), "/vehicles").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!([0, 1, 2, 9]));
}

#[tokio::test]
async fn test_get_vehicle_bsm() {
    let (status, body) = get_json(create_test_app(), "/vehicles/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["agentId"], 1);
    assert_eq!(body["sequenceCounter"], 1);
    assert_eq!(body["position"]["x"], 25.0);
    assert_eq!(body["speed"], 5.0);
    assert_eq!(body["heading"], 180.0);
    assert_eq!(body["dimensions"]["length"], 4.5);
    assert!(body["acceleration"]["longitudinal"].is_number());
    assert_eq!(body["brakeStatus"], "OFF");
}

#[tokio::test]
async fn test_unknown_vehicle_is_not_found() {
    let (status, body) = get_json(create_test_app(), "/vehicles/404").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
    assert!(body["error"].as_str().is_some_and(|e| e.contains("404")));
}

#[tokio::test]
async fn test_registered_without_data_is_no_data_yet() {
    let (status, body) = get_json(create_test_app(), "/vehicles/9").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NO_DATA_YET");

    let (status, body) = get_json(create_test_app(), "/vehicles/9/neighbors").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!([]));
}

#[tokio::test]
async fn test_neighbors_carry_distance_and_relative_speed() {
    let (status, body) = get_json(create_test_app(), "/vehicles/1/neighbors").await;
    assert_eq!(status, StatusCode::OK);
    let list = body.as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["agentId"], 0);
    assert_eq!(list[0]["distance"], 25.0);
    assert_eq!(list[0]["relativeSpeed"], 5.0);
    assert_eq!(list[1]["agentId"], 2);
    assert_eq!(list[1]["distance"], 35.0);
    assert_eq!(list[1]["bsm"]["agentId"], 2);
}

#[tokio::test]
async fn test_threats_sorted_by_level() {
    let (status, body) = get_json(create_test_app(), "/vehicles/1/threats").await;
    assert_eq!(status, StatusCode::OK);
    let list = body.as_array().unwrap();
    assert_eq!(list.len(), 2);
    // 0 → 1 closing at 15 m/s over 25 m (ttc 1.67 s); 2 is parked 35 m away, closing at 5 m/s (ttc 7 s)
    assert_eq!(list[0]["otherAgentId"], 0);
    assert_eq!(list[0]["level"], 4);
    assert_eq!(list[1]["otherAgentId"], 2);
    assert_eq!(list[1]["level"], 2);

    // 0 and 2 are out of range of each other
    let (_, body) = get_json(create_test_app(), "/vehicles/0/threats").await;
    assert_eq!(body.as_array().map(Vec::len), Some(1));

    let (status, _) = get_json(create_test_app(), "/vehicles/77/threats").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_network_stats() {
    let (status, body) = get_json(create_test_app(), "/network/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalVehicles"], 4);
    assert_eq!(body["totalMessagesSent"], 3);
    assert_eq!(body["maxNeighbors"], 2);
    assert_eq!(body["updateRateHz"], 2.0);
    assert_eq!(body["maxRangeMeters"], 50.0);
    assert_eq!(body["cooperativeShares"], 0);
}

#[tokio::test]
async fn test_status_line() {
    let (status, body) = get_json(create_test_app(), "/vehicles/1/status").await;
    assert_eq!(status, StatusCode::OK);
    let line = body["status"].as_str().unwrap();
    assert!(line.starts_with("V2V:   5.0m/s"));
    assert!(line.contains("Neighbors: 2"));
}

#[tokio::test]
async fn test_bsm_collection_and_index() {
    let (status, body) = get_json(create_test_app(), "/bsm").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(3));

    let (status, body) = get_json(create_test_app(), "/bsm/2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["agentId"], 2);

    let (status, body) = get_json(create_test_app(), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "v2v-hub");
}

#[tokio::test]
async fn test_share_sensor_data() {
    let app = create_test_app();
    let payload = serde_json::json!({
        "detectedObjects": [
            { "objectId": 1, "kind": "pedestrian", "position": { "x": 5.0, "y": 2.0, "z": 0.0 }, "confidence": 0.9 }
        ]
    });
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/vehicles/1/share")
                .header("Content-Type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    // Share distance is 25 m at this range: only agent 0 qualifies
    assert_eq!(value["recipients"], serde_json::json!([0]));
}

#[tokio::test]
async fn test_share_for_unknown_vehicle() {
    let response = create_test_app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/vehicles/55/share")
                .header("Content-Type", "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
