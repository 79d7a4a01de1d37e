//! stream.rs — `/ws/v2v` live feed
//!
//! On connect the client gets the current frame immediately, then one frame per
//! performed V2V cycle. Clients may send control commands:
//! `{ "cmd": "pause" | "resume" | "set_speed" | "scenario", "args": {...} }`

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use serde_json::json;
use tracing::{info, warn};

use crate::api::{AppState, BsmResponse};
use crate::hub::HubCommand;
use crate::view::NetworkView;

/// One `v2v_update` frame: every live BSM plus cycle metadata.
pub fn frame_json(view: &NetworkView) -> String {
    let bsms: Vec<BsmResponse> = view.get_all_bsm().iter().map(BsmResponse::from).collect();
    json!({
        "type":        "v2v_update",
        "timestamp":   chrono::Utc::now().to_rfc3339(),
        "simTime":     view.timestamp(),
        "cycle":       view.cycle(),
        "vehicles":    view.vehicle_count(),
        "bsmMessages": bsms,
    })
    .to_string()
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn handle_ws(mut socket: WebSocket, state: AppState) {
    let mut frames = state.frames.subscribe();
    info!("🔌 V2V stream client connected");

    // Send current state immediately on connect
    let view = state.snapshot().await;
    let current = frame_json(&view);
    if socket.send(Message::Text(current)).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            // Relay frames to client
            Ok(frame) = frames.recv() => {
                if socket.send(Message::Text(frame)).await.is_err() { break; }
            }
            // Handle commands from client
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(raw))) => {
                    match parse_command(&raw) {
                        Some(cmd) => {
                            if state.commands.send(cmd).await.is_err() { break; }
                        }
                        None => warn!("Unknown control command: {raw}"),
                    }
                }
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }
    info!("🔌 V2V stream client disconnected");
}

/// Commands are JSON: `{ "cmd": "...", "args": {...} }`
pub fn parse_command(raw: &str) -> Option<HubCommand> {
    let v: serde_json::Value = serde_json::from_str(raw).ok()?;
    match v["cmd"].as_str()? {
        "pause" => Some(HubCommand::Pause),
        "resume" => Some(HubCommand::Resume),
        "set_speed" => v["args"]["speed"].as_f64().map(HubCommand::SetSpeed),
        "scenario" => v["args"]["name"].as_str().map(|n| HubCommand::Scenario(n.to_string())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkConfig;

    #[test]
    fn test_parse_commands() {
        assert!(matches!(parse_command(r#"{"cmd":"pause"}"#), Some(HubCommand::Pause)));
        assert!(matches!(parse_command(r#"{"cmd":"resume","args":{}}"#), Some(HubCommand::Resume)));
        assert!(matches!(
            parse_command(r#"{"cmd":"set_speed","args":{"speed":2.5}}"#),
            Some(HubCommand::SetSpeed(s)) if s == 2.5
        ));
        assert!(matches!(
            parse_command(r#"{"cmd":"scenario","args":{"name":"convoy"}}"#),
            Some(HubCommand::Scenario(ref n)) if n == "convoy"
        ));
        assert!(parse_command(r#"{"cmd":"set_speed"}"#).is_none());
        assert!(parse_command(r#"{"cmd":"launch"}"#).is_none());
        assert!(parse_command("not json").is_none());
    }

    #[test]
    fn test_frame_shape() {
        let view = NetworkView::empty(NetworkConfig::default());
        let frame: serde_json::Value = serde_json::from_str(&frame_json(&view)).unwrap();
        assert_eq!(frame["type"], "v2v_update");
        assert_eq!(frame["cycle"], 0);
        assert_eq!(frame["vehicles"], 0);
        assert!(frame["bsmMessages"].as_array().is_some_and(|a| a.is_empty()));
        assert!(chrono::DateTime::parse_from_rfc3339(frame["timestamp"].as_str().unwrap()).is_ok());
    }
}
