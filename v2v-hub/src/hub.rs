//! hub.rs — Drives the coordinator from the built-in motion source
//!
//! The hub task is the coordinator's only writer. It advances the traffic
//! simulation at `tick_rate_hz`, offers every snapshot to `update` (which
//! rate-gates itself), and publishes the resulting view for the API layer.
//! Everything else (REST share requests, WebSocket control) reaches it
//! through the `HubCommand` channel.

use std::sync::Arc;
use std::time::Duration;

use bsm_types::{AgentId, SensorPayload};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};
use traffic_sim::{ScenarioConfig, SimConfig, TrafficSim};

use crate::api::SharedView;
use crate::config::NetworkConfig;
use crate::network::NetworkCoordinator;
use crate::stream;
use crate::view::NetworkView;

// ── Commands ──────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum HubCommand {
    /// Cooperative share on behalf of an agent; replies `None` if it is not registered.
    Share {
        agent_id: AgentId,
        payload: SensorPayload,
        reply: oneshot::Sender<Option<Vec<AgentId>>>,
    },
    Pause,
    Resume,
    /// Sim-time multiplier, clamped to 0.1–20
    SetSpeed(f64),
    /// Preset name, see `traffic_sim::preset`
    Scenario(String),
}

// ── Hub ───────────────────────────────────────────────────────────────────────

pub struct Hub {
    coordinator: NetworkCoordinator,
    sim: TrafficSim,
    sim_cfg: SimConfig,
    paused: bool,
    speed: f64,
}

impl Hub {
    pub fn new(network: NetworkConfig, sim_cfg: SimConfig, scenario: ScenarioConfig, speed: f64) -> Self {
        let sim = TrafficSim::new(&sim_cfg, scenario);
        let mut hub = Self {
            coordinator: NetworkCoordinator::new(network),
            sim,
            sim_cfg,
            paused: false,
            speed,
        };
        hub.register_all();
        hub
    }

    /// Agent ids are dense from 0, in spawn order.
    fn register_all(&mut self) {
        for (idx, actor_id) in self.sim.actor_ids().into_iter().enumerate() {
            self.coordinator.register(idx as AgentId, actor_id);
        }
        info!("🚗 Registered {} vehicles ({} scenario)", self.sim.vehicles.len(), self.sim.scenario.layout);
    }

    pub fn coordinator(&self) -> &NetworkCoordinator {
        &self.coordinator
    }

    pub fn view(&self) -> Arc<NetworkView> {
        self.coordinator.view()
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Advance the motion source by one tick and offer the snapshot to the coordinator.
    /// Returns whether a V2V cycle was performed.
    pub fn step(&mut self, tick_dt: f64) -> bool {
        if self.paused {
            return false;
        }
        self.sim.tick(tick_dt * self.speed);
        let snapshot = self.sim.snapshot();
        self.coordinator.update(&snapshot, false)
    }

    pub fn load_scenario(&mut self, scenario: ScenarioConfig) {
        for id in self.coordinator.agent_ids() {
            self.coordinator.unregister(id);
        }
        self.sim = TrafficSim::new(&self.sim_cfg, scenario);
        self.register_all();
    }

    pub fn handle_command(&mut self, cmd: HubCommand) {
        match cmd {
            HubCommand::Share { agent_id, payload, reply } => {
                let result = self
                    .coordinator
                    .view()
                    .is_registered(agent_id)
                    .then(|| self.coordinator.enable_cooperative_sharing(agent_id, payload));
                // Requester may have gone away; nothing to do then
                let _ = reply.send(result);
            }
            HubCommand::Pause => {
                self.paused = true;
                info!("⏸ Hub paused");
            }
            HubCommand::Resume => {
                self.paused = false;
                info!("▶ Hub resumed");
            }
            HubCommand::SetSpeed(sp) => {
                self.speed = sp.clamp(0.1, 20.0);
                info!("⚡ Sim speed set to {}×", self.speed);
            }
            HubCommand::Scenario(name) => {
                let n = self.sim.vehicles.len().max(1);
                match traffic_sim::preset(&name, n) {
                    Some(sc) => {
                        self.load_scenario(sc);
                        info!("🎭 Scenario '{name}' loaded");
                    }
                    None => warn!("Unknown scenario: {name}"),
                }
            }
        }
    }
}

// ── Tick task ─────────────────────────────────────────────────────────────────

pub struct LoopSettings {
    pub tick_rate_hz: f64,
    pub status_interval_s: f64,
    /// Agent whose status line is logged; first registered agent when `None`
    pub ego_agent_id: Option<AgentId>,
}

/// Runs until the process exits. Publishes a new view and a stream frame after
/// every performed cycle, and a new view after every command.
pub async fn run_hub(
    mut hub: Hub,
    shared: SharedView,
    frames: broadcast::Sender<String>,
    mut commands: mpsc::Receiver<HubCommand>,
    settings: LoopSettings,
) {
    let tick_dt = 1.0 / settings.tick_rate_hz;
    let mut ticker = interval(Duration::from_secs_f64(tick_dt));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut status_ticker = interval(Duration::from_secs_f64(settings.status_interval_s));

    info!(
        "⏱ Hub loop running — sim {} Hz, V2V {} Hz",
        settings.tick_rate_hz,
        hub.coordinator().config().update_rate_hz,
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if hub.step(tick_dt) {
                    let view = hub.view();
                    let frame = stream::frame_json(&view);
                    *shared.write().await = view;
                    // No subscribers is fine
                    let _ = frames.send(frame);
                }
            }
            Some(cmd) = commands.recv() => {
                hub.handle_command(cmd);
                *shared.write().await = hub.view();
            }
            _ = status_ticker.tick() => {
                let view = hub.view();
                let ego = settings.ego_agent_id.or_else(|| view.agent_ids().first().copied());
                if let Some(ego) = ego {
                    info!("{}", view.one_line_status(ego));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use traffic_sim::ScenarioType;

    fn hub(n: usize) -> Hub {
        let network = NetworkConfig { update_rate_hz: 10.0, ..Default::default() };
        Hub::new(network, SimConfig::default(), ScenarioConfig::new(ScenarioType::Convoy, n), 1.0)
    }

    #[test]
    fn test_new_registers_every_vehicle() {
        let hub = hub(4);
        assert_eq!(hub.view().agent_ids(), vec![0, 1, 2, 3]);
        assert!(hub.view().get_bsm(0).is_none());
    }

    #[test]
    fn test_step_rate_gates_cycles() {
        let mut hub = hub(3);
        // 20 Hz ticks against a 10 Hz V2V cadence
        let performed = (0..10).filter(|_| hub.step(0.05)).count();
        assert_eq!(performed, 5);
        assert_eq!(hub.view().get_all_bsm().len(), 3);
    }

    #[test]
    fn test_pause_resume_and_speed() {
        let mut hub = hub(2);
        hub.handle_command(HubCommand::Pause);
        assert!(!hub.step(0.05));
        assert!(hub.paused);
        hub.handle_command(HubCommand::Resume);
        assert!(hub.step(0.05));

        hub.handle_command(HubCommand::SetSpeed(100.0));
        assert_eq!(hub.speed(), 20.0);
    }

    #[test]
    fn test_scenario_switch_reregisters() {
        let mut hub = hub(3);
        hub.step(0.05);
        hub.handle_command(HubCommand::Scenario("intersection".into()));
        let view = hub.view();
        assert_eq!(view.agent_ids(), vec![0, 1, 2]);
        assert!(view.get_all_bsm().is_empty());

        hub.handle_command(HubCommand::Scenario("roundabout".into()));
        assert_eq!(hub.view().agent_ids().len(), 3);
    }

    #[test]
    fn test_share_replies_through_channel() {
        let mut hub = hub(3);
        hub.step(0.05);

        let (tx, mut rx) = oneshot::channel();
        hub.handle_command(HubCommand::Share { agent_id: 0, payload: SensorPayload::default(), reply: tx });
        // Convoy spacing is 15 m, so the next car is within sharing distance
        let recipients = rx.try_recv().unwrap().unwrap();
        assert!(recipients.contains(&1));

        let (tx, mut rx) = oneshot::channel();
        hub.handle_command(HubCommand::Share { agent_id: 42, payload: SensorPayload::default(), reply: tx });
        assert_eq!(rx.try_recv().unwrap(), None);
    }
}
