//! main.rs — V2V hub entry point
//!
//! Runs two concurrent tasks:
//!   1. Hub loop: advances the traffic simulation at `tick_rate_hz` and drives
//!      the rate-gated V2V cycle, publishing each new view
//!   2. HTTP server: REST read API plus the `/ws/v2v` live stream

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use bsm_types::AgentId;
use clap::Parser;
use tokio::sync::{broadcast, mpsc, RwLock};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use traffic_sim::SimConfig;

use v2v_hub::api::{create_router, AppState, SharedView};
use v2v_hub::hub::{run_hub, Hub, HubCommand, LoopSettings};
use v2v_hub::HubConfig;

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "v2v-hub", about = "V2V cooperative-awareness hub")]
struct Args {
    /// Config file path (missing file = defaults)
    #[arg(short, long, default_value = "v2v-hub.toml")]
    config: PathBuf,
    /// HTTP port
    #[arg(long)]
    port: Option<u16>,
    /// Communication range (meters)
    #[arg(long)]
    max_range: Option<f64>,
    /// Close-range cooperative sharing distance (meters); capped below the range when unset
    #[arg(long)]
    share_distance: Option<f64>,
    /// V2V update rate (Hz)
    #[arg(long)]
    update_rate: Option<f64>,
    /// Disable cooperative perception sharing
    #[arg(long)]
    no_coop: bool,
    /// Scenario preset: highway, intersection, convoy, head_on, dropout
    #[arg(long)]
    scenario: Option<String>,
    /// Number of simulated vehicles
    #[arg(long)]
    vehicles: Option<usize>,
    #[arg(long)]
    seed: Option<u64>,
    /// Simulation speed multiplier (1.0 = real-time)
    #[arg(long)]
    speed: Option<f64>,
    /// Vehicle whose status line is logged
    #[arg(long)]
    ego: Option<AgentId>,
}

impl Args {
    fn apply(&self, cfg: &mut HubConfig) {
        if let Some(port) = self.port { cfg.server.port = port; }
        if let Some(range) = self.max_range { cfg.network.set_range(range); }
        if let Some(share) = self.share_distance { cfg.network.share_distance_m = share; }
        if let Some(rate) = self.update_rate { cfg.network.update_rate_hz = rate; }
        if self.no_coop { cfg.network.cooperative_perception = false; }
        if let Some(sc) = &self.scenario { cfg.simulation.scenario = sc.clone(); }
        if let Some(n) = self.vehicles { cfg.simulation.n_vehicles = n; }
        if let Some(seed) = self.seed { cfg.simulation.seed = seed; }
        if let Some(speed) = self.speed { cfg.simulation.speed = speed; }
        if let Some(ego) = self.ego { cfg.simulation.ego_agent_id = Some(ego); }
    }
}

// ── Main ──────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "v2v_hub=info,traffic_sim=info,tower_http=warn".into()),
        )
        .init();

    let args = Args::parse();

    let mut cfg = HubConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    cfg.apply_env();
    args.apply(&mut cfg);
    cfg.validate().context("invalid configuration")?;

    let sim = &cfg.simulation;
    let scenario = traffic_sim::preset(&sim.scenario, sim.n_vehicles)
        .with_context(|| format!("unknown scenario '{}'", sim.scenario))?;
    let sim_cfg = SimConfig { seed: sim.seed, ..Default::default() };

    info!(
        "🚦 V2V hub starting — {} vehicles, {} scenario, seed {}",
        sim.n_vehicles, sim.scenario, sim.seed
    );

    let hub = Hub::new(cfg.network, sim_cfg, scenario, sim.speed);
    let shared: SharedView = Arc::new(RwLock::new(hub.view()));

    // Broadcast channel for stream frames, mpsc for commands into the hub
    let (frames, _) = broadcast::channel::<String>(64);
    let (cmd_tx, cmd_rx) = mpsc::channel::<HubCommand>(32);

    let settings = LoopSettings {
        tick_rate_hz: sim.tick_rate_hz,
        status_interval_s: sim.status_interval_s,
        ego_agent_id: sim.ego_agent_id,
    };
    tokio::spawn(run_hub(hub, shared.clone(), frames.clone(), cmd_rx, settings));

    let app = create_router(AppState { view: shared, frames, commands: cmd_tx })
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));

    let addr = format!("0.0.0.0:{}", cfg.server.port);
    info!("🌐 REST API at http://{addr}, live stream at ws://{addr}/ws/v2v");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app).await.context("HTTP server")?;
    Ok(())
}
