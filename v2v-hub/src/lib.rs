//! # v2v-hub
//!
//! Vehicle-to-vehicle cooperative-awareness engine.
//!
//! - [`network::NetworkCoordinator`]: rate-gated update cycle (BSM refresh,
//!   neighbor discovery, threat assessment, statistics)
//! - [`view::NetworkView`]: immutable per-cycle state handed to readers
//! - [`api`] / [`stream`]: REST and WebSocket presentation
//! - [`hub`]: drives the coordinator from the built-in traffic simulation

pub mod api;
pub mod config;
pub mod error;
pub mod hub;
pub mod network;
pub mod registry;
pub mod stats;
pub mod stream;
pub mod threat;
pub mod topology;
pub mod view;

pub use config::{HubConfig, NetworkConfig};
pub use error::{ApiError, ConfigError};
pub use network::NetworkCoordinator;
pub use stats::NetworkStatistics;
pub use threat::{ThreatLevel, ThreatRecord};
pub use view::NetworkView;
