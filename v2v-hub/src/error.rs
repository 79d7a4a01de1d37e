//! error.rs — Error types for configuration loading and the REST surface
//!
//! The coordinator itself never fails: lookups return `Option` or empty lists.
//! Errors only exist at the edges (startup config, HTTP responses).

use std::path::PathBuf;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use bsm_types::AgentId;
use serde::Serialize;
use thiserror::Error;

// ── Configuration ─────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("update rate must be a positive finite number of Hz, got {0}")]
    InvalidUpdateRate(f64),

    #[error("communication range must be a positive number of meters, got {0}")]
    InvalidRange(f64),

    #[error("share distance {share_m} m must be smaller than the communication range {range_m} m")]
    ShareDistanceTooLarge { share_m: f64, range_m: f64 },

    #[error("simulation.{field} must be a positive finite number, got {value}")]
    InvalidSimulation { field: &'static str, value: f64 },

    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── REST ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("vehicle {0} is not registered")]
    NotFound(AgentId),

    #[error("vehicle {0} has no data yet")]
    NoDataYet(AgentId),

    #[error("update loop is not running")]
    Unavailable,
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::NoDataYet(_) => "NO_DATA_YET",
            ApiError::Unavailable => "UNAVAILABLE",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) | ApiError::NoDataYet(_) => StatusCode::NOT_FOUND,
            ApiError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: self.code(),
        });
        (self.status(), body).into_response()
    }
}
