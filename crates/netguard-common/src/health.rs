//! Health reporting shared by collectors and correlators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Coarse health classification for a single worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthLevel {
    Healthy,
    Degraded,
    Critical,
    Unknown,
}

/// A point-in-time health snapshot for one component (a collector or a
/// correlator loop).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: HealthLevel,
    pub message: String,
    pub last_check: DateTime<Utc>,
    pub metrics: HashMap<String, f64>,
}

impl ComponentHealth {
    pub fn healthy(message: impl Into<String>) -> Self {
        Self {
            status: HealthLevel::Healthy,
            message: message.into(),
            last_check: Utc::now(),
            metrics: HashMap::new(),
        }
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self {
            status: HealthLevel::Degraded,
            message: message.into(),
            last_check: Utc::now(),
            metrics: HashMap::new(),
        }
    }

    pub fn critical(message: impl Into<String>) -> Self {
        Self {
            status: HealthLevel::Critical,
            message: message.into(),
            last_check: Utc::now(),
            metrics: HashMap::new(),
        }
    }

    pub fn with_metric(mut self, key: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(key.into(), value);
        self
    }
}
