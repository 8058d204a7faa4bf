//! Shared types and utilities used across the NetGuard Pro workspace.

pub mod config;
pub mod error;
pub mod health;
pub mod net;
pub mod retry;
pub mod time;

pub use config::NetGuardConfig;
pub use error::{Error, Result};
pub use health::{ComponentHealth, HealthLevel};
pub use retry::{Backoff, BackoffConfig};

/// Severity used by vulnerabilities and alerts (spec Glossary: CRITICAL >
/// HIGH > MEDIUM > LOW).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Device type classification (spec Glossary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DeviceType {
    IoT,
    Mobile,
    Computer,
    Network,
    Server,
    Virtual,
    Unknown,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::IoT => "IoT",
            DeviceType::Mobile => "Mobile",
            DeviceType::Computer => "Computer",
            DeviceType::Network => "Network",
            DeviceType::Server => "Server",
            DeviceType::Virtual => "Virtual",
            DeviceType::Unknown => "Unknown",
        }
    }
}

impl std::str::FromStr for DeviceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "IoT" => DeviceType::IoT,
            "Mobile" => DeviceType::Mobile,
            "Computer" => DeviceType::Computer,
            "Network" => DeviceType::Network,
            "Server" => DeviceType::Server,
            "Virtual" => DeviceType::Virtual,
            _ => DeviceType::Unknown,
        })
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Letter grade derived from a 0-100 security score (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl From<u8> for Grade {
    fn from(score: u8) -> Self {
        match score {
            90..=100 => Grade::A,
            80..=89 => Grade::B,
            70..=79 => Grade::C,
            60..=69 => Grade::D,
            _ => Grade::F,
        }
    }
}

/// Alert lifecycle status (spec §3/§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Active,
    Resolved,
    FalsePositive,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Active => "active",
            AlertStatus::Resolved => "resolved",
            AlertStatus::FalsePositive => "false_positive",
        }
    }
}

impl std::str::FromStr for AlertStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "active" => AlertStatus::Active,
            "resolved" => AlertStatus::Resolved,
            "false_positive" => AlertStatus::FalsePositive,
            other => return Err(Error::Correlation(format!("unknown alert status: {other}"))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_buckets_match_spec() {
        assert_eq!(Grade::from(95), Grade::A);
        assert_eq!(Grade::from(90), Grade::A);
        assert_eq!(Grade::from(89), Grade::B);
        assert_eq!(Grade::from(70), Grade::C);
        assert_eq!(Grade::from(60), Grade::D);
        assert_eq!(Grade::from(59), Grade::F);
        assert_eq!(Grade::from(0), Grade::F);
    }

    #[test]
    fn severity_ordering_is_critical_high() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }
}
