//! `ai_config.json` loader (spec §6's configuration-file table). Distinct
//! from `netguard_common::config::NetGuardConfig`, which covers the core's
//! own cadence/store/capture knobs: this file carries provider credentials
//! and AI-specific sampling bounds, mirroring
//! `original_source/.../comprehensive_data_aggregator.py::load_config`'s
//! plain `json.load` over a file on disk.

use std::path::Path;

use netguard_common::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ApiKeys {
    pub gemini_api_key: Option<String>,
    pub groq_api_key: Option<String>,
    pub openrouter_api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DataCollectionConfig {
    #[serde(default = "default_time_window_minutes")]
    pub time_window_minutes: i64,
    #[serde(default = "default_max_packets")]
    pub max_packets_to_analyze: i64,
}

fn default_time_window_minutes() -> i64 {
    5
}

fn default_max_packets() -> i64 {
    1000
}

impl Default for DataCollectionConfig {
    fn default() -> Self {
        Self {
            time_window_minutes: default_time_window_minutes(),
            max_packets_to_analyze: default_max_packets(),
        }
    }
}

/// `ai_config.json` shape (spec §6 table). `providers` is an optional
/// explicit priority-order override; when absent the default Gemini →
/// Groq → OpenRouter chain (spec §4.9) applies.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct AiConfigFile {
    #[serde(default)]
    pub ai_enabled: bool,
    #[serde(default = "default_analysis_interval_minutes")]
    pub analysis_interval_minutes: i64,
    #[serde(default)]
    pub api_keys: ApiKeys,
    #[serde(default)]
    pub data_collection: DataCollectionConfig,
    #[serde(default)]
    pub providers: Vec<String>,
}

fn default_analysis_interval_minutes() -> i64 {
    5
}

impl AiConfigFile {
    /// Loads `path`, matching the Python original's behaviour of treating
    /// a missing file as "AI analysis unavailable" rather than a fatal
    /// startup error (spec §7: this is not in the "fatal config" row,
    /// since the core runs fine with C10 disabled).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Configuration(format!("reading {}: {e}", path.display())))?;
        serde_json::from_str(&text)
            .map_err(|e| Error::Configuration(format!("parsing {}: {e}", path.display())))
    }

    /// A disabled, keyless config, used when no `ai_config.json` is found
    /// (§7: tool/provider absence degrades gracefully rather than failing
    /// startup).
    pub fn disabled() -> Self {
        Self::default()
    }
}
