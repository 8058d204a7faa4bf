//! Provider-neutral prompt rendering and response parsing (spec §4.9 steps
//! 2 and 4). Grounded on `ai_connector_v2.py::_build_comprehensive_prompt`
//! and `_parse_json_response`, generalised away from any one provider's
//! SDK since the Rust providers all speak plain HTTPS JSON.

use netguard_common::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::snapshot::NetworkSnapshot;

/// System preamble sent as the chat "system" message where the provider
/// supports one, and prepended to the user prompt otherwise.
pub const SYSTEM_PREAMBLE: &str = "You are an expert network security analyst. \
Analyze network traffic and identify threats. Always respond with valid JSON only.";

/// Renders the snapshot into the natural-language analysis prompt (spec
/// §4.9 step 2): a senior-analyst framing, the sampled tool sections, and
/// an explicit strict-JSON response contract matching §6's schema.
pub fn render(snapshot: &NetworkSnapshot) -> String {
    let tool_sections: String = snapshot
        .tools
        .iter()
        .map(|t| {
            format!(
                "- **{}** ({} rows total, {} sampled)\n{}",
                t.table,
                t.total_rows,
                t.rows.len(),
                serde_json::to_string_pretty(&t.rows).unwrap_or_default()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "You are a senior network security analyst. Analyze this comprehensive \
network security data from multiple monitoring tools running on a home or \
small-office network.\n\n\
**Important context:** the tools producing this data (tcpdump, tshark, p0f, \
ngrep, httpry, argus, netsniff, iftop, nethogs, Suricata) are themselves \
local, expected monitoring processes. Traffic generated by these tools or by \
the host running them must not be flagged as a threat.\n\n\
**DATA SOURCES (last {} minutes):**\n\n{}\n\n\
**NETWORK SUMMARY:** {} unique local devices. OS/type distribution: {}\n\n\
**IOT DEVICES:** {} recently active. Category breakdown: {}\n\n\
**TOP UNRESOLVED IOT VULNERABILITIES:**\n{}\n\n\
**ANALYSIS REQUIREMENTS:**\n\
1. Identify threats (port scans, DDoS, malware, botnets, data exfiltration) and rate severity.\n\
2. Flag anomalies: traffic spikes, unusual protocols/ports, suspicious connection patterns.\n\
3. Summarize overall network health as a 0-100 score.\n\
4. Recommend concrete remediation actions.\n\n\
**RESPOND WITH ONLY VALID JSON (no markdown fencing), matching exactly this shape:**\n\
{{\n  \"threat_level\": \"LOW|MEDIUM|HIGH|CRITICAL\",\n  \"network_health_score\": 0-100,\n  \
\"summary\": \"one paragraph\",\n  \"threats_detected\": [{{\"severity\": \"...\", \"threat_type\": \"...\", \
\"source_ip\": \"...\", \"description\": \"...\"}}],\n  \"network_insights\": {{}},\n  \
\"device_analysis\": {{}},\n  \"recommendations\": [\"...\"]\n}}\n\n\
Return ONLY the JSON object. No markdown, no explanations.",
        snapshot.time_window_minutes,
        tool_sections,
        snapshot.network_summary.unique_device_count,
        snapshot.network_summary.os_distribution,
        snapshot.iot_summary.recent_devices.len(),
        snapshot.iot_summary.category_counts,
        serde_json::to_string_pretty(&snapshot.iot_security.top_unresolved).unwrap_or_default(),
    )
}

/// The fixed-shape response spec §6 requires at minimum. Extra keys the
/// provider includes are preserved separately in the raw response text,
/// not in this struct.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AiVerdict {
    pub threat_level: String,
    pub network_health_score: i64,
    pub summary: String,
    #[serde(default)]
    pub threats_detected: Vec<Value>,
    #[serde(default)]
    pub network_insights: Value,
    #[serde(default)]
    pub device_analysis: Value,
    #[serde(default)]
    pub recommendations: Vec<Value>,
}

/// Strips a fenced code block (```` ```json ... ``` ````) if present, then
/// parses the remainder as an [`AiVerdict`]. On schema mismatch the caller
/// still has the original `text` to store in the raw column (spec §4.9
/// step 4: "store raw, skip derived writes").
pub fn parse_response(text: &str) -> Result<AiVerdict> {
    let stripped = strip_code_fence(text.trim());
    serde_json::from_str(stripped).map_err(|e| Error::AiDispatch(format!("unparseable AI response: {e}")))
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.trim_start_matches(['\n', '\r']);
    rest.strip_suffix("```").unwrap_or(rest).trim_end()
}
