//! Dispatch loop with ordered provider fallback (spec §4.9 steps 3-5).
//! Grounded on `ai_connector_v2.py::MultiAIAnalyzer.analyze_network_data`'s
//! try-next-on-failure loop, adapted to Rust's `Result`-per-call style
//! instead of catching a broad `except Exception`.

use std::time::Duration;

use netguard_common::{Error, Result};
use netguard_store::TableRegistry;
use serde_json::Value;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::prompt::{self, AiVerdict};
use crate::provider::AiProvider;
use crate::snapshot::{self, NetworkSnapshot};

/// Whole-chain time budget (spec §4.9 step 3: "total budget ≈ 60 s").
const CHAIN_BUDGET: Duration = Duration::from_secs(60);

/// Outcome of one AI cycle, independent of how it was persisted.
#[derive(Debug)]
pub enum CycleOutcome {
    /// A provider returned a parseable verdict.
    Success {
        provider: String,
        verdict: AiVerdict,
        raw_response: String,
    },
    /// Every provider was skipped (no key) or failed, or the snapshot was
    /// empty to begin with.
    Failure { error_message: String },
}

pub struct AiAggregator {
    pool: SqlitePool,
    registry: TableRegistry,
    providers: Vec<Box<dyn AiProvider>>,
    time_window_minutes: i64,
    max_packets_to_analyze: i64,
}

impl AiAggregator {
    pub fn new(
        pool: SqlitePool,
        registry: TableRegistry,
        providers: Vec<Box<dyn AiProvider>>,
        time_window_minutes: i64,
        max_packets_to_analyze: i64,
    ) -> Self {
        Self {
            pool,
            registry,
            providers,
            time_window_minutes,
            max_packets_to_analyze,
        }
    }

    /// Runs one full cycle: build snapshot, dispatch to providers in
    /// order, persist exactly one `ai_analysis` row (invariant AI1/AI2).
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        let snapshot = snapshot::build(
            &self.pool,
            &self.registry,
            self.time_window_minutes,
            self.max_packets_to_analyze,
        )
        .await?;

        let outcome = if snapshot.is_empty() {
            info!("AI cycle skipped: no data to analyze");
            CycleOutcome::Failure {
                error_message: "no data to analyze".to_string(),
            }
        } else {
            self.dispatch(&snapshot).await
        };

        self.persist(&snapshot, &outcome).await?;
        Ok(outcome)
    }

    async fn dispatch(&self, snapshot: &NetworkSnapshot) -> CycleOutcome {
        let rendered = prompt::render(snapshot);
        let deadline = tokio::time::Instant::now() + CHAIN_BUDGET;

        for provider in &self.providers {
            if tokio::time::Instant::now() >= deadline {
                warn!("AI chain budget exhausted before trying {}", provider.name());
                break;
            }

            info!(provider = provider.name(), "trying AI provider");
            match provider.analyze(&rendered).await {
                Ok(raw_response) => match prompt::parse_response(&raw_response) {
                    Ok(verdict) => {
                        info!(provider = provider.name(), "AI provider succeeded");
                        return CycleOutcome::Success {
                            provider: provider.name().to_string(),
                            verdict,
                            raw_response,
                        };
                    }
                    Err(e) => {
                        warn!(provider = provider.name(), error = %e, "AI provider returned unparseable response");
                    }
                },
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "AI provider failed");
                }
            }
        }

        CycleOutcome::Failure {
            error_message: "all AI providers failed or no API keys configured".to_string(),
        }
    }

    /// Persists exactly one `ai_analysis` row per cycle. `http_json` carries
    /// the httpry sample the snapshot fed to the provider (or `NULL` when
    /// this cycle had no httpry data), so a later read of the row can see
    /// what HTTP traffic the verdict was actually based on.
    async fn persist(&self, snapshot: &NetworkSnapshot, outcome: &CycleOutcome) -> Result<()> {
        let http_json = snapshot
            .tools
            .iter()
            .find(|sample| sample.table.starts_with("httpry"))
            .map(|sample| Value::from(sample.rows.clone()).to_string());

        match outcome {
            CycleOutcome::Success {
                provider,
                verdict,
                raw_response,
            } => {
                sqlx::query(
                    "INSERT INTO ai_analysis \
                     (threat_level, network_health_score, summary, threats_json, insights_json, \
                      devices_json, http_json, recommendations_json, provider_used, success, raw_response) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?)",
                )
                .bind(&verdict.threat_level)
                .bind(verdict.network_health_score)
                .bind(&verdict.summary)
                .bind(Value::from(verdict.threats_detected.clone()).to_string())
                .bind(verdict.network_insights.to_string())
                .bind(verdict.device_analysis.to_string())
                .bind(http_json)
                .bind(Value::from(verdict.recommendations.clone()).to_string())
                .bind(provider)
                .bind(raw_response)
                .execute(&self.pool)
                .await
                .map_err(|e| Error::Store(e.to_string()))?;
            }
            CycleOutcome::Failure { error_message } => {
                sqlx::query(
                    "INSERT INTO ai_analysis (http_json, success, error_message) VALUES (?, 0, ?)",
                )
                .bind(http_json)
                .bind(error_message)
                .execute(&self.pool)
                .await
                .map_err(|e| Error::Store(e.to_string()))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use netguard_store::Store;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct ScriptedProvider {
        label: &'static str,
        result: Result<&'static str>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl AiProvider for ScriptedProvider {
        fn name(&self) -> &str {
            self.label
        }
        async fn analyze(&self, _prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.result {
                Ok(text) => Ok((*text).to_string()),
                Err(_) => Err(Error::AiDispatch("simulated failure".to_string())),
            }
        }
    }

    async fn seed_one_device(store: &Store) {
        sqlx::query(
            "INSERT INTO devices (ip_address, hostname, device_type, device_category, is_trusted, \
             first_seen, last_seen, total_packets, total_bytes) \
             VALUES ('192.168.1.5', 'laptop', 'Computer', 'Computer', 0, datetime('now'), datetime('now'), 1, 1)",
        )
        .execute(store.pool())
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn empty_snapshot_writes_only_a_failure_row() {
        let store = Store::open_in_memory().await.unwrap();
        let aggregator = AiAggregator::new(store.pool().clone(), store.registry(), Vec::new(), 5, 1000);

        let outcome = aggregator.run_cycle().await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Failure { .. }));

        let (count, success): (i64, i64) =
            sqlx::query_as("SELECT COUNT(*), MAX(success) FROM ai_analysis")
                .fetch_one(store.pool())
                .await
                .unwrap();
        assert_eq!(count, 1, "invariant AI1: at most one row per cycle");
        assert_eq!(success, 0);
    }

    #[tokio::test]
    async fn first_provider_failure_falls_through_to_the_second() {
        let store = Store::open_in_memory().await.unwrap();
        seed_one_device(&store).await;

        let first_calls = Arc::new(AtomicUsize::new(0));
        let second_calls = Arc::new(AtomicUsize::new(0));
        let providers: Vec<Box<dyn AiProvider>> = vec![
            Box::new(ScriptedProvider {
                label: "Gemini 2.0 Flash",
                result: Err(Error::AiDispatch("invalid key".to_string())),
                calls: first_calls.clone(),
            }),
            Box::new(ScriptedProvider {
                label: "Groq Llama 3.3 70B",
                result: Ok("{\"threat_level\":\"LOW\",\"network_health_score\":92,\"summary\":\"quiet\"}"),
                calls: second_calls.clone(),
            }),
        ];
        let aggregator = AiAggregator::new(store.pool().clone(), store.registry(), providers, 5, 1000);

        let outcome = aggregator.run_cycle().await.unwrap();
        match outcome {
            CycleOutcome::Success { provider, .. } => assert_eq!(provider, "Groq Llama 3.3 70B"),
            CycleOutcome::Failure { .. } => panic!("expected the second provider to succeed"),
        }
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);

        let (count, provider_used): (i64, String) =
            sqlx::query_as("SELECT COUNT(*), provider_used FROM ai_analysis")
                .fetch_one(store.pool())
                .await
                .unwrap();
        assert_eq!(count, 1, "invariant AI1: exactly one row, from the provider that succeeded");
        assert_eq!(provider_used, "Groq Llama 3.3 70B");
    }

    #[tokio::test]
    async fn third_provider_in_the_default_chain_still_gets_a_chance() {
        let store = Store::open_in_memory().await.unwrap();
        seed_one_device(&store).await;

        let calls = Arc::new(AtomicUsize::new(0));
        let providers: Vec<Box<dyn AiProvider>> = vec![
            Box::new(ScriptedProvider {
                label: "Gemini 2.0 Flash",
                result: Err(Error::AiDispatch("invalid key".to_string())),
                calls: Arc::new(AtomicUsize::new(0)),
            }),
            Box::new(ScriptedProvider {
                label: "Groq Llama 3.3 70B",
                result: Err(Error::AiDispatch("rate limited".to_string())),
                calls: Arc::new(AtomicUsize::new(0)),
            }),
            Box::new(ScriptedProvider {
                label: "OpenRouter DeepSeek R1",
                result: Ok("{\"threat_level\":\"MEDIUM\",\"network_health_score\":70,\"summary\":\"ok\"}"),
                calls: calls.clone(),
            }),
        ];
        let aggregator = AiAggregator::new(store.pool().clone(), store.registry(), providers, 5, 1000);

        let outcome = aggregator.run_cycle().await.unwrap();
        match outcome {
            CycleOutcome::Success { provider, .. } => assert_eq!(provider, "OpenRouter DeepSeek R1"),
            CycleOutcome::Failure { .. } => panic!("expected the third provider to succeed"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn httpry_sample_is_persisted_into_http_json() {
        let store = Store::open_in_memory().await.unwrap();
        seed_one_device(&store).await;
        let table = store.registry().create("httpry").await.unwrap();
        sqlx::query(&format!(
            "INSERT INTO \"{table}\" (timestamp, src_ip, dest_ip, method, host, uri, status_code, direction) \
             VALUES (datetime('now'), '192.168.1.5', '93.184.216.34', 'GET', 'example.com', '/', 200, 'outbound')"
        ))
        .execute(store.pool())
        .await
        .unwrap();

        let providers: Vec<Box<dyn AiProvider>> = vec![Box::new(ScriptedProvider {
            label: "Groq Llama 3.3 70B",
            result: Ok("{\"threat_level\":\"LOW\",\"network_health_score\":95,\"summary\":\"quiet\"}"),
            calls: Arc::new(AtomicUsize::new(0)),
        })];
        let aggregator = AiAggregator::new(store.pool().clone(), store.registry(), providers, 5, 1000);
        aggregator.run_cycle().await.unwrap();

        let http_json: Option<String> = sqlx::query_scalar("SELECT http_json FROM ai_analysis LIMIT 1")
            .fetch_one(store.pool())
            .await
            .unwrap();
        let http_json = http_json.expect("http_json should be populated from the httpry sample");
        assert!(http_json.contains("example.com"));
    }
}
