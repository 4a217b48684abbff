#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use herdbook_engines::advisory::{build_prompt, parse_provider_reply, AdvisoryError};
use herdbook_engines::advisory_http::{AdvisoryHttpConfig, HttpAdvisoryClient, PROVIDER_NAME};
use herdbook_engines::compat_rules::{BreedingRulesConfig, BreedingRulesRuntime};
use herdbook_kernel_contracts::breeding::{AdviceSource, CompatibilityAdvice, EvaluationLogEntry};
use herdbook_kernel_contracts::pedigree::{Animal, BreedingPair};
use herdbook_kernel_contracts::ContractViolation;
use herdbook_storage::breeding_history::{HistoryStore, JsonFileHistoryStore};

/// External advisory capability. Takes the rendered prompt, returns the raw
/// reply text; decoding and validation happen in the advisor.
#[async_trait]
pub trait AdvisoryProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn advise(&self, prompt: String) -> Result<String, AdvisoryError>;
}

#[derive(Debug, Clone)]
pub struct HttpAdvisoryProvider {
    client: Arc<HttpAdvisoryClient>,
}

impl HttpAdvisoryProvider {
    pub fn new(client: HttpAdvisoryClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    pub fn from_env() -> Option<Self> {
        AdvisoryHttpConfig::from_env().map(|c| Self::new(HttpAdvisoryClient::new(c)))
    }
}

#[async_trait]
impl AdvisoryProvider for HttpAdvisoryProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn advise(&self, prompt: String) -> Result<String, AdvisoryError> {
        let client = Arc::clone(&self.client);
        tokio::task::spawn_blocking(move || client.complete(&prompt))
            .await
            .map_err(|_| AdvisoryError::Transport {
                kind: "task_join",
                http_status: None,
            })?
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreedingAdvisorConfig {
    /// Upper bound on one provider round-trip, after which the rules take over.
    pub provider_deadline_ms: u64,
    pub rules: BreedingRulesConfig,
}

impl BreedingAdvisorConfig {
    pub fn mvp_v1() -> Self {
        Self {
            provider_deadline_ms: 20_000,
            rules: BreedingRulesConfig::mvp_v1(),
        }
    }

    pub fn from_env() -> Self {
        let mut c = Self::mvp_v1();
        if let Some(ms) = env::var("HERDBOOK_ADVISORY_DEADLINE_MS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|v| (100..=120_000).contains(v))
        {
            c.provider_deadline_ms = ms;
        }
        c
    }
}

/// Sole entry point for breeding advice. Tries the provider once when one is
/// configured, falls back to the rule evaluator on any failure, and journals
/// every result.
pub struct BreedingAdvisor {
    config: BreedingAdvisorConfig,
    rules: BreedingRulesRuntime,
    provider: Option<Arc<dyn AdvisoryProvider>>,
    history: Arc<dyn HistoryStore>,
    clock: Arc<dyn Clock>,
}

impl BreedingAdvisor {
    pub fn new(
        config: BreedingAdvisorConfig,
        provider: Option<Arc<dyn AdvisoryProvider>>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            config,
            rules: BreedingRulesRuntime::new(config.rules),
            provider,
            history,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn from_env() -> Self {
        let provider = HttpAdvisoryProvider::from_env()
            .map(|p| Arc::new(p) as Arc<dyn AdvisoryProvider>);
        let history = JsonFileHistoryStore::default_local();
        tracing::info!(
            provider = provider.as_ref().map(|p| p.name()).unwrap_or("none"),
            history_path = %history.path().display(),
            "breeding advisor configured"
        );
        Self::new(BreedingAdvisorConfig::from_env(), provider, Arc::new(history))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn history(&self) -> &Arc<dyn HistoryStore> {
        &self.history
    }

    /// Only invalid input is returned as an error; provider and journal
    /// failures are absorbed here.
    pub async fn get_advice(
        &self,
        male: &Animal,
        female: &Animal,
    ) -> Result<CompatibilityAdvice, ContractViolation> {
        let pair = BreedingPair::v1(male.clone(), female.clone())?;
        let now = self.clock.now();

        let advice = match self.try_provider(&pair, now).await {
            Some(advice) => advice,
            None => self.rules.evaluate(&pair, now)?,
        };

        self.record(&pair, &advice).await;
        Ok(advice)
    }

    async fn try_provider(
        &self,
        pair: &BreedingPair,
        now: DateTime<Utc>,
    ) -> Option<CompatibilityAdvice> {
        let Some(provider) = self.provider.as_ref() else {
            tracing::debug!(
                error_kind = AdvisoryError::Unavailable.kind(),
                "no advisory provider configured; using breeding rules"
            );
            return None;
        };
        match self.consult(Arc::clone(provider), pair, now).await {
            Ok(advice) => Some(advice),
            Err(err) => {
                tracing::debug!(
                    provider = provider.name(),
                    error_kind = err.kind(),
                    error = %err,
                    "advisory provider failed; falling back to breeding rules"
                );
                None
            }
        }
    }

    async fn consult(
        &self,
        provider: Arc<dyn AdvisoryProvider>,
        pair: &BreedingPair,
        now: DateTime<Utc>,
    ) -> Result<CompatibilityAdvice, AdvisoryError> {
        let prompt = build_prompt(pair, now);
        let deadline_ms = self.config.provider_deadline_ms;
        // Own task so a panicking provider surfaces as a join error.
        let mut call = tokio::spawn(async move { provider.advise(prompt).await });
        let joined = match tokio::time::timeout(Duration::from_millis(deadline_ms), &mut call).await
        {
            Ok(joined) => joined,
            Err(_) => {
                call.abort();
                return Err(AdvisoryError::Timeout {
                    timeout_ms: deadline_ms,
                });
            }
        };
        let raw = joined.map_err(|_| AdvisoryError::Transport {
            kind: "provider_task_failed",
            http_status: None,
        })??;
        let verdict = parse_provider_reply(&raw)?;
        Ok(verdict.into_advice(now, AdviceSource::Provider)?)
    }

    async fn record(&self, pair: &BreedingPair, advice: &CompatibilityAdvice) {
        let entry = match EvaluationLogEntry::v1(pair, advice.clone(), self.clock.now()) {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(error = %err, "breeding history entry rejected");
                return;
            }
        };
        let history = Arc::clone(&self.history);
        match tokio::task::spawn_blocking(move || history.append(entry)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "breeding history append failed");
            }
            Err(err) => {
                tracing::warn!(error = %err, "breeding history writer task failed");
            }
        }
    }
}
