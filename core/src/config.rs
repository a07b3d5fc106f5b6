use serde::{Deserialize, Serialize};

/// Default per-minute call rate, in the ledger's (unspecified) currency.
pub const DEFAULT_PER_MINUTE_RATE: f64 = 5.0;

/// Key that always authenticates as fraud.
pub const DEFAULT_SENTINEL_KEY: &str = "rs8";

/// Whether call-lifecycle handlers check the current call state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePolicy {
    #[default]
    Permissive,
    Strict,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Charge per call minute applied at pay time.
    pub per_minute_rate: f64,
    /// Always-fraud test key; also seeded into the fraud registry.
    pub sentinel_key: String,
    pub lifecycle: LifecyclePolicy,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            per_minute_rate: DEFAULT_PER_MINUTE_RATE,
            sentinel_key: DEFAULT_SENTINEL_KEY.to_string(),
            lifecycle: LifecyclePolicy::Permissive,
        }
    }
}

impl LedgerConfig {
    /// Load from a JSON file. Missing fields fall back to defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        if !config.per_minute_rate.is_finite() || config.per_minute_rate < 0.0 {
            anyhow::bail!("{path}: per_minute_rate must be a non-negative number");
        }
        Ok(config)
    }

    /// Strict lifecycle, default rates. Used by unit tests.
    pub fn default_test() -> Self {
        Self {
            lifecycle: LifecyclePolicy::Strict,
            ..Self::default()
        }
    }
}
