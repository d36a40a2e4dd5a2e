use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Engine configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Top-level configuration for the interaction engine, loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Session TTL used when `interaction.start` omits `timeout`, in
    /// milliseconds. Clamped to `[1_000, 3_600_000]` at session creation.
    #[serde(default = "d_default_timeout_ms")]
    pub default_timeout_ms: u64,

    /// Hard cap on concurrent sessions; creation past the cap fails.
    #[serde(default = "d_max_sessions")]
    pub max_sessions: usize,

    /// Expiration-sweep period for the in-memory storage backend, in
    /// milliseconds.
    #[serde(default = "d_prune_interval_ms")]
    pub prune_interval_ms: u64,

    #[serde(default)]
    pub storage_type: StorageType,

    #[serde(default)]
    pub distributed: DistributedConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: d_default_timeout_ms(),
            max_sessions: d_max_sessions(),
            prune_interval_ms: d_prune_interval_ms(),
            storage_type: StorageType::default(),
            distributed: DistributedConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageType {
    #[default]
    Memory,
    Distributed,
}

/// Backing-store configuration for `StorageType::Distributed`. Unused when
/// `storage_type` is `Memory`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DistributedConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "d_prefix")]
    pub prefix: String,
    #[serde(default)]
    pub expiration_events: Option<String>,
}

// ── serde default helpers ───────────────────────────────────────────

fn d_default_timeout_ms() -> u64 {
    300_000
}
fn d_max_sessions() -> usize {
    1000
}
fn d_prune_interval_ms() -> u64 {
    60_000
}
fn d_prefix() -> String {
    "mcpi:session:".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
