use serde::{Deserialize, Serialize};

/// System-wide runtime knobs. Keeps scheduling and fairness defaults
/// small and explicit; `None` means "pick the built-in default".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Worker threads in the default pool (`None` = available cores, min 2).
    #[serde(default)]
    pub pool_workers: Option<usize>,

    /// Default events-per-batch budget for spawned reactors (`None` = 50).
    #[serde(default)]
    pub event_budget: Option<u32>,

    /// Pin pool workers round-robin over available cores.
    #[serde(default)]
    pub pin_workers: bool,
}
