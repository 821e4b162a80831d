//! Orchestrator configuration.

use serde::{Deserialize, Serialize};

const EVENT_CAPACITY_VAR: &str = "SANITY_EVENT_CAPACITY";
const PUBLISH_PROBLEMS_VAR: &str = "SANITY_PUBLISH_PROBLEMS";

/// Configuration for an [`Orchestrator`](crate::Orchestrator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Buffer size of the run event channel; slow subscribers past this lag.
    pub event_capacity: usize,

    /// Mirror failing records into the shared problem list.
    pub publish_problems: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            event_capacity: 64,
            publish_problems: true,
        }
    }
}

impl OrchestratorConfig {
    /// Defaults overridden by `SANITY_EVENT_CAPACITY` and `SANITY_PUBLISH_PROBLEMS`.
    ///
    /// Unparseable values are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(capacity) = lookup(EVENT_CAPACITY_VAR).and_then(|v| v.trim().parse().ok()) {
            config.event_capacity = capacity;
        }

        if let Some(publish) = lookup(PUBLISH_PROBLEMS_VAR).and_then(|v| parse_flag(&v)) {
            config.publish_problems = publish;
        }

        config.event_capacity = config.event_capacity.max(1);
        config
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
