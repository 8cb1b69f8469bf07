use serde::{Deserialize, Serialize};

/// Knobs shared by both runners. Passed in explicitly; nothing here is global.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalSettings {
    /// Cases in flight at once
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Deadline for a single model call
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub temperature: f32,
    /// Tool round-trips allowed before the last answer is taken as final
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
}

fn default_max_concurrency() -> usize {
    4
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_max_tool_rounds() -> usize {
    3
}

impl Default for EvalSettings {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            request_timeout_secs: default_request_timeout_secs(),
            temperature: 0.0,
            max_tool_rounds: default_max_tool_rounds(),
        }
    }
}
