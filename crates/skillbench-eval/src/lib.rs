//! Evaluation engine for skillbench
//!
//! Two questions are asked of a skill catalog:
//!
//! - activation: given a prompt, does the model reach for the right skill
//!   under each discovery [`Mechanism`](skillbench_types::Mechanism)?
//! - effectiveness: once a skill is supplied, does a judge prefer the answer
//!   written with it over the answer written without it?
//!
//! Runners take an `Arc<dyn ModelClient>` so tests can script the model.

pub mod activation;
pub mod dataset;
pub mod detection;
pub mod effectiveness;
pub mod judge;
pub mod metrics;
pub mod pool;
pub mod prompt;
pub mod settings;

pub use activation::{ActivationRun, ActivationRunner};
pub use dataset::{
    load_activation_cases, load_effectiveness_cases, load_rubric, Loaded, RubricStore,
};
pub use detection::{classify, detect_activations, Classification, DetectionConfig};
pub use effectiveness::{prepare_cases, EffectivenessRun, EffectivenessRunner, Guidance, PreparedCase};
pub use judge::{judge_messages, parse_verdict, JudgeVerdict, Presentation};
pub use metrics::{
    ActivationSummary, ConfusionPair, EffectivenessStats, EffectivenessSummary, Rate,
    SkillBreakdown,
};
pub use prompt::{
    extract_compressed_index, fat_index, guide_tool, guide_tool_reply, load_compressed_index,
    BuiltPrompt, PromptBuilder, DEFAULT_SYSTEM_PROMPT, GUIDE_TOOL_NAME,
};
pub use settings::EvalSettings;
