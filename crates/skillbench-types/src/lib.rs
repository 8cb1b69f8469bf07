//! SkillBench Types - Core types for the skill evaluation harness
//!
//! Test cases, rubrics, per-case results, chat wire types and the error
//! taxonomy shared by every crate in the workspace.

pub mod case;
pub mod error;
pub mod mechanism;
pub mod message;
pub mod result;
pub mod rubric;

pub use case::{ActivationTestCase, EffectivenessTestCase};
pub use error::{
    CaseError, CatalogError, ConfigError, DatasetError, InferenceError, JudgeParseError,
    RubricError,
};
pub use mechanism::Mechanism;
pub use message::{
    ChatMessage, CompletionRequest, CompletionResponse, FunctionCall, FunctionDef, Role, Tool,
    ToolCall, Usage,
};
pub use result::{ActivationResult, CaseFailure, EffectivenessResult, FailureStage, Winner};
pub use rubric::{weighted_total, Criterion, CriterionScore, Rubric, MAX_SCORE, MIN_SCORE};
