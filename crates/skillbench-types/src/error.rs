//! Error taxonomy shared by every crate in the workspace.
//!
//! Setup errors (`CatalogError`, `ConfigError`) abort a run before any model
//! call. Per-case errors (`DatasetError`, `InferenceError`, `JudgeParseError`)
//! only remove that case from the aggregates.

use std::path::PathBuf;
use thiserror::Error;

/// Skill catalog could not be loaded
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Catalog root does not exist
    #[error("Skills directory not found: {0}")]
    MissingRoot(PathBuf),

    /// Catalog root exists but is a file
    #[error("Skills path is not a directory: {0}")]
    NotADirectory(PathBuf),

    /// A skill file or directory could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        /// Offending path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A SKILL.md is present but malformed
    #[error("Failed to parse skill {path}: {reason}")]
    Parse {
        /// Offending SKILL.md
        path: PathBuf,
        /// What was wrong
        reason: String,
    },

    /// Two skills declare the same name; the first one is kept
    #[error("Duplicate skill name '{name}' in {duplicate} (keeping {kept})")]
    DuplicateName {
        /// Skill name
        name: String,
        /// Directory whose skill was kept
        kept: PathBuf,
        /// Directory whose skill was ignored
        duplicate: PathBuf,
    },

    /// Plugin manifest could not be used
    #[error("Invalid plugin manifest {path}: {reason}")]
    Manifest {
        /// Manifest path
        path: PathBuf,
        /// What was wrong
        reason: String,
    },
}

/// Rubric criteria that cannot be scored against
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RubricError {
    #[error("rubric has no criteria")]
    NoCriteria,

    #[error("criterion name cannot be empty")]
    EmptyCriterionName,

    #[error("criterion '{criterion}' has invalid weight {weight}")]
    InvalidWeight { criterion: String, weight: f64 },

    #[error("criterion '{0}' is listed twice")]
    DuplicateCriterion(String),

    #[error("criterion weights must sum to a positive total")]
    NonPositiveTotal,
}

/// A dataset file or a single test case is unusable
#[derive(Debug, Error)]
pub enum DatasetError {
    /// Dataset file could not be read
    #[error("Failed to read dataset {path}: {source}")]
    Io {
        /// Dataset path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// One JSONL line did not decode into a test case
    #[error("{path}:{line}: malformed test case: {reason}")]
    Malformed {
        /// Dataset path
        path: PathBuf,
        /// 1-based line number
        line: usize,
        /// Decoder message
        reason: String,
    },

    /// A test case names a skill that is not in the catalog
    #[error("Case '{case_id}' references unknown skill '{skill}'")]
    UnknownSkill {
        /// Test case id
        case_id: String,
        /// Skill name
        skill: String,
    },

    /// The guidance for a case is blank, so both answers would be baselines
    #[error("Case '{case_id}' has no guidance text for skill '{skill}'")]
    EmptyGuidance {
        /// Test case id
        case_id: String,
        /// Skill name
        skill: String,
    },

    /// A rubric file could not be loaded or is invalid
    #[error("Rubric {path}: {reason}")]
    Rubric {
        /// Rubric path
        path: PathBuf,
        /// What was wrong
        reason: String,
    },

    /// Nothing usable was left after skipping bad lines
    #[error("Dataset {0} contains no valid test cases")]
    NoValidCases(PathBuf),
}

/// A single model call failed
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InferenceError {
    /// Connection or I/O failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Endpoint rejected the credentials
    #[error("Authentication failed (HTTP {status}): {body}")]
    Auth {
        /// HTTP status
        status: u16,
        /// Response body
        body: String,
    },

    /// Endpoint returned a non-success status
    #[error("Endpoint returned HTTP {status}: {body}")]
    Status {
        /// HTTP status
        status: u16,
        /// Response body
        body: String,
    },

    /// Response body did not match the chat-completion schema
    #[error("Could not decode response: {0}")]
    Decode(String),

    /// Response carried no choices
    #[error("Endpoint returned no choices")]
    EmptyResponse,

    /// Call exceeded the per-call deadline
    #[error("Call timed out after {secs}s")]
    Timeout {
        /// Deadline in seconds
        secs: u64,
    },
}

/// Judge output could not be turned into per-criterion scores
#[derive(Debug, Clone, Error, PartialEq)]
pub enum JudgeParseError {
    /// No JSON object in the reply
    #[error("Judge reply contains no JSON object")]
    NoJson,

    /// JSON object did not match the expected shape
    #[error("Judge reply is not valid score JSON: {0}")]
    InvalidJson(String),

    /// A rubric criterion has no score
    #[error("Judge gave no score for '{criterion}' on response {side}")]
    MissingCriterion {
        /// "A" or "B"
        side: String,
        /// Criterion name
        criterion: String,
    },

    /// A score is not an integer within bounds
    #[error("Judge score {score} for '{criterion}' on response {side} is outside {min}..={max}")]
    ScoreOutOfRange {
        /// "A" or "B"
        side: String,
        /// Criterion name
        criterion: String,
        /// Raw score as given
        score: String,
        /// Lowest allowed score
        min: u8,
        /// Highest allowed score
        max: u8,
    },
}

/// Missing or invalid run configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting has no value
    #[error("Missing required setting '{key}': {hint}")]
    MissingSetting {
        /// Setting key
        key: String,
        /// How to provide it
        hint: String,
    },

    /// A setting has an unusable value
    #[error("Invalid value for '{key}': {reason}")]
    Invalid {
        /// Setting key
        key: String,
        /// What was wrong
        reason: String,
    },

    /// Config sources could not be merged or deserialized
    #[error("Failed to load configuration: {0}")]
    Load(String),
}

/// Why a single evaluation case was dropped from the aggregates
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CaseError {
    /// Model call failed
    #[error(transparent)]
    Inference(#[from] InferenceError),

    /// Judge reply was unusable
    #[error(transparent)]
    JudgeParse(#[from] JudgeParseError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_error_from_inference() {
        let err: CaseError = InferenceError::Timeout { secs: 5 }.into();
        assert_eq!(err.to_string(), "Call timed out after 5s");
    }

    #[test]
    fn test_score_out_of_range_message() {
        let err = JudgeParseError::ScoreOutOfRange {
            side: "A".into(),
            criterion: "correctness".into(),
            score: "7".into(),
            min: 1,
            max: 5,
        };
        assert!(err.to_string().contains("1..=5"));
    }
}
