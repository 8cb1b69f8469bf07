use crate::mechanism::Mechanism;
use crate::rubric::CriterionScore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Outcome of one activation case under one mechanism
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationResult {
    pub case_id: String,
    pub mechanism: Mechanism,
    pub model: String,
    pub should_activate: bool,
    pub activated: bool,
    pub detected_skills: BTreeSet<String>,
    pub expected_skills: Vec<String>,
    pub acceptable_skills: Vec<String>,
    /// Detected names outside expected ∪ acceptable
    pub extra_skills: BTreeSet<String>,
    pub is_true_positive: bool,
    pub is_false_positive: bool,
    /// 1.0 expected hit, 0.5 acceptable-only hit, 0.0 otherwise
    pub accuracy: f64,
    /// 1.0 when the first activated skill is expected
    #[serde(default)]
    pub precision_at_1: f64,
    /// Share of expected skills that were detected
    #[serde(default)]
    pub recall: f64,
    #[serde(default)]
    pub category: Option<String>,
    pub response_text: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl ActivationResult {
    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }

    /// Activated on a positive case but none of the right skills
    pub fn is_wrong_skill(&self) -> bool {
        self.should_activate && self.activated && !self.is_true_positive
    }

    pub fn is_false_negative(&self) -> bool {
        self.should_activate && !self.activated
    }

    pub fn is_true_negative(&self) -> bool {
        !self.should_activate && !self.activated
    }
}

/// Which side the judge's weighted totals favoured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    Skill,
    Baseline,
    Tie,
}

impl Winner {
    /// Strictly greater total wins; equal totals tie
    pub fn from_totals(baseline: f64, enhanced: f64) -> Self {
        if enhanced > baseline {
            Winner::Skill
        } else if baseline > enhanced {
            Winner::Baseline
        } else {
            Winner::Tie
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Winner::Skill => "skill",
            Winner::Baseline => "baseline",
            Winner::Tie => "tie",
        }
    }
}

impl std::fmt::Display for Winner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one baseline-vs-enhanced comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectivenessResult {
    pub case_id: String,
    pub skill_name: String,
    pub task: String,
    pub baseline_score: f64,
    pub enhanced_score: f64,
    pub baseline_criteria: Vec<CriterionScore>,
    pub enhanced_criteria: Vec<CriterionScore>,
    pub winner: Winner,
    pub judge_rationale: String,
    /// Whether the enhanced answer was shown to the judge as "Response A"
    pub enhanced_presented_first: bool,
    #[serde(default)]
    pub baseline_response: String,
    #[serde(default)]
    pub enhanced_response: String,
}

impl EffectivenessResult {
    /// Positive when the skill helped
    pub fn improvement(&self) -> f64 {
        self.enhanced_score - self.baseline_score
    }
}

/// Stage at which a case was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Discovery,
    BaselineGeneration,
    EnhancedGeneration,
    Judge,
    /// The task died before it could report a stage
    Aborted,
}

/// A case excluded from aggregates, with the logged reason
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseFailure {
    pub case_id: String,
    pub stage: FailureStage,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_winner_from_totals() {
        assert_eq!(Winner::from_totals(10.0, 12.0), Winner::Skill);
        assert_eq!(Winner::from_totals(12.0, 10.0), Winner::Baseline);
        assert_eq!(Winner::from_totals(10.0, 10.0), Winner::Tie);
    }

    #[test]
    fn test_winner_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Winner::Skill).unwrap(), "\"skill\"");
    }
}
