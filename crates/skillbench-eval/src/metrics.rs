//! Aggregates over the valid results of one run
//!
//! Every ratio is a [`Rate`] so an empty denominator is reported as `n/a`
//! rather than as zero or NaN.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use skillbench_types::{ActivationResult, EffectivenessResult, Mechanism, Winner};
use std::collections::BTreeMap;
use std::fmt;

/// A ratio that keeps its parts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rate {
    pub numerator: usize,
    pub denominator: usize,
}

impl Rate {
    pub fn new(numerator: usize, denominator: usize) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// `None` when the denominator is zero
    pub fn value(&self) -> Option<f64> {
        if self.denominator == 0 {
            None
        } else {
            Some(self.numerator as f64 / self.denominator as f64)
        }
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value() {
            Some(v) => write!(f, "{:.1}% ({}/{})", v * 100.0, self.numerator, self.denominator),
            None => f.write_str("n/a"),
        }
    }
}

impl Serialize for Rate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Rate", 3)?;
        state.serialize_field("numerator", &self.numerator)?;
        state.serialize_field("denominator", &self.denominator)?;
        state.serialize_field("value", &self.value())?;
        state.end()
    }
}

fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Positive case where a different skill was activated than expected
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfusionPair {
    pub expected: String,
    pub detected: String,
    pub count: usize,
}

/// Activation metrics for one mechanism
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivationSummary {
    pub mechanism: Mechanism,
    pub total: usize,
    pub positives: usize,
    pub negatives: usize,
    pub activated: usize,
    pub true_positives: usize,
    pub false_positives: usize,
    /// Positive cases that activated only unrelated skills
    pub wrong_skill: usize,
    pub activation_rate: Rate,
    pub true_positive_rate: Rate,
    pub false_positive_rate: Rate,
    /// True positives over all activations
    pub accuracy_when_activated: Rate,
    /// Mean graded accuracy over activated positive cases
    pub mean_accuracy_when_activated: Option<f64>,
    /// Positive cases that activated an expected skill
    pub exact_matches: usize,
    /// Positive cases that activated only an acceptable skill
    pub acceptable_matches: usize,
    /// Positive cases with no expected or acceptable skill
    pub misses: usize,
    /// Exact matches over positive cases
    pub exact_accuracy: Rate,
    /// Mean precision@1 over positive cases
    pub mean_precision_at_1: Option<f64>,
    /// Mean recall over positive cases
    pub mean_recall: Option<f64>,
    pub total_prompt_tokens: u64,
    pub total_completion_tokens: u64,
    pub mean_prompt_tokens: Option<f64>,
    pub mean_completion_tokens: Option<f64>,
    pub mean_total_tokens: Option<f64>,
    /// Most frequent first
    pub confusion: Vec<ConfusionPair>,
    pub skipped: usize,
    pub failed: usize,
}

impl ActivationSummary {
    pub fn compute(
        mechanism: Mechanism,
        results: &[ActivationResult],
        skipped: usize,
        failed: usize,
    ) -> Self {
        let total = results.len();
        let positives = results.iter().filter(|r| r.should_activate).count();
        let negatives = total - positives;
        let activated = results.iter().filter(|r| r.activated).count();
        let true_positives = results.iter().filter(|r| r.is_true_positive).count();
        let false_positives = results.iter().filter(|r| r.is_false_positive).count();
        let wrong_skill = results.iter().filter(|r| r.is_wrong_skill()).count();

        let positive = || results.iter().filter(|r| r.should_activate);
        let exact_matches = positive().filter(|r| r.accuracy >= 1.0).count();
        let acceptable_matches = positive()
            .filter(|r| r.accuracy > 0.0 && r.accuracy < 1.0)
            .count();

        let total_prompt_tokens = results.iter().map(|r| r.prompt_tokens).sum();
        let total_completion_tokens = results.iter().map(|r| r.completion_tokens).sum();

        Self {
            mechanism,
            total,
            positives,
            negatives,
            activated,
            true_positives,
            false_positives,
            wrong_skill,
            activation_rate: Rate::new(activated, total),
            true_positive_rate: Rate::new(true_positives, positives),
            false_positive_rate: Rate::new(false_positives, negatives),
            accuracy_when_activated: Rate::new(true_positives, activated),
            mean_accuracy_when_activated: mean(
                results
                    .iter()
                    .filter(|r| r.activated && r.should_activate)
                    .map(|r| r.accuracy),
            ),
            exact_matches,
            acceptable_matches,
            misses: positives - exact_matches - acceptable_matches,
            exact_accuracy: Rate::new(exact_matches, positives),
            mean_precision_at_1: mean(positive().map(|r| r.precision_at_1)),
            mean_recall: mean(positive().map(|r| r.recall)),
            total_prompt_tokens,
            total_completion_tokens,
            mean_prompt_tokens: mean(results.iter().map(|r| r.prompt_tokens as f64)),
            mean_completion_tokens: mean(results.iter().map(|r| r.completion_tokens as f64)),
            mean_total_tokens: mean(results.iter().map(|r| r.total_tokens() as f64)),
            confusion: confusion_pairs(results),
            skipped,
            failed,
        }
    }
}

fn confusion_pairs(results: &[ActivationResult]) -> Vec<ConfusionPair> {
    let mut counts: BTreeMap<(String, String), usize> = BTreeMap::new();
    for result in results.iter().filter(|r| r.is_wrong_skill()) {
        for expected in &result.expected_skills {
            for detected in &result.extra_skills {
                *counts
                    .entry((expected.clone(), detected.clone()))
                    .or_default() += 1;
            }
        }
    }

    let mut pairs: Vec<ConfusionPair> = counts
        .into_iter()
        .map(|((expected, detected), count)| ConfusionPair {
            expected,
            detected,
            count,
        })
        .collect();
    // stable sort keeps name order among equal counts
    pairs.sort_by(|a, b| b.count.cmp(&a.count));
    pairs
}

/// Effectiveness metrics for one group of results
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectivenessStats {
    pub total: usize,
    pub skill_wins: usize,
    pub baseline_wins: usize,
    pub ties: usize,
    /// Skill wins over all judged cases
    pub win_rate: Rate,
    pub mean_baseline_score: Option<f64>,
    pub mean_enhanced_score: Option<f64>,
    /// Mean of enhanced − baseline weighted totals
    pub mean_improvement: Option<f64>,
}

impl EffectivenessStats {
    fn compute<'a>(results: impl Iterator<Item = &'a EffectivenessResult> + Clone) -> Self {
        let total = results.clone().count();
        let count = |winner: Winner| results.clone().filter(|r| r.winner == winner).count();
        let skill_wins = count(Winner::Skill);

        Self {
            total,
            skill_wins,
            baseline_wins: count(Winner::Baseline),
            ties: count(Winner::Tie),
            win_rate: Rate::new(skill_wins, total),
            mean_baseline_score: mean(results.clone().map(|r| r.baseline_score)),
            mean_enhanced_score: mean(results.clone().map(|r| r.enhanced_score)),
            mean_improvement: mean(results.map(EffectivenessResult::improvement)),
        }
    }
}

/// Stats for a single skill
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkillBreakdown {
    pub skill_name: String,
    #[serde(flatten)]
    pub stats: EffectivenessStats,
}

/// Effectiveness metrics for a run, overall and per skill
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectivenessSummary {
    #[serde(flatten)]
    pub overall: EffectivenessStats,
    pub per_skill: Vec<SkillBreakdown>,
    pub skipped: usize,
    pub failed: usize,
}

impl EffectivenessSummary {
    pub fn compute(results: &[EffectivenessResult], skipped: usize, failed: usize) -> Self {
        let mut by_skill: BTreeMap<&str, Vec<&EffectivenessResult>> = BTreeMap::new();
        for result in results {
            by_skill.entry(result.skill_name.as_str()).or_default().push(result);
        }

        let per_skill = by_skill
            .into_iter()
            .map(|(skill_name, group)| SkillBreakdown {
                skill_name: skill_name.to_string(),
                stats: EffectivenessStats::compute(group.iter().copied()),
            })
            .collect();

        Self {
            overall: EffectivenessStats::compute(results.iter()),
            per_skill,
            skipped,
            failed,
        }
    }
}
