//! Human-readable run reports
//!
//! Every function returns the rendered text; the binary decides where it
//! goes. Failed and skipped counts are part of every summary.

use skillbench_eval::{ActivationRun, ActivationSummary, EffectivenessRun, EffectivenessSummary};
use skillbench_skills::{Catalog, VariantStrategy};
use skillbench_types::{ActivationResult, CaseFailure};
use std::fmt::Write;

use crate::table::Table;

/// Confusion pairs shown per mechanism
const TOP_CONFUSIONS: usize = 10;

fn score(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.2}", v))
}

fn signed(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:+.2}", v))
}

fn tokens(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.0}", v))
}

fn list(names: impl IntoIterator<Item = impl AsRef<str>>) -> String {
    let joined = names
        .into_iter()
        .map(|n| n.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    if joined.is_empty() {
        "(none)".to_string()
    } else {
        joined
    }
}

/// Short label for how one activation case scored
pub fn outcome(result: &ActivationResult) -> &'static str {
    if result.is_true_positive {
        "hit"
    } else if result.is_false_positive {
        "false positive"
    } else if result.is_wrong_skill() {
        "wrong skill"
    } else if result.is_false_negative() {
        "miss"
    } else {
        "correct reject"
    }
}

fn failures_table(failures: &[CaseFailure]) -> Option<Table> {
    if failures.is_empty() {
        return None;
    }
    let mut table = Table::new(["ID", "Stage", "Reason"]).with_title("Failed Cases");
    for failure in failures {
        table.add_row([
            failure.case_id.clone(),
            format!("{:?}", failure.stage),
            failure.reason.clone(),
        ]);
    }
    Some(table)
}

/// Summary table for one mechanism
pub fn activation_summary_table(summary: &ActivationSummary) -> Table {
    let mut table = Table::new(["Metric", "Value"])
        .with_title(format!("Activation Summary: {}", summary.mechanism));

    let rows: Vec<(&str, String)> = vec![
        ("Total Cases", summary.total.to_string()),
        ("Should Activate", summary.positives.to_string()),
        ("Should Not Activate", summary.negatives.to_string()),
        ("Activation Rate", summary.activation_rate.to_string()),
        ("True Positive Rate", summary.true_positive_rate.to_string()),
        ("False Positive Rate", summary.false_positive_rate.to_string()),
        ("Accuracy When Activated", summary.accuracy_when_activated.to_string()),
        (
            "Mean Graded Accuracy",
            score(summary.mean_accuracy_when_activated),
        ),
        ("Exact Accuracy", summary.exact_accuracy.to_string()),
        (
            "Exact/Acceptable/Miss",
            format!(
                "{} / {} / {}",
                summary.exact_matches, summary.acceptable_matches, summary.misses
            ),
        ),
        ("Mean Precision@1", score(summary.mean_precision_at_1)),
        ("Mean Recall", score(summary.mean_recall)),
        ("Wrong Skill", summary.wrong_skill.to_string()),
        ("Mean Prompt Tokens", tokens(summary.mean_prompt_tokens)),
        ("Mean Completion Tokens", tokens(summary.mean_completion_tokens)),
        ("Total Tokens", (summary.total_prompt_tokens + summary.total_completion_tokens).to_string()),
        ("Failed", summary.failed.to_string()),
        ("Skipped", summary.skipped.to_string()),
    ];
    for (metric, value) in rows {
        table.add_row([metric.to_string(), value]);
    }
    table
}

/// One row per mechanism, side by side
pub fn mechanism_comparison_table(summaries: &[ActivationSummary]) -> Table {
    let mut table = Table::new([
        "Mechanism",
        "Activation",
        "TPR",
        "FPR",
        "Acc. Activated",
        "P@1",
        "Recall",
        "Mean Tokens",
        "Failed",
    ])
    .with_title("Mechanism Comparison");

    for summary in summaries {
        table.add_row([
            summary.mechanism.to_string(),
            summary.activation_rate.to_string(),
            summary.true_positive_rate.to_string(),
            summary.false_positive_rate.to_string(),
            summary.accuracy_when_activated.to_string(),
            score(summary.mean_precision_at_1),
            score(summary.mean_recall),
            tokens(summary.mean_total_tokens),
            summary.failed.to_string(),
        ]);
    }
    table
}

fn confusion_table(summary: &ActivationSummary) -> Option<Table> {
    if summary.confusion.is_empty() {
        return None;
    }
    let mut table = Table::new(["Expected", "Detected Instead", "Count"])
        .with_title(format!("Top Confusion Pairs: {}", summary.mechanism));
    for pair in summary.confusion.iter().take(TOP_CONFUSIONS) {
        table.add_row([pair.expected.clone(), pair.detected.clone(), pair.count.to_string()]);
    }
    Some(table)
}

fn activation_cases_table(run: &ActivationRun) -> Table {
    let mut table = Table::new(["ID", "Expected", "Detected", "Outcome", "Accuracy", "Tokens"])
        .with_title(format!("Per-Case Results: {}", run.mechanism));
    for result in &run.results {
        table.add_row([
            result.case_id.clone(),
            list(&result.expected_skills),
            list(&result.detected_skills),
            outcome(result).to_string(),
            format!("{:.1}", result.accuracy),
            result.total_tokens().to_string(),
        ]);
    }
    table
}

/// Full activation report for every mechanism that ran
pub fn render_activation(runs: &[ActivationRun]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\nSkill Activation Evaluation Results\n");

    let summaries: Vec<ActivationSummary> = runs.iter().map(ActivationRun::summary).collect();
    for (run, summary) in runs.iter().zip(&summaries) {
        let _ = writeln!(out, "{}", activation_summary_table(summary));
        if let Some(table) = confusion_table(summary) {
            let _ = writeln!(out, "{}", table);
        }
        let _ = writeln!(out, "{}", activation_cases_table(run));
        if let Some(table) = failures_table(&run.failures) {
            let _ = writeln!(out, "{}", table);
        }
    }

    if summaries.len() > 1 {
        let _ = writeln!(out, "{}", mechanism_comparison_table(&summaries));
    }
    out
}

/// Summary table for one effectiveness run
pub fn effectiveness_summary_table(summary: &EffectivenessSummary) -> Table {
    let stats = &summary.overall;
    let mut table = Table::new(["Metric", "Value"]).with_title("Effectiveness Summary");

    let rows: Vec<(&str, String)> = vec![
        ("Total Cases", stats.total.to_string()),
        ("Skill Wins", stats.skill_wins.to_string()),
        ("Baseline Wins", stats.baseline_wins.to_string()),
        ("Ties", stats.ties.to_string()),
        ("Win Rate", stats.win_rate.to_string()),
        ("Mean Baseline Score", score(stats.mean_baseline_score)),
        ("Mean Enhanced Score", score(stats.mean_enhanced_score)),
        ("Mean Improvement", signed(stats.mean_improvement)),
        ("Failed", summary.failed.to_string()),
        ("Skipped", summary.skipped.to_string()),
    ];
    for (metric, value) in rows {
        table.add_row([metric.to_string(), value]);
    }
    table
}

fn per_skill_table(summary: &EffectivenessSummary) -> Table {
    let mut table = Table::new(["Skill", "Cases", "Win Rate", "Mean Improvement"])
        .with_title("Per-Skill Breakdown");
    for breakdown in &summary.per_skill {
        table.add_row([
            breakdown.skill_name.clone(),
            breakdown.stats.total.to_string(),
            breakdown.stats.win_rate.to_string(),
            signed(breakdown.stats.mean_improvement),
        ]);
    }
    table
}

/// Full effectiveness report
pub fn render_effectiveness(run: &EffectivenessRun) -> String {
    let summary = run.summary();
    let mut out = String::new();
    let _ = writeln!(
        out,
        "\nSkill Effectiveness Evaluation Results (model {}, judge {}, seed {})\n",
        run.model, run.judge_model, run.seed
    );
    let _ = writeln!(out, "{}", effectiveness_summary_table(&summary));

    if summary.per_skill.len() > 1 {
        let _ = writeln!(out, "{}", per_skill_table(&summary));
    }

    let mut cases = Table::new(["ID", "Skill", "Baseline", "Enhanced", "Delta", "Winner"])
        .with_title("Per-Case Results");
    for result in &run.results {
        cases.add_row([
            result.case_id.clone(),
            result.skill_name.clone(),
            format!("{:.1}", result.baseline_score),
            format!("{:.1}", result.enhanced_score),
            format!("{:+.1}", result.improvement()),
            result.winner.to_string(),
        ]);
    }
    let _ = writeln!(out, "{}", cases);

    if let Some(table) = failures_table(&run.failures) {
        let _ = writeln!(out, "{}", table);
    }
    out
}

fn difference(full: Option<f64>, other: Option<f64>) -> String {
    match (full, other) {
        (Some(a), Some(b)) if a > b => format!("{:+.2} (full better)", a - b),
        (Some(a), Some(b)) if a < b => format!("{:+.2} (truncated better)", a - b),
        (Some(_), Some(_)) => "0.00 (same)".to_string(),
        _ => "n/a".to_string(),
    }
}

/// Full content against truncated content
pub fn size_comparison_table(
    full: &EffectivenessSummary,
    truncated: &EffectivenessSummary,
    max_lines: usize,
) -> Table {
    let mut table = Table::new([
        "Metric".to_string(),
        "Full".to_string(),
        format!("Truncated ({})", max_lines),
        "Difference".to_string(),
    ])
    .with_title("Size Impact Comparison");

    let rows = [
        (
            "Win Rate",
            full.overall.win_rate.value(),
            truncated.overall.win_rate.value(),
        ),
        (
            "Mean Enhanced Score",
            full.overall.mean_enhanced_score,
            truncated.overall.mean_enhanced_score,
        ),
        (
            "Mean Improvement",
            full.overall.mean_improvement,
            truncated.overall.mean_improvement,
        ),
    ];
    for (metric, a, b) in rows {
        table.add_row([metric.to_string(), score(a), score(b), difference(a, b)]);
    }
    table
}

/// One row per authoring strategy
pub fn variant_comparison_table(summaries: &[(VariantStrategy, EffectivenessSummary)]) -> Table {
    let mut table = Table::new(["Strategy", "Cases", "Win Rate", "Mean Enhanced", "Mean Improvement", "Failed"])
        .with_title("Variant Comparison Summary");
    for (strategy, summary) in summaries {
        table.add_row([
            strategy.to_string(),
            summary.overall.total.to_string(),
            summary.overall.win_rate.to_string(),
            score(summary.overall.mean_enhanced_score),
            signed(summary.overall.mean_improvement),
            summary.failed.to_string(),
        ]);
    }
    table
}

/// Catalog listing with sizes, flagging skills over `line_limit`
pub fn skills_table(catalog: &Catalog, line_limit: usize) -> Table {
    let mut table = Table::new(["Name", "Directory", "Lines", "Size", "Oversized"])
        .with_title(format!("Skill Catalog ({} skills)", catalog.len()));
    for skill in catalog.iter() {
        table.add_row([
            skill.name.clone(),
            skill.directory_name.clone(),
            skill.line_count.to_string(),
            format!("{:.1}KB", skill.byte_size as f64 / 1024.0),
            (if skill.is_oversized(line_limit) { "yes" } else { "no" }).to_string(),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use skillbench_types::{FailureStage, Mechanism};
    use std::collections::BTreeSet;

    fn result(id: &str, should: bool, detected: &[&str], expected: &[&str]) -> ActivationResult {
        let detected: BTreeSet<String> = detected.iter().map(|s| s.to_string()).collect();
        let expected: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
        let hit = detected.iter().any(|d| expected.contains(d));
        ActivationResult {
            case_id: id.into(),
            mechanism: Mechanism::Fat,
            model: "m".into(),
            should_activate: should,
            activated: !detected.is_empty(),
            is_true_positive: should && hit,
            is_false_positive: !should && !detected.is_empty(),
            accuracy: if hit { 1.0 } else { 0.0 },
            precision_at_1: if hit { 1.0 } else { 0.0 },
            recall: if hit { 1.0 } else { 0.0 },
            extra_skills: detected.iter().filter(|d| !expected.contains(d)).cloned().collect(),
            detected_skills: detected,
            expected_skills: expected,
            acceptable_skills: vec![],
            category: None,
            response_text: String::new(),
            prompt_tokens: 10,
            completion_tokens: 5,
        }
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(outcome(&result("a", true, &["x-skill"], &["x-skill"])), "hit");
        assert_eq!(outcome(&result("b", false, &["x-skill"], &[])), "false positive");
        assert_eq!(outcome(&result("c", true, &["y-skill"], &["x-skill"])), "wrong skill");
        assert_eq!(outcome(&result("d", true, &[], &["x-skill"])), "miss");
        assert_eq!(outcome(&result("e", false, &[], &[])), "correct reject");
    }

    #[test]
    fn test_activation_report_always_shows_failed_and_skipped() {
        let run = ActivationRun {
            mechanism: Mechanism::Tool,
            model: "m".into(),
            results: vec![result("a", false, &[], &[])],
            failures: vec![CaseFailure {
                case_id: "b".into(),
                stage: FailureStage::Discovery,
                reason: "Call timed out after 120s".into(),
            }],
            skipped: 2,
        };

        let text = render_activation(&[run]);
        assert!(text.contains("Failed                  | 1"));
        assert!(text.contains("Skipped                 | 2"));
        assert!(text.contains("Accuracy When Activated | n/a"));
        assert!(text.contains("Call timed out after 120s"));
        // one mechanism: no comparison table
        assert!(!text.contains("Mechanism Comparison"));
    }

    #[test]
    fn test_size_difference_labels() {
        assert_eq!(difference(Some(10.0), Some(8.5)), "+1.50 (full better)");
        assert_eq!(difference(Some(8.0), Some(9.0)), "-1.00 (truncated better)");
        assert_eq!(difference(Some(8.0), Some(8.0)), "0.00 (same)");
        assert_eq!(difference(None, Some(8.0)), "n/a");
    }
}
