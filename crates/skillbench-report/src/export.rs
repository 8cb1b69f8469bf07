//! JSON result files
//!
//! Every run is written to disk, by default under
//! `<results_dir>/<eval_type>/<timestamp>_<model>[_<key>-<value>...].json`.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use skillbench_eval::{ActivationRun, ActivationSummary, EffectivenessRun, EffectivenessSummary};
use skillbench_skills::VariantStrategy;
use skillbench_types::{ActivationResult, CaseFailure, EffectivenessResult};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

/// Kind of evaluation a file holds; doubles as the results sub-directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvalType {
    Activation,
    Effectiveness,
    SizeImpact,
    Variants,
}

impl EvalType {
    pub fn dir_name(&self) -> &'static str {
        match self {
            EvalType::Activation => "activation",
            EvalType::Effectiveness => "effectiveness",
            EvalType::SizeImpact => "size-impact",
            EvalType::Variants => "variants",
        }
    }
}

/// Envelope written for every run
#[derive(Debug, Serialize)]
pub struct ResultFile<T: Serialize> {
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub eval_type: EvalType,
    pub model: String,
    pub results: T,
}

impl<T: Serialize> ResultFile<T> {
    pub fn new(eval_type: EvalType, model: impl Into<String>, results: T) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            created_at: Utc::now(),
            eval_type,
            model: model.into(),
            results,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MechanismSection<'a> {
    pub summary: ActivationSummary,
    pub cases: &'a [ActivationResult],
    pub failures: &'a [CaseFailure],
}

/// Activation results, one section per mechanism
#[derive(Debug, Serialize)]
pub struct ActivationExport<'a> {
    pub mechanisms: Vec<MechanismSection<'a>>,
}

impl<'a> ActivationExport<'a> {
    pub fn new(runs: &'a [ActivationRun]) -> Self {
        Self {
            mechanisms: runs
                .iter()
                .map(|run| MechanismSection {
                    summary: run.summary(),
                    cases: &run.results,
                    failures: &run.failures,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EffectivenessExport<'a> {
    pub judge_model: &'a str,
    pub seed: u64,
    pub summary: EffectivenessSummary,
    pub cases: &'a [EffectivenessResult],
    pub failures: &'a [CaseFailure],
}

impl<'a> EffectivenessExport<'a> {
    pub fn new(run: &'a EffectivenessRun) -> Self {
        Self {
            judge_model: &run.judge_model,
            seed: run.seed,
            summary: run.summary(),
            cases: &run.results,
            failures: &run.failures,
        }
    }
}

/// Full-content and truncated runs of one skill
#[derive(Debug, Serialize)]
pub struct SizeImpactExport<'a> {
    pub skill: &'a str,
    pub max_lines: usize,
    pub full: EffectivenessExport<'a>,
    pub truncated: EffectivenessExport<'a>,
}

/// One effectiveness run per authoring strategy
#[derive(Debug, Serialize)]
pub struct VariantsExport<'a> {
    pub skill: &'a str,
    pub strategies: BTreeMap<VariantStrategy, EffectivenessExport<'a>>,
}

fn file_component(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | ' ' => '-',
            c => c,
        })
        .collect()
}

/// Default location for a result file. Extras with empty values are left out.
pub fn auto_output_path(
    results_dir: &Path,
    eval_type: EvalType,
    model: &str,
    extras: &[(&str, String)],
    now: DateTime<Local>,
) -> PathBuf {
    let mut parts = vec![now.format("%Y%m%d_%H%M%S").to_string(), file_component(model)];
    for (key, value) in extras {
        if !value.is_empty() {
            parts.push(format!("{}-{}", key, file_component(value)));
        }
    }

    results_dir
        .join(eval_type.dir_name())
        .join(format!("{}.json", parts.join("_")))
}

/// Write a result file, creating parent directories as needed
pub fn write_result_file<T: Serialize>(path: &Path, file: &ResultFile<T>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create results directory {}", parent.display()))?;
    }

    let json = serde_json::to_string_pretty(file).context("Failed to serialize results")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write results to {}", path.display()))?;

    info!("Results exported to {} (run {})", path.display(), file.run_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use skillbench_types::{FailureStage, Mechanism};
    use tempfile::TempDir;

    #[test]
    fn test_auto_output_path_layout() {
        let now = Local.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap();
        let path = auto_output_path(
            Path::new("results"),
            EvalType::SizeImpact,
            "anthropic/claude-sonnet-4-5",
            &[("skill", "efcore-patterns".into()), ("lines", "500".into()), ("empty", String::new())],
            now,
        );
        assert_eq!(
            path,
            PathBuf::from("results/size-impact/20260314_092653_anthropic-claude-sonnet-4-5_skill-efcore-patterns_lines-500.json")
        );
    }

    #[test]
    fn test_activation_file_round_trips_through_disk() {
        let tmp = TempDir::new().unwrap();
        let runs = vec![ActivationRun {
            mechanism: Mechanism::Compressed,
            model: "haiku".into(),
            results: vec![],
            failures: vec![CaseFailure {
                case_id: "a1".into(),
                stage: FailureStage::Discovery,
                reason: "boom".into(),
            }],
            skipped: 1,
        }];

        let path = tmp.path().join("nested/dir/out.json");
        let file = ResultFile::new(EvalType::Activation, "haiku", ActivationExport::new(&runs));
        write_result_file(&path, &file).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["eval_type"], "activation");
        assert_eq!(value["run_id"], file.run_id.to_string());
        let section = &value["results"]["mechanisms"][0];
        assert_eq!(section["summary"]["mechanism"], "compressed");
        assert_eq!(section["summary"]["failed"], 1);
        assert_eq!(section["summary"]["skipped"], 1);
        assert!(section["summary"]["activation_rate"]["value"].is_null());
        assert_eq!(section["failures"][0]["stage"], "discovery");
    }
}
