//! Effectiveness runner: does a skill's content improve the answer?
//!
//! Each case produces a baseline answer (no guidance) and an enhanced answer
//! (guidance in the system message), then a judge model scores both against
//! the case's rubric in a per-case random order.

use serde::Serialize;
use skillbench_provider::ModelClient;
use skillbench_skills::{Catalog, Skill};
use skillbench_types::{
    weighted_total, CaseError, CaseFailure, ChatMessage, CompletionRequest, DatasetError,
    EffectivenessResult, EffectivenessTestCase, FailureStage, InferenceError, Rubric, Winner,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::dataset::RubricStore;
use crate::judge::{judge_messages, parse_verdict, Presentation};
use crate::metrics::EffectivenessSummary;
use crate::pool::{run_bounded, with_deadline};
use crate::settings::EvalSettings;

const GENERATION_SYSTEM_PROMPT: &str = "You are an expert software developer. Complete the task \
with working code and a brief explanation of the important decisions.";

/// What the enhanced answer is given
#[derive(Debug, Clone, PartialEq)]
pub enum Guidance {
    /// The whole skill body
    Full,
    /// The first N lines of the skill body
    Truncated(usize),
    /// Fixed text, e.g. an authored variant
    Fixed(String),
}

impl Guidance {
    fn content(&self, skill: &Skill) -> String {
        match self {
            Guidance::Full => skill.content.clone(),
            Guidance::Truncated(max_lines) => skill.truncated_content(*max_lines),
            Guidance::Fixed(text) => text.clone(),
        }
    }
}

/// A case with its rubric and guidance text resolved
#[derive(Debug, Clone)]
pub struct PreparedCase {
    pub case: EffectivenessTestCase,
    pub rubric: Arc<Rubric>,
    pub guidance: String,
}

/// Resolve skill content and rubrics; cases that cannot be resolved are
/// returned as dataset errors
pub fn prepare_cases(
    cases: &[EffectivenessTestCase],
    catalog: &Catalog,
    rubrics: &mut RubricStore,
    guidance: &Guidance,
) -> (Vec<PreparedCase>, Vec<DatasetError>) {
    let mut prepared = Vec::with_capacity(cases.len());
    let mut skipped = Vec::new();

    for case in cases {
        let Some(skill) = catalog.get_ignore_case(&case.skill_name) else {
            let err = DatasetError::UnknownSkill {
                case_id: case.id.clone(),
                skill: case.skill_name.clone(),
            };
            warn!("Skipping case: {}", err);
            skipped.push(err);
            continue;
        };

        let text = guidance.content(skill);
        if text.trim().is_empty() {
            let err = DatasetError::EmptyGuidance {
                case_id: case.id.clone(),
                skill: skill.name.clone(),
            };
            warn!("Skipping case: {}", err);
            skipped.push(err);
            continue;
        }

        match rubrics.get(&case.rubric_file) {
            Ok(rubric) => prepared.push(PreparedCase {
                case: case.clone(),
                rubric,
                guidance: text,
            }),
            Err(err) => {
                warn!("Skipping case {}: {}", case.id, err);
                skipped.push(err);
            }
        }
    }

    (prepared, skipped)
}

/// Everything one effectiveness pass produced
#[derive(Debug, Clone, Serialize)]
pub struct EffectivenessRun {
    pub model: String,
    pub judge_model: String,
    /// Seed the per-case presentation order was drawn from
    pub seed: u64,
    pub results: Vec<EffectivenessResult>,
    pub failures: Vec<CaseFailure>,
    pub skipped: usize,
}

impl EffectivenessRun {
    pub fn summary(&self) -> EffectivenessSummary {
        EffectivenessSummary::compute(&self.results, self.skipped, self.failures.len())
    }
}

/// Runs baseline-vs-enhanced comparisons
#[derive(Clone)]
pub struct EffectivenessRunner {
    client: Arc<dyn ModelClient>,
    settings: EvalSettings,
    model: String,
    judge_model: String,
    seed: u64,
}

impl EffectivenessRunner {
    pub fn new(
        client: Arc<dyn ModelClient>,
        settings: EvalSettings,
        model: impl Into<String>,
        judge_model: impl Into<String>,
        seed: u64,
    ) -> Self {
        Self {
            client,
            settings,
            model: model.into(),
            judge_model: judge_model.into(),
            seed,
        }
    }

    pub async fn run(&self, cases: Vec<PreparedCase>, skipped: usize) -> EffectivenessRun {
        info!(
            "Running {} effectiveness cases on {} (judge {}, seed {})",
            cases.len(),
            self.model,
            self.judge_model,
            self.seed
        );

        let ids: Vec<String> = cases.iter().map(|c| c.case.id.clone()).collect();
        let runner = self.clone();
        let outputs = run_bounded(cases, self.settings.max_concurrency, move |prepared| {
            let runner = runner.clone();
            async move { runner.run_case(&prepared).await }
        })
        .await;

        let mut results = Vec::with_capacity(ids.len());
        let mut failures = Vec::new();
        for (case_id, output) in ids.into_iter().zip(outputs) {
            match output {
                Some(Ok(result)) => results.push(result),
                Some(Err(failure)) => {
                    warn!(
                        "Case {} failed during {:?}: {}",
                        failure.case_id, failure.stage, failure.reason
                    );
                    failures.push(failure);
                }
                None => failures.push(CaseFailure {
                    case_id,
                    stage: FailureStage::Aborted,
                    reason: "evaluation task aborted".to_string(),
                }),
            }
        }

        info!(
            "Effectiveness: {} results, {} failed, {} skipped",
            results.len(),
            failures.len(),
            skipped
        );

        EffectivenessRun {
            model: self.model.clone(),
            judge_model: self.judge_model.clone(),
            seed: self.seed,
            results,
            failures,
            skipped,
        }
    }

    /// Generate both answers and judge them
    pub async fn run_case(&self, prepared: &PreparedCase) -> Result<EffectivenessResult, CaseFailure> {
        let case = &prepared.case;
        let fail = |stage: FailureStage, err: CaseError| CaseFailure {
            case_id: case.id.clone(),
            stage,
            reason: err.to_string(),
        };

        let baseline = self
            .generate(&case.task, None)
            .await
            .map_err(|e| fail(FailureStage::BaselineGeneration, e.into()))?;
        let enhanced = self
            .generate(&case.task, Some(&prepared.guidance))
            .await
            .map_err(|e| fail(FailureStage::EnhancedGeneration, e.into()))?;

        let presentation = Presentation::for_case(self.seed, &case.id);
        let (response_a, response_b) = presentation.arrange(&baseline, &enhanced);

        let reply = self
            .complete(
                &self.judge_model,
                judge_messages(&case.task, response_a, response_b, &prepared.rubric),
            )
            .await
            .map_err(|e| fail(FailureStage::Judge, e.into()))?;

        let verdict =
            parse_verdict(&reply, &prepared.rubric).map_err(|e| fail(FailureStage::Judge, e.into()))?;
        let rationale = verdict.rationale.clone();
        let (baseline_criteria, enhanced_criteria) = presentation.unshuffle(verdict);

        let baseline_score = weighted_total(&baseline_criteria);
        let enhanced_score = weighted_total(&enhanced_criteria);
        let winner = Winner::from_totals(baseline_score, enhanced_score);

        debug!(
            "Case {}: baseline {} vs enhanced {} -> {}",
            case.id, baseline_score, enhanced_score, winner
        );

        Ok(EffectivenessResult {
            case_id: case.id.clone(),
            skill_name: case.skill_name.clone(),
            task: case.task.clone(),
            baseline_score,
            enhanced_score,
            baseline_criteria,
            enhanced_criteria,
            winner,
            judge_rationale: rationale,
            enhanced_presented_first: presentation.enhanced_first,
            baseline_response: baseline,
            enhanced_response: enhanced,
        })
    }

    async fn generate(&self, task: &str, guidance: Option<&str>) -> Result<String, InferenceError> {
        let system = match guidance {
            Some(text) => format!(
                "{}\n\nFollow the guidance below where it applies to the task.\n\n<guidance>\n{}\n</guidance>",
                GENERATION_SYSTEM_PROMPT, text
            ),
            None => GENERATION_SYSTEM_PROMPT.to_string(),
        };
        self.complete(
            &self.model,
            vec![ChatMessage::system(system), ChatMessage::user(task)],
        )
        .await
    }

    async fn complete(&self, model: &str, messages: Vec<ChatMessage>) -> Result<String, InferenceError> {
        let request =
            CompletionRequest::new(model, messages).with_temperature(self.settings.temperature);
        let response = with_deadline(
            self.settings.request_timeout_secs,
            self.client.complete(request),
        )
        .await?;
        Ok(response.text_or_empty().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;

    #[test]
    fn test_guidance_content() {
        let skill = Skill::parse(
            "---\nname: efcore-patterns\ndescription: EF.\n---\none\ntwo\nthree\n",
            "efcore".into(),
            PathBuf::from("efcore/SKILL.md"),
        )
        .unwrap();
        assert_eq!(Guidance::Full.content(&skill), "one\ntwo\nthree\n");
        assert_eq!(Guidance::Truncated(2).content(&skill), "one\ntwo\n");
        assert_eq!(Guidance::Truncated(10).content(&skill), skill.content);
        assert_eq!(Guidance::Fixed("variant".into()).content(&skill), "variant");
    }
}
