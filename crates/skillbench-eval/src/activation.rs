//! Activation runner: does the model reach for the right skill?

use serde::Serialize;
use skillbench_provider::ModelClient;
use skillbench_skills::Catalog;
use skillbench_types::{
    ActivationResult, ActivationTestCase, CaseFailure, ChatMessage, CompletionRequest,
    CompletionResponse, FailureStage, InferenceError, Mechanism, Tool, ToolCall, Usage,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::detection::{classify, detect_in_order, precision_at_1, DetectionConfig};
use crate::metrics::ActivationSummary;
use crate::pool::{run_bounded, with_deadline};
use crate::prompt::{guide_tool_reply, PromptBuilder};
use crate::settings::EvalSettings;

/// Everything one mechanism produced over a dataset
#[derive(Debug, Clone, Serialize)]
pub struct ActivationRun {
    pub mechanism: Mechanism,
    pub model: String,
    /// Valid results in dataset order
    pub results: Vec<ActivationResult>,
    pub failures: Vec<CaseFailure>,
    pub skipped: usize,
}

impl ActivationRun {
    pub fn summary(&self) -> ActivationSummary {
        ActivationSummary::compute(
            self.mechanism,
            &self.results,
            self.skipped,
            self.failures.len(),
        )
    }
}

/// Final answer plus every guide call made on the way
struct Conversation {
    response: CompletionResponse,
    tool_calls: Vec<ToolCall>,
    usage: Usage,
}

/// Runs activation cases against one model
#[derive(Clone)]
pub struct ActivationRunner {
    client: Arc<dyn ModelClient>,
    catalog: Arc<Catalog>,
    prompts: Arc<PromptBuilder>,
    detection: Arc<DetectionConfig>,
    settings: EvalSettings,
    model: String,
}

impl ActivationRunner {
    pub fn new(
        client: Arc<dyn ModelClient>,
        catalog: Arc<Catalog>,
        prompts: PromptBuilder,
        detection: DetectionConfig,
        settings: EvalSettings,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            catalog,
            prompts: Arc::new(prompts),
            detection: Arc::new(detection),
            settings,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run every case under one mechanism. `skipped` is carried into the
    /// summary as the count of cases dropped while loading.
    pub async fn run(
        &self,
        cases: &[ActivationTestCase],
        mechanism: Mechanism,
        skipped: usize,
    ) -> ActivationRun {
        info!(
            "Running {} activation cases with mechanism '{}' on {}",
            cases.len(),
            mechanism,
            self.model
        );

        let runner = self.clone();
        let outputs = run_bounded(cases.to_vec(), self.settings.max_concurrency, move |case| {
            let runner = runner.clone();
            async move {
                let result = runner.run_case(&case, mechanism).await;
                (case.id, result)
            }
        })
        .await;

        let mut results = Vec::with_capacity(cases.len());
        let mut failures = Vec::new();
        for (case, output) in cases.iter().zip(outputs) {
            match output {
                Some((_, Ok(result))) => results.push(result),
                Some((case_id, Err(e))) => {
                    warn!("Case {} failed under {}: {}", case_id, mechanism, e);
                    failures.push(CaseFailure {
                        case_id,
                        stage: FailureStage::Discovery,
                        reason: e.to_string(),
                    });
                }
                None => failures.push(CaseFailure {
                    case_id: case.id.clone(),
                    stage: FailureStage::Aborted,
                    reason: "evaluation task aborted".to_string(),
                }),
            }
        }

        info!(
            "Mechanism '{}': {} results, {} failed",
            mechanism,
            results.len(),
            failures.len()
        );

        ActivationRun {
            mechanism,
            model: self.model.clone(),
            results,
            failures,
            skipped,
        }
    }

    /// Run a single case: prompt, answer tool calls, detect, classify
    pub async fn run_case(
        &self,
        case: &ActivationTestCase,
        mechanism: Mechanism,
    ) -> Result<ActivationResult, InferenceError> {
        let built = self.prompts.build(mechanism, &self.catalog, &case.user_prompt);
        let conversation = self.converse(built.messages, built.tools).await?;

        let text = conversation.response.text_or_empty().to_string();
        let ordered = detect_in_order(
            &text,
            &conversation.tool_calls,
            &self.catalog,
            &self.detection,
        );
        let detected: BTreeSet<String> = ordered.iter().cloned().collect();
        let classification = classify(case, &detected);

        debug!(
            "Case {} [{}]: detected {:?}, tp={}, fp={}",
            case.id,
            mechanism,
            detected,
            classification.is_true_positive,
            classification.is_false_positive
        );

        Ok(ActivationResult {
            case_id: case.id.clone(),
            mechanism,
            model: self.model.clone(),
            should_activate: case.should_activate(),
            activated: classification.activated,
            detected_skills: detected,
            expected_skills: case.expected_skills.clone(),
            acceptable_skills: case.acceptable_skills.clone(),
            extra_skills: classification.extra_skills,
            is_true_positive: classification.is_true_positive,
            is_false_positive: classification.is_false_positive,
            accuracy: classification.accuracy,
            precision_at_1: precision_at_1(case, &ordered),
            recall: classification.recall,
            category: case.category.clone(),
            response_text: text,
            prompt_tokens: conversation.usage.prompt_tokens,
            completion_tokens: conversation.usage.completion_tokens,
        })
    }

    async fn call(
        &self,
        messages: Vec<ChatMessage>,
        tools: Vec<Tool>,
    ) -> Result<CompletionResponse, InferenceError> {
        let request = CompletionRequest::new(&self.model, messages)
            .with_tools(tools)
            .with_temperature(self.settings.temperature);
        with_deadline(
            self.settings.request_timeout_secs,
            self.client.complete(request),
        )
        .await
    }

    /// Answer tool calls with guide content until the model stops calling
    /// or the round limit is reached
    async fn converse(
        &self,
        mut messages: Vec<ChatMessage>,
        tools: Vec<Tool>,
    ) -> Result<Conversation, InferenceError> {
        let mut usage = Usage::default();
        let mut tool_calls = Vec::new();

        let mut response = self.call(messages.clone(), tools.clone()).await?;
        usage.add(response.usage);

        let mut rounds = 0;
        while response.has_tool_calls() && rounds < self.settings.max_tool_rounds {
            rounds += 1;
            messages.push(ChatMessage::assistant_with_tools(
                response.content.clone(),
                response.tool_calls.clone(),
            ));
            for call in &response.tool_calls {
                messages.push(ChatMessage::tool_result(
                    call.id.clone(),
                    guide_tool_reply(&self.catalog, call),
                ));
            }
            tool_calls.extend(response.tool_calls.iter().cloned());

            response = self.call(messages.clone(), tools.clone()).await?;
            usage.add(response.usage);
        }

        // calls left unanswered after the last round still count
        tool_calls.extend(response.tool_calls.iter().cloned());

        Ok(Conversation {
            response,
            tool_calls,
            usage,
        })
    }
}
