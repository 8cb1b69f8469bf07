//! Pairwise rubric judging
//!
//! The judge sees two anonymous answers, "Response A" and "Response B", and
//! must reply with integer scores per rubric criterion for each.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;
use skillbench_types::{
    ChatMessage, CriterionScore, JudgeParseError, Rubric, MAX_SCORE, MIN_SCORE,
};

const JUDGE_SYSTEM_PROMPT: &str = "You are an expert code reviewer. Compare two responses to the \
same task and score each one against every rubric criterion. The responses are presented in \
random order; judge purely on quality, not position.";

/// Per-criterion scores for both presented responses
#[derive(Debug, Clone, PartialEq)]
pub struct JudgeVerdict {
    pub scores_a: Vec<CriterionScore>,
    pub scores_b: Vec<CriterionScore>,
    pub rationale: String,
}

/// Which answer is shown first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Presentation {
    pub enhanced_first: bool,
}

impl Presentation {
    /// Per-case order drawn from the run seed, stable for a given case id
    pub fn for_case(run_seed: u64, case_id: &str) -> Self {
        let mut rng = StdRng::seed_from_u64(run_seed ^ fnv1a(case_id));
        Self {
            enhanced_first: rng.gen_bool(0.5),
        }
    }

    /// (Response A, Response B)
    pub fn arrange<'a>(&self, baseline: &'a str, enhanced: &'a str) -> (&'a str, &'a str) {
        if self.enhanced_first {
            (enhanced, baseline)
        } else {
            (baseline, enhanced)
        }
    }

    /// Map A/B scores back to (baseline, enhanced)
    pub fn unshuffle(&self, verdict: JudgeVerdict) -> (Vec<CriterionScore>, Vec<CriterionScore>) {
        if self.enhanced_first {
            (verdict.scores_b, verdict.scores_a)
        } else {
            (verdict.scores_a, verdict.scores_b)
        }
    }
}

fn fnv1a(text: &str) -> u64 {
    text.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

/// Messages for one judge call
pub fn judge_messages(task: &str, response_a: &str, response_b: &str, rubric: &Rubric) -> Vec<ChatMessage> {
    let keys = rubric
        .criteria
        .iter()
        .map(|c| format!("\"{}\": <{}-{}>", c.name, MIN_SCORE, MAX_SCORE))
        .collect::<Vec<_>>()
        .join(", ");

    let user = format!(
        "## Task\n{task}\n\n## Rubric\n{rubric}\n\n## Response A\n{a}\n\n## Response B\n{b}\n\n\
         Score both responses on every criterion with an integer from {min} to {max}. \
         Reply with JSON only, in exactly this shape:\n\
         {{\"response_a\": {{{keys}}}, \"response_b\": {{{keys}}}, \"rationale\": \"<short explanation>\"}}",
        task = task,
        rubric = rubric.render(),
        a = response_a,
        b = response_b,
        min = MIN_SCORE,
        max = MAX_SCORE,
        keys = keys,
    );

    vec![ChatMessage::system(JUDGE_SYSTEM_PROMPT), ChatMessage::user(user)]
}

/// Parse a judge reply. Code fences and surrounding prose are tolerated;
/// every criterion must be scored on both sides with an integer in range.
pub fn parse_verdict(reply: &str, rubric: &Rubric) -> Result<JudgeVerdict, JudgeParseError> {
    let value = find_verdict_object(reply)?;

    let side = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_object)
            .ok_or_else(|| JudgeParseError::InvalidJson(format!("missing object '{}'", key)))
    };
    let scores_a = side_scores(side("response_a")?, "A", rubric)?;
    let scores_b = side_scores(side("response_b")?, "B", rubric)?;

    let rationale = ["rationale", "reasoning"]
        .iter()
        .find_map(|k| value.get(*k).and_then(Value::as_str))
        .unwrap_or_default()
        .to_string();

    Ok(JudgeVerdict {
        scores_a,
        scores_b,
        rationale,
    })
}

/// First JSON object holding both response keys. Fenced blocks are tried
/// before the raw reply, and every `{` is a candidate start so braces in
/// quoted code do not hide the verdict.
fn find_verdict_object(reply: &str) -> Result<Value, JudgeParseError> {
    let mut last_error = None;

    for region in fenced_blocks(reply).into_iter().chain(std::iter::once(reply)) {
        for (start, _) in region.match_indices('{') {
            let mut stream = serde_json::Deserializer::from_str(&region[start..]).into_iter::<Value>();
            match stream.next() {
                Some(Ok(value)) if is_verdict(&value) => return Ok(value),
                Some(Ok(_)) if last_error.is_none() => {
                    last_error = Some(JudgeParseError::InvalidJson(
                        "missing object 'response_a'".to_string(),
                    ));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => last_error = Some(JudgeParseError::InvalidJson(e.to_string())),
                None => {}
            }
        }
    }

    Err(last_error.unwrap_or(JudgeParseError::NoJson))
}

fn is_verdict(value: &Value) -> bool {
    value.get("response_a").is_some() && value.get("response_b").is_some()
}

/// Contents of ``` fenced blocks, language tag included
fn fenced_blocks(reply: &str) -> Vec<&str> {
    reply.split("```").skip(1).step_by(2).collect()
}

fn side_scores(
    scores: &serde_json::Map<String, Value>,
    side: &str,
    rubric: &Rubric,
) -> Result<Vec<CriterionScore>, JudgeParseError> {
    rubric
        .criteria
        .iter()
        .map(|criterion| {
            let raw = scores
                .iter()
                .find(|(k, _)| k.trim().eq_ignore_ascii_case(criterion.name.trim()))
                .map(|(_, v)| v)
                .ok_or_else(|| JudgeParseError::MissingCriterion {
                    side: side.to_string(),
                    criterion: criterion.name.clone(),
                })?;

            let out_of_range = || JudgeParseError::ScoreOutOfRange {
                side: side.to_string(),
                criterion: criterion.name.clone(),
                score: raw.to_string(),
                min: MIN_SCORE,
                max: MAX_SCORE,
            };

            let score = integer_score(raw).ok_or_else(out_of_range)?;
            if score < i64::from(MIN_SCORE) || score > i64::from(MAX_SCORE) {
                return Err(out_of_range());
            }

            Ok(CriterionScore {
                criterion: criterion.name.clone(),
                weight: criterion.weight,
                score: score as u8,
            })
        })
        .collect()
}

/// Integers, including integral floats like `4.0`
fn integer_score(value: &Value) -> Option<i64> {
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    value
        .as_f64()
        .filter(|f| f.fract() == 0.0 && f.is_finite())
        .map(|f| f as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use skillbench_types::{weighted_total, Criterion};

    fn rubric() -> Rubric {
        Rubric::new(
            Some("efcore-patterns".into()),
            vec![
                Criterion {
                    name: "correctness".into(),
                    weight: 2.0,
                    description: "Works".into(),
                },
                Criterion {
                    name: "Idiomatic Usage".into(),
                    weight: 1.0,
                    description: "Reads well".into(),
                },
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_parse_fenced_reply_with_prose() {
        let reply = "Here is my verdict:\n```json\n{\"response_a\": {\"correctness\": 4, \"idiomatic usage\": 2}, \"response_b\": {\"Correctness\": 5, \"Idiomatic Usage\": 5}, \"rationale\": \"B uses AsNoTracking\"}\n```\nThanks!";
        let verdict = parse_verdict(reply, &rubric()).unwrap();
        assert_eq!(weighted_total(&verdict.scores_a), 10.0);
        assert_eq!(weighted_total(&verdict.scores_b), 15.0);
        assert_eq!(verdict.rationale, "B uses AsNoTracking");
        assert_eq!(verdict.scores_a[1].criterion, "Idiomatic Usage");
    }

    #[test]
    fn test_braces_in_prose_before_verdict() {
        let verdict = "{\"response_a\": {\"correctness\": 2, \"idiomatic usage\": 3}, \"response_b\": {\"correctness\": 5, \"idiomatic usage\": 4}, \"rationale\": \"B maps the key\"}";

        let fenced = format!(
            "Response B uses `public int Id {{ get; set; }}` correctly.\n```json\n{}\n```",
            verdict
        );
        let parsed = parse_verdict(&fenced, &rubric()).unwrap();
        assert_eq!(weighted_total(&parsed.scores_a), 7.0);
        assert_eq!(weighted_total(&parsed.scores_b), 14.0);

        let unfenced = format!("A writes `class Order {{ int Id; }}` while B does not.\n{}\nDone.", verdict);
        let parsed = parse_verdict(&unfenced, &rubric()).unwrap();
        assert_eq!(parsed.rationale, "B maps the key");
    }

    #[test]
    fn test_object_without_response_keys_is_an_error() {
        assert!(matches!(
            parse_verdict(r#"{"score": 4}"#, &rubric()).unwrap_err(),
            JudgeParseError::InvalidJson(_)
        ));
    }

    #[test]
    fn test_no_json_is_an_error() {
        assert_eq!(
            parse_verdict("B is better.", &rubric()).unwrap_err(),
            JudgeParseError::NoJson
        );
    }

    #[test]
    fn test_missing_criterion_is_an_error() {
        let reply = r#"{"response_a": {"correctness": 4}, "response_b": {"correctness": 5, "idiomatic usage": 3}}"#;
        assert_eq!(
            parse_verdict(reply, &rubric()).unwrap_err(),
            JudgeParseError::MissingCriterion {
                side: "A".into(),
                criterion: "Idiomatic Usage".into()
            }
        );
    }

    #[test]
    fn test_out_of_range_and_fractional_scores_are_errors() {
        let seven = r#"{"response_a": {"correctness": 7, "idiomatic usage": 3}, "response_b": {"correctness": 5, "idiomatic usage": 3}}"#;
        assert!(matches!(
            parse_verdict(seven, &rubric()).unwrap_err(),
            JudgeParseError::ScoreOutOfRange { .. }
        ));

        let half = r#"{"response_a": {"correctness": 3.5, "idiomatic usage": 3}, "response_b": {"correctness": 5, "idiomatic usage": 3}}"#;
        assert!(matches!(
            parse_verdict(half, &rubric()).unwrap_err(),
            JudgeParseError::ScoreOutOfRange { .. }
        ));

        let text = r#"{"response_a": {"correctness": "4", "idiomatic usage": 3}, "response_b": {"correctness": 5, "idiomatic usage": 3}}"#;
        assert!(parse_verdict(text, &rubric()).is_err());
    }

    #[test]
    fn test_presentation_is_stable_per_case() {
        let a = Presentation::for_case(42, "case-1");
        let b = Presentation::for_case(42, "case-1");
        assert_eq!(a, b);

        // across many case ids both orders occur
        let firsts = (0..64)
            .filter(|i| Presentation::for_case(7, &format!("case-{}", i)).enhanced_first)
            .count();
        assert!(firsts > 0 && firsts < 64);
    }

    #[test]
    fn test_unshuffle_restores_sides() {
        let score = |s: u8| {
            vec![CriterionScore {
                criterion: "c".into(),
                weight: 1.0,
                score: s,
            }]
        };
        let verdict = JudgeVerdict {
            scores_a: score(5),
            scores_b: score(2),
            rationale: String::new(),
        };

        let enhanced_first = Presentation { enhanced_first: true };
        let (baseline, enhanced) = enhanced_first.unshuffle(verdict.clone());
        assert_eq!(baseline[0].score, 2);
        assert_eq!(enhanced[0].score, 5);

        let baseline_first = Presentation { enhanced_first: false };
        assert_eq!(baseline_first.arrange("base", "enh"), ("base", "enh"));
        let (baseline, _) = baseline_first.unshuffle(verdict);
        assert_eq!(baseline[0].score, 5);
    }

    #[test]
    fn test_judge_prompt_lists_criteria_keys() {
        let messages = judge_messages("Write a query", "A text", "B text", &rubric());
        let user = messages[1].content.clone().unwrap();
        assert!(user.contains("\"correctness\": <1-5>"));
        assert!(user.contains("## Response A\nA text"));
        assert!(user.contains("weight: 2"));
    }
}
