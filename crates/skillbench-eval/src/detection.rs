//! Decide which skills a model response activated
//!
//! A call to the guide tool is authoritative. Without one, the response text
//! is scanned for catalog names. Distinctive hyphenated names activate on a
//! whole-token match; short or common names additionally need a citation
//! or a nearby cue word.

use regex::Regex;
use serde::{Deserialize, Serialize};
use skillbench_skills::Catalog;
use skillbench_types::{ActivationTestCase, ToolCall};
use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::prompt::GUIDE_TOOL_NAME;

/// Tuning for the generic-name guard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Names shorter than this are treated as generic
    #[serde(default = "default_min_specific_len")]
    pub min_specific_len: usize,
    /// Names always treated as generic
    #[serde(default)]
    pub denylist: Vec<String>,
    /// Words that mark a nearby generic name as a citation
    #[serde(default = "default_cue_words")]
    pub cue_words: Vec<String>,
    /// Characters searched on each side of a match for a cue word
    #[serde(default = "default_context_window")]
    pub context_window: usize,
}

fn default_min_specific_len() -> usize {
    12
}

fn default_cue_words() -> Vec<String> {
    ["skill", "guide", "guidance", "playbook"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_context_window() -> usize {
    40
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_specific_len: default_min_specific_len(),
            denylist: Vec::new(),
            cue_words: default_cue_words(),
            context_window: default_context_window(),
        }
    }
}

impl DetectionConfig {
    /// Whether `name` needs more than a bare mention to count
    pub fn is_generic(&self, name: &str) -> bool {
        !name.contains('-')
            || name.len() < self.min_specific_len
            || self.denylist.iter().any(|d| d.eq_ignore_ascii_case(name))
    }

    /// Whole-word matcher for the cue words and their plurals; `None` when
    /// no usable cue word is configured
    pub fn cue_pattern(&self) -> Option<Regex> {
        let alternatives: Vec<String> = self
            .cue_words
            .iter()
            .map(|cue| cue.trim())
            .filter(|cue| !cue.is_empty())
            .map(|cue| regex::escape(&cue.to_ascii_lowercase()))
            .collect();
        if alternatives.is_empty() {
            return None;
        }
        let pattern = format!(r"\b(?:{})s?\b", alternatives.join("|"));
        match Regex::new(&pattern) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!("Ignoring cue words, pattern {:?} is invalid: {}", pattern, e);
                None
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct GuideArgs {
    #[serde(default)]
    name: String,
}

/// Names activated by a response, in name order.
///
/// Tool call names are reported in catalog spelling when the catalog knows
/// them. An empty response without tool calls yields an empty set.
pub fn detect_activations(
    text: &str,
    tool_calls: &[ToolCall],
    catalog: &Catalog,
    config: &DetectionConfig,
) -> BTreeSet<String> {
    detect_in_order(text, tool_calls, catalog, config)
        .into_iter()
        .collect()
}

/// Activated names in the order the response reached for them: guide calls
/// in call order, otherwise text mentions by first qualifying position
pub fn detect_in_order(
    text: &str,
    tool_calls: &[ToolCall],
    catalog: &Catalog,
    config: &DetectionConfig,
) -> Vec<String> {
    let guide_calls: Vec<&ToolCall> = tool_calls
        .iter()
        .filter(|c| c.function.name == GUIDE_TOOL_NAME)
        .collect();

    if !guide_calls.is_empty() {
        let mut activated: Vec<String> = Vec::new();
        for call in guide_calls {
            let requested = match call.parse_args::<GuideArgs>() {
                Ok(args) => args.name.trim().to_string(),
                Err(e) => {
                    debug!("Unreadable guide call arguments {:?}: {}", call.function.arguments, e);
                    continue;
                }
            };
            if requested.is_empty() {
                continue;
            }
            let canonical = catalog
                .canonical_name(&requested)
                .map(str::to_string)
                .unwrap_or(requested);
            if !activated.contains(&canonical) {
                activated.push(canonical);
            }
        }
        return activated;
    }

    let mut mentions = scan_text(text, catalog, config);
    mentions.sort();
    mentions.into_iter().map(|(_, name)| name).collect()
}

/// First qualifying position of every catalog name the text activates
fn scan_text(text: &str, catalog: &Catalog, config: &DetectionConfig) -> Vec<(usize, String)> {
    let mut mentions = Vec::new();
    if text.trim().is_empty() {
        return mentions;
    }

    // ASCII lowering keeps byte offsets aligned with the original text
    let haystack = text.to_ascii_lowercase();
    let cue_spans: Vec<(usize, usize)> = config
        .cue_pattern()
        .map(|re| re.find_iter(&haystack).map(|m| (m.start(), m.end())).collect())
        .unwrap_or_default();

    for name in catalog.names() {
        let needle = name.to_ascii_lowercase();
        if needle.is_empty() {
            continue;
        }
        let generic = config.is_generic(name);

        let first = haystack.match_indices(&needle).find(|&(start, matched)| {
            let end = start + matched.len();
            let before = haystack[..start].chars().next_back();
            let after = haystack[end..].chars().next();

            if before.map(is_token_char).unwrap_or(false) || after.map(is_token_char).unwrap_or(false) {
                return false;
            }
            if !generic {
                return true;
            }
            is_cited(before, after) || has_cue_nearby(&cue_spans, start, end, config.context_window)
        });

        if let Some((start, _)) = first {
            mentions.push((start, name.to_string()));
        }
    }

    mentions
}

fn is_token_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

/// Wrapped in backticks, quotes, `**` or square brackets
fn is_cited(before: Option<char>, after: Option<char>) -> bool {
    matches!(
        (before, after),
        (Some('`'), Some('`'))
            | (Some('"'), Some('"'))
            | (Some('\''), Some('\''))
            | (Some('*'), Some('*'))
            | (Some('['), Some(']'))
            | (Some('\u{201c}'), Some('\u{201d}'))
    )
}

/// A whole cue word lies within `window` bytes before or after the match
fn has_cue_nearby(cue_spans: &[(usize, usize)], start: usize, end: usize, window: usize) -> bool {
    let from = start.saturating_sub(window);
    let to = end + window;
    cue_spans
        .iter()
        .any(|&(s, e)| (s >= from && e <= start) || (s >= end && e <= to))
}

/// How a detected set scores against one test case
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub activated: bool,
    /// Some detected name is expected or acceptable
    pub hit: bool,
    pub is_true_positive: bool,
    pub is_false_positive: bool,
    /// 1.0 expected hit, 0.5 acceptable-only hit, 0.0 otherwise
    pub accuracy: f64,
    /// Share of expected skills detected; 1.0 when none are expected
    pub recall: f64,
    /// Detected names outside expected ∪ acceptable
    pub extra_skills: BTreeSet<String>,
}

/// Score a detected set. A wrong skill on a positive case is a miss: it is
/// neither a true positive nor a false positive.
pub fn classify(case: &ActivationTestCase, detected: &BTreeSet<String>) -> Classification {
    let should_activate = case.should_activate();
    let activated = !detected.is_empty();

    let expected_hit = detected.iter().any(|d| case.is_expected(d));
    let acceptable_hit = detected.iter().any(|d| case.is_acceptable(d));
    let hit = expected_hit || acceptable_hit;

    let accuracy = if expected_hit {
        1.0
    } else if acceptable_hit {
        0.5
    } else {
        0.0
    };

    let extra_skills = detected
        .iter()
        .filter(|d| !case.is_relevant(d))
        .cloned()
        .collect();

    let recall = if case.expected_skills.is_empty() {
        1.0
    } else {
        let found = case
            .expected_skills
            .iter()
            .filter(|e| detected.iter().any(|d| d.eq_ignore_ascii_case(e)))
            .count();
        found as f64 / case.expected_skills.len() as f64
    };

    Classification {
        activated,
        hit,
        is_true_positive: should_activate && hit,
        is_false_positive: !should_activate && activated,
        accuracy,
        recall,
        extra_skills,
    }
}

/// 1.0 when the first activated name is an expected skill
pub fn precision_at_1(case: &ActivationTestCase, ordered: &[String]) -> f64 {
    match ordered.first() {
        Some(first) if case.is_expected(first) => 1.0,
        _ => 0.0,
    }
}
