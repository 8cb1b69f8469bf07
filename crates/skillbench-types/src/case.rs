use serde::{Deserialize, Serialize};

/// One line of an activation dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationTestCase {
    pub id: String,
    pub user_prompt: String,
    #[serde(default)]
    pub expected_skills: Vec<String>,
    #[serde(default)]
    pub acceptable_skills: Vec<String>,
    /// Defaults to `!expected_skills.is_empty()` when the line omits it
    #[serde(default)]
    pub should_activate: Option<bool>,
    #[serde(default)]
    pub category: Option<String>,
}

impl ActivationTestCase {
    pub fn should_activate(&self) -> bool {
        self.should_activate
            .unwrap_or(!self.expected_skills.is_empty())
    }

    /// Case-insensitive membership in expected ∪ acceptable
    pub fn is_relevant(&self, skill: &str) -> bool {
        self.expected_skills
            .iter()
            .chain(self.acceptable_skills.iter())
            .any(|s| s.eq_ignore_ascii_case(skill))
    }

    pub fn is_expected(&self, skill: &str) -> bool {
        self.expected_skills
            .iter()
            .any(|s| s.eq_ignore_ascii_case(skill))
    }

    pub fn is_acceptable(&self, skill: &str) -> bool {
        self.acceptable_skills
            .iter()
            .any(|s| s.eq_ignore_ascii_case(skill))
    }
}

/// One line of an effectiveness dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectivenessTestCase {
    pub id: String,
    pub skill_name: String,
    pub task: String,
    pub rubric_file: String,
}
