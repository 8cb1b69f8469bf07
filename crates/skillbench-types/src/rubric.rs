use crate::error::RubricError;
use serde::{Deserialize, Serialize};

/// Lowest score a judge may give on one criterion
pub const MIN_SCORE: u8 = 1;
/// Highest score a judge may give on one criterion
pub const MAX_SCORE: u8 = 5;

/// A single weighted scoring dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub name: String,
    pub weight: f64,
    #[serde(default)]
    pub description: String,
}

/// Ordered, weighted criteria used by the judge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rubric {
    #[serde(default)]
    pub skill_name: Option<String>,
    pub criteria: Vec<Criterion>,
}

impl Rubric {
    /// Build a rubric, rejecting empty criteria, negative or non-finite
    /// weights and a zero weight total
    pub fn new(skill_name: Option<String>, criteria: Vec<Criterion>) -> Result<Self, RubricError> {
        let rubric = Self {
            skill_name,
            criteria,
        };
        rubric.validate()?;
        Ok(rubric)
    }

    pub fn validate(&self) -> Result<(), RubricError> {
        if self.criteria.is_empty() {
            return Err(RubricError::NoCriteria);
        }

        for criterion in &self.criteria {
            if criterion.name.trim().is_empty() {
                return Err(RubricError::EmptyCriterionName);
            }
            if !criterion.weight.is_finite() || criterion.weight < 0.0 {
                return Err(RubricError::InvalidWeight {
                    criterion: criterion.name.clone(),
                    weight: criterion.weight,
                });
            }
        }

        let mut seen = std::collections::HashSet::new();
        for criterion in &self.criteria {
            if !seen.insert(criterion.name.to_lowercase()) {
                return Err(RubricError::DuplicateCriterion(criterion.name.clone()));
            }
        }

        if self.total_weight() <= 0.0 {
            return Err(RubricError::NonPositiveTotal);
        }

        Ok(())
    }

    pub fn total_weight(&self) -> f64 {
        self.criteria.iter().map(|c| c.weight).sum()
    }

    /// Render the criteria for inclusion in a judge prompt
    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        if let Some(skill) = &self.skill_name {
            lines.push(format!("Skill: {}", skill));
        }
        lines.push("Criteria:".to_string());
        for c in &self.criteria {
            lines.push(format!(
                "  - {} (weight: {}): {}",
                c.name, c.weight, c.description
            ));
        }
        lines.join("\n")
    }
}

/// One judged score on one criterion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionScore {
    pub criterion: String,
    pub weight: f64,
    pub score: u8,
}

/// Σ weight × score. Comparisons between sides use this total, never an average.
pub fn weighted_total(scores: &[CriterionScore]) -> f64 {
    scores
        .iter()
        .map(|s| s.weight * f64::from(s.score))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn criterion(name: &str, weight: f64) -> Criterion {
        Criterion {
            name: name.to_string(),
            weight,
            description: String::new(),
        }
    }

    #[test]
    fn test_weighted_total() {
        let scores = vec![
            CriterionScore {
                criterion: "correctness".into(),
                weight: 2.0,
                score: 4,
            },
            CriterionScore {
                criterion: "style".into(),
                weight: 1.0,
                score: 2,
            },
        ];
        assert_eq!(weighted_total(&scores), 10.0);
    }

    #[test]
    fn test_rubric_rejects_zero_total() {
        let result = Rubric::new(None, vec![criterion("a", 0.0), criterion("b", 0.0)]);
        assert_eq!(result.unwrap_err(), RubricError::NonPositiveTotal);
    }

    #[test]
    fn test_rubric_rejects_negative_weight() {
        assert_eq!(
            Rubric::new(None, vec![criterion("a", -1.0), criterion("b", 3.0)]).unwrap_err(),
            RubricError::InvalidWeight {
                criterion: "a".into(),
                weight: -1.0
            }
        );
    }

    #[test]
    fn test_rubric_weights_need_not_be_normalized() {
        let rubric = Rubric::new(None, vec![criterion("a", 3.0), criterion("b", 2.0)]).unwrap();
        assert_eq!(rubric.total_weight(), 5.0);
    }

    #[test]
    fn test_rubric_rejects_duplicate_criteria() {
        assert_eq!(
            Rubric::new(None, vec![criterion("a", 1.0), criterion("A", 1.0)]).unwrap_err(),
            RubricError::DuplicateCriterion("A".into())
        );
        assert_eq!(Rubric::new(None, vec![]).unwrap_err(), RubricError::NoCriteria);
    }

    #[test]
    fn test_render_lists_criteria_in_order() {
        let rubric = Rubric::new(
            Some("efcore-patterns".into()),
            vec![criterion("first", 1.0), criterion("second", 2.0)],
        )
        .unwrap();
        let rendered = rubric.render();
        assert!(rendered.starts_with("Skill: efcore-patterns"));
        let first = rendered.find("first").unwrap();
        let second = rendered.find("second").unwrap();
        assert!(first < second);
    }
}
