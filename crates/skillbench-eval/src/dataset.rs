//! JSONL datasets and YAML rubrics
//!
//! A malformed line only drops that case (it is logged and counted). An
//! unreadable file, or a file with no usable case at all, is an error.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use skillbench_skills::Catalog;
use skillbench_types::{
    ActivationTestCase, Criterion, DatasetError, EffectivenessTestCase, Rubric,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Cases that loaded plus the reasons others were dropped
#[derive(Debug)]
pub struct Loaded<T> {
    pub cases: Vec<T>,
    pub skipped: Vec<DatasetError>,
}

impl<T> Loaded<T> {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Loaded<T>, DatasetError> {
    let text = std::fs::read_to_string(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut cases = Vec::new();
    let mut skipped = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(line) {
            Ok(case) => cases.push(case),
            Err(e) => {
                let err = DatasetError::Malformed {
                    path: path.to_path_buf(),
                    line: index + 1,
                    reason: e.to_string(),
                };
                warn!("Skipping case: {}", err);
                skipped.push(err);
            }
        }
    }

    Ok(Loaded { cases, skipped })
}

fn ensure_not_empty<T>(path: &Path, loaded: Loaded<T>) -> Result<Loaded<T>, DatasetError> {
    if loaded.cases.is_empty() {
        return Err(DatasetError::NoValidCases(path.to_path_buf()));
    }
    info!(
        "Loaded {} cases from {:?} ({} skipped)",
        loaded.cases.len(),
        path,
        loaded.skipped.len()
    );
    Ok(loaded)
}

/// Load an activation dataset.
///
/// Cases naming a skill absent from `catalog` are dropped: they could never
/// score a hit.
pub fn load_activation_cases(
    path: &Path,
    catalog: &Catalog,
) -> Result<Loaded<ActivationTestCase>, DatasetError> {
    let Loaded { cases, mut skipped } = read_jsonl::<ActivationTestCase>(path)?;

    let mut kept = Vec::with_capacity(cases.len());
    for case in cases {
        let unknown = case
            .expected_skills
            .iter()
            .chain(case.acceptable_skills.iter())
            .find(|s| catalog.get_ignore_case(s).is_none())
            .cloned();

        match unknown {
            Some(skill) => {
                let err = DatasetError::UnknownSkill {
                    case_id: case.id.clone(),
                    skill,
                };
                warn!("Skipping case: {}", err);
                skipped.push(err);
            }
            None => kept.push(case),
        }
    }

    ensure_not_empty(path, Loaded { cases: kept, skipped })
}

/// Load an effectiveness dataset, optionally keeping one skill's cases only
pub fn load_effectiveness_cases(
    path: &Path,
    skill_filter: Option<&str>,
) -> Result<Loaded<EffectivenessTestCase>, DatasetError> {
    let mut loaded = read_jsonl::<EffectivenessTestCase>(path)?;
    if let Some(skill) = skill_filter {
        loaded.cases.retain(|c| c.skill_name == skill);
    }
    ensure_not_empty(path, loaded)
}

#[derive(Debug, Deserialize)]
struct RubricFile {
    #[serde(default)]
    skill_name: Option<String>,
    criteria: serde_yaml::Value,
}

#[derive(Debug, Deserialize)]
struct CriterionBody {
    weight: f64,
    #[serde(default)]
    description: String,
}

/// Load a rubric. `criteria` may be a list of `{name, weight, description}`
/// or a mapping `name → {weight, description}` (mapping order is kept).
pub fn load_rubric(path: &Path) -> Result<Rubric, DatasetError> {
    let rubric_err = |reason: String| DatasetError::Rubric {
        path: path.to_path_buf(),
        reason,
    };

    let text = std::fs::read_to_string(path).map_err(|e| rubric_err(e.to_string()))?;
    let file: RubricFile = serde_yaml::from_str(&text).map_err(|e| rubric_err(e.to_string()))?;

    let criteria = match file.criteria {
        serde_yaml::Value::Sequence(items) => items
            .into_iter()
            .map(serde_yaml::from_value::<Criterion>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| rubric_err(e.to_string()))?,
        serde_yaml::Value::Mapping(map) => {
            let mut criteria = Vec::with_capacity(map.len());
            for (key, value) in map {
                let name = key
                    .as_str()
                    .ok_or_else(|| rubric_err("criterion names must be strings".to_string()))?
                    .to_string();
                let body: CriterionBody =
                    serde_yaml::from_value(value).map_err(|e| rubric_err(format!("{}: {}", name, e)))?;
                criteria.push(Criterion {
                    name,
                    weight: body.weight,
                    description: body.description,
                });
            }
            criteria
        }
        _ => return Err(rubric_err("'criteria' must be a list or a mapping".to_string())),
    };

    Rubric::new(file.skill_name, criteria).map_err(|e| rubric_err(e.to_string()))
}

/// Loads each rubric file once, resolving relative names against a directory
#[derive(Debug)]
pub struct RubricStore {
    dir: PathBuf,
    cache: HashMap<PathBuf, Arc<Rubric>>,
}

impl RubricStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: HashMap::new(),
        }
    }

    pub fn resolve(&self, rubric_file: &str) -> PathBuf {
        let path = Path::new(rubric_file);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.dir.join(path)
        }
    }

    pub fn get(&mut self, rubric_file: &str) -> Result<Arc<Rubric>, DatasetError> {
        let path = self.resolve(rubric_file);
        if let Some(rubric) = self.cache.get(&path) {
            return Ok(Arc::clone(rubric));
        }
        let rubric = Arc::new(load_rubric(&path)?);
        self.cache.insert(path, Arc::clone(&rubric));
        Ok(rubric)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skillbench_skills::Skill;
    use std::fs;
    use tempfile::TempDir;

    fn catalog() -> Catalog {
        let skill = Skill::parse(
            "---\nname: efcore-patterns\ndescription: EF.\n---\nbody\n",
            "efcore".into(),
            PathBuf::from("efcore/SKILL.md"),
        )
        .unwrap();
        Catalog::from_skills(vec![skill])
    }

    #[test]
    fn test_malformed_lines_are_skipped_and_counted() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("activation.jsonl");
        fs::write(
            &path,
            concat!(
                r#"{"id":"a1","user_prompt":"Batch inserts?","expected_skills":["efcore-patterns"]}"#,
                "\n\n",
                "{not json}\n",
                r#"{"id":"a2","user_prompt":"Hello"}"#,
                "\n",
                r#"{"id":"a3","user_prompt":"x","expected_skills":["ghost-skill"]}"#,
                "\n",
            ),
        )
        .unwrap();

        let loaded = load_activation_cases(&path, &catalog()).unwrap();
        assert_eq!(loaded.cases.len(), 2);
        assert_eq!(loaded.skipped_count(), 2);
        assert!(matches!(loaded.skipped[0], DatasetError::Malformed { line: 3, .. }));
        assert!(matches!(loaded.skipped[1], DatasetError::UnknownSkill { .. }));
        assert!(!loaded.cases[1].should_activate());
    }

    #[test]
    fn test_dataset_with_no_valid_cases_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.jsonl");
        fs::write(&path, "{oops}\n\n").unwrap();
        assert!(matches!(
            load_activation_cases(&path, &catalog()).unwrap_err(),
            DatasetError::NoValidCases(_)
        ));
    }

    #[test]
    fn test_unreadable_dataset_is_fatal() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            load_effectiveness_cases(&tmp.path().join("missing.jsonl"), None).unwrap_err(),
            DatasetError::Io { .. }
        ));
    }

    #[test]
    fn test_effectiveness_skill_filter() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("eff.jsonl");
        fs::write(
            &path,
            concat!(
                r#"{"id":"e1","skill_name":"efcore-patterns","task":"t","rubric_file":"efcore.yaml"}"#,
                "\n",
                r#"{"id":"e2","skill_name":"other-skill","task":"t","rubric_file":"other.yaml"}"#,
                "\n",
            ),
        )
        .unwrap();

        let loaded = load_effectiveness_cases(&path, Some("efcore-patterns")).unwrap();
        assert_eq!(loaded.cases.len(), 1);
        assert_eq!(loaded.cases[0].id, "e1");
    }

    #[test]
    fn test_rubric_list_form() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("r.yaml");
        fs::write(
            &path,
            "skill_name: efcore-patterns\ncriteria:\n  - name: correctness\n    weight: 2\n    description: Works\n  - name: style\n    weight: 1\n    description: Reads well\n",
        )
        .unwrap();

        let rubric = load_rubric(&path).unwrap();
        assert_eq!(rubric.criteria.len(), 2);
        assert_eq!(rubric.criteria[0].name, "correctness");
        assert_eq!(rubric.total_weight(), 3.0);
    }

    #[test]
    fn test_rubric_mapping_form_keeps_order() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("r.yaml");
        fs::write(
            &path,
            "criteria:\n  zeta:\n    weight: 0.5\n    description: Last alphabetically\n  alpha:\n    weight: 1.5\n",
        )
        .unwrap();

        let rubric = load_rubric(&path).unwrap();
        let names: Vec<_> = rubric.criteria.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
        assert!(rubric.skill_name.is_none());
    }

    #[test]
    fn test_rubric_with_zero_total_weight_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("r.yaml");
        fs::write(&path, "criteria:\n  - name: a\n    weight: 0\n").unwrap();
        assert!(matches!(
            load_rubric(&path).unwrap_err(),
            DatasetError::Rubric { .. }
        ));
    }

    #[test]
    fn test_rubric_store_resolves_and_caches() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("r.yaml"),
            "criteria:\n  - name: a\n    weight: 1\n",
        )
        .unwrap();

        let mut store = RubricStore::new(tmp.path());
        let first = store.get("r.yaml").unwrap();
        let second = store.get("r.yaml").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(store.get("missing.yaml").is_err());
    }
}
