//! Alternative authorings of a skill for A/B comparison
//!
//! Layout: `<variants_dir>/<skill>/<strategy>/SKILL.md`, plus extra `*.md`
//! reference files for the progressive strategy. The original strategy is
//! always the catalog content and never read from disk here.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

use crate::skill::{parse_skill_content, Skill, SKILL_FILE};

/// Reference files generated for progressive placeholders
const PROGRESSIVE_REFERENCES: [&str; 2] = ["reference.md", "examples.md"];

/// Authoring strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantStrategy {
    /// Unmodified catalog SKILL.md
    Original,
    /// Hand-trimmed single file
    Condensed,
    /// Core SKILL.md plus reference files
    Progressive,
}

impl VariantStrategy {
    /// All strategies, original first
    pub const ALL: [VariantStrategy; 3] = [
        VariantStrategy::Original,
        VariantStrategy::Condensed,
        VariantStrategy::Progressive,
    ];

    /// Directory / display name
    pub fn as_str(&self) -> &'static str {
        match self {
            VariantStrategy::Original => "original",
            VariantStrategy::Condensed => "condensed",
            VariantStrategy::Progressive => "progressive",
        }
    }
}

impl fmt::Display for VariantStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VariantStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "original" => Ok(VariantStrategy::Original),
            "condensed" => Ok(VariantStrategy::Condensed),
            "progressive" => Ok(VariantStrategy::Progressive),
            other => Err(format!(
                "unknown strategy '{}' (expected original, condensed or progressive)",
                other
            )),
        }
    }
}

/// One authoring of a skill
#[derive(Debug, Clone, PartialEq)]
pub struct SkillVariant {
    pub skill_name: String,
    pub strategy: VariantStrategy,
    /// Body of the variant's SKILL.md
    pub main_content: String,
    /// File name → content, sorted by file name
    pub reference_files: BTreeMap<String, String>,
}

impl SkillVariant {
    /// The catalog content as-is
    pub fn original(skill: &Skill) -> Self {
        Self {
            skill_name: skill.name.clone(),
            strategy: VariantStrategy::Original,
            main_content: skill.content.clone(),
            reference_files: BTreeMap::new(),
        }
    }

    /// Main content followed by every reference file
    pub fn full_context(&self) -> String {
        let mut context = self.main_content.clone();
        for (file_name, content) in &self.reference_files {
            context.push_str(&format!(
                "\n\n---\n\n# Reference: {}\n\n{}",
                file_name, content
            ));
        }
        context
    }

    /// Main SKILL.md only
    pub fn main_only_context(&self) -> &str {
        &self.main_content
    }

    pub fn has_references(&self) -> bool {
        !self.reference_files.is_empty()
    }

    /// Size of the full context in lines
    pub fn line_count(&self) -> usize {
        self.full_context().lines().count()
    }
}

/// Load a condensed or progressive variant; `None` when it was not authored
pub fn load_variant(
    variants_dir: &Path,
    skill_name: &str,
    strategy: VariantStrategy,
) -> Result<Option<SkillVariant>> {
    if strategy == VariantStrategy::Original {
        bail!("the original variant comes from the catalog, not {:?}", variants_dir);
    }

    let variant_dir = variants_dir.join(skill_name).join(strategy.as_str());
    let skill_file = variant_dir.join(SKILL_FILE);
    if !skill_file.is_file() {
        debug!("No {} variant for {} at {:?}", strategy, skill_name, skill_file);
        return Ok(None);
    }

    let raw = fs::read_to_string(&skill_file)
        .with_context(|| format!("Failed to read {:?}", skill_file))?;
    let main_content = match parse_skill_content(&raw) {
        Ok((_, body)) => body,
        Err(_) => raw,
    };

    let mut reference_files = BTreeMap::new();
    let entries = fs::read_dir(&variant_dir)
        .with_context(|| format!("Failed to read directory {:?}", variant_dir))?;
    for entry in entries {
        let path = entry?.path();
        let is_markdown = path.extension().map(|e| e == "md").unwrap_or(false);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !path.is_file() || !is_markdown || file_name == SKILL_FILE {
            continue;
        }
        let content =
            fs::read_to_string(&path).with_context(|| format!("Failed to read {:?}", path))?;
        reference_files.insert(file_name, content);
    }

    Ok(Some(SkillVariant {
        skill_name: skill_name.to_string(),
        strategy,
        main_content,
        reference_files,
    }))
}

/// Original plus every authored variant, keyed by strategy
pub fn all_variants(
    skill: &Skill,
    variants_dir: &Path,
) -> Result<BTreeMap<VariantStrategy, SkillVariant>> {
    let mut variants = BTreeMap::new();
    variants.insert(VariantStrategy::Original, SkillVariant::original(skill));

    for strategy in [VariantStrategy::Condensed, VariantStrategy::Progressive] {
        if let Some(variant) = load_variant(variants_dir, &skill.name, strategy)? {
            variants.insert(strategy, variant);
        }
    }

    Ok(variants)
}

/// Create placeholder variant directories; existing files are left alone.
/// Returns the files that were written.
pub fn scaffold_variants(variants_dir: &Path, skill_names: &[String]) -> Result<Vec<PathBuf>> {
    let mut created = Vec::new();

    for skill_name in skill_names {
        for strategy in [VariantStrategy::Condensed, VariantStrategy::Progressive] {
            let dir = variants_dir.join(skill_name).join(strategy.as_str());
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create directory {:?}", dir))?;

            let skill_file = dir.join(SKILL_FILE);
            if !skill_file.exists() {
                let placeholder = format!(
                    "---\nname: {name}\ndescription: Placeholder {strategy} variant\n---\n\n# {name} ({strategy} variant)\n\nAuthor this variant.\n",
                    name = skill_name,
                    strategy = strategy
                );
                fs::write(&skill_file, placeholder)
                    .with_context(|| format!("Failed to write {:?}", skill_file))?;
                created.push(skill_file);
            }

            if strategy == VariantStrategy::Progressive {
                for reference in PROGRESSIVE_REFERENCES {
                    let path = dir.join(reference);
                    if path.exists() {
                        continue;
                    }
                    let title = reference.trim_end_matches(".md");
                    let mut chars = title.chars();
                    let title = match chars.next() {
                        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                        None => String::new(),
                    };
                    fs::write(
                        &path,
                        format!("# {}\n\nMove detailed content here from SKILL.md.\n", title),
                    )
                    .with_context(|| format!("Failed to write {:?}", path))?;
                    created.push(path);
                }
            }
        }
    }

    info!(
        "Scaffolded {} variant files under {:?}",
        created.len(),
        variants_dir
    );
    Ok(created)
}
