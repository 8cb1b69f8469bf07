//! Skill definition and parsing
//!
//! Each skill is a folder containing SKILL.md with YAML frontmatter

use regex::Regex;
use serde::Deserialize;
use skillbench_types::CatalogError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// File name every skill directory must contain
pub const SKILL_FILE: &str = "SKILL.md";
/// Maximum allowed name length
const MAX_NAME_LENGTH: usize = 64;
/// Maximum allowed description length
const MAX_DESCRIPTION_LENGTH: usize = 1024;
/// Line count above which a skill is considered oversized
pub const DEFAULT_MAX_LINES: usize = 500;

/// Skill metadata extracted from YAML frontmatter
#[derive(Debug, Clone, Deserialize)]
pub struct SkillMetadata {
    /// Skill name (lowercase letters/numbers/hyphens only)
    #[serde(default)]
    pub name: String,
    /// Skill description
    #[serde(default)]
    pub description: String,
}

/// A fully loaded skill
#[derive(Debug, Clone, PartialEq)]
pub struct Skill {
    /// Frontmatter name (may differ from the directory name)
    pub name: String,
    /// Frontmatter description
    pub description: String,
    /// Body after the frontmatter
    pub content: String,
    /// Lines in the whole SKILL.md, frontmatter included
    pub line_count: usize,
    /// Bytes in the whole SKILL.md
    pub byte_size: usize,
    /// Name of the directory holding SKILL.md
    pub directory_name: String,
    /// Path to SKILL.md
    pub path: PathBuf,
}

impl Skill {
    /// Load skill from a directory
    pub fn from_dir(dir: &Path) -> Result<Self, CatalogError> {
        let skill_file = dir.join(SKILL_FILE);

        let raw = fs::read_to_string(&skill_file).map_err(|source| CatalogError::Io {
            path: skill_file.clone(),
            source,
        })?;

        let directory_name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self::parse(&raw, directory_name, skill_file.clone()).map_err(|reason| {
            CatalogError::Parse {
                path: skill_file,
                reason,
            }
        })
    }

    /// Parse raw SKILL.md text
    pub fn parse(raw: &str, directory_name: String, path: PathBuf) -> Result<Self, String> {
        let (metadata, body) = parse_skill_content(raw)?;
        validate_metadata(&metadata)?;

        Ok(Self {
            name: metadata.name,
            description: metadata.description.trim().to_string(),
            content: body,
            line_count: raw.lines().count(),
            byte_size: raw.len(),
            directory_name,
            path,
        })
    }

    /// First `max_lines` lines of the body; the whole body when it is shorter
    pub fn truncated_content(&self, max_lines: usize) -> String {
        let mut lines = self.content.split_inclusive('\n');
        let kept: String = lines.by_ref().take(max_lines).collect();
        if lines.next().is_none() {
            return self.content.clone();
        }
        kept
    }

    /// Whether the SKILL.md exceeds `limit` lines
    pub fn is_oversized(&self, limit: usize) -> bool {
        self.line_count > limit
    }
}

/// Split SKILL.md into frontmatter metadata and body
pub fn parse_skill_content(content: &str) -> Result<(SkillMetadata, String), String> {
    let frontmatter_re = Regex::new(r"^\u{feff}?---[ \t]*\r?\n([\s\S]*?)\r?\n---[ \t]*(?:\r?\n([\s\S]*))?$")
        .map_err(|e| format!("Failed to compile regex: {}", e))?;

    let captures = frontmatter_re
        .captures(content)
        .ok_or_else(|| "No valid YAML frontmatter found".to_string())?;

    let yaml_str = captures.get(1).map(|m| m.as_str()).unwrap_or("");
    let body = captures.get(2).map(|m| m.as_str()).unwrap_or("");

    let metadata: SkillMetadata = serde_yaml::from_str(yaml_str)
        .map_err(|e| format!("Failed to parse YAML frontmatter: {}", e))?;

    Ok((metadata, body.trim_start_matches(['\r', '\n']).to_string()))
}

/// Validate skill metadata: name and description are required
fn validate_metadata(metadata: &SkillMetadata) -> Result<(), String> {
    if metadata.name.is_empty() {
        return Err("missing required frontmatter field 'name'".to_string());
    }

    if metadata.name.len() > MAX_NAME_LENGTH {
        warn!(
            "Skill name '{}' exceeds {} characters (was {})",
            metadata.name,
            MAX_NAME_LENGTH,
            metadata.name.len()
        );
    }

    let name_re = Regex::new(r"^[a-z0-9-]+$")
        .map_err(|e| format!("Failed to compile name validation regex: {}", e))?;

    if !name_re.is_match(&metadata.name) {
        return Err(format!(
            "Skill name '{}' must contain only lowercase letters, numbers, and hyphens",
            metadata.name
        ));
    }

    if metadata.description.trim().is_empty() {
        return Err(format!(
            "Skill '{}' is missing required frontmatter field 'description'",
            metadata.name
        ));
    }

    if metadata.description.len() > MAX_DESCRIPTION_LENGTH {
        warn!(
            "Skill '{}' description exceeds {} characters (was {})",
            metadata.name,
            MAX_DESCRIPTION_LENGTH,
            metadata.description.len()
        );
    }

    Ok(())
}
