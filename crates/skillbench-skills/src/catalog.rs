//! Skill catalog: every skill of a repository keyed by frontmatter name
//!
//! Loading is strict. A missing root or a malformed SKILL.md aborts the load,
//! while duplicate names keep the first skill and are recorded as issues.

use serde::Deserialize;
use skillbench_types::CatalogError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::skill::{Skill, SKILL_FILE};

/// Loaded skills plus the non-fatal problems found while loading
#[derive(Debug, Default)]
pub struct Catalog {
    /// Skills keyed by name; iteration is in name order
    skills: BTreeMap<String, Skill>,
    /// Non-fatal issues (duplicate names)
    issues: Vec<CatalogError>,
}

/// Plugin manifest location relative to a repository root
pub const PLUGIN_MANIFEST: &str = ".claude-plugin/plugin.json";

#[derive(Debug, Deserialize)]
struct PluginManifest {
    #[serde(default)]
    skills: Vec<String>,
}

impl Catalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from already parsed skills, in the given order
    pub fn from_skills(skills: impl IntoIterator<Item = Skill>) -> Self {
        let mut catalog = Self::new();
        for skill in skills {
            catalog.insert(skill);
        }
        catalog
    }

    /// Scan every immediate sub-directory of `root` holding a SKILL.md
    pub fn load(root: &Path) -> Result<Self, CatalogError> {
        if !root.exists() {
            return Err(CatalogError::MissingRoot(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(CatalogError::NotADirectory(root.to_path_buf()));
        }

        info!("Loading skills from {:?}", root);

        let entries = std::fs::read_dir(root).map_err(|source| CatalogError::Io {
            path: root.to_path_buf(),
            source,
        })?;

        let mut dirs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| CatalogError::Io {
                path: root.to_path_buf(),
                source,
            })?;
            dirs.push(entry.path());
        }
        dirs.sort();

        let mut catalog = Self::new();
        for path in dirs {
            if !path.is_dir() {
                continue;
            }
            if !path.join(SKILL_FILE).is_file() {
                debug!("Skipping {:?}: no {}", path, SKILL_FILE);
                continue;
            }

            let skill = Skill::from_dir(&path)?;
            debug!("Discovered skill: {} at {:?}", skill.name, path);
            catalog.insert(skill);
        }

        info!(
            "Discovered {} skills ({} issues)",
            catalog.len(),
            catalog.issues.len()
        );
        Ok(catalog)
    }

    /// Load exactly the skills listed in a plugin manifest, in manifest order.
    ///
    /// Paths in the manifest are relative to the repository root, which is
    /// the parent of the directory holding the manifest.
    pub fn from_manifest(manifest_path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(manifest_path).map_err(|source| CatalogError::Io {
            path: manifest_path.to_path_buf(),
            source,
        })?;

        let manifest: PluginManifest =
            serde_json::from_str(&raw).map_err(|e| CatalogError::Manifest {
                path: manifest_path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let repo_root = manifest_path
            .parent()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let mut catalog = Self::new();
        for entry in &manifest.skills {
            let relative = entry.trim_start_matches("./");
            let skill = Skill::from_dir(&repo_root.join(relative))?;
            catalog.insert(skill);
        }

        info!(
            "Loaded {} skills from manifest {:?}",
            catalog.len(),
            manifest_path
        );
        Ok(catalog)
    }

    /// Load a skills repository: its plugin manifest when present, else the
    /// `skills/` directory, else the repository root itself
    pub fn from_repo(repo: &Path) -> Result<Self, CatalogError> {
        let manifest = repo.join(PLUGIN_MANIFEST);
        if manifest.is_file() {
            return Self::from_manifest(&manifest);
        }

        let skills_dir = repo.join("skills");
        if skills_dir.is_dir() {
            return Self::load(&skills_dir);
        }

        debug!("No manifest or skills/ directory under {:?}, scanning it directly", repo);
        Self::load(repo)
    }

    fn insert(&mut self, skill: Skill) {
        if let Some(existing) = self.skills.get(&skill.name) {
            let issue = CatalogError::DuplicateName {
                name: skill.name.clone(),
                kept: existing.path.clone(),
                duplicate: skill.path.clone(),
            };
            warn!("{}", issue);
            self.issues.push(issue);
            return;
        }
        self.skills.insert(skill.name.clone(), skill);
    }

    /// Get a skill by exact name
    pub fn get(&self, name: &str) -> Option<&Skill> {
        self.skills.get(name)
    }

    /// Get a skill by name, ignoring ASCII case
    pub fn get_ignore_case(&self, name: &str) -> Option<&Skill> {
        self.get(name).or_else(|| {
            self.skills
                .values()
                .find(|s| s.name.eq_ignore_ascii_case(name))
        })
    }

    /// Catalog spelling of `name`, if it names a known skill
    pub fn canonical_name(&self, name: &str) -> Option<&str> {
        self.get_ignore_case(name.trim()).map(|s| s.name.as_str())
    }

    /// Skill names in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.skills.keys().map(String::as_str)
    }

    /// Skills in name order
    pub fn iter(&self) -> impl Iterator<Item = &Skill> {
        self.skills.values()
    }

    /// Number of skills
    pub fn len(&self) -> usize {
        self.skills.len()
    }

    /// Check if catalog is empty
    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    /// Non-fatal problems recorded during loading
    pub fn issues(&self) -> &[CatalogError] {
        &self.issues
    }

    /// Skills whose name starts with `prefix`
    pub fn filter_by_prefix(&self, prefix: &str) -> Vec<&Skill> {
        self.iter().filter(|s| s.name.starts_with(prefix)).collect()
    }

    /// Frontmatter name → directory name; the two often differ
    pub fn name_to_directory(&self) -> BTreeMap<String, String> {
        self.iter()
            .map(|s| (s.name.clone(), s.directory_name.clone()))
            .collect()
    }

    /// Skills longer than `limit` lines
    pub fn oversized(&self, limit: usize) -> Vec<&Skill> {
        self.iter().filter(|s| s.is_oversized(limit)).collect()
    }

    /// Total bytes across all SKILL.md files
    pub fn total_bytes(&self) -> usize {
        self.iter().map(|s| s.byte_size).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_skill(root: &Path, dir: &str, name: &str, description: &str) {
        let path = root.join(dir);
        fs::create_dir_all(&path).unwrap();
        fs::write(
            path.join(SKILL_FILE),
            format!(
                "---\nname: {}\ndescription: {}\n---\n\n# {}\n\nBody.\n",
                name, description, name
            ),
        )
        .unwrap();
    }

    #[test]
    fn test_catalog_new() {
        let catalog = Catalog::new();
        assert!(catalog.is_empty());
        assert_eq!(catalog.len(), 0);
    }

    #[test]
    fn test_load_sorted_by_name() {
        let tmp = TempDir::new().unwrap();
        write_skill(tmp.path(), "zeta", "akka-net-testing-patterns", "Testing actors.");
        write_skill(tmp.path(), "alpha", "efcore-patterns", "EF Core.");
        fs::create_dir_all(tmp.path().join("not-a-skill")).unwrap();
        fs::write(tmp.path().join("README.md"), "# readme").unwrap();

        let catalog = Catalog::load(tmp.path()).unwrap();
        let names: Vec<_> = catalog.names().collect();
        assert_eq!(names, vec!["akka-net-testing-patterns", "efcore-patterns"]);
        assert!(catalog.issues().is_empty());
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let err = Catalog::load(&tmp.path().join("nope")).unwrap_err();
        assert!(matches!(err, CatalogError::MissingRoot(_)));
    }

    #[test]
    fn test_root_file_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("file.txt");
        fs::write(&file, "x").unwrap();
        assert!(matches!(
            Catalog::load(&file).unwrap_err(),
            CatalogError::NotADirectory(_)
        ));
    }

    #[test]
    fn test_malformed_skill_is_fatal() {
        let tmp = TempDir::new().unwrap();
        write_skill(tmp.path(), "good", "good-skill", "Fine.");
        let bad = tmp.path().join("bad");
        fs::create_dir_all(&bad).unwrap();
        fs::write(bad.join(SKILL_FILE), "---\nname: bad-skill\n---\nno description\n").unwrap();

        let err = Catalog::load(tmp.path()).unwrap_err();
        assert!(matches!(err, CatalogError::Parse { .. }));
    }

    #[test]
    fn test_duplicate_name_keeps_first() {
        let tmp = TempDir::new().unwrap();
        write_skill(tmp.path(), "a-dir", "shared-name", "First.");
        write_skill(tmp.path(), "b-dir", "shared-name", "Second.");

        let catalog = Catalog::load(tmp.path()).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("shared-name").unwrap().description, "First.");
        assert_eq!(catalog.issues().len(), 1);
        assert!(matches!(
            catalog.issues()[0],
            CatalogError::DuplicateName { .. }
        ));
    }

    #[test]
    fn test_from_manifest() {
        let tmp = TempDir::new().unwrap();
        let skills_dir = tmp.path().join("skills");
        write_skill(&skills_dir, "akka-best-practices", "akka-net-best-practices", "Akka.");
        write_skill(&skills_dir, "efcore", "efcore-patterns", "EF.");
        write_skill(&skills_dir, "unlisted", "unlisted-skill", "Not in manifest.");

        let plugin_dir = tmp.path().join(".claude-plugin");
        fs::create_dir_all(&plugin_dir).unwrap();
        let manifest = plugin_dir.join("plugin.json");
        fs::write(
            &manifest,
            r#"{"name":"p","skills":["./skills/efcore","./skills/akka-best-practices"]}"#,
        )
        .unwrap();

        let catalog = Catalog::from_manifest(&manifest).unwrap();
        assert_eq!(catalog.len(), 2);
        assert!(catalog.get("unlisted-skill").is_none());
        assert_eq!(
            catalog.name_to_directory().get("akka-net-best-practices"),
            Some(&"akka-best-practices".to_string())
        );
    }

    #[test]
    fn test_from_repo_prefers_manifest_then_skills_dir() {
        let tmp = TempDir::new().unwrap();
        write_skill(&tmp.path().join("skills"), "efcore", "efcore-patterns", "EF.");
        write_skill(&tmp.path().join("skills"), "other", "other-skill", "Other.");

        let catalog = Catalog::from_repo(tmp.path()).unwrap();
        assert_eq!(catalog.len(), 2);

        let plugin_dir = tmp.path().join(".claude-plugin");
        fs::create_dir_all(&plugin_dir).unwrap();
        fs::write(plugin_dir.join("plugin.json"), r#"{"skills":["./skills/efcore"]}"#).unwrap();

        let catalog = Catalog::from_repo(tmp.path()).unwrap();
        assert_eq!(catalog.names().collect::<Vec<_>>(), vec!["efcore-patterns"]);
    }

    #[test]
    fn test_from_repo_falls_back_to_root() {
        let tmp = TempDir::new().unwrap();
        write_skill(tmp.path(), "efcore", "efcore-patterns", "EF.");
        assert_eq!(Catalog::from_repo(tmp.path()).unwrap().len(), 1);
        assert!(matches!(
            Catalog::from_repo(&tmp.path().join("missing")).unwrap_err(),
            CatalogError::MissingRoot(_)
        ));
    }

    #[test]
    fn test_lookup_helpers() {
        let tmp = TempDir::new().unwrap();
        write_skill(tmp.path(), "a", "akka-net-testing-patterns", "Testing.");
        write_skill(tmp.path(), "b", "akka-hosting-actor-patterns", "Hosting.");
        write_skill(tmp.path(), "c", "efcore-patterns", "EF.");

        let catalog = Catalog::load(tmp.path()).unwrap();
        assert_eq!(catalog.filter_by_prefix("akka-").len(), 2);
        assert_eq!(
            catalog.canonical_name(" EFCORE-Patterns "),
            Some("efcore-patterns")
        );
        assert!(catalog.canonical_name("unknown").is_none());
        assert!(catalog.oversized(500).is_empty());
    }
}
