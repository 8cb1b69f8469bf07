use serde::Deserialize;
use skillbench_eval::{DetectionConfig, EvalSettings};
use skillbench_types::ConfigError;
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

/// Built-in defaults; every other source overrides these
const DEFAULT_CONFIG: &str = r#"
[provider]
base_url = "https://openrouter.ai/api/v1"
api_key = ""  # Set via OPENROUTER_API_KEY env var
timeout_secs = 300

[models]
activation = "haiku"
effectiveness = "sonnet"
judge = "sonnet"

[models.aliases]
haiku = "anthropic/claude-haiku-4-5"
sonnet = "anthropic/claude-sonnet-4-5"
opus = "anthropic/claude-opus-4.6"

[skills]
repo = "~/repositories/dotnet-skills"  # Set via SKILLBENCH_SKILLS_REPO env var
readme = ""  # Compressed index source; defaults to <repo>/README.md
line_limit = 500

[paths]
rubrics_dir = "datasets/rubrics"
variants_dir = "datasets/variants"
results_dir = "results"

[prompt]
system = ""  # Empty keeps the built-in assistant persona

[eval]
max_concurrency = 4
request_timeout_secs = 120
temperature = 0.0
max_tool_rounds = 3

[detection]
min_specific_len = 12
denylist = []
cue_words = ["skill", "guide", "guidance", "playbook"]
context_window = 40

[logging]
level = "info"  # trace, debug, info, warn, error
format = "pretty"  # or "json"
"#;

#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelsConfig {
    pub activation: String,
    pub effectiveness: String,
    pub judge: String,
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SkillsConfig {
    pub repo: String,
    #[serde(default)]
    pub readme: String,
    pub line_limit: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    pub rubrics_dir: String,
    pub variants_dir: String,
    pub results_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PromptConfig {
    #[serde(default)]
    pub system: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub provider: ProviderConfig,
    pub models: ModelsConfig,
    pub skills: SkillsConfig,
    pub paths: PathsConfig,
    pub prompt: PromptConfig,
    pub eval: EvalSettings,
    pub detection: DetectionConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Global config path: ~/.skillbench/skillbench.toml
    fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".skillbench").join("skillbench.toml"))
    }

    /// Load configuration with layered approach:
    /// 1. Built-in defaults
    /// 2. Global config: ~/.skillbench/skillbench.toml (optional)
    /// 3. `--config` file, or ./skillbench.toml (optional)
    /// 4. Environment variables with SKILLBENCH__ prefix
    /// 5. OPENROUTER_API_KEY and SKILLBENCH_SKILLS_REPO (highest priority)
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        // Load .env file from current directory
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml));

        if let Some(global) = Self::global_config_path() {
            builder = builder.add_source(config::File::from(global).required(false));
        }

        builder = match explicit {
            Some(path) => builder.add_source(config::File::from(path.to_path_buf()).required(true)),
            None => builder.add_source(config::File::with_name("skillbench").required(false)),
        };

        builder = builder.add_source(
            config::Environment::with_prefix("SKILLBENCH")
                .separator("__")
                .try_parsing(true),
        );

        if let Ok(key) = env::var("OPENROUTER_API_KEY") {
            builder = builder
                .set_override("provider.api_key", key)
                .map_err(|e| ConfigError::Load(e.to_string()))?;
        }

        if let Ok(repo) = env::var("SKILLBENCH_SKILLS_REPO") {
            builder = builder
                .set_override("skills.repo", repo)
                .map_err(|e| ConfigError::Load(e.to_string()))?;
        }

        let config: Self = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ConfigError::Load(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.eval.max_concurrency == 0 {
            return Err(ConfigError::Invalid {
                key: "eval.max_concurrency".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.eval.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "eval.request_timeout_secs".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=2.0).contains(&self.eval.temperature) {
            return Err(ConfigError::Invalid {
                key: "eval.temperature".to_string(),
                reason: format!("{} is outside 0.0..=2.0", self.eval.temperature),
            });
        }
        if self.skills.line_limit == 0 {
            return Err(ConfigError::Invalid {
                key: "skills.line_limit".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// The API key, required only by commands that call the model
    pub fn api_key(&self) -> Result<&str, ConfigError> {
        let key = self.provider.api_key.trim();
        if key.is_empty() {
            return Err(ConfigError::MissingSetting {
                key: "provider.api_key".to_string(),
                hint: "set OPENROUTER_API_KEY or SKILLBENCH__PROVIDER__API_KEY".to_string(),
            });
        }
        Ok(key)
    }

    /// Alias to model id; unknown names pass through unchanged
    pub fn resolve_model(&self, name: &str) -> String {
        self.models
            .aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    pub fn skills_repo(&self, cli_override: Option<&Path>) -> PathBuf {
        match cli_override {
            Some(path) => path.to_path_buf(),
            None => expand_tilde(&self.skills.repo),
        }
    }

    /// README holding the compressed routing index, if configured or present
    pub fn readme_path(&self, repo: &Path) -> PathBuf {
        if self.skills.readme.trim().is_empty() {
            repo.join("README.md")
        } else {
            expand_tilde(&self.skills.readme)
        }
    }

    pub fn system_prompt(&self) -> Option<&str> {
        Some(self.prompt.system.trim()).filter(|s| !s.is_empty())
    }
}

/// Expand a leading `~` to the home directory
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn defaults() -> Config {
        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults_parse_and_validate() {
        let config = defaults();
        config.validate().unwrap();
        assert_eq!(config.eval, EvalSettings::default());
        assert_eq!(config.detection, DetectionConfig::default());
        assert_eq!(config.models.judge, "sonnet");
        assert_eq!(config.skills.line_limit, 500);
        assert!(config.system_prompt().is_none());
    }

    #[test]
    fn test_model_aliases() {
        let config = defaults();
        assert_eq!(config.resolve_model("haiku"), "anthropic/claude-haiku-4-5");
        assert_eq!(config.resolve_model("opus"), "anthropic/claude-opus-4.6");
        assert_eq!(config.resolve_model("openai/gpt-4o"), "openai/gpt-4o");
    }

    #[test]
    fn test_missing_api_key() {
        let mut config = defaults();
        config.provider.api_key = "  ".to_string();
        assert!(matches!(
            config.api_key().unwrap_err(),
            ConfigError::MissingSetting { .. }
        ));
        config.provider.api_key = "sk-or-test".to_string();
        assert_eq!(config.api_key().unwrap(), "sk-or-test");
    }

    #[test]
    fn test_invalid_concurrency_rejected() {
        let mut config = defaults();
        config.eval.max_concurrency = 0;
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigError::Invalid { .. }
        ));
    }

    #[test]
    fn test_explicit_file_overrides_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("custom.toml");
        fs::write(
            &path,
            "[eval]\nmax_concurrency = 9\n\n[models.aliases]\nhaiku = \"custom/haiku\"\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.eval.max_concurrency, 9);
        assert_eq!(config.eval.max_tool_rounds, 3);
        assert_eq!(config.resolve_model("haiku"), "custom/haiku");
        assert_eq!(config.resolve_model("sonnet"), "anthropic/claude-sonnet-4-5");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            Config::load(Some(&tmp.path().join("nope.toml"))).unwrap_err(),
            ConfigError::Load(_)
        ));
    }

    #[test]
    fn test_expand_tilde() {
        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~/skills"), home.join("skills"));
        }
    }

    #[test]
    fn test_readme_path_defaults_to_repo() {
        let config = defaults();
        assert_eq!(
            config.readme_path(Path::new("/repo")),
            PathBuf::from("/repo/README.md")
        );
    }
}
