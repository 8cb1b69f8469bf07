//! Shape the conversation for each discovery mechanism
//!
//! All mechanisms share one neutral system message. `tool` exposes the
//! catalog only through the guide tool's description; `compressed` and
//! `fat` append an index of the catalog to the system message.

use regex::Regex;
use serde_json::json;
use skillbench_skills::Catalog;
use skillbench_types::{ChatMessage, Mechanism, Tool, ToolCall};
use std::path::Path;
use tracing::{debug, warn};

/// Name of the lookup tool offered under the `tool` mechanism
pub const GUIDE_TOOL_NAME: &str = "read_guide";

/// Default persona shared by every mechanism
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a software development assistant. You help \
developers write high-quality code with working examples and clear explanations. Prefer modern, \
idiomatic practices for the language and framework in use.";

/// Header placed before an index in the system message
pub const INDEX_HEADER: &str = "The following development resources are available in this workspace:";

/// Words kept from a description for a compressed index cue
const CUE_WORDS: usize = 12;

/// Messages and tools for one request
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltPrompt {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<Tool>,
}

/// Builds prompts for every mechanism from one catalog
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    system_prompt: String,
    /// Verbatim routing index; generated from descriptions when absent
    compressed_index: Option<String>,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_PROMPT)
    }
}

impl PromptBuilder {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            compressed_index: None,
        }
    }

    pub fn with_compressed_index(mut self, index: Option<String>) -> Self {
        self.compressed_index = index.filter(|i| !i.trim().is_empty());
        self
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Build the request for one user prompt
    pub fn build(&self, mechanism: Mechanism, catalog: &Catalog, user_prompt: &str) -> BuiltPrompt {
        let (system, tools) = match mechanism {
            Mechanism::Tool => (self.system_prompt.clone(), vec![guide_tool(catalog)]),
            Mechanism::Compressed => (
                format!(
                    "{}\n\n{}\n\n{}",
                    self.system_prompt,
                    INDEX_HEADER,
                    self.compressed_index(catalog)
                ),
                Vec::new(),
            ),
            Mechanism::Fat => (
                format!("{}\n\n{}\n\n{}", self.system_prompt, INDEX_HEADER, fat_index(catalog)),
                Vec::new(),
            ),
        };

        BuiltPrompt {
            messages: vec![ChatMessage::system(system), ChatMessage::user(user_prompt)],
            tools,
        }
    }

    /// The terse routing index used by the `compressed` mechanism
    pub fn compressed_index(&self, catalog: &Catalog) -> String {
        match &self.compressed_index {
            Some(index) => index.clone(),
            None => catalog
                .iter()
                .map(|s| format!("{}: {}", s.name, routing_cue(&s.description, CUE_WORDS)))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// The lookup tool, listing every catalog entry in its description
pub fn guide_tool(catalog: &Catalog) -> Tool {
    let listing = catalog
        .iter()
        .map(|s| format!("  - {}: {}", s.name, s.description))
        .collect::<Vec<_>>()
        .join("\n");

    Tool::function(
        GUIDE_TOOL_NAME,
        &format!(
            "Look up a development guide by exact name to get detailed guidance and code \
             patterns.\n\nAvailable guides:\n{}",
            listing
        ),
        json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "The exact guide name to look up."
                }
            },
            "required": ["name"]
        }),
    )
}

/// Full name + description listing used by the `fat` mechanism
pub fn fat_index(catalog: &Catalog) -> String {
    catalog
        .iter()
        .map(|s| format!("- **{}**: {}", s.name, s.description))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Answer a guide tool call with the guide body, or list valid names
pub fn guide_tool_reply(catalog: &Catalog, call: &ToolCall) -> String {
    if call.function.name != GUIDE_TOOL_NAME {
        return format!("Unknown tool: {}", call.function.name);
    }

    let requested = call
        .parse_args::<serde_json::Value>()
        .ok()
        .and_then(|v| v.get("name").and_then(|n| n.as_str()).map(str::to_string))
        .unwrap_or_default();

    match catalog.get_ignore_case(requested.trim()) {
        Some(skill) => skill.content.clone(),
        None => {
            debug!("Model requested unknown guide '{}'", requested);
            format!(
                "Unknown guide: {}. Available: {}",
                requested,
                catalog.names().collect::<Vec<_>>().join(", ")
            )
        }
    }
}

/// First sentence of a description, clipped to `max_words` words
pub fn routing_cue(description: &str, max_words: usize) -> String {
    let flat = description.split_whitespace().collect::<Vec<_>>().join(" ");
    let sentence = match flat.find(". ") {
        Some(end) => &flat[..end],
        None => flat.trim_end_matches('.'),
    };

    let words: Vec<&str> = sentence.split_whitespace().collect();
    if words.len() <= max_words {
        words.join(" ")
    } else {
        words[..max_words].join(" ")
    }
}

/// Pull the routing index out of a README's marker comments, dropping code
/// fence lines
pub fn extract_compressed_index(readme: &str) -> Option<String> {
    let re = Regex::new(
        r"<!--\s*BEGIN[^>]*COMPRESSED INDEX\s*-->([\s\S]*?)<!--\s*END[^>]*COMPRESSED INDEX\s*-->",
    )
    .ok()?;

    let block = re.captures(readme)?.get(1)?.as_str().trim();
    let cleaned = block
        .lines()
        .filter(|l| !l.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n");

    let cleaned = cleaned.trim().to_string();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Read a README and extract its routing index; missing files yield `None`
pub fn load_compressed_index(readme_path: &Path) -> Option<String> {
    let text = match std::fs::read_to_string(readme_path) {
        Ok(text) => text,
        Err(e) => {
            debug!("No compressed index at {:?}: {}", readme_path, e);
            return None;
        }
    };

    let index = extract_compressed_index(&text);
    if index.is_none() {
        warn!("{:?} has no compressed index markers; generating one", readme_path);
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use skillbench_skills::Skill;
    use std::path::PathBuf;

    fn catalog() -> Catalog {
        let skill = |name: &str, description: &str| {
            Skill::parse(
                &format!(
                    "---\nname: {}\ndescription: {}\n---\n\n# {}\n\nBody of {}.\n",
                    name, description, name, name
                ),
                name.to_string(),
                PathBuf::from(name),
            )
            .unwrap()
        };
        Catalog::from_skills(vec![
            skill(
                "efcore-patterns",
                "Entity Framework Core patterns for data access. Use when writing queries.",
            ),
            skill(
                "akka-net-best-practices",
                "Actor design rules for Akka.NET clusters and supervision hierarchies across many nodes and services.",
            ),
        ])
    }

    fn system_text(prompt: &BuiltPrompt) -> String {
        prompt.messages[0].content.clone().unwrap_or_default()
    }

    #[test]
    fn test_system_message_is_neutral() {
        let catalog = catalog();
        let builder = PromptBuilder::default();
        for mechanism in Mechanism::ALL {
            let prompt = builder.build(mechanism, &catalog, "How do I batch inserts?");
            let system = system_text(&prompt).to_lowercase();
            for word in ["skill", "test", "evaluation"] {
                assert!(!system.contains(word), "{} prompt mentions '{}'", mechanism, word);
            }
            assert_eq!(prompt.messages[1].content.as_deref(), Some("How do I batch inserts?"));
        }
    }

    #[test]
    fn test_tool_mechanism_has_only_the_tool() {
        let prompt = PromptBuilder::default().build(Mechanism::Tool, &catalog(), "q");
        assert_eq!(prompt.tools.len(), 1);
        assert_eq!(prompt.tools[0].function.name, GUIDE_TOOL_NAME);
        assert!(prompt.tools[0]
            .function
            .description
            .contains("efcore-patterns: Entity Framework Core"));
        assert!(!system_text(&prompt).contains("efcore-patterns"));
    }

    #[test]
    fn test_fat_index_lists_full_descriptions() {
        let prompt = PromptBuilder::default().build(Mechanism::Fat, &catalog(), "q");
        assert!(prompt.tools.is_empty());
        let system = system_text(&prompt);
        assert!(system.contains(INDEX_HEADER));
        assert!(system.contains(
            "- **efcore-patterns**: Entity Framework Core patterns for data access. Use when writing queries."
        ));
    }

    #[test]
    fn test_compressed_index_uses_clipped_cues() {
        let builder = PromptBuilder::default();
        let index = builder.compressed_index(&catalog());
        assert!(index.contains("efcore-patterns: Entity Framework Core patterns for data access"));
        assert!(!index.contains("Use when writing queries"));
        let akka = index.lines().find(|l| l.starts_with("akka")).unwrap();
        assert_eq!(akka.split_whitespace().count(), 1 + CUE_WORDS);
    }

    #[test]
    fn test_readme_markers_override_generated_index() {
        let readme = "# Repo\n\n<!-- BEGIN DOTNET-SKILLS COMPRESSED INDEX -->\n```markdown\n[data]|efcore-patterns\n```\n<!-- END DOTNET-SKILLS COMPRESSED INDEX -->\n";
        let index = extract_compressed_index(readme).unwrap();
        assert_eq!(index, "[data]|efcore-patterns");

        let builder = PromptBuilder::default().with_compressed_index(Some(index));
        let prompt = builder.build(Mechanism::Compressed, &catalog(), "q");
        assert!(system_text(&prompt).ends_with("[data]|efcore-patterns"));
    }

    #[test]
    fn test_extract_without_markers() {
        assert!(extract_compressed_index("# Just a readme").is_none());
    }

    #[test]
    fn test_guide_tool_reply() {
        let catalog = catalog();
        let hit = ToolCall::new("1", GUIDE_TOOL_NAME, r#"{"name":"EFCORE-patterns"}"#);
        assert!(guide_tool_reply(&catalog, &hit).contains("Body of efcore-patterns."));

        let miss = ToolCall::new("2", GUIDE_TOOL_NAME, r#"{"name":"nope"}"#);
        let reply = guide_tool_reply(&catalog, &miss);
        assert!(reply.starts_with("Unknown guide: nope."));
        assert!(reply.contains("akka-net-best-practices, efcore-patterns"));
    }

    #[test]
    fn test_routing_cue() {
        assert_eq!(routing_cue("Short one. Second sentence.", 12), "Short one");
        assert_eq!(routing_cue("No period here", 12), "No period here");
        assert_eq!(routing_cue("a b c d e", 3), "a b c");
    }
}
