//! SkillBench Skills
//!
//! Loads a repository of documentation skills (one directory per skill,
//! each with a `SKILL.md` carrying YAML frontmatter) into a [`Catalog`],
//! and manages alternative authorings of a skill ([`SkillVariant`]).
//!
//! Skills are never executed. Only their name, description and markdown
//! body are used, to build prompts and to inject guidance into answers.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod catalog;
pub mod skill;
#[allow(missing_docs)]
pub mod variant;

pub use catalog::{Catalog, PLUGIN_MANIFEST};
pub use skill::{Skill, DEFAULT_MAX_LINES, SKILL_FILE};
pub use variant::{all_variants, load_variant, scaffold_variants, SkillVariant, VariantStrategy};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{Catalog, Skill, SkillVariant, VariantStrategy};
}
