//! `skillbench`: measure how well a model discovers and benefits from a
//! catalog of SKILL.md guides.

mod config;
mod service;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use skillbench_logging::{init_logging_with_format, LogFormat};
use skillbench_types::Mechanism;
use std::path::PathBuf;
use tracing::info;

use crate::config::Config;
use crate::service::{EvalService, JudgedOptions, RunOptions};

#[derive(Parser, Debug)]
#[command(author, version, about = "Skill activation and effectiveness evaluation harness")]
struct Cli {
    /// Config file layered over ~/.skillbench/skillbench.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG wins when set
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone)]
struct RunArgs {
    /// Skills repository: plugin manifest, skills/ directory or a bare skills root
    #[arg(long)]
    skills_repo: Option<PathBuf>,

    /// Result file path (default: <results_dir>/<eval_type>/<timestamp>_<model>...json)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Cases in flight at once
    #[arg(long)]
    max_concurrency: Option<usize>,
}

impl From<RunArgs> for RunOptions {
    fn from(args: RunArgs) -> Self {
        Self {
            skills_repo: args.skills_repo,
            output: args.output,
            max_concurrency: args.max_concurrency,
        }
    }
}

#[derive(Args, Debug, Clone)]
struct JudgeArgs {
    /// Model that writes both answers (alias or model id)
    #[arg(long)]
    model: Option<String>,

    /// Model that scores the answers (alias or model id)
    #[arg(long)]
    judge_model: Option<String>,

    /// Seed for the per-case A/B presentation order
    #[arg(long)]
    seed: Option<u64>,
}

impl From<JudgeArgs> for JudgedOptions {
    fn from(args: JudgeArgs) -> Self {
        Self {
            model: args.model,
            judge_model: args.judge_model,
            seed: args.seed,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Does the model reach for the right skill under each discovery mechanism?
    EvalActivation {
        /// JSONL activation dataset
        #[arg(long)]
        dataset: PathBuf,
        /// Model under test (alias or model id)
        #[arg(long)]
        model: Option<String>,
        /// Mechanism(s) to test; all three when omitted
        #[arg(long = "mechanism")]
        mechanisms: Vec<Mechanism>,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Does injecting a skill improve the judged answer?
    EvalEffectiveness {
        /// JSONL effectiveness dataset
        #[arg(long)]
        dataset: PathBuf,
        /// Only run cases for this skill
        #[arg(long)]
        skill: Option<String>,
        #[command(flatten)]
        judge: JudgeArgs,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Compare full skill content against content truncated to --max-lines
    EvalSize {
        #[arg(long)]
        dataset: PathBuf,
        #[arg(long)]
        skill: String,
        /// Lines kept in the truncated run (default: skills.line_limit)
        #[arg(long)]
        max_lines: Option<usize>,
        #[command(flatten)]
        judge: JudgeArgs,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Compare original, condensed and progressive authorings of one skill
    EvalVariants {
        #[arg(long)]
        dataset: PathBuf,
        #[arg(long)]
        skill: String,
        #[arg(long)]
        variants_dir: Option<PathBuf>,
        #[command(flatten)]
        judge: JudgeArgs,
        #[command(flatten)]
        run: RunArgs,
    },
    /// List the catalog with line counts and sizes
    ListSkills {
        #[arg(long)]
        skills_repo: Option<PathBuf>,
    },
    /// Create placeholder variant files for authoring
    ScaffoldVariants {
        /// Skill(s) to scaffold; every catalog skill when omitted
        #[arg(long = "skill")]
        skills: Vec<String>,
        /// With no --skill, only skills whose name starts with this
        #[arg(long)]
        prefix: Option<String>,
        #[arg(long)]
        variants_dir: Option<PathBuf>,
        #[arg(long)]
        skills_repo: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_deref())?;

    let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    init_logging_with_format(level, LogFormat::parse(&config.logging.format))?;
    info!("Starting skillbench {}", env!("CARGO_PKG_VERSION"));

    let service = EvalService::new(config);
    match cli.command {
        Command::EvalActivation {
            dataset,
            model,
            mechanisms,
            run,
        } => {
            service
                .eval_activation(&dataset, model.as_deref(), &mechanisms, &run.into())
                .await
        }
        Command::EvalEffectiveness {
            dataset,
            skill,
            judge,
            run,
        } => {
            service
                .eval_effectiveness(&dataset, skill.as_deref(), &judge.into(), &run.into())
                .await
        }
        Command::EvalSize {
            dataset,
            skill,
            max_lines,
            judge,
            run,
        } => {
            service
                .eval_size(&dataset, &skill, max_lines, &judge.into(), &run.into())
                .await
        }
        Command::EvalVariants {
            dataset,
            skill,
            variants_dir,
            judge,
            run,
        } => {
            service
                .eval_variants(
                    &dataset,
                    &skill,
                    variants_dir.as_deref(),
                    &judge.into(),
                    &run.into(),
                )
                .await
        }
        Command::ListSkills { skills_repo } => service.list_skills(skills_repo.as_deref()),
        Command::ScaffoldVariants {
            skills,
            prefix,
            variants_dir,
            skills_repo,
        } => service.scaffold_variants(
            &skills,
            prefix.as_deref(),
            variants_dir.as_deref(),
            skills_repo.as_deref(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_repeated_mechanisms() {
        let cli = Cli::parse_from([
            "skillbench",
            "eval-activation",
            "--dataset",
            "cases.jsonl",
            "--mechanism",
            "tool",
            "--mechanism",
            "FAT",
            "--log-level",
            "debug",
        ]);
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Command::EvalActivation { mechanisms, .. } => {
                assert_eq!(mechanisms, vec![Mechanism::Tool, Mechanism::Fat]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_unknown_mechanism_is_rejected() {
        let parsed = Cli::try_parse_from([
            "skillbench",
            "eval-activation",
            "--dataset",
            "cases.jsonl",
            "--mechanism",
            "telepathy",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_judged_flags() {
        let cli = Cli::parse_from([
            "skillbench",
            "eval-size",
            "--dataset",
            "eff.jsonl",
            "--skill",
            "efcore-patterns",
            "--max-lines",
            "200",
            "--judge-model",
            "opus",
            "--seed",
            "42",
        ]);
        match cli.command {
            Command::EvalSize {
                skill,
                max_lines,
                judge,
                ..
            } => {
                assert_eq!(skill, "efcore-patterns");
                assert_eq!(max_lines, Some(200));
                assert_eq!(judge.judge_model.as_deref(), Some("opus"));
                assert_eq!(judge.seed, Some(42));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
