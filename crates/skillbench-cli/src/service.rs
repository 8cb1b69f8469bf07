use crate::config::{expand_tilde, Config};
use anyhow::{anyhow, bail, Context, Result};
use chrono::Local;
use skillbench_eval::{
    load_activation_cases, load_compressed_index, load_effectiveness_cases, prepare_cases,
    ActivationRunner, EffectivenessRun, EffectivenessRunner, EvalSettings, Guidance, Loaded,
    PromptBuilder, RubricStore,
};
use skillbench_provider::{ChatClient, ChatClientConfig, ModelClient};
use skillbench_report::{
    auto_output_path, render_activation, render_effectiveness, size_comparison_table,
    skills_table, variant_comparison_table, write_result_file, ActivationExport,
    EffectivenessExport, EvalType, ResultFile, SizeImpactExport, VariantsExport,
};
use skillbench_skills::{all_variants, scaffold_variants, Catalog};
use skillbench_types::{EffectivenessTestCase, Mechanism};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Flags shared by every evaluation command
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub skills_repo: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub max_concurrency: Option<usize>,
}

/// Subject and judge model names as typed by the user
#[derive(Debug, Clone, Default)]
pub struct JudgedOptions {
    pub model: Option<String>,
    pub judge_model: Option<String>,
    pub seed: Option<u64>,
}

/// Evaluation service - runs one command end to end
pub struct EvalService {
    config: Config,
}

impl EvalService {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    fn settings(&self, options: &RunOptions) -> EvalSettings {
        let mut settings = self.config.eval.clone();
        if let Some(limit) = options.max_concurrency {
            settings.max_concurrency = limit.max(1);
        }
        settings
    }

    fn client(&self) -> Result<Arc<dyn ModelClient>> {
        let config = ChatClientConfig::new(self.config.api_key()?)
            .with_base_url(&self.config.provider.base_url)
            .with_timeout_secs(self.config.provider.timeout_secs);
        Ok(Arc::new(ChatClient::new(config)?))
    }

    fn catalog(&self, repo_override: Option<&Path>) -> Result<(PathBuf, Catalog)> {
        let repo = self.config.skills_repo(repo_override);
        let catalog = Catalog::from_repo(&repo)
            .with_context(|| format!("Failed to load skills from {}", repo.display()))?;
        if catalog.is_empty() {
            bail!("No skills found in {}", repo.display());
        }
        for issue in catalog.issues() {
            warn!("Catalog issue: {}", issue);
        }
        info!("Catalog loaded: {} skills from {}", catalog.len(), repo.display());
        Ok((repo, catalog))
    }

    fn output_path(
        &self,
        options: &RunOptions,
        eval_type: EvalType,
        model: &str,
        extras: &[(&str, String)],
    ) -> PathBuf {
        match &options.output {
            Some(path) => path.clone(),
            None => auto_output_path(
                &expand_tilde(&self.config.paths.results_dir),
                eval_type,
                model,
                extras,
                Local::now(),
            ),
        }
    }

    fn judged_models(&self, judged: &JudgedOptions) -> (String, String) {
        let model = judged
            .model
            .clone()
            .unwrap_or_else(|| self.config.models.effectiveness.clone());
        let judge = judged
            .judge_model
            .clone()
            .unwrap_or_else(|| self.config.models.judge.clone());
        (model, judge)
    }

    fn effectiveness_runner(
        &self,
        judged: &JudgedOptions,
        options: &RunOptions,
    ) -> Result<EffectivenessRunner> {
        let (model, judge) = self.judged_models(judged);
        let seed = judged.seed.unwrap_or_else(rand::random);
        info!("Presentation seed: {}", seed);
        Ok(EffectivenessRunner::new(
            self.client()?,
            self.settings(options),
            self.config.resolve_model(&model),
            self.config.resolve_model(&judge),
            seed,
        ))
    }

    async fn run_guided(
        &self,
        runner: &EffectivenessRunner,
        loaded: &Loaded<EffectivenessTestCase>,
        catalog: &Catalog,
        guidance: &Guidance,
    ) -> Result<EffectivenessRun> {
        let mut rubrics = RubricStore::new(expand_tilde(&self.config.paths.rubrics_dir));
        let (prepared, dropped) = prepare_cases(&loaded.cases, catalog, &mut rubrics, guidance);
        if prepared.is_empty() {
            bail!(
                "No runnable effectiveness cases: {} skipped while resolving skills and rubrics",
                dropped.len()
            );
        }
        Ok(runner
            .run(prepared, loaded.skipped_count() + dropped.len())
            .await)
    }

    pub async fn eval_activation(
        &self,
        dataset: &Path,
        model: Option<&str>,
        mechanisms: &[Mechanism],
        options: &RunOptions,
    ) -> Result<()> {
        let model = model.unwrap_or(&self.config.models.activation).to_string();
        let mechanisms: Vec<Mechanism> = if mechanisms.is_empty() {
            Mechanism::ALL.to_vec()
        } else {
            mechanisms.to_vec()
        };

        let (repo, catalog) = self.catalog(options.skills_repo.as_deref())?;
        let loaded = load_activation_cases(dataset, &catalog)?;

        let system = self
            .config
            .system_prompt()
            .map(str::to_string)
            .unwrap_or_else(|| PromptBuilder::default().system_prompt().to_string());
        let prompts = PromptBuilder::new(system)
            .with_compressed_index(load_compressed_index(&self.config.readme_path(&repo)));

        let runner = ActivationRunner::new(
            self.client()?,
            Arc::new(catalog),
            prompts,
            self.config.detection.clone(),
            self.settings(options),
            self.config.resolve_model(&model),
        );

        info!(
            "Running activation eval (model={}, mechanisms={:?}, dataset={})",
            model,
            mechanisms,
            dataset.display()
        );

        let mut runs = Vec::with_capacity(mechanisms.len());
        for mechanism in &mechanisms {
            runs.push(
                runner
                    .run(&loaded.cases, *mechanism, loaded.skipped_count())
                    .await,
            );
        }

        println!("{}", render_activation(&runs));

        let joined = mechanisms
            .iter()
            .map(Mechanism::as_str)
            .collect::<Vec<_>>()
            .join("+");
        let path = self.output_path(
            options,
            EvalType::Activation,
            &model,
            &[("mechanisms", joined)],
        );
        let file = ResultFile::new(EvalType::Activation, runner.model(), ActivationExport::new(&runs));
        write_result_file(&path, &file)?;
        println!("Results exported to {}", path.display());
        Ok(())
    }

    pub async fn eval_effectiveness(
        &self,
        dataset: &Path,
        skill: Option<&str>,
        judged: &JudgedOptions,
        options: &RunOptions,
    ) -> Result<()> {
        let (_, catalog) = self.catalog(options.skills_repo.as_deref())?;
        let loaded = load_effectiveness_cases(dataset, skill)?;
        let runner = self.effectiveness_runner(judged, options)?;

        let run = self.run_guided(&runner, &loaded, &catalog, &Guidance::Full).await?;
        println!("{}", render_effectiveness(&run));

        let (model, _) = self.judged_models(judged);
        let path = self.output_path(
            options,
            EvalType::Effectiveness,
            &model,
            &[("skill", skill.unwrap_or("all").to_string())],
        );
        let file = ResultFile::new(EvalType::Effectiveness, &run.model, EffectivenessExport::new(&run));
        write_result_file(&path, &file)?;
        println!("Results exported to {}", path.display());
        Ok(())
    }

    pub async fn eval_size(
        &self,
        dataset: &Path,
        skill_name: &str,
        max_lines: Option<usize>,
        judged: &JudgedOptions,
        options: &RunOptions,
    ) -> Result<()> {
        let max_lines = max_lines.unwrap_or(self.config.skills.line_limit);
        let (_, catalog) = self.catalog(options.skills_repo.as_deref())?;
        let skill = catalog
            .get_ignore_case(skill_name)
            .ok_or_else(|| anyhow!("Unknown skill '{}'", skill_name))?;
        if !skill.is_oversized(max_lines) {
            warn!(
                "{} has {} lines; truncating to {} changes nothing",
                skill.name, skill.line_count, max_lines
            );
        }

        let loaded = load_effectiveness_cases(dataset, Some(&skill.name))?;
        let runner = self.effectiveness_runner(judged, options)?;

        info!("Size impact for {}: full content", skill.name);
        let full = self.run_guided(&runner, &loaded, &catalog, &Guidance::Full).await?;
        println!("--- Full Content ---\n{}", render_effectiveness(&full));

        info!("Size impact for {}: first {} lines", skill.name, max_lines);
        let truncated = self
            .run_guided(&runner, &loaded, &catalog, &Guidance::Truncated(max_lines))
            .await?;
        println!(
            "--- Truncated to {} lines ---\n{}",
            max_lines,
            render_effectiveness(&truncated)
        );

        println!(
            "{}",
            size_comparison_table(&full.summary(), &truncated.summary(), max_lines)
        );

        let (model, _) = self.judged_models(judged);
        let path = self.output_path(
            options,
            EvalType::SizeImpact,
            &model,
            &[("skill", skill.name.clone()), ("lines", max_lines.to_string())],
        );
        let export = SizeImpactExport {
            skill: &skill.name,
            max_lines,
            full: EffectivenessExport::new(&full),
            truncated: EffectivenessExport::new(&truncated),
        };
        write_result_file(&path, &ResultFile::new(EvalType::SizeImpact, &full.model, export))?;
        println!("Results exported to {}", path.display());
        Ok(())
    }

    pub async fn eval_variants(
        &self,
        dataset: &Path,
        skill_name: &str,
        variants_dir: Option<&Path>,
        judged: &JudgedOptions,
        options: &RunOptions,
    ) -> Result<()> {
        let variants_dir = variants_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(|| expand_tilde(&self.config.paths.variants_dir));
        let (_, catalog) = self.catalog(options.skills_repo.as_deref())?;
        let skill = catalog
            .get_ignore_case(skill_name)
            .ok_or_else(|| anyhow!("Unknown skill '{}'", skill_name))?;

        let variants = all_variants(skill, &variants_dir)?;
        if variants.len() == 1 {
            warn!(
                "No authored variants for {} under {}; run scaffold-variants first",
                skill.name,
                variants_dir.display()
            );
        }

        let loaded = load_effectiveness_cases(dataset, Some(&skill.name))?;
        let runner = self.effectiveness_runner(judged, options)?;

        let mut runs = BTreeMap::new();
        for (strategy, variant) in &variants {
            info!(
                "Variant {} of {}: {} lines, {} reference files",
                strategy,
                skill.name,
                variant.line_count(),
                variant.reference_files.len()
            );
            let guidance = Guidance::Fixed(variant.full_context());
            let run = self.run_guided(&runner, &loaded, &catalog, &guidance).await?;
            println!("--- Strategy: {} ---\n{}", strategy, render_effectiveness(&run));
            runs.insert(*strategy, run);
        }

        let summaries: Vec<_> = runs
            .iter()
            .map(|(strategy, run)| (*strategy, run.summary()))
            .collect();
        println!("{}", variant_comparison_table(&summaries));

        let (model, _) = self.judged_models(judged);
        let path = self.output_path(
            options,
            EvalType::Variants,
            &model,
            &[("skill", skill.name.clone())],
        );
        let export = VariantsExport {
            skill: &skill.name,
            strategies: runs
                .iter()
                .map(|(strategy, run)| (*strategy, EffectivenessExport::new(run)))
                .collect(),
        };
        let resolved = self.config.resolve_model(&model);
        write_result_file(&path, &ResultFile::new(EvalType::Variants, resolved, export))?;
        println!("Results exported to {}", path.display());
        Ok(())
    }

    pub fn list_skills(&self, repo_override: Option<&Path>) -> Result<()> {
        let (_, catalog) = self.catalog(repo_override)?;
        println!("{}", skills_table(&catalog, self.config.skills.line_limit));

        let oversized = catalog.oversized(self.config.skills.line_limit);
        println!(
            "{} of {} skills exceed {} lines; {:.1}KB total",
            oversized.len(),
            catalog.len(),
            self.config.skills.line_limit,
            catalog.total_bytes() as f64 / 1024.0
        );
        Ok(())
    }

    pub fn scaffold_variants(
        &self,
        skills: &[String],
        prefix: Option<&str>,
        variants_dir: Option<&Path>,
        repo_override: Option<&Path>,
    ) -> Result<()> {
        let variants_dir = variants_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(|| expand_tilde(&self.config.paths.variants_dir));

        let names: Vec<String> = if skills.is_empty() {
            let (_, catalog) = self.catalog(repo_override)?;
            match prefix {
                Some(prefix) => catalog
                    .filter_by_prefix(prefix)
                    .into_iter()
                    .map(|s| s.name.clone())
                    .collect(),
                None => catalog.names().map(str::to_string).collect(),
            }
        } else {
            skills.to_vec()
        };

        if names.is_empty() {
            bail!("No skills selected for scaffolding");
        }

        let created = scaffold_variants(&variants_dir, &names)?;
        println!(
            "Scaffolded variant directories for {} skills in {} ({} new files)",
            names.len(),
            variants_dir.display(),
            created.len()
        );
        for path in &created {
            println!("  - {}", path.display());
        }
        Ok(())
    }
}
