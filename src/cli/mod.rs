use anyhow::{Context, Result};
use std::path::PathBuf;

mod progress;

use progress::ProgressIndicator;
use stitch::clients::OpenAiGenerator;
use stitch::contexts::{
    normalize, scan as scan_tree, GenerationRunner, Pipeline, PipelineError, PromptInput,
    TodoExtractor,
};
use stitch::data::{read_prompt_file, ContextMode, PipelineConfig, Strictness};
use stitch::registries::FilePromptRegistry;
use stitch::run_report::RunReport;

#[derive(Clone, Copy)]
pub struct Config {
    pub verbose: bool,
    pub dry_run: bool,
}

/// Command-line overrides layered over the loaded configuration file
#[derive(Debug, Default)]
pub struct GenerateOptions {
    pub config_file: Option<PathBuf>,
    pub mode: Option<ContextMode>,
    pub project_root: Option<PathBuf>,
    pub base_path: Option<PathBuf>,
    pub required_root: Option<String>,
    pub prompt_file: Option<PathBuf>,
    pub strictness: Option<Strictness>,
    pub model: Option<String>,
    pub env_file: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    pub report: Option<PathBuf>,
}

impl GenerateOptions {
    fn load_config(&self) -> Result<PipelineConfig> {
        let mut config = PipelineConfig::load_or_default(self.config_file.as_deref())?;

        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(root) = &self.project_root {
            config.project_root = root.clone();
        }
        if let Some(base) = &self.base_path {
            config.base_path = base.clone();
        }
        if let Some(required) = &self.required_root {
            config.required_root = Some(required.clone());
        }
        if let Some(prompt) = &self.prompt_file {
            config.prompt_file = Some(prompt.clone());
        }
        if let Some(strictness) = self.strictness {
            config.strictness = strictness;
        }
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(env_file) = &self.env_file {
            config.env_file = Some(env_file.clone());
        }
        if let Some(secs) = self.timeout_secs {
            config.timeout_secs = secs;
        }

        Ok(config)
    }
}

pub async fn scan(
    root: PathBuf,
    extensions: Vec<String>,
    max_files: usize,
    config: &Config,
) -> Result<()> {
    let extensions = if extensions.is_empty() {
        PipelineConfig::default().extensions
    } else {
        extensions
    };

    if config.verbose {
        eprintln!(
            "Scanning {} for {} (at most {} file(s))",
            root.display(),
            extensions.join(", "),
            max_files
        );
    }

    print!("{}", scan_tree(&root, &extensions, max_files));
    Ok(())
}

pub async fn todos(root: PathBuf, marker: String, skip: Vec<String>, config: &Config) -> Result<()> {
    // same keys as `generate --mode todos` sends
    let root = PipelineConfig {
        project_root: root,
        ..Default::default()
    }
    .absolute_project_root();
    let todos = TodoExtractor::new(marker.clone()).skip_files(skip).find(&root);

    if todos.is_empty() {
        println!("No files containing '{}' found", marker);
        return Ok(());
    }

    if config.verbose {
        for path in todos.keys() {
            eprintln!("Found marker in {}", path);
        }
    }

    let cleaned = todos.map_contents(normalize);
    let json = serde_json::to_string_pretty(&cleaned).context("Failed to serialize todo map")?;
    println!("{}", json);
    Ok(())
}

pub async fn generate(options: GenerateOptions, config: &Config) -> Result<()> {
    let pipeline_config = options.load_config()?;

    let prompt = match &pipeline_config.prompt_file {
        Some(path) => Some(read_prompt_file(path)?),
        None => None,
    };

    let generator = OpenAiGenerator::from_env(
        pipeline_config.env_file.as_deref(),
        &pipeline_config.api_base,
    )?;
    let registry = FilePromptRegistry::new(Some(pipeline_config.prompts_dir.clone()));
    let pipeline = Pipeline::new(&pipeline_config, &generator, &registry).dry_run(config.dry_run);

    let mut run_report = RunReport::start(&pipeline_config, config.dry_run);

    let plan = pipeline.plan(prompt.as_deref())?;
    if pipeline_config.mode == ContextMode::Todos && plan.todos.is_empty() {
        println!("No files containing '{}' found", pipeline_config.marker);
        return Ok(());
    }

    if config.verbose {
        println!(
            "Generating in {} mode with {} ({} extraction)",
            pipeline_config.mode, pipeline_config.model, pipeline_config.strictness
        );
        if !plan.todos.is_empty() {
            println!(
                "Sending {} file(s) containing '{}':",
                plan.todos.len(),
                pipeline_config.marker
            );
            for path in plan.todos.keys() {
                println!("  {}", path);
            }
        }
        println!("Request payload:\n{}", plan.user_prompt);
    }

    let raw = pipeline.generate(&plan).await?;
    if config.verbose {
        println!("Raw reply:\n{}", raw);
    }

    let files = match pipeline.extract(&raw) {
        Ok(files) => files,
        Err(e) => {
            eprintln!("Raw reply:\n{}", e.raw());
            return Err(PipelineError::from(e).into());
        }
    };

    let report = pipeline.materialize(&files)?;

    let mut progress = ProgressIndicator::new(report.outcomes.len(), config.verbose);
    for outcome in &report.outcomes {
        progress.record(outcome);
    }
    progress.finish();

    if let Some(path) = &options.report {
        run_report.finish(&report);
        run_report.save(path)?;
        if config.verbose {
            println!("{}", run_report.summary());
            println!("Run report written to {}", path.display());
        }
    }

    if !report.all_succeeded() {
        anyhow::bail!("{} file(s) could not be materialized", report.failed().count());
    }

    if config.dry_run {
        println!("[DRY RUN] No files were written");
    } else {
        println!("✅ All files created successfully.");
    }
    Ok(())
}

pub async fn ask(options: GenerateOptions, config: &Config) -> Result<()> {
    let pipeline_config = options.load_config()?;
    let prompt_path = pipeline_config
        .prompt_file
        .clone()
        .context("ask needs a prompt file (--prompt-file)")?;
    let question = read_prompt_file(&prompt_path)?;

    if config.dry_run {
        println!("[DRY RUN] Would ask {}:\n{}", pipeline_config.model, question);
        return Ok(());
    }

    let generator = OpenAiGenerator::from_env(
        pipeline_config.env_file.as_deref(),
        &pipeline_config.api_base,
    )?;
    let registry = FilePromptRegistry::new(Some(pipeline_config.prompts_dir.clone()));
    let runner = GenerationRunner::new("consult", PromptInput::default(), &registry);

    if config.verbose {
        println!("Asking {}...", pipeline_config.model);
    }

    let result = runner
        .run(&generator, &pipeline_config.model, &question, false)
        .await?;

    println!("{}", result.output.trim());
    Ok(())
}
