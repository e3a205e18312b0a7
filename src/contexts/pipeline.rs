//! One generation run: harvest context, ask the generator, extract the file
//! mapping and materialize it.
//!
//! Every step returns its error; only the caller decides whether a failure
//! aborts the process.

use super::directory_scanner::scan;
use super::file_materializer::{MaterializeReport, Materializer};
use super::generation_runner::{GenerationRunner, Generator, PromptRegistry, RunnerError};
use super::normalizer::normalize;
use super::response_extractor::{extract_with, ExtractionError};
use super::todo_extractor::TodoExtractor;
use crate::data::{ConfigError, ContextMode, GeneratedFileSet, PipelineConfig, TodoMap};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

#[derive(Debug)]
pub enum PipelineError {
    Config(ConfigError),
    Runner(RunnerError),
    Extraction(ExtractionError),
    /// The generator did not answer within the configured number of seconds
    Timeout(u64),
    /// The request payload could not be encoded
    Payload(serde_json::Error),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PipelineError::Config(e) => write!(f, "{}", e),
            PipelineError::Runner(e) => write!(f, "{}", e),
            PipelineError::Extraction(e) => write!(f, "{}", e),
            PipelineError::Timeout(secs) => {
                write!(f, "Generation did not finish within {}s", secs)
            }
            PipelineError::Payload(e) => write!(f, "Failed to encode request payload: {}", e),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<ConfigError> for PipelineError {
    fn from(e: ConfigError) -> Self {
        PipelineError::Config(e)
    }
}

impl From<RunnerError> for PipelineError {
    fn from(e: RunnerError) -> Self {
        PipelineError::Runner(e)
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(e: serde_json::Error) -> Self {
        PipelineError::Payload(e)
    }
}

impl From<ExtractionError> for PipelineError {
    fn from(e: ExtractionError) -> Self {
        PipelineError::Extraction(e)
    }
}

/// Values available to prompt templates as `{{input.*}}`
#[derive(Debug, Clone, Default, Serialize)]
pub struct PromptInput {
    pub context: String,
    pub project_root: String,
    pub required_root: Option<String>,
    pub marker: String,
    /// Extra user instructions (todos mode)
    pub instructions: Option<String>,
}

/// Everything needed to call the generator
#[derive(Debug, Clone)]
pub struct GenerationPlan {
    pub template: &'static str,
    pub input: PromptInput,
    pub user_prompt: String,
    /// Files that carried the marker (todos mode)
    pub todos: TodoMap,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineOutcome {
    /// Raw generator reply; `None` when there was nothing to ask
    pub raw_response: Option<String>,
    pub files: GeneratedFileSet,
    pub report: MaterializeReport,
}

pub struct Pipeline<'a, G, R>
where
    G: Generator,
    R: PromptRegistry,
{
    config: &'a PipelineConfig,
    generator: &'a G,
    registry: &'a R,
    dry_run: bool,
}

impl<'a, G, R> Pipeline<'a, G, R>
where
    G: Generator,
    R: PromptRegistry,
{
    pub fn new(config: &'a PipelineConfig, generator: &'a G, registry: &'a R) -> Self {
        Self {
            config,
            generator,
            registry,
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Builds the request inputs for the configured context mode.
    ///
    /// `prompt` is the user prompt; scaffold and context modes require it.
    pub fn plan(&self, prompt: Option<&str>) -> Result<GenerationPlan, PipelineError> {
        let config = self.config;
        let destination = config.destination();
        let mut input = PromptInput {
            context: String::new(),
            project_root: config.project_root.to_string_lossy().to_string(),
            required_root: destination.required_root,
            marker: config.marker.clone(),
            instructions: None,
        };

        let require_prompt = || {
            prompt.map(str::to_string).ok_or_else(|| ConfigError::PromptFile {
                path: config.prompt_file.clone().unwrap_or_default(),
                reason: format!("{} mode needs a prompt", config.mode),
            })
        };

        let (user_prompt, todos) = match config.mode {
            ContextMode::Scaffold => (require_prompt()?, TodoMap::new()),
            ContextMode::Context => {
                input.context = scan(&config.project_root, &config.extensions, config.max_files);
                (require_prompt()?, TodoMap::new())
            }
            ContextMode::Todos => {
                let todos = TodoExtractor::new(config.marker.clone())
                    .skip_files(config.skip_files.iter().cloned())
                    .find(&config.absolute_project_root());
                let cleaned = todos.map_contents(normalize);
                input.instructions = prompt.map(str::to_string);
                let payload = serde_json::to_string(&cleaned)?;
                (payload, todos)
            }
        };

        Ok(GenerationPlan {
            template: config.mode.template_name(),
            input,
            user_prompt,
            todos,
        })
    }

    /// Sends the plan to the generator, bounded by `timeout_secs` (0 = none)
    pub async fn generate(&self, plan: &GenerationPlan) -> Result<String, PipelineError> {
        let runner = GenerationRunner::new(plan.template, &plan.input, self.registry);
        let call = runner.run(
            self.generator,
            &self.config.model,
            &plan.user_prompt,
            self.config.strictness.wants_json_response_format(),
        );

        let result = match self.config.timeout_secs {
            0 => call.await?,
            secs => tokio::time::timeout(Duration::from_secs(secs), call)
                .await
                .map_err(|_| PipelineError::Timeout(secs))??,
        };
        Ok(result.output)
    }

    pub fn extract(&self, raw: &str) -> Result<GeneratedFileSet, ExtractionError> {
        extract_with(raw, self.config.strictness)
    }

    /// Writes the files; fails only if the destination base is missing
    pub fn materialize(&self, files: &GeneratedFileSet) -> Result<MaterializeReport, PipelineError> {
        let destination = self.config.destination();
        if !destination.base_path.is_dir() {
            return Err(ConfigError::MissingBasePath(destination.base_path).into());
        }
        Ok(Materializer::from_destination(&destination)
            .dry_run(self.dry_run)
            .materialize(files))
    }

    pub async fn run(&self, prompt: Option<&str>) -> Result<PipelineOutcome, PipelineError> {
        let plan = self.plan(prompt)?;
        if self.config.mode == ContextMode::Todos && plan.todos.is_empty() {
            return Ok(PipelineOutcome::default());
        }

        let raw = self.generate(&plan).await?;
        let files = self.extract(&raw)?;
        let report = self.materialize(&files)?;

        Ok(PipelineOutcome {
            raw_response: Some(raw),
            files,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contexts::{GenerationRequest, GeneratorError, PopulateError};
    use crate::data::Strictness;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct StubGenerator {
        reply: String,
        seen: Mutex<Vec<GenerationRequest>>,
    }

    impl StubGenerator {
        fn new(reply: impl Into<String>) -> Self {
            Self {
                reply: reply.into(),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl Generator for StubGenerator {
        async fn generate(&self, request: &GenerationRequest) -> Result<String, GeneratorError> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(self.reply.clone())
        }
    }

    struct SlowGenerator;

    impl Generator for SlowGenerator {
        async fn generate(&self, _request: &GenerationRequest) -> Result<String, GeneratorError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("{}".to_string())
        }
    }

    struct Templates;

    impl PromptRegistry for Templates {
        fn get_template(&self, name: &str) -> Result<String, PopulateError> {
            Ok(format!("[{}] root={{{{input.required_root?}}}} ctx={{{{input.context}}}}", name))
        }
    }

    fn config(mode: ContextMode, root: &std::path::Path) -> PipelineConfig {
        PipelineConfig {
            mode,
            project_root: root.to_path_buf(),
            base_path: root.to_path_buf(),
            ..Default::default()
        }
    }

    #[test]
    fn test_scaffold_requires_prompt() {
        let dir = TempDir::new().unwrap();
        let cfg = config(ContextMode::Scaffold, dir.path());
        let generator = StubGenerator::new("{}");
        let pipeline = Pipeline::new(&cfg, &generator, &Templates);

        assert!(matches!(
            pipeline.plan(None),
            Err(PipelineError::Config(ConfigError::PromptFile { .. }))
        ));
        let plan = pipeline.plan(Some("make a CLI")).unwrap();
        assert_eq!(plan.template, "scaffold");
        assert_eq!(plan.user_prompt, "make a CLI");
        assert_eq!(plan.input.context, "");
    }

    #[test]
    fn test_context_mode_embeds_scan() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("main.go"), "package main").unwrap();
        let cfg = config(ContextMode::Context, dir.path());
        let generator = StubGenerator::new("{}");
        let pipeline = Pipeline::new(&cfg, &generator, &Templates);

        let plan = pipeline.plan(Some("add tests")).unwrap();
        assert!(plan.input.context.contains("package main"));
    }

    #[test]
    fn test_todos_plan_sends_normalized_json() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.go"), "line1\n// @todo check err\nline3").unwrap();
        let cfg = config(ContextMode::Todos, dir.path());
        let generator = StubGenerator::new("{}");
        let pipeline = Pipeline::new(&cfg, &generator, &Templates);

        let plan = pipeline.plan(None).unwrap();
        let key = dir.path().join("a.go").to_string_lossy().to_string();
        let payload: serde_json::Value = serde_json::from_str(&plan.user_prompt).unwrap();
        assert_eq!(payload[key.as_str()], "line1 // @todo check err line3");
        assert_eq!(plan.todos.get(&key), Some("line1\n// @todo check err\nline3"));
        let root = dir.path().to_string_lossy().to_string();
        assert_eq!(plan.input.required_root.as_deref(), Some(root.as_str()));
    }

    #[test]
    fn test_payload_error_is_propagated() {
        let cause = serde_json::from_str::<u8>("not a number").unwrap_err();
        let err = PipelineError::from(cause);
        assert!(matches!(err, PipelineError::Payload(_)));
        assert!(err.to_string().starts_with("Failed to encode request payload"));
    }

    #[tokio::test]
    async fn test_todos_without_markers_skips_generation() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.go"), "clean code").unwrap();
        let cfg = config(ContextMode::Todos, dir.path());
        let generator = StubGenerator::new("{}");

        let outcome = Pipeline::new(&cfg, &generator, &Templates).run(None).await.unwrap();
        assert!(outcome.raw_response.is_none());
        assert!(generator.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scaffold_run_writes_under_base_path() {
        let dir = TempDir::new().unwrap();
        let cfg = config(ContextMode::Scaffold, dir.path());
        let generator = StubGenerator::new(r##"Here: {"./main.go": "package main\n", "./README.md": "# My Project"}"##);

        let outcome = Pipeline::new(&cfg, &generator, &Templates)
            .run(Some("hello world app"))
            .await
            .unwrap();

        assert!(outcome.report.all_succeeded());
        assert_eq!(fs::read_to_string(dir.path().join("main.go")).unwrap(), "package main\n");
        assert_eq!(fs::read_to_string(dir.path().join("README.md")).unwrap(), "# My Project");

        let seen = generator.seen.lock().unwrap();
        assert_eq!(seen[0].system_instruction, "[scaffold] root= ctx=");
        assert!(!seen[0].json_response);
    }

    #[tokio::test]
    async fn test_strict_mode_requests_json_format_and_rejects_prose() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(ContextMode::Scaffold, dir.path());
        cfg.strictness = Strictness::Strict;
        let generator = StubGenerator::new(r#"Sure! {"a.txt": "x"}"#);

        let err = Pipeline::new(&cfg, &generator, &Templates)
            .run(Some("p"))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Extraction(ExtractionError::NoObject { .. })));
        assert!(generator.seen.lock().unwrap()[0].json_response);
        assert!(!dir.path().join("a.txt").exists());
    }

    #[tokio::test]
    async fn test_missing_base_path_is_config_error() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(ContextMode::Scaffold, dir.path());
        cfg.base_path = dir.path().join("missing");
        let generator = StubGenerator::new(r#"{"a.txt": "x"}"#);

        let err = Pipeline::new(&cfg, &generator, &Templates)
            .run(Some("p"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Config(ConfigError::MissingBasePath(_))));
    }

    #[tokio::test]
    async fn test_generation_timeout() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(ContextMode::Scaffold, dir.path());
        cfg.timeout_secs = 1;

        let err = Pipeline::new(&cfg, &SlowGenerator, &Templates)
            .run(Some("p"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Timeout(1)));
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let cfg = config(ContextMode::Scaffold, dir.path());
        let generator = StubGenerator::new(r#"{"a.txt": "x"}"#);

        let outcome = Pipeline::new(&cfg, &generator, &Templates)
            .dry_run(true)
            .run(Some("p"))
            .await
            .unwrap();
        assert_eq!(outcome.report.count("would-write"), 1);
        assert!(!dir.path().join("a.txt").exists());
    }
}
