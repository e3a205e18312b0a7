//! Pipeline configuration
//!
//! One structure selects, per invocation, where the context comes from, how
//! strictly the reply is parsed and where generated files may land.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "stitch.yml";
pub const DEFAULT_MARKER: &str = "// @todo";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Errors that stop a run before any work starts
#[derive(Debug)]
pub enum ConfigError {
    InvalidConfig { path: PathBuf, reason: String },
    SecretsFile { path: PathBuf, reason: String },
    MissingCredential(String),
    PromptFile { path: PathBuf, reason: String },
    MissingBasePath(PathBuf),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::InvalidConfig { path, reason } => {
                write!(f, "Invalid configuration file {}: {}", path.display(), reason)
            }
            ConfigError::SecretsFile { path, reason } => {
                write!(f, "Failed to load secrets file {}: {}", path.display(), reason)
            }
            ConfigError::MissingCredential(var) => {
                write!(f, "{} is not set", var)
            }
            ConfigError::PromptFile { path, reason } => {
                write!(f, "Failed to read prompt file {}: {}", path.display(), reason)
            }
            ConfigError::MissingBasePath(path) => {
                write!(f, "Directory {} does not exist", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Where the generation context comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ContextMode {
    /// No harvested context; the prompt alone describes the files to create
    #[default]
    Scaffold,
    /// Whole-tree scan embedded into the system instruction
    Context,
    /// Files containing the marker, sent as the user prompt
    Todos,
}

impl ContextMode {
    /// Name of the prompt template used for this mode
    pub fn template_name(&self) -> &'static str {
        match self {
            ContextMode::Scaffold => "scaffold",
            ContextMode::Context => "context",
            ContextMode::Todos => "todos",
        }
    }
}

impl fmt::Display for ContextMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.template_name())
    }
}

/// How the JSON object is pulled out of the reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    /// The reply must be exactly one JSON object; the service is asked for
    /// a JSON response format
    Strict,
    /// First complete top-level object found by a brace-balancing scan
    #[default]
    Balanced,
    /// Span from the first `{` to the last `}`
    Greedy,
}

impl Strictness {
    pub fn wants_json_response_format(&self) -> bool {
        matches!(self, Strictness::Strict)
    }
}

impl fmt::Display for Strictness {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Strictness::Strict => "strict",
            Strictness::Balanced => "balanced",
            Strictness::Greedy => "greedy",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub mode: ContextMode,
    /// Tree that is scanned or searched for markers
    pub project_root: PathBuf,
    /// Directory generated paths are joined onto (scaffold/context modes)
    pub base_path: PathBuf,
    /// Root every generated path must start with; defaults to
    /// `project_root` in todos mode
    pub required_root: Option<String>,
    pub extensions: Vec<String>,
    pub max_files: usize,
    pub marker: String,
    pub skip_files: Vec<String>,
    pub strictness: Strictness,
    pub model: String,
    pub api_base: String,
    pub prompt_file: Option<PathBuf>,
    pub prompts_dir: PathBuf,
    pub env_file: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: ContextMode::default(),
            project_root: PathBuf::from("."),
            base_path: PathBuf::from("."),
            required_root: None,
            extensions: vec![".go".to_string()],
            max_files: 5,
            marker: DEFAULT_MARKER.to_string(),
            skip_files: Vec::new(),
            strictness: Strictness::default(),
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            prompt_file: None,
            prompts_dir: PathBuf::from("prompts"),
            env_file: None,
            timeout_secs: 120,
        }
    }
}

/// Resolved write target for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub base_path: PathBuf,
    pub required_root: Option<String>,
}

impl PipelineConfig {
    /// Loads the configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::InvalidConfig {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_yaml(&content).map_err(|reason| ConfigError::InvalidConfig {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Loads `path` if given, else the default file if present, else defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_yaml(content: &str) -> Result<Self, String> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| e.to_string())
    }

    /// Computes where generated files go for the configured mode.
    ///
    /// Todos replies carry absolute paths, so they are written relative to
    /// `/` and must stay under the project root.
    pub fn destination(&self) -> Destination {
        match self.mode {
            ContextMode::Todos => Destination {
                base_path: PathBuf::from("/"),
                required_root: Some(self.required_root.clone().unwrap_or_else(|| {
                    self.absolute_project_root().to_string_lossy().to_string()
                })),
            },
            ContextMode::Scaffold | ContextMode::Context => Destination {
                base_path: self.base_path.clone(),
                required_root: self.required_root.clone(),
            },
        }
    }

    /// The project root made absolute against the working directory, so
    /// that walked paths are usable as write destinations
    pub fn absolute_project_root(&self) -> PathBuf {
        std::path::absolute(&self.project_root).unwrap_or_else(|_| self.project_root.clone())
    }

    /// Reads the configured prompt file
    pub fn read_prompt(&self) -> Result<String, ConfigError> {
        let Some(path) = &self.prompt_file else {
            return Err(ConfigError::PromptFile {
                path: PathBuf::new(),
                reason: "no prompt file configured".to_string(),
            });
        };
        read_prompt_file(path)
    }
}

pub fn read_prompt_file(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|e| ConfigError::PromptFile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
