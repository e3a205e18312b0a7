use serde::Serialize;
use std::fmt;
use std::future::Future;

/// Errors raised while turning a prompt template into a system instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopulateError {
    MissingMandatoryPlaceholder(String),
    InvalidPlaceholderPath(String),
    TemplateNotFound(String),
    InvalidTemplate(String),
}

impl fmt::Display for PopulateError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PopulateError::MissingMandatoryPlaceholder(ph) => {
                write!(f, "Required placeholder '{}' could not be resolved", ph)
            }
            PopulateError::InvalidPlaceholderPath(path) => {
                write!(f, "Invalid path '{}' in placeholder", path)
            }
            PopulateError::TemplateNotFound(name) => {
                write!(f, "Prompt template '{}' not found", name)
            }
            PopulateError::InvalidTemplate(details) => {
                write!(f, "Prompt template is invalid: {}", details)
            }
        }
    }
}

impl std::error::Error for PopulateError {}

/// Errors at the text-generation service boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratorError {
    Request(String),
    Status { code: u16, message: String },
    RateLimited { retries: u32 },
    InvalidResponse(String),
}

impl fmt::Display for GeneratorError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GeneratorError::Request(details) => write!(f, "Generation request failed: {}", details),
            GeneratorError::Status { code, message } => {
                write!(f, "Generation service returned {}: {}", code, message)
            }
            GeneratorError::RateLimited { retries } => {
                write!(f, "Rate limited after {} retries", retries)
            }
            GeneratorError::InvalidResponse(details) => {
                write!(f, "Unexpected response from generation service: {}", details)
            }
        }
    }
}

impl std::error::Error for GeneratorError {}

#[derive(Debug)]
pub enum RunnerError {
    Populate(PopulateError),
    Generation(GeneratorError),
}

impl fmt::Display for RunnerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RunnerError::Populate(e) => write!(f, "{}", e),
            RunnerError::Generation(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for RunnerError {}

impl From<PopulateError> for RunnerError {
    fn from(e: PopulateError) -> Self {
        RunnerError::Populate(e)
    }
}

impl From<GeneratorError> for RunnerError {
    fn from(e: GeneratorError) -> Self {
        RunnerError::Generation(e)
    }
}

/// One request to the text-generation service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationRequest {
    pub model: String,
    pub system_instruction: String,
    pub user_prompt: String,
    /// Ask the service to answer with a JSON object
    pub json_response: bool,
}

/// The text-generation service. Constructed once per run and passed to
/// whatever needs it.
pub trait Generator {
    fn generate(
        &self,
        request: &GenerationRequest,
    ) -> impl Future<Output = Result<String, GeneratorError>> + Send;
}

/// Trait for loading prompt templates by name
pub trait PromptRegistry {
    fn get_template(&self, name: &str) -> Result<String, PopulateError>;
}

#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub request: GenerationRequest,
    pub output: String,
}

/// Populates a prompt template from `input` and sends it to a generator
pub struct GenerationRunner<'a, T, R>
where
    T: Serialize,
    R: PromptRegistry,
{
    template: &'a str,
    input: T,
    registry: &'a R,
}

impl<'a, T, R> GenerationRunner<'a, T, R>
where
    T: Serialize,
    R: PromptRegistry,
{
    pub fn new(template: &'a str, input: T, registry: &'a R) -> Self {
        Self {
            template,
            input,
            registry,
        }
    }

    /// Loads the template and fills its placeholders
    pub fn populate(&self) -> Result<String, PopulateError> {
        let template = self.registry.get_template(self.template)?;
        self.replace_placeholders(&template)
    }

    /// Builds the request without sending it
    pub fn request(
        &self,
        model: &str,
        user_prompt: &str,
        json_response: bool,
    ) -> Result<GenerationRequest, PopulateError> {
        Ok(GenerationRequest {
            model: model.to_string(),
            system_instruction: self.populate()?,
            user_prompt: user_prompt.to_string(),
            json_response,
        })
    }

    pub async fn run<G: Generator>(
        &self,
        generator: &G,
        model: &str,
        user_prompt: &str,
        json_response: bool,
    ) -> Result<GenerationResult, RunnerError> {
        let request = self.request(model, user_prompt, json_response)?;
        let output = generator.generate(&request).await?;
        Ok(GenerationResult { request, output })
    }

    /// Replaces `{{input.a.b}}` (mandatory) and `{{input.a.b?}}` (optional).
    ///
    /// Replacement text is never rescanned, so harvested source code that
    /// happens to contain `{{` is inserted verbatim.
    fn replace_placeholders(&self, template: &str) -> Result<String, PopulateError> {
        let input = serde_json::to_value(&self.input)
            .map_err(|e| PopulateError::InvalidTemplate(e.to_string()))?;

        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("{{") {
            let Some(len) = rest[start..].find("}}") else {
                break;
            };
            out.push_str(&rest[..start]);

            let placeholder = &rest[start + 2..start + len];
            let (path, optional) = match placeholder.strip_suffix('?') {
                Some(p) => (p, true),
                None => (placeholder, false),
            };

            match resolve_path(&input, path)? {
                Some(value) => out.push_str(&render_value(value)?),
                None if optional => {}
                None => {
                    return Err(PopulateError::MissingMandatoryPlaceholder(path.to_string()));
                }
            }

            rest = &rest[start + len + 2..];
        }

        out.push_str(rest);
        Ok(out)
    }
}

/// Resolves `input.a.b` inside the serialized input; `null` counts as absent
fn resolve_path<'v>(
    value: &'v serde_json::Value,
    path: &str,
) -> Result<Option<&'v serde_json::Value>, PopulateError> {
    let mut parts = path.trim().split('.');
    if parts.next() != Some("input") {
        return Err(PopulateError::InvalidPlaceholderPath(path.to_string()));
    }

    let mut current = value;
    for part in parts {
        match current.get(part) {
            Some(v) => current = v,
            None => return Ok(None),
        }
    }

    if current.is_null() {
        return Ok(None);
    }
    Ok(Some(current))
}

fn render_value(value: &serde_json::Value) -> Result<String, PopulateError> {
    match value {
        serde_json::Value::String(s) => Ok(s.clone()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        serde_json::Value::Null => Ok(String::new()),
        other => serde_json::to_string(other)
            .map_err(|e| PopulateError::InvalidTemplate(e.to_string())),
    }
}
