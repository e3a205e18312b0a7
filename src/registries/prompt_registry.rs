use crate::contexts::{PopulateError, PromptRegistry};
use std::fs;
use std::path::PathBuf;

const SCAFFOLD_PROMPT: &str = r##"You are an assistant that creates a file structure. Answer in JSON format: path => content. Generate a JSON object whose keys are file paths and whose values are the file contents. For example:
{
  "./main.go": "package main\n\nfunc main() {...}",
  "./README.md": "# My Project"
}"##;

const CONTEXT_PROMPT: &str = r#"You are an assistant that creates a project structure.
These are the current project files:{{input.context}}
Your task: return **only** JSON of the form:
{"./main.go": "...code...", "./README.md": "...text..."}
No comments, no Markdown, no text before or after.
If you want to explain something, do NOT write it. Return only JSON."#;

const TODOS_PROMPT: &str = r#"You are a programmer's assistant. We write PHP, Laravel, Symfony, JavaScript and Go, and use Docker, SQL and other technologies. You receive a request of the form {"file path": "page"}.
Your task: analyze the code of each page for the task described in a "{{input.marker}}" comment, carry out that task and replace the comment with your code. For example, remove the line '// @todo check the variable $var' and write if (isset($var)) ... in its place.
{{input.instructions?}}
Return **only** JSON of the form:
{"file path": "file code"}
Keep every file path unchanged; it always starts with {{input.required_root}}/.
Do not add examples.
No comments, no Markdown, no text before or after.
If you want to explain something, do NOT write it.
The JSON format is essential."#;

const CONSULT_PROMPT: &str = "You are a consultant helping us build a system with Go, PHP, Docker, Vue.js and more. Follow the documentation when answering questions.";

/// Templates shipped with the binary
pub fn builtin_template(name: &str) -> Option<&'static str> {
    match name {
        "scaffold" => Some(SCAFFOLD_PROMPT),
        "context" => Some(CONTEXT_PROMPT),
        "todos" => Some(TODOS_PROMPT),
        "consult" => Some(CONSULT_PROMPT),
        _ => None,
    }
}

/// Loads prompt templates from `<prompts_dir>/<name>.yml`, falling back to
/// the built-in template of the same name.
#[derive(Clone, Debug)]
pub struct FilePromptRegistry {
    prompts_dir: PathBuf,
    use_builtin: bool,
}

impl FilePromptRegistry {
    /// # Arguments
    /// * `prompts_dir` - Optional path to the template directory (defaults to "prompts")
    pub fn new(prompts_dir: Option<PathBuf>) -> Self {
        Self {
            prompts_dir: prompts_dir.unwrap_or_else(|| PathBuf::from("prompts")),
            use_builtin: true,
        }
    }

    /// Only templates on disk are served
    pub fn without_builtin(mut self) -> Self {
        self.use_builtin = false;
        self
    }
}

impl PromptRegistry for FilePromptRegistry {
    fn get_template(&self, name: &str) -> Result<String, PopulateError> {
        let path = self.prompts_dir.join(format!("{}.yml", name));

        if !path.exists() {
            return match builtin_template(name) {
                Some(template) if self.use_builtin => Ok(template.to_string()),
                _ => Err(PopulateError::TemplateNotFound(name.to_string())),
            };
        }

        let content = fs::read_to_string(&path).map_err(|e| {
            PopulateError::InvalidTemplate(format!(
                "Failed to read prompt template {}: {}",
                path.display(),
                e
            ))
        })?;
        extract_system_prompt(&content)
    }
}

/// Extracts the `system_prompt` field from a YAML template file
fn extract_system_prompt(yaml_content: &str) -> Result<String, PopulateError> {
    use yaml_rust::YamlLoader;

    let docs = YamlLoader::load_from_str(yaml_content)
        .map_err(|e| PopulateError::InvalidTemplate(format!("Invalid YAML: {}", e)))?;

    let Some(doc) = docs.first() else {
        return Err(PopulateError::InvalidTemplate("Empty YAML document".to_string()));
    };

    doc["system_prompt"]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| {
            PopulateError::InvalidTemplate(
                "No system_prompt field found in prompt template".to_string(),
            )
        })
}
