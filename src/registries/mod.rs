mod prompt_registry;

pub use prompt_registry::{builtin_template, FilePromptRegistry};
