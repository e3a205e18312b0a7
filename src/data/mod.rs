mod file_set;
mod pipeline_config;
mod todo_map;
mod validated_path;

pub use file_set::GeneratedFileSet;
pub use pipeline_config::{
    read_prompt_file, ConfigError, ContextMode, Destination, PipelineConfig, Strictness,
    DEFAULT_API_BASE, DEFAULT_CONFIG_FILE, DEFAULT_MARKER, DEFAULT_MODEL,
};
pub use todo_map::TodoMap;
pub use validated_path::ValidatedPath;
