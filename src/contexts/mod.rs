mod directory_scanner;
mod file_materializer;
mod generation_runner;
mod normalizer;
mod path_validator;
mod pipeline;
mod response_extractor;
mod todo_extractor;

pub use directory_scanner::{scan, EXCLUDED_DIRS};
pub use file_materializer::{
    content_digest, materialize, FileOutcome, FileStatus, MaterializeReport, Materializer,
};
pub use generation_runner::{
    GenerationRequest, GenerationResult, GenerationRunner, Generator, GeneratorError,
    PopulateError, PromptRegistry, RunnerError,
};
pub use normalizer::normalize;
pub use path_validator::{confine, join_under, validate, PathError};
pub use pipeline::{GenerationPlan, Pipeline, PipelineError, PipelineOutcome, PromptInput};
pub use response_extractor::{extract_json, extract_with, ExtractionError};
pub use todo_extractor::{find_marked, TodoExtractor};
