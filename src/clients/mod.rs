mod openai;

pub use openai::{load_api_key, OpenAiGenerator, API_KEY_VAR};
