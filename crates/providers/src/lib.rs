pub mod json_extract;
pub mod traits;

pub use json_extract::extract_json;
pub use traits::{ChatRequest, ChatResponse, LlmProvider, NullProvider, Role};
