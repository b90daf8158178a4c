//! LLM provider implementations.
//!
//! Four dialects behind one [`binlift_domain::ports::LlmProvider`] port.
//! Construction happens in the infrastructure factory; nothing here retries
//! or breaks circuits; those are decorators applied above.

mod anthropic;
mod common;
mod gemini;
mod http;
mod ollama;
mod openai;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use http::HttpClientPool;
pub use ollama::OllamaProvider;
pub use openai::OpenAiCompatibleProvider;
