//! OpenAI-compatible generation backend (Gemini, OpenAI).

mod client;
pub mod config;
pub mod messages;

pub use client::OpenAICompatGenerator;
pub use config::{
    DEFAULT_GEMINI_MODEL, DEFAULT_TEMPERATURE, GEMINI_OPENAI_BASE_URL, LlmProvider,
    OPENAI_BASE_URL, OpenAICompatConfig,
};
