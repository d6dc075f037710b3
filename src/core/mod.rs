pub mod conversation;
pub mod llm;
pub mod registry;
pub mod session;

// Re-export commonly used types for convenience
pub use conversation::{
    CONTEXT_WINDOW_TURNS, ChatMessage, ChatRole, ContextWindowBuilder, DEFAULT_SYSTEM_PROMPT,
    Speaker, Transcript, Turn,
};

pub use llm::{
    BaseGenerator, GenerationError, GenerationResult, LlmProvider, OpenAICompatConfig,
    OpenAICompatGenerator, SharedGenerator, create_generator, generate_with_timeout,
    get_supported_llm_providers,
};

pub use registry::{RegistrationGuard, SessionEntry, SessionRegistry, SessionSummary};
pub use session::{FALLBACK_REPLY, Session, SessionId, SessionState, TurnReply};
