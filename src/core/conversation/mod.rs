//! Conversation state: the per-session transcript and the bounded context
//! window derived from it.
//!
//! The client receives the whole transcript after every turn while the
//! backend only ever sees the last [`CONTEXT_WINDOW_TURNS`] turns plus the
//! system directive.

mod context;
mod transcript;

pub use context::{CONTEXT_WINDOW_TURNS, ChatMessage, ChatRole, ContextWindowBuilder};
pub use transcript::{Speaker, Transcript, Turn};

/// Persona directive prepended to every context window unless overridden
/// by configuration.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a highly advanced 3D Digital Human.
Your name is Mirage. You are friendly, concise, and helpful.
You are conversing with a user via voice interaction.
Keep your responses relatively short (1-3 sentences) to maintain a natural conversational flow, unless asked for a detailed explanation.
Do not use emojis as they cannot be spoken by the TTS engine.
";
