pub mod animator;
pub mod config;
pub mod error;
pub mod gemini;
pub mod logging;
pub mod session;
pub mod state;
pub mod store;

// Re-export main types for convenience
pub use animator::{ScheduledTask, Typewriter};
pub use config::Config;
pub use error::{ChatError, StoreError};
pub use gemini::GeminiClient;
pub use session::{ChatSession, SessionEvent, TurnPhase};
pub use state::{ChatMessage, ChatRole, Theme};
pub use store::{ChatStore, KvStore};
