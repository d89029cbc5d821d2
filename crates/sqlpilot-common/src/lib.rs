pub mod error;
pub mod memory;
pub mod providers;
pub mod types;

pub use error::{Error, Result};
pub use memory::{MemoryTurn, SessionMemory};
pub use providers::{CompletionProvider, EmbeddingProvider};
pub use types::SessionId;
