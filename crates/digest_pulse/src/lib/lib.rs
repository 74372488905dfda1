mod error;
mod gate;
mod llm;
pub mod parser;
mod processor;
pub mod retry;
mod transcript;
pub mod tracing;
pub mod types;
pub mod yt;

pub use error::Error;
pub use gate::{InFlightClaim, PersistenceGate};
pub use llm::openai;
pub use llm::summarizer::{ByteStream, Summarizer};
pub use processor::{builder::ProcessingCoordinatorBuilder, ProcessingCoordinator, RetryBudgets};
pub use transcript::{normalize, TranscriptAcquirer};
