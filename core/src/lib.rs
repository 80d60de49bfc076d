// Semangat Core Library
// Hourly motivation engine: model failover, speech synthesis, top-of-hour scheduling

pub mod catalog;
pub mod content;
pub mod delivery;
pub mod llm;
pub mod scheduler;
pub mod speech;

// Export core types
pub use catalog::{CatalogHandle, ModelCatalog, ModelDescriptor, ModelTier};
pub use content::{ContentRequest, ContentResult, GenerationEngine};
pub use delivery::{DeliveryPipeline, DeliveryTarget, MessageTransport};
pub use llm::{GeminiClient, GeminiConfig, GenerationError, GenerationProvider};
pub use scheduler::{
    Clock, ScheduleConfig, ScheduleState, Scheduler, SubscribeOutcome, SubscriberId,
    SubscriberSchedule, SystemClock, UnsubscribeOutcome,
};
pub use speech::{AudioArtifact, CliSpeechSynthesizer, SpeechAdapter, SpeechConfig, SpeechSynthesizer};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SemangatError {
    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Speech error: {0}")]
    SpeechError(String),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
pub type Result<T> = std::result::Result<T, SemangatError>;
