pub mod config;
pub mod domain;
pub mod errors;
pub mod knowledge;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LlmProvider, LoadOptions, LogFormat};
pub use domain::conversation::{Conversation, ConversationId, Message, Prospect, Sender};
pub use domain::decision::{Action, AgentDecision, Analysis, GuardrailCheck};
pub use domain::draft::{Draft, DraftId, DraftStatus, ValidationReport};
pub use domain::run::{Run, RunErrorEntry, RunErrorKind, RunId, RunMode, RunSummary};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use knowledge::{CampaignType, EnergyLevel, Language, SentMaterials};
