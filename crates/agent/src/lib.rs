//! Drafting agent for prospect conversations.
//!
//! The agent runs a constrained loop per conversation:
//! 1. **Prompting** (`prompts`) - campaign, language and energy context rendered into templates
//! 2. **Drafting** (`drafter`) - one structured model call, parsed by `response`
//! 3. **Review** (`review`) - a second model pass for risky or low-confidence drafts
//! 4. **Validation** (`guardrails`) - deterministic keyword checks on the reply text
//! 5. **Dispatch** (`runtime`) - auto-send, queue for approval, or record the outcome
//!
//! # Safety Principle
//!
//! The model proposes; it never decides what is sent. A draft only leaves
//! automatically when it clears every deterministic check and the confidence bar.

pub mod anthropic;
pub mod drafter;
pub mod guardrails;
pub mod llm;
pub mod openai;
pub mod prompts;
pub mod response;
pub mod review;
pub mod runtime;
pub mod schema;

pub use drafter::{Drafter, DrafterSettings};
pub use llm::{client_from_config, CompletionRequest, LlmClient, LlmError, ModelSelection};
pub use prompts::{ConversationContext, PromptBuilder, PromptError};
pub use runtime::{AgentRuntime, RunOptions, RuntimeError, RuntimeSettings};
