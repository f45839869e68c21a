//! panewatch-adapters: per-agent event normalization.
//!
//! Each agent family ships events with its own vocabulary. An [`Adapter`]
//! turns a raw signal (event-type token + source + payload) into a
//! canonical `(state, reason, confidence)` triple, or declines. The
//! [`AdapterRegistry`] holds one adapter per agent type and rejects
//! incompatible contract versions at startup.

pub mod claude;
pub mod codex;
pub mod gemini;
pub mod registry;
pub mod signal;

pub use claude::ClaudeAdapter;
pub use codex::CodexAdapter;
pub use gemini::GeminiAdapter;
pub use registry::{AdapterRegistry, REQUIRED_CONTRACT_MAJOR};
pub use signal::{Normalized, Signal, canonical_event_type};

use panewatch_core::types::{AdapterCapabilities, AgentType};

/// One agent family's event normalizer.
pub trait Adapter: Send + Sync {
    fn name(&self) -> &'static str;
    fn agent_type(&self) -> AgentType;
    /// Contract version string; the major component must match
    /// [`REQUIRED_CONTRACT_MAJOR`].
    fn contract_version(&self) -> &'static str;
    fn capabilities(&self) -> AdapterCapabilities;
    /// Normalize a signal, or return `None` when not handled.
    fn normalize(&self, signal: &Signal<'_>) -> Option<Normalized>;
}
