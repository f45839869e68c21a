//! Adapter registry: one adapter per agent type, contract-checked at
//! startup, immutable afterwards.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use panewatch_core::error::CoreError;
use panewatch_core::types::{AdapterRecord, AgentType};

use crate::claude::ClaudeAdapter;
use crate::codex::CodexAdapter;
use crate::gemini::GeminiAdapter;
use crate::signal::{Normalized, Signal};
use crate::Adapter;

/// Required contract major version. Adapters declaring any other major
/// are rejected at registration (fatal at startup).
pub const REQUIRED_CONTRACT_MAJOR: u32 = 1;

pub struct AdapterRegistry {
    adapters: Vec<Box<dyn Adapter>>,
    by_agent: HashMap<AgentType, usize>,
}

impl AdapterRegistry {
    pub fn empty() -> Self {
        Self {
            adapters: Vec::new(),
            by_agent: HashMap::new(),
        }
    }

    /// Registry with the built-in adapters.
    pub fn builtin() -> Result<Self, CoreError> {
        let mut registry = Self::empty();
        registry.register(Box::new(ClaudeAdapter))?;
        registry.register(Box::new(CodexAdapter))?;
        registry.register(Box::new(GeminiAdapter))?;
        Ok(registry)
    }

    pub fn register(&mut self, adapter: Box<dyn Adapter>) -> Result<(), CoreError> {
        let major = contract_major(adapter.contract_version());
        if major != Some(REQUIRED_CONTRACT_MAJOR) {
            return Err(CoreError::UnsupportedContractVersion {
                adapter: adapter.name().to_string(),
                version: adapter.contract_version().to_string(),
            });
        }
        let agent_type = adapter.agent_type();
        if self.by_agent.contains_key(&agent_type) {
            return Err(CoreError::Duplicate(format!(
                "adapter for agent type {agent_type} already registered"
            )));
        }
        self.by_agent.insert(agent_type, self.adapters.len());
        self.adapters.push(adapter);
        Ok(())
    }

    pub fn get(&self, agent_type: AgentType) -> Option<&dyn Adapter> {
        self.by_agent
            .get(&agent_type)
            .map(|idx| self.adapters[*idx].as_ref())
    }

    /// Normalize a signal through the adapter for `agent_type`, if any.
    pub fn normalize(&self, agent_type: AgentType, signal: &Signal<'_>) -> Option<Normalized> {
        self.get(agent_type)?.normalize(signal)
    }

    /// Registry rows for the store sync. `enabled` defaults to true; the
    /// store preserves a previously persisted flag.
    pub fn records(&self, now: DateTime<Utc>) -> Vec<AdapterRecord> {
        self.adapters
            .iter()
            .map(|adapter| AdapterRecord {
                name: adapter.name().to_string(),
                agent_type: adapter.agent_type(),
                contract_version: adapter.contract_version().to_string(),
                capabilities: adapter.capabilities(),
                enabled: true,
                updated_at: now,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

/// Parse the major component of a contract version string.
fn contract_major(version: &str) -> Option<u32> {
    version.split('.').next()?.parse().ok()
}

// ─── Tests ────────────────────────────────────────────────────────
