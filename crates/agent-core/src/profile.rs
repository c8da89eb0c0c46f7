//! Agent Profiles
//!
//! Export an agent's prompt configuration and tool selection to JSON and
//! rebuild a working agent from it later.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::prompt::PromptBuilder;
use crate::provider::ModelAdapter;
use crate::reasoning::{AgentConfig, Orchestrator};
use crate::retrieval::Retriever;
use crate::tool::ToolRegistry;

/// Serializable description of an agent
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub name: String,

    #[serde(flatten)]
    pub config: AgentConfig,

    /// Tool names, resolved against a catalog at build time
    #[serde(default)]
    pub tools: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<DateTime<Utc>>,
}

impl AgentProfile {
    pub fn new(name: impl Into<String>, config: AgentConfig) -> Self {
        Self {
            name: name.into(),
            config,
            tools: Vec::new(),
            exported_at: None,
        }
    }

    #[must_use]
    pub fn tool(mut self, name: impl Into<String>) -> Self {
        self.tools.push(name.into());
        self
    }

    /// Capture a running agent
    pub fn from_orchestrator(name: impl Into<String>, agent: &Orchestrator) -> Self {
        Self {
            name: name.into(),
            config: agent.config().clone(),
            tools: agent.tools().names().into_iter().map(String::from).collect(),
            exported_at: None,
        }
    }

    pub const fn prompt(&self) -> &PromptBuilder {
        &self.config.prompt
    }

    /// Write the profile as pretty JSON, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let profile = Self {
            exported_at: Some(Utc::now()),
            ..self.clone()
        };
        std::fs::write(path, serde_json::to_string_pretty(&profile)?)?;
        tracing::info!(profile = %self.name, path = %path.display(), "Saved agent profile");
        Ok(())
    }

    /// Read a profile written by [`save`](Self::save)
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let profile: Self = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        if profile.config.max_turns == 0 {
            return Err(AgentError::Config(format!(
                "profile '{}' has max_turns = 0",
                profile.name
            )));
        }
        tracing::debug!(profile = %profile.name, path = %path.display(), "Loaded agent profile");
        Ok(profile)
    }

    /// Rebuild an agent; every listed tool must exist in `catalog`
    pub fn build(
        &self,
        adapter: Arc<dyn ModelAdapter>,
        catalog: &ToolRegistry,
        retriever: Option<Arc<dyn Retriever>>,
    ) -> Result<Orchestrator> {
        let tools = catalog.subset(&self.tools)?;
        Ok(Orchestrator::new(adapter, Arc::new(tools), retriever, self.config.clone()))
    }
}
