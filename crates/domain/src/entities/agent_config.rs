//! Agent configuration - Settings for an AI assistant persona
//!
//! Only the settings are stored here; talking to a provider is out of scope.

use serde::{Deserialize, Serialize};

use crate::ids::ObjId;
use crate::object::domain_object;
use crate::registry::AGENT_CONFIG;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub obj_id: ObjId,
    pub name: String,
    pub provider: String,
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: i64,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> i64 {
    1024
}

impl AgentConfig {
    pub fn new(
        name: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            obj_id: ObjId::draft(AGENT_CONFIG.prefix),
            name: name.into(),
            provider: provider.into(),
            model: model.into(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            system_prompt: None,
        }
    }
}

domain_object!(AgentConfig, AGENT_CONFIG);
