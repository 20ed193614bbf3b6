use serde::{Deserialize, Serialize};

use crate::cache::FileCache;

/// Everything that makes two generation requests equivalent for caching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system_prompt: String,
    pub model: String,
    pub temperature: f64,
}

impl GenerationRequest {
    pub fn new(
        prompt: impl Into<String>,
        system_prompt: impl Into<String>,
        model: impl Into<String>,
        temperature: f64,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: system_prompt.into(),
            model: model.into(),
            temperature,
        }
    }

    /// Cache fingerprint of this request
    pub fn fingerprint(&self) -> String {
        FileCache::generate_key(&self.prompt, &self.system_prompt, &self.model, self.temperature)
    }
}

/// Text produced by a generation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    pub text: String,
    /// Tokens billed for this call; 0 when served from cache
    pub tokens_used: u64,
    #[serde(default)]
    pub cached: bool,
}

impl Generation {
    pub fn new(text: impl Into<String>, tokens_used: u64) -> Self {
        Self {
            text: text.into(),
            tokens_used,
            cached: false,
        }
    }

    pub(crate) fn from_cache(text: String) -> Self {
        Self {
            text,
            tokens_used: 0,
            cached: true,
        }
    }
}
