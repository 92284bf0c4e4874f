use super::{ConfigError, ConfigSeverity};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_model() -> String {
    "default".into()
}
fn default_timeout_ms() -> u64 {
    10_000
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_tokens() -> u32 {
    1024
}

impl Default for LlmConfig {
    fn default() -> Self {
        LlmConfig {
            model: default_model(),
            timeout_ms: default_timeout_ms(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl LlmConfig {
    pub fn validate(&self, issues: &mut Vec<ConfigError>) {
        if self.timeout_ms == 0 {
            issues.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "llm.timeout_ms".into(),
                message: "must be greater than zero".into(),
            });
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            issues.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "llm.temperature".into(),
                message: "outside the conventional 0.0-2.0 range".into(),
            });
        }
    }
}
