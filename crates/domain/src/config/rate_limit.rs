use super::{ConfigError, ConfigSeverity};
use serde::{Deserialize, Serialize};

/// Pinned rate-limit policy (spec §9 open question: "policies must be
/// pinned in configuration rather than inferred"). Bucket key is
/// `(user_id, bucket)`; enforcement happens in the gateway's
/// `tower_governor` layer, not here.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
    #[serde(default = "default_burst")]
    pub burst: u32,
}

fn default_bucket() -> String {
    "chat".into()
}
fn default_window_seconds() -> u64 {
    60
}
fn default_burst() -> u32 {
    30
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        RateLimitConfig {
            bucket: default_bucket(),
            window_seconds: default_window_seconds(),
            burst: default_burst(),
        }
    }
}

impl RateLimitConfig {
    pub fn validate(&self, issues: &mut Vec<ConfigError>) {
        if self.window_seconds == 0 {
            issues.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "rate_limit.window_seconds".into(),
                message: "must be greater than zero".into(),
            });
        }
        if self.burst == 0 {
            issues.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "rate_limit.burst".into(),
                message: "must be greater than zero".into(),
            });
        }
    }
}
