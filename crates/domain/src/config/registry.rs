use super::{ConfigError, ConfigSeverity};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryConfig {
    #[serde(default = "default_ttl")]
    pub manifest_cache_ttl: u64,
    #[serde(default = "default_health_interval")]
    pub health_check_interval: u64,
    #[serde(default = "default_timeout")]
    pub default_timeout: u64,
    #[serde(default = "default_max_candidates")]
    pub max_routing_candidates: usize,
}

fn default_ttl() -> u64 {
    300
}
fn default_health_interval() -> u64 {
    60
}
fn default_timeout() -> u64 {
    30_000
}
fn default_max_candidates() -> usize {
    15
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            manifest_cache_ttl: default_ttl(),
            health_check_interval: default_health_interval(),
            default_timeout: default_timeout(),
            max_routing_candidates: default_max_candidates(),
        }
    }
}

impl RegistryConfig {
    pub fn validate(&self, issues: &mut Vec<ConfigError>) {
        if self.manifest_cache_ttl == 0 {
            issues.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "registry.manifestCacheTTL".into(),
                message: "must be greater than zero".into(),
            });
        }
        if self.default_timeout == 0 {
            issues.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "registry.defaultTimeout".into(),
                message: "must be greater than zero".into(),
            });
        }
        if self.max_routing_candidates == 0 {
            issues.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "registry.maxRoutingCandidates".into(),
                message: "zero candidates means retrieval always returns none".into(),
            });
        }
    }
}
