//! Declarative configuration (spec §6) and its validation.

mod auth;
mod llm;
mod rate_limit;
mod registry;
mod server;

pub use auth::AuthConfig;
pub use llm::LlmConfig;
pub use rate_limit::RateLimitConfig;
pub use registry::RegistryConfig;
pub use server::ServerConfig;

use crate::model::ServiceDefinition;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub services: Vec<ServiceDefinition>,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARNING",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Collects every configuration problem rather than short-circuiting
    /// on the first one, so operators see the full picture in one pass.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut issues = Vec::new();

        self.registry.validate(&mut issues);
        self.server.validate(&mut issues);
        self.auth.validate(&mut issues);
        self.rate_limit.validate(&mut issues);
        self.llm.validate(&mut issues);

        let mut seen = std::collections::HashSet::new();
        for svc in &self.services {
            if !seen.insert(svc.id.clone()) {
                issues.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("services[{}].id", svc.id),
                    message: "duplicate service id".into(),
                });
            }
            if !(svc.base_url.starts_with("http://") || svc.base_url.starts_with("https://")) {
                issues.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("services[{}].base_url", svc.id),
                    message: "base_url must start with http:// or https://".into(),
                });
            }
        }
        if self.services.is_empty() {
            issues.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "services".into(),
                message: "no services configured — registry will route nothing".into(),
            });
        }

        issues
    }

    pub fn has_errors(issues: &[ConfigError]) -> bool {
        issues.iter().any(|i| i.severity == ConfigSeverity::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AuthMethod, RiskLevel, ServiceAuth, ServiceEndpoints, Transport};

    fn valid_service(id: &str) -> ServiceDefinition {
        ServiceDefinition {
            id: id.into(),
            name: id.into(),
            description: "test service".into(),
            base_url: "https://svc.example.com".into(),
            transport: Transport::Http,
            auth: ServiceAuth {
                method: AuthMethod::Bearer,
                required_scopes: vec![],
            },
            endpoints: ServiceEndpoints {
                health: "/health".into(),
                meta: "/meta".into(),
                actions: "/actions".into(),
                invoke: "/invoke".into(),
            },
            capabilities: vec![],
            tags: vec![],
            keywords: vec![],
            risk_level: RiskLevel::Low,
            enabled: true,
            priority: 0,
        }
    }

    fn valid_config() -> Config {
        Config {
            registry: RegistryConfig::default(),
            services: vec![valid_service("svc-a")],
            server: ServerConfig::default(),
            auth: AuthConfig {
                jwt_secret: Some("s3cret".into()),
                ..AuthConfig::default()
            },
            rate_limit: RateLimitConfig::default(),
            llm: LlmConfig::default(),
        }
    }

    fn find_issue<'a>(issues: &'a [ConfigError], field_contains: &str) -> Option<&'a ConfigError> {
        issues.iter().find(|i| i.field.contains(field_contains))
    }

    #[test]
    fn valid_config_has_no_errors() {
        let issues = valid_config().validate();
        assert!(!Config::has_errors(&issues), "{issues:?}");
    }

    #[test]
    fn duplicate_service_ids_rejected() {
        let mut cfg = valid_config();
        cfg.services.push(valid_service("svc-a"));
        let issues = cfg.validate();
        assert!(find_issue(&issues, "svc-a").is_some());
    }

    #[test]
    fn bad_base_url_scheme_rejected() {
        let mut cfg = valid_config();
        cfg.services[0].base_url = "ftp://svc.example.com".into();
        let issues = cfg.validate();
        assert!(find_issue(&issues, "base_url").is_some());
    }

    #[test]
    fn no_services_is_a_warning_not_an_error() {
        let mut cfg = valid_config();
        cfg.services.clear();
        let issues = cfg.validate();
        let issue = find_issue(&issues, "services").unwrap();
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }
}
