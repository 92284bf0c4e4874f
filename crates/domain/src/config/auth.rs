use super::{ConfigError, ConfigSeverity};
use serde::{Deserialize, Serialize};

/// Auth-related configuration. `jwt_secret` is normally supplied via the
/// `JWT_SECRET` environment variable (spec §6) rather than the YAML file;
/// it is `Option` here so `validate` can flag its absence explicitly.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub jwt_secret: Option<String>,
    #[serde(default = "default_confirmation_ttl")]
    pub confirmation_ttl_seconds: u64,
}

fn default_confirmation_ttl() -> u64 {
    300
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            jwt_secret: None,
            confirmation_ttl_seconds: default_confirmation_ttl(),
        }
    }
}

impl AuthConfig {
    pub fn validate(&self, issues: &mut Vec<ConfigError>) {
        match &self.jwt_secret {
            Some(s) if !s.trim().is_empty() => {}
            _ => issues.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "auth.jwt_secret".into(),
                message: "JWT_SECRET must be set".into(),
            }),
        }
        if self.confirmation_ttl_seconds == 0 {
            issues.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "auth.confirmation_ttl_seconds".into(),
                message: "must be greater than zero".into(),
            });
        }
    }
}
