//! Authoritative service list, health probing, and indexed queries (spec §4.3).

use crate::capability_index::CapabilityIndex;
use crate::manifest_cache::{ManifestCache, SetOptions};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;
use yukie_domain::model::{ActionsResponse, RegistryStats, RiskLevel, ServiceDefinition};
use yukie_domain::{Error, Result};

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

struct HealthStatus {
    ok: bool,
    last_check: chrono::DateTime<chrono::Utc>,
}

#[derive(Default)]
pub struct QueryFilter {
    pub keywords: Vec<String>,
    pub tags: Vec<String>,
    pub capabilities: Vec<String>,
    pub risk_level: Option<RiskLevel>,
    pub enabled_only: bool,
    pub healthy_only: bool,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct QueryMatch {
    pub service_id: String,
    pub score: f64,
}

pub struct QueryResult {
    pub services: Vec<ServiceDefinition>,
    pub matches: Vec<QueryMatch>,
    pub query_time_ms: u64,
}

pub struct ServiceRegistry {
    services: RwLock<HashMap<String, ServiceDefinition>>,
    health: RwLock<HashMap<String, HealthStatus>>,
    index: CapabilityIndex,
    pub manifest_cache: ManifestCache,
    http: reqwest::Client,
}

impl ServiceRegistry {
    pub fn new(manifest_ttl_seconds: u64) -> Self {
        ServiceRegistry {
            services: RwLock::new(HashMap::new()),
            health: RwLock::new(HashMap::new()),
            index: CapabilityIndex::new(),
            manifest_cache: ManifestCache::new(manifest_ttl_seconds),
            http: reqwest::Client::new(),
        }
    }

    pub fn load_from_yaml(&self, services: Vec<ServiceDefinition>) -> Result<()> {
        for svc in services {
            self.register(svc)?;
        }
        Ok(())
    }

    pub fn register(&self, def: ServiceDefinition) -> Result<()> {
        self.index.add_service(
            &def.id,
            &def.name,
            &def.description,
            def.priority,
            &def.keywords,
            &def.tags,
            &def.capabilities,
        );
        self.services.write().insert(def.id.clone(), def);
        Ok(())
    }

    pub fn unregister(&self, id: &str) {
        self.services.write().remove(id);
        self.health.write().remove(id);
        self.manifest_cache.invalidate(id);
        self.index.remove_service(id);
    }

    pub fn get(&self, id: &str) -> Option<ServiceDefinition> {
        self.services.read().get(id).cloned()
    }

    pub fn get_all(&self) -> Vec<ServiceDefinition> {
        self.services.read().values().cloned().collect()
    }

    pub fn get_enabled(&self) -> Vec<ServiceDefinition> {
        self.services
            .read()
            .values()
            .filter(|s| s.enabled)
            .cloned()
            .collect()
    }

    pub async fn fetch_meta(&self, id: &str) -> Result<serde_json::Value> {
        let svc = self
            .get(id)
            .ok_or_else(|| Error::BadRequest(format!("unknown service {id}")))?;
        let url = format!("{}{}", svc.base_url, svc.endpoints.meta);
        let resp = self
            .http
            .get(&url)
            .timeout(HEALTH_CHECK_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        resp.json::<serde_json::Value>()
            .await
            .map_err(|e| Error::Http(e.to_string()))
    }

    pub async fn fetch_actions(&self, id: &str) -> Result<()> {
        let svc = self
            .get(id)
            .ok_or_else(|| Error::BadRequest(format!("unknown service {id}")))?;
        let url = format!("{}{}", svc.base_url, svc.endpoints.actions);
        let resp = self
            .http
            .get(&url)
            .timeout(HEALTH_CHECK_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        let actions: ActionsResponse = resp
            .json()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        self.manifest_cache
            .set_from_actions(&svc.id, &svc.name, actions, SetOptions::default());
        let tools = self
            .manifest_cache
            .get(&svc.id)
            .map(|m| m.tools)
            .unwrap_or_default();
        self.index.add_tools(&svc.id, &tools);
        Ok(())
    }

    pub async fn check_health(&self, id: &str) -> bool {
        let Some(svc) = self.get(id) else { return false };
        let url = format!("{}{}", svc.base_url, svc.endpoints.health);
        let ok = match self.http.get(&url).timeout(HEALTH_CHECK_TIMEOUT).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::warn!(service_id = %id, error = %e, "health check failed");
                false
            }
        };
        self.health.write().insert(
            id.to_string(),
            HealthStatus {
                ok,
                last_check: chrono::Utc::now(),
            },
        );
        ok
    }

    pub async fn check_all_health(&self) {
        let ids: Vec<String> = self.services.read().keys().cloned().collect();
        let futs = ids.iter().map(|id| self.check_health(id));
        futures_util::future::join_all(futs).await;
    }

    pub fn is_healthy(&self, id: &str) -> bool {
        self.health.read().get(id).map(|h| h.ok).unwrap_or(true)
    }

    pub fn query(&self, filter: QueryFilter) -> QueryResult {
        let start = std::time::Instant::now();
        let services = self.services.read();

        let mut matches: Vec<QueryMatch> = Vec::new();
        let mut terms: Vec<String> = Vec::new();
        terms.extend(filter.keywords.iter().cloned());
        terms.extend(filter.tags.iter().cloned());
        terms.extend(filter.capabilities.iter().cloned());

        let candidates: Vec<(String, f64)> = if terms.is_empty() {
            services.keys().map(|id| (id.clone(), 0.0)).collect()
        } else {
            self.index
                .search(&terms.join(" "), services.len().max(1))
                .into_iter()
                .map(|s| (s.service_id, s.score))
                .collect()
        };

        let mut result_services = Vec::new();
        for (id, score) in candidates {
            let Some(svc) = services.get(&id) else { continue };
            if filter.enabled_only && !svc.enabled {
                continue;
            }
            if filter.healthy_only && !self.is_healthy(&id) {
                continue;
            }
            if let Some(level) = filter.risk_level {
                if svc.risk_level != level {
                    continue;
                }
            }
            matches.push(QueryMatch {
                service_id: id.clone(),
                score,
            });
            result_services.push(svc.clone());
        }

        if let Some(limit) = filter.limit {
            result_services.truncate(limit);
            matches.truncate(limit);
        }

        QueryResult {
            services: result_services,
            matches,
            query_time_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Tokenises `text` via the capability index and returns services
    /// ordered by `score × priority`.
    pub fn find_by_user_message(&self, text: &str) -> Vec<(ServiceDefinition, f64)> {
        let services = self.services.read();
        self.index
            .search(text, services.len().max(1))
            .into_iter()
            .filter_map(|scored| {
                let svc = services.get(&scored.service_id)?;
                let weighted = scored.score * (1.0 + svc.priority as f64 / 100.0);
                Some((svc.clone(), weighted))
            })
            .collect()
    }

    pub fn get_stats(&self) -> RegistryStats {
        let services = self.services.read();
        let health = self.health.read();
        RegistryStats {
            total_services: services.len(),
            enabled_services: services.values().filter(|s| s.enabled).count(),
            healthy_services: health.values().filter(|h| h.ok).count(),
            cached_manifests: self.manifest_cache.len(),
            indexed_terms: self.index.term_counts(),
        }
    }
}
