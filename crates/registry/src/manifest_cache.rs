//! TTL-keyed tool manifest cache with background refresh (spec §4.1).

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use yukie_domain::model::{ActionsResponse, ToolManifest, ToolSchema};
use yukie_domain::Result;

type RefreshFuture = Pin<Box<dyn Future<Output = Result<ToolManifest>> + Send>>;
type RefreshFn = Arc<dyn Fn(String) -> RefreshFuture + Send + Sync>;

struct CacheEntry {
    manifest: ToolManifest,
    fetched_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    version: String,
    etag: Option<String>,
}

#[derive(Default)]
pub struct SetOptions {
    pub ttl_seconds: Option<u64>,
    pub etag: Option<String>,
}

/// Maps `serviceId -> {manifest, fetchedAt, expiresAt, version, etag}`.
///
/// Invariant: `get` never returns an expired entry — it may instead return
/// `None` while a refresh is in flight.
pub struct ManifestCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    refresh_callbacks: RwLock<HashMap<String, RefreshFn>>,
    default_ttl_seconds: u64,
}

impl ManifestCache {
    pub fn new(default_ttl_seconds: u64) -> Self {
        ManifestCache {
            entries: RwLock::new(HashMap::new()),
            refresh_callbacks: RwLock::new(HashMap::new()),
            default_ttl_seconds,
        }
    }

    /// Never returns an expired manifest.
    pub fn get(&self, service_id: &str) -> Option<ToolManifest> {
        let entries = self.entries.read();
        let entry = entries.get(service_id)?;
        if Utc::now() < entry.expires_at {
            Some(entry.manifest.clone())
        } else {
            None
        }
    }

    pub fn set(&self, service_id: &str, manifest: ToolManifest, opts: SetOptions) {
        let ttl = opts.ttl_seconds.unwrap_or(self.default_ttl_seconds);
        let now = Utc::now();
        let expires_at = now + ChronoDuration::seconds(ttl as i64);
        let version = manifest.version.clone();
        self.entries.write().insert(
            service_id.to_string(),
            CacheEntry {
                manifest,
                fetched_at: now,
                expires_at,
                version,
                etag: opts.etag,
            },
        );
    }

    /// Builds a tool schema list from a raw `actions` response and caches it.
    pub fn set_from_actions(
        &self,
        service_id: &str,
        service_name: &str,
        actions: ActionsResponse,
        opts: SetOptions,
    ) {
        let tools: Vec<ToolSchema> = actions.actions.into_iter().map(ToolSchema::from).collect();
        let now = Utc::now();
        let manifest = ToolManifest {
            service_id: service_id.to_string(),
            service_name: service_name.to_string(),
            version: opts
                .etag
                .clone()
                .unwrap_or_else(|| now.timestamp().to_string()),
            protocol_version: "1".to_string(),
            tools,
            fetched_at: now,
            expires_at: now, // overwritten by `set`
        };
        self.set(service_id, manifest, opts);
    }

    pub fn invalidate(&self, service_id: &str) {
        self.entries.write().remove(service_id);
    }

    pub fn invalidate_all(&self) {
        self.entries.write().clear();
    }

    pub fn has_version_changed(&self, service_id: &str, version: &str) -> bool {
        match self.entries.read().get(service_id) {
            Some(entry) => entry.version != version,
            None => true,
        }
    }

    pub fn register_refresh_callback(&self, service_id: &str, callback: RefreshFn) {
        self.refresh_callbacks
            .write()
            .insert(service_id.to_string(), callback);
    }

    /// Drops every expired entry, returning the number removed.
    pub fn cleanup(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Services whose remaining TTL is under 20% of their configured TTL
    /// and that have a registered refresh callback.
    fn due_for_refresh(&self) -> Vec<(String, RefreshFn)> {
        let entries = self.entries.read();
        let callbacks = self.refresh_callbacks.read();
        let now = Utc::now();
        entries
            .iter()
            .filter_map(|(id, entry)| {
                let callback = callbacks.get(id)?;
                let total = (entry.expires_at - entry.fetched_at).num_seconds().max(1);
                let remaining = (entry.expires_at - now).num_seconds();
                if remaining < total / 5 {
                    Some((id.clone(), callback.clone()))
                } else {
                    None
                }
            })
            .collect()
    }

    async fn refresh_due_entries(self: &Arc<Self>) {
        for (service_id, callback) in self.due_for_refresh() {
            match callback(service_id.clone()).await {
                Ok(manifest) => {
                    self.set(&service_id, manifest, SetOptions::default());
                }
                Err(err) => {
                    tracing::warn!(
                        service_id = %service_id,
                        error = %err,
                        "manifest refresh failed, keeping stale entry until it truly expires"
                    );
                }
            }
        }
    }

    /// Spawns a periodic background task that refreshes entries nearing
    /// expiry. Returns a handle that, when dropped or aborted, stops the
    /// task promptly (spec §9 "must stop promptly").
    pub fn start_background_refresh(
        self: &Arc<Self>,
        interval_seconds: u64,
    ) -> tokio::task::JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_seconds));
            loop {
                ticker.tick().await;
                cache.refresh_due_entries().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn manifest(service_id: &str, version: &str) -> ToolManifest {
        let now = Utc::now();
        ToolManifest {
            service_id: service_id.to_string(),
            service_name: "svc".into(),
            version: version.to_string(),
            protocol_version: "1".into(),
            tools: vec![],
            fetched_at: now,
            expires_at: now,
        }
    }

    #[test]
    fn get_returns_none_when_absent() {
        let cache = ManifestCache::new(60);
        assert!(cache.get("svc").is_none());
    }

    #[test]
    fn set_then_get_roundtrips() {
        let cache = ManifestCache::new(60);
        cache.set("svc", manifest("svc", "1"), SetOptions::default());
        let got = cache.get("svc").unwrap();
        assert_eq!(got.version, "1");
    }

    #[test]
    fn expired_entry_is_never_returned() {
        let cache = ManifestCache::new(60);
        cache.set(
            "svc",
            manifest("svc", "1"),
            SetOptions {
                ttl_seconds: Some(0),
                etag: None,
            },
        );
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("svc").is_none());
    }

    #[test]
    fn invalidate_removes_entry() {
        let cache = ManifestCache::new(60);
        cache.set("svc", manifest("svc", "1"), SetOptions::default());
        cache.invalidate("svc");
        assert!(cache.get("svc").is_none());
    }

    #[test]
    fn has_version_changed_detects_absence_and_mismatch() {
        let cache = ManifestCache::new(60);
        assert!(cache.has_version_changed("svc", "1"));
        cache.set("svc", manifest("svc", "1"), SetOptions::default());
        assert!(!cache.has_version_changed("svc", "1"));
        assert!(cache.has_version_changed("svc", "2"));
    }

    #[test]
    fn cleanup_drops_only_expired() {
        let cache = ManifestCache::new(60);
        cache.set("fresh", manifest("fresh", "1"), SetOptions::default());
        cache.set(
            "stale",
            manifest("stale", "1"),
            SetOptions {
                ttl_seconds: Some(0),
                etag: None,
            },
        );
        std::thread::sleep(Duration::from_millis(5));
        let removed = cache.cleanup();
        assert_eq!(removed, 1);
        assert!(cache.get("fresh").is_some());
    }

    #[tokio::test]
    async fn due_for_refresh_only_includes_near_expiry_with_callback() {
        let cache = Arc::new(ManifestCache::new(60));
        cache.set(
            "near",
            manifest("near", "1"),
            SetOptions {
                ttl_seconds: Some(10),
                etag: None,
            },
        );
        cache.set("far", manifest("far", "1"), SetOptions::default());

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        cache.register_refresh_callback(
            "near",
            Arc::new(move |id: String| {
                let calls = Arc::clone(&calls_clone);
                Box::pin(async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(manifest(&id, "2"))
                })
            }),
        );

        // Manually age the "near" entry past the 20% threshold by re-setting
        // with a TTL so small that "now" is already within the last 20%.
        cache.set(
            "near",
            manifest("near", "1"),
            SetOptions {
                ttl_seconds: Some(1),
                etag: None,
            },
        );
        tokio::time::sleep(Duration::from_millis(900)).await;

        cache.refresh_due_entries().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get("near").unwrap().version, "2");
    }
}
