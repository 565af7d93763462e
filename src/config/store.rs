//! Live configuration store.
//!
//! Holds the current snapshot behind an [`ArcSwap`] so that a request can pin
//! one consistent `Arc<AppConfig>` for its whole lifetime while reloads and
//! administrative writes swap in new snapshots underneath it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde_json::{Map, Value};

use crate::config::loader::{load_config, save_config, ConfigError};
use crate::config::schema::AppConfig;
use crate::config::validation::validate_config;
use crate::observability::metrics;

/// Sections a full replacement must carry.
pub const REQUIRED_SECTIONS: [&str; 4] = ["database", "server", "retry", "features"];

/// Sections a partial update may touch. Anything else in a patch is ignored.
pub const MERGEABLE_SECTIONS: [&str; 6] =
    ["database", "server", "retry", "features", "bulkhead", "gatekeeper"];

pub struct ConfigStore {
    current: ArcSwap<AppConfig>,
    path: Option<PathBuf>,
}

impl ConfigStore {
    /// Create a store that is not backed by a file (tests, ephemeral runs).
    pub fn in_memory(config: AppConfig) -> Self {
        Self {
            current: ArcSwap::from_pointee(config),
            path: None,
        }
    }

    /// Load the store from a TOML file.
    pub fn open(path: &Path) -> Result<Self, ConfigError> {
        let config = load_config(path)?;
        Ok(Self {
            current: ArcSwap::from_pointee(config),
            path: Some(path.to_path_buf()),
        })
    }

    /// Back a store with `path`, writing `config` there first.
    pub fn create(path: &Path, config: AppConfig) -> Result<Self, ConfigError> {
        validate_config(&config).map_err(ConfigError::Validation)?;
        save_config(path, &config)?;
        Ok(Self {
            current: ArcSwap::from_pointee(config),
            path: Some(path.to_path_buf()),
        })
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<AppConfig> {
        self.current.load_full()
    }

    /// Swap in an already validated snapshot (watcher path).
    pub fn install(&self, config: AppConfig, source: &'static str) {
        self.current.store(Arc::new(config));
        metrics::record_config_reload(source);
        tracing::info!(source, "Configuration snapshot swapped");
    }

    /// Re-read the backing file and swap it in.
    pub fn reload(&self) -> Result<Arc<AppConfig>, ConfigError> {
        let Some(path) = &self.path else {
            return Ok(self.snapshot());
        };
        let config = load_config(path)?;
        self.install(config, "reload");
        Ok(self.snapshot())
    }

    /// Replace the whole configuration.
    ///
    /// The body must contain every section in [`REQUIRED_SECTIONS`], each of
    /// which replaces the live section wholesale. `bulkhead` and `gatekeeper`
    /// are replaced when present and otherwise keep their live values.
    /// `identity` and `observability` always come from the live snapshot.
    pub fn replace(&self, body: Value) -> Result<Arc<AppConfig>, ConfigError> {
        let missing: Vec<&'static str> = REQUIRED_SECTIONS
            .iter()
            .copied()
            .filter(|section| body.get(section).map_or(true, Value::is_null))
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Incomplete(missing));
        }

        let mut replaced = serde_json::to_value(self.snapshot().as_ref())?;
        if let (Value::Object(target), Value::Object(sections)) = (&mut replaced, body) {
            for (section, value) in sections {
                if value.is_null() || !MERGEABLE_SECTIONS.contains(&section.as_str()) {
                    continue;
                }
                target.insert(section, value);
            }
        }

        let config: AppConfig = serde_json::from_value(replaced)?;
        self.commit(config, "replace")
    }

    /// Merge a partial update into the current snapshot.
    ///
    /// Each recognized section present in `patch` is merged field-by-field
    /// into the current section. Unrecognized keys are ignored and sections
    /// not named in the patch are left untouched.
    pub fn merge(&self, patch: Value) -> Result<Arc<AppConfig>, ConfigError> {
        let current = self.snapshot();
        let mut merged = serde_json::to_value(current.as_ref())?;

        if let (Value::Object(target), Value::Object(updates)) = (&mut merged, patch) {
            for (section, update) in updates {
                if !MERGEABLE_SECTIONS.contains(&section.as_str()) {
                    tracing::debug!(section = %section, "Ignoring unrecognized config section");
                    continue;
                }
                let Value::Object(fields) = update else {
                    continue;
                };
                let entry = target
                    .entry(section)
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Value::Object(existing) = entry {
                    existing.extend(fields);
                }
            }
        }

        let config: AppConfig = serde_json::from_value(merged)?;
        self.commit(config, "merge")
    }

    fn commit(&self, config: AppConfig, source: &'static str) -> Result<Arc<AppConfig>, ConfigError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        if let Some(path) = &self.path {
            save_config(path, &config)?;
        }
        self.install(config, source);
        Ok(self.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_snapshot_is_stable_across_swaps() {
        let store = ConfigStore::in_memory(AppConfig::default());
        let pinned = store.snapshot();

        store.merge(json!({ "retry": { "max_retries": 9 } })).unwrap();

        assert_eq!(pinned.retry.max_retries, 3);
        assert_eq!(store.snapshot().retry.max_retries, 9);
    }

    #[test]
    fn test_merge_only_touches_named_fields() {
        let store = ConfigStore::in_memory(AppConfig::default());
        let updated = store
            .merge(json!({
                "retry": { "initial_delay_ms": 50 },
                "bogus": { "anything": true },
                "identity": { "mode": "header" },
            }))
            .unwrap();

        assert_eq!(updated.retry.initial_delay_ms, 50);
        assert_eq!(updated.retry.max_retries, 3);
        assert_eq!(updated.retry.backoff_multiplier, 2.0);
        // identity is not mergeable through the admin surface
        assert_eq!(updated.identity, AppConfig::default().identity);
        assert_eq!(updated.bulkhead, AppConfig::default().bulkhead);
    }

    #[test]
    fn test_merge_adds_group_limit() {
        let store = ConfigStore::in_memory(AppConfig::default());
        let updated = store
            .merge(json!({ "bulkhead": { "concurrency": { "reports": 2 } } }))
            .unwrap();
        // Field-level merge: the concurrency map is replaced as one field.
        assert_eq!(updated.group_limit("reports"), 2);
        assert_eq!(updated.bulkhead.concurrency.len(), 1);
    }

    #[test]
    fn test_invalid_merge_keeps_live_snapshot() {
        let store = ConfigStore::in_memory(AppConfig::default());
        let err = store
            .merge(json!({ "retry": { "backoff_multiplier": 0.1 } }))
            .unwrap_err();
        assert!(err.is_client_error());
        assert_eq!(store.snapshot().retry.backoff_multiplier, 2.0);
    }

    #[test]
    fn test_replace_requires_core_sections() {
        let store = ConfigStore::in_memory(AppConfig::default());
        let err = store.replace(json!({ "server": { "port": 8080 } })).unwrap_err();
        match err {
            ConfigError::Incomplete(missing) => {
                assert_eq!(missing, vec!["database", "retry", "features"]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_replace_keeps_live_identity() {
        let mut live = AppConfig::default();
        live.identity.jwt_secret = "operator-chosen-secret".into();
        live.gatekeeper.rate_limit_max_requests = 7;
        let store = ConfigStore::in_memory(live);

        let replaced = store
            .replace(json!({
                "database": {},
                "server": { "port": 4200 },
                "retry": { "max_retries": 1 },
                "features": {},
                "identity": { "jwt_secret": "secretkey", "mode": "header" },
            }))
            .unwrap();

        assert_eq!(replaced.server.port, 4200);
        assert_eq!(replaced.retry.max_retries, 1);
        // unspecified fields of a replaced section fall back to defaults
        assert_eq!(replaced.retry.initial_delay_ms, AppConfig::default().retry.initial_delay_ms);
        assert_eq!(replaced.identity.jwt_secret, "operator-chosen-secret");
        assert_eq!(replaced.identity.mode, crate::config::IdentityMode::Token);
        assert_eq!(replaced.gatekeeper.rate_limit_max_requests, 7);
    }

    #[test]
    fn test_replace_persists_to_disk() {
        let path = std::env::temp_dir().join(format!("taskhub-store-{}.toml", uuid::Uuid::new_v4()));
        let store = ConfigStore::create(&path, AppConfig::default()).unwrap();

        let mut body = serde_json::to_value(AppConfig::default()).unwrap();
        body["server"]["port"] = json!(4100);
        store.replace(body).unwrap();

        let reopened = ConfigStore::open(&path).unwrap();
        assert_eq!(reopened.snapshot().server.port, 4100);

        std::fs::remove_file(&path).unwrap_or_default();
    }
}
