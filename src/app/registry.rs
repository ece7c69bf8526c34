// LogTrail - app/registry.rs
//
// Provider registry: maps a provider kind to its description and constructor.
// Built once at process start and passed to whatever creates providers.

use crate::app::provider::{
    FileMonitoringProvider, LogProvider, ProviderInfo, ProviderSettings, FILE_MONITOR_INFO,
};
use crate::util::error::{ConfigurationError, LogTrailError, Result};
use std::collections::BTreeMap;

/// Builds a provider from its settings.
pub type ProviderConstructor = fn(ProviderSettings) -> Result<Box<dyn LogProvider>>;

struct Registration {
    info: ProviderInfo,
    construct: ProviderConstructor,
}

/// Known provider kinds.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<&'static str, Registration>,
}

impl ProviderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in provider kind.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(FILE_MONITOR_INFO, FileMonitoringProvider::from_settings);
        registry
    }

    /// Register (or replace) a provider kind.
    pub fn register(&mut self, info: ProviderInfo, construct: ProviderConstructor) {
        if self
            .providers
            .insert(info.kind, Registration { info, construct })
            .is_some()
        {
            tracing::warn!(kind = info.kind, "Provider kind registered twice, replacing");
        } else {
            tracing::debug!(kind = info.kind, name = info.name, "Provider registered");
        }
    }

    pub fn info(&self, kind: &str) -> Option<ProviderInfo> {
        self.providers.get(kind).map(|r| r.info)
    }

    /// Descriptions of all registered kinds, ordered by kind.
    pub fn all(&self) -> Vec<ProviderInfo> {
        self.providers.values().map(|r| r.info).collect()
    }

    /// Construct a provider for `settings`.
    pub fn create(&self, settings: ProviderSettings) -> Result<Box<dyn LogProvider>> {
        let registration = self.providers.get(settings.kind()).ok_or_else(|| {
            LogTrailError::from(ConfigurationError::UnknownProviderKind {
                kind: settings.kind().to_string(),
            })
        })?;
        (registration.construct)(settings)
    }
}
