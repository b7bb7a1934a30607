//! Source-based filtering for firm resolution
//! Restricts a run to records from selected source tables (e.g. only grants and assignees)

use log::{debug, info, warn};
use std::collections::{BTreeMap, HashSet};

use super::env::{parse_var, process_env};
use crate::models::core::{source_tags, RawNameRecord};

#[derive(Debug, Clone, Default)]
pub struct SourceFilterConfig {
    pub enabled: bool,
    pub allowed_sources: Vec<String>,
}

impl SourceFilterConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(process_env)
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let enabled = parse_var(&lookup, "SOURCE_FILTER_ENABLED", false);

        let allowed_sources = if enabled {
            lookup("ALLOWED_SOURCES")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        } else {
            Vec::new()
        };

        debug!("Source filter config: enabled={}, sources={:?}", enabled, allowed_sources);

        Self { enabled, allowed_sources }
    }

    /// Check if filtering is effectively enabled (both flag and sources present)
    pub fn is_active(&self) -> bool {
        self.enabled && !self.allowed_sources.is_empty()
    }

    pub fn allows(&self, source_tag: &str) -> bool {
        !self.is_active() || self.allowed_sources.iter().any(|s| s == source_tag)
    }

    /// Splits `records` into the kept ones and the number dropped.
    pub fn apply(&self, records: Vec<RawNameRecord>) -> (Vec<RawNameRecord>, usize) {
        if !self.is_active() {
            return (records, 0);
        }
        let before = records.len();
        let kept: Vec<RawNameRecord> = records
            .into_iter()
            .filter(|r| self.allows(&r.source_tag))
            .collect();
        let dropped = before - kept.len();
        (kept, dropped)
    }

    /// Log the current configuration
    pub fn log_config(&self) {
        if self.is_active() {
            info!("🔍 Source filtering ENABLED");
            info!("   Allowed sources: {:?}", self.allowed_sources);
        } else {
            info!("🔍 Source filtering DISABLED - resolving all sources");
        }
    }

    /// Warns about allowed sources that never occur in the loaded records,
    /// and about tags outside the usual source set.
    pub fn validate_sources(&self, records: &[RawNameRecord]) {
        if !self.is_active() {
            return;
        }

        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for record in records {
            *counts.entry(record.source_tag.as_str()).or_insert(0) += 1;
        }

        let found: HashSet<&str> = counts.keys().copied().collect();
        let missing: Vec<&String> = self
            .allowed_sources
            .iter()
            .filter(|s| !found.contains(s.as_str()))
            .collect();
        if !missing.is_empty() {
            warn!("⚠️ Allowed sources not present in input: {:?}", missing);
        }

        let unusual: Vec<&String> = self
            .allowed_sources
            .iter()
            .filter(|s| !source_tags::KNOWN.contains(&s.as_str()))
            .collect();
        if !unusual.is_empty() {
            warn!("⚠️ Allowed sources outside the known tag set: {:?}", unusual);
        }

        for source in &self.allowed_sources {
            if let Some(count) = counts.get(source.as_str()) {
                info!("   {}: {} records", source, count);
            }
        }
    }
}
