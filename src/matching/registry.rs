// src/matching/registry.rs - Deduplication of raw records into unique names
use log::debug;
use rayon::prelude::*;
use std::collections::HashMap;

use super::name::{standardize_strong, standardize_weak};
use crate::errors::ResolveError;
use crate::models::core::{NameId, RawNameRecord, UniqueName};
use crate::models::stats_models::IngestStats;

/// Distinct weak-standardized names of one run.
///
/// Ids are assigned after sorting the names, so the id of a name depends only
/// on the set of names in the run and never on record order.
#[derive(Debug, Clone, Default)]
pub struct NameRegistry {
    names: Vec<UniqueName>,
    lookup: HashMap<String, NameId>,
    occurrences: Vec<u64>,
    // Raw spelling the strong form is derived from, one per name id.
    representatives: Vec<String>,
}

/// Raw spellings seen for one weak form.
#[derive(Debug, Default)]
struct SpellingTally {
    total: u64,
    spellings: HashMap<String, u64>,
}

impl SpellingTally {
    fn add(&mut self, raw: &str) {
        self.total += 1;
        match self.spellings.get_mut(raw) {
            Some(count) => *count += 1,
            None => {
                self.spellings.insert(raw.to_string(), 1);
            }
        }
    }

    /// Most frequent spelling; ties go to the smallest string.
    fn representative(self) -> String {
        self.spellings
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
            .map(|(raw, _)| raw)
            .unwrap_or_default()
    }
}

impl NameRegistry {
    /// Standardizes every record and keeps one entry per distinct weak form.
    /// Records without a name or with an empty weak form are counted, not kept.
    pub fn build<'a, I>(records: I, max_unique_names: usize) -> Result<(Self, IngestStats), ResolveError>
    where
        I: IntoIterator<Item = &'a RawNameRecord>,
    {
        let limit = max_unique_names.min(NameId::MAX as usize);
        let mut stats = IngestStats::default();
        let mut tallies: HashMap<String, SpellingTally> = HashMap::new();

        for record in records {
            stats.total_records += 1;
            let Some(raw) = record.raw_name.as_deref() else {
                stats.missing_names += 1;
                continue;
            };
            let weak = standardize_weak(raw);
            if weak.is_empty() {
                stats.empty_after_standardization += 1;
                continue;
            }
            if let Some(tally) = tallies.get_mut(&weak) {
                tally.add(raw);
                continue;
            }
            if tallies.len() >= limit {
                return Err(ResolveError::CapacityExceeded {
                    limit,
                    unique_names: tallies.len() + 1,
                });
            }
            tallies.entry(weak).or_default().add(raw);
        }

        let mut sorted: Vec<(String, SpellingTally)> = tallies.into_iter().collect();
        sorted.sort_unstable_by(|a, b| a.0.cmp(&b.0));

        let mut registry = NameRegistry {
            names: Vec::with_capacity(sorted.len()),
            lookup: HashMap::with_capacity(sorted.len()),
            occurrences: Vec::with_capacity(sorted.len()),
            representatives: Vec::with_capacity(sorted.len()),
        };
        for (idx, (weak, tally)) in sorted.into_iter().enumerate() {
            let name_id = idx as NameId;
            registry.lookup.insert(weak.clone(), name_id);
            registry.names.push(UniqueName { name_id, standardized_weak: weak });
            registry.occurrences.push(tally.total);
            registry.representatives.push(tally.representative());
        }
        stats.unique_names = registry.len();

        debug!(
            "Registry: {} records -> {} unique names ({} missing, {} empty)",
            stats.total_records, stats.unique_names, stats.missing_names, stats.empty_after_standardization
        );
        Ok((registry, stats))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[UniqueName] {
        &self.names
    }

    pub fn name(&self, name_id: NameId) -> Option<&str> {
        self.names
            .get(name_id as usize)
            .map(|n| n.standardized_weak.as_str())
    }

    pub fn occurrences(&self, name_id: NameId) -> u64 {
        self.occurrences.get(name_id as usize).copied().unwrap_or(0)
    }

    /// The raw spelling that stands for `name_id` when strong-standardizing.
    pub fn representative(&self, name_id: NameId) -> Option<&str> {
        self.representatives.get(name_id as usize).map(String::as_str)
    }

    /// Strong form of every name, indexed by name id.
    ///
    /// Derived from the representative raw spelling: weak standardization has
    /// already dropped the `;`, `,` and `(` that mark postscripts.
    pub fn strong_forms(&self) -> Vec<String> {
        self.representatives
            .par_iter()
            .map(|raw| standardize_strong(raw))
            .collect()
    }

    pub fn id_of_weak(&self, weak: &str) -> Option<NameId> {
        self.lookup.get(weak).copied()
    }

    /// Weak-standardizes `raw` and looks it up.
    pub fn id_of_raw(&self, raw: &str) -> Option<NameId> {
        self.id_of_weak(&standardize_weak(raw))
    }
}
