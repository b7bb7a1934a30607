// src/candidate_generation/lsh.rs
//
// Banded LSH over simhash signatures. Each band keeps its own table of
// band value -> name ids seen so far; a new name is compared only against
// ids that share at least one band value with it.

use indicatif::ProgressBar;
use log::debug;
use std::collections::{HashMap, HashSet};

use super::signature::{Signature, MAX_SIGNATURE_BITS};
use crate::errors::ResolveError;
use crate::models::core::NameId;
use crate::models::matching::CandidatePair;

const STAGE: &str = "candidate generation";

pub struct BandIndex {
    bands: usize,
    band_bits: u32,
    band_threshold: usize,
    tables: Vec<HashMap<u128, Vec<NameId>>>,
    inserted: HashSet<NameId>,
    // Reused per insert to avoid reallocating the collision counter.
    collision_counts: HashMap<NameId, usize>,
    probes: u64,
    emitted: u64,
}

impl BandIndex {
    /// `signature_bits` must split evenly into `bands`. A prior name becomes a
    /// candidate once it shares more than `band_threshold` band values.
    pub fn new(signature_bits: u32, bands: usize, band_threshold: usize) -> Result<Self, ResolveError> {
        if signature_bits == 0 || signature_bits > MAX_SIGNATURE_BITS {
            return Err(ResolveError::invalid_config(format!(
                "signature width must be in 1..={}, got {}",
                MAX_SIGNATURE_BITS, signature_bits
            )));
        }
        if bands == 0 || signature_bits as usize % bands != 0 {
            return Err(ResolveError::invalid_config(format!(
                "{} signature bits cannot be split into {} equal bands",
                signature_bits, bands
            )));
        }
        if band_threshold >= bands {
            return Err(ResolveError::invalid_config(format!(
                "band threshold {} can never be exceeded with {} bands",
                band_threshold, bands
            )));
        }
        Ok(Self {
            bands,
            band_bits: signature_bits / bands as u32,
            band_threshold,
            tables: (0..bands).map(|_| HashMap::new()).collect(),
            inserted: HashSet::new(),
            collision_counts: HashMap::new(),
            probes: 0,
            emitted: 0,
        })
    }

    pub fn band_value(&self, signature: Signature, band: usize) -> u128 {
        let shift = band as u32 * self.band_bits;
        let mask = if self.band_bits >= 128 {
            u128::MAX
        } else {
            (1u128 << self.band_bits) - 1
        };
        (signature >> shift) & mask
    }

    /// Looks up every prior name sharing a band value with `signature`, emits
    /// one pair per prior id whose collision count exceeds the threshold, then
    /// registers `name_id`. Pairs come out in ascending prior-id order.
    pub fn insert_and_query(
        &mut self,
        name_id: NameId,
        signature: Signature,
    ) -> Result<Vec<CandidatePair>, ResolveError> {
        if !self.inserted.insert(name_id) {
            return Err(ResolveError::DuplicateNameId { name_id, stage: STAGE });
        }

        self.collision_counts.clear();
        for band in 0..self.bands {
            let value = self.band_value(signature, band);
            if let Some(prior_ids) = self.tables[band].get(&value) {
                for &prior in prior_ids {
                    *self.collision_counts.entry(prior).or_insert(0) += 1;
                }
                self.probes += prior_ids.len() as u64;
            }
        }

        let mut matched: Vec<NameId> = self
            .collision_counts
            .iter()
            .filter(|(_, &count)| count > self.band_threshold)
            .map(|(&prior, _)| prior)
            .collect();
        matched.sort_unstable();

        for band in 0..self.bands {
            let value = self.band_value(signature, band);
            self.tables[band].entry(value).or_default().push(name_id);
        }

        self.emitted += matched.len() as u64;
        Ok(matched
            .into_iter()
            .map(|prior| CandidatePair::new(prior, name_id))
            .collect())
    }

    pub fn len(&self) -> usize {
        self.inserted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty()
    }

    /// Total prior ids touched across all lookups; the real cost of banding.
    pub fn probes(&self) -> u64 {
        self.probes
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    pub fn largest_bucket(&self) -> usize {
        self.tables
            .iter()
            .flat_map(|table| table.values().map(Vec::len))
            .max()
            .unwrap_or(0)
    }
}

/// Feeds `(name_id, signature)` through a fresh index and collects every
/// candidate pair, sorted. Each unordered pair appears once.
pub fn generate_candidates<I>(
    entries: I,
    signature_bits: u32,
    bands: usize,
    band_threshold: usize,
    progress: Option<&ProgressBar>,
) -> Result<(Vec<CandidatePair>, BandIndex), ResolveError>
where
    I: IntoIterator<Item = (NameId, Signature)>,
{
    let mut index = BandIndex::new(signature_bits, bands, band_threshold)?;
    let mut pairs = Vec::new();
    for (i, (name_id, signature)) in entries.into_iter().enumerate() {
        pairs.extend(index.insert_and_query(name_id, signature)?);
        if let Some(pb) = progress {
            pb.inc(1);
            if i % 10_000 == 0 {
                pb.set_message(format!("Banding... ({} pairs)", pairs.len()));
            }
        }
    }
    pairs.sort_unstable();
    debug!(
        "LSH: {} names indexed, {} probes, {} pairs, largest bucket {}",
        index.len(),
        index.probes(),
        pairs.len(),
        index.largest_bucket()
    );
    Ok((pairs, index))
}
