// src/utils/cluster_config.rs - Tunables of the firm resolution pipeline
use log::info;
use serde::Serialize;

use super::env::{parse_var, process_env};
use crate::candidate_generation::signature::{FeatureHashKind, SignatureConfig, MAX_SIGNATURE_BITS};
use crate::clustering::firm_clustering::DEFAULT_BASE_OFFSET;
use crate::errors::ResolveError;
use crate::matching::confirm::{PairConfirmer, DEFAULT_SIMILARITY_THRESHOLD};
use crate::models::core::{FirmNum, NameId};

pub const DEFAULT_SHINGLE_K: usize = 2;
pub const DEFAULT_SIGNATURE_BITS: u32 = 128;
// 16 bands of 8 bits; a pair needs at least 3 equal bands. Legal-suffix
// variants ~20 bits apart pass about 4 times in 5, random names almost never.
pub const DEFAULT_LSH_BANDS: usize = 16;
pub const DEFAULT_BAND_THRESHOLD: usize = 2;
pub const DEFAULT_MAX_UNIQUE_NAMES: usize = 50_000_000;
pub const DEFAULT_LARGE_COMPONENT_WARN: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterConfig {
    /// Character shingle length used for signature features.
    pub shingle_k: usize,
    pub signature_bits: u32,
    pub lsh_bands: usize,
    /// A prior name is a candidate once it collides in more than this many bands.
    pub band_threshold: usize,
    /// Pairs are confirmed when strong-form similarity is strictly above this.
    pub similarity_threshold: f64,
    /// First firm number handed to multi-member components.
    pub base_offset: FirmNum,
    pub max_unique_names: usize,
    pub feature_hash: FeatureHashKind,
    pub worker_threads: usize,
    /// Cross-check the union-find partition against a graph traversal.
    pub verify_partition: bool,
    pub large_component_warn: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            shingle_k: DEFAULT_SHINGLE_K,
            signature_bits: DEFAULT_SIGNATURE_BITS,
            lsh_bands: DEFAULT_LSH_BANDS,
            band_threshold: DEFAULT_BAND_THRESHOLD,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            base_offset: DEFAULT_BASE_OFFSET,
            max_unique_names: DEFAULT_MAX_UNIQUE_NAMES,
            feature_hash: FeatureHashKind::default(),
            worker_threads: num_cpus::get(),
            verify_partition: false,
            large_component_warn: DEFAULT_LARGE_COMPONENT_WARN,
        }
    }
}

impl ClusterConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(process_env)
    }

    /// Builds the config from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        Self {
            shingle_k: parse_var(&lookup, "FIRM_SHINGLE_K", d.shingle_k),
            signature_bits: parse_var(&lookup, "FIRM_SIGNATURE_BITS", d.signature_bits),
            lsh_bands: parse_var(&lookup, "FIRM_LSH_BANDS", d.lsh_bands),
            band_threshold: parse_var(&lookup, "FIRM_BAND_THRESHOLD", d.band_threshold),
            similarity_threshold: parse_var(&lookup, "FIRM_SIMILARITY_THRESHOLD", d.similarity_threshold),
            base_offset: parse_var(&lookup, "FIRM_BASE_OFFSET", d.base_offset),
            max_unique_names: parse_var(&lookup, "FIRM_MAX_UNIQUE_NAMES", d.max_unique_names),
            feature_hash: parse_var(&lookup, "FIRM_FEATURE_HASH", d.feature_hash),
            worker_threads: parse_var(&lookup, "FIRM_WORKER_THREADS", d.worker_threads),
            verify_partition: parse_var(&lookup, "FIRM_VERIFY_PARTITION", d.verify_partition),
            large_component_warn: parse_var(&lookup, "FIRM_LARGE_COMPONENT_WARN", d.large_component_warn),
        }
    }

    /// One-bit bands with threshold 0: any two names whose signatures agree
    /// on a single bit become candidates. Quadratic, for small inputs and
    /// tests that must not depend on hash luck.
    pub fn exhaustive() -> Self {
        Self {
            signature_bits: MAX_SIGNATURE_BITS,
            lsh_bands: MAX_SIGNATURE_BITS as usize,
            band_threshold: 0,
            verify_partition: true,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ResolveError> {
        if self.shingle_k == 0 {
            return Err(ResolveError::invalid_config("shingle length must be at least 1"));
        }
        if self.signature_bits == 0 || self.signature_bits > MAX_SIGNATURE_BITS {
            return Err(ResolveError::invalid_config(format!(
                "signature width must be in 1..={}, got {}",
                MAX_SIGNATURE_BITS, self.signature_bits
            )));
        }
        if self.lsh_bands == 0 || self.signature_bits as usize % self.lsh_bands != 0 {
            return Err(ResolveError::invalid_config(format!(
                "{} signature bits cannot be split into {} equal bands",
                self.signature_bits, self.lsh_bands
            )));
        }
        if self.band_threshold >= self.lsh_bands {
            return Err(ResolveError::invalid_config(format!(
                "band threshold {} must be below the band count {}",
                self.band_threshold, self.lsh_bands
            )));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(ResolveError::invalid_config(format!(
                "similarity threshold must be within [0, 1], got {}",
                self.similarity_threshold
            )));
        }
        if self.max_unique_names == 0 || self.max_unique_names > NameId::MAX as usize {
            return Err(ResolveError::invalid_config(format!(
                "max unique names must be in 1..={}, got {}",
                NameId::MAX,
                self.max_unique_names
            )));
        }
        if self.worker_threads == 0 {
            return Err(ResolveError::invalid_config("worker thread count must be at least 1"));
        }
        Ok(())
    }

    pub fn signature_config(&self) -> SignatureConfig {
        SignatureConfig {
            shingle_k: self.shingle_k,
            bits: self.signature_bits,
            hash: self.feature_hash,
        }
    }

    pub fn confirmer(&self) -> Result<PairConfirmer, ResolveError> {
        PairConfirmer::new(self.similarity_threshold)
    }

    pub fn log_config(&self) {
        info!("🔧 Firm clustering configuration:");
        info!(
            "   Signatures: {} bits from {}-shingles, {} hashing",
            self.signature_bits, self.shingle_k, self.feature_hash
        );
        info!(
            "   Banding: {} bands of {} bits, candidate after > {} collisions",
            self.lsh_bands,
            self.signature_bits as usize / self.lsh_bands.max(1),
            self.band_threshold
        );
        info!("   Confirmation: similarity > {:.3}", self.similarity_threshold);
        info!(
            "   Firms: base offset {}, capacity {} unique names",
            self.base_offset, self.max_unique_names
        );
        info!(
            "   Workers: {}, partition cross-check {}",
            self.worker_threads,
            if self.verify_partition { "enabled" } else { "disabled" }
        );
    }
}
