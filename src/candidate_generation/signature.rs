// src/candidate_generation/signature.rs
//
// Weighted simhash fingerprints over word and character-shingle features.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Up to 128 fingerprint bits, stored in the low bits.
pub type Signature = u128;

pub const MAX_SIGNATURE_BITS: u32 = 128;

/// Maps a feature string to 128 pseudo-random bits.
pub trait FeatureHasher: Send + Sync {
    fn hash_feature(&self, feature: &str) -> u128;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Md5FeatureHasher;

impl FeatureHasher for Md5FeatureHasher {
    fn hash_feature(&self, feature: &str) -> u128 {
        u128::from_be_bytes(md5::compute(feature.as_bytes()).0)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256FeatureHasher;

impl FeatureHasher for Sha256FeatureHasher {
    fn hash_feature(&self, feature: &str) -> u128 {
        let digest = Sha256::digest(feature.as_bytes());
        let mut head = [0u8; 16];
        head.copy_from_slice(&digest[..16]);
        u128::from_be_bytes(head)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureHashKind {
    #[default]
    Md5,
    Sha256,
}

impl FeatureHashKind {
    pub fn hasher(&self) -> &'static dyn FeatureHasher {
        match self {
            FeatureHashKind::Md5 => &Md5FeatureHasher,
            FeatureHashKind::Sha256 => &Sha256FeatureHasher,
        }
    }
}

impl FromStr for FeatureHashKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "md5" => Ok(FeatureHashKind::Md5),
            "sha256" | "sha-256" => Ok(FeatureHashKind::Sha256),
            other => Err(format!("unknown feature hash '{}'", other)),
        }
    }
}

impl fmt::Display for FeatureHashKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureHashKind::Md5 => write!(f, "md5"),
            FeatureHashKind::Sha256 => write!(f, "sha256"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeightedFeature {
    pub text: String,
    pub weight: f64,
}

/// Quadratic positional decay: `((n - i) / n)^2`. The first word weighs 1.0,
/// so trailing legal forms and jurisdictions barely move the fingerprint.
pub fn position_weight(position: usize, word_count: usize) -> f64 {
    if word_count == 0 || position >= word_count {
        return 0.0;
    }
    let linear = (word_count - position) as f64 / word_count as f64;
    linear * linear
}

/// Character k-shingles of a single word; empty when the word is shorter than `k`.
pub fn shingles(word: &str, k: usize) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    if k == 0 || chars.len() < k {
        return Vec::new();
    }
    chars.windows(k).map(|w| w.iter().collect()).collect()
}

/// Bag of features for a weak-standardized name.
///
/// Each word contributes itself and its shingles at the word's positional
/// weight. Runs of two or more single-character words ("i b m") also
/// contribute their concatenation, weighted like the run's first letter, so
/// spelled-out acronyms hash close to their compact form.
pub fn extract_features(weak_name: &str, shingle_k: usize) -> Vec<WeightedFeature> {
    let words: Vec<&str> = weak_name.split_whitespace().collect();
    let n = words.len();
    let mut features = Vec::new();

    let push_word = |features: &mut Vec<WeightedFeature>, word: &str, weight: f64| {
        features.push(WeightedFeature { text: word.to_string(), weight });
        for shingle in shingles(word, shingle_k) {
            features.push(WeightedFeature { text: shingle, weight });
        }
    };

    for (i, word) in words.iter().enumerate() {
        push_word(&mut features, word, position_weight(i, n));
    }

    let mut i = 0;
    while i < n {
        if words[i].chars().count() != 1 {
            i += 1;
            continue;
        }
        let start = i;
        while i < n && words[i].chars().count() == 1 {
            i += 1;
        }
        if i - start >= 2 {
            let acronym: String = words[start..i].concat();
            push_word(&mut features, &acronym, position_weight(start, n));
        }
    }

    features
}

/// Weighted simhash: bit `b` is set iff the weighted vote over all features
/// (+w where the feature hash has bit `b` set, -w otherwise) is non-negative.
pub fn simhash<H: FeatureHasher + ?Sized>(
    features: &[WeightedFeature],
    hasher: &H,
    bits: u32,
) -> Signature {
    let bits = bits.min(MAX_SIGNATURE_BITS) as usize;
    let mut votes = vec![0.0f64; bits];
    for feature in features {
        let hash = hasher.hash_feature(&feature.text);
        for (b, vote) in votes.iter_mut().enumerate() {
            if (hash >> b) & 1 == 1 {
                *vote += feature.weight;
            } else {
                *vote -= feature.weight;
            }
        }
    }
    votes
        .iter()
        .enumerate()
        .filter(|(_, vote)| **vote >= 0.0)
        .fold(0u128, |acc, (b, _)| acc | (1u128 << b))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureConfig {
    pub shingle_k: usize,
    pub bits: u32,
    pub hash: FeatureHashKind,
}

impl SignatureConfig {
    pub fn sign(&self, weak_name: &str) -> Signature {
        let features = extract_features(weak_name, self.shingle_k);
        simhash(&features, self.hash.hasher(), self.bits)
    }
}

/// Signs every name in parallel; output order matches input order.
pub fn compute_signatures<S: AsRef<str> + Sync>(names: &[S], config: &SignatureConfig) -> Vec<Signature> {
    names.par_iter().map(|name| config.sign(name.as_ref())).collect()
}

pub fn hamming_distance(a: Signature, b: Signature) -> u32 {
    (a ^ b).count_ones()
}
