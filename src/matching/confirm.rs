// src/matching/confirm.rs - Edit-distance confirmation of candidate pairs
use rayon::prelude::*;
use strsim::levenshtein;

use super::name::standardize_strong;
use crate::errors::ResolveError;
use crate::models::core::NameId;
use crate::models::matching::{CandidatePair, ConfirmedPair};

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.85;

const STAGE: &str = "confirmation";

// Far below 1 / max_len for any name length, far above f64 rounding error.
const PRODUCT_TOLERANCE: f64 = 1e-9;

/// Accepts a pair iff `1 - lev(a, b) / max(|a|, |b|)` is strictly greater
/// than the threshold. Lengths and distances count chars, not bytes.
#[derive(Debug, Clone, Copy)]
pub struct PairConfirmer {
    threshold: f64,
}

impl PairConfirmer {
    pub fn new(threshold: f64) -> Result<Self, ResolveError> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ResolveError::invalid_config(format!(
                "similarity threshold must be within [0, 1], got {}",
                threshold
            )));
        }
        Ok(Self { threshold })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Largest edit distance that still beats the threshold for strings whose
    /// longer side has `max_len` chars, or `None` if nothing can.
    ///
    /// `(max_len - d) / max_len > t` holds iff `max_len - d >= floor(t * max_len) + 1`,
    /// which keeps the boundary decision in integers.
    pub fn max_allowed_distance(&self, max_len: usize) -> Option<usize> {
        if max_len == 0 {
            return None;
        }
        // 0.7 * 90 evaluates to 62.999..., which must still floor to 63
        let product = self.threshold * max_len as f64;
        let required_same = (product + PRODUCT_TOLERANCE).floor() as usize + 1;
        max_len.checked_sub(required_same)
    }

    /// Similarity of two strong forms when it beats the threshold.
    pub fn score_strong(&self, strong_1: &str, strong_2: &str) -> Option<f64> {
        let a: Vec<char> = strong_1.chars().collect();
        let b: Vec<char> = strong_2.chars().collect();
        let max_len = a.len().max(b.len());
        if a.is_empty() || b.is_empty() {
            return None;
        }
        let max_distance = self.max_allowed_distance(max_len)?;
        let distance = bounded_levenshtein(&a, &b, max_distance)?;
        Some(1.0 - distance as f64 / max_len as f64)
    }

    /// Strongly standardizes both names of `pair` via `get_name` and decides.
    pub fn confirm<'a, F>(&self, pair: &CandidatePair, get_name: F) -> bool
    where
        F: Fn(NameId) -> &'a str,
    {
        let strong_1 = standardize_strong(get_name(pair.name_id_1));
        let strong_2 = standardize_strong(get_name(pair.name_id_2));
        self.score_strong(&strong_1, &strong_2).is_some()
    }

    /// Scores every pair in parallel against precomputed strong forms indexed
    /// by name id. Output keeps the input order.
    pub fn confirm_all(
        &self,
        pairs: &[CandidatePair],
        strong_names: &[String],
    ) -> Result<Vec<ConfirmedPair>, ResolveError> {
        let universe = strong_names.len();
        if let Some(bad) = pairs
            .iter()
            .flat_map(|p| [p.name_id_1, p.name_id_2])
            .find(|id| *id as usize >= universe)
        {
            return Err(ResolveError::UnknownNameId { name_id: bad, stage: STAGE });
        }

        Ok(pairs
            .par_iter()
            .filter_map(|pair| {
                let strong_1 = &strong_names[pair.name_id_1 as usize];
                let strong_2 = &strong_names[pair.name_id_2 as usize];
                self.score_strong(strong_1, strong_2)
                    .map(|similarity| ConfirmedPair { pair: *pair, similarity })
            })
            .collect())
    }
}

/// Exact normalized similarity, 0 when either side is empty.
pub fn similarity(strong_1: &str, strong_2: &str) -> f64 {
    let len_1 = strong_1.chars().count();
    let len_2 = strong_2.chars().count();
    if len_1 == 0 || len_2 == 0 {
        return 0.0;
    }
    let max_len = len_1.max(len_2);
    1.0 - levenshtein(strong_1, strong_2) as f64 / max_len as f64
}

/// Levenshtein distance with early exit: `None` as soon as the distance is
/// known to exceed `max_distance`. Only the diagonal band of width
/// `2 * max_distance + 1` is evaluated.
pub fn bounded_levenshtein(a: &[char], b: &[char], max_distance: usize) -> Option<usize> {
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let (n, m) = (short.len(), long.len());
    if m - n > max_distance {
        return None;
    }
    if n == 0 {
        return Some(m);
    }

    // any value above max_distance is equivalent; clamp to keep it small
    let over = max_distance + 1;
    let mut prev: Vec<usize> = (0..=m).map(|j| j.min(over)).collect();
    let mut curr: Vec<usize> = vec![over; m + 1];

    for i in 1..=n {
        let lo = i.saturating_sub(max_distance).max(1);
        let hi = (i + max_distance).min(m);
        curr[0] = i.min(over);
        if lo > 1 {
            curr[lo - 1] = over;
        }
        let mut row_min = curr[0];
        for j in lo..=hi {
            let cost = usize::from(short[i - 1] != long[j - 1]);
            let value = (prev[j - 1] + cost)
                .min(prev[j] + 1)
                .min(curr[j - 1] + 1)
                .min(over);
            curr[j] = value;
            row_min = row_min.min(value);
        }
        if hi < m {
            curr[hi + 1] = over;
        }
        if row_min > max_distance {
            return None;
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    let distance = prev[m];
    (distance <= max_distance).then_some(distance)
}
