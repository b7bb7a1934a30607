// src/models/matching.rs
use serde::Serialize;
use std::collections::BTreeMap;

use super::core::{FirmNum, NameId};

/// Two unique names that collided in enough LSH bands to be worth scoring.
///
/// Unordered: the constructor always stores the smaller id first, so equal
/// pairs compare and hash equal regardless of discovery order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CandidatePair {
    pub name_id_1: NameId,
    pub name_id_2: NameId,
}

impl CandidatePair {
    pub fn new(a: NameId, b: NameId) -> Self {
        if a <= b {
            Self { name_id_1: a, name_id_2: b }
        } else {
            Self { name_id_1: b, name_id_2: a }
        }
    }
}

/// A candidate pair whose strong forms passed the similarity threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConfirmedPair {
    pub pair: CandidatePair,
    pub similarity: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FirmComponent {
    pub firm_num: FirmNum,
    /// Sorted ascending.
    pub members: Vec<NameId>,
}

impl FirmComponent {
    pub fn is_singleton(&self) -> bool {
        self.members.len() == 1
    }
}

/// Final output row; `firm_num` is null for records that could not be assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FirmAssignment {
    pub source_tag: String,
    pub record_id: String,
    pub firm_num: Option<FirmNum>,
}

/// Dense `name_id -> firm_num` map over the whole unique-name universe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirmMap {
    firm_nums: Vec<FirmNum>,
}

impl FirmMap {
    pub(crate) fn from_dense(firm_nums: Vec<FirmNum>) -> Self {
        Self { firm_nums }
    }

    pub fn get(&self, name_id: NameId) -> Option<FirmNum> {
        self.firm_nums.get(name_id as usize).copied()
    }

    pub fn len(&self) -> usize {
        self.firm_nums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.firm_nums.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NameId, FirmNum)> + '_ {
        self.firm_nums
            .iter()
            .enumerate()
            .map(|(idx, firm)| (idx as NameId, *firm))
    }
}

/// Export row describing one multi-member firm.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FirmCluster {
    pub firm_num: FirmNum,
    pub name_count: usize,
    pub representative_name: String,
    pub names: Vec<String>,
    pub records_by_source: BTreeMap<String, u64>,
    pub edge_count: usize,
    pub min_edge_similarity: f64,
    pub avg_edge_similarity: f64,
}
