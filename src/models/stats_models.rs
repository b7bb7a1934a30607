// src/models/stats_models.rs
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::utils::cluster_config::ClusterConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PipelineStage {
    Normalize,
    Candidates,
    Confirm,
    Merge,
    Assign,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Normalize => "normalize",
            PipelineStage::Candidates => "candidates",
            PipelineStage::Confirm => "confirm",
            PipelineStage::Merge => "merge",
            PipelineStage::Assign => "assign",
        }
    }
}

/// Row-level bookkeeping; none of these abort a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub total_records: usize,
    /// Lines dropped while reading tables (not JSON, no record id, no tag).
    pub malformed_rows: usize,
    pub missing_names: usize,
    pub empty_after_standardization: usize,
    pub filtered_by_source: usize,
    pub unique_names: usize,
}

impl IngestStats {
    pub fn unassignable(&self) -> usize {
        self.missing_names + self.empty_after_standardization
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageStats {
    pub stage: PipelineStage,
    pub input_count: usize,
    pub output_count: usize,
    pub elapsed_secs: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComponentStats {
    pub total_components: usize,
    pub multi_member_components: usize,
    pub singleton_components: usize,
    pub largest_component: usize,
    pub names_in_multi_member: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolutionReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub config: ClusterConfig,
    pub ingest: IngestStats,
    pub stages: Vec<StageStats>,
    pub components: ComponentStats,
    pub candidate_pairs: usize,
    pub confirmed_pairs: usize,
    pub assigned_records: usize,
    pub null_records: usize,
    pub partition_digest: String,
}
