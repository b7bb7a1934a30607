// src/utils/progress_bars/logging.rs - Tagged logging helpers for pipeline stages
use log::{debug, error, info, warn};
use std::time::{Duration, Instant};

use crate::models::stats_models::{ComponentStats, IngestStats, PipelineStage};

#[derive(Clone)]
pub struct StageLogger {
    stage_name: &'static str,
    stage_emoji: &'static str,
    start_time: Instant,
}

impl StageLogger {
    pub fn new(stage: PipelineStage) -> Self {
        let (stage_name, stage_emoji) = match stage {
            PipelineStage::Normalize => ("NORMALIZE", "🧹"),
            PipelineStage::Candidates => ("CANDIDATES", "🔍"),
            PipelineStage::Confirm => ("CONFIRM", "✍️"),
            PipelineStage::Merge => ("MERGE", "🔗"),
            PipelineStage::Assign => ("ASSIGN", "🏷️"),
        };
        Self {
            stage_name,
            stage_emoji,
            start_time: Instant::now(),
        }
    }

    pub fn log_start(&self, input_count: usize, input_kind: &str) {
        info!(
            "[{}] {} 🚀 Starting with {} {}",
            self.stage_name, self.stage_emoji, input_count, input_kind
        );
    }

    pub fn log_phase(&self, phase: &str, details: Option<&str>) {
        let elapsed = self.start_time.elapsed();
        let msg = if let Some(details) = details {
            format!(
                "[{}] {} 🔄 Phase: {} - {} [+{:.1}s]",
                self.stage_name, self.stage_emoji, phase, details, elapsed.as_secs_f32()
            )
        } else {
            format!(
                "[{}] {} 🔄 Phase: {} [+{:.1}s]",
                self.stage_name, self.stage_emoji, phase, elapsed.as_secs_f32()
            )
        };
        info!("{}", msg);
    }

    pub fn log_completion(&self, output_count: usize, output_kind: &str) {
        info!(
            "[{}] {} ✅ Done: {} {} in {:.2?}",
            self.stage_name,
            self.stage_emoji,
            output_count,
            output_kind,
            self.start_time.elapsed()
        );
    }

    pub fn log_ingest(&self, stats: &IngestStats) {
        info!(
            "[{}] {} 📊 {} records → {} unique names",
            self.stage_name, self.stage_emoji, stats.total_records, stats.unique_names
        );
        self.log_data_quality_issue("records without a name", stats.missing_names);
        self.log_data_quality_issue("names empty after standardization", stats.empty_after_standardization);
        if stats.filtered_by_source > 0 {
            info!(
                "[{}] {} 🚫 Filtered out {} records from other sources",
                self.stage_name, self.stage_emoji, stats.filtered_by_source
            );
        }
    }

    pub fn log_banding(&self, names: usize, probes: u64, pairs: usize, largest_bucket: usize) {
        let per_name = if names > 0 { pairs as f64 / names as f64 } else { 0.0 };
        info!(
            "[{}] {} 📈 {} candidate pairs ({:.2} per name), {} bucket probes, largest bucket {}",
            self.stage_name, self.stage_emoji, pairs, per_name, probes, largest_bucket
        );
    }

    pub fn log_confirmation(&self, candidates: usize, confirmed: usize, threshold: f64) {
        let percent_kept = if candidates > 0 {
            (confirmed as f64 / candidates as f64) * 100.0
        } else {
            0.0
        };
        info!(
            "[{}] {} 🎯 {} candidates → {} confirmed above {:.3} ({:.1}% kept)",
            self.stage_name, self.stage_emoji, candidates, confirmed, threshold, percent_kept
        );
    }

    pub fn log_components(&self, stats: &ComponentStats) {
        info!(
            "[{}] {} 🧩 {} components: {} multi-member ({} names), {} singletons, largest {}",
            self.stage_name,
            self.stage_emoji,
            stats.total_components,
            stats.multi_member_components,
            stats.names_in_multi_member,
            stats.singleton_components,
            stats.largest_component
        );
    }

    pub fn log_memory(&self, memory_mb: u64) {
        debug!("[{}] {} 💾 Process memory: {} MB", self.stage_name, self.stage_emoji, memory_mb);
    }

    pub fn log_data_quality_issue(&self, issue_type: &str, count: usize) {
        if count > 0 {
            warn!(
                "[{}] {} ⚠️  Data quality: {} instances of {}",
                self.stage_name, self.stage_emoji, count, issue_type
            );
        }
    }

    pub fn log_warning(&self, message: &str) {
        warn!("[{}] {} ⚠️  {}", self.stage_name, self.stage_emoji, message);
    }

    pub fn log_error(&self, message: &str) {
        error!("[{}] {} ❌ {}", self.stage_name, self.stage_emoji, message);
    }

    pub fn get_elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn get_stage_name(&self) -> &'static str {
        self.stage_name
    }
}

pub fn log_pipeline_start(run_id: &str, record_count: usize, worker_threads: usize) {
    info!("🚀 ===== FIRM RESOLUTION STARTING =====");
    info!("📅 Run ID: {}", run_id);
    info!("   • {} input records", record_count);
    info!("   • {} worker threads", worker_threads);
    info!("🎯 Stages: Normalize 🧹, Candidates 🔍, Confirm ✍️, Merge 🔗, Assign 🏷️");
    info!("======================================");
}

pub fn log_pipeline_completion(
    run_id: &str,
    duration: Duration,
    assigned_records: usize,
    null_records: usize,
    components: &ComponentStats,
    digest: &str,
) {
    info!("🎉 ===== FIRM RESOLUTION COMPLETED =====");
    info!("📅 Run ID: {}", run_id);
    info!("⏱️  Total Duration: {:.2?}", duration);
    info!("🏷️  Records assigned: {}, null firm: {}", assigned_records, null_records);
    info!(
        "🧩 Firms: {} ({} multi-member)",
        components.total_components, components.multi_member_components
    );
    info!("🔏 Partition digest: {}", digest);
    info!("=======================================");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        assert_eq!(StageLogger::new(PipelineStage::Normalize).get_stage_name(), "NORMALIZE");
        assert_eq!(StageLogger::new(PipelineStage::Merge).get_stage_name(), "MERGE");
    }

    #[test]
    fn test_logging_with_empty_inputs_does_not_panic() {
        let logger = StageLogger::new(PipelineStage::Confirm);
        logger.log_confirmation(0, 0, 0.85);
        logger.log_banding(0, 0, 0, 0);
        logger.log_ingest(&IngestStats::default());
        logger.log_components(&ComponentStats::default());
    }
}
