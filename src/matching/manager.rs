// src/matching/manager.rs - Coordination of the five resolution stages
use chrono::Utc;
use indicatif::MultiProgress;
use log::{debug, info, log_enabled, Level};
use std::time::Instant;
use uuid::Uuid;

use super::registry::NameRegistry;
use crate::candidate_generation::lsh::{generate_candidates, BandIndex};
use crate::candidate_generation::signature::{compute_signatures, hamming_distance};
use crate::clustering::firm_clustering::{
    assign_firms, component_stats, firm_components, graph_components, iter_assignments,
    merge_components, partition_digest, verify_partition,
};
use crate::errors::ResolveError;
use crate::models::core::{NameId, RawNameRecord};
use crate::models::matching::{CandidatePair, ConfirmedPair, FirmAssignment, FirmComponent, FirmMap};
use crate::models::stats_models::{ComponentStats, PipelineStage, ResolutionReport, StageStats};
use crate::utils::cluster_config::ClusterConfig;
use crate::utils::get_memory_usage;
use crate::utils::progress_bars::logging::{log_pipeline_completion, log_pipeline_start, StageLogger};
use crate::utils::progress_bars::progress_config::stage_bar;
use crate::utils::source_filter::SourceFilterConfig;

/// Everything a run produces; `assignments` follows input order.
#[derive(Debug, Clone)]
pub struct FirmResolution {
    pub registry: NameRegistry,
    pub confirmed: Vec<ConfirmedPair>,
    pub components: Vec<FirmComponent>,
    pub firm_map: FirmMap,
    pub assignments: Vec<FirmAssignment>,
    pub report: ResolutionReport,
}

/// Output of stages 2 to 4 over an already deduplicated name set.
#[derive(Debug, Clone)]
pub struct ClusteredNames {
    pub candidate_pairs: usize,
    pub confirmed: Vec<ConfirmedPair>,
    /// Canonical partition of `0..registry.len()`.
    pub partition: Vec<Vec<NameId>>,
    pub component_stats: ComponentStats,
    pub stages: Vec<StageStats>,
}

pub fn build_worker_pool(threads: usize) -> Result<rayon::ThreadPool, ResolveError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("firm-worker-{}", i))
        .build()
        .map_err(|e| ResolveError::WorkerPool(e.to_string()))
}

fn stage_stats(stage: PipelineStage, input_count: usize, output_count: usize, started: Instant) -> StageStats {
    StageStats {
        stage,
        input_count,
        output_count,
        elapsed_secs: started.elapsed().as_secs_f64(),
    }
}

fn log_stage_memory(logger: &StageLogger) {
    if log_enabled!(Level::Debug) {
        logger.log_memory(get_memory_usage());
    }
}

/// Runs the whole pipeline on a dedicated worker pool.
///
/// Records dropped by `source_filter` get no output row. All other records
/// get exactly one assignment, with `None` for names that are missing or
/// standardize to nothing.
pub fn run_firm_resolution(
    records: &[RawNameRecord],
    config: &ClusterConfig,
    source_filter: Option<&SourceFilterConfig>,
    multi_progress: Option<MultiProgress>,
) -> Result<FirmResolution, ResolveError> {
    config.validate()?;
    let pool = build_worker_pool(config.worker_threads)?;
    pool.install(|| resolve(records, config, source_filter, multi_progress.as_ref()))
}

fn resolve(
    records: &[RawNameRecord],
    config: &ClusterConfig,
    source_filter: Option<&SourceFilterConfig>,
    multi_progress: Option<&MultiProgress>,
) -> Result<FirmResolution, ResolveError> {
    let run_start = Instant::now();
    let started_at = Utc::now();
    let run_id = Uuid::new_v4().to_string();
    log_pipeline_start(&run_id, records.len(), config.worker_threads);

    let allowed = |record: &&RawNameRecord| source_filter.map_or(true, |f| f.allows(&record.source_tag));

    // Stage 1: weak dedup into the registry, strong forms for confirmation.
    let logger = StageLogger::new(PipelineStage::Normalize);
    let started = Instant::now();
    logger.log_start(records.len(), "records");
    let (registry, mut ingest) = NameRegistry::build(records.iter().filter(allowed), config.max_unique_names)
        .map_err(|e| {
            logger.log_error(&e.to_string());
            e
        })?;
    ingest.filtered_by_source = records.len() - ingest.total_records;
    ingest.total_records = records.len();
    logger.log_phase("Strong standardization", Some(&format!("{} unique names", registry.len())));
    let strong_names = registry.strong_forms();
    let empty_strong = strong_names.iter().filter(|s| s.is_empty()).count();
    logger.log_data_quality_issue("names with an empty strong form (never matched)", empty_strong);
    logger.log_ingest(&ingest);
    logger.log_completion(registry.len(), "unique names");
    log_stage_memory(&logger);
    let mut stages = vec![stage_stats(PipelineStage::Normalize, records.len(), registry.len(), started)];

    let clustered = cluster_unique_names(&registry, &strong_names, config, multi_progress)?;
    stages.extend(clustered.stages.iter().cloned());

    // Stage 5: firm numbers and the record join.
    let logger = StageLogger::new(PipelineStage::Assign);
    let started = Instant::now();
    logger.log_start(clustered.partition.len(), "components");
    let firm_map = assign_firms(&clustered.partition, config.base_offset)?;
    let components = firm_components(&clustered.partition, &firm_map);
    let assignments: Vec<FirmAssignment> =
        iter_assignments(records.iter().filter(allowed), &registry, &firm_map).collect();
    let null_records = assignments.iter().filter(|a| a.firm_num.is_none()).count();
    let assigned_records = assignments.len() - null_records;
    logger.log_completion(assigned_records, "records assigned");
    if null_records > 0 {
        logger.log_phase("Unassignable records", Some(&format!("{} rows get a null firm", null_records)));
    }
    stages.push(stage_stats(PipelineStage::Assign, assignments.len(), assigned_records, started));

    let digest = partition_digest(&clustered.partition, &registry);
    log_pipeline_completion(
        &run_id,
        run_start.elapsed(),
        assigned_records,
        null_records,
        &clustered.component_stats,
        &digest,
    );

    let report = ResolutionReport {
        run_id,
        started_at,
        config: config.clone(),
        ingest,
        stages,
        components: clustered.component_stats.clone(),
        candidate_pairs: clustered.candidate_pairs,
        confirmed_pairs: clustered.confirmed.len(),
        assigned_records,
        null_records,
        partition_digest: digest,
    };

    Ok(FirmResolution {
        registry,
        confirmed: clustered.confirmed,
        components,
        firm_map,
        assignments,
        report,
    })
}

/// Signs every unique name in parallel, then bands them on this thread.
pub fn generate_candidate_pairs(
    registry: &NameRegistry,
    config: &ClusterConfig,
    multi_progress: Option<&MultiProgress>,
) -> Result<(Vec<CandidatePair>, BandIndex), ResolveError> {
    let weak: Vec<&str> = registry
        .names()
        .iter()
        .map(|n| n.standardized_weak.as_str())
        .collect();
    let signatures = compute_signatures(&weak, &config.signature_config());
    debug!("Computed {} signatures", signatures.len());

    let pb = stage_bar(multi_progress, signatures.len() as u64, "Banding...");
    let entries = signatures
        .iter()
        .enumerate()
        .map(|(idx, &sig)| (idx as NameId, sig));
    let (pairs, index) = generate_candidates(
        entries,
        config.signature_bits,
        config.lsh_bands,
        config.band_threshold,
        pb.as_ref(),
    )?;
    if let Some(pb) = pb {
        pb.finish_with_message(format!("Banding done: {} candidate pairs", pairs.len()));
    }
    if log_enabled!(Level::Debug) {
        if let Some(widest) = pairs
            .iter()
            .map(|p| hamming_distance(signatures[p.name_id_1 as usize], signatures[p.name_id_2 as usize]))
            .max()
        {
            debug!("Widest candidate pair is {} signature bits apart", widest);
        }
    }
    Ok((pairs, index))
}

/// Stages 2 to 4: candidates, confirmation and merging. `strong_names` is
/// indexed by name id.
pub fn cluster_unique_names(
    registry: &NameRegistry,
    strong_names: &[String],
    config: &ClusterConfig,
    multi_progress: Option<&MultiProgress>,
) -> Result<ClusteredNames, ResolveError> {
    let mut stages = Vec::with_capacity(3);

    let logger = StageLogger::new(PipelineStage::Candidates);
    let started = Instant::now();
    logger.log_start(registry.len(), "unique names");
    let (candidates, index) = generate_candidate_pairs(registry, config, multi_progress)?;
    logger.log_banding(index.len(), index.probes(), candidates.len(), index.largest_bucket());
    log_stage_memory(&logger);
    stages.push(stage_stats(PipelineStage::Candidates, registry.len(), candidates.len(), started));
    drop(index);

    let logger = StageLogger::new(PipelineStage::Confirm);
    let started = Instant::now();
    logger.log_start(candidates.len(), "candidate pairs");
    let confirmer = config.confirmer()?;
    let pb = stage_bar(multi_progress, candidates.len() as u64, "Scoring pairs...");
    let confirmed = confirmer.confirm_all(&candidates, strong_names)?;
    if let Some(pb) = pb {
        pb.set_position(candidates.len() as u64);
        pb.finish_with_message(format!("{} pairs confirmed", confirmed.len()));
    }
    logger.log_confirmation(candidates.len(), confirmed.len(), confirmer.threshold());
    stages.push(stage_stats(PipelineStage::Confirm, candidates.len(), confirmed.len(), started));

    let logger = StageLogger::new(PipelineStage::Merge);
    let started = Instant::now();
    logger.log_start(confirmed.len(), "confirmed edges");
    let partition = merge_components(registry.len(), &confirmed)?;
    if config.verify_partition {
        logger.log_phase("Cross-checking partition", Some("graph traversal"));
        let graph = graph_components(registry.len(), &confirmed)?;
        if let Err(e) = verify_partition(&partition, &graph) {
            logger.log_error(&e.to_string());
            return Err(e);
        }
    }
    let component_stats = component_stats(&partition);
    logger.log_components(&component_stats);
    let large = partition
        .iter()
        .filter(|members| members.len() > config.large_component_warn)
        .count();
    if large > 0 {
        logger.log_warning(&format!(
            "{} components exceed {} names; inspect them for over-merging",
            large, config.large_component_warn
        ));
    }
    log_stage_memory(&logger);
    stages.push(stage_stats(PipelineStage::Merge, confirmed.len(), partition.len(), started));

    info!(
        "Clustered {} names into {} components",
        registry.len(),
        partition.len()
    );

    Ok(ClusteredNames {
        candidate_pairs: candidates.len(),
        confirmed,
        partition,
        component_stats,
        stages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(names: &[&str]) -> Vec<RawNameRecord> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| RawNameRecord::new("grant", format!("r{}", i), *n))
            .collect()
    }

    fn small_config() -> ClusterConfig {
        ClusterConfig {
            worker_threads: 2,
            base_offset: 1_000,
            ..ClusterConfig::exhaustive()
        }
    }

    #[test]
    fn test_resolution_end_to_end() {
        let recs = records(&["Acme Corp", "ACME CORPORATION", "Acme Corp.", "Zenith Industries"]);
        let res = run_firm_resolution(&recs, &small_config(), None, None).unwrap();

        assert_eq!(res.assignments.len(), 4);
        let firms: Vec<_> = res.assignments.iter().map(|a| a.firm_num).collect();
        assert_eq!(firms[0], firms[1]);
        assert_eq!(firms[0], firms[2]);
        assert_ne!(firms[0], firms[3]);
        assert_eq!(firms[0], Some(1_000));

        assert_eq!(res.report.ingest.unique_names, 3);
        assert_eq!(res.report.components.multi_member_components, 1);
        assert_eq!(res.report.null_records, 0);
        assert_eq!(res.report.stages.len(), 5);
        assert_eq!(res.report.partition_digest.len(), 64);
    }

    #[test]
    fn test_source_filter_drops_rows() {
        let mut recs = records(&["Acme Corp", "Zenith Industries"]);
        recs.push(RawNameRecord::new("financial-filer", "f1", "Acme Corp"));
        let filter = SourceFilterConfig {
            enabled: true,
            allowed_sources: vec!["grant".to_string()],
        };
        let res = run_firm_resolution(&recs, &small_config(), Some(&filter), None).unwrap();
        assert_eq!(res.assignments.len(), 2);
        assert_eq!(res.report.ingest.filtered_by_source, 1);
        assert_eq!(res.report.ingest.total_records, 3);
    }

    #[test]
    fn test_invalid_config_is_rejected_up_front() {
        let config = ClusterConfig { lsh_bands: 7, ..small_config() };
        let err = run_firm_resolution(&records(&["Acme"]), &config, None, None).unwrap_err();
        assert!(matches!(err, ResolveError::InvalidConfig(_)));
    }

    #[test]
    fn test_capacity_limit_surfaces() {
        let config = ClusterConfig { max_unique_names: 1, ..small_config() };
        let err = run_firm_resolution(&records(&["Acme", "Zenith"]), &config, None, None).unwrap_err();
        assert!(matches!(err, ResolveError::CapacityExceeded { .. }));
    }

    #[test]
    fn test_empty_input() {
        let res = run_firm_resolution(&[], &small_config(), None, None).unwrap();
        assert!(res.assignments.is_empty());
        assert!(res.components.is_empty());
        assert_eq!(res.report.candidate_pairs, 0);
    }
}
