use anyhow::{Context, Result};
use clap::Parser;
use firm_lib::clustering::firm_clustering::summarize_components;
use firm_lib::matching::manager::run_firm_resolution;
use firm_lib::tables::{load_source_tables, write_json, write_jsonl, TableSpec};
use firm_lib::utils::cluster_config::ClusterConfig;
use firm_lib::utils::env::load_env;
use firm_lib::utils::get_memory_usage;
use firm_lib::utils::progress_bars::progress_config::ProgressConfig;
use firm_lib::utils::source_filter::SourceFilterConfig;
use log::{error, info};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(author, version, about = "Cluster organization names into firms", long_about = None)]
struct Args {
    /// Input JSONL tables, as `path` or `tag=path`
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Assignments output (JSONL)
    #[arg(short, long)]
    output: PathBuf,

    /// Optional multi-member firm export (JSONL)
    #[arg(long)]
    clusters: Option<PathBuf>,

    /// Optional run report (JSON)
    #[arg(long)]
    report: Option<PathBuf>,

    /// Confirm pairs whose similarity is strictly above this value
    #[arg(long)]
    similarity_threshold: Option<f64>,

    #[arg(long)]
    signature_bits: Option<u32>,

    #[arg(long)]
    bands: Option<usize>,

    #[arg(long)]
    band_threshold: Option<usize>,

    #[arg(long)]
    base_offset: Option<u64>,

    #[arg(long)]
    workers: Option<usize>,

    /// Cross-check the union-find partition with a graph traversal
    #[arg(long)]
    verify_partition: bool,
}

fn apply_overrides(mut config: ClusterConfig, args: &Args) -> ClusterConfig {
    if let Some(t) = args.similarity_threshold {
        config.similarity_threshold = t;
    }
    if let Some(bits) = args.signature_bits {
        config.signature_bits = bits;
    }
    if let Some(bands) = args.bands {
        config.lsh_bands = bands;
    }
    if let Some(thresh) = args.band_threshold {
        config.band_threshold = thresh;
    }
    if let Some(offset) = args.base_offset {
        config.base_offset = offset;
    }
    if let Some(workers) = args.workers {
        config.worker_threads = workers;
    }
    if args.verify_partition {
        config.verify_partition = true;
    }
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    info!("Starting firm name resolution");
    load_env();
    let start_time = Instant::now();
    let args = Args::parse();

    let config = apply_overrides(ClusterConfig::from_env(), &args);
    config.validate().context("Invalid clustering configuration")?;
    config.log_config();

    let source_filter = SourceFilterConfig::from_env();
    source_filter.log_config();

    let progress_config = ProgressConfig::from_env();
    info!(
        "Progress tracking: enabled={}, detailed={}",
        progress_config.enabled, progress_config.detailed
    );
    let multi_progress = if progress_config.should_show_detailed() {
        progress_config.create_multi_progress()
    } else {
        None
    };

    let specs: Vec<TableSpec> = args.inputs.iter().map(|arg| TableSpec::parse(arg)).collect();
    let table = load_source_tables(&specs)
        .await
        .context("Failed to load source tables")?;
    source_filter.validate_sources(&table.records);
    if progress_config.should_show_memory() {
        info!("Memory after loading: {} MB", get_memory_usage());
    }

    let malformed_rows = table.malformed_rows;
    let records = table.records;
    let run_config = config.clone();
    let run_filter = source_filter.clone();
    let (records, resolution) = tokio::task::spawn_blocking(move || {
        let result = run_firm_resolution(&records, &run_config, Some(&run_filter), multi_progress);
        (records, result)
    })
    .await
    .context("Resolution task panicked")?;
    let mut resolution = match resolution {
        Ok(resolution) => resolution,
        Err(e) => {
            if e.is_structural() {
                error!("Internal invariant violated, nothing was written: {}", e);
            }
            return Err(e).context("Firm resolution failed");
        }
    };
    resolution.report.ingest.malformed_rows = malformed_rows;

    let written = write_jsonl(&args.output, &resolution.assignments)?;
    info!("Wrote {} assignments to {}", written, args.output.display());

    if let Some(path) = &args.clusters {
        let kept = records.iter().filter(|r| source_filter.allows(&r.source_tag));
        let clusters = summarize_components(
            &resolution.components,
            &resolution.registry,
            kept,
            &resolution.confirmed,
            config.large_component_warn,
        );
        let written = write_jsonl(path, &clusters)?;
        info!("Wrote {} firm clusters to {}", written, path.display());
    }

    if let Some(path) = &args.report {
        write_json(path, &resolution.report)?;
        info!("Wrote run report to {}", path.display());
    }

    info!("Firm resolution finished in {:.2?}", start_time.elapsed());
    Ok(())
}
