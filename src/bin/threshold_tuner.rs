// src/bin/threshold_tuner.rs
//
// Interactive helper for choosing FIRM_SIMILARITY_THRESHOLD.
//
// Loads the same source tables as `firm_cluster`, runs the banding stage to get
// candidate pairs, scores them with the edit-distance similarity on strong
// forms and samples pairs per similarity tier. The user labels each sampled
// pair, and the tool reports per-tier precision plus a suggested threshold.

use anyhow::{Context, Result};
use clap::Parser;
use firm_lib::matching::confirm::similarity;
use firm_lib::matching::manager::generate_candidate_pairs;
use firm_lib::matching::registry::NameRegistry;
use firm_lib::tables::{load_source_tables, TableSpec};
use firm_lib::utils::cluster_config::ClusterConfig;
use firm_lib::utils::env::load_env;
use firm_lib::utils::source_filter::SourceFilterConfig;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};

const MIN_SIMILARITY_TIER: f64 = 0.60;
const MAX_SIMILARITY_TIER: f64 = 0.99;
const TIER_INCREMENT: f64 = 0.03;
const TARGET_PRECISION: f64 = 0.90;

#[derive(Parser)]
#[command(author, version, about = "Sample candidate pairs by similarity tier and suggest a threshold", long_about = None)]
struct Args {
    /// Input JSONL tables, as `path` or `tag=path`
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Pairs sampled for review in each tier
    #[arg(long, default_value_t = 10)]
    samples_per_tier: usize,

    /// Seed for the tier sampling
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Only print the tier distribution
    #[arg(long)]
    no_review: bool,
}

#[derive(Debug, Clone)]
struct ScoredPair {
    name_1: String,
    name_2: String,
    score: f64,
}

#[derive(Debug, Clone)]
struct ReviewedPair {
    score: f64,
    is_match: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    env_logger::init();
    info!("Starting Threshold Tuner...");
    let args = Args::parse();

    let config = ClusterConfig::from_env();
    config.validate().context("Invalid clustering configuration")?;
    let source_filter = SourceFilterConfig::from_env();
    source_filter.log_config();

    let specs: Vec<TableSpec> = args.inputs.iter().map(|arg| TableSpec::parse(arg)).collect();
    let table = load_source_tables(&specs)
        .await
        .context("Failed to load source tables")?;
    let (records, dropped) = source_filter.apply(table.records);
    if dropped > 0 {
        info!("Source filter dropped {} records", dropped);
    }

    let (registry, ingest) = NameRegistry::build(&records, config.max_unique_names)?;
    info!(
        "{} records, {} unique names",
        ingest.total_records, ingest.unique_names
    );
    if registry.len() < 2 {
        eprintln!("Not enough unique names (need at least 2) to tune a threshold. Exiting.");
        return Ok(());
    }

    let (candidates, _index) = generate_candidate_pairs(&registry, &config, None)?;
    info!("Generated {} candidate pairs.", candidates.len());
    if candidates.is_empty() {
        eprintln!("No candidate pairs generated. Exiting.");
        return Ok(());
    }

    let strong = registry.strong_forms();

    let scoring_pb = ProgressBar::new(candidates.len() as u64);
    scoring_pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .context("Invalid progress bar template")?
            .progress_chars("█▉▊▋▌▍▎▏  "),
    );
    scoring_pb.set_message("Scoring and binning...");

    let mut bins: BTreeMap<usize, Vec<ScoredPair>> = BTreeMap::new();
    for pair in &candidates {
        scoring_pb.inc(1);
        let s1 = &strong[pair.name_id_1 as usize];
        let s2 = &strong[pair.name_id_2 as usize];
        if s1.is_empty() || s2.is_empty() {
            continue;
        }
        let score = similarity(s1, s2);
        if let Some(tier) = tier_of(score) {
            bins.entry(tier).or_default().push(ScoredPair {
                name_1: registry.name(pair.name_id_1).unwrap_or_default().to_string(),
                name_2: registry.name(pair.name_id_2).unwrap_or_default().to_string(),
                score,
            });
        }
    }
    scoring_pb.finish_with_message("Scoring complete.");

    println!("\n--- Candidate pairs per tier ---");
    for (tier, pairs) in &bins {
        println!("  [{:.2}, {:.2}): {}", tier_floor(*tier), tier_floor(*tier) + TIER_INCREMENT, pairs.len());
    }
    if args.no_review {
        return Ok(());
    }

    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut sampled: Vec<ScoredPair> = Vec::new();
    for pairs in bins.values_mut() {
        pairs.shuffle(&mut rng);
        sampled.extend(pairs.iter().take(args.samples_per_tier).cloned());
    }
    sampled.shuffle(&mut rng);
    info!("Total pairs to review: {}", sampled.len());

    let reviewed = review_pairs(&sampled)?;
    analyze_and_suggest_threshold(&reviewed);
    Ok(())
}

fn review_pairs(sampled: &[ScoredPair]) -> Result<Vec<ReviewedPair>> {
    let mut reviewed = Vec::new();
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut input = String::new();

    for (i, pair) in sampled.iter().enumerate() {
        println!("\n--- Pair {}/{} ---", i + 1, sampled.len());
        println!("  Name 1: {}", pair.name_1);
        println!("  Name 2: {}", pair.name_2);
        println!("  Similarity: {:.4}", pair.score);

        loop {
            print!("Are these the same firm? (y/n/q to quit): ");
            stdout.flush()?;
            input.clear();
            if stdin.lock().read_line(&mut input)? == 0 {
                warn!("Input closed; analyzing what was reviewed");
                return Ok(reviewed);
            }
            match input.trim().to_lowercase().as_str() {
                "y" => {
                    reviewed.push(ReviewedPair { score: pair.score, is_match: true });
                    break;
                }
                "n" => {
                    reviewed.push(ReviewedPair { score: pair.score, is_match: false });
                    break;
                }
                "q" => {
                    info!("User quit review. Analyzing collected data.");
                    return Ok(reviewed);
                }
                _ => println!("Invalid input. Please enter 'y', 'n', or 'q'."),
            }
        }
    }
    Ok(reviewed)
}

fn analyze_and_suggest_threshold(reviewed: &[ReviewedPair]) {
    if reviewed.is_empty() {
        println!("\nNo pairs were reviewed. Cannot suggest a threshold.");
        return;
    }

    let mut matches: Vec<f64> = reviewed.iter().filter(|p| p.is_match).map(|p| p.score).collect();
    let mut non_matches: Vec<f64> = reviewed.iter().filter(|p| !p.is_match).map(|p| p.score).collect();
    matches.sort_by(|a, b| a.total_cmp(b));
    non_matches.sort_by(|a, b| a.total_cmp(b));

    println!("\n--- Analysis of Reviewed Pairs ---");
    println!("Total Reviewed Pairs: {}", reviewed.len());
    println!("Confirmed Matches: {}", matches.len());
    println!("Confirmed Non-Matches: {}", non_matches.len());
    for (label, scores) in [("Matches", &matches), ("Non-Matches", &non_matches)] {
        if scores.is_empty() {
            println!("  No {} reviewed.", label.to_lowercase());
            continue;
        }
        println!(
            "  {} (P5/P25/P75/P95): {:.4} / {:.4} / {:.4} / {:.4}",
            label,
            percentile(scores, 0.05),
            percentile(scores, 0.25),
            percentile(scores, 0.75),
            percentile(scores, 0.95)
        );
    }

    println!("\n--- Precision above each tier ---");
    let mut tier = 0usize;
    while tier_floor(tier) <= MAX_SIMILARITY_TIER {
        if let Some(p) = precision_above(reviewed, tier_floor(tier)) {
            println!("  > {:.2}: {:.3}", tier_floor(tier), p);
        }
        tier += 1;
    }

    match suggest_threshold(reviewed, TARGET_PRECISION) {
        Some(t) => println!(
            "\nSuggested FIRM_SIMILARITY_THRESHOLD: {:.2} (precision >= {:.2} on reviewed pairs)",
            t, TARGET_PRECISION
        ),
        None => println!(
            "\nNo tier reached precision {:.2}; keep the current threshold and review more pairs.",
            TARGET_PRECISION
        ),
    }
}

/// Index of the tier holding `score`, or `None` below the lowest tier.
fn tier_of(score: f64) -> Option<usize> {
    if score < MIN_SIMILARITY_TIER {
        return None;
    }
    let idx = ((score - MIN_SIMILARITY_TIER) / TIER_INCREMENT + 1e-9).floor() as usize;
    let last = ((MAX_SIMILARITY_TIER - MIN_SIMILARITY_TIER) / TIER_INCREMENT).floor() as usize;
    Some(idx.min(last))
}

fn tier_floor(tier: usize) -> f64 {
    MIN_SIMILARITY_TIER + tier as f64 * TIER_INCREMENT
}

/// Share of reviewed pairs scoring strictly above `threshold` that are matches.
fn precision_above(reviewed: &[ReviewedPair], threshold: f64) -> Option<f64> {
    let above: Vec<&ReviewedPair> = reviewed.iter().filter(|p| p.score > threshold).collect();
    if above.is_empty() {
        return None;
    }
    let hits = above.iter().filter(|p| p.is_match).count();
    Some(hits as f64 / above.len() as f64)
}

/// Lowest tier floor whose pairs above it reach `target` precision.
fn suggest_threshold(reviewed: &[ReviewedPair], target: f64) -> Option<f64> {
    let mut tier = 0usize;
    while tier_floor(tier) <= MAX_SIMILARITY_TIER {
        let t = tier_floor(tier);
        if precision_above(reviewed, t).is_some_and(|p| p >= target) {
            return Some(t);
        }
        tier += 1;
    }
    None
}

// Linear interpolation over an ascending slice.
fn percentile(sorted_scores: &[f64], p: f64) -> f64 {
    if sorted_scores.is_empty() {
        return 0.0;
    }
    let rank = p * (sorted_scores.len() as f64 - 1.0);
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted_scores[lower]
    } else {
        let weight = rank - lower as f64;
        sorted_scores[lower] * (1.0 - weight) + sorted_scores[upper] * weight
    }
}
