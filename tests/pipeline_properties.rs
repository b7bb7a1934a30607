// tests/pipeline_properties.rs
//
// End-to-end behaviour of the resolution pipeline on small, hand-checked inputs.
// Most runs use the exhaustive banding layout so every pair is scored and the
// outcome depends only on the similarity rule; the `default_layout_*` tests go
// through the shipped candidate generator.

use firm_lib::clustering::firm_clustering::{assign_firms, map_records, merge_components};
use firm_lib::errors::ResolveError;
use firm_lib::matching::manager::{run_firm_resolution, FirmResolution};
use firm_lib::matching::registry::NameRegistry;
use firm_lib::models::core::{FirmNum, RawNameRecord};
use firm_lib::models::matching::CandidatePair;
use firm_lib::utils::cluster_config::ClusterConfig;
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};

fn config() -> ClusterConfig {
    ClusterConfig {
        worker_threads: 2,
        ..ClusterConfig::exhaustive()
    }
}

fn default_config() -> ClusterConfig {
    ClusterConfig {
        worker_threads: 2,
        ..ClusterConfig::default()
    }
}

fn records(names: &[&str]) -> Vec<RawNameRecord> {
    names
        .iter()
        .enumerate()
        .map(|(i, n)| RawNameRecord::new("grant", format!("r{}", i), *n))
        .collect()
}

fn firms_by_record(res: &FirmResolution) -> HashMap<String, Option<FirmNum>> {
    res.assignments
        .iter()
        .map(|a| (a.record_id.clone(), a.firm_num))
        .collect()
}

fn resolve(names: &[&str], config: &ClusterConfig) -> (Vec<RawNameRecord>, FirmResolution) {
    let recs = records(names);
    let res = run_firm_resolution(&recs, config, None, None).unwrap();
    (recs, res)
}

#[test]
fn acme_variants_share_one_firm() {
    let (_, res) = resolve(
        &["Acme Corp", "ACME CORPORATION", "Acme Corp.", "Acme Holdings (USA)", "acme co"],
        &config(),
    );
    let firms = firms_by_record(&res);
    let first = firms["r0"];
    assert!(first.is_some());
    assert!(firms.values().all(|f| *f == first));
    // "Acme Corp" and "Acme Corp." share a weak form
    assert_eq!(res.report.ingest.unique_names, 4);
    assert_eq!(res.report.components.multi_member_components, 1);
}

#[test]
fn unrelated_names_keep_separate_firms() {
    let (_, res) = resolve(&["Acme Corp", "Zenith Industries"], &config());
    let firms = firms_by_record(&res);
    assert_ne!(firms["r0"], firms["r1"]);
    assert_eq!(res.report.confirmed_pairs, 0);
    assert_eq!(res.report.components.singleton_components, 2);
}

#[test]
fn merging_is_transitive_across_weak_links() {
    // a~b and b~c score 0.9, a~c only 0.8
    let names = ["brightwater dynamics", "brightwatxr dynamizs", "brixhtwatxr dynqmizs"];
    let (_, res) = resolve(&names, &config());

    let firms = firms_by_record(&res);
    assert!(firms["r0"].is_some());
    assert_eq!(firms["r0"], firms["r1"]);
    assert_eq!(firms["r1"], firms["r2"]);

    let a = res.registry.id_of_raw(names[0]).unwrap();
    let c = res.registry.id_of_raw(names[2]).unwrap();
    assert!(!res.confirmed.iter().any(|p| p.pair == CandidatePair::new(a, c)));
    assert_eq!(res.confirmed.len(), 2);
}

#[test]
fn empty_strong_forms_stay_apart_and_empty_weak_forms_are_null() {
    let mut recs = records(&["THE", "A", "!!!", "The"]);
    recs.push(RawNameRecord::without_name("assignee", "x1"));
    let res = run_firm_resolution(&recs, &config(), None, None).unwrap();
    let firms = firms_by_record(&res);

    let the = firms["r0"];
    let a = firms["r1"];
    assert!(the.is_some());
    assert!(a.is_some());
    assert_ne!(the, a);
    assert_eq!(firms["r3"], the);
    assert_eq!(firms["r2"], None);
    assert_eq!(firms["x1"], None);

    assert_eq!(res.report.confirmed_pairs, 0);
    assert_eq!(res.report.null_records, 2);
    assert_eq!(res.report.ingest.missing_names, 1);
    assert_eq!(res.report.ingest.empty_after_standardization, 1);
    assert_eq!(res.assignments.len(), recs.len());
}

#[test]
fn default_layout_merges_acme_in_any_order() {
    let names = ["Acme Corp", "ACME CORPORATION", "Acme Corp."];
    let orders = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];
    for order in orders {
        let shuffled: Vec<&str> = order.iter().map(|&i| names[i]).collect();
        let (_, res) = resolve(&shuffled, &default_config());
        assert_eq!(res.report.candidate_pairs, 1, "order {:?}", order);
        let firms: HashSet<Option<FirmNum>> = res.assignments.iter().map(|a| a.firm_num).collect();
        assert_eq!(firms.len(), 1, "order {:?} split the firm", order);
        assert!(firms.contains(&Some(100_000_000)));
    }
}

#[test]
fn default_layout_merges_acronym_spellings() {
    let (_, res) = resolve(
        &[
            "IBM",
            "I.B.M.",
            "I. B. M. Corp.",
            "IBM Corp",
            "Zenith Industries",
            "Zenith Industries Ltd",
            "Globex",
        ],
        &default_config(),
    );
    let firms = firms_by_record(&res);
    for r in ["r1", "r2", "r3"] {
        assert_eq!(firms[r], firms["r0"], "{} left the IBM firm", r);
    }
    assert_eq!(firms["r4"], firms["r5"]);
    assert_ne!(firms["r0"], firms["r4"]);
    assert_ne!(firms["r6"], firms["r0"]);
    assert_eq!(res.report.components.multi_member_components, 2);
}

#[test]
fn postscripts_join_the_bare_name() {
    let (_, res) = resolve(&["Acme Widgets; Wilmington Delaware", "Acme Widgets"], &default_config());
    let firms = firms_by_record(&res);
    assert!(firms["r0"].is_some());
    assert_eq!(firms["r0"], firms["r1"]);
    assert_eq!(res.report.ingest.unique_names, 2);
    assert_eq!(res.confirmed.len(), 1);
    assert_eq!(res.confirmed[0].similarity, 1.0);
}

#[test]
fn acronyms_and_legal_forms_at_a_loose_threshold() {
    // "apple" vs "apple computer" is 5 of 14 chars kept (~0.357), so the
    // Apple pair needs a threshold below that to merge
    let config = ClusterConfig {
        similarity_threshold: 0.35,
        ..config()
    };
    let (_, res) = resolve(
        &[
            "IBM",
            "I.B.M.",
            "International Business Machines Corp",
            "Apple Inc",
            "Apple Computer, Inc.",
        ],
        &config,
    );
    let firms = firms_by_record(&res);

    assert_eq!(firms["r0"], firms["r1"]);
    assert_eq!(firms["r3"], firms["r4"]);
    assert_ne!(firms["r0"], firms["r2"]);
    assert_ne!(firms["r0"], firms["r3"]);
    assert_ne!(firms["r2"], firms["r3"]);
    assert_eq!(res.report.components.multi_member_components, 2);
}

#[test]
fn apple_variants_stay_apart_at_the_default_threshold() {
    // strong forms "apple" and "apple computer" score ~0.357, far below 0.85
    let (_, res) = resolve(&["Apple Inc", "Apple Computer, Inc."], &config());
    let firms = firms_by_record(&res);
    assert_ne!(firms["r0"], firms["r1"]);
}

#[test]
fn partition_covers_every_unique_name_once() {
    let names = [
        "Acme Corp",
        "ACME CORPORATION",
        "Zenith Industries",
        "Zenith Industries Ltd",
        "Brightwater Dynamics",
        "Northwind Traders",
        "Northwind Trader",
        "Globex",
        "Initech LLC",
        "Initech",
        "Umbrella",
    ];
    let (_, res) = resolve(&names, &config());
    let n = res.registry.len();

    let mut seen = HashSet::new();
    for component in &res.components {
        assert!(!component.members.is_empty());
        assert!(component.members.windows(2).all(|w| w[0] < w[1]));
        for &id in &component.members {
            assert!((id as usize) < n);
            assert!(seen.insert(id), "name id {} in two components", id);
        }
    }
    assert_eq!(seen.len(), n);
    assert_eq!(res.firm_map.len(), n);

    // one firm per component, and every member maps to it
    let firm_set: HashSet<FirmNum> = res.components.iter().map(|c| c.firm_num).collect();
    assert_eq!(firm_set.len(), res.components.len());
    for component in &res.components {
        for &id in &component.members {
            assert_eq!(res.firm_map.get(id), Some(component.firm_num));
        }
    }
}

#[test]
fn multi_member_firms_count_up_from_the_offset() {
    let config = ClusterConfig {
        base_offset: 500,
        ..config()
    };
    let (_, res) = resolve(
        &["Acme Corp", "ACME CORPORATION", "Zenith Industries", "Zenith Industries Ltd", "Globex"],
        &config,
    );
    let mut multi: Vec<FirmNum> = res
        .components
        .iter()
        .filter(|c| !c.is_singleton())
        .map(|c| c.firm_num)
        .collect();
    multi.sort_unstable();
    assert_eq!(multi, vec![500, 501]);

    let globex = res.registry.id_of_raw("Globex").unwrap();
    assert_eq!(res.firm_map.get(globex), Some(globex as FirmNum));
}

#[test]
fn offset_below_universe_is_rejected() {
    let config = ClusterConfig {
        base_offset: 2,
        ..config()
    };
    let recs = records(&["Acme", "Zenith", "Globex", "Initech"]);
    let err = run_firm_resolution(&recs, &config, None, None).unwrap_err();
    assert!(matches!(err, ResolveError::OffsetCollision { base_offset: 2, .. }));
}

#[test]
fn map_records_joins_through_the_weak_form() {
    let recs = vec![
        RawNameRecord::new("grant", "g1", "Acme Corp"),
        RawNameRecord::new("assignee", "a1", "ACME CORP."),
        RawNameRecord::new("assignor", "s1", "Acme Corporation"),
        RawNameRecord::new("financial-filer", "f1", "Zenith Industries"),
        RawNameRecord::without_name("grant", "g2"),
    ];
    let (registry, _) = NameRegistry::build(&recs, 1_000).unwrap();
    let strong = registry.strong_forms();

    let n = registry.len() as u32;
    let all_pairs: Vec<CandidatePair> = (0..n)
        .flat_map(|a| (a + 1..n).map(move |b| CandidatePair::new(a, b)))
        .collect();
    let confirmed = config().confirmer().unwrap().confirm_all(&all_pairs, &strong).unwrap();
    let partition = merge_components(registry.len(), &confirmed).unwrap();
    let firm_map = assign_firms(&partition, 100).unwrap();

    let assignments = map_records(&recs, &registry, &firm_map);
    assert_eq!(assignments.len(), recs.len());
    assert_eq!(assignments[0].firm_num, Some(100));
    assert_eq!(assignments[1].firm_num, Some(100));
    assert_eq!(assignments[2].firm_num, Some(100));
    assert_ne!(assignments[3].firm_num, Some(100));
    assert!(assignments[3].firm_num.is_some());
    assert_eq!(assignments[4].firm_num, None);
    assert_eq!(assignments[1].source_tag, "assignee");
    assert_eq!(assignments[1].record_id, "a1");
}

const ORDER_NAMES: [&str; 8] = [
    "Acme Corp",
    "ACME CORPORATION",
    "Acme Corp.",
    "Zenith Industries",
    "Zenith Industries Ltd",
    "Globex",
    "Initech LLC",
    "Initech",
];

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn firm_numbers_ignore_record_order(
        order in Just((0..ORDER_NAMES.len()).collect::<Vec<usize>>()).prop_shuffle()
    ) {
        let recs = records(&ORDER_NAMES);
        let baseline = run_firm_resolution(&recs, &config(), None, None).unwrap();

        let shuffled: Vec<RawNameRecord> = order.iter().map(|&i| recs[i].clone()).collect();
        let res = run_firm_resolution(&shuffled, &config(), None, None).unwrap();

        prop_assert_eq!(firms_by_record(&res), firms_by_record(&baseline));
        prop_assert_eq!(&res.report.partition_digest, &baseline.report.partition_digest);
        let ids: Vec<&str> = res.assignments.iter().map(|a| a.record_id.as_str()).collect();
        let expected: Vec<&str> = shuffled.iter().map(|r| r.record_id.as_str()).collect();
        prop_assert_eq!(ids, expected);
    }
}
