// src/clustering/firm_clustering.rs - Components, firm numbering and record mapping

use log::{debug, info, warn};
use petgraph::graph::{NodeIndex, UnGraph};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};

use super::union_find::UnionFind;
use crate::errors::ResolveError;
use crate::matching::registry::NameRegistry;
use crate::models::core::{FirmNum, NameId, RawNameRecord};
use crate::models::matching::{ConfirmedPair, FirmAssignment, FirmCluster, FirmComponent, FirmMap};
use crate::models::stats_models::ComponentStats;

/// Default first firm number for multi-member components.
pub const DEFAULT_BASE_OFFSET: FirmNum = 100_000_000;

const ASSIGN_STAGE: &str = "assignment";

/// Applies every confirmed edge to a union-find over `0..universe` and returns
/// the canonical partition, singletons included.
pub fn merge_components(
    universe: usize,
    confirmed: &[ConfirmedPair],
) -> Result<Vec<Vec<NameId>>, ResolveError> {
    let mut uf = UnionFind::with_universe(universe);
    let mut merges = 0usize;
    for edge in confirmed {
        if uf.union(edge.pair.name_id_1, edge.pair.name_id_2)? {
            merges += 1;
        }
    }
    debug!(
        "Union-find: {} edges, {} effective merges, {} sets",
        confirmed.len(),
        merges,
        uf.set_count()
    );
    Ok(uf.components())
}

/// Same partition as [`merge_components`], computed independently with a
/// plain graph and depth-first traversal.
pub fn graph_components(
    universe: usize,
    confirmed: &[ConfirmedPair],
) -> Result<Vec<Vec<NameId>>, ResolveError> {
    let mut graph: UnGraph<NameId, f64> = UnGraph::with_capacity(universe, confirmed.len());
    for id in 0..universe {
        graph.add_node(id as NameId);
    }
    for edge in confirmed {
        for name_id in [edge.pair.name_id_1, edge.pair.name_id_2] {
            if name_id as usize >= universe {
                return Err(ResolveError::UnknownNameId { name_id, stage: "graph check" });
            }
        }
        graph.add_edge(
            NodeIndex::new(edge.pair.name_id_1 as usize),
            NodeIndex::new(edge.pair.name_id_2 as usize),
            edge.similarity,
        );
    }

    let mut visited = vec![false; graph.node_count()];
    let mut components = Vec::new();
    for node_idx in graph.node_indices() {
        if visited[node_idx.index()] {
            continue;
        }
        let mut component = Vec::new();
        let mut stack = vec![node_idx];
        while let Some(current) = stack.pop() {
            if visited[current.index()] {
                continue;
            }
            visited[current.index()] = true;
            component.push(graph[current]);
            for neighbor in graph.neighbors(current) {
                if !visited[neighbor.index()] {
                    stack.push(neighbor);
                }
            }
        }
        component.sort_unstable();
        components.push(component);
    }
    // node order already visits components by smallest member
    Ok(components)
}

/// Fails hard when two independently computed partitions disagree.
pub fn verify_partition(
    union_find: &[Vec<NameId>],
    graph: &[Vec<NameId>],
) -> Result<(), ResolveError> {
    if union_find != graph {
        return Err(ResolveError::InconsistentPartition {
            union_find: union_find.len(),
            graph: graph.len(),
        });
    }
    Ok(())
}

/// Numbers every component.
///
/// Multi-member components get `base_offset + i`, where `i` counts
/// multi-member components in canonical order. A singleton keeps its name id
/// as firm number. `base_offset` must lie above every name id so the two
/// ranges never meet.
pub fn assign_firms(
    components: &[Vec<NameId>],
    base_offset: FirmNum,
) -> Result<FirmMap, ResolveError> {
    let universe: usize = components.iter().map(Vec::len).sum();
    if universe > 0 && base_offset < universe as FirmNum {
        return Err(ResolveError::OffsetCollision {
            base_offset,
            max_name_id: universe as u64 - 1,
        });
    }

    let mut firm_nums: Vec<Option<FirmNum>> = vec![None; universe];
    let mut next_firm = base_offset;
    for members in components {
        let firm_num = match members.as_slice() {
            [] => continue,
            [only] => *only as FirmNum,
            _ => {
                let firm = next_firm;
                next_firm = next_firm.checked_add(1).ok_or_else(|| {
                    ResolveError::invalid_config(format!(
                        "firm numbers overflow above base offset {}",
                        base_offset
                    ))
                })?;
                firm
            }
        };
        for &name_id in members {
            let slot = firm_nums
                .get_mut(name_id as usize)
                .ok_or(ResolveError::UnknownNameId { name_id, stage: ASSIGN_STAGE })?;
            if slot.is_some() {
                return Err(ResolveError::DuplicateNameId { name_id, stage: ASSIGN_STAGE });
            }
            *slot = Some(firm_num);
        }
    }

    // ids are dense, so a full count with no duplicates covers 0..universe
    let dense = firm_nums.into_iter().flatten().collect::<Vec<_>>();
    debug!(
        "Assigned {} multi-member firms above offset {}",
        next_firm - base_offset,
        base_offset
    );
    Ok(FirmMap::from_dense(dense))
}

/// Pairs each canonical component with its firm number.
pub fn firm_components(components: &[Vec<NameId>], firm_map: &FirmMap) -> Vec<FirmComponent> {
    components
        .iter()
        .filter_map(|members| {
            let first = *members.first()?;
            let firm_num = firm_map.get(first)?;
            Some(FirmComponent { firm_num, members: members.clone() })
        })
        .collect()
}

/// Lazily joins records to firms through their weak form. Missing names and
/// names that standardize to nothing map to `None`.
pub fn iter_assignments<'a, I>(
    records: I,
    registry: &'a NameRegistry,
    firm_map: &'a FirmMap,
) -> impl Iterator<Item = FirmAssignment> + 'a
where
    I: IntoIterator<Item = &'a RawNameRecord>,
    I::IntoIter: 'a,
{
    records.into_iter().map(move |record| {
        let firm_num = record
            .raw_name
            .as_deref()
            .and_then(|raw| registry.id_of_raw(raw))
            .and_then(|name_id| firm_map.get(name_id));
        FirmAssignment {
            source_tag: record.source_tag.clone(),
            record_id: record.record_id.clone(),
            firm_num,
        }
    })
}

pub fn map_records(
    records: &[RawNameRecord],
    registry: &NameRegistry,
    firm_map: &FirmMap,
) -> Vec<FirmAssignment> {
    iter_assignments(records, registry, firm_map).collect()
}

pub fn component_stats(components: &[Vec<NameId>]) -> ComponentStats {
    let mut stats = ComponentStats {
        total_components: components.len(),
        ..Default::default()
    };
    for members in components {
        stats.largest_component = stats.largest_component.max(members.len());
        if members.len() > 1 {
            stats.multi_member_components += 1;
            stats.names_in_multi_member += members.len();
        } else {
            stats.singleton_components += 1;
        }
    }
    stats
}

/// SHA-256 over the partition written as weak names. Since name ids follow
/// sorted names, the digest only depends on the name set and the edges.
pub fn partition_digest(components: &[Vec<NameId>], registry: &NameRegistry) -> String {
    let mut hasher = Sha256::new();
    for members in components {
        for (i, &name_id) in members.iter().enumerate() {
            if i > 0 {
                hasher.update([0x1f]);
            }
            hasher.update(registry.name(name_id).unwrap_or_default().as_bytes());
        }
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

/// Builds one export row per multi-member firm and warns about components
/// above `large_component_warn` names, which usually signal an over-merge.
pub fn summarize_components<'a, I>(
    components: &[FirmComponent],
    registry: &NameRegistry,
    records: I,
    confirmed: &[ConfirmedPair],
    large_component_warn: usize,
) -> Vec<FirmCluster>
where
    I: IntoIterator<Item = &'a RawNameRecord>,
{
    let mut firm_of: HashMap<NameId, FirmNum> = HashMap::new();
    for component in components.iter().filter(|c| !c.is_singleton()) {
        for &name_id in &component.members {
            firm_of.insert(name_id, component.firm_num);
        }
    }

    let mut sources: HashMap<FirmNum, BTreeMap<String, u64>> = HashMap::new();
    for record in records {
        let Some(name_id) = record.raw_name.as_deref().and_then(|raw| registry.id_of_raw(raw)) else {
            continue;
        };
        if let Some(firm) = firm_of.get(&name_id) {
            *sources
                .entry(*firm)
                .or_default()
                .entry(record.source_tag.clone())
                .or_insert(0) += 1;
        }
    }

    let mut edges: HashMap<FirmNum, Vec<f64>> = HashMap::new();
    for edge in confirmed {
        if let Some(firm) = firm_of.get(&edge.pair.name_id_1) {
            edges.entry(*firm).or_default().push(edge.similarity);
        }
    }

    let mut clusters = Vec::new();
    let mut large = 0usize;
    for component in components.iter().filter(|c| !c.is_singleton()) {
        // members ascend by name, so the first maximum is also the smallest name
        let representative = component
            .members
            .iter()
            .copied()
            .fold(None::<(NameId, u64)>, |best, id| {
                let count = registry.occurrences(id);
                match best {
                    Some((_, best_count)) if best_count >= count => best,
                    _ => Some((id, count)),
                }
            })
            .and_then(|(id, _)| registry.name(id))
            .unwrap_or_default()
            .to_string();

        let similarities = edges.get(&component.firm_num).map(Vec::as_slice).unwrap_or(&[]);
        let (min_edge, avg_edge) = if similarities.is_empty() {
            (0.0, 0.0)
        } else {
            let min = similarities.iter().copied().fold(f64::INFINITY, f64::min);
            let avg = similarities.iter().sum::<f64>() / similarities.len() as f64;
            (min, avg)
        };

        if component.members.len() > large_component_warn {
            large += 1;
            warn!(
                "Firm {} has {} names (representative '{}', min edge {:.3}); possible over-merge",
                component.firm_num,
                component.members.len(),
                representative,
                min_edge
            );
        }

        clusters.push(FirmCluster {
            firm_num: component.firm_num,
            name_count: component.members.len(),
            representative_name: representative,
            names: component
                .members
                .iter()
                .filter_map(|&id| registry.name(id).map(str::to_string))
                .collect(),
            records_by_source: sources.remove(&component.firm_num).unwrap_or_default(),
            edge_count: similarities.len(),
            min_edge_similarity: min_edge,
            avg_edge_similarity: avg_edge,
        });
    }

    info!(
        "Summarized {} multi-member firms ({} above {} names)",
        clusters.len(),
        large,
        large_component_warn
    );
    clusters
}
