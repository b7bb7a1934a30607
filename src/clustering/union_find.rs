// src/clustering/union_find.rs - Weighted union-find over dense name ids
use crate::errors::ResolveError;
use crate::models::core::NameId;

const STAGE: &str = "merge";

/// Disjoint sets over `0..universe`, with union by size and path compression.
///
/// Every id of the universe is a member from the start, so ids never touched
/// by a union come out as singleton components.
#[derive(Debug, Clone)]
pub struct UnionFind {
    parent: Vec<NameId>,
    size: Vec<u32>,
    sets: usize,
}

impl UnionFind {
    pub fn with_universe(universe: usize) -> Self {
        Self {
            parent: (0..universe).map(|id| id as NameId).collect(),
            size: vec![1; universe],
            sets: universe,
        }
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Number of disjoint sets currently held.
    pub fn set_count(&self) -> usize {
        self.sets
    }

    fn check(&self, name_id: NameId) -> Result<(), ResolveError> {
        if (name_id as usize) < self.parent.len() {
            Ok(())
        } else {
            Err(ResolveError::UnknownNameId { name_id, stage: STAGE })
        }
    }

    /// Root of `name_id`'s set. Compresses the path it walks.
    pub fn find(&mut self, name_id: NameId) -> Result<NameId, ResolveError> {
        self.check(name_id)?;
        let mut root = name_id;
        while self.parent[root as usize] != root {
            root = self.parent[root as usize];
        }
        let mut node = name_id;
        while self.parent[node as usize] != root {
            let next = self.parent[node as usize];
            self.parent[node as usize] = root;
            node = next;
        }
        Ok(root)
    }

    /// Merges the sets of `a` and `b`. Returns false when they were already joined.
    pub fn union(&mut self, a: NameId, b: NameId) -> Result<bool, ResolveError> {
        let root_a = self.find(a)?;
        let root_b = self.find(b)?;
        if root_a == root_b {
            return Ok(false);
        }
        let (big, small) = if self.size[root_a as usize] >= self.size[root_b as usize] {
            (root_a, root_b)
        } else {
            (root_b, root_a)
        };
        self.parent[small as usize] = big;
        self.size[big as usize] += self.size[small as usize];
        self.sets -= 1;
        Ok(true)
    }

    /// Canonical partition: members ascending, components ordered by their
    /// smallest member. Identical for any order in which unions were applied.
    pub fn components(&mut self) -> Vec<Vec<NameId>> {
        let universe = self.parent.len();
        let mut slot_of_root: Vec<Option<usize>> = vec![None; universe];
        let mut components: Vec<Vec<NameId>> = Vec::with_capacity(self.sets);
        for id in 0..universe {
            let name_id = id as NameId;
            // ids below the universe size always resolve
            let root = match self.find(name_id) {
                Ok(root) => root as usize,
                Err(_) => continue,
            };
            match slot_of_root[root] {
                Some(slot) => components[slot].push(name_id),
                None => {
                    slot_of_root[root] = Some(components.len());
                    components.push(vec![name_id]);
                }
            }
        }
        components
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_untouched_ids_are_singletons() {
        let mut uf = UnionFind::with_universe(4);
        assert_eq!(uf.set_count(), 4);
        assert_eq!(uf.components(), vec![vec![0], vec![1], vec![2], vec![3]]);
    }

    #[test]
    fn test_transitive_merge() {
        let mut uf = UnionFind::with_universe(5);
        assert!(uf.union(0, 3).unwrap());
        assert!(uf.union(3, 4).unwrap());
        // 0 and 4 were never united directly
        assert_eq!(uf.find(0).unwrap(), uf.find(4).unwrap());
        assert!(!uf.union(4, 0).unwrap());
        assert_eq!(uf.set_count(), 3);
        assert_eq!(uf.components(), vec![vec![0, 3, 4], vec![1], vec![2]]);
    }

    #[test]
    fn test_find_is_idempotent() {
        let mut uf = UnionFind::with_universe(6);
        uf.union(1, 2).unwrap();
        uf.union(2, 5).unwrap();
        let root = uf.find(5).unwrap();
        assert_eq!(uf.find(root).unwrap(), root);
        assert_eq!(uf.find(1).unwrap(), root);
    }

    #[test]
    fn test_unknown_id_is_reported() {
        let mut uf = UnionFind::with_universe(2);
        let err = uf.union(0, 9).unwrap_err();
        assert!(matches!(err, ResolveError::UnknownNameId { name_id: 9, .. }));
    }

    #[test]
    fn test_empty_universe() {
        let mut uf = UnionFind::with_universe(0);
        assert!(uf.is_empty());
        assert!(uf.components().is_empty());
    }

    fn edges(universe: usize) -> impl Strategy<Value = Vec<(NameId, NameId)>> {
        let id = 0..universe as NameId;
        prop::collection::vec((id.clone(), id), 0..40)
    }

    proptest! {
        #[test]
        fn partition_is_independent_of_edge_order(list in edges(30), seed in any::<u64>()) {
            let mut forward = UnionFind::with_universe(30);
            for &(a, b) in &list {
                forward.union(a, b).unwrap();
            }

            let mut shuffled = list.clone();
            // deterministic shuffle driven by the generated seed
            let mut state = seed | 1;
            for i in (1..shuffled.len()).rev() {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                shuffled.swap(i, (state % (i as u64 + 1)) as usize);
            }
            let mut backward = UnionFind::with_universe(30);
            for &(a, b) in shuffled.iter().rev() {
                backward.union(b, a).unwrap();
            }

            prop_assert_eq!(forward.components(), backward.components());
        }

        #[test]
        fn components_form_a_partition(list in edges(25)) {
            let mut uf = UnionFind::with_universe(25);
            for &(a, b) in &list {
                uf.union(a, b).unwrap();
            }
            let set_count = uf.set_count();
            let components = uf.components();
            prop_assert_eq!(components.len(), set_count);
            let mut seen: Vec<NameId> = components.iter().flatten().copied().collect();
            seen.sort_unstable();
            prop_assert_eq!(seen, (0..25).collect::<Vec<NameId>>());
            for &(a, b) in &list {
                prop_assert_eq!(uf.find(a).unwrap(), uf.find(b).unwrap());
            }
        }
    }
}
