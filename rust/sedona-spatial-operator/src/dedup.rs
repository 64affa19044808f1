// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Removal of matches reported by more than one partition.
//!
//! A geometry overlapping several partition boundaries is copied into each of
//! those partitions, so a scan of every partition can report the same match
//! several times. Each match has exactly one owning partition:
//!
//! * a join match `(a, b)` is owned by the lowest partition id holding both
//!   `a` and `b`;
//! * a range match `g` is owned by the lowest partition id holding `g` among
//!   the partitions scanned for the query window;
//! * a nearest neighbor candidate has no owner; the first occurrence in
//!   `(distance, partition id, rank)` order wins.
//!
//! Matches reported by any partition other than their owner are dropped, and
//! matches with an identical identity are collapsed to the first occurrence.

use std::collections::HashSet;

use sedona_geometry::geometry::GeometryId;

/// Identity of a match, independent of the partition that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchKey {
    Single(GeometryId),
    Pair(GeometryId, GeometryId),
}

/// A query result entry carrying its provenance
pub trait Match {
    fn key(&self) -> MatchKey;

    /// Partition that produced this match
    fn partition_id(&self) -> u32;

    /// Partition that is allowed to report this match, or `None` if any
    /// partition may report it
    fn owner(&self) -> Option<u32>;
}

/// Lowest partition id present in both sorted tag lists
pub fn pair_owner(left: &[u32], right: &[u32]) -> Option<u32> {
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        match left[i].cmp(&right[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => return Some(left[i]),
        }
    }
    None
}

/// Matches kept by [`DuplicateResolver::resolve`] and the number dropped
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub matches: Vec<T>,
    pub duplicates_removed: usize,
}

/// Applies the ownership rule to a sequence of candidate matches
#[derive(Debug, Default, Clone, Copy)]
pub struct DuplicateResolver;

impl DuplicateResolver {
    /// Keep the matches reported by their owning partition, then collapse
    /// identical identities to their first occurrence
    ///
    /// The relative order of the kept matches is preserved. Resolving an
    /// already resolved sequence returns it unchanged.
    pub fn resolve<T: Match>(&self, candidates: impl IntoIterator<Item = T>) -> Resolved<T> {
        let mut seen = HashSet::new();
        let mut total = 0;
        let matches: Vec<T> = candidates
            .into_iter()
            .inspect(|_| total += 1)
            .filter(|m| self.is_owner(m))
            .filter(|m| seen.insert(m.key()))
            .collect();

        Resolved {
            duplicates_removed: total - matches.len(),
            matches,
        }
    }

    /// True if the partition is the owner of a match
    pub fn is_owner(&self, candidate: &impl Match) -> bool {
        candidate
            .owner()
            .is_none_or(|owner| owner == candidate.partition_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct TestMatch {
        left: u64,
        right: Option<u64>,
        partition_id: u32,
        owner: Option<u32>,
    }

    impl Match for TestMatch {
        fn key(&self) -> MatchKey {
            match self.right {
                Some(right) => MatchKey::Pair(GeometryId(self.left), GeometryId(right)),
                None => MatchKey::Single(GeometryId(self.left)),
            }
        }

        fn partition_id(&self) -> u32 {
            self.partition_id
        }

        fn owner(&self) -> Option<u32> {
            self.owner
        }
    }

    fn pair(left: u64, right: u64, partition_id: u32, owner: u32) -> TestMatch {
        TestMatch {
            left,
            right: Some(right),
            partition_id,
            owner: Some(owner),
        }
    }

    fn single(id: u64, partition_id: u32) -> TestMatch {
        TestMatch {
            left: id,
            right: None,
            partition_id,
            owner: None,
        }
    }

    #[test]
    fn test_pair_owner() {
        assert_eq!(pair_owner(&[1, 3, 5], &[2, 3, 5]), Some(3));
        assert_eq!(pair_owner(&[0], &[0]), Some(0));
        assert_eq!(pair_owner(&[1, 2], &[3, 4]), None);
        assert_eq!(pair_owner(&[], &[3]), None);
    }

    #[test]
    fn test_resolve_keeps_owned_matches() {
        let candidates = vec![
            pair(1, 2, 0, 1),
            pair(1, 2, 1, 1),
            pair(1, 2, 3, 1),
            pair(4, 5, 3, 3),
        ];
        let resolved = DuplicateResolver.resolve(candidates);
        assert_eq!(resolved.matches, vec![pair(1, 2, 1, 1), pair(4, 5, 3, 3)]);
        assert_eq!(resolved.duplicates_removed, 2);
    }

    #[test]
    fn test_resolve_collapses_identities() {
        let candidates = vec![single(7, 0), single(3, 0), single(7, 2), single(3, 1)];
        let resolved = DuplicateResolver.resolve(candidates);
        assert_eq!(resolved.matches, vec![single(7, 0), single(3, 0)]);
        assert_eq!(resolved.duplicates_removed, 2);
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let candidates = vec![
            pair(1, 2, 2, 2),
            pair(1, 2, 4, 2),
            pair(2, 1, 4, 4),
            single(9, 1),
            single(9, 0),
        ];
        let once = DuplicateResolver.resolve(candidates);
        let twice = DuplicateResolver.resolve(once.matches.clone());
        assert_eq!(twice.matches, once.matches);
        assert_eq!(twice.duplicates_removed, 0);
    }
}
