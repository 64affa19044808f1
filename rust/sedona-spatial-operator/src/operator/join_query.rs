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

use std::sync::Arc;

use rayon::prelude::*;
use sedona_common::option::{IndexType, JoinStrategy, SpatialPartitioningOptions};
use sedona_common::{QueryError, Result};
use sedona_geometry::crs::ensure_crs_compatible;
use sedona_geometry::geometry::{GeometryId, SpatialGeometry};

use crate::collection::{Partition, PartitionEntry, PartitionedCollection};
use crate::dedup::{pair_owner, DuplicateResolver, Match, MatchKey};
use crate::index::SpatialIndex;
use crate::operator::QueryMetrics;
use crate::spatial_predicate::SpatialPredicate;

/// A pair `(left, right)` satisfying `predicate(left, right)`
#[derive(Debug, Clone)]
pub struct JoinMatch {
    left: Arc<SpatialGeometry>,
    right: Arc<SpatialGeometry>,
    partition_id: u32,
    owner: Option<u32>,
}

impl JoinMatch {
    pub fn left(&self) -> &Arc<SpatialGeometry> {
        &self.left
    }

    pub fn right(&self) -> &Arc<SpatialGeometry> {
        &self.right
    }

    /// Identities of both sides
    pub fn ids(&self) -> (GeometryId, GeometryId) {
        (self.left.id(), self.right.id())
    }
}

impl Match for JoinMatch {
    fn key(&self) -> MatchKey {
        MatchKey::Pair(self.left.id(), self.right.id())
    }

    fn partition_id(&self) -> u32 {
        self.partition_id
    }

    fn owner(&self) -> Option<u32> {
        self.owner
    }
}

#[derive(Debug, Clone)]
pub struct JoinQueryResult {
    pub matches: Vec<JoinMatch>,
    /// Malformed geometries dropped from both sides
    pub skipped: usize,
    pub metrics: QueryMetrics,
}

/// Spatial join of two collections sharing one partitioning
///
/// Each pair of co-located partitions is joined independently. Depending on
/// the [`JoinStrategy`] and the partition sizes, a pair is joined by a nested
/// loop or by probing a local index built over the smaller side. A prebuilt
/// index of the smaller side is reused.
#[derive(Debug, Clone)]
pub struct JoinQuery {
    predicate: SpatialPredicate,
    strategy: JoinStrategy,
    index_type: IndexType,
    node_capacity: usize,
}

impl JoinQuery {
    pub fn new(predicate: SpatialPredicate) -> Self {
        Self::from_options(predicate, &SpatialPartitioningOptions::default())
    }

    pub fn from_options(predicate: SpatialPredicate, options: &SpatialPartitioningOptions) -> Self {
        Self {
            predicate,
            strategy: options.join_strategy,
            index_type: options.index_type,
            node_capacity: options.index_node_capacity,
        }
    }

    pub fn with_strategy(mut self, strategy: JoinStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Index flavour and node capacity of indexes built during the join
    pub fn with_index(mut self, index_type: IndexType, node_capacity: usize) -> Self {
        self.index_type = index_type;
        self.node_capacity = node_capacity;
        self
    }

    pub fn predicate(&self) -> SpatialPredicate {
        self.predicate
    }

    pub fn execute(
        &self,
        left: &PartitionedCollection,
        right: &PartitionedCollection,
    ) -> Result<JoinQueryResult> {
        ensure_crs_compatible(left.crs(), right.crs())?;
        if !Arc::ptr_eq(left.partitioning(), right.partitioning())
            && !left.partitioning().same_as(right.partitioning())
        {
            return Err(QueryError::PartitioningMismatch.into());
        }

        let per_partition = left
            .partitions()
            .par_iter()
            .zip(right.partitions().par_iter())
            .map(|(l, r)| self.join_partition(l, r))
            .collect::<Result<Vec<_>>>()?;

        let candidates = per_partition.iter().map(|(_, c)| *c).sum();
        let resolved =
            DuplicateResolver.resolve(per_partition.into_iter().flat_map(|(matches, _)| matches));

        log::debug!(
            "{} join over {} partitions: {} candidates, {} matches, {} duplicates removed",
            self.predicate,
            left.num_partitions(),
            candidates,
            resolved.matches.len(),
            resolved.duplicates_removed
        );

        Ok(JoinQueryResult {
            metrics: QueryMetrics {
                candidates,
                results: resolved.matches.len(),
                duplicates_removed: resolved.duplicates_removed,
            },
            matches: resolved.matches,
            skipped: left.skipped() + right.skipped(),
        })
    }

    /// Join one pair of co-located partitions, returning all matches found
    /// and the number of envelope candidates
    fn join_partition(
        &self,
        left: &Partition,
        right: &Partition,
    ) -> Result<(Vec<JoinMatch>, usize)> {
        if left.is_empty() || right.is_empty() {
            return Ok((Vec::new(), 0));
        }

        let mut matches = Vec::new();
        let mut candidates = 0;
        let mut emit = |a: &PartitionEntry, b: &PartitionEntry| {
            candidates += 1;
            if self.predicate.evaluate(a.geometry(), b.geometry()) {
                matches.push(JoinMatch {
                    left: Arc::clone(a.geometry()),
                    right: Arc::clone(b.geometry()),
                    partition_id: left.id(),
                    owner: pair_owner(a.partitions(), b.partitions()),
                });
            }
        };

        let indexed = self.strategy.use_index(left.len(), right.len());
        if !indexed {
            for a in left.entries() {
                for b in right.entries() {
                    if envelopes_pass(self.predicate, a, b) {
                        emit(a, b);
                    }
                }
            }
        } else {
            let index_left = left.len() <= right.len();
            let (build, probe) = if index_left { (left, right) } else { (right, left) };
            let index = match build.index() {
                Some(index) => Arc::clone(index),
                None => Arc::new(SpatialIndex::build(
                    build.entries().to_vec(),
                    self.index_type,
                    self.node_capacity,
                )?),
            };

            for probe_entry in probe.entries() {
                let Some(envelope) = probe_entry.geometry().envelope() else {
                    continue;
                };
                for build_entry in index.query(envelope) {
                    if index_left {
                        emit(build_entry, probe_entry);
                    } else {
                        emit(probe_entry, build_entry);
                    }
                }
            }
        }

        log::trace!(
            "Join partition {} ({} x {}, {}): {candidates} candidates, {} matches",
            left.id(),
            left.len(),
            right.len(),
            if indexed { "indexed" } else { "nested loop" },
            matches.len()
        );
        Ok((matches, candidates))
    }
}

fn envelopes_pass(predicate: SpatialPredicate, a: &PartitionEntry, b: &PartitionEntry) -> bool {
    match (a.geometry().envelope(), b.geometry().envelope()) {
        (Some(a), Some(b)) => predicate.envelope_filter(a, b),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::SpatialCollection;
    use geo_types::{Coord, Rect};
    use rstest::rstest;
    use sedona_common::option::GridType;
    use sedona_common::SedonaError;
    use sedona_geometry::crs::Crs;
    use sedona_testing::datagen::{lattice_points, GeometryKind, RandomGeometryBuilder};

    fn random_splits(seed: u64, kind: GeometryKind) -> Vec<Vec<Arc<SpatialGeometry>>> {
        RandomGeometryBuilder::new()
            .seed(seed)
            .num_splits(2)
            .rows_per_split(300)
            .geometry_kind(kind)
            .bounds(Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 100.0, y: 100.0 }))
            .size_range((1.0, 12.0))
            .build()
    }

    fn brute_force(
        left: &[Vec<Arc<SpatialGeometry>>],
        right: &[Vec<Arc<SpatialGeometry>>],
        predicate: SpatialPredicate,
    ) -> Vec<(u64, u64)> {
        let mut pairs = Vec::new();
        for a in left.iter().flatten() {
            for b in right.iter().flatten() {
                if predicate.evaluate(a, b) {
                    pairs.push((a.id().0, b.id().0));
                }
            }
        }
        pairs.sort_unstable();
        pairs
    }

    fn sorted_pairs(result: &JoinQueryResult) -> Vec<(u64, u64)> {
        let mut pairs: Vec<(u64, u64)> = result
            .matches
            .iter()
            .map(|m| (m.left().id().0, m.right().id().0))
            .collect();
        pairs.sort_unstable();
        pairs
    }

    #[rstest]
    fn test_join_matches_brute_force(
        #[values(GridType::EqualGrid, GridType::QuadTree, GridType::RTree)] grid_type: GridType,
        #[values(
            SpatialPredicate::Intersects,
            SpatialPredicate::Contains,
            SpatialPredicate::Within
        )]
        predicate: SpatialPredicate,
        #[values(JoinStrategy::NestedLoop, JoinStrategy::Indexed, JoinStrategy::Auto(4))]
        strategy: JoinStrategy,
    ) {
        let left_splits = random_splits(21, GeometryKind::Polygon);
        let right_splits = random_splits(22, GeometryKind::Point);

        let options = SpatialPartitioningOptions::default();
        let left = SpatialCollection::new(left_splits.clone())
            .partition(grid_type, 8, &options)
            .unwrap();
        let right = SpatialCollection::new(right_splits.clone())
            .partition_with(Arc::clone(left.partitioning()))
            .unwrap();

        let result = JoinQuery::new(predicate)
            .with_strategy(strategy)
            .execute(&left, &right)
            .unwrap();
        let expected = brute_force(&left_splits, &right_splits, predicate);
        assert_eq!(sorted_pairs(&result), expected);
        assert_eq!(result.metrics.results, expected.len());
    }

    #[test]
    fn test_prebuilt_index_is_reused() {
        let options = SpatialPartitioningOptions::default();
        let left = SpatialCollection::new(vec![lattice_points(20)])
            .partition(GridType::KdbTree, 4, &options)
            .unwrap()
            .build_index(IndexType::QuadTree, 4)
            .unwrap();
        let right = SpatialCollection::new(vec![lattice_points(20)])
            .partition_with(Arc::clone(left.partitioning()))
            .unwrap();

        let result = JoinQuery::new(SpatialPredicate::Intersects)
            .with_strategy(JoinStrategy::Indexed)
            .execute(&left, &right)
            .unwrap();

        // Both sides hold the same points, which only match themselves
        assert_eq!(result.matches.len(), 400);
        assert!(result.matches.iter().all(|m| m.left().id() == m.right().id()));
    }

    #[test]
    fn test_partitioning_mismatch() {
        let options = SpatialPartitioningOptions::default();
        let collection = SpatialCollection::new(vec![lattice_points(10)]);
        let left = collection.partition(GridType::EqualGrid, 4, &options).unwrap();
        let right = collection.partition(GridType::EqualGrid, 9, &options).unwrap();
        let err = JoinQuery::new(SpatialPredicate::Intersects)
            .execute(&left, &right)
            .unwrap_err();
        assert!(matches!(err, SedonaError::Query(QueryError::PartitioningMismatch)));

        // Equal boundaries computed independently are accepted
        let again = collection.partition(GridType::EqualGrid, 4, &options).unwrap();
        assert!(JoinQuery::new(SpatialPredicate::Intersects)
            .execute(&left, &again)
            .is_ok());
    }

    #[test]
    fn test_mismatched_crs() {
        let options = SpatialPartitioningOptions::default();
        let left = SpatialCollection::new(vec![lattice_points(5)])
            .with_crs(Some(Crs::epsg(4326)))
            .partition(GridType::EqualGrid, 4, &options)
            .unwrap();
        let right = SpatialCollection::new(vec![lattice_points(5)])
            .with_crs(Some(Crs::epsg(3857)))
            .partition_with(Arc::clone(left.partitioning()))
            .unwrap();
        let err = JoinQuery::new(SpatialPredicate::Intersects)
            .execute(&left, &right)
            .unwrap_err();
        assert!(matches!(
            err,
            SedonaError::Query(QueryError::MismatchedReferenceFrame { .. })
        ));
    }
}
