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

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};
use std::sync::Arc;

use geo_types::Point;
use rayon::prelude::*;
use sedona_common::{QueryError, Result};
use sedona_geometry::crs::{ensure_crs_compatible, Crs};
use sedona_geometry::geometry::SpatialGeometry;

use crate::collection::{Partition, PartitionedCollection};
use crate::dedup::{Match, MatchKey};
use crate::operator::QueryMetrics;

/// A nearest neighbor with its distance to the query point
#[derive(Debug, Clone)]
pub struct KnnMatch {
    geometry: Arc<SpatialGeometry>,
    distance: f64,
    partition_id: u32,
    /// Position in the partition's local result list
    rank: usize,
}

impl KnnMatch {
    pub fn geometry(&self) -> &Arc<SpatialGeometry> {
        &self.geometry
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }
}

impl Match for KnnMatch {
    fn key(&self) -> MatchKey {
        MatchKey::Single(self.geometry.id())
    }

    fn partition_id(&self) -> u32 {
        self.partition_id
    }

    fn owner(&self) -> Option<u32> {
        None
    }
}

#[derive(Debug, Clone)]
pub struct KnnQueryResult {
    /// Neighbors in ascending distance order
    pub matches: Vec<KnnMatch>,
    pub skipped: usize,
    pub metrics: QueryMetrics,
}

/// The `k` geometries of a partitioned collection nearest to a point
///
/// Every partition computes its local top `k` in parallel. The local lists
/// are merged in `(distance, partition id, local rank)` order and the first
/// occurrence of each geometry is kept until `k` geometries are found.
#[derive(Debug, Clone)]
pub struct KnnQuery {
    point: Point<f64>,
    k: i64,
    crs: Option<Crs>,
    use_index: bool,
}

impl KnnQuery {
    pub fn new(point: Point<f64>, k: i64) -> Self {
        Self {
            point,
            k,
            crs: None,
            use_index: true,
        }
    }

    /// Reference system of the query point
    pub fn with_crs(mut self, crs: Option<Crs>) -> Self {
        self.crs = crs;
        self
    }

    pub fn with_use_index(mut self, use_index: bool) -> Self {
        self.use_index = use_index;
        self
    }

    pub fn execute(&self, collection: &PartitionedCollection) -> Result<KnnQueryResult> {
        if self.k <= 0 {
            return Err(QueryError::InvalidK(self.k).into());
        }
        ensure_crs_compatible(self.crs.as_ref(), collection.crs())?;
        let k = usize::try_from(self.k).unwrap_or(usize::MAX);

        let locals: Vec<Vec<KnnMatch>> = collection
            .partitions()
            .par_iter()
            .map(|partition| self.local_nearest(partition, k))
            .collect();
        let candidates = locals.iter().map(Vec::len).sum();

        let (matches, duplicates_removed) = merge_nearest(&locals, k);
        Ok(KnnQueryResult {
            metrics: QueryMetrics {
                candidates,
                results: matches.len(),
                duplicates_removed,
            },
            matches,
            skipped: collection.skipped(),
        })
    }

    /// Local top `k` of one partition, ascending by distance and then by
    /// position of the entry in the partition
    fn local_nearest(&self, partition: &Partition, k: usize) -> Vec<KnnMatch> {
        let nearest: Vec<(&Arc<SpatialGeometry>, f64)> = match partition.index() {
            Some(index) if self.use_index => index
                .nearest(&self.point, k)
                .into_iter()
                .map(|(entry, distance)| (entry.geometry(), distance))
                .collect(),
            _ => {
                let mut scored: Vec<(&Arc<SpatialGeometry>, f64)> = partition
                    .entries()
                    .iter()
                    .map(|entry| {
                        let geometry = entry.geometry();
                        (geometry, geometry.distance_to_point(&self.point))
                    })
                    .collect();
                // Stable sort keeps entry order among equal distances
                scored.sort_by(|a, b| a.1.total_cmp(&b.1));
                scored.truncate(k);
                scored
            }
        };

        log::trace!(
            "KNN on partition {}: {} local candidates",
            partition.id(),
            nearest.len()
        );

        nearest
            .into_iter()
            .enumerate()
            .map(|(rank, (geometry, distance))| KnnMatch {
                geometry: Arc::clone(geometry),
                distance,
                partition_id: partition.id(),
                rank,
            })
            .collect()
    }
}

/// Head of one partition's sorted candidate list during the merge
#[derive(Debug, Clone, Copy)]
struct MergeHead {
    distance: f64,
    partition_id: u32,
    list: usize,
    rank: usize,
}

impl MergeHead {
    fn new(list: usize, candidate: &KnnMatch) -> Self {
        Self {
            distance: candidate.distance,
            partition_id: candidate.partition_id,
            list,
            rank: candidate.rank,
        }
    }
}

impl PartialEq for MergeHead {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MergeHead {}

impl PartialOrd for MergeHead {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MergeHead {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.partition_id.cmp(&other.partition_id))
            .then_with(|| self.rank.cmp(&other.rank))
    }
}

/// Merge sorted per-partition candidate lists into the global top `k`
///
/// The heap holds one head per list. Candidates already taken from another
/// partition are dropped and counted.
fn merge_nearest(locals: &[Vec<KnnMatch>], k: usize) -> (Vec<KnnMatch>, usize) {
    let mut heap: BinaryHeap<Reverse<MergeHead>> = locals
        .iter()
        .enumerate()
        .filter_map(|(list, candidates)| {
            candidates
                .first()
                .map(|first| Reverse(MergeHead::new(list, first)))
        })
        .collect();

    let mut seen = HashSet::new();
    let mut results = Vec::with_capacity(k.min(locals.iter().map(Vec::len).sum()));
    let mut duplicates = 0;
    while results.len() < k {
        let Some(Reverse(head)) = heap.pop() else {
            break;
        };
        let list = &locals[head.list];
        let candidate = &list[head.rank];
        if seen.insert(candidate.geometry.id()) {
            results.push(candidate.clone());
        } else {
            duplicates += 1;
        }
        if let Some(next) = list.get(head.rank + 1) {
            heap.push(Reverse(MergeHead::new(head.list, next)));
        }
    }
    (results, duplicates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::SpatialCollection;
    use geo_types::{point, Coord, Rect};
    use rstest::rstest;
    use sedona_common::option::{GridType, IndexType, SpatialPartitioningOptions};
    use sedona_common::SedonaError;
    use sedona_testing::datagen::{lattice_points, GeometryKind, RandomGeometryBuilder};

    fn candidate(id: u64, distance: f64, partition_id: u32, rank: usize) -> KnnMatch {
        KnnMatch {
            geometry: Arc::new(SpatialGeometry::new(id, point!(x: 0.0, y: 0.0))),
            distance,
            partition_id,
            rank,
        }
    }

    fn ids(matches: &[KnnMatch]) -> Vec<u64> {
        matches.iter().map(|m| m.geometry().id().0).collect()
    }

    #[test]
    fn test_merge_nearest() {
        let locals = vec![
            vec![candidate(1, 1.0, 0, 0), candidate(2, 3.0, 0, 1)],
            vec![candidate(2, 3.0, 1, 0), candidate(3, 3.0, 1, 1), candidate(4, 5.0, 1, 2)],
            vec![],
            vec![candidate(5, 0.5, 3, 0)],
        ];
        let (merged, duplicates) = merge_nearest(&locals, 4);
        assert_eq!(ids(&merged), vec![5, 1, 2, 3]);
        assert_eq!(merged[2].partition_id(), 0);
        assert_eq!(duplicates, 1);

        let (merged, _) = merge_nearest(&locals, 100);
        assert_eq!(ids(&merged), vec![5, 1, 2, 3, 4]);
    }

    #[rstest]
    fn test_knn_matches_brute_force(
        #[values(GridType::EqualGrid, GridType::KdbTree, GridType::RTree)] grid_type: GridType,
        #[values(None, Some(IndexType::RTree), Some(IndexType::QuadTree))]
        index_type: Option<IndexType>,
        #[values(1, 10, 75)] k: i64,
    ) {
        let splits = RandomGeometryBuilder::new()
            .seed(31)
            .num_splits(3)
            .rows_per_split(200)
            .geometry_kind(GeometryKind::Polygon)
            .bounds(Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 100.0, y: 100.0 }))
            .size_range((0.5, 10.0))
            .build();
        let mut partitioned = SpatialCollection::new(splits.clone())
            .partition(grid_type, 12, &SpatialPartitioningOptions::default())
            .unwrap();
        if let Some(index_type) = index_type {
            partitioned = partitioned.build_index(index_type, 8).unwrap();
        }

        let query_point = point!(x: 37.0, y: 61.0);
        let result = KnnQuery::new(query_point, k).execute(&partitioned).unwrap();

        let mut expected: Vec<f64> = splits
            .iter()
            .flatten()
            .map(|g| g.distance_to_point(&query_point))
            .collect();
        expected.sort_by(f64::total_cmp);
        expected.truncate(k as usize);

        let distances: Vec<f64> = result.matches.iter().map(KnnMatch::distance).collect();
        assert_eq!(distances, expected);
        let unique: HashSet<u64> = ids(&result.matches).into_iter().collect();
        assert_eq!(unique.len(), result.matches.len());
    }

    #[test]
    fn test_knn_size_and_order() {
        let partitioned = SpatialCollection::new(vec![lattice_points(4)])
            .partition(GridType::QuadTree, 4, &SpatialPartitioningOptions::default())
            .unwrap();
        let result = KnnQuery::new(point!(x: 1.5, y: 1.5), 100)
            .execute(&partitioned)
            .unwrap();
        assert_eq!(result.matches.len(), 16);
        assert!(result
            .matches
            .windows(2)
            .all(|w| w[0].distance() <= w[1].distance()));
        assert_eq!(result.metrics.results, 16);
    }

    #[test]
    fn test_ties_are_deterministic() {
        let partitioned = SpatialCollection::new(vec![lattice_points(10)])
            .partition(GridType::EqualGrid, 4, &SpatialPartitioningOptions::default())
            .unwrap();
        let query = KnnQuery::new(point!(x: 4.5, y: 4.5), 4);
        let first = ids(&query.execute(&partitioned).unwrap().matches);
        // The four points around the query point are equidistant
        let mut sorted = first.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![44, 45, 54, 55]);
        for _ in 0..5 {
            assert_eq!(ids(&query.execute(&partitioned).unwrap().matches), first);
        }
    }

    #[rstest]
    #[case(0)]
    #[case(-3)]
    fn test_invalid_k(#[case] k: i64) {
        let partitioned = SpatialCollection::new(vec![lattice_points(3)])
            .partition(GridType::EqualGrid, 1, &SpatialPartitioningOptions::default())
            .unwrap();
        let err = KnnQuery::new(point!(x: 0.0, y: 0.0), k)
            .execute(&partitioned)
            .unwrap_err();
        assert!(matches!(err, SedonaError::Query(QueryError::InvalidK(v)) if v == k));
    }

    #[test]
    fn test_empty_collection() {
        let partitioned = SpatialCollection::default()
            .partition(GridType::KdbTree, 4, &SpatialPartitioningOptions::default())
            .unwrap();
        let result = KnnQuery::new(point!(x: 0.0, y: 0.0), 3)
            .execute(&partitioned)
            .unwrap();
        assert!(result.matches.is_empty());
    }

    #[test]
    fn test_mismatched_crs() {
        let partitioned = SpatialCollection::new(vec![lattice_points(3)])
            .with_crs(Some(Crs::epsg(3857)))
            .partition(GridType::EqualGrid, 1, &SpatialPartitioningOptions::default())
            .unwrap();
        let err = KnnQuery::new(point!(x: 0.0, y: 0.0), 1)
            .with_crs(Some(Crs::lnglat()))
            .execute(&partitioned)
            .unwrap_err();
        assert!(matches!(
            err,
            SedonaError::Query(QueryError::MismatchedReferenceFrame { .. })
        ));
    }
}
