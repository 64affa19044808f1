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
use std::collections::BinaryHeap;

use geo_types::Point;
use sedona_common::option::IndexType;
use sedona_common::{IndexError, Result};
use sedona_geometry::envelope::Envelope;
use sedona_geometry::geometry::SpatialGeometry;

use crate::spatial_predicate::SpatialPredicate;

mod quadtree;
mod rtree;

/// A node of a local index tree
///
/// Both tree flavours share this layout: R-tree nodes hold items only at the
/// leaves, quad-tree nodes may also hold items spanning their split lines.
#[derive(Debug, Clone)]
pub(crate) struct IndexNode {
    /// Bounds every item stored in this node or its descendants
    pub envelope: Envelope,
    /// Item ordinals stored directly in this node
    pub items: Vec<u32>,
    /// Arena positions of child nodes
    pub children: Vec<usize>,
}

/// In-memory spatial index over the geometries of one partition
///
/// The index is read-only after construction and can be shared between
/// concurrent queries. Items are identified by their insertion ordinal, which
/// is also the tie-breaker for nearest neighbor queries at equal distance.
#[derive(Debug)]
pub struct SpatialIndex<T> {
    index_type: IndexType,
    items: Vec<T>,
    envelopes: Vec<Envelope>,
    nodes: Vec<IndexNode>,
    root: Option<usize>,
    skipped: usize,
}

impl<T: AsRef<SpatialGeometry>> SpatialIndex<T> {
    /// Bulk-load an index
    ///
    /// Items without an envelope are skipped and counted. Fails with
    /// [`IndexError::BuildFailed`] when every item is malformed, and with
    /// [`IndexError::InvalidParameter`] when `node_capacity` is below 2.
    pub fn build(items: Vec<T>, index_type: IndexType, node_capacity: usize) -> Result<Self> {
        if node_capacity < 2 {
            return Err(IndexError::InvalidParameter {
                name: "node_capacity",
                value: node_capacity.to_string(),
            }
            .into());
        }

        let total = items.len();
        let mut valid = Vec::with_capacity(total);
        let mut envelopes = Vec::with_capacity(total);
        for item in items {
            if let Some(envelope) = item.as_ref().envelope() {
                envelopes.push(*envelope);
                valid.push(item);
            }
        }
        let skipped = total - valid.len();
        if valid.is_empty() && skipped > 0 {
            return Err(IndexError::BuildFailed {
                skipped,
                reason: "all input geometries are malformed".to_string(),
            }
            .into());
        }

        let (nodes, root) = match index_type {
            IndexType::RTree => rtree::bulk_load(&envelopes, node_capacity),
            IndexType::QuadTree => {
                quadtree::build(&envelopes, node_capacity, quadtree::DEFAULT_MAX_DEPTH)
            }
        };

        log::debug!(
            "Built {index_type} index over {} geometries with {} nodes ({skipped} skipped)",
            valid.len(),
            nodes.len()
        );

        Ok(Self {
            index_type,
            items: valid,
            envelopes,
            nodes,
            root,
            skipped,
        })
    }

    pub fn index_type(&self) -> IndexType {
        self.index_type
    }

    /// Number of indexed items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of malformed input items left out of the index
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Indexed items in insertion order
    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Lazily produce the items whose envelope intersects `window`
    pub fn query(&self, window: &Envelope) -> RangeIter<'_, T> {
        RangeIter {
            index: self,
            window: *window,
            stack: self.root.into_iter().collect(),
            pending: Default::default(),
        }
    }

    /// Lazily produce the items `g` for which `predicate(g, window)` holds
    ///
    /// Candidates are pruned by envelope first and only envelope survivors are
    /// evaluated with the exact predicate.
    pub fn query_with<'a>(
        &'a self,
        window: &'a SpatialGeometry,
        predicate: SpatialPredicate,
    ) -> impl Iterator<Item = &'a T> + 'a {
        window
            .envelope()
            .map(|envelope| self.query(envelope))
            .into_iter()
            .flatten()
            .filter(move |item| predicate.evaluate(item.as_ref(), window))
    }

    /// The `k` items nearest to `point`, ascending by distance
    ///
    /// Distances are exact Euclidean distances between the point and the item
    /// geometry. Items at equal distance are ordered by insertion order.
    pub fn nearest(&self, point: &Point<f64>, k: usize) -> Vec<(&T, f64)> {
        let mut results = Vec::with_capacity(k.min(self.items.len()));
        let Some(root) = self.root else {
            return results;
        };
        if k == 0 {
            return results;
        }

        let coord = point.0;
        let mut heap = BinaryHeap::new();
        heap.push(Reverse(HeapEntry {
            distance: self.nodes[root].envelope.distance_to_coord(&coord),
            kind: EntryKind::Node,
            position: root,
        }));

        while let Some(Reverse(entry)) = heap.pop() {
            match entry.kind {
                EntryKind::Node => {
                    let node = &self.nodes[entry.position];
                    for &ordinal in &node.items {
                        let ordinal = ordinal as usize;
                        heap.push(Reverse(HeapEntry {
                            distance: self.envelopes[ordinal].distance_to_coord(&coord),
                            kind: EntryKind::Candidate,
                            position: ordinal,
                        }));
                    }
                    for &child in &node.children {
                        heap.push(Reverse(HeapEntry {
                            distance: self.nodes[child].envelope.distance_to_coord(&coord),
                            kind: EntryKind::Node,
                            position: child,
                        }));
                    }
                }
                EntryKind::Candidate => {
                    let item = &self.items[entry.position];
                    heap.push(Reverse(HeapEntry {
                        distance: item.as_ref().distance_to_point(point),
                        kind: EntryKind::Item,
                        position: entry.position,
                    }));
                }
                EntryKind::Item => {
                    results.push((&self.items[entry.position], entry.distance));
                    if results.len() == k {
                        break;
                    }
                }
            }
        }
        results
    }
}

/// Iterator over the items of a [`SpatialIndex`] intersecting a query window
///
/// Nodes are expanded on demand, so abandoning the iterator early skips the
/// rest of the traversal.
pub struct RangeIter<'a, T> {
    index: &'a SpatialIndex<T>,
    window: Envelope,
    stack: Vec<usize>,
    pending: std::slice::Iter<'a, u32>,
}

impl<'a, T> Iterator for RangeIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            for &ordinal in self.pending.by_ref() {
                let ordinal = ordinal as usize;
                if self.index.envelopes[ordinal].intersects(&self.window) {
                    return Some(&self.index.items[ordinal]);
                }
            }

            let node = &self.index.nodes[self.stack.pop()?];
            if !node.envelope.intersects(&self.window) {
                continue;
            }
            self.pending = node.items.iter();
            self.stack.extend(node.children.iter().rev());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum EntryKind {
    /// A tree node; its distance is a lower bound for everything below it
    Node,
    /// An item keyed by its envelope distance, a lower bound of the exact one
    Candidate,
    /// An item keyed by its exact distance
    Item,
}

/// Priority queue entry of the best-first nearest neighbor search. At equal
/// distance nodes and candidates are expanded before items are emitted, and
/// items are emitted in insertion order.
#[derive(Debug, Clone, Copy)]
struct HeapEntry {
    distance: f64,
    kind: EntryKind,
    position: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.kind.cmp(&other.kind))
            .then_with(|| self.position.cmp(&other.position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{point, Coord, Rect};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rstest::rstest;
    use sedona_common::SedonaError;
    use sedona_testing::datagen::{lattice_points, GeometryKind, RandomGeometryBuilder};
    use std::sync::Arc;

    fn env(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Envelope {
        Envelope::try_new(min_x, min_y, max_x, max_y).unwrap()
    }

    fn random_polygons(seed: u64, n: usize) -> Vec<Arc<SpatialGeometry>> {
        RandomGeometryBuilder::new()
            .seed(seed)
            .rows_per_split(n)
            .geometry_kind(GeometryKind::Polygon)
            .bounds(Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 1000.0, y: 1000.0 }))
            .size_range((1.0, 20.0))
            .build()
            .remove(0)
    }

    fn ids<'a>(items: impl Iterator<Item = &'a Arc<SpatialGeometry>>) -> Vec<u64> {
        let mut ids: Vec<u64> = items.map(|g| g.id().0).collect();
        ids.sort_unstable();
        ids
    }

    #[rstest]
    fn test_range_query_matches_scan(
        #[values(IndexType::RTree, IndexType::QuadTree)] index_type: IndexType,
        #[values(2, 4, 16)] node_capacity: usize,
    ) {
        let items = random_polygons(1, 2000);
        let index = SpatialIndex::build(items.clone(), index_type, node_capacity).unwrap();
        assert_eq!(index.len(), 2000);
        assert_eq!(index.skipped(), 0);

        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..50 {
            let (x, y) = (rng.gen_range(0.0..1000.0), rng.gen_range(0.0..1000.0));
            let window = env(x, y, x + rng.gen_range(0.0..100.0), y + rng.gen_range(0.0..100.0));
            let expected = ids(items
                .iter()
                .filter(|g| g.envelope().unwrap().intersects(&window)));
            assert_eq!(ids(index.query(&window)), expected);
        }
    }

    #[rstest]
    fn test_query_with_predicate(
        #[values(IndexType::RTree, IndexType::QuadTree)] index_type: IndexType,
        #[values(
            SpatialPredicate::Intersects,
            SpatialPredicate::Within,
            SpatialPredicate::CoveredBy,
            SpatialPredicate::Contains
        )]
        predicate: SpatialPredicate,
    ) {
        let items = random_polygons(3, 1000);
        let index = SpatialIndex::build(items.clone(), index_type, 8).unwrap();
        let window = SpatialGeometry::new(
            u64::MAX,
            Rect::new(Coord { x: 200.0, y: 200.0 }, Coord { x: 600.0, y: 500.0 }).to_polygon(),
        );

        let expected = ids(items.iter().filter(|g| predicate.evaluate(g, &window)));
        assert_eq!(ids(index.query_with(&window, predicate)), expected);
    }

    #[test]
    fn test_range_iter_is_lazy() {
        let index = SpatialIndex::build(lattice_points(100), IndexType::RTree, 16).unwrap();
        let window = env(0.0, 0.0, 99.0, 99.0);
        assert_eq!(index.query(&window).take(5).count(), 5);
        assert_eq!(index.query(&window).count(), 10000);
    }

    #[rstest]
    fn test_nearest_matches_brute_force(
        #[values(IndexType::RTree, IndexType::QuadTree)] index_type: IndexType,
        #[values(1, 7, 50)] k: usize,
    ) {
        let items = random_polygons(4, 1500);
        let index = SpatialIndex::build(items.clone(), index_type, 10).unwrap();

        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..20 {
            let query = point!(x: rng.gen_range(-100.0..1100.0), y: rng.gen_range(-100.0..1100.0));
            let mut expected: Vec<(usize, f64)> = items
                .iter()
                .enumerate()
                .map(|(ordinal, g)| (ordinal, g.distance_to_point(&query)))
                .collect();
            expected.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
            expected.truncate(k);

            let result = index.nearest(&query, k);
            assert_eq!(result.len(), k);
            let result_ids: Vec<u64> = result.iter().map(|(g, _)| g.id().0).collect();
            let expected_ids: Vec<u64> = expected.iter().map(|(o, _)| items[*o].id().0).collect();
            assert_eq!(result_ids, expected_ids);
            for window in result.windows(2) {
                assert!(window[0].1 <= window[1].1);
            }
        }
    }

    #[rstest]
    fn test_nearest_ties_follow_insertion_order(
        #[values(IndexType::RTree, IndexType::QuadTree)] index_type: IndexType,
    ) {
        // Points on a circle of radius 5 around the query point, plus duplicates
        let coords = [(5.0, 0.0), (0.0, 5.0), (-5.0, 0.0), (0.0, -5.0), (3.0, 4.0), (5.0, 0.0)];
        let items: Vec<SpatialGeometry> = coords
            .iter()
            .enumerate()
            .map(|(i, (x, y))| SpatialGeometry::new(i as u64, point!(x: *x, y: *y)))
            .collect();
        let index = SpatialIndex::build(items, index_type, 2).unwrap();

        let result = index.nearest(&point!(x: 0.0, y: 0.0), 4);
        let ids: Vec<u64> = result.iter().map(|(g, _)| g.id().0).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert!(result.iter().all(|(_, d)| *d == 5.0));
    }

    #[test]
    fn test_nearest_more_than_len() {
        let index = SpatialIndex::build(lattice_points(3), IndexType::QuadTree, 4).unwrap();
        let result = index.nearest(&point!(x: 0.0, y: 0.0), 100);
        assert_eq!(result.len(), 9);
        assert_eq!(result[0].0.id().0, 0);
        assert_eq!(result[0].1, 0.0);
        assert!(index.nearest(&point!(x: 0.0, y: 0.0), 0).is_empty());
    }

    #[test]
    fn test_empty_index() {
        let index: SpatialIndex<SpatialGeometry> =
            SpatialIndex::build(vec![], IndexType::RTree, 16).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.query(&env(0.0, 0.0, 1.0, 1.0)).count(), 0);
        assert!(index.nearest(&point!(x: 0.0, y: 0.0), 3).is_empty());
    }

    #[test]
    fn test_malformed_items() {
        let empty = || SpatialGeometry::new(0, geo_types::MultiPoint::<f64>(vec![]));
        let items = vec![empty(), SpatialGeometry::new(1, point!(x: 1.0, y: 1.0)), empty()];
        let index = SpatialIndex::build(items, IndexType::QuadTree, 4).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.skipped(), 2);

        let err = SpatialIndex::build(vec![empty(), empty()], IndexType::RTree, 4).unwrap_err();
        assert!(matches!(
            err,
            SedonaError::Index(IndexError::BuildFailed { skipped: 2, .. })
        ));
        assert_eq!(err.stage(), "indexing");
    }

    #[test]
    fn test_invalid_node_capacity() {
        let err = SpatialIndex::build(lattice_points(2), IndexType::RTree, 1).unwrap_err();
        assert!(matches!(
            err,
            SedonaError::Index(IndexError::InvalidParameter { name: "node_capacity", .. })
        ));
    }
}
