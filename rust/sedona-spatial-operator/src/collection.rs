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

//! In-process stand-in for a distributed geometry collection.
//!
//! A [`SpatialCollection`] is an ordered list of input splits. Partitioning it
//! samples every split, derives partition boundaries, tags each geometry with
//! the ids of the partitions it overlaps and groups the tagged entries by
//! partition id. Per-split and per-partition work runs on the rayon pool.

use std::sync::Arc;

use geo_types::Geometry;
use rayon::prelude::*;
use sedona_common::option::{GridType, IndexType, SpatialPartitioningOptions};
use sedona_common::{IndexError, Result};
use sedona_geometry::crs::{ensure_crs_compatible, Crs};
use sedona_geometry::envelope::Envelope;
use sedona_geometry::geometry::SpatialGeometry;

use crate::index::SpatialIndex;
use crate::partitioning::SpatialPartitioning;
use crate::sampler::{default_sample_size, sample_splits, EnvelopeSamples, SamplerConfig};

/// A geometry placed into a partition, together with the ids of every
/// partition it was assigned to
///
/// The geometry is shared between all partitions it was copied into. The
/// sorted tag list is what the duplicate resolver uses to pick the single
/// partition that reports a match.
#[derive(Debug, Clone)]
pub struct PartitionEntry {
    geometry: Arc<SpatialGeometry>,
    partitions: Arc<[u32]>,
}

impl PartitionEntry {
    pub fn geometry(&self) -> &Arc<SpatialGeometry> {
        &self.geometry
    }

    /// Ids of all partitions holding this geometry, ascending
    pub fn partitions(&self) -> &[u32] {
        &self.partitions
    }
}

impl AsRef<SpatialGeometry> for PartitionEntry {
    fn as_ref(&self) -> &SpatialGeometry {
        &self.geometry
    }
}

/// One spatial partition: its boundary, the entries assigned to it and,
/// once built, a local index over those entries
#[derive(Debug)]
pub struct Partition {
    id: u32,
    boundary: Envelope,
    entries: Vec<PartitionEntry>,
    index: Option<Arc<SpatialIndex<PartitionEntry>>>,
}

impl Partition {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn boundary(&self) -> &Envelope {
        &self.boundary
    }

    pub fn entries(&self) -> &[PartitionEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn index(&self) -> Option<&Arc<SpatialIndex<PartitionEntry>>> {
        self.index.as_ref()
    }
}

/// An unpartitioned collection of geometries split into input chunks
#[derive(Debug, Clone, Default)]
pub struct SpatialCollection {
    splits: Vec<Vec<Arc<SpatialGeometry>>>,
    crs: Option<Crs>,
}

impl SpatialCollection {
    /// Wrap input splits; the collection takes the reference system of the
    /// first geometry that declares one
    pub fn new(splits: Vec<Vec<Arc<SpatialGeometry>>>) -> Self {
        let crs = first_crs(&splits);
        Self { splits, crs }
    }

    /// Build a collection from bare shapes
    ///
    /// Identities are assigned from the position of each shape in `shapes`.
    /// Shapes are dealt into `num_splits` contiguous splits.
    pub fn from_shapes(shapes: impl IntoIterator<Item = Geometry<f64>>, num_splits: usize) -> Self {
        let geometries: Vec<Arc<SpatialGeometry>> = shapes
            .into_iter()
            .enumerate()
            .map(|(ordinal, shape)| Arc::new(SpatialGeometry::new(ordinal as u64, shape)))
            .collect();
        let split_len = geometries.len().div_ceil(num_splits.max(1)).max(1);
        let splits = geometries.chunks(split_len).map(<[_]>::to_vec).collect();
        Self::new(splits)
    }

    /// Declare the coordinate reference system shared by all geometries
    ///
    /// Geometries declaring a different system are rejected when the
    /// collection is partitioned.
    pub fn with_crs(mut self, crs: Option<Crs>) -> Self {
        self.crs = crs;
        self
    }

    pub fn crs(&self) -> Option<&Crs> {
        self.crs.as_ref()
    }

    pub fn splits(&self) -> &[Vec<Arc<SpatialGeometry>>] {
        &self.splits
    }

    /// Total number of geometries, malformed ones included
    pub fn len(&self) -> usize {
        self.splits.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.splits.iter().all(Vec::is_empty)
    }

    /// Sample envelopes for deriving `num_partitions` partitions
    pub fn sample(
        &self,
        num_partitions: usize,
        options: &SpatialPartitioningOptions,
    ) -> Result<EnvelopeSamples> {
        let config = SamplerConfig::from(options);
        let sample_size = default_sample_size(self.len(), num_partitions, config.max_samples);
        sample_splits(&self.splits, Some(sample_size), &config)
    }

    /// Sample envelopes in a single pass over every split without relying on
    /// the collection size
    ///
    /// Each split keeps between `min_sample_size` and `max_sample_size`
    /// envelopes, tracking `target_sampling_rate` in between.
    pub fn sample_streaming(
        &self,
        options: &SpatialPartitioningOptions,
    ) -> Result<EnvelopeSamples> {
        sample_splits(&self.splits, None, &SamplerConfig::from(options))
    }

    /// Partition the collection with a freshly computed partitioning
    pub fn partition(
        &self,
        grid_type: GridType,
        num_partitions: usize,
        options: &SpatialPartitioningOptions,
    ) -> Result<PartitionedCollection> {
        let samples = self.sample(num_partitions, options)?;
        let partitioning = SpatialPartitioning::build(
            samples.samples(),
            grid_type,
            num_partitions,
            options.max_tree_levels,
        )?;
        self.partition_with(Arc::new(partitioning))
    }

    /// Partition using the configured strategy and partition count
    pub fn partition_with_options(
        &self,
        options: &SpatialPartitioningOptions,
    ) -> Result<PartitionedCollection> {
        self.partition(options.grid_type, options.num_partitions, options)
    }

    /// Partition the collection with an existing partitioning
    pub fn partition_with(
        &self,
        partitioning: Arc<SpatialPartitioning>,
    ) -> Result<PartitionedCollection> {
        PartitionedCollection::partition_with(self, partitioning)
    }
}

fn first_crs(splits: &[Vec<Arc<SpatialGeometry>>]) -> Option<Crs> {
    splits.iter().flatten().find_map(|geometry| geometry.crs().cloned())
}

/// A collection grouped into spatial partitions
///
/// Partitioned collections are immutable. Building an index returns a new
/// collection sharing the entries, so readers of the previous value keep
/// seeing the partitions they started with.
#[derive(Debug, Clone)]
pub struct PartitionedCollection {
    partitioning: Arc<SpatialPartitioning>,
    partitions: Vec<Arc<Partition>>,
    skipped: usize,
    crs: Option<Crs>,
}

impl PartitionedCollection {
    /// Assign every geometry of `collection` to the partitions of
    /// `partitioning` and group the tagged entries by partition id
    ///
    /// Malformed geometries are dropped and counted in [`Self::skipped`].
    /// Entries of a partition keep the order of the input splits.
    ///
    /// The reference system of the result is the one declared on the
    /// collection, or else the first one declared by a geometry. Fails with
    /// [`QueryError::MismatchedReferenceFrame`](sedona_common::QueryError)
    /// if a geometry declares another system, and with
    /// [`IndexError::BuildFailed`] if every geometry is malformed.
    pub fn partition_with(
        collection: &SpatialCollection,
        partitioning: Arc<SpatialPartitioning>,
    ) -> Result<Self> {
        let crs = collection
            .crs
            .clone()
            .or_else(|| first_crs(&collection.splits));
        let tagged: Vec<Vec<PartitionEntry>> = collection
            .splits
            .par_iter()
            .map(|split| {
                split
                    .iter()
                    .filter_map(|geometry| {
                        if let Err(err) = ensure_crs_compatible(crs.as_ref(), geometry.crs()) {
                            return Some(Err(err));
                        }
                        let envelope = geometry.envelope()?;
                        Some(Ok(PartitionEntry {
                            geometry: Arc::clone(geometry),
                            partitions: partitioning.assign(envelope).into(),
                        }))
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        let mut buckets: Vec<Vec<PartitionEntry>> = vec![Vec::new(); partitioning.num_partitions()];
        let mut num_entries = 0;
        for entry in tagged.into_iter().flatten() {
            num_entries += 1;
            for partition_id in entry.partitions.iter() {
                buckets[*partition_id as usize].push(entry.clone());
            }
        }
        let skipped = collection.len() - num_entries;
        if num_entries == 0 && skipped > 0 {
            return Err(IndexError::BuildFailed {
                skipped,
                reason: "every geometry of the collection is malformed".to_string(),
            }
            .into());
        }

        let partitions: Vec<Arc<Partition>> = buckets
            .into_iter()
            .zip(partitioning.boundaries())
            .enumerate()
            .map(|(id, (entries, boundary))| {
                Arc::new(Partition {
                    id: id as u32,
                    boundary: *boundary,
                    entries,
                    index: None,
                })
            })
            .collect();

        log::debug!(
            "Assigned {num_entries} geometries to {} {} partitions ({} copies, {skipped} skipped)",
            partitions.len(),
            partitioning.grid_type(),
            partitions.iter().map(|p| p.len()).sum::<usize>(),
        );

        Ok(Self {
            partitioning,
            partitions,
            skipped,
            crs,
        })
    }

    /// Build a local index for every partition
    ///
    /// Returns a new collection; `self` is left untouched.
    pub fn build_index(&self, index_type: IndexType, node_capacity: usize) -> Result<Self> {
        let partitions = self
            .partitions
            .par_iter()
            .map(|partition| {
                let index = SpatialIndex::build(
                    partition.entries.clone(),
                    index_type,
                    node_capacity,
                )?;
                Ok(Arc::new(Partition {
                    id: partition.id,
                    boundary: partition.boundary,
                    entries: partition.entries.clone(),
                    index: Some(Arc::new(index)),
                }))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            partitioning: Arc::clone(&self.partitioning),
            partitions,
            skipped: self.skipped,
            crs: self.crs.clone(),
        })
    }

    /// Build indexes with the configured index type and node capacity
    pub fn build_index_with_options(&self, options: &SpatialPartitioningOptions) -> Result<Self> {
        self.build_index(options.index_type, options.index_node_capacity)
    }

    pub fn partitioning(&self) -> &Arc<SpatialPartitioning> {
        &self.partitioning
    }

    pub fn partitions(&self) -> &[Arc<Partition>] {
        &self.partitions
    }

    pub fn partition(&self, partition_id: u32) -> Option<&Arc<Partition>> {
        self.partitions.get(partition_id as usize)
    }

    pub fn num_partitions(&self) -> usize {
        self.partitions.len()
    }

    /// Number of malformed input geometries left out of every partition
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn crs(&self) -> Option<&Crs> {
        self.crs.as_ref()
    }

    /// True if every partition carries a local index
    pub fn is_indexed(&self) -> bool {
        self.partitions.iter().all(|p| p.index.is_some())
    }

    /// Every geometry once, in partition order
    ///
    /// A geometry is yielded by the lowest partition it was assigned to.
    pub fn geometries(&self) -> impl Iterator<Item = &Arc<SpatialGeometry>> + '_ {
        self.partitions.iter().flat_map(|partition| {
            partition
                .entries
                .iter()
                .filter(|entry| entry.partitions.first() == Some(&partition.id))
                .map(|entry| &entry.geometry)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{point, Coord, Rect};
    use rstest::rstest;
    use sedona_testing::datagen::{lattice_points, GeometryKind, RandomGeometryBuilder};

    fn options() -> SpatialPartitioningOptions {
        SpatialPartitioningOptions::default()
    }

    fn random_collection(seed: u64, malformed_rate: f64) -> SpatialCollection {
        SpatialCollection::new(
            RandomGeometryBuilder::new()
                .seed(seed)
                .num_splits(4)
                .rows_per_split(500)
                .geometry_kind(GeometryKind::Polygon)
                .bounds(Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 100.0, y: 100.0 }))
                .size_range((0.5, 8.0))
                .malformed_rate(malformed_rate)
                .build(),
        )
    }

    #[rstest]
    fn test_partition_assigns_every_geometry(
        #[values(
            GridType::EqualGrid,
            GridType::QuadTree,
            GridType::KdbTree,
            GridType::RTree,
            GridType::Hilbert
        )]
        grid_type: GridType,
    ) {
        let collection = random_collection(1, 0.0);
        let partitioned = collection.partition(grid_type, 16, &options()).unwrap();
        assert!(partitioned.num_partitions() <= 16);
        assert_eq!(partitioned.skipped(), 0);

        // Every geometry appears exactly once through its lowest partition
        let mut ids: Vec<u64> = partitioned.geometries().map(|g| g.id().0).collect();
        ids.sort_unstable();
        let mut expected: Vec<u64> = collection
            .splits()
            .iter()
            .flatten()
            .map(|g| g.id().0)
            .collect();
        expected.sort_unstable();
        assert_eq!(ids, expected);

        // Entries are placed in exactly the partitions they are tagged with
        for partition in partitioned.partitions() {
            for entry in partition.entries() {
                assert!(entry.partitions().contains(&partition.id()));
                assert!(entry.partitions().windows(2).all(|w| w[0] < w[1]));
            }
        }
    }

    #[test]
    fn test_malformed_geometries_are_skipped() {
        let collection = random_collection(2, 0.1);
        let partitioned = collection.partition(GridType::KdbTree, 8, &options()).unwrap();
        let malformed = collection
            .splits()
            .iter()
            .flatten()
            .filter(|g| !g.is_valid())
            .count();
        assert!(malformed > 0);
        assert_eq!(partitioned.skipped(), malformed);
        assert_eq!(partitioned.geometries().count(), collection.len() - malformed);
    }

    #[test]
    fn test_empty_collection() {
        let collection = SpatialCollection::default();
        assert!(collection.is_empty());
        let partitioned = collection.partition(GridType::QuadTree, 4, &options()).unwrap();
        assert_eq!(partitioned.num_partitions(), 1);
        assert_eq!(partitioned.geometries().count(), 0);
    }

    #[test]
    fn test_partition_with_shares_partition_ids() {
        let left = SpatialCollection::new(vec![lattice_points(20)]);
        let right = SpatialCollection::from_shapes(
            (0..50).map(|i| Geometry::Point(point!(x: i as f64 * 0.3, y: 19.0 - i as f64 * 0.3))),
            3,
        );
        assert_eq!(right.splits().len(), 3);

        let left = left.partition(GridType::EqualGrid, 9, &options()).unwrap();
        let right = right
            .partition_with(Arc::clone(left.partitioning()))
            .unwrap();
        assert!(Arc::ptr_eq(left.partitioning(), right.partitioning()));
        assert_eq!(left.num_partitions(), right.num_partitions());
    }

    #[test]
    fn test_build_index_is_copy_on_rebuild() {
        let collection = SpatialCollection::new(vec![lattice_points(30)]);
        let partitioned = collection.partition(GridType::RTree, 4, &options()).unwrap();
        assert!(!partitioned.is_indexed());

        let indexed = partitioned.build_index(IndexType::QuadTree, 8).unwrap();
        assert!(indexed.is_indexed());
        assert!(!partitioned.is_indexed());
        for (old, new) in partitioned.partitions().iter().zip(indexed.partitions()) {
            assert!(old.index().is_none());
            assert_eq!(new.index().unwrap().len(), old.len());
        }

        let err = partitioned.build_index(IndexType::RTree, 1).unwrap_err();
        assert_eq!(err.stage(), "indexing");
    }

    #[test]
    fn test_all_malformed_collection_fails() {
        let collection = random_collection(3, 1.0);
        let err = collection
            .partition(GridType::KdbTree, 8, &options())
            .unwrap_err();
        assert_eq!(err.stage(), "indexing");
        assert!(matches!(
            err,
            sedona_common::SedonaError::Index(IndexError::BuildFailed { skipped: 2000, .. })
        ));
    }

    #[test]
    fn test_collection_crs_comes_from_geometries() {
        let tagged = |id: u64, crs: Crs| {
            Arc::new(SpatialGeometry::new(id, point!(x: id as f64, y: 0.0)).with_crs(Some(crs)))
        };
        let bare = Arc::new(SpatialGeometry::new(9, point!(x: 1.0, y: 1.0)));

        let collection = SpatialCollection::new(vec![
            vec![Arc::clone(&bare)],
            vec![tagged(1, Crs::epsg(3857)), tagged(2, Crs::epsg(3857))],
        ]);
        assert_eq!(collection.crs(), Some(&Crs::epsg(3857)));
        let partitioned = collection.partition(GridType::EqualGrid, 4, &options()).unwrap();
        assert_eq!(partitioned.crs(), Some(&Crs::epsg(3857)));

        // Clearing the declared system still partitions in the geometries' frame
        let undeclared = collection.clone().with_crs(None);
        let partitioned = undeclared.partition(GridType::EqualGrid, 4, &options()).unwrap();
        assert_eq!(partitioned.crs(), Some(&Crs::epsg(3857)));

        let mixed = SpatialCollection::new(vec![
            vec![tagged(1, Crs::epsg(3857))],
            vec![bare, tagged(2, Crs::lnglat())],
        ]);
        let err = mixed.partition(GridType::EqualGrid, 4, &options()).unwrap_err();
        assert!(matches!(
            err,
            sedona_common::SedonaError::Query(
                sedona_common::QueryError::MismatchedReferenceFrame { .. }
            )
        ));

        let declared = SpatialCollection::new(vec![vec![tagged(1, Crs::lnglat())]])
            .with_crs(Some(Crs::epsg(32618)));
        assert!(declared.partition(GridType::EqualGrid, 1, &options()).is_err());
    }

    #[test]
    fn test_sample_streaming() {
        let collection = random_collection(4, 0.0);

        // Every split is below the minimum sample size and is kept whole
        let samples = collection.sample_streaming(&options()).unwrap();
        assert_eq!(samples.len(), 2000);
        assert_eq!(samples.population_count(), 2000);

        let mut bounded = options();
        bounded.min_sample_size = 100;
        bounded.max_sample_size = 200;
        bounded.target_sampling_rate = 0.5;
        let samples = collection.sample_streaming(&bounded).unwrap();
        assert_eq!(samples.len(), 200);
        assert_eq!(samples.population_count(), 2000);
    }
}
