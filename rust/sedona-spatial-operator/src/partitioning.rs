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

use std::fmt::Debug;

use sedona_common::option::GridType;
use sedona_common::{PartitionerError, Result};
use sedona_geometry::envelope::Envelope;
use serde::{Deserialize, Serialize};

use crate::partitioning::flat::FlatPartitioner;
use crate::partitioning::rtree::RTreePartitioner;

pub mod flat;
pub mod grid;
pub mod hilbert;
pub mod kdb;
pub mod quadtree;
pub mod rtree;
pub mod str_tree;

/// Below this number of boundaries a linear scan beats the packed R-tree,
/// whose leaf nodes hold 16 entries.
const FLAT_LOOKUP_THRESHOLD: usize = 16;

/// Spatial partitioning is different from traditional data partitioning such as hash partitioning.
/// There is no perfect spatial partitioner that can partition spatial objects with extents
/// (linestrings, polygons, etc.) into disjoint partitions without overlaps. A spatial partitioner
/// therefore defines a set of spatial partitions (e.g., grid cells) and assigns each spatial object
/// to every partition its envelope intersects. Objects spanning partition boundaries are
/// duplicated at assignment time and the duplicates are removed when query results are merged.
pub trait SpatialPartitioner: Send + Sync + Debug {
    /// Get the total number of spatial partitions
    fn num_partitions(&self) -> usize;

    /// Ids of all partition boundaries intersecting `envelope`, in ascending order
    fn intersecting(&self, envelope: &Envelope) -> Vec<u32>;
}

/// Serializable description of a partitioning: the strategy tag and the
/// ordered list of boundary envelopes. Partition ids are positions in this list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitioningMetadata {
    pub grid_type: GridType,
    pub boundaries: Vec<Envelope>,
}

impl PartitioningMetadata {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| PartitionerError::InvalidParameter {
                name: "metadata",
                value: e.to_string(),
            })
            .map_err(Into::into)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| PartitionerError::InvalidParameter {
                name: "metadata",
                value: e.to_string(),
            })
            .map_err(Into::into)
    }
}

/// A computed set of partition boundaries and the lookup structure used to
/// assign envelopes to them.
///
/// Partitionings are immutable. Re-partitioning produces a new value.
#[derive(Debug)]
pub struct SpatialPartitioning {
    grid_type: GridType,
    boundaries: Vec<Envelope>,
    /// Union of all boundaries
    extent: Envelope,
    lookup: Box<dyn SpatialPartitioner>,
}

impl SpatialPartitioning {
    /// Derive partition boundaries from sampled envelopes
    ///
    /// * `samples` - sampled envelopes; an empty sample produces a single
    ///   partition covering the whole plane
    /// * `grid_type` - the partitioning strategy
    /// * `num_partitions` - target number of partitions. Tree and curve
    ///   strategies may produce fewer when the sample is small or crowded.
    /// * `max_levels` - depth bound of the tree strategies
    pub fn build(
        samples: &[Envelope],
        grid_type: GridType,
        num_partitions: usize,
        max_levels: usize,
    ) -> Result<Self> {
        if num_partitions == 0 {
            return Err(PartitionerError::InvalidParameter {
                name: "num_partitions",
                value: num_partitions.to_string(),
            }
            .into());
        }

        let Some(extent) = Envelope::merge_all(samples) else {
            log::warn!("Empty sample, falling back to a single partition covering everything");
            return Self::try_from_boundaries(grid_type, vec![whole_plane()?]);
        };

        let target = match grid_type {
            GridType::EqualGrid => num_partitions,
            _ => num_partitions.min(samples.len()),
        };

        let boundaries = match grid_type {
            GridType::EqualGrid => grid::build(&extent, target),
            GridType::QuadTree => quadtree::build(samples, &extent, target, max_levels),
            GridType::KdbTree => kdb::build(samples, &extent, target, max_levels),
            GridType::RTree => str_tree::build(samples, &extent, target),
            GridType::Hilbert => hilbert::build(samples, &extent, target),
        };

        let boundaries = match boundaries {
            Ok(boundaries) => boundaries,
            Err(sedona_common::SedonaError::Partitioner(PartitionerError::DegenerateBounds {
                num_partitions,
            })) => {
                log::warn!(
                    "All sampled envelopes collapse to a single point, using 1 partition instead of {num_partitions}"
                );
                vec![extent]
            }
            Err(e) => return Err(e),
        };

        log::debug!(
            "Built {} {} partitions from {} samples (target {})",
            boundaries.len(),
            grid_type,
            samples.len(),
            num_partitions
        );
        Self::try_from_boundaries(grid_type, boundaries)
    }

    /// Create a partitioning from explicit boundaries
    ///
    /// Unlike [`Self::build`], the boundaries are used as given and may leave
    /// gaps. Envelopes falling into a gap are assigned to the nearest boundary.
    pub fn try_from_boundaries(grid_type: GridType, boundaries: Vec<Envelope>) -> Result<Self> {
        let Some(extent) = Envelope::merge_all(&boundaries) else {
            return Err(PartitionerError::EmptyInput.into());
        };

        let lookup: Box<dyn SpatialPartitioner> = if boundaries.len() < FLAT_LOOKUP_THRESHOLD {
            Box::new(FlatPartitioner::new(boundaries.clone()))
        } else {
            Box::new(RTreePartitioner::try_new(boundaries.clone())?)
        };

        Ok(Self {
            grid_type,
            boundaries,
            extent,
            lookup,
        })
    }

    pub fn from_metadata(metadata: PartitioningMetadata) -> Result<Self> {
        Self::try_from_boundaries(metadata.grid_type, metadata.boundaries)
    }

    pub fn metadata(&self) -> PartitioningMetadata {
        PartitioningMetadata {
            grid_type: self.grid_type,
            boundaries: self.boundaries.clone(),
        }
    }

    pub fn grid_type(&self) -> GridType {
        self.grid_type
    }

    pub fn num_partitions(&self) -> usize {
        self.boundaries.len()
    }

    pub fn boundaries(&self) -> &[Envelope] {
        &self.boundaries
    }

    pub fn boundary(&self, partition_id: u32) -> Option<&Envelope> {
        self.boundaries.get(partition_id as usize)
    }

    /// Union of all partition boundaries
    pub fn extent(&self) -> &Envelope {
        &self.extent
    }

    /// True if both partitionings have identical boundaries and strategy,
    /// so that equal partition ids denote the same region
    pub fn same_as(&self, other: &SpatialPartitioning) -> bool {
        self.grid_type == other.grid_type && self.boundaries == other.boundaries
    }

    /// Partition ids an envelope is assigned to, in ascending order
    ///
    /// The envelope is first clamped into the partitioning extent, so objects
    /// outside the sampled region land in the outermost partitions. When no
    /// boundary intersects (only possible with explicit boundaries that leave
    /// gaps) the nearest boundary by envelope distance is used, the lowest id
    /// winning ties. The result is never empty.
    pub fn assign(&self, envelope: &Envelope) -> Vec<u32> {
        let clamped = envelope.clamp_to(&self.extent);
        let ids = self.lookup.intersecting(&clamped);
        if !ids.is_empty() {
            return ids;
        }

        log::warn!("Envelope {envelope:?} falls outside every partition, using the nearest one");
        vec![nearest_boundary(envelope, &self.boundaries)]
    }
}

/// Assign an envelope to partition boundaries without building a lookup
/// structure
///
/// Returns every boundary intersecting `envelope`, or the nearest boundary if
/// none does. Fails with [`PartitionerError::EmptyInput`] when `boundaries`
/// is empty.
pub fn assign(envelope: &Envelope, boundaries: &[Envelope]) -> Result<Vec<u32>> {
    if boundaries.is_empty() {
        return Err(PartitionerError::EmptyInput.into());
    }
    let ids: Vec<u32> = boundaries
        .iter()
        .enumerate()
        .filter(|(_, boundary)| boundary.intersects(envelope))
        .map(|(id, _)| id as u32)
        .collect();
    if ids.is_empty() {
        Ok(vec![nearest_boundary(envelope, boundaries)])
    } else {
        Ok(ids)
    }
}

fn nearest_boundary(envelope: &Envelope, boundaries: &[Envelope]) -> u32 {
    let mut best_id = 0;
    let mut best_distance = f64::INFINITY;
    for (id, boundary) in boundaries.iter().enumerate() {
        let distance = boundary.distance(envelope);
        if distance < best_distance {
            best_distance = distance;
            best_id = id as u32;
        }
    }
    best_id
}

fn whole_plane() -> Result<Envelope> {
    Ok(Envelope::try_new(-f64::MAX, -f64::MAX, f64::MAX, f64::MAX)?)
}

/// Split `[lo, hi]` into `n` consecutive closed intervals of equal width.
/// The last interval always ends exactly at `hi`.
pub(crate) fn equal_cuts(lo: f64, hi: f64, n: usize) -> Vec<(f64, f64)> {
    let step = (hi - lo) / n as f64;
    (0..n)
        .map(|i| {
            let start = lo + step * i as f64;
            let end = if i + 1 == n {
                hi
            } else {
                lo + step * (i + 1) as f64
            };
            (start, end)
        })
        .collect()
}
