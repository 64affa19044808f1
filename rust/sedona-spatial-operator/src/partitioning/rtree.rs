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

//! RTree-based partition lookup.
//!
//! Takes a pre-defined set of partition boundaries (rectangles) and uses a
//! packed RTree index to efficiently determine which partitions a given
//! envelope belongs to.

use std::fmt::Debug;

use geo_index::rtree::{sort::HilbertSort, RTree, RTreeBuilder, RTreeIndex};
use sedona_common::{PartitionerError, Result};
use sedona_geometry::envelope::Envelope;

use crate::partitioning::SpatialPartitioner;

/// RTree-based spatial partitioner that uses pre-defined partition boundaries.
pub struct RTreePartitioner {
    /// The RTree index storing partition boundaries
    rtree: RTree<f64>,
    /// Boundaries in partition id order, used for refinement
    boundaries: Vec<Envelope>,
}

impl RTreePartitioner {
    /// Create a new RTree partitioner from a collection of partition boundaries.
    ///
    /// The partition ID of each boundary is its index in `boundaries`.
    ///
    /// # Example
    /// ```rust
    /// use sedona_geometry::envelope::Envelope;
    /// use sedona_spatial_operator::partitioning::rtree::RTreePartitioner;
    /// use sedona_spatial_operator::partitioning::SpatialPartitioner;
    ///
    /// let boundaries = vec![
    ///     Envelope::try_new(0.0, 0.0, 50.0, 50.0).unwrap(),
    ///     Envelope::try_new(50.0, 0.0, 100.0, 50.0).unwrap(),
    /// ];
    /// let partitioner = RTreePartitioner::try_new(boundaries).unwrap();
    /// assert_eq!(partitioner.num_partitions(), 2);
    /// ```
    pub fn try_new(boundaries: Vec<Envelope>) -> Result<Self> {
        if boundaries.is_empty() {
            return Err(PartitionerError::EmptyInput.into());
        }

        let mut rtree_builder = RTreeBuilder::<f64>::new(boundaries.len() as u32);
        for boundary in &boundaries {
            rtree_builder.add(
                boundary.min_x(),
                boundary.min_y(),
                boundary.max_x(),
                boundary.max_y(),
            );
        }
        let rtree = rtree_builder.finish::<HilbertSort>();

        Ok(RTreePartitioner { rtree, boundaries })
    }
}

impl Debug for RTreePartitioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RTreePartitioner")
            .field("num_partitions", &self.boundaries.len())
            .finish()
    }
}

impl SpatialPartitioner for RTreePartitioner {
    fn num_partitions(&self) -> usize {
        self.boundaries.len()
    }

    fn intersecting(&self, envelope: &Envelope) -> Vec<u32> {
        let mut ids: Vec<u32> = self
            .rtree
            .search(
                envelope.min_x(),
                envelope.min_y(),
                envelope.max_x(),
                envelope.max_y(),
            )
            .into_iter()
            .filter(|id| self.boundaries[*id as usize].intersects(envelope))
            .collect();
        ids.sort_unstable();
        ids
    }
}
