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

//! Flat (linear scan) partition lookup.
//!
//! Stores partition boundaries in a flat array and performs a linear scan to
//! find the boundaries intersecting an envelope. [`FlatPartitioner`] is more
//! efficient than [`crate::partitioning::rtree::RTreePartitioner`] when the
//! number of partitions is less than 16, which is the size of R-tree's leaf
//! nodes.

use sedona_geometry::envelope::Envelope;

use crate::partitioning::SpatialPartitioner;

/// Spatial partitioner that linearly scans partition boundaries.
#[derive(Debug, Clone)]
pub struct FlatPartitioner {
    boundaries: Vec<Envelope>,
}

impl FlatPartitioner {
    pub fn new(boundaries: Vec<Envelope>) -> Self {
        Self { boundaries }
    }
}

impl SpatialPartitioner for FlatPartitioner {
    fn num_partitions(&self) -> usize {
        self.boundaries.len()
    }

    fn intersecting(&self, envelope: &Envelope) -> Vec<u32> {
        self.boundaries
            .iter()
            .enumerate()
            .filter(|(_, boundary)| boundary.intersects(envelope))
            .map(|(idx, _)| idx as u32)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Envelope {
        Envelope::try_new(min_x, min_y, max_x, max_y).unwrap()
    }

    fn sample_partitions() -> Vec<Envelope> {
        vec![
            env(0.0, 0.0, 50.0, 50.0),
            env(50.0, 0.0, 100.0, 50.0),
            env(0.0, 50.0, 50.0, 100.0),
            env(50.0, 50.0, 100.0, 100.0),
        ]
    }

    #[test]
    fn test_flat_partitioner_creation() {
        let partitioner = FlatPartitioner::new(sample_partitions());
        assert_eq!(partitioner.num_partitions(), 4);
    }

    #[test]
    fn test_flat_partitioner_single() {
        let partitioner = FlatPartitioner::new(sample_partitions());
        assert_eq!(partitioner.intersecting(&env(10.0, 10.0, 20.0, 20.0)), vec![0]);
        assert_eq!(partitioner.intersecting(&env(60.0, 60.0, 80.0, 80.0)), vec![3]);
    }

    #[test]
    fn test_flat_partitioner_multi() {
        let partitioner = FlatPartitioner::new(sample_partitions());
        assert_eq!(
            partitioner.intersecting(&env(45.0, 10.0, 55.0, 20.0)),
            vec![0, 1]
        );
        // The shared corner touches every partition
        assert_eq!(
            partitioner.intersecting(&env(50.0, 50.0, 50.0, 50.0)),
            vec![0, 1, 2, 3]
        );
    }

    #[test]
    fn test_flat_partitioner_none() {
        let partitioner = FlatPartitioner::new(sample_partitions());
        assert!(partitioner
            .intersecting(&env(200.0, 200.0, 250.0, 250.0))
            .is_empty());
    }
}
