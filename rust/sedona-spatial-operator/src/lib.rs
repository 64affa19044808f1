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

//! Spatial partitioning, local indexing and query execution over partitioned
//! geometry collections.
//!
//! The pipeline runs from [`sampler`] (envelope samples) to [`partitioning`]
//! (boundaries and assignment), [`collection`] (partitioned collections),
//! [`index`] (per-partition trees), [`operator`] (range, join and nearest
//! neighbor queries) and [`dedup`] (removal of cross-partition duplicates).

pub mod collection;
pub mod dedup;
pub mod index;
pub mod operator;
pub mod partitioning;
pub mod sampler;
pub mod spatial_predicate;

pub use collection::{PartitionedCollection, SpatialCollection};
pub use dedup::DuplicateResolver;
pub use index::SpatialIndex;
pub use operator::{JoinQuery, KnnQuery, QueryMetrics, RangeQuery};
pub use partitioning::{PartitioningMetadata, SpatialPartitioning};
pub use spatial_predicate::SpatialPredicate;

// Re-export option types from sedona-common for convenience
pub use sedona_common::option::*;
