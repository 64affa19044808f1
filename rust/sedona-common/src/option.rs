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
use std::fmt::Display;

use datafusion_common::config::{ConfigEntry, ConfigExtension, ConfigField, ExtensionOptions, Visit};
use datafusion_common::config_namespace;
use datafusion_common::{DataFusionError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Default number of spatial partitions to produce
pub const DEFAULT_NUM_PARTITIONS: usize = 16;

/// Default fanout of local index nodes
pub const DEFAULT_INDEX_NODE_CAPACITY: usize = 16;

/// Default partition size above which joins probe a local index instead of
/// running a nested loop.
pub const DEFAULT_INDEXED_JOIN_THRESHOLD: usize = 4;

/// Sample everything when the collection has fewer records than this
pub const DEFAULT_MIN_SAMPLE_SIZE: usize = 1000;

/// Upper bound on the number of sampled envelopes
pub const DEFAULT_MAX_SAMPLE_SIZE: usize = 100_000;

config_namespace! {
    /// Configuration options for Sedona.
    pub struct SedonaOptions {
        /// Options for spatial partitioning, local indexing and spatial queries
        pub spatial_partitioning: SpatialPartitioningOptions, default = SpatialPartitioningOptions::default()
    }
}

config_namespace! {
    /// Configuration options for spatial partitioning.
    ///
    /// These options control how a geometry collection is sampled, how partition
    /// boundaries are derived from the sample, which local index is built per
    /// partition and how joins choose between nested loops and index probes.
    pub struct SpatialPartitioningOptions {
        /// Partitioning strategy used to derive partition boundaries from the sample
        pub grid_type: GridType, default = GridType::KdbTree

        /// Target number of partitions
        pub num_partitions: usize, default = DEFAULT_NUM_PARTITIONS

        /// Local index built for each partition
        pub index_type: IndexType, default = IndexType::RTree

        /// Maximum number of entries per local index node
        pub index_node_capacity: usize, default = DEFAULT_INDEX_NODE_CAPACITY

        /// Maximum depth of tree based partitioners
        pub max_tree_levels: usize, default = 16

        /// Collections smaller than this are sampled completely
        pub min_sample_size: usize, default = DEFAULT_MIN_SAMPLE_SIZE

        /// Maximum number of sampled envelopes
        pub max_sample_size: usize, default = DEFAULT_MAX_SAMPLE_SIZE

        /// Sampling rate once the sample holds more than `min_sample_size` envelopes
        pub target_sampling_rate: f64, default = 0.01

        /// Seed of the sampler random number generator
        pub random_seed: usize, default = 42

        /// Join strategy selection
        pub join_strategy: JoinStrategy, default = JoinStrategy::Auto(DEFAULT_INDEXED_JOIN_THRESHOLD)
    }
}

impl ConfigExtension for SedonaOptions {
    const PREFIX: &'static str = "sedona";
}

impl ExtensionOptions for SedonaOptions {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn cloned(&self) -> Box<dyn ExtensionOptions> {
        Box::new(self.clone())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        <Self as ConfigField>::set(self, key, value)
    }

    fn entries(&self) -> Vec<ConfigEntry> {
        struct Visitor(Vec<ConfigEntry>);

        impl Visit for Visitor {
            fn some<V: Display>(&mut self, key: &str, value: V, description: &'static str) {
                self.0.push(ConfigEntry {
                    key: key.to_string(),
                    value: Some(value.to_string()),
                    description,
                })
            }

            fn none(&mut self, key: &str, description: &'static str) {
                self.0.push(ConfigEntry {
                    key: key.to_string(),
                    value: None,
                    description,
                })
            }
        }

        let mut v = Visitor(vec![]);
        self.visit(&mut v, Self::PREFIX, "");
        v.0
    }
}

/// Strategy used to derive partition boundaries from a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridType {
    /// Roughly square uniform grid over the sample extent
    EqualGrid,
    /// Recursive split into four equal quadrants
    QuadTree,
    /// Recursive median split alternating between axes
    KdbTree,
    /// Sort-Tile-Recursive slabs, the leaf layout of a bulk loaded R-tree
    RTree,
    /// Contiguous ranges of the Hilbert curve
    Hilbert,
}

impl GridType {
    pub const ALL: [GridType; 5] = [
        GridType::EqualGrid,
        GridType::QuadTree,
        GridType::KdbTree,
        GridType::RTree,
        GridType::Hilbert,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            GridType::EqualGrid => "equalgrid",
            GridType::QuadTree => "quadtree",
            GridType::KdbTree => "kdbtree",
            GridType::RTree => "rtree",
            GridType::Hilbert => "hilbert",
        }
    }
}

impl Display for GridType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl ConfigField for GridType {
    fn visit<V: Visit>(&self, v: &mut V, key: &str, description: &'static str) {
        v.some(key, self.name(), description);
    }

    fn set(&mut self, _key: &str, value: &str) -> Result<()> {
        let value = value.to_lowercase();
        let grid_type = match value.as_str() {
            "equalgrid" => GridType::EqualGrid,
            "quadtree" => GridType::QuadTree,
            "kdbtree" => GridType::KdbTree,
            "rtree" => GridType::RTree,
            "hilbert" => GridType::Hilbert,
            _ => {
                return Err(DataFusionError::Configuration(format!(
                    "Unknown grid type: {value}. Expected: equalgrid, quadtree, kdbtree, rtree, hilbert"
                )));
            }
        };
        *self = grid_type;
        Ok(())
    }
}

/// Local index built for each partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexType {
    RTree,
    QuadTree,
}

impl Display for IndexType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexType::RTree => f.write_str("rtree"),
            IndexType::QuadTree => f.write_str("quadtree"),
        }
    }
}

impl ConfigField for IndexType {
    fn visit<V: Visit>(&self, v: &mut V, key: &str, description: &'static str) {
        v.some(key, self, description);
    }

    fn set(&mut self, _key: &str, value: &str) -> Result<()> {
        let value = value.to_lowercase();
        let index_type = match value.as_str() {
            "rtree" => IndexType::RTree,
            "quadtree" => IndexType::QuadTree,
            _ => {
                return Err(DataFusionError::Configuration(format!(
                    "Unknown index type: {value}. Expected: rtree, quadtree"
                )));
            }
        };
        *self = index_type;
        Ok(())
    }
}

/// How a spatial join evaluates each pair of co-located partitions.
///
/// Building an index only pays off when a partition holds more than a handful
/// of geometries. In `Auto(n)` mode a partition pair is joined with a nested
/// loop when both sides hold at most `n` geometries, and by probing an index
/// built over the smaller side otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStrategy {
    /// Compare every pair of geometries
    NestedLoop,

    /// Always index the smaller side and probe it with the other side
    Indexed,

    /// Choose per partition based on the partition sizes
    Auto(usize),
}

impl JoinStrategy {
    /// Returns true if a partition pair with the given sizes should be joined
    /// using a local index.
    pub fn use_index(&self, left_len: usize, right_len: usize) -> bool {
        match self {
            JoinStrategy::NestedLoop => false,
            JoinStrategy::Indexed => true,
            JoinStrategy::Auto(threshold) => left_len.max(right_len) > *threshold,
        }
    }
}

impl ConfigField for JoinStrategy {
    fn visit<V: Visit>(&self, v: &mut V, key: &str, description: &'static str) {
        let value = match self {
            JoinStrategy::NestedLoop => "nested_loop".into(),
            JoinStrategy::Indexed => "indexed".into(),
            JoinStrategy::Auto(n) => format!("auto[{n}]"),
        };
        v.some(key, value, description);
    }

    fn set(&mut self, _key: &str, value: &str) -> Result<()> {
        let value = value.to_lowercase();
        let strategy = match value.as_str() {
            "nested_loop" => JoinStrategy::NestedLoop,
            "indexed" => JoinStrategy::Indexed,
            _ => {
                // Match "auto" or "auto[number]" pattern
                let auto_regex = Regex::new(r"^auto(?:\[(\d+)\])?$")
                    .map_err(|e| DataFusionError::External(Box::new(e)))?;

                let Some(captures) = auto_regex.captures(&value) else {
                    return Err(DataFusionError::Configuration(format!(
                        "Unknown join strategy: {value}. Expected formats: nested_loop, indexed, auto, auto[number]"
                    )));
                };

                let threshold = match captures.get(1) {
                    Some(number_match) => match number_match.as_str().parse::<usize>() {
                        Ok(n) => n,
                        Err(_) => {
                            return Err(DataFusionError::Configuration(format!(
                                "Invalid number in auto strategy: {}",
                                number_match.as_str()
                            )));
                        }
                    },
                    None => DEFAULT_INDEXED_JOIN_THRESHOLD,
                };
                JoinStrategy::Auto(threshold)
            }
        };
        *self = strategy;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let options = SedonaOptions::default();
        let partitioning = &options.spatial_partitioning;
        assert_eq!(partitioning.grid_type, GridType::KdbTree);
        assert_eq!(partitioning.num_partitions, 16);
        assert_eq!(partitioning.index_type, IndexType::RTree);
        assert_eq!(partitioning.index_node_capacity, 16);
        assert_eq!(partitioning.join_strategy, JoinStrategy::Auto(4));
    }

    #[test]
    fn test_set_nested_keys() {
        let mut options = SedonaOptions::default();
        ExtensionOptions::set(&mut options, "spatial_partitioning.grid_type", "QuadTree").unwrap();
        ExtensionOptions::set(&mut options, "spatial_partitioning.num_partitions", "64").unwrap();
        ExtensionOptions::set(&mut options, "spatial_partitioning.join_strategy", "auto[32]")
            .unwrap();
        assert_eq!(options.spatial_partitioning.grid_type, GridType::QuadTree);
        assert_eq!(options.spatial_partitioning.num_partitions, 64);
        assert_eq!(
            options.spatial_partitioning.join_strategy,
            JoinStrategy::Auto(32)
        );

        assert!(ExtensionOptions::set(&mut options, "spatial_partitioning.no_such_key", "1").is_err());
    }

    #[test]
    fn test_entries() {
        let options = SedonaOptions::default();
        let entries = options.entries();
        let grid_type = entries
            .iter()
            .find(|e| e.key == "sedona.spatial_partitioning.grid_type")
            .unwrap();
        assert_eq!(grid_type.value.as_deref(), Some("kdbtree"));

        let join_strategy = entries
            .iter()
            .find(|e| e.key == "sedona.spatial_partitioning.join_strategy")
            .unwrap();
        assert_eq!(join_strategy.value.as_deref(), Some("auto[4]"));
    }

    #[rstest]
    #[case("equalgrid", GridType::EqualGrid)]
    #[case("QUADTREE", GridType::QuadTree)]
    #[case("KdbTree", GridType::KdbTree)]
    #[case("rtree", GridType::RTree)]
    #[case("hilbert", GridType::Hilbert)]
    fn test_grid_type_parsing(#[case] value: &str, #[case] expected: GridType) {
        let mut grid_type = GridType::EqualGrid;
        grid_type.set("", value).unwrap();
        assert_eq!(grid_type, expected);
    }

    #[test]
    fn test_grid_type_invalid() {
        let mut grid_type = GridType::EqualGrid;
        assert!(grid_type.set("", "voronoi").is_err());
        assert!(grid_type.set("", "").is_err());
    }

    #[test]
    fn test_grid_type_serde() {
        let json = serde_json::to_string(&GridType::KdbTree).unwrap();
        assert_eq!(json, "\"kdbtree\"");
        let parsed: GridType = serde_json::from_str("\"hilbert\"").unwrap();
        assert_eq!(parsed, GridType::Hilbert);
    }

    #[test]
    fn test_index_type_parsing() {
        let mut index_type = IndexType::RTree;
        assert!(index_type.set("", "QuadTree").is_ok());
        assert_eq!(index_type, IndexType::QuadTree);
        assert!(index_type.set("", "rtree").is_ok());
        assert_eq!(index_type, IndexType::RTree);
        assert!(index_type.set("", "kdbtree").is_err());
    }

    #[test]
    fn test_join_strategy_parsing() {
        let mut strategy = JoinStrategy::NestedLoop;

        assert!(strategy.set("", "indexed").is_ok());
        assert_eq!(strategy, JoinStrategy::Indexed);

        assert!(strategy.set("", "NESTED_LOOP").is_ok());
        assert_eq!(strategy, JoinStrategy::NestedLoop);

        assert!(strategy.set("", "auto").is_ok());
        assert_eq!(strategy, JoinStrategy::Auto(4));

        assert!(strategy.set("", "Auto[0]").is_ok());
        assert_eq!(strategy, JoinStrategy::Auto(0));

        assert!(strategy.set("", "auto[100]").is_ok());
        assert_eq!(strategy, JoinStrategy::Auto(100));
    }

    #[test]
    fn test_join_strategy_invalid() {
        let mut strategy = JoinStrategy::NestedLoop;
        assert!(strategy.set("", "hash").is_err());
        assert!(strategy.set("", "auto[]").is_err());
        assert!(strategy.set("", "auto[abc]").is_err());
        assert!(strategy.set("", "auto[10").is_err());
        assert!(strategy.set("", "auto 10").is_err());
        assert!(strategy.set("", "auto[99999999999999999999999]").is_err());
    }

    #[rstest]
    #[case(JoinStrategy::NestedLoop, 100, 100, false)]
    #[case(JoinStrategy::Indexed, 1, 1, true)]
    #[case(JoinStrategy::Auto(4), 4, 4, false)]
    #[case(JoinStrategy::Auto(4), 5, 1, true)]
    #[case(JoinStrategy::Auto(4), 1, 5, true)]
    fn test_join_strategy_use_index(
        #[case] strategy: JoinStrategy,
        #[case] left: usize,
        #[case] right: usize,
        #[case] expected: bool,
    ) {
        assert_eq!(strategy.use_index(left, right), expected);
    }
}
