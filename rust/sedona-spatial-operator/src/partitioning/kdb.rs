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

//! KDB-tree spatial partitioning.
//!
//! See <https://en.wikipedia.org/wiki/K-D-B-tree>
//!
//! The KDB tree partitions space by recursively splitting it in two:
//!
//! 1. Start with the full sample extent as the only leaf
//! 2. Pick the leaf holding the most sampled envelopes and split it:
//!    - Choose the longer dimension (x or y)
//!    - Sort items by their minimum coordinate on that dimension
//!    - Split at the median item's coordinate
//!    - If the split coordinate lies on the edge of the extent, try the
//!      other dimension
//! 3. Continue until reaching the target number of leaves, or until no leaf
//!    can be split within `max_levels`
//! 4. Assign sequential IDs to leaf nodes in depth-first order
//!
//! Items whose minimum coordinate equals the split coordinate go to the lower
//! (left or bottom) child, so identical input always produces identical leaves.

use std::cmp::Ordering;

use sedona_common::Result;
use sedona_geometry::envelope::Envelope;

#[derive(Debug)]
struct KdbNode {
    extent: Envelope,
    level: usize,
    items: Vec<Envelope>,
    children: Option<[usize; 2]>,
    splittable: bool,
}

/// K-D-B tree over sampled envelopes, stored as an arena of nodes
#[derive(Debug)]
pub(crate) struct KdbTree {
    nodes: Vec<KdbNode>,
    max_levels: usize,
}

impl KdbTree {
    pub fn new(extent: Envelope, items: Vec<Envelope>, max_levels: usize) -> Self {
        Self {
            nodes: vec![KdbNode {
                extent,
                level: 0,
                items,
                children: None,
                splittable: true,
            }],
            max_levels,
        }
    }

    /// Split leaves until there are `num_leaves` of them or no leaf can be split
    pub fn grow(&mut self, num_leaves: usize) {
        let mut leaves = 1;
        while leaves < num_leaves {
            let Some(node_idx) = self.most_loaded_leaf() else {
                break;
            };

            let node = &self.nodes[node_idx];
            let split_x = node.extent.width() > node.extent.height();
            if self.split(node_idx, split_x) || self.split(node_idx, !split_x) {
                leaves += 1;
            } else {
                // This could happen if all envelopes are crowded at the same place
                self.nodes[node_idx].splittable = false;
            }
        }
    }

    fn most_loaded_leaf(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (idx, node) in self.nodes.iter().enumerate() {
            let candidate = node.children.is_none()
                && node.splittable
                && node.level < self.max_levels
                && node.items.len() >= 2;
            if !candidate {
                continue;
            }
            match best {
                Some(best_idx) if self.nodes[best_idx].items.len() >= node.items.len() => {}
                _ => best = Some(idx),
            }
        }
        best
    }

    /// Split a node along the specified axis.
    ///
    /// Returns true if the split was successful. The split fails when too many
    /// objects are crowded at the edge of the extent, or when the median
    /// coordinate would leave one side without items.
    fn split(&mut self, node_idx: usize, split_x: bool) -> bool {
        let node = &mut self.nodes[node_idx];
        let key = |e: &Envelope| {
            if split_x {
                (e.min_x(), e.min_y())
            } else {
                (e.min_y(), e.min_x())
            }
        };
        node.items.sort_by(|a, b| {
            let (a0, a1) = key(a);
            let (b0, b1) = key(b);
            a0.total_cmp(&b0).then_with(|| a1.total_cmp(&b1))
        });

        // Find the split coordinate from the middle item
        let middle_idx = node.items.len() / 2;
        let split_coord = key(&node.items[middle_idx]).0;

        let extent = node.extent;
        let (lo, hi) = if split_x {
            (extent.min_x(), extent.max_x())
        } else {
            (extent.min_y(), extent.max_y())
        };
        if split_coord <= lo || split_coord >= hi {
            return false;
        }

        // Items equal to the split coordinate go left
        let split_at = node
            .items
            .partition_point(|e| key(e).0.partial_cmp(&split_coord) != Some(Ordering::Greater));
        if split_at == 0 || split_at == node.items.len() {
            return false;
        }

        let (left_extent, right_extent) = if split_x {
            (
                Envelope::try_new(extent.min_x(), extent.min_y(), split_coord, extent.max_y()),
                Envelope::try_new(split_coord, extent.min_y(), extent.max_x(), extent.max_y()),
            )
        } else {
            (
                Envelope::try_new(extent.min_x(), extent.min_y(), extent.max_x(), split_coord),
                Envelope::try_new(extent.min_x(), split_coord, extent.max_x(), extent.max_y()),
            )
        };
        let (Ok(left_extent), Ok(right_extent)) = (left_extent, right_extent) else {
            return false;
        };

        let right_items = node.items.split_off(split_at);
        let left_items = std::mem::take(&mut node.items);
        let level = node.level + 1;

        let left_idx = self.nodes.len();
        self.nodes.push(KdbNode {
            extent: left_extent,
            level,
            items: left_items,
            children: None,
            splittable: true,
        });
        self.nodes.push(KdbNode {
            extent: right_extent,
            level,
            items: right_items,
            children: None,
            splittable: true,
        });
        self.nodes[node_idx].children = Some([left_idx, left_idx + 1]);
        true
    }

    /// Leaf extents in depth-first order; the position is the partition id
    pub fn leaf_extents(&self) -> Vec<Envelope> {
        let mut leaves = Vec::new();
        let mut stack = vec![0];
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx];
            match node.children {
                Some([left, right]) => {
                    stack.push(right);
                    stack.push(left);
                }
                None => leaves.push(node.extent),
            }
        }
        leaves
    }

    #[cfg(test)]
    fn leaf_item_counts(&self) -> Vec<usize> {
        let mut counts = Vec::new();
        let mut stack = vec![0];
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx];
            match node.children {
                Some([left, right]) => {
                    stack.push(right);
                    stack.push(left);
                }
                None => counts.push(node.items.len()),
            }
        }
        counts
    }
}

/// Build KDB-tree partition boundaries from sampled envelopes
pub fn build(
    samples: &[Envelope],
    extent: &Envelope,
    num_partitions: usize,
    max_levels: usize,
) -> Result<Vec<Envelope>> {
    let mut tree = KdbTree::new(*extent, samples.to_vec(), max_levels);
    tree.grow(num_partitions);
    Ok(tree.leaf_extents())
}
