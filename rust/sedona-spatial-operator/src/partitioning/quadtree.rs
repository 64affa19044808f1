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

//! Quad-tree spatial partitioning.
//!
//! The most loaded leaf is repeatedly split into four equal quadrants until
//! another split would exceed the target number of partitions. Each split
//! replaces one leaf with four, so the number of leaves is always `1 + 3k`.
//! Sampled envelopes are routed by their center; a center on a split line
//! goes to the west (or south) quadrant.

use geo_types::Coord;
use sedona_common::Result;
use sedona_geometry::envelope::Envelope;

#[derive(Debug)]
struct QuadNode {
    extent: Envelope,
    level: usize,
    centers: Vec<Coord<f64>>,
    /// Children in SW, SE, NW, NE order
    children: Option<[usize; 4]>,
}

impl QuadNode {
    fn new(extent: Envelope, level: usize, centers: Vec<Coord<f64>>) -> Self {
        Self {
            extent,
            level,
            centers,
            children: None,
        }
    }

    /// A split can eventually separate the items only if they are not all at
    /// the same place
    fn can_split(&self, max_levels: usize) -> bool {
        if self.children.is_some() || self.level >= max_levels || self.centers.len() < 2 {
            return false;
        }
        let first = self.centers[0];
        self.centers.iter().any(|c| *c != first)
    }
}

/// Build quad-tree partition boundaries from sampled envelopes
pub fn build(
    samples: &[Envelope],
    extent: &Envelope,
    num_partitions: usize,
    max_levels: usize,
) -> Result<Vec<Envelope>> {
    let centers = samples.iter().map(|e| e.center()).collect();
    let mut nodes = vec![QuadNode::new(*extent, 0, centers)];
    let mut num_leaves = 1;

    while num_leaves + 3 <= num_partitions {
        let mut best: Option<usize> = None;
        for (idx, node) in nodes.iter().enumerate() {
            if !node.can_split(max_levels) {
                continue;
            }
            match best {
                Some(best_idx) if nodes[best_idx].centers.len() >= node.centers.len() => {}
                _ => best = Some(idx),
            }
        }
        let Some(node_idx) = best else {
            break;
        };

        let children = split(&mut nodes[node_idx])?;
        let first_child = nodes.len();
        nodes.extend(children);
        nodes[node_idx].children = Some([
            first_child,
            first_child + 1,
            first_child + 2,
            first_child + 3,
        ]);
        num_leaves += 3;
    }

    let mut leaves = Vec::with_capacity(num_leaves);
    let mut stack = vec![0];
    while let Some(idx) = stack.pop() {
        match nodes[idx].children {
            Some(children) => stack.extend(children.iter().rev()),
            None => leaves.push(nodes[idx].extent),
        }
    }
    Ok(leaves)
}

fn split(node: &mut QuadNode) -> Result<[QuadNode; 4]> {
    let extent = node.extent;
    let mid = extent.center();
    let level = node.level + 1;

    let sw = Envelope::try_new(extent.min_x(), extent.min_y(), mid.x, mid.y)?;
    let se = Envelope::try_new(mid.x, extent.min_y(), extent.max_x(), mid.y)?;
    let nw = Envelope::try_new(extent.min_x(), mid.y, mid.x, extent.max_y())?;
    let ne = Envelope::try_new(mid.x, mid.y, extent.max_x(), extent.max_y())?;

    let mut quadrants: [Vec<Coord<f64>>; 4] = Default::default();
    for center in node.centers.drain(..) {
        let east = center.x > mid.x;
        let north = center.y > mid.y;
        let quadrant = (north as usize) * 2 + east as usize;
        quadrants[quadrant].push(center);
    }
    let [q_sw, q_se, q_nw, q_ne] = quadrants;

    Ok([
        QuadNode::new(sw, level, q_sw),
        QuadNode::new(se, level, q_se),
        QuadNode::new(nw, level, q_nw),
        QuadNode::new(ne, level, q_ne),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn env(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Envelope {
        Envelope::try_new(min_x, min_y, max_x, max_y).unwrap()
    }

    fn lattice(n: usize) -> Vec<Envelope> {
        (0..n * n)
            .map(|i| {
                let (x, y) = ((i % n) as f64, (i / n) as f64);
                env(x, y, x, y)
            })
            .collect()
    }

    #[test]
    fn test_single_split() {
        let samples = lattice(10);
        let extent = env(0.0, 0.0, 9.0, 9.0);
        let leaves = build(&samples, &extent, 4, 16).unwrap();
        assert_eq!(
            leaves,
            vec![
                env(0.0, 0.0, 4.5, 4.5),
                env(4.5, 0.0, 9.0, 4.5),
                env(0.0, 4.5, 4.5, 9.0),
                env(4.5, 4.5, 9.0, 9.0),
            ]
        );
    }

    #[rstest]
    #[case(1, 1)]
    #[case(3, 1)]
    #[case(4, 4)]
    #[case(6, 4)]
    #[case(7, 7)]
    #[case(16, 16)]
    fn test_leaf_count(#[case] target: usize, #[case] expected: usize) {
        let samples = lattice(20);
        let extent = env(0.0, 0.0, 19.0, 19.0);
        let leaves = build(&samples, &extent, target, 16).unwrap();
        assert_eq!(leaves.len(), expected);
        let total_area: f64 = leaves.iter().map(|e| e.area()).sum();
        assert!((total_area - extent.area()).abs() < 1e-9);
    }

    #[test]
    fn test_splits_most_loaded_leaf() {
        // Dense cluster in the south-west corner plus a few scattered points
        let mut samples: Vec<Envelope> = (0..100)
            .map(|i| {
                let (x, y) = ((i % 10) as f64 * 0.1, (i / 10) as f64 * 0.1);
                env(x, y, x, y)
            })
            .collect();
        samples.push(env(90.0, 90.0, 90.0, 90.0));
        samples.push(env(90.0, 10.0, 90.0, 10.0));
        let extent = env(0.0, 0.0, 100.0, 100.0);

        let leaves = build(&samples, &extent, 7, 16).unwrap();
        assert_eq!(leaves.len(), 7);
        // The south-west quadrant was split again, its children come first
        assert_eq!(leaves[0], env(0.0, 0.0, 25.0, 25.0));
        assert_eq!(leaves[4], env(50.0, 0.0, 100.0, 50.0));
    }

    #[test]
    fn test_identical_samples_are_not_split() {
        let samples = vec![env(1.0, 1.0, 1.0, 1.0); 50];
        let extent = env(0.0, 0.0, 2.0, 2.0);
        let leaves = build(&samples, &extent, 16, 16).unwrap();
        assert_eq!(leaves, vec![extent]);
    }
}
