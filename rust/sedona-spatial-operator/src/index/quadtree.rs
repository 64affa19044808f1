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

//! Region quad-tree with fixed quadrants.
//!
//! A node splits into four equal quadrants (SW, SE, NW, NE) once it holds
//! more than `node_capacity` items and is above the depth limit. Items that
//! fit entirely inside one quadrant move down; items crossing a split line
//! stay at the node.

use sedona_geometry::envelope::Envelope;

use crate::index::IndexNode;

/// Depth limit of the local quad-tree index
pub(crate) const DEFAULT_MAX_DEPTH: usize = 16;

struct QuadTreeBuilder<'a> {
    envelopes: &'a [Envelope],
    nodes: Vec<IndexNode>,
    depths: Vec<usize>,
    node_capacity: usize,
    max_depth: usize,
}

impl QuadTreeBuilder<'_> {
    fn insert(&mut self, ordinal: u32) {
        let envelope = &self.envelopes[ordinal as usize];
        let mut node_idx = 0;
        loop {
            let node = &self.nodes[node_idx];
            match node
                .children
                .iter()
                .find(|child| self.nodes[**child].envelope.contains(envelope))
            {
                Some(child) => node_idx = *child,
                None => break,
            }
        }

        self.nodes[node_idx].items.push(ordinal);
        self.split_if_full(node_idx);
    }

    fn split_if_full(&mut self, node_idx: usize) {
        let mut pending = vec![node_idx];
        while let Some(node_idx) = pending.pop() {
            let node = &self.nodes[node_idx];
            if !node.children.is_empty()
                || node.items.len() <= self.node_capacity
                || self.depths[node_idx] >= self.max_depth
            {
                continue;
            }

            let extent = node.envelope;
            let mid = extent.center();
            let (lo_x, lo_y, hi_x, hi_y) =
                (extent.min_x(), extent.min_y(), extent.max_x(), extent.max_y());
            let quadrants = [
                Envelope::try_new(lo_x, lo_y, mid.x, mid.y),
                Envelope::try_new(mid.x, lo_y, hi_x, mid.y),
                Envelope::try_new(lo_x, mid.y, mid.x, hi_y),
                Envelope::try_new(mid.x, mid.y, hi_x, hi_y),
            ];
            let Ok(quadrants) = quadrants.into_iter().collect::<Result<Vec<_>, _>>() else {
                continue;
            };

            let depth = self.depths[node_idx] + 1;
            let first_child = self.nodes.len();
            for quadrant in quadrants {
                self.nodes.push(IndexNode {
                    envelope: quadrant,
                    items: Vec::new(),
                    children: Vec::new(),
                });
                self.depths.push(depth);
            }
            let children: Vec<usize> = (first_child..first_child + 4).collect();

            let items = std::mem::take(&mut self.nodes[node_idx].items);
            let mut stay = Vec::new();
            for ordinal in items {
                let envelope = &self.envelopes[ordinal as usize];
                match children
                    .iter()
                    .find(|child| self.nodes[**child].envelope.contains(envelope))
                {
                    Some(child) => self.nodes[*child].items.push(ordinal),
                    None => stay.push(ordinal),
                }
            }
            self.nodes[node_idx].items = stay;
            self.nodes[node_idx].children = children.clone();
            pending.extend(children);
        }
    }
}

/// Build a quad-tree over the envelopes, returning the node arena and the
/// root position
pub(crate) fn build(
    envelopes: &[Envelope],
    node_capacity: usize,
    max_depth: usize,
) -> (Vec<IndexNode>, Option<usize>) {
    let Some(extent) = Envelope::merge_all(envelopes) else {
        return (Vec::new(), None);
    };

    let mut builder = QuadTreeBuilder {
        envelopes,
        nodes: vec![IndexNode {
            envelope: extent,
            items: Vec::new(),
            children: Vec::new(),
        }],
        depths: vec![0],
        node_capacity,
        max_depth,
    };
    for ordinal in 0..envelopes.len() {
        builder.insert(ordinal as u32);
    }
    (builder.nodes, Some(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Envelope {
        Envelope::try_new(min_x, min_y, max_x, max_y).unwrap()
    }

    #[test]
    fn test_empty() {
        let (nodes, root) = build(&[], 4, DEFAULT_MAX_DEPTH);
        assert!(nodes.is_empty());
        assert!(root.is_none());
    }

    #[test]
    fn test_split_keeps_spanning_items() {
        let envelopes = vec![
            env(0.0, 0.0, 1.0, 1.0),
            env(9.0, 9.0, 10.0, 10.0),
            env(4.0, 4.0, 6.0, 6.0),
            env(9.0, 0.0, 10.0, 1.0),
        ];
        let (nodes, root) = build(&envelopes, 2, DEFAULT_MAX_DEPTH);
        let root = &nodes[root.unwrap()];
        assert_eq!(root.envelope, env(0.0, 0.0, 10.0, 10.0));
        assert_eq!(root.children.len(), 4);
        // The center box crosses both split lines
        assert_eq!(root.items, vec![2]);
        assert_eq!(nodes[root.children[0]].items, vec![0]);
        assert_eq!(nodes[root.children[1]].items, vec![3]);
        assert!(nodes[root.children[2]].items.is_empty());
        assert_eq!(nodes[root.children[3]].items, vec![1]);
    }

    #[test]
    fn test_max_depth() {
        let envelopes = vec![env(1.0, 1.0, 1.0, 1.0); 10];
        let (nodes, _) = build(&envelopes, 2, 3);
        // Identical items can never be separated; splitting stops at depth 3
        assert_eq!(nodes.len(), 1 + 4 * 3);
        let total: usize = nodes.iter().map(|n| n.items.len()).sum();
        assert_eq!(total, 10);
    }
}
