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

//! Sort-Tile-Recursive bulk loading of an R-tree.
//!
//! Entries of each level are sorted by the x coordinate of their center, cut
//! into vertical slices of `ceil(sqrt(P))` nodes each (P being the number of
//! nodes on the level), and every slice is sorted by y and packed into nodes
//! of `node_capacity` entries. Levels are packed bottom-up until a single root
//! remains. Sorting is stable, so entries with equal keys keep insertion order.

use sedona_geometry::envelope::Envelope;

use crate::index::IndexNode;

/// Bulk-load the envelopes, returning the node arena and the root position
pub(crate) fn bulk_load(
    envelopes: &[Envelope],
    node_capacity: usize,
) -> (Vec<IndexNode>, Option<usize>) {
    let mut nodes = Vec::new();

    // Leaf level: pack item ordinals
    let ordinals: Vec<usize> = (0..envelopes.len()).collect();
    let mut level = Vec::new();
    for group in str_pack(ordinals, node_capacity, |o| envelopes[*o]) {
        let Some(envelope) = Envelope::merge_all(group.iter().map(|o| &envelopes[*o])) else {
            continue;
        };
        nodes.push(IndexNode {
            envelope,
            items: group.iter().map(|o| *o as u32).collect(),
            children: Vec::new(),
        });
        level.push(nodes.len() - 1);
    }

    // Upper levels: pack node positions
    while level.len() > 1 {
        let mut next_level = Vec::new();
        for group in str_pack(level, node_capacity, |pos| nodes[*pos].envelope) {
            let Some(envelope) = Envelope::merge_all(group.iter().map(|pos| &nodes[*pos].envelope))
            else {
                continue;
            };
            nodes.push(IndexNode {
                envelope,
                items: Vec::new(),
                children: group,
            });
            next_level.push(nodes.len() - 1);
        }
        level = next_level;
    }

    let root = level.first().copied();
    (nodes, root)
}

/// Group entries into nodes of at most `node_capacity` entries
///
/// Slices hold a multiple of `node_capacity` entries, so consecutive groups
/// never straddle two slices.
fn str_pack<K>(
    mut entries: Vec<K>,
    node_capacity: usize,
    envelope: impl Fn(&K) -> Envelope,
) -> Vec<Vec<K>> {
    let num_nodes = entries.len().div_ceil(node_capacity);
    let num_slices = (num_nodes as f64).sqrt().ceil() as usize;
    let slice_len = num_slices.max(1) * node_capacity;

    entries.sort_by(|a, b| envelope(a).center().x.total_cmp(&envelope(b).center().x));
    for slice in entries.chunks_mut(slice_len) {
        slice.sort_by(|a, b| envelope(a).center().y.total_cmp(&envelope(b).center().y));
    }

    let mut groups = Vec::with_capacity(num_nodes);
    let mut entries = entries.into_iter().peekable();
    while entries.peek().is_some() {
        groups.push(entries.by_ref().take(node_capacity).collect());
    }
    groups
}
