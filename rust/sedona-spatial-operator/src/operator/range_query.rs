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

use std::sync::Arc;

use rayon::prelude::*;
use sedona_common::Result;
use sedona_geometry::crs::ensure_crs_compatible;
use sedona_geometry::envelope::Envelope;
use sedona_geometry::geometry::SpatialGeometry;

use crate::collection::{Partition, PartitionEntry, PartitionedCollection};
use crate::dedup::{pair_owner, DuplicateResolver, Match, MatchKey};
use crate::operator::QueryMetrics;
use crate::spatial_predicate::SpatialPredicate;

/// A geometry matching a range query and the partition that reported it
#[derive(Debug, Clone)]
pub struct RangeMatch {
    geometry: Arc<SpatialGeometry>,
    partition_id: u32,
    owner: Option<u32>,
}

impl RangeMatch {
    pub fn geometry(&self) -> &Arc<SpatialGeometry> {
        &self.geometry
    }
}

impl Match for RangeMatch {
    fn key(&self) -> MatchKey {
        MatchKey::Single(self.geometry.id())
    }

    fn partition_id(&self) -> u32 {
        self.partition_id
    }

    fn owner(&self) -> Option<u32> {
        self.owner
    }
}

#[derive(Debug, Clone)]
pub struct RangeQueryResult {
    pub matches: Vec<RangeMatch>,
    /// Malformed geometries of the collection that were never considered
    pub skipped: usize,
    pub metrics: QueryMetrics,
}

/// Find the geometries `g` of a partitioned collection for which
/// `predicate(g, window)` holds
///
/// Only partitions whose boundary the window is assigned to are scanned.
/// With `use_index` set (the default), partitions carrying a local index are
/// searched through it; other partitions are scanned entry by entry.
#[derive(Debug, Clone)]
pub struct RangeQuery {
    window: SpatialGeometry,
    predicate: SpatialPredicate,
    use_index: bool,
}

impl RangeQuery {
    pub fn new(window: SpatialGeometry, predicate: SpatialPredicate) -> Self {
        Self {
            window,
            predicate,
            use_index: true,
        }
    }

    pub fn with_use_index(mut self, use_index: bool) -> Self {
        self.use_index = use_index;
        self
    }

    pub fn window(&self) -> &SpatialGeometry {
        &self.window
    }

    pub fn predicate(&self) -> SpatialPredicate {
        self.predicate
    }

    /// Lazily produce the matches, each exactly once
    ///
    /// The returned iterator borrows the query and the collection; calling
    /// this again restarts the query from the first partition.
    pub fn iter<'a>(&'a self, collection: &'a PartitionedCollection) -> Result<RangeMatches<'a>> {
        ensure_crs_compatible(self.window.crs(), collection.crs())?;
        let (envelope, scanned) = self.scanned_partitions(collection);
        Ok(RangeMatches {
            query: self,
            collection,
            envelope,
            scanned,
            position: 0,
            current: None,
        })
    }

    /// Run the query over all scanned partitions in parallel
    pub fn execute(&self, collection: &PartitionedCollection) -> Result<RangeQueryResult> {
        ensure_crs_compatible(self.window.crs(), collection.crs())?;
        let (envelope, scanned) = self.scanned_partitions(collection);

        let per_partition: Vec<(Vec<RangeMatch>, usize)> = scanned
            .par_iter()
            .filter_map(|partition_id| collection.partition(*partition_id))
            .map(|partition| {
                let Some(envelope) = envelope else {
                    return (Vec::new(), 0);
                };
                let mut candidates = 0;
                let matches: Vec<RangeMatch> = self
                    .candidates(partition, envelope)
                    .inspect(|_| candidates += 1)
                    .filter(|entry| self.predicate.evaluate(entry.geometry(), &self.window))
                    .map(|entry| RangeMatch {
                        geometry: Arc::clone(entry.geometry()),
                        partition_id: partition.id(),
                        owner: pair_owner(entry.partitions(), &scanned),
                    })
                    .collect();
                log::trace!(
                    "Range query on partition {}: {candidates} candidates, {} matches",
                    partition.id(),
                    matches.len()
                );
                (matches, candidates)
            })
            .collect();

        let candidates = per_partition.iter().map(|(_, c)| *c).sum();
        let resolved =
            DuplicateResolver.resolve(per_partition.into_iter().flat_map(|(matches, _)| matches));

        Ok(RangeQueryResult {
            metrics: QueryMetrics {
                candidates,
                results: resolved.matches.len(),
                duplicates_removed: resolved.duplicates_removed,
            },
            matches: resolved.matches,
            skipped: collection.skipped(),
        })
    }

    /// The window envelope and the ascending ids of the partitions it is
    /// assigned to. A malformed window scans nothing.
    fn scanned_partitions(
        &self,
        collection: &PartitionedCollection,
    ) -> (Option<Envelope>, Vec<u32>) {
        match self.window.envelope() {
            Some(envelope) => (Some(*envelope), collection.partitioning().assign(envelope)),
            None => (None, Vec::new()),
        }
    }

    /// Entries of a partition whose envelope intersects `envelope`
    fn candidates<'a>(
        &'a self,
        partition: &'a Partition,
        envelope: Envelope,
    ) -> Box<dyn Iterator<Item = &'a PartitionEntry> + 'a> {
        match partition.index() {
            Some(index) if self.use_index => Box::new(index.query(&envelope)),
            _ => Box::new(partition.entries().iter().filter(move |entry| {
                entry
                    .geometry()
                    .envelope()
                    .is_some_and(|e| e.intersects(&envelope))
            })),
        }
    }
}

/// Lazy iterator over the matches of a [`RangeQuery`]
///
/// Partitions are visited in ascending id order and each match is produced
/// only by its owning partition.
pub struct RangeMatches<'a> {
    query: &'a RangeQuery,
    collection: &'a PartitionedCollection,
    envelope: Option<Envelope>,
    scanned: Vec<u32>,
    position: usize,
    current: Option<(u32, Box<dyn Iterator<Item = &'a PartitionEntry> + 'a>)>,
}

impl Iterator for RangeMatches<'_> {
    type Item = RangeMatch;

    fn next(&mut self) -> Option<Self::Item> {
        let envelope = self.envelope?;
        loop {
            if let Some((partition_id, candidates)) = &mut self.current {
                for entry in candidates.by_ref() {
                    if !self
                        .query
                        .predicate
                        .evaluate(entry.geometry(), &self.query.window)
                    {
                        continue;
                    }
                    let found = RangeMatch {
                        geometry: Arc::clone(entry.geometry()),
                        partition_id: *partition_id,
                        owner: pair_owner(entry.partitions(), &self.scanned),
                    };
                    if DuplicateResolver.is_owner(&found) {
                        return Some(found);
                    }
                }
            }

            let partition_id = *self.scanned.get(self.position)?;
            self.position += 1;
            let Some(partition) = self.collection.partition(partition_id) else {
                continue;
            };
            self.current = Some((partition_id, self.query.candidates(partition, envelope)));
        }
    }
}
