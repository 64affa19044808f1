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

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use geo_types::{point, Coord, Rect};
use sedona_common::option::{GridType, JoinStrategy, SpatialPartitioningOptions};
use sedona_geometry::geometry::SpatialGeometry;
use sedona_spatial_operator::collection::{PartitionedCollection, SpatialCollection};
use sedona_spatial_operator::operator::{JoinQuery, KnnQuery, RangeQuery};
use sedona_spatial_operator::spatial_predicate::SpatialPredicate;
use sedona_testing::datagen::{GeometryKind, RandomGeometryBuilder};

const ROWS_PER_SPLIT: usize = 25_000;
const NUM_SPLITS: usize = 4;
const NUM_PARTITIONS: usize = 64;

fn collection(seed: u64, kind: GeometryKind) -> SpatialCollection {
    SpatialCollection::new(
        RandomGeometryBuilder::new()
            .seed(seed)
            .num_splits(NUM_SPLITS)
            .rows_per_split(ROWS_PER_SPLIT)
            .geometry_kind(kind)
            .bounds(Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 10_000.0, y: 10_000.0 }))
            .size_range((1.0, 50.0))
            .build(),
    )
}

fn partitioned(seed: u64, kind: GeometryKind, grid_type: GridType) -> PartitionedCollection {
    let options = SpatialPartitioningOptions::default();
    collection(seed, kind)
        .partition(grid_type, NUM_PARTITIONS, &options)
        .and_then(|p| p.build_index_with_options(&options))
        .expect("failed to partition benchmark data")
}

fn bench_range(c: &mut Criterion) {
    let window = Rect::new(Coord { x: 2_000.0, y: 2_000.0 }, Coord { x: 3_000.0, y: 3_000.0 });
    let window = SpatialGeometry::new(u64::MAX, window.to_polygon());

    let mut group = c.benchmark_group("range_query");
    for grid_type in GridType::ALL {
        let data = partitioned(1, GeometryKind::Polygon, grid_type);
        for use_index in [false, true] {
            let query = RangeQuery::new(window.clone(), SpatialPredicate::Intersects)
                .with_use_index(use_index);
            let label = if use_index { "indexed" } else { "scan" };
            group.bench_with_input(
                BenchmarkId::from_parameter(format!("{}-{label}", grid_type.name())),
                &data,
                |b, data| b.iter(|| black_box(query.execute(black_box(data)))),
            );
        }
    }
    group.finish();
}

fn bench_knn(c: &mut Criterion) {
    let mut group = c.benchmark_group("knn_query");
    let data = partitioned(2, GeometryKind::Point, GridType::KdbTree);
    for k in [1_i64, 10, 100] {
        let query = KnnQuery::new(point!(x: 5_000.0, y: 5_000.0), k);
        group.bench_with_input(BenchmarkId::from_parameter(k), &data, |b, data| {
            b.iter(|| black_box(query.execute(black_box(data))))
        });
    }
    group.finish();
}

fn bench_join(c: &mut Criterion) {
    let mut group = c.benchmark_group("join_query");
    group.sample_size(10);
    let left = partitioned(3, GeometryKind::Polygon, GridType::KdbTree);
    let right = collection(4, GeometryKind::Point)
        .partition_with(Arc::clone(left.partitioning()))
        .expect("failed to partition benchmark data");
    for (label, strategy) in [
        ("indexed", JoinStrategy::Indexed),
        ("auto", JoinStrategy::Auto(1_024)),
    ] {
        let query = JoinQuery::new(SpatialPredicate::Contains).with_strategy(strategy);
        group.bench_function(label, |b| {
            b.iter(|| black_box(query.execute(black_box(&left), black_box(&right))))
        });
    }
    group.finish();
}

criterion_group!(queries, bench_range, bench_knn, bench_join);
criterion_main!(queries);
