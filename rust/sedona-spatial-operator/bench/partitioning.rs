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

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::{rngs::StdRng, Rng, SeedableRng};
use sedona_common::option::GridType;
use sedona_geometry::envelope::Envelope;
use sedona_spatial_operator::partitioning::SpatialPartitioning;

const SAMPLE_COUNT: usize = 20_000;
const QUERY_BATCH_SIZE: usize = 1_024;
const PARTITION_COUNTS: [usize; 3] = [16, 64, 256];
const MAX_LEVELS: usize = 16;
const RNG_SEED: u64 = 0x5ED0_4A7E;

fn bench_build(c: &mut Criterion) {
    let extent = default_extent();
    let mut rng = StdRng::seed_from_u64(RNG_SEED);
    let samples = synthetic_envelopes(SAMPLE_COUNT, &extent, &mut rng, span_for_extent(&extent));

    let mut group = c.benchmark_group("partitioning_build");
    group.throughput(Throughput::Elements(SAMPLE_COUNT as u64));

    for grid_type in GridType::ALL {
        group.bench_with_input(
            BenchmarkId::from_parameter(grid_type.name()),
            &grid_type,
            |b, &grid_type| {
                b.iter(|| {
                    let partitioning = SpatialPartitioning::build(
                        black_box(&samples),
                        grid_type,
                        PARTITION_COUNTS[0],
                        MAX_LEVELS,
                    )
                    .expect("failed to build partitioning for benchmark");
                    black_box(partitioning);
                });
            },
        );
    }

    group.finish();
}

fn bench_assign(c: &mut Criterion) {
    let extent = default_extent();
    let mut rng = StdRng::seed_from_u64(RNG_SEED);
    let samples = synthetic_envelopes(SAMPLE_COUNT, &extent, &mut rng, span_for_extent(&extent));
    let queries = synthetic_envelopes(
        QUERY_BATCH_SIZE,
        &extent,
        &mut rng,
        span_for_extent(&extent) / 2.0,
    );

    let mut group = c.benchmark_group("partitioning_assign");
    group.throughput(Throughput::Elements(QUERY_BATCH_SIZE as u64));

    for grid_type in GridType::ALL {
        for num_partitions in PARTITION_COUNTS {
            let partitioning =
                SpatialPartitioning::build(&samples, grid_type, num_partitions, MAX_LEVELS)
                    .expect("failed to build partitioning for benchmark");
            group.bench_with_input(
                BenchmarkId::from_parameter(format!("{}-{num_partitions}", grid_type.name())),
                &partitioning,
                |b, partitioning: &SpatialPartitioning| {
                    b.iter(|| {
                        for query in &queries {
                            black_box(partitioning.assign(black_box(query)));
                        }
                    });
                },
            );
        }
    }

    group.finish();
}

fn synthetic_envelopes(
    count: usize,
    extent: &Envelope,
    rng: &mut StdRng,
    max_span: f64,
) -> Vec<Envelope> {
    (0..count)
        .map(|_| random_envelope(extent, rng, max_span))
        .collect()
}

fn random_envelope(extent: &Envelope, rng: &mut StdRng, max_span: f64) -> Envelope {
    let span_x = rng.gen_range(0.01..max_span).min(extent.width());
    let span_y = rng.gen_range(0.01..max_span).min(extent.height());

    let start_x = rng.gen_range(extent.min_x()..=extent.max_x() - span_x);
    let start_y = rng.gen_range(extent.min_y()..=extent.max_y() - span_y);

    Envelope::try_new(start_x, start_y, start_x + span_x, start_y + span_y)
        .expect("random envelope should be valid")
}

fn span_for_extent(extent: &Envelope) -> f64 {
    (extent.width().min(extent.height()) / 32.0).max(0.01)
}

fn default_extent() -> Envelope {
    Envelope::try_new(0.0, 0.0, 10_000.0, 10_000.0).expect("default extent should be valid")
}

criterion_group!(partitioning, bench_build, bench_assign);
criterion_main!(partitioning);
