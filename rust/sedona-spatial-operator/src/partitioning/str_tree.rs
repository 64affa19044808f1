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

//! R-tree style partitioning using Sort-Tile-Recursive (STR) packing.
//!
//! Sample centers are sorted by x and cut into `ceil(sqrt(n))` vertical
//! slices holding equal numbers of samples. Each slice is then sorted by y and
//! cut into tiles. Cut lines are placed halfway between neighbouring samples
//! and the outermost slices and tiles are stretched to the sample extent, so
//! the tiles cover the extent without gaps.

use geo_types::Coord;
use sedona_common::Result;
use sedona_geometry::envelope::Envelope;

/// Build STR partition boundaries from sampled envelopes
pub fn build(
    samples: &[Envelope],
    extent: &Envelope,
    num_partitions: usize,
) -> Result<Vec<Envelope>> {
    let mut centers: Vec<Coord<f64>> = samples.iter().map(|e| e.center()).collect();
    if centers.is_empty() || num_partitions <= 1 {
        return Ok(vec![*extent]);
    }

    centers.sort_by(|a, b| a.x.total_cmp(&b.x).then_with(|| a.y.total_cmp(&b.y)));
    let num_slices = (num_partitions as f64).sqrt().ceil() as usize;
    let slices = even_groups(centers.len(), num_slices);
    let tiles_per_slice = even_groups(num_partitions, num_slices);

    let x_cuts = cut_points(
        &slices,
        |idx| centers[idx].x,
        extent.min_x(),
        extent.max_x(),
    );

    let mut boundaries = Vec::with_capacity(num_partitions);
    for (slice_idx, (start, end)) in slices.iter().enumerate() {
        let slice = &mut centers[*start..*end];
        if slice.is_empty() {
            continue;
        }
        slice.sort_by(|a, b| a.y.total_cmp(&b.y).then_with(|| a.x.total_cmp(&b.x)));

        let (tiles_start, tiles_end) = tiles_per_slice[slice_idx];
        let num_tiles = (tiles_end - tiles_start).clamp(1, slice.len());
        let tiles = even_groups(slice.len(), num_tiles);
        let y_cuts = cut_points(&tiles, |idx| slice[idx].y, extent.min_y(), extent.max_y());

        let (x0, x1) = x_cuts[slice_idx];
        for (y0, y1) in y_cuts {
            boundaries.push(Envelope::try_new(x0, y0, x1, y1)?);
        }
    }
    Ok(boundaries)
}

/// Split `0..len` into `n` consecutive ranges whose sizes differ by at most one
fn even_groups(len: usize, n: usize) -> Vec<(usize, usize)> {
    (0..n).map(|k| (len * k / n, len * (k + 1) / n)).collect()
}

/// Closed intervals spanned by each group of sorted values. Neighbouring
/// intervals meet halfway between the last value of one group and the first
/// value of the next; the outer intervals reach `lo` and `hi`.
fn cut_points(
    groups: &[(usize, usize)],
    value: impl Fn(usize) -> f64,
    lo: f64,
    hi: f64,
) -> Vec<(f64, f64)> {
    let mut intervals = Vec::with_capacity(groups.len());
    let mut prev_end = lo;
    for (idx, (start, end)) in groups.iter().enumerate() {
        if start == end {
            intervals.push((prev_end, prev_end));
            continue;
        }
        let next_start = groups[idx + 1..]
            .iter()
            .find(|(s, e)| s < e)
            .map(|(s, _)| *s);
        let interval_end = match next_start {
            Some(next) => ((value(end - 1) + value(next)) / 2.0).clamp(prev_end, hi),
            None => hi,
        };
        intervals.push((prev_end, interval_end));
        prev_end = interval_end;
    }
    intervals
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rstest::rstest;

    fn env(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Envelope {
        Envelope::try_new(min_x, min_y, max_x, max_y).unwrap()
    }

    #[test]
    fn test_even_groups() {
        assert_eq!(even_groups(10, 3), vec![(0, 3), (3, 6), (6, 10)]);
        assert_eq!(even_groups(4, 4), vec![(0, 1), (1, 2), (2, 3), (3, 4)]);
    }

    #[test]
    fn test_four_tiles() {
        let samples: Vec<Envelope> = [(1.0, 1.0), (1.0, 9.0), (9.0, 1.0), (9.0, 9.0)]
            .iter()
            .map(|(x, y)| env(*x, *y, *x, *y))
            .collect();
        let extent = env(0.0, 0.0, 10.0, 10.0);
        let tiles = build(&samples, &extent, 4).unwrap();
        assert_eq!(
            tiles,
            vec![
                env(0.0, 0.0, 5.0, 5.0),
                env(0.0, 5.0, 5.0, 10.0),
                env(5.0, 0.0, 10.0, 5.0),
                env(5.0, 5.0, 10.0, 10.0),
            ]
        );
    }

    #[rstest]
    fn test_tiles_cover_extent(#[values(2, 5, 9, 10, 33)] num_partitions: usize) {
        let mut rng = StdRng::seed_from_u64(99);
        let samples: Vec<Envelope> = (0..500)
            .map(|_| {
                let (x, y) = (rng.gen_range(0.0..50.0), rng.gen_range(0.0..20.0));
                env(x, y, x + 1.0, y + 1.0)
            })
            .collect();
        let extent = Envelope::merge_all(&samples).unwrap();
        let tiles = build(&samples, &extent, num_partitions).unwrap();

        assert_eq!(tiles.len(), num_partitions);
        let total_area: f64 = tiles.iter().map(|e| e.area()).sum();
        assert!((total_area - extent.area()).abs() < 1e-6);
        assert_eq!(Envelope::merge_all(&tiles), Some(extent));
    }

    #[test]
    fn test_two_samples() {
        let samples = vec![env(1.0, 1.0, 1.0, 1.0), env(2.0, 2.0, 2.0, 2.0)];
        let extent = env(1.0, 1.0, 2.0, 2.0);
        let tiles = build(&samples, &extent, 2).unwrap();
        assert_eq!(tiles, vec![env(1.0, 1.0, 1.5, 2.0), env(1.5, 1.0, 2.0, 2.0)]);
    }
}
