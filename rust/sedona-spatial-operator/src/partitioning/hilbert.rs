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

//! Hilbert curve partitioning.
//!
//! Sample centers are mapped onto a `2^16 x 2^16` grid laid over the sample
//! extent and sorted by their Hilbert curve index. The sorted samples are cut
//! into contiguous runs of equal size and each run claims the curve range from
//! its first index up to the first index of the next run. The ranges cover the
//! whole curve, so every grid cell (and therefore every point of the extent)
//! belongs to exactly one range. A partition boundary is the envelope of the
//! grid cells of its range.

use sedona_common::Result;
use sedona_geometry::envelope::Envelope;

const ORDER: u32 = 16;
const GRID_SIZE: u64 = 1 << ORDER;
const CURVE_LENGTH: u64 = GRID_SIZE * GRID_SIZE;

/// Hilbert index of cell (x, y) on the `2^16 x 2^16` grid
pub fn xy2d(x: u64, y: u64) -> u64 {
    let (mut x, mut y) = (x, y);
    let mut d = 0;
    let mut s = GRID_SIZE / 2;
    while s > 0 {
        let rx = u64::from(x & s > 0);
        let ry = u64::from(y & s > 0);
        d += s * s * ((3 * rx) ^ ry);
        rotate(GRID_SIZE, &mut x, &mut y, rx, ry);
        s /= 2;
    }
    d
}

/// Cell (x, y) at Hilbert index `d`
pub fn d2xy(d: u64) -> (u64, u64) {
    let (mut x, mut y) = (0, 0);
    let mut t = d;
    let mut s = 1;
    while s < GRID_SIZE {
        let rx = 1 & (t / 2);
        let ry = 1 & (t ^ rx);
        rotate(s, &mut x, &mut y, rx, ry);
        x += s * rx;
        y += s * ry;
        t /= 4;
        s *= 2;
    }
    (x, y)
}

fn rotate(n: u64, x: &mut u64, y: &mut u64, rx: u64, ry: u64) {
    if ry == 0 {
        if rx == 1 {
            *x = n - 1 - *x;
            *y = n - 1 - *y;
        }
        std::mem::swap(x, y);
    }
}

/// Maps world coordinates inside an extent to grid cells and back
#[derive(Debug, Clone, Copy)]
struct Grid {
    extent: Envelope,
}

impl Grid {
    fn cell(lo: f64, span: f64, v: f64) -> u64 {
        if span <= 0.0 {
            return 0;
        }
        let c = ((v - lo) / span * GRID_SIZE as f64).floor();
        (c.max(0.0) as u64).min(GRID_SIZE - 1)
    }

    fn curve_index(&self, x: f64, y: f64) -> u64 {
        let cx = Self::cell(self.extent.min_x(), self.extent.width(), x);
        let cy = Self::cell(self.extent.min_y(), self.extent.height(), y);
        xy2d(cx, cy)
    }

    fn world(lo: f64, hi: f64, cell: u64) -> f64 {
        if cell >= GRID_SIZE {
            return hi;
        }
        (lo + (hi - lo) * cell as f64 / GRID_SIZE as f64).min(hi)
    }

    /// Envelope of the cells with curve index in `[start, end)`
    fn range_envelope(&self, start: u64, end: u64) -> Result<Envelope> {
        let (mut min_cx, mut min_cy) = (u64::MAX, u64::MAX);
        let (mut max_cx, mut max_cy) = (0, 0);

        // Decompose the range into aligned blocks of 4^j indices, each of
        // which covers an aligned 2^j x 2^j square of cells
        let mut d = start;
        while d < end {
            let mut level = 0;
            while level < ORDER {
                let block = 1u64 << (2 * (level + 1));
                if d % block != 0 || d + block > end {
                    break;
                }
                level += 1;
            }
            let side = 1u64 << level;
            let (x, y) = d2xy(d);
            let (x0, y0) = (x & !(side - 1), y & !(side - 1));
            min_cx = min_cx.min(x0);
            min_cy = min_cy.min(y0);
            max_cx = max_cx.max(x0 + side);
            max_cy = max_cy.max(y0 + side);
            d += side * side;
        }

        let e = &self.extent;
        Ok(Envelope::try_new(
            Self::world(e.min_x(), e.max_x(), min_cx),
            Self::world(e.min_y(), e.max_y(), min_cy),
            Self::world(e.min_x(), e.max_x(), max_cx),
            Self::world(e.min_y(), e.max_y(), max_cy),
        )?)
    }
}

/// Build Hilbert curve partition boundaries from sampled envelopes
pub fn build(
    samples: &[Envelope],
    extent: &Envelope,
    num_partitions: usize,
) -> Result<Vec<Envelope>> {
    let grid = Grid { extent: *extent };
    if samples.is_empty() || num_partitions <= 1 {
        return Ok(vec![*extent]);
    }

    let mut keys: Vec<(u64, usize)> = samples
        .iter()
        .enumerate()
        .map(|(idx, e)| {
            let c = e.center();
            (grid.curve_index(c.x, c.y), idx)
        })
        .collect();
    keys.sort_unstable();

    // Start of the curve range of each run; the first run starts at 0
    let n = keys.len();
    let mut starts: Vec<u64> = (0..num_partitions)
        .map(|k| if k == 0 { 0 } else { keys[n * k / num_partitions].0 })
        .collect();
    starts.dedup();

    starts
        .iter()
        .enumerate()
        .map(|(k, start)| {
            let end = starts.get(k + 1).copied().unwrap_or(CURVE_LENGTH);
            grid.range_envelope(*start, end)
        })
        .collect()
}
