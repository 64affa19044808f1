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

//! Random geometry dataset generation for testing and benchmarking.

use std::sync::Arc;

use geo_types::{Coord, Geometry, LineString, MultiPoint, Point, Polygon, Rect};
use rand::distributions::Uniform;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sedona_geometry::crs::Crs;
use sedona_geometry::geometry::SpatialGeometry;

/// Kind of geometry produced by [`RandomGeometryBuilder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryKind {
    Point,
    /// Diamond shaped polygons (squares rotated 45 degrees)
    Polygon,
    /// Two point line segments
    LineString,
}

fn generate_random_geometry<R: Rng>(
    rng: &mut R,
    kind: GeometryKind,
    bounds: &Rect,
    size_range: (f64, f64),
) -> Geometry {
    match kind {
        GeometryKind::Point => {
            let x = rng.sample(Uniform::new_inclusive(bounds.min().x, bounds.max().x));
            let y = rng.sample(Uniform::new_inclusive(bounds.min().y, bounds.max().y));
            Geometry::Point(Point::new(x, y))
        }
        GeometryKind::Polygon => {
            let half_size = rng.sample(Uniform::new_inclusive(size_range.0, size_range.1));

            // Ensure diamond fits within bounds by constraining center position
            let (center_x, center_y) = random_center(rng, bounds, half_size);

            let coords = vec![
                Coord {
                    x: center_x,
                    y: center_y + half_size,
                },
                Coord {
                    x: center_x + half_size,
                    y: center_y,
                },
                Coord {
                    x: center_x,
                    y: center_y - half_size,
                },
                Coord {
                    x: center_x - half_size,
                    y: center_y,
                },
                Coord {
                    x: center_x,
                    y: center_y + half_size,
                },
            ];
            Geometry::Polygon(Polygon::new(LineString::from(coords), vec![]))
        }
        GeometryKind::LineString => {
            let half_size = rng.sample(Uniform::new_inclusive(size_range.0, size_range.1));
            let (center_x, center_y) = random_center(rng, bounds, half_size);
            let angle = rng.sample(Uniform::new(0.0, std::f64::consts::PI));
            let (dx, dy) = (half_size * angle.cos(), half_size * angle.sin());
            Geometry::LineString(LineString::from(vec![
                (center_x - dx, center_y - dy),
                (center_x + dx, center_y + dy),
            ]))
        }
    }
}

fn random_center<R: Rng>(rng: &mut R, bounds: &Rect, half_size: f64) -> (f64, f64) {
    let (lo_x, hi_x) = shrink(bounds.min().x, bounds.max().x, half_size);
    let (lo_y, hi_y) = shrink(bounds.min().y, bounds.max().y, half_size);
    (
        rng.sample(Uniform::new_inclusive(lo_x, hi_x)),
        rng.sample(Uniform::new_inclusive(lo_y, hi_y)),
    )
}

fn shrink(lo: f64, hi: f64, margin: f64) -> (f64, f64) {
    if hi - lo > 2.0 * margin {
        (lo + margin, hi - margin)
    } else {
        let mid = lo + (hi - lo) / 2.0;
        (mid, mid)
    }
}

/// Builder for generating deterministic random geometry collections split
/// into several input splits.
///
/// Geometry identities are sequential across splits starting from zero, so
/// the n-th generated geometry has id n regardless of how it was split.
///
/// # Example
///
/// ```rust
/// use sedona_testing::datagen::{GeometryKind, RandomGeometryBuilder};
/// use geo_types::{Coord, Rect};
///
/// let splits = RandomGeometryBuilder::new()
///     .seed(42)
///     .num_splits(4)
///     .rows_per_split(1000)
///     .geometry_kind(GeometryKind::Polygon)
///     .bounds(Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 100.0, y: 100.0 }))
///     .build();
/// assert_eq!(splits.len(), 4);
/// ```
#[derive(Debug, Clone)]
pub struct RandomGeometryBuilder {
    seed: u64,
    num_splits: usize,
    rows_per_split: usize,
    kind: GeometryKind,
    bounds: Rect,
    size_range: (f64, f64),
    malformed_rate: f64,
    crs: Option<Crs>,
}

impl Default for RandomGeometryBuilder {
    fn default() -> Self {
        Self {
            seed: 42,
            num_splits: 1,
            rows_per_split: 10,
            kind: GeometryKind::Point,
            bounds: Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 100.0, y: 100.0 }),
            size_range: (1.0, 10.0),
            malformed_rate: 0.0,
            crs: None,
        }
    }
}

impl RandomGeometryBuilder {
    /// Creates a new `RandomGeometryBuilder` with default values.
    ///
    /// Default configuration:
    /// - seed: 42 (for deterministic results)
    /// - num_splits: 1
    /// - rows_per_split: 10
    /// - geometry_kind: Point
    /// - bounds: (0,0) to (100,100)
    /// - size_range: 1.0 to 10.0
    /// - malformed_rate: 0.0
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the random seed. The same seed always produces the same collection.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn num_splits(mut self, num_splits: usize) -> Self {
        self.num_splits = num_splits;
        self
    }

    pub fn rows_per_split(mut self, rows_per_split: usize) -> Self {
        self.rows_per_split = rows_per_split;
        self
    }

    pub fn geometry_kind(mut self, kind: GeometryKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the spatial bounds. Polygons and lines are generated so that they
    /// fit entirely inside the bounds.
    pub fn bounds(mut self, bounds: Rect) -> Self {
        self.bounds = bounds;
        self
    }

    /// Range of the half size of polygons and lines. Unused for points.
    pub fn size_range(mut self, size_range: (f64, f64)) -> Self {
        self.size_range = size_range;
        self
    }

    /// Fraction of records replaced by empty geometries (0.0 to 1.0)
    pub fn malformed_rate(mut self, malformed_rate: f64) -> Self {
        self.malformed_rate = malformed_rate;
        self
    }

    pub fn crs(mut self, crs: Option<Crs>) -> Self {
        self.crs = crs;
        self
    }

    /// Generates the collection as a list of splits
    pub fn build(self) -> Vec<Vec<Arc<SpatialGeometry>>> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut next_id = 0u64;

        (0..self.num_splits)
            .map(|_| {
                (0..self.rows_per_split)
                    .map(|_| {
                        let id = next_id;
                        next_id += 1;
                        let geometry = if rng.gen::<f64>() < self.malformed_rate {
                            Geometry::MultiPoint(MultiPoint(vec![]))
                        } else {
                            generate_random_geometry(
                                &mut rng,
                                self.kind,
                                &self.bounds,
                                self.size_range,
                            )
                        };
                        Arc::new(
                            SpatialGeometry::new(id, geometry)
                                .with_crs(self.crs.clone())
                                .with_user_data(format!("row {id}")),
                        )
                    })
                    .collect()
            })
            .collect()
    }
}

/// Regular lattice of points with coordinates `0..n` on both axes
///
/// Point (x, y) has identity `y * n + x`.
pub fn lattice_points(n: usize) -> Vec<Arc<SpatialGeometry>> {
    (0..n)
        .flat_map(|y| (0..n).map(move |x| (x, y)))
        .map(|(x, y)| {
            Arc::new(SpatialGeometry::new(
                (y * n + x) as u64,
                Point::new(x as f64, y as f64),
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_generated_geometries_within_bounds(
        #[values(GeometryKind::Point, GeometryKind::Polygon, GeometryKind::LineString)]
        kind: GeometryKind,
    ) {
        let bounds = Rect::new(Coord { x: 10.0, y: 10.0 }, Coord { x: 90.0, y: 90.0 });
        let splits = RandomGeometryBuilder::new()
            .num_splits(3)
            .rows_per_split(50)
            .geometry_kind(kind)
            .bounds(bounds)
            .build();

        assert_eq!(splits.len(), 3);
        for geom in splits.iter().flatten() {
            let env = geom.envelope().unwrap();
            assert!(env.min_x() >= 10.0 && env.max_x() <= 90.0);
            assert!(env.min_y() >= 10.0 && env.max_y() <= 90.0);
        }
    }

    #[test]
    fn test_unique_sequential_ids() {
        let splits = RandomGeometryBuilder::new()
            .num_splits(4)
            .rows_per_split(25)
            .build();
        let ids: Vec<u64> = splits.iter().flatten().map(|g| g.id().0).collect();
        assert_eq!(ids, (0..100).collect::<Vec<_>>());
        assert_eq!(splits[1][0].user_data(), Some("row 25"));
    }

    #[test]
    fn test_deterministic() {
        let a = RandomGeometryBuilder::new()
            .seed(7)
            .geometry_kind(GeometryKind::Polygon)
            .rows_per_split(100)
            .build();
        let b = RandomGeometryBuilder::new()
            .seed(7)
            .geometry_kind(GeometryKind::Polygon)
            .rows_per_split(100)
            .build();
        let c = RandomGeometryBuilder::new()
            .seed(8)
            .geometry_kind(GeometryKind::Polygon)
            .rows_per_split(100)
            .build();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_malformed_rate() {
        let splits = RandomGeometryBuilder::new()
            .rows_per_split(1000)
            .malformed_rate(0.25)
            .build();
        let malformed = splits[0].iter().filter(|g| !g.is_valid()).count();
        assert!(malformed > 150 && malformed < 350, "{malformed}");

        let none = RandomGeometryBuilder::new().rows_per_split(100).build();
        assert!(none[0].iter().all(|g| g.is_valid()));
    }

    #[test]
    fn test_lattice_points() {
        let points = lattice_points(3);
        assert_eq!(points.len(), 9);
        assert_eq!(points[5].id().0, 5);
        assert_eq!(
            points[5].geometry(),
            &Geometry::Point(Point::new(2.0, 1.0))
        );
    }
}
