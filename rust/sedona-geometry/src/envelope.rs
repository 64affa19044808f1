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
use geo_types::{Coord, Rect};
use serde::{Deserialize, Serialize};

use crate::error::SedonaGeometryError;

/// Axis-aligned bounding rectangle
///
/// An Envelope always satisfies `min_x <= max_x` and `min_y <= max_y` with
/// finite bounds. A point envelope (zero width and height) is valid. All
/// predicates use closed intervals: touching boundaries intersect, and a box
/// whose boundary touches the boundary of another box is still contained in it.
///
/// Envelopes serialize as the four-number record `[min_x, min_y, max_x, max_y]`
/// and the invariant is checked again when deserializing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "[f64; 4]", try_from = "[f64; 4]")]
pub struct Envelope {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl Envelope {
    /// Create an envelope, validating the bounds
    pub fn try_new(
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
    ) -> Result<Self, SedonaGeometryError> {
        let finite = [min_x, min_y, max_x, max_y].iter().all(|v| v.is_finite());
        if !finite || min_x > max_x || min_y > max_y {
            return Err(SedonaGeometryError::InvalidEnvelope {
                min_x,
                min_y,
                max_x,
                max_y,
            });
        }

        Ok(Self {
            min_x,
            min_y,
            max_x,
            max_y,
        })
    }

    /// Create an envelope from two corners in any order
    ///
    /// Returns `None` if any coordinate is not finite.
    pub fn from_corners(a: Coord<f64>, b: Coord<f64>) -> Option<Self> {
        Self::try_new(a.x.min(b.x), a.y.min(b.y), a.x.max(b.x), a.y.max(b.y)).ok()
    }

    /// The degenerate envelope of a single point
    pub fn from_point(x: f64, y: f64) -> Option<Self> {
        Self::try_new(x, y, x, y).ok()
    }

    /// Smallest envelope covering all of the given envelopes
    pub fn merge_all<'a>(envelopes: impl IntoIterator<Item = &'a Envelope>) -> Option<Self> {
        envelopes
            .into_iter()
            .fold(None, |acc: Option<Envelope>, env| match acc {
                Some(acc) => Some(acc.merge(env)),
                None => Some(*env),
            })
    }

    pub fn min_x(&self) -> f64 {
        self.min_x
    }

    pub fn min_y(&self) -> f64 {
        self.min_y
    }

    pub fn max_x(&self) -> f64 {
        self.max_x
    }

    pub fn max_y(&self) -> f64 {
        self.max_y
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> Coord<f64> {
        Coord {
            x: self.min_x + self.width() / 2.0,
            y: self.min_y + self.height() / 2.0,
        }
    }

    /// Returns true if this envelope has zero width and zero height
    pub fn is_point(&self) -> bool {
        self.min_x == self.max_x && self.min_y == self.max_y
    }

    /// Returns true if the two envelopes share at least one point
    pub fn intersects(&self, other: &Self) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// Returns true if `other` lies inside this envelope, boundary included
    pub fn contains(&self, other: &Self) -> bool {
        self.min_x <= other.min_x
            && self.max_x >= other.max_x
            && self.min_y <= other.min_y
            && self.max_y >= other.max_y
    }

    /// Returns true if this envelope lies inside `other`, boundary included
    pub fn within(&self, other: &Self) -> bool {
        other.contains(self)
    }

    pub fn contains_coord(&self, coord: &Coord<f64>) -> bool {
        coord.x >= self.min_x
            && coord.x <= self.max_x
            && coord.y >= self.min_y
            && coord.y <= self.max_y
    }

    /// The common area of two envelopes, or `None` if they are disjoint
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        if !self.intersects(other) {
            return None;
        }

        Some(Self {
            min_x: self.min_x.max(other.min_x),
            min_y: self.min_y.max(other.min_y),
            max_x: self.max_x.min(other.max_x),
            max_y: self.max_y.min(other.max_y),
        })
    }

    /// Area of the intersection, zero for disjoint or touching envelopes
    pub fn intersection_area(&self, other: &Self) -> f64 {
        self.intersection(other).map(|i| i.area()).unwrap_or(0.0)
    }

    /// Smallest envelope covering both envelopes
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Update this envelope to include the bounds of another
    pub fn expand_to_include(&mut self, other: &Self) {
        *self = self.merge(other);
    }

    /// Grow this envelope by `distance` on every side
    pub fn expand_by(&self, distance: f64) -> Self {
        let distance = distance.max(0.0);
        Self {
            min_x: self.min_x - distance,
            min_y: self.min_y - distance,
            max_x: self.max_x + distance,
            max_y: self.max_y + distance,
        }
    }

    /// Project this envelope into `extent`
    ///
    /// Each bound is clamped into the extent independently, so an envelope lying
    /// entirely outside the extent collapses onto the nearest extent edge or
    /// corner instead of vanishing.
    pub fn clamp_to(&self, extent: &Self) -> Self {
        Self {
            min_x: self.min_x.clamp(extent.min_x, extent.max_x),
            min_y: self.min_y.clamp(extent.min_y, extent.max_y),
            max_x: self.max_x.clamp(extent.min_x, extent.max_x),
            max_y: self.max_y.clamp(extent.min_y, extent.max_y),
        }
    }

    /// Minimum Euclidean distance between any two points of the envelopes
    pub fn distance(&self, other: &Self) -> f64 {
        let dx = (other.min_x - self.max_x).max(self.min_x - other.max_x).max(0.0);
        let dy = (other.min_y - self.max_y).max(self.min_y - other.max_y).max(0.0);
        dx.hypot(dy)
    }

    /// Minimum Euclidean distance from the point to this envelope
    ///
    /// This is a lower bound of the distance from the point to any geometry
    /// bounded by this envelope.
    pub fn distance_to_coord(&self, coord: &Coord<f64>) -> f64 {
        let dx = (self.min_x - coord.x).max(coord.x - self.max_x).max(0.0);
        let dy = (self.min_y - coord.y).max(coord.y - self.max_y).max(0.0);
        dx.hypot(dy)
    }

    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            Coord {
                x: self.min_x,
                y: self.min_y,
            },
            Coord {
                x: self.max_x,
                y: self.max_y,
            },
        )
    }
}

impl TryFrom<Rect<f64>> for Envelope {
    type Error = SedonaGeometryError;

    fn try_from(rect: Rect<f64>) -> Result<Self, Self::Error> {
        let (min, max) = (rect.min(), rect.max());
        Self::try_new(min.x, min.y, max.x, max.y)
    }
}

impl From<Envelope> for [f64; 4] {
    fn from(value: Envelope) -> Self {
        [value.min_x, value.min_y, value.max_x, value.max_y]
    }
}

impl TryFrom<[f64; 4]> for Envelope {
    type Error = SedonaGeometryError;

    fn try_from(value: [f64; 4]) -> Result<Self, Self::Error> {
        Self::try_new(value[0], value[1], value[2], value[3])
    }
}
