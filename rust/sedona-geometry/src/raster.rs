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

//! Spatial predicates between a raster footprint and a geometry.
//!
//! Only the georeferencing of a raster is needed here: the affine transform
//! mapping pixel (column, row) to world coordinates, and the raster size.
//! Pixel values are never read.

use std::borrow::Cow;

use geo::{Intersects, Relate};
use geo_types::{Coord, Geometry, LineString, Polygon};
use sedona_common::Result;
use serde::{Deserialize, Serialize};

use crate::crs::{crs_compatible, ensure_crs_compatible, Crs};
use crate::envelope::Envelope;
use crate::geometry::SpatialGeometry;
use crate::transform::CrsEngine;

/// Affine georeferencing parameters of a raster
///
/// World coordinates of pixel corner (x, y) are
/// `wx = upper_left_x + x * scale_x + y * skew_x` and
/// `wy = upper_left_y + x * skew_y + y * scale_y`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub upper_left_x: f64,
    pub upper_left_y: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub skew_x: f64,
    pub skew_y: f64,
}

impl GeoTransform {
    /// A north-up transform without skew
    pub fn north_up(
        upper_left_x: f64,
        upper_left_y: f64,
        pixel_size_x: f64,
        pixel_size_y: f64,
    ) -> Self {
        Self {
            upper_left_x,
            upper_left_y,
            scale_x: pixel_size_x,
            scale_y: -pixel_size_y,
            skew_x: 0.0,
            skew_y: 0.0,
        }
    }

    pub fn to_world(&self, x: f64, y: f64) -> Coord<f64> {
        Coord {
            x: self.upper_left_x + x * self.scale_x + y * self.skew_x,
            y: self.upper_left_y + x * self.skew_y + y * self.scale_y,
        }
    }
}

/// The georeferenced footprint of a raster
#[derive(Debug, Clone, PartialEq)]
pub struct RasterExtent {
    width: usize,
    height: usize,
    transform: GeoTransform,
    crs: Option<Crs>,
}

impl RasterExtent {
    pub fn new(width: usize, height: usize, transform: GeoTransform) -> Self {
        Self {
            width,
            height,
            transform,
            crs: None,
        }
    }

    pub fn with_crs(mut self, crs: Option<Crs>) -> Self {
        self.crs = crs;
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn crs(&self) -> Option<&Crs> {
        self.crs.as_ref()
    }

    fn corners(&self) -> [Coord<f64>; 4] {
        let (w, h) = (self.width as f64, self.height as f64);
        [
            self.transform.to_world(0.0, 0.0),
            self.transform.to_world(w, 0.0),
            self.transform.to_world(w, h),
            self.transform.to_world(0.0, h),
        ]
    }

    /// Bounding envelope of the four raster corners
    pub fn envelope(&self) -> Option<Envelope> {
        let corners = self.corners();
        let first = Envelope::from_corners(corners[0], corners[2])?;
        let second = Envelope::from_corners(corners[1], corners[3])?;
        Some(first.merge(&second))
    }

    /// The raster footprint as a polygon (a parallelogram when skewed)
    pub fn footprint(&self) -> Polygon<f64> {
        let corners = self.corners();
        let ring = LineString::from(vec![
            corners[0], corners[1], corners[2], corners[3], corners[0],
        ]);
        Polygon::new(ring, vec![])
    }

    /// Bring `geometry` into the raster's reference frame
    ///
    /// A missing reference system on either side is treated as the same
    /// frame. Otherwise differing systems require an engine to resolve the
    /// transform.
    fn align<'a>(
        &self,
        geometry: &'a SpatialGeometry,
        engine: Option<&dyn CrsEngine>,
    ) -> Result<Cow<'a, Geometry<f64>>> {
        if crs_compatible(self.crs(), geometry.crs()) {
            return Ok(Cow::Borrowed(geometry.geometry()));
        }

        match (engine, &self.crs) {
            (Some(engine), Some(target)) => {
                let projected = geometry.to_crs(engine, target)?;
                Ok(Cow::Owned(projected.geometry().clone()))
            }
            _ => {
                ensure_crs_compatible(self.crs(), geometry.crs())?;
                Ok(Cow::Borrowed(geometry.geometry()))
            }
        }
    }

    /// True if the raster footprint and the geometry share any point
    pub fn rs_intersects(
        &self,
        geometry: &SpatialGeometry,
        engine: Option<&dyn CrsEngine>,
    ) -> Result<bool> {
        let geom = self.align(geometry, engine)?;
        Ok(self.footprint().intersects(geom.as_ref()))
    }

    /// True if the geometry lies inside the raster footprint, boundary included
    pub fn rs_contains(
        &self,
        geometry: &SpatialGeometry,
        engine: Option<&dyn CrsEngine>,
    ) -> Result<bool> {
        let geom = self.align(geometry, engine)?;
        let footprint = Geometry::Polygon(self.footprint());
        Ok(footprint.relate(geom.as_ref()).is_covers())
    }

    /// True if the raster footprint lies inside the geometry, boundary included
    pub fn rs_within(
        &self,
        geometry: &SpatialGeometry,
        engine: Option<&dyn CrsEngine>,
    ) -> Result<bool> {
        let geom = self.align(geometry, engine)?;
        let footprint = Geometry::Polygon(self.footprint());
        Ok(footprint.relate(geom.as_ref()).is_coveredby())
    }
}
