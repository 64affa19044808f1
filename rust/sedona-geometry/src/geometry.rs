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
use std::fmt::Display;

use geo::{BoundingRect, CoordsIter, Distance, Euclidean};
use geo_types::{Geometry, Point};
use serde::{Deserialize, Serialize};

use crate::crs::Crs;
use crate::envelope::Envelope;
use crate::error::SedonaGeometryError;
use crate::transform::{transform_geometry, CrsEngine, CrsTransform};

/// Stable identity of a geometry record
///
/// Identities survive partitioning and indexing unchanged and are what the
/// duplicate resolver compares to decide whether two matches are the same.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct GeometryId(pub u64);

impl Display for GeometryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for GeometryId {
    fn from(value: u64) -> Self {
        GeometryId(value)
    }
}

/// A geometry record: an immutable shape with its envelope, an optional
/// coordinate reference system and an optional user payload
///
/// The envelope is computed once at construction. It is `None` for empty
/// geometries and for geometries with non-finite coordinates; such records
/// are considered malformed and are skipped (and counted) by the
/// partitioning and indexing stages.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialGeometry {
    id: GeometryId,
    geometry: Geometry<f64>,
    envelope: Option<Envelope>,
    crs: Option<Crs>,
    user_data: Option<String>,
}

impl SpatialGeometry {
    pub fn new(id: impl Into<GeometryId>, geometry: impl Into<Geometry<f64>>) -> Self {
        let geometry = geometry.into();
        let envelope = compute_envelope(&geometry);
        Self {
            id: id.into(),
            geometry,
            envelope,
            crs: None,
            user_data: None,
        }
    }

    pub fn with_crs(mut self, crs: Option<Crs>) -> Self {
        self.crs = crs;
        self
    }

    pub fn with_user_data(mut self, user_data: impl Into<String>) -> Self {
        self.user_data = Some(user_data.into());
        self
    }

    pub fn id(&self) -> GeometryId {
        self.id
    }

    pub fn geometry(&self) -> &Geometry<f64> {
        &self.geometry
    }

    pub fn envelope(&self) -> Option<&Envelope> {
        self.envelope.as_ref()
    }

    pub fn crs(&self) -> Option<&Crs> {
        self.crs.as_ref()
    }

    pub fn user_data(&self) -> Option<&str> {
        self.user_data.as_deref()
    }

    /// Returns true if the geometry has a usable envelope
    pub fn is_valid(&self) -> bool {
        self.envelope.is_some()
    }

    /// Euclidean distance from `point` to the exact shape
    pub fn distance_to_point(&self, point: &Point<f64>) -> f64 {
        let point = Geometry::Point(*point);
        Euclidean.distance(&point, &self.geometry)
    }

    /// Reproject into `target` using a transform supplied by the caller
    ///
    /// The identity and payload are preserved and the envelope is recomputed
    /// from the transformed coordinates.
    pub fn transform(
        &self,
        trans: &dyn CrsTransform,
        target: Crs,
    ) -> Result<Self, SedonaGeometryError> {
        let geometry = transform_geometry(&self.geometry, trans)?;
        let envelope = compute_envelope(&geometry);
        Ok(Self {
            id: self.id,
            geometry,
            envelope,
            crs: Some(target),
            user_data: self.user_data.clone(),
        })
    }

    /// Reproject into `target` with a transform resolved by `engine`
    ///
    /// A geometry without a reference system is taken to already be in
    /// `target` and is only relabelled.
    pub fn to_crs(
        &self,
        engine: &dyn CrsEngine,
        target: &Crs,
    ) -> Result<Self, SedonaGeometryError> {
        let Some(source) = &self.crs else {
            return Ok(self.clone().with_crs(Some(target.clone())));
        };
        let trans = engine.get_transform_crs_to_crs(source, target)?;
        self.transform(trans.as_ref(), target.clone())
    }
}

impl AsRef<SpatialGeometry> for SpatialGeometry {
    fn as_ref(&self) -> &SpatialGeometry {
        self
    }
}

fn compute_envelope(geometry: &Geometry<f64>) -> Option<Envelope> {
    if !geometry
        .coords_iter()
        .all(|c| c.x.is_finite() && c.y.is_finite())
    {
        return None;
    }

    let rect = geometry.bounding_rect()?;
    Envelope::try_from(rect).ok()
}
