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
use geo::{Intersects, Relate};
use sedona_geometry::envelope::Envelope;
use sedona_geometry::geometry::SpatialGeometry;
use serde::{Deserialize, Serialize};

/// Spatial relation evaluated between two geometries.
///
/// Predicates are directional: `evaluate(a, b)` answers "does `a` <relation> `b`".
/// Evaluation runs in two phases. The envelope filter rejects pairs whose
/// envelopes cannot satisfy the relation, and only survivors are handed to the
/// exact test provided by the `geo` crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpatialPredicate {
    Intersects,
    Contains,
    Within,
    CoveredBy,
}

impl SpatialPredicate {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "intersects" | "st_intersects" => Some(SpatialPredicate::Intersects),
            "contains" | "st_contains" => Some(SpatialPredicate::Contains),
            "within" | "st_within" => Some(SpatialPredicate::Within),
            "coveredby" | "covered_by" | "st_coveredby" | "st_covered_by" => {
                Some(SpatialPredicate::CoveredBy)
            }
            _ => None,
        }
    }

    /// Envelope filter: false only if no pair of geometries with these
    /// envelopes can satisfy the predicate
    pub fn envelope_filter(&self, a: &Envelope, b: &Envelope) -> bool {
        match self {
            SpatialPredicate::Intersects => a.intersects(b),
            SpatialPredicate::Contains => a.contains(b),
            SpatialPredicate::Within | SpatialPredicate::CoveredBy => a.within(b),
        }
    }

    /// Exact evaluation of `a <predicate> b`
    ///
    /// Geometries without an envelope (empty or malformed) never match.
    pub fn evaluate(&self, a: &SpatialGeometry, b: &SpatialGeometry) -> bool {
        let (Some(env_a), Some(env_b)) = (a.envelope(), b.envelope()) else {
            return false;
        };
        if !self.envelope_filter(env_a, env_b) {
            return false;
        }

        let (geom_a, geom_b) = (a.geometry(), b.geometry());
        match self {
            SpatialPredicate::Intersects => geom_a.intersects(geom_b),
            SpatialPredicate::Contains => geom_a.relate(geom_b).is_contains(),
            SpatialPredicate::Within => geom_a.relate(geom_b).is_within(),
            SpatialPredicate::CoveredBy => geom_a.relate(geom_b).is_coveredby(),
        }
    }
}

impl std::fmt::Display for SpatialPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpatialPredicate::Intersects => write!(f, "intersects"),
            SpatialPredicate::Contains => write!(f, "contains"),
            SpatialPredicate::Within => write!(f, "within"),
            SpatialPredicate::CoveredBy => write!(f, "coveredby"),
        }
    }
}
