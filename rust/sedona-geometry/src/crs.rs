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
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use sedona_common::{QueryError, Result as SedonaResult};
use serde::{Deserialize, Serialize};

use crate::error::SedonaGeometryError;

/// Coordinate reference system identified by an authority and a code
///
/// `EPSG:4326` and `OGC:CRS84` both describe longitude/latitude on WGS84 and
/// compare equal. Authorities compare case-insensitively.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Crs {
    authority: String,
    code: String,
}

impl Crs {
    pub fn new(authority: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            authority: authority.into().to_uppercase(),
            code: code.into(),
        }
    }

    pub fn epsg(code: u32) -> Self {
        Self::new("EPSG", code.to_string())
    }

    /// Longitude/latitude (OGC:CRS84)
    pub fn lnglat() -> Self {
        Self::new("OGC", "CRS84")
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn is_lnglat(&self) -> bool {
        (self.authority == "OGC" && self.code == "CRS84")
            || (self.authority == "EPSG" && self.code == "4326")
    }

    /// The SRID if the authority is EPSG (or the CRS is longitude/latitude)
    pub fn srid(&self) -> Option<u32> {
        if self.authority == "EPSG" {
            self.code.parse::<u32>().ok()
        } else if self.is_lnglat() {
            Some(4326)
        } else {
            None
        }
    }

    /// Validate that a code is likely to be an EPSG code (all numbers and not too long)
    fn is_epsg_code(code: &str) -> bool {
        !code.is_empty() && code.len() <= 9 && code.chars().all(|c| c.is_ascii_digit())
    }
}

impl PartialEq for Crs {
    fn eq(&self, other: &Self) -> bool {
        if self.is_lnglat() && other.is_lnglat() {
            return true;
        }

        self.authority == other.authority && self.code == other.code
    }
}

impl Eq for Crs {}

impl Hash for Crs {
    fn hash<H: Hasher>(&self, state: &mut H) {
        if self.is_lnglat() {
            "lnglat".hash(state);
        } else {
            self.authority.hash(state);
            self.code.hash(state);
        }
    }
}

impl Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.authority, self.code)
    }
}

impl FromStr for Crs {
    type Err = SedonaGeometryError;

    /// Parse `authority:code`, or a bare numeric EPSG code such as `3857`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.split_once(':') {
            Some((authority, code))
                if !authority.is_empty()
                    && !code.is_empty()
                    && authority.chars().all(|c| c.is_ascii_alphanumeric())
                    && code.chars().all(|c| c.is_ascii_alphanumeric()) =>
            {
                Ok(Self::new(authority, code))
            }
            None if Self::is_epsg_code(s) => Ok(Self::new("EPSG", s)),
            _ => Err(SedonaGeometryError::Invalid(format!(
                "Invalid CRS identifier '{s}', expected authority:code"
            ))),
        }
    }
}

impl TryFrom<String> for Crs {
    type Error = SedonaGeometryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Crs> for String {
    fn from(value: Crs) -> Self {
        value.to_string()
    }
}

/// Returns true if two optional reference systems describe the same frame
///
/// A missing CRS on either side is treated as matching anything, as the
/// coordinates are then assumed to already be in the other side's frame.
pub fn crs_compatible(lhs: Option<&Crs>, rhs: Option<&Crs>) -> bool {
    match (lhs, rhs) {
        (Some(lhs), Some(rhs)) => lhs == rhs,
        _ => true,
    }
}

/// Render an optional reference system for error messages
pub fn describe_crs(crs: Option<&Crs>) -> String {
    crs.map_or_else(|| "none".to_string(), Crs::to_string)
}

/// Fail with [`QueryError::MismatchedReferenceFrame`] unless both sides use
/// a compatible reference system (see [`crs_compatible`])
pub fn ensure_crs_compatible(lhs: Option<&Crs>, rhs: Option<&Crs>) -> SedonaResult<()> {
    if crs_compatible(lhs, rhs) {
        return Ok(());
    }
    Err(QueryError::MismatchedReferenceFrame {
        left: describe_crs(lhs),
        right: describe_crs(rhs),
    }
    .into())
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;
    use sedona_common::SedonaError;

    #[test]
    fn crs_lnglat_equivalence() {
        assert_eq!(Crs::epsg(4326), Crs::lnglat());
        assert_eq!(Crs::new("ogc", "CRS84"), Crs::lnglat());
        assert_ne!(Crs::epsg(3857), Crs::lnglat());
        assert_eq!(Crs::lnglat().srid(), Some(4326));
        assert_eq!(Crs::epsg(3857).srid(), Some(3857));
        assert_eq!(Crs::new("ESRI", "102003").srid(), None);
    }

    #[rstest]
    #[case("EPSG:4326", "EPSG:4326")]
    #[case("epsg:3857", "EPSG:3857")]
    #[case("3857", "EPSG:3857")]
    #[case(" OGC:CRS84 ", "OGC:CRS84")]
    fn crs_parse(#[case] input: &str, #[case] expected: &str) {
        let crs: Crs = input.parse().unwrap();
        assert_eq!(crs.to_string(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("EPSG:")]
    #[case(":4326")]
    #[case("EPSG:43:26")]
    #[case("not a crs")]
    #[case("1234567890")]
    fn crs_parse_invalid(#[case] input: &str) {
        assert!(input.parse::<Crs>().is_err());
    }

    #[test]
    fn crs_mismatch_error() {
        let wgs84 = Crs::epsg(4326);
        let mercator = Crs::epsg(3857);
        assert!(ensure_crs_compatible(None, Some(&mercator)).is_ok());
        assert!(ensure_crs_compatible(Some(&wgs84), None).is_ok());
        assert!(ensure_crs_compatible(Some(&wgs84), Some(&Crs::lnglat())).is_ok());

        let err = ensure_crs_compatible(Some(&wgs84), Some(&mercator)).unwrap_err();
        assert_eq!(err.stage(), "querying");
        let SedonaError::Query(QueryError::MismatchedReferenceFrame { left, right }) = err else {
            panic!("expected a reference frame mismatch");
        };
        assert_eq!((left.as_str(), right.as_str()), ("EPSG:4326", "EPSG:3857"));
        assert_eq!(describe_crs(None), "none");
    }

    #[test]
    fn crs_serde() {
        let json = serde_json::to_string(&Crs::epsg(32618)).unwrap();
        assert_eq!(json, "\"EPSG:32618\"");
        let parsed: Crs = serde_json::from_str("\"OGC:CRS84\"").unwrap();
        assert_eq!(parsed, Crs::epsg(4326));
        assert!(serde_json::from_str::<Crs>("\"???\"").is_err());
    }

    #[test]
    fn crs_compatibility() {
        let utm = Crs::epsg(32618);
        assert!(crs_compatible(None, None));
        assert!(crs_compatible(Some(&utm), None));
        assert!(crs_compatible(None, Some(&utm)));
        assert!(crs_compatible(Some(&Crs::epsg(4326)), Some(&Crs::lnglat())));
        assert!(!crs_compatible(Some(&utm), Some(&Crs::lnglat())));
    }
}
