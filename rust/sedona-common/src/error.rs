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

//! Error taxonomy shared by the sampling, partitioning, indexing and query stages.
//!
//! Every error names the stage that produced it so that callers can report
//! where a spatial operation failed without inspecting the message text.

use datafusion_common::DataFusionError;
use thiserror::Error;

/// Result type used throughout the spatial operator crates
pub type Result<T, E = SedonaError> = std::result::Result<T, E>;

/// Top level error for spatial operations
#[derive(Error, Debug)]
pub enum SedonaError {
    #[error("sampling failed: {0}")]
    Sampler(#[from] SamplerError),
    #[error("partitioning failed: {0}")]
    Partitioner(#[from] PartitionerError),
    #[error("indexing failed: {0}")]
    Index(#[from] IndexError),
    #[error("query failed: {0}")]
    Query(#[from] QueryError),
    #[error("geometry error: {0}")]
    Geometry(String),
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("{0}")]
    Internal(String),
}

impl SedonaError {
    /// Name of the stage that failed
    pub fn stage(&self) -> &'static str {
        match self {
            SedonaError::Sampler(_) => "sampling",
            SedonaError::Partitioner(_) => "partitioning",
            SedonaError::Index(_) => "indexing",
            SedonaError::Query(_) => "querying",
            SedonaError::Geometry(_) => "geometry",
            SedonaError::Configuration(_) => "configuration",
            SedonaError::Internal(_) => "internal",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SamplerError {
    #[error("invalid parameter {name} = {value}")]
    InvalidParameter { name: &'static str, value: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PartitionerError {
    /// No partition boundaries are available to assign geometries to
    #[error("no partition boundaries to assign geometries to")]
    EmptyInput,
    /// All sampled envelopes collapse to a single point
    #[error("sample extent is a single point, cannot build {num_partitions} grid partitions")]
    DegenerateBounds { num_partitions: usize },
    #[error("invalid parameter {name} = {value}")]
    InvalidParameter { name: &'static str, value: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexError {
    /// Every input geometry was malformed
    #[error("cannot build index: {reason} ({skipped} malformed geometries skipped)")]
    BuildFailed { skipped: usize, reason: String },
    #[error("invalid parameter {name} = {value}")]
    InvalidParameter { name: &'static str, value: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("k must be positive, got {0}")]
    InvalidK(i64),
    /// Two inputs of a query use different coordinate reference systems
    #[error("mismatched coordinate reference systems: {left} vs {right}")]
    MismatchedReferenceFrame { left: String, right: String },
    /// The two sides of a join were partitioned differently
    #[error("both join sides must share the same spatial partitioning")]
    PartitioningMismatch,
}

impl From<SedonaError> for DataFusionError {
    fn from(value: SedonaError) -> Self {
        match value {
            SedonaError::Configuration(msg) => DataFusionError::Configuration(msg),
            other => DataFusionError::External(Box::new(other)),
        }
    }
}

impl From<DataFusionError> for SedonaError {
    fn from(value: DataFusionError) -> Self {
        match value {
            DataFusionError::Configuration(msg) => SedonaError::Configuration(msg),
            other => SedonaError::Internal(other.to_string()),
        }
    }
}

/// Macro to create Sedona Internal Error. These errors are never expected to
/// surface and indicate a bug in the spatial operator code.
#[macro_export]
macro_rules! sedona_internal_err {
    ($($args:expr),*) => {{
        let msg = std::format!(
            "SedonaDB internal error: {}.\nThis issue was likely caused by a bug in SedonaDB's code. \
            Please help us to resolve this by filing a bug report in our issue tracker: \
            https://github.com/apache/sedona-db/issues",
            std::format!($($args),*),
        );
        Err($crate::error::SedonaError::Internal(msg))
    }};
}
