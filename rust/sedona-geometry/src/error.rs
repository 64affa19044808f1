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
use sedona_common::SedonaError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SedonaGeometryError {
    #[error("{0}")]
    Invalid(String),
    #[error("invalid envelope [{min_x}, {min_y}, {max_x}, {max_y}]")]
    InvalidEnvelope {
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
    },
    #[error("{0}")]
    External(Box<dyn std::error::Error + Send + Sync>),
    #[error("Unknown geometry error")]
    Unknown,
}

impl From<SedonaGeometryError> for SedonaError {
    fn from(value: SedonaGeometryError) -> Self {
        SedonaError::Geometry(value.to_string())
    }
}
