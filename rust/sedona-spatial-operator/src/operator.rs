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

pub mod join_query;
pub mod knn_query;
pub mod range_query;

pub use join_query::{JoinMatch, JoinQuery, JoinQueryResult};
pub use knn_query::{KnnMatch, KnnQuery, KnnQueryResult};
pub use range_query::{RangeMatch, RangeMatches, RangeQuery, RangeQueryResult};

/// Counters reported alongside query results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryMetrics {
    /// Matches of the envelope filter handed to the exact predicate or
    /// distance computation
    pub candidates: usize,
    /// Matches returned to the caller
    pub results: usize,
    /// Matches dropped because another partition reported them
    pub duplicates_removed: usize,
}
