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

//! Uniform grid partitioning.

use sedona_common::{PartitionerError, Result};
use sedona_geometry::envelope::Envelope;

use crate::partitioning::equal_cuts;

/// Subdivide `extent` into a roughly square grid of at most `num_partitions`
/// cells
///
/// The grid has `floor(sqrt(n))` columns and `floor(n / columns)` rows. When
/// the extent has zero width (or height) all cells are laid out along the
/// other axis. Cell ids are assigned row by row from the south-west corner.
pub fn build(extent: &Envelope, num_partitions: usize) -> Result<Vec<Envelope>> {
    if num_partitions > 1 && extent.is_point() {
        return Err(PartitionerError::DegenerateBounds { num_partitions }.into());
    }
    let num_partitions = num_partitions.max(1);

    let (nx, ny) = if extent.width() == 0.0 {
        (1, num_partitions)
    } else if extent.height() == 0.0 {
        (num_partitions, 1)
    } else {
        let nx = ((num_partitions as f64).sqrt().floor() as usize).max(1);
        (nx, num_partitions / nx)
    };

    let x_cuts = equal_cuts(extent.min_x(), extent.max_x(), nx);
    let y_cuts = equal_cuts(extent.min_y(), extent.max_y(), ny);

    let mut cells = Vec::with_capacity(nx * ny);
    for (y0, y1) in &y_cuts {
        for (x0, x1) in &x_cuts {
            cells.push(Envelope::try_new(*x0, *y0, *x1, *y1)?);
        }
    }
    Ok(cells)
}
