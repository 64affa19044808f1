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
use std::fmt::Debug;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use geo::MapCoords;
use geo_types::{Coord, Geometry};
use lru::LruCache;

use crate::crs::Crs;
use crate::error::SedonaGeometryError;

/// Represents a coordinate reference system (CRS) transformation engine.
///
/// The coordinate math is provided by an external projection library; this
/// crate only defines the hooks through which reprojection is requested.
pub trait CrsEngine: Debug + Send + Sync {
    fn get_transform_crs_to_crs(
        &self,
        from: &Crs,
        to: &Crs,
    ) -> Result<Arc<dyn CrsTransform>, SedonaGeometryError>;
}

/// Trait for transforming coordinates in a geometry from one CRS to another.
pub trait CrsTransform: Debug + Send + Sync {
    fn transform_coord(&self, coord: &mut (f64, f64)) -> Result<(), SedonaGeometryError>;
}

impl CrsTransform for Box<dyn CrsTransform> {
    fn transform_coord(&self, coord: &mut (f64, f64)) -> Result<(), SedonaGeometryError> {
        self.as_ref().transform_coord(coord)
    }
}

impl CrsTransform for Arc<dyn CrsTransform> {
    fn transform_coord(&self, coord: &mut (f64, f64)) -> Result<(), SedonaGeometryError> {
        self.as_ref().transform_coord(coord)
    }
}

/// Transform that leaves coordinates untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTransform;

impl CrsTransform for IdentityTransform {
    fn transform_coord(&self, _coord: &mut (f64, f64)) -> Result<(), SedonaGeometryError> {
        Ok(())
    }
}

/// Apply a transform to every coordinate of a geometry
pub fn transform_geometry(
    geometry: &Geometry<f64>,
    trans: &dyn CrsTransform,
) -> Result<Geometry<f64>, SedonaGeometryError> {
    geometry.try_map_coords(|coord: Coord<f64>| {
        let mut xy = (coord.x, coord.y);
        trans.transform_coord(&mut xy)?;
        Ok(Coord { x: xy.0, y: xy.1 })
    })
}

const DEFAULT_CACHE_SIZE: usize = 64;

/// A caching wrapper around any CRS transformation engine.
///
/// Uses LRU (Least Recently Used) eviction policy when the cache reaches its capacity.
/// Requests between equal reference systems never reach the wrapped engine.
#[derive(Debug)]
pub struct CachingCrsEngine<T: CrsEngine> {
    engine: T,
    cache: Mutex<LruCache<(Crs, Crs), Arc<dyn CrsTransform>>>,
}

impl<T: CrsEngine> CachingCrsEngine<T> {
    pub fn new(engine: T) -> Self {
        Self::with_cache_size(engine, DEFAULT_CACHE_SIZE)
    }

    pub fn with_cache_size(engine: T, cache_size: usize) -> Self {
        let cache_size = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            engine,
            cache: Mutex::new(LruCache::new(cache_size)),
        }
    }

    pub fn engine(&self) -> &T {
        &self.engine
    }
}

impl<T: CrsEngine> CrsEngine for CachingCrsEngine<T> {
    fn get_transform_crs_to_crs(
        &self,
        from: &Crs,
        to: &Crs,
    ) -> Result<Arc<dyn CrsTransform>, SedonaGeometryError> {
        if from == to {
            return Ok(Arc::new(IdentityTransform));
        }

        let key = (from.clone(), to.clone());
        {
            let mut cache = self
                .cache
                .lock()
                .map_err(|_| SedonaGeometryError::Invalid("CRS transform cache poisoned".into()))?;
            if let Some(trans) = cache.get(&key) {
                return Ok(Arc::clone(trans));
            }
        }

        log::debug!("Creating CRS transform {from} -> {to}");
        let trans = self.engine.get_transform_crs_to_crs(from, to)?;
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| SedonaGeometryError::Invalid("CRS transform cache poisoned".into()))?;
        cache.put(key, Arc::clone(&trans));
        Ok(trans)
    }
}
