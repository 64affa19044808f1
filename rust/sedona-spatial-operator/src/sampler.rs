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

//! Sampling of geometry envelopes for deriving partition boundaries.
//!
//! Each input split is sampled independently (and in parallel) and the
//! per-split samples are merged afterwards. Merging re-weights samples so the
//! result stays uniform over the combined population, which keeps sampling
//! free of shared mutable state.

use std::mem::size_of;
use std::sync::Arc;

use fastrand::Rng;
use rayon::prelude::*;
use sedona_common::option::SpatialPartitioningOptions;
use sedona_common::{Result, SamplerError};
use sedona_geometry::envelope::Envelope;
use sedona_geometry::geometry::SpatialGeometry;

/// Multi-stage envelope sampling for populations of unknown size.
///
/// # Purpose
///
/// Collects a representative sample of envelopes in a single pass, without
/// knowing the total count beforehand, while never holding more than
/// `max_samples` envelopes.
///
/// # Algorithm Stages
///
/// 1. **Filling the small reservoir** (k < min_samples): collect everything.
///
/// 2. **Small reservoir sampling** (min_samples ≤ k < min_samples / target_sampling_rate):
///    reservoir sampling keeps exactly min_samples samples while the sampling rate is still
///    above the target.
///
/// 3. **Bernoulli sampling** (|samples| < max_samples): the reservoir can no longer
///    guarantee the target sampling rate, so the sample grows by Bernoulli sampling at
///    the target rate.
///
/// 4. **Large reservoir sampling** (|samples| = max_samples): reservoir sampling keeps
///    exactly max_samples samples.
///
/// Every stage samples uniformly, so the result is a uniform sample of the population.
#[derive(Debug)]
pub struct EnvelopeSampler {
    min_samples: usize,
    max_samples: usize,
    target_sampling_rate: f64,

    /// The threshold count for switching from stage 2 to stage 3
    reservoir_sampling_max_count: usize,

    samples: Vec<Envelope>,
    population_count: usize,
    rng: Rng,
}

/// Samples collected by [`EnvelopeSampler`] or [`bernoulli_sample`]
#[derive(Debug, PartialEq, Clone, Default)]
pub struct EnvelopeSamples {
    samples: Vec<Envelope>,

    /// The size of population the samples were collected from
    population_count: usize,

    /// Records without an envelope that were not eligible for sampling
    skipped: usize,
}

impl EnvelopeSampler {
    /// Create a new [`EnvelopeSampler`]
    ///
    /// # Errors
    /// Returns an error if:
    /// - `min_samples` is 0
    /// - `max_samples` is less than `min_samples`
    /// - `target_sampling_rate` is not in the range (0, 1]
    pub fn try_new(
        min_samples: usize,
        max_samples: usize,
        target_sampling_rate: f64,
        seed: u64,
    ) -> Result<Self> {
        if min_samples == 0 {
            return Err(invalid_parameter("min_samples", min_samples));
        }
        if max_samples < min_samples {
            return Err(invalid_parameter("max_samples", max_samples));
        }
        if !(target_sampling_rate > 0.0 && target_sampling_rate <= 1.0) {
            return Err(invalid_parameter(
                "target_sampling_rate",
                target_sampling_rate,
            ));
        }

        let reservoir_sampling_max_count = (min_samples as f64 / target_sampling_rate) as usize;

        Ok(Self {
            min_samples,
            max_samples,
            target_sampling_rate,
            reservoir_sampling_max_count,
            samples: Vec::with_capacity(min_samples),
            population_count: 0,
            rng: Rng::with_seed(seed),
        })
    }

    /// Add an envelope and update the samples using the multi-stage sampling algorithm
    pub fn add_envelope(&mut self, envelope: &Envelope) {
        self.population_count += 1;

        if self.samples.len() < self.min_samples {
            // Stage 1
            self.samples.push(*envelope);
        } else if self.population_count <= self.reservoir_sampling_max_count {
            // Stage 2
            let index = self.rng.usize(..self.population_count);
            if index < self.min_samples {
                self.samples[index] = *envelope;
            }
        } else if self.samples.len() < self.max_samples {
            // Stage 3
            if self.rng.f64() < self.target_sampling_rate {
                self.samples.push(*envelope);
            }
        } else {
            // Stage 4
            let index = self.rng.usize(..self.population_count);
            if index < self.max_samples {
                self.samples[index] = *envelope;
            }
        }
    }

    /// Estimate the maximum amount memory used by this sampler
    pub fn estimate_maximum_memory_usage(&self) -> usize {
        self.max_samples * size_of::<Envelope>()
    }

    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }

    /// Consume the sampler and return the collected samples
    pub fn into_samples(self) -> EnvelopeSamples {
        EnvelopeSamples {
            samples: self.samples,
            population_count: self.population_count,
            skipped: 0,
        }
    }
}

impl EnvelopeSamples {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn samples(&self) -> &[Envelope] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Size of the population
    pub fn population_count(&self) -> usize {
        self.population_count
    }

    /// Number of records that had no envelope
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Actual sampling rate
    pub fn sampling_rate(&self) -> f64 {
        if self.population_count() == 0 {
            0.0
        } else {
            self.samples.len() as f64 / self.population_count() as f64
        }
    }

    /// Smallest envelope covering every sample
    pub fn extent(&self) -> Option<Envelope> {
        Envelope::merge_all(&self.samples)
    }

    /// Combine 2 samples into one. The combined samples remain uniformly sampled from the
    /// combined population.
    pub fn combine(self, other: EnvelopeSamples, rng: &mut Rng) -> EnvelopeSamples {
        let skipped = self.skipped + other.skipped;
        if self.population_count() == 0 {
            return EnvelopeSamples { skipped, ..other };
        }
        if other.population_count() == 0 {
            return EnvelopeSamples { skipped, ..self };
        }

        let self_sampling_rate = self.sampling_rate();
        let other_sampling_rate = other.sampling_rate();
        if self_sampling_rate > other_sampling_rate {
            return other.combine(self, rng);
        }
        if other_sampling_rate <= 0.0 {
            return EnvelopeSamples {
                samples: Vec::new(),
                population_count: self.population_count() + other.population_count(),
                skipped,
            };
        }

        // self has the smaller sampling rate. Subsample other so that both
        // sides have the same sampling rate.
        let subsampling_rate = self_sampling_rate / other_sampling_rate;
        let mut samples = self.samples;
        for envelope in other.samples {
            if rng.f64() < subsampling_rate {
                samples.push(envelope);
            }
        }
        EnvelopeSamples {
            samples,
            population_count: self.population_count + other.population_count,
            skipped,
        }
    }

    /// Reduce the sample to at most `max_samples` envelopes chosen uniformly
    pub fn truncate(mut self, max_samples: usize, rng: &mut Rng) -> EnvelopeSamples {
        if self.samples.len() > max_samples {
            rng.shuffle(&mut self.samples);
            self.samples.truncate(max_samples);
        }
        self
    }
}

/// Keep each envelope independently with probability `fraction`
pub fn bernoulli_sample<'a>(
    envelopes: impl IntoIterator<Item = &'a Envelope>,
    fraction: f64,
    seed: u64,
) -> EnvelopeSamples {
    let mut rng = Rng::with_seed(seed);
    let mut samples = EnvelopeSamples::empty();
    for envelope in envelopes {
        samples.population_count += 1;
        if fraction >= 1.0 || rng.f64() < fraction {
            samples.samples.push(*envelope);
        }
    }
    samples
}

/// Default number of envelopes to sample from a collection of `total` records
///
/// Small collections are sampled completely. Larger ones are sampled at 1%
/// but never below two samples per partition, and never above `max_samples`.
pub fn default_sample_size(total: usize, num_partitions: usize, max_samples: usize) -> usize {
    let size = if total < 1000 {
        total
    } else {
        (2 * num_partitions).max(total / 100)
    };
    size.min(max_samples).min(total)
}

/// Sampling configuration, usually derived from [`SpatialPartitioningOptions`]
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerConfig {
    pub min_samples: usize,
    pub max_samples: usize,
    pub target_sampling_rate: f64,
    pub seed: u64,
}

impl From<&SpatialPartitioningOptions> for SamplerConfig {
    fn from(options: &SpatialPartitioningOptions) -> Self {
        Self {
            min_samples: options.min_sample_size.min(options.max_sample_size).max(1),
            max_samples: options.max_sample_size.max(1),
            target_sampling_rate: options.target_sampling_rate,
            seed: options.random_seed as u64,
        }
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        (&SpatialPartitioningOptions::default()).into()
    }
}

/// Sample the envelopes of a split collection of geometries
///
/// When `sample_size` is known the per-split samples are Bernoulli samples at
/// fraction `min(1, sample_size / population)`. Otherwise each split runs an
/// [`EnvelopeSampler`]. Either way the merged result holds at most
/// `sample_size` (or `max_samples`) envelopes. Geometries without an envelope
/// are not eligible and are reported through [`EnvelopeSamples::skipped`].
pub fn sample_splits(
    splits: &[Vec<Arc<SpatialGeometry>>],
    sample_size: Option<usize>,
    config: &SamplerConfig,
) -> Result<EnvelopeSamples> {
    let population: usize = splits.iter().map(Vec::len).sum();
    let fraction = sample_size.map(|size| {
        if population == 0 {
            1.0
        } else {
            (size as f64 / population as f64).min(1.0)
        }
    });

    let per_split = splits
        .par_iter()
        .enumerate()
        .map(|(split_idx, split)| {
            let seed = config.seed.wrapping_add(split_idx as u64);
            let skipped = split.iter().filter(|g| g.envelope().is_none()).count();
            let envelopes = split.iter().filter_map(|g| g.envelope());
            let samples = match fraction {
                Some(fraction) => bernoulli_sample(envelopes, fraction, seed),
                None => {
                    let mut sampler = EnvelopeSampler::try_new(
                        config.min_samples,
                        config.max_samples,
                        config.target_sampling_rate,
                        seed,
                    )?;
                    log::trace!(
                        "Sampling split {split_idx} in one pass, holding up to {} bytes",
                        sampler.estimate_maximum_memory_usage()
                    );
                    for envelope in envelopes {
                        sampler.add_envelope(envelope);
                    }
                    sampler.into_samples()
                }
            };
            Ok(EnvelopeSamples { skipped, ..samples })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut rng = Rng::with_seed(config.seed);
    let combined = per_split
        .into_iter()
        .fold(EnvelopeSamples::empty(), |acc, samples| acc.combine(samples, &mut rng));
    let limit = sample_size.unwrap_or(config.max_samples);

    log::debug!(
        "Sampled {} of {} envelopes from {} splits ({} skipped)",
        combined.len().min(limit),
        combined.population_count(),
        splits.len(),
        combined.skipped()
    );
    Ok(combined.truncate(limit, &mut rng))
}

fn invalid_parameter(name: &'static str, value: impl ToString) -> sedona_common::SedonaError {
    SamplerError::InvalidParameter {
        name,
        value: value.to_string(),
    }
    .into()
}
