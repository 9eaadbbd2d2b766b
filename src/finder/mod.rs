// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Estimating the direction of a signal by matching measured visibilities
//! against a [`SteeringManifold`].
//!
//! A [`DirectionFinder`] is in one of two modes. In frequency mode, the
//! manifold holds phase differences at a frequency, and manifolds are cached
//! per frequency. In time mode, the manifold holds arrival-time differences.
//! Measured [`Visibilities`] must match the mode.
//!
//! Each search scans the whole grid once, starting from a little before the
//! last estimate; consecutive estimates tend to be close.

mod error;
mod manifold;
#[cfg(test)]
mod tests;

pub use error::DirectionFinderError;
pub use manifold::{ManifoldMode, SteeringManifold};

use std::{collections::HashMap, fmt::Display};

use chrono::{DateTime, Utc};
use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::{
    constants::{DEFAULT_NUM_ANGLES, SEARCH_BACKTRACK},
    correlation::Correlator,
    geometry::AntennaArray,
};

/// Settings for a [`DirectionFinder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectionFinderConfig {
    /// The number of angles in each steering manifold.
    pub num_angles: usize,

    /// The index of the baseline used to find the strongest signal.
    pub reference_baseline: usize,
}

impl Default for DirectionFinderConfig {
    fn default() -> Self {
        DirectionFinderConfig {
            num_angles: DEFAULT_NUM_ANGLES,
            reference_baseline: 0,
        }
    }
}

/// Measured values for every baseline, in baseline order.
#[derive(Debug, Clone, PartialEq)]
pub enum Visibilities {
    /// \[radians\]
    Phases(Vec<f64>),

    /// \[seconds\]
    Delays(Vec<f64>),
}

impl Visibilities {
    pub fn values(&self) -> &[f64] {
        match self {
            Visibilities::Phases(v) | Visibilities::Delays(v) => v,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Visibilities::Phases(_) => "phases",
            Visibilities::Delays(_) => "delays",
        }
    }
}

/// An estimated angle of arrival.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionEstimate {
    /// \[radians\], in [-pi, pi).
    pub angle: f64,

    /// The frequency the estimate was made at \[Hz\]. Time-domain estimates
    /// don't have one.
    pub frequency: Option<f64>,

    pub timestamp: DateTime<Utc>,
}

impl Display for DirectionEstimate {
    /// A line of a result log: `timestamp,frequency,angle`, or
    /// `timestamp,angle` without a frequency. Timestamps are UNIX seconds.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{:06},",
            self.timestamp.timestamp(),
            self.timestamp.timestamp_subsec_micros()
        )?;
        if let Some(freq) = self.frequency {
            write!(f, "{freq},")?;
        }
        write!(f, "{}", self.angle)
    }
}

/// Which manifold is being matched against.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ActiveManifold {
    /// The key of a cached frequency manifold.
    Frequency(u64),
    Time,
}

pub struct DirectionFinder {
    correlator: Correlator,
    array: AntennaArray,
    config: DirectionFinderConfig,

    /// Frequency manifolds, keyed by the bits of their frequency.
    manifolds: HashMap<u64, SteeringManifold>,
    time_manifold: Option<SteeringManifold>,
    active: Option<ActiveManifold>,

    /// The grid index of the last estimate.
    seed: Option<usize>,
}

impl DirectionFinder {
    pub fn new(
        correlator: Correlator,
        array: AntennaArray,
        config: DirectionFinderConfig,
    ) -> Result<DirectionFinder, DirectionFinderError> {
        if array.len() != correlator.num_channels() {
            return Err(DirectionFinderError::ArrayMismatch {
                antennas: array.len(),
                channels: correlator.num_channels(),
            });
        }
        if config.num_angles == 0 {
            return Err(DirectionFinderError::NoAngles);
        }
        if config.reference_baseline >= array.baselines().len() {
            return Err(DirectionFinderError::ReferenceBaseline {
                index: config.reference_baseline,
                num_baselines: array.baselines().len(),
            });
        }

        Ok(DirectionFinder {
            correlator,
            array,
            config,
            manifolds: HashMap::new(),
            time_manifold: None,
            active: None,
            seed: None,
        })
    }

    pub fn correlator(&self) -> &Correlator {
        &self.correlator
    }

    pub fn correlator_mut(&mut self) -> &mut Correlator {
        &mut self.correlator
    }

    pub fn array(&self) -> &AntennaArray {
        &self.array
    }

    pub fn config(&self) -> &DirectionFinderConfig {
        &self.config
    }

    /// The number of frequency manifolds built so far.
    pub fn num_cached_manifolds(&self) -> usize {
        self.manifolds.len()
    }

    /// The angle of the last estimate \[radians\].
    pub fn last_angle(&self) -> Option<f64> {
        let manifold = self.active_manifold()?;
        self.seed.map(|s| manifold.angles()[s])
    }

    /// Match against phase differences at `freq` \[Hz\]. The manifold is only
    /// built if this frequency hasn't been used before.
    pub fn set_frequency(&mut self, freq: f64) {
        let key = freq.to_bits();
        let array = &self.array;
        let num_angles = self.config.num_angles;
        self.manifolds.entry(key).or_insert_with(|| {
            debug!("Building a steering manifold for {freq} Hz");
            SteeringManifold::frequency(array, freq, num_angles)
        });
        self.active = Some(ActiveManifold::Frequency(key));
    }

    /// Match against arrival-time differences.
    pub fn set_time(&mut self) {
        if self.time_manifold.is_none() {
            debug!("Building a time-domain steering manifold");
            self.time_manifold = Some(SteeringManifold::time(&self.array, self.config.num_angles));
        }
        self.active = Some(ActiveManifold::Time);
    }

    pub fn active_manifold(&self) -> Option<&SteeringManifold> {
        match self.active? {
            ActiveManifold::Frequency(key) => self.manifolds.get(&key),
            ActiveManifold::Time => self.time_manifold.as_ref(),
        }
    }

    /// Find the angle \[radians\] of the manifold closest to the measured
    /// visibilities. The whole manifold is scanned, starting a little before
    /// the last estimate; the first of equally-close angles in scan order
    /// wins. The result is used as the start of the next search.
    pub fn find_closest_point(
        &mut self,
        measured: &Visibilities,
    ) -> Result<f64, DirectionFinderError> {
        let manifold = self
            .active_manifold()
            .ok_or(DirectionFinderError::NoManifold)?;
        match (manifold.mode(), measured) {
            (ManifoldMode::Frequency(_), Visibilities::Phases(_))
            | (ManifoldMode::Time, Visibilities::Delays(_)) => (),
            (mode, _) => {
                return Err(DirectionFinderError::ModeMismatch {
                    expected: mode.name(),
                    got: measured.name(),
                })
            }
        }
        let values = measured.values();
        if values.len() != self.array.baselines().len() {
            return Err(DirectionFinderError::VisibilityLength {
                expected: self.array.baselines().len(),
                got: values.len(),
            });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(DirectionFinderError::NonFiniteVisibilities);
        }

        let n = manifold.len();
        let start = match self.seed {
            Some(seed) => {
                let backtrack = (SEARCH_BACKTRACK / manifold.step()).round() as usize % n;
                (seed + n - backtrack) % n
            }
            None => 0,
        };
        let mut best_index = start;
        let mut best_distance = f64::INFINITY;
        for k in 0..n {
            let index = (start + k) % n;
            let distance = manifold.distance(index, values);
            if distance < best_distance {
                best_index = index;
                best_distance = distance;
            }
        }
        let angle = manifold.angles()[best_index];
        trace!("Closest angle is {angle} rad (distance {best_distance})");

        self.seed = Some(best_index);
        Ok(angle)
    }

    /// Fetch new spectra, find the strongest signal on the reference
    /// baseline within `[f_start, f_stop)` \[Hz\], and estimate its direction
    /// from the phases at that frequency.
    pub fn estimate_from_strongest_signal(
        &mut self,
        f_start: f64,
        f_stop: f64,
    ) -> Result<DirectionEstimate, DirectionFinderError> {
        if !(f_start < f_stop) {
            return Err(DirectionFinderError::BadFrequencyRange { f_start, f_stop });
        }
        self.correlator.fetch_crosses()?;
        let freq = self.correlator.strongest_frequency_in_range(
            self.config.reference_baseline,
            f_start,
            f_stop,
        )?;
        self.set_frequency(freq);
        let visibilities = Visibilities::Phases(self.correlator.visibilities_at_frequency(freq));
        let angle = self.find_closest_point(&visibilities)?;
        debug!("Signal at {freq} Hz is from {angle} rad");

        Ok(DirectionEstimate {
            angle,
            frequency: Some(freq),
            timestamp: Utc::now(),
        })
    }

    /// Fetch a new time-domain window, and estimate the direction of an
    /// impulse in it from the delays of every baseline.
    pub fn estimate_from_impulse(&mut self) -> Result<DirectionEstimate, DirectionFinderError> {
        self.correlator.fetch_time_domain_window()?;
        let delays = self
            .correlator
            .time_domain_correlations()?
            .iter()
            .map(|c| c.peak_delay().ok_or(DirectionFinderError::NoPeak(c.baseline)))
            .collect::<Result<Vec<_>, _>>()?;
        self.set_time();
        let angle = self.find_closest_point(&Visibilities::Delays(delays))?;
        debug!("Impulse is from {angle} rad");

        Ok(DirectionEstimate {
            angle,
            frequency: None,
            timestamp: Utc::now(),
        })
    }
}
