// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Time-domain cross correlation of baselines, for finding the delays of
//! impulsive signals to a fraction of a sample.


use log::trace;
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    constants::{DEFAULT_MAX_WINDOW_LENGTH, DEFAULT_TIME_DOMAIN_PADDING, DEFAULT_UPSAMPLE_FACTOR},
    correlation::CorrelationError,
    geometry::Baseline,
    math::{argmax, correlate_valid, resample},
};

/// A window of real samples from every channel, all taken at the same sample
/// rate. The first dimension is channel, the second is sample.
#[derive(Debug, Clone)]
pub struct TimeDomainWindow {
    samples: Array2<f64>,
    sample_rate: f64,
}

impl TimeDomainWindow {
    pub fn new(samples: Array2<f64>, sample_rate: f64) -> TimeDomainWindow {
        TimeDomainWindow {
            samples,
            sample_rate,
        }
    }

    pub fn num_channels(&self) -> usize {
        self.samples.len_of(Axis(0))
    }

    /// The number of samples per channel.
    pub fn len(&self) -> usize {
        self.samples.len_of(Axis(1))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// \[Hz\]
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn samples(&self) -> ArrayView2<f64> {
        self.samples.view()
    }

    /// The first `len` samples of a channel, with their mean removed.
    fn dc_removed(&self, channel: usize, len: usize) -> Vec<f64> {
        let samples = self.samples.slice(s![channel, ..len]);
        let mean = samples.sum() / len as f64;
        samples.iter().map(|&s| s - mean).collect()
    }
}

/// Settings for time-domain correlation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeDomainConfig {
    /// Correlations are resampled by this factor.
    pub upsample_factor: usize,

    /// At most this many samples of each channel are correlated.
    pub max_window_length: usize,

    /// The number of zeros added to each side of the first channel of a
    /// baseline. This is also the largest delay that can be found \[samples\].
    pub padding: usize,
}

impl Default for TimeDomainConfig {
    fn default() -> Self {
        TimeDomainConfig {
            upsample_factor: DEFAULT_UPSAMPLE_FACTOR,
            max_window_length: DEFAULT_MAX_WINDOW_LENGTH,
            padding: DEFAULT_TIME_DOMAIN_PADDING,
        }
    }
}

/// The upsampled cross correlation of a baseline. `times[k]` is the delay of
/// channel `j` relative to channel `i` that `values[k]` corresponds to
/// \[seconds\]; a positive time means `j` is later.
#[derive(Debug, Clone)]
pub struct TimeDomainCorrelation {
    pub baseline: Baseline,
    pub values: Vec<f64>,
    pub times: Vec<f64>,
}

impl TimeDomainCorrelation {
    pub fn peak_index(&self) -> Option<usize> {
        argmax(self.values.iter().copied())
    }

    /// The time of the largest correlation value \[seconds\].
    pub fn peak_delay(&self) -> Option<f64> {
        self.peak_index().map(|i| self.times[i])
    }
}

/// Cross correlates the channels of a [`TimeDomainWindow`] for a fixed set of
/// baselines.
#[derive(Debug, Clone)]
pub struct TimeDomainCorrelator {
    config: TimeDomainConfig,
    baselines: Vec<Baseline>,

    /// Time offsets from a time-domain calibration, one per baseline.
    calibration: Vec<Option<f64>>,

    /// Time offsets from a cable calibration, one per baseline.
    cable_delays: Vec<Option<f64>>,
}

impl TimeDomainCorrelator {
    pub fn new(
        baselines: Vec<Baseline>,
        config: TimeDomainConfig,
    ) -> Result<TimeDomainCorrelator, CorrelationError> {
        if config.upsample_factor == 0 {
            return Err(CorrelationError::InvalidTimeDomainConfig(
                "the upsample factor must be at least 1",
            ));
        }
        if config.max_window_length == 0 {
            return Err(CorrelationError::InvalidTimeDomainConfig(
                "the maximum window length must be at least 1",
            ));
        }

        let n = baselines.len();
        Ok(TimeDomainCorrelator {
            config,
            baselines,
            calibration: vec![None; n],
            cable_delays: vec![None; n],
        })
    }

    pub fn config(&self) -> &TimeDomainConfig {
        &self.config
    }

    pub fn baselines(&self) -> &[Baseline] {
        &self.baselines
    }

    /// Set the time-domain calibration offsets \[seconds\], one per baseline
    /// in baseline order.
    pub fn set_calibration(&mut self, offsets: Vec<Option<f64>>) -> Result<(), CorrelationError> {
        if offsets.len() != self.baselines.len() {
            return Err(CorrelationError::OffsetCount {
                expected: self.baselines.len(),
                got: offsets.len(),
            });
        }
        self.calibration = offsets;
        Ok(())
    }

    /// Set the cable delays \[seconds\], one per baseline in baseline order.
    pub fn set_cable_delays(&mut self, delays: Vec<Option<f64>>) -> Result<(), CorrelationError> {
        if delays.len() != self.baselines.len() {
            return Err(CorrelationError::OffsetCount {
                expected: self.baselines.len(),
                got: delays.len(),
            });
        }
        self.cable_delays = delays;
        Ok(())
    }

    /// The total time offset subtracted from a baseline's time axis, if any
    /// calibration has been set for it.
    pub fn offset(&self, index: usize) -> Option<f64> {
        match (self.calibration[index], self.cable_delays[index]) {
            (None, None) => None,
            (a, b) => Some(a.unwrap_or(0.0) + b.unwrap_or(0.0)),
        }
    }

    /// Correlate every baseline of the window, in baseline order.
    pub fn correlate(
        &self,
        window: &TimeDomainWindow,
    ) -> Result<Vec<TimeDomainCorrelation>, CorrelationError> {
        (0..self.baselines.len())
            .map(|index| self.correlate_baseline(window, index))
            .collect()
    }

    /// Correlate the baseline at `index` (into this correlator's baselines).
    pub fn correlate_baseline(
        &self,
        window: &TimeDomainWindow,
        index: usize,
    ) -> Result<TimeDomainCorrelation, CorrelationError> {
        let baseline = self.baselines[index];
        if window.is_empty() {
            return Err(CorrelationError::EmptyWindow);
        }
        if baseline.j >= window.num_channels() {
            return Err(CorrelationError::WindowChannels {
                baseline,
                num_channels: window.num_channels(),
            });
        }

        let len = self.config.max_window_length.min(window.len());
        let padding = self.config.padding;
        let mut padded = vec![0.0; len + 2 * padding];
        padded[padding..padding + len].copy_from_slice(&window.dc_removed(baseline.i, len));
        let other = window.dc_removed(baseline.j, len);

        // Element k of the valid correlation is the lag k - padding of channel
        // j behind channel i, negated. Reversing makes the axis ascend in delay.
        let mut correlation = correlate_valid(&padded, &other);
        correlation.reverse();

        let factor = self.config.upsample_factor;
        let values = resample(&correlation, correlation.len() * factor);
        let fs = window.sample_rate();
        let dt = 1.0 / (fs * factor as f64);
        let t0 = -(padding as f64) / fs - self.offset(index).unwrap_or(0.0);
        let times = (0..values.len()).map(|k| t0 + k as f64 * dt).collect();
        trace!(
            "Correlated baseline {baseline} over {len} samples ({} upsampled lags)",
            values.len()
        );

        Ok(TimeDomainCorrelation {
            baseline,
            values,
            times,
        })
    }
}
