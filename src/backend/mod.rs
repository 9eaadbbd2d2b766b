// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Sources of correlated data.
//!
//! Anything that can supply cross spectra and time-domain windows implements
//! [`AcquisitionBackend`]. There are two implementations; a real device
//! adapter ([`DeviceBackend`]) and a synthetic signal generator
//! ([`SignalGenerator`]).

mod device;
mod error;
mod simulator;
#[cfg(test)]
mod tests;

pub use device::{ControlRegister, DeviceBackend, DeviceClient, DeviceConfig};
pub use error::BackendError;
pub use simulator::{SignalGenerator, SignalGeneratorConfig, SimulatedSource};

use crate::{c64, geometry::Baseline, time_domain::TimeDomainWindow};

/// Overflow conditions latched by an acquisition backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverflowStatus {
    /// An ADC input clipped.
    pub adc: bool,

    /// An accumulator overflowed.
    pub accumulator: bool,

    /// An FFT stage overflowed.
    pub fft: bool,
}

impl OverflowStatus {
    pub fn any(&self) -> bool {
        self.adc || self.accumulator || self.fft
    }
}

/// The capabilities needed of anything supplying data to a
/// [`crate::Correlator`]. All calls may block (e.g. while waiting on a
/// hardware trigger); any timeout policy belongs to the implementor.
///
/// Cross spectra for a baseline `(i, j)` are `X_i * conj(X_j)`, so their
/// argument is the delay-phase of `j` minus that of `i`. Spectra cover
/// `[band().0, band().1)` with [`AcquisitionBackend::num_bins`] bins.
pub trait AcquisitionBackend {
    /// The number of channels (antennas) this backend digitises.
    fn num_channels(&self) -> usize;

    /// The digitiser sample rate \[Hz\].
    fn sample_rate(&self) -> f64;

    /// The lower (inclusive) and upper (exclusive) frequency of the cross
    /// spectra \[Hz\].
    fn band(&self) -> (f64, f64);

    /// The number of frequency bins in each cross spectrum.
    fn num_bins(&self) -> usize;

    /// Prepare the backend to capture a baseline's cross spectrum.
    fn arm(&mut self, baseline: Baseline) -> Result<(), BackendError>;

    /// Get an armed baseline's cross spectrum.
    fn fetch_cross(&mut self, baseline: Baseline) -> Result<Vec<c64>, BackendError>;

    /// Get the cross spectra of many baselines, in the same order as the
    /// supplied baselines. By default every baseline is armed before any is
    /// fetched.
    fn fetch_crosses(&mut self, baselines: &[Baseline]) -> Result<Vec<Vec<c64>>, BackendError> {
        for &baseline in baselines {
            self.arm(baseline)?;
        }
        baselines
            .iter()
            .map(|&baseline| self.fetch_cross(baseline))
            .collect()
    }

    /// Capture a window of samples from every channel.
    fn fetch_time_domain_window(&mut self) -> Result<TimeDomainWindow, BackendError>;

    /// Query the overflow latches.
    fn overflow_status(&mut self) -> Result<OverflowStatus, BackendError>;

    /// Reset the overflow latches.
    fn clear_overflow(&mut self) -> Result<(), BackendError>;
}
