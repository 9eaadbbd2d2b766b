// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Per-baseline cross spectra and their calibration.
//!
//! Calibration corrections are phases (radians) with the same sign convention
//! as the spectra; a positive correction means channel `j` is artificially
//! delayed relative to channel `i`. Corrections are removed from each newly
//! fetched spectrum by multiplying by `conj(exp(i * correction))`. Spectra
//! that have already been stored are never recalibrated.

mod correlator;
mod error;

pub use correlator::Correlator;
pub use error::CorrelationError;

use log::debug;

use crate::{
    backend::AcquisitionBackend,
    c64,
    constants::{TAU, VEL_C},
    geometry::Baseline,
    math::{argmax, cexp},
};

/// The complex frequency bins of one baseline over `[f_start, f_stop)`.
#[derive(Debug, Clone)]
pub struct CorrelationSpectrum {
    pub values: Vec<c64>,

    /// The centre frequency of the first (DC) bin \[Hz\].
    pub f_start: f64,

    /// \[Hz\]
    pub f_stop: f64,
}

impl CorrelationSpectrum {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// \[Hz\]
    pub fn bin_width(&self) -> f64 {
        (self.f_stop - self.f_start) / self.values.len() as f64
    }

    /// The centre frequency of bin `k` \[Hz\].
    pub fn bin_frequency(&self, k: usize) -> f64 {
        self.f_start + (self.f_stop - self.f_start) * k as f64 / self.values.len() as f64
    }

    /// The centre frequencies of all bins \[Hz\].
    pub fn frequencies(&self) -> Vec<f64> {
        (0..self.values.len())
            .map(|k| self.bin_frequency(k))
            .collect()
    }

    /// The index of the bin with the centre nearest to `freq` \[Hz\]. The
    /// result is always a valid index; frequencies outside `[f_start, f_stop)`
    /// map to an edge bin, which is only meaningful for in-band input.
    pub fn bin_index(&self, freq: f64) -> usize {
        let k = ((freq - self.f_start) / self.bin_width()).round() as usize;
        k.min(self.values.len().saturating_sub(1))
    }
}

/// The cross spectrum of a single baseline, and the calibration to be removed
/// from it.
#[derive(Debug, Clone)]
pub struct CorrelationChannel {
    baseline: Baseline,
    spectrum: CorrelationSpectrum,

    /// A phase correction per bin.
    bin_calibration: Option<Vec<f64>>,

    /// The extra delay of channel `j`'s cable over channel `i`'s \[seconds\].
    cable_delay: Option<f64>,
}

impl CorrelationChannel {
    /// A new channel, with all bins zero until a spectrum is fetched.
    pub fn new(baseline: Baseline, f_start: f64, f_stop: f64, num_bins: usize) -> CorrelationChannel {
        CorrelationChannel {
            baseline,
            spectrum: CorrelationSpectrum {
                values: vec![c64::default(); num_bins],
                f_start,
                f_stop,
            },
            bin_calibration: None,
            cable_delay: None,
        }
    }

    pub fn baseline(&self) -> Baseline {
        self.baseline
    }

    pub fn spectrum(&self) -> &CorrelationSpectrum {
        &self.spectrum
    }

    pub fn bin_calibration(&self) -> Option<&[f64]> {
        self.bin_calibration.as_deref()
    }

    /// \[seconds\]
    pub fn cable_delay(&self) -> Option<f64> {
        self.cable_delay
    }

    /// Arm the backend for this baseline and replace the stored spectrum with
    /// the one it delivers. This blocks for as long as the backend does.
    pub fn fetch(&mut self, backend: &mut dyn AcquisitionBackend) -> Result<(), CorrelationError> {
        backend.arm(self.baseline)?;
        let raw = backend.fetch_cross(self.baseline)?;
        self.update(raw)
    }

    /// Replace the stored spectrum with a raw (uncalibrated) one. Any
    /// calibration is removed before it's stored.
    pub fn update(&mut self, mut raw: Vec<c64>) -> Result<(), CorrelationError> {
        if raw.len() != self.spectrum.len() {
            return Err(CorrelationError::SpectrumLength {
                baseline: self.baseline,
                expected: self.spectrum.len(),
                got: raw.len(),
            });
        }

        if self.bin_calibration.is_some() || self.cable_delay.is_some() {
            for (k, v) in raw.iter_mut().enumerate() {
                *v *= cexp(self.correction(k)).conj();
            }
        }
        self.spectrum.values = raw;
        Ok(())
    }

    /// The total phase correction at bin `k` \[radians\].
    pub fn correction(&self, k: usize) -> f64 {
        let bin = self.bin_calibration.as_ref().map_or(0.0, |c| c[k]);
        let cable = self
            .cable_delay
            .map_or(0.0, |t| TAU * t * self.spectrum.bin_frequency(k));
        bin + cable
    }

    /// Use a table of phases \[radians\] at the given frequencies \[Hz\] as a
    /// calibration. Each bin takes the phase of the nearest table frequency;
    /// there's no interpolation, so a coarse table gives a coarse
    /// calibration.
    pub fn apply_bin_calibration(
        &mut self,
        frequencies: &[f64],
        phases: &[f64],
    ) -> Result<(), CorrelationError> {
        if frequencies.len() != phases.len() {
            return Err(CorrelationError::CalibrationLength {
                frequencies: frequencies.len(),
                phases: phases.len(),
            });
        }
        if frequencies.is_empty() {
            return Err(CorrelationError::EmptyCalibration);
        }

        let corrections = (0..self.spectrum.len())
            .map(|k| {
                let centre = self.spectrum.bin_frequency(k);
                let mut nearest = 0;
                for (i, &f) in frequencies.iter().enumerate() {
                    if (f - centre).abs() < (frequencies[nearest] - centre).abs() {
                        nearest = i;
                    }
                }
                phases[nearest]
            })
            .collect();
        debug!(
            "Baseline {}: applying a {}-point bin calibration",
            self.baseline,
            frequencies.len()
        );
        self.bin_calibration = Some(corrections);
        Ok(())
    }

    /// Calibrate out the cables of this baseline's two channels. The delay
    /// of a cable is `length / (c * velocity_factor)`, and the phase
    /// correction at frequency `f` is `2 pi (t_j - t_i) f`.
    pub fn apply_cable_calibration(
        &mut self,
        length_i: f64,
        velocity_factor_i: f64,
        length_j: f64,
        velocity_factor_j: f64,
    ) -> Result<(), CorrelationError> {
        let t_i = cable_delay(length_i, velocity_factor_i)?;
        let t_j = cable_delay(length_j, velocity_factor_j)?;
        debug!(
            "Baseline {}: cable delay difference {} ns",
            self.baseline,
            (t_j - t_i) * 1e9
        );
        self.cable_delay = Some(t_j - t_i);
        Ok(())
    }

    /// Forget all calibration. The stored spectrum is unchanged.
    pub fn clear_calibration(&mut self) {
        self.bin_calibration = None;
        self.cable_delay = None;
    }

    /// The (calibrated) phase of the bin nearest `freq` \[Hz\]. Frequencies in
    /// the top half of the last bin use the last bin. Out-of-band frequencies
    /// give the phase of an edge bin. A channel without bins has no phase
    /// (NaN).
    pub fn phase_at_frequency(&self, freq: f64) -> f64 {
        self.spectrum
            .values
            .get(self.spectrum.bin_index(freq))
            .map_or(f64::NAN, |v| v.arg())
    }

    /// The centre frequency of the strongest bin, ignoring the DC bin.
    /// `None` is returned if there are no other bins.
    pub fn strongest_frequency(&self) -> Option<f64> {
        self.strongest_frequency_in_range(f64::NEG_INFINITY, f64::INFINITY)
    }

    /// The centre frequency of the strongest bin with a centre in `[f_start,
    /// f_stop)`, ignoring the DC bin. `None` is returned if there are no such
    /// bins.
    pub fn strongest_frequency_in_range(&self, f_start: f64, f_stop: f64) -> Option<f64> {
        let magnitudes = self.spectrum.values.iter().enumerate().map(|(k, v)| {
            let f = self.spectrum.bin_frequency(k);
            if k == 0 || f < f_start || f >= f_stop {
                f64::NAN
            } else {
                v.norm()
            }
        });
        argmax(magnitudes).map(|k| self.spectrum.bin_frequency(k))
    }
}

/// The signal delay through a cable \[seconds\].
pub(crate) fn cable_delay(length: f64, velocity_factor: f64) -> Result<f64, CorrelationError> {
    if !length.is_finite()
        || length < 0.0
        || !velocity_factor.is_finite()
        || velocity_factor <= 0.0
    {
        return Err(CorrelationError::BadCable {
            length,
            velocity_factor,
        });
    }
    Ok(length / (VEL_C * velocity_factor))
}
