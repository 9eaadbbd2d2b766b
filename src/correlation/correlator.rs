// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! All the baselines of a backend together.

use itertools::Itertools;
use log::{debug, error, info, trace};

use super::{CorrelationChannel, CorrelationError};
use crate::{
    backend::{AcquisitionBackend, OverflowStatus},
    calibration::{
        CableCalibration, CalibrationApplyError, FrequencyBinCalibration, TimeDomainCalibration,
    },
    geometry::Baseline,
    time_domain::{TimeDomainConfig, TimeDomainCorrelation, TimeDomainCorrelator, TimeDomainWindow},
};

/// Owns an [`AcquisitionBackend`], and a [`CorrelationChannel`] for each of
/// its baselines. Baselines are all unique channel pairs in ascending order,
/// the same as [`crate::AntennaArray::baselines`].
pub struct Correlator {
    backend: Box<dyn AcquisitionBackend>,
    baselines: Vec<Baseline>,
    channels: Vec<CorrelationChannel>,
    time_domain: TimeDomainCorrelator,

    /// The last time-domain window fetched.
    window: Option<TimeDomainWindow>,
}

impl Correlator {
    pub fn new(
        backend: Box<dyn AcquisitionBackend>,
        time_domain_config: TimeDomainConfig,
    ) -> Result<Correlator, CorrelationError> {
        let num_channels = backend.num_channels();
        if num_channels < 2 {
            return Err(CorrelationError::TooFewChannels { got: num_channels });
        }
        let num_bins = backend.num_bins();
        if num_bins == 0 {
            return Err(CorrelationError::NoBins);
        }

        let (f_start, f_stop) = backend.band();
        let baselines: Vec<Baseline> = (0..num_channels)
            .tuple_combinations()
            .map(|(i, j)| Baseline { i, j })
            .collect();
        let channels = baselines
            .iter()
            .map(|&bl| CorrelationChannel::new(bl, f_start, f_stop, num_bins))
            .collect();
        let time_domain = TimeDomainCorrelator::new(baselines.clone(), time_domain_config)?;
        debug!(
            "Correlating {} baselines of {num_bins} bins over [{f_start}, {f_stop}) Hz",
            baselines.len()
        );

        Ok(Correlator {
            backend,
            baselines,
            channels,
            time_domain,
            window: None,
        })
    }

    pub fn num_channels(&self) -> usize {
        self.backend.num_channels()
    }

    pub fn baselines(&self) -> &[Baseline] {
        &self.baselines
    }

    pub fn channels(&self) -> &[CorrelationChannel] {
        &self.channels
    }

    pub fn channel(&self, baseline: Baseline) -> Option<&CorrelationChannel> {
        self.channels.iter().find(|c| c.baseline() == baseline)
    }

    /// \[Hz\]
    pub fn band(&self) -> (f64, f64) {
        self.backend.band()
    }

    pub fn time_domain_correlator(&self) -> &TimeDomainCorrelator {
        &self.time_domain
    }

    pub fn backend_mut(&mut self) -> &mut dyn AcquisitionBackend {
        self.backend.as_mut()
    }

    /// Replace the spectra of all baselines. Overflows are reported, then
    /// cleared; they don't stop anything.
    pub fn fetch_crosses(&mut self) -> Result<(), CorrelationError> {
        let spectra = self.backend.fetch_crosses(&self.baselines)?;
        if spectra.len() != self.channels.len() {
            return Err(CorrelationError::SpectrumCount {
                expected: self.channels.len(),
                got: spectra.len(),
            });
        }
        for (channel, spectrum) in self.channels.iter_mut().zip(spectra) {
            channel.update(spectrum)?;
        }
        trace!("Fetched {} cross spectra", self.channels.len());

        self.check_overflow()?;
        Ok(())
    }

    /// Replace the stored time-domain window.
    pub fn fetch_time_domain_window(&mut self) -> Result<(), CorrelationError> {
        let window = self.backend.fetch_time_domain_window()?;
        trace!(
            "Fetched a time-domain window of {} samples from {} channels",
            window.len(),
            window.num_channels()
        );
        self.window = Some(window);
        self.check_overflow()?;
        Ok(())
    }

    pub fn time_domain_window(&self) -> Option<&TimeDomainWindow> {
        self.window.as_ref()
    }

    /// Correlate all baselines of the last fetched time-domain window.
    pub fn time_domain_correlations(&self) -> Result<Vec<TimeDomainCorrelation>, CorrelationError> {
        let window = self.window.as_ref().ok_or(CorrelationError::NoWindow)?;
        self.time_domain.correlate(window)
    }

    fn check_overflow(&mut self) -> Result<OverflowStatus, CorrelationError> {
        let status = self.backend.overflow_status()?;
        if status.any() {
            if status.adc {
                error!("ADC overflow; the input signal clipped");
            }
            if status.accumulator {
                error!("Accumulator overflow");
            }
            if status.fft {
                error!("FFT overflow; consider a different shift schedule");
            }
            self.backend.clear_overflow()?;
        }
        Ok(status)
    }

    /// Use a phase table to calibrate every baseline. Every baseline must be
    /// in the table; if not, no baseline is calibrated.
    pub fn apply_frequency_bin_calibration(
        &mut self,
        calibration: &FrequencyBinCalibration,
    ) -> Result<(), CalibrationApplyError> {
        let mut tables = Vec::with_capacity(self.baselines.len());
        for &baseline in &self.baselines {
            let phases = calibration.phases.get(&baseline).ok_or(
                CalibrationApplyError::MissingBaseline {
                    kind: "frequency bin",
                    baseline,
                },
            )?;
            if phases.len() != calibration.axis.len() {
                return Err(CalibrationApplyError::PhaseLength {
                    baseline,
                    expected: calibration.axis.len(),
                    got: phases.len(),
                });
            }
            tables.push(phases);
        }
        if calibration.axis.is_empty() {
            return Err(CorrelationError::EmptyCalibration.into());
        }

        for (channel, phases) in self.channels.iter_mut().zip(tables) {
            channel.apply_bin_calibration(&calibration.axis, phases)?;
        }
        info!(
            "Applied a frequency bin calibration with {} frequencies",
            calibration.axis.len()
        );
        Ok(())
    }

    /// Calibrate out the cables of every channel, in both the frequency and
    /// time domains. Every channel must have a cable; if not, nothing is
    /// calibrated.
    pub fn apply_cable_calibration(
        &mut self,
        calibration: &CableCalibration,
    ) -> Result<(), CalibrationApplyError> {
        let mut cables = Vec::with_capacity(self.baselines.len());
        for &baseline in &self.baselines {
            let i = calibration
                .cables
                .get(&baseline.i)
                .ok_or(CalibrationApplyError::MissingChannel(baseline.i))?;
            let j = calibration
                .cables
                .get(&baseline.j)
                .ok_or(CalibrationApplyError::MissingChannel(baseline.j))?;
            i.delay()?;
            j.delay()?;
            cables.push((i, j));
        }

        let mut delays = Vec::with_capacity(cables.len());
        for (channel, (i, j)) in self.channels.iter_mut().zip(cables) {
            channel.apply_cable_calibration(
                i.length,
                i.velocity_factor,
                j.length,
                j.velocity_factor,
            )?;
            delays.push(channel.cable_delay());
        }
        self.time_domain.set_cable_delays(delays)?;
        info!("Applied a cable calibration");
        Ok(())
    }

    /// Use per-baseline delays to calibrate time-domain correlations. Every
    /// baseline must be present; if not, nothing is calibrated.
    pub fn set_time_domain_calibration(
        &mut self,
        calibration: &TimeDomainCalibration,
    ) -> Result<(), CalibrationApplyError> {
        let offsets = self
            .baselines
            .iter()
            .map(|&baseline| {
                calibration
                    .offsets
                    .get(&baseline)
                    .copied()
                    .map(Some)
                    .ok_or(CalibrationApplyError::MissingBaseline {
                        kind: "time-domain",
                        baseline,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.time_domain.set_calibration(offsets)?;
        info!("Applied a time-domain calibration");
        Ok(())
    }

    /// Forget all calibrations.
    pub fn clear_calibration(&mut self) -> Result<(), CorrelationError> {
        for channel in &mut self.channels {
            channel.clear_calibration();
        }
        let n = self.baselines.len();
        self.time_domain.set_calibration(vec![None; n])?;
        self.time_domain.set_cable_delays(vec![None; n])?;
        Ok(())
    }

    /// The phase of every baseline at `freq` \[Hz\], in baseline order. Each is
    /// the phase of the bin nearest `freq`; see
    /// [`CorrelationChannel::phase_at_frequency`].
    pub fn visibilities_at_frequency(&self, freq: f64) -> Vec<f64> {
        self.channels
            .iter()
            .map(|c| c.phase_at_frequency(freq))
            .collect()
    }

    /// The centre frequency of the strongest bin (ignoring DC) on the
    /// baseline at `baseline_index`, restricted to `[f_start, f_stop)`.
    pub fn strongest_frequency_in_range(
        &self,
        baseline_index: usize,
        f_start: f64,
        f_stop: f64,
    ) -> Result<f64, CorrelationError> {
        let channel = self
            .channels
            .get(baseline_index)
            .ok_or(CorrelationError::UnknownBaselineIndex(baseline_index))?;
        channel
            .strongest_frequency_in_range(f_start, f_stop)
            .ok_or(CorrelationError::EmptyFrequencyRange { f_start, f_stop })
    }
}
