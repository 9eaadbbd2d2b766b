// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A synthetic acquisition backend.
//!
//! Each channel carries the same tone, shifted in (delay-)phase and scaled
//! per channel, plus independent Gaussian noise. Samples are quantised like
//! an ADC would, transformed with an FFT of `samples` points and quantised
//! again, then cross multiplied and accumulated.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use itertools::Itertools;
use log::{debug, trace};
use ndarray::prelude::*;
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Normal};
use rustfft::{Fft, FftPlanner};
use serde::{Deserialize, Serialize};

use super::{AcquisitionBackend, BackendError, OverflowStatus};
use crate::{
    c64,
    constants::{DEFAULT_NUM_CHANNELS, DEFAULT_SAMPLE_RATE, SIMULATED_NOISE_STDDEV, TAU},
    geometry::{AntennaArray, Baseline},
    time_domain::TimeDomainWindow,
};

/// The width of simulated impulses \[samples\].
const PULSE_WIDTH: f64 = 3.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalGeneratorConfig {
    pub num_channels: usize,

    /// \[Hz\]
    pub sample_rate: f64,

    /// The tone frequency as a fraction of the sample rate. This should be
    /// less than 0.5.
    pub tone_freq: f64,

    /// The power of the tone's FFT bin over the mean power of a noise bin.
    pub snr: f64,

    /// The delay-phase of the tone on each channel \[radians\]. If empty,
    /// all phases are zero.
    pub phase_shifts: Vec<f64>,

    /// The amplitude of the tone on each channel relative to the others. If
    /// empty, all scales are one.
    pub amplitude_scales: Vec<f64>,

    /// The number of bits of the simulated ADC.
    pub bits: u32,

    /// The number of samples per FFT. Spectra have half this many bins.
    pub samples: usize,

    /// The number of bits that FFT outputs are quantised to.
    pub fft_bits: u32,

    /// The number of spectra accumulated per fetch.
    pub accumulations: usize,

    /// The standard deviation of the noise on each channel (full scale is
    /// 1).
    pub noise_stddev: f64,

    /// The peak of simulated impulses (full scale is 1).
    pub impulse_amplitude: f64,

    /// Seed the noise generator for reproducible output.
    pub seed: Option<u64>,
}

impl Default for SignalGeneratorConfig {
    fn default() -> Self {
        SignalGeneratorConfig {
            num_channels: DEFAULT_NUM_CHANNELS,
            sample_rate: DEFAULT_SAMPLE_RATE,
            tone_freq: 0.25,
            snr: 0.1,
            phase_shifts: vec![],
            amplitude_scales: vec![],
            bits: 8,
            samples: 2048,
            fft_bits: 18,
            accumulations: 1,
            noise_stddev: SIMULATED_NOISE_STDDEV,
            impulse_amplitude: 0.9,
            seed: None,
        }
    }
}

/// A plane wave arriving at an array.
#[derive(Debug, Clone)]
pub struct SimulatedSource {
    pub array: AntennaArray,

    /// \[radians\]
    pub angle: f64,
}

/// Simulates an array of antennas fed into a correlator.
pub struct SignalGenerator {
    config: SignalGeneratorConfig,
    rng: StdRng,
    noise: Normal<f64>,
    fft: Arc<dyn Fft<f64>>,
    baselines: Vec<Baseline>,

    /// \[radians\]
    phases: Vec<f64>,
    amplitudes: Vec<f64>,

    /// The delay of an impulse on each channel \[seconds\].
    delays: Vec<f64>,

    source: Option<SimulatedSource>,
    armed: HashSet<Baseline>,

    /// The integration that armed baselines are fetched from.
    pending: Option<HashMap<Baseline, Vec<c64>>>,

    overflow: OverflowStatus,
}

impl SignalGenerator {
    pub fn new(config: SignalGeneratorConfig) -> Result<SignalGenerator, BackendError> {
        let n = config.num_channels;
        if n < 2 {
            return Err(BackendError::TooFewChannels(n));
        }
        if config.samples < 2 || config.samples % 2 != 0 {
            return Err(BackendError::BadSampleCount(config.samples));
        }
        if !(config.tone_freq > 0.0 && config.tone_freq < 0.5) {
            return Err(BackendError::BadToneFrequency(config.tone_freq));
        }
        if !config.snr.is_finite() || config.snr < 0.0 {
            return Err(BackendError::BadSnr(config.snr));
        }
        for bits in [config.bits, config.fft_bits] {
            if !(1..=32).contains(&bits) {
                return Err(BackendError::BadBitDepth(bits));
            }
        }
        if config.accumulations == 0 {
            return Err(BackendError::NoAccumulations);
        }
        for (what, values) in [
            ("phase shifts", &config.phase_shifts),
            ("amplitude scales", &config.amplitude_scales),
        ] {
            if !values.is_empty() && values.len() != n {
                return Err(BackendError::ChannelCountMismatch {
                    what,
                    got: values.len(),
                    num_channels: n,
                });
            }
        }
        if !config.noise_stddev.is_finite() || config.noise_stddev < 0.0 {
            return Err(BackendError::BadNoise(config.noise_stddev));
        }
        let noise = Normal::new(0.0, config.noise_stddev)
            .map_err(|_| BackendError::BadNoise(config.noise_stddev))?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let fft = FftPlanner::new().plan_fft_forward(config.samples);

        let phases = if config.phase_shifts.is_empty() {
            vec![0.0; n]
        } else {
            config.phase_shifts.clone()
        };
        let amplitudes = if config.amplitude_scales.is_empty() {
            vec![1.0; n]
        } else {
            config.amplitude_scales.clone()
        };
        let tone_hz = config.tone_freq * config.sample_rate;
        let delays = phases.iter().map(|p| p / (TAU * tone_hz)).collect();
        debug!(
            "Simulating {n} channels with a {} MHz tone at SNR {}",
            tone_hz / 1e6,
            config.snr
        );

        Ok(SignalGenerator {
            baselines: (0..n)
                .tuple_combinations()
                .map(|(i, j)| Baseline { i, j })
                .collect(),
            config,
            rng,
            noise,
            fft,
            phases,
            amplitudes,
            delays,
            source: None,
            armed: HashSet::new(),
            pending: None,
            overflow: OverflowStatus::default(),
        })
    }

    /// Simulate a plane wave arriving at an array from `angle` \[radians\]
    /// instead of using the configured phase shifts. The array must have as
    /// many antennas as there are channels.
    pub fn with_source(
        mut self,
        array: AntennaArray,
        angle: f64,
    ) -> Result<SignalGenerator, BackendError> {
        if array.len() != self.config.num_channels {
            return Err(BackendError::SourceArrayMismatch {
                got: array.len(),
                num_channels: self.config.num_channels,
            });
        }
        let tone_hz = self.tone_frequency();
        self.phases = array
            .antennas()
            .iter()
            .map(|a| a.phase_at_angle(angle, tone_hz))
            .collect();
        self.delays = array
            .antennas()
            .iter()
            .map(|a| a.delay_at_angle(angle))
            .collect();
        debug!("Simulated source is at {angle} rad");
        self.source = Some(SimulatedSource { array, angle });
        Ok(self)
    }

    pub fn config(&self) -> &SignalGeneratorConfig {
        &self.config
    }

    pub fn source(&self) -> Option<&SimulatedSource> {
        self.source.as_ref()
    }

    /// The delay-phases of the tone on each channel \[radians\].
    pub fn phases(&self) -> &[f64] {
        &self.phases
    }

    /// \[Hz\]
    pub fn tone_frequency(&self) -> f64 {
        self.config.tone_freq * self.config.sample_rate
    }

    /// The index of the spectrum bin nearest to the tone.
    pub fn tone_bin(&self) -> usize {
        (self.config.tone_freq * self.config.samples as f64).round() as usize
    }

    /// The amplitude of the tone on a channel with unit amplitude scale,
    /// chosen so that its FFT bin has `snr` times the power of a noise bin.
    fn tone_amplitude(&self) -> f64 {
        2.0 * self.config.noise_stddev * (self.config.snr / self.config.samples as f64).sqrt()
    }

    /// Run `n` integrations of a baseline, returning the phase of the tone
    /// bin summed over all integrations so far after each one.
    pub fn accumulated_phases(
        &mut self,
        baseline: Baseline,
        n: usize,
    ) -> Result<Vec<f64>, BackendError> {
        let bin = self.tone_bin();
        let mut sum = c64::default();
        let mut phases = Vec::with_capacity(n);
        for _ in 0..n {
            self.arm(baseline)?;
            sum += self.fetch_cross(baseline)?[bin];
            phases.push(sum.arg());
        }
        Ok(phases)
    }

    /// Quantise a value to `bits`, with full scale being [-1, 1]. The flag is
    /// set if the value clipped.
    fn quantise(value: f64, bits: u32) -> (f64, bool) {
        let levels = (1_u64 << (bits - 1)) as f64;
        let q = (value * levels).round() / levels;
        if q > 1.0 {
            (1.0, true)
        } else if q < -1.0 {
            (-1.0, true)
        } else {
            (q, false)
        }
    }

    /// One spectrum per channel, each of `samples / 2` bins.
    fn channel_spectra(&mut self) -> Vec<Vec<c64>> {
        let n = self.config.samples;
        let omega = TAU * self.config.tone_freq;
        let amplitude = self.tone_amplitude();
        let norm = 1.0 / n as f64;

        let mut spectra = Vec::with_capacity(self.config.num_channels);
        for channel in 0..self.config.num_channels {
            let a = amplitude * self.amplitudes[channel];
            let phase = self.phases[channel];
            let mut buffer: Vec<c64> = (0..n)
                .map(|t| {
                    let v = a * (omega * t as f64 - phase).sin() + self.noise.sample(&mut self.rng);
                    let (q, clipped) = Self::quantise(v, self.config.bits);
                    self.overflow.adc |= clipped;
                    c64::new(q, 0.0)
                })
                .collect();
            self.fft.process(&mut buffer);

            buffer.truncate(n / 2);
            for v in buffer.iter_mut() {
                let (re, clipped_re) = Self::quantise(v.re * norm, self.config.fft_bits);
                let (im, clipped_im) = Self::quantise(v.im * norm, self.config.fft_bits);
                self.overflow.fft |= clipped_re || clipped_im;
                *v = c64::new(re, im);
            }
            spectra.push(buffer);
        }
        spectra
    }

    /// Accumulate the cross spectra of every baseline.
    fn integrate(&mut self) -> HashMap<Baseline, Vec<c64>> {
        let num_bins = self.num_bins();
        let mut crosses = vec![vec![c64::default(); num_bins]; self.baselines.len()];
        for _ in 0..self.config.accumulations {
            let spectra = self.channel_spectra();
            for (cross, bl) in crosses.iter_mut().zip(self.baselines.iter()) {
                for ((c, x_i), x_j) in cross.iter_mut().zip(&spectra[bl.i]).zip(&spectra[bl.j]) {
                    *c += x_i * x_j.conj();
                }
            }
        }
        trace!("Integrated {} spectra", self.config.accumulations);
        self.baselines.iter().copied().zip(crosses).collect()
    }

    /// A smooth impulse, centred on zero \[samples\].
    fn pulse(x: f64) -> f64 {
        (-(x / PULSE_WIDTH).powi(2)).exp()
    }

    fn check_baseline(&self, baseline: Baseline) -> Result<(), BackendError> {
        if baseline.j >= self.config.num_channels {
            return Err(BackendError::UnknownBaseline {
                baseline,
                num_channels: self.config.num_channels,
            });
        }
        Ok(())
    }
}

impl AcquisitionBackend for SignalGenerator {
    fn num_channels(&self) -> usize {
        self.config.num_channels
    }

    fn sample_rate(&self) -> f64 {
        self.config.sample_rate
    }

    fn band(&self) -> (f64, f64) {
        (0.0, self.config.sample_rate / 2.0)
    }

    fn num_bins(&self) -> usize {
        self.config.samples / 2
    }

    fn arm(&mut self, baseline: Baseline) -> Result<(), BackendError> {
        self.check_baseline(baseline)?;
        self.armed.insert(baseline);
        Ok(())
    }

    /// All baselines armed together are fetched from the same integration. A
    /// new integration is made once every armed baseline has been fetched.
    fn fetch_cross(&mut self, baseline: Baseline) -> Result<Vec<c64>, BackendError> {
        self.check_baseline(baseline)?;
        if !self.armed.remove(&baseline) {
            return Err(BackendError::NotArmed(baseline));
        }

        let pending = match self.pending.take() {
            Some(p) => p,
            None => self.integrate(),
        };
        let cross = pending.get(&baseline).cloned().unwrap_or_default();
        if !self.armed.is_empty() {
            self.pending = Some(pending);
        }
        Ok(cross)
    }

    fn fetch_time_domain_window(&mut self) -> Result<TimeDomainWindow, BackendError> {
        let n = self.config.samples;
        let fs = self.config.sample_rate;
        let centre = (n / 2) as f64;
        let mut samples = Array2::zeros((self.config.num_channels, n));
        for (channel, mut row) in samples.outer_iter_mut().enumerate() {
            let a = self.config.impulse_amplitude * self.amplitudes[channel];
            let offset = centre + self.delays[channel] * fs;
            for (t, s) in row.iter_mut().enumerate() {
                let v = a * Self::pulse(t as f64 - offset) + self.noise.sample(&mut self.rng);
                let (q, clipped) = Self::quantise(v, self.config.bits);
                self.overflow.adc |= clipped;
                *s = q;
            }
        }
        Ok(TimeDomainWindow::new(samples, fs))
    }

    fn overflow_status(&mut self) -> Result<OverflowStatus, BackendError> {
        Ok(self.overflow)
    }

    fn clear_overflow(&mut self) -> Result<(), BackendError> {
        self.overflow = OverflowStatus::default();
        Ok(())
    }
}
