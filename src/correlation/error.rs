// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with correlating.

use thiserror::Error;

use crate::{backend::BackendError, geometry::Baseline};

#[derive(Error, Debug)]
pub enum CorrelationError {
    #[error("Baseline {baseline} expected a spectrum of {expected} bins, but got {got}")]
    SpectrumLength {
        baseline: Baseline,
        expected: usize,
        got: usize,
    },

    #[error("The backend returned {got} spectra, but {expected} baselines were requested")]
    SpectrumCount { expected: usize, got: usize },

    #[error("A calibration table has {frequencies} frequencies but {phases} phases")]
    CalibrationLength { frequencies: usize, phases: usize },

    #[error("A calibration table has no frequencies")]
    EmptyCalibration,

    #[error("Cable calibration values must be finite with positive velocity factors (got length {length}, velocity factor {velocity_factor})")]
    BadCable { length: f64, velocity_factor: f64 },

    #[error("Got {got} time offsets, but there are {expected} baselines")]
    OffsetCount { expected: usize, got: usize },

    #[error("The time-domain window is empty")]
    EmptyWindow,

    #[error("Baseline {baseline} can't be correlated; the time-domain window only has {num_channels} channels")]
    WindowChannels {
        baseline: Baseline,
        num_channels: usize,
    },

    #[error("No time-domain window has been fetched")]
    NoWindow,

    #[error("Invalid time-domain settings: {0}")]
    InvalidTimeDomainConfig(&'static str),

    #[error("The backend has {got} channels; at least 2 are needed")]
    TooFewChannels { got: usize },

    #[error("The backend delivers no frequency bins")]
    NoBins,

    #[error("No frequency bins have centres in [{f_start} Hz, {f_stop} Hz)")]
    EmptyFrequencyRange { f_start: f64, f_stop: f64 },

    #[error("There is no baseline with index {0}")]
    UnknownBaselineIndex(usize),

    #[error(transparent)]
    Backend(#[from] BackendError),
}
