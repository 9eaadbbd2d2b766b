// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with reading, writing and applying calibrations.

use thiserror::Error;

use crate::{correlation::CorrelationError, geometry::Baseline};

#[derive(Error, Debug)]
pub enum CalibrationReadError {
    #[error("Couldn't parse '{file}' as JSON: {err}")]
    Json {
        file: String,
        err: serde_json::Error,
    },

    #[error("'{file}' doesn't contain a JSON object")]
    NotAnObject { file: String },

    #[error("'{file}' has no \"axis\" key")]
    MissingAxis { file: String },

    #[error("The \"axis\" of '{file}' is empty")]
    EmptyAxis { file: String },

    #[error("Key \"{key}\" of '{file}' isn't a list of numbers")]
    NotNumeric { file: String, key: String },

    #[error("Key \"{key}\" of '{file}' isn't a number")]
    NotANumber { file: String, key: String },

    #[error("Key \"{key}\" of '{file}' isn't a valid baseline")]
    BadBaselineKey { file: String, key: String },

    #[error("Key \"{key}\" of '{file}' isn't a valid channel number")]
    BadChannelKey { file: String, key: String },

    #[error("Baseline \"{key}\" of '{file}' has {got} phases, but the axis has {expected} frequencies")]
    PhaseLength {
        file: String,
        key: String,
        expected: usize,
        got: usize,
    },

    #[error("Channel {channel} of '{file}' has an invalid cable (length {length}, velocity factor {velocity_factor}); lengths can't be negative and velocity factors must be positive")]
    BadCable {
        file: String,
        channel: usize,
        length: f64,
        velocity_factor: f64,
    },

    #[error(transparent)]
    IO(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum CalibrationWriteError {
    #[error("Baseline {0} can't be written to a frequency bin calibration file; channel numbers must be single digits")]
    BaselineKey(Baseline),

    #[error("Couldn't serialise the calibration to '{file}': {err}")]
    Json {
        file: String,
        err: serde_json::Error,
    },

    #[error(transparent)]
    IO(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum CalibrationApplyError {
    #[error("The {kind} calibration has no entry for baseline {baseline}")]
    MissingBaseline {
        kind: &'static str,
        baseline: Baseline,
    },

    #[error("The cable calibration has no entry for channel {0}")]
    MissingChannel(usize),

    #[error("The frequency bin calibration for baseline {baseline} has {got} phases, but its axis has {expected} frequencies")]
    PhaseLength {
        baseline: Baseline,
        expected: usize,
        got: usize,
    },

    #[error(transparent)]
    Correlation(#[from] CorrelationError),
}
