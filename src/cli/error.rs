// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all direction-finder-related errors. This should be the
//! *only* error enum that is publicly visible.

use thiserror::Error;

use super::{
    calibrate::CalibrateArgsError, run::RunArgsError, simulate_integration::SimulateArgsError,
};
use crate::{
    backend::BackendError,
    calibration::{CalibrationApplyError, CalibrationReadError, CalibrationWriteError},
    correlation::CorrelationError,
    finder::DirectionFinderError,
    geometry::ArrayGeometryError,
    result_log::ResultLogError,
};

/// The *only* publicly visible error from the direction-finder binary. Each
/// category carries a hint on what is likely wrong, unless it's "generic".
#[derive(Error, Debug)]
pub enum DfError {
    /// An error related to the `run` subcommand.
    #[error("{0}\n\nSee `direction-finder run --help` for the available options.")]
    Run(String),

    /// An error related to the calibration subcommands.
    #[error("{0}\n\nSee `direction-finder calibrate-frequency --help` or `direction-finder calibrate-time --help`.")]
    Calibrate(String),

    /// An error related to the `simulate-integration` subcommand.
    #[error("{0}\n\nSee `direction-finder simulate-integration --help` for the available options.")]
    SimulateIntegration(String),

    /// An error related to array geometry.
    #[error("{0}\n\nArray geometry files are JSON lists of {{\"x\": ..., \"y\": ...}} records [metres], one per channel.")]
    Geometry(String),

    /// An error related to reading, writing or applying calibration files.
    #[error("{0}\n\nCalibration files are JSON objects. Frequency bin calibrations have an \"axis\" and keys like \"01\", time-domain calibrations have keys like \"0x1\" and cable calibrations have keys like \"0\".")]
    Calibration(String),

    /// An error from the acquisition backend.
    #[error("{0}\n\nIf you don't know what this means, try turning up verbosity (-v or -vv).")]
    Backend(String),

    /// An error from correlating data.
    #[error("{0}")]
    Correlation(String),

    /// An error while estimating a direction.
    #[error("{0}")]
    DirectionFinder(String),

    /// An error related to the result log.
    #[error("{0}\n\nThe result log is a text file that is appended to; make sure its directory exists and is writable.")]
    ResultLog(String),

    /// An error related to argument files.
    #[error("{0}\n\nArgument files are toml or json, with the same structure as the output of --save-toml.")]
    ArgFile(String),

    /// A generic error that can't be clarified further, e.g. IO errors.
    #[error("{0}")]
    Generic(String),
}

// When changing the error propagation below, ensure `Self::from(e)` uses the
// correct `e`!

// Binary sub-command errors.

impl From<RunArgsError> for DfError {
    fn from(e: RunArgsError) -> Self {
        Self::Run(e.to_string())
    }
}

impl From<CalibrateArgsError> for DfError {
    fn from(e: CalibrateArgsError) -> Self {
        Self::Calibrate(e.to_string())
    }
}

impl From<SimulateArgsError> for DfError {
    fn from(e: SimulateArgsError) -> Self {
        Self::SimulateIntegration(e.to_string())
    }
}

// Library errors.

impl From<ArrayGeometryError> for DfError {
    fn from(e: ArrayGeometryError) -> Self {
        match e {
            ArrayGeometryError::IO(e) => Self::from(e),
            _ => Self::Geometry(e.to_string()),
        }
    }
}

impl From<CalibrationReadError> for DfError {
    fn from(e: CalibrationReadError) -> Self {
        match e {
            CalibrationReadError::IO(e) => Self::from(e),
            _ => Self::Calibration(e.to_string()),
        }
    }
}

impl From<CalibrationWriteError> for DfError {
    fn from(e: CalibrationWriteError) -> Self {
        match e {
            CalibrationWriteError::IO(e) => Self::from(e),
            _ => Self::Calibration(e.to_string()),
        }
    }
}

impl From<CalibrationApplyError> for DfError {
    fn from(e: CalibrationApplyError) -> Self {
        match e {
            CalibrationApplyError::Correlation(e) => Self::from(e),
            _ => Self::Calibration(e.to_string()),
        }
    }
}

impl From<BackendError> for DfError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::IO(e) => Self::from(e),
            _ => Self::Backend(e.to_string()),
        }
    }
}

impl From<CorrelationError> for DfError {
    fn from(e: CorrelationError) -> Self {
        match e {
            CorrelationError::Backend(e) => Self::from(e),
            _ => Self::Correlation(e.to_string()),
        }
    }
}

impl From<DirectionFinderError> for DfError {
    fn from(e: DirectionFinderError) -> Self {
        match e {
            DirectionFinderError::Correlation(e) => Self::from(e),
            _ => Self::DirectionFinder(e.to_string()),
        }
    }
}

impl From<ResultLogError> for DfError {
    fn from(e: ResultLogError) -> Self {
        Self::ResultLog(e.to_string())
    }
}

impl From<toml::ser::Error> for DfError {
    fn from(e: toml::ser::Error) -> Self {
        Self::ArgFile(e.to_string())
    }
}

impl From<std::io::Error> for DfError {
    fn from(e: std::io::Error) -> Self {
        Self::Generic(e.to_string())
    }
}
