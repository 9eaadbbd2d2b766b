// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Angle-of-arrival estimation for a multi-element antenna array.

Measured phase (or time) differences between antenna pairs are compared
against a precomputed model of the array's response at each candidate angle.
 */

pub mod backend;
pub mod calibration;
mod cli;
pub mod constants;
pub mod correlation;
pub mod finder;
pub mod geometry;
pub(crate) mod math;
pub mod result_log;
pub mod time_domain;

// Re-exports.
pub use backend::{AcquisitionBackend, BackendError, OverflowStatus};
pub use calibration::{CableCalibration, FrequencyBinCalibration, TimeDomainCalibration};
pub use cli::{DfError, DirectionFinderCli};
pub use correlation::{CorrelationChannel, CorrelationSpectrum, Correlator};
pub use finder::{DirectionEstimate, DirectionFinder, DirectionFinderConfig, Visibilities};
pub use geometry::{Antenna, AntennaArray, Baseline};
pub use time_domain::{TimeDomainConfig, TimeDomainCorrelation, TimeDomainCorrelator, TimeDomainWindow};

use crossbeam_utils::atomic::AtomicCell;

#[allow(non_camel_case_types)]
pub type c64 = num_complex::Complex64;

/// Should progress bars be drawn? Only the binary turns these on.
pub(crate) static PROGRESS_BARS: AtomicCell<bool> = AtomicCell::new(false);
