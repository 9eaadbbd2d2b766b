// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with finding directions.

use thiserror::Error;

use crate::{correlation::CorrelationError, geometry::Baseline};

#[derive(Error, Debug)]
pub enum DirectionFinderError {
    #[error("The array has {antennas} antennas, but the correlator has {channels} channels")]
    ArrayMismatch { antennas: usize, channels: usize },

    #[error("A steering manifold needs at least one angle")]
    NoAngles,

    #[error("The reference baseline index {index} is invalid; there are only {num_baselines} baselines")]
    ReferenceBaseline { index: usize, num_baselines: usize },

    #[error("No steering manifold has been set; set a frequency or time mode first")]
    NoManifold,

    #[error("Can't match {got} against a {expected} steering manifold")]
    ModeMismatch {
        expected: &'static str,
        got: &'static str,
    },

    #[error("Got {got} visibilities, but there are {expected} baselines")]
    VisibilityLength { expected: usize, got: usize },

    #[error("Visibilities must be finite")]
    NonFiniteVisibilities,

    #[error("The time-domain correlation of baseline {0} has no peak")]
    NoPeak(Baseline),

    #[error("The frequency range [{f_start} Hz, {f_stop} Hz) is empty")]
    BadFrequencyRange { f_start: f64, f_stop: f64 },

    #[error(transparent)]
    Correlation(#[from] CorrelationError),
}
