// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with acquisition backends.

use thiserror::Error;

use crate::geometry::Baseline;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Baseline {baseline} refers to a channel this backend doesn't have ({num_channels} channels)")]
    UnknownBaseline {
        baseline: Baseline,
        num_channels: usize,
    },

    #[error("Baseline {0} was fetched without being armed")]
    NotArmed(Baseline),

    #[error("Snapshot '{name}' has {len} bytes, which isn't a multiple of {multiple}")]
    SnapshotLength {
        name: String,
        len: usize,
        multiple: usize,
    },

    #[error("The two halves of snapshot '{name}' have different lengths ({first} and {second})")]
    SnapshotHalves {
        name: String,
        first: usize,
        second: usize,
    },

    #[error("The shift schedule {0:#x} doesn't fit into the 12 bits of the control register")]
    ShiftScheduleTooBig(u32),

    #[error("The signal generator was given {got} {what}, but it has {num_channels} channels")]
    ChannelCountMismatch {
        what: &'static str,
        got: usize,
        num_channels: usize,
    },

    #[error("The signal generator needs at least 2 channels, but {0} were requested")]
    TooFewChannels(usize),

    #[error("The signal generator needs an even number of samples of at least 2, but {0} were requested")]
    BadSampleCount(usize),

    #[error("The signal generator tone frequency {0} must be a fraction of the sample rate in (0, 0.5)")]
    BadToneFrequency(f64),

    #[error("The signal generator SNR {0} must be finite and non-negative")]
    BadSnr(f64),

    #[error("The signal generator needs between 1 and 32 bits of quantisation, but {0} were requested")]
    BadBitDepth(u32),

    #[error("The signal generator noise standard deviation {0} must be finite and non-negative")]
    BadNoise(f64),

    #[error("The signal generator needs at least 1 accumulation per fetch")]
    NoAccumulations,

    #[error("The simulated source's array has {got} antennas, but the signal generator has {num_channels} channels")]
    SourceArrayMismatch { got: usize, num_channels: usize },

    #[error("Device error: {0}")]
    Device(String),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
