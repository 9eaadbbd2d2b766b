// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with antenna array geometry.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArrayGeometryError {
    #[error("An antenna array needs at least 2 antennas to form a baseline, but {num} were supplied")]
    TooFewAntennas { num: usize },

    #[error("Antenna {index} has a non-finite position ({x}, {y})")]
    NonFinitePosition { index: usize, x: f64, y: f64 },

    #[error("Couldn't decode the array geometry in {file}: {err}")]
    Json {
        file: String,
        err: serde_json::Error,
    },

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
