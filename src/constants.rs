// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Useful constants.

All constants *must* be double precision. Phases and delays are computed in
double precision throughout.
 */

pub use std::f64::consts::{FRAC_PI_6, PI, TAU};

/// Speed of light \[metres/second\]
pub const VEL_C: f64 = 299_792_458.0;

/// The number of candidate angles in a steering manifold. These are evenly
/// spaced over [-pi, pi).
pub const DEFAULT_NUM_ANGLES: usize = 1000;

/// How far back from the last estimate the manifold search starts
/// \[radians\].
pub const SEARCH_BACKTRACK: f64 = FRAC_PI_6;

/// The default sample rate of the digitiser \[Hz\].
pub const DEFAULT_SAMPLE_RATE: f64 = 800e6;

/// The default number of channels (antennas) of the correlator.
pub const DEFAULT_NUM_CHANNELS: usize = 4;

/// Time-domain correlations are resampled by this factor to find sub-sample
/// delays.
pub const DEFAULT_UPSAMPLE_FACTOR: usize = 100;

/// The maximum number of samples of each channel used in a time-domain
/// correlation.
pub const DEFAULT_MAX_WINDOW_LENGTH: usize = 1 << 17;

/// The number of zeros padded to each side of the first channel in a
/// time-domain correlation. This bounds the largest delay that can be found
/// to this many samples.
pub const DEFAULT_TIME_DOMAIN_PADDING: usize = 10;

/// The standard deviation of simulated noise. Three standard deviations fit
/// within a full-scale digitiser.
pub const SIMULATED_NOISE_STDDEV: f64 = 1.0 / 3.0;
