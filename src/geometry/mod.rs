// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Antenna array geometry, and the expected response of an array to a plane
//! wave.
//!
//! Phases here are "delay phases"; an antenna further along the wave's
//! incidence axis has a larger phase. The phase difference of a baseline
//! `(i, j)` is always `phase(j) - phase(i)`.

mod error;

pub use error::ArrayGeometryError;

use std::{fmt::Display, fs::File, io::BufReader, path::Path};

use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};
use vec1::Vec1;

use crate::{
    constants::{TAU, VEL_C},
    math::wrap_phase,
};

/// An antenna position in a 2D plane. The units must be consistent with the
/// speed of light used in calculations, i.e. metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Antenna {
    pub x: f64,
    pub y: f64,
}

impl Antenna {
    pub fn new(x: f64, y: f64) -> Antenna {
        Antenna { x, y }
    }

    /// Get a new [`Antenna`] rigidly rotated counter-clockwise by `phi`
    /// \[radians\] about the origin.
    pub fn rotated(&self, phi: f64) -> Antenna {
        let (s, c) = phi.sin_cos();
        Antenna {
            x: c * self.x - s * self.y,
            y: s * self.x + c * self.y,
        }
    }

    /// The distance of this antenna along the incidence axis of a plane wave
    /// arriving from `angle` \[radians\].
    pub fn rotated_distance(&self, angle: f64) -> f64 {
        self.rotated(angle).x
    }

    /// The phase of a plane wave arriving from `angle` \[radians\] with
    /// frequency `freq` \[Hz\] at this antenna, wrapped to (-pi, pi].
    pub fn phase_at_angle(&self, angle: f64, freq: f64) -> f64 {
        wrap_phase(self.rotated_distance(angle) * TAU * freq / VEL_C)
    }

    /// The propagation delay of a plane wave arriving from `angle`
    /// \[radians\] to this antenna, relative to the origin \[seconds\].
    pub fn delay_at_angle(&self, angle: f64) -> f64 {
        self.rotated_distance(angle) / VEL_C
    }
}

/// The phase of `ant_b` minus the phase of `ant_a` for a plane wave arriving
/// from `angle` \[radians\] with frequency `freq` \[Hz\], wrapped to (-pi,
/// pi].
pub fn phase_difference(ant_a: &Antenna, ant_b: &Antenna, angle: f64, freq: f64) -> f64 {
    wrap_phase(ant_b.phase_at_angle(angle, freq) - ant_a.phase_at_angle(angle, freq))
}

/// The arrival time at `ant_b` minus the arrival time at `ant_a` for a plane
/// wave arriving from `angle` \[radians\] \[seconds\].
pub fn delay_difference(ant_a: &Antenna, ant_b: &Antenna, angle: f64) -> f64 {
    ant_b.delay_at_angle(angle) - ant_a.delay_at_angle(angle)
}

/// An antenna pair. `i` is always less than `j`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Baseline {
    pub i: usize,
    pub j: usize,
}

impl Baseline {
    /// Make a new baseline. The indices are put into ascending order. `None`
    /// is returned if the indices are the same.
    pub fn new(a: usize, b: usize) -> Option<Baseline> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Some(Baseline { i: a, j: b }),
            std::cmp::Ordering::Greater => Some(Baseline { i: b, j: a }),
            std::cmp::Ordering::Equal => None,
        }
    }
}

impl Display for Baseline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.i, self.j)
    }
}

/// An ordered collection of antennas. An antenna's index is its channel
/// identity, and the baselines are all unique pairs in ascending index order,
/// e.g. (0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3).
#[derive(Debug, Clone)]
pub struct AntennaArray {
    antennas: Vec1<Antenna>,
    baselines: Vec<Baseline>,
}

impl AntennaArray {
    pub fn new(antennas: Vec<Antenna>) -> Result<AntennaArray, ArrayGeometryError> {
        if antennas.len() < 2 {
            return Err(ArrayGeometryError::TooFewAntennas {
                num: antennas.len(),
            });
        }
        if let Some((index, a)) = antennas
            .iter()
            .enumerate()
            .find(|(_, a)| !a.x.is_finite() || !a.y.is_finite())
        {
            return Err(ArrayGeometryError::NonFinitePosition {
                index,
                x: a.x,
                y: a.y,
            });
        }

        let baselines = (0..antennas.len())
            .tuple_combinations()
            .map(|(i, j)| Baseline { i, j })
            .collect();
        let antennas = Vec1::try_from_vec(antennas)
            .map_err(|_| ArrayGeometryError::TooFewAntennas { num: 0 })?;
        Ok(AntennaArray {
            antennas,
            baselines,
        })
    }

    /// Read an array from a JSON file, which is an ordered list of `{"x": ...,
    /// "y": ...}` records.
    pub fn from_geometry_file<P: AsRef<Path>>(file: P) -> Result<AntennaArray, ArrayGeometryError> {
        let file = file.as_ref();
        debug!("Reading array geometry from {}", file.display());
        let antennas: Vec<Antenna> = serde_json::from_reader(BufReader::new(File::open(file)?))
            .map_err(|err| ArrayGeometryError::Json {
                file: file.display().to_string(),
                err,
            })?;
        AntennaArray::new(antennas)
    }

    /// A ring of `num_elements` antennas with the given `radius`. The first
    /// antenna sits on the positive x axis.
    pub fn circular(radius: f64, num_elements: usize) -> Result<AntennaArray, ArrayGeometryError> {
        let step = TAU / num_elements as f64;
        AntennaArray::new(
            (0..num_elements)
                .map(|el| Antenna::new(radius, 0.0).rotated(el as f64 * step))
                .collect(),
        )
    }

    /// A reference antenna at the origin, followed by a ring of
    /// `num_elements - 1` antennas with the given `radius`.
    pub fn circular_with_reference(
        radius: f64,
        num_elements: usize,
    ) -> Result<AntennaArray, ArrayGeometryError> {
        let num_ring = num_elements.saturating_sub(1);
        let step = TAU / num_ring as f64;
        let mut antennas = Vec::with_capacity(num_elements);
        antennas.push(Antenna::new(0.0, 0.0));
        antennas.extend(
            (0..num_ring).map(|el| Antenna::new(radius, 0.0).rotated(el as f64 * step)),
        );
        AntennaArray::new(antennas)
    }

    pub fn antennas(&self) -> &[Antenna] {
        &self.antennas
    }

    pub fn len(&self) -> usize {
        self.antennas.len()
    }

    /// Arrays always have at least two antennas.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn baselines(&self) -> &[Baseline] {
        &self.baselines
    }

    /// The phase difference of a baseline for a plane wave arriving from
    /// `angle` \[radians\] with frequency `freq` \[Hz\].
    ///
    /// # Panics
    ///
    /// Panics if the baseline refers to an antenna not in this array.
    pub fn baseline_phase_difference(&self, baseline: Baseline, angle: f64, freq: f64) -> f64 {
        phase_difference(
            &self.antennas[baseline.i],
            &self.antennas[baseline.j],
            angle,
            freq,
        )
    }

    /// The phase differences of all baselines, in baseline order.
    pub fn phase_differences_at_angle(&self, angle: f64, freq: f64) -> Vec<f64> {
        // Rotating each antenna only once beats going through each pair.
        let phases: Vec<f64> = self
            .antennas
            .iter()
            .map(|a| a.phase_at_angle(angle, freq))
            .collect();
        self.baselines
            .iter()
            .map(|bl| wrap_phase(phases[bl.j] - phases[bl.i]))
            .collect()
    }

    /// The arrival-time differences of all baselines, in baseline order
    /// \[seconds\].
    pub fn delay_differences_at_angle(&self, angle: f64) -> Vec<f64> {
        let delays: Vec<f64> = self
            .antennas
            .iter()
            .map(|a| a.delay_at_angle(angle))
            .collect();
        self.baselines
            .iter()
            .map(|bl| delays[bl.j] - delays[bl.i])
            .collect()
    }
}
