// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The expected response of an array over a grid of angles.

use ndarray::prelude::*;

use crate::{
    constants::{PI, TAU},
    geometry::AntennaArray,
    math::circular_distance,
};

/// What a [`SteeringManifold`] holds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ManifoldMode {
    /// Phase differences \[radians\] at a frequency \[Hz\].
    Frequency(f64),

    /// Arrival-time differences \[seconds\].
    Time,
}

impl ManifoldMode {
    pub(super) fn name(&self) -> &'static str {
        match self {
            ManifoldMode::Frequency(_) => "frequency",
            ManifoldMode::Time => "time",
        }
    }
}

/// For each angle of an evenly-spaced grid over [-pi, pi), the expected
/// values of every baseline (in baseline order).
#[derive(Debug, Clone)]
pub struct SteeringManifold {
    mode: ManifoldMode,
    angles: Vec<f64>,

    /// The first dimension is angle, the second is baseline.
    values: Array2<f64>,
}

impl SteeringManifold {
    /// `num_angles` angles `-pi + 2 pi k / num_angles`.
    pub fn angle_grid(num_angles: usize) -> Vec<f64> {
        (0..num_angles)
            .map(|k| -PI + TAU * k as f64 / num_angles as f64)
            .collect()
    }

    /// Phase differences at `freq` \[Hz\].
    pub fn frequency(array: &AntennaArray, freq: f64, num_angles: usize) -> SteeringManifold {
        SteeringManifold::build(array, ManifoldMode::Frequency(freq), num_angles, |angle| {
            array.phase_differences_at_angle(angle, freq)
        })
    }

    /// Arrival-time differences.
    pub fn time(array: &AntennaArray, num_angles: usize) -> SteeringManifold {
        SteeringManifold::build(array, ManifoldMode::Time, num_angles, |angle| {
            array.delay_differences_at_angle(angle)
        })
    }

    fn build<F: Fn(f64) -> Vec<f64>>(
        array: &AntennaArray,
        mode: ManifoldMode,
        num_angles: usize,
        response: F,
    ) -> SteeringManifold {
        let angles = SteeringManifold::angle_grid(num_angles);
        let mut values = Array2::zeros((num_angles, array.baselines().len()));
        for (mut row, &angle) in values.outer_iter_mut().zip(angles.iter()) {
            row.assign(&Array1::from(response(angle)));
        }
        SteeringManifold {
            mode,
            angles,
            values,
        }
    }

    pub fn mode(&self) -> ManifoldMode {
        self.mode
    }

    pub fn angles(&self) -> &[f64] {
        &self.angles
    }

    pub fn values(&self) -> ArrayView2<f64> {
        self.values.view()
    }

    pub fn len(&self) -> usize {
        self.angles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.angles.is_empty()
    }

    /// The spacing of the angle grid \[radians\].
    pub fn step(&self) -> f64 {
        TAU / self.angles.len() as f64
    }

    /// The Euclidean norm of the circular difference between the manifold at
    /// an angle index and a measured vector.
    pub fn distance(&self, index: usize, measured: &[f64]) -> f64 {
        circular_distance(self.values.row(index), measured)
    }
}
