// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;
use chrono::TimeZone;
use rand::{rngs::StdRng, Rng, SeedableRng};

use super::*;
use crate::{
    backend::{SignalGenerator, SignalGeneratorConfig},
    constants::{PI, TAU},
    math::wrap_phase,
    time_domain::TimeDomainConfig,
};

fn array() -> AntennaArray {
    AntennaArray::circular(0.5, 4).unwrap()
}

fn generator_config() -> SignalGeneratorConfig {
    SignalGeneratorConfig {
        samples: 512,
        tone_freq: 0.25,
        snr: 100.0,
        accumulations: 10,
        seed: Some(42),
        ..Default::default()
    }
}

fn finder(gen: SignalGenerator, num_angles: usize, array: AntennaArray) -> DirectionFinder {
    let correlator = Correlator::new(Box::new(gen), TimeDomainConfig::default()).unwrap();
    DirectionFinder::new(
        correlator,
        array,
        DirectionFinderConfig {
            num_angles,
            reference_baseline: 0,
        },
    )
    .unwrap()
}

/// The first index of the smallest distance, scanning from the start.
fn brute_force(manifold: &SteeringManifold, measured: &[f64]) -> usize {
    let mut best = (0, f64::INFINITY);
    for i in 0..manifold.len() {
        let d = manifold.distance(i, measured);
        if d < best.1 {
            best = (i, d);
        }
    }
    best.0
}

#[test]
fn test_angle_grid() {
    let grid = SteeringManifold::angle_grid(1000);
    assert_eq!(grid.len(), 1000);
    assert_abs_diff_eq!(grid[0], -PI);
    assert_abs_diff_eq!(grid[500], 0.0, epsilon = 1e-12);
    assert!(grid.iter().all(|&a| (-PI..PI).contains(&a)));
    for w in grid.windows(2) {
        assert_abs_diff_eq!(w[1] - w[0], TAU / 1000.0, epsilon = 1e-12);
    }
}

#[test]
fn test_manifold_values() {
    let array = array();
    let manifold = SteeringManifold::frequency(&array, 200e6, 360);
    assert_eq!(manifold.mode(), ManifoldMode::Frequency(200e6));
    assert_eq!(manifold.values().dim(), (360, 6));
    assert_abs_diff_eq!(manifold.step(), TAU / 360.0);
    for (i, &angle) in manifold.angles().iter().enumerate().step_by(17) {
        let expected = array.phase_differences_at_angle(angle, 200e6);
        for (&v, e) in manifold.values().row(i).iter().zip(expected) {
            assert_abs_diff_eq!(v, e);
        }
        // A manifold is closest to itself.
        assert_abs_diff_eq!(manifold.distance(i, &array.phase_differences_at_angle(angle, 200e6)), 0.0);
    }

    let manifold = SteeringManifold::time(&array, 360);
    assert_eq!(manifold.mode(), ManifoldMode::Time);
    let angle = manifold.angles()[100];
    for (&v, e) in manifold
        .values()
        .row(100)
        .iter()
        .zip(array.delay_differences_at_angle(angle))
    {
        assert_abs_diff_eq!(v, e);
    }
}

#[test]
fn test_find_closest_point_matches_brute_force() {
    let mut df = finder(SignalGenerator::new(generator_config()).unwrap(), 1000, array());
    df.set_frequency(250e6);
    let manifold = df.active_manifold().unwrap().clone();

    let mut rng = StdRng::seed_from_u64(99);
    for _ in 0..200 {
        let measured: Vec<f64> = (0..6).map(|_| rng.gen_range(-PI..PI)).collect();
        let expected = manifold.angles()[brute_force(&manifold, &measured)];
        // Every call is seeded by the last one, so this covers many seeds.
        let angle = df.find_closest_point(&Visibilities::Phases(measured)).unwrap();
        assert_abs_diff_eq!(angle, expected);
        assert_eq!(df.last_angle(), Some(angle));
    }
}

#[test]
fn test_find_closest_point_finds_true_angle() {
    let array = array();
    let mut df = finder(SignalGenerator::new(generator_config()).unwrap(), 1000, array.clone());
    df.set_frequency(200e6);
    let grid = SteeringManifold::angle_grid(1000);

    // Jump around the circle, including across the wrap at +-pi.
    for &k in &[0, 999, 500, 1, 250, 990, 3, 750] {
        let measured = array.phase_differences_at_angle(grid[k], 200e6);
        let angle = df.find_closest_point(&Visibilities::Phases(measured)).unwrap();
        assert_abs_diff_eq!(angle, grid[k]);
    }

    // Time mode too.
    df.set_time();
    for &k in &[10, 400, 999] {
        let measured = array.delay_differences_at_angle(grid[k]);
        let angle = df.find_closest_point(&Visibilities::Delays(measured)).unwrap();
        assert_abs_diff_eq!(angle, grid[k]);
    }
}

#[test]
fn test_manifolds_are_cached() {
    let mut df = finder(SignalGenerator::new(generator_config()).unwrap(), 100, array());
    assert_eq!(df.num_cached_manifolds(), 0);
    assert!(df.active_manifold().is_none());

    df.set_frequency(100e6);
    df.set_frequency(100e6);
    assert_eq!(df.num_cached_manifolds(), 1);
    let first = df.active_manifold().unwrap().values().as_ptr();

    df.set_frequency(150e6);
    assert_eq!(df.num_cached_manifolds(), 2);
    df.set_time();
    df.set_frequency(100e6);
    assert_eq!(df.num_cached_manifolds(), 2);
    assert_eq!(df.active_manifold().unwrap().values().as_ptr(), first);
    assert_eq!(
        df.active_manifold().unwrap().mode(),
        ManifoldMode::Frequency(100e6)
    );
}

#[test]
fn test_find_closest_point_errors() {
    let mut df = finder(SignalGenerator::new(generator_config()).unwrap(), 100, array());
    let phases = Visibilities::Phases(vec![0.0; 6]);
    assert!(matches!(
        df.find_closest_point(&phases),
        Err(DirectionFinderError::NoManifold)
    ));

    df.set_time();
    assert!(matches!(
        df.find_closest_point(&phases),
        Err(DirectionFinderError::ModeMismatch {
            expected: "time",
            got: "phases"
        })
    ));

    df.set_frequency(100e6);
    assert!(matches!(
        df.find_closest_point(&Visibilities::Delays(vec![0.0; 6])),
        Err(DirectionFinderError::ModeMismatch { .. })
    ));
    assert!(matches!(
        df.find_closest_point(&Visibilities::Phases(vec![0.0; 5])),
        Err(DirectionFinderError::VisibilityLength {
            expected: 6,
            got: 5
        })
    ));
    assert!(matches!(
        df.find_closest_point(&Visibilities::Phases(vec![0.0, f64::NAN, 0.0, 0.0, 0.0, 0.0])),
        Err(DirectionFinderError::NonFiniteVisibilities)
    ));
    // Failed searches don't move the seed.
    assert!(df.last_angle().is_none());
}

#[test]
fn test_new_errors() {
    let make = |array: AntennaArray, config: DirectionFinderConfig| {
        let gen = SignalGenerator::new(generator_config()).unwrap();
        let correlator = Correlator::new(Box::new(gen), TimeDomainConfig::default()).unwrap();
        DirectionFinder::new(correlator, array, config).err()
    };
    assert!(matches!(
        make(
            AntennaArray::circular(0.5, 3).unwrap(),
            DirectionFinderConfig::default()
        ),
        Some(DirectionFinderError::ArrayMismatch {
            antennas: 3,
            channels: 4
        })
    ));
    assert!(matches!(
        make(
            array(),
            DirectionFinderConfig {
                num_angles: 0,
                ..Default::default()
            }
        ),
        Some(DirectionFinderError::NoAngles)
    ));
    assert!(matches!(
        make(
            array(),
            DirectionFinderConfig {
                reference_baseline: 6,
                ..Default::default()
            }
        ),
        Some(DirectionFinderError::ReferenceBaseline { index: 6, .. })
    ));
}

#[test]
fn test_estimate_from_strongest_signal() {
    // Uniform amplitudes, an SNR of 1 and a source at angle 0.
    let array = array();
    let gen = SignalGenerator::new(SignalGeneratorConfig {
        snr: 1.0,
        accumulations: 1000,
        ..generator_config()
    })
    .unwrap()
    .with_source(array.clone(), 0.0)
    .unwrap();
    let mut df = finder(gen, 360, array);

    let estimate = df.estimate_from_strongest_signal(0.0, 400e6).unwrap();
    assert_abs_diff_eq!(estimate.frequency.unwrap(), 200e6);
    assert!(
        estimate.angle.abs() <= TAU / 360.0 + 1e-9,
        "estimated angle {} isn't within a grid step of 0",
        estimate.angle
    );
    assert_eq!(df.num_cached_manifolds(), 1);

    // The same frequency again doesn't build another manifold.
    df.estimate_from_strongest_signal(0.0, 400e6).unwrap();
    assert_eq!(df.num_cached_manifolds(), 1);

    // Nothing in range.
    assert!(matches!(
        df.estimate_from_strongest_signal(1e9, 2e9),
        Err(DirectionFinderError::Correlation(_))
    ));
    assert!(matches!(
        df.estimate_from_strongest_signal(2e9, 1e9),
        Err(DirectionFinderError::BadFrequencyRange { .. })
    ));
}

#[test]
fn test_estimate_from_impulse() {
    let array = array();
    let angle = 1.3;
    let gen = SignalGenerator::new(SignalGeneratorConfig {
        noise_stddev: 0.01,
        bits: 16,
        ..generator_config()
    })
    .unwrap()
    .with_source(array.clone(), angle)
    .unwrap();
    let mut df = finder(gen, 360, array);

    let estimate = df.estimate_from_impulse().unwrap();
    assert!(estimate.frequency.is_none());
    assert_abs_diff_eq!(wrap_phase(estimate.angle - angle), 0.0, epsilon = 0.05);
    assert_eq!(
        df.active_manifold().unwrap().mode(),
        ManifoldMode::Time
    );
}

#[test]
fn test_estimate_display() {
    let estimate = DirectionEstimate {
        angle: -0.5,
        frequency: Some(200e6),
        timestamp: Utc.timestamp_opt(1_700_000_000, 123_456_000).unwrap(),
    };
    assert_eq!(estimate.to_string(), "1700000000.123456,200000000,-0.5");

    let estimate = DirectionEstimate {
        frequency: None,
        ..estimate
    };
    assert_eq!(estimate.to_string(), "1700000000.123456,-0.5");
}
