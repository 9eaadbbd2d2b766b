// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::io::Write;

use approx::assert_abs_diff_eq;
use indoc::indoc;
use tempfile::{tempdir, Builder};

use super::*;

fn quick_args() -> RunArgs {
    RunArgs {
        simulation_args: SimulationArgs {
            samples: Some(256),
            snr: Some(100.0),
            accumulations: Some(20),
            noise: Some(0.1),
            seed: Some(7),
            ..Default::default()
        },
        run_args: RunCliArgs {
            iterations: Some(3),
            num_angles: Some(360),
            ..Default::default()
        },
        ..Default::default()
    }
}

#[test]
fn test_merge_prefers_cli_args() {
    let mut arg_file = Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("Couldn't make tmp file");
    arg_file
        .write_all(
            indoc! {r#"
                [simulation]
                snr = 5.0
                seed = 3

                [run]
                iterations = 20
                impulse = true
            "#}
            .as_bytes(),
        )
        .unwrap();

    let args = RunArgs {
        args_file: Some(arg_file.path().to_path_buf()),
        simulation_args: SimulationArgs {
            snr: Some(1.0),
            ..Default::default()
        },
        ..Default::default()
    }
    .merge()
    .unwrap();
    assert!(args.args_file.is_none());
    assert_eq!(args.simulation_args.snr, Some(1.0));
    assert_eq!(args.simulation_args.seed, Some(3));
    assert_eq!(args.run_args.iterations, Some(20));
    assert!(args.run_args.impulse);
}

#[test]
fn test_merge_json() {
    let mut arg_file = Builder::new()
        .suffix(".json")
        .tempfile()
        .expect("Couldn't make tmp file");
    arg_file
        .write_all(br#"{"array": {"array_radius": 1.5}, "run": {"f_start": 1e8}}"#)
        .unwrap();
    let args = RunArgs {
        args_file: Some(arg_file.path().to_path_buf()),
        ..Default::default()
    }
    .merge()
    .unwrap();
    assert_eq!(args.array_args.array_radius, Some(1.5));
    assert_eq!(args.run_args.f_start, Some(1e8));
}

#[test]
fn test_bad_arg_files() {
    let arg_file = Builder::new()
        .suffix(".yaml")
        .tempfile()
        .expect("Couldn't make tmp file");
    let result = RunArgs {
        args_file: Some(arg_file.path().to_path_buf()),
        ..Default::default()
    }
    .merge();
    assert!(matches!(result, Err(DfError::ArgFile(_))));

    let mut arg_file = Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("Couldn't make tmp file");
    arg_file.write_all(b"[run]\niterations = \"many\"\n").unwrap();
    let result = RunArgs {
        args_file: Some(arg_file.path().to_path_buf()),
        ..Default::default()
    }
    .merge();
    assert!(matches!(result, Err(DfError::ArgFile(_))));
}

#[test]
fn test_bad_run_args() {
    let mut args = quick_args();
    args.run_args.iterations = Some(0);
    assert!(matches!(args.parse(), Err(DfError::Run(_))));

    let mut args = quick_args();
    args.run_args.f_start = Some(300e6);
    args.run_args.f_stop = Some(100e6);
    assert!(matches!(args.parse(), Err(DfError::Run(_))));

    let mut args = quick_args();
    args.run_args.reference_baseline = Some(6);
    assert!(matches!(args.parse(), Err(DfError::DirectionFinder(_))));

    let mut args = quick_args();
    args.simulation_args.num_channels = Some(1);
    assert!(matches!(args.parse(), Err(DfError::Geometry(_))));

    let mut args = quick_args();
    args.simulation_args.tone_freq = Some(0.7);
    assert!(matches!(args.parse(), Err(DfError::Backend(_))));

    let mut args = quick_args();
    args.calibration_args.time_calibration = Some(PathBuf::from("/does/not/exist.json"));
    assert!(matches!(args.parse(), Err(DfError::Generic(_))));
}

#[test]
fn test_run_frequency_mode() {
    let tmp_dir = tempdir().expect("Couldn't make tmp dir");
    let log_file = tmp_dir.path().join("results.csv");

    let mut args = quick_args();
    args.simulation_args.source_angle = Some(0.5);
    args.run_args.result_log = Some(log_file.clone());
    let estimates = args.parse().unwrap().run().unwrap();
    assert_eq!(estimates.len(), 3);
    for estimate in &estimates {
        assert_abs_diff_eq!(estimate.frequency.unwrap(), 200e6);
        assert_abs_diff_eq!(estimate.angle, 0.5, epsilon = 0.05);
    }

    let contents = std::fs::read_to_string(&log_file).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 3);
    for line in lines {
        let fields: Vec<&str> = line.split(',').collect();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[1], "200000000");
    }
}

#[test]
fn test_run_impulse_mode() {
    let tmp_dir = tempdir().expect("Couldn't make tmp dir");
    let log_file = tmp_dir.path().join("results.csv");

    let mut args = quick_args();
    args.simulation_args.source_angle = Some(-2.0);
    args.simulation_args.noise = Some(0.01);
    args.simulation_args.bits = Some(16);
    args.run_args.impulse = true;
    args.run_args.iterations = Some(2);
    args.run_args.result_log = Some(log_file.clone());
    let estimates = args.parse().unwrap().run().unwrap();
    for estimate in &estimates {
        assert!(estimate.frequency.is_none());
        assert_abs_diff_eq!(estimate.angle, -2.0, epsilon = 0.05);
    }

    let contents = std::fs::read_to_string(&log_file).unwrap();
    assert_eq!(contents.lines().count(), 2);
    assert!(contents.lines().all(|l| l.split(',').count() == 2));
}
