// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;
use tempfile::TempDir;

use df_backend::{constants::TAU, Baseline, FrequencyBinCalibration, TimeDomainCalibration};

use crate::{direction_finder, get_cmd_output};

/// Every channel sees the same tone, delayed by these phases.
fn calibration_args() -> Vec<&'static str> {
    vec![
        "--no-progress-bars",
        "--samples", "256",
        "--snr", "10000",
        "--accumulations", "10",
        "--noise", "0.01",
        "--bits", "16",
        "--seed", "11",
        // This must come last; it takes multiple values.
        "--phase-shifts", "0", "0.4", "-0.8", "1.2",
    ]
}

#[test]
fn test_calibrate_frequency() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let output = tmp_dir.path().join("freq.json");

    let cmd = direction_finder()
        .arg("calibrate-frequency")
        .arg("--output")
        .arg(&output)
        .args(calibration_args())
        .ok();
    assert!(cmd.is_ok(), "calibrate-frequency failed: {}", cmd.err().unwrap());

    let calibration = FrequencyBinCalibration::read_from_file(&output).unwrap();
    assert_eq!(calibration.axis.len(), 128);
    assert_eq!(calibration.phases.len(), 6);
    let phase = calibration.phases[&Baseline { i: 0, j: 2 }][64];
    assert_abs_diff_eq!(phase, -0.8, epsilon = 0.05);
}

#[test]
fn test_calibrate_time() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let output = tmp_dir.path().join("time.json");

    let cmd = direction_finder()
        .arg("calibrate-time")
        .arg("--output")
        .arg(&output)
        .args(calibration_args())
        .ok();
    assert!(cmd.is_ok(), "calibrate-time failed: {}", cmd.err().unwrap());

    let calibration = TimeDomainCalibration::read_from_file(&output).unwrap();
    assert_eq!(calibration.offsets.len(), 6);
    assert_abs_diff_eq!(
        calibration.offsets[&Baseline { i: 1, j: 2 }],
        (-0.8 - 0.4) / (TAU * 200e6),
        epsilon = 0.1 / 800e6
    );
}

#[test]
fn test_calibrate_with_a_source_angle_fails() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let output = tmp_dir.path().join("freq.json");

    let cmd = direction_finder()
        .arg("calibrate-frequency")
        .args(["--source-angle", "1.0"])
        .arg("--output")
        .arg(&output)
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("source angle"), "unexpected stderr: {stderr}");
    assert!(!output.exists());
}

#[test]
fn test_run_reads_calibrations() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let freq = tmp_dir.path().join("freq.json");
    let time = tmp_dir.path().join("time.json");

    for (sub, output) in [("calibrate-frequency", &freq), ("calibrate-time", &time)] {
        let cmd = direction_finder()
            .arg(sub)
            .arg("--output")
            .arg(output)
            .args(calibration_args())
            .ok();
        assert!(cmd.is_ok(), "{sub} failed: {}", cmd.err().unwrap());
    }

    let cmd = direction_finder()
        .args(["run", "--dry-run"])
        .arg("--frequency-calibration")
        .arg(&freq)
        .arg("--time-calibration")
        .arg(&time)
        .args(calibration_args())
        .ok();
    assert!(cmd.is_ok(), "run failed: {}", cmd.err().unwrap());
    let (stdout, _) = get_cmd_output(cmd);
    assert!(stdout.contains("Frequency bins from"), "unexpected stdout: {stdout}");
    assert!(stdout.contains("Time domain from"), "unexpected stdout: {stdout}");
    assert!(!stdout.contains("No calibration was supplied"));
}
