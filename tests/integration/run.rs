// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;
use tempfile::TempDir;

use crate::{direction_finder, get_cmd_output, quick_simulation_args, result_log_angles};

#[test]
fn test_run_finds_the_source() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let log = tmp_dir.path().join("results.txt");

    let cmd = direction_finder()
        .arg("run")
        .args(quick_simulation_args())
        .args(["--source-angle", "0.5", "--iterations", "3"])
        .arg("--result-log")
        .arg(&log)
        .ok();
    assert!(cmd.is_ok(), "run failed: {}", cmd.err().unwrap());

    let contents = std::fs::read_to_string(&log).unwrap();
    let angles = result_log_angles(&contents);
    assert_eq!(angles.len(), 3);
    for angle in angles {
        assert_abs_diff_eq!(angle, 0.5, epsilon = 0.05);
    }
    for line in contents.lines() {
        let fields: Vec<&str> = line.split(',').collect();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[1], "200000000");
    }
}

#[test]
fn test_run_appends_to_the_result_log() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let log = tmp_dir.path().join("results.txt");

    for _ in 0..2 {
        let cmd = direction_finder()
            .arg("run")
            .args(quick_simulation_args())
            .args(["--source-angle", "1.5", "--iterations", "2"])
            .arg("--result-log")
            .arg(&log)
            .ok();
        assert!(cmd.is_ok(), "run failed: {}", cmd.err().unwrap());
    }

    let contents = std::fs::read_to_string(&log).unwrap();
    assert_eq!(result_log_angles(&contents).len(), 4);
}

#[test]
fn test_run_impulse() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let log = tmp_dir.path().join("results.txt");

    let cmd = direction_finder()
        .args(["run", "--impulse", "--no-progress-bars"])
        .args(["--samples", "256", "--snr", "100", "--accumulations", "20"])
        .args(["--noise", "0.01", "--bits", "16", "--seed", "7"])
        .args(["--source-angle", "-2.0", "--iterations", "2"])
        .arg("--result-log")
        .arg(&log)
        .ok();
    assert!(cmd.is_ok(), "run --impulse failed: {}", cmd.err().unwrap());

    let contents = std::fs::read_to_string(&log).unwrap();
    for line in contents.lines() {
        assert_eq!(line.split(',').count(), 2);
    }
    let angles = result_log_angles(&contents);
    assert_eq!(angles.len(), 2);
    for angle in angles {
        assert_abs_diff_eq!(angle, -2.0, epsilon = 0.05);
    }
}

#[test]
fn test_run_dry_run_estimates_nothing() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let log = tmp_dir.path().join("results.txt");

    let cmd = direction_finder()
        .args(["run", "--dry-run"])
        .args(quick_simulation_args())
        .arg("--result-log")
        .arg(&log)
        .ok();
    assert!(cmd.is_ok(), "dry run failed: {}", cmd.err().unwrap());
    let (stdout, _) = get_cmd_output(cmd);
    assert!(stdout.contains("Dry run"));
    assert!(!log.exists());
}

#[test]
fn test_run_bad_args() {
    let cmd = direction_finder()
        .arg("run")
        .args(quick_simulation_args())
        .args(["--iterations", "0"])
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("iterations"), "unexpected stderr: {stderr}");

    let cmd = direction_finder()
        .arg("run")
        .args(quick_simulation_args())
        .args(["--f-start", "300e6", "--f-stop", "100e6"])
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("frequency range"), "unexpected stderr: {stderr}");
}
