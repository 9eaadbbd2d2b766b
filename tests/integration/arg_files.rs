// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Tests of arguments supplied by files.

use std::{fs::File, io::Write};

use approx::assert_abs_diff_eq;
use indoc::indoc;
use tempfile::TempDir;

use crate::{direction_finder, get_cmd_output, quick_simulation_args, result_log_angles};

#[test]
fn test_run_with_toml_arg_file() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let args_file = tmp_dir.path().join("args.toml");
    let log = tmp_dir.path().join("results.txt");
    let mut f = File::create(&args_file).unwrap();
    f.write_all(
        indoc! {r#"
            [simulation]
            samples = 256
            snr = 100.0
            accumulations = 20
            noise = 0.1
            seed = 7
            source_angle = 0.5

            [run]
            iterations = 5
        "#}
        .as_bytes(),
    )
    .unwrap();
    drop(f);

    // The CLI's iterations override the file's.
    let cmd = direction_finder()
        .args(["run", "--no-progress-bars"])
        .arg(&args_file)
        .args(["--iterations", "2"])
        .arg("--result-log")
        .arg(&log)
        .ok();
    assert!(cmd.is_ok(), "run failed: {}", cmd.err().unwrap());

    let contents = std::fs::read_to_string(&log).unwrap();
    let angles = result_log_angles(&contents);
    assert_eq!(angles.len(), 2);
    for angle in angles {
        assert_abs_diff_eq!(angle, 0.5, epsilon = 0.05);
    }
}

#[test]
fn test_saved_toml_reproduces_run() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let saved = tmp_dir.path().join("saved.toml");
    let log = tmp_dir.path().join("results.txt");

    let cmd = direction_finder()
        .args(["run", "--dry-run"])
        .args(quick_simulation_args())
        .args(["--source-angle", "-1.0", "--iterations", "2"])
        .arg("--result-log")
        .arg(&log)
        .arg("--save-toml")
        .arg(&saved)
        .ok();
    assert!(cmd.is_ok(), "run failed: {}", cmd.err().unwrap());
    let contents = std::fs::read_to_string(&saved).unwrap();
    assert!(contents.contains("[simulation]"), "{contents}");
    assert!(contents.contains("samples = 256"), "{contents}");
    assert!(!log.exists());

    let cmd = direction_finder()
        .args(["run", "--no-progress-bars"])
        .arg(&saved)
        .ok();
    assert!(cmd.is_ok(), "run failed: {}", cmd.err().unwrap());
    let angles = result_log_angles(&std::fs::read_to_string(&log).unwrap());
    assert_eq!(angles.len(), 2);
    for angle in angles {
        assert_abs_diff_eq!(angle, -1.0, epsilon = 0.05);
    }
}

#[test]
fn test_unknown_arg_file_extension() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let args_file = tmp_dir.path().join("args.yaml");
    std::fs::write(&args_file, "run:\n  iterations: 2\n").unwrap();

    let cmd = direction_finder().arg("run").arg(&args_file).ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("toml, json"), "unexpected stderr: {stderr}");
}
