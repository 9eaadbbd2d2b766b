// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Tests to ensure there is no stderr output for successful commands.

use tempfile::TempDir;

use crate::{direction_finder, get_cmd_output, quick_simulation_args};

#[test]
fn test_run_no_stderr() {
    let cmd = direction_finder()
        .arg("run")
        .args(quick_simulation_args())
        .args(["--source-angle", "0.3", "--iterations", "2"])
        .ok();
    assert!(cmd.is_ok(), "run failed: {}", cmd.err().unwrap());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.is_empty(), "stderr wasn't empty: {stderr}");
}

#[test]
fn test_calibrate_frequency_no_stderr() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let output = tmp_dir.path().join("freq.json");

    let cmd = direction_finder()
        .arg("calibrate-frequency")
        .args(quick_simulation_args())
        .arg("--output")
        .arg(&output)
        .ok();
    assert!(cmd.is_ok(), "calibrate-frequency failed: {}", cmd.err().unwrap());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.is_empty(), "stderr wasn't empty: {stderr}");
}
