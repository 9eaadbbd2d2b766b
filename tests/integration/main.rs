// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Integration tests.
//!
//! Some help for laying out these tests was taken from:
//! https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html

mod arg_files;
mod calibrate;
mod no_stderr;
mod run;
mod simulate_integration;

use std::{process::Output, str::from_utf8};

use assert_cmd::{output::OutputError, Command};

fn direction_finder() -> Command {
    Command::cargo_bin("direction-finder").unwrap()
}

fn get_cmd_output(result: Result<Output, OutputError>) -> (String, String) {
    let output = match result {
        Ok(o) => o,
        Err(o) => o.as_output().unwrap().clone(),
    };
    (
        from_utf8(&output.stdout).unwrap().to_string(),
        from_utf8(&output.stderr).unwrap().to_string(),
    )
}

/// Simulation arguments that give clean phases quickly. The tone is at
/// 200 MHz.
fn quick_simulation_args() -> Vec<&'static str> {
    vec![
        "--no-progress-bars",
        "--samples", "256",
        "--snr", "100",
        "--accumulations", "20",
        "--noise", "0.1",
        "--seed", "7",
    ]
}

/// The angles of every line of a result log.
fn result_log_angles(contents: &str) -> Vec<f64> {
    contents
        .lines()
        .map(|line| line.rsplit(',').next().unwrap().parse().unwrap())
        .collect()
}

#[test]
fn test_help_lists_subcommands() {
    let cmd = direction_finder().arg("--help").ok();
    assert!(cmd.is_ok(), "--help failed: {}", cmd.err().unwrap());
    let (stdout, _) = get_cmd_output(cmd);
    for sub in [
        "run",
        "calibrate-frequency",
        "calibrate-time",
        "simulate-integration",
    ] {
        assert!(stdout.contains(sub), "{sub} is missing from the help");
    }
}

#[test]
fn test_no_subcommand_is_an_error() {
    let cmd = direction_finder().ok();
    assert!(cmd.is_err());
}
