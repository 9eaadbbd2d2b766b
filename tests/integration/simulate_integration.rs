// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use crate::{direction_finder, get_cmd_output};

#[test]
fn test_simulate_integration_reports() {
    #[rustfmt::skip]
    let cmd = direction_finder()
        .args([
            "simulate-integration",
            "--no-progress-bars",
            "--num-channels", "2",
            "--samples", "128",
            "--snr", "0.5",
            "--seed", "5",
            "-n", "200",
            "--trials", "2",
            "--reports", "4",
            "--phase-shifts", "0", "1",
        ])
        .ok();
    assert!(cmd.is_ok(), "simulate-integration failed: {}", cmd.err().unwrap());
    let (stdout, _) = get_cmd_output(cmd);
    let reports: Vec<&str> = stdout
        .lines()
        .filter(|l| l.contains("integrations: RMS phase error"))
        .collect();
    assert_eq!(reports.len(), 4, "{stdout}");
    assert!(reports[3].contains("200 integrations"));
}

#[test]
fn test_simulate_integration_bad_reports() {
    let cmd = direction_finder()
        .args(["simulate-integration", "-n", "10", "--reports", "20"])
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("Can't report errors"), "unexpected stderr: {stderr}");
}
