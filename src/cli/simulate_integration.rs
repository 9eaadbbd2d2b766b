// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Characterise how the phase of a weak tone converges as more spectra are
//! integrated.

use std::path::PathBuf;

use clap::Parser;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::common::{InfoPrinter, SimulationArgs, ARG_FILE_HELP};
use crate::{geometry::Baseline, math::wrap_phase, DfError, PROGRESS_BARS};

const DEFAULT_NUM_INTEGRATIONS: usize = 10000;
const DEFAULT_NUM_TRIALS: usize = 10;
const DEFAULT_NUM_REPORTS: usize = 10;

lazy_static::lazy_static! {
    static ref INTEGRATIONS_HELP: String =
        format!("The number of spectra integrated in each trial. Default: {DEFAULT_NUM_INTEGRATIONS}");

    static ref TRIALS_HELP: String =
        format!("The number of independent trials the RMS error is taken over. Default: {DEFAULT_NUM_TRIALS}");

    static ref REPORTS_HELP: String =
        format!("The number of evenly-spaced integration counts the error is reported at. Default: {DEFAULT_NUM_REPORTS}");
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct SimulateIntegrationCliArgs {
    #[clap(short = 'n', long, help = INTEGRATIONS_HELP.as_str(), help_heading = "INTEGRATION")]
    pub(super) integrations: Option<usize>,

    #[clap(short, long, help = TRIALS_HELP.as_str(), help_heading = "INTEGRATION")]
    pub(super) trials: Option<usize>,

    #[clap(long, help = REPORTS_HELP.as_str(), help_heading = "INTEGRATION")]
    pub(super) reports: Option<usize>,
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct SimulateIntegrationArgs {
    #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
    pub(super) args_file: Option<PathBuf>,

    #[clap(flatten)]
    #[serde(rename = "simulation")]
    #[serde(default)]
    pub(super) simulation_args: SimulationArgs,

    #[clap(flatten)]
    #[serde(rename = "simulate-integration")]
    #[serde(default)]
    pub(super) integration_args: SimulateIntegrationCliArgs,
}

impl SimulateIntegrationArgs {
    /// Merge the CLI arguments with those of the arguments file, preferring
    /// CLI arguments.
    pub(super) fn merge(self) -> Result<SimulateIntegrationArgs, DfError> {
        debug!("Merging command-line arguments with the argument file");

        let cli_args = self;

        if let Some(arg_file) = cli_args.args_file {
            let SimulateIntegrationArgs {
                args_file: _,
                simulation_args,
                integration_args,
            } = unpack_arg_file!(arg_file);

            let cli = cli_args.integration_args;
            Ok(SimulateIntegrationArgs {
                args_file: None,
                simulation_args: cli_args.simulation_args.merge(simulation_args),
                integration_args: SimulateIntegrationCliArgs {
                    integrations: cli.integrations.or(integration_args.integrations),
                    trials: cli.trials.or(integration_args.trials),
                    reports: cli.reports.or(integration_args.reports),
                },
            })
        } else {
            Ok(cli_args)
        }
    }

    pub(super) fn run(self, dry_run: bool) -> Result<(), DfError> {
        let errors = self.simulate(dry_run)?;
        for (integrations, rms) in errors {
            info!("{integrations:>10} integrations: RMS phase error {rms:.6} rad");
        }
        Ok(())
    }

    /// The RMS phase error of baseline 0x1 over all trials, after each
    /// reported number of integrations.
    fn simulate(self, dry_run: bool) -> Result<Vec<(usize, f64)>, DfError> {
        debug!("{:#?}", self);

        let SimulateIntegrationArgs {
            args_file: _,
            simulation_args,
            integration_args:
                SimulateIntegrationCliArgs {
                    integrations,
                    trials,
                    reports,
                },
        } = self;
        let integrations = integrations.unwrap_or(DEFAULT_NUM_INTEGRATIONS);
        let trials = trials.unwrap_or(DEFAULT_NUM_TRIALS);
        let reports = reports.unwrap_or(DEFAULT_NUM_REPORTS);
        if integrations == 0 || trials == 0 {
            return Err(SimulateArgsError::Zero.into());
        }
        if reports == 0 || reports > integrations {
            return Err(SimulateArgsError::BadReports {
                reports,
                integrations,
            }
            .into());
        }

        let mut generator = simulation_args.parse(None)?;
        let baseline = Baseline { i: 0, j: 1 };
        let expected = wrap_phase(generator.phases()[1] - generator.phases()[0]);

        let mut printer = InfoPrinter::new("Integration simulation".into());
        printer.push_line(format!("Baseline {baseline}, expected phase {expected:.6} rad").into());
        printer.push_line(format!("{trials} trials of {integrations} integrations").into());
        printer.display();
        if dry_run {
            info!("Dry run -- exiting now.");
            return Ok(vec![]);
        }

        let report_at: Vec<usize> = (1..=reports).map(|r| r * integrations / reports).collect();
        let mut sum_squares = vec![0.0; reports];

        let progress = ProgressBar::with_draw_target(
            Some(trials as _),
            if PROGRESS_BARS.load() {
                ProgressDrawTarget::stdout()
            } else {
                ProgressDrawTarget::hidden()
            },
        )
        .with_style(
            ProgressStyle::default_bar()
                .template("{msg}: [{wide_bar:.blue}] {pos:3}/{len:3} ({elapsed_precise}<{eta_precise})")
                .map_err(|e| DfError::Generic(e.to_string()))?
                .progress_chars("=> "),
        )
        .with_position(0)
        .with_message("Simulating");
        for _ in 0..trials {
            let phases = generator.accumulated_phases(baseline, integrations)?;
            for (sum, &n) in sum_squares.iter_mut().zip(report_at.iter()) {
                let error = wrap_phase(phases[n - 1] - expected);
                *sum += error * error;
            }
            progress.inc(1);
        }
        progress.finish_and_clear();

        Ok(report_at
            .into_iter()
            .zip(sum_squares)
            .map(|(n, sum)| (n, (sum / trials as f64).sqrt()))
            .collect())
    }
}

#[derive(Error, Debug)]
pub(super) enum SimulateArgsError {
    #[error("The number of integrations and trials must be at least 1")]
    Zero,

    #[error("Can't report errors at {reports} points of {integrations} integrations")]
    BadReports { reports: usize, integrations: usize },
}
