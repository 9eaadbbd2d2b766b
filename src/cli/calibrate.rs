// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Measure calibrations. The same signal must be fed into every channel; the
//! phase (or delay) differences between channels are then instrumental, and
//! are recorded so they can be removed later.

use std::path::{Path, PathBuf};

use clap::Parser;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::common::{InfoPrinter, SimulationArgs, TimeDomainArgs, ARG_FILE_HELP};
use crate::{
    calibration::{FrequencyBinCalibration, TimeDomainCalibration},
    correlation::Correlator,
    time_domain::TimeDomainConfig,
    DfError,
};

const DEFAULT_FREQUENCY_CALIBRATION_FILENAME: &str = "frequency_domain_calibration.json";
const DEFAULT_TIME_CALIBRATION_FILENAME: &str = "time_domain_calibration.json";

lazy_static::lazy_static! {
    static ref FREQUENCY_OUTPUT_HELP: String =
        format!("The file to write the calibration to. Default: {DEFAULT_FREQUENCY_CALIBRATION_FILENAME}");

    static ref TIME_OUTPUT_HELP: String =
        format!("The file to write the calibration to. Default: {DEFAULT_TIME_CALIBRATION_FILENAME}");
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct CalibrateFrequencyCliArgs {
    #[clap(short, long, parse(from_os_str), help = FREQUENCY_OUTPUT_HELP.as_str(), help_heading = "OUTPUT FILES")]
    pub(super) output: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct CalibrateFrequencyArgs {
    #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
    pub(super) args_file: Option<PathBuf>,

    #[clap(flatten)]
    #[serde(rename = "simulation")]
    #[serde(default)]
    pub(super) simulation_args: SimulationArgs,

    #[clap(flatten)]
    #[serde(rename = "calibrate-frequency")]
    #[serde(default)]
    pub(super) calibrate_args: CalibrateFrequencyCliArgs,
}

impl CalibrateFrequencyArgs {
    /// Merge the CLI arguments with those of the arguments file, preferring
    /// CLI arguments.
    pub(super) fn merge(self) -> Result<CalibrateFrequencyArgs, DfError> {
        debug!("Merging command-line arguments with the argument file");

        let cli_args = self;

        if let Some(arg_file) = cli_args.args_file {
            let CalibrateFrequencyArgs {
                args_file: _,
                simulation_args,
                calibrate_args,
            } = unpack_arg_file!(arg_file);

            Ok(CalibrateFrequencyArgs {
                args_file: None,
                simulation_args: cli_args.simulation_args.merge(simulation_args),
                calibrate_args: CalibrateFrequencyCliArgs {
                    output: cli_args.calibrate_args.output.or(calibrate_args.output),
                },
            })
        } else {
            Ok(cli_args)
        }
    }

    pub(super) fn run(self, dry_run: bool) -> Result<(), DfError> {
        debug!("{:#?}", self);

        let CalibrateFrequencyArgs {
            args_file: _,
            simulation_args,
            calibrate_args: CalibrateFrequencyCliArgs { output },
        } = self;
        let output =
            output.unwrap_or_else(|| PathBuf::from(DEFAULT_FREQUENCY_CALIBRATION_FILENAME));
        let mut correlator = common_signal_correlator(simulation_args, TimeDomainArgs::default())?;

        let mut printer = InfoPrinter::new("Frequency bin calibration".into());
        printer.push_line(format!("Writing to {}", output.display()).into());
        printer.display();
        if dry_run {
            info!("Dry run -- exiting now.");
            return Ok(());
        }

        let calibration = measure_frequency_calibration(&mut correlator, &output)?;
        info!(
            "Wrote phases of {} baselines over {} frequencies",
            calibration.phases.len(),
            calibration.axis.len()
        );
        Ok(())
    }
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct CalibrateTimeCliArgs {
    #[clap(short, long, parse(from_os_str), help = TIME_OUTPUT_HELP.as_str(), help_heading = "OUTPUT FILES")]
    pub(super) output: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct CalibrateTimeArgs {
    #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
    pub(super) args_file: Option<PathBuf>,

    #[clap(flatten)]
    #[serde(rename = "simulation")]
    #[serde(default)]
    pub(super) simulation_args: SimulationArgs,

    #[clap(flatten)]
    #[serde(rename = "time-domain")]
    #[serde(default)]
    pub(super) time_domain_args: TimeDomainArgs,

    #[clap(flatten)]
    #[serde(rename = "calibrate-time")]
    #[serde(default)]
    pub(super) calibrate_args: CalibrateTimeCliArgs,
}

impl CalibrateTimeArgs {
    /// Merge the CLI arguments with those of the arguments file, preferring
    /// CLI arguments.
    pub(super) fn merge(self) -> Result<CalibrateTimeArgs, DfError> {
        debug!("Merging command-line arguments with the argument file");

        let cli_args = self;

        if let Some(arg_file) = cli_args.args_file {
            let CalibrateTimeArgs {
                args_file: _,
                simulation_args,
                time_domain_args,
                calibrate_args,
            } = unpack_arg_file!(arg_file);

            Ok(CalibrateTimeArgs {
                args_file: None,
                simulation_args: cli_args.simulation_args.merge(simulation_args),
                time_domain_args: cli_args.time_domain_args.merge(time_domain_args),
                calibrate_args: CalibrateTimeCliArgs {
                    output: cli_args.calibrate_args.output.or(calibrate_args.output),
                },
            })
        } else {
            Ok(cli_args)
        }
    }

    pub(super) fn run(self, dry_run: bool) -> Result<(), DfError> {
        debug!("{:#?}", self);

        let CalibrateTimeArgs {
            args_file: _,
            simulation_args,
            time_domain_args,
            calibrate_args: CalibrateTimeCliArgs { output },
        } = self;
        let output = output.unwrap_or_else(|| PathBuf::from(DEFAULT_TIME_CALIBRATION_FILENAME));
        let mut correlator = common_signal_correlator(simulation_args, time_domain_args)?;

        let mut printer = InfoPrinter::new("Time-domain calibration".into());
        printer.push_line(format!("Writing to {}", output.display()).into());
        printer.display();
        if dry_run {
            info!("Dry run -- exiting now.");
            return Ok(());
        }

        let calibration = measure_time_calibration(&mut correlator, &output)?;
        let mut printer = InfoPrinter::new("Measured delays".into());
        printer.push_block(
            calibration
                .offsets
                .iter()
                .map(|(baseline, offset)| format!("{baseline}: {:>8.4} ns", offset * 1e9).into())
                .collect(),
        );
        printer.display();
        Ok(())
    }
}

/// A correlator on a simulated backend whose channels all see the same
/// signal, up to their instrumental phase shifts.
fn common_signal_correlator(
    simulation_args: SimulationArgs,
    time_domain_args: TimeDomainArgs,
) -> Result<Correlator, DfError> {
    if let Some(angle) = simulation_args.source_angle {
        return Err(CalibrateArgsError::SourceAngle(angle).into());
    }
    let time_domain: TimeDomainConfig = time_domain_args.parse();
    let generator = simulation_args.parse(None)?;
    Ok(Correlator::new(Box::new(generator), time_domain)?)
}

fn measure_frequency_calibration(
    correlator: &mut Correlator,
    output: &Path,
) -> Result<FrequencyBinCalibration, DfError> {
    correlator.fetch_crosses()?;
    let calibration = FrequencyBinCalibration::from_correlator(correlator);
    calibration.write_to_file(output)?;
    Ok(calibration)
}

fn measure_time_calibration(
    correlator: &mut Correlator,
    output: &Path,
) -> Result<TimeDomainCalibration, DfError> {
    correlator.fetch_time_domain_window()?;
    let correlations = correlator.time_domain_correlations()?;
    let calibration = TimeDomainCalibration::from_correlations(&correlations);
    calibration.write_to_file(output)?;
    Ok(calibration)
}

#[derive(Error, Debug)]
pub(super) enum CalibrateArgsError {
    #[error("A source angle ({0} rad) can't be used while calibrating; every channel must see the same signal")]
    SourceAngle(f64),
}
