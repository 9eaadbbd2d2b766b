// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Repeatedly estimate the direction of a signal.

#[cfg(test)]
mod tests;

use std::path::PathBuf;

use clap::Parser;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::common::{
    display_warnings, ArrayArgs, InfoPrinter, SimulationArgs, TimeDomainArgs, Warn, ARG_FILE_HELP,
};
use crate::{
    calibration::{CableCalibration, FrequencyBinCalibration, TimeDomainCalibration},
    constants::DEFAULT_NUM_ANGLES,
    correlation::Correlator,
    finder::{DirectionEstimate, DirectionFinder, DirectionFinderConfig},
    result_log::ResultLog,
    DfError,
};

const DEFAULT_NUM_ITERATIONS: usize = 10;

lazy_static::lazy_static! {
    static ref ITERATIONS_HELP: String =
        format!("The number of directions to estimate. Default: {DEFAULT_NUM_ITERATIONS}");

    static ref NUM_ANGLES_HELP: String =
        format!("The number of candidate angles over the full circle. Default: {DEFAULT_NUM_ANGLES}");
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct RunCliArgs {
    /// Estimate directions from impulses in the time domain, rather than from
    /// the strongest signal in the frequency domain.
    #[clap(long, help_heading = "DIRECTION FINDING")]
    #[serde(default)]
    pub(super) impulse: bool,

    /// The lowest frequency searched for the strongest signal [Hz]. Default:
    /// the bottom of the band
    #[clap(long, help_heading = "DIRECTION FINDING")]
    pub(super) f_start: Option<f64>,

    /// The frequency the search for the strongest signal stops at [Hz].
    /// Default: the top of the band
    #[clap(long, help_heading = "DIRECTION FINDING")]
    pub(super) f_stop: Option<f64>,

    #[clap(short, long, help = ITERATIONS_HELP.as_str(), help_heading = "DIRECTION FINDING")]
    pub(super) iterations: Option<usize>,

    #[clap(long, help = NUM_ANGLES_HELP.as_str(), help_heading = "DIRECTION FINDING")]
    pub(super) num_angles: Option<usize>,

    /// The index of the baseline searched for the strongest signal. Default: 0
    #[clap(long, help_heading = "DIRECTION FINDING")]
    pub(super) reference_baseline: Option<usize>,

    /// Append every estimate to this file.
    #[clap(short, long, parse(from_os_str), help_heading = "OUTPUT FILES")]
    pub(super) result_log: Option<PathBuf>,
}

impl RunCliArgs {
    fn merge(self, other: Self) -> Self {
        Self {
            impulse: self.impulse || other.impulse,
            f_start: self.f_start.or(other.f_start),
            f_stop: self.f_stop.or(other.f_stop),
            iterations: self.iterations.or(other.iterations),
            num_angles: self.num_angles.or(other.num_angles),
            reference_baseline: self.reference_baseline.or(other.reference_baseline),
            result_log: self.result_log.or(other.result_log),
        }
    }
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct CalibrationFileArgs {
    /// A frequency bin calibration file to apply.
    #[clap(long, parse(from_os_str), help_heading = "CALIBRATION")]
    pub(super) frequency_calibration: Option<PathBuf>,

    /// A cable length calibration file to apply.
    #[clap(long, parse(from_os_str), help_heading = "CALIBRATION")]
    pub(super) cable_calibration: Option<PathBuf>,

    /// A time-domain calibration file to apply.
    #[clap(long, parse(from_os_str), help_heading = "CALIBRATION")]
    pub(super) time_calibration: Option<PathBuf>,
}

impl CalibrationFileArgs {
    fn merge(self, other: Self) -> Self {
        Self {
            frequency_calibration: self.frequency_calibration.or(other.frequency_calibration),
            cable_calibration: self.cable_calibration.or(other.cable_calibration),
            time_calibration: self.time_calibration.or(other.time_calibration),
        }
    }

    /// Read and apply every supplied calibration.
    fn apply(self, correlator: &mut Correlator) -> Result<(), DfError> {
        let Self {
            frequency_calibration,
            cable_calibration,
            time_calibration,
        } = self;

        let mut printer = InfoPrinter::new("Calibration".into());
        if let Some(file) = &cable_calibration {
            let cal = CableCalibration::read_from_file(file)?;
            correlator.apply_cable_calibration(&cal)?;
            printer.push_line(format!("Cables from {}", file.display()).into());
        }
        if let Some(file) = &frequency_calibration {
            let cal = FrequencyBinCalibration::read_from_file(file)?;
            correlator.apply_frequency_bin_calibration(&cal)?;
            printer.push_line(
                format!(
                    "Frequency bins from {} ({} frequencies)",
                    file.display(),
                    cal.axis.len()
                )
                .into(),
            );
        }
        if let Some(file) = &time_calibration {
            let cal = TimeDomainCalibration::read_from_file(file)?;
            correlator.set_time_domain_calibration(&cal)?;
            printer.push_line(format!("Time domain from {}", file.display()).into());
        }

        if frequency_calibration.is_none()
            && cable_calibration.is_none()
            && time_calibration.is_none()
        {
            "No calibration was supplied; estimates include any instrumental phases".warn();
        } else {
            printer.display();
        }
        Ok(())
    }
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct RunArgs {
    #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
    pub(super) args_file: Option<PathBuf>,

    #[clap(flatten)]
    #[serde(rename = "array")]
    #[serde(default)]
    pub(super) array_args: ArrayArgs,

    #[clap(flatten)]
    #[serde(rename = "simulation")]
    #[serde(default)]
    pub(super) simulation_args: SimulationArgs,

    #[clap(flatten)]
    #[serde(rename = "time-domain")]
    #[serde(default)]
    pub(super) time_domain_args: TimeDomainArgs,

    #[clap(flatten)]
    #[serde(rename = "calibration")]
    #[serde(default)]
    pub(super) calibration_args: CalibrationFileArgs,

    #[clap(flatten)]
    #[serde(rename = "run")]
    #[serde(default)]
    pub(super) run_args: RunCliArgs,
}

impl RunArgs {
    /// Both command-line and file arguments overlap in terms of what is
    /// available; this function consolidates everything that was specified
    /// into a single struct. Where applicable, it will prefer CLI parameters
    /// over those in the file.
    ///
    /// This function should only ever merge arguments, and not try to make
    /// sense of them.
    pub(super) fn merge(self) -> Result<RunArgs, DfError> {
        debug!("Merging command-line arguments with the argument file");

        let cli_args = self;

        if let Some(arg_file) = cli_args.args_file {
            // Read in the file arguments. Ensure all of the file args are
            // accounted for by pattern matching.
            let RunArgs {
                args_file: _,
                array_args,
                simulation_args,
                time_domain_args,
                calibration_args,
                run_args,
            } = unpack_arg_file!(arg_file);

            // Merge all the arguments, preferring the CLI args when available.
            Ok(RunArgs {
                args_file: None,
                array_args: cli_args.array_args.merge(array_args),
                simulation_args: cli_args.simulation_args.merge(simulation_args),
                time_domain_args: cli_args.time_domain_args.merge(time_domain_args),
                calibration_args: cli_args.calibration_args.merge(calibration_args),
                run_args: cli_args.run_args.merge(run_args),
            })
        } else {
            Ok(cli_args)
        }
    }

    fn parse(self) -> Result<RunParams, DfError> {
        debug!("{:#?}", self);

        // Expose all the struct fields to ensure they're all used.
        let RunArgs {
            args_file: _,
            array_args,
            simulation_args,
            time_domain_args,
            calibration_args,
            run_args:
                RunCliArgs {
                    impulse,
                    f_start,
                    f_stop,
                    iterations,
                    num_angles,
                    reference_baseline,
                    result_log,
                },
        } = self;

        let iterations = iterations.unwrap_or(DEFAULT_NUM_ITERATIONS);
        if iterations == 0 {
            return Err(RunArgsError::NoIterations.into());
        }

        let array = array_args.parse(simulation_args.num_channels())?;
        let generator = simulation_args.parse(Some(&array))?;
        let mut correlator = Correlator::new(Box::new(generator), time_domain_args.parse())?;
        calibration_args.apply(&mut correlator)?;

        let (band_start, band_stop) = correlator.band();
        let f_start = f_start.unwrap_or(band_start);
        let f_stop = f_stop.unwrap_or(band_stop);
        if !impulse && !(f_start < f_stop) {
            return Err(RunArgsError::BadFrequencyRange { f_start, f_stop }.into());
        }

        let config = DirectionFinderConfig {
            num_angles: num_angles.unwrap_or(DEFAULT_NUM_ANGLES),
            reference_baseline: reference_baseline.unwrap_or(0),
        };
        let finder = DirectionFinder::new(correlator, array, config)?;

        let mut printer = InfoPrinter::new("Direction finding".into());
        if impulse {
            printer.push_line("From impulses in the time domain".into());
        } else {
            printer.push_block(vec![
                "From the strongest signal in the frequency domain".into(),
                format!(
                    "between {} MHz and {} MHz on baseline {}",
                    f_start / 1e6,
                    f_stop / 1e6,
                    finder.array().baselines()[config.reference_baseline]
                )
                .into(),
            ]);
        }
        printer.push_line(format!("{} candidate angles", config.num_angles).into());
        printer.push_line(format!("{iterations} estimates").into());
        if let Some(file) = &result_log {
            printer.push_line(format!("Appending to {}", file.display()).into());
        }
        printer.display();
        display_warnings();

        Ok(RunParams {
            finder,
            impulse,
            f_start,
            f_stop,
            iterations,
            result_log,
        })
    }

    pub(super) fn run(self, dry_run: bool) -> Result<(), DfError> {
        debug!("Converting arguments into parameters");
        let params = self.parse()?;

        if dry_run {
            info!("Dry run -- exiting now.");
            return Ok(());
        }

        params.run()?;
        Ok(())
    }
}

struct RunParams {
    finder: DirectionFinder,
    impulse: bool,
    f_start: f64,
    f_stop: f64,
    iterations: usize,
    result_log: Option<PathBuf>,
}

impl RunParams {
    fn run(mut self) -> Result<Vec<DirectionEstimate>, DfError> {
        let mut result_log = self.result_log.as_ref().map(ResultLog::open).transpose()?;

        let mut estimates = Vec::with_capacity(self.iterations);
        for i in 1..=self.iterations {
            let estimate = if self.impulse {
                self.finder.estimate_from_impulse()?
            } else {
                self.finder
                    .estimate_from_strongest_signal(self.f_start, self.f_stop)?
            };
            match estimate.frequency {
                Some(freq) => info!(
                    "{i:>4}: {:>8.3}° at {:.3} MHz",
                    estimate.angle.to_degrees(),
                    freq / 1e6
                ),
                None => info!("{i:>4}: {:>8.3}°", estimate.angle.to_degrees()),
            }
            if let Some(log) = result_log.as_mut() {
                log.append(&estimate)?;
            }
            estimates.push(estimate);
        }

        Ok(estimates)
    }
}

#[derive(Error, Debug)]
pub(super) enum RunArgsError {
    #[error("The frequency range [{f_start} Hz, {f_stop} Hz) is empty")]
    BadFrequencyRange { f_start: f64, f_stop: f64 },

    #[error("The number of iterations must be at least 1")]
    NoIterations,
}
