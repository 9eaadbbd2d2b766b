// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Common arguments for command-line interfaces. Every subcommand drives a
//! simulated backend, so the same simulation arguments are shared between
//! them, as are the array and time-domain arguments.

mod printers;

pub(super) use printers::InfoPrinter;
pub(crate) use printers::{display_warnings, Warn};

use std::path::PathBuf;

use clap::Parser;
use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

use crate::{
    backend::{BackendError, SignalGenerator, SignalGeneratorConfig},
    constants::{
        DEFAULT_MAX_WINDOW_LENGTH, DEFAULT_NUM_CHANNELS, DEFAULT_SAMPLE_RATE,
        DEFAULT_TIME_DOMAIN_PADDING, DEFAULT_UPSAMPLE_FACTOR,
    },
    geometry::{AntennaArray, ArrayGeometryError},
    time_domain::TimeDomainConfig,
};

/// The radius of the default circular array \[metres\].
pub(super) const DEFAULT_ARRAY_RADIUS: f64 = 0.5;

lazy_static::lazy_static! {
    pub(super) static ref ARG_FILE_TYPES_COMMA_SEPARATED: String = ArgFileTypes::iter().join(", ");

    pub(super) static ref ARG_FILE_HELP: String =
        format!("All arguments may be specified in a file. Any CLI arguments override arguments set in the file. Supported formats: {}", *ARG_FILE_TYPES_COMMA_SEPARATED);

    static ref ARRAY_RADIUS_HELP: String =
        format!("The radius of a circular array, with one antenna per channel [metres]. Ignored if an array file is given. Default: {DEFAULT_ARRAY_RADIUS}");

    static ref NUM_CHANNELS_HELP: String =
        format!("The number of channels (antennas) to simulate. Default: {DEFAULT_NUM_CHANNELS}");

    static ref SAMPLE_RATE_HELP: String =
        format!("The sample rate of the simulated digitiser [Hz]. Default: {DEFAULT_SAMPLE_RATE}");

    static ref UPSAMPLE_FACTOR_HELP: String =
        format!("Time-domain correlations are resampled by this factor to find sub-sample delays. Default: {DEFAULT_UPSAMPLE_FACTOR}");

    static ref MAX_WINDOW_LENGTH_HELP: String =
        format!("At most this many samples of each channel are used in a time-domain correlation. Default: {DEFAULT_MAX_WINDOW_LENGTH}");

    static ref PADDING_HELP: String =
        format!("The largest delay that can be found in the time domain [samples]. Default: {DEFAULT_TIME_DOMAIN_PADDING}");
}

#[derive(Debug, Display, EnumIter, EnumString)]
pub(super) enum ArgFileTypes {
    #[strum(serialize = "toml")]
    Toml,
    #[strum(serialize = "json")]
    Json,
}

macro_rules! unpack_arg_file {
    ($arg_file:expr) => ({
        use std::{fs::File, io::Read, str::FromStr};

        use crate::cli::common::{ArgFileTypes, ARG_FILE_TYPES_COMMA_SEPARATED};

        debug!("Attempting to parse argument file {}", $arg_file.display());

        let mut contents = String::new();
        let arg_file_type = $arg_file
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .and_then(|e| ArgFileTypes::from_str(&e).ok());

        match arg_file_type {
            Some(ArgFileTypes::Toml) => {
                debug!("Parsing toml file...");
                let mut fh = File::open(&$arg_file)?;
                fh.read_to_string(&mut contents)?;
                match toml::from_str(&contents) {
                    Ok(p) => p,
                    Err(err) => {
                        return Err(DfError::ArgFile(format!(
                            "Couldn't decode toml structure from {:?}:\n{err}",
                            $arg_file
                        )))
                    }
                }
            }
            Some(ArgFileTypes::Json) => {
                debug!("Parsing json file...");
                let mut fh = File::open(&$arg_file)?;
                fh.read_to_string(&mut contents)?;
                match serde_json::from_str(&contents) {
                    Ok(p) => p,
                    Err(err) => {
                        return Err(DfError::ArgFile(format!(
                            "Couldn't decode json structure from {:?}:\n{err}",
                            $arg_file
                        )))
                    }
                }
            }

            _ => {
                return Err(DfError::ArgFile(format!(
                    "Argument file '{:?}' doesn't have a recognised file extension! Valid extensions are: {}", $arg_file, *ARG_FILE_TYPES_COMMA_SEPARATED)
                ))
            }
        }
    });
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct ArrayArgs {
    /// Path to a JSON file of antenna positions, one per channel, e.g.
    /// [{"x": 0.0, "y": 0.5}, ...] [metres].
    #[clap(long, parse(from_os_str), help_heading = "ARRAY")]
    pub(super) array_file: Option<PathBuf>,

    #[clap(long, help = ARRAY_RADIUS_HELP.as_str(), help_heading = "ARRAY")]
    pub(super) array_radius: Option<f64>,

    /// Put the first antenna of a circular array at its centre, with the
    /// others around the circle.
    #[clap(long, help_heading = "ARRAY")]
    #[serde(default)]
    pub(super) reference_antenna: bool,
}

impl ArrayArgs {
    pub(super) fn merge(self, other: Self) -> Self {
        Self {
            array_file: self.array_file.or(other.array_file),
            array_radius: self.array_radius.or(other.array_radius),
            reference_antenna: self.reference_antenna || other.reference_antenna,
        }
    }

    /// Make the array. Circular arrays have one antenna per channel.
    pub(super) fn parse(self, num_channels: usize) -> Result<AntennaArray, ArrayGeometryError> {
        let Self {
            array_file,
            array_radius,
            reference_antenna,
        } = self;

        let mut printer = InfoPrinter::new("Array".into());
        let array = match array_file {
            Some(file) => {
                let array = AntennaArray::from_geometry_file(&file)?;
                printer.push_line(format!("From {}", file.display()).into());
                array
            }
            None => {
                let radius = array_radius.unwrap_or(DEFAULT_ARRAY_RADIUS);
                if reference_antenna {
                    printer.push_line(
                        format!("Circular with a centre antenna, radius {radius} m").into(),
                    );
                    AntennaArray::circular_with_reference(radius, num_channels)?
                } else {
                    printer.push_line(format!("Circular, radius {radius} m").into());
                    AntennaArray::circular(radius, num_channels)?
                }
            }
        };
        let mut block = vec![format!(
            "{} antennas, {} baselines",
            array.len(),
            array.baselines().len()
        )
        .into()];
        for (i, antenna) in array.antennas().iter().enumerate() {
            block.push(format!("{i}: ({:>7.4}, {:>7.4}) m", antenna.x, antenna.y).into());
        }
        printer.push_block(block);
        printer.display();

        Ok(array)
    }
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct SimulationArgs {
    #[clap(long, help = NUM_CHANNELS_HELP.as_str(), help_heading = "SIMULATION")]
    pub(super) num_channels: Option<usize>,

    #[clap(long, help = SAMPLE_RATE_HELP.as_str(), help_heading = "SIMULATION")]
    pub(super) sample_rate: Option<f64>,

    /// The frequency of the simulated tone, as a fraction of the sample rate.
    /// Default: 0.25
    #[clap(long, help_heading = "SIMULATION")]
    pub(super) tone_freq: Option<f64>,

    /// The power of the tone's FFT bin over the mean power of a noise bin.
    /// Default: 0.1
    #[clap(long, help_heading = "SIMULATION")]
    pub(super) snr: Option<f64>,

    /// The instrumental delay-phase of each channel [radians]. Default: all
    /// zero
    #[clap(long, multiple_values(true), allow_hyphen_values = true, help_heading = "SIMULATION")]
    pub(super) phase_shifts: Option<Vec<f64>>,

    /// The relative tone amplitude of each channel. Default: all one
    #[clap(long, multiple_values(true), help_heading = "SIMULATION")]
    pub(super) amplitude_scales: Option<Vec<f64>>,

    /// The number of bits of the simulated ADC. Default: 8
    #[clap(long, help_heading = "SIMULATION")]
    pub(super) bits: Option<u32>,

    /// The number of samples per FFT. Spectra have half this many bins.
    /// Default: 2048
    #[clap(long, help_heading = "SIMULATION")]
    pub(super) samples: Option<usize>,

    /// The number of spectra accumulated per fetch. Default: 1
    #[clap(long, help_heading = "SIMULATION")]
    pub(super) accumulations: Option<usize>,

    /// The standard deviation of the noise on each channel, relative to full
    /// scale. Default: 1/3
    #[clap(long, help_heading = "SIMULATION")]
    pub(super) noise: Option<f64>,

    /// Simulate a plane wave arriving at the array from this angle [radians]
    /// rather than using the instrumental phase shifts.
    #[clap(long, allow_hyphen_values = true, help_heading = "SIMULATION")]
    pub(super) source_angle: Option<f64>,

    /// Seed the noise generator for reproducible output.
    #[clap(long, help_heading = "SIMULATION")]
    pub(super) seed: Option<u64>,
}

impl SimulationArgs {
    pub(super) fn merge(self, other: Self) -> Self {
        Self {
            num_channels: self.num_channels.or(other.num_channels),
            sample_rate: self.sample_rate.or(other.sample_rate),
            tone_freq: self.tone_freq.or(other.tone_freq),
            snr: self.snr.or(other.snr),
            phase_shifts: self.phase_shifts.or(other.phase_shifts),
            amplitude_scales: self.amplitude_scales.or(other.amplitude_scales),
            bits: self.bits.or(other.bits),
            samples: self.samples.or(other.samples),
            accumulations: self.accumulations.or(other.accumulations),
            noise: self.noise.or(other.noise),
            source_angle: self.source_angle.or(other.source_angle),
            seed: self.seed.or(other.seed),
        }
    }

    pub(super) fn num_channels(&self) -> usize {
        self.num_channels.unwrap_or(DEFAULT_NUM_CHANNELS)
    }

    pub(super) fn to_config(&self) -> SignalGeneratorConfig {
        let defaults = SignalGeneratorConfig::default();
        SignalGeneratorConfig {
            num_channels: self.num_channels(),
            sample_rate: self.sample_rate.unwrap_or(defaults.sample_rate),
            tone_freq: self.tone_freq.unwrap_or(defaults.tone_freq),
            snr: self.snr.unwrap_or(defaults.snr),
            phase_shifts: self.phase_shifts.clone().unwrap_or_default(),
            amplitude_scales: self.amplitude_scales.clone().unwrap_or_default(),
            bits: self.bits.unwrap_or(defaults.bits),
            samples: self.samples.unwrap_or(defaults.samples),
            accumulations: self.accumulations.unwrap_or(defaults.accumulations),
            noise_stddev: self.noise.unwrap_or(defaults.noise_stddev),
            seed: self.seed,
            ..defaults
        }
    }

    /// Make the signal generator. If a source angle and an array were given,
    /// the array determines the phases of each channel.
    pub(super) fn parse(
        self,
        array: Option<&AntennaArray>,
    ) -> Result<SignalGenerator, BackendError> {
        let config = self.to_config();

        let mut printer = InfoPrinter::new("Simulated backend".into());
        printer.push_block(vec![
            format!(
                "{} channels at {} MHz",
                config.num_channels,
                config.sample_rate / 1e6
            )
            .into(),
            format!(
                "{} samples per FFT, {} spectra per fetch",
                config.samples, config.accumulations
            )
            .into(),
            format!("{}-bit ADC, {}-bit FFT", config.bits, config.fft_bits).into(),
        ]);
        printer.push_line(
            format!(
                "Tone at {} MHz with SNR {}",
                config.tone_freq * config.sample_rate / 1e6,
                config.snr
            )
            .into(),
        );

        let generator = SignalGenerator::new(config)?;
        let generator = match (self.source_angle, array) {
            (Some(angle), Some(array)) => {
                printer.push_line(format!("Source at {angle} rad").into());
                generator.with_source(array.clone(), angle)?
            }
            _ => generator,
        };
        printer.display();

        Ok(generator)
    }
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct TimeDomainArgs {
    #[clap(long, help = UPSAMPLE_FACTOR_HELP.as_str(), help_heading = "TIME DOMAIN")]
    pub(super) upsample_factor: Option<usize>,

    #[clap(long, help = MAX_WINDOW_LENGTH_HELP.as_str(), help_heading = "TIME DOMAIN")]
    pub(super) max_window_length: Option<usize>,

    #[clap(long, help = PADDING_HELP.as_str(), help_heading = "TIME DOMAIN")]
    pub(super) padding: Option<usize>,
}

impl TimeDomainArgs {
    pub(super) fn merge(self, other: Self) -> Self {
        Self {
            upsample_factor: self.upsample_factor.or(other.upsample_factor),
            max_window_length: self.max_window_length.or(other.max_window_length),
            padding: self.padding.or(other.padding),
        }
    }

    pub(super) fn parse(self) -> TimeDomainConfig {
        let defaults = TimeDomainConfig::default();
        let config = TimeDomainConfig {
            upsample_factor: self.upsample_factor.unwrap_or(defaults.upsample_factor),
            max_window_length: self.max_window_length.unwrap_or(defaults.max_window_length),
            padding: self.padding.unwrap_or(defaults.padding),
        };
        debug!("Time-domain settings: {config:?}");
        config
    }
}
