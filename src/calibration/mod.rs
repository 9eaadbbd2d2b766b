// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Calibration files.
//!
//! There are three kinds of calibration, all stored as JSON:
//!
//! - frequency bin calibrations, a table of phases per baseline over a
//!   frequency axis: `{"axis": [...], "01": [...], "metadata": {"created":
//!   "..."}}`;
//! - cable calibrations, a cable length and velocity factor per channel:
//!   `{"0": {"length": 1.2, "velocity factor": 0.66}}`; and
//! - time-domain calibrations, a delay per baseline \[seconds\]: `{"0x1":
//!   1.5e-9, "metadata": {"created": "..."}}`.
//!
//! Any problem with a file is an error when it's read; nothing is partially
//! loaded.

mod error;

pub use error::{CalibrationApplyError, CalibrationReadError, CalibrationWriteError};

use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

use chrono::{SecondsFormat, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::{
    constants::TAU,
    correlation::{cable_delay, Correlator, CorrelationError},
    geometry::{AntennaArray, Baseline},
    time_domain::TimeDomainCorrelation,
};

const AXIS_KEY: &str = "axis";
const METADATA_KEY: &str = "metadata";
const CREATED_KEY: &str = "created";

/// A phase table per baseline, each over the same frequency axis.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyBinCalibration {
    /// \[Hz\]
    pub axis: Vec<f64>,

    /// \[radians\]
    pub phases: BTreeMap<Baseline, Vec<f64>>,

    /// When this calibration was made (ISO-8601).
    pub created: Option<String>,
}

impl FrequencyBinCalibration {
    /// Measure a calibration from the spectra currently held by a correlator.
    /// The phases of every bin of every baseline are recorded. This is only
    /// meaningful if the same broadband signal is fed into every channel, and
    /// if the correlator has no frequency bin calibration applied.
    pub fn from_correlator(correlator: &Correlator) -> FrequencyBinCalibration {
        let axis = correlator
            .channels()
            .first()
            .map(|c| c.spectrum().frequencies())
            .unwrap_or_default();
        let phases = correlator
            .channels()
            .iter()
            .map(|c| {
                (
                    c.baseline(),
                    c.spectrum().values.iter().map(|v| v.arg()).collect(),
                )
            })
            .collect();
        FrequencyBinCalibration {
            axis,
            phases,
            created: Some(now()),
        }
    }

    /// The phases an array would have over `axis` \[Hz\] for a source at
    /// `angle` \[radians\].
    pub fn from_array_response(
        array: &AntennaArray,
        angle: f64,
        axis: Vec<f64>,
    ) -> FrequencyBinCalibration {
        let phases = array
            .baselines()
            .iter()
            .map(|&bl| {
                (
                    bl,
                    axis.iter()
                        .map(|&f| array.baseline_phase_difference(bl, angle, f))
                        .collect(),
                )
            })
            .collect();
        FrequencyBinCalibration {
            axis,
            phases,
            created: Some(now()),
        }
    }

    pub fn read_from_file<P: AsRef<Path>>(
        file: P,
    ) -> Result<FrequencyBinCalibration, CalibrationReadError> {
        let file = file.as_ref();
        let file_str = file.display().to_string();
        debug!("Reading frequency bin calibration from {file_str}");
        let mut map = read_json_object(file)?;
        let created = take_created(&mut map);

        let axis = map
            .remove(AXIS_KEY)
            .ok_or_else(|| CalibrationReadError::MissingAxis {
                file: file_str.clone(),
            })?;
        let axis = numbers(&axis).ok_or_else(|| CalibrationReadError::NotNumeric {
            file: file_str.clone(),
            key: AXIS_KEY.to_string(),
        })?;
        if axis.is_empty() {
            return Err(CalibrationReadError::EmptyAxis { file: file_str });
        }

        let mut phases = BTreeMap::new();
        for (key, value) in map {
            let baseline =
                parse_bin_key(&key).ok_or_else(|| CalibrationReadError::BadBaselineKey {
                    file: file_str.clone(),
                    key: key.clone(),
                })?;
            let values = numbers(&value).ok_or_else(|| CalibrationReadError::NotNumeric {
                file: file_str.clone(),
                key: key.clone(),
            })?;
            if values.len() != axis.len() {
                return Err(CalibrationReadError::PhaseLength {
                    file: file_str,
                    key,
                    expected: axis.len(),
                    got: values.len(),
                });
            }
            phases.insert(baseline, values);
        }

        Ok(FrequencyBinCalibration {
            axis,
            phases,
            created,
        })
    }

    pub fn write_to_file<P: AsRef<Path>>(&self, file: P) -> Result<(), CalibrationWriteError> {
        let mut map = Map::new();
        map.insert(AXIS_KEY.to_string(), json!(self.axis));
        for (&baseline, phases) in &self.phases {
            if baseline.i > 9 || baseline.j > 9 {
                return Err(CalibrationWriteError::BaselineKey(baseline));
            }
            map.insert(format!("{}{}", baseline.i, baseline.j), json!(phases));
        }
        insert_created(&mut map, self.created.as_deref());
        write_json(file.as_ref(), &Value::Object(map))
    }
}

/// The cable of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CableSpec {
    /// \[metres\]
    pub length: f64,

    /// The fraction of the speed of light that signals travel along the
    /// cable.
    #[serde(rename = "velocity factor")]
    pub velocity_factor: f64,
}

impl CableSpec {
    /// The signal delay through this cable \[seconds\]. Lengths must be
    /// finite and non-negative, and velocity factors finite and positive.
    pub fn delay(&self) -> Result<f64, CorrelationError> {
        cable_delay(self.length, self.velocity_factor)
    }
}

/// The cables of each channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CableCalibration {
    pub cables: BTreeMap<usize, CableSpec>,
}

impl CableCalibration {
    /// The extra delay of channel `j`'s cable over channel `i`'s
    /// \[seconds\]. `None` if either channel isn't known.
    pub fn baseline_delay(&self, baseline: Baseline) -> Option<f64> {
        let i = self.cables.get(&baseline.i)?;
        let j = self.cables.get(&baseline.j)?;
        Some(j.delay().ok()? - i.delay().ok()?)
    }

    /// The phase the cables add to a baseline at `freq` \[Hz\].
    pub fn baseline_phase(&self, baseline: Baseline, freq: f64) -> Option<f64> {
        self.baseline_delay(baseline).map(|t| TAU * t * freq)
    }

    pub fn read_from_file<P: AsRef<Path>>(
        file: P,
    ) -> Result<CableCalibration, CalibrationReadError> {
        let file = file.as_ref();
        let file_str = file.display().to_string();
        debug!("Reading cable calibration from {file_str}");
        let mut map = read_json_object(file)?;
        map.remove(METADATA_KEY);

        let mut cables = BTreeMap::new();
        for (key, value) in map {
            let channel: usize =
                key.parse()
                    .map_err(|_| CalibrationReadError::BadChannelKey {
                        file: file_str.clone(),
                        key: key.clone(),
                    })?;
            let cable: CableSpec =
                serde_json::from_value(value).map_err(|err| CalibrationReadError::Json {
                    file: file_str.clone(),
                    err,
                })?;
            if cable.delay().is_err() {
                return Err(CalibrationReadError::BadCable {
                    file: file_str,
                    channel,
                    length: cable.length,
                    velocity_factor: cable.velocity_factor,
                });
            }
            cables.insert(channel, cable);
        }

        Ok(CableCalibration { cables })
    }

    pub fn write_to_file<P: AsRef<Path>>(&self, file: P) -> Result<(), CalibrationWriteError> {
        let map: BTreeMap<String, CableSpec> = self
            .cables
            .iter()
            .map(|(channel, cable)| (channel.to_string(), *cable))
            .collect();
        let value = serde_json::to_value(map).map_err(|err| CalibrationWriteError::Json {
            file: file.as_ref().display().to_string(),
            err,
        })?;
        write_json(file.as_ref(), &value)
    }
}

/// A delay per baseline to be subtracted from time-domain correlations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeDomainCalibration {
    /// \[seconds\]
    pub offsets: BTreeMap<Baseline, f64>,

    /// When this calibration was made (ISO-8601).
    pub created: Option<String>,
}

impl TimeDomainCalibration {
    /// Record the peak delay of each correlation. These should be made while
    /// the same impulsive signal is fed into every channel, with no
    /// time-domain calibration applied.
    pub fn from_correlations(correlations: &[TimeDomainCorrelation]) -> TimeDomainCalibration {
        TimeDomainCalibration {
            offsets: correlations
                .iter()
                .filter_map(|c| c.peak_delay().map(|d| (c.baseline, d)))
                .collect(),
            created: Some(now()),
        }
    }

    pub fn read_from_file<P: AsRef<Path>>(
        file: P,
    ) -> Result<TimeDomainCalibration, CalibrationReadError> {
        let file = file.as_ref();
        let file_str = file.display().to_string();
        debug!("Reading time-domain calibration from {file_str}");
        let mut map = read_json_object(file)?;
        let created = take_created(&mut map);

        let mut offsets = BTreeMap::new();
        for (key, value) in map {
            let baseline =
                parse_time_key(&key).ok_or_else(|| CalibrationReadError::BadBaselineKey {
                    file: file_str.clone(),
                    key: key.clone(),
                })?;
            let offset = value
                .as_f64()
                .ok_or_else(|| CalibrationReadError::NotANumber {
                    file: file_str.clone(),
                    key,
                })?;
            offsets.insert(baseline, offset);
        }

        Ok(TimeDomainCalibration { offsets, created })
    }

    pub fn write_to_file<P: AsRef<Path>>(&self, file: P) -> Result<(), CalibrationWriteError> {
        let mut map = Map::new();
        for (baseline, &offset) in &self.offsets {
            map.insert(baseline.to_string(), json!(offset));
        }
        insert_created(&mut map, self.created.as_deref());
        write_json(file.as_ref(), &Value::Object(map))
    }
}

/// The current time, as ISO-8601.
fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn read_json_object(file: &Path) -> Result<Map<String, Value>, CalibrationReadError> {
    let value: Value = serde_json::from_reader(BufReader::new(File::open(file)?)).map_err(
        |err| CalibrationReadError::Json {
            file: file.display().to_string(),
            err,
        },
    )?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(CalibrationReadError::NotAnObject {
            file: file.display().to_string(),
        }),
    }
}

fn write_json(file: &Path, value: &Value) -> Result<(), CalibrationWriteError> {
    debug!("Writing calibration to {}", file.display());
    let mut writer = BufWriter::new(File::create(file)?);
    serde_json::to_writer_pretty(&mut writer, value).map_err(|err| {
        CalibrationWriteError::Json {
            file: file.display().to_string(),
            err,
        }
    })?;
    writer.flush()?;
    Ok(())
}

/// Remove the metadata from a calibration object, returning the creation time
/// if there is one.
fn take_created(map: &mut Map<String, Value>) -> Option<String> {
    map.remove(METADATA_KEY).and_then(|metadata| {
        metadata
            .get(CREATED_KEY)
            .and_then(|c| c.as_str())
            .map(|c| c.to_string())
    })
}

fn insert_created(map: &mut Map<String, Value>, created: Option<&str>) {
    if let Some(created) = created {
        let mut metadata = Map::new();
        metadata.insert(CREATED_KEY.to_string(), json!(created));
        map.insert(METADATA_KEY.to_string(), Value::Object(metadata));
    }
}

fn numbers(value: &Value) -> Option<Vec<f64>> {
    value.as_array()?.iter().map(|v| v.as_f64()).collect()
}

/// Frequency bin calibrations key baselines by their two (single-digit)
/// channel numbers, e.g. "03".
fn parse_bin_key(key: &str) -> Option<Baseline> {
    let mut chars = key.chars();
    let i = chars.next()?.to_digit(10)? as usize;
    let j = chars.next()?.to_digit(10)? as usize;
    if chars.next().is_some() || i >= j {
        return None;
    }
    Some(Baseline { i, j })
}

/// Time-domain calibrations key baselines like "0x3".
fn parse_time_key(key: &str) -> Option<Baseline> {
    let (i, j) = key.split_once('x')?;
    let i: usize = i.parse().ok()?;
    let j: usize = j.parse().ok()?;
    if i >= j {
        return None;
    }
    Some(Baseline { i, j })
}
