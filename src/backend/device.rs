// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! An adapter for correlator hardware.
//!
//! The hardware itself is reached through a [`DeviceClient`], which only needs
//! to read and write named registers and snapshot blocks. Cross spectra are
//! split over two snapshot blocks per baseline (`snap_{i}x{j}_0` and
//! `snap_{i}x{j}_1`), holding the even and odd bins respectively as
//! big-endian `i64` (real, imaginary) pairs.

use byteorder::{BigEndian, ByteOrder};
use log::{debug, trace};
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

use super::{AcquisitionBackend, BackendError, OverflowStatus};
use crate::{
    c64,
    constants::{DEFAULT_NUM_CHANNELS, DEFAULT_SAMPLE_RATE},
    geometry::Baseline,
    time_domain::TimeDomainWindow,
};

const CONTROL_REGISTER: &str = "control";
const ACC_LEN_REGISTER: &str = "acc_len";
const FFT_OVERFLOW_REGISTER: &str = "fft_overflow";
const TIME_DOMAIN_SNAPSHOT: &str = "dram";

/// Time-domain snapshots interleave channels in groups of this many samples.
const TIME_DOMAIN_GROUP: usize = 4;

/// Register and snapshot access to a device.
pub trait DeviceClient {
    /// Arm a snapshot block so that it captures on the next trigger.
    fn snapshot_arm(&mut self, name: &str) -> Result<(), BackendError>;

    /// Read the contents of a snapshot block. If `force` is set, the block is
    /// triggered immediately rather than waiting.
    fn snapshot_get(&mut self, name: &str, force: bool) -> Result<Vec<u8>, BackendError>;

    fn read_uint(&mut self, register: &str) -> Result<u32, BackendError>;

    fn write_int(&mut self, register: &str, value: u32) -> Result<(), BackendError>;
}

/// A shadow of the device's control register. Every change is written
/// through to the device.
///
/// | bits  | purpose                           |
/// |-------|-----------------------------------|
/// | 0     | sync                              |
/// | 1     | snapshot gate; set allows trigger |
/// | 2     | accumulation counter reset        |
/// | 3     | overflow latch reset              |
/// | 4     | impulse snapshot arm              |
/// | 5..16 | FFT shift schedule                |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlRegister {
    value: u32,
}

impl ControlRegister {
    const SYNC: u32 = 0;
    const SNAP_GATE: u32 = 1;
    const ACC_RESET: u32 = 2;
    const OVERFLOW_RESET: u32 = 3;
    const IMPULSE_ARM: u32 = 4;
    const SHIFT_OFFSET: u32 = 5;
    const SHIFT_MASK: u32 = 0xFFF;

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn shift_schedule(&self) -> u32 {
        (self.value >> Self::SHIFT_OFFSET) & Self::SHIFT_MASK
    }

    fn set_bit<C: DeviceClient + ?Sized>(
        &mut self,
        client: &mut C,
        bit: u32,
        on: bool,
    ) -> Result<(), BackendError> {
        if on {
            self.value |= 1 << bit;
        } else {
            self.value &= !(1 << bit);
        }
        client.write_int(CONTROL_REGISTER, self.value)
    }

    /// Set a bit high, then low again.
    fn pulse<C: DeviceClient + ?Sized>(
        &mut self,
        client: &mut C,
        bit: u32,
    ) -> Result<(), BackendError> {
        self.set_bit(client, bit, true)?;
        self.set_bit(client, bit, false)
    }

    pub fn sync<C: DeviceClient + ?Sized>(&mut self, client: &mut C) -> Result<(), BackendError> {
        self.pulse(client, Self::SYNC)
    }

    pub fn allow_trigger<C: DeviceClient + ?Sized>(
        &mut self,
        client: &mut C,
    ) -> Result<(), BackendError> {
        self.set_bit(client, Self::SNAP_GATE, true)
    }

    pub fn block_trigger<C: DeviceClient + ?Sized>(
        &mut self,
        client: &mut C,
    ) -> Result<(), BackendError> {
        self.set_bit(client, Self::SNAP_GATE, false)
    }

    pub fn reset_accumulation_counter<C: DeviceClient + ?Sized>(
        &mut self,
        client: &mut C,
    ) -> Result<(), BackendError> {
        self.pulse(client, Self::ACC_RESET)
    }

    pub fn reset_overflow<C: DeviceClient + ?Sized>(
        &mut self,
        client: &mut C,
    ) -> Result<(), BackendError> {
        self.pulse(client, Self::OVERFLOW_RESET)
    }

    pub fn arm_impulse<C: DeviceClient + ?Sized>(
        &mut self,
        client: &mut C,
    ) -> Result<(), BackendError> {
        self.pulse(client, Self::IMPULSE_ARM)
    }

    pub fn set_shift_schedule<C: DeviceClient + ?Sized>(
        &mut self,
        client: &mut C,
        schedule: u32,
    ) -> Result<(), BackendError> {
        if schedule > Self::SHIFT_MASK {
            return Err(BackendError::ShiftScheduleTooBig(schedule));
        }
        self.value &= !(Self::SHIFT_MASK << Self::SHIFT_OFFSET);
        self.value |= schedule << Self::SHIFT_OFFSET;
        client.write_int(CONTROL_REGISTER, self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub num_channels: usize,

    /// \[Hz\]
    pub sample_rate: f64,

    /// The number of bins of each cross spectrum.
    pub num_bins: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            num_channels: DEFAULT_NUM_CHANNELS,
            sample_rate: DEFAULT_SAMPLE_RATE,
            num_bins: 1024,
        }
    }
}

/// Correlator hardware as an [`AcquisitionBackend`].
pub struct DeviceBackend<C: DeviceClient> {
    client: C,
    control: ControlRegister,
    config: DeviceConfig,
}

impl<C: DeviceClient> DeviceBackend<C> {
    /// Take control of a device. Its control register is cleared.
    pub fn new(mut client: C, config: DeviceConfig) -> Result<DeviceBackend<C>, BackendError> {
        let control = ControlRegister::default();
        client.write_int(CONTROL_REGISTER, control.value())?;
        debug!(
            "Using a {}-channel device with {} bins per spectrum",
            config.num_channels, config.num_bins
        );
        Ok(DeviceBackend {
            client,
            control,
            config,
        })
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn control(&self) -> ControlRegister {
        self.control
    }

    /// Set the number of spectra accumulated per integration. The
    /// accumulation counter is reset and the device resynchronised.
    pub fn set_accumulation_length(&mut self, acc_len: u32) -> Result<(), BackendError> {
        self.client.write_int(ACC_LEN_REGISTER, acc_len)?;
        self.control.reset_accumulation_counter(&mut self.client)?;
        self.control.sync(&mut self.client)?;
        debug!("Accumulation length is now {acc_len}");
        Ok(())
    }

    pub fn set_shift_schedule(&mut self, schedule: u32) -> Result<(), BackendError> {
        self.control.set_shift_schedule(&mut self.client, schedule)?;
        debug!("FFT shift schedule is now {schedule:#x}");
        Ok(())
    }

    fn check_baseline(&self, baseline: Baseline) -> Result<(), BackendError> {
        if baseline.j >= self.config.num_channels {
            return Err(BackendError::UnknownBaseline {
                baseline,
                num_channels: self.config.num_channels,
            });
        }
        Ok(())
    }
}

fn snapshot_names(baseline: Baseline) -> [String; 2] {
    [format!("snap_{baseline}_0"), format!("snap_{baseline}_1")]
}

/// Decode big-endian `i64` (real, imaginary) pairs.
fn decode_complex(name: &str, bytes: &[u8]) -> Result<Vec<c64>, BackendError> {
    if bytes.len() % 16 != 0 {
        return Err(BackendError::SnapshotLength {
            name: name.to_string(),
            len: bytes.len(),
            multiple: 16,
        });
    }
    Ok(bytes
        .chunks_exact(16)
        .map(|pair| {
            c64::new(
                BigEndian::read_i64(&pair[..8]) as f64,
                BigEndian::read_i64(&pair[8..]) as f64,
            )
        })
        .collect())
}

/// Reassemble a spectrum from its even and odd bins.
fn interleave(even: Vec<c64>, odd: Vec<c64>) -> Vec<c64> {
    even.into_iter()
        .zip(odd)
        .flat_map(|(e, o)| [e, o])
        .collect()
}

impl<C: DeviceClient> AcquisitionBackend for DeviceBackend<C> {
    fn num_channels(&self) -> usize {
        self.config.num_channels
    }

    fn sample_rate(&self) -> f64 {
        self.config.sample_rate
    }

    fn band(&self) -> (f64, f64) {
        (0.0, self.config.sample_rate / 2.0)
    }

    fn num_bins(&self) -> usize {
        self.config.num_bins
    }

    fn arm(&mut self, baseline: Baseline) -> Result<(), BackendError> {
        self.check_baseline(baseline)?;
        for name in snapshot_names(baseline) {
            self.client.snapshot_arm(&name)?;
        }
        Ok(())
    }

    fn fetch_cross(&mut self, baseline: Baseline) -> Result<Vec<c64>, BackendError> {
        self.check_baseline(baseline)?;
        let [name_0, name_1] = snapshot_names(baseline);
        let even = decode_complex(&name_0, &self.client.snapshot_get(&name_0, false)?)?;
        let odd = decode_complex(&name_1, &self.client.snapshot_get(&name_1, false)?)?;
        if even.len() != odd.len() {
            return Err(BackendError::SnapshotHalves {
                name: format!("snap_{baseline}"),
                first: even.len(),
                second: odd.len(),
            });
        }
        trace!("Fetched {} bins from baseline {baseline}", even.len() * 2);
        Ok(interleave(even, odd))
    }

    /// All baselines are armed while the trigger is blocked, so they all
    /// capture the same integration.
    fn fetch_crosses(&mut self, baselines: &[Baseline]) -> Result<Vec<Vec<c64>>, BackendError> {
        self.control.block_trigger(&mut self.client)?;
        for &baseline in baselines {
            self.arm(baseline)?;
        }
        self.control.allow_trigger(&mut self.client)?;
        baselines
            .iter()
            .map(|&baseline| self.fetch_cross(baseline))
            .collect()
    }

    fn fetch_time_domain_window(&mut self) -> Result<TimeDomainWindow, BackendError> {
        self.client.snapshot_arm(TIME_DOMAIN_SNAPSHOT)?;
        self.control.arm_impulse(&mut self.client)?;
        let bytes = self.client.snapshot_get(TIME_DOMAIN_SNAPSHOT, false)?;

        let n = self.config.num_channels;
        let block = TIME_DOMAIN_GROUP * n;
        if bytes.len() % block != 0 {
            return Err(BackendError::SnapshotLength {
                name: TIME_DOMAIN_SNAPSHOT.to_string(),
                len: bytes.len(),
                multiple: block,
            });
        }
        let num_samples = bytes.len() / n;
        let mut samples = Array2::zeros((n, num_samples));
        for (b, chunk) in bytes.chunks_exact(block).enumerate() {
            for (channel, group) in chunk.chunks_exact(TIME_DOMAIN_GROUP).enumerate() {
                for (k, &byte) in group.iter().enumerate() {
                    samples[(channel, b * TIME_DOMAIN_GROUP + k)] = f64::from(byte as i8) / 128.0;
                }
            }
        }
        Ok(TimeDomainWindow::new(samples, self.config.sample_rate))
    }

    fn overflow_status(&mut self) -> Result<OverflowStatus, BackendError> {
        let fft = self.client.read_uint(FFT_OVERFLOW_REGISTER)? != 0;
        Ok(OverflowStatus {
            fft,
            ..Default::default()
        })
    }

    fn clear_overflow(&mut self) -> Result<(), BackendError> {
        self.control.reset_overflow(&mut self.client)
    }
}
