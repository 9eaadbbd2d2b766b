// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::collections::HashMap;

use approx::assert_abs_diff_eq;

use super::*;
use crate::{geometry::AntennaArray, math::wrap_phase};

fn generator_config() -> SignalGeneratorConfig {
    SignalGeneratorConfig {
        samples: 256,
        tone_freq: 0.25,
        snr: 100.0,
        accumulations: 10,
        seed: Some(1234),
        ..Default::default()
    }
}

fn bl(i: usize, j: usize) -> Baseline {
    Baseline { i, j }
}

#[test]
fn test_generator_rejects_bad_config() {
    let check = |config: SignalGeneratorConfig| SignalGenerator::new(config).err();

    assert!(matches!(
        check(SignalGeneratorConfig {
            num_channels: 1,
            ..generator_config()
        }),
        Some(BackendError::TooFewChannels(1))
    ));
    assert!(matches!(
        check(SignalGeneratorConfig {
            samples: 255,
            ..generator_config()
        }),
        Some(BackendError::BadSampleCount(255))
    ));
    assert!(matches!(
        check(SignalGeneratorConfig {
            tone_freq: 0.5,
            ..generator_config()
        }),
        Some(BackendError::BadToneFrequency(_))
    ));
    assert!(matches!(
        check(SignalGeneratorConfig {
            snr: -1.0,
            ..generator_config()
        }),
        Some(BackendError::BadSnr(_))
    ));
    assert!(matches!(
        check(SignalGeneratorConfig {
            bits: 0,
            ..generator_config()
        }),
        Some(BackendError::BadBitDepth(0))
    ));
    assert!(matches!(
        check(SignalGeneratorConfig {
            phase_shifts: vec![0.0, 1.0],
            ..generator_config()
        }),
        Some(BackendError::ChannelCountMismatch { got: 2, .. })
    ));
    assert!(matches!(
        check(SignalGeneratorConfig {
            accumulations: 0,
            ..generator_config()
        }),
        Some(BackendError::NoAccumulations)
    ));

    let array = AntennaArray::circular(0.5, 3).unwrap();
    let result = SignalGenerator::new(generator_config())
        .unwrap()
        .with_source(array, 0.0);
    assert!(matches!(
        result.err(),
        Some(BackendError::SourceArrayMismatch {
            got: 3,
            num_channels: 4
        })
    ));
}

#[test]
fn test_generator_shape() {
    let mut gen = SignalGenerator::new(generator_config()).unwrap();
    assert_eq!(gen.num_channels(), 4);
    assert_eq!(gen.num_bins(), 128);
    assert_eq!(gen.band(), (0.0, 400e6));
    assert_eq!(gen.tone_bin(), 64);
    assert_abs_diff_eq!(gen.tone_frequency(), 200e6);

    let result = gen.fetch_cross(bl(0, 1));
    assert!(matches!(result, Err(BackendError::NotArmed(_))));
    let result = gen.arm(bl(2, 4));
    assert!(matches!(result, Err(BackendError::UnknownBaseline { .. })));

    let spectra = gen.fetch_crosses(&[bl(0, 1), bl(1, 3)]).unwrap();
    assert_eq!(spectra.len(), 2);
    assert!(spectra.iter().all(|s| s.len() == 128));
}

#[test]
fn test_generator_phase_shifts() {
    let phases = [0.0, 1.0, -0.5, 2.0];
    let mut gen = SignalGenerator::new(SignalGeneratorConfig {
        phase_shifts: phases.to_vec(),
        ..generator_config()
    })
    .unwrap();
    let baselines = [bl(0, 1), bl(0, 2), bl(0, 3), bl(1, 2), bl(1, 3), bl(2, 3)];
    let spectra = gen.fetch_crosses(&baselines).unwrap();
    let k = gen.tone_bin();
    for (baseline, spectrum) in baselines.iter().zip(spectra.iter()) {
        let expected = wrap_phase(phases[baseline.j] - phases[baseline.i]);
        assert_abs_diff_eq!(wrap_phase(spectrum[k].arg() - expected), 0.0, epsilon = 0.1);

        // The tone is by far the strongest bin.
        let strongest = crate::math::argmax(spectrum.iter().map(|v| v.norm())).unwrap();
        assert_eq!(strongest, k);
    }
}

#[test]
fn test_generator_source() {
    let array = AntennaArray::circular(0.5, 4).unwrap();
    let angle = 0.8;
    let mut gen = SignalGenerator::new(generator_config())
        .unwrap()
        .with_source(array.clone(), angle)
        .unwrap();
    assert!(gen.source().is_some());

    let spectra = gen.fetch_crosses(array.baselines()).unwrap();
    let k = gen.tone_bin();
    let expected = array.phase_differences_at_angle(angle, gen.tone_frequency());
    for (spectrum, expected) in spectra.iter().zip(expected) {
        assert_abs_diff_eq!(wrap_phase(spectrum[k].arg() - expected), 0.0, epsilon = 0.1);
    }
}

#[test]
fn test_generator_is_reproducible() {
    let mut a = SignalGenerator::new(generator_config()).unwrap();
    let mut b = SignalGenerator::new(generator_config()).unwrap();
    let baselines = [bl(0, 1), bl(2, 3)];
    assert_eq!(
        a.fetch_crosses(&baselines).unwrap(),
        b.fetch_crosses(&baselines).unwrap()
    );
}

#[test]
fn test_accumulated_phases_converge() {
    let mut gen = SignalGenerator::new(SignalGeneratorConfig {
        phase_shifts: vec![0.0, 1.234, 0.0, 0.0],
        snr: 1.0,
        accumulations: 1,
        ..generator_config()
    })
    .unwrap();
    let phases = gen.accumulated_phases(bl(0, 1), 2000).unwrap();
    assert_eq!(phases.len(), 2000);

    let error = |p: &f64| wrap_phase(p - 1.234).abs();
    let early = phases[..10].iter().map(error).sum::<f64>() / 10.0;
    let late = phases[1900..].iter().map(error).sum::<f64>() / 100.0;
    assert!(late < early, "late error {late} isn't less than early error {early}");
    assert_abs_diff_eq!(wrap_phase(phases[1999] - 1.234), 0.0, epsilon = 0.1);
}

#[test]
fn test_generator_impulse() {
    let array = AntennaArray::circular(0.5, 4).unwrap();
    let angle = -2.0;
    let mut gen = SignalGenerator::new(SignalGeneratorConfig {
        noise_stddev: 0.0,
        ..generator_config()
    })
    .unwrap()
    .with_source(array.clone(), angle)
    .unwrap();
    let window = gen.fetch_time_domain_window().unwrap();
    assert_eq!(window.num_channels(), 4);
    assert_eq!(window.len(), 256);
    assert_abs_diff_eq!(window.sample_rate(), 800e6);

    // Each channel's impulse is within a sample of the geometric delay.
    for (channel, antenna) in array.antennas().iter().enumerate() {
        let row = window.samples().row(channel).to_vec();
        let peak = crate::math::argmax(row).unwrap() as f64;
        let expected = 128.0 + antenna.delay_at_angle(angle) * 800e6;
        assert!((peak - expected).abs() <= 0.5, "{peak} vs {expected}");
    }
    assert!(!gen.overflow_status().unwrap().any());
}

#[test]
fn test_generator_overflow() {
    let mut gen = SignalGenerator::new(SignalGeneratorConfig {
        impulse_amplitude: 2.0,
        ..generator_config()
    })
    .unwrap();
    gen.fetch_time_domain_window().unwrap();
    let status = gen.overflow_status().unwrap();
    assert!(status.adc);
    assert!(status.any());

    gen.clear_overflow().unwrap();
    assert_eq!(gen.overflow_status().unwrap(), OverflowStatus::default());
}

#[derive(Default)]
struct MockClient {
    registers: HashMap<String, u32>,
    writes: Vec<(String, u32)>,
    snapshots: HashMap<String, Vec<u8>>,
    armed: Vec<String>,
}

impl DeviceClient for MockClient {
    fn snapshot_arm(&mut self, name: &str) -> Result<(), BackendError> {
        self.armed.push(name.to_string());
        Ok(())
    }

    fn snapshot_get(&mut self, name: &str, _force: bool) -> Result<Vec<u8>, BackendError> {
        self.snapshots
            .get(name)
            .cloned()
            .ok_or_else(|| BackendError::Device(format!("no snapshot {name}")))
    }

    fn read_uint(&mut self, register: &str) -> Result<u32, BackendError> {
        Ok(self.registers.get(register).copied().unwrap_or(0))
    }

    fn write_int(&mut self, register: &str, value: u32) -> Result<(), BackendError> {
        self.registers.insert(register.to_string(), value);
        self.writes.push((register.to_string(), value));
        Ok(())
    }
}

fn encode(values: &[(i64, i64)]) -> Vec<u8> {
    values
        .iter()
        .flat_map(|(re, im)| re.to_be_bytes().into_iter().chain(im.to_be_bytes()))
        .collect()
}

fn device(client: MockClient) -> DeviceBackend<MockClient> {
    DeviceBackend::new(
        client,
        DeviceConfig {
            num_channels: 2,
            sample_rate: 800e6,
            num_bins: 4,
        },
    )
    .unwrap()
}

fn control_writes(client: &MockClient) -> Vec<u32> {
    client
        .writes
        .iter()
        .filter(|(r, _)| r == "control")
        .map(|(_, v)| *v)
        .collect()
}

#[test]
fn test_control_register() {
    let mut client = MockClient::default();
    let mut control = ControlRegister::default();

    control.set_shift_schedule(&mut client, 0xABC).unwrap();
    assert_eq!(control.value(), 0xABC << 5);
    assert_eq!(control.shift_schedule(), 0xABC);

    control.allow_trigger(&mut client).unwrap();
    assert_eq!(control.value(), (0xABC << 5) | 0b10);
    control.set_shift_schedule(&mut client, 0x001).unwrap();
    assert_eq!(control.value(), (1 << 5) | 0b10);
    control.block_trigger(&mut client).unwrap();
    assert_eq!(control.value(), 1 << 5);

    let result = control.set_shift_schedule(&mut client, 0x1000);
    assert!(matches!(result, Err(BackendError::ShiftScheduleTooBig(0x1000))));
    assert_eq!(control.value(), 1 << 5);

    // Pulses leave the value as it was.
    client.writes.clear();
    control.sync(&mut client).unwrap();
    control.arm_impulse(&mut client).unwrap();
    assert_eq!(
        control_writes(&client),
        vec![(1 << 5) | 1, 1 << 5, (1 << 5) | 0b1_0000, 1 << 5]
    );
}

#[test]
fn test_device_fetch_cross() {
    let mut client = MockClient::default();
    client
        .snapshots
        .insert("snap_0x1_0".to_string(), encode(&[(1, 2), (3, -4)]));
    client
        .snapshots
        .insert("snap_0x1_1".to_string(), encode(&[(-5, 6), (7, 1 << 40)]));
    let mut dev = device(client);

    let spectra = dev.fetch_crosses(&[bl(0, 1)]).unwrap();
    assert_eq!(
        spectra[0],
        vec![
            c64::new(1.0, 2.0),
            c64::new(-5.0, 6.0),
            c64::new(3.0, -4.0),
            c64::new(7.0, (1_i64 << 40) as f64),
        ]
    );

    // The trigger was blocked while arming, then allowed.
    assert_eq!(dev.client().armed, vec!["snap_0x1_0", "snap_0x1_1"]);
    assert_eq!(control_writes(dev.client()), vec![0, 0, 0b10]);

    assert!(matches!(
        dev.arm(bl(0, 2)),
        Err(BackendError::UnknownBaseline { .. })
    ));
}

#[test]
fn test_device_bad_snapshots() {
    let mut client = MockClient::default();
    client
        .snapshots
        .insert("snap_0x1_0".to_string(), vec![0; 17]);
    client
        .snapshots
        .insert("snap_0x1_1".to_string(), encode(&[(1, 1)]));
    let mut dev = device(client);
    assert!(matches!(
        dev.fetch_cross(bl(0, 1)),
        Err(BackendError::SnapshotLength { multiple: 16, .. })
    ));

    let mut client = MockClient::default();
    client
        .snapshots
        .insert("snap_0x1_0".to_string(), encode(&[(1, 1), (2, 2)]));
    client
        .snapshots
        .insert("snap_0x1_1".to_string(), encode(&[(1, 1)]));
    let mut dev = device(client);
    assert!(matches!(
        dev.fetch_cross(bl(0, 1)),
        Err(BackendError::SnapshotHalves {
            first: 2,
            second: 1,
            ..
        })
    ));
}

#[test]
fn test_device_time_domain_window() {
    let mut client = MockClient::default();
    let bytes: Vec<u8> = [0_i8, 1, 2, 3, 10, 11, 12, 13, 4, 5, 6, 7, -14, -15, -16, -17]
        .into_iter()
        .map(|b| b as u8)
        .collect();
    client.snapshots.insert("dram".to_string(), bytes);
    let mut dev = device(client);

    let window = dev.fetch_time_domain_window().unwrap();
    assert_eq!(window.num_channels(), 2);
    assert_eq!(window.len(), 8);
    let expected_0: Vec<f64> = (0..8).map(|v| v as f64 / 128.0).collect();
    let expected_1: Vec<f64> = [10, 11, 12, 13, -14, -15, -16, -17]
        .into_iter()
        .map(|v| v as f64 / 128.0)
        .collect();
    assert_eq!(window.samples().row(0).to_vec(), expected_0);
    assert_eq!(window.samples().row(1).to_vec(), expected_1);
    assert_eq!(dev.client().armed, vec!["dram"]);
}

#[test]
fn test_device_overflow_and_settings() {
    let mut client = MockClient::default();
    client.registers.insert("fft_overflow".to_string(), 1);
    let mut dev = device(client);

    assert_eq!(
        dev.overflow_status().unwrap(),
        OverflowStatus {
            fft: true,
            ..Default::default()
        }
    );
    dev.clear_overflow().unwrap();
    assert_eq!(control_writes(dev.client()), vec![0, 0b1000, 0]);

    dev.set_accumulation_length(1000).unwrap();
    assert_eq!(dev.client().registers["acc_len"], 1000);
    dev.set_shift_schedule(0x7FF).unwrap();
    assert_eq!(dev.control().shift_schedule(), 0x7FF);
    assert!(dev.set_shift_schedule(0xFFFF).is_err());
}
