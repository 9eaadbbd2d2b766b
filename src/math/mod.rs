// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Some helper mathematics.


use rustfft::FftPlanner;

use crate::c64;

/// Inverse tangent. y comes before x, like the C function.
///
/// # Examples
///
/// `assert_abs_diff_eq!(atan2(1, -1), 3.0 / 4.0 * PI);`
// I don't like Rust's atan2. This fn helps me sleep at night knowing I'm using
// it correctly.
#[inline]
pub(crate) fn atan2(y: f64, x: f64) -> f64 {
    y.atan2(x)
}

/// Complex exponential. The argument is assumed to be purely imaginary.
///
/// This function doesn't actually use complex numbers; it just returns the real
/// and imag components from Euler's formula (i.e. e^{ix} = cos{x} + i sin{x}).
///
/// # Examples
///
/// `assert_abs_diff_eq!(cexp(PI), c64::new(-1.0, 0.0));`
#[inline]
pub(crate) fn cexp(x: f64) -> c64 {
    let (im, re) = x.sin_cos();
    c64::new(re, im)
}

/// Wrap a phase into (-pi, pi].
///
/// # Examples
///
/// `assert_abs_diff_eq!(wrap_phase(3.0 * PI / 2.0), -PI / 2.0);`
#[inline]
pub(crate) fn wrap_phase(phase: f64) -> f64 {
    let (s, c) = phase.sin_cos();
    atan2(s, c)
}

/// The Euclidean norm of the element-wise circular difference between two
/// phase vectors. The vectors must be the same length; any excess elements of
/// the longer vector are ignored.
pub(crate) fn circular_distance<'a, A, B>(a: A, b: B) -> f64
where
    A: IntoIterator<Item = &'a f64>,
    B: IntoIterator<Item = &'a f64>,
{
    a.into_iter()
        .zip(b)
        .map(|(&a, &b)| wrap_phase(a - b).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// The index of the largest value. NaNs are never chosen. Ties go to the
/// earliest index. `None` is returned if there are no non-NaN values.
pub(crate) fn argmax<I: IntoIterator<Item = f64>>(values: I) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, v) in values.into_iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if v <= b => (),
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Cross correlate `a` and `b` in "valid" mode, i.e. only where `b` fully
/// overlaps `a`. The output has `a.len() - b.len() + 1` elements, and element
/// k is `sum_n a[n + k] * b[n]`. If `b` is longer than `a`, the output is
/// empty.
pub(crate) fn correlate_valid(a: &[f64], b: &[f64]) -> Vec<f64> {
    if b.len() > a.len() {
        return vec![];
    }
    (0..=a.len() - b.len())
        .map(|k| a[k..k + b.len()].iter().zip(b).map(|(a, b)| a * b).sum())
        .collect()
}

/// Resample a real sequence to `num` samples with the Fourier method, i.e.
/// band-limited interpolation assuming the sequence is periodic. A Nyquist
/// component of an even-length input is split evenly between the positive
/// and negative halves of the new spectrum, so upsampling by an integer
/// factor K leaves every Kth output sample equal to the input.
pub(crate) fn resample(x: &[f64], num: usize) -> Vec<f64> {
    let n = x.len();
    if n == 0 || num == 0 {
        return vec![];
    }

    let mut planner = FftPlanner::<f64>::new();
    let mut spectrum: Vec<c64> = x.iter().map(|&v| c64::new(v, 0.0)).collect();
    planner.plan_fft_forward(n).process(&mut spectrum);

    let mut new_spectrum = vec![c64::default(); num];
    let n_kept = n.min(num);
    let nyquist = n_kept / 2 + 1;
    new_spectrum[..nyquist].copy_from_slice(&spectrum[..nyquist]);
    if n_kept > 2 {
        let num_negative = n_kept - nyquist;
        new_spectrum[num - num_negative..].copy_from_slice(&spectrum[n - num_negative..]);
    }
    if n_kept % 2 == 0 {
        let half = n_kept / 2;
        if num < n {
            new_spectrum[half] += spectrum[n - half];
        } else if num > n {
            new_spectrum[half] *= 0.5;
            new_spectrum[num - half] = new_spectrum[half];
        }
    }

    planner.plan_fft_inverse(num).process(&mut new_spectrum);
    // rustfft doesn't normalise; the 1/num of the inverse and the num/n
    // amplitude correction combine into 1/n.
    let norm = 1.0 / n as f64;
    new_spectrum.into_iter().map(|v| v.re * norm).collect()
}
