/*
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 *
 */

//!
//! Window functions applied before the FFT. Coefficients are
//! regenerated only when the window type changes, not every frame.
//!

use std::f64::consts::PI;

/// Selects which window function to apply before the FFT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowType {
    /// No tapering.
    Rectangular,
    /// Hamming window.
    Hamming,
    /// Hann (Hanning) window.
    Hanning,
    /// Blackman window.
    Blackman,
    /// Blackman-Harris window.
    BlackmanHarris,
    /// Kaiser window, beta ~= 8.6.
    Kaiser,
    /// Tukey window, alpha ~= 0.5.
    Tukey,
    /// Gaussian window, sigma ~= 0.4.
    Gaussian,
}

impl WindowType {
    /// Recovers a `WindowType` from the discriminant written by `as
    /// u8`, for the control surface's atomic storage. Out-of-range
    /// values fall back to `Hanning`.
    pub fn from_u8(tag: u8) -> Self {
        match tag {
            0 => WindowType::Rectangular,
            1 => WindowType::Hamming,
            2 => WindowType::Hanning,
            3 => WindowType::Blackman,
            4 => WindowType::BlackmanHarris,
            5 => WindowType::Kaiser,
            6 => WindowType::Tukey,
            7 => WindowType::Gaussian,
            _ => WindowType::Hanning,
        }
    }
}

const KAISER_BETA: f64 = 8.6;
const TUKEY_ALPHA: f64 = 0.5;
const GAUSSIAN_SIGMA: f64 = 0.4;

/// Zeroth-order modified Bessel function of the first kind, used by
/// the Kaiser window.
fn bessel_i0(x: f64) -> f64 {
    let mut sum = 1.0;
    let mut term = 1.0;
    let half_x_sq = (x / 2.0) * (x / 2.0);
    for k in 1..=32 {
        term *= half_x_sq / (k as f64 * k as f64);
        sum += term;
        if term < 1e-15 * sum {
            break;
        }
    }
    sum
}

/// Generates `length` window coefficients for `window_type`.
pub fn generate(window_type: WindowType, length: usize) -> Vec<f64> {
    if length == 0 {
        return Vec::new();
    }
    if length == 1 {
        return vec![1.0];
    }
    let n = length - 1;
    (0..length)
        .map(|i| {
            let t = i as f64 / n as f64;
            match window_type {
                WindowType::Rectangular => 1.0,
                WindowType::Hamming => 0.54 - 0.46 * (2.0 * PI * t).cos(),
                WindowType::Hanning => 0.5 * (1.0 - (2.0 * PI * t).cos()),
                WindowType::Blackman => {
                    0.42 - 0.5 * (2.0 * PI * t).cos() + 0.08 * (4.0 * PI * t).cos()
                }
                WindowType::BlackmanHarris => {
                    0.35875 - 0.48829 * (2.0 * PI * t).cos() + 0.14128 * (4.0 * PI * t).cos()
                        - 0.01168 * (6.0 * PI * t).cos()
                }
                WindowType::Kaiser => {
                    let arg = 2.0 * i as f64 / n as f64 - 1.0;
                    bessel_i0(KAISER_BETA * (1.0 - arg * arg).max(0.0).sqrt()) / bessel_i0(KAISER_BETA)
                }
                WindowType::Tukey => tukey_coefficient(i, n, TUKEY_ALPHA),
                WindowType::Gaussian => {
                    let arg = (i as f64 - n as f64 / 2.0) / (GAUSSIAN_SIGMA * n as f64 / 2.0);
                    (-0.5 * arg * arg).exp()
                }
            }
        })
        .collect()
}

fn tukey_coefficient(i: usize, n: usize, alpha: f64) -> f64 {
    if alpha <= 0.0 {
        return 1.0;
    }
    let t = i as f64 / n as f64;
    let taper = alpha / 2.0;
    if t < taper {
        0.5 * (1.0 + (PI * (t / taper - 1.0)).cos())
    } else if t > 1.0 - taper {
        0.5 * (1.0 + (PI * ((t - 1.0) / taper + 1.0)).cos())
    } else {
        1.0
    }
}

/// Multiplies `samples` in place by `coefficients` (same length).
pub fn apply(samples: &mut [num_complex::Complex32], coefficients: &[f64]) {
    debug_assert_eq!(samples.len(), coefficients.len());
    for (sample, &c) in samples.iter_mut().zip(coefficients.iter()) {
        *sample *= c as f32;
    }
}
