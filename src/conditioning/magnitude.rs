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
//! Maps complex FFT bins to an 8-bit quantized log-magnitude, then
//! smooths residual LO leakage around the DC bin.
//!

use num_complex::Complex32;

/// Floor applied to `|X[k]|^2` before taking `log10`, guarding against
/// `log10(0)`.
const MIN_POWER: f64 = 1e-20;
/// dB offset so that the mapped window is centered near -100 dBFS.
const DB_OFFSET: f64 = 100.0;
/// Width, in dB, of the mapped window.
const DB_WINDOW: f64 = 120.0;

/// Converts one complex FFT bin to an 8-bit quantized magnitude:
/// `clamp((10*log10(|X|^2) + 100) * 255 / 120, 0, 255)`.
pub fn bin_to_u8(bin: Complex32) -> u8 {
    let power = (bin.norm_sqr() as f64).max(MIN_POWER);
    let db = 10.0 * power.log10();
    let scaled = (db + DB_OFFSET) * 255.0 / DB_WINDOW;
    scaled.clamp(0.0, 255.0).round() as u8
}

/// Converts a full FFT output array to quantized magnitudes.
pub fn fft_to_magnitude(fft: &[Complex32]) -> Vec<u8> {
    fft.iter().map(|&b| bin_to_u8(b)).collect()
}

/// Smooths the center bin and its two immediate neighbors to suppress
/// residual LO leakage. `center` is the DC bin index (typically
/// `fft_size / 2` after an fftshift, or 0 otherwise — callers pass
/// whichever convention the rest of the pipeline uses).
///
/// The center bin is replaced first, by a 1-2-2-1 weighted average of
/// `[c-2, c-1, c+1, c+2]`. `c-1` and `c+1` are then each replaced by
/// their own 1-2-1 average, using the freshly written center value and
/// their own untouched outer neighbor — not a single shared value.
/// All divisions truncate.
pub fn smooth_dc_bins(magnitude: &mut [u8], center: usize) {
    let len = magnitude.len();
    if len < 5 || center < 2 || center + 2 >= len {
        return;
    }

    let weighted_sum = magnitude[center - 2] as u32
        + 2 * magnitude[center - 1] as u32
        + 2 * magnitude[center + 1] as u32
        + magnitude[center + 2] as u32;
    let center_value = (weighted_sum / 6) as u8;

    let left_avg = (magnitude[center - 2] as u32 + 2 * magnitude[center - 1] as u32 + center_value as u32) / 4;
    let right_avg = (center_value as u32 + 2 * magnitude[center + 1] as u32 + magnitude[center + 2] as u32) / 4;

    magnitude[center] = center_value;
    magnitude[center - 1] = left_avg as u8;
    magnitude[center + 1] = right_avg as u8;
}
