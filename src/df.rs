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
//! Direction-finding estimator: phase-difference extraction, Itoh
//! unwrapping, magnitude-weighted statistics, interferometer
//! inversion, and the fresh/hold/default state machine.
//!

use std::f64::consts::PI;

use num_complex::Complex32;

use crate::calibration::CalibrationStore;
use crate::cfar::{ca, CfarParams};
use crate::kalman;
use crate::types::{DFResult, KalmanState, LastValidDoA};

/// Minimum confidence (0..100) required to treat a measurement as
/// "fresh" rather than falling back to bearing hold.
const MIN_CONFIDENCE_THRESHOLD: f64 = 20.0;
/// Minimum number of contributing bins required to attempt a fresh
/// DF estimate.
const MIN_BINS_FOR_DF: usize = 3;
/// Confidence multiplier applied each time a hold cycle repeats.
const HOLD_DECAY: f64 = 0.8;
/// Empirical noise-power scaling factor for the floor-based SNR path.
const SNR_NOISE_SCALE: f64 = 1e-6;
/// SNR, in dB, above which the SNR boost starts to apply.
const SNR_BOOST_THRESHOLD_DB: f64 = 20.0;
/// Cap on the SNR boost multiplier.
const SNR_BOOST_MAX: f64 = 1.3;
/// Penalty applied to confidence for the inherent 180-degree ambiguity.
const AMBIGUITY_PENALTY: f64 = 0.9;

/// Inputs to one DF estimation call.
pub struct DfInput<'a> {
    /// Channel 1 complex FFT output.
    pub fft_ch1: &'a [Complex32],
    /// Channel 2 complex FFT output.
    pub fft_ch2: &'a [Complex32],
    /// Channel 1 quantized magnitude (0..255).
    pub magnitude_ch1: &'a [u8],
    /// Channel 2 quantized magnitude (0..255).
    pub magnitude_ch2: &'a [u8],
    /// Bin range `[start, end)` to search for signals.
    pub bin_range: (usize, usize),
    /// Current center frequency, used for calibration lookup.
    pub center_freq_hz: f64,
    /// Per-channel noise floor snapshot (0..255), if available.
    pub noise_floor: Option<[u8; 2]>,
}

/// Carries the estimator's persistent per-worker state: the last
/// confidently-estimated result and the Kalman filter.
pub struct DfEstimator {
    last_valid: Option<LastValidDoA>,
    kalman: KalmanState,
    cfar_params: CfarParams,
}

impl DfEstimator {
    /// Creates an estimator with no prior state.
    pub fn new() -> Self {
        DfEstimator {
            last_valid: None,
            kalman: KalmanState::new(),
            cfar_params: CfarParams::default(),
        }
    }

    /// Runs one DF estimate. `now_ms` is used to compute `dt` for the
    /// Kalman predict step; `calibration` supplies the frequency-
    /// interpolated phase correction.
    pub fn estimate(
        &mut self,
        input: &DfInput<'_>,
        calibration: &CalibrationStore,
        now_ms: u64,
    ) -> DFResult {
        let (start, end) = input.bin_range;

        if let Some(last) = &self.last_valid {
            if last.bin_range != input.bin_range {
                self.last_valid = None;
            }
        }

        if end <= start {
            return DFResult::default_low_confidence();
        }

        let center_bin = input.magnitude_ch1.len() / 2;
        let noise_floor_ch1 = input.noise_floor.map(|nf| nf[0]);
        let regions = ca::detect(
            input.magnitude_ch1,
            start,
            end,
            center_bin,
            &self.cfar_params,
            noise_floor_ch1,
        );

        let mut weighted_bins: Vec<(usize, f64, f64)> = Vec::new();
        for region in &regions {
            let mut phase_diffs = Vec::with_capacity(region.len());
            for bin in region.start_bin..region.end_bin {
                let diff = wrap_pi(
                    input.fft_ch2[bin].im.atan2(input.fft_ch2[bin].re) as f64
                        - input.fft_ch1[bin].im.atan2(input.fft_ch1[bin].re) as f64,
                );
                phase_diffs.push(diff);
            }
            itoh_unwrap(&mut phase_diffs);
            for (offset, &diff) in phase_diffs.iter().enumerate() {
                let bin = region.start_bin + offset;
                let magnitude =
                    (input.magnitude_ch1[bin] as f64 + input.magnitude_ch2[bin] as f64) / 2.0;
                weighted_bins.push((bin, magnitude, diff));
            }
        }

        if weighted_bins.len() < MIN_BINS_FOR_DF {
            return self.fall_back(input.bin_range);
        }

        let total_weight: f64 = weighted_bins.iter().map(|(_, w, _)| w).sum();
        if total_weight <= 0.0 {
            return self.fall_back(input.bin_range);
        }

        let mean_phase_diff_rad = weighted_bins
            .iter()
            .map(|(_, w, d)| w * d)
            .sum::<f64>()
            / total_weight;

        let correction_deg = calibration.correction(input.center_freq_hz);
        let mean_phase_diff_deg = mean_phase_diff_rad.to_degrees() + correction_deg;

        let variance = weighted_welford_variance(&weighted_bins, mean_phase_diff_rad);
        let stddev_deg = variance.sqrt().to_degrees();

        let sin_theta = (mean_phase_diff_deg.to_radians() / PI).clamp(-1.0, 1.0);
        let cos_component = (1.0 - sin_theta * sin_theta).max(0.0).sqrt();
        let primary = normalize_azimuth(sin_theta.atan2(cos_component).to_degrees());
        let back_azimuth = normalize_azimuth(sin_theta.atan2(-cos_component).to_degrees());

        let signal_power = weighted_bins
            .iter()
            .map(|(bin, _, _)| input.fft_ch1[*bin].norm_sqr() as f64)
            .sum::<f64>()
            / weighted_bins.len() as f64;

        let snr_db = estimate_snr(input, &weighted_bins, signal_power, noise_floor_ch1);

        let coherence = (-stddev_deg / 10.0).exp();
        let phase_confidence = 100.0 * (-stddev_deg / 25.0).exp();
        let snr_boost = if snr_db > SNR_BOOST_THRESHOLD_DB {
            (1.0 + (snr_db - SNR_BOOST_THRESHOLD_DB) / 40.0).min(SNR_BOOST_MAX)
        } else {
            1.0
        };
        let confidence = (phase_confidence * snr_boost * AMBIGUITY_PENALTY).clamp(0.0, 100.0);

        let bin_count = weighted_bins.len();

        if confidence >= MIN_CONFIDENCE_THRESHOLD && bin_count >= MIN_BINS_FOR_DF {
            let dt_ms = now_ms.saturating_sub(self.kalman.last_update_ms);
            if self.kalman.initialized {
                kalman::predict(&mut self.kalman, dt_ms);
            }
            let measurement_variance = stddev_deg.powi(2).max(1.0);
            kalman::update(&mut self.kalman, primary, measurement_variance);
            self.kalman.last_update_ms = now_ms;

            let result = DFResult {
                azimuth_deg: self.kalman.azimuth,
                back_azimuth_deg: normalize_azimuth(self.kalman.azimuth + 180.0),
                phase_diff_mean_deg: mean_phase_diff_deg,
                phase_diff_stddev_deg: stddev_deg,
                confidence,
                snr_db,
                coherence,
                is_holding: false,
                bin_count,
            };
            self.last_valid = Some(LastValidDoA {
                result,
                kalman: self.kalman,
                bin_range: input.bin_range,
            });
            result
        } else {
            self.fall_back(input.bin_range)
        }
    }

    fn fall_back(&mut self, bin_range: (usize, usize)) -> DFResult {
        if self.kalman.initialized {
            kalman::predict(&mut self.kalman, 100);
            let confidence = self
                .last_valid
                .as_ref()
                .map(|lv| lv.result.confidence * HOLD_DECAY)
                .unwrap_or(0.0);
            let result = DFResult {
                azimuth_deg: self.kalman.azimuth,
                back_azimuth_deg: normalize_azimuth(self.kalman.azimuth + 180.0),
                confidence,
                is_holding: true,
                ..self
                    .last_valid
                    .as_ref()
                    .map(|lv| lv.result)
                    .unwrap_or_else(DFResult::default_low_confidence)
            };
            if let Some(lv) = &mut self.last_valid {
                lv.result.confidence = confidence;
            }
            return result;
        }
        if let Some(lv) = &mut self.last_valid {
            lv.result.confidence *= HOLD_DECAY;
            let mut held = lv.result;
            held.is_holding = true;
            return held;
        }
        let _ = bin_range;
        DFResult::default_low_confidence()
    }
}

impl Default for DfEstimator {
    fn default() -> Self {
        DfEstimator::new()
    }
}

fn wrap_pi(angle: f64) -> f64 {
    let mut a = (angle + PI) % (2.0 * PI);
    if a < 0.0 {
        a += 2.0 * PI;
    }
    a - PI
}

/// Itoh phase unwrapping: walking left to right, whenever a jump
/// exceeds pi (or -pi), a running 2*pi correction is accumulated and
/// applied to all subsequent samples.
fn itoh_unwrap(phase: &mut [f64]) {
    let mut correction = 0.0;
    for i in 1..phase.len() {
        let jump = phase[i] - phase[i - 1];
        if jump > PI {
            correction -= 2.0 * PI;
        } else if jump < -PI {
            correction += 2.0 * PI;
        }
        phase[i] += correction;
    }
}

/// Magnitude-weighted standard deviation of phase differences about
/// `mean_rad`, via Welford's numerically stable weighted update, with
/// each residual wrapped into `[-pi, pi]` before accumulation.
fn weighted_welford_variance(bins: &[(usize, f64, f64)], mean_rad: f64) -> f64 {
    let mut weight_sum = 0.0;
    let mut weighted_sq_sum = 0.0;
    for (_, weight, value) in bins {
        let residual = wrap_pi(value - mean_rad);
        weight_sum += weight;
        weighted_sq_sum += weight * residual * residual;
    }
    if weight_sum <= 0.0 {
        return 0.0;
    }
    weighted_sq_sum / weight_sum
}

fn normalize_azimuth(az: f64) -> f64 {
    let mut a = az % 360.0;
    if a < 0.0 {
        a += 360.0;
    }
    a
}

fn estimate_snr(
    input: &DfInput<'_>,
    weighted_bins: &[(usize, f64, f64)],
    signal_power: f64,
    noise_floor_ch1: Option<u8>,
) -> f64 {
    let noise_power = match noise_floor_ch1 {
        Some(floor) => SNR_NOISE_SCALE * (floor as f64) * (floor as f64),
        None => {
            let (start, end) = input.bin_range;
            let range_mean = {
                let slice = &input.magnitude_ch1[start..end.min(input.magnitude_ch1.len())];
                if slice.is_empty() {
                    0.0
                } else {
                    slice.iter().map(|&v| v as f64).sum::<f64>() / slice.len() as f64
                }
            };
            let below: Vec<f64> = {
                let (start, end) = input.bin_range;
                (start..end.min(input.fft_ch1.len()))
                    .filter(|&bin| (input.magnitude_ch1[bin] as f64) <= range_mean)
                    .map(|bin| input.fft_ch1[bin].norm_sqr() as f64)
                    .collect()
            };
            if below.is_empty() {
                signal_power.max(1e-12)
            } else {
                below.iter().sum::<f64>() / below.len() as f64
            }
        }
    };
    let _ = weighted_bins;
    if noise_power <= 0.0 {
        0.0
    } else {
        10.0 * (signal_power / noise_power).log10()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    fn flat_fft(size: usize) -> Vec<Complex32> {
        vec![Complex32::new(0.0, 0.0); size]
    }

    fn flat_magnitude(size: usize) -> Vec<u8> {
        vec![10u8; size]
    }

    #[test]
    fn broadside_source_reports_90_degrees() {
        // Scenario 1: a single bin has magnitude 200 in both channels,
        // phase difference 0 -> broadside, sin(theta) = 0 -> azimuth 90.
        let size = 256;
        let mut fft1 = flat_fft(size);
        let mut fft2 = flat_fft(size);
        let mut mag1 = flat_magnitude(size);
        let mut mag2 = flat_magnitude(size);

        for bin in 160..167 {
            fft1[bin] = Complex32::new(200.0, 0.0);
            fft2[bin] = Complex32::new(200.0, 0.0);
            mag1[bin] = 200;
            mag2[bin] = 200;
        }

        let input = DfInput {
            fft_ch1: &fft1,
            fft_ch2: &fft2,
            magnitude_ch1: &mag1,
            magnitude_ch2: &mag2,
            bin_range: (150, 200),
            center_freq_hz: 1e9,
            noise_floor: Some([10, 10]),
        };
        let calibration = CalibrationStore::new();
        let mut estimator = DfEstimator::new();
        let result = estimator.estimate(&input, &calibration, 0);

        assert_relative_eq!(result.azimuth_deg, 90.0, epsilon = 1.0);
        assert_relative_eq!(result.back_azimuth_deg, 270.0, epsilon = 1.0);
        assert!(result.confidence >= 80.0, "confidence was {}", result.confidence);
        assert!(!result.is_holding);
    }

    #[test]
    fn endfire_source_clamps_sin_theta_to_one() {
        // Scenario 2: phase difference of pi across a region.
        let size = 256;
        let mut fft1 = flat_fft(size);
        let mut fft2 = flat_fft(size);
        let mut mag1 = flat_magnitude(size);
        let mut mag2 = flat_magnitude(size);

        for bin in 160..170 {
            fft1[bin] = Complex32::new(200.0, 0.0);
            fft2[bin] = Complex32::new(-200.0, 0.01); // phase diff ~= pi
            mag1[bin] = 200;
            mag2[bin] = 200;
        }

        let input = DfInput {
            fft_ch1: &fft1,
            fft_ch2: &fft2,
            magnitude_ch1: &mag1,
            magnitude_ch2: &mag2,
            bin_range: (150, 200),
            center_freq_hz: 1e9,
            noise_floor: Some([10, 10]),
        };
        let calibration = CalibrationStore::new();
        let mut estimator = DfEstimator::new();
        let result = estimator.estimate(&input, &calibration, 0);

        // sin(theta) clamps to +-1 -> azimuth near 0 or 180.
        let near_0_or_180 =
            result.azimuth_deg < 5.0 || (result.azimuth_deg - 180.0).abs() < 5.0;
        assert!(near_0_or_180, "azimuth was {}", result.azimuth_deg);
    }

    #[test]
    fn bearing_hold_decays_confidence_by_0_8() {
        // Scenario 3: strong frame then all-noise frame.
        let size = 256;
        let mut fft1 = flat_fft(size);
        let mut fft2 = flat_fft(size);
        let mut mag1 = flat_magnitude(size);
        let mut mag2 = flat_magnitude(size);
        for bin in 160..167 {
            fft1[bin] = Complex32::new(200.0, 0.0);
            fft2[bin] = Complex32::new(200.0, 0.0);
            mag1[bin] = 200;
            mag2[bin] = 200;
        }
        let strong_input = DfInput {
            fft_ch1: &fft1,
            fft_ch2: &fft2,
            magnitude_ch1: &mag1,
            magnitude_ch2: &mag2,
            bin_range: (150, 200),
            center_freq_hz: 1e9,
            noise_floor: Some([10, 10]),
        };
        let calibration = CalibrationStore::new();
        let mut estimator = DfEstimator::new();
        let first = estimator.estimate(&strong_input, &calibration, 0);
        assert!(!first.is_holding);

        let noise_fft = flat_fft(size);
        let noise_mag = flat_magnitude(size);
        let noise_input = DfInput {
            fft_ch1: &noise_fft,
            fft_ch2: &noise_fft,
            magnitude_ch1: &noise_mag,
            magnitude_ch2: &noise_mag,
            bin_range: (150, 200),
            center_freq_hz: 1e9,
            noise_floor: Some([10, 10]),
        };
        let second = estimator.estimate(&noise_input, &calibration, 1000);
        assert!(second.is_holding);
        assert_relative_eq!(second.confidence, first.confidence * HOLD_DECAY, epsilon = 1e-6);
    }

    #[test]
    fn range_change_invalidates_last_valid() {
        // Scenario 4.
        let size = 256;
        let mut fft1 = flat_fft(size);
        let mut fft2 = flat_fft(size);
        let mut mag1 = flat_magnitude(size);
        let mut mag2 = flat_magnitude(size);
        for bin in 160..167 {
            fft1[bin] = Complex32::new(200.0, 0.0);
            fft2[bin] = Complex32::new(200.0, 0.0);
            mag1[bin] = 200;
            mag2[bin] = 200;
        }
        let strong_input = DfInput {
            fft_ch1: &fft1,
            fft_ch2: &fft2,
            magnitude_ch1: &mag1,
            magnitude_ch2: &mag2,
            bin_range: (150, 200),
            center_freq_hz: 1e9,
            noise_floor: Some([10, 10]),
        };
        let calibration = CalibrationStore::new();
        let mut estimator = DfEstimator::new();
        estimator.estimate(&strong_input, &calibration, 0);

        let noise_fft = flat_fft(size);
        let noise_mag = flat_magnitude(size);
        let noise_input_new_range = DfInput {
            fft_ch1: &noise_fft,
            fft_ch2: &noise_fft,
            magnitude_ch1: &noise_mag,
            magnitude_ch2: &noise_mag,
            bin_range: (200, 250),
            center_freq_hz: 1e9,
            noise_floor: Some([10, 10]),
        };
        let result = estimator.estimate(&noise_input_new_range, &calibration, 1000);
        assert!(!result.is_holding);
        assert_eq!(result.azimuth_deg, 0.0);
    }

    #[test]
    fn degenerate_range_returns_default() {
        let size = 64;
        let fft1 = flat_fft(size);
        let fft2 = flat_fft(size);
        let mag1 = flat_magnitude(size);
        let mag2 = flat_magnitude(size);
        let input = DfInput {
            fft_ch1: &fft1,
            fft_ch2: &fft2,
            magnitude_ch1: &mag1,
            magnitude_ch2: &mag2,
            bin_range: (50, 50),
            center_freq_hz: 1e9,
            noise_floor: None,
        };
        let calibration = CalibrationStore::new();
        let mut estimator = DfEstimator::new();
        let result = estimator.estimate(&input, &calibration, 0);
        assert_eq!(result, DFResult::default_low_confidence());
    }

    #[test]
    fn itoh_unwrap_is_invariant_under_constant_2pi_offset() {
        let mut phase_a = vec![0.1, 0.2, 3.0, -3.0, -2.9];
        let mut phase_b: Vec<f64> = phase_a.iter().map(|p| p + 2.0 * PI).collect();
        itoh_unwrap(&mut phase_a);
        itoh_unwrap(&mut phase_b);
        for (a, b) in phase_a.iter().zip(phase_b.iter()) {
            assert_relative_eq!(a + 2.0 * PI, b, epsilon = 1e-9);
        }
    }
}
