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
//! Shared data types that flow between pipeline stages.
//!

use num_complex::Complex32;

/// Raw ingestion unit: interleaved 16-bit IQ samples for two channels.
///
/// Layout is `[I1 Q1 I2 Q2 ...]`: one (I, Q) pair per channel per
/// sample instant, channel 1 before channel 2.
#[derive(Debug, Clone)]
pub struct SampleFrame {
    /// Interleaved samples, length `4 * count`.
    pub samples: Vec<i16>,
    /// Number of (I, Q) pairs per channel.
    pub count: usize,
    /// Monotonic acquisition timestamp, microseconds.
    pub timestamp_us: u64,
}

impl SampleFrame {
    /// Creates a new frame, panicking if `samples` does not hold
    /// exactly `4 * count` values (two channels, I and Q each).
    pub fn new(samples: Vec<i16>, count: usize, timestamp_us: u64) -> Self {
        assert_eq!(
            samples.len(),
            count * 4,
            "sample frame length must be 4 * count (2 channels x I/Q)"
        );
        SampleFrame {
            samples,
            count,
            timestamp_us,
        }
    }
}

/// Output of the conditioning stage: two channels of FFT output plus
/// their quantized magnitude spectra.
#[derive(Debug, Clone)]
pub struct SpectrumFrame {
    /// FFT size, a power of two.
    pub fft_size: usize,
    /// Complex FFT output, channel 1.
    pub fft_ch1: Vec<Complex32>,
    /// Complex FFT output, channel 2.
    pub fft_ch2: Vec<Complex32>,
    /// Log-magnitude, channel 1, quantized to 0..255.
    pub magnitude_ch1: Vec<u8>,
    /// Log-magnitude, channel 2, quantized to 0..255.
    pub magnitude_ch2: Vec<u8>,
    /// Per-channel noise floor snapshot, same 0..255 scale.
    pub noise_floor: [u8; 2],
    /// Acquisition timestamp carried through from the `SampleFrame`.
    pub timestamp_us: u64,
}

/// Output of the direction-finding estimator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DFResult {
    /// Primary azimuth estimate, degrees, in `[0, 360)`.
    pub azimuth_deg: f64,
    /// 180 degree-ambiguous complement of `azimuth_deg`.
    pub back_azimuth_deg: f64,
    /// Magnitude-weighted mean phase difference, degrees.
    pub phase_diff_mean_deg: f64,
    /// Magnitude-weighted phase difference standard deviation, degrees.
    pub phase_diff_stddev_deg: f64,
    /// Confidence in `[0, 100]`.
    pub confidence: f64,
    /// Estimated signal-to-noise ratio, dB.
    pub snr_db: f64,
    /// Coherence in `[0, 1]`.
    pub coherence: f64,
    /// True if this result is a Kalman-held prediction, not a fresh
    /// measurement.
    pub is_holding: bool,
    /// Number of bins contributing to the estimate.
    pub bin_count: usize,
}

impl DFResult {
    /// The default low-confidence result returned when there is no
    /// usable measurement and no prior state to hold.
    pub fn default_low_confidence() -> Self {
        DFResult {
            azimuth_deg: 0.0,
            back_azimuth_deg: 180.0,
            phase_diff_mean_deg: 0.0,
            phase_diff_stddev_deg: 180.0,
            confidence: 0.0,
            snr_db: 0.0,
            coherence: 0.0,
            is_holding: false,
            bin_count: 0,
        }
    }
}

/// One frequency-indexed calibration record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationPoint {
    /// Frequency this point applies to, Hz.
    pub frequency_hz: f64,
    /// Stored phase correction, degrees.
    pub phase_correction_deg: f64,
    /// Known azimuth the point was measured at, degrees.
    pub known_azimuth_deg: f64,
    /// Unix timestamp the point was recorded or last updated.
    pub timestamp: u64,
}

/// State of the 2-state (azimuth, angular rate) bearing Kalman filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KalmanState {
    /// Estimated azimuth, degrees, in `[0, 360)`.
    pub azimuth: f64,
    /// Estimated angular rate, degrees/second.
    pub angular_velocity: f64,
    /// Covariance entry P[0][0].
    pub p00: f64,
    /// Covariance entry P[0][1] (symmetric with P[1][0]).
    pub p01: f64,
    /// Covariance entry P[1][1].
    pub p11: f64,
    /// Whether the filter has been initialized with a first measurement.
    pub initialized: bool,
    /// Milliseconds timestamp of the last update, for computing `dt`.
    pub last_update_ms: u64,
}

impl KalmanState {
    /// A freshly constructed, uninitialized filter state.
    pub fn new() -> Self {
        KalmanState {
            azimuth: 0.0,
            angular_velocity: 0.0,
            p00: 10.0,
            p01: 0.0,
            p11: 10.0,
            initialized: false,
            last_update_ms: 0,
        }
    }
}

impl Default for KalmanState {
    fn default() -> Self {
        KalmanState::new()
    }
}

/// The most recent confidently-estimated DF result, kept for bearing
/// hold, together with the Kalman state and the bin range it applies
/// to.
#[derive(Debug, Clone)]
pub struct LastValidDoA {
    /// The last confidently-estimated result.
    pub result: DFResult,
    /// The Kalman filter state at the time of that result.
    pub kalman: KalmanState,
    /// The DF bin range `[start, end)` this estimate applies to.
    pub bin_range: (usize, usize),
}

/// A contiguous run of CFAR-marked bins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalRegion {
    /// First bin in the region (inclusive).
    pub start_bin: usize,
    /// Last bin in the region (exclusive).
    pub end_bin: usize,
    /// Bin with the highest magnitude in the region.
    pub peak_bin: usize,
    /// Magnitude (0..255 scale) at `peak_bin`.
    pub peak_magnitude: u8,
    /// Mean magnitude (0..255 scale) over the region.
    pub mean_magnitude: f64,
    /// Estimated SNR for the region, dB.
    pub snr_db: f64,
}

impl SignalRegion {
    /// Number of bins spanned by this region.
    pub fn len(&self) -> usize {
        self.end_bin - self.start_bin
    }

    /// True if the region is empty (should not normally occur).
    pub fn is_empty(&self) -> bool {
        self.end_bin <= self.start_bin
    }
}

/// Per-channel EWMA DC-offset tracking state, owned by the
/// conditioning worker.
#[derive(Debug, Clone)]
pub struct DCOffsetState {
    /// Running mean of I, per channel.
    pub mean_i: [f64; 2],
    /// Running mean of Q, per channel.
    pub mean_q: [f64; 2],
    /// Center frequency last seen; a change resets the EWMA means.
    pub last_center_freq_hz: f64,
    /// Number of samples processed since the last reset.
    pub convergence_count: u64,
}

impl DCOffsetState {
    /// A fresh state with zeroed means.
    pub fn new() -> Self {
        DCOffsetState {
            mean_i: [0.0; 2],
            mean_q: [0.0; 2],
            last_center_freq_hz: 0.0,
            convergence_count: 0,
        }
    }
}

impl Default for DCOffsetState {
    fn default() -> Self {
        DCOffsetState::new()
    }
}

/// Per-channel overlap-add state, owned by the conditioning worker.
#[derive(Debug, Clone)]
pub struct OverlapState {
    /// Retained second half of the previous block, per channel.
    pub tail: [Vec<Complex32>; 2],
}

impl OverlapState {
    /// Creates a state with empty tails; the first frame is treated
    /// as having a zero-filled predecessor.
    pub fn new() -> Self {
        OverlapState {
            tail: [Vec::new(), Vec::new()],
        }
    }
}

impl Default for OverlapState {
    fn default() -> Self {
        OverlapState::new()
    }
}

/// Per-channel noise-floor tracking state, owned by the conditioning
/// worker.
#[derive(Debug, Clone)]
pub struct NoiseFloorState {
    /// Smoothed (EWMA) floor estimate, per channel, 0..255 scale.
    pub smoothed: [f64; 2],
    /// Scratch buffer reused across updates for partial selection.
    pub scratch: Vec<u8>,
}

impl NoiseFloorState {
    /// Creates a state with the floor initialized to zero.
    pub fn new() -> Self {
        NoiseFloorState {
            smoothed: [0.0; 2],
            scratch: Vec::new(),
        }
    }
}

impl Default for NoiseFloorState {
    fn default() -> Self {
        NoiseFloorState::new()
    }
}

/// Per-channel automatic gain control hint state, owned by the
/// conditioning worker.
#[derive(Debug, Clone, Copy)]
pub struct AgcState {
    /// Current recommended gain, dB.
    pub gain_db: [f64; 2],
    /// Consecutive frames observed above the hysteresis band, per channel.
    pub high_count: [u32; 2],
    /// Consecutive frames observed below the hysteresis band, per channel.
    pub low_count: [u32; 2],
    /// Last observed peak magnitude (0..255 scale), per channel.
    pub last_peak: [u8; 2],
}

impl AgcState {
    /// A fresh state with mid-range gain and no history.
    pub fn new(initial_gain_db: f64) -> Self {
        AgcState {
            gain_db: [initial_gain_db; 2],
            high_count: [0; 2],
            low_count: [0; 2],
            last_peak: [0; 2],
        }
    }
}
