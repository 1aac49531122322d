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
//! Control surface: atomic setters for hardware and processing
//! parameters, validated against §6.5-style ranges, plus the AGC
//! controller.
//!

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::cfar::CfarMode;
use crate::conditioning::window::WindowType;
use crate::error::{DoaError, DoaResult};
use crate::types::AgcState;

const MIN_FREQ_HZ: f64 = 47e6;
const MAX_FREQ_HZ: f64 = 6e9;
const MIN_RATE_HZ: f64 = 520e3;
const MAX_RATE_HZ: f64 = 61.44e6;
const MIN_GAIN_DB: f64 = 0.0;
const MAX_GAIN_DB: f64 = 60.0;

/// Atomic integer cells for the hardware and processing parameters
/// every worker consults. Cheap to read from the hot path; multi-field
/// updates are serialized through `frequency_lock`.
pub struct ControlSurface {
    center_freq_hz: AtomicU64,
    sample_rate_hz: AtomicU64,
    bandwidth_hz: AtomicU64,
    gain_db: [AtomicU64; 2],
    df_start_bin: AtomicUsize,
    df_end_bin: AtomicUsize,
    window_type: AtomicU8,
    averaging_frames: AtomicU32,
    cfar_mode_tag: AtomicU8,
    cfar_mode_k_bits: AtomicU64,
    agc_enabled: AtomicBool,
    params_changed: AtomicBool,
    /// Serializes updates that touch more than one field together
    /// (e.g. a retune that also resets averaging).
    frequency_lock: Mutex<()>,
}

impl ControlSurface {
    /// Creates a control surface with the given initial center
    /// frequency, sample rate, and bandwidth (all already validated by
    /// the caller at construction time).
    pub fn new(center_freq_hz: f64, sample_rate_hz: f64, bandwidth_hz: f64) -> Self {
        ControlSurface {
            center_freq_hz: AtomicU64::new(center_freq_hz.to_bits()),
            sample_rate_hz: AtomicU64::new(sample_rate_hz.to_bits()),
            bandwidth_hz: AtomicU64::new(bandwidth_hz.to_bits()),
            gain_db: [AtomicU64::new(0f64.to_bits()), AtomicU64::new(0f64.to_bits())],
            df_start_bin: AtomicUsize::new(0),
            df_end_bin: AtomicUsize::new(0),
            window_type: AtomicU8::new(WindowType::Hanning as u8),
            averaging_frames: AtomicU32::new(1),
            cfar_mode_tag: AtomicU8::new(0),
            cfar_mode_k_bits: AtomicU64::new(DEFAULT_CFAR_K.to_bits()),
            agc_enabled: AtomicBool::new(false),
            params_changed: AtomicBool::new(false),
            frequency_lock: Mutex::new(()),
        }
    }

    pub fn center_freq_hz(&self) -> f64 {
        f64::from_bits(self.center_freq_hz.load(Ordering::Acquire))
    }

    pub fn sample_rate_hz(&self) -> f64 {
        f64::from_bits(self.sample_rate_hz.load(Ordering::Acquire))
    }

    pub fn bandwidth_hz(&self) -> f64 {
        f64::from_bits(self.bandwidth_hz.load(Ordering::Acquire))
    }

    pub fn gain_db(&self, channel: usize) -> f64 {
        f64::from_bits(self.gain_db[channel].load(Ordering::Acquire))
    }

    pub fn df_range(&self) -> (usize, usize) {
        (
            self.df_start_bin.load(Ordering::Acquire),
            self.df_end_bin.load(Ordering::Acquire),
        )
    }

    pub fn window_type(&self) -> WindowType {
        WindowType::from_u8(self.window_type.load(Ordering::Acquire))
    }

    pub fn averaging_frames(&self) -> u32 {
        self.averaging_frames.load(Ordering::Acquire)
    }

    pub fn cfar_mode(&self) -> CfarMode {
        let k = f64::from_bits(self.cfar_mode_k_bits.load(Ordering::Acquire));
        match self.cfar_mode_tag.load(Ordering::Acquire) {
            0 => CfarMode::Ca,
            1 => CfarMode::Os { k },
            2 => CfarMode::Go { k },
            _ => CfarMode::So { k },
        }
    }

    pub fn agc_enabled(&self) -> bool {
        self.agc_enabled.load(Ordering::Acquire)
    }

    /// True if any setter has run since the last `clear_params_changed`
    /// call. The acquisition task polls this once per iteration.
    pub fn params_changed(&self) -> bool {
        self.params_changed.load(Ordering::Acquire)
    }

    /// Clears the change flag after the acquisition task has applied
    /// pending changes to the hardware.
    pub fn clear_params_changed(&self) {
        self.params_changed.store(false, Ordering::Release);
    }

    pub fn set_center_freq(&self, hz: f64) -> DoaResult<()> {
        validate_range(hz, MIN_FREQ_HZ, MAX_FREQ_HZ, "center_freq_hz")?;
        let _guard = self.frequency_lock.lock().unwrap();
        self.center_freq_hz.store(hz.to_bits(), Ordering::Release);
        self.mark_changed();
        Ok(())
    }

    pub fn set_sample_rate(&self, hz: f64) -> DoaResult<()> {
        validate_range(hz, MIN_RATE_HZ, MAX_RATE_HZ, "sample_rate_hz")?;
        let _guard = self.frequency_lock.lock().unwrap();
        self.sample_rate_hz.store(hz.to_bits(), Ordering::Release);
        self.mark_changed();
        Ok(())
    }

    pub fn set_bandwidth(&self, hz: f64) -> DoaResult<()> {
        validate_range(hz, MIN_RATE_HZ, MAX_RATE_HZ, "bandwidth_hz")?;
        let _guard = self.frequency_lock.lock().unwrap();
        self.bandwidth_hz.store(hz.to_bits(), Ordering::Release);
        self.mark_changed();
        Ok(())
    }

    pub fn set_gain(&self, channel: usize, db: f64) -> DoaResult<()> {
        validate_range(db, MIN_GAIN_DB, MAX_GAIN_DB, "gain_db")?;
        self.gain_db[channel].store(db.to_bits(), Ordering::Release);
        self.mark_changed();
        Ok(())
    }

    pub fn set_df_range(&self, start_bin: usize, end_bin: usize) -> DoaResult<()> {
        if end_bin <= start_bin {
            log::warn!(
                "rejected df range [{}, {}): end must exceed start",
                start_bin,
                end_bin
            );
            return Err(DoaError::Validation {
                field: "df_range",
                value: end_bin as f64 - start_bin as f64,
            });
        }
        self.df_start_bin.store(start_bin, Ordering::Release);
        self.df_end_bin.store(end_bin, Ordering::Release);
        self.mark_changed();
        Ok(())
    }

    pub fn set_window_type(&self, window_type: WindowType) {
        self.window_type.store(window_type as u8, Ordering::Release);
        self.mark_changed();
    }

    pub fn set_averaging_frames(&self, frames: u32) -> DoaResult<()> {
        if frames == 0 {
            log::warn!("rejected averaging_frames = 0");
            return Err(DoaError::Validation {
                field: "averaging_frames",
                value: 0.0,
            });
        }
        self.averaging_frames.store(frames, Ordering::Release);
        self.mark_changed();
        Ok(())
    }

    pub fn set_cfar_mode(&self, mode: CfarMode) {
        let (tag, k) = match mode {
            CfarMode::Ca => (0u8, DEFAULT_CFAR_K),
            CfarMode::Os { k } => (1u8, k),
            CfarMode::Go { k } => (2u8, k),
            CfarMode::So { k } => (3u8, k),
        };
        self.cfar_mode_k_bits.store(k.to_bits(), Ordering::Release);
        self.cfar_mode_tag.store(tag, Ordering::Release);
        self.mark_changed();
    }

    pub fn enable_agc(&self, enabled: bool) {
        self.agc_enabled.store(enabled, Ordering::Release);
        self.mark_changed();
    }

    fn mark_changed(&self) {
        self.params_changed.store(true, Ordering::Release);
    }
}

const DEFAULT_CFAR_K: f64 = crate::cfar::CfarParams::DEFAULT_OS_K;

fn validate_range(value: f64, min: f64, max: f64, field: &'static str) -> DoaResult<()> {
    if value < min || value > max {
        log::warn!(
            "rejected {} = {} (valid range [{}, {}])",
            field,
            value,
            min,
            max
        );
        return Err(DoaError::Validation { field, value });
    }
    Ok(())
}

/// Target peak magnitude (0..255 scale) the AGC controller tries to hold.
const AGC_TARGET_LEVEL: f64 = 200.0;
/// Half-width of the hysteresis band around the target.
const AGC_HYSTERESIS_BAND: f64 = 20.0;
/// Coarse gain step, applied when far outside the band.
const AGC_COARSE_STEP_DB: f64 = 3.0;
/// Fine gain step, applied near the edge of the band.
const AGC_FINE_STEP_DB: f64 = 1.0;
/// Consecutive out-of-band frames required before a coarse step.
const AGC_COARSE_HYSTERESIS_FRAMES: u32 = 5;
/// Consecutive out-of-band frames required before a fine step.
const AGC_FINE_HYSTERESIS_FRAMES: u32 = 20;
/// Distance from the band edge, in magnitude units, below which a step
/// is considered "fine" rather than "coarse".
const AGC_FINE_EDGE_MARGIN: f64 = 10.0;

/// Per-channel automatic gain controller. Consumes the conditioning
/// worker's per-frame peak-magnitude hint and recommends a gain delta,
/// written back to the control surface's gain cells for the
/// acquisition task to apply on its next iteration.
pub struct AgcController {
    enabled: bool,
}

impl AgcController {
    pub fn new() -> Self {
        AgcController { enabled: false }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Applies one step of the controller for both channels against
    /// `agc` (the conditioning worker's peak-hint state) and
    /// `control` (where any resulting gain change is written).
    pub fn step(&self, agc: &mut AgcState, control: &ControlSurface) {
        if !self.enabled {
            return;
        }
        for channel in 0..2 {
            let peak = agc.last_peak[channel] as f64;
            let delta = peak - AGC_TARGET_LEVEL;

            if delta.abs() <= AGC_HYSTERESIS_BAND {
                agc.high_count[channel] = 0;
                agc.low_count[channel] = 0;
                continue;
            }

            if delta > 0.0 {
                agc.high_count[channel] += 1;
                agc.low_count[channel] = 0;
            } else {
                agc.low_count[channel] += 1;
                agc.high_count[channel] = 0;
            }

            let fine = delta.abs() <= AGC_HYSTERESIS_BAND + AGC_FINE_EDGE_MARGIN;
            let required = if fine {
                AGC_FINE_HYSTERESIS_FRAMES
            } else {
                AGC_COARSE_HYSTERESIS_FRAMES
            };
            let count = if delta > 0.0 {
                agc.high_count[channel]
            } else {
                agc.low_count[channel]
            };
            if count < required {
                continue;
            }

            let step = if fine { AGC_FINE_STEP_DB } else { AGC_COARSE_STEP_DB };
            let current_gain = control.gain_db(channel);
            let new_gain = if delta > 0.0 {
                (current_gain - step).clamp(MIN_GAIN_DB, MAX_GAIN_DB)
            } else {
                (current_gain + step).clamp(MIN_GAIN_DB, MAX_GAIN_DB)
            };
            if (new_gain - current_gain).abs() > f64::EPSILON {
                let _ = control.set_gain(channel, new_gain);
                agc.gain_db[channel] = new_gain;
            }
            agc.high_count[channel] = 0;
            agc.low_count[channel] = 0;
        }
    }
}

impl Default for AgcController {
    fn default() -> Self {
        AgcController::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rejects_out_of_range_frequency() {
        let control = ControlSurface::new(1e9, 10e6, 10e6);
        assert!(control.set_center_freq(10e6).is_err());
        assert!(control.set_center_freq(7e9).is_err());
        assert_eq!(control.center_freq_hz(), 1e9);
    }

    #[test]
    fn accepts_in_range_frequency_and_marks_changed() {
        let control = ControlSurface::new(1e9, 10e6, 10e6);
        control.clear_params_changed();
        assert!(control.set_center_freq(900e6).is_ok());
        assert_eq!(control.center_freq_hz(), 900e6);
        assert!(control.params_changed());
    }

    #[test]
    fn rejects_out_of_range_gain() {
        let control = ControlSurface::new(1e9, 10e6, 10e6);
        assert!(control.set_gain(0, -1.0).is_err());
        assert!(control.set_gain(0, 61.0).is_err());
    }

    #[test]
    fn rejects_inverted_df_range() {
        let control = ControlSurface::new(1e9, 10e6, 10e6);
        assert!(control.set_df_range(100, 50).is_err());
    }

    #[test]
    fn cfar_mode_round_trips_through_atomics() {
        let control = ControlSurface::new(1e9, 10e6, 10e6);
        control.set_cfar_mode(CfarMode::Go { k: 0.8 });
        match control.cfar_mode() {
            CfarMode::Go { k } => assert!((k - 0.8).abs() < 1e-12),
            other => panic!("expected Go, got {:?}", other),
        }
    }

    #[test]
    fn agc_requires_hysteresis_before_stepping() {
        let control = ControlSurface::new(1e9, 10e6, 10e6);
        control.set_gain(0, 20.0).unwrap();
        control.set_gain(1, 20.0).unwrap();
        let mut agc_state = AgcState::new(20.0);
        agc_state.last_peak = [250, 250]; // far above target, triggers coarse steps

        let mut controller = AgcController::new();
        controller.set_enabled(true);

        for _ in 0..AGC_COARSE_HYSTERESIS_FRAMES - 1 {
            controller.step(&mut agc_state, &control);
        }
        assert_eq!(control.gain_db(0), 20.0, "should not step before hysteresis elapses");

        controller.step(&mut agc_state, &control);
        assert_eq!(control.gain_db(0), 17.0, "should take a coarse step down after hysteresis");
    }

    #[test]
    fn agc_disabled_never_changes_gain() {
        let control = ControlSurface::new(1e9, 10e6, 10e6);
        control.set_gain(0, 20.0).unwrap();
        let mut agc_state = AgcState::new(20.0);
        agc_state.last_peak = [250, 250];
        let controller = AgcController::new();
        for _ in 0..50 {
            controller.step(&mut agc_state, &control);
        }
        assert_eq!(control.gain_db(0), 20.0);
    }

    #[test]
    fn agc_within_band_resets_hysteresis_counters() {
        let control = ControlSurface::new(1e9, 10e6, 10e6);
        control.set_gain(0, 20.0).unwrap();
        let mut agc_state = AgcState::new(20.0);
        agc_state.last_peak = [200, 200]; // exactly on target
        let mut controller = AgcController::new();
        controller.set_enabled(true);
        controller.step(&mut agc_state, &control);
        assert_eq!(agc_state.high_count[0], 0);
        assert_eq!(agc_state.low_count[0], 0);
    }
}
