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
//! Conditioning stage: turns a raw `SampleFrame` into a `SpectrumFrame`.
//!
//! Per frame: deinterleave, remove DC, overlap-add, window, FFT,
//! quantize to log-magnitude with DC-bin smoothing, and update the
//! noise floor and AGC hint.
//!

pub mod dc;
pub mod fft;
pub mod magnitude;
pub mod overlap;
pub mod window;

use num_complex::Complex32;

use crate::noise_floor;
use crate::types::{
    AgcState, DCOffsetState, NoiseFloorState, OverlapState, SampleFrame, SpectrumFrame,
};
use crate::conditioning::fft::FftProcessor;
use crate::conditioning::window::WindowType;

/// Owns all per-worker state for the conditioning stage and the FFT
/// plan, and turns `SampleFrame`s into `SpectrumFrame`s.
pub struct Conditioner {
    fft_size: usize,
    fft: FftProcessor,
    window_type: WindowType,
    window_coefficients: Vec<f64>,
    dc: DCOffsetState,
    overlap: OverlapState,
    noise_floor: NoiseFloorState,
    agc: AgcState,
}

impl Conditioner {
    /// Creates a conditioner for FFTs of `fft_size` points (a power of
    /// two), starting with `window_type`.
    pub fn new(fft_size: usize, window_type: WindowType) -> Self {
        let window_coefficients = window::generate(window_type, fft_size);
        Conditioner {
            fft_size,
            fft: FftProcessor::new(fft_size),
            window_type,
            window_coefficients,
            dc: DCOffsetState::new(),
            overlap: OverlapState::new(),
            noise_floor: NoiseFloorState::new(),
            agc: AgcState::new(0.0),
        }
    }

    /// Changes the window type, regenerating coefficients only if it
    /// actually changed.
    pub fn set_window_type(&mut self, window_type: WindowType) {
        if window_type != self.window_type {
            self.window_type = window_type;
            self.window_coefficients = window::generate(window_type, self.fft_size);
        }
    }

    /// Read-only access to the AGC state, for the control surface to
    /// consult when deciding on a gain change.
    pub fn agc_state(&self) -> &AgcState {
        &self.agc
    }

    /// Mutable access to the AGC state, for the control surface to
    /// reset hysteresis counters after acting on a gain change.
    pub fn agc_state_mut(&mut self) -> &mut AgcState {
        &mut self.agc
    }

    /// Processes one sample frame into a spectrum frame.
    pub fn process(&mut self, center_freq_hz: f64, frame: &SampleFrame) -> SpectrumFrame {
        let (mut ch1, mut ch2) = deinterleave(&frame.samples, frame.count);

        dc::remove_dc(&mut self.dc, 0, center_freq_hz, &mut ch1);
        dc::remove_dc(&mut self.dc, 1, center_freq_hz, &mut ch2);

        let mut window1 = overlap::next_window(&mut self.overlap, 0, &ch1);
        let mut window2 = overlap::next_window(&mut self.overlap, 1, &ch2);

        window::apply(&mut window1, &self.window_coefficients);
        window::apply(&mut window2, &self.window_coefficients);

        self.fft.process(&mut window1);
        self.fft.process(&mut window2);

        let mut magnitude1 = magnitude::fft_to_magnitude(&window1);
        let mut magnitude2 = magnitude::fft_to_magnitude(&window2);
        let center_bin = self.fft_size / 2;
        magnitude::smooth_dc_bins(&mut magnitude1, center_bin);
        magnitude::smooth_dc_bins(&mut magnitude2, center_bin);

        noise_floor::update(&mut self.noise_floor, 0, &magnitude1);
        noise_floor::update(&mut self.noise_floor, 1, &magnitude2);

        update_agc_hint(&mut self.agc, 0, &magnitude1);
        update_agc_hint(&mut self.agc, 1, &magnitude2);

        let noise_floor_snapshot = [
            self.noise_floor.smoothed[0].round().clamp(0.0, 255.0) as u8,
            self.noise_floor.smoothed[1].round().clamp(0.0, 255.0) as u8,
        ];

        SpectrumFrame {
            fft_size: self.fft_size,
            fft_ch1: window1,
            fft_ch2: window2,
            magnitude_ch1: magnitude1,
            magnitude_ch2: magnitude2,
            noise_floor: noise_floor_snapshot,
            timestamp_us: frame.timestamp_us,
        }
    }
}

/// Splits an interleaved `[I1 Q1 I2 Q2 ...]` buffer into two per-
/// channel complex buffers of `count` samples each.
fn deinterleave(samples: &[i16], count: usize) -> (Vec<Complex32>, Vec<Complex32>) {
    let mut ch1 = Vec::with_capacity(count);
    let mut ch2 = Vec::with_capacity(count);
    for i in 0..count {
        let base = i * 4;
        ch1.push(Complex32::new(samples[base] as f32, samples[base + 1] as f32));
        ch2.push(Complex32::new(
            samples[base + 2] as f32,
            samples[base + 3] as f32,
        ));
    }
    (ch1, ch2)
}

/// Tracks the last observed peak magnitude for the AGC controller
/// (§4.12); does not itself change gain, only records what the
/// controller needs.
fn update_agc_hint(agc: &mut AgcState, channel: usize, magnitude: &[u8]) {
    if let Some(&peak) = magnitude.iter().max() {
        agc.last_peak[channel] = peak;
    }
}
