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
//! Forward FFT wrapper. The planner is created once per pipeline
//! instance and reused for every frame on both channels.
//!

use std::sync::Arc;

use num_complex::Complex32;
use rustfft::{Fft as RustFft, FftPlanner};

/// Caches a forward FFT plan of a fixed size.
pub struct FftProcessor {
    size: usize,
    plan: Arc<dyn RustFft<f32>>,
}

impl FftProcessor {
    /// Builds a processor for forward FFTs of `size` points. `size`
    /// should be a power of two.
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let plan = planner.plan_fft_forward(size);
        FftProcessor { size, plan }
    }

    /// The FFT size this processor was built for.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Computes the forward FFT of `buffer` in place. `buffer.len()`
    /// must equal `self.size()`.
    pub fn process(&self, buffer: &mut [Complex32]) {
        debug_assert_eq!(buffer.len(), self.size);
        self.plan.process(buffer);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::PI;

    #[test]
    fn dc_input_produces_energy_only_in_bin_zero() {
        let processor = FftProcessor::new(64);
        let mut buffer = vec![Complex32::new(1.0, 0.0); 64];
        processor.process(&mut buffer);
        assert_relative_eq!(buffer[0].norm(), 64.0, epsilon = 1e-3);
        for bin in &buffer[1..] {
            assert!(bin.norm() < 1e-2);
        }
    }

    #[test]
    fn single_tone_produces_energy_in_expected_bin() {
        let size = 64;
        let processor = FftProcessor::new(size);
        let k = 5;
        let mut buffer: Vec<Complex32> = (0..size)
            .map(|n| {
                let phase = 2.0 * PI * k as f32 * n as f32 / size as f32;
                Complex32::new(phase.cos(), phase.sin())
            })
            .collect();
        processor.process(&mut buffer);
        let peak_bin = buffer
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.norm().partial_cmp(&b.1.norm()).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak_bin, k);
    }

    #[test]
    fn processor_reports_its_size() {
        let processor = FftProcessor::new(4096);
        assert_eq!(processor.size(), 4096);
    }
}
