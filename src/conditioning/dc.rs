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
//! Per-channel DC-offset removal via an EWMA estimate of the I/Q means.
//!

use num_complex::Complex32;

use crate::types::DCOffsetState;

/// EWMA smoothing factor, `alpha ~= 2^-10`.
const DC_ALPHA: f64 = 1.0 / 1024.0;

/// Subtracts the running DC estimate from `samples` in place and
/// updates `state` with the new means. If `center_freq_hz` differs
/// from the last one seen, the EWMA means and convergence counter are
/// reset first (the analog DC offset shifts with the LO).
pub fn remove_dc(state: &mut DCOffsetState, channel: usize, center_freq_hz: f64, samples: &mut [Complex32]) {
    if center_freq_hz != state.last_center_freq_hz {
        state.mean_i[channel] = 0.0;
        state.mean_q[channel] = 0.0;
        state.convergence_count = 0;
        state.last_center_freq_hz = center_freq_hz;
    }

    for sample in samples.iter_mut() {
        state.mean_i[channel] += DC_ALPHA * (sample.re as f64 - state.mean_i[channel]);
        state.mean_q[channel] += DC_ALPHA * (sample.im as f64 - state.mean_q[channel]);
        sample.re -= state.mean_i[channel] as f32;
        sample.im -= state.mean_q[channel] as f32;
    }
    state.convergence_count += samples.len() as u64;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn converges_to_constant_offset_within_4096_samples() {
        let mut state = DCOffsetState::new();
        let offset = Complex32::new(100.0, -50.0);
        let mut total = 0usize;
        let mut last_batch = Vec::new();
        while total < 4096 {
            let mut batch = vec![offset; 128];
            remove_dc(&mut state, 0, 1e9, &mut batch);
            last_batch = batch;
            total += 128;
        }
        for s in &last_batch {
            assert!(s.re.abs() < 1.0, "re residual too large: {}", s.re);
            assert!(s.im.abs() < 1.0, "im residual too large: {}", s.im);
        }
    }

    #[test]
    fn center_frequency_change_resets_state() {
        let mut state = DCOffsetState::new();
        let mut batch = vec![Complex32::new(10.0, 10.0); 1024];
        remove_dc(&mut state, 0, 1e9, &mut batch);
        assert!(state.mean_i[0] > 0.0);

        let mut next = vec![Complex32::new(0.0, 0.0); 4];
        remove_dc(&mut state, 0, 2e9, &mut next);
        assert_eq!(state.convergence_count, 4);
        // Mean should have been reset to ~0 before this tiny batch ran,
        // so it stays close to zero rather than carrying over the old bias.
        assert!(state.mean_i[0].abs() < 1.0);
    }

    #[test]
    fn channels_tracked_independently() {
        let mut state = DCOffsetState::new();
        let mut ch0 = vec![Complex32::new(50.0, 0.0); 2048];
        let mut ch1 = vec![Complex32::new(-50.0, 0.0); 2048];
        remove_dc(&mut state, 0, 1e9, &mut ch0);
        remove_dc(&mut state, 1, 1e9, &mut ch1);
        assert!(state.mean_i[0] > 0.0);
        assert!(state.mean_i[1] < 0.0);
    }
}
