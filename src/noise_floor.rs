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
//! Percentile-based noise-floor estimation with EWMA smoothing.
//!

use crate::types::NoiseFloorState;

/// Percentile used for the instantaneous floor estimate.
const FLOOR_PERCENTILE: f64 = 0.15;
/// EWMA smoothing factor blending the instantaneous estimate in.
const FLOOR_EWMA_ALPHA: f64 = 0.1;

/// Updates `state.smoothed[channel]` from `magnitude` (0..255 scale)
/// using a partial-selection percentile estimate blended with EWMA.
pub fn update(state: &mut NoiseFloorState, channel: usize, magnitude: &[u8]) {
    if magnitude.is_empty() {
        return;
    }
    state.scratch.clear();
    state.scratch.extend_from_slice(magnitude);

    let k = (((magnitude.len() - 1) as f64) * FLOOR_PERCENTILE).round() as usize;
    let k = k.min(state.scratch.len() - 1);
    let (_, pivot, _) = state.scratch.select_nth_unstable(k);
    let percentile_value = *pivot as f64;

    state.smoothed[channel] =
        FLOOR_EWMA_ALPHA * percentile_value + (1.0 - FLOOR_EWMA_ALPHA) * state.smoothed[channel];
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn converges_toward_constant_floor() {
        let mut state = NoiseFloorState::new();
        let magnitude = vec![50u8; 256];
        for _ in 0..200 {
            update(&mut state, 0, &magnitude);
        }
        assert!((state.smoothed[0] - 50.0).abs() < 1.0);
    }

    #[test]
    fn tracks_fifteenth_percentile_not_mean() {
        // Half the bins at 10, half at 200: 15th percentile should sit
        // near the low cluster, far from the mean of ~105.
        let mut state = NoiseFloorState::new();
        let mut magnitude = vec![10u8; 128];
        magnitude.extend(vec![200u8; 128]);
        for _ in 0..500 {
            update(&mut state, 0, &magnitude);
        }
        assert!(state.smoothed[0] < 50.0);
    }

    #[test]
    fn empty_magnitude_leaves_state_unchanged() {
        let mut state = NoiseFloorState::new();
        state.smoothed[0] = 42.0;
        update(&mut state, 0, &[]);
        assert_eq!(state.smoothed[0], 42.0);
    }

    #[test]
    fn channels_are_independent() {
        let mut state = NoiseFloorState::new();
        let low = vec![5u8; 64];
        let high = vec![250u8; 64];
        for _ in 0..200 {
            update(&mut state, 0, &low);
            update(&mut state, 1, &high);
        }
        assert!(state.smoothed[0] < state.smoothed[1]);
    }
}
