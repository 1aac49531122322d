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
//! 50% overlap-add: each FFT window is formed from the retained second
//! half of the previous block followed by the first half of the
//! current one, with the current block's second half retained for
//! next time.
//!

use num_complex::Complex32;
use num_traits::Zero;

use crate::types::OverlapState;

/// Produces the next `fft_size`-length window for `channel` from
/// `block` (a freshly deinterleaved, DC-corrected buffer of length
/// `fft_size`), updating the retained tail in `state`.
///
/// On the first call for a channel (empty retained tail), the missing
/// first half is zero-filled.
pub fn next_window(state: &mut OverlapState, channel: usize, block: &[Complex32]) -> Vec<Complex32> {
    let fft_size = block.len();
    let half = fft_size / 2;

    let mut window = Vec::with_capacity(fft_size);
    if state.tail[channel].len() == half {
        window.extend_from_slice(&state.tail[channel]);
    } else {
        window.extend(std::iter::repeat(Complex32::zero()).take(half));
    }
    window.extend_from_slice(&block[..fft_size - half]);
    window.truncate(fft_size);

    state.tail[channel] = block[fft_size - half..].to_vec();

    window
}
