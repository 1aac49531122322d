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
//! Process worker: conditions sample frames into spectrum frames and
//! feeds the FFT queue, updating the waterfall and IQ buffers and
//! stepping the AGC controller along the way.
//!

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::sleep;

use crate::buffers::{IqSnapshot, WaterfallHistory};
use crate::conditioning::window::WindowType;
use crate::conditioning::Conditioner;
use crate::config::{AgcController, ControlSurface};
use crate::queue::{Consumer, Producer};
use crate::telemetry::TelemetryCounters;
use crate::types::{SampleFrame, SpectrumFrame};

use super::EMPTY_QUEUE_BACKOFF;

/// Runs the conditioning loop until `running` is cleared and the
/// sample queue is drained. Returns the number of frames conditioned.
#[allow(clippy::too_many_arguments)]
pub fn run(
    consumer: Consumer<SampleFrame>,
    producer: Producer<SpectrumFrame>,
    fft_size: usize,
    window_type: WindowType,
    control: &ControlSurface,
    telemetry: &TelemetryCounters,
    waterfall: Option<&WaterfallHistory>,
    iq_snapshot: Option<&IqSnapshot>,
    running: &AtomicBool,
) -> u64 {
    let mut conditioner = Conditioner::new(fft_size, window_type);
    let mut agc = AgcController::new();
    let mut frames_processed = 0u64;

    loop {
        let frame = match consumer.pop() {
            Some(frame) => frame,
            None => {
                if !running.load(Ordering::Acquire) {
                    break;
                }
                sleep(EMPTY_QUEUE_BACKOFF);
                continue;
            }
        };

        let _timer = telemetry.scoped_timer(&telemetry.conditioning_micros_total);

        conditioner.set_window_type(control.window_type());

        let spectrum = conditioner.process(control.center_freq_hz(), &frame);
        frames_processed += 1;

        agc.set_enabled(control.agc_enabled());
        agc.step(conditioner.agc_state_mut(), control);

        if let Some(waterfall) = waterfall {
            waterfall.push_row(&spectrum.magnitude_ch1);
        }
        if let Some(iq_snapshot) = iq_snapshot {
            iq_snapshot.write(&spectrum.fft_ch1, &spectrum.fft_ch2, None);
        }

        if producer.push(spectrum).is_err() {
            telemetry.fft_queue_full.fetch_add(1, Ordering::Relaxed);
            telemetry.frames_dropped.fetch_add(1, Ordering::Relaxed);
        } else {
            telemetry.frames_processed.fetch_add(1, Ordering::Relaxed);
        }
    }

    frames_processed
}
