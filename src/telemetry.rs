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
//! Process-wide monotonic telemetry counters and a scoped timer that
//! accumulates elapsed microseconds into a counter on scope exit.
//!

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Monotonic atomic counters describing pipeline activity. Intended to
/// be constructed once and shared (`Arc<TelemetryCounters>`) across
/// all three pipeline workers.
#[derive(Default)]
pub struct TelemetryCounters {
    /// Frames that made it all the way through conditioning.
    pub frames_processed: AtomicU64,
    /// Frames dropped for any reason (queue full, etc).
    pub frames_dropped: AtomicU64,
    /// Cumulative microseconds spent in the acquisition stage.
    pub acquire_micros_total: AtomicU64,
    /// Cumulative microseconds spent in the conditioning stage.
    pub conditioning_micros_total: AtomicU64,
    /// Cumulative microseconds spent in the analysis stage.
    pub analysis_micros_total: AtomicU64,
    /// Times the sample queue refused a push.
    pub sample_queue_full: AtomicU64,
    /// Times the FFT queue refused a push.
    pub fft_queue_full: AtomicU64,
    /// Total CFAR detections (signal regions) reported.
    pub detections: AtomicU64,
    /// Total DF estimator invocations.
    pub df_invocations: AtomicU64,
    /// Radio driver errors observed.
    pub usb_errors: AtomicU64,
    /// Successful radio driver reconnects after an error.
    pub usb_recoveries: AtomicU64,
    /// Acquisition watchdog heartbeat; advances every iteration.
    pub heartbeat: AtomicU64,
}

impl TelemetryCounters {
    /// Creates a fresh set of zeroed counters.
    pub fn new() -> Self {
        TelemetryCounters::default()
    }

    /// Starts a scoped timer that adds its elapsed time, in
    /// microseconds, to `counter` when dropped. Safe across an early
    /// `return` or `?` inside the timed scope, since the accumulation
    /// happens in `Drop::drop`.
    pub fn scoped_timer<'a>(&'a self, counter: &'a AtomicU64) -> ScopedTimer<'a> {
        ScopedTimer {
            counter,
            start: Instant::now(),
        }
    }
}

/// RAII guard that adds elapsed microseconds to an atomic counter when
/// dropped.
pub struct ScopedTimer<'a> {
    counter: &'a AtomicU64,
    start: Instant,
}

impl<'a> Drop for ScopedTimer<'a> {
    fn drop(&mut self) {
        let elapsed_us = self.start.elapsed().as_micros() as u64;
        self.counter.fetch_add(elapsed_us, Ordering::Relaxed);
    }
}
