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
//! Analyze worker: runs CFAR detection and the direction-finding
//! estimator over each spectrum frame, updates the cross-correlation
//! and last-DoA buffers, and fans results out to the sinks.
//!

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::thread::sleep;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::buffers::{LastDoaBuffer, XcorrSnapshot};
use crate::calibration::CalibrationStore;
use crate::cfar::{ca, os, CfarMode};
use crate::config::ControlSurface;
use crate::df::{DfEstimator, DfInput};
use crate::queue::Consumer;
use crate::sinks::{DoaSink, SpectrumSink};
use crate::telemetry::TelemetryCounters;
use crate::types::SpectrumFrame;

use super::EMPTY_QUEUE_BACKOFF;

/// Runs the analysis loop until `running` is cleared and the FFT queue
/// is drained. Returns the number of frames analyzed.
#[allow(clippy::too_many_arguments)]
pub fn run(
    consumer: Consumer<SpectrumFrame>,
    control: &ControlSurface,
    calibration: &Mutex<CalibrationStore>,
    telemetry: &TelemetryCounters,
    xcorr_snapshot: Option<&XcorrSnapshot>,
    last_doa: Option<&LastDoaBuffer>,
    spectrum_sink: &mut (dyn SpectrumSink + Send),
    doa_sink: &mut (dyn DoaSink + Send),
    running: &AtomicBool,
) -> u64 {
    let mut estimator = DfEstimator::new();
    let mut frames_analyzed = 0u64;

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

        let _timer = telemetry.scoped_timer(&telemetry.analysis_micros_total);

        let (start, end) = control.df_range();
        let center_bin = frame.magnitude_ch1.len() / 2;
        let cfar_params = crate::cfar::CfarParams::default();

        let mut regions = match control.cfar_mode() {
            CfarMode::Ca => ca::detect(
                &frame.magnitude_ch1,
                start,
                end,
                center_bin,
                &cfar_params,
                Some(frame.noise_floor[0]),
            ),
            mode => os::detect(&frame.magnitude_ch1, start, end, center_bin, &cfar_params, mode),
        };
        os::annotate_snr(&mut regions, frame.noise_floor[0]);
        telemetry
            .detections
            .fetch_add(regions.len() as u64, Ordering::Relaxed);

        let input = DfInput {
            fft_ch1: &frame.fft_ch1,
            fft_ch2: &frame.fft_ch2,
            magnitude_ch1: &frame.magnitude_ch1,
            magnitude_ch2: &frame.magnitude_ch2,
            bin_range: (start, end),
            center_freq_hz: control.center_freq_hz(),
            noise_floor: Some(frame.noise_floor),
        };
        let doa_result = {
            let calibration = calibration.lock().unwrap();
            estimator.estimate(&input, &calibration, now_ms())
        };
        telemetry.df_invocations.fetch_add(1, Ordering::Relaxed);

        if let Some(xcorr) = xcorr_snapshot {
            let fft_ch1 = frame.fft_ch1.clone();
            let fft_ch2 = frame.fft_ch2.clone();
            xcorr.maybe_update(|| {
                let mut magnitude = Vec::with_capacity(fft_ch1.len());
                let mut phase = Vec::with_capacity(fft_ch1.len());
                for (a, b) in fft_ch1.iter().zip(fft_ch2.iter()) {
                    let product = a * b.conj();
                    magnitude.push(product.norm() as f64);
                    phase.push(product.im.atan2(product.re) as f64);
                }
                (magnitude, phase)
            });
        }
        if let Some(last_doa) = last_doa {
            last_doa.write(doa_result);
        }

        spectrum_sink.on_spectrum(&frame, &regions);
        doa_sink.on_doa(&doa_result);

        frames_analyzed += 1;
    }

    frames_analyzed
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::queue;
    use num_complex::Complex32;

    struct CountingSpectrumSink {
        calls: usize,
    }
    impl SpectrumSink for CountingSpectrumSink {
        fn on_spectrum(&mut self, _frame: &SpectrumFrame, _regions: &[crate::types::SignalRegion]) {
            self.calls += 1;
        }
    }

    struct CountingDoaSink {
        calls: usize,
    }
    impl DoaSink for CountingDoaSink {
        fn on_doa(&mut self, _result: &crate::types::DFResult) {
            self.calls += 1;
        }
    }

    fn synthetic_spectrum(size: usize) -> SpectrumFrame {
        let mut fft1 = vec![Complex32::new(0.0, 0.0); size];
        let mut fft2 = vec![Complex32::new(0.0, 0.0); size];
        let mut mag1 = vec![10u8; size];
        let mut mag2 = vec![10u8; size];
        for bin in (size / 2 - 4)..(size / 2 + 3) {
            fft1[bin] = Complex32::new(200.0, 0.0);
            fft2[bin] = Complex32::new(200.0, 0.0);
            mag1[bin] = 200;
            mag2[bin] = 200;
        }
        SpectrumFrame {
            fft_size: size,
            fft_ch1: fft1,
            fft_ch2: fft2,
            magnitude_ch1: mag1,
            magnitude_ch2: mag2,
            noise_floor: [10, 10],
            timestamp_us: 0,
        }
    }

    #[test]
    fn analyzes_queued_frames_and_notifies_sinks() {
        let (producer, consumer) = queue::spsc(4);
        producer.push(synthetic_spectrum(256)).unwrap();
        drop(producer);

        let control = ControlSurface::new(1e9, 10e6, 10e6);
        control.set_df_range(100, 150).unwrap();
        let calibration = Mutex::new(CalibrationStore::new());
        let telemetry = TelemetryCounters::new();
        let running = AtomicBool::new(false);

        let mut spectrum_sink = CountingSpectrumSink { calls: 0 };
        let mut doa_sink = CountingDoaSink { calls: 0 };

        let analyzed = run(
            consumer,
            &control,
            &calibration,
            &telemetry,
            None,
            None,
            &mut spectrum_sink,
            &mut doa_sink,
            &running,
        );

        assert_eq!(analyzed, 1);
        assert_eq!(spectrum_sink.calls, 1);
        assert_eq!(doa_sink.calls, 1);
        assert!(telemetry.df_invocations.load(Ordering::Relaxed) >= 1);
    }

    #[test]
    fn writes_last_doa_buffer() {
        let (producer, consumer) = queue::spsc(4);
        producer.push(synthetic_spectrum(256)).unwrap();
        drop(producer);

        let control = ControlSurface::new(1e9, 10e6, 10e6);
        control.set_df_range(100, 150).unwrap();
        let calibration = Mutex::new(CalibrationStore::new());
        let telemetry = TelemetryCounters::new();
        let running = AtomicBool::new(false);
        let last_doa = LastDoaBuffer::new();

        let mut spectrum_sink = CountingSpectrumSink { calls: 0 };
        let mut doa_sink = CountingDoaSink { calls: 0 };

        run(
            consumer,
            &control,
            &calibration,
            &telemetry,
            None,
            Some(&last_doa),
            &mut spectrum_sink,
            &mut doa_sink,
            &running,
        );

        assert!(last_doa.read().confidence >= 0.0);
    }
}
