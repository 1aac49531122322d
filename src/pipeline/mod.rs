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
//! Pipeline orchestrator: spawns the acquire, process, and analyze
//! workers as scoped threads sharing a single running flag, and joins
//! them into one report.
//!

mod acquire;
mod analyze;
mod process;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossbeam::thread;

use crate::buffers::{ClassificationRing, IqSnapshot, LastDoaBuffer, WaterfallHistory, XcorrSnapshot};
use crate::calibration::CalibrationStore;
use crate::config::ControlSurface;
use crate::conditioning::window::WindowType;
use crate::driver::RadioDriver;
use crate::queue;
use crate::sinks::{DoaSink, SpectrumSink};
use crate::telemetry::TelemetryCounters;

/// Capacity of the sample queue between acquire and process.
const SAMPLE_QUEUE_CAPACITY: usize = 8;
/// Capacity of the FFT queue between process and analyze.
const FFT_QUEUE_CAPACITY: usize = 8;
/// How long the process/analyze workers sleep when their input queue
/// is empty, to avoid busy-spinning while waiting for upstream data.
const EMPTY_QUEUE_BACKOFF: Duration = Duration::from_micros(200);

/// Everything a pipeline run needs beyond the driver and sinks: sizing
/// and the shared mutable state every worker touches.
pub struct PipelineConfig {
    /// FFT size (and therefore conditioning block size), a power of two.
    pub fft_size: usize,
    /// Initial window function.
    pub window_type: WindowType,
    /// Shared control surface (frequency, gain, DF range, ...).
    pub control: Arc<ControlSurface>,
    /// Shared calibration table.
    pub calibration: Arc<Mutex<CalibrationStore>>,
    /// Shared telemetry counters.
    pub telemetry: Arc<TelemetryCounters>,
}

/// Shared output buffers a pipeline run populates, for external
/// readers (a visualization surface, a classifier) to poll.
#[derive(Default)]
pub struct PipelineBuffers {
    pub waterfall: Option<Arc<WaterfallHistory>>,
    pub iq_snapshot: Option<Arc<IqSnapshot>>,
    pub xcorr_snapshot: Option<Arc<XcorrSnapshot>>,
    pub last_doa: Option<Arc<LastDoaBuffer>>,
    pub classifications: Option<Arc<ClassificationRing>>,
}

/// Handles a caller can use to stop a running pipeline. Cloning the
/// inner `Arc<AtomicBool>` and setting it `false` requests shutdown;
/// `run_pipeline` itself blocks until all three workers join.
#[derive(Clone)]
pub struct PipelineHandles {
    running: Arc<AtomicBool>,
}

impl PipelineHandles {
    /// Requests that all workers stop at their next iteration boundary.
    /// Idempotent: calling this more than once is a no-op.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// True while the pipeline is still (nominally) running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Summary of one pipeline run, returned after all workers join.
#[derive(Debug)]
pub struct PipelineReport {
    /// Total wall-clock run time.
    pub run_time: Duration,
    /// Frames successfully acquired from the driver.
    pub frames_acquired: u64,
    /// Frames conditioned into spectrum frames.
    pub frames_processed: u64,
    /// Frames that reached the analysis stage.
    pub frames_analyzed: u64,
}

/// Runs the three-stage pipeline until `handles.stop()` is called or
/// the driver reports EOF, then joins all workers and returns a
/// report. `spectrum_sink`/`doa_sink` are invoked from the analyze
/// thread only.
pub fn run_pipeline(
    driver: Box<dyn RadioDriver + Send>,
    spectrum_sink: Box<dyn SpectrumSink + Send>,
    doa_sink: Box<dyn DoaSink + Send>,
    config: PipelineConfig,
    buffers: PipelineBuffers,
) -> (PipelineHandles, std::thread::JoinHandle<PipelineReport>) {
    let running = Arc::new(AtomicBool::new(true));
    let handles = PipelineHandles {
        running: running.clone(),
    };

    let report_handle = std::thread::spawn(move || {
        let start = Instant::now();
        let (sample_producer, sample_consumer) = queue::spsc(SAMPLE_QUEUE_CAPACITY);
        let (fft_producer, fft_consumer) = queue::spsc(FFT_QUEUE_CAPACITY);

        let mut driver = driver;
        let mut spectrum_sink = spectrum_sink;
        let mut doa_sink = doa_sink;

        let (frames_acquired, frames_processed, frames_analyzed) = thread::scope(|scope| {
            log::info!("pipeline starting");

            let acquire_running = running.clone();
            let acquire_control = config.control.clone();
            let acquire_telemetry = config.telemetry.clone();
            let acquire_handle = scope
                .builder()
                .name("doa-acquire".to_string())
                .spawn(move |_| {
                    log::debug!("acquire worker starting");
                    let n = acquire::run(
                        &mut *driver,
                        sample_producer,
                        &acquire_control,
                        &acquire_telemetry,
                        &acquire_running,
                    );
                    log::debug!("acquire worker stopping");
                    n
                })
                .expect("failed to spawn acquire thread");

            let process_running = running.clone();
            let process_control = config.control.clone();
            let process_telemetry = config.telemetry.clone();
            let process_waterfall = buffers.waterfall.clone();
            let process_iq = buffers.iq_snapshot.clone();
            let fft_size = config.fft_size;
            let window_type = config.window_type;
            let process_handle = scope
                .builder()
                .name("doa-process".to_string())
                .spawn(move |_| {
                    log::debug!("process worker starting");
                    let n = process::run(
                        sample_consumer,
                        fft_producer,
                        fft_size,
                        window_type,
                        &process_control,
                        &process_telemetry,
                        process_waterfall.as_deref(),
                        process_iq.as_deref(),
                        &process_running,
                    );
                    log::debug!("process worker stopping");
                    n
                })
                .expect("failed to spawn process thread");

            let analyze_running = running.clone();
            let analyze_control = config.control.clone();
            let analyze_calibration = config.calibration.clone();
            let analyze_telemetry = config.telemetry.clone();
            let analyze_xcorr = buffers.xcorr_snapshot.clone();
            let analyze_doa = buffers.last_doa.clone();
            let analyze_handle = scope
                .builder()
                .name("doa-analyze".to_string())
                .spawn(move |_| {
                    log::debug!("analyze worker starting");
                    let n = analyze::run(
                        fft_consumer,
                        &analyze_control,
                        &analyze_calibration,
                        &analyze_telemetry,
                        analyze_xcorr.as_deref(),
                        analyze_doa.as_deref(),
                        &mut *spectrum_sink,
                        &mut *doa_sink,
                        &analyze_running,
                    );
                    log::debug!("analyze worker stopping");
                    n
                })
                .expect("failed to spawn analyze thread");

            let frames_acquired = acquire_handle.join().expect("acquire worker panicked");
            // Acquire has stopped; let process and analyze drain what's
            // left in their queues before we ask them to stop too.
            running.store(false, Ordering::Release);
            let frames_processed = process_handle.join().expect("process worker panicked");
            let frames_analyzed = analyze_handle.join().expect("analyze worker panicked");

            (frames_acquired, frames_processed, frames_analyzed)
        })
        .expect("a pipeline worker thread panicked");

        log::info!("pipeline stopped");

        PipelineReport {
            run_time: start.elapsed(),
            frames_acquired,
            frames_processed,
            frames_analyzed,
        }
    });

    (handles, report_handle)
}
