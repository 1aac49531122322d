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
//! Acquisition worker: pulls frames from the radio driver, applies
//! pending control-surface changes, and feeds the sample queue.
//!

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::ControlSurface;
use crate::driver::{DriverConfig, DriverEvent, RadioDriver};
use crate::queue::Producer;
use crate::telemetry::TelemetryCounters;
use crate::types::SampleFrame;

/// Runs the acquisition loop until `running` is cleared or the driver
/// reports EOF. Returns the number of frames successfully acquired
/// (including ones later dropped for a full queue).
pub fn run(
    driver: &mut (dyn RadioDriver + Send),
    producer: Producer<SampleFrame>,
    control: &ControlSurface,
    telemetry: &TelemetryCounters,
    running: &AtomicBool,
) -> u64 {
    if let Err(e) = driver.open() {
        log::error!("radio driver failed to open: {}", e);
        telemetry.usb_errors.fetch_add(1, Ordering::Relaxed);
        return 0;
    }
    if let Err(e) = driver.start_rx() {
        log::error!("radio driver failed to start rx: {}", e);
        telemetry.usb_errors.fetch_add(1, Ordering::Relaxed);
        return 0;
    }

    let mut frames_acquired = 0u64;

    while running.load(Ordering::Acquire) {
        apply_pending_control_changes(driver, control, telemetry);

        match driver.read_frame() {
            Ok(DriverEvent::Frame(mut frame)) => {
                frame.timestamp_us = now_micros();
                frames_acquired += 1;
                if producer.push(frame).is_err() {
                    telemetry.sample_queue_full.fetch_add(1, Ordering::Relaxed);
                    telemetry.frames_dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
            Ok(DriverEvent::Eof) => {
                log::info!("radio driver reached end of stream");
                break;
            }
            Err(e) => {
                log::warn!("radio driver read error, attempting reconnect: {}", e);
                telemetry.usb_errors.fetch_add(1, Ordering::Relaxed);
                if driver.open().is_ok() && driver.start_rx().is_ok() {
                    telemetry.usb_recoveries.fetch_add(1, Ordering::Relaxed);
                } else {
                    log::error!("radio driver reconnect failed, stopping acquisition");
                    break;
                }
            }
        }

        telemetry.heartbeat.fetch_add(1, Ordering::Relaxed);
    }

    let _ = driver.close();
    frames_acquired
}

fn apply_pending_control_changes(
    driver: &mut (dyn RadioDriver + Send),
    control: &ControlSurface,
    telemetry: &TelemetryCounters,
) {
    if !control.params_changed() {
        return;
    }
    let config = DriverConfig {
        center_freq_hz: control.center_freq_hz(),
        sample_rate_hz: control.sample_rate_hz(),
        bandwidth_hz: control.bandwidth_hz(),
        gain_db: [control.gain_db(0), control.gain_db(1)],
    };
    match driver.configure(config) {
        Ok(()) => control.clear_params_changed(),
        Err(e) => {
            log::warn!("failed to apply pending control change: {}", e);
            telemetry.usb_errors.fetch_add(1, Ordering::Relaxed);
        }
    }
}

fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct ScriptedDriver {
        frames_left: usize,
        configure_calls: AtomicUsize,
    }

    impl RadioDriver for ScriptedDriver {
        fn open(&mut self) -> Result<(), String> {
            Ok(())
        }

        fn configure(&mut self, _config: DriverConfig) -> Result<(), String> {
            self.configure_calls.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        fn start_rx(&mut self) -> Result<(), String> {
            Ok(())
        }

        fn read_frame(&mut self) -> Result<DriverEvent, String> {
            if self.frames_left == 0 {
                return Ok(DriverEvent::Eof);
            }
            self.frames_left -= 1;
            Ok(DriverEvent::Frame(SampleFrame::new(vec![0i16; 16], 4, 0)))
        }

        fn close(&mut self) -> Result<(), String> {
            Ok(())
        }
    }

    #[test]
    fn stops_cleanly_on_driver_eof() {
        let mut driver = ScriptedDriver {
            frames_left: 3,
            configure_calls: AtomicUsize::new(0),
        };
        let (producer, consumer) = crate::queue::spsc(8);
        let control = ControlSurface::new(1e9, 10e6, 10e6);
        let telemetry = TelemetryCounters::new();
        let running = AtomicBool::new(true);

        let acquired = run(&mut driver, producer, &control, &telemetry, &running);

        assert_eq!(acquired, 3);
        assert_eq!(consumer.len(), 3);
    }

    #[test]
    fn applies_pending_control_change_once() {
        let mut driver = ScriptedDriver {
            frames_left: 1,
            configure_calls: AtomicUsize::new(0),
        };
        let (producer, _consumer) = crate::queue::spsc(8);
        let control = ControlSurface::new(1e9, 10e6, 10e6);
        control.set_center_freq(950e6).unwrap();
        let telemetry = TelemetryCounters::new();
        let running = AtomicBool::new(true);

        run(&mut driver, producer, &control, &telemetry, &running);

        assert_eq!(driver.configure_calls.load(Ordering::Relaxed), 1);
        assert!(!control.params_changed());
    }
}
