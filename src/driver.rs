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
//! Radio driver boundary. No concrete hardware backend ships here;
//! callers supply a `Box<dyn RadioDriver + Send>`.
//!

use crate::types::SampleFrame;

/// Per-channel receiver configuration applied before streaming starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriverConfig {
    /// Center frequency, Hz.
    pub center_freq_hz: f64,
    /// Sample rate, Hz.
    pub sample_rate_hz: f64,
    /// Analog bandwidth, Hz.
    pub bandwidth_hz: f64,
    /// Receiver gain, per channel, dB.
    pub gain_db: [f64; 2],
}

/// Outcome of one `read_frame` call.
pub enum DriverEvent {
    /// A full sample frame was read.
    Frame(SampleFrame),
    /// The underlying source reached its end (file-backed drivers only).
    Eof,
}

/// The boundary between the pipeline and a physical or simulated
/// dual-channel receiver. Implementations are not required to be
/// `Sync`; the acquisition worker is the sole owner.
pub trait RadioDriver {
    /// Opens and initializes the device, if not already open.
    fn open(&mut self) -> Result<(), String>;

    /// Applies a new configuration. May be called again after
    /// `start_rx` to retune/re-gain while streaming.
    fn configure(&mut self, config: DriverConfig) -> Result<(), String>;

    /// Starts the receive stream.
    fn start_rx(&mut self) -> Result<(), String>;

    /// Reads the next available frame, blocking only this driver's own
    /// thread, never the pipeline's other workers.
    fn read_frame(&mut self) -> Result<DriverEvent, String>;

    /// Closes the device, releasing any underlying resources.
    fn close(&mut self) -> Result<(), String>;
}
