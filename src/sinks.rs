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
//! Output boundaries. No concrete HTTP/recording/GPS/classification
//! sink ships here; callers supply boxed trait objects.
//!

use crate::types::{DFResult, SignalRegion, SpectrumFrame};

/// Consumes spectrum output (both channels, magnitude and complex FFT)
/// as it is produced by the analysis worker.
pub trait SpectrumSink {
    /// Called once per analyzed frame with the frame and the CFAR
    /// regions detected within it.
    fn on_spectrum(&mut self, frame: &SpectrumFrame, regions: &[SignalRegion]);
}

/// Consumes direction-finding results as they are produced.
pub trait DoaSink {
    /// Called once per DF estimate.
    fn on_doa(&mut self, result: &DFResult);
}
