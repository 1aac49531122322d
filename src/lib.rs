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
//! Real-time dual-channel direction-finding and spectral analysis engine.
//!
//! Two coherent receivers sample the same RF environment; this crate
//! estimates the azimuth of arrival of emitters via phase interferometry,
//! produces a rolling spectrum view, and detects signals with CFAR.
//!

#![deny(
    bad_style,
    dead_code,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    unused,
    unused_allocation,
    unused_comparisons,
    unused_parens,
    while_true,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    future_incompatible,
    nonstandard_style,
    rust_2018_idioms
)]
#![warn(clippy::all)]

pub mod buffers;
pub mod calibration;
pub mod cfar;
pub mod conditioning;
pub mod config;
pub mod df;
pub mod driver;
pub mod error;
pub mod kalman;
pub mod noise_floor;
pub mod pipeline;
pub mod queue;
pub mod sinks;
pub mod telemetry;
pub mod types;

pub use crate::error::{DoaError, DoaResult};
pub use crate::pipeline::{run_pipeline, PipelineHandles, PipelineReport};
pub use crate::types::{
    CalibrationPoint, DFResult, KalmanState, LastValidDoA, SampleFrame, SignalRegion,
    SpectrumFrame,
};
