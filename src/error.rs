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
//! The error surface of this crate. Only the radio driver, control,
//! and persistence boundaries return `Result`; the hot path (queues,
//! conditioning, CFAR, DF estimation) always returns a plain value,
//! degrading gracefully instead of failing.
//!

use thiserror::Error;

/// Errors that can cross the driver, control, or persistence boundary.
#[derive(Debug, Error)]
pub enum DoaError {
    /// The radio driver reported a failure.
    #[error("radio driver error: {0}")]
    Driver(String),

    /// A control-surface setter received a value outside its valid range.
    #[error("invalid value for {field}: {value}")]
    Validation {
        /// Name of the rejected field.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// Calibration file load or save failed at the filesystem level.
    #[error("calibration persistence error: {0}")]
    Persistence(#[from] std::io::Error),

    /// A calibration file contained no parseable data lines.
    #[error("no valid calibration records found ({lines} lines read)")]
    Malformed {
        /// Number of lines read before giving up.
        lines: usize,
    },
}

/// Result alias for the driver, control, and persistence surfaces.
pub type DoaResult<T> = Result<T, DoaError>;
