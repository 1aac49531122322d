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
//! Shared, mutex-protected output buffers read by external consumers
//! (a visualization surface, a classifier) and written by the process
//! or analyze workers. Every buffer exposes `read`/`write` accessor
//! closures so a call site never holds a `MutexGuard` across a
//! logging or I/O call.
//!

use std::sync::Mutex;

use num_complex::Complex32;

use crate::types::DFResult;

/// Number of rows kept in the waterfall history.
pub const WATERFALL_ROWS: usize = 512;
/// Number of (I, Q) pairs per channel kept in the IQ snapshot.
pub const IQ_SNAPSHOT_LEN: usize = 256;
/// Number of entries kept in the classification ring.
pub const CLASSIFICATION_RING_LEN: usize = 50;
/// The cross-correlation snapshot refreshes at most once per this many
/// DF frames.
pub const XCORR_UPDATE_PERIOD_FRAMES: u64 = 5;

/// A circular buffer of magnitude rows, one per conditioning output.
pub struct WaterfallHistory {
    inner: Mutex<WaterfallInner>,
}

struct WaterfallInner {
    rows: Vec<Vec<u8>>,
    write_index: usize,
    row_len: usize,
}

impl WaterfallHistory {
    /// Creates a history of `WATERFALL_ROWS` rows, each of `row_len`
    /// magnitude bins, all initially zero.
    pub fn new(row_len: usize) -> Self {
        WaterfallHistory {
            inner: Mutex::new(WaterfallInner {
                rows: vec![vec![0u8; row_len]; WATERFALL_ROWS],
                write_index: 0,
                row_len,
            }),
        }
    }

    /// Writes one row, overwriting the oldest entry and advancing the
    /// write index modulo `WATERFALL_ROWS`.
    pub fn push_row(&self, row: &[u8]) {
        let mut inner = self.inner.lock().unwrap();
        let idx = inner.write_index;
        debug_assert_eq!(row.len(), inner.row_len);
        inner.rows[idx].copy_from_slice(row);
        inner.write_index = (idx + 1) % WATERFALL_ROWS;
    }

    /// Runs `f` with a read-only view of all rows in write order
    /// (oldest first), without exposing the lock guard to the caller.
    pub fn read<R>(&self, f: impl FnOnce(&[Vec<u8>], usize) -> R) -> R {
        let inner = self.inner.lock().unwrap();
        f(&inner.rows, inner.write_index)
    }
}

/// A snapshot of recent IQ samples for visualization, plus an optional
/// full-length complex FFT snapshot.
pub struct IqSnapshot {
    inner: Mutex<IqSnapshotInner>,
}

#[derive(Default)]
struct IqSnapshotInner {
    ch1: Vec<Complex32>,
    ch2: Vec<Complex32>,
    fft_ch1: Option<Vec<Complex32>>,
    fft_ch2: Option<Vec<Complex32>>,
}

impl IqSnapshot {
    pub fn new() -> Self {
        IqSnapshot {
            inner: Mutex::new(IqSnapshotInner::default()),
        }
    }

    /// Writes a new snapshot. `ch1`/`ch2` are truncated to
    /// `IQ_SNAPSHOT_LEN` samples; `fft` is stored verbatim when given.
    pub fn write(&self, ch1: &[Complex32], ch2: &[Complex32], fft: Option<(&[Complex32], &[Complex32])>) {
        let mut inner = self.inner.lock().unwrap();
        inner.ch1 = ch1.iter().take(IQ_SNAPSHOT_LEN).copied().collect();
        inner.ch2 = ch2.iter().take(IQ_SNAPSHOT_LEN).copied().collect();
        if let Some((f1, f2)) = fft {
            inner.fft_ch1 = Some(f1.to_vec());
            inner.fft_ch2 = Some(f2.to_vec());
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&[Complex32], &[Complex32]) -> R) -> R {
        let inner = self.inner.lock().unwrap();
        f(&inner.ch1, &inner.ch2)
    }

    /// Runs `f` with the optional full-length FFT snapshot, if one has
    /// been written.
    pub fn read_fft<R>(&self, f: impl FnOnce(Option<(&[Complex32], &[Complex32])>) -> R) -> R {
        let inner = self.inner.lock().unwrap();
        let fft = match (&inner.fft_ch1, &inner.fft_ch2) {
            (Some(a), Some(b)) => Some((a.as_slice(), b.as_slice())),
            _ => None,
        };
        f(fft)
    }
}

impl Default for IqSnapshot {
    fn default() -> Self {
        IqSnapshot::new()
    }
}

/// Magnitude and phase arrays describing cross-correlation between
/// the two channels, refreshed at most once per
/// `XCORR_UPDATE_PERIOD_FRAMES` DF frames.
pub struct XcorrSnapshot {
    inner: Mutex<XcorrInner>,
}

struct XcorrInner {
    magnitude: Vec<f64>,
    phase: Vec<f64>,
    frames_since_update: u64,
}

impl XcorrSnapshot {
    pub fn new(len: usize) -> Self {
        XcorrSnapshot {
            inner: Mutex::new(XcorrInner {
                magnitude: vec![0.0; len],
                phase: vec![0.0; len],
                frames_since_update: XCORR_UPDATE_PERIOD_FRAMES,
            }),
        }
    }

    /// Called once per DF frame; only actually recomputes and stores
    /// when the update period has elapsed, via `compute`.
    pub fn maybe_update(&self, compute: impl FnOnce() -> (Vec<f64>, Vec<f64>)) {
        let mut inner = self.inner.lock().unwrap();
        inner.frames_since_update += 1;
        if inner.frames_since_update < XCORR_UPDATE_PERIOD_FRAMES {
            return;
        }
        let (magnitude, phase) = compute();
        inner.magnitude = magnitude;
        inner.phase = phase;
        inner.frames_since_update = 0;
    }

    pub fn read<R>(&self, f: impl FnOnce(&[f64], &[f64]) -> R) -> R {
        let inner = self.inner.lock().unwrap();
        f(&inner.magnitude, &inner.phase)
    }
}

/// The last reported DF result, mutex-protected.
pub struct LastDoaBuffer {
    inner: Mutex<DFResult>,
}

impl LastDoaBuffer {
    pub fn new() -> Self {
        LastDoaBuffer {
            inner: Mutex::new(DFResult::default_low_confidence()),
        }
    }

    pub fn write(&self, result: DFResult) {
        *self.inner.lock().unwrap() = result;
    }

    pub fn read(&self) -> DFResult {
        *self.inner.lock().unwrap()
    }
}

impl Default for LastDoaBuffer {
    fn default() -> Self {
        LastDoaBuffer::new()
    }
}

/// One tagged classification record. The classifier itself is an
/// external collaborator; this ring buffer is a passive sink it would
/// populate.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationRecord {
    /// Center frequency the classification applies to, Hz.
    pub frequency_hz: f64,
    /// Free-form modulation/class label.
    pub label: String,
    /// Classifier confidence, 0..100.
    pub confidence: f64,
    /// Timestamp the classification was produced, microseconds.
    pub timestamp_us: u64,
}

/// A 50-entry circular buffer of classification records.
pub struct ClassificationRing {
    inner: Mutex<ClassificationRingInner>,
}

struct ClassificationRingInner {
    records: Vec<ClassificationRecord>,
    write_index: usize,
    len: usize,
}

impl ClassificationRing {
    pub fn new() -> Self {
        ClassificationRing {
            inner: Mutex::new(ClassificationRingInner {
                records: Vec::with_capacity(CLASSIFICATION_RING_LEN),
                write_index: 0,
                len: 0,
            }),
        }
    }

    /// Pushes a record, overwriting the oldest entry once the ring is
    /// full.
    pub fn push(&self, record: ClassificationRecord) {
        let mut inner = self.inner.lock().unwrap();
        if inner.records.len() < CLASSIFICATION_RING_LEN {
            inner.records.push(record);
        } else {
            inner.records[inner.write_index] = record;
        }
        inner.write_index = (inner.write_index + 1) % CLASSIFICATION_RING_LEN;
        inner.len = inner.records.len();
    }

    /// Returns all currently stored records, oldest first.
    pub fn snapshot(&self) -> Vec<ClassificationRecord> {
        let inner = self.inner.lock().unwrap();
        if inner.len < CLASSIFICATION_RING_LEN {
            inner.records.clone()
        } else {
            let mut ordered = Vec::with_capacity(CLASSIFICATION_RING_LEN);
            ordered.extend_from_slice(&inner.records[inner.write_index..]);
            ordered.extend_from_slice(&inner.records[..inner.write_index]);
            ordered
        }
    }
}

impl Default for ClassificationRing {
    fn default() -> Self {
        ClassificationRing::new()
    }
}
