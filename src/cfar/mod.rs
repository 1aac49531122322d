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
//! Constant False-Alarm Rate (CFAR) detectors: cell-averaging and
//! order-statistic variants, sharing a DC-guard exclusion zone and
//! contiguous-region grouping.
//!

pub mod ca;
pub mod os;

use crate::types::SignalRegion;

/// Which CFAR variant to run, carrying its own parameter (`k`, the
/// order-statistic percentile) where relevant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CfarMode {
    /// Cell-averaging CFAR.
    Ca,
    /// Order-statistic CFAR: single k-th statistic over combined
    /// training cells.
    Os { k: f64 },
    /// Greatest-of CFAR: k-th statistic per side, then the maximum.
    Go { k: f64 },
    /// Smallest-of CFAR: k-th statistic per side, then the minimum.
    So { k: f64 },
}

/// Tunable parameters shared by all CFAR variants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CfarParams {
    /// Number of training cells on each side of the cell under test.
    pub training_cells: usize,
    /// Number of guard cells separating training cells from the cell
    /// under test.
    pub guard_cells: usize,
    /// Threshold offset applied to the noise estimate, dB.
    pub threshold_db: f64,
    /// Minimum contiguous marked bins to keep a region.
    pub min_signal_bins: usize,
    /// Half-width of the DC-guard exclusion zone around the center bin.
    pub dc_margin: usize,
}

impl Default for CfarParams {
    fn default() -> Self {
        CfarParams {
            training_cells: 32,
            guard_cells: 8,
            threshold_db: 3.0,
            min_signal_bins: 5,
            dc_margin: 10,
        }
    }
}

impl CfarParams {
    /// The default order-statistic preset (k = 0.75), used for
    /// `CfarMode::Os`/`Go`/`So` unless the caller overrides `k`.
    pub const DEFAULT_OS_K: f64 = 0.75;
    /// The aggressive order-statistic preset (k = 0.90).
    pub const AGGRESSIVE_OS_K: f64 = 0.90;
}

/// Converts an 8-bit magnitude to an approximate dB value using the
/// same linear mapping conditioning uses in reverse
/// (`db = mag * 120 / 255 - 100`).
pub(crate) fn mag_to_db(mag: f64) -> f64 {
    mag * 120.0 / 255.0 - 100.0
}

/// Converts a dB value back to the 0..255 magnitude scale, clamped.
pub(crate) fn db_to_mag(db: f64) -> f64 {
    ((db + 100.0) * 255.0 / 120.0).clamp(0.0, 255.0)
}

/// Given a boolean "is this bin marked" predicate over `[start, end)`,
/// groups contiguous marked runs into `SignalRegion`s and discards runs
/// shorter than `min_signal_bins`.
pub(crate) fn group_regions(
    magnitude: &[u8],
    start: usize,
    end: usize,
    marked: &[bool],
    min_signal_bins: usize,
) -> Vec<SignalRegion> {
    let mut regions = Vec::new();
    let mut run_start: Option<usize> = None;

    for (offset, &is_marked) in marked.iter().enumerate() {
        let bin = start + offset;
        if is_marked {
            if run_start.is_none() {
                run_start = Some(bin);
            }
        } else if let Some(rs) = run_start.take() {
            push_region_if_long_enough(&mut regions, magnitude, rs, bin, min_signal_bins);
        }
    }
    if let Some(rs) = run_start {
        push_region_if_long_enough(&mut regions, magnitude, rs, end, min_signal_bins);
    }
    regions
}

fn push_region_if_long_enough(
    regions: &mut Vec<SignalRegion>,
    magnitude: &[u8],
    start_bin: usize,
    end_bin: usize,
    min_signal_bins: usize,
) {
    if end_bin <= start_bin || end_bin - start_bin < min_signal_bins {
        return;
    }
    let slice = &magnitude[start_bin..end_bin];
    let (peak_offset, &peak_value) = slice
        .iter()
        .enumerate()
        .max_by_key(|(_, &v)| v)
        .expect("non-empty region");
    let mean_magnitude = slice.iter().map(|&v| v as f64).sum::<f64>() / slice.len() as f64;
    regions.push(SignalRegion {
        start_bin,
        end_bin,
        peak_bin: start_bin + peak_offset,
        peak_magnitude: peak_value,
        mean_magnitude,
        snr_db: 0.0,
    });
}

/// True if `bin` falls inside the DC-guard exclusion zone around
/// `center`.
pub(crate) fn in_dc_guard(bin: usize, center: usize, margin: usize) -> bool {
    let distance = if bin >= center { bin - center } else { center - bin };
    distance <= margin
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn group_regions_merges_contiguous_runs() {
        let magnitude = vec![10, 10, 200, 200, 200, 10, 10, 10];
        let marked = vec![false, false, true, true, true, false, false, false];
        let regions = group_regions(&magnitude, 0, 8, &marked, 3);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].start_bin, 2);
        assert_eq!(regions[0].end_bin, 5);
        assert_eq!(regions[0].peak_bin, 2);
    }

    #[test]
    fn group_regions_discards_short_runs() {
        let magnitude = vec![10, 200, 10, 10, 10, 10];
        let marked = vec![false, true, false, false, false, false];
        let regions = group_regions(&magnitude, 0, 6, &marked, 3);
        assert!(regions.is_empty());
    }

    #[test]
    fn dc_guard_excludes_symmetric_band() {
        assert!(in_dc_guard(100, 100, 10));
        assert!(in_dc_guard(95, 100, 10));
        assert!(in_dc_guard(110, 100, 10));
        assert!(!in_dc_guard(111, 100, 10));
    }
}
