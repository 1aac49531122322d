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
//! 2-state (azimuth, angular rate) Kalman filter for smoothing bearing
//! estimates, with azimuth-wraparound handling.
//!

use crate::types::KalmanState;

/// Process noise variance for the azimuth state, deg^2.
const PROCESS_NOISE_AZIMUTH: f64 = 0.5;
/// Process noise variance for the rate state, (deg/s)^2.
const PROCESS_NOISE_RATE: f64 = 0.1;
/// Lower clamp for `dt` between updates, seconds.
const DT_MIN_S: f64 = 0.001;
/// Upper clamp for `dt` between updates, seconds.
const DT_MAX_S: f64 = 1.0;

/// Wraps a difference of angles (in degrees) to the shortest signed
/// distance in `[-180, 180]`.
fn wrap_deg_diff(delta: f64) -> f64 {
    let mut d = delta % 360.0;
    if d > 180.0 {
        d -= 360.0;
    } else if d < -180.0 {
        d += 360.0;
    }
    d
}

/// Normalizes an azimuth to `[0, 360)`.
fn normalize_azimuth(az: f64) -> f64 {
    let mut a = az % 360.0;
    if a < 0.0 {
        a += 360.0;
    }
    a
}

/// Predicts the filter state forward by `dt_ms` milliseconds. `dt` is
/// clamped to `[1 ms, 1 s]` before use.
pub fn predict(state: &mut KalmanState, dt_ms: u64) {
    let dt_s = (dt_ms as f64 / 1000.0).clamp(DT_MIN_S, DT_MAX_S);

    let new_azimuth = normalize_azimuth(state.azimuth + state.angular_velocity * dt_s);
    state.azimuth = new_azimuth;
    // angular_velocity unchanged by F = [[1, dt], [0, 1]]

    // P <- F P F^T + Q, with F = [[1, dt], [0, 1]].
    let p00 = state.p00 + 2.0 * dt_s * state.p01 + dt_s * dt_s * state.p11;
    let p01 = state.p01 + dt_s * state.p11;
    let p11 = state.p11;

    state.p00 = p00 + PROCESS_NOISE_AZIMUTH;
    state.p01 = p01;
    state.p11 = p11 + PROCESS_NOISE_RATE;
}

/// Updates the filter with a fresh azimuth measurement (degrees) and
/// its measurement variance (deg^2).
pub fn update(state: &mut KalmanState, measured_azimuth_deg: f64, measurement_variance: f64) {
    if !state.initialized {
        state.azimuth = normalize_azimuth(measured_azimuth_deg);
        state.angular_velocity = 0.0;
        state.p00 = measurement_variance.max(1.0);
        state.p01 = 0.0;
        state.p11 = 10.0;
        state.initialized = true;
        return;
    }

    let innovation = wrap_deg_diff(measured_azimuth_deg - state.azimuth);
    let s = state.p00 + measurement_variance;
    let k0 = state.p00 / s;
    let k1 = state.p01 / s;

    state.azimuth = normalize_azimuth(state.azimuth + k0 * innovation);
    state.angular_velocity += k1 * innovation;

    // P <- (I - K H) P, H = [1, 0].
    let p00 = (1.0 - k0) * state.p00;
    let p01 = (1.0 - k0) * state.p01;
    let p11 = state.p11 - k1 * state.p01;

    state.p00 = p00;
    state.p01 = p01;
    state.p11 = p11;
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn update_initializes_on_first_measurement() {
        let mut state = KalmanState::new();
        update(&mut state, 90.0, 4.0);
        assert!(state.initialized);
        assert_relative_eq!(state.azimuth, 90.0);
    }

    #[test]
    fn predict_advances_azimuth_by_rate_times_dt() {
        let mut state = KalmanState::new();
        update(&mut state, 10.0, 1.0);
        state.angular_velocity = 5.0; // deg/s
        predict(&mut state, 1000);
        assert_relative_eq!(state.azimuth, 15.0, epsilon = 1e-9);
    }

    #[test]
    fn predict_wraps_azimuth_across_360() {
        let mut state = KalmanState::new();
        update(&mut state, 355.0, 1.0);
        state.angular_velocity = 20.0;
        predict(&mut state, 1000);
        assert_relative_eq!(state.azimuth, 15.0, epsilon = 1e-9);
    }

    #[test]
    fn update_uses_shortest_angular_distance_across_wrap() {
        let mut state = KalmanState::new();
        update(&mut state, 359.0, 1.0);
        // A measurement of 1.0 is only 2 degrees away going "up" through 0,
        // not 358 degrees away the naive way.
        update(&mut state, 1.0, 1.0);
        assert!(state.azimuth < 5.0 || state.azimuth > 355.0);
    }

    #[test]
    fn covariance_stays_symmetric_positive_semidefinite() {
        let mut state = KalmanState::new();
        update(&mut state, 45.0, 4.0);
        for i in 0..20 {
            predict(&mut state, 100);
            if i % 3 == 0 {
                update(&mut state, 46.0, 4.0);
            }
            assert!(state.p00 >= 0.0);
            assert!(state.p11 >= 0.0);
            // determinant >= 0 for PSD 2x2 symmetric matrix
            assert!(state.p00 * state.p11 - state.p01 * state.p01 >= -1e-9);
        }
    }

    #[test]
    fn dt_is_clamped_to_valid_range() {
        let mut a = KalmanState::new();
        update(&mut a, 0.0, 1.0);
        a.angular_velocity = 10.0;
        let mut b = a;
        predict(&mut a, 0); // clamps up to 1 ms
        predict(&mut b, 50);
        assert_relative_eq!(a.azimuth, 0.01, epsilon = 1e-6);
        assert_relative_eq!(b.azimuth, 0.5, epsilon = 1e-6);

        let mut huge = a;
        huge.azimuth = 0.0;
        huge.angular_velocity = 10.0;
        predict(&mut huge, 10_000_000); // clamps down to 1 s
        assert_relative_eq!(huge.azimuth, 10.0, epsilon = 1e-6);
    }
}
