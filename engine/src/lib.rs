pub mod atc;
pub mod entities;
pub mod geometry;
pub mod route;
pub mod synth;

pub const DEFAULT_TICK_RATE_TPS: usize = 15;

pub const NAUTICALMILES_TO_METERS: f64 = 1852.0;
pub const KNOT_TO_MPS: f64 = 0.514444;
pub const FEET_TO_METERS: f64 = 0.3048;
pub const METERS_TO_FEET: f64 = 3.28084;

/// Speeds below this magnitude are treated as stationary by the
/// lead-distance policy.
pub const STATIONARY_SPEED_KTS: f64 = 0.5;

pub const TAXI_SPEED_KTS: f64 = 15.0;
pub const PUSHBACK_SPEED_KTS: f64 = -5.0;

pub const TRANSITION_ALTITUDE_FT: f64 = 18000.0;
pub const APPROACH_ALTITUDE_FT: f64 = 3000.0;

pub fn sign(x: f64) -> f64 {
  if x > 0.0 {
    1.0
  } else if x < 0.0 {
    -1.0
  } else {
    0.0
  }
}

/// First-order low-pass step: moves `old` towards `target` by
/// `coeff * dt` of the remaining gap, clamped to never overshoot.
///
/// A non-finite `target` is rejected and `old` is returned unchanged, so
/// upstream NaNs can never take up residence in persistent state.
pub fn lowpass(old: f64, target: f64, factor: f64) -> f64 {
  if !target.is_finite() {
    tracing::warn!("non-finite filter target, holding {old}");
    return old;
  }

  let factor = factor.clamp(0.0, 1.0);
  old + (target - old) * factor
}

#[cfg(test)]
mod tests {
  use super::*;

  mod lowpass {
    use super::*;

    #[test]
    fn converges_towards_target() {
      let mut value = 0.0;
      for _ in 0..100 {
        let next = lowpass(value, 10.0, 0.25);
        assert!(next > value);
        assert!(next <= 10.0);
        value = next;
      }
      assert!((value - 10.0).abs() < 0.01);
    }

    #[test]
    fn nan_target_holds_old_value() {
      assert_eq!(lowpass(4.0, f64::NAN, 0.5), 4.0);
      assert_eq!(lowpass(4.0, f64::INFINITY, 0.5), 4.0);
    }

    #[test]
    fn factor_above_one_is_clamped() {
      assert_eq!(lowpass(0.0, 8.0, 5.0), 8.0);
    }
  }

  #[test]
  fn test_sign() {
    assert_eq!(sign(-3.2), -1.0);
    assert_eq!(sign(0.0), 0.0);
    assert_eq!(sign(17.0), 1.0);
  }
}
