use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::{
  geometry::{self, Geod},
  lowpass,
};

/// Performance figures for waypoint generation and target chasing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Performance {
  pub v_taxi_kts: f64,
  pub v_rotate_kts: f64,
  pub v_takeoff_kts: f64,
  pub v_climb_kts: f64,
  pub v_cruise_kts: f64,
  pub v_descent_kts: f64,
  pub v_approach_kts: f64,
  pub v_touchdown_kts: f64,
  pub accel_kts_s: f64,
  pub decel_ground_kts_s: f64,
  pub climb_fpm: f64,
  pub descent_fpm: f64,
  pub turn_rate_dps: f64,
}

impl Default for Performance {
  fn default() -> Self {
    Self::jetliner()
  }
}

impl Performance {
  pub fn jetliner() -> Self {
    Self {
      v_taxi_kts: 15.0,
      v_rotate_kts: 130.0,
      v_takeoff_kts: 150.0,
      v_climb_kts: 240.0,
      v_cruise_kts: 450.0,
      v_descent_kts: 280.0,
      v_approach_kts: 170.0,
      v_touchdown_kts: 140.0,
      accel_kts_s: 4.0,
      decel_ground_kts_s: 3.0,
      climb_fpm: 2000.0,
      descent_fpm: 1800.0,
      turn_rate_dps: 2.0,
    }
  }

  /// Distance in meters to change speed between two values at the given
  /// acceleration, all in metric units.
  pub fn accel_distance_m(v0_mps: f64, v1_mps: f64, accel_mps2: f64) -> f64 {
    ((v1_mps * v1_mps) - (v0_mps * v0_mps)).abs() / (2.0 * accel_mps2)
  }
}

/// Rudder-steered surface vehicle control state. The rudder chases a
/// deflection proportional to the heading error and the heading follows
/// the rudder, both through first-order lags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipControl {
  pub rudder_constant: f64,
  pub speed_constant: f64,
  pub hdg_gain: f64,
  pub rudder_limit_deg: f64,
  pub fixed_turn_radius_m: f64,

  pub rudder_deg: f64,
}

impl Default for ShipControl {
  fn default() -> Self {
    Self {
      rudder_constant: 0.5,
      speed_constant: 0.5,
      hdg_gain: 1.0,
      rudder_limit_deg: 30.0,
      fixed_turn_radius_m: 500.0,
      rudder_deg: 0.0,
    }
  }
}

impl ShipControl {
  /// Updates the rudder towards the deflection demanded by the heading
  /// error and returns the resulting heading rate in degrees per second.
  pub fn steer(&mut self, heading_error_deg: f64, dt: f64) -> f64 {
    let demanded = (heading_error_deg * self.hdg_gain)
      .clamp(-self.rudder_limit_deg, self.rudder_limit_deg);
    self.rudder_deg =
      lowpass(self.rudder_deg, demanded, self.rudder_constant * dt);

    // Full deflection is worth about 3°/s of turn.
    self.rudder_deg / self.rudder_limit_deg * 3.0
  }
}

/// A towed or self-propelled ground support vehicle. Elevation, pitch and
/// hitch angle each settle through their own first-order lag so the model
/// follows terrain without snapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundVehicleControl {
  pub tow_angle_gain: f64,
  pub tow_angle_limit_deg: f64,
  pub elevation_coeff: f64,
  pub pitch_coeff: f64,
  pub speed_coeff: f64,
  /// Hitch point in the parent's body frame: x forward, y right, meters.
  pub hitch_offset_m: DVec2,

  pub tow_angle_deg: f64,
  pub pitch_deg: f64,
  pub elevation_ft: f64,
}

impl Default for GroundVehicleControl {
  fn default() -> Self {
    Self {
      tow_angle_gain: 1.0,
      tow_angle_limit_deg: 45.0,
      elevation_coeff: 0.25,
      pitch_coeff: 0.5,
      speed_coeff: 0.5,
      hitch_offset_m: DVec2::new(-8.0, 0.0),
      tow_angle_deg: 0.0,
      pitch_deg: 0.0,
      elevation_ft: 0.0,
    }
  }
}

impl GroundVehicleControl {
  pub fn follow_elevation(&mut self, target_ft: f64, dt: f64) {
    self.elevation_ft =
      lowpass(self.elevation_ft, target_ft, self.elevation_coeff * dt);
  }

  pub fn follow_pitch(&mut self, target_deg: f64, dt: f64) {
    self.pitch_deg =
      lowpass(self.pitch_deg, target_deg, self.pitch_coeff * dt);
  }

  /// Chases the relative bearing to the parent, scaled and clamped to the
  /// hitch geometry.
  pub fn follow_tow_angle(&mut self, rel_bearing_deg: f64, dt: f64) {
    let target = (rel_bearing_deg * self.tow_angle_gain)
      .clamp(-self.tow_angle_limit_deg, self.tow_angle_limit_deg);
    self.tow_angle_deg =
      lowpass(self.tow_angle_deg, target, self.speed_coeff * dt);
  }

  /// World position of the parent's hitch point.
  pub fn hitch_pos(&self, parent_pos: Geod, parent_heading: f64) -> Geod {
    let body_azimuth =
      self.hitch_offset_m.y.atan2(self.hitch_offset_m.x).to_degrees();
    geometry::direct(
      parent_pos,
      geometry::normalize_periodic(
        0.0,
        360.0,
        parent_heading + body_azimuth,
      ),
      self.hitch_offset_m.length(),
    )
  }
}

/// The closed set of vehicle kinds this engine drives. Dispatch is a
/// plain match; the shared numeric helpers live as free functions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[serde(tag = "type", content = "value")]
pub enum VehicleKind {
  Aircraft(Performance),
  Ship(ShipControl),
  GroundVehicle(GroundVehicleControl),
}

impl Default for VehicleKind {
  fn default() -> Self {
    Self::Aircraft(Performance::default())
  }
}

impl VehicleKind {
  pub fn performance(&self) -> Performance {
    match self {
      Self::Aircraft(perf) => *perf,
      _ => Performance {
        v_taxi_kts: 10.0,
        turn_rate_dps: 3.0,
        ..Performance::jetliner()
      },
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn accel_distance_is_symmetric() {
    let d1 = Performance::accel_distance_m(10.0, 70.0, 2.0);
    let d2 = Performance::accel_distance_m(70.0, 10.0, 2.0);
    assert_eq!(d1, d2);
    assert!((d1 - 1200.0).abs() < 0.001);
  }

  mod ship {
    use super::*;

    #[test]
    fn rudder_is_limited() {
      let mut ship = ShipControl::default();
      for _ in 0..100 {
        ship.steer(175.0, 1.0);
      }
      assert!(ship.rudder_deg <= ship.rudder_limit_deg);
    }

    #[test]
    fn rudder_sign_follows_error() {
      let mut ship = ShipControl::default();
      let rate = ship.steer(-20.0, 1.0);
      assert!(rate < 0.0);
      assert!(ship.rudder_deg < 0.0);
    }
  }

  mod ground_vehicle {
    use super::*;

    #[test]
    fn elevation_settles_without_overshoot() {
      let mut gv = GroundVehicleControl::default();
      let mut last = gv.elevation_ft;
      for _ in 0..200 {
        gv.follow_elevation(120.0, 0.1);
        assert!(gv.elevation_ft >= last);
        assert!(gv.elevation_ft <= 120.0);
        last = gv.elevation_ft;
      }
    }

    #[test]
    fn nan_elevation_input_is_rejected() {
      let mut gv = GroundVehicleControl::default();
      gv.follow_elevation(100.0, 0.1);
      let before = gv.elevation_ft;
      gv.follow_elevation(f64::NAN, 0.1);
      assert_eq!(gv.elevation_ft, before);
    }

    #[test]
    fn tow_angle_is_clamped() {
      let mut gv = GroundVehicleControl::default();
      for _ in 0..100 {
        gv.follow_tow_angle(170.0, 1.0);
      }
      assert!(gv.tow_angle_deg <= gv.tow_angle_limit_deg + 0.001);
    }

    #[test]
    fn hitch_sits_behind_the_parent() {
      let gv = GroundVehicleControl::default();
      let parent = Geod::from_deg(51.0, 9.0);

      let hitch = gv.hitch_pos(parent, 0.0);
      // Parent faces north, hitch offset is 8m aft: the hitch is south.
      assert!(hitch.lat < parent.lat);
      assert!(
        (geometry::distance_m(parent, hitch) - 8.0).abs() < 0.01
      );
    }
  }
}
