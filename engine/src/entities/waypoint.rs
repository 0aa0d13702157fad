use serde::{Deserialize, Serialize};

use crate::geometry::Geod;

/// The name that terminates a flight plan.
pub const END_WAYPOINT: &str = "END";

/// Crossing-altitude sentinel for "unconstrained".
pub const CROSSAT_UNSET_FT: f64 = -10000.0;

/// One targeted point of a route: position, target speed, crossing
/// restriction and the discrete aircraft state (gear, flaps, lights) the
/// vehicle should be in when it flies or taxis the segment leading here.
///
/// Speeds are signed; a negative speed means the vehicle moves in reverse
/// (pushback).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
  pub name: String,
  pub pos: Geod,
  pub speed_kts: f64,
  pub crossat_ft: f64,
  pub gear_down: bool,
  pub flaps: f64,
  pub spoilers: f64,
  pub speedbrakes: f64,
  pub on_ground: bool,
  pub finished: bool,

  pub beacon_light: bool,
  pub cabin_lights: bool,
  pub landing_light: bool,
  pub nav_lights: bool,
  pub strobe_light: bool,
  pub taxi_lights: bool,

  pub time: String,
  pub time_sec: f64,
  pub route_index: usize,

  /// Cached great-circle length of the segment from the previous waypoint
  /// to this one, in meters.
  pub track_length_m: f64,
}

impl Default for Waypoint {
  fn default() -> Self {
    Self {
      name: String::new(),
      pos: Geod::default(),
      speed_kts: 0.0,
      crossat_ft: CROSSAT_UNSET_FT,
      gear_down: false,
      flaps: 0.0,
      spoilers: 0.0,
      speedbrakes: 0.0,
      on_ground: false,
      finished: false,

      beacon_light: false,
      cabin_lights: false,
      landing_light: false,
      nav_lights: false,
      strobe_light: false,
      taxi_lights: false,

      time: String::new(),
      time_sec: 0.0,
      route_index: 0,
      track_length_m: 0.0,
    }
  }
}

impl Waypoint {
  pub fn new(
    name: impl Into<String>,
    pos: Geod,
    speed_kts: f64,
  ) -> Self {
    Self {
      name: name.into(),
      pos,
      speed_kts,
      ..Self::default()
    }
  }

  /// Case-sensitive substring test on the waypoint name. Used to find
  /// named landmarks among runs of generated waypoints.
  pub fn contains(&self, target: &str) -> bool {
    self.name.contains(target)
  }

  pub fn is_end(&self) -> bool {
    self.name == END_WAYPOINT
  }

  pub fn in_air(&self) -> bool {
    !self.on_ground
  }

  pub fn has_crossat(&self) -> bool {
    self.crossat_ft > CROSSAT_UNSET_FT + 1.0
  }

  /// Everything dark: parked at the gate with engines shut down.
  pub fn set_power_down_lights(&mut self) {
    self.beacon_light = false;
    self.cabin_lights = false;
    self.landing_light = false;
    self.nav_lights = false;
    self.strobe_light = false;
    self.taxi_lights = false;
  }

  /// Moving on the ground: taxi light on, no strobes or landing lights.
  pub fn set_ground_lights(&mut self) {
    self.beacon_light = true;
    self.cabin_lights = false;
    self.landing_light = false;
    self.nav_lights = true;
    self.strobe_light = false;
    self.taxi_lights = true;
  }

  /// Lined up or rolling: everything on.
  pub fn set_takeoff_lights(&mut self) {
    self.beacon_light = true;
    self.cabin_lights = true;
    self.landing_light = true;
    self.nav_lights = true;
    self.strobe_light = true;
    self.taxi_lights = true;
  }

  pub fn set_cruise_lights(&mut self) {
    self.beacon_light = true;
    self.cabin_lights = true;
    self.landing_light = false;
    self.nav_lights = true;
    self.strobe_light = true;
    self.taxi_lights = false;
  }

  pub fn set_approach_lights(&mut self) {
    self.beacon_light = true;
    self.cabin_lights = true;
    self.landing_light = true;
    self.nav_lights = true;
    self.strobe_light = true;
    self.taxi_lights = false;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn contains_is_case_sensitive() {
    let wpt = Waypoint::new("A3_DepartureHold", Geod::default(), 15.0);

    assert!(wpt.contains("DepartureHold"));
    assert!(wpt.contains("A3"));
    assert!(!wpt.contains("departurehold"));
  }

  #[test]
  fn end_sentinel() {
    let wpt = Waypoint::new(END_WAYPOINT, Geod::default(), 0.0);
    assert!(wpt.is_end());
    assert!(!Waypoint::new("ENDless", Geod::default(), 0.0).is_end());
  }

  #[test]
  fn crossat_defaults_to_unconstrained() {
    let wpt = Waypoint::new("A", Geod::default(), 100.0);
    assert!(!wpt.has_crossat());
  }

  mod lighting {
    use super::*;

    #[test]
    fn presets_are_mutually_distinct() {
      let mut power_down = Waypoint::default();
      let mut ground = Waypoint::default();
      let mut cruise = Waypoint::default();
      let mut approach = Waypoint::default();

      power_down.set_power_down_lights();
      ground.set_ground_lights();
      cruise.set_cruise_lights();
      approach.set_approach_lights();

      assert!(!power_down.beacon_light && !power_down.taxi_lights);
      assert!(ground.taxi_lights && !ground.strobe_light);
      assert!(cruise.strobe_light && !cruise.taxi_lights);
      assert!(approach.landing_light && !approach.taxi_lights);
    }
  }
}
