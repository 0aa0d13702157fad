use std::{fs, io, path::Path};

use serde::Deserialize;
use thiserror::Error;

use crate::{
  entities::{
    flightplan::FlightPlan,
    waypoint::{CROSSAT_UNSET_FT, END_WAYPOINT, Waypoint},
  },
  geometry::Geod,
};

#[derive(Debug, Error)]
pub enum RouteError {
  #[error("failed to read route file: {0}")]
  Read(#[from] io::Error),
  #[error("malformed route file: {0}")]
  Parse(#[from] serde_json::Error),
  #[error("route file contains no waypoints")]
  Empty,
  #[error("route file does not terminate in an END waypoint")]
  MissingEnd,
}

#[derive(Debug, Deserialize)]
struct RouteFile {
  flightplan: Vec<RouteEntry>,
}

/// One stored waypoint entry. Any field may be absent; absent state flags
/// are derived from the flight phase, see [`derive_defaults`].
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct RouteEntry {
  name: Option<String>,
  lat: f64,
  lon: f64,
  alt: f64,
  ktas: f64,
  crossat: Option<f64>,
  gear_down: Option<bool>,
  flaps_down: Option<bool>,
  spoilers: Option<bool>,
  speedbrakes: Option<bool>,
  on_ground: bool,
  time_sec: f64,
  time: String,
}

/// Fills in the lighting preset and the default gear/flap state for an
/// entry that doesn't carry them explicitly. Precedence: not moving ⇒
/// shut down; above 10000 ft ⇒ cruise; on the ground ⇒ taxiing; below
/// 3000 ft ⇒ final approach; otherwise climbing or descending clean.
fn derive_defaults(entry: &RouteEntry, wpt: &mut Waypoint) -> (bool, bool) {
  if entry.ktas < 1.0 {
    wpt.set_power_down_lights();
    (false, true)
  } else if entry.alt > 10000.0 {
    wpt.set_cruise_lights();
    (false, false)
  } else if entry.on_ground {
    wpt.set_ground_lights();
    (true, true)
  } else if entry.alt < 3000.0 {
    wpt.set_approach_lights();
    (true, true)
  } else {
    // In the air between 3000 and 10000 ft: lit up for the terminal
    // area, but still clean.
    wpt.set_approach_lights();
    (false, false)
  }
}

fn waypoint_from_entry(entry: RouteEntry) -> Waypoint {
  let mut wpt = Waypoint::default();
  let (flaps, gear) = derive_defaults(&entry, &mut wpt);

  wpt.name = entry.name.unwrap_or_else(|| END_WAYPOINT.to_owned());
  wpt.pos = Geod::from_deg_ft(entry.lat, entry.lon, entry.alt);
  wpt.speed_kts = entry.ktas;
  wpt.crossat_ft = entry.crossat.unwrap_or(CROSSAT_UNSET_FT);
  wpt.gear_down = entry.gear_down.unwrap_or(gear);
  wpt.flaps = if entry.flaps_down.unwrap_or(flaps) {
    1.0
  } else {
    0.0
  };
  wpt.spoilers = if entry.spoilers.unwrap_or(false) { 1.0 } else { 0.0 };
  wpt.speedbrakes = if entry.speedbrakes.unwrap_or(false) {
    1.0
  } else {
    0.0
  };
  wpt.on_ground = entry.on_ground;
  wpt.time_sec = entry.time_sec;
  wpt.time = entry.time;
  wpt.finished = wpt.is_end();
  wpt
}

/// Parses a stored route into a flight plan. The plan must contain at
/// least one waypoint and terminate in one named `END`.
pub fn read_flightplan(json: &str) -> Result<FlightPlan, RouteError> {
  let file: RouteFile = serde_json::from_str(json)?;
  if file.flightplan.is_empty() {
    return Err(RouteError::Empty);
  }

  let mut plan = FlightPlan::new();
  for entry in file.flightplan {
    plan.push_back_waypoint(waypoint_from_entry(entry));
  }

  match plan.last_waypoint() {
    Some(last) if last.name == END_WAYPOINT => {}
    _ => return Err(RouteError::MissingEnd),
  }

  plan.restart();
  Ok(plan)
}

impl FlightPlan {
  /// Loads a plan from a route file. A plan that fails to load is marked
  /// invalid and logged, never an error the caller has to unwind; flying
  /// an invalid plan is the caller's bug.
  pub fn from_file(path: impl AsRef<Path>) -> Self {
    let path = path.as_ref();
    let result = fs::read_to_string(path)
      .map_err(RouteError::from)
      .and_then(|json| read_flightplan(&json));

    match result {
      Ok(plan) => plan,
      Err(err) => {
        tracing::warn!("invalid flight plan {}: {err}", path.display());
        Self::dummy()
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn route(entries: &str) -> String {
    format!("{{\"flightplan\": [{entries}]}}")
  }

  #[test]
  fn minimal_route_parses() {
    let json = route(
      r#"{"name": "A", "lat": 51.0, "lon": 9.0, "alt": 0.0, "ktas": 15.0,
          "on-ground": true},
         {"name": "B", "lat": 51.01, "lon": 9.0, "alt": 0.0, "ktas": 15.0,
          "on-ground": true},
         {"name": "END", "lat": 51.02, "lon": 9.0, "alt": 0.0, "ktas": 0.0,
          "on-ground": true}"#,
    );

    let plan = read_flightplan(&json).unwrap();
    assert_eq!(plan.len(), 3);
    assert_eq!(plan.last_waypoint().unwrap().name, "END");
    assert!(plan.last_waypoint().unwrap().finished);
  }

  #[test]
  fn missing_end_is_rejected() {
    let json = route(
      r#"{"name": "A", "lat": 51.0, "lon": 9.0, "alt": 0.0, "ktas": 15.0},
         {"name": "B", "lat": 51.01, "lon": 9.0, "alt": 0.0, "ktas": 15.0}"#,
    );

    assert!(matches!(
      read_flightplan(&json),
      Err(RouteError::MissingEnd)
    ));
  }

  #[test]
  fn empty_route_is_rejected() {
    assert!(matches!(read_flightplan(&route("")), Err(RouteError::Empty)));
  }

  #[test]
  fn garbage_is_a_parse_error() {
    assert!(matches!(
      read_flightplan("not json"),
      Err(RouteError::Parse(_))
    ));
  }

  #[test]
  fn from_file_marks_unreadable_plan_invalid() {
    let plan = FlightPlan::from_file("/nonexistent/route.json");
    assert!(!plan.valid);
  }

  mod derived_defaults {
    use super::*;

    fn three_point_route(middle: &str) -> FlightPlan {
      let json = route(&format!(
        r#"{{"name": "A", "lat": 51.0, "lon": 9.0, "alt": 12000.0,
            "ktas": 300.0}},
           {middle},
           {{"name": "END", "lat": 51.2, "lon": 9.0, "alt": 0.0,
            "ktas": 0.0, "on-ground": true}}"#
      ));
      read_flightplan(&json).unwrap()
    }

    #[test]
    fn stationary_waypoint_is_shut_down() {
      let plan = three_point_route(
        r#"{"name": "B", "lat": 51.1, "lon": 9.0, "alt": 0.0, "ktas": 0.0}"#,
      );
      let b = &plan.waypoints()[1];

      assert!(!b.beacon_light && !b.nav_lights && !b.taxi_lights);
      assert!(b.gear_down);
      assert_eq!(b.flaps, 0.0);
    }

    #[test]
    fn cruise_above_10000() {
      let plan = three_point_route(
        r#"{"name": "B", "lat": 51.1, "lon": 9.0, "alt": 24000.0,
            "ktas": 380.0}"#,
      );
      let b = &plan.waypoints()[1];

      assert!(b.strobe_light && b.nav_lights && !b.landing_light);
      assert!(!b.gear_down);
      assert_eq!(b.flaps, 0.0);
    }

    #[test]
    fn on_ground_taxies() {
      let plan = three_point_route(
        r#"{"name": "B", "lat": 51.1, "lon": 9.0, "alt": 0.0,
            "ktas": 12.0, "on-ground": true}"#,
      );
      let b = &plan.waypoints()[1];

      assert!(b.taxi_lights && !b.strobe_light);
      assert!(b.gear_down);
      assert_eq!(b.flaps, 1.0);
    }

    #[test]
    fn low_approach_is_dirty() {
      let plan = three_point_route(
        r#"{"name": "B", "lat": 51.1, "lon": 9.0, "alt": 1800.0,
            "ktas": 140.0}"#,
      );
      let b = &plan.waypoints()[1];

      assert!(b.landing_light);
      assert!(b.gear_down);
      assert_eq!(b.flaps, 1.0);
    }

    #[test]
    fn mid_band_is_lit_but_clean() {
      let plan = three_point_route(
        r#"{"name": "B", "lat": 51.1, "lon": 9.0, "alt": 6000.0,
            "ktas": 250.0}"#,
      );
      let b = &plan.waypoints()[1];

      assert!(b.landing_light);
      assert!(!b.gear_down);
      assert_eq!(b.flaps, 0.0);
    }

    #[test]
    fn explicit_flags_beat_derived_ones() {
      let plan = three_point_route(
        r#"{"name": "B", "lat": 51.1, "lon": 9.0, "alt": 24000.0,
            "ktas": 380.0, "gear-down": true, "flaps-down": true}"#,
      );
      let b = &plan.waypoints()[1];

      assert!(b.gear_down);
      assert_eq!(b.flaps, 1.0);
    }
  }
}
