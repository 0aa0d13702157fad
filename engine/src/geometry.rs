use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Mean Earth radius. The scales involved here (taxiways, terminal
/// airspace) make the spherical model indistinguishable from a geodesic
/// one.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A geodetic position: latitude/longitude in degrees, elevation in feet.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Geod {
  pub lat: f64,
  pub lon: f64,
  pub elev_ft: f64,
}

impl Geod {
  pub fn from_deg(lat: f64, lon: f64) -> Self {
    Self {
      lat,
      lon,
      elev_ft: 0.0,
    }
  }

  pub fn from_deg_ft(lat: f64, lon: f64, elev_ft: f64) -> Self {
    Self { lat, lon, elev_ft }
  }

  pub fn with_elevation_ft(mut self, elev_ft: f64) -> Self {
    self.elev_ft = elev_ft;
    self
  }
}

/// Normalizes `value` into the half-open range `[min, max)`.
pub fn normalize_periodic(min: f64, max: f64, value: f64) -> f64 {
  let range = max - min;
  let normalized = (value - min).rem_euclid(range);
  normalized + min
}

/// Great-circle surface distance in meters.
pub fn distance_m(from: Geod, to: Geod) -> f64 {
  let lat1 = from.lat.to_radians();
  let lat2 = to.lat.to_radians();
  let dlat = (to.lat - from.lat).to_radians();
  let dlon = (to.lon - from.lon).to_radians();

  let a = (dlat / 2.0).sin().powi(2)
    + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);

  2.0 * a.sqrt().asin() * EARTH_RADIUS_M
}

/// Initial great-circle course from `from` to `to`, in degrees `[0, 360)`.
pub fn course_deg(from: Geod, to: Geod) -> f64 {
  let lat1 = from.lat.to_radians();
  let lat2 = to.lat.to_radians();
  let dlon = (to.lon - from.lon).to_radians();

  let y = dlon.sin() * lat2.cos();
  let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();

  normalize_periodic(0.0, 360.0, y.atan2(x).to_degrees())
}

/// Destination point after travelling `dist_m` along the great circle with
/// initial course `course`. Elevation is carried over from `from`.
pub fn direct(from: Geod, course: f64, dist_m: f64) -> Geod {
  let lat1 = from.lat.to_radians();
  let lon1 = from.lon.to_radians();
  let crs = course.to_radians();
  let d = dist_m / EARTH_RADIUS_M;

  let lat2 =
    (lat1.sin() * d.cos() + lat1.cos() * d.sin() * crs.cos()).asin();
  let lon2 = lon1
    + (crs.sin() * d.sin() * lat1.cos())
      .atan2(d.cos() - lat1.sin() * lat2.sin());

  Geod {
    lat: lat2.to_degrees(),
    lon: normalize_periodic(-180.0, 180.0, lon2.to_degrees()),
    elev_ft: from.elev_ft,
  }
}

/// Courses of the two inner tangents between the turn circles around `m1`
/// and `m2`, normalized to `[0, 360)`.
pub fn inner_tangents_angle(
  m1: Geod,
  m2: Geod,
  r1: f64,
  r2: f64,
) -> [f64; 2] {
  let hypothenuse = distance_m(m1, m2);
  if hypothenuse <= r1 + r2 {
    tracing::warn!("inner_tangents_angle turn circles too near");
  }

  let opposite = r1 + r2;
  let angle = (opposite / hypothenuse).asin().to_degrees();
  let crs = if r1 > r2 {
    course_deg(m2, m1)
  } else {
    course_deg(m1, m2)
  };

  [
    normalize_periodic(0.0, 360.0, crs - angle),
    normalize_periodic(0.0, 360.0, crs + angle),
  ]
}

/// Length of the inner tangent between the turn circles around `m1` and
/// `m2`.
pub fn inner_tangents_length(m1: Geod, m2: Geod, r1: f64, r2: f64) -> f64 {
  let hypothenuse = distance_m(m1, m2);
  if hypothenuse <= r1 + r2 {
    tracing::warn!("inner_tangents_length turn circles too near");
  }

  let opposite = r1 + r2;
  let angle = (opposite / hypothenuse).asin().to_degrees();
  let crs = if r1 > r2 {
    course_deg(m2, m1)
  } else {
    course_deg(m1, m2)
  };

  let p1 = direct(m1, normalize_periodic(0.0, 360.0, crs - angle + 90.0), r1);
  let p2 = direct(m2, normalize_periodic(0.0, 360.0, crs - angle - 90.0), r2);

  distance_m(p1, p2)
}

/// Courses of the two outer tangents between the turn circles around `m1`
/// and `m2`, normalized to `[0, 360)`.
pub fn outer_tangents_angle(
  m1: Geod,
  m2: Geod,
  r1: f64,
  r2: f64,
) -> [f64; 2] {
  let hypothenuse = distance_m(m1, m2);
  let radius_diff = (r1 - r2).abs();
  let beta = radius_diff.atan2(hypothenuse).to_degrees();
  let gamma = course_deg(m1, m2);

  [
    normalize_periodic(0.0, 360.0, gamma - beta),
    normalize_periodic(0.0, 360.0, gamma + beta),
  ]
}

/// Length of the outer tangent between the turn circles around `m1` and
/// `m2`.
pub fn outer_tangents_length(m1: Geod, m2: Geod, r1: f64, r2: f64) -> f64 {
  let hypothenuse = distance_m(m1, m2);
  let radius_diff = (r1 - r2).abs();

  (hypothenuse.powi(2) - radius_diff.powi(2)).sqrt()
}

/// Estimated radius of the turn arc at the given speed: a 30°/s standard
/// ground turn below taxi speeds, an empirical 25° bank estimate in the
/// air.
pub fn turn_radius_m(speed_kts: f64, in_air: bool) -> f64 {
  if !in_air {
    ((360.0 / 30.0) * speed_kts.abs() * crate::KNOT_TO_MPS) / (2.0 * PI)
  } else {
    0.1911 * speed_kts * speed_kts
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn assert_close(actual: f64, expected: f64, tolerance: f64) {
    assert!(
      (actual - expected).abs() < tolerance,
      "expected {expected}, got {actual}"
    );
  }

  mod normalize_periodic {
    use super::*;

    #[test]
    fn already_in_range() {
      assert_eq!(normalize_periodic(0.0, 360.0, 42.0), 42.0);
    }

    #[test]
    fn wraps_negative() {
      assert_eq!(normalize_periodic(0.0, 360.0, -90.0), 270.0);
    }

    #[test]
    fn signed_range() {
      assert_eq!(normalize_periodic(-180.0, 180.0, 270.0), -90.0);
      assert_eq!(normalize_periodic(-180.0, 180.0, -190.0), 170.0);
    }
  }

  mod courses {
    use super::*;

    #[test]
    fn cardinal_directions() {
      let origin = Geod::from_deg(51.0, 9.0);

      let north = direct(origin, 0.0, 1000.0);
      assert_close(course_deg(origin, north), 0.0, 0.01);

      let east = direct(origin, 90.0, 1000.0);
      assert_close(course_deg(origin, east), 90.0, 0.01);

      let south = direct(origin, 180.0, 1000.0);
      assert_close(course_deg(origin, south), 180.0, 0.01);

      let west = direct(origin, 270.0, 1000.0);
      assert_close(course_deg(origin, west), 270.0, 0.01);
    }

    #[test]
    fn direct_round_trips_distance() {
      let origin = Geod::from_deg(51.0, 9.0);
      let there = direct(origin, 37.0, 2500.0);
      assert_close(distance_m(origin, there), 2500.0, 0.1);
    }

    #[test]
    fn zero_distance() {
      let origin = Geod::from_deg(51.0, 9.0);
      assert_eq!(distance_m(origin, origin), 0.0);
    }
  }

  mod tangents {
    use super::*;

    #[test]
    fn inner_tangents_east() {
      let r1 = 10.0;
      let r2 = 10.0;
      let dist = 2.0 * r1 + 2.0 * r2;
      let m1 = Geod::from_deg(51.0, 9.0);
      let m2 = direct(m1, 90.0, dist);

      let angles = inner_tangents_angle(m1, m2, r1, r2);
      assert_close(angles[0], 60.0, 0.1);
      assert_close(angles[1], 120.0, 0.1);
    }

    #[test]
    fn inner_tangents_north() {
      let r1 = 10.0;
      let r2 = 10.0;
      let dist = 2.0 * r1 + 2.0 * r2;
      let m1 = Geod::from_deg(51.0, 9.0);
      let m2 = direct(m1, 0.0, dist);

      let angles = inner_tangents_angle(m1, m2, r1, r2);
      assert_close(angles[0], 330.0, 0.1);
      assert_close(angles[1], 30.0, 0.1);
    }

    #[test]
    fn outer_tangents_east() {
      let r1 = 10.0;
      let r2 = 50.0;
      let dist = 40.0;
      let m1 = Geod::from_deg(51.0, 9.0);
      let m2 = direct(m1, 90.0, dist);

      let angles = outer_tangents_angle(m1, m2, r1, r2);
      assert_close(angles[0], 45.0, 0.1);
      assert_close(angles[1], 135.0, 0.1);
    }

    #[test]
    fn outer_tangents_length_is_pythagorean() {
      let m1 = Geod::from_deg(51.0, 9.0);
      let m2 = direct(m1, 90.0, 50.0);

      // 3-4-5 triangle: radius difference 30, separation 50.
      assert_close(outer_tangents_length(m1, m2, 10.0, 40.0), 40.0, 0.01);
    }
  }

  mod turn_radius {
    use super::*;

    #[test]
    fn grows_with_speed_in_air() {
      assert!(turn_radius_m(200.0, true) > turn_radius_m(100.0, true));
    }

    #[test]
    fn ground_turns_are_tight() {
      assert!(turn_radius_m(15.0, false) < 20.0);
    }
  }
}
