use internment::Intern;

use crate::{
  FEET_TO_METERS, KNOT_TO_MPS, METERS_TO_FEET, NAUTICALMILES_TO_METERS,
  PUSHBACK_SPEED_KTS,
  entities::{
    airport::{Airport, GroundNetwork, Runway},
    flightplan::{FlightPlan, Leg},
    vehicle::Performance,
    waypoint::Waypoint,
  },
  geometry::{self, Geod, normalize_periodic},
};

// Phase-duration thresholds for picking the leg of a newly synthesized
// plan from the elapsed time since the scheduled departure. Empirically
// tuned; keep as-is.
pub const PUSHBACK_PHASE_S: f64 = 60.0;
pub const TAXI_PHASE_S: f64 = 1500.0;
pub const TAKEOFF_PHASE_S: f64 = 2000.0;

const GLIDESLOPE_DEG: f64 = 3.0;
const INITIAL_PITCH_DEG: f64 = 10.0;
const DOWNWIND_DISTANCE_M: f64 = 10.0 * NAUTICALMILES_TO_METERS;

/// Picks the leg phase for a plan synthesized `elapsed_s` after its
/// scheduled start, given how much scheduled time the flight has left.
pub fn select_leg(elapsed_s: f64, remaining_s: f64) -> Leg {
  if elapsed_s > PUSHBACK_PHASE_S && elapsed_s < TAXI_PHASE_S {
    Leg::Taxi
  } else if elapsed_s >= TAXI_PHASE_S && elapsed_s < TAKEOFF_PHASE_S {
    Leg::Takeoff
  } else if elapsed_s >= TAKEOFF_PHASE_S {
    if remaining_s > TAKEOFF_PHASE_S {
      Leg::Cruise
    } else {
      Leg::Approach
    }
  } else {
    Leg::StartupPushback
  }
}

/// Everything a leg generator needs to know about the flight it is
/// building waypoints for.
#[derive(Debug, Clone)]
pub struct LegContext<'a> {
  pub departure: &'a Airport,
  pub arrival: &'a Airport,
  pub parking: Option<Intern<String>>,
  pub runway: Option<Intern<String>>,

  pub start_time: f64,
  pub remaining_time: f64,
  pub first_leg: bool,

  pub radius_m: f64,
  pub cruise_alt_ft: f64,
  pub cruise_speed_kts: f64,
  pub pos: Geod,
  pub heading: f64,
  pub perf: Performance,

  pub flight_type: String,
  pub aircraft_type: String,
  pub airline: String,
}

/// Strategy interface for per-leg waypoint generation. The flight plan
/// owns leg selection and the leg-end tagging; generators only append
/// waypoints.
pub trait WaypointGenerator {
  fn generate(
    &self,
    plan: &mut FlightPlan,
    leg: Leg,
    ctx: &LegContext,
  ) -> bool;
}

fn on_ground(
  name: impl Into<String>,
  pos: Geod,
  elev_ft: f64,
  speed_kts: f64,
) -> Waypoint {
  let mut wpt =
    Waypoint::new(name, pos.with_elevation_ft(elev_ft), speed_kts);
  wpt.gear_down = true;
  wpt.on_ground = true;
  if speed_kts > 0.0 {
    wpt.set_ground_lights();
  } else {
    wpt.set_power_down_lights();
  }
  wpt
}

fn on_runway(
  name: impl Into<String>,
  pos: Geod,
  elev_ft: f64,
  speed_kts: f64,
) -> Waypoint {
  let mut wpt = on_ground(name, pos, elev_ft, speed_kts);
  wpt.set_takeoff_lights();
  wpt
}

fn in_air(
  name: impl Into<String>,
  pos: Geod,
  alt_ft: f64,
  speed_kts: f64,
) -> Waypoint {
  let mut wpt = Waypoint::new(name, pos.with_elevation_ft(alt_ft), speed_kts);
  wpt.gear_down = false;
  wpt.on_ground = false;
  if alt_ft > 10000.0 {
    wpt.set_cruise_lights();
  } else {
    wpt.set_approach_lights();
  }
  wpt
}

/// Appends waypoints along a circular arc around `center`, sweeping from
/// `start_deg` towards `end_deg` in `increment_deg` steps (the sign gives
/// the turn direction), ramping altitude by `alt_diff_ft` across the
/// sweep.
fn create_arc(
  plan: &mut FlightPlan,
  center: Geod,
  start_deg: f64,
  end_deg: f64,
  increment_deg: f64,
  radius_m: f64,
  alt_ft: f64,
  alt_diff_ft: f64,
  speed_kts: f64,
  prefix: &str,
) {
  let start = normalize_periodic(0.0, 360.0, start_deg);
  let end = normalize_periodic(0.0, 360.0, end_deg);
  // Degrees swept in the direction the increment's sign selects.
  let sweep = normalize_periodic(
    0.0,
    360.0,
    (end - start) * increment_deg.signum(),
  );
  let steps = ((sweep / increment_deg.abs()).ceil() as usize).max(1);

  for i in 0..=steps {
    let frac = i as f64 / steps as f64;
    let angle = normalize_periodic(
      0.0,
      360.0,
      start + sweep * frac * increment_deg.signum(),
    );
    plan.push_back_waypoint(in_air(
      format!("{prefix}{i:03}"),
      geometry::direct(center, angle, radius_m),
      alt_ft + alt_diff_ft * frac,
      speed_kts,
    ));
  }
}

/// Appends waypoints along a straight course, ramping altitude by
/// `alt_diff_ft` across the run.
fn create_line(
  plan: &mut FlightPlan,
  start: Geod,
  azimuth_deg: f64,
  dist_m: f64,
  alt_ft: f64,
  alt_diff_ft: f64,
  speed_kts: f64,
  prefix: &str,
) {
  let segments = ((dist_m / 2000.0).ceil() as usize).max(1);
  for i in 1..=segments {
    let frac = i as f64 / segments as f64;
    plan.push_back_waypoint(in_air(
      format!("{prefix}{i:03}"),
      geometry::direct(start, azimuth_deg, dist_m * frac),
      alt_ft + alt_diff_ft * frac,
      speed_kts,
    ));
  }
}

fn pitch_distance_m(pitch_deg: f64, alt_gain_m: f64) -> f64 {
  alt_gain_m / pitch_deg.to_radians().tan()
}

/// The built-in leg generator: produces pushback, ground-network taxi,
/// takeoff, climb, cruise, descent, landing and parking waypoints from
/// airport geometry.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultGenerator;

impl WaypointGenerator for DefaultGenerator {
  fn generate(
    &self,
    plan: &mut FlightPlan,
    leg: Leg,
    ctx: &LegContext,
  ) -> bool {
    match leg {
      Leg::StartupPushback => self.create_pushback(plan, ctx),
      Leg::Taxi => self.create_takeoff_taxi(plan, ctx),
      Leg::Takeoff => self.create_takeoff(plan, ctx),
      Leg::Climb => self.create_climb(plan, ctx),
      Leg::Cruise => self.create_cruise(plan, ctx),
      Leg::Descent | Leg::Approach => self.create_descent(plan, ctx),
      Leg::Landing => self.create_landing(plan, ctx),
      Leg::LandingTaxi => self.create_landing_taxi(plan, ctx),
      Leg::Parking => self.create_parking(plan, ctx),
    }
  }
}

impl DefaultGenerator {
  fn runway_for<'a>(
    &self,
    ctx: &LegContext<'a>,
    apt: &'a Airport,
  ) -> Option<&'a Runway> {
    ctx
      .runway
      .and_then(|id| apt.runway(id))
      .or_else(|| apt.active_runway())
  }

  fn create_pushback(&self, plan: &mut FlightPlan, ctx: &LegContext) -> bool {
    let apt = ctx.departure;
    let parking = ctx
      .parking
      .and_then(|id| apt.parking(id))
      .or_else(|| apt.available_parking(ctx.radius_m));

    let Some(parking) = parking else {
      tracing::warn!(
        "no parking for a {} of flight type {} of airline {} at {}",
        ctx.aircraft_type,
        ctx.flight_type,
        ctx.airline,
        apt.id
      );
      plan.push_back_waypoint(on_ground(
        "END-ParkingInvalidGate",
        apt.pos,
        apt.elevation_ft,
        ctx.perf.v_taxi_kts * 2.0 / 3.0,
      ));
      return true;
    };

    let back = normalize_periodic(0.0, 360.0, parking.heading + 180.0);
    let elev = apt.elevation_ft;

    plan.push_back_waypoint(on_ground(
      parking.id.to_string(),
      parking.pos,
      elev,
      PUSHBACK_SPEED_KTS,
    ));
    plan.push_back_waypoint(on_ground(
      "PushBack1",
      geometry::direct(parking.pos, back, ctx.radius_m),
      elev,
      PUSHBACK_SPEED_KTS,
    ));
    plan.push_back_waypoint(on_ground(
      "PushBackPoint",
      geometry::direct(parking.pos, back, 2.5 * ctx.radius_m),
      elev,
      PUSHBACK_SPEED_KTS,
    ));
    true
  }

  /// Taxi without a usable ground network: straight to the runway via the
  /// airport reference point.
  fn create_default_taxi(
    &self,
    plan: &mut FlightPlan,
    ctx: &LegContext,
    apt: &Airport,
    rwy: &Runway,
  ) {
    let takeoff_point = rwy.point_on_centerline(5.0);

    plan.push_back_waypoint(on_ground(
      "AirportCenter",
      apt.pos,
      apt.elevation_ft,
      ctx.perf.v_taxi_kts,
    ));

    let mut hold = on_runway(
      "RunwayTakeoff_DepartureHold",
      takeoff_point,
      apt.elevation_ft,
      ctx.perf.v_taxi_kts,
    );
    hold.flaps = 0.5;
    plan.push_back_waypoint(hold);

    let mut accel = on_runway(
      "Accel",
      rwy.point_on_centerline(105.0),
      apt.elevation_ft,
      ctx.perf.v_rotate_kts,
    );
    accel.flaps = 0.5;
    plan.push_back_waypoint(accel);
  }

  fn create_takeoff_taxi(
    &self,
    plan: &mut FlightPlan,
    ctx: &LegContext,
  ) -> bool {
    let apt = ctx.departure;
    let Some(rwy) = self.runway_for(ctx, apt) else {
      tracing::warn!("no runway to taxi to at {}", apt.id);
      return false;
    };
    let takeoff_point = rwy.point_on_centerline(5.0);
    tracing::debug!("taxi to {}/{}", apt.id, rwy.id);

    let gn = &apt.ground_network;
    if !gn.exists() {
      tracing::debug!("no ground network at {}, default taxi", apt.id);
      self.create_default_taxi(plan, ctx, apt, rwy);
      return true;
    }

    let (Some(start), Some(end)) =
      (gn.nearest_node(ctx.pos), gn.nearest_runway_node(takeoff_point))
    else {
      self.create_default_taxi(plan, ctx, apt, rwy);
      return true;
    };

    let route = gn.find_shortest_route(start.name, end.name);
    if route.len() <= 1 {
      tracing::debug!("taxi route too short at {}, default taxi", apt.id);
      self.create_default_taxi(plan, ctx, apt, rwy);
      return true;
    }
    tracing::debug!(
      "taxi route of {:.0}m over {} nodes",
      GroundNetwork::route_length_m(&route),
      route.len()
    );

    // The first node is where we already are (the end of the pushback);
    // chop it off.
    let last = route.len() - 1;
    for (i, node) in route.iter().enumerate().skip(1) {
      let mut wpt = on_ground(
        node.name.to_string(),
        node.pos,
        apt.elevation_ft,
        ctx.perf.v_taxi_kts,
      );
      wpt.route_index = i;
      if i + 1 == last {
        wpt.name.push_str("_DepartureHold");
        wpt.flaps = 0.5;
        wpt.set_takeoff_lights();
      } else if i == last {
        wpt.name.push_str("_Accel");
        wpt.flaps = 0.5;
        wpt.set_takeoff_lights();
      }
      plan.push_back_waypoint(wpt);
    }

    // Acceleration point, 105 meters into the runway, further if the
    // entry node already sits down the runway.
    let mut accel_m = 105.0;
    if let Some(entry) = plan.last_waypoint() {
      let down = geometry::distance_m(entry.pos, rwy.threshold);
      if down > accel_m {
        accel_m += down;
      }
    }
    let mut accel = on_runway(
      "Accel",
      rwy.point_on_centerline(accel_m),
      apt.elevation_ft,
      ctx.perf.v_rotate_kts,
    );
    accel.flaps = 0.5;
    plan.push_back_waypoint(accel);
    true
  }

  fn create_takeoff(&self, plan: &mut FlightPlan, ctx: &LegContext) -> bool {
    let apt = ctx.departure;
    let Some(rwy) = self.runway_for(ctx, apt) else {
      tracing::warn!("invalid active runway for takeoff at {}", apt.id);
      return false;
    };

    let perf = &ctx.perf;
    let accel_mps2 = perf.accel_kts_s * KNOT_TO_MPS;
    let v_taxi_mps = perf.v_taxi_kts * KNOT_TO_MPS;
    let v_rotate_mps = perf.v_rotate_kts * KNOT_TO_MPS;
    let v_takeoff_mps = perf.v_takeoff_kts * KNOT_TO_MPS;
    let elev = apt.elevation_ft;

    let mut accel_point = 105.0;
    let down = geometry::distance_m(ctx.pos, rwy.threshold);
    if down > accel_point && down < rwy.length_m {
      accel_point += down;
    }

    let d = accel_point
      + Performance::accel_distance_m(v_taxi_mps, v_rotate_mps, accel_mps2);
    let mut rotate =
      on_runway("rotate", rwy.point_on_centerline(d), elev, perf.v_rotate_kts);
    rotate.flaps = 0.5;
    plan.push_back_waypoint(rotate);

    let t = d
      + Performance::accel_distance_m(
        v_rotate_mps,
        v_takeoff_mps,
        accel_mps2,
      );
    let mut takeoff = on_runway(
      "takeoff",
      rwy.point_on_centerline(t),
      elev,
      perf.v_takeoff_kts,
    );
    takeoff.flaps = 0.5;
    plan.push_back_waypoint(takeoff);

    // Gear up around 400 ft AGL. The waypoint sits well past the
    // geometric point so the lead-in doesn't swallow it immediately.
    let v_ref = perf.v_takeoff_kts + 20.0;
    let gear_up_m = t
      + 2.0 * v_ref * FEET_TO_METERS
      + pitch_distance_m(INITIAL_PITCH_DEG, 400.0 * FEET_TO_METERS);
    let mut gear_up = in_air(
      "gear-up",
      rwy.point_on_centerline(gear_up_m),
      elev + 400.0,
      v_ref,
    );
    gear_up.flaps = 0.5;
    plan.push_back_waypoint(gear_up);

    // Two climb-out points: the turn towards the destination should not
    // start below 2000 ft.
    let v_climb = perf.v_climb_kts.min(240.0);
    for (alt, name) in [(2000.0, "2000'"), (2500.0, "2500'")] {
      let climb_m = t
        + 2.0 * v_climb * FEET_TO_METERS
        + pitch_distance_m(INITIAL_PITCH_DEG, alt * FEET_TO_METERS);
      plan.push_back_waypoint(in_air(
        name,
        rwy.point_on_centerline(climb_m),
        elev + alt,
        v_climb,
      ));
    }
    true
  }

  fn create_climb(&self, plan: &mut FlightPlan, ctx: &LegContext) -> bool {
    let apt = ctx.departure;
    let Some(rwy) = self.runway_for(ctx, apt) else {
      return false;
    };
    let v_climb = ctx.perf.v_climb_kts;

    let cur = plan.last_waypoint().map(|w| w.pos).unwrap_or(rwy.end());
    let course = geometry::course_deg(cur, ctx.arrival.pos);
    let heading_diff =
      normalize_periodic(-180.0, 180.0, course - rwy.heading);

    if heading_diff.abs() < 10.0 {
      plan.push_back_waypoint(in_air(
        "10000ft climb",
        geometry::direct(cur, course, 10.0 * NAUTICALMILES_TO_METERS),
        10000.0,
        v_climb,
      ));
      plan.push_back_waypoint(in_air(
        "18000ft climb",
        geometry::direct(cur, course, 20.0 * NAUTICALMILES_TO_METERS),
        18000.0,
        v_climb,
      ));
    } else {
      let climb1 = geometry::direct(
        cur,
        rwy.heading,
        5.0 * NAUTICALMILES_TO_METERS,
      );
      plan.push_back_waypoint(in_air("5000ft climb", climb1, 5000.0, v_climb));

      let radius = geometry::turn_radius_m(v_climb, true);
      let right = if heading_diff > 0.0 { 90.0 } else { -90.0 };
      let increment = if heading_diff > 0.0 { 2.0 } else { -2.0 };
      let center = geometry::direct(climb1, rwy.heading + right, radius);
      create_arc(
        plan,
        center,
        rwy.heading - right,
        course - right,
        increment,
        radius,
        5000.0,
        100.0,
        v_climb,
        "climb-out",
      );

      plan.push_back_waypoint(in_air(
        "18000ft climb",
        geometry::direct(cur, course, 20.0 * NAUTICALMILES_TO_METERS),
        18000.0,
        v_climb,
      ));
    }
    true
  }

  fn create_cruise(&self, plan: &mut FlightPlan, ctx: &LegContext) -> bool {
    let Some(rwy) = self.runway_for(ctx, ctx.arrival) else {
      return false;
    };

    let cur = plan.last_waypoint().map(|w| w.pos).unwrap_or(ctx.pos);
    let target = rwy.point_on_centerline(-DOWNWIND_DISTANCE_M);
    let course = geometry::course_deg(cur, target);
    let total = geometry::distance_m(cur, target);

    // Top of descent: lose the cruise altitude down to 2000 ft above the
    // field on a standard glideslope.
    let alt_to_lose_ft =
      (ctx.cruise_alt_ft - ctx.arrival.elevation_ft - 2000.0).max(0.0);
    let tod_m = (alt_to_lose_ft * FEET_TO_METERS)
      / GLIDESLOPE_DEG.to_radians().tan();
    let bod_dist = (total - tod_m).max(total * 0.5);

    plan.push_back_waypoint(in_air(
      "Cruise",
      geometry::direct(cur, course, bod_dist * 0.5),
      ctx.cruise_alt_ft,
      ctx.cruise_speed_kts,
    ));
    plan.push_back_waypoint(in_air(
      "BOD",
      geometry::direct(cur, course, bod_dist),
      ctx.cruise_alt_ft,
      ctx.cruise_speed_kts,
    ));
    plan.push_back_waypoint(in_air(
      "BOD2",
      geometry::direct(cur, course, bod_dist + 2000.0),
      ctx.cruise_alt_ft - 500.0,
      ctx.cruise_speed_kts,
    ));
    true
  }

  /// The descent joins the entry turn circle to the turn-to-final circle
  /// along their tangent, so the path is flyable at the descent speed's
  /// turn radius.
  fn create_descent(&self, plan: &mut FlightPlan, ctx: &LegContext) -> bool {
    let apt = ctx.arrival;
    let Some(rwy) = self.runway_for(ctx, apt) else {
      tracing::warn!("no runway for descent at {}", apt.id);
      return false;
    };

    let v_descent = ctx.perf.v_descent_kts;
    let cur = plan.last_waypoint().map(|w| w.pos).unwrap_or(ctx.pos);
    let heading = ctx.heading;
    let alt_ft = if ctx.cruise_alt_ft > 0.0 {
      ctx.cruise_alt_ft
    } else {
      cur.elev_ft
    };
    let alt_diff = (alt_ft - apt.elevation_ft - 2000.0).max(0.0);
    let radius = geometry::turn_radius_m(v_descent, true);

    let heading_diff =
      normalize_periodic(-180.0, 180.0, heading - rwy.heading);
    let lateral = if heading_diff > 0.0 { -radius } else { radius };

    if heading_diff.abs() < 30.0 {
      // Near-aligned: one turn onto the extended centerline.
      let right = if heading_diff > 0.0 { 90.0 } else { -90.0 };
      let center = geometry::direct(cur, heading - right, radius);
      let increment = if heading_diff > 0.0 { -2.0 } else { 2.0 };
      create_arc(
        plan,
        center,
        heading + right,
        rwy.heading + right,
        increment,
        radius,
        alt_ft,
        -alt_diff / 3.0,
        v_descent,
        "straight-turn-",
      );
    } else {
      // S-curve: initial turn, tangent-line descent, turn to final.
      let right = if heading_diff > 0.0 { 90.0 } else { -90.0 };
      let increment = if heading_diff > 0.0 { 2.0 } else { -2.0 };
      let inner = if heading_diff < 0.0 { 0 } else { 1 };

      let first_center = geometry::direct(cur, heading + right, radius);
      let mut secondary =
        rwy.point_off_centerline(-2.0 * DOWNWIND_DISTANCE_M, lateral);
      let mut offset = 1000.0;
      while geometry::distance_m(first_center, secondary) < 2.0 * radius {
        secondary = rwy.point_off_centerline(
          -2.0 * DOWNWIND_DISTANCE_M - offset,
          lateral,
        );
        offset += 1000.0;
      }

      let tangent = geometry::inner_tangents_angle(
        first_center,
        secondary,
        radius,
        radius,
      )[inner];
      create_arc(
        plan,
        first_center,
        heading - right,
        tangent - right,
        increment,
        radius,
        alt_ft,
        -alt_diff / 8.0,
        v_descent,
        "initial-turn-",
      );

      let length = geometry::inner_tangents_length(
        first_center,
        secondary,
        radius,
        radius,
      );
      let line_start = plan.last_waypoint().map(|w| w.pos).unwrap_or(cur);
      let line_alt =
        plan.last_waypoint().map(|w| w.pos.elev_ft).unwrap_or(alt_ft);
      create_line(
        plan,
        line_start,
        tangent,
        length,
        line_alt,
        -alt_diff * 0.75,
        v_descent,
        "descent-",
      );

      let start_val = normalize_periodic(0.0, 360.0, tangent + right);
      let end_val = normalize_periodic(0.0, 360.0, rwy.heading + right);
      let turn_alt =
        plan.last_waypoint().map(|w| w.pos.elev_ft).unwrap_or(alt_ft);
      create_arc(
        plan,
        secondary,
        start_val,
        end_val,
        -increment,
        radius,
        turn_alt,
        -alt_diff / 8.0,
        v_descent,
        "turn-",
      );
    }
    true
  }

  fn create_landing(&self, plan: &mut FlightPlan, ctx: &LegContext) -> bool {
    let apt = ctx.arrival;
    let Some(rwy) = self.runway_for(ctx, apt) else {
      tracing::warn!("no runway for landing at {}", apt.id);
      return false;
    };

    let perf = &ctx.perf;
    let elev = apt.elevation_ft;
    let tan_gs = GLIDESLOPE_DEG.to_radians().tan();

    // Touch down a quarter of the way along the runway.
    let touchdown_m = rwy.length_m * 0.25;

    let gs_entry_m = (2000.0 * FEET_TO_METERS) / tan_gs - touchdown_m;
    let mut gs = in_air(
      format!("GlideslopeBegin_{}", rwy.id),
      rwy.point_on_centerline(-gs_entry_m),
      elev + 2000.0,
      perf.v_approach_kts,
    );
    gs.gear_down = true;
    gs.flaps = 1.0;
    gs.speedbrakes = 1.0;
    plan.push_back_waypoint(gs);

    let decel_m = (500.0 * FEET_TO_METERS) / tan_gs - touchdown_m;
    let mut decel = in_air(
      "500' decel",
      rwy.point_on_centerline(-decel_m),
      elev + 500.0,
      perf.v_touchdown_kts,
    );
    decel.gear_down = true;
    decel.flaps = 1.0;
    decel.speedbrakes = 1.0;
    plan.push_back_waypoint(decel);

    let threshold_alt = touchdown_m * tan_gs * METERS_TO_FEET;
    let mut cross = in_air(
      "CrossThreshold",
      rwy.threshold,
      elev + threshold_alt,
      perf.v_touchdown_kts,
    );
    cross.gear_down = true;
    cross.flaps = 1.0;
    cross.speedbrakes = 1.0;
    plan.push_back_waypoint(cross);

    let rollout_m = Performance::accel_distance_m(
      perf.v_touchdown_kts * KNOT_TO_MPS,
      perf.v_taxi_kts * KNOT_TO_MPS,
      perf.decel_ground_kts_s * KNOT_TO_MPS,
    );
    let points = ((rollout_m / 60.0) as usize).clamp(1, 20);
    for i in 1..=points {
      let t = 1.0
        - ((points - i) as f64).powi(2) / (points as f64).powi(2);
      let vel =
        perf.v_touchdown_kts * (1.0 - t) + perf.v_taxi_kts * t;
      let mut wpt = on_runway(
        format!("rollout{i:03}"),
        rwy.point_on_centerline(touchdown_m + rollout_m * t),
        elev,
        vel,
      );
      wpt.flaps = 1.0;
      wpt.speedbrakes = 1.0;
      wpt.spoilers = 1.0;
      wpt.crossat_ft = elev;
      plan.push_back_waypoint(wpt);
    }

    let gn = &apt.ground_network;
    if gn.exists() {
      let exit = rwy.point_on_centerline(1.1 * rollout_m + touchdown_m);
      if let Some(node) = gn.nearest_node(exit) {
        let mut wpt = on_runway(
          node.name.to_string(),
          node.pos,
          elev,
          perf.v_taxi_kts,
        );
        wpt.flaps = 1.0;
        wpt.speedbrakes = 1.0;
        plan.push_back_waypoint(wpt);
      }
    }
    true
  }

  fn create_landing_taxi(
    &self,
    plan: &mut FlightPlan,
    ctx: &LegContext,
  ) -> bool {
    let apt = ctx.arrival;
    let parking = ctx
      .parking
      .and_then(|id| apt.parking(id))
      .or_else(|| apt.available_parking(ctx.radius_m));
    let Some(parking) = parking else {
      tracing::warn!("no arrival parking at {}", apt.id);
      return false;
    };

    let gn = &apt.ground_network;
    if !gn.exists() {
      plan.push_back_waypoint(on_ground(
        "TaxiToParking",
        geometry::direct(
          parking.pos,
          normalize_periodic(0.0, 360.0, parking.heading + 180.0),
          4.0 * ctx.radius_m,
        ),
        apt.elevation_ft,
        ctx.perf.v_taxi_kts,
      ));
      return true;
    }

    let (Some(start), Some(end)) =
      (gn.nearest_node(ctx.pos), gn.nearest_node(parking.pos))
    else {
      return false;
    };
    let route = gn.find_shortest_route(start.name, end.name);
    if route.is_empty() {
      return false;
    }

    for (i, node) in route.iter().enumerate().skip(1) {
      let mut wpt = on_ground(
        node.name.to_string(),
        node.pos,
        apt.elevation_ft,
        ctx.perf.v_taxi_kts,
      );
      wpt.route_index = i;
      plan.push_back_waypoint(wpt);
    }
    true
  }

  fn create_parking(&self, plan: &mut FlightPlan, ctx: &LegContext) -> bool {
    let apt = ctx.arrival;
    let elev = apt.elevation_ft;
    let v_taxi_reduced = ctx.perf.v_taxi_kts * 2.0 / 3.0;

    let parking = ctx
      .parking
      .and_then(|id| apt.parking(id))
      .or_else(|| apt.available_parking(ctx.radius_m));
    let Some(parking) = parking else {
      plan.push_back_waypoint(on_ground(
        "END-ParkingInvalidGate",
        apt.pos,
        elev,
        v_taxi_reduced,
      ));
      return true;
    };

    let reverse =
      normalize_periodic(0.0, 360.0, parking.heading + 180.0);
    for (i, (dist, speed)) in
      [(18.0, 3.0), (14.0, 3.0), (10.0, 2.0), (6.0, 2.0), (3.0, 2.0)]
        .iter()
        .enumerate()
    {
      plan.push_back_waypoint(on_ground(
        format!("parking{}", i + 1),
        geometry::direct(parking.pos, reverse, *dist),
        elev,
        *speed,
      ));
    }

    plan.push_back_waypoint(on_ground(
      format!("Parking-{}", parking.id),
      parking.pos,
      elev,
      v_taxi_reduced / 3.0,
    ));
    plan.push_back_waypoint(on_ground(
      "Beyond-Parking",
      geometry::direct(parking.pos, parking.heading, 2.0),
      elev,
      v_taxi_reduced / 3.0,
    ));
    plan.push_back_waypoint(on_ground(
      "END-Parking",
      geometry::direct(parking.pos, parking.heading, 3.0),
      elev,
      v_taxi_reduced / 3.0,
    ));
    true
  }
}
