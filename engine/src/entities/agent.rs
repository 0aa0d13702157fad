use internment::Intern;

use crate::{
  FEET_TO_METERS, KNOT_TO_MPS, METERS_TO_FEET,
  atc::{
    AirportSide, Announcement, AtcNetwork, ControllerRole, Instruction,
    role_for_leg,
  },
  entities::{
    flightplan::{FlightPlan, Leg, MIN_TURNAROUND_S},
    vehicle::VehicleKind,
    waypoint::Waypoint,
  },
  geometry::{self, Geod, normalize_periodic},
  lowpass,
  synth::{LegContext, WaypointGenerator},
};

/// Ticks with no progress towards the current waypoint before a moving
/// vehicle is declared stuck and removed.
const STUCK_LIMIT: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Targets {
  pub heading: f64,
  pub speed_kts: f64,
  pub altitude_ft: f64,
  pub vs_fpm: f64,
}

/// Discrete vehicle state published alongside the control targets,
/// taken from the waypoint most recently passed.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DiscreteState {
  pub gear_down: bool,
  pub flaps: f64,
  pub spoilers: f64,
  pub speedbrakes: f64,
  pub on_ground: bool,
  pub beacon_light: bool,
  pub cabin_lights: bool,
  pub landing_light: bool,
  pub nav_lights: bool,
  pub strobe_light: bool,
  pub taxi_lights: bool,
}

impl From<&Waypoint> for DiscreteState {
  fn from(wpt: &Waypoint) -> Self {
    Self {
      gear_down: wpt.gear_down,
      flaps: wpt.flaps,
      spoilers: wpt.spoilers,
      speedbrakes: wpt.speedbrakes,
      on_ground: wpt.on_ground,
      beacon_light: wpt.beacon_light,
      cabin_lights: wpt.cabin_lights,
      landing_light: wpt.landing_light,
      nav_lights: wpt.nav_lights,
      strobe_light: wpt.strobe_light,
      taxi_lights: wpt.taxi_lights,
    }
  }
}

/// The per-tick control targets and discrete state handed to the motion
/// and animation layers.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AgentOutput {
  pub target: Targets,
  pub discrete: DiscreteState,
}

/// The per-vehicle driver: walks its flight plan every tick, derives
/// control targets from the waypoints ahead and talks to whichever
/// controller owns the current leg.
#[derive(Debug)]
pub struct TrafficAgent {
  pub id: usize,
  pub callsign: Intern<String>,
  pub kind: VehicleKind,
  pub radius_m: f64,

  pub pos: Geod,
  pub heading: f64,
  pub speed_kts: f64,
  pub altitude_ft: f64,

  pub target: Targets,
  pub discrete: DiscreteState,
  pub plan: FlightPlan,
  pub scheduled_departure: f64,

  dead: bool,
  hold_pos: bool,
  needs_next_leg: bool,
  use_perf_vs: bool,
  prev_speed: f64,
  prev_dist_to_go: f64,
  min_bearing: f64,
  stuck_counter: u32,
  controller: Option<(Intern<String>, ControllerRole)>,
}

impl TrafficAgent {
  pub fn new(
    id: usize,
    callsign: Intern<String>,
    kind: VehicleKind,
    plan: FlightPlan,
  ) -> Self {
    Self {
      id,
      callsign,
      kind,
      radius_m: 20.0,
      pos: Geod::default(),
      heading: 0.0,
      speed_kts: 0.0,
      altitude_ft: 0.0,
      target: Targets::default(),
      discrete: DiscreteState::default(),
      plan,
      scheduled_departure: 0.0,
      dead: false,
      hold_pos: false,
      needs_next_leg: false,
      use_perf_vs: true,
      prev_speed: 0.0,
      prev_dist_to_go: f64::MAX,
      min_bearing: 360.0,
      stuck_counter: 0,
      controller: None,
    }
  }

  pub fn is_dead(&self) -> bool {
    self.dead
  }

  pub fn needs_next_leg(&self) -> bool {
    self.needs_next_leg
  }

  pub fn output(&self) -> AgentOutput {
    AgentOutput {
      target: self.target,
      discrete: self.discrete,
    }
  }

  /// Removes this vehicle from the simulation: signs off from its
  /// controller synchronously so no registration outlives the agent,
  /// and with it the owned flight plan and waypoints.
  pub fn kill(&mut self, net: &mut AtcNetwork) {
    if let Some((airport, role)) = self.controller.take() {
      if let Some(ctl) = net.controller_mut(airport, role) {
        ctl.sign_off(self.id);
      }
    }
    self.dead = true;
  }

  /// One simulation tick.
  pub fn update(&mut self, dt: f64, now: f64, net: &mut AtcNetwork) {
    if self.dead {
      return;
    }

    if self.plan.valid {
      self.process_flight_plan(now, net);
    } else {
      // No plan to fly: hold the last known targets.
      self.target.speed_kts = 0.0;
    }

    self.handle_atc(dt, now, net);
    self.update_actual_state(dt);
  }

  /// Regenerates the plan for the next leg, recycling the last waypoint
  /// of the current one as the join point.
  pub fn load_next_leg(
    &mut self,
    ctx: &LegContext,
    generator: &dyn WaypointGenerator,
  ) -> bool {
    let next = self.plan.leg.next();
    self.plan.reset_waypoints();
    // The recycled join waypoint already had its leg-boundary tag
    // honored; strip it so the new leg doesn't advance twice.
    if let Some(first) = self.plan.last_waypoint_mut() {
      if let Some(stripped) = first.name.strip_suffix("legend") {
        first.name = stripped.to_owned();
      }
    }
    let ok = self.plan.create_leg(next, ctx, generator);
    if ok {
      self.needs_next_leg = false;
      self.plan.restart();
    } else {
      tracing::warn!(
        "{} failed to create waypoints for leg {next:?}",
        self.callsign
      );
    }
    ok
  }

  fn process_flight_plan(&mut self, now: f64, net: &mut AtcNetwork) {
    if self.plan.previous_waypoint().is_none() {
      if self.plan.is_empty() {
        tracing::warn!(
          "{} has no flight plan to fly and was removed",
          self.callsign
        );
        self.kill(net);
      } else {
        self.handle_first_waypoint(net);
      }
      return;
    }

    if !self.plan.is_active(now) {
      return;
    }

    let Some(curr) = self.plan.current_waypoint().cloned() else {
      tracing::warn!("{} has no current waypoint", self.callsign);
      self.needs_next_leg = true;
      return;
    };

    if !self.lead_point_reached(&curr) {
      self.control_heading(&curr);
      self.control_speed(&curr);
      return;
    }

    if curr.finished {
      tracing::debug!("{} flight plan ended", self.callsign);
      if self.plan.repeat {
        self.plan.restart();
      } else {
        self.kill(net);
      }
      return;
    }

    if let Some(next) = self.plan.next_waypoint() {
      self.target.heading = FlightPlan::bearing(&curr, next);
    }

    self.plan.increment_waypoint(true);
    if self.plan.next_waypoint().is_none() {
      self.needs_next_leg = true;
    }

    let Some(prev) = self.plan.previous_waypoint().cloned() else {
      return;
    };
    tracing::trace!(
      "{} passed {}, now targeting {:?}",
      self.callsign,
      prev.name,
      self.plan.current_waypoint().map(|w| w.name.as_str())
    );

    self.handle_leg_markers(&prev, now, net);
    self.announce_position_to_controller(net);

    let curr = self.plan.current_waypoint().cloned();
    let has_next = self.plan.next_waypoint().is_some();
    if let Some(curr) = &curr {
      if has_next
        && !curr.contains("END")
        && !curr.contains("PushBackPointlegend")
      {
        self
          .plan
          .set_lead_distance(self.target.speed_kts, self.target.heading);
      }
      self.update_altitude_targets(&prev, curr);
    }

    self.target.speed_kts = prev.speed_kts;
    self.discrete = DiscreteState::from(&prev);
  }

  /// Initialization against the first waypoint: position and state come
  /// straight from the plan.
  fn handle_first_waypoint(&mut self, net: &mut AtcNetwork) {
    self.plan.increment_waypoint(true);
    if self.plan.next_waypoint().is_none() {
      self.needs_next_leg = true;
    }

    let (Some(prev), Some(curr)) = (
      self.plan.previous_waypoint().cloned(),
      self.plan.current_waypoint().cloned(),
    ) else {
      return;
    };

    self.pos = prev.pos;
    self.altitude_ft = prev.pos.elev_ft;
    self.speed_kts = if self.plan.leg == Leg::Taxi {
      0.0
    } else {
      prev.speed_kts
    };

    // Facing the waypoint ahead, or away from it when the first leg is
    // flown in reverse (pushback).
    self.heading = if prev.speed_kts > 0.0 {
      FlightPlan::bearing(&prev, &curr)
    } else {
      FlightPlan::bearing(&curr, &prev)
    };
    self.target.heading = self.heading;
    self.target.speed_kts = prev.speed_kts;
    self.target.altitude_ft = prev.pos.elev_ft;
    self.discrete = DiscreteState::from(&prev);

    let has_next = self.plan.next_waypoint().is_some();
    if has_next
      && !curr.contains("END")
      && !curr.contains("PushBackPointlegend")
    {
      self
        .plan
        .set_lead_distance(self.target.speed_kts, self.heading);
    }

    self.update_altitude_targets(&prev, &curr);
    self.announce_position_to_controller(net);
    self.prev_speed = 0.0;
  }

  /// Have we entered the catch radius of the current waypoint — or
  /// passed it?
  fn lead_point_reached(&mut self, curr: &Waypoint) -> bool {
    let dist_to_go_m = self.plan.distance_to_go_m(self.pos, curr);
    let mut lead_m = self.plan.lead_distance_ft() * FEET_TO_METERS;
    let arrival_dist_m = (10.0 * curr.speed_kts).abs();

    // Roll gently to a stop at the end of a pushback.
    if dist_to_go_m < arrival_dist_m
      && self.speed_kts < 0.0
      && self.target.speed_kts < 0.0
      && curr.contains("PushBackPoint")
    {
      let ramp = (arrival_dist_m.powi(2)
        - (arrival_dist_m - dist_to_go_m).powi(2))
      .max(0.0)
      .sqrt();
      self.target.speed_kts = (-ramp).min(-1.0);

      if let Some(prev) = self.plan.previous_waypoint_mut() {
        if prev.speed_kts < self.target.speed_kts {
          prev.speed_kts = self.target.speed_kts;
        }
      }
    }

    // And at the parking at the end of it all.
    if dist_to_go_m < arrival_dist_m
      && self.speed_kts > 0.0
      && self.target.speed_kts > 0.0
      && curr.contains("END")
    {
      self.target.speed_kts = (dist_to_go_m / 10.0).max(1.0);
      if let Some(prev) = self.plan.previous_waypoint_mut() {
        if prev.speed_kts < self.target.speed_kts {
          prev.speed_kts = self.target.speed_kts;
        }
      }
    }

    // Never let the catch radius shrink below what one tick covers, or
    // waypoints get skipped outright.
    let floor_m = (2.0 * self.speed_kts).abs() * FEET_TO_METERS;
    if lead_m < floor_m {
      lead_m = floor_m;
      self.plan.set_lead_distance_ft(lead_m * METERS_TO_FEET);
    }

    // Widen it ahead of sharp ground turns.
    if curr.on_ground && self.plan.next_turn_angle().abs() > 50.0 {
      lead_m = (4.0 * self.speed_kts).abs() * FEET_TO_METERS;
      self.plan.set_lead_distance_ft(lead_m * METERS_TO_FEET);
    }

    let bearing_to_curr = FlightPlan::bearing_to(self.pos, curr);
    let rel_bearing =
      normalize_periodic(-180.0, 180.0, self.heading - bearing_to_curr)
        .abs();
    if rel_bearing < self.min_bearing {
      self.min_bearing = rel_bearing.max(10.0);
    }

    // Reached: inside the catch radius, or demonstrably receding from a
    // waypoint we were closing on (we passed it).
    if dist_to_go_m < lead_m
      || (dist_to_go_m > self.prev_dist_to_go
        && rel_bearing > self.min_bearing * 1.1)
    {
      self.min_bearing = 360.0;
      self.prev_dist_to_go = f64::MAX;
      return true;
    }

    if self.prev_dist_to_go == dist_to_go_m
      && self.target.speed_kts.abs() > 0.0
    {
      self.stuck_counter += 1;
      if self.stuck_counter > STUCK_LIMIT {
        tracing::warn!(
          "{} stuck on leg {:?}, removing",
          self.callsign,
          self.plan.leg
        );
        self.dead = true;
      }
    } else {
      self.stuck_counter = 0;
    }
    self.prev_dist_to_go = dist_to_go_m;
    false
  }

  /// Chase the bearing of the current waypoint, averaged with the next
  /// one when moving forward so turns are cut smoothly.
  fn control_heading(&mut self, curr: &Waypoint) {
    let raw_bearing = FlightPlan::bearing_to(self.pos, curr);
    let calc_bearing = if self.speed_kts < 0.0 {
      normalize_periodic(0.0, 360.0, raw_bearing + 180.0)
    } else {
      raw_bearing
    };

    if !calc_bearing.is_finite() {
      tracing::warn!(
        "{} non-finite bearing towards {} at ({:.4}, {:.4})",
        self.callsign,
        curr.name,
        curr.pos.lat,
        curr.pos.lon
      );
      return;
    }

    let next = self.plan.next_waypoint();
    if let (Some(next), true) = (next, self.speed_kts > 0.0) {
      let next_bearing = FlightPlan::bearing_to(self.pos, next);
      if next_bearing.is_finite() {
        let average = normalize_periodic(
          0.0,
          360.0,
          calc_bearing + (next_bearing - calc_bearing) / 2.0,
        );
        if (average - self.target.heading).abs() > 0.01 {
          self.target.heading = average;
        }
        return;
      }
      tracing::warn!(
        "{} non-finite bearing towards {}",
        self.callsign,
        next.name
      );
    }

    if (calc_bearing - self.target.heading).abs() > 0.01 {
      self.target.heading = calc_bearing;
    }
  }

  /// Re-derives the lead distance when the speed has moved far enough to
  /// invalidate the turn-radius estimate it was computed from.
  fn control_speed(&mut self, curr: &Waypoint) {
    let speed_diff = self.speed_kts - self.prev_speed;
    if speed_diff.abs() <= 10.0 {
      return;
    }

    self.prev_speed = self.speed_kts;
    if self.plan.next_waypoint().is_none()
      || curr.contains("END")
      || curr.contains("PushBackPointlegend")
    {
      return;
    }

    if speed_diff > 0.0 && self.target.speed_kts >= 5.0 {
      self
        .plan
        .set_lead_distance(self.speed_kts, self.target.heading);
    } else {
      self
        .plan
        .set_lead_distance(self.target.speed_kts, self.target.heading);
    }
  }

  /// Vertical speed to cross `vert_ft` of altitude over `dist_m` of
  /// ground at the given speed, in feet per minute.
  fn calc_vertical_speed_fpm(
    vert_ft: f64,
    dist_m: f64,
    speed_kts: f64,
  ) -> f64 {
    if dist_m == 0.0 {
      return 0.0;
    }
    let vert_m = vert_ft * FEET_TO_METERS;
    let speed_mps = speed_kts * KNOT_TO_MPS;
    (vert_m / dist_m) * speed_mps * METERS_TO_FEET * 60.0
  }

  /// Altitude and climb-rate targets for the leg just entered, from the
  /// crossing restrictions of the waypoints around it.
  fn update_altitude_targets(&mut self, prev: &Waypoint, curr: &Waypoint) {
    if prev.in_air() && curr.in_air() {
      if curr.has_crossat() {
        // Fully airborne leg with a restriction: meet it at the fix.
        self.use_perf_vs = false;
        let dist_m = self.plan.distance_to_go_m(self.pos, curr);
        self.target.vs_fpm = Self::calc_vertical_speed_fpm(
          curr.crossat_ft - self.altitude_ft,
          dist_m,
          self.speed_kts,
        );
        self.target.altitude_ft = curr.crossat_ft;
      } else {
        self.use_perf_vs = true;
        self.target.altitude_ft = curr.pos.elev_ft;
      }
    } else if curr.in_air() {
      // Takeoff leg.
      if curr.has_crossat() {
        self.use_perf_vs = false;
        let dist_m = self.plan.distance_to_go_m(self.pos, curr);
        self.target.vs_fpm = Self::calc_vertical_speed_fpm(
          curr.crossat_ft - self.altitude_ft,
          dist_m,
          self.speed_kts,
        );
        self.target.altitude_ft = curr.crossat_ft;
      } else {
        self.use_perf_vs = true;
        self.target.altitude_ft = curr.pos.elev_ft;
      }
    } else if prev.in_air() {
      // Landing leg: touch down on the point, not short of it.
      self.use_perf_vs = false;
      let dist_m = self.plan.distance_to_go_m(self.pos, curr);
      self.target.vs_fpm = Self::calc_vertical_speed_fpm(
        curr.pos.elev_ft - self.altitude_ft,
        dist_m,
        self.speed_kts,
      );
      self.target.altitude_ft = curr.pos.elev_ft;
    } else {
      // Staying on the ground.
      self.use_perf_vs = true;
      self.target.altitude_ft = curr.pos.elev_ft;
      self.target.vs_fpm = 0.0;
    }
  }

  /// Side effects of the marker waypoints that structure a ground
  /// route.
  fn handle_leg_markers(
    &mut self,
    prev: &Waypoint,
    now: f64,
    net: &mut AtcNetwork,
  ) {
    if prev.contains("PushBackPoint") {
      // Past the pushback point: the gate is free for the next user.
      tracing::debug!("{} released parking", self.callsign);
      self.plan.parking = None;
      self.target.speed_kts = 0.0;
    }

    if prev.contains("legend") {
      self.plan.increment_leg();
    }

    if prev.contains("DepartureHold") {
      // Report the hold-short point to ground, then get in line with
      // the tower for departure.
      if let Some((airport, ControllerRole::Ground)) = self.controller {
        if let Some(atc) = net.airport_mut(airport) {
          atc.ground.report_runway_hold_short(self.id);
        }
      }
    }

    if prev.contains("END") {
      // Parked: wait out the turnaround before the next departure.
      let mut next_departure = self.scheduled_departure;
      if next_departure < now + MIN_TURNAROUND_S {
        next_departure = now + MIN_TURNAROUND_S;
      }
      self.plan.set_time(next_departure);
    }
  }

  fn announcement(&self) -> Announcement {
    // The route segments we still intend to occupy, for the
    // controller's conflict checks.
    let intentions = self
      .plan
      .waypoints()
      .iter()
      .map(|w| w.route_index)
      .filter(|route| *route > 0)
      .collect();

    Announcement {
      id: self.id,
      callsign: self.callsign,
      runway: self.plan.runway,
      route_index: self
        .plan
        .current_waypoint()
        .map(|w| w.route_index)
        .unwrap_or(0),
      intentions,
      pos: self.pos,
      heading: self.heading,
      speed_kts: self.speed_kts,
      altitude_ft: self.altitude_ft,
      radius_m: self.radius_m,
      leg: self.plan.leg,
      scheduled_departure: self.scheduled_departure,
    }
  }

  /// Registers with whichever controller owns the current leg, signing
  /// off from the previous one on a hand-off.
  fn announce_position_to_controller(&mut self, net: &mut AtcNetwork) {
    let target = role_for_leg(self.plan.leg).and_then(|(role, side)| {
      let airport = match side {
        AirportSide::Departure => self.plan.departure,
        AirportSide::Arrival => self.plan.arrival,
      };
      airport.map(|airport| (airport, role))
    });

    if target != self.controller {
      if let Some((airport, role)) = self.controller.take() {
        if let Some(ctl) = net.controller_mut(airport, role) {
          ctl.sign_off(self.id);
        }
      }
    }
    self.controller = target;

    if let Some((airport, role)) = self.controller {
      if let Some(ctl) = net.controller_mut(airport, role) {
        ctl.announce_position(self.announcement());
      }
    }
  }

  /// Refreshes the controller's picture of us and applies whatever it
  /// has to say.
  fn handle_atc(&mut self, dt: f64, now: f64, net: &mut AtcNetwork) {
    let Some((airport, role)) = self.controller else {
      return;
    };
    let Some(ctl) = net.controller_mut(airport, role) else {
      return;
    };

    ctl.update_aircraft_information(
      self.id,
      self.pos,
      self.heading,
      self.speed_kts,
      self.altitude_ft,
      dt,
      now,
    );

    if ctl.has_instruction(self.id) {
      let instruction = ctl.get_instruction(self.id);
      self.process_atc(&instruction);
    } else if self.hold_pos {
      // The hold was lifted; resume the planned speed.
      self.process_atc(&Instruction::default());
    }
  }

  fn process_atc(&mut self, instruction: &Instruction) {
    if instruction.resolve_circular_wait {
      // Deadlocked traffic is taken out of the scene rather than left
      // blocking everyone behind it.
      self.dead = true;
      return;
    }

    if instruction.hold_position {
      self.hold_pos = true;
      self.target.speed_kts = 0.0;
    } else {
      self.hold_pos = false;
      if instruction.change_speed {
        self.target.speed_kts = instruction.speed_kts;
      } else if let Some(prev) = self.plan.previous_waypoint() {
        self.target.speed_kts = prev.speed_kts;
      }
    }

    if instruction.change_heading {
      self.target.heading = instruction.heading;
    }
    if instruction.change_altitude {
      self.target.altitude_ft = instruction.alt_ft;
    }
  }

  /// Integrates the actual state towards the targets with the vehicle
  /// kind's dynamics, then moves the vehicle.
  fn update_actual_state(&mut self, dt: f64) {
    match &mut self.kind {
      VehicleKind::Aircraft(perf) => {
        let turn_step = perf.turn_rate_dps * dt;
        let delta = normalize_periodic(
          -180.0,
          180.0,
          self.target.heading - self.heading,
        );
        if delta.abs() < turn_step {
          self.heading = self.target.heading;
        } else {
          self.heading += turn_step * delta.signum();
        }

        let accel_step = if self.discrete.on_ground {
          perf.decel_ground_kts_s * dt
        } else {
          perf.accel_kts_s * dt
        };
        let speed_delta = self.target.speed_kts - self.speed_kts;
        if speed_delta.abs() < accel_step {
          self.speed_kts = self.target.speed_kts;
        } else {
          self.speed_kts += accel_step * speed_delta.signum();
        }

        let vs_fpm = if self.use_perf_vs {
          if self.target.altitude_ft >= self.altitude_ft {
            perf.climb_fpm
          } else {
            -perf.descent_fpm
          }
        } else {
          self.target.vs_fpm
        };
        let alt_step = (vs_fpm / 60.0).abs() * dt;
        let alt_delta = self.target.altitude_ft - self.altitude_ft;
        if alt_delta.abs() < alt_step {
          self.altitude_ft = self.target.altitude_ft;
        } else {
          self.altitude_ft += alt_step * alt_delta.signum();
        }
      }

      VehicleKind::Ship(ship) => {
        let error = normalize_periodic(
          -180.0,
          180.0,
          self.target.heading - self.heading,
        );
        let rate_dps = ship.steer(error, dt);
        self.heading += rate_dps * dt;
        self.speed_kts = lowpass(
          self.speed_kts,
          self.target.speed_kts,
          ship.speed_constant * dt,
        );
        self.altitude_ft = 0.0;
      }

      VehicleKind::GroundVehicle(gv) => {
        let error = normalize_periodic(
          -180.0,
          180.0,
          self.target.heading - self.heading,
        );
        gv.follow_tow_angle(error, dt);
        self.heading += gv.tow_angle_deg * dt;
        self.speed_kts = lowpass(
          self.speed_kts,
          self.target.speed_kts,
          gv.speed_coeff * dt,
        );
        gv.follow_elevation(self.target.altitude_ft, dt);
        self.altitude_ft = gv.elevation_ft;
      }
    }

    self.heading = normalize_periodic(0.0, 360.0, self.heading);

    let dist_m = self.speed_kts * KNOT_TO_MPS * dt;
    let course = if dist_m >= 0.0 {
      self.heading
    } else {
      normalize_periodic(0.0, 360.0, self.heading + 180.0)
    };
    self.pos = geometry::direct(self.pos, course, dist_m.abs());
    self.pos.elev_ft = self.altitude_ft;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    TAXI_SPEED_KTS,
    entities::vehicle::Performance,
    geometry::direct,
  };

  fn intern(s: &str) -> Intern<String> {
    Intern::from_ref(s)
  }

  fn taxi_plan(names: &[&str]) -> FlightPlan {
    let origin = Geod::from_deg(51.0, 9.0);
    let mut plan = FlightPlan::new();
    for (i, name) in names.iter().enumerate() {
      let mut wpt = Waypoint::new(
        *name,
        direct(origin, 90.0, 120.0 * i as f64),
        TAXI_SPEED_KTS,
      );
      wpt.on_ground = true;
      wpt.gear_down = true;
      wpt.finished = *name == "END";
      plan.push_back_waypoint(wpt);
    }
    plan
  }

  fn agent_with_plan(plan: FlightPlan) -> TrafficAgent {
    TrafficAgent::new(
      1,
      intern("TST0001"),
      VehicleKind::Aircraft(Performance::jetliner()),
      plan,
    )
  }

  #[test]
  fn empty_plan_does_not_crash() {
    let mut net = AtcNetwork::new();
    let mut agent = agent_with_plan(FlightPlan::new());

    agent.update(0.1, 0.0, &mut net);
    assert!(agent.is_dead());
  }

  #[test]
  fn invalid_plan_is_never_flown() {
    let mut net = AtcNetwork::new();
    let mut agent = agent_with_plan(FlightPlan::dummy());
    agent.speed_kts = 0.0;

    for i in 0..50 {
      agent.update(0.1, i as f64 * 0.1, &mut net);
    }
    assert!(!agent.is_dead());
    assert_eq!(agent.target.speed_kts, 0.0);
  }

  #[test]
  fn first_waypoint_initializes_pose() {
    let mut net = AtcNetwork::new();
    let plan = taxi_plan(&["A", "B", "C", "END"]);
    let first_pos = plan.current_waypoint().unwrap().pos;
    let mut agent = agent_with_plan(plan);

    agent.update(0.1, 0.0, &mut net);

    assert!(
      geometry::distance_m(agent.pos, first_pos) < 2.0,
      "agent snaps to the first waypoint"
    );
    // Facing east along the line of waypoints.
    assert!((agent.heading - 90.0).abs() < 1.0);
  }

  #[test]
  fn drives_the_whole_route_and_expires() {
    let mut net = AtcNetwork::new();
    let mut agent = agent_with_plan(taxi_plan(&["A", "B", "C", "END"]));

    let mut now = 0.0;
    for _ in 0..4000 {
      agent.update(0.5, now, &mut net);
      now += 0.5;
      if agent.is_dead() {
        break;
      }
    }

    assert!(agent.is_dead(), "route flown to END and agent retired");
  }

  #[test]
  fn cursor_advances_on_lead_point() {
    let mut net = AtcNetwork::new();
    let mut agent = agent_with_plan(taxi_plan(&["A", "B", "C", "END"]));

    agent.update(0.5, 0.0, &mut net);
    let before = agent.plan.current_waypoint().unwrap().name.clone();

    // Teleport to just short of the current waypoint; the next tick
    // must advance the cursor.
    let curr_pos = agent.plan.current_waypoint().unwrap().pos;
    agent.pos = direct(curr_pos, 270.0, 1.0);
    agent.update(0.5, 1.0, &mut net);

    let after = agent.plan.current_waypoint().unwrap().name.clone();
    assert_ne!(before, after);
  }

  #[test]
  fn pushback_reverses_heading() {
    let origin = Geod::from_deg(51.0, 9.0);
    let mut plan = FlightPlan::new();
    for (i, name) in ["G1", "PushBack1", "PushBackPoint"].iter().enumerate()
    {
      let mut wpt =
        Waypoint::new(*name, direct(origin, 180.0, 40.0 * i as f64), -5.0);
      wpt.on_ground = true;
      plan.push_back_waypoint(wpt);
    }

    let mut net = AtcNetwork::new();
    let mut agent = agent_with_plan(plan);
    agent.update(0.1, 0.0, &mut net);

    // Waypoints run south while the nose points north: reversing.
    assert!((agent.heading - 0.0).abs() < 1.0);
    assert!(agent.target.speed_kts < 0.0);
  }

  #[test]
  fn hold_instruction_stops_the_vehicle() {
    let mut agent = agent_with_plan(taxi_plan(&["A", "B", "C", "END"]));
    agent.target.speed_kts = 15.0;

    let hold = Instruction {
      hold_position: true,
      ..Instruction::default()
    };
    agent.process_atc(&hold);
    assert_eq!(agent.target.speed_kts, 0.0);

    let release = Instruction::default();
    agent.process_atc(&release);
    assert!(!agent.hold_pos);
  }

  #[test]
  fn circular_wait_resolution_removes_the_agent() {
    let mut agent = agent_with_plan(taxi_plan(&["A", "B", "END"]));
    let resolve = Instruction {
      resolve_circular_wait: true,
      ..Instruction::default()
    };
    agent.process_atc(&resolve);
    assert!(agent.is_dead());
  }

  #[test]
  fn nan_waypoint_does_not_poison_targets() {
    let mut net = AtcNetwork::new();
    let mut agent = agent_with_plan(taxi_plan(&["A", "B", "C", "END"]));
    agent.update(0.1, 0.0, &mut net);
    let target_before = agent.target.heading;

    let bad = Waypoint::new("bad", Geod::from_deg(f64::NAN, 9.0), 15.0);
    agent.control_heading(&bad);

    assert_eq!(agent.target.heading, target_before);
    assert!(agent.target.heading.is_finite());
  }

  #[test]
  fn vertical_speed_targets_the_crossing_altitude() {
    let vs = TrafficAgent::calc_vertical_speed_fpm(3000.0, 20000.0, 250.0);
    assert!(vs > 0.0);

    let down = TrafficAgent::calc_vertical_speed_fpm(-3000.0, 20000.0, 250.0);
    assert!(down < 0.0);

    assert_eq!(TrafficAgent::calc_vertical_speed_fpm(500.0, 0.0, 250.0), 0.0);
  }

  mod atc_wiring {
    use super::*;
    use crate::atc::Controller;

    #[test]
    fn agent_announces_to_ground_on_taxi_legs() {
      let mut net = AtcNetwork::new();
      net.add_airport(intern("EDDT"));

      let mut plan = taxi_plan(&["A", "B", "C", "END"]);
      plan.departure = Some(intern("EDDT"));
      plan.leg = Leg::Taxi;

      let mut agent = agent_with_plan(plan);
      agent.update(0.1, 0.0, &mut net);

      let atc = net.airport_mut(intern("EDDT")).unwrap();
      assert_eq!(atc.ground.active_traffic(), 1);
      assert!(atc.ground.has_instruction(1));
    }

    #[test]
    fn kill_signs_off_synchronously() {
      let mut net = AtcNetwork::new();
      net.add_airport(intern("EDDT"));

      let mut plan = taxi_plan(&["A", "B", "C", "END"]);
      plan.departure = Some(intern("EDDT"));
      plan.leg = Leg::Taxi;

      let mut agent = agent_with_plan(plan);
      agent.update(0.1, 0.0, &mut net);
      agent.kill(&mut net);

      let atc = net.airport_mut(intern("EDDT")).unwrap();
      assert_eq!(atc.ground.active_traffic(), 0);
      assert!(agent.is_dead());
    }
  }
}
