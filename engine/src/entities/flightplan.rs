use internment::Intern;
use serde::{Deserialize, Serialize};

use crate::{
  METERS_TO_FEET, STATIONARY_SPEED_KTS,
  entities::waypoint::Waypoint,
  geometry::{self, Geod},
  synth::{LegContext, WaypointGenerator},
};

/// Lead distances beyond this are almost always a geometry bug upstream,
/// not a genuine long lead-in. Kept as tuned; do not "correct".
pub const LEAD_DISTANCE_SUSPICIOUS_FT: f64 = 1000.0;

/// Aircraft reaching `END` at a parking wait at least this long before the
/// next departure, to keep them from immediately taxiing out again.
pub const MIN_TURNAROUND_S: f64 = 1200.0;

/// The phase of a flight a plan's waypoints currently describe. Stored as
/// a tag only; transitions are driven by the traffic scheduler and the
/// leg-end markers, never from inside the plan.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Leg {
  #[default]
  StartupPushback,
  Taxi,
  Takeoff,
  Climb,
  Cruise,
  Descent,
  Approach,
  Landing,
  LandingTaxi,
  Parking,
}

impl Leg {
  pub fn next(self) -> Self {
    match self {
      Self::StartupPushback => Self::Taxi,
      Self::Taxi => Self::Takeoff,
      Self::Takeoff => Self::Climb,
      Self::Climb => Self::Cruise,
      Self::Cruise => Self::Descent,
      Self::Descent => Self::Approach,
      Self::Approach => Self::Landing,
      Self::Landing => Self::LandingTaxi,
      Self::LandingTaxi => Self::Parking,
      Self::Parking => Self::StartupPushback,
    }
  }

  pub fn on_ground(self) -> bool {
    matches!(
      self,
      Self::StartupPushback
        | Self::Taxi
        | Self::Takeoff
        | Self::LandingTaxi
        | Self::Parking
    )
  }
}

/// An ordered sequence of owned waypoints with a movable cursor.
///
/// The cursor is a plain index, never a reference into the backing vector:
/// insertions and removals keep it valid by construction, where an
/// iterator would dangle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlightPlan {
  waypoints: Vec<Waypoint>,
  cursor: usize,

  pub leg: Leg,
  pub valid: bool,
  pub repeat: bool,

  pub departure: Option<Intern<String>>,
  pub arrival: Option<Intern<String>>,
  pub runway: Option<Intern<String>>,
  pub parking: Option<Intern<String>>,

  pub start_time: f64,
  pub arrival_time: f64,

  lead_distance_ft: f64,
  lead_in_angle: f64,
  next_turn_angle: f64,
}

impl FlightPlan {
  pub fn new() -> Self {
    Self {
      valid: true,
      ..Self::default()
    }
  }

  /// An intentionally unusable plan, for vehicles that shadow an
  /// externally controlled aircraft.
  pub fn dummy() -> Self {
    Self {
      valid: false,
      ..Self::default()
    }
  }

  pub fn empty(&self) -> bool {
    self.waypoints.is_empty()
  }

  pub fn len(&self) -> usize {
    self.waypoints.len()
  }

  pub fn is_empty(&self) -> bool {
    self.waypoints.is_empty()
  }

  /// A plan only becomes active once the simulation clock passes its
  /// start time.
  pub fn is_active(&self, now: f64) -> bool {
    self.valid && now >= self.start_time
  }

  pub fn set_time(&mut self, start_time: f64) {
    self.start_time = start_time;
  }

  pub fn increment_leg(&mut self) {
    self.leg = self.leg.next();
  }

  // Cursor queries. All of these return `None` at the respective
  // boundary; none of them panic.

  pub fn current_waypoint(&self) -> Option<&Waypoint> {
    self.waypoints.get(self.cursor)
  }

  pub fn next_waypoint(&self) -> Option<&Waypoint> {
    if self.cursor + 1 >= self.waypoints.len() {
      None
    } else {
      self.waypoints.get(self.cursor + 1)
    }
  }

  pub fn previous_waypoint(&self) -> Option<&Waypoint> {
    if self.cursor == 0 {
      None
    } else {
      self.waypoints.get(self.cursor - 1)
    }
  }

  pub fn previous_waypoint_mut(&mut self) -> Option<&mut Waypoint> {
    if self.cursor == 0 {
      None
    } else {
      self.waypoints.get_mut(self.cursor - 1)
    }
  }

  pub fn last_waypoint(&self) -> Option<&Waypoint> {
    self.waypoints.last()
  }

  pub fn last_waypoint_mut(&mut self) -> Option<&mut Waypoint> {
    self.waypoints.last_mut()
  }

  pub fn waypoints(&self) -> &[Waypoint] {
    &self.waypoints
  }

  pub fn route_index(&self, i: usize) -> usize {
    if i > 0 && i < self.waypoints.len() {
      self.waypoints[i].route_index
    } else {
      0
    }
  }

  /// Advances the cursor by one. With `erase`, the waypoint that was
  /// behind the cursor is removed and destroyed instead of merely passed
  /// over, keeping memory bounded on long taxi routes.
  ///
  /// After advancing, the upcoming turn angle is recomputed whenever
  /// prev/current/next all exist.
  pub fn increment_waypoint(&mut self, erase: bool) {
    if self.waypoints.is_empty() {
      return;
    }

    if erase {
      if self.cursor == 0 {
        self.cursor += 1;
      } else {
        self.waypoints.remove(0);
        self.cursor = 1;
      }
    } else {
      self.cursor += 1;
    }
    self.cursor = self.cursor.min(self.waypoints.len());

    if self.waypoints.len() < 3
      || self.cursor == 0
      || self.cursor + 1 >= self.waypoints.len()
    {
      return;
    }

    let prev = &self.waypoints[self.cursor - 1];
    let curr = &self.waypoints[self.cursor];
    let next = &self.waypoints[self.cursor + 1];

    let current_bearing = geometry::course_deg(prev.pos, curr.pos);
    let next_bearing = geometry::course_deg(curr.pos, next.pos);

    let mut turn = geometry::normalize_periodic(
      -180.0,
      180.0,
      next_bearing - current_bearing,
    );

    // A sign flip in speed across this waypoint is a direction reversal
    // (pushback ending), not a tight turn.
    if (prev.speed_kts > 0.0 && next.speed_kts < 0.0)
      || (prev.speed_kts < 0.0 && next.speed_kts > 0.0)
    {
      turn += 180.0;
      tracing::trace!("adding 180 to turn angle at pushback end");
    }

    self.next_turn_angle = turn;
    tracing::trace!(
      "next turn angle {turn:.1} at {} (prev speed {}, next speed {})",
      curr.name,
      prev.speed_kts,
      next.speed_kts
    );
  }

  /// Moves the cursor back one step. Precondition: the cursor is not at
  /// the first waypoint; at the first waypoint this is a logged no-op.
  pub fn decrement_waypoint(&mut self) {
    if self.waypoints.is_empty() {
      return;
    }
    if self.cursor == 0 {
      tracing::debug!("decrement at first waypoint ignored");
      return;
    }
    self.cursor -= 1;
  }

  /// Appends a waypoint, dropping it when it sits at zero great-circle
  /// distance from the current last waypoint. Zero-length segments feed
  /// singular values into the lead-distance and turn-angle math, so this
  /// rejection is load-bearing.
  pub fn push_back_waypoint(&mut self, mut wpt: Waypoint) {
    if let Some(last) = self.waypoints.last() {
      let dist = geometry::distance_m(last.pos, wpt.pos);
      if dist == 0.0 {
        tracing::debug!("duplicate waypoint {} not added", wpt.name);
        return;
      }
      wpt.track_length_m = dist;
    }

    tracing::trace!(
      "added waypoint {} at ({:.6}, {:.6}) speed {}",
      wpt.name,
      wpt.pos.lat,
      wpt.pos.lon,
      wpt.speed_kts
    );
    self.waypoints.push(wpt);
  }

  pub fn add_waypoint(&mut self, wpt: Waypoint) {
    self.push_back_waypoint(wpt);
  }

  pub fn erase_last_waypoint(&mut self) {
    if self.waypoints.is_empty() {
      return;
    }
    self.waypoints.pop();
    self.cursor = 1.min(self.waypoints.len());
  }

  pub fn clear_waypoints(&mut self) {
    self.waypoints.clear();
    self.cursor = 0;
  }

  /// Destroys all waypoints except the last, which is recycled as the
  /// first waypoint of the next leg so that consecutive legs join without
  /// a discontinuity. Restrictions, lighting and the on-ground flag
  /// survive the recycling; the finished flag does not.
  pub fn reset_waypoints(&mut self) {
    let Some(last) = self.waypoints.last() else {
      return;
    };

    let recycled = Waypoint {
      name: last.name.clone(),
      pos: last.pos,
      crossat_ft: last.crossat_ft,
      gear_down: last.gear_down,
      flaps: last.flaps,
      spoilers: last.spoilers,
      speedbrakes: last.speedbrakes,
      beacon_light: last.beacon_light,
      cabin_lights: last.cabin_lights,
      landing_light: last.landing_light,
      nav_lights: last.nav_lights,
      strobe_light: last.strobe_light,
      taxi_lights: last.taxi_lights,
      on_ground: last.on_ground,
      finished: false,
      ..Waypoint::default()
    };

    tracing::debug!("recycling waypoint {}", recycled.name);
    self.clear_waypoints();
    self.push_back_waypoint(recycled);
  }

  /// Truncates the plan to its first `number + 3` waypoints and tags the
  /// new last waypoint's name with `suffix` so the truncation point shows
  /// up in diagnostics.
  pub fn shorten_to_first(&mut self, number: usize, suffix: &str) {
    while self.waypoints.len() > number + 3 {
      self.erase_last_waypoint();
    }
    if let Some(last) = self.waypoints.last_mut() {
      last.name.push_str(suffix);
    }
  }

  /// Starts the plan over from the beginning.
  pub fn restart(&mut self) {
    self.cursor = 0;
  }

  pub fn next_turn_angle(&self) -> f64 {
    self.next_turn_angle
  }

  pub fn lead_distance_ft(&self) -> f64 {
    self.lead_distance_ft
  }

  pub fn lead_in_angle(&self) -> f64 {
    self.lead_in_angle
  }

  /// Distance in meters from an arbitrary position to a waypoint.
  pub fn distance_to_go_m(&self, pos: Geod, wpt: &Waypoint) -> f64 {
    geometry::distance_m(pos, wpt.pos)
  }

  /// Great-circle course between two waypoints, in degrees.
  pub fn bearing(a: &Waypoint, b: &Waypoint) -> f64 {
    geometry::course_deg(a.pos, b.pos)
  }

  /// Great-circle course from a position to a waypoint, in degrees.
  pub fn bearing_to(pos: Geod, wpt: &Waypoint) -> f64 {
    geometry::course_deg(pos, wpt.pos)
  }

  pub fn set_lead_distance_ft(&mut self, distance_ft: f64) {
    self.lead_distance_ft = distance_ft.max(0.0);
    if self.lead_distance_ft > 10000.0 {
      tracing::trace!("excessive lead distance {distance_ft}");
    }
  }

  /// Computes the catch radius around the current waypoint at which the
  /// agent should consider it reached, from the current travel bearing
  /// and the estimated turn radius at `speed_kts`.
  pub fn set_lead_distance(&mut self, speed_kts: f64, bearing_deg: f64) {
    let (curr_name, curr_pos, next_pos) =
      match (self.current_waypoint(), self.next_waypoint()) {
        (Some(curr), Some(next)) => {
          (curr.name.clone(), curr.pos, next.pos)
        }
        _ => return,
      };

    // Near-stationary: advance practically on arrival.
    if speed_kts.abs() < STATIONARY_SPEED_KTS {
      self.set_lead_distance_ft(0.5);
      return;
    }

    let turn_radius_m =
      geometry::turn_radius_m(speed_kts, speed_kts >= 25.0);

    // `bearing_deg` is the nose heading; when reversing, the direction
    // of travel is the reciprocal.
    let inbound = if speed_kts < 0.0 {
      geometry::normalize_periodic(0.0, 360.0, bearing_deg + 180.0)
    } else {
      bearing_deg
    };
    let outbound = geometry::course_deg(curr_pos, next_pos);
    let mut lead_in_angle = (inbound - outbound).abs();
    if lead_in_angle > 180.0 {
      lead_in_angle = 360.0 - lead_in_angle;
    }
    self.lead_in_angle = lead_in_angle;

    if lead_in_angle < 1.0 {
      // Straight through: the tangent formula degenerates, use a small
      // speed-proportional radius instead.
      let lead_ft = (2.0 * speed_kts).abs();
      self.set_lead_distance_ft(lead_ft);
      if self.lead_distance_ft > LEAD_DISTANCE_SUSPICIOUS_FT {
        tracing::warn!(
          "excessive lead distance {lead_ft:.0}ft on straight segment, \
           inbound {inbound:.1} outbound {outbound:.1}"
        );
      }
    } else {
      let lead_m =
        turn_radius_m * (lead_in_angle.to_radians() / 2.0).tan();
      let lead_ft = lead_m * METERS_TO_FEET;
      self.set_lead_distance_ft(lead_ft);
      tracing::trace!(
        "lead distance {lead_m:.1}m, turn radius {turn_radius_m:.1}m, \
         half angle {:.1}",
        lead_in_angle / 2.0
      );
      if self.lead_distance_ft > LEAD_DISTANCE_SUSPICIOUS_FT {
        tracing::warn!(
          "excessive lead distance {lead_ft:.0}ft, possible direction \
           change at {curr_name}: lead-in {lead_in_angle:.1} inbound \
           {inbound:.1} outbound {outbound:.1}"
        );
      }
    }
  }

  /// Sums the cached segment lengths of the run of waypoints whose names
  /// contain `target`, starting past the in-progress waypoint. Returns 0
  /// when the run never ends before the plan does ("not found").
  pub fn check_track_length(&self, target: &str) -> f64 {
    // Skip the waypoint behind us and the one currently in progress.
    let mut track_distance = 0.0;
    let mut idx = self.cursor + 1;

    while idx < self.waypoints.len() {
      if !self.waypoints[idx].contains(target) {
        break;
      }
      track_distance += self.waypoints[idx].track_length_m;
      idx += 1;
    }

    if idx >= self.waypoints.len() {
      track_distance = 0.0;
    }
    track_distance
  }

  /// Appends the waypoints of one leg through the given generator. The
  /// last waypoint produced is tagged `legend` so the agent can detect
  /// the leg boundary as it passes it.
  pub fn create_leg(
    &mut self,
    leg: Leg,
    ctx: &LegContext,
    generator: &dyn WaypointGenerator,
  ) -> bool {
    tracing::debug!(
      "creating leg {leg:?} at {}",
      if leg.on_ground() && !matches!(leg, Leg::LandingTaxi | Leg::Parking)
      {
        ctx.departure.id
      } else {
        ctx.arrival.id
      }
    );

    let cursor = self.cursor;
    let ok = generator.generate(self, leg, ctx);
    if ok {
      if self.waypoints.is_empty() {
        tracing::warn!("leg {leg:?} created no waypoints");
        return ok;
      }
      self.cursor = cursor;
      self.leg = leg;
      if let Some(last) = self.waypoints.last_mut() {
        if last.name.is_empty() {
          tracing::warn!("empty waypoint name at end of leg {leg:?}");
        }
        last.name.push_str("legend");
      }
    }
    ok
  }

  /// Synthesizes a plan for a traffic-schedule entry: picks the current
  /// leg phase from the elapsed time since the scheduled start, then
  /// delegates waypoint generation to the per-leg strategy.
  pub fn synthesize(
    now: f64,
    ctx: &LegContext,
    generator: &dyn WaypointGenerator,
  ) -> Self {
    let mut plan = Self::new();
    plan.departure = Some(ctx.departure.id);
    plan.arrival = Some(ctx.arrival.id);
    plan.parking = ctx.parking;
    plan.runway = ctx.runway;
    plan.start_time = ctx.start_time;

    let leg =
      crate::synth::select_leg(now - ctx.start_time, ctx.remaining_time);
    tracing::debug!(
      "route from {} to {}, leg {leg:?}, remaining {}s",
      ctx.departure.id,
      ctx.arrival.id,
      ctx.remaining_time
    );

    plan.valid = plan.create_leg(leg, ctx, generator);
    plan.restart();
    plan
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::geometry::{direct, distance_m};

  fn wpt(name: &str, pos: Geod, speed: f64) -> Waypoint {
    Waypoint::new(name, pos, speed)
  }

  fn line_of_waypoints(n: usize, spacing_m: f64) -> FlightPlan {
    let mut plan = FlightPlan::new();
    let origin = Geod::from_deg(51.0, 9.0);
    for i in 0..n {
      plan.push_back_waypoint(wpt(
        &format!("W{i}"),
        direct(origin, 90.0, spacing_m * i as f64),
        15.0,
      ));
    }
    plan
  }

  mod cursor {
    use super::*;

    #[test]
    fn boundaries_return_none() {
      let plan = FlightPlan::new();
      assert!(plan.current_waypoint().is_none());
      assert!(plan.next_waypoint().is_none());
      assert!(plan.previous_waypoint().is_none());
      assert!(plan.last_waypoint().is_none());
    }

    #[test]
    fn walk_to_the_end() {
      let mut plan = line_of_waypoints(3, 500.0);

      assert_eq!(plan.current_waypoint().unwrap().name, "W0");
      assert!(plan.previous_waypoint().is_none());
      assert_eq!(plan.next_waypoint().unwrap().name, "W1");

      plan.increment_waypoint(false);
      assert_eq!(plan.current_waypoint().unwrap().name, "W1");
      assert_eq!(plan.previous_waypoint().unwrap().name, "W0");

      plan.increment_waypoint(false);
      // At the last waypoint: next is exhausted.
      assert_eq!(plan.current_waypoint().unwrap().name, "W2");
      assert!(plan.next_waypoint().is_none());

      plan.increment_waypoint(false);
      assert!(plan.current_waypoint().is_none());
    }

    #[test]
    fn erase_consumed_keeps_cursor_valid() {
      let mut plan = line_of_waypoints(4, 500.0);

      plan.increment_waypoint(true);
      assert_eq!(plan.len(), 4);
      assert_eq!(plan.current_waypoint().unwrap().name, "W1");

      plan.increment_waypoint(true);
      assert_eq!(plan.len(), 3);
      assert_eq!(plan.current_waypoint().unwrap().name, "W2");
      assert_eq!(plan.previous_waypoint().unwrap().name, "W1");
    }

    #[test]
    fn decrement_at_first_is_a_no_op() {
      let mut plan = line_of_waypoints(2, 500.0);
      plan.decrement_waypoint();
      assert_eq!(plan.current_waypoint().unwrap().name, "W0");

      plan.increment_waypoint(false);
      plan.decrement_waypoint();
      assert_eq!(plan.current_waypoint().unwrap().name, "W0");
    }
  }

  mod append {
    use super::*;

    #[test]
    fn duplicate_position_is_dropped() {
      let mut plan = FlightPlan::new();
      let pos = Geod::from_deg(51.0, 9.0);

      plan.push_back_waypoint(wpt("A", pos, 10.0));
      plan.push_back_waypoint(wpt("B", pos, 10.0));
      assert_eq!(plan.len(), 1);

      // Appending the same position any number of times never grows the
      // plan.
      for _ in 0..5 {
        plan.push_back_waypoint(wpt("C", pos, 10.0));
      }
      assert_eq!(plan.len(), 1);
    }

    #[test]
    fn track_length_is_cached_on_append() {
      let origin = Geod::from_deg(51.0, 9.0);
      let next = direct(origin, 90.0, 750.0);

      let mut plan = FlightPlan::new();
      plan.push_back_waypoint(wpt("A", origin, 10.0));
      plan.push_back_waypoint(wpt("B", next, 10.0));

      let cached = plan.last_waypoint().unwrap().track_length_m;
      assert!((cached - distance_m(origin, next)).abs() < 0.001);
    }
  }

  mod turn_angle {
    use super::*;

    #[test]
    fn collinear_waypoints_turn_zero() {
      let mut plan = line_of_waypoints(3, 500.0);
      plan.increment_waypoint(false);
      assert!(plan.next_turn_angle().abs() < 0.1);
    }

    #[test]
    fn right_angle_turn() {
      let origin = Geod::from_deg(51.0, 9.0);
      let mid = direct(origin, 90.0, 500.0);
      let end = direct(mid, 180.0, 500.0);

      let mut plan = FlightPlan::new();
      plan.push_back_waypoint(wpt("A", origin, 15.0));
      plan.push_back_waypoint(wpt("B", mid, 15.0));
      plan.push_back_waypoint(wpt("C", end, 15.0));

      plan.increment_waypoint(false);
      assert!((plan.next_turn_angle() - 90.0).abs() < 0.5);
    }

    #[test]
    fn speed_reversal_adds_180() {
      let origin = Geod::from_deg(51.0, 9.0);
      let mid = direct(origin, 90.0, 500.0);
      let end = direct(mid, 90.0, 500.0);

      let mut plan = FlightPlan::new();
      plan.push_back_waypoint(wpt("PushBackPoint", origin, -5.0));
      plan.push_back_waypoint(wpt("B", mid, -5.0));
      plan.push_back_waypoint(wpt("C", end, 15.0));

      plan.increment_waypoint(false);
      assert!((plan.next_turn_angle() - 180.0).abs() < 0.5);
    }
  }

  mod lead_distance {
    use super::*;

    fn plan_with_turn(turn_deg: f64) -> FlightPlan {
      let origin = Geod::from_deg(51.0, 9.0);
      let mid = direct(origin, 90.0, 2000.0);
      let end = direct(mid, 90.0 + turn_deg, 2000.0);

      let mut plan = FlightPlan::new();
      plan.push_back_waypoint(wpt("A", origin, 100.0));
      plan.push_back_waypoint(wpt("B", mid, 100.0));
      plan.push_back_waypoint(wpt("C", end, 100.0));
      plan
    }

    #[test]
    fn grows_with_speed_for_fixed_geometry() {
      let mut plan = plan_with_turn(60.0);
      plan.increment_waypoint(false);

      let mut previous = 0.0;
      for speed in [30.0, 60.0, 120.0, 240.0] {
        plan.set_lead_distance(speed, 90.0);
        assert!(
          plan.lead_distance_ft() > previous,
          "lead distance must grow with speed"
        );
        previous = plan.lead_distance_ft();
      }
    }

    #[test]
    fn near_stationary_uses_fixed_small_lead() {
      let mut plan = plan_with_turn(60.0);
      plan.increment_waypoint(false);
      plan.set_lead_distance(0.2, 90.0);
      assert_eq!(plan.lead_distance_ft(), 0.5);
    }

    #[test]
    fn straight_through_uses_speed_multiple() {
      let mut plan = plan_with_turn(0.0);
      plan.increment_waypoint(false);
      plan.set_lead_distance(50.0, 90.0);
      assert!((plan.lead_distance_ft() - 100.0).abs() < 1.0);
      assert!(plan.lead_in_angle() < 1.0);
    }

    #[test]
    fn never_negative() {
      let mut plan = plan_with_turn(120.0);
      plan.increment_waypoint(false);
      plan.set_lead_distance(-8.0, 90.0);
      assert!(plan.lead_distance_ft() >= 0.0);
    }
  }

  mod maintenance {
    use super::*;

    #[test]
    fn reset_recycles_last_waypoint() {
      let mut plan = line_of_waypoints(5, 500.0);
      {
        let last = plan.last_waypoint_mut().unwrap();
        last.finished = true;
        last.gear_down = true;
        last.on_ground = true;
        last.set_ground_lights();
      }
      let last_pos = plan.last_waypoint().unwrap().pos;

      plan.reset_waypoints();

      assert_eq!(plan.len(), 1);
      let first = plan.current_waypoint().unwrap();
      assert_eq!(first.name, "W4");
      assert_eq!(first.pos, last_pos);
      assert!(first.gear_down);
      assert!(first.on_ground);
      assert!(first.taxi_lights);
      assert!(!first.finished);
    }

    #[test]
    fn shorten_to_first_tags_the_cut() {
      let mut plan = line_of_waypoints(10, 500.0);
      plan.shorten_to_first(2, "-short");

      assert_eq!(plan.len(), 5);
      assert_eq!(plan.last_waypoint().unwrap().name, "W4-short");
    }
  }

  mod track_length {
    use super::*;

    #[test]
    fn sums_matching_run() {
      let origin = Geod::from_deg(51.0, 9.0);
      let mut plan = FlightPlan::new();
      let names = ["gate", "A_0", "A_1", "A_2", "B_0", "END"];
      for (i, name) in names.iter().enumerate() {
        plan.push_back_waypoint(wpt(
          name,
          direct(origin, 90.0, 100.0 * i as f64),
          15.0,
        ));
      }
      plan.increment_waypoint(false);

      // Cursor at A_0; the summed run is A_1, A_2: two 100m segments.
      let dist = plan.check_track_length("A_");
      assert!((dist - 200.0).abs() < 0.5);
    }

    #[test]
    fn zero_when_name_never_ends() {
      let origin = Geod::from_deg(51.0, 9.0);
      let mut plan = FlightPlan::new();
      for i in 0..4 {
        plan.push_back_waypoint(wpt(
          &format!("A_{i}"),
          direct(origin, 90.0, 100.0 * i as f64),
          15.0,
        ));
      }
      plan.increment_waypoint(false);

      assert_eq!(plan.check_track_length("A_"), 0.0);
    }
  }
}
