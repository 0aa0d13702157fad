use internment::Intern;
use turborand::{SeededCore, TurboRand, rng::Rng};

use crate::{
  atc::{
    Announcement, AtcMessage, AtcMessageDir, Controller, Instruction,
    Registry,
  },
  entities::flightplan::Leg,
  geometry::{self, Geod, normalize_periodic},
};

// Earliest transmission offsets, in seconds after the scheduled
// departure, for the startup ladder states.
const STARTUP_OFFSETS_S: [f64; 8] =
  [0.0, 60.0, 80.0, 100.0, 130.0, 140.0, 150.0, 180.0];
const PUSHBACK_DECISION_OFFSET_S: f64 = 200.0;

// Ladder states. Startup runs 0..=9, taxi 9..=13.
const STATE_PUSHBACK_DECISION: u32 = 8;
const STATE_PUSHBACK_APPROVED: u32 = 9;
const STATE_TAXI_REQUESTED: u32 = 10;
const STATE_TAXI_ISSUED: u32 = 11;
const STATE_TAXIING: u32 = 12;
const STATE_TAXI_HOLDING: u32 = 13;

/// Other taxiing traffic closer than this many combined radii ahead
/// triggers a hold.
const CONFLICT_RADII: f64 = 4.0;

/// The ground-side controller of one airport: walks departures through
/// the engine-start / pushback / taxi clearance ladder and serializes
/// taxiway access with hold and resume instructions.
#[derive(Debug)]
pub struct GroundController {
  airport: Intern<String>,
  registry: Registry,
  rng: Rng,
}

impl GroundController {
  pub fn new(airport: Intern<String>) -> Self {
    Self {
      airport,
      registry: Registry::new(),
      rng: Rng::with_seed(0x6702_0a1c),
    }
  }

  pub fn active_traffic(&self) -> usize {
    self.registry.records.len()
  }

  pub fn allow_pushback(&mut self, id: usize, allowed: bool) {
    if let Some(rec) = self.registry.search_mut(id) {
      rec.allow_pushback = allowed;
    }
  }

  /// An aircraft reporting at the runway hold-short point. Runs the
  /// report / acknowledge / switch-to-tower exchange and releases the
  /// aircraft from this frequency.
  pub fn report_runway_hold_short(&mut self, id: usize) {
    let name = self.name();
    self.registry.transmit(
      id,
      &name,
      AtcMessage::ReportRunwayHoldShort,
      AtcMessageDir::AirToGround,
    );
    self.registry.transmit(
      id,
      &name,
      AtcMessage::AcknowledgeReportRunwayHoldShort,
      AtcMessageDir::GroundToAir,
    );
    self.registry.transmit(
      id,
      &name,
      AtcMessage::SwitchTowerFrequency,
      AtcMessageDir::GroundToAir,
    );
    self.registry.transmit(
      id,
      &name,
      AtcMessage::AcknowledgeSwitchTowerFrequency,
      AtcMessageDir::AirToGround,
    );
  }

  /// Is some other taxiing aircraft in the way ahead of this one?
  fn blocked_by_traffic(&self, id: usize) -> bool {
    let Some(rec) = self.registry.search(id) else {
      return false;
    };

    self.registry.records.iter().any(|other| {
      // Only traffic that is actually moving blocks; an aircraft that
      // is itself holding cannot deadlock the one it waits for.
      if other.id == id
        || other.dead
        || other.leg != Leg::Taxi
        || other.state != STATE_TAXIING
      {
        return false;
      }
      let dist = geometry::distance_m(rec.pos, other.pos);
      if dist > CONFLICT_RADII * (rec.radius_m + other.radius_m) {
        return false;
      }
      let bearing = geometry::course_deg(rec.pos, other.pos);
      let off_nose =
        normalize_periodic(-180.0, 180.0, bearing - rec.heading);
      off_nose.abs() < 70.0
    })
  }

  fn run_startup_ladder(&mut self, id: usize, now: f64) {
    let name = self.name();
    let Some(rec) = self.registry.search(id) else {
      return;
    };
    let start = rec.scheduled_departure;
    let state = rec.state;

    use AtcMessage::*;
    use AtcMessageDir::*;
    let steps: [(AtcMessage, AtcMessageDir); 8] = [
      (AnnounceEngineStart, AirToGround),
      (RequestEngineStart, AirToGround),
      (PermitEngineStart, GroundToAir),
      (AcknowledgeEngineStart, AirToGround),
      (AcknowledgeSwitchGroundFrequency, AirToGround),
      (InitiateContact, AirToGround),
      (AcknowledgeInitiateContact, GroundToAir),
      (RequestPushbackClearance, AirToGround),
    ];

    for (i, (msg, dir)) in steps.iter().enumerate() {
      self.registry.check_transmission_state(
        id,
        &name,
        i as u32,
        start + STARTUP_OFFSETS_S[i],
        now,
        *msg,
        *dir,
      );
    }

    if state == STATE_PUSHBACK_DECISION
      && self.registry.available
      && now > start + PUSHBACK_DECISION_OFFSET_S
    {
      let allowed = self
        .registry
        .search(id)
        .map(|rec| rec.allow_pushback)
        .unwrap_or(false);

      if allowed {
        self.registry.transmit(
          id,
          &name,
          AtcMessage::PermitPushbackClearance,
          AtcMessageDir::GroundToAir,
        );
        if let Some(rec) = self.registry.search_mut(id) {
          rec.allow_repeated_transmissions();
          rec.update_state();
        }
      } else {
        self.registry.transmit(
          id,
          &name,
          AtcMessage::HoldPushbackClearance,
          AtcMessageDir::GroundToAir,
        );
        if let Some(rec) = self.registry.search_mut(id) {
          rec.suppress_repeated_transmissions();
        }
      }
      self.registry.last_transmission = now;
      self.registry.available = false;
    }

    if self
      .registry
      .search(id)
      .map(|rec| rec.state == STATE_PUSHBACK_APPROVED)
      .unwrap_or(false)
      && self.registry.available
    {
      if let Some(rec) = self.registry.search_mut(id) {
        rec.instruction.hold_position = false;
      }
    }
  }

  fn run_taxi_ladder(&mut self, id: usize, now: f64) {
    let name = self.name();

    self.registry.check_transmission_state(
      id,
      &name,
      STATE_PUSHBACK_APPROVED,
      0.0,
      now,
      AtcMessage::RequestTaxiClearance,
      AtcMessageDir::AirToGround,
    );
    self.registry.check_transmission_state(
      id,
      &name,
      STATE_TAXI_REQUESTED,
      0.0,
      now,
      AtcMessage::IssueTaxiClearance,
      AtcMessageDir::GroundToAir,
    );
    if self.registry.check_transmission_state(
      id,
      &name,
      STATE_TAXI_ISSUED,
      0.0,
      now,
      AtcMessage::AcknowledgeTaxiClearance,
      AtcMessageDir::AirToGround,
    ) {
      if let Some(rec) = self.registry.search_mut(id) {
        rec.instruction.hold_position = false;
      }
    }

    // Serialized taxiway access: whoever taxis first keeps going,
    // later traffic holds until the path ahead clears.
    let state = match self.registry.search(id) {
      Some(rec) => rec.state,
      None => return,
    };
    if state == STATE_TAXIING && self.blocked_by_traffic(id) {
      self.registry.transmit(
        id,
        &name,
        AtcMessage::HoldPosition,
        AtcMessageDir::GroundToAir,
      );
      self.registry.transmit(
        id,
        &name,
        AtcMessage::AcknowledgeHoldPosition,
        AtcMessageDir::AirToGround,
      );
      if let Some(rec) = self.registry.search_mut(id) {
        rec.instruction.hold_position = true;
        rec.state = STATE_TAXI_HOLDING;
        rec.suppress_repeated_transmissions();
      }
    } else if state == STATE_TAXI_HOLDING && !self.blocked_by_traffic(id) {
      self.registry.transmit(
        id,
        &name,
        AtcMessage::ResumeTaxi,
        AtcMessageDir::GroundToAir,
      );
      self.registry.transmit(
        id,
        &name,
        AtcMessage::AcknowledgeResumeTaxi,
        AtcMessageDir::AirToGround,
      );
      if let Some(rec) = self.registry.search_mut(id) {
        rec.instruction.hold_position = false;
        rec.state = STATE_TAXIING;
        rec.allow_repeated_transmissions();
      }
    }
  }
}

impl Controller for GroundController {
  fn name(&self) -> String {
    format!("{}-ground", self.airport)
  }

  fn frequency_khz(&self) -> u32 {
    121_900
  }

  fn announce_position(&mut self, ann: Announcement) {
    let created = self.registry.insert_or_update(&ann);
    if created {
      if ann.leg != Leg::StartupPushback {
        // Joined the frequency past the startup phase; skip the engine
        // start exchange.
        if let Some(rec) = self.registry.search_mut(ann.id) {
          rec.state = STATE_PUSHBACK_APPROVED;
        }
      }
      tracing::debug!(
        "{} registered {} on leg {:?}",
        self.name(),
        ann.callsign,
        ann.leg
      );
    }
  }

  fn update_aircraft_information(
    &mut self,
    id: usize,
    pos: Geod,
    heading: f64,
    speed_kts: f64,
    altitude_ft: f64,
    dt: f64,
    now: f64,
  ) {
    let Some(rec) = self.registry.search_mut(id) else {
      tracing::warn!("updating aircraft {id} without traffic record");
      return;
    };
    rec.set_position_and_heading(pos, heading, speed_kts, altitude_ft);
    let leg = rec.leg;
    self.registry.dt_count += dt;

    // Frequency pacing: one party talks at a time, with a few seconds
    // of silence in between.
    if now - self.registry.last_transmission
      > 3.0 + self.rng.f64() * 15.0
    {
      self.registry.available = true;
    }

    match leg {
      Leg::StartupPushback => self.run_startup_ladder(id, now),
      Leg::Taxi | Leg::LandingTaxi | Leg::Parking => {
        self.run_taxi_ladder(id, now)
      }
      _ => {}
    }
  }

  fn sign_off(&mut self, id: usize) {
    let name = self.name();
    self.registry.sign_off(id, &name);
  }

  fn mark_dead(&mut self, id: usize) {
    if let Some(rec) = self.registry.search_mut(id) {
      rec.dead = true;
    }
  }

  fn has_instruction(&self, id: usize) -> bool {
    self.registry.has_instruction(id)
  }

  fn get_instruction(&self, id: usize) -> Instruction {
    self.registry.get_instruction(id)
  }

  fn update(&mut self, _dt: f64) {
    self.registry.erase_dead();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::entities::flightplan::Leg;

  fn intern(s: &str) -> Intern<String> {
    Intern::from_ref(s)
  }

  fn announcement(id: usize, leg: Leg) -> Announcement {
    Announcement {
      id,
      callsign: intern(&format!("TST{id:04}")),
      runway: Some(intern("09")),
      route_index: 0,
      intentions: Vec::new(),
      pos: Geod::from_deg(51.0, 9.0),
      heading: 0.0,
      speed_kts: 0.0,
      altitude_ft: 350.0,
      radius_m: 20.0,
      leg,
      scheduled_departure: 0.0,
    }
  }

  fn drive(
    ctl: &mut GroundController,
    id: usize,
    from: f64,
    until: f64,
  ) {
    let mut now = from;
    while now < until {
      ctl.update_aircraft_information(
        id,
        Geod::from_deg(51.0, 9.0),
        0.0,
        0.0,
        350.0,
        1.0,
        now,
      );
      ctl.update(1.0);
      now += 1.0;
    }
  }

  #[test]
  fn announced_aircraft_always_has_an_instruction() {
    let mut ctl = GroundController::new(intern("EDDT"));
    ctl.announce_position(announcement(1, Leg::StartupPushback));

    assert!(ctl.has_instruction(1));
    assert!(ctl.get_instruction(1).hold_position);
  }

  #[test]
  fn startup_ladder_reaches_pushback() {
    let mut ctl = GroundController::new(intern("EDDT"));
    ctl.announce_position(announcement(1, Leg::StartupPushback));

    drive(&mut ctl, 1, 0.0, 400.0);

    // The full exchange has run: engine start, contact, pushback
    // permit, and the hold has been released.
    assert!(!ctl.get_instruction(1).hold_position);
  }

  #[test]
  fn withheld_pushback_keeps_holding() {
    let mut ctl = GroundController::new(intern("EDDT"));
    ctl.announce_position(announcement(1, Leg::StartupPushback));
    ctl.allow_pushback(1, false);

    drive(&mut ctl, 1, 0.0, 400.0);

    // Denied pushback is an explicit hold, not silence.
    assert!(ctl.has_instruction(1));
    assert!(ctl.get_instruction(1).hold_position);
  }

  #[test]
  fn taxi_clearance_releases_late_joiners() {
    let mut ctl = GroundController::new(intern("EDDT"));
    ctl.announce_position(announcement(1, Leg::Taxi));

    drive(&mut ctl, 1, 0.0, 120.0);

    assert!(!ctl.get_instruction(1).hold_position);
  }

  #[test]
  fn converging_taxi_traffic_is_held() {
    let mut ctl = GroundController::new(intern("EDDT"));
    ctl.announce_position(announcement(1, Leg::Taxi));
    ctl.announce_position(announcement(2, Leg::Taxi));

    // Walk both through the taxi clearance.
    let mut now = 0.0;
    while now < 240.0 {
      ctl.update_aircraft_information(
        1,
        Geod::from_deg(51.0, 9.0),
        0.0,
        10.0,
        350.0,
        1.0,
        now,
      );
      // #2 sits 100m north of #1, facing it.
      ctl.update_aircraft_information(
        2,
        geometry::direct(Geod::from_deg(51.0, 9.0), 0.0, 100.0),
        180.0,
        10.0,
        350.0,
        1.0,
        now,
      );
      now += 1.0;
    }

    // Both cannot be cleared through the same spot; the later one
    // holds.
    let first = ctl.get_instruction(1);
    let second = ctl.get_instruction(2);
    assert!(first.hold_position || second.hold_position);
    assert!(!(first.hold_position && second.hold_position));
  }

  #[test]
  fn dead_traffic_is_purged_on_update() {
    let mut ctl = GroundController::new(intern("EDDT"));
    ctl.announce_position(announcement(1, Leg::Taxi));
    ctl.mark_dead(1);
    ctl.update(1.0);

    assert_eq!(ctl.active_traffic(), 0);
  }
}
