pub mod ground;
pub mod tower;

use std::collections::HashMap;

use internment::Intern;
use serde::{Deserialize, Serialize};

use crate::{entities::flightplan::Leg, geometry::Geod};

pub use ground::GroundController;
pub use tower::TowerController;

/// The closed set of transmissions in the request/grant/acknowledge
/// protocol between aircraft and controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AtcMessage {
  AnnounceEngineStart,
  RequestEngineStart,
  PermitEngineStart,
  DenyEngineStart,
  AcknowledgeEngineStart,
  RequestPushbackClearance,
  PermitPushbackClearance,
  HoldPushbackClearance,
  AcknowledgeSwitchGroundFrequency,
  InitiateContact,
  AcknowledgeInitiateContact,
  RequestTaxiClearance,
  IssueTaxiClearance,
  AcknowledgeTaxiClearance,
  HoldPosition,
  AcknowledgeHoldPosition,
  ResumeTaxi,
  AcknowledgeResumeTaxi,
  ReportRunwayHoldShort,
  AcknowledgeReportRunwayHoldShort,
  ClearedForTakeoff,
  AcknowledgeClearedForTakeoff,
  SwitchTowerFrequency,
  AcknowledgeSwitchTowerFrequency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AtcMessageDir {
  AirToGround,
  GroundToAir,
}

impl AtcMessage {
  fn text(&self, receiver: &str, sender: &str, runway: &str) -> String {
    match self {
      Self::AnnounceEngineStart => {
        format!("{sender}. Ready to start up.")
      }
      Self::RequestEngineStart => {
        format!("{receiver}, this is {sender}. Request start-up.")
      }
      Self::PermitEngineStart => {
        format!(
          "{receiver}. Start-up approved, runway {runway}. {sender}."
        )
      }
      Self::DenyEngineStart => format!("{receiver}. Standby. {sender}."),
      Self::AcknowledgeEngineStart => {
        format!("{receiver}. Start-up approved, runway {runway}. {sender}.")
      }
      Self::RequestPushbackClearance => {
        format!("{receiver}. Request push-back. {sender}.")
      }
      Self::PermitPushbackClearance => {
        format!("{receiver}. Push-back approved. {sender}.")
      }
      Self::HoldPushbackClearance => {
        format!("{receiver}. Standby. {sender}.")
      }
      Self::AcknowledgeSwitchGroundFrequency => {
        format!("{receiver}. Switching to ground. {sender}.")
      }
      Self::InitiateContact => format!("{receiver}. With you. {sender}."),
      Self::AcknowledgeInitiateContact => {
        format!("{receiver}. Roger. {sender}.")
      }
      Self::RequestTaxiClearance => {
        format!("{receiver}. Ready to taxi. {sender}.")
      }
      Self::IssueTaxiClearance => {
        format!("{receiver}. Cleared to taxi. {sender}.")
      }
      Self::AcknowledgeTaxiClearance => {
        format!("{receiver}. Cleared to taxi. {sender}.")
      }
      Self::HoldPosition => format!("{receiver}. Hold position. {sender}."),
      Self::AcknowledgeHoldPosition => {
        format!("{receiver}. Holding position. {sender}.")
      }
      Self::ResumeTaxi => format!("{receiver}. Resume taxiing. {sender}."),
      Self::AcknowledgeResumeTaxi => {
        format!("{receiver}. Continuing taxi. {sender}.")
      }
      Self::ReportRunwayHoldShort => {
        format!("{receiver}. Holding short runway {runway}. {sender}.")
      }
      Self::AcknowledgeReportRunwayHoldShort => {
        format!("{receiver}. Roger, hold short runway {runway}. {sender}.")
      }
      Self::ClearedForTakeoff => {
        format!("{receiver}. Cleared for takeoff runway {runway}. {sender}.")
      }
      Self::AcknowledgeClearedForTakeoff => {
        format!(
          "{receiver}. Roger, cleared for takeoff runway {runway}. \
           {sender}."
        )
      }
      Self::SwitchTowerFrequency => {
        format!("{receiver}. Contact tower. {sender}.")
      }
      Self::AcknowledgeSwitchTowerFrequency => {
        format!("{receiver}. Roger, switching to tower. {sender}.")
      }
    }
  }
}

/// An asynchronous instruction for one aircraft. Aircraft poll their
/// controller for this every tick and apply whatever is set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Instruction {
  pub hold_pattern: bool,
  pub hold_position: bool,
  pub change_speed: bool,
  pub change_heading: bool,
  pub change_altitude: bool,
  pub resolve_circular_wait: bool,

  pub speed_kts: f64,
  pub heading: f64,
  pub alt_ft: f64,
}

impl Instruction {
  pub fn has_instruction(&self) -> bool {
    self.hold_pattern
      || self.hold_position
      || self.change_speed
      || self.change_heading
      || self.change_altitude
      || self.resolve_circular_wait
  }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TakeoffStatus {
  #[default]
  None,
  Queued,
  Cleared,
}

/// Everything an aircraft hands over when it announces itself to a
/// controller.
#[derive(Debug, Clone)]
pub struct Announcement {
  pub id: usize,
  pub callsign: Intern<String>,
  pub runway: Option<Intern<String>>,
  pub route_index: usize,
  pub intentions: Vec<usize>,
  pub pos: Geod,
  pub heading: f64,
  pub speed_kts: f64,
  pub altitude_ft: f64,
  pub radius_m: f64,
  pub leg: Leg,
  pub scheduled_departure: f64,
}

/// The interaction state of one registered aircraft with one controller.
#[derive(Debug, Clone)]
pub struct TrafficRecord {
  pub id: usize,
  pub callsign: Intern<String>,
  pub runway: Option<Intern<String>>,
  pub leg: Leg,
  pub state: u32,
  pub route_index: usize,
  pub intentions: Vec<usize>,

  pub pos: Geod,
  pub heading: f64,
  pub speed_kts: f64,
  pub altitude_ft: f64,
  pub radius_m: f64,

  pub instruction: Instruction,
  pub allow_transmission: bool,
  pub allow_pushback: bool,
  pub takeoff_status: TakeoffStatus,
  pub scheduled_departure: f64,
  pub dead: bool,
}

impl TrafficRecord {
  pub fn from_announcement(ann: &Announcement) -> Self {
    let mut rec = Self {
      id: ann.id,
      callsign: ann.callsign,
      runway: ann.runway,
      leg: ann.leg,
      state: 0,
      route_index: ann.route_index,
      intentions: ann.intentions.clone(),
      pos: ann.pos,
      heading: ann.heading,
      speed_kts: ann.speed_kts,
      altitude_ft: ann.altitude_ft,
      radius_m: ann.radius_m,
      instruction: Instruction::default(),
      allow_transmission: true,
      allow_pushback: true,
      takeoff_status: TakeoffStatus::None,
      scheduled_departure: ann.scheduled_departure,
      dead: false,
    };
    // Newly registered traffic holds until told otherwise; nobody is
    // ever left without an instruction.
    rec.instruction.hold_position = true;
    rec
  }

  pub fn set_position_and_heading(
    &mut self,
    pos: Geod,
    heading: f64,
    speed_kts: f64,
    altitude_ft: f64,
  ) {
    self.pos = pos;
    self.heading = heading;
    self.speed_kts = speed_kts;
    self.altitude_ft = altitude_ft;
  }

  pub fn update_state(&mut self) {
    self.state += 1;
    self.allow_transmission = true;
  }

  pub fn suppress_repeated_transmissions(&mut self) {
    self.allow_transmission = false;
  }

  pub fn allow_repeated_transmissions(&mut self) {
    self.allow_transmission = true;
  }

  pub fn has_instruction(&self) -> bool {
    self.instruction.has_instruction()
  }
}

/// The registry and transmission gate shared by every concrete
/// controller: active traffic in insertion order, plus the pacing state
/// that keeps a controller from talking over itself.
#[derive(Debug, Clone, Default)]
pub struct Registry {
  pub records: Vec<TrafficRecord>,
  pub last_transmission: f64,
  pub available: bool,
  pub dt_count: f64,
}

impl Registry {
  pub fn new() -> Self {
    Self {
      available: true,
      ..Self::default()
    }
  }

  pub fn search(&self, id: usize) -> Option<&TrafficRecord> {
    self.records.iter().find(|rec| rec.id == id)
  }

  pub fn search_mut(&mut self, id: usize) -> Option<&mut TrafficRecord> {
    self.records.iter_mut().find(|rec| rec.id == id)
  }

  pub fn has_active_traffic(&self) -> bool {
    !self.records.is_empty()
  }

  /// Registers new traffic or refreshes an existing registration.
  /// Returns true when a new record was created.
  pub fn insert_or_update(&mut self, ann: &Announcement) -> bool {
    if let Some(rec) = self.search_mut(ann.id) {
      rec.set_position_and_heading(
        ann.pos,
        ann.heading,
        ann.speed_kts,
        ann.altitude_ft,
      );
      rec.route_index = ann.route_index;
      rec.intentions = ann.intentions.clone();
      rec.leg = ann.leg;
      if ann.runway.is_some() {
        rec.runway = ann.runway;
      }
      false
    } else {
      self.records.push(TrafficRecord::from_announcement(ann));
      true
    }
  }

  /// Removes a registration. Safe to call for ids that were never
  /// registered or have already signed off.
  pub fn sign_off(&mut self, id: usize, controller: &str) {
    let before = self.records.len();
    self.records.retain(|rec| rec.id != id);
    if self.records.len() == before {
      tracing::debug!(
        "aircraft {id} without traffic record signing off from {controller}"
      );
    } else {
      tracing::debug!("aircraft {id} signing off from {controller}");
    }
  }

  pub fn erase_dead(&mut self) {
    self.records.retain(|rec| {
      if rec.dead {
        tracing::debug!("removing dead traffic {}", rec.id);
      }
      !rec.dead
    });
  }

  pub fn has_instruction(&self, id: usize) -> bool {
    match self.search(id) {
      Some(rec) => rec.has_instruction(),
      None => {
        tracing::warn!(
          "checking ATC instruction for aircraft {id} without record"
        );
        false
      }
    }
  }

  pub fn get_instruction(&self, id: usize) -> Instruction {
    match self.search(id) {
      Some(rec) => rec.instruction.clone(),
      None => {
        tracing::warn!(
          "requesting ATC instruction for aircraft {id} without record"
        );
        Instruction::default()
      }
    }
  }

  /// Renders and logs a transmission for the given record.
  pub fn transmit(
    &self,
    id: usize,
    controller: &str,
    msg: AtcMessage,
    dir: AtcMessageDir,
  ) {
    let Some(rec) = self.search(id) else {
      return;
    };

    let (sender, receiver) = match dir {
      AtcMessageDir::AirToGround => {
        (rec.callsign.to_string(), controller.to_owned())
      }
      AtcMessageDir::GroundToAir => {
        (controller.to_owned(), rec.callsign.to_string())
      }
    };
    let runway = rec
      .runway
      .map(|r| r.to_string())
      .unwrap_or_else(|| "--".to_owned());
    let text = msg.text(&receiver, &sender, &runway);

    if rec.allow_transmission {
      tracing::info!("{text}");
    } else {
      tracing::trace!("(suppressed) {text}");
    }
  }

  /// Fires the transmission for one protocol step once the record sits
  /// in `expected_state`, the controller is free to talk and the step's
  /// earliest time has passed. Advances the record's state on success.
  pub fn check_transmission_state(
    &mut self,
    id: usize,
    controller: &str,
    expected_state: u32,
    not_before: f64,
    now: f64,
    msg: AtcMessage,
    dir: AtcMessageDir,
  ) -> bool {
    if !self.available {
      return false;
    }
    let Some(rec) = self.search(id) else {
      return false;
    };
    if rec.state != expected_state || now <= not_before {
      return false;
    }

    self.transmit(id, controller, msg, dir);
    if let Some(rec) = self.search_mut(id) {
      rec.update_state();
    }
    self.last_transmission = now;
    self.available = false;
    true
  }
}

/// The capability set every concrete controller (ground, tower)
/// implements. All interaction runs through announce / poll / sign-off;
/// aircraft never touch controller state directly.
pub trait Controller {
  fn name(&self) -> String;
  fn frequency_khz(&self) -> u32;

  fn announce_position(&mut self, ann: Announcement);
  fn update_aircraft_information(
    &mut self,
    id: usize,
    pos: Geod,
    heading: f64,
    speed_kts: f64,
    altitude_ft: f64,
    dt: f64,
    now: f64,
  );
  fn sign_off(&mut self, id: usize);
  fn mark_dead(&mut self, id: usize);
  fn has_instruction(&self, id: usize) -> bool;
  fn get_instruction(&self, id: usize) -> Instruction;

  /// Periodic housekeeping: purge dead registrations, advance timers.
  fn update(&mut self, dt: f64);
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ControllerRole {
  Ground,
  Tower,
}

/// Which controller, at which end of the flight, owns an aircraft on the
/// given leg. `None` for enroute legs nobody controls.
pub fn role_for_leg(leg: Leg) -> Option<(ControllerRole, AirportSide)> {
  match leg {
    Leg::StartupPushback | Leg::Taxi => {
      Some((ControllerRole::Ground, AirportSide::Departure))
    }
    Leg::Takeoff => Some((ControllerRole::Tower, AirportSide::Departure)),
    Leg::Descent | Leg::Approach | Leg::Landing => {
      Some((ControllerRole::Tower, AirportSide::Arrival))
    }
    Leg::LandingTaxi | Leg::Parking => {
      Some((ControllerRole::Ground, AirportSide::Arrival))
    }
    Leg::Climb | Leg::Cruise => None,
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AirportSide {
  Departure,
  Arrival,
}

/// The ground and tower controllers of one airport.
#[derive(Debug)]
pub struct AirportAtc {
  pub ground: GroundController,
  pub tower: TowerController,
}

impl AirportAtc {
  pub fn new(airport: Intern<String>) -> Self {
    Self {
      ground: GroundController::new(airport),
      tower: TowerController::new(airport),
    }
  }

  pub fn controller_mut(
    &mut self,
    role: ControllerRole,
  ) -> &mut dyn Controller {
    match role {
      ControllerRole::Ground => &mut self.ground,
      ControllerRole::Tower => &mut self.tower,
    }
  }

  pub fn update(&mut self, dt: f64) {
    self.ground.update(dt);
    self.tower.update(dt);
  }
}

/// All controllers in the simulated world, keyed by airport.
#[derive(Debug, Default)]
pub struct AtcNetwork {
  airports: HashMap<Intern<String>, AirportAtc>,
}

impl AtcNetwork {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add_airport(&mut self, airport: Intern<String>) {
    self
      .airports
      .entry(airport)
      .or_insert_with(|| AirportAtc::new(airport));
  }

  pub fn airport_mut(
    &mut self,
    airport: Intern<String>,
  ) -> Option<&mut AirportAtc> {
    self.airports.get_mut(&airport)
  }

  pub fn controller_mut(
    &mut self,
    airport: Intern<String>,
    role: ControllerRole,
  ) -> Option<&mut dyn Controller> {
    self
      .airports
      .get_mut(&airport)
      .map(|atc| atc.controller_mut(role))
  }

  pub fn update(&mut self, dt: f64) {
    for atc in self.airports.values_mut() {
      atc.update(dt);
    }
  }
}
