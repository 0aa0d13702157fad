use std::collections::VecDeque;

use internment::Intern;

use crate::{
  atc::{
    Announcement, AtcMessage, AtcMessageDir, Controller, Instruction,
    Registry, TakeoffStatus,
  },
  geometry::Geod,
};

/// Clearance bookkeeping for one runway: who holds the active clearance
/// and who is waiting in line for departure.
#[derive(Debug, Clone)]
pub struct ActiveRunway {
  pub runway: Intern<String>,
  pub cleared: Option<usize>,
  pub departure_queue: VecDeque<usize>,
}

impl ActiveRunway {
  pub fn new(runway: Intern<String>) -> Self {
    Self {
      runway,
      cleared: None,
      departure_queue: VecDeque::new(),
    }
  }

  pub fn first_in_departure_queue(&self) -> Option<usize> {
    self.departure_queue.front().copied()
  }
}

/// The tower controller of one airport: owns the runway reservations and
/// hands out takeoff clearances, one aircraft per runway at a time.
#[derive(Debug)]
pub struct TowerController {
  airport: Intern<String>,
  registry: Registry,
  active_runways: Vec<ActiveRunway>,
}

impl TowerController {
  pub fn new(airport: Intern<String>) -> Self {
    Self {
      airport,
      registry: Registry::new(),
      active_runways: Vec::new(),
    }
  }

  pub fn active_traffic(&self) -> usize {
    self.registry.records.len()
  }

  pub fn runway(&self, runway: Intern<String>) -> Option<&ActiveRunway> {
    self.active_runways.iter().find(|r| r.runway == runway)
  }

  fn runway_mut(
    &mut self,
    runway: Intern<String>,
  ) -> Option<&mut ActiveRunway> {
    self.active_runways.iter_mut().find(|r| r.runway == runway)
  }

  /// Drops queue entries whose traffic records are gone.
  fn prune_departure_queues(&mut self) {
    let registry = &self.registry;
    for rwy in self.active_runways.iter_mut() {
      rwy
        .departure_queue
        .retain(|id| registry.search(*id).is_some_and(|rec| !rec.dead));
      if let Some(cleared) = rwy.cleared {
        if registry.search(cleared).is_none_or(|rec| rec.dead) {
          rwy.cleared = None;
        }
      }
    }
  }
}

impl Controller for TowerController {
  fn name(&self) -> String {
    format!("{}-tower", self.airport)
  }

  fn frequency_khz(&self) -> u32 {
    118_700
  }

  fn announce_position(&mut self, ann: Announcement) {
    let created = self.registry.insert_or_update(&ann);
    if !created {
      return;
    }

    let Some(runway) = ann.runway else {
      tracing::warn!(
        "{} announced without a runway assignment",
        ann.callsign
      );
      return;
    };

    if let Some(rec) = self.registry.search_mut(ann.id) {
      rec.takeoff_status = TakeoffStatus::Queued;
    }

    if self.runway(runway).is_none() {
      self.active_runways.push(ActiveRunway::new(runway));
    }
    let name = self.name();
    if let Some(rwy) = self.runway_mut(runway) {
      rwy.departure_queue.push_back(ann.id);
      tracing::debug!(
        "{name}: {} is number {} for takeoff runway {runway}",
        ann.callsign,
        rwy.departure_queue.len()
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
    _now: f64,
  ) {
    self.registry.dt_count += dt;
    let Some(rec) = self.registry.search_mut(id) else {
      tracing::warn!("updating aircraft {id} without traffic record");
      return;
    };
    rec.set_position_and_heading(pos, heading, speed_kts, altitude_ft);

    let Some(runway) = rec.runway else {
      return;
    };
    let name = self.name();

    // Clear the head of the departure queue when the runway is free.
    let head = self
      .runway(runway)
      .and_then(|rwy| rwy.first_in_departure_queue());
    let is_free = self
      .runway(runway)
      .map(|rwy| rwy.cleared.is_none())
      .unwrap_or(false);

    if is_free {
      if let Some(head) = head {
        if let Some(rwy) = self.runway_mut(runway) {
          rwy.cleared = Some(head);
        }
        self.registry.transmit(
          head,
          &name,
          AtcMessage::ClearedForTakeoff,
          AtcMessageDir::GroundToAir,
        );
        self.registry.transmit(
          head,
          &name,
          AtcMessage::AcknowledgeClearedForTakeoff,
          AtcMessageDir::AirToGround,
        );
        if let Some(cleared_rec) = self.registry.search_mut(head) {
          cleared_rec.takeoff_status = TakeoffStatus::Cleared;
          cleared_rec.update_state();
        }
      }
    }

    // One aircraft per runway: the holder of the clearance rolls,
    // everyone else holds short.
    let cleared = self.runway(runway).and_then(|rwy| rwy.cleared);
    if let Some(rec) = self.registry.search_mut(id) {
      rec.instruction.hold_position = cleared != Some(id);
    }
  }

  fn sign_off(&mut self, id: usize) {
    if let Some(rec) = self.registry.search(id) {
      if let Some(runway) = rec.runway {
        if let Some(rwy) = self.runway_mut(runway) {
          if rwy.cleared == Some(id) {
            rwy.cleared = None;
          }
          rwy.departure_queue.retain(|queued| *queued != id);
        }
      }
    }
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
    self.prune_departure_queues();
  }
}
