use engine::{
  atc::AtcNetwork,
  entities::{
    agent::TrafficAgent,
    airport::{Airport, Parking, Runway, TaxiNode},
    flightplan::FlightPlan,
    vehicle::{Performance, VehicleKind},
  },
  geometry::{Geod, direct},
  synth::{DefaultGenerator, LegContext},
};
use internment::Intern;

fn intern(s: &str) -> Intern<String> {
  Intern::from_ref(s)
}

fn build_airport(id: &str, origin: Geod) -> Airport {
  let mut apt = Airport::new(intern(id), origin);
  apt.elevation_ft = 350.0;
  apt.runways.push(Runway {
    id: intern("09"),
    threshold: direct(origin, 270.0, 1600.0),
    heading: 90.0,
    length_m: 3200.0,
  });
  apt.parkings.push(Parking {
    id: intern("A1"),
    pos: direct(origin, 0.0, 420.0),
    heading: 0.0,
    radius_m: 28.0,
  });

  let gn = &mut apt.ground_network;
  gn.add_node(TaxiNode::new(intern("T1"), direct(origin, 0.0, 320.0)));
  gn.add_node(TaxiNode::new(intern("T2"), origin));
  gn.add_node(TaxiNode::new(intern("T3"), direct(origin, 270.0, 900.0)));
  gn.add_node(
    TaxiNode::new(intern("RW09"), direct(origin, 270.0, 1595.0))
      .with_on_runway(true),
  );
  gn.connect(intern("T1"), intern("T2"));
  gn.connect(intern("T2"), intern("T3"));
  gn.connect(intern("T3"), intern("RW09"));
  apt
}

fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .init();

  let origin = Geod::from_deg(52.5597, 13.2877);
  let departure = build_airport("EDDT", origin);
  let arrival = build_airport("EDDH", direct(origin, 30.0, 250_000.0));

  let mut net = AtcNetwork::new();
  net.add_airport(departure.id);
  net.add_airport(arrival.id);

  let ctx = LegContext {
    departure: &departure,
    arrival: &arrival,
    parking: Some(intern("A1")),
    runway: Some(intern("09")),
    start_time: 0.0,
    remaining_time: 7200.0,
    first_leg: true,
    radius_m: 28.0,
    cruise_alt_ft: 32000.0,
    cruise_speed_kts: 450.0,
    pos: departure.parking(intern("A1")).unwrap().pos,
    heading: 0.0,
    perf: Performance::jetliner(),
    flight_type: "gate".into(),
    aircraft_type: "B738".into(),
    airline: "TST".into(),
  };

  let plan = FlightPlan::synthesize(0.0, &ctx, &DefaultGenerator);
  let mut aircraft = TrafficAgent::new(
    1,
    intern("TST1234"),
    VehicleKind::Aircraft(Performance::jetliner()),
    plan,
  );

  let dt = 1.0;
  let mut now = 0.0;
  for _ in 0..1800 {
    if aircraft.needs_next_leg() {
      let mut ctx = ctx.clone();
      ctx.pos = aircraft.pos;
      ctx.heading = aircraft.heading;
      aircraft.load_next_leg(&ctx, &DefaultGenerator);
    }

    aircraft.update(dt, now, &mut net);
    net.update(dt);
    now += dt;

    if now as u64 % 60 == 0 {
      let out = aircraft.output();
      println!(
        "t={now:5.0}s leg={:?} pos=({:.4}, {:.4}) hdg={:3.0} \
         spd={:4.0}kt alt={:5.0}ft gear={} taxi-light={}",
        aircraft.plan.leg,
        aircraft.pos.lat,
        aircraft.pos.lon,
        aircraft.heading,
        aircraft.speed_kts,
        aircraft.altitude_ft,
        out.discrete.gear_down,
        out.discrete.taxi_lights,
      );
    }

    if aircraft.is_dead() {
      println!("aircraft retired at t={now}s");
      break;
    }
  }
}
