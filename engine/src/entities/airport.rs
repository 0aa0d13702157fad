use std::collections::HashMap;

use internment::Intern;
use itertools::Itertools;
use petgraph::{
  Undirected,
  algo::astar,
  graph::{Graph, NodeIndex},
  visit::EdgeRef,
};
use serde::{Deserialize, Serialize};

use crate::geometry::{self, Geod, normalize_periodic};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Runway {
  pub id: Intern<String>,
  pub threshold: Geod,
  pub heading: f64,
  pub length_m: f64,
}

impl Runway {
  pub fn end(&self) -> Geod {
    geometry::direct(self.threshold, self.heading, self.length_m)
  }

  /// A point `dist_m` down the centerline from the threshold. Negative
  /// distances extend the centerline out along the approach.
  pub fn point_on_centerline(&self, dist_m: f64) -> Geod {
    if dist_m >= 0.0 {
      geometry::direct(self.threshold, self.heading, dist_m)
    } else {
      geometry::direct(
        self.threshold,
        normalize_periodic(0.0, 360.0, self.heading + 180.0),
        -dist_m,
      )
    }
  }

  /// A point offset laterally from the centerline; positive `lateral_m`
  /// is to the right of the runway heading.
  pub fn point_off_centerline(&self, dist_m: f64, lateral_m: f64) -> Geod {
    let on = self.point_on_centerline(dist_m);
    let side = if lateral_m >= 0.0 {
      self.heading + 90.0
    } else {
      self.heading - 90.0
    };
    geometry::direct(
      on,
      normalize_periodic(0.0, 360.0, side),
      lateral_m.abs(),
    )
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parking {
  pub id: Intern<String>,
  pub pos: Geod,
  pub heading: f64,
  pub radius_m: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxiNode {
  pub name: Intern<String>,
  pub pos: Geod,
  pub on_runway: bool,
  pub hold_short: bool,
}

impl TaxiNode {
  pub fn new(name: Intern<String>, pos: Geod) -> Self {
    Self {
      name,
      pos,
      on_runway: false,
      hold_short: false,
    }
  }

  pub fn with_on_runway(mut self, on_runway: bool) -> Self {
    self.on_runway = on_runway;
    self
  }

  pub fn with_hold_short(mut self, hold_short: bool) -> Self {
    self.hold_short = hold_short;
    self
  }
}

type TaxiGraph = Graph<TaxiNode, f64, Undirected>;

/// The taxiway graph of an airport: named nodes joined by segments
/// weighted with their great-circle length. Taxi-route synthesis walks
/// this.
#[derive(Debug, Clone, Default)]
pub struct GroundNetwork {
  graph: TaxiGraph,
  by_name: HashMap<Intern<String>, NodeIndex>,
}

impl GroundNetwork {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn exists(&self) -> bool {
    self.graph.node_count() > 0
  }

  pub fn add_node(&mut self, node: TaxiNode) {
    let name = node.name;
    let idx = self.graph.add_node(node);
    self.by_name.insert(name, idx);
  }

  /// Joins two named nodes with a segment. Unknown names are logged and
  /// ignored.
  pub fn connect(&mut self, a: Intern<String>, b: Intern<String>) {
    let (Some(&ia), Some(&ib)) = (self.by_name.get(&a), self.by_name.get(&b))
    else {
      tracing::error!("cannot connect unknown taxi nodes {a} and {b}");
      return;
    };

    let length = geometry::distance_m(
      self.graph[ia].pos,
      self.graph[ib].pos,
    );
    self.graph.add_edge(ia, ib, length);
  }

  pub fn node(&self, name: Intern<String>) -> Option<&TaxiNode> {
    self.by_name.get(&name).map(|&idx| &self.graph[idx])
  }

  pub fn nearest_node(&self, pos: Geod) -> Option<&TaxiNode> {
    self
      .graph
      .node_weights()
      .min_by(|a, b| {
        geometry::distance_m(a.pos, pos)
          .total_cmp(&geometry::distance_m(b.pos, pos))
      })
  }

  pub fn nearest_runway_node(&self, pos: Geod) -> Option<&TaxiNode> {
    self
      .graph
      .node_weights()
      .filter(|n| n.on_runway)
      .min_by(|a, b| {
        geometry::distance_m(a.pos, pos)
          .total_cmp(&geometry::distance_m(b.pos, pos))
      })
  }

  /// Shortest route between two named nodes, including both endpoints.
  /// Empty when either node is unknown or unreachable.
  pub fn find_shortest_route(
    &self,
    from: Intern<String>,
    to: Intern<String>,
  ) -> Vec<TaxiNode> {
    let (Some(&start), Some(&goal)) =
      (self.by_name.get(&from), self.by_name.get(&to))
    else {
      tracing::error!("no taxi route, unknown node {from} or {to}");
      return Vec::new();
    };

    let goal_pos = self.graph[goal].pos;
    let Some((_cost, path)) = astar(
      &self.graph,
      start,
      |idx| idx == goal,
      |edge| *edge.weight(),
      |idx| geometry::distance_m(self.graph[idx].pos, goal_pos),
    ) else {
      tracing::warn!("no taxi route from {from} to {to}");
      return Vec::new();
    };

    path.into_iter().map(|idx| self.graph[idx].clone()).collect()
  }

  /// Total length of a route in meters, summed segment by segment.
  pub fn route_length_m(route: &[TaxiNode]) -> f64 {
    route
      .iter()
      .tuple_windows()
      .map(|(a, b)| geometry::distance_m(a.pos, b.pos))
      .sum()
  }
}

#[derive(Debug, Clone, Default)]
pub struct Airport {
  pub id: Intern<String>,
  pub pos: Geod,
  pub elevation_ft: f64,
  pub runways: Vec<Runway>,
  pub parkings: Vec<Parking>,
  pub ground_network: GroundNetwork,
}

impl Airport {
  pub fn new(id: Intern<String>, pos: Geod) -> Self {
    Self {
      id,
      pos,
      ..Self::default()
    }
  }

  pub fn runway(&self, id: Intern<String>) -> Option<&Runway> {
    self.runways.iter().find(|r| r.id == id)
  }

  pub fn parking(&self, id: Intern<String>) -> Option<&Parking> {
    self.parkings.iter().find(|p| p.id == id)
  }

  /// The runway in use. Without wind modeling this is the first one
  /// declared, which doubles as the deterministic choice the contention
  /// tests rely on.
  pub fn active_runway(&self) -> Option<&Runway> {
    self.runways.first()
  }

  /// The first parking that can hold a vehicle of the given radius.
  pub fn available_parking(&self, radius_m: f64) -> Option<&Parking> {
    self.parkings.iter().find(|p| p.radius_m >= radius_m)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::geometry::{direct, distance_m};

  fn intern(s: &str) -> Intern<String> {
    Intern::from_ref(s)
  }

  fn network_with_line() -> GroundNetwork {
    // A -- B -- C with a detour A -- D -- C that is longer.
    let origin = Geod::from_deg(51.0, 9.0);
    let mut net = GroundNetwork::new();
    net.add_node(TaxiNode::new(intern("A"), origin));
    net.add_node(TaxiNode::new(intern("B"), direct(origin, 90.0, 200.0)));
    net.add_node(
      TaxiNode::new(intern("C"), direct(origin, 90.0, 400.0))
        .with_on_runway(true),
    );
    net.add_node(TaxiNode::new(intern("D"), direct(origin, 0.0, 500.0)));
    net.connect(intern("A"), intern("B"));
    net.connect(intern("B"), intern("C"));
    net.connect(intern("A"), intern("D"));
    net.connect(intern("D"), intern("C"));
    net
  }

  #[test]
  fn shortest_route_prefers_the_direct_line() {
    let net = network_with_line();
    let route = net.find_shortest_route(intern("A"), intern("C"));

    let names: Vec<_> = route.iter().map(|n| n.name.to_string()).collect();
    assert_eq!(names, ["A", "B", "C"]);
  }

  #[test]
  fn unknown_nodes_yield_empty_routes() {
    let net = network_with_line();
    assert!(net.find_shortest_route(intern("A"), intern("Z")).is_empty());
  }

  #[test]
  fn nearest_runway_node() {
    let net = network_with_line();
    let origin = Geod::from_deg(51.0, 9.0);

    let node = net.nearest_runway_node(origin).unwrap();
    assert_eq!(node.name, intern("C"));
  }

  #[test]
  fn centerline_points() {
    let rwy = Runway {
      id: intern("27"),
      threshold: Geod::from_deg(51.0, 9.0),
      heading: 270.0,
      length_m: 2500.0,
    };

    let end = rwy.end();
    assert!((distance_m(rwy.threshold, end) - 2500.0).abs() < 0.5);

    let approach = rwy.point_on_centerline(-1000.0);
    assert!((distance_m(rwy.threshold, approach) - 1000.0).abs() < 0.5);

    let offset = rwy.point_off_centerline(500.0, 300.0);
    let on = rwy.point_on_centerline(500.0);
    assert!((distance_m(on, offset) - 300.0).abs() < 0.5);
  }
}
