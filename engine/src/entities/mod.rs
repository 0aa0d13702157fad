pub mod agent;
pub mod airport;
pub mod flightplan;
pub mod vehicle;
pub mod waypoint;
