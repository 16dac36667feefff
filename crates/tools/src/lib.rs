pub mod config;
pub mod flight;

pub use config::{FlightConfig, MapConfig};
pub use flight::{FlightReport, RouteFollower, simulate};
