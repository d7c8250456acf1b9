//! HTTP API handlers for cpn-puzzle

pub mod health;
pub mod puzzle;

pub use health::health_routes;
pub use puzzle::puzzle_routes;
