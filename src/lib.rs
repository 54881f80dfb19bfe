//! Truck load planner: capacity calculation and grid placement of boxed goods.

pub mod api;
pub mod capacity;
pub mod config;
pub mod geometry;
pub mod model;
pub mod placement;
pub mod types;
