// lib.rs
// KosFlow admin service: boarding-house rooms, tenants, billing and face access monitoring.

pub mod config;
pub mod error;
pub mod gateway;
pub mod models;
pub mod monitor;
pub mod occupancy;
pub mod routes;
pub mod session;
pub mod state;

pub use error::{KosError, Result};
