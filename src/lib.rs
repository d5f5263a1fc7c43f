//! # local-path-exporter
//!
//! Measures the disk usage of every volume directory below a storage root and
//! exposes it as Prometheus gauges. Directory names are turned into labels by
//! a naming template such as `pvc-{pvc_uid}_{namespace}_{pvc_name}`.
//!
//! ## Core Components
//!
//! - [`template`]: compiles naming templates into label extractors
//! - [`scanner`]: periodic scan engine holding the current snapshot
//! - [`types`]: snapshot data model and JSON DTOs
//! - [`metrics`]: counters describing the scanner itself
//!
//! ## Outer layers
//!
//! - [`config`]: layered configuration (defaults, files, environment)
//! - [`routes`]: HTTP handlers, including the Prometheus exposition
//! - [`error`]: HTTP error responses
//! - [`state`]: shared application state

pub mod config;
pub mod error;
pub mod metrics;
pub mod routes;
pub mod scanner;
pub mod state;
pub mod template;
pub mod types;

#[cfg(test)]
mod tests;
