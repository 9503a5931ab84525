//! Continuous ballet-action anticipation over pre-extracted video features.
/// Application directory resolution.
pub mod app_dirs;
/// The fixed action-class catalog.
pub mod catalog;
/// TOML configuration with defaults.
pub mod config;
/// Request-level error taxonomy.
pub mod error;
/// Per-frame feature types and the extractor seam.
pub mod features;
/// Tracing setup.
pub mod logging;
/// The two model adapters, their metadata, and the runtime seam.
pub mod model;
/// Per-request pipeline orchestration.
pub mod pipeline;
/// Score ranking into top-k predictions.
pub mod rank;
/// Fixed-duration windowing.
pub mod segment;
/// The protocol-agnostic service facade.
pub mod service;
