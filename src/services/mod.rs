// src/services/mod.rs
//
// Outbound HTTP clients for third-party providers

pub mod strava;

pub use strava::StravaService;
