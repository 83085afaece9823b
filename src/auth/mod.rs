//! # Auth Module
//!
//! Strava sign-in and the session lifecycle:
//! - Strava OAuth authorization code flow
//! - Provider profile normalization
//! - Signed session tokens carrying the Strava token bundle
//! - Token refresh policy
//! - `CurrentSession` / `MaybeSession` extractors for handlers

pub mod config;
mod cookies;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod models;
pub mod provider;
pub mod refresh;
pub mod routes;
pub mod session;


pub use config::AuthConfig;
pub use extractors::CurrentSession;
pub use provider::StravaProvider;
pub use routes::auth_routes;
