//! # Users Module
//!
//! Local accounts linked to Strava identities:
//! - Upsert on sign-in, with a personal team for new athletes
//! - Token persistence after refresh
//! - Team activity log

pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;

#[cfg(test)]
mod tests;

pub use routes::users_routes;
pub use services::UsersService;
