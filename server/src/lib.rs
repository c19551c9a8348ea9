//! HR suite server: configuration, REST surface and seeding.

pub mod config;
pub mod http;
pub mod seed;

pub use http::{AppState, build_router};
