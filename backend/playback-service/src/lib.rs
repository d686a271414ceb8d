//! Playback Service
//!
//! Resolves catalog channels into client-safe playback descriptors and
//! brokers DRM license and stream requests through signed tokens, so raw
//! stream URLs, license endpoints and request headers never reach clients.

pub mod catalog;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod routes;
pub mod services;
pub mod settings;
pub mod startup;
pub mod state;

// Public re-exports
pub use config::Config;
pub use error::{AppError, Result};
pub use state::AppState;
