/// modvault: community marketplace for mods, tile sets and sound packs
///
/// Projects are published by their members, reviewed by administrators and
/// downloaded by everyone. Uploads are bounded by quotas resolved per user,
/// project and project type; version dependencies form a graph that is kept free
/// of required cycles and notifies dependents when something they rely on goes away.

// Core configuration and setup
pub mod config;

// Error type shared by the service and HTTP layers
pub mod error;

// SQLite pool and schema
pub mod database;

// Entities and their storages
pub mod marketplace;

// Project type registry with hot reload
pub mod catalog;

// Quota precedence chain and enforcement
pub mod quota;

// petgraph dependency graph over projects
pub mod graph;

// Upload storage on disk
pub mod files;

// Job queue, mail transports and maintenance scheduler
pub mod jobs;

// API tokens and request extractors
pub mod auth;

// Marketplace rules: permissions, lifecycle, cascades
pub mod services;

// HTTP API layer
pub mod api;

// Server setup and initialization
pub mod server;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use server::{create_app, start_server, App};
pub use services::Marketplace;
