//! Sitepipe Orchestrator
//!
//! Continuous delivery for a static site:
//! - Watcher: filters and deduplicates repository change notifications
//! - Orchestrator: drives one revision at a time through build and publish
//! - Repositories: artifact store, publish target, run history and run logs
//! - Edge: caching HTTP front with alias and https redirects
//! - API: control endpoints for hooks, status and run history

pub mod api;
pub mod config;
pub mod edge;
pub mod repository;
pub mod service;
pub mod watcher;
