//! Core domain types
//!
//! This module contains the core domain structures used across Sitepipe services.
//! These types are shared between the orchestrator (state machine, publishing,
//! edge serving) and the runner (build execution).

pub mod artifact;
pub mod binding;
pub mod cache;
pub mod log;
pub mod revision;
pub mod run;
