//! Data Transfer Objects for the control API
//!
//! This module contains DTOs exchanged between the orchestrator's control API,
//! the repository webhook source and the CLI. DTOs are lightweight
//! representations of domain entities optimized for network transfer.

pub mod pipeline;
pub mod run;
pub mod site;
pub mod trigger;
