//! Sitepipe Core
//!
//! Core types and abstractions for the Sitepipe static-site deployment system.
//!
//! This crate contains:
//! - Domain types: Core business entities (SourceRevision, PipelineRun, BuildArtifact, etc.)
//! - DTOs: Data transfer objects exchanged over the control API
//! - Site configuration and its validation rules
//! - Error kinds shared by every stage

pub mod config;
pub mod domain;
pub mod dto;
pub mod error;
pub mod region;
