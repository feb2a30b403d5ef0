//! Service layer
//!
//! Services contain the business logic of the build stage. They combine
//! a source provider, a build environment and a build profile into a
//! complete build, and buffer the output it produces.
//!
//! All services are trait-based to enable testing and dependency injection.

mod build;
mod log_buffer;

// Re-export traits
pub use build::BuildService;
pub use log_buffer::LogBufferService;

// Re-export implementations
pub use build::StandardBuildService;
pub use log_buffer::InMemoryLogBuffer;
