//! CLI configuration

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the orchestrator control API
    pub orchestrator_url: String,
}
