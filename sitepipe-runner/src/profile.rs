//! Build profile
//!
//! Declares the commands of each build phase together with the environment,
//! compute profile and limits they run under.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sitepipe_core::error::{ConfigError, ConfigResult};

/// Ordered build phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildPhase {
    Install,
    Compile,
    Validate,
}

impl std::fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildPhase::Install => write!(f, "install"),
            BuildPhase::Compile => write!(f, "compile"),
            BuildPhase::Validate => write!(f, "validate"),
        }
    }
}

/// Declared compute size of the build sandbox
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeProfile {
    #[default]
    Small,
    Medium,
    Large,
}

impl ComputeProfile {
    /// Parallelism exposed to build tools
    pub fn jobs(self) -> u32 {
        match self {
            ComputeProfile::Small => 2,
            ComputeProfile::Medium => 4,
            ComputeProfile::Large => 8,
        }
    }
}

impl std::str::FromStr for ComputeProfile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "small" => Ok(ComputeProfile::Small),
            "medium" => Ok(ComputeProfile::Medium),
            "large" => Ok(ComputeProfile::Large),
            other => Err(ConfigError::InvalidValue {
                option: "BUILD_COMPUTE",
                reason: format!("unknown compute profile '{}'", other),
            }),
        }
    }
}

/// Build procedure for a site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildProfile {
    pub install: Vec<String>,
    pub compile: Vec<String>,
    pub validate: Vec<String>,

    /// Extra environment variables for every command
    pub env_vars: HashMap<String, String>,

    /// Directory, relative to the working tree, holding the generated site
    pub output_dir: String,

    /// Hard wall-clock limit for the whole build
    pub timeout: Duration,

    pub compute: ComputeProfile,
}

impl BuildProfile {
    /// Phases in execution order with their commands
    pub fn phases(&self) -> [(BuildPhase, &[String]); 3] {
        [
            (BuildPhase::Install, self.install.as_slice()),
            (BuildPhase::Compile, self.compile.as_slice()),
            (BuildPhase::Validate, self.validate.as_slice()),
        ]
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                option: "BUILD_TIMEOUT",
                reason: "must be greater than 0".to_string(),
            });
        }

        let output = std::path::Path::new(&self.output_dir);
        if self.output_dir.is_empty()
            || output.is_absolute()
            || output
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(ConfigError::InvalidValue {
                option: "BUILD_OUTPUT_DIR",
                reason: "must be a relative path inside the working tree".to_string(),
            });
        }

        if self.phases().iter().all(|(_, commands)| commands.is_empty()) {
            return Err(ConfigError::InvalidValue {
                option: "BUILD_COMPILE",
                reason: "at least one build command is required".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for BuildProfile {
    fn default() -> Self {
        Self {
            install: Vec::new(),
            compile: Vec::new(),
            validate: Vec::new(),
            env_vars: HashMap::new(),
            output_dir: "public".to_string(),
            timeout: Duration::from_secs(900),
            compute: ComputeProfile::default(),
        }
    }
}
