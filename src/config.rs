use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure for project bootstrap
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Identifiers used when talking to the workflow engine
    pub engine: EngineConfig,
    /// Versions and tool settings handed to the generation workflow
    pub generation: GenerationConfig,
    /// Where per-build working directories are created
    pub workspace: WorkspaceConfig,
    /// Completion polling settings
    pub polling: PollingConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Deployment unit that hosts the generation process
    pub container_id: String,
    /// Logical process identifier started for every build
    pub process_id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    /// Version used when a request does not carry one
    pub default_version: String,
    /// KIE archetype version passed to the workflow
    pub kie_version: String,
    /// Optional custom Maven settings file
    pub maven_settings: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Parent directory for working directories (system temp dir when unset)
    pub temp_root: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PollingConfig {
    /// Sleep between marker checks
    pub interval_ms: u64,
    /// The error log is queried every this many iterations
    pub error_check_every: u32,
    /// Wall-clock ceiling for a single build
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level used when RUST_LOG is not set
    pub log_level: String,
    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

pub const DEFAULT_VERSION: &str = "7.59.0.Final";

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            container_id: "jbpm-bootstrap-kjar".to_string(),
            process_id: "GenerateProject".to_string(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            default_version: DEFAULT_VERSION.to_string(),
            kie_version: DEFAULT_VERSION.to_string(),
            maven_settings: None,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 200,
            error_check_every: 20, // every 4 seconds at the default interval
            timeout_secs: 60,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            generation: GenerationConfig::default(),
            workspace: WorkspaceConfig::default(),
            polling: PollingConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl WorkspaceConfig {
    /// Resolve the directory under which working directories are created
    pub fn resolved_temp_root(&self) -> PathBuf {
        self.temp_root.clone().unwrap_or_else(std::env::temp_dir)
    }
}

impl BootstrapConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (project-bootstrap.toml)
    /// 3. Environment variables (prefixed with PROJECT_BOOTSTRAP_)
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("project-bootstrap.toml"))
    }

    /// Same as [`BootstrapConfig::load`] with an explicit configuration file
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut builder = Config::builder();

        if path.exists() {
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix("PROJECT_BOOTSTRAP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?;

        let mut bootstrap_config: BootstrapConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Mirrors the system property used by existing deployments
        if bootstrap_config.generation.maven_settings.is_none() {
            if let Ok(settings) = std::env::var("KIE_MAVEN_SETTINGS_CUSTOM") {
                bootstrap_config.generation.maven_settings = Some(settings);
            }
        }

        Ok(bootstrap_config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}
