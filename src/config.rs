use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::cases::{ApprovalLevel, Department, Role};

/// Main configuration structure for Docket
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DocketConfig {
    /// Observability settings
    pub observability: ObservabilityConfig,
    /// Workflow behaviour
    pub workflow: WorkflowSettings,
    /// Departments seeded into a fresh store
    #[serde(default)]
    pub departments: Vec<Department>,
    /// Database settings (optional)
    pub database: Option<DatabaseConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level or `EnvFilter` directive
    pub log_level: String,
    /// Emit JSON log lines instead of plain text
    pub json_logs: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WorkflowSettings {
    /// Capacity of the channel used by `ChannelNotifier`
    pub notification_buffer: usize,
    /// Longest accepted remarks text
    pub remarks_max_len: usize,
    /// Role that signs at the first approval level
    pub level1_role: Role,
    /// Role that signs at the second approval level
    pub level2_role: Role,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            notification_buffer: 256,
            remarks_max_len: 2000,
            level1_role: Role::Dean,
            level2_role: Role::President,
        }
    }
}

impl WorkflowSettings {
    pub fn role_for(&self, level: ApprovalLevel) -> Role {
        match level {
            ApprovalLevel::Level1 => self.level1_role,
            ApprovalLevel::Level2 => self.level2_role,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.level1_role == self.level2_role {
            anyhow::bail!("level1_role and level2_role must differ");
        }
        for role in [self.level1_role, self.level2_role] {
            if matches!(role, Role::Staff | Role::Administrator) {
                anyhow::bail!("{role} cannot be mapped to an approval level");
            }
        }
        if self.remarks_max_len == 0 {
            anyhow::bail!("remarks_max_len must be positive");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database URL (SQLite file path or connection string)
    pub url: String,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Enable automatic migrations
    pub auto_migrate: bool,
}

impl Default for DocketConfig {
    fn default() -> Self {
        Self {
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json_logs: false,
            },
            workflow: WorkflowSettings::default(),
            departments: Vec::new(),
            database: Some(DatabaseConfig {
                url: "sqlite://.docket/docket.db".to_string(),
                max_connections: 5,
                auto_migrate: true,
            }),
        }
    }
}

impl DocketConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (docket.toml, .docket-rc)
    /// 3. Environment variables (prefixed with DOCKET_, sections split by `__`)
    pub fn load() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if Path::new("docket.toml").exists() {
            builder = builder.add_source(File::with_name("docket"));
        }

        if Path::new(".docket-rc").exists() {
            builder = builder.add_source(File::with_name(".docket-rc").format(config::FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("DOCKET")
                .separator("__")
                .try_parsing(true),
        );

        let loaded: DocketConfig = builder.build()?.try_deserialize()?;
        loaded.workflow.validate()?;
        Ok(loaded)
    }

    /// Load defaults overlaid with one explicit file
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let loaded: DocketConfig = Config::builder()
            .add_source(Config::try_from(&Self::default())?)
            .add_source(File::from(path).format(config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        loaded.workflow.validate()?;
        Ok(loaded)
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
