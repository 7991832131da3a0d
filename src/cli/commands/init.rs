use anyhow::Result;
use std::path::Path;
use tracing::info;

use super::with_service;
use docket::DocketConfig;

pub struct InitCommand {
    pub write_config: bool,
    pub force: bool,
}

impl InitCommand {
    pub fn new(write_config: bool, force: bool) -> Self {
        Self { write_config, force }
    }

    pub async fn execute(&self, database: Option<&str>, config: &DocketConfig) -> Result<()> {
        if self.write_config {
            let path = Path::new("docket.toml");
            if path.exists() && !self.force {
                anyhow::bail!("docket.toml already exists; use --force to overwrite");
            }
            config.save_to_file(path)?;
            info!(path = %path.display(), "Wrote configuration");
        }

        let seeded = with_service(database, config, |service| async move {
            for department in &config.departments {
                service.register_department(department.clone()).await?;
            }
            Ok(service.departments().await?.len())
        })
        .await?;

        println!("✅ Store ready with {seeded} department(s)");
        Ok(())
    }
}
