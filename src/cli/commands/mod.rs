use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use docket::{DocketConfig, LoggingNotifier, SqliteCaseRepository, WorkflowService};

pub mod case;
pub mod department;
pub mod init;
pub mod query;

/// Open the configured store, run `f` against a service over it, then close
/// the pool whether or not `f` succeeded.
pub async fn with_service<F, Fut, R>(database: Option<&str>, config: &DocketConfig, f: F) -> Result<R>
where
    F: FnOnce(WorkflowService) -> Fut,
    Fut: std::future::Future<Output = Result<R>>,
{
    let repository = Arc::new(open_repository(database, config).await?);
    let service = WorkflowService::new(
        repository.clone(),
        Arc::new(LoggingNotifier),
        config.workflow.clone(),
    );

    let result = f(service.clone()).await;
    service.log_stats();
    repository.shutdown().await;
    result
}

pub async fn open_repository(database: Option<&str>, config: &DocketConfig) -> Result<SqliteCaseRepository> {
    let defaults = DocketConfig::default().database;
    let db = config
        .database
        .as_ref()
        .or(defaults.as_ref())
        .context("no database configured")?;
    let url = database.unwrap_or(&db.url);

    ensure_parent_dir(url)?;
    let repository = SqliteCaseRepository::new(url, db.max_connections, db.auto_migrate)
        .await
        .with_context(|| format!("failed to open database {url}"))?;
    Ok(repository)
}

/// SQLite creates the file but not its directory
fn ensure_parent_dir(url: &str) -> Result<()> {
    let Some(path) = url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() || path == ":memory:" {
        return Ok(());
    }
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    Ok(())
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parent_dir_created_for_file_urls() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("nested/state/docket.db");
        ensure_parent_dir(&format!("sqlite://{}", db.display())).unwrap();
        assert!(db.parent().unwrap().is_dir());
    }

    #[test]
    fn test_memory_urls_ignored() {
        ensure_parent_dir("sqlite://:memory:").unwrap();
        ensure_parent_dir("postgres://localhost/db").unwrap();
    }
}
