//! SQLite-backed case repository.
//!
//! Each commit runs in one transaction: a row-level compare-and-set on
//! `cases.version`, the log insert and the signature insert either all
//! commit or the transaction is dropped and rolled back.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{migrate::MigrateDatabase, Row, SqliteConnection, SqlitePool};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::cases::{Case, CaseId, CaseKind, CaseStatus, Department, DepartmentId, Holder, UserId};
use crate::ledger::{AuditAction, LogEntry, NewLogEntry, Signature};
use crate::repository::{CaseFilter, CaseRepository, CommitReceipt, RepositoryError, UnitOfWork};

const CASE_COLUMNS: &str = "id, kind, status, current_holder, last_holder, created_by, \
     requester_id, requires_escalation, payload, created_at, updated_at, deleted_at, version";

const LOG_COLUMNS: &str = "id, case_id, action, from_status, to_status, from_holder, \
     to_holder, actor_id, remarks, created_at";

pub struct SqliteCaseRepository {
    pool: SqlitePool,
}

impl SqliteCaseRepository {
    /// Open (creating if needed) the database at `database_url`
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        auto_migrate: bool,
    ) -> Result<Self, RepositoryError> {
        if !sqlx::Sqlite::database_exists(database_url).await? {
            info!("Creating database at {}", database_url);
            sqlx::Sqlite::create_database(database_url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(database_url)
            .await?;

        if auto_migrate {
            info!("Running database migrations...");
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(|e| RepositoryError::Backend(format!("migration failed: {e}")))?;
            info!("Database migrations completed");
        }

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close database connections gracefully
    pub async fn shutdown(&self) {
        info!("Shutting down database connections...");
        self.pool.close().await;
        info!("Database connections closed");
    }
}

fn timestamp(value: DateTime<Utc>) -> String {
    // fixed width so lexical order in SQL matches time order
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Corrupt(format!("bad timestamp {value:?}: {e}")))
}

fn parse_holder(value: Option<String>) -> Result<Option<Holder>, RepositoryError> {
    value
        .map(|raw| {
            Holder::decode(&raw).ok_or_else(|| RepositoryError::Corrupt(format!("bad holder {raw:?}")))
        })
        .transpose()
}

fn parse_status(kind: CaseKind, value: &str) -> Result<CaseStatus, RepositoryError> {
    CaseStatus::parse(kind, value)
        .ok_or_else(|| RepositoryError::Corrupt(format!("status {value:?} is not a {kind} status")))
}

fn parse_case_id(value: &str) -> Result<CaseId, RepositoryError> {
    value
        .parse()
        .map_err(|e| RepositoryError::Corrupt(format!("bad case id {value:?}: {e}")))
}

fn case_from_row(row: &SqliteRow, signatures: Vec<UserId>) -> Result<Case, RepositoryError> {
    let kind: String = row.try_get("kind")?;
    let kind: CaseKind = kind.parse().map_err(RepositoryError::Corrupt)?;
    let status: String = row.try_get("status")?;
    let payload: String = row.try_get("payload")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;
    let deleted_at: Option<String> = row.try_get("deleted_at")?;
    let version: i64 = row.try_get("version")?;
    let id: String = row.try_get("id")?;

    Ok(Case {
        id: parse_case_id(&id)?,
        status: parse_status(kind, &status)?,
        current_holder: parse_holder(row.try_get("current_holder")?)?,
        last_holder: parse_holder(row.try_get("last_holder")?)?,
        created_by: UserId(row.try_get("created_by")?),
        requester_id: UserId(row.try_get("requester_id")?),
        requires_escalation: row.try_get("requires_escalation")?,
        payload: serde_json::from_str(&payload)?,
        signatures,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
        deleted_at: deleted_at.as_deref().map(parse_timestamp).transpose()?,
        version: version as u64,
    })
}

fn log_entry_from_row(row: &SqliteRow, kind: CaseKind) -> Result<LogEntry, RepositoryError> {
    let id: i64 = row.try_get("id")?;
    let case_id: String = row.try_get("case_id")?;
    let action: String = row.try_get("action")?;
    let from_status: Option<String> = row.try_get("from_status")?;
    let to_status: String = row.try_get("to_status")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(LogEntry {
        id: id as u64,
        case_id: parse_case_id(&case_id)?,
        action: action.parse::<AuditAction>().map_err(RepositoryError::Corrupt)?,
        from_status: from_status
            .as_deref()
            .map(|s| parse_status(kind, s))
            .transpose()?,
        to_status: parse_status(kind, &to_status)?,
        from_holder: parse_holder(row.try_get("from_holder")?)?,
        to_holder: parse_holder(row.try_get("to_holder")?)?,
        actor_id: UserId(row.try_get("actor_id")?),
        remarks: row.try_get("remarks")?,
        created_at: parse_timestamp(&created_at)?,
    })
}

fn department_from_row(row: &SqliteRow) -> Result<Department, RepositoryError> {
    Ok(Department {
        id: DepartmentId(row.try_get("id")?),
        name: row.try_get("name")?,
        code: row.try_get("code")?,
        is_active: row.try_get("is_active")?,
    })
}

fn signature_from_row(row: &SqliteRow) -> Result<Signature, RepositoryError> {
    let case_id: String = row.try_get("case_id")?;
    let signed_at: String = row.try_get("signed_at")?;
    Ok(Signature {
        case_id: parse_case_id(&case_id)?,
        actor_id: UserId(row.try_get("actor_id")?),
        signed_at: parse_timestamp(&signed_at)?,
    })
}

async fn insert_log_entry(
    conn: &mut SqliteConnection,
    entry: NewLogEntry,
) -> Result<LogEntry, RepositoryError> {
    let result = sqlx::query(
        r#"
        INSERT INTO log_entries
            (case_id, action, from_status, to_status, from_holder, to_holder, actor_id, remarks, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(entry.case_id.to_string())
    .bind(entry.action.as_str())
    .bind(entry.from_status.map(|s| s.as_str()))
    .bind(entry.to_status.as_str())
    .bind(entry.from_holder.as_ref().map(Holder::encode))
    .bind(entry.to_holder.as_ref().map(Holder::encode))
    .bind(entry.actor_id.as_str())
    .bind(entry.remarks.as_deref())
    .bind(timestamp(entry.created_at))
    .execute(&mut *conn)
    .await?;

    Ok(entry.into_entry(result.last_insert_rowid() as u64))
}

async fn signers(conn: &mut SqliteConnection, case_id: CaseId) -> Result<Vec<UserId>, RepositoryError> {
    let rows = sqlx::query("SELECT actor_id FROM signatures WHERE case_id = ?1 ORDER BY signed_at, id")
        .bind(case_id.to_string())
        .fetch_all(&mut *conn)
        .await?;
    rows.iter()
        .map(|row| row.try_get::<String, _>("actor_id").map(UserId))
        .collect::<Result<_, sqlx::Error>>()
        .map_err(RepositoryError::from)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

async fn case_exists(conn: &mut SqliteConnection, case_id: CaseId) -> Result<Option<i64>, RepositoryError> {
    let version: Option<i64> = sqlx::query_scalar("SELECT version FROM cases WHERE id = ?1")
        .bind(case_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    Ok(version)
}

#[async_trait]
impl CaseRepository for SqliteCaseRepository {
    async fn upsert_department(&self, department: Department) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO departments (id, name, code, is_active)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(department.id.as_str())
        .bind(&department.name)
        .bind(&department.code)
        .bind(department.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn department(&self, id: &DepartmentId) -> Result<Option<Department>, RepositoryError> {
        let row = sqlx::query("SELECT id, name, code, is_active FROM departments WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(department_from_row).transpose()
    }

    async fn departments(&self) -> Result<Vec<Department>, RepositoryError> {
        let rows = sqlx::query("SELECT id, name, code, is_active FROM departments ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(department_from_row).collect()
    }

    async fn insert_case(&self, case: Case, entry: NewLogEntry) -> Result<LogEntry, RepositoryError> {
        // the first statement writes, so the lock is taken under the busy timeout
        let mut tx = self.pool.begin().await?;

        let query = format!(
            "INSERT INTO cases ({CASE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
        );
        sqlx::query(&query)
            .bind(case.id.to_string())
            .bind(case.kind().as_str())
            .bind(case.status.as_str())
            .bind(case.current_holder.as_ref().map(Holder::encode))
            .bind(case.last_holder.as_ref().map(Holder::encode))
            .bind(case.created_by.as_str())
            .bind(case.requester_id.as_str())
            .bind(case.requires_escalation)
            .bind(serde_json::to_string(&case.payload)?)
            .bind(timestamp(case.created_at))
            .bind(timestamp(case.updated_at))
            .bind(case.deleted_at.map(timestamp))
            .bind(case.version as i64)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    RepositoryError::DuplicateCase(case.id)
                } else {
                    RepositoryError::from(e)
                }
            })?;

        let log_entry = insert_log_entry(&mut tx, entry).await?;
        tx.commit().await?;

        debug!(case_id = %case.id, "Case stored");
        Ok(log_entry)
    }

    async fn load_case(&self, id: CaseId) -> Result<Option<Case>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let query = format!("SELECT {CASE_COLUMNS} FROM cases WHERE id = ?1");
        let row = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(row) => {
                let signatures = signers(&mut conn, id).await?;
                Ok(Some(case_from_row(&row, signatures)?))
            }
            None => Ok(None),
        }
    }

    async fn list_cases(&self, filter: &CaseFilter) -> Result<Vec<Case>, RepositoryError> {
        let query = format!("SELECT {CASE_COLUMNS} FROM cases ORDER BY created_at, id");
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        let signature_rows =
            sqlx::query("SELECT case_id, actor_id FROM signatures ORDER BY signed_at, id")
                .fetch_all(&self.pool)
                .await?;
        let mut signers: HashMap<String, Vec<UserId>> = HashMap::new();
        for row in &signature_rows {
            let case_id: String = row.try_get("case_id")?;
            signers
                .entry(case_id)
                .or_default()
                .push(UserId(row.try_get("actor_id")?));
        }

        let mut found = Vec::new();
        for row in &rows {
            let id: String = row.try_get("id")?;
            let case = case_from_row(row, signers.remove(&id).unwrap_or_default())?;
            if filter.matches(&case) {
                found.push(case);
            }
        }
        Ok(found)
    }

    async fn commit(&self, unit: UnitOfWork) -> Result<CommitReceipt, RepositoryError> {
        let UnitOfWork {
            mut case,
            expected_version,
            entry,
            signature,
        } = unit;
        let case_id = case.id;
        case.version = expected_version + 1;

        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE cases
            SET status = ?1, current_holder = ?2, last_holder = ?3,
                updated_at = ?4, deleted_at = ?5, version = ?6
            WHERE id = ?7 AND version = ?8
            "#,
        )
        .bind(case.status.as_str())
        .bind(case.current_holder.as_ref().map(Holder::encode))
        .bind(case.last_holder.as_ref().map(Holder::encode))
        .bind(timestamp(case.updated_at))
        .bind(case.deleted_at.map(timestamp))
        .bind(case.version as i64)
        .bind(case_id.to_string())
        .bind(expected_version as i64)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            // dropping the transaction rolls it back
            return match case_exists(&mut tx, case_id).await? {
                Some(found) => Err(RepositoryError::Conflict {
                    case_id,
                    expected: expected_version,
                    found: found as u64,
                }),
                None => Err(RepositoryError::CaseNotFound(case_id)),
            };
        }

        let log_entry = insert_log_entry(&mut tx, entry).await?;

        let signature_recorded = match signature {
            Some(request) => {
                sqlx::query(
                    "INSERT OR IGNORE INTO signatures (case_id, actor_id, signed_at) VALUES (?1, ?2, ?3)",
                )
                .bind(case_id.to_string())
                .bind(request.actor_id.as_str())
                .bind(timestamp(request.signed_at))
                .execute(&mut *tx)
                .await?
                .rows_affected()
                    == 1
            }
            None => false,
        };

        case.signatures = signers(&mut tx, case_id).await?;
        tx.commit().await?;

        Ok(CommitReceipt {
            case,
            log_entry,
            signature_recorded,
        })
    }

    async fn insert_signature(&self, signature: Signature) -> Result<(), RepositoryError> {
        // single statement: the unique key rejects duplicates, the EXISTS
        // guard leaves nothing inserted for an unknown case
        let inserted = sqlx::query(
            r#"
            INSERT INTO signatures (case_id, actor_id, signed_at)
            SELECT ?1, ?2, ?3
            WHERE EXISTS (SELECT 1 FROM cases WHERE id = ?1)
            "#,
        )
        .bind(signature.case_id.to_string())
        .bind(signature.actor_id.as_str())
        .bind(timestamp(signature.signed_at))
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(done) if done.rows_affected() == 0 => Err(RepositoryError::CaseNotFound(signature.case_id)),
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(RepositoryError::DuplicateSignature {
                case_id: signature.case_id,
                actor_id: signature.actor_id,
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn history(&self, id: CaseId) -> Result<Vec<LogEntry>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let kind: Option<String> = sqlx::query_scalar("SELECT kind FROM cases WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&mut *conn)
            .await?;
        let Some(kind) = kind else {
            return Ok(Vec::new());
        };
        let kind: CaseKind = kind.parse().map_err(RepositoryError::Corrupt)?;

        let query =
            format!("SELECT {LOG_COLUMNS} FROM log_entries WHERE case_id = ?1 ORDER BY created_at, id");
        let rows = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_all(&mut *conn)
            .await?;
        rows.iter().map(|row| log_entry_from_row(row, kind)).collect()
    }

    async fn signatures(&self, id: CaseId) -> Result<Vec<Signature>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT case_id, actor_id, signed_at FROM signatures WHERE case_id = ?1 ORDER BY signed_at, id",
        )
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(signature_from_row).collect()
    }
}
