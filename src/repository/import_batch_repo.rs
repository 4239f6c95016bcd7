// ==========================================
// 服务报价目录导入系统 - 导入批次 Repository
// ==========================================
// 职责: import_batch 表读写（每次导入一行，含 dry run）
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::domain::import::ImportBatchRecord;
use crate::domain::types::ImportStrategy;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// ImportBatchRepository Trait
// ==========================================
#[async_trait]
pub trait ImportBatchRepository: Send + Sync {
    /// 写入批次记录
    async fn insert_batch(&self, batch: &ImportBatchRecord) -> RepositoryResult<()>;

    /// 按批次 ID 查询
    async fn get_batch(&self, batch_id: &str) -> RepositoryResult<Option<ImportBatchRecord>>;

    /// 最近的批次（按导入时间倒序）
    async fn list_recent(&self, limit: usize) -> RepositoryResult<Vec<ImportBatchRecord>>;
}

const BATCH_COLUMNS: &str = "batch_id, file_name, strategy, dry_run, total_rows, created_rows, \
     updated_rows, skipped_rows, invalid_rows, error_rows, fatal_error, imported_at, \
     elapsed_ms, summary_json";

fn map_batch(row: &Row<'_>) -> rusqlite::Result<ImportBatchRecord> {
    let strategy_raw: String = row.get(2)?;
    let strategy = strategy_raw.parse::<ImportStrategy>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            Box::new(RepositoryError::FieldValueError {
                field: "strategy".to_string(),
                message: e,
            }),
        )
    })?;

    Ok(ImportBatchRecord {
        batch_id: row.get(0)?,
        file_name: row.get(1)?,
        strategy,
        dry_run: row.get::<_, i64>(3)? != 0,
        total_rows: row.get(4)?,
        created_rows: row.get(5)?,
        updated_rows: row.get(6)?,
        skipped_rows: row.get(7)?,
        invalid_rows: row.get(8)?,
        error_rows: row.get(9)?,
        fatal_error: row.get(10)?,
        imported_at: row.get::<_, DateTime<Utc>>(11)?,
        elapsed_ms: row.get(12)?,
        summary_json: row.get(13)?,
    })
}

// ==========================================
// ImportBatchRepositoryImpl
// ==========================================
pub struct ImportBatchRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl ImportBatchRepositoryImpl {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }
}

#[async_trait]
impl ImportBatchRepository for ImportBatchRepositoryImpl {
    async fn insert_batch(&self, batch: &ImportBatchRecord) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"
            INSERT INTO import_batch (
                batch_id, file_name, strategy, dry_run,
                total_rows, created_rows, updated_rows, skipped_rows, invalid_rows, error_rows,
                fatal_error, imported_at, elapsed_ms, summary_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
            params![
                batch.batch_id,
                batch.file_name,
                batch.strategy.as_str(),
                batch.dry_run as i64,
                batch.total_rows,
                batch.created_rows,
                batch.updated_rows,
                batch.skipped_rows,
                batch.invalid_rows,
                batch.error_rows,
                batch.fatal_error,
                batch.imported_at.to_rfc3339_opts(SecondsFormat::Micros, true),
                batch.elapsed_ms,
                batch.summary_json,
            ],
        )?;

        Ok(())
    }

    async fn get_batch(&self, batch_id: &str) -> RepositoryResult<Option<ImportBatchRecord>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM import_batch WHERE batch_id = ?1", BATCH_COLUMNS);
        let batch = conn.query_row(&sql, params![batch_id], map_batch).optional()?;
        Ok(batch)
    }

    async fn list_recent(&self, limit: usize) -> RepositoryResult<Vec<ImportBatchRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM import_batch ORDER BY imported_at DESC, rowid DESC LIMIT ?1",
            BATCH_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let batches = stmt
            .query_map(params![limit as i64], map_batch)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(batches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn setup() -> ImportBatchRepositoryImpl {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        ImportBatchRepositoryImpl::from_connection(Arc::new(Mutex::new(conn)))
    }

    fn sample_batch(batch_id: &str, dry_run: bool) -> ImportBatchRecord {
        ImportBatchRecord {
            batch_id: batch_id.to_string(),
            file_name: Some("prices.xlsx".to_string()),
            strategy: ImportStrategy::Smart,
            dry_run,
            total_rows: 5,
            created_rows: 2,
            updated_rows: 1,
            skipped_rows: 1,
            invalid_rows: 1,
            error_rows: 0,
            fatal_error: None,
            imported_at: Utc::now(),
            elapsed_ms: 12,
            summary_json: Some("{}".to_string()),
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let repo = setup();
        repo.insert_batch(&sample_batch("b-1", true)).await.unwrap();

        let loaded = repo.get_batch("b-1").await.unwrap().unwrap();
        assert!(loaded.dry_run);
        assert_eq!(loaded.created_rows, 2);
        assert_eq!(loaded.strategy, ImportStrategy::Smart);
        assert!(repo.get_batch("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_recent_newest_first() {
        let repo = setup();
        repo.insert_batch(&sample_batch("b-1", true)).await.unwrap();
        repo.insert_batch(&sample_batch("b-2", false)).await.unwrap();
        repo.insert_batch(&sample_batch("b-3", false)).await.unwrap();

        let recent = repo.list_recent(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].batch_id, "b-3");
    }
}
