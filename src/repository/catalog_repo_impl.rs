// ==========================================
// 服务报价目录导入系统 - 目录 Repository 实现
// ==========================================
// 职责: 实现目录数据访问（使用 rusqlite）
// 红线: Repository 不含业务规则，只做数据 CRUD
// 事务: SAVEPOINT 作用域，可在外层批次事务内嵌套行级作用域
// ==========================================

use crate::db::open_and_init;
use crate::domain::catalog::{
    CatalogFilter, CatalogRecord, FieldValue, IdentityKey, OfferField, OfferFields,
};
use crate::domain::import::ChangeEntry;
use crate::repository::catalog_repo::CatalogRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

const RECORD_COLUMNS: &str = "id, brand, model, type, product_name, before_price, after_price, \
     discounted_price, link, is_active, created_at, updated_at";

fn map_record(row: &Row<'_>) -> rusqlite::Result<CatalogRecord> {
    Ok(CatalogRecord {
        id: row.get(0)?,
        brand: row.get(1)?,
        model: row.get(2)?,
        offer_type: row.get(3)?,
        product_name: row.get(4)?,
        before_price: row.get(5)?,
        after_price: row.get(6)?,
        discounted_price: row.get(7)?,
        link: row.get(8)?,
        is_active: row.get::<_, i64>(9)? != 0,
        created_at: row.get::<_, DateTime<Utc>>(10)?,
        updated_at: row.get::<_, DateTime<Utc>>(11)?,
    })
}

/// SAVEPOINT 名称不能参数化，只允许 [A-Za-z0-9_]
fn check_scope_name(name: &str) -> RepositoryResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(RepositoryError::FieldValueError {
            field: "scope_name".to_string(),
            message: format!("非法的事务作用域名称: {}", name),
        })
    }
}

/// 变更字段 → (列名, SQL 值)；身份字段不允许经由 update 修改
fn change_to_column(change: &ChangeEntry) -> RepositoryResult<(&'static str, Value)> {
    let value = match (&change.field, &change.new) {
        (OfferField::Type, FieldValue::Text(s)) | (OfferField::Link, FieldValue::Text(s)) => {
            Value::Text(s.clone())
        }
        (f, FieldValue::Price(v)) if f.is_price() => Value::Real(*v),
        (OfferField::DiscountedPrice, FieldValue::Absent) => Value::Null,
        (field, new) => {
            return Err(RepositoryError::FieldValueError {
                field: field.as_str().to_string(),
                message: format!("不支持的变更值: {:?}", new),
            })
        }
    };
    Ok((change.field.as_str(), value))
}

// ==========================================
// CatalogRepositoryImpl
// ==========================================
pub struct CatalogRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl CatalogRepositoryImpl {
    /// 创建新的 Repository 实例（打开连接并建表）
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_and_init(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn find_by_id(conn: &Connection, id: i64) -> RepositoryResult<CatalogRecord> {
        let sql = format!("SELECT {} FROM catalog_record WHERE id = ?1", RECORD_COLUMNS);
        conn.query_row(&sql, params![id], map_record)
            .optional()?
            .ok_or_else(|| RepositoryError::NotFound(format!("catalog_record id={}", id)))
    }
}

#[async_trait]
impl CatalogRepository for CatalogRepositoryImpl {
    async fn find_by_identity(&self, key: &IdentityKey) -> RepositoryResult<Option<CatalogRecord>> {
        let (brand_ci, model_ci, product_ci) = key.folded();
        let conn = self.get_conn()?;

        let sql = format!(
            "SELECT {} FROM catalog_record \
             WHERE brand_ci = ?1 AND model_ci = ?2 AND product_name_ci = ?3 \
             ORDER BY id LIMIT 1",
            RECORD_COLUMNS
        );
        let record = conn
            .query_row(&sql, params![brand_ci, model_ci, product_ci], map_record)
            .optional()?;

        Ok(record)
    }

    async fn create(&self, fields: &OfferFields) -> RepositoryResult<CatalogRecord> {
        let (brand_ci, model_ci, product_ci) = fields.identity().folded();
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        let conn = self.get_conn()?;

        conn.execute(
            r#"
            INSERT INTO catalog_record (
                brand, model, type, product_name,
                brand_ci, model_ci, product_name_ci,
                before_price, after_price, discounted_price, link,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 1, ?12, ?12)
            "#,
            params![
                fields.brand,
                fields.model,
                fields.offer_type,
                fields.product_name,
                brand_ci,
                model_ci,
                product_ci,
                fields.before_price,
                fields.after_price,
                fields.discounted_price,
                fields.link,
                now,
            ],
        )?;

        let id = conn.last_insert_rowid();
        Self::find_by_id(&conn, id)
    }

    async fn update(
        &self,
        existing: &CatalogRecord,
        changes: &[ChangeEntry],
    ) -> RepositoryResult<CatalogRecord> {
        let conn = self.get_conn()?;
        if changes.is_empty() {
            return Self::find_by_id(&conn, existing.id);
        }

        let mut assignments = Vec::with_capacity(changes.len() + 1);
        let mut values: Vec<Value> = Vec::with_capacity(changes.len() + 2);
        for change in changes {
            let (column, value) = change_to_column(change)?;
            values.push(value);
            assignments.push(format!("{} = ?{}", column, values.len()));
        }
        values.push(Value::Text(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)));
        assignments.push(format!("updated_at = ?{}", values.len()));
        values.push(Value::Integer(existing.id));

        let sql = format!(
            "UPDATE catalog_record SET {} WHERE id = ?{}",
            assignments.join(", "),
            values.len()
        );
        let affected = conn.execute(&sql, params_from_iter(values))?;
        if affected == 0 {
            return Err(RepositoryError::NotFound(format!(
                "catalog_record id={}",
                existing.id
            )));
        }

        Self::find_by_id(&conn, existing.id)
    }

    async fn begin_scope(&self, name: &str) -> RepositoryResult<()> {
        check_scope_name(name)?;
        let conn = self.get_conn()?;
        conn.execute_batch(&format!("SAVEPOINT {}", name))?;
        Ok(())
    }

    async fn commit_scope(&self, name: &str) -> RepositoryResult<()> {
        check_scope_name(name)?;
        let conn = self.get_conn()?;
        conn.execute_batch(&format!("RELEASE SAVEPOINT {}", name))?;
        Ok(())
    }

    async fn rollback_scope(&self, name: &str) -> RepositoryResult<()> {
        check_scope_name(name)?;
        let conn = self.get_conn()?;
        // ROLLBACK TO 不结束保存点，需要再 RELEASE
        conn.execute_batch(&format!(
            "ROLLBACK TO SAVEPOINT {0}; RELEASE SAVEPOINT {0}",
            name
        ))?;
        Ok(())
    }

    async fn list_active(&self, filter: &CatalogFilter) -> RepositoryResult<Vec<CatalogRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM catalog_record WHERE is_active = 1 \
             ORDER BY brand, model, type, product_name",
            RECORD_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map([], map_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        // 子串匹配在 Rust 侧做，保证非 ASCII 的大小写折叠
        Ok(records.into_iter().filter(|r| filter.matches(r)).collect())
    }

    async fn list_all(&self) -> RepositoryResult<Vec<CatalogRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM catalog_record ORDER BY brand, model, type, product_name",
            RECORD_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map([], map_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    async fn resolve_price(
        &self,
        brand: &str,
        model: &str,
        product_name: &str,
        generic_models: &[String],
    ) -> RepositoryResult<Option<CatalogRecord>> {
        let brand_ci = IdentityKey::fold(brand);
        let model_ci = IdentityKey::fold(model);
        let product_ci = IdentityKey::fold(product_name);

        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {}, model_ci FROM catalog_record \
             WHERE brand_ci = ?1 AND product_name_ci = ?2 AND is_active = 1 \
             ORDER BY id",
            RECORD_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let candidates = stmt
            .query_map(params![brand_ci, product_ci], |row| {
                Ok((map_record(row)?, row.get::<_, String>(12)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        // 1. 车型专属
        if !model_ci.is_empty() {
            if let Some((record, _)) = candidates.iter().find(|(_, m)| *m == model_ci) {
                return Ok(Some(record.clone()));
            }
        }

        // 2. 品牌通用（model 为空或为通用别名）
        let generic = candidates
            .into_iter()
            .find(|(_, m)| m.is_empty() || generic_models.iter().any(|g| g == m))
            .map(|(record, _)| record);

        Ok(generic)
    }

    async fn count(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM catalog_record", [], |row| row.get(0))?;
        Ok(count)
    }
}
