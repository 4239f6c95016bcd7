// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、CSV 生成、导入器组装、故障仓储
// ==========================================
#![allow(dead_code)]

use async_trait::async_trait;
use offer_catalog_import::config::ConfigManager;
use offer_catalog_import::db::open_and_init;
use offer_catalog_import::domain::{
    CatalogFilter, CatalogRecord, ChangeEntry, IdentityKey, OfferFields, RawCell, RawRow,
};
use offer_catalog_import::importer::CatalogImporterImpl;
use offer_catalog_import::repository::{
    CatalogRepository, CatalogRepositoryImpl, ImportBatchRepositoryImpl, RepositoryError,
    RepositoryResult,
};
use rusqlite::Connection;
use std::error::Error;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

pub type TestImporter =
    CatalogImporterImpl<CatalogRepositoryImpl, ImportBatchRepositoryImpl, ConfigManager>;

/// 导入模板表头
pub const HEADER: &str =
    "Brand,Model,Type,Product Name,Before Price,After Price,Discount Price,Link";

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时文件路径不是合法 UTF-8")?
        .to_string();

    open_and_init(&db_path)?;

    Ok((temp_file, db_path))
}

/// 打开共享连接（schema 已存在）
pub fn open_shared(db_path: &str) -> Arc<Mutex<Connection>> {
    Arc::new(Mutex::new(open_and_init(db_path).expect("打开测试数据库失败")))
}

/// 组装使用默认组件的导入器
pub fn build_importer(conn: Arc<Mutex<Connection>>) -> TestImporter {
    CatalogImporterImpl::with_defaults(
        CatalogRepositoryImpl::from_connection(conn.clone()),
        ImportBatchRepositoryImpl::from_connection(conn.clone()),
        ConfigManager::from_connection(conn).expect("创建 ConfigManager 失败"),
    )
}

/// 写入临时 CSV 文件（首行为表头）
pub fn write_csv(lines: &[&str]) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".csv")
        .tempfile()
        .expect("创建临时 CSV 失败");
    for line in lines {
        writeln!(file, "{}", line).expect("写入临时 CSV 失败");
    }
    file.flush().expect("刷新临时 CSV 失败");
    file
}

/// 由 (表头, 值) 构造原始行
pub fn raw_row(pairs: &[(&str, &str)]) -> RawRow {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), RawCell::from(*v)))
        .collect()
}

/// 完整模板行
pub fn offer_row(
    brand: &str,
    model: &str,
    offer_type: &str,
    product_name: &str,
    before_price: &str,
    after_price: &str,
    discount_price: &str,
) -> RawRow {
    raw_row(&[
        ("Brand", brand),
        ("Model", model),
        ("Type", offer_type),
        ("Product Name", product_name),
        ("Before Price", before_price),
        ("After Price", after_price),
        ("Discount Price", discount_price),
        ("Link", ""),
    ])
}

/// 目录全表快照（用于 dry run 前后比对）
pub async fn snapshot(repo: &CatalogRepositoryImpl) -> Vec<CatalogRecord> {
    repo.list_all().await.expect("读取目录失败")
}

// ==========================================
// FailingCatalogRepository - 故障注入仓储
// ==========================================
// 前 fail_after 次 create 正常落库，之后返回"存储不可用"
pub struct FailingCatalogRepository {
    inner: CatalogRepositoryImpl,
    fail_after: usize,
    creates: AtomicUsize,
}

impl FailingCatalogRepository {
    pub fn new(inner: CatalogRepositoryImpl, fail_after: usize) -> Self {
        Self {
            inner,
            fail_after,
            creates: AtomicUsize::new(0),
        }
    }

    fn unavailable() -> RepositoryError {
        RepositoryError::DatabaseConnectionError("disk I/O error".to_string())
    }
}

#[async_trait]
impl CatalogRepository for FailingCatalogRepository {
    async fn find_by_identity(&self, key: &IdentityKey) -> RepositoryResult<Option<CatalogRecord>> {
        self.inner.find_by_identity(key).await
    }

    async fn create(&self, fields: &OfferFields) -> RepositoryResult<CatalogRecord> {
        if self.creates.fetch_add(1, Ordering::SeqCst) >= self.fail_after {
            return Err(Self::unavailable());
        }
        self.inner.create(fields).await
    }

    async fn update(
        &self,
        existing: &CatalogRecord,
        changes: &[ChangeEntry],
    ) -> RepositoryResult<CatalogRecord> {
        self.inner.update(existing, changes).await
    }

    async fn begin_scope(&self, name: &str) -> RepositoryResult<()> {
        self.inner.begin_scope(name).await
    }

    async fn commit_scope(&self, name: &str) -> RepositoryResult<()> {
        self.inner.commit_scope(name).await
    }

    async fn rollback_scope(&self, name: &str) -> RepositoryResult<()> {
        self.inner.rollback_scope(name).await
    }

    async fn list_active(&self, filter: &CatalogFilter) -> RepositoryResult<Vec<CatalogRecord>> {
        self.inner.list_active(filter).await
    }

    async fn list_all(&self) -> RepositoryResult<Vec<CatalogRecord>> {
        self.inner.list_all().await
    }

    async fn resolve_price(
        &self,
        brand: &str,
        model: &str,
        product_name: &str,
        generic_models: &[String],
    ) -> RepositoryResult<Option<CatalogRecord>> {
        self.inner
            .resolve_price(brand, model, product_name, generic_models)
            .await
    }

    async fn count(&self) -> RepositoryResult<i64> {
        self.inner.count().await
    }
}
