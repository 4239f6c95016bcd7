// ==========================================
// 服务报价目录导入系统 - 目录 Repository Trait
// ==========================================
// 职责: 定义目录数据访问接口（不包含业务逻辑）
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::domain::catalog::{CatalogFilter, CatalogRecord, IdentityKey, OfferFields};
use crate::domain::import::ChangeEntry;
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;

// ==========================================
// CatalogRepository Trait
// ==========================================
// 用途: 导入引擎的存储协作者
// 实现者: CatalogRepositoryImpl（使用 rusqlite）
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    // ===== 身份查找 =====

    /// 按身份三元组查找（大小写不敏感，含停用记录）
    ///
    /// # 返回
    /// - Ok(Some): 命中（多条命中时取存储顺序第一条）
    /// - Ok(None): 未命中
    async fn find_by_identity(&self, key: &IdentityKey) -> RepositoryResult<Option<CatalogRecord>>;

    // ===== 写入 =====

    /// 新建记录
    ///
    /// # 错误
    /// - UniqueConstraintViolation: 身份三元组已存在
    async fn create(&self, fields: &OfferFields) -> RepositoryResult<CatalogRecord>;

    /// 将变更集就地应用到已有记录
    ///
    /// # 返回
    /// - 更新后的记录
    async fn update(
        &self,
        existing: &CatalogRecord,
        changes: &[ChangeEntry],
    ) -> RepositoryResult<CatalogRecord>;

    // ===== 事务作用域（可嵌套，基于 SAVEPOINT）=====

    async fn begin_scope(&self, name: &str) -> RepositoryResult<()>;

    async fn commit_scope(&self, name: &str) -> RepositoryResult<()>;

    async fn rollback_scope(&self, name: &str) -> RepositoryResult<()>;

    // ===== 查询 =====

    /// 按过滤条件列出启用记录（brand, model, type, product_name 排序）
    async fn list_active(&self, filter: &CatalogFilter) -> RepositoryResult<Vec<CatalogRecord>>;

    /// 列出全部记录（含停用，导出用）
    async fn list_all(&self) -> RepositoryResult<Vec<CatalogRecord>>;

    /// 报价解析：先找车型专属启用记录，再回退到品牌通用记录
    ///
    /// # 参数
    /// - generic_models: 视为"通用"的 model 取值（已折叠）；空 model 始终视为通用
    async fn resolve_price(
        &self,
        brand: &str,
        model: &str,
        product_name: &str,
        generic_models: &[String],
    ) -> RepositoryResult<Option<CatalogRecord>>;

    /// 记录总数
    async fn count(&self) -> RepositoryResult<i64>;
}
