// ==========================================
// 服务报价目录导入系统 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入模块所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::domain::types::{CommitMode, ImportStrategy};
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入模块所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    /// 默认导入策略
    ///
    /// # 默认值
    /// - smart
    async fn get_default_strategy(&self) -> RepositoryResult<ImportStrategy>;

    /// 未显式指定时是否只做校验（dry run）
    ///
    /// # 默认值
    /// - true
    async fn get_default_dry_run(&self) -> RepositoryResult<bool>;

    /// 提交模式
    ///
    /// # 默认值
    /// - per_row
    async fn get_commit_mode(&self) -> RepositoryResult<CommitMode>;

    /// 品牌通用报价的 model 取值（大小写不敏感；空 model 始终视为通用）
    ///
    /// # 默认值
    /// - ["generic"]
    async fn get_generic_model_aliases(&self) -> RepositoryResult<Vec<String>>;

    /// 单批最大数据行数（超过则拒绝整个文件）
    ///
    /// # 默认值
    /// - 10000
    async fn get_max_rows_per_batch(&self) -> RepositoryResult<usize>;
}
