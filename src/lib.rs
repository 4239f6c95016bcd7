// ==========================================
// 服务报价目录导入系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 报价表导入、对账与增量写入（默认只校验）
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "en");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 导入层 - 解析 / 标准化 / 判定 / 汇总
pub mod importer;

// 配置层 - 导入默认参数
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{CommitMode, ImportStrategy, RowAction};

// 领域实体
pub use domain::{CatalogRecord, IdentityKey, ImportOptions, ImportSummary, OfferFields};

// 导入引擎
pub use importer::{CatalogImporter, CatalogImporterImpl};

// API
pub use api::{ImportApi, ImportApiResponse};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "offer-catalog-import";
