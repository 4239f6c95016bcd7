// ==========================================
// 服务报价目录导入系统 - 导入层
// ==========================================
// 职责: 外部报价表导入，判定新建 / 更新 / 跳过 / 无效
// 支持: Excel (.xlsx/.xls), CSV
// ==========================================

// 模块声明
pub mod batch_reporter;
pub mod catalog_importer_trait;
pub mod change_detector;
pub mod error;
pub mod file_parser;
pub mod header_mapper;
pub mod key_resolver;
pub mod row_normalizer;
pub mod upsert_engine;

// 重导出核心类型
pub use batch_reporter::{render_message, BatchReporter};
pub use change_detector::ChangeDetector as ChangeDetectorImpl;
pub use error::{ImportError, ImportResult, RowError};
pub use file_parser::{CsvParser, ExcelParser, UniversalFileParser};
pub use header_mapper::HeaderMapper as HeaderMapperImpl;
pub use key_resolver::KeyResolver;
pub use row_normalizer::RowNormalizer as RowNormalizerImpl;
pub use upsert_engine::CatalogImporterImpl;

// 重导出 Trait 接口
pub use catalog_importer_trait::{
    CatalogImporter, ChangeDetector, FileParser, HeaderMapper, RowNormalizer,
};
