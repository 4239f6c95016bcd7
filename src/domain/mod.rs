// ==========================================
// 服务报价目录导入系统 - 领域模型层
// ==========================================
// 职责: 定义目录实体、导入过程类型、枚举
// 红线: 不含数据访问逻辑,不含导入流程逻辑
// ==========================================

pub mod catalog;
pub mod import;
pub mod types;

// 重导出核心类型
pub use catalog::{
    is_storable_price, quantize_price, CatalogFilter, CatalogRecord, FieldValue, IdentityKey, OfferField, OfferFields,
};
pub use import::{
    ChangeEntry, CreatedEntry, ImportBatchRecord, ImportOptions, ImportOutcome, ImportReport,
    ImportSummary, ImportTotals, MappedRow, NormalizedRow, RawCell, RawRow, RowIssue, SkippedEntry,
    UpdatedEntry,
};
pub use types::{CommitMode, ImportStrategy, RowAction};
