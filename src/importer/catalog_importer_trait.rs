// ==========================================
// 服务报价目录导入系统 - 目录导入 Trait
// ==========================================
// 职责: 定义导入管道各阶段接口（不包含实现）
// 管道: 解析 → 表头映射 → 行标准化 → 身份解析 → 变更检测 → 判定/落库 → 汇总
// ==========================================

use crate::domain::catalog::CatalogRecord;
use crate::domain::import::{
    ChangeEntry, ImportOptions, ImportReport, ImportSummary, MappedRow, NormalizedRow, RawRow,
};
use crate::domain::types::ImportStrategy;
use crate::importer::error::ImportResult;
use async_trait::async_trait;
use std::path::Path;

// ==========================================
// CatalogImporter Trait
// ==========================================
// 用途: 目录导入主接口
// 实现者: CatalogImporterImpl
#[async_trait]
pub trait CatalogImporter: Send + Sync {
    /// 导入一批原始行（调用方已完成文件解析）
    ///
    /// # 返回
    /// - Ok(ImportSummary): 行级结果汇总；存储不可用时 fatal_error 有值，其后的行未处理
    /// - Err: 批次级错误（超出单批上限、配置读取失败）
    ///
    /// # 流程（逐行、按输入顺序）
    /// 1. 表头映射 + 行标准化
    /// 2. 身份校验（brand / product_name 非空）
    /// 3. 价格校验（before / after 非负且可解析）
    /// 4. 身份解析（大小写不敏感）
    /// 5. 未命中 → 新建；命中 → 变更检测 → 跳过 / 更新
    /// 6. 非 dry run 时在行级事务作用域内落库
    async fn import_rows(
        &self,
        rows: Vec<RawRow>,
        options: ImportOptions,
    ) -> ImportResult<ImportSummary>;

    /// 从文件导入（.xlsx / .xls / .csv），并记录导入批次
    async fn import_file(&self, file_path: &Path, options: ImportOptions)
        -> ImportResult<ImportReport>;
}

// ==========================================
// FileParser Trait
// ==========================================
// 用途: 文件解析接口（阶段 0）
// 实现者: ExcelParser, CsvParser, UniversalFileParser
pub trait FileParser: Send + Sync {
    /// 解析为原始行（跳过完全空白的行）
    fn parse_to_raw_rows(&self, file_path: &Path) -> ImportResult<Vec<RawRow>>;
}

// ==========================================
// HeaderMapper Trait
// ==========================================
// 用途: 表头 → 标准字段（阶段 1）
// 实现者: HeaderMapper
pub trait HeaderMapper: Send + Sync {
    fn map_row(&self, row: &RawRow, strategy: ImportStrategy) -> MappedRow;
}

// ==========================================
// RowNormalizer Trait
// ==========================================
// 用途: 行标准化（阶段 2），纯函数，不报错
// 实现者: RowNormalizer
pub trait RowNormalizer: Send + Sync {
    fn normalize(&self, row: &MappedRow, row_number: usize) -> NormalizedRow;
}

// ==========================================
// ChangeDetector Trait
// ==========================================
// 用途: 已有记录与标准化行的字段级比对
// 实现者: ChangeDetector
pub trait ChangeDetector: Send + Sync {
    /// 无差异时返回空列表
    fn detect_changes(&self, existing: &CatalogRecord, row: &NormalizedRow) -> Vec<ChangeEntry>;
}
