// ==========================================
// 服务报价目录导入系统 - 导入领域模型
// ==========================================
// 职责: 原始行 / 标准化行 / 变更明细 / 行结果 / 批次汇总
// 生命周期: 除 ImportBatchRecord 外均仅存在于一次导入流程内
// ==========================================

use crate::domain::catalog::{FieldValue, IdentityKey, OfferField, OfferFields};
use crate::domain::types::{CommitMode, ImportStrategy, RowAction};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

// ==========================================
// RawCell - 原始单元格
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawCell {
    Number(f64),
    Text(String),
    Empty,
}

impl RawCell {
    /// 空单元格或纯空白文本
    pub fn is_blank(&self) -> bool {
        match self {
            RawCell::Empty => true,
            RawCell::Text(s) => s.trim().is_empty(),
            RawCell::Number(_) => false,
        }
    }

    /// 转为去空白文本；整数值不带小数部分（表格里的 "3" 常被读成 3.0）
    pub fn as_text(&self) -> String {
        match self {
            RawCell::Empty => String::new(),
            RawCell::Text(s) => s.trim().to_string(),
            RawCell::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
        }
    }

    /// 解析为数值；空白或无法解析返回 None
    pub fn as_number(&self) -> Option<f64> {
        match self {
            RawCell::Empty => None,
            RawCell::Number(n) if n.is_finite() => Some(*n),
            RawCell::Number(_) => None,
            RawCell::Text(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite()),
        }
    }
}

impl From<&str> for RawCell {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            RawCell::Empty
        } else {
            RawCell::Text(value.to_string())
        }
    }
}

impl From<String> for RawCell {
    fn from(value: String) -> Self {
        RawCell::from(value.as_str())
    }
}

impl From<f64> for RawCell {
    fn from(value: f64) -> Self {
        RawCell::Number(value)
    }
}

impl<T: Into<RawCell>> From<Option<T>> for RawCell {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(RawCell::Empty)
    }
}

/// 原始行（列名 → 单元格），列名为文件中的原始表头
pub type RawRow = HashMap<String, RawCell>;

/// 表头映射后的行（标准字段 → 单元格）
pub type MappedRow = BTreeMap<OfferField, RawCell>;

// ==========================================
// NormalizedRow - 标准化行
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub row_number: usize,
    pub fields: OfferFields,
    /// 输入中实际出现的字段（未出现的字段不参与比对、不覆盖已有值）
    pub present: BTreeSet<OfferField>,
    /// 非空但无法解析的价格字段
    pub malformed: Vec<OfferField>,
}

impl NormalizedRow {
    pub fn identity(&self) -> IdentityKey {
        self.fields.identity()
    }

    /// brand 与 product_name 均非空
    pub fn has_identity(&self) -> bool {
        !self.fields.brand.is_empty() && !self.fields.product_name.is_empty()
    }

    pub fn is_present(&self, field: OfferField) -> bool {
        self.present.contains(&field)
    }
}

// ==========================================
// ChangeEntry - 字段级变更
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEntry {
    pub field: OfferField,
    pub old: FieldValue,
    pub new: FieldValue,
}

impl std::fmt::Display for ChangeEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} → {}", self.field, self.old, self.new)
    }
}

// ==========================================
// ImportOutcome - 单行处理结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub row_number: usize,
    pub action: RowAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<IdentityKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<ChangeEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<OfferFields>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ImportOutcome {
    pub fn created(row_number: usize, record_id: Option<i64>, data: OfferFields) -> Self {
        Self {
            row_number,
            action: RowAction::Created,
            identity: Some(data.identity()),
            record_id,
            changes: Vec::new(),
            data: Some(data),
            reason: None,
        }
    }

    pub fn updated(
        row_number: usize,
        identity: IdentityKey,
        record_id: Option<i64>,
        changes: Vec<ChangeEntry>,
    ) -> Self {
        Self {
            row_number,
            action: RowAction::Updated,
            identity: Some(identity),
            record_id,
            changes,
            data: None,
            reason: None,
        }
    }

    pub fn skipped(
        row_number: usize,
        identity: IdentityKey,
        record_id: Option<i64>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            row_number,
            action: RowAction::Skipped,
            identity: Some(identity),
            record_id,
            changes: Vec::new(),
            data: None,
            reason: Some(reason.into()),
        }
    }

    pub fn invalid(
        row_number: usize,
        identity: Option<IdentityKey>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            row_number,
            action: RowAction::Invalid,
            identity,
            record_id: None,
            changes: Vec::new(),
            data: None,
            reason: Some(reason.into()),
        }
    }

    pub fn error(
        row_number: usize,
        identity: Option<IdentityKey>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            row_number,
            action: RowAction::Error,
            identity,
            record_id: None,
            changes: Vec::new(),
            data: None,
            reason: Some(reason.into()),
        }
    }
}

// ==========================================
// ImportTotals - 分类计数
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportTotals {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub invalid: usize,
    pub error: usize,
}

impl ImportTotals {
    pub fn total(&self) -> usize {
        self.created + self.updated + self.skipped + self.invalid + self.error
    }
}

// ==========================================
// 汇总明细条目
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedEntry {
    pub row_number: usize,
    #[serde(flatten)]
    pub identity: IdentityKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<i64>,
    pub data: OfferFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdatedEntry {
    pub row_number: usize,
    #[serde(flatten)]
    pub identity: IdentityKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<i64>,
    pub changes: Vec<ChangeEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedEntry {
    pub row_number: usize,
    #[serde(flatten)]
    pub identity: IdentityKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<i64>,
    pub reason: String,
}

/// 无效行 / 写入失败行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowIssue {
    pub row_number: usize,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<IdentityKey>,
}

// ==========================================
// ImportSummary - 批次汇总
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub totals: ImportTotals,
    pub total_rows: usize,
    pub created: Vec<CreatedEntry>,
    pub updated: Vec<UpdatedEntry>,
    pub skipped: Vec<SkippedEntry>,
    pub invalid: Vec<RowIssue>,
    pub errors: Vec<RowIssue>,
    /// 致命错误（存储不可用），出现时其后的行未处理
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fatal_error: Option<String>,
}

impl ImportSummary {
    /// 存在行级写入失败或致命错误
    pub fn has_errors(&self) -> bool {
        self.totals.error > 0 || self.fatal_error.is_some()
    }
}

// ==========================================
// ImportOptions - 导入参数
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOptions {
    pub dry_run: bool,
    pub strategy: ImportStrategy,
    pub commit_mode: CommitMode,
}

impl Default for ImportOptions {
    /// 默认只做校验（dry run），与上传接口默认行为一致
    fn default() -> Self {
        Self {
            dry_run: true,
            strategy: ImportStrategy::Smart,
            commit_mode: CommitMode::PerRow,
        }
    }
}

impl ImportOptions {
    pub fn commit() -> Self {
        Self {
            dry_run: false,
            ..Self::default()
        }
    }

    pub fn dry_run() -> Self {
        Self::default()
    }

    pub fn with_strategy(mut self, strategy: ImportStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_commit_mode(mut self, commit_mode: CommitMode) -> Self {
        self.commit_mode = commit_mode;
        self
    }
}

// ==========================================
// ImportReport - 文件导入结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub batch_id: String,
    pub file_name: Option<String>,
    pub options: ImportOptions,
    pub summary: ImportSummary,
    pub elapsed_ms: u64,
}

// ==========================================
// ImportBatchRecord - 导入批次记录（持久化）
// ==========================================
// 对齐: import_batch 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportBatchRecord {
    pub batch_id: String,
    pub file_name: Option<String>,
    pub strategy: ImportStrategy,
    pub dry_run: bool,
    pub total_rows: i64,
    pub created_rows: i64,
    pub updated_rows: i64,
    pub skipped_rows: i64,
    pub invalid_rows: i64,
    pub error_rows: i64,
    pub fatal_error: Option<String>,
    pub imported_at: DateTime<Utc>,
    pub elapsed_ms: i64,
    pub summary_json: Option<String>,
}
