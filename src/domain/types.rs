// ==========================================
// 服务报价目录导入系统 - 领域类型定义
// ==========================================
// 职责: 导入策略 / 提交模式 / 行处理结果等枚举
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 导入策略 (Import Strategy)
// ==========================================
// 同一个导入引擎，通过策略开关控制：
// - identity_lookup: 是否按身份三元组查找已有记录
// - column_mapping: 是否启用列名别名映射
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ImportStrategy {
    #[default]
    Smart,     // 查找 + 映射（默认）
    Mapping,   // 查找 + 映射
    Standard,  // 查找，仅识别标准列名
    AlwaysNew, // 跳过查找，全部新建
}

impl ImportStrategy {
    /// 是否执行身份查找（AlwaysNew 直接短路为"未匹配"）
    pub fn identity_lookup(&self) -> bool {
        !matches!(self, ImportStrategy::AlwaysNew)
    }

    /// 是否启用列名别名映射
    pub fn column_mapping(&self) -> bool {
        !matches!(self, ImportStrategy::Standard)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStrategy::Smart => "smart",
            ImportStrategy::Mapping => "mapping",
            ImportStrategy::Standard => "standard",
            ImportStrategy::AlwaysNew => "always_new",
        }
    }
}

impl fmt::Display for ImportStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ImportStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "smart" => Ok(ImportStrategy::Smart),
            "mapping" => Ok(ImportStrategy::Mapping),
            "standard" => Ok(ImportStrategy::Standard),
            "always_new" | "alwaysnew" => Ok(ImportStrategy::AlwaysNew),
            other => Err(format!(
                "unknown import strategy: '{}' (expected smart/mapping/standard/always_new)",
                other
            )),
        }
    }
}

// ==========================================
// 提交模式 (Commit Mode)
// ==========================================
// PerRow: 每行独立事务（默认）
// Batch:  整批外层事务，出错行回滚到自身保存点，其余行最后一并提交
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CommitMode {
    #[default]
    PerRow,
    Batch,
}

impl CommitMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitMode::PerRow => "per_row",
            CommitMode::Batch => "batch",
        }
    }
}

impl fmt::Display for CommitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CommitMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "per_row" | "row" => Ok(CommitMode::PerRow),
            "batch" => Ok(CommitMode::Batch),
            other => Err(format!(
                "unknown commit mode: '{}' (expected per_row/batch)",
                other
            )),
        }
    }
}

// ==========================================
// 行处理结果 (Row Action)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowAction {
    Created, // 新建
    Updated, // 更新
    Skipped, // 无变化跳过
    Invalid, // 校验不通过
    Error,   // 写入失败（行级）
}

impl fmt::Display for RowAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowAction::Created => write!(f, "CREATED"),
            RowAction::Updated => write!(f, "UPDATED"),
            RowAction::Skipped => write!(f, "SKIPPED"),
            RowAction::Invalid => write!(f, "INVALID"),
            RowAction::Error => write!(f, "ERROR"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_flags() {
        assert!(ImportStrategy::Smart.identity_lookup());
        assert!(ImportStrategy::Smart.column_mapping());
        assert!(ImportStrategy::Standard.identity_lookup());
        assert!(!ImportStrategy::Standard.column_mapping());
        assert!(!ImportStrategy::AlwaysNew.identity_lookup());
        assert!(ImportStrategy::AlwaysNew.column_mapping());
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("SMART".parse::<ImportStrategy>(), Ok(ImportStrategy::Smart));
        assert_eq!(
            "always-new".parse::<ImportStrategy>(),
            Ok(ImportStrategy::AlwaysNew)
        );
        assert!("bulk".parse::<ImportStrategy>().is_err());
    }

    #[test]
    fn test_commit_mode_from_str() {
        assert_eq!("per-row".parse::<CommitMode>(), Ok(CommitMode::PerRow));
        assert_eq!("batch".parse::<CommitMode>(), Ok(CommitMode::Batch));
        assert_eq!(CommitMode::default(), CommitMode::PerRow);
    }

    #[test]
    fn test_row_action_serde() {
        let json = serde_json::to_string(&RowAction::Skipped).unwrap();
        assert_eq!(json, "\"skipped\"");
    }
}
