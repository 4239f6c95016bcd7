// ==========================================
// 服务报价目录导入系统 - 批次汇总器
// ==========================================
// 职责: 按输入顺序累计行结果 → 分类计数 + 明细列表
// 约束: 任意时刻可取 totals / details 快照（不改变内部状态）；允许 0 行
// ==========================================

use crate::domain::catalog::IdentityKey;
use crate::domain::import::{
    CreatedEntry, ImportOutcome, ImportSummary, ImportTotals, RowIssue, SkippedEntry, UpdatedEntry,
};
use crate::domain::types::RowAction;
use crate::i18n::t_with_args;

#[derive(Debug, Clone, Default)]
pub struct BatchReporter {
    summary: ImportSummary,
    processed: usize,
}

impl BatchReporter {
    /// total_rows: 本批次输入行数（含因致命错误未处理的行）
    pub fn new(total_rows: usize) -> Self {
        Self {
            summary: ImportSummary {
                total_rows,
                ..Default::default()
            },
            processed: 0,
        }
    }

    /// 记录单行结果
    pub fn record(&mut self, outcome: ImportOutcome) {
        self.processed += 1;
        let summary = &mut self.summary;
        let identity = outcome.identity.clone();

        match outcome.action {
            RowAction::Created => {
                summary.totals.created += 1;
                let data = outcome.data.unwrap_or_default();
                summary.created.push(CreatedEntry {
                    row_number: outcome.row_number,
                    identity: identity.unwrap_or_else(|| data.identity()),
                    record_id: outcome.record_id,
                    data,
                });
            }
            RowAction::Updated => {
                summary.totals.updated += 1;
                summary.updated.push(UpdatedEntry {
                    row_number: outcome.row_number,
                    identity: identity.unwrap_or_else(empty_identity),
                    record_id: outcome.record_id,
                    changes: outcome.changes,
                });
            }
            RowAction::Skipped => {
                summary.totals.skipped += 1;
                summary.skipped.push(SkippedEntry {
                    row_number: outcome.row_number,
                    identity: identity.unwrap_or_else(empty_identity),
                    record_id: outcome.record_id,
                    reason: outcome.reason.unwrap_or_default(),
                });
            }
            RowAction::Invalid => {
                summary.totals.invalid += 1;
                summary.invalid.push(RowIssue {
                    row_number: outcome.row_number,
                    reason: outcome.reason.unwrap_or_default(),
                    identity,
                });
            }
            RowAction::Error => {
                summary.totals.error += 1;
                summary.errors.push(RowIssue {
                    row_number: outcome.row_number,
                    reason: outcome.reason.unwrap_or_default(),
                    identity,
                });
            }
        }
    }

    /// 记录致命错误（后续行不再处理）
    pub fn record_fatal(&mut self, message: impl Into<String>) {
        self.summary.fatal_error = Some(message.into());
    }

    /// 已处理行数
    pub fn processed(&self) -> usize {
        self.processed
    }

    /// 计数快照
    pub fn totals(&self) -> ImportTotals {
        self.summary.totals
    }

    /// 明细快照
    pub fn details(&self) -> ImportSummary {
        self.summary.clone()
    }

    pub fn finish(self) -> ImportSummary {
        self.summary
    }
}

fn empty_identity() -> IdentityKey {
    IdentityKey::new("", "", "")
}

/// 面向用户的结果描述（按当前语言）
pub fn render_message(summary: &ImportSummary, dry_run: bool) -> String {
    let totals = &summary.totals;

    if let Some(reason) = &summary.fatal_error {
        return t_with_args(
            "import.aborted",
            &[
                ("processed", &totals.total().to_string()),
                ("total", &summary.total_rows.to_string()),
                ("reason", reason),
            ],
        );
    }

    if totals.error > 0 {
        return t_with_args(
            "import.completed_with_errors",
            &[("count", &totals.error.to_string())],
        );
    }

    let part_keys: [(&str, usize); 4] = if dry_run {
        [
            ("import.part.to_create", totals.created),
            ("import.part.to_update", totals.updated),
            ("import.part.to_skip", totals.skipped),
            ("import.part.invalid", totals.invalid),
        ]
    } else {
        [
            ("import.part.created", totals.created),
            ("import.part.updated", totals.updated),
            ("import.part.skipped", totals.skipped),
            ("import.part.invalid", totals.invalid),
        ]
    };

    let parts: Vec<String> = part_keys
        .iter()
        .filter(|(_, count)| *count > 0)
        .map(|(key, count)| t_with_args(key, &[("count", &count.to_string())]))
        .collect();

    if dry_run {
        let details = if parts.is_empty() {
            t_with_args("import.no_changes", &[])
        } else {
            parts.join(", ")
        };
        t_with_args("import.dry_run_success", &[("details", &details)])
    } else {
        let details = if parts.is_empty() {
            t_with_args("import.no_operations", &[])
        } else {
            parts.join(", ")
        };
        t_with_args("import.commit_success", &[("details", &details)])
    }
}
