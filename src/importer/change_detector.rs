// ==========================================
// 服务报价目录导入系统 - 变更检测器实现
// ==========================================
// 职责: 已有记录 vs 标准化行 → 字段级变更集
// 比对字段: type / before_price / after_price / discounted_price / link
// 规则:
// - 价格按数值比较（两位小数口径）
// - 缺省 与 0 不同：缺省→缺省 无变化；缺省→0、0→缺省 均为变化
// - 文本去首尾空白后比较，大小写敏感
// - 输入中不存在的列不参与比对
// ==========================================

use crate::domain::catalog::{CatalogRecord, FieldValue, OfferField};
use crate::domain::import::{ChangeEntry, NormalizedRow};
use crate::importer::catalog_importer_trait::ChangeDetector as ChangeDetectorTrait;

/// 价格比较容差（值已量化到两位小数）
const PRICE_EPSILON: f64 = 1e-9;

pub struct ChangeDetector;

impl ChangeDetector {
    /// 类型感知的相等判断
    pub fn values_equal(old: &FieldValue, new: &FieldValue) -> bool {
        match (old, new) {
            (FieldValue::Price(a), FieldValue::Price(b)) => (a - b).abs() < PRICE_EPSILON,
            (FieldValue::Text(a), FieldValue::Text(b)) => a.trim() == b.trim(),
            (FieldValue::Absent, FieldValue::Absent) => true,
            _ => false,
        }
    }
}

impl ChangeDetectorTrait for ChangeDetector {
    fn detect_changes(&self, existing: &CatalogRecord, row: &NormalizedRow) -> Vec<ChangeEntry> {
        OfferField::COMPARED
            .iter()
            .copied()
            .filter(|field| row.is_present(*field))
            .filter_map(|field| {
                let old = existing.value_of(field);
                let new = row.fields.value_of(field);
                if Self::values_equal(&old, &new) {
                    None
                } else {
                    Some(ChangeEntry { field, old, new })
                }
            })
            .collect()
    }
}
