// ==========================================
// 服务报价目录导入系统 - 表头映射器实现
// ==========================================
// 职责: 源表头 → 标准字段
// 规则:
// - Standard 策略只认导入模板列名（精确匹配，忽略首尾空白）
// - 其余策略额外识别大小写 / 空格 / 下划线变体及别名（URL → Link 等）
// - 同一字段命中多个表头时: 非空值优先，其次精确列名，其次表头字典序
// ==========================================

use crate::domain::catalog::OfferField;
use crate::domain::import::{MappedRow, RawCell, RawRow};
use crate::domain::types::ImportStrategy;
use crate::importer::catalog_importer_trait::HeaderMapper as HeaderMapperTrait;
use std::cmp::Ordering;

pub struct HeaderMapper;

impl HeaderMapper {
    /// 表头压缩形式：小写并去掉空白 / 下划线 / 连字符
    fn compact(header: &str) -> String {
        header
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect()
    }

    /// 识别单个表头
    pub fn resolve_header(header: &str, strategy: ImportStrategy) -> Option<OfferField> {
        let trimmed = header.trim();

        if let Some(field) = OfferField::ALL
            .iter()
            .copied()
            .find(|f| f.import_label() == trimmed)
        {
            return Some(field);
        }

        if !strategy.column_mapping() {
            return None;
        }

        match Self::compact(trimmed).as_str() {
            "brand" => Some(OfferField::Brand),
            "model" => Some(OfferField::Model),
            "type" => Some(OfferField::Type),
            "productname" => Some(OfferField::ProductName),
            "beforeprice" => Some(OfferField::BeforePrice),
            "afterprice" => Some(OfferField::AfterPrice),
            "discountprice" | "discountedprice" => Some(OfferField::DiscountedPrice),
            "link" | "url" => Some(OfferField::Link),
            _ => None,
        }
    }

    /// 同一字段多个候选表头时的优先级（Less 优先）
    fn candidate_order(a: (&str, &RawCell), b: (&str, &RawCell), field: OfferField) -> Ordering {
        let rank = |(header, cell): (&str, &RawCell)| {
            (
                cell.is_blank(),
                header.trim() != field.import_label(),
                header.to_string(),
            )
        };
        rank(a).cmp(&rank(b))
    }
}

impl HeaderMapperTrait for HeaderMapper {
    fn map_row(&self, row: &RawRow, strategy: ImportStrategy) -> MappedRow {
        let mut mapped = MappedRow::new();
        let mut chosen_header: std::collections::BTreeMap<OfferField, &str> = Default::default();

        for (header, cell) in row {
            let Some(field) = Self::resolve_header(header, strategy) else {
                continue;
            };

            let replace = match chosen_header.get(&field) {
                None => true,
                Some(current) => {
                    let current_cell = &mapped[&field];
                    Self::candidate_order((header.as_str(), cell), (*current, current_cell), field)
                        == Ordering::Less
                }
            };

            if replace {
                chosen_header.insert(field, header.as_str());
                mapped.insert(field, cell.clone());
            }
        }

        mapped
    }
}
