// ==========================================
// 服务报价目录导入系统 - 行标准化实现
// ==========================================
// 职责: TRIM / 数值强制转换 / NULL 标准化
// 规则:
// - 文本字段去首尾空白，缺列视为空串
// - before_price / after_price: 空白或无法解析 → 0（无法解析的记入 malformed）
// - discounted_price: 空白 → 缺省（不是 0）；无法解析 → 缺省 + 警告
// - 价格统一保留两位小数；量化后超出 decimal(10,2) 范围按无法解析处理
// 红线: 不报错，校验交给引擎
// ==========================================

use crate::domain::catalog::{is_storable_price, quantize_price, OfferField, OfferFields};
use crate::domain::import::{MappedRow, NormalizedRow, RawCell};
use crate::importer::catalog_importer_trait::RowNormalizer as RowNormalizerTrait;
use std::collections::BTreeSet;
use tracing::warn;

pub struct RowNormalizer;

/// 价格单元格解析结果
#[derive(Debug, Clone, Copy, PartialEq)]
enum PriceCell {
    Blank,
    Value(f64),
    Malformed,
}

impl RowNormalizer {
    /// 文本字段：TRIM，缺列 / 空白 → 空串
    pub fn clean_text(cell: Option<&RawCell>) -> String {
        cell.map(RawCell::as_text).unwrap_or_default()
    }

    fn parse_price(cell: Option<&RawCell>) -> PriceCell {
        match cell {
            None => PriceCell::Blank,
            Some(c) if c.is_blank() => PriceCell::Blank,
            Some(c) => match c.as_number().map(quantize_price) {
                Some(v) if is_storable_price(v) => PriceCell::Value(v),
                _ => PriceCell::Malformed,
            },
        }
    }
}

impl RowNormalizerTrait for RowNormalizer {
    fn normalize(&self, row: &MappedRow, row_number: usize) -> NormalizedRow {
        let text = |field: OfferField| Self::clean_text(row.get(&field));

        let mut malformed = Vec::new();
        let mut required_price = |field: OfferField| match Self::parse_price(row.get(&field)) {
            PriceCell::Blank => 0.0,
            PriceCell::Value(v) => v,
            PriceCell::Malformed => {
                malformed.push(field);
                0.0
            }
        };

        let before_price = required_price(OfferField::BeforePrice);
        let after_price = required_price(OfferField::AfterPrice);

        let discounted_price = match Self::parse_price(row.get(&OfferField::DiscountedPrice)) {
            PriceCell::Blank => None,
            PriceCell::Value(v) => Some(v),
            PriceCell::Malformed => {
                warn!(
                    row_number = row_number,
                    raw_value = %Self::clean_text(row.get(&OfferField::DiscountedPrice)),
                    "折扣价无法解析，按缺省处理"
                );
                None
            }
        };

        let fields = OfferFields {
            brand: text(OfferField::Brand),
            model: text(OfferField::Model),
            offer_type: text(OfferField::Type),
            product_name: text(OfferField::ProductName),
            before_price,
            after_price,
            discounted_price,
            link: text(OfferField::Link),
        };

        NormalizedRow {
            row_number,
            fields,
            present: row.keys().copied().collect::<BTreeSet<_>>(),
            malformed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapped(pairs: &[(OfferField, RawCell)]) -> MappedRow {
        pairs.iter().cloned().collect()
    }

    #[test]
    fn test_trim_and_parse() {
        let row = mapped(&[
            (OfferField::Brand, RawCell::Text("  Toyota ".to_string())),
            (OfferField::ProductName, RawCell::Text("Oil Change  ".to_string())),
            (OfferField::BeforePrice, RawCell::Text(" 89.99 ".to_string())),
            (OfferField::AfterPrice, RawCell::Number(69.99)),
            (OfferField::DiscountedPrice, RawCell::Text("59.99".to_string())),
        ]);

        let normalized = RowNormalizer.normalize(&row, 1);

        assert_eq!(normalized.fields.brand, "Toyota");
        assert_eq!(normalized.fields.product_name, "Oil Change");
        assert_eq!(normalized.fields.model, "");
        assert_eq!(normalized.fields.before_price, 89.99);
        assert_eq!(normalized.fields.after_price, 69.99);
        assert_eq!(normalized.fields.discounted_price, Some(59.99));
        assert!(normalized.malformed.is_empty());
        assert!(!normalized.is_present(OfferField::Model));
    }

    #[test]
    fn test_blank_prices() {
        let row = mapped(&[
            (OfferField::BeforePrice, RawCell::Empty),
            (OfferField::AfterPrice, RawCell::Text("   ".to_string())),
            (OfferField::DiscountedPrice, RawCell::Empty),
        ]);

        let normalized = RowNormalizer.normalize(&row, 2);

        assert_eq!(normalized.fields.before_price, 0.0);
        assert_eq!(normalized.fields.after_price, 0.0);
        assert_eq!(normalized.fields.discounted_price, None);
        assert!(normalized.malformed.is_empty());
        assert!(normalized.is_present(OfferField::DiscountedPrice));
    }

    #[test]
    fn test_zero_discount_is_not_absent() {
        let row = mapped(&[(OfferField::DiscountedPrice, RawCell::Number(0.0))]);
        let normalized = RowNormalizer.normalize(&row, 1);
        assert_eq!(normalized.fields.discounted_price, Some(0.0));
    }

    #[test]
    fn test_malformed_prices() {
        let row = mapped(&[
            (OfferField::BeforePrice, RawCell::Text("abc".to_string())),
            (OfferField::AfterPrice, RawCell::Text("12".to_string())),
            (OfferField::DiscountedPrice, RawCell::Text("n/a".to_string())),
        ]);

        let normalized = RowNormalizer.normalize(&row, 3);

        assert_eq!(normalized.fields.before_price, 0.0);
        assert_eq!(normalized.malformed, vec![OfferField::BeforePrice]);
        assert_eq!(normalized.fields.discounted_price, None);
    }

    #[test]
    fn test_out_of_range_prices_are_malformed() {
        let row = mapped(&[
            (OfferField::BeforePrice, RawCell::Text("1e307".to_string())),
            (OfferField::AfterPrice, RawCell::Number(100_000_000.0)),
            (OfferField::DiscountedPrice, RawCell::Number(1e308)),
        ]);

        let normalized = RowNormalizer.normalize(&row, 1);

        assert_eq!(
            normalized.malformed,
            vec![OfferField::BeforePrice, OfferField::AfterPrice]
        );
        assert_eq!(normalized.fields.before_price, 0.0);
        assert_eq!(normalized.fields.discounted_price, None);
    }

    #[test]
    fn test_max_price_is_accepted() {
        let row = mapped(&[(OfferField::AfterPrice, RawCell::Text("99999999.99".to_string()))]);
        let normalized = RowNormalizer.normalize(&row, 1);
        assert!(normalized.malformed.is_empty());
        assert_eq!(normalized.fields.after_price, 99_999_999.99);
    }

    #[test]
    fn test_quantize_two_decimals() {
        let row = mapped(&[(OfferField::AfterPrice, RawCell::Text("169.994".to_string()))]);
        let normalized = RowNormalizer.normalize(&row, 1);
        assert_eq!(normalized.fields.after_price, 169.99);
    }

    #[test]
    fn test_numeric_text_cells() {
        let row = mapped(&[(OfferField::Model, RawCell::Number(3.0))]);
        let normalized = RowNormalizer.normalize(&row, 1);
        assert_eq!(normalized.fields.model, "3");
    }
}
