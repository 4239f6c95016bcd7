// ==========================================
// 服务报价目录导入系统 - 目录领域模型
// ==========================================
// 职责: 目录记录 / 身份三元组 / 字段定义
// 红线: type 不属于身份，只参与变更比对
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// decimal(10,2) 可表示的最大价格
pub const MAX_PRICE: f64 = 99_999_999.99;

/// 价格统一保留两位小数（与目录表 decimal(10,2) 口径一致）
pub fn quantize_price(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// 量化后落在 decimal(10,2) 范围内才可入库；负数交给引擎判为非法价格
pub fn is_storable_price(value: f64) -> bool {
    value.is_finite() && value.abs() <= MAX_PRICE
}

// ==========================================
// OfferField - 可导入字段
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferField {
    Brand,
    Model,
    Type,
    ProductName,
    BeforePrice,
    AfterPrice,
    DiscountedPrice,
    Link,
}

impl OfferField {
    /// 全部字段（按导入模板列顺序）
    pub const ALL: [OfferField; 8] = [
        OfferField::Brand,
        OfferField::Model,
        OfferField::Type,
        OfferField::ProductName,
        OfferField::BeforePrice,
        OfferField::AfterPrice,
        OfferField::DiscountedPrice,
        OfferField::Link,
    ];

    /// 参与变更比对的字段（身份字段除外）
    pub const COMPARED: [OfferField; 5] = [
        OfferField::Type,
        OfferField::BeforePrice,
        OfferField::AfterPrice,
        OfferField::DiscountedPrice,
        OfferField::Link,
    ];

    /// 内部字段名（snake_case，与数据库列一致）
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferField::Brand => "brand",
            OfferField::Model => "model",
            OfferField::Type => "type",
            OfferField::ProductName => "product_name",
            OfferField::BeforePrice => "before_price",
            OfferField::AfterPrice => "after_price",
            OfferField::DiscountedPrice => "discounted_price",
            OfferField::Link => "link",
        }
    }

    /// 导入模板列名
    pub fn import_label(&self) -> &'static str {
        match self {
            OfferField::Brand => "Brand",
            OfferField::Model => "Model",
            OfferField::Type => "Type",
            OfferField::ProductName => "Product Name",
            OfferField::BeforePrice => "Before Price",
            OfferField::AfterPrice => "After Price",
            OfferField::DiscountedPrice => "Discount Price",
            OfferField::Link => "Link",
        }
    }

    /// 导出列名（折扣价列与导入模板不同）
    pub fn export_label(&self) -> &'static str {
        match self {
            OfferField::DiscountedPrice => "Discounted Price",
            other => other.import_label(),
        }
    }

    pub fn is_price(&self) -> bool {
        matches!(
            self,
            OfferField::BeforePrice | OfferField::AfterPrice | OfferField::DiscountedPrice
        )
    }
}

impl fmt::Display for OfferField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// FieldValue - 字段取值（变更明细用）
// ==========================================
// 序列化: 数值 → number，文本 → string，缺省 → null
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Price(f64),
    Text(String),
    Absent,
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Price(v) => write!(f, "{:.2}", v),
            FieldValue::Text(s) => write!(f, "{}", s),
            FieldValue::Absent => write!(f, "null"),
        }
    }
}

// ==========================================
// IdentityKey - 身份三元组
// ==========================================
// 比较口径: 去首尾空白 + 大小写折叠
// model 允许为空（品牌通用报价）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityKey {
    pub brand: String,
    pub model: String,
    pub product_name: String,
}

impl IdentityKey {
    pub fn new(
        brand: impl Into<String>,
        model: impl Into<String>,
        product_name: impl Into<String>,
    ) -> Self {
        Self {
            brand: brand.into(),
            model: model.into(),
            product_name: product_name.into(),
        }
    }

    /// 折叠单个身份分量（Unicode 小写）
    pub fn fold(value: &str) -> String {
        value.trim().to_lowercase()
    }

    /// 折叠后的三元组，用作唯一索引与内存查找键
    pub fn folded(&self) -> (String, String, String) {
        (
            Self::fold(&self.brand),
            Self::fold(&self.model),
            Self::fold(&self.product_name),
        )
    }

    /// 大小写不敏感比较
    pub fn matches(&self, other: &IdentityKey) -> bool {
        self.folded() == other.folded()
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.model.is_empty() {
            write!(f, "{} - {}", self.brand, self.product_name)
        } else {
            write!(f, "{} {} - {}", self.brand, self.model, self.product_name)
        }
    }
}

// ==========================================
// OfferFields - 报价字段集合（新建记录的载荷）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct OfferFields {
    pub brand: String,
    pub model: String,
    #[serde(rename = "type")]
    pub offer_type: String,
    pub product_name: String,
    pub before_price: f64,
    pub after_price: f64,
    pub discounted_price: Option<f64>,
    pub link: String,
}

impl OfferFields {
    pub fn identity(&self) -> IdentityKey {
        IdentityKey::new(&self.brand, &self.model, &self.product_name)
    }

    /// 读取字段值（价格按两位小数口径）
    pub fn value_of(&self, field: OfferField) -> FieldValue {
        match field {
            OfferField::Brand => FieldValue::Text(self.brand.clone()),
            OfferField::Model => FieldValue::Text(self.model.clone()),
            OfferField::Type => FieldValue::Text(self.offer_type.clone()),
            OfferField::ProductName => FieldValue::Text(self.product_name.clone()),
            OfferField::BeforePrice => FieldValue::Price(quantize_price(self.before_price)),
            OfferField::AfterPrice => FieldValue::Price(quantize_price(self.after_price)),
            OfferField::DiscountedPrice => match self.discounted_price {
                Some(v) => FieldValue::Price(quantize_price(v)),
                None => FieldValue::Absent,
            },
            OfferField::Link => FieldValue::Text(self.link.clone()),
        }
    }
}

// ==========================================
// CatalogRecord - 目录记录（持久化）
// ==========================================
// 对齐: catalog_record 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub id: i64,
    pub brand: String,
    pub model: String,
    #[serde(rename = "type")]
    pub offer_type: String,
    pub product_name: String,
    pub before_price: f64,
    pub after_price: f64,
    pub discounted_price: Option<f64>,
    pub link: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CatalogRecord {
    pub fn identity(&self) -> IdentityKey {
        IdentityKey::new(&self.brand, &self.model, &self.product_name)
    }

    /// 拷贝出字段集合
    pub fn fields(&self) -> OfferFields {
        OfferFields {
            brand: self.brand.clone(),
            model: self.model.clone(),
            offer_type: self.offer_type.clone(),
            product_name: self.product_name.clone(),
            before_price: self.before_price,
            after_price: self.after_price,
            discounted_price: self.discounted_price,
            link: self.link.clone(),
        }
    }

    pub fn value_of(&self, field: OfferField) -> FieldValue {
        self.fields().value_of(field)
    }

    /// 就地写入单个字段；值类型与字段不符时忽略
    pub fn apply_value(&mut self, field: OfferField, value: &FieldValue) {
        match (field, value) {
            (OfferField::Type, FieldValue::Text(s)) => self.offer_type = s.clone(),
            (OfferField::Link, FieldValue::Text(s)) => self.link = s.clone(),
            (OfferField::Brand, FieldValue::Text(s)) => self.brand = s.clone(),
            (OfferField::Model, FieldValue::Text(s)) => self.model = s.clone(),
            (OfferField::ProductName, FieldValue::Text(s)) => self.product_name = s.clone(),
            (OfferField::BeforePrice, FieldValue::Price(v)) => self.before_price = *v,
            (OfferField::AfterPrice, FieldValue::Price(v)) => self.after_price = *v,
            (OfferField::DiscountedPrice, FieldValue::Price(v)) => {
                self.discounted_price = Some(*v)
            }
            (OfferField::DiscountedPrice, FieldValue::Absent) => self.discounted_price = None,
            _ => {}
        }
    }
}

// ==========================================
// CatalogFilter - 目录列表过滤条件
// ==========================================
// brand/model/type 为子串匹配（大小写不敏感）
// search 同时匹配 brand/model/type/product_name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFilter {
    pub brand: Option<String>,
    pub model: Option<String>,
    pub offer_type: Option<String>,
    pub search: Option<String>,
}

impl CatalogFilter {
    pub fn matches(&self, record: &CatalogRecord) -> bool {
        fn contains(haystack: &str, needle: &Option<String>) -> bool {
            match needle.as_deref().map(str::trim) {
                None | Some("") => true,
                Some(n) => haystack.to_lowercase().contains(&n.to_lowercase()),
            }
        }

        let search_hit = match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(s) => {
                let s = s.to_lowercase();
                [
                    &record.brand,
                    &record.model,
                    &record.offer_type,
                    &record.product_name,
                ]
                .iter()
                .any(|v| v.to_lowercase().contains(&s))
            }
        };

        record.is_active
            && contains(&record.brand, &self.brand)
            && contains(&record.model, &self.model)
            && contains(&record.offer_type, &self.offer_type)
            && search_hit
    }
}
