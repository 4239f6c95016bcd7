// ==========================================
// 服务报价目录导入系统 - 身份解析器
// ==========================================
// 职责: 提取身份三元组 + 大小写不敏感查找已有记录
// 生命周期: 每个批次一个实例
// dry run: 维护内存叠加层（本批次"将要"新建/更新的记录），
//          保证批次内后续行能看到前面行的效果，且不写库
// ==========================================

use crate::domain::catalog::{CatalogRecord, IdentityKey, OfferFields};
use crate::domain::import::NormalizedRow;
use crate::domain::types::ImportStrategy;
use crate::importer::error::RowError;
use crate::repository::catalog_repo::CatalogRepository;
use crate::repository::error::RepositoryResult;
use chrono::Utc;
use std::collections::HashMap;

type FoldedKey = (String, String, String);

pub struct KeyResolver {
    lookup_enabled: bool,
    overlay: Option<HashMap<FoldedKey, CatalogRecord>>,
}

impl KeyResolver {
    pub fn new(strategy: ImportStrategy, dry_run: bool) -> Self {
        Self {
            lookup_enabled: strategy.identity_lookup(),
            overlay: dry_run.then(HashMap::new),
        }
    }

    /// 提取身份三元组；brand 或 product_name 为空 → MissingIdentity（model 可空）
    pub fn extract(row: &NormalizedRow) -> Result<IdentityKey, RowError> {
        if row.has_identity() {
            Ok(row.identity())
        } else {
            Err(RowError::MissingIdentity)
        }
    }

    /// 按策略解析；AlwaysNew 直接返回未命中
    pub async fn resolve<R>(&self, repo: &R, key: &IdentityKey) -> RepositoryResult<Option<CatalogRecord>>
    where
        R: CatalogRepository + ?Sized,
    {
        if !self.lookup_enabled {
            return Ok(None);
        }
        self.probe(repo, key).await
    }

    /// 无视策略的查找（叠加层优先，其次存储）
    pub async fn probe<R>(&self, repo: &R, key: &IdentityKey) -> RepositoryResult<Option<CatalogRecord>>
    where
        R: CatalogRepository + ?Sized,
    {
        if let Some(record) = self
            .overlay
            .as_ref()
            .and_then(|overlay| overlay.get(&key.folded()))
        {
            return Ok(Some(record.clone()));
        }
        repo.find_by_identity(key).await
    }

    /// dry run 下记录"将要新建"的记录（id = 0 表示尚未落库）
    pub fn remember_created(&mut self, fields: &OfferFields) {
        if let Some(overlay) = self.overlay.as_mut() {
            let now = Utc::now();
            let record = CatalogRecord {
                id: 0,
                brand: fields.brand.clone(),
                model: fields.model.clone(),
                offer_type: fields.offer_type.clone(),
                product_name: fields.product_name.clone(),
                before_price: fields.before_price,
                after_price: fields.after_price,
                discounted_price: fields.discounted_price,
                link: fields.link.clone(),
                is_active: true,
                created_at: now,
                updated_at: now,
            };
            overlay.insert(fields.identity().folded(), record);
        }
    }

    /// dry run 下记录"将要更新"后的记录
    pub fn remember_updated(&mut self, record: CatalogRecord) {
        if let Some(overlay) = self.overlay.as_mut() {
            overlay.insert(record.identity().folded(), record);
        }
    }
}
