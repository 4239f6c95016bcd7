// ==========================================
// 服务报价目录导入系统 - 导入引擎（行判定 / 落库）
// ==========================================
// 职责: 整合导入流程，逐行判定并落库
// 流程: 映射 → 标准化 → 身份校验 → 价格校验 → 身份解析 → 变更检测 → 判定/落库 → 汇总
// 事务:
// - 每行写入在独立 SAVEPOINT（row_{n}）内，失败只回滚本行
// - CommitMode::Batch 额外包一层 batch_import，批次结束统一提交
// 红线: 单行失败不中断批次；只有存储不可用才终止
// ==========================================

use crate::config::ImportConfigReader;
use crate::domain::catalog::{CatalogRecord, IdentityKey};
use crate::domain::import::{
    ImportBatchRecord, ImportOptions, ImportOutcome, ImportReport, ImportSummary, NormalizedRow,
    RawRow,
};
use crate::domain::types::CommitMode;
use crate::importer::batch_reporter::BatchReporter;
use crate::importer::catalog_importer_trait::{
    CatalogImporter, ChangeDetector, FileParser, HeaderMapper, RowNormalizer,
};
use crate::importer::change_detector::ChangeDetector as DefaultChangeDetector;
use crate::importer::error::{ImportError, ImportResult, RowError};
use crate::importer::file_parser::UniversalFileParser;
use crate::importer::header_mapper::HeaderMapper as DefaultHeaderMapper;
use crate::importer::key_resolver::KeyResolver;
use crate::importer::row_normalizer::RowNormalizer as DefaultRowNormalizer;
use crate::repository::catalog_repo::CatalogRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::import_batch_repo::ImportBatchRepository;
use async_trait::async_trait;
use chrono::Utc;
use std::future::Future;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

const BATCH_SCOPE: &str = "batch_import";
const NO_CHANGES_REASON: &str = "no changes detected";
const IDENTITY_EXISTS_REASON: &str = "identity already exists";

fn row_scope(row_number: usize) -> String {
    format!("row_{}", row_number)
}

/// dry run 叠加层中的记录 id 为 0，不对外暴露
fn known_id(record: &CatalogRecord) -> Option<i64> {
    (record.id > 0).then_some(record.id)
}

// ==========================================
// CatalogImporterImpl - 目录导入引擎
// ==========================================
pub struct CatalogImporterImpl<R, B, C>
where
    R: CatalogRepository,
    B: ImportBatchRepository,
    C: ImportConfigReader,
{
    // 数据访问层
    catalog_repo: R,
    batch_repo: B,

    // 配置读取器
    config: C,

    // 导入组件
    file_parser: Box<dyn FileParser>,
    header_mapper: Box<dyn HeaderMapper>,
    row_normalizer: Box<dyn RowNormalizer>,
    change_detector: Box<dyn ChangeDetector>,
}

impl<R, B, C> CatalogImporterImpl<R, B, C>
where
    R: CatalogRepository,
    B: ImportBatchRepository,
    C: ImportConfigReader,
{
    /// 创建导入引擎（自定义组件）
    pub fn new(
        catalog_repo: R,
        batch_repo: B,
        config: C,
        file_parser: Box<dyn FileParser>,
        header_mapper: Box<dyn HeaderMapper>,
        row_normalizer: Box<dyn RowNormalizer>,
        change_detector: Box<dyn ChangeDetector>,
    ) -> Self {
        Self {
            catalog_repo,
            batch_repo,
            config,
            file_parser,
            header_mapper,
            row_normalizer,
            change_detector,
        }
    }

    /// 使用默认组件创建导入引擎
    pub fn with_defaults(catalog_repo: R, batch_repo: B, config: C) -> Self {
        Self::new(
            catalog_repo,
            batch_repo,
            config,
            Box::new(UniversalFileParser),
            Box::new(DefaultHeaderMapper),
            Box::new(DefaultRowNormalizer),
            Box::new(DefaultChangeDetector),
        )
    }

    pub fn catalog_repo(&self) -> &R {
        &self.catalog_repo
    }

    // ==========================================
    // 单行处理
    // ==========================================
    // 返回 Err 仅表示存储不可用（致命），其余情况都落到某个行结果
    async fn process_row(
        &self,
        resolver: &mut KeyResolver,
        raw: &RawRow,
        row_number: usize,
        options: &ImportOptions,
    ) -> RepositoryResult<ImportOutcome> {
        let mapped = self.header_mapper.map_row(raw, options.strategy);
        let row = self.row_normalizer.normalize(&mapped, row_number);

        let key = match KeyResolver::extract(&row) {
            Ok(key) => key,
            Err(e) => return Ok(ImportOutcome::invalid(row_number, None, e.to_string())),
        };

        if let Err(e) = Self::validate_prices(&row) {
            return Ok(ImportOutcome::invalid(row_number, Some(key), e.to_string()));
        }

        let existing = match resolver.resolve(&self.catalog_repo, &key).await {
            Ok(found) => found,
            Err(e) => return Self::storage_failure(e, row_number, Some(key)),
        };

        match existing {
            None => self.create_row(resolver, row, key, options).await,
            Some(record) => self.update_row(resolver, row, record, options).await,
        }
    }

    /// before_price / after_price 必须可解析且非负
    fn validate_prices(row: &NormalizedRow) -> Result<(), RowError> {
        let fields = &row.fields;
        if !row.malformed.is_empty() || fields.before_price < 0.0 || fields.after_price < 0.0 {
            return Err(RowError::InvalidPrice);
        }
        Ok(())
    }

    async fn create_row(
        &self,
        resolver: &mut KeyResolver,
        row: NormalizedRow,
        key: IdentityKey,
        options: &ImportOptions,
    ) -> RepositoryResult<ImportOutcome> {
        let row_number = row.row_number;

        if options.dry_run {
            // AlwaysNew 跳过了身份解析，这里预判落库时的唯一约束冲突
            if !options.strategy.identity_lookup() {
                match resolver.probe(&self.catalog_repo, &key).await {
                    Ok(Some(_)) => {
                        return Ok(ImportOutcome::error(
                            row_number,
                            Some(key),
                            IDENTITY_EXISTS_REASON,
                        ))
                    }
                    Ok(None) => {}
                    Err(e) => return Self::storage_failure(e, row_number, Some(key)),
                }
            }
            resolver.remember_created(&row.fields);
            return Ok(ImportOutcome::created(row_number, None, row.fields));
        }

        let scope = row_scope(row_number);
        let written = self
            .run_in_scope(&scope, || self.catalog_repo.create(&row.fields))
            .await;
        match written {
            Ok(record) => Ok(ImportOutcome::created(row_number, Some(record.id), row.fields)),
            Err(e) => Self::storage_failure(e, row_number, Some(key)),
        }
    }

    async fn update_row(
        &self,
        resolver: &mut KeyResolver,
        row: NormalizedRow,
        existing: CatalogRecord,
        options: &ImportOptions,
    ) -> RepositoryResult<ImportOutcome> {
        let row_number = row.row_number;
        let identity = existing.identity();
        let record_id = known_id(&existing);

        let changes = self.change_detector.detect_changes(&existing, &row);
        if changes.is_empty() {
            return Ok(ImportOutcome::skipped(
                row_number,
                identity,
                record_id,
                NO_CHANGES_REASON,
            ));
        }

        if options.dry_run {
            let mut preview = existing;
            for change in &changes {
                preview.apply_value(change.field, &change.new);
            }
            resolver.remember_updated(preview);
            return Ok(ImportOutcome::updated(row_number, identity, record_id, changes));
        }

        let scope = row_scope(row_number);
        let written = self
            .run_in_scope(&scope, || self.catalog_repo.update(&existing, &changes))
            .await;
        match written {
            Ok(record) => Ok(ImportOutcome::updated(
                row_number,
                identity,
                Some(record.id),
                changes,
            )),
            Err(e) => Self::storage_failure(e, row_number, Some(identity)),
        }
    }

    /// 在命名作用域内执行一次写入；失败回滚到作用域起点
    async fn run_in_scope<T, F, Fut>(&self, scope: &str, op: F) -> RepositoryResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RepositoryResult<T>>,
    {
        self.catalog_repo.begin_scope(scope).await?;

        let result = match op().await {
            Ok(value) => self.catalog_repo.commit_scope(scope).await.map(|_| value),
            Err(e) => Err(e),
        };

        if result.is_err() {
            if let Err(rollback_err) = self.catalog_repo.rollback_scope(scope).await {
                warn!(scope = scope, error = %rollback_err, "作用域回滚失败");
            }
        }

        result
    }

    /// 存储错误分级：不可用 → 致命；其余 → 行级 ERROR
    fn storage_failure(
        err: RepositoryError,
        row_number: usize,
        identity: Option<IdentityKey>,
    ) -> RepositoryResult<ImportOutcome> {
        if err.is_unavailable() {
            return Err(err);
        }
        if err.is_constraint() {
            warn!(row_number = row_number, error = %err, "行写入违反约束，记为行级错误");
            // 唯一索引冲突与 dry run 的预判口径一致
            let reason = match err {
                RepositoryError::UniqueConstraintViolation(_) => IDENTITY_EXISTS_REASON.to_string(),
                other => other.to_string(),
            };
            return Ok(ImportOutcome::error(row_number, identity, reason));
        }
        warn!(row_number = row_number, error = %err, "行写入失败，继续处理后续行");
        Ok(ImportOutcome::error(row_number, identity, err.to_string()))
    }
}

#[async_trait]
impl<R, B, C> CatalogImporter for CatalogImporterImpl<R, B, C>
where
    R: CatalogRepository,
    B: ImportBatchRepository,
    C: ImportConfigReader,
{
    #[instrument(
        skip(self, rows),
        fields(
            rows = rows.len(),
            dry_run = options.dry_run,
            strategy = options.strategy.as_str()
        )
    )]
    async fn import_rows(
        &self,
        rows: Vec<RawRow>,
        options: ImportOptions,
    ) -> ImportResult<ImportSummary> {
        let start_time = Instant::now();

        let limit = self.config.get_max_rows_per_batch().await?;
        if rows.len() > limit {
            return Err(ImportError::TooManyRows {
                rows: rows.len(),
                limit,
            });
        }

        let mut resolver = KeyResolver::new(options.strategy, options.dry_run);
        let mut reporter = BatchReporter::new(rows.len());
        let mut fatal: Option<String> = None;

        let outer_scope = !options.dry_run && options.commit_mode == CommitMode::Batch;
        if outer_scope {
            if let Err(e) = self.catalog_repo.begin_scope(BATCH_SCOPE).await {
                error!(error = %e, "批次作用域开启失败");
                reporter.record_fatal(e.to_string());
                return Ok(reporter.finish());
            }
        }

        for (idx, raw) in rows.iter().enumerate() {
            let row_number = idx + 1;
            match self
                .process_row(&mut resolver, raw, row_number, &options)
                .await
            {
                Ok(outcome) => {
                    debug!(
                        row_number = row_number,
                        action = %outcome.action,
                        "行处理完成"
                    );
                    reporter.record(outcome);
                }
                Err(e) => {
                    error!(row_number = row_number, error = %e, "存储不可用，终止批次");
                    fatal = Some(e.to_string());
                    break;
                }
            }
        }

        if outer_scope {
            if let Err(e) = self.catalog_repo.commit_scope(BATCH_SCOPE).await {
                error!(error = %e, "批次提交失败");
                if let Err(rollback_err) = self.catalog_repo.rollback_scope(BATCH_SCOPE).await {
                    warn!(error = %rollback_err, "批次回滚失败");
                }
                fatal = Some(match fatal {
                    Some(reason) => format!("{}; 批次提交失败: {}", reason, e),
                    None => format!("批次提交失败: {}", e),
                });
            }
        }

        if let Some(reason) = fatal {
            reporter.record_fatal(reason);
        }

        let totals = reporter.totals();
        info!(
            processed = reporter.processed(),
            created = totals.created,
            updated = totals.updated,
            skipped = totals.skipped,
            invalid = totals.invalid,
            error = totals.error,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "批次处理完成"
        );

        Ok(reporter.finish())
    }

    #[instrument(skip(self, file_path, options), fields(batch_id))]
    async fn import_file(
        &self,
        file_path: &Path,
        options: ImportOptions,
    ) -> ImportResult<ImportReport> {
        let start_time = Instant::now();
        let batch_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("batch_id", batch_id.as_str());

        let file_name = file_path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string);
        info!(
            batch_id = %batch_id,
            file_path = %file_path.display(),
            dry_run = options.dry_run,
            "开始导入报价目录"
        );

        // === 步骤 1: 解析文件 ===
        let raw_rows = self.file_parser.parse_to_raw_rows(file_path).map_err(|e| {
            error!(error = %e, "文件解析失败");
            e
        })?;
        debug!(total_rows = raw_rows.len(), "文件解析完成");

        // === 步骤 2: 逐行导入 ===
        let summary = self.import_rows(raw_rows, options).await?;
        let elapsed_ms = start_time.elapsed().as_millis() as u64;

        // === 步骤 3: 记录批次 ===
        let totals = summary.totals;
        let batch = ImportBatchRecord {
            batch_id: batch_id.clone(),
            file_name: file_name.clone(),
            strategy: options.strategy,
            dry_run: options.dry_run,
            total_rows: summary.total_rows as i64,
            created_rows: totals.created as i64,
            updated_rows: totals.updated as i64,
            skipped_rows: totals.skipped as i64,
            invalid_rows: totals.invalid as i64,
            error_rows: totals.error as i64,
            fatal_error: summary.fatal_error.clone(),
            imported_at: Utc::now(),
            elapsed_ms: elapsed_ms as i64,
            summary_json: Some(serde_json::to_string(&summary)?),
        };

        if let Err(e) = self.batch_repo.insert_batch(&batch).await {
            warn!(batch_id = %batch_id, error = %e, "导入批次记录写入失败");
        }

        info!(
            batch_id = %batch_id,
            total = summary.total_rows,
            created = totals.created,
            updated = totals.updated,
            skipped = totals.skipped,
            invalid = totals.invalid,
            error = totals.error,
            elapsed_ms = elapsed_ms,
            "报价目录导入完成"
        );

        Ok(ImportReport {
            batch_id,
            file_name,
            options,
            summary,
            elapsed_ms,
        })
    }
}
