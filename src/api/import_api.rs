// ==========================================
// 服务报价目录导入 API
// ==========================================
// 职责: 封装导入 / 导出 / 报价查询 / 导入历史 / 导入配置
// 约束: 上传文件先做扩展名与空文件校验，再交给导入引擎
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::config_manager::config_keys;
use crate::config::{ConfigManager, ImportConfigReader};
use crate::db::open_and_init;
use crate::domain::catalog::{CatalogFilter, CatalogRecord, OfferField};
use crate::domain::import::{ImportBatchRecord, ImportOptions, ImportSummary};
use crate::domain::types::{CommitMode, ImportStrategy};
use crate::i18n::{t, t_with_args};
use crate::importer::file_parser::file_extension;
use crate::importer::{render_message, CatalogImporter, CatalogImporterImpl, ImportError};
use crate::repository::{
    CatalogRepository, CatalogRepositoryImpl, ImportBatchRepository, ImportBatchRepositoryImpl,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// 允许上传的文件扩展名
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["xlsx", "xls", "csv"];

/// 导入结果状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// 导入API响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportApiResponse {
    /// 存在行级写入失败或致命错误时为 error
    pub status: ResponseStatus,
    pub dry_run: bool,
    pub strategy: ImportStrategy,
    /// 导入批次ID（同时写入 import_batch 表）
    pub batch_id: String,
    pub file_name: Option<String>,
    /// 面向用户的结果描述（按当前语言）
    pub message: String,
    pub summary: ImportSummary,
    /// 导入耗时（毫秒）
    pub elapsed_ms: u64,
}

/// 导出结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResponse {
    pub path: String,
    pub count: usize,
    pub message: String,
}

type DefaultImporter =
    CatalogImporterImpl<CatalogRepositoryImpl, ImportBatchRepositoryImpl, ConfigManager>;

/// 导入API
pub struct ImportApi {
    importer: DefaultImporter,
    batch_repo: ImportBatchRepositoryImpl,
    config: ConfigManager,
}

impl ImportApi {
    /// 打开（必要时创建）数据库并创建 ImportApi
    pub fn new(db_path: &str) -> ApiResult<Self> {
        let conn = open_and_init(db_path)
            .map_err(|e| ApiError::DatabaseConnectionError(e.to_string()))?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    /// 从已建表的连接创建 ImportApi（各仓储共享同一连接）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ApiResult<Self> {
        let importer = CatalogImporterImpl::with_defaults(
            CatalogRepositoryImpl::from_connection(conn.clone()),
            ImportBatchRepositoryImpl::from_connection(conn.clone()),
            ConfigManager::from_connection(conn.clone())?,
        );

        Ok(Self {
            importer,
            batch_repo: ImportBatchRepositoryImpl::from_connection(conn.clone()),
            config: ConfigManager::from_connection(conn)?,
        })
    }

    fn catalog(&self) -> &CatalogRepositoryImpl {
        self.importer.catalog_repo()
    }

    // ==========================================
    // 导入
    // ==========================================

    /// 按配置生成默认导入参数
    pub async fn default_options(&self) -> ApiResult<ImportOptions> {
        Ok(ImportOptions {
            dry_run: self.config.get_default_dry_run().await?,
            strategy: self.config.get_default_strategy().await?,
            commit_mode: self.config.get_commit_mode().await?,
        })
    }

    /// 导入报价表
    ///
    /// # 参数
    /// - file_path: .xlsx / .xls / .csv 文件
    /// - options: dry run / 策略 / 提交模式
    ///
    /// # 返回
    /// - Ok(ImportApiResponse): 行级结果（含部分失败）
    /// - Err(ApiError): 文件无效、超出单批上限、存储不可用于启动批次
    pub async fn import_file(
        &self,
        file_path: &Path,
        options: ImportOptions,
    ) -> ApiResult<ImportApiResponse> {
        Self::validate_upload(file_path)?;

        let report = match self.importer.import_file(file_path, options).await {
            Ok(report) => report,
            Err(ImportError::EmptyFile) => return Err(ApiError::InvalidInput(t("import.empty_file"))),
            Err(e) => return Err(e.into()),
        };

        let status = if report.summary.has_errors() {
            ResponseStatus::Error
        } else {
            ResponseStatus::Success
        };
        let message = render_message(&report.summary, options.dry_run);

        Ok(ImportApiResponse {
            status,
            dry_run: options.dry_run,
            strategy: options.strategy,
            batch_id: report.batch_id,
            file_name: report.file_name,
            message,
            summary: report.summary,
            elapsed_ms: report.elapsed_ms,
        })
    }

    /// 上传文件校验：扩展名 + 存在 + 非空
    fn validate_upload(file_path: &Path) -> ApiResult<()> {
        let ext = file_extension(file_path);
        if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
            return Err(ApiError::InvalidInput(t_with_args(
                "import.unsupported_format",
                &[("ext", &ext)],
            )));
        }

        let metadata = std::fs::metadata(file_path).map_err(|_| {
            ApiError::NotFound(t_with_args(
                "import.file_not_found",
                &[("path", &file_path.display().to_string())],
            ))
        })?;
        if metadata.len() == 0 {
            return Err(ApiError::InvalidInput(t("import.empty_file")));
        }

        Ok(())
    }

    // ==========================================
    // 导出
    // ==========================================

    /// 导出全部记录到 CSV（导出列名，可直接重新导入）
    pub async fn export_catalog(&self, file_path: &Path) -> ApiResult<ExportResponse> {
        let records = self.catalog().list_all().await?;

        let mut writer = csv::Writer::from_path(file_path)
            .map_err(|e| ApiError::ExportError(e.to_string()))?;
        writer
            .write_record(OfferField::ALL.iter().map(|f| f.export_label()))
            .map_err(|e| ApiError::ExportError(e.to_string()))?;

        for record in &records {
            writer
                .write_record(export_row(record))
                .map_err(|e| ApiError::ExportError(e.to_string()))?;
        }
        writer
            .flush()
            .map_err(|e| ApiError::ExportError(e.to_string()))?;

        let path = file_path.display().to_string();
        info!(path = %path, count = records.len(), "报价目录导出完成");

        Ok(ExportResponse {
            message: t_with_args(
                "export.success",
                &[("count", &records.len().to_string()), ("path", &path)],
            ),
            path,
            count: records.len(),
        })
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 启用记录列表
    pub async fn list_prices(&self, filter: &CatalogFilter) -> ApiResult<Vec<CatalogRecord>> {
        Ok(self.catalog().list_active(filter).await?)
    }

    /// 报价解析：车型专属优先，其次品牌通用
    pub async fn resolve_price(
        &self,
        brand: &str,
        model: &str,
        product_name: &str,
    ) -> ApiResult<Option<CatalogRecord>> {
        if brand.trim().is_empty() || product_name.trim().is_empty() {
            return Err(ApiError::InvalidInput(
                "brand 与 product_name 不能为空".to_string(),
            ));
        }
        let generic_models = self.config.get_generic_model_aliases().await?;
        Ok(self
            .catalog()
            .resolve_price(brand, model, product_name, &generic_models)
            .await?)
    }

    /// 最近的导入批次（新→旧）
    pub async fn recent_batches(&self, limit: usize) -> ApiResult<Vec<ImportBatchRecord>> {
        Ok(self.batch_repo.list_recent(limit).await?)
    }

    pub async fn get_batch(&self, batch_id: &str) -> ApiResult<ImportBatchRecord> {
        self.batch_repo
            .get_batch(batch_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("import_batch(id={})", batch_id)))
    }

    // ==========================================
    // 导入配置
    // ==========================================

    /// 当前 global 配置（JSON 对象字符串）
    pub fn config_snapshot(&self) -> ApiResult<String> {
        Ok(self.config.get_config_snapshot()?)
    }

    /// 覆写单个导入配置项（键与取值先校验）
    pub fn set_config(&self, key: &str, value: &str) -> ApiResult<()> {
        validate_config_value(key, value)?;
        self.config.set_global_config_value(key, value.trim())?;
        info!(key = key, value = value, "导入配置已更新");
        Ok(())
    }
}

/// 单条记录的导出行（与 OfferField::ALL 同序）
fn export_row(record: &CatalogRecord) -> Vec<String> {
    vec![
        record.brand.clone(),
        record.model.clone(),
        record.offer_type.clone(),
        record.product_name.clone(),
        format!("{:.2}", record.before_price),
        format!("{:.2}", record.after_price),
        record
            .discounted_price
            .map(|p| format!("{:.2}", p))
            .unwrap_or_default(),
        record.link.clone(),
    ]
}

fn validate_config_value(key: &str, value: &str) -> ApiResult<()> {
    let value = value.trim();
    let valid = match key {
        config_keys::DEFAULT_STRATEGY => value.parse::<ImportStrategy>().map(|_| ()),
        config_keys::COMMIT_MODE => value.parse::<CommitMode>().map(|_| ()),
        config_keys::DEFAULT_DRY_RUN => match value.to_lowercase().as_str() {
            "true" | "false" | "1" | "0" | "yes" | "no" => Ok(()),
            other => Err(format!("expected true/false, got '{}'", other)),
        },
        config_keys::MAX_ROWS_PER_BATCH => match value.parse::<usize>() {
            Ok(n) if n > 0 => Ok(()),
            _ => Err(format!("expected a positive integer, got '{}'", value)),
        },
        config_keys::GENERIC_MODEL_ALIASES => Ok(()),
        other => {
            warn!(key = other, "未知的导入配置项");
            Err(format!("unknown config key '{}'", other))
        }
    };

    valid.map_err(ApiError::InvalidInput)
}
