// ==========================================
// 服务报价目录导入系统 - 命令行入口
// ==========================================
// 子命令: import / export / price / list / history / config
// 输出: stdout 打印 JSON，日志写 stderr
// ==========================================

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use offer_catalog_import::api::{ImportApi, ResponseStatus};
use offer_catalog_import::db::{get_default_db_path, DB_PATH_ENV};
use offer_catalog_import::domain::{CatalogFilter, CommitMode, ImportStrategy};
use offer_catalog_import::{i18n, logging};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "catalog-import")]
#[command(about = "Import service offer spreadsheets into the catalog (dry run by default)")]
#[command(version)]
struct Cli {
    /// SQLite database path
    #[arg(long, global = true, env = DB_PATH_ENV)]
    db: Option<PathBuf>,

    /// Message language (en / zh-CN); defaults from LC_ALL / LANG
    #[arg(long, global = true)]
    lang: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a .xlsx / .xls / .csv offer sheet
    #[command(after_help = "\
Examples:
  catalog-import import offers.xlsx
  catalog-import import offers.csv --commit
  catalog-import import offers.csv --commit --strategy always_new --commit-mode batch")]
    Import {
        file: PathBuf,

        /// Persist changes (otherwise validate only)
        #[arg(long, conflicts_with = "dry_run")]
        commit: bool,

        /// Force a dry run even if the configured default is to commit
        #[arg(long)]
        dry_run: bool,

        /// smart | mapping | standard | always_new
        #[arg(long)]
        strategy: Option<ImportStrategy>,

        /// per_row | batch
        #[arg(long)]
        commit_mode: Option<CommitMode>,
    },

    /// Export the whole catalog to CSV
    Export { file: PathBuf },

    /// Resolve the price for a brand / model / product
    Price {
        #[arg(long)]
        brand: String,

        #[arg(long, default_value = "")]
        model: String,

        #[arg(long)]
        product: String,
    },

    /// List active offers
    List {
        #[arg(long)]
        brand: Option<String>,

        #[arg(long)]
        model: Option<String>,

        #[arg(long = "type")]
        offer_type: Option<String>,

        #[arg(long)]
        search: Option<String>,
    },

    /// Show recent import batches
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Show or change import defaults
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Show,
    Set { key: String, value: String },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(logging::LogFormat::from_json_flag(cli.json_logs));

    match &cli.lang {
        Some(lang) => {
            if !i18n::set_locale(lang) {
                tracing::warn!(lang = %lang, "不支持的语言，继续使用默认语言");
            }
        }
        None => {
            if let Some(lang) = i18n::locale_from_env() {
                i18n::set_locale(lang);
            }
        }
    }

    let db_path = cli
        .db
        .map(|p| p.display().to_string())
        .unwrap_or_else(get_default_db_path);
    tracing::debug!(db_path = %db_path, "使用数据库");

    let api = ImportApi::new(&db_path).with_context(|| format!("无法打开数据库: {}", db_path))?;

    match cli.command {
        Commands::Import {
            file,
            commit,
            dry_run,
            strategy,
            commit_mode,
        } => {
            let mut options = api.default_options().await?;
            if commit {
                options.dry_run = false;
            }
            if dry_run {
                options.dry_run = true;
            }
            if let Some(strategy) = strategy {
                options.strategy = strategy;
            }
            if let Some(commit_mode) = commit_mode {
                options.commit_mode = commit_mode;
            }

            let response = api.import_file(&file, options).await?;
            print_json(&response)?;
            if response.status == ResponseStatus::Error {
                std::process::exit(1);
            }
        }
        Commands::Export { file } => {
            print_json(&api.export_catalog(&file).await?)?;
        }
        Commands::Price {
            brand,
            model,
            product,
        } => {
            print_json(&api.resolve_price(&brand, &model, &product).await?)?;
        }
        Commands::List {
            brand,
            model,
            offer_type,
            search,
        } => {
            let filter = CatalogFilter {
                brand,
                model,
                offer_type,
                search,
            };
            print_json(&api.list_prices(&filter).await?)?;
        }
        Commands::History { limit } => {
            print_json(&api.recent_batches(limit).await?)?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => println!("{}", api.config_snapshot()?),
            ConfigAction::Set { key, value } => {
                api.set_config(&key, &value)?;
                println!("{}", api.config_snapshot()?);
            }
        },
    }

    Ok(())
}
