// ==========================================
// 日志系统初始化
// ==========================================
// 工具: tracing + tracing-subscriber
// 输出: 一律写 stderr（stdout 留给命令行 JSON 结果）
// 级别: RUST_LOG 优先，缺省 info
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// 缺省过滤器：本 crate info，依赖库 warn
const DEFAULT_FILTER: &str = "warn,offer_catalog_import=info,catalog_import=info";

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// 人类可读（终端）
    #[default]
    Text,
    /// 每行一个 JSON 对象（日志采集）
    Json,
}

impl LogFormat {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// 初始化日志系统
///
/// 重复调用时保留第一次的订阅者
///
/// # 示例
/// ```no_run
/// use offer_catalog_import::logging::{self, LogFormat};
/// logging::init(LogFormat::Text);
/// ```
pub fn init(format: LogFormat) {
    let builder = fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr);

    let result = match format {
        LogFormat::Text => builder
            .with_target(true)
            .with_line_number(true)
            .try_init(),
        LogFormat::Json => builder.json().with_current_span(true).try_init(),
    };

    if let Err(err) = result {
        tracing::debug!(error = %err, "日志订阅者已存在，跳过初始化");
    }
}

/// 测试用：debug 级别，输出交给测试框架捕获
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
