// ==========================================
// 国际化 (i18n) 模块
// ==========================================
// 工具: rust-i18n（i18n! 宏在 lib.rs 中展开）
// 语言: en（默认 / 回退）、zh-CN
// 占位符: 文案中的 %{name} 由 t_with_args 替换
// ==========================================

/// 支持的语言
pub const SUPPORTED_LOCALES: [&str; 2] = ["en", "zh-CN"];

/// 获取当前语言
pub fn current_locale() -> String {
    rust_i18n::locale().to_string()
}

/// 设置语言；不支持的语言代码返回 false 且保持原语言
///
/// # 参数
/// - locale: 语言代码（"en" 或 "zh-CN"）
pub fn set_locale(locale: &str) -> bool {
    match SUPPORTED_LOCALES
        .iter()
        .find(|l| l.eq_ignore_ascii_case(locale.trim()))
    {
        Some(l) => {
            rust_i18n::set_locale(l);
            true
        }
        None => false,
    }
}

/// 从环境变量推断语言（LC_ALL > LANG）：zh* 取 zh-CN，其余取 en；均未设置时为 None
pub fn locale_from_env() -> Option<&'static str> {
    ["LC_ALL", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|v| !v.is_empty() && v != "C" && v != "POSIX")
        .map(|v| {
            if v.to_lowercase().starts_with("zh") {
                "zh-CN"
            } else {
                "en"
            }
        })
}

/// 翻译消息（无参数）
///
/// # 示例
/// ```no_run
/// use offer_catalog_import::i18n::t;
/// let msg = t("import.no_changes");
/// ```
pub fn t(key: &str) -> String {
    rust_i18n::t!(key).to_string()
}

/// 翻译消息（带参数）
///
/// # 示例
/// ```no_run
/// use offer_catalog_import::i18n::t_with_args;
/// let msg = t_with_args("import.file_not_found", &[("path", "/tmp/test.csv")]);
/// ```
pub fn t_with_args(key: &str, args: &[(&str, &str)]) -> String {
    let mut result = rust_i18n::t!(key).to_string();
    for (k, v) in args {
        let placeholder = format!("%{{{}}}", k);
        result = result.replace(&placeholder, v);
    }
    result
}
