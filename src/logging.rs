use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

/// 初始化日志系统
///
/// stdout 被 MCP stdio 传输占用，所以终端日志一律写到 stderr：
/// - 人类可读格式或 JSON 格式
/// - 可选的按天滚动文件日志（JSON）
///
/// 返回的 guard 必须存活到进程结束，否则文件日志会丢失尾部内容。
pub fn init_logging(
    log_level: &str,
    json_format: bool,
    log_dir: Option<&str>,
) -> anyhow::Result<Option<WorkerGuard>> {
    let level = parse_log_level(log_level);

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("{}", level)))?;

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "pancake-swap.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_ansi(false)
                .with_current_span(true)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    if json_format {
        Registry::default()
            .with(env_filter)
            .with(file_layer)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        Registry::default()
            .with(env_filter)
            .with(file_layer)
            .with(
                fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    }

    tracing::info!(
        log_level = %log_level,
        json_format = %json_format,
        file_logging = log_dir.is_some(),
        "日志系统初始化完成"
    );

    Ok(guard)
}

/// 日志级别，不区分大小写；无法识别时回退到 info
fn parse_log_level(level_str: &str) -> Level {
    level_str.trim().parse().unwrap_or_else(|_| {
        eprintln!("⚠️  无效的日志级别 '{}', 使用默认值 'info'", level_str);
        Level::INFO
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("trace"), Level::TRACE);
        assert_eq!(parse_log_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_log_level("Info"), Level::INFO);
        assert_eq!(parse_log_level("WARN"), Level::WARN);
        assert_eq!(parse_log_level("error"), Level::ERROR);
        assert_eq!(parse_log_level(" warn "), Level::WARN);
        assert_eq!(parse_log_level("invalid"), Level::INFO);
        assert_eq!(parse_log_level(""), Level::INFO);
    }
}
