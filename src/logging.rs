use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

/// 默认日志级别，可通过 RUST_LOG 覆盖
const DEFAULT_FILTER: &str = "info";

/// 日志文件名
pub const LOG_FILE: &str = "ip-range-changer.log";

/// 日志目录：用户配置目录下的 ip-range-changer/logs
pub fn log_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("ip-range-changer").join("logs"))
}

/// 初始化日志
///
/// 调试构建输出到 stderr；发布构建没有控制台，写入 [`log_dir`] 下的文件。
/// 返回的 guard 必须在程序退出前一直持有，否则缓冲中的日志会丢失。
pub fn init() -> Option<WorkerGuard> {
    if cfg!(debug_assertions) {
        init_stderr();
        return None;
    }

    match log_dir().map(|dir| init_file(&dir)) {
        Some(Ok(guard)) => Some(guard),
        Some(Err(e)) => {
            init_stderr();
            tracing::warn!("Cannot open log file, logging to stderr: {}", e);
            None
        }
        None => {
            init_stderr();
            None
        }
    }
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn init_stderr() {
    // 重复初始化时忽略
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn init_file(dir: &Path) -> Result<WorkerGuard, tracing_appender::rolling::InitError> {
    let appender = file_appender(dir)?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_target(false)
        .with_ansi(false)
        .with_writer(writer)
        .try_init();

    Ok(guard)
}

/// 单个日志文件，不轮转
fn file_appender(dir: &Path) -> Result<RollingFileAppender, tracing_appender::rolling::InitError> {
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(LOG_FILE)
        .build(dir)
}
