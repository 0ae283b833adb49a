//! 日志初始化.
//!
//! 库 crate 通过 `log` 宏输出, 这里用 tracing-subscriber 统一收集:
//! 控制台输出带颜色, 文件按日期写入 `<prefix>.<YYYY-MM-DD>.log`,
//! 跨天时自动切换文件并清理超过保留天数的旧日志.

use anyhow::{Context, Result};
use chrono::{Datelike, Duration as ChronoDuration, Local, NaiveDate, Timelike};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, FormatEvent, FormatFields, format::Writer},
    layer::{Layer, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
};

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// 文件日志级别 (EnvFilter 语法, 如 `info` 或 `h4m_format=trace`)
    #[serde(default = "default_level")]
    pub level: String,
    /// 控制台日志级别, `RUST_LOG` 存在时以环境变量为准
    #[serde(default = "default_console_level")]
    pub console_level: String,
    /// 日志目录
    #[serde(default = "default_directory")]
    pub directory: String,
    /// 日志文件名前缀
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
    /// 保留天数, 更早的日志文件会被删除
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    /// 是否输出到控制台
    #[serde(default = "default_true")]
    pub console: bool,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_console_level() -> String {
    "debug".to_string()
}

fn default_directory() -> String {
    "logs".to_string()
}

fn default_file_prefix() -> String {
    "h4m".to_string()
}

fn default_retention_days() -> i64 {
    30
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            console_level: default_console_level(),
            directory: default_directory(),
            file_prefix: default_file_prefix(),
            retention_days: default_retention_days(),
            console: default_true(),
        }
    }
}

static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// 初始化全局日志
///
/// 只能成功调用一次, 再次调用返回错误. `log` 宏的输出同样会进入这里配置的 layer.
pub fn init(config: LoggingConfig) -> Result<()> {
    fs::create_dir_all(&config.directory)
        .with_context(|| format!("创建日志目录失败, path={}", config.directory))?;
    cleanup_logs(
        Path::new(&config.directory),
        &config.file_prefix,
        config.retention_days,
        Local::now().date_naive(),
    )?;

    let file_writer = CurrentFileWriter::new(
        Path::new(&config.directory),
        &config.file_prefix,
        config.retention_days,
    )?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_writer);

    let file_filter = EnvFilter::try_new(&config.level)
        .with_context(|| format!("无效的文件日志级别: {}", config.level))?;
    let file_layer = fmt::Layer::default()
        .with_writer(non_blocking)
        .with_ansi(false)
        .event_format(FileFormatter)
        .with_filter(file_filter);

    let console_layer = if config.console {
        let console_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(&config.console_level)
                .with_context(|| format!("无效的控制台日志级别: {}", config.console_level))?,
        };
        Some(
            fmt::Layer::default()
                .with_writer(std::io::stdout)
                .with_ansi(true)
                .event_format(ConsoleFormatter)
                .with_filter(console_filter),
        )
    } else {
        None
    };

    Registry::default()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("全局日志已经初始化")?;

    LOG_GUARD.set(guard).ok();
    Ok(())
}

/// 写入当天日志文件, 跨天时切换到新文件
struct CurrentFileWriter {
    directory: PathBuf,
    prefix: String,
    retention_days: i64,
    date: NaiveDate,
    file: File,
}

impl CurrentFileWriter {
    fn new(directory: &Path, prefix: &str, retention_days: i64) -> Result<Self> {
        let today = Local::now().date_naive();
        let file_path = build_current_log_path(directory, prefix, today);
        let file = open_append_file(&file_path)?;
        Ok(Self {
            directory: directory.to_path_buf(),
            prefix: prefix.to_string(),
            retention_days,
            date: today,
            file,
        })
    }

    fn roll_over(&mut self, today: NaiveDate) -> std::io::Result<()> {
        let file_path = build_current_log_path(&self.directory, &self.prefix, today);
        self.file = open_append_file(&file_path).map_err(std::io::Error::other)?;
        self.date = today;
        // 清理失败不影响写日志
        let _ = cleanup_logs(&self.directory, &self.prefix, self.retention_days, today);
        Ok(())
    }
}

impl Write for CurrentFileWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let today = Local::now().date_naive();
        if today != self.date {
            self.roll_over(today)?;
        }
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}

fn open_append_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("打开日志文件失败, path={}", path.display()))
}

pub(crate) fn build_current_log_path(directory: &Path, prefix: &str, date: NaiveDate) -> PathBuf {
    directory.join(format!("{}.{}.log", prefix, date.format("%Y-%m-%d")))
}

/// 删除早于 `today - retention_days` 的日志文件, 返回删除的文件数
fn cleanup_logs(
    directory: &Path,
    prefix: &str,
    retention_days: i64,
    today: NaiveDate,
) -> Result<usize> {
    if !directory.exists() {
        return Ok(0);
    }
    let cutoff = today - ChronoDuration::days(retention_days);
    let mut removed = 0;
    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        let file_name = entry.file_name().to_string_lossy().to_string();
        let Some(date) = parse_log_name(&file_name, prefix) else {
            continue;
        };
        if date < cutoff && fs::remove_file(entry.path()).is_ok() {
            removed += 1;
        }
    }
    Ok(removed)
}

fn parse_log_name(file_name: &str, prefix: &str) -> Option<NaiveDate> {
    let date_part = file_name
        .strip_prefix(prefix)?
        .strip_prefix('.')?
        .strip_suffix(".log")?;
    if date_part.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

struct ConsoleFormatter;

impl<S, N> FormatEvent<S, N> for ConsoleFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &fmt::FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = Local::now();
        let meta = event.metadata();
        write!(
            writer,
            "[{:02}-{:02} {:02}:{:02}:{:02}.{:03}] ",
            now.month(),
            now.day(),
            now.hour(),
            now.minute(),
            now.second(),
            now.timestamp_subsec_millis()
        )?;
        let color = match *meta.level() {
            tracing::Level::ERROR => "\x1b[31m",
            tracing::Level::WARN => "\x1b[33m",
            tracing::Level::INFO => "\x1b[32m",
            _ => "\x1b[34m",
        };
        write!(
            writer,
            "{}{:5}\x1b[0m {}:{} > ",
            color,
            meta.level().to_string(),
            meta.file().unwrap_or("unknown"),
            meta.line().unwrap_or(0)
        )?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

struct FileFormatter;

impl<S, N> FormatEvent<S, N> for FileFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &fmt::FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = Local::now();
        let meta = event.metadata();
        write!(
            writer,
            "[{:02}-{:02} {:02}:{:02}:{:02}.{:03}] {:5} {} > ",
            now.month(),
            now.day(),
            now.hour(),
            now.minute(),
            now.second(),
            now.timestamp_subsec_millis(),
            meta.level().to_string(),
            meta.target()
        )?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
