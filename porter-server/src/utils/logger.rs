//! Logging Infrastructure
//!
//! Structured logging for the porter server.
//! Features:
//! - Console output, pretty in development and JSON in production
//! - Daily rotating application logs (deleted after 14 days)
//! - Permanent audit logs for imports, exports and settings changes (never deleted)

use std::fs;
use std::path::Path;
use tracing::Subscriber;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, filter::filter_fn, fmt, prelude::*};

/// Application log retention
const APP_LOG_RETENTION_DAYS: i64 = 14;

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

/// Clean up old application log files (older than 14 days)
///
/// Audit logs live in their own subdirectory and are never touched.
pub fn cleanup_old_logs(log_dir: &Path) -> anyhow::Result<()> {
    let cutoff = chrono::Local::now().date_naive() - chrono::Duration::days(APP_LOG_RETENTION_DAYS);

    let app_log_dir = log_dir.join("app");
    if !app_log_dir.exists() {
        return Ok(());
    }

    for entry in fs::read_dir(app_log_dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        // app.YYYY-MM-DD (tracing-appender daily naming)
        if let Some(date_part) = name.strip_prefix("app.")
            && let Ok(date) = chrono::NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
            && date < cutoff
        {
            fs::remove_file(&path)?;
            tracing::info!(file = %name, "Deleted old log file");
        }
    }

    Ok(())
}

fn console_layer<S>(level: &str, json_format: bool) -> BoxedLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    if json_format {
        fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_filter(filter)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(true)
            .with_line_number(true)
            .with_filter(filter)
            .boxed()
    }
}

fn file_layer<S>(appender: RollingFileAppender, json_format: bool, audit: bool) -> BoxedLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    // audit events go to the audit file only, everything else to the app file
    let route = filter_fn(move |meta| (meta.target() == "audit") == audit);
    let writer = std::sync::Mutex::new(appender);
    if json_format {
        fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(writer)
            .with_filter(route)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .with_writer(writer)
            .with_filter(route)
            .boxed()
    }
}

/// Initialize the logging system with daily rotating logs
///
/// # Arguments
/// * `level` - Log level (e.g., "info", "debug", "warn"); `RUST_LOG` takes precedence
/// * `json_format` - Whether to use JSON format (true for production, false for development)
/// * `log_dir` - Optional directory for file logging (e.g., Some("./work_dir/logs"))
///
/// Retention is enforced by [`cleanup_old_logs`], run hourly as a
/// background task.
pub fn init_logger_with_file(
    level: &str,
    json_format: bool,
    log_dir: Option<&Path>,
) -> anyhow::Result<()> {
    let mut layers = vec![console_layer(level, json_format)];

    if let Some(log_dir) = log_dir {
        let app_log_dir = log_dir.join("app");
        let audit_log_dir = log_dir.join("audit");
        fs::create_dir_all(&app_log_dir)?;
        fs::create_dir_all(&audit_log_dir)?;

        let app_log = RollingFileAppender::new(Rotation::DAILY, app_log_dir, "app");
        let audit_log = RollingFileAppender::new(Rotation::DAILY, audit_log_dir, "audit");
        layers.push(file_layer(app_log, json_format, false));
        layers.push(file_layer(audit_log, json_format, true));
    }

    tracing_subscriber::registry().with(layers).try_init()?;
    Ok(())
}

/// Initialize the logging system (console only)
pub fn init_logger(level: &str, json_format: bool) -> anyhow::Result<()> {
    init_logger_with_file(level, json_format, None)
}

/// Audit log helper - records catalog-changing operations
///
/// Audit logs are permanently stored under `logs/audit/`.
///
/// # Examples
/// ```ignore
/// audit_log!("import_setup", "import:3f2a9c0b7d1e", "total=12");
/// audit_log!("settings_update", "settings");
/// ```
#[macro_export]
macro_rules! audit_log {
    ($action:expr, $resource:expr) => {
        tracing::info!(
            target: "audit",
            action = $action,
            resource = $resource,
            timestamp = chrono::Local::now().to_rfc3339(),
            "AUDIT"
        );
    };
    ($action:expr, $resource:expr, $details:expr) => {
        tracing::info!(
            target: "audit",
            action = $action,
            resource = $resource,
            details = %$details,
            timestamp = chrono::Local::now().to_rfc3339(),
            "AUDIT"
        );
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_removes_only_expired_app_logs() {
        let dir = tempfile::tempdir().unwrap();
        let app_dir = dir.path().join("app");
        let audit_dir = dir.path().join("audit");
        fs::create_dir_all(&app_dir).unwrap();
        fs::create_dir_all(&audit_dir).unwrap();

        let today = chrono::Local::now().date_naive();
        let old = today - chrono::Duration::days(30);
        let old_app = app_dir.join(format!("app.{}", old.format("%Y-%m-%d")));
        let fresh_app = app_dir.join(format!("app.{}", today.format("%Y-%m-%d")));
        let old_audit = audit_dir.join(format!("audit.{}", old.format("%Y-%m-%d")));
        for path in [&old_app, &fresh_app, &old_audit] {
            fs::write(path, b"x").unwrap();
        }

        cleanup_old_logs(dir.path()).unwrap();

        assert!(!old_app.exists());
        assert!(fresh_app.exists());
        assert!(old_audit.exists());
    }

    #[test]
    fn test_cleanup_without_log_dir_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        cleanup_old_logs(&dir.path().join("missing")).unwrap();
    }
}
