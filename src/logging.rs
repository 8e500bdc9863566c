//! Tracing setup for the server process.
//!
//! Every event goes to stdout. A second, ANSI-free copy goes to disk unless `CHATDOC_LOG_FILE`
//! turns it off:
//!
//! | `CHATDOC_LOG_FILE` | file output                                   |
//! |--------------------|-----------------------------------------------|
//! | unset              | `logs/chatdoc.YYYY-MM-DD.log`, rotated daily  |
//! | `off` / `none` / empty | disabled                                  |
//! | any other value    | that path, appended, never rotated            |
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::{
    non_blocking::{NonBlocking, WorkerGuard},
    rolling::{InitError, RollingFileAppender, Rotation},
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const LOG_FILE_ENV: &str = "CHATDOC_LOG_FILE";
const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_LOG_PREFIX: &str = "chatdoc";
const DEFAULT_FILTER: &str = "info,tower_http=debug";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Where file logs are written.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LogTarget {
    Disabled,
    File(PathBuf),
    Daily { dir: PathBuf },
}

impl LogTarget {
    fn from_setting(setting: Option<&str>) -> Self {
        let Some(value) = setting.map(str::trim) else {
            return Self::Daily {
                dir: PathBuf::from(DEFAULT_LOG_DIR),
            };
        };
        if value.is_empty() || value.eq_ignore_ascii_case("off") || value.eq_ignore_ascii_case("none")
        {
            Self::Disabled
        } else {
            Self::File(PathBuf::from(value))
        }
    }

    fn appender(&self) -> Result<Option<RollingFileAppender>, InitError> {
        match self {
            Self::Disabled => Ok(None),
            Self::Daily { dir } => RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(DEFAULT_LOG_PREFIX)
                .filename_suffix("log")
                .build(dir)
                .map(Some),
            Self::File(path) => {
                let dir = path
                    .parent()
                    .filter(|parent| !parent.as_os_str().is_empty())
                    .unwrap_or(Path::new("."));
                let name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| format!("{DEFAULT_LOG_PREFIX}.log"));
                RollingFileAppender::builder()
                    .rotation(Rotation::NEVER)
                    .filename_prefix(name)
                    .build(dir)
                    .map(Some)
            }
        }
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the default filter, which keeps this crate at `info` and lets
/// `tower_http` request spans through at `debug`. Call once, before the server starts.
pub fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let stdout_layer = fmt::layer().with_target(false).compact();
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    let target = LogTarget::from_setting(std::env::var(LOG_FILE_ENV).ok().as_deref());
    match file_writer(&target) {
        Some(writer) => registry
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .compact(),
            )
            .init(),
        None => registry.init(),
    }
    tracing::debug!(?target, "Tracing initialized");
}

fn file_writer(target: &LogTarget) -> Option<NonBlocking> {
    match target.appender() {
        Ok(appender) => appender.map(|appender| {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = LOG_GUARD.set(guard);
            writer
        }),
        Err(err) => {
            // No subscriber exists yet.
            eprintln!("File logging disabled, {target:?} could not be opened: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_setting_rotates_daily_under_logs() {
        assert_eq!(
            LogTarget::from_setting(None),
            LogTarget::Daily {
                dir: PathBuf::from("logs")
            }
        );
    }

    #[test]
    fn off_values_disable_file_output() {
        for value in ["off", "OFF", "none", "", "   "] {
            assert_eq!(LogTarget::from_setting(Some(value)), LogTarget::Disabled);
        }
    }

    #[test]
    fn explicit_path_is_used_verbatim() {
        assert_eq!(
            LogTarget::from_setting(Some(" /var/log/chatdoc/server.log ")),
            LogTarget::File(PathBuf::from("/var/log/chatdoc/server.log"))
        );
    }

    #[test]
    fn disabled_target_opens_nothing() {
        assert!(LogTarget::Disabled.appender().expect("appender").is_none());
    }

    #[test]
    fn explicit_path_creates_its_file() {
        let dir = std::env::temp_dir().join(format!("chatdoc-log-{}", std::process::id()));
        let path = dir.join("server.log");
        let appender = LogTarget::File(path.clone()).appender().expect("appender");

        assert!(appender.is_some());
        assert!(path.exists());
        let _ = std::fs::remove_dir_all(dir);
    }
}
