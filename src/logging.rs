//! Subscriber setup for hosts that don't install their own
//!
//! Wallet operations log through `tracing` with structured fields (`account`,
//! `index`, `order`, `key`). Secrets and mnemonics never reach a log line.

use tracing_subscriber::{fmt, EnvFilter};

/// `pretty`, `compact` or `json`
pub const LOG_FORMAT_ENV: &str = "ORCWALLET_LOG_FORMAT";
/// `1` selects JSON when no format is named
pub const LOG_JSON_ENV: &str = "ORCWALLET_LOG_JSON";
/// Wallet events at info, dependencies (reqwest, hyper) at warn
pub const DEFAULT_DIRECTIVES: &str = "warn,orcwallet=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    /// One JSON object per line, event fields flattened
    Json,
}

impl LogFormat {
    pub fn from_env() -> Self {
        Self::select(std::env::var(LOG_FORMAT_ENV).ok().as_deref(), std::env::var(LOG_JSON_ENV).ok().as_deref())
    }

    fn select(format: Option<&str>, json_flag: Option<&str>) -> Self {
        match format.map(|f| f.trim().to_ascii_lowercase()).as_deref() {
            Some("json") => LogFormat::Json,
            Some("compact") => LogFormat::Compact,
            Some("pretty") => LogFormat::Pretty,
            _ if json_flag.map(str::trim) == Some("1") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Install a stderr subscriber configured from the environment.
pub fn init_logging() -> bool {
    init_logging_with(LogFormat::from_env(), DEFAULT_DIRECTIVES)
}

/// `RUST_LOG` takes precedence over `directives`. Returns `false` when a global
/// subscriber is already installed, in which case nothing changes.
pub fn init_logging_with(format: LogFormat, directives: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));
    let builder = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    let installed = match format {
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().flatten_event(true).try_init(),
    };
    installed.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_selection() {
        assert_eq!(LogFormat::select(None, None), LogFormat::Pretty);
        assert_eq!(LogFormat::select(Some("COMPACT"), None), LogFormat::Compact);
        assert_eq!(LogFormat::select(None, Some("1")), LogFormat::Json);
        // a named format wins over the flag
        assert_eq!(LogFormat::select(Some("pretty"), Some("1")), LogFormat::Pretty);
        assert_eq!(LogFormat::select(Some("xml"), Some("0")), LogFormat::Pretty);
    }

    #[test]
    fn second_install_is_refused() {
        init_logging_with(LogFormat::Compact, DEFAULT_DIRECTIVES);
        assert!(!init_logging());
        tracing::info!(target: "orcwallet", "logging ready");
    }
}
