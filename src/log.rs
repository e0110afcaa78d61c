//! Logging severities (spec.md §6 log callback contract) mapped onto
//! `tracing`, the teacher's logging crate of choice.
//!
//! The engine never hand-rolls a callback type for logging: a host
//! application installs a `tracing::Subscriber` the usual way and gets
//! every event the spec's log callback contract names. `Severity` exists
//! only to translate the spec's eight syslog-style levels (which RFC 4210
//! implementations inherited from OpenSSL's `ERR`/`BIO` logging) onto
//! `tracing`'s five.

use std::fmt;

/// The eight severities spec.md §6 names for the log callback contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// System is unusable
    Emerg,
    /// Action must be taken immediately
    Alert,
    /// Critical condition
    Crit,
    /// Error condition
    Error,
    /// Warning condition
    Warn,
    /// Normal but significant condition
    Note,
    /// Informational
    Info,
    /// Debug-level message
    Debug,
}

impl Severity {
    /// Whether this severity flows to stderr by default (spec.md §6:
    /// "errors and warnings flow to stderr by default; info/debug to
    /// stdout").
    pub fn is_error_or_warning(self) -> bool {
        matches!(
            self,
            Severity::Emerg | Severity::Alert | Severity::Crit | Severity::Error | Severity::Warn
        )
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Emerg => "EMERG",
            Severity::Alert => "ALERT",
            Severity::Crit => "CRIT",
            Severity::Error => "ERROR",
            Severity::Warn => "WARN",
            Severity::Note => "NOTE",
            Severity::Info => "INFO",
            Severity::Debug => "DEBUG",
        };
        f.write_str(s)
    }
}

/// Emit a log event at the given severity, with `file`/`line` captured by
/// the macro caller the way spec.md §6's `(file, line, severity, message)`
/// tuple describes. `Emerg`/`Alert`/`Crit` collapse onto `tracing::error!`
/// (tracing has no finer-grained levels above `ERROR`); `Note` collapses
/// onto `tracing::info!`.
#[macro_export]
macro_rules! cmp_log {
    ($sev:expr, $($arg:tt)+) => {{
        use $crate::log::Severity;
        match $sev {
            Severity::Emerg | Severity::Alert | Severity::Crit | Severity::Error => {
                tracing::error!($($arg)+)
            }
            Severity::Warn => tracing::warn!($($arg)+),
            Severity::Note | Severity::Info => tracing::info!($($arg)+),
            Severity::Debug => tracing::debug!($($arg)+),
        }
    }};
}
