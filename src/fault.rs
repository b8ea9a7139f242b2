//! Fault classification: mapping runtime fault codes and explicit logging
//! levels to a category/severity pair, and the immutable error record
//! buffered by a session.

use std::panic::Location;
use std::str::FromStr;

use time::OffsetDateTime;

use crate::error::HttpLogError;

/// Numeric fault codes delivered by the hosting runtime's fault-signal
/// channel. The set is closed; anything else is [`HttpLogError::UnknownFaultCode`].
pub mod codes {
    pub const RUNTIME_ERROR: u32 = 1;
    pub const RUNTIME_WARNING: u32 = 2;
    pub const PARSE_ERROR: u32 = 4;
    pub const RUNTIME_NOTICE: u32 = 8;
    pub const CORE_ERROR: u32 = 16;
    pub const COMPILE_ERROR: u32 = 64;
    pub const COMPILE_WARNING: u32 = 128;
    pub const USER_ERROR: u32 = 256;
    pub const USER_WARNING: u32 = 512;
    pub const USER_NOTICE: u32 = 1024;
    pub const STRICT_NOTICE: u32 = 2048;
    pub const RECOVERABLE_ERROR: u32 = 4096;
    pub const DEPRECATED: u32 = 8192;
    pub const USER_DEPRECATED: u32 = 16384;
}

/// Error category. FATAL is the only category that short-circuits the
/// session; everything else is buffered and logged at finalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Fatal,
    Warning,
    Notice,
    Strict,
    Deprecated,
    Debug,
    Info,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Fatal => "FATAL",
            Category::Warning => "WARNING",
            Category::Notice => "NOTICE",
            Category::Strict => "STRICT",
            Category::Deprecated => "DEPRECATED",
            Category::Debug => "DEBUG",
            Category::Info => "INFO",
        }
    }

    pub fn is_fatal(self) -> bool {
        self == Category::Fatal
    }
}

/// Severity rank on the syslog scale. Lower is more urgent; only category
/// membership matters for fatal detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error = 3,
    Warning = 4,
    Notice = 5,
    Info = 6,
    Debug = 7,
}

impl Severity {
    pub fn rank(self) -> u8 {
        self as u8
    }
}

/// Explicitly caller-invoked logging level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
}

impl FromStr for Level {
    type Err = HttpLogError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warning" => Ok(Level::Warning),
            "error" => Ok(Level::Error),
            "fatal" => Ok(Level::Fatal),
            other => Err(HttpLogError::InvalidLevel(other.to_string())),
        }
    }
}

/// Map a runtime fault code to its category and severity. Total over the
/// known code set; unknown codes fail so callers can apply an explicit
/// fallback (see [`classify_or_default`]).
pub fn classify(code: u32) -> Result<(Category, Severity), HttpLogError> {
    use codes::*;
    match code {
        RUNTIME_ERROR | PARSE_ERROR | CORE_ERROR | COMPILE_ERROR | USER_ERROR => {
            Ok((Category::Fatal, Severity::Error))
        }
        RUNTIME_WARNING | USER_WARNING | COMPILE_WARNING | RECOVERABLE_ERROR => {
            Ok((Category::Warning, Severity::Warning))
        }
        RUNTIME_NOTICE | USER_NOTICE => Ok((Category::Notice, Severity::Notice)),
        STRICT_NOTICE => Ok((Category::Strict, Severity::Notice)),
        DEPRECATED | USER_DEPRECATED => Ok((Category::Deprecated, Severity::Notice)),
        _ => Err(HttpLogError::UnknownFaultCode(code)),
    }
}

/// Like [`classify`], but unknown codes fall back to the WARNING tier
/// instead of failing. The fallback is deliberate: an unmappable fault must
/// still be recorded, never dropped.
pub fn classify_or_default(code: u32) -> (Category, Severity) {
    classify(code).unwrap_or((Category::Warning, Severity::Warning))
}

/// Map an explicit logging level to category, severity, and a synthetic
/// fault code. `error` and `fatal` both land in the FATAL category and
/// short-circuit the session.
pub fn classify_named(level: Level) -> (Category, Severity, u32) {
    match level {
        Level::Debug => (Category::Debug, Severity::Debug, 0),
        Level::Info => (Category::Info, Severity::Info, 0),
        Level::Warning => (Category::Warning, Severity::Warning, codes::USER_WARNING),
        Level::Error => (Category::Fatal, Severity::Error, codes::USER_ERROR),
        Level::Fatal => (Category::Fatal, Severity::Error, codes::RUNTIME_ERROR),
    }
}

/// One classified error, immutable once created. Appended to the owning
/// session's error list in insertion order.
#[derive(Debug, Clone)]
pub struct ErrorRecord {
    pub category: Category,
    pub severity: Severity,
    pub code: u32,
    pub message: String,
    pub file: String,
    pub line: u32,
    /// Capture time; prefixes the record in errors-only output.
    pub timestamp: OffsetDateTime,
}

impl ErrorRecord {
    /// Build a record from a runtime fault signal.
    pub fn from_fault(
        code: u32,
        message: impl Into<String>,
        file: impl Into<String>,
        line: u32,
    ) -> Result<ErrorRecord, HttpLogError> {
        let (category, severity) = classify(code)?;
        Ok(ErrorRecord::new(category, severity, code, message, file, line))
    }

    /// Build a record from a runtime fault signal, defaulting unknown codes
    /// to the WARNING tier.
    pub fn from_fault_or_default(
        code: u32,
        message: impl Into<String>,
        file: impl Into<String>,
        line: u32,
    ) -> ErrorRecord {
        let (category, severity) = classify_or_default(code);
        ErrorRecord::new(category, severity, code, message, file, line)
    }

    /// Build a record for an explicit logging call, attributed to the call
    /// site.
    #[track_caller]
    pub fn from_level(level: Level, message: impl Into<String>) -> ErrorRecord {
        let (category, severity, code) = classify_named(level);
        let loc = Location::caller();
        ErrorRecord::new(category, severity, code, message, loc.file(), loc.line())
    }

    fn new(
        category: Category,
        severity: Severity,
        code: u32,
        message: impl Into<String>,
        file: impl Into<String>,
        line: u32,
    ) -> ErrorRecord {
        ErrorRecord {
            category,
            severity,
            code,
            message: message.into(),
            file: file.into(),
            line,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_codes() {
        assert_eq!(
            classify(codes::RUNTIME_ERROR).unwrap(),
            (Category::Fatal, Severity::Error)
        );
        assert_eq!(
            classify(codes::USER_ERROR).unwrap(),
            (Category::Fatal, Severity::Error)
        );
        assert_eq!(
            classify(codes::RECOVERABLE_ERROR).unwrap(),
            (Category::Warning, Severity::Warning)
        );
        assert_eq!(
            classify(codes::USER_NOTICE).unwrap(),
            (Category::Notice, Severity::Notice)
        );
        assert_eq!(
            classify(codes::STRICT_NOTICE).unwrap(),
            (Category::Strict, Severity::Notice)
        );
        assert_eq!(
            classify(codes::USER_DEPRECATED).unwrap(),
            (Category::Deprecated, Severity::Notice)
        );
    }

    #[test]
    fn test_classify_unknown_code() {
        match classify(32) {
            Err(HttpLogError::UnknownFaultCode(code)) => assert_eq!(code, 32),
            other => panic!("expected UnknownFaultCode, got {other:?}"),
        }
        assert_eq!(classify_or_default(32), (Category::Warning, Severity::Warning));
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!("warning".parse::<Level>().unwrap(), Level::Warning);
        assert_eq!("fatal".parse::<Level>().unwrap(), Level::Fatal);
        match "verbose".parse::<Level>() {
            Err(HttpLogError::InvalidLevel(name)) => assert_eq!(name, "verbose"),
            other => panic!("expected InvalidLevel, got {other:?}"),
        }
    }

    #[test]
    fn test_named_levels() {
        let (category, severity, _) = classify_named(Level::Fatal);
        assert!(category.is_fatal());
        assert_eq!(severity, Severity::Error);

        let (category, _, code) = classify_named(Level::Error);
        assert!(category.is_fatal());
        assert_eq!(code, codes::USER_ERROR);

        for level in [Level::Debug, Level::Info, Level::Warning] {
            let (category, _, _) = classify_named(level);
            assert!(!category.is_fatal());
        }
    }

    #[test]
    fn test_record_carries_call_site() {
        let record = ErrorRecord::from_level(Level::Warning, "slow query");
        assert_eq!(record.category, Category::Warning);
        assert_eq!(record.code, codes::USER_WARNING);
        assert!(record.file.ends_with("fault.rs"));
        assert!(record.line > 0);
    }

    #[test]
    fn test_severity_ranks() {
        assert_eq!(Severity::Error.rank(), 3);
        assert_eq!(Severity::Warning.rank(), 4);
        assert_eq!(Severity::Notice.rank(), 5);
        assert_eq!(Severity::Info.rank(), 6);
        assert_eq!(Severity::Debug.rank(), 7);
    }
}
