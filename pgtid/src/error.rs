//! Error types and result definitions for log scanning and position matching.
//!
//! Every failure carries a granular [`ErrorKind`] which belongs to exactly one [`ErrorClass`].
//! The class tells callers how to react: discovery functions report a missing marker as
//! [`ErrorClass::NotFound`], which is an expected outcome, while
//! [`ErrorClass::ProtocolViolation`] means two logs did not behave the way matching assumes
//! and must be surfaced to an operator.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::panic::Location;
use std::sync::Arc;

use pgtid_config::shared::ValidationError;
use pgtid_mysql::replication::LogFileNameError;
use sqlx::mysql::MySqlDatabaseError;

/// Convenient result type for operations failing with [`PgtidError`].
pub type PgtidResult<T> = Result<T, PgtidError>;

/// MySQL `ER_ERROR_WHEN_EXECUTING_COMMAND`, raised among others for missing log files.
const ER_ERROR_WHEN_EXECUTING_COMMAND: u16 = 1220;
/// MySQL `ER_UNKNOWN_TARGET_BINLOG`.
const ER_UNKNOWN_TARGET_BINLOG: u16 = 1373;
/// MySQL `ER_ACCESS_DENIED_ERROR`.
const ER_ACCESS_DENIED_ERROR: u16 = 1045;

/// Detailed payload stored in every [`PgtidError`].
#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type of the crate.
///
/// Equality and hashing only consider the kind and the static description, so errors of the
/// same category compare equal regardless of where they were raised.
#[derive(Debug, Clone)]
pub struct PgtidError {
    payload: Box<ErrorPayload>,
}

/// The broad failure classes callers react to.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
pub enum ErrorClass {
    /// A server could not be reached or refused the session.
    Connection,
    /// A read was rejected by the server or returned unusable data.
    Query,
    /// The searched marker or log file does not exist. An expected outcome of discovery.
    NotFound,
    /// The scanned logs contradict an assumption of the matching protocol. Always fatal.
    ProtocolViolation,
    /// Configuration, internal state and uncategorized failures.
    Other,
}

/// Specific categories of errors.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Connection Errors
    SourceConnectionFailed,
    AuthenticationError,

    // Query Errors
    SourceQueryFailed,
    ConversionError,
    InvalidData,

    // Not Found Errors
    MarkerNotFound,
    LogFileNotFound,

    // Protocol Violations
    ExhaustionPositionMismatch,
    RelayBoundOvershoot,
    DivergentEntries,
    OtherSideExhausted,
    NonMonotonicPosition,

    // General Errors
    ConfigError,
    InvalidState,
    IoError,

    // Unknown / Uncategorized
    Unknown,
}

impl ErrorKind {
    /// Returns the [`ErrorClass`] this kind belongs to.
    pub fn class(&self) -> ErrorClass {
        match self {
            ErrorKind::SourceConnectionFailed | ErrorKind::AuthenticationError => {
                ErrorClass::Connection
            }
            ErrorKind::SourceQueryFailed | ErrorKind::ConversionError | ErrorKind::InvalidData => {
                ErrorClass::Query
            }
            ErrorKind::MarkerNotFound | ErrorKind::LogFileNotFound => ErrorClass::NotFound,
            ErrorKind::ExhaustionPositionMismatch
            | ErrorKind::RelayBoundOvershoot
            | ErrorKind::DivergentEntries
            | ErrorKind::OtherSideExhausted
            | ErrorKind::NonMonotonicPosition => ErrorClass::ProtocolViolation,
            ErrorKind::ConfigError
            | ErrorKind::InvalidState
            | ErrorKind::IoError
            | ErrorKind::Unknown => ErrorClass::Other,
        }
    }
}

impl PgtidError {
    /// Returns the [`ErrorKind`] of this error.
    pub fn kind(&self) -> ErrorKind {
        self.payload.kind
    }

    /// Returns the [`ErrorClass`] of this error's kind.
    pub fn class(&self) -> ErrorClass {
        self.payload.kind.class()
    }

    /// Returns [`true`] if this error reports a missing marker or log file.
    pub fn is_not_found(&self) -> bool {
        self.class() == ErrorClass::NotFound
    }

    /// Returns the static description of this error.
    pub fn description(&self) -> &str {
        &self.payload.description
    }

    /// Returns the detailed error information if available.
    pub fn detail(&self) -> Option<&str> {
        self.payload.detail.as_deref()
    }

    /// Returns the captured backtrace for this error.
    pub fn backtrace(&self) -> &Backtrace {
        self.payload.backtrace.as_ref()
    }

    /// Returns the captured callsite location for this error.
    pub fn location(&self) -> &'static Location<'static> {
        self.payload.location
    }

    /// Attaches an originating [`error::Error`] to this error and returns the modified instance.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        self.payload.source = Some(Arc::new(source));
        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        PgtidError {
            payload: Box::new(ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            }),
        }
    }
}

impl PartialEq for PgtidError {
    fn eq(&self, other: &PgtidError) -> bool {
        self.payload.kind == other.payload.kind
            && self.payload.description == other.payload.description
    }
}

impl Hash for PgtidError {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.payload.kind.hash(state);
        self.payload.description.hash(state);
    }
}

impl fmt::Display for PgtidError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        let payload = &self.payload;
        let location = payload.location;
        write!(
            f,
            "[{:?}] {} @ {}:{}:{}",
            payload.kind,
            payload.description,
            location.file(),
            location.line(),
            location.column()
        )?;

        write_detail(payload.detail.as_deref(), f, 1)?;
        write_backtrace(payload.backtrace.as_ref(), f, 1)?;

        Ok(())
    }
}

impl error::Error for PgtidError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.payload
            .source
            .as_ref()
            .map(|source| source as &(dyn error::Error + 'static))
    }
}

/// Writes the captured backtrace with indentation.
fn write_backtrace(
    backtrace: &Backtrace,
    f: &mut fmt::Formatter<'_>,
    indent: usize,
) -> fmt::Result {
    let indent_str = "  ".repeat(indent);

    let rendered_backtrace = format!("{backtrace}");
    if !rendered_backtrace.trim().is_empty() {
        write!(f, "\n{indent_str}Backtrace:")?;
        for line in rendered_backtrace.lines() {
            if line.trim().is_empty() {
                write!(f, "\n{indent_str}  ")?;
            } else {
                write!(f, "\n{indent_str}  {line}")?;
            }
        }
    }

    Ok(())
}

/// Writes the detail block with indentation.
fn write_detail(detail: Option<&str>, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
    if let Some(detail) = detail {
        let indent_str = "  ".repeat(indent);
        if detail.trim().is_empty() {
            write!(f, "\n{indent_str}Detail: <empty>")?;
        } else {
            write!(f, "\n{indent_str}Detail:")?;
            for line in detail.lines() {
                if line.trim().is_empty() {
                    write!(f, "\n{indent_str}  ")?;
                } else {
                    write!(f, "\n{indent_str}  {line}")?;
                }
            }
        }
    }

    Ok(())
}

/// Creates a [`PgtidError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for PgtidError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> PgtidError {
        PgtidError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

/// Creates a [`PgtidError`] from an error kind, static description, and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for PgtidError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> PgtidError {
        PgtidError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Converts [`std::io::Error`] to [`PgtidError`] with [`ErrorKind::IoError`].
impl From<std::io::Error> for PgtidError {
    #[track_caller]
    fn from(err: std::io::Error) -> PgtidError {
        let detail = err.to_string();
        PgtidError::from_components(
            ErrorKind::IoError,
            Cow::Borrowed("I/O operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`regex::Error`] to [`PgtidError`] with [`ErrorKind::ConfigError`].
impl From<regex::Error> for PgtidError {
    #[track_caller]
    fn from(err: regex::Error) -> PgtidError {
        let detail = err.to_string();
        PgtidError::from_components(
            ErrorKind::ConfigError,
            Cow::Borrowed("Marker pattern is not a valid regular expression"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`ValidationError`] to [`PgtidError`] with [`ErrorKind::ConfigError`].
impl From<ValidationError> for PgtidError {
    #[track_caller]
    fn from(err: ValidationError) -> PgtidError {
        let detail = err.to_string();
        PgtidError::from_components(
            ErrorKind::ConfigError,
            Cow::Borrowed("Invalid configuration"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`LogFileNameError`] to [`PgtidError`] with [`ErrorKind::InvalidData`].
impl From<LogFileNameError> for PgtidError {
    #[track_caller]
    fn from(err: LogFileNameError) -> PgtidError {
        let detail = err.to_string();
        PgtidError::from_components(
            ErrorKind::InvalidData,
            Cow::Borrowed("Log file name has no sequence number"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`sqlx::Error`] to [`PgtidError`] with the appropriate error kind.
///
/// Server errors are classified by their MySQL error number: reads of log files the server
/// does not have map to [`ErrorKind::LogFileNotFound`], rejected credentials to
/// [`ErrorKind::AuthenticationError`]. Transport and pool failures map to
/// [`ErrorKind::SourceConnectionFailed`].
impl From<sqlx::Error> for PgtidError {
    #[track_caller]
    fn from(err: sqlx::Error) -> PgtidError {
        let (kind, description) = match &err {
            sqlx::Error::Database(db_err) => {
                match db_err.try_downcast_ref::<MySqlDatabaseError>() {
                    Some(mysql_err) => match mysql_err.number() {
                        ER_UNKNOWN_TARGET_BINLOG => {
                            (ErrorKind::LogFileNotFound, "MySQL log file not found")
                        }
                        ER_ERROR_WHEN_EXECUTING_COMMAND
                            if mysql_err.message().contains("Could not find target log") =>
                        {
                            (ErrorKind::LogFileNotFound, "MySQL log file not found")
                        }
                        ER_ACCESS_DENIED_ERROR => (
                            ErrorKind::AuthenticationError,
                            "MySQL authentication failed",
                        ),
                        _ => (ErrorKind::SourceQueryFailed, "MySQL query failed"),
                    },
                    None => (ErrorKind::SourceQueryFailed, "Database query failed"),
                }
            }
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed => (
                ErrorKind::SourceConnectionFailed,
                "MySQL connection failed",
            ),
            sqlx::Error::Configuration(_) => {
                (ErrorKind::ConfigError, "MySQL connection misconfigured")
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => (
                ErrorKind::ConversionError,
                "MySQL result decoding failed",
            ),
            sqlx::Error::ColumnNotFound(_) | sqlx::Error::RowNotFound => {
                (ErrorKind::InvalidData, "MySQL result has unexpected shape")
            }
            _ => (ErrorKind::SourceQueryFailed, "Database operation failed"),
        };

        let detail = err.to_string();
        PgtidError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}
