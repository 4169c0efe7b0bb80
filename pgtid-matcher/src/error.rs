use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error;
use std::fmt::{self, Write};

use pgtid::error::{ErrorKind, PgtidError};

pub type MatcherResult<T> = Result<T, MatcherError>;

/// Why a matcher run stopped.
///
/// Matching failures keep the library error with its kind and detail. Failures around it, in
/// loading configuration or writing the report, carry the backtrace captured where they were
/// converted.
#[derive(Debug)]
pub enum MatcherError {
    Pgtid(PgtidError),
    Config {
        source: Box<dyn Error + Send + Sync>,
        backtrace: Backtrace,
    },
    Io {
        source: std::io::Error,
        backtrace: Backtrace,
    },
}

impl MatcherError {
    pub fn config<E: Error + Send + Sync + 'static>(err: E) -> Self {
        MatcherError::Config {
            source: Box::new(err),
            backtrace: Backtrace::capture(),
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            MatcherError::Pgtid(_) => "matching error",
            MatcherError::Config { .. } => "configuration error",
            MatcherError::Io { .. } => "i/o error",
        }
    }

    /// Process exit status for this error.
    ///
    /// `2` when the servers share no usable marker or their logs diverge, which means the
    /// instance cannot be repointed at the source. `3` for configuration problems and `1` for
    /// everything else.
    pub fn exit_code(&self) -> u8 {
        match self {
            MatcherError::Pgtid(err)
                if matches!(
                    err.kind(),
                    ErrorKind::MarkerNotFound | ErrorKind::DivergentEntries
                ) =>
            {
                2
            }
            MatcherError::Config { .. } => 3,
            _ => 1,
        }
    }

    pub fn backtrace(&self) -> &Backtrace {
        match self {
            MatcherError::Pgtid(err) => err.backtrace(),
            MatcherError::Config { backtrace, .. } | MatcherError::Io { backtrace, .. } => {
                backtrace
            }
        }
    }

    /// Renders the error for stderr: category, kind and detail, the cause chain and, when
    /// `RUST_BACKTRACE` enabled capturing, the backtrace.
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_report(&mut out);
        out
    }

    fn write_report(&self, out: &mut String) -> fmt::Result {
        writeln!(out, "matcher failed")?;
        writeln!(out, "category: {}", self.category())?;

        match self {
            MatcherError::Pgtid(err) => {
                writeln!(out, "kind: {:?} ({:?})", err.kind(), err.class())?;
                writeln!(out, "error: {}", err.description())?;
                if let Some(detail) = err.detail() {
                    writeln!(out, "detail: {detail}")?;
                }
            }
            _ => writeln!(out, "error: {self}")?,
        }

        let mut cause = self.source();
        let mut depth = 1;
        while let Some(err) = cause {
            writeln!(out, "cause {depth}: {err}")?;
            cause = err.source();
            depth += 1;
        }

        let backtrace = self.backtrace();
        if backtrace.status() == BacktraceStatus::Captured {
            writeln!(out, "backtrace:")?;
            writeln!(out, "{}", backtrace.to_string().trim_end())?;
        }

        Ok(())
    }
}

impl fmt::Display for MatcherError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatcherError::Pgtid(err) => write!(f, "{err}"),
            MatcherError::Config { source, .. } => write!(f, "configuration error: {source}"),
            MatcherError::Io { source, .. } => write!(f, "i/o error: {source}"),
        }
    }
}

impl Error for MatcherError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MatcherError::Pgtid(err) => err.source(),
            MatcherError::Config { source, .. } => Some(source.as_ref()),
            MatcherError::Io { source, .. } => Some(source),
        }
    }
}

impl From<std::io::Error> for MatcherError {
    fn from(source: std::io::Error) -> Self {
        MatcherError::Io {
            source,
            backtrace: Backtrace::capture(),
        }
    }
}

impl From<PgtidError> for MatcherError {
    fn from(err: PgtidError) -> Self {
        MatcherError::Pgtid(err)
    }
}
