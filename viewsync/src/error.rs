//! Error types and result definitions for the view engine.
//!
//! [`SyncError`] carries a classification, a static description, optional dynamic detail, the
//! callsite and a backtrace. Errors can be aggregated when more than one worker fails.
//!
//! The classification drives the engine's failure policy: statement errors reported by the
//! destination store ([`ErrorKind::DestinationQueryFailed`]) are logged and skipped, everything
//! else is fatal.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Result type used across the engine.
pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type of the engine.
#[derive(Debug, Clone)]
pub struct SyncError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    Single(ErrorPayload),
    /// Aggregated errors, used when several workers fail.
    Many {
        errors: Vec<SyncError>,
        location: &'static Location<'static>,
    },
}

/// Classification of engine errors.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Connection Errors
    DestinationConnectionFailed,

    // Query & Execution Errors
    /// A statement was rejected by the destination store with a message, e.g. a constraint
    /// violation. Recoverable while streaming.
    DestinationQueryFailed,
    DestinationIoError,
    BootstrapFailed,

    // Data & Mapping Errors
    ConversionError,

    // Configuration Errors
    ConfigError,

    // State & Workflow Errors
    InvalidState,
    ApplyWorkerPanic,
    WriterWorkerPanic,

    // General Errors
    SourceError,
    DestinationError,

    Unknown,
}

impl SyncError {
    /// Returns the [`ErrorKind`] of this error, or of the first aggregated error.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.kind,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns all [`ErrorKind`]s contained in this error.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self.repr {
            ErrorRepr::Single(ref payload) => vec![payload.kind],
            ErrorRepr::Many { ref errors, .. } => {
                errors.iter().flat_map(|err| err.kinds()).collect()
            }
        }
    }

    /// Returns the static description of this error.
    pub fn description(&self) -> &str {
        match self.repr {
            ErrorRepr::Single(ref payload) => &payload.description,
            ErrorRepr::Many { .. } => "Multiple errors occurred",
        }
    }

    /// Returns the dynamic detail, for aggregates the first available one.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.detail.as_deref(),
            ErrorRepr::Many { ref errors, .. } => errors.iter().find_map(|e| e.detail()),
        }
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self.repr {
            ErrorRepr::Single(ref payload) => Some(payload.backtrace.as_ref()),
            ErrorRepr::Many { .. } => None,
        }
    }

    pub fn location(&self) -> &'static Location<'static> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.location,
            ErrorRepr::Many { location, .. } => location,
        }
    }

    /// Returns `true` when the destination store rejected a statement with a message.
    ///
    /// These are the only errors the destination writer logs and skips.
    pub fn is_statement_error(&self) -> bool {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.kind == ErrorKind::DestinationQueryFailed,
            ErrorRepr::Many { .. } => false,
        }
    }

    /// Attaches an originating error, exposed through [`error::Error::source`].
    ///
    /// Has no effect on aggregated errors.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let ErrorRepr::Single(ref mut payload) = self.repr {
            payload.source = Some(Arc::new(source));
        }
        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        SyncError {
            repr: ErrorRepr::Single(ErrorPayload {
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

impl PartialEq for SyncError {
    fn eq(&self, other: &SyncError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => a.kind == b.kind,
            (ErrorRepr::Many { errors: a, .. }, ErrorRepr::Many { errors: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match &self.repr {
            ErrorRepr::Single(payload) => {
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

                if let Some(detail) = payload.detail.as_deref() {
                    write!(f, "\n  Detail:")?;
                    for line in detail.lines() {
                        write!(f, "\n    {line}")?;
                    }
                }

                let rendered_backtrace = payload.backtrace.to_string();
                if !rendered_backtrace.trim().is_empty() && rendered_backtrace != "disabled backtrace"
                {
                    write!(f, "\n  Backtrace:")?;
                    for line in rendered_backtrace.lines() {
                        write!(f, "\n    {line}")?;
                    }
                }

                Ok(())
            }
            ErrorRepr::Many { errors, location } => {
                let count = errors.len();
                write!(
                    f,
                    "[Many] {} error{} aggregated @ {}:{}:{}",
                    count,
                    if count == 1 { "" } else { "s" },
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                for (index, error) in errors.iter().enumerate() {
                    let rendered = error.to_string();
                    let mut lines = rendered.lines();
                    if let Some(first_line) = lines.next() {
                        write!(f, "\n  {}. {}", index + 1, first_line)?;
                    }
                    for line in lines {
                        write!(f, "\n     {line}")?;
                    }
                }

                Ok(())
            }
        }
    }
}

impl error::Error for SyncError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload
                .source
                .as_ref()
                .map(|source| source.as_ref() as &(dyn error::Error + 'static)),
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|error| error as &(dyn error::Error + 'static)),
        }
    }
}

impl From<(ErrorKind, &'static str)> for SyncError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> SyncError {
        SyncError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

impl<D> From<(ErrorKind, &'static str, D)> for SyncError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> SyncError {
        SyncError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Aggregates errors. A single error is returned as is.
impl<E> From<Vec<E>> for SyncError
where
    E: Into<SyncError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> SyncError {
        let location = Location::caller();
        let mut errors: Vec<SyncError> = errors.into_iter().map(Into::into).collect();

        if errors.len() == 1 {
            if let Some(error) = errors.pop() {
                return error;
            }
        }

        SyncError {
            repr: ErrorRepr::Many { errors, location },
        }
    }
}

/// Converts [`sqlx::Error`] raised by the destination connection.
///
/// Errors carrying a server message map to [`ErrorKind::DestinationQueryFailed`] with the message
/// as detail. Transport and protocol failures are classified as connection or I/O errors.
impl From<sqlx::Error> for SyncError {
    #[track_caller]
    fn from(err: sqlx::Error) -> SyncError {
        let (kind, description, detail) = match &err {
            sqlx::Error::Database(db_err) => (
                ErrorKind::DestinationQueryFailed,
                "Destination statement failed",
                db_err.message().to_string(),
            ),
            sqlx::Error::Io(_) => (
                ErrorKind::DestinationIoError,
                "Destination I/O failed",
                err.to_string(),
            ),
            sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolClosed
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::WorkerCrashed => (
                ErrorKind::DestinationConnectionFailed,
                "Destination connection failed",
                err.to_string(),
            ),
            sqlx::Error::Configuration(_) => (
                ErrorKind::ConfigError,
                "Destination configuration is invalid",
                err.to_string(),
            ),
            sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::ColumnIndexOutOfBounds { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::TypeNotFound { .. } => (
                ErrorKind::ConversionError,
                "Destination result could not be decoded",
                err.to_string(),
            ),
            _ => (
                ErrorKind::DestinationError,
                "Destination operation failed",
                err.to_string(),
            ),
        };

        SyncError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bail, sync_error};

    #[test]
    fn single_error_keeps_kind_and_detail() {
        let err = sync_error!(ErrorKind::ConfigError, "Invalid binding", "view `orders`");

        assert_eq!(err.kind(), ErrorKind::ConfigError);
        assert_eq!(err.description(), "Invalid binding");
        assert_eq!(err.detail(), Some("view `orders`"));
        assert!(!err.is_statement_error());
    }

    #[test]
    fn aggregated_errors_expose_all_kinds() {
        let err: SyncError = vec![
            sync_error!(ErrorKind::ApplyWorkerPanic, "Apply worker panicked"),
            sync_error!(ErrorKind::DestinationIoError, "Destination I/O failed"),
        ]
        .into();

        assert_eq!(err.kind(), ErrorKind::ApplyWorkerPanic);
        assert_eq!(
            err.kinds(),
            vec![ErrorKind::ApplyWorkerPanic, ErrorKind::DestinationIoError]
        );
        assert!(err.to_string().starts_with("[Many] 2 errors aggregated"));
    }

    #[test]
    fn single_element_aggregate_is_unwrapped() {
        let err: SyncError = vec![sync_error!(ErrorKind::InvalidState, "Engine already started")].into();

        assert_eq!(err.kinds(), vec![ErrorKind::InvalidState]);
        assert_eq!(err.description(), "Engine already started");
    }

    #[test]
    fn statement_errors_are_recognized() {
        let err = sync_error!(
            ErrorKind::DestinationQueryFailed,
            "Destination statement failed",
            "Duplicate entry '5' for key 'PRIMARY'"
        );

        assert!(err.is_statement_error());
    }

    #[test]
    fn bail_returns_early() {
        fn check(value: u32) -> SyncResult<u32> {
            if value == 0 {
                bail!(ErrorKind::ConfigError, "Value cannot be zero");
            }
            Ok(value)
        }

        assert_eq!(check(3), Ok(3));
        assert_eq!(check(0).unwrap_err().kind(), ErrorKind::ConfigError);
    }

    #[test]
    fn sqlx_errors_are_classified_by_destination_concern() {
        let err = SyncError::from(sqlx::Error::ColumnNotFound("Position".to_string()));
        assert_eq!(err.kind(), ErrorKind::ConversionError);
        assert!(!err.is_statement_error());

        let err = SyncError::from(sqlx::Error::Io(std::io::Error::from(
            std::io::ErrorKind::ConnectionReset,
        )));
        assert_eq!(err.kind(), ErrorKind::DestinationIoError);

        let err = SyncError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.kind(), ErrorKind::DestinationError);
    }
}
