use std::{error, fmt, io, result};

/// The specific type of an error.
#[derive(Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Wrap a [std::io::Error].
    Io(io::Error),

    /// Indicate that the given combination of options cannot be honored. Raised
    /// when opening a reader, never recovered.
    InvalidOption(String),

    /// Indicate that an option was given a non-default value while the
    /// resolved engine does not support it.
    UnsupportedOption {
        /// Name of the offending option
        option: &'static str,
        /// Name of the resolved engine
        engine: &'static str,
        /// Why the engine was resolved, when it was a fallback
        fallback_reason: Option<String>,
    },

    /// Indicate that the fast engine was explicitly requested but cannot
    /// handle some requested feature.
    EngineFallback(String),

    /// Indicate that a dialect lacks some mandatory attribute.
    InvalidDialect(String),

    /// Indicate that no columns could be found, e.g. in an empty stream with
    /// no explicit names.
    EmptyData(String),

    /// Indicate a structural problem found while parsing.
    Parser(String),

    /// Indicate that a data row has more fields than expected.
    BadLine {
        /// 1-indexed row number
        line: u64,
        /// Expected number of fields
        expected: usize,
        /// Actual number of fields observed
        actual: usize,
        /// Optional hint appended to the message
        hint: Option<&'static str>,
    },

    /// Indicate that a column could not be cast to its requested type.
    Cast {
        /// Display name of the column
        column: String,
        /// Requested type
        dtype: String,
        /// Optional precise reason
        reason: Option<String>,
    },

    /// Indicate that some capability is not implemented.
    Unsupported(String),

    /// Wrap a [regex::Error] from an invalid separator.
    Regex(regex::Error),

    /// Indicate that the reader has no more rows to give.
    Exhausted,
}

/// An error occurring when opening or reading tabular text.
#[derive(Debug)]
pub struct Error(ErrorKind);

impl Error {
    pub(crate) fn new(kind: ErrorKind) -> Self {
        Self(kind)
    }

    pub(crate) fn invalid<S: Into<String>>(msg: S) -> Self {
        Self(ErrorKind::InvalidOption(msg.into()))
    }

    pub(crate) fn parser<S: Into<String>>(msg: S) -> Self {
        Self(ErrorKind::Parser(msg.into()))
    }

    /// Return whether the wrapped error is a [`std::io::Error`].
    pub fn is_io_error(&self) -> bool {
        matches!(self.0, ErrorKind::Io(_))
    }

    /// Return whether the reader was exhausted.
    pub fn is_exhausted(&self) -> bool {
        matches!(self.0, ErrorKind::Exhausted)
    }

    /// Return a reference to the underlying [`ErrorKind`].
    pub fn kind(&self) -> &ErrorKind {
        &self.0
    }

    /// Unwraps the error into its underlying [`ErrorKind`].
    pub fn into_kind(self) -> ErrorKind {
        self.0
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self(ErrorKind::Io(err))
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Self(ErrorKind::Regex(err))
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        Self::new(io::ErrorKind::Other, err)
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self.0 {
            ErrorKind::Io(ref err) => Some(err),
            ErrorKind::Regex(ref err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0 {
            ErrorKind::Io(ref err) => err.fmt(f),
            ErrorKind::InvalidOption(ref msg)
            | ErrorKind::InvalidDialect(ref msg)
            | ErrorKind::EmptyData(ref msg)
            | ErrorKind::Parser(ref msg)
            | ErrorKind::Unsupported(ref msg)
            | ErrorKind::EngineFallback(ref msg) => f.write_str(msg),
            ErrorKind::UnsupportedOption {
                option,
                engine,
                fallback_reason: Some(ref reason),
            } => write!(
                f,
                "Falling back to the '{}' engine because {}, but this causes '{}' to be ignored as it is not supported by the '{}' engine.",
                engine, reason, option, engine
            ),
            ErrorKind::UnsupportedOption {
                option,
                engine,
                fallback_reason: None,
            } => write!(
                f,
                "The '{}' option is not supported with the '{}' engine",
                option, engine
            ),
            ErrorKind::BadLine {
                line,
                expected,
                actual,
                hint,
            } => {
                write!(
                    f,
                    "Error tokenizing data. Expected {} fields in line {}, saw {}",
                    expected, line, actual
                )?;

                if let Some(hint) = hint {
                    write!(f, ". {}", hint)?;
                }

                Ok(())
            }
            ErrorKind::Cast {
                ref column,
                ref dtype,
                reason: None,
            } => write!(f, "Unable to convert column {} to type {}", column, dtype),
            ErrorKind::Cast {
                ref column,
                ref dtype,
                reason: Some(ref reason),
            } => write!(
                f,
                "Unable to convert column {} to type {}: {}",
                column, dtype, reason
            ),
            ErrorKind::Regex(ref err) => err.fmt(f),
            ErrorKind::Exhausted => f.write_str("no more rows to read"),
        }
    }
}

/// A type alias for `Result<T, frame_csv::Error>`.
pub type Result<T> = result::Result<T, Error>;
