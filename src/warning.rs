use std::fmt;

/// A non-fatal condition noticed while opening or reading.
///
/// Warnings never alter the shape of the parsed result. They are logged
/// through `tracing` when raised and kept by the reader so that callers can
/// inspect them with [`TextFileReader::warnings`](crate::TextFileReader::warnings).
#[derive(Debug, Clone, PartialEq)]
pub enum ParserWarning {
    /// An explicit option disagrees with the dialect, the dialect won.
    DialectConflict {
        param: &'static str,
        provided: String,
        dialect: String,
    },
    /// The fast engine could not be used.
    EngineFallback { reason: String },
    /// A row with too many fields was dropped.
    BadLineSkipped {
        line: u64,
        expected: usize,
        actual: usize,
    },
    /// A row the tokenizer could not make sense of was dropped.
    MalformedLineSkipped { line: u64, reason: String },
    /// Both a converter and a dtype were given for the same column.
    ConverterOverridesDtype { column: String },
    /// A duplicated column name was renamed.
    DuplicateColumnRenamed { original: String, renamed: String },
}

impl ParserWarning {
    pub(crate) fn emit(self, sink: &mut Vec<ParserWarning>) {
        match &self {
            Self::DialectConflict { param, .. } => {
                tracing::warn!(param = *param, "{}", self)
            }
            Self::EngineFallback { reason } => {
                tracing::warn!(reason = reason.as_str(), "{}", self)
            }
            Self::BadLineSkipped { line, .. } | Self::MalformedLineSkipped { line, .. } => {
                tracing::warn!(line = *line, "{}", self)
            }
            Self::ConverterOverridesDtype { column } => {
                tracing::warn!(column = column.as_str(), "{}", self)
            }
            Self::DuplicateColumnRenamed { original, .. } => {
                tracing::warn!(column = original.as_str(), "{}", self)
            }
        }

        sink.push(self);
    }
}

impl fmt::Display for ParserWarning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::DialectConflict {
                param,
                provided,
                dialect,
            } => write!(
                f,
                "Conflicting values for '{}': '{}' was provided, but the dialect specifies '{}'. Using the dialect-specified value.",
                param, provided, dialect
            ),
            Self::EngineFallback { reason } => write!(
                f,
                "Falling back to the 'python' engine because {}; you can avoid this warning by specifying engine='python'.",
                reason
            ),
            Self::BadLineSkipped {
                line,
                expected,
                actual,
            } => write!(
                f,
                "Skipping line {}: expected {} fields, saw {}",
                line, expected, actual
            ),
            Self::MalformedLineSkipped { line, reason } => {
                write!(f, "Skipping line {}: {}", line, reason)
            }
            Self::ConverterOverridesDtype { column } => write!(
                f,
                "Both a converter and dtype were specified for column {} - only the converter will be used",
                column
            ),
            Self::DuplicateColumnRenamed { original, renamed } => {
                write!(f, "Duplicate column '{}' renamed to '{}'", original, renamed)
            }
        }
    }
}
