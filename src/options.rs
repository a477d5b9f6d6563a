use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::dates::DateParser;
use crate::dialect::DialectSpec;
use crate::error::{Error, Result};
use crate::value::{Dtype, Value};

/// One of the three parsing engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    /// Native byte tokenizer, known as `"c"`.
    Fast,
    /// Line-based engine, known as `"python"`.
    Python,
    /// Fixed-width engine, known as `"python-fwf"`.
    PythonFwf,
}

impl Engine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "c",
            Self::Python => "python",
            Self::PythonFwf => "python-fwf",
        }
    }

    pub(crate) fn is_python(&self) -> bool {
        !matches!(self, Self::Fast)
    }
}

impl FromStr for Engine {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "c" => Ok(Self::Fast),
            "python" => Ok(Self::Python),
            "python-fwf" => Ok(Self::PythonFwf),
            _ => Err(Error::invalid(format!(
                "Unknown engine: {} (valid options are \"c\", \"python\", or \"python-fwf\")",
                s
            ))),
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quoting policy, matching the `csv.QUOTE_*` constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quoting {
    #[default]
    Minimal,
    All,
    NonNumeric,
    None,
}

impl Quoting {
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Self::Minimal),
            1 => Ok(Self::All),
            2 => Ok(Self::NonNumeric),
            3 => Ok(Self::None),
            _ => Err(Error::invalid("bad \"quoting\" value")),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::Minimal => 0,
            Self::All => 1,
            Self::NonNumeric => 2,
            Self::None => 3,
        }
    }
}

/// The `sep` option.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Separator {
    /// Not passed: a comma.
    #[default]
    Default,
    /// Explicitly `None`: sniff the delimiter from the data.
    Sniff,
    /// One char is a literal delimiter, anything longer is a regex.
    Value(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Header {
    /// Row 0 when no names are given, no header otherwise.
    #[default]
    Infer,
    None,
    Row(usize),
    /// A multi-row header.
    Rows(Vec<usize>),
}

impl Header {
    pub(crate) fn rows(&self) -> Option<Vec<usize>> {
        match self {
            Self::Row(row) => Some(vec![*row]),
            Self::Rows(rows) => Some(rows.clone()),
            _ => None,
        }
    }
}

/// A reference to a column, by position or by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnRef {
    Position(usize),
    Name(String),
}

impl From<usize> for ColumnRef {
    fn from(value: usize) -> Self {
        Self::Position(value)
    }
}

impl From<&str> for ColumnRef {
    fn from(value: &str) -> Self {
        Self::Name(value.to_string())
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Position(i) => write!(f, "{}", i),
            Self::Name(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IndexCol {
    /// Never use the first columns as index, even for ragged files.
    False,
    /// No explicit index, but one may be implied by the data.
    #[default]
    None,
    /// Always rejected.
    True,
    Columns(Vec<ColumnRef>),
}

impl IndexCol {
    pub(crate) fn columns(&self) -> &[ColumnRef] {
        match self {
            Self::Columns(cols) => cols,
            _ => &[],
        }
    }
}

pub type ColumnPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;
pub type RowPredicate = Arc<dyn Fn(usize) -> bool + Send + Sync>;
pub type Converter = Arc<dyn Fn(&str) -> Value + Send + Sync>;

#[derive(Clone)]
pub enum UseCols {
    Positions(Vec<usize>),
    Names(Vec<String>),
    Predicate(ColumnPredicate),
}

impl fmt::Debug for UseCols {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Positions(p) => f.debug_tuple("Positions").field(p).finish(),
            Self::Names(n) => f.debug_tuple("Names").field(n).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NaValues {
    /// Markers applying to every column.
    List(Vec<String>),
    /// Markers per column. Columns not listed fall back to the defaults.
    PerColumn(Vec<(ColumnRef, Vec<String>)>),
}

#[derive(Debug, Clone)]
pub enum DtypeSpec {
    All(Dtype),
    PerColumn(Vec<(ColumnRef, Dtype)>),
}

#[derive(Clone, Default)]
pub enum SkipRows {
    #[default]
    None,
    /// Skip the first n rows.
    Count(usize),
    Set(BTreeSet<usize>),
    Predicate(RowPredicate),
}

impl SkipRows {
    /// Whether the row at the given 0-indexed position must be skipped.
    #[inline]
    pub fn skips(&self, row: usize) -> bool {
        match self {
            Self::None => false,
            Self::Count(n) => row < *n,
            Self::Set(set) => set.contains(&row),
            Self::Predicate(predicate) => predicate(row),
        }
    }
}

impl fmt::Debug for SkipRows {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Count(n) => f.debug_tuple("Count").field(n).finish(),
            Self::Set(s) => f.debug_tuple("Set").field(s).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateSpec {
    /// Parse a column in place.
    Single(ColumnRef),
    /// Concatenate columns (space separated) into a new column named after
    /// the parts joined by `_`.
    Combine(Vec<ColumnRef>),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ParseDates {
    #[default]
    False,
    /// Parse the index.
    True,
    Columns(Vec<DateSpec>),
    /// New column name to the columns it is built from.
    Named(Vec<(String, Vec<ColumnRef>)>),
}

impl ParseDates {
    pub(crate) fn is_enabled(&self) -> bool {
        !matches!(self, Self::False)
    }

    pub(crate) fn has_complex_columns(&self) -> bool {
        match self {
            Self::Columns(specs) => specs.iter().any(|s| matches!(s, DateSpec::Combine(_))),
            Self::Named(_) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ColSpecs {
    #[default]
    Infer,
    /// Half-open `(start, end)` character intervals.
    Explicit(Vec<(usize, usize)>),
}

/// Every knob of the parsing engines.
///
/// Prefer building it through [`ReaderBuilder`](crate::ReaderBuilder).
#[derive(Clone)]
pub struct ParseOptions {
    pub sep: Separator,
    pub delimiter: Option<String>,
    pub delim_whitespace: bool,
    pub dialect: Option<DialectSpec>,
    pub header: Header,
    pub names: Option<Vec<String>>,
    pub prefix: Option<String>,
    pub index_col: IndexCol,
    pub usecols: Option<UseCols>,
    pub na_values: Option<NaValues>,
    pub keep_default_na: bool,
    pub na_filter: bool,
    pub converters: Vec<(ColumnRef, Converter)>,
    pub dtype: Option<DtypeSpec>,
    pub true_values: Vec<String>,
    pub false_values: Vec<String>,
    pub thousands: Option<char>,
    pub decimal: char,
    pub comment: Option<char>,
    pub skiprows: SkipRows,
    pub skipfooter: usize,
    pub skip_blank_lines: bool,
    pub skipinitialspace: bool,
    pub parse_dates: ParseDates,
    pub date_parser: Option<DateParser>,
    pub dayfirst: bool,
    pub keep_date_col: bool,
    pub mangle_dupe_cols: bool,
    pub error_bad_lines: bool,
    pub warn_bad_lines: bool,
    pub quotechar: Option<char>,
    pub quoting: Quoting,
    pub doublequote: bool,
    pub escapechar: Option<char>,
    pub lineterminator: Option<char>,
    pub low_memory: bool,
    pub engine: Option<Engine>,
    pub chunksize: Option<usize>,
    pub iterator: bool,
    pub nrows: Option<usize>,
    pub squeeze: bool,
    pub colspecs: Option<ColSpecs>,
    pub widths: Option<Vec<usize>>,
    pub infer_nrows: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            sep: Separator::Default,
            delimiter: None,
            delim_whitespace: false,
            dialect: None,
            header: Header::Infer,
            names: None,
            prefix: None,
            index_col: IndexCol::None,
            usecols: None,
            na_values: None,
            keep_default_na: true,
            na_filter: true,
            converters: Vec::new(),
            dtype: None,
            true_values: Vec::new(),
            false_values: Vec::new(),
            thousands: None,
            decimal: '.',
            comment: None,
            skiprows: SkipRows::None,
            skipfooter: 0,
            skip_blank_lines: true,
            skipinitialspace: false,
            parse_dates: ParseDates::False,
            date_parser: None,
            dayfirst: false,
            keep_date_col: false,
            mangle_dupe_cols: true,
            error_bad_lines: true,
            warn_bad_lines: true,
            quotechar: Some('"'),
            quoting: Quoting::Minimal,
            doublequote: true,
            escapechar: None,
            lineterminator: None,
            low_memory: true,
            engine: None,
            chunksize: None,
            iterator: false,
            nrows: None,
            squeeze: false,
            colspecs: None,
            widths: None,
            infer_nrows: 100,
        }
    }
}

impl fmt::Debug for ParseOptions {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ParseOptions")
            .field("sep", &self.sep)
            .field("delimiter", &self.delimiter)
            .field("header", &self.header)
            .field("names", &self.names)
            .field("index_col", &self.index_col)
            .field("usecols", &self.usecols)
            .field("engine", &self.engine)
            .field("chunksize", &self.chunksize)
            .field("nrows", &self.nrows)
            .finish_non_exhaustive()
    }
}

impl ParseOptions {
    /// The delimiter after aliasing `sep` to `delimiter`. `None` means sniff.
    pub(crate) fn resolved_delimiter(&self) -> Option<String> {
        if let Some(delimiter) = &self.delimiter {
            return Some(delimiter.clone());
        }

        match &self.sep {
            Separator::Default => Some(",".to_string()),
            Separator::Sniff => None,
            Separator::Value(sep) => Some(sep.clone()),
        }
    }

    /// Dtype requested for a column, if any.
    pub(crate) fn dtype_for(&self, position: usize, name: &str) -> Option<&Dtype> {
        match &self.dtype {
            None => None,
            Some(DtypeSpec::All(dtype)) => Some(dtype),
            Some(DtypeSpec::PerColumn(entries)) => entries
                .iter()
                .find(|(col, _)| col_matches(col, position, name))
                .map(|(_, dtype)| dtype),
        }
    }

    pub(crate) fn converter_for(&self, position: usize, name: &str) -> Option<&Converter> {
        self.converters
            .iter()
            .find(|(col, _)| col_matches(col, position, name))
            .map(|(_, conv)| conv)
    }
}

#[inline]
pub(crate) fn col_matches(col: &ColumnRef, position: usize, name: &str) -> bool {
    match col {
        ColumnRef::Position(i) => *i == position,
        ColumnRef::Name(n) => n == name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_from_str() {
        assert_eq!("c".parse::<Engine>().unwrap(), Engine::Fast);
        assert_eq!("python".parse::<Engine>().unwrap(), Engine::Python);
        assert_eq!("python-fwf".parse::<Engine>().unwrap(), Engine::PythonFwf);

        let err = "pyarrow".parse::<Engine>().unwrap_err();
        assert!(err.to_string().starts_with("Unknown engine: pyarrow"));
    }

    #[test]
    fn test_skiprows() {
        assert!(SkipRows::Count(2).skips(1));
        assert!(!SkipRows::Count(2).skips(2));
        assert!(SkipRows::Set([0, 4].into_iter().collect()).skips(4));
        assert!(SkipRows::Predicate(Arc::new(|i| i % 2 == 1)).skips(3));
        assert!(!SkipRows::None.skips(0));
    }

    #[test]
    fn test_resolved_delimiter() {
        let mut options = ParseOptions::default();
        assert_eq!(options.resolved_delimiter().as_deref(), Some(","));

        options.sep = Separator::Sniff;
        assert_eq!(options.resolved_delimiter(), None);

        options.delimiter = Some(";".to_string());
        assert_eq!(options.resolved_delimiter().as_deref(), Some(";"));
    }
}
