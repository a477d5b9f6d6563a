use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, Read};
use std::mem;
use std::path::Path;

use crate::dates::DateParser;
use crate::dialect::{merge_dialect, DialectSpec};
use crate::error::{Error, ErrorKind, Result};
use crate::fast::{open_fast, FastEngine};
use crate::fwf::open_fwf;
use crate::line::LineEngine;
use crate::options::{
    ColSpecs, ColumnRef, Converter, DtypeSpec, Engine, Header, IndexCol, NaValues, ParseDates,
    ParseOptions, Quoting, Separator, SkipRows, UseCols,
};
use crate::value::{Index, ParseResult, Series, Table, Value};
use crate::warning::ParserWarning;

/// Where the text to parse comes from.
pub enum Source {
    /// A stream of decoded UTF-8 text.
    Reader(Box<dyn BufRead>),
    /// Rows already split into fields.
    Rows(Vec<Vec<String>>),
}

impl Source {
    pub fn from_reader<R: Read + 'static>(reader: R) -> Self {
        Self::Reader(Box::new(BufReader::new(reader)))
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::from_reader(File::open(path)?))
    }

    pub fn from_text<S: Into<String>>(text: S) -> Self {
        Self::Reader(Box::new(Cursor::new(text.into())))
    }
}

/// Builds a [`TextFileReader`] with various configuration knobs.
#[derive(Clone, Default)]
pub struct ReaderBuilder {
    options: ParseOptions,
}

impl ReaderBuilder {
    /// Create a new [`ReaderBuilder`] with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a [`ReaderBuilder`] configured for fixed-width text, inferring
    /// column intervals unless told otherwise.
    pub fn fixed_width() -> Self {
        let mut builder = Self::default();
        builder.engine(Engine::PythonFwf).colspecs(ColSpecs::Infer);
        builder
    }

    pub fn from_options(options: ParseOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Set the separator. A single char is taken literally, anything longer
    /// is a regular expression, `\s+` meaning any whitespace.
    ///
    /// Will default to a comma.
    pub fn sep(&mut self, sep: &str) -> &mut Self {
        self.options.sep = Separator::Value(sep.to_string());
        self
    }

    /// Guess the separator from the first line of data.
    pub fn sniff_sep(&mut self) -> &mut Self {
        self.options.sep = Separator::Sniff;
        self
    }

    /// Alias of [`Self::sep`], winning over it.
    pub fn delimiter(&mut self, delimiter: &str) -> &mut Self {
        self.options.delimiter = Some(delimiter.to_string());
        self
    }

    pub fn delim_whitespace(&mut self, yes: bool) -> &mut Self {
        self.options.delim_whitespace = yes;
        self
    }

    pub fn dialect(&mut self, dialect: DialectSpec) -> &mut Self {
        self.options.dialect = Some(dialect);
        self
    }

    /// Will default to row 0, or no header at all when names are given.
    pub fn header(&mut self, header: Header) -> &mut Self {
        self.options.header = header;
        self
    }

    pub fn names<S: Into<String>, I: IntoIterator<Item = S>>(&mut self, names: I) -> &mut Self {
        self.options.names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Prefix of the generated column names when there is no header.
    pub fn prefix(&mut self, prefix: &str) -> &mut Self {
        self.options.prefix = Some(prefix.to_string());
        self
    }

    pub fn index_col(&mut self, index_col: IndexCol) -> &mut Self {
        self.options.index_col = index_col;
        self
    }

    pub fn usecols(&mut self, usecols: UseCols) -> &mut Self {
        self.options.usecols = Some(usecols);
        self
    }

    pub fn na_values(&mut self, na_values: NaValues) -> &mut Self {
        self.options.na_values = Some(na_values);
        self
    }

    /// Will default to `true`.
    pub fn keep_default_na(&mut self, yes: bool) -> &mut Self {
        self.options.keep_default_na = yes;
        self
    }

    /// Indicate whether missing values must be detected at all.
    ///
    /// Will default to `true`.
    pub fn na_filter(&mut self, yes: bool) -> &mut Self {
        self.options.na_filter = yes;
        self
    }

    /// Add a converter, run on every raw token of the given column.
    pub fn converter<C, F>(&mut self, column: C, converter: F) -> &mut Self
    where
        C: Into<ColumnRef>,
        F: Fn(&str) -> Value + Send + Sync + 'static,
    {
        let converter: Converter = std::sync::Arc::new(converter);
        self.options.converters.push((column.into(), converter));
        self
    }

    pub fn dtype(&mut self, dtype: DtypeSpec) -> &mut Self {
        self.options.dtype = Some(dtype);
        self
    }

    pub fn true_values<S: Into<String>, I: IntoIterator<Item = S>>(
        &mut self,
        values: I,
    ) -> &mut Self {
        self.options.true_values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn false_values<S: Into<String>, I: IntoIterator<Item = S>>(
        &mut self,
        values: I,
    ) -> &mut Self {
        self.options.false_values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn thousands(&mut self, thousands: char) -> &mut Self {
        self.options.thousands = Some(thousands);
        self
    }

    /// Will default to `.`.
    pub fn decimal(&mut self, decimal: char) -> &mut Self {
        self.options.decimal = decimal;
        self
    }

    pub fn comment(&mut self, comment: char) -> &mut Self {
        self.options.comment = Some(comment);
        self
    }

    pub fn skiprows(&mut self, skiprows: SkipRows) -> &mut Self {
        self.options.skiprows = skiprows;
        self
    }

    pub fn skipfooter(&mut self, n: usize) -> &mut Self {
        self.options.skipfooter = n;
        self
    }

    /// Will default to `true`.
    pub fn skip_blank_lines(&mut self, yes: bool) -> &mut Self {
        self.options.skip_blank_lines = yes;
        self
    }

    pub fn skipinitialspace(&mut self, yes: bool) -> &mut Self {
        self.options.skipinitialspace = yes;
        self
    }

    pub fn parse_dates(&mut self, parse_dates: ParseDates) -> &mut Self {
        self.options.parse_dates = parse_dates;
        self
    }

    pub fn date_parser(&mut self, parser: DateParser) -> &mut Self {
        self.options.date_parser = Some(parser);
        self
    }

    pub fn dayfirst(&mut self, yes: bool) -> &mut Self {
        self.options.dayfirst = yes;
        self
    }

    pub fn keep_date_col(&mut self, yes: bool) -> &mut Self {
        self.options.keep_date_col = yes;
        self
    }

    /// Only `true` is supported.
    pub fn mangle_dupe_cols(&mut self, yes: bool) -> &mut Self {
        self.options.mangle_dupe_cols = yes;
        self
    }

    /// Indicate whether rows with too many fields are errors. When `false`
    /// they are dropped.
    ///
    /// Will default to `true`.
    pub fn error_bad_lines(&mut self, yes: bool) -> &mut Self {
        self.options.error_bad_lines = yes;
        self
    }

    pub fn warn_bad_lines(&mut self, yes: bool) -> &mut Self {
        self.options.warn_bad_lines = yes;
        self
    }

    /// Will default to a double quote.
    pub fn quotechar(&mut self, quotechar: Option<char>) -> &mut Self {
        self.options.quotechar = quotechar;
        self
    }

    pub fn quoting(&mut self, quoting: Quoting) -> &mut Self {
        self.options.quoting = quoting;
        self
    }

    pub fn doublequote(&mut self, yes: bool) -> &mut Self {
        self.options.doublequote = yes;
        self
    }

    pub fn escapechar(&mut self, escapechar: char) -> &mut Self {
        self.options.escapechar = Some(escapechar);
        self
    }

    /// Only supported by the fast engine.
    pub fn lineterminator(&mut self, terminator: char) -> &mut Self {
        self.options.lineterminator = Some(terminator);
        self
    }

    /// Only supported by the fast engine.
    pub fn low_memory(&mut self, yes: bool) -> &mut Self {
        self.options.low_memory = yes;
        self
    }

    /// Request an engine. An explicitly requested engine is never replaced:
    /// options it cannot honor are errors instead of a fallback.
    pub fn engine(&mut self, engine: Engine) -> &mut Self {
        self.options.engine = Some(engine);
        self
    }

    pub fn chunksize(&mut self, chunksize: usize) -> &mut Self {
        self.options.chunksize = Some(chunksize);
        self
    }

    pub fn iterator(&mut self, yes: bool) -> &mut Self {
        self.options.iterator = yes;
        self
    }

    /// Maximum number of rows to read overall.
    pub fn nrows(&mut self, nrows: usize) -> &mut Self {
        self.options.nrows = Some(nrows);
        self
    }

    /// Return a single column as a [`Series`].
    pub fn squeeze(&mut self, yes: bool) -> &mut Self {
        self.options.squeeze = yes;
        self
    }

    pub fn colspecs(&mut self, colspecs: ColSpecs) -> &mut Self {
        self.options.colspecs = Some(colspecs);
        self
    }

    pub fn widths(&mut self, widths: Vec<usize>) -> &mut Self {
        self.options.widths = Some(widths);
        self
    }

    /// Number of rows sampled to infer fixed-width columns.
    ///
    /// Will default to `100`.
    pub fn infer_nrows(&mut self, n: usize) -> &mut Self {
        self.options.infer_nrows = n;
        self
    }

    /// Create a new [`TextFileReader`] over the given source.
    pub fn open(&self, source: Source) -> Result<TextFileReader> {
        TextFileReader::open(source, self.options.clone())
    }

    pub fn from_reader<R: Read + 'static>(&self, reader: R) -> Result<TextFileReader> {
        self.open(Source::from_reader(reader))
    }

    pub fn from_path<P: AsRef<Path>>(&self, path: P) -> Result<TextFileReader> {
        self.open(Source::from_path(path)?)
    }

    pub fn from_str(&self, text: &str) -> Result<TextFileReader> {
        self.open(Source::from_text(text))
    }

    pub fn from_rows(&self, rows: Vec<Vec<String>>) -> Result<TextFileReader> {
        self.open(Source::Rows(rows))
    }
}

fn validate(options: &ParseOptions) -> Result<()> {
    if options.skipfooter > 0 {
        if options.chunksize.is_some() || options.iterator {
            return Err(Error::invalid("'skipfooter' not supported for 'iteration'"));
        }

        if options.nrows.is_some() {
            return Err(Error::invalid("'skipfooter' not supported with 'nrows'"));
        }
    }

    if options.index_col == IndexCol::True {
        return Err(Error::invalid("The value of index_col couldn't be 'True'"));
    }

    match &options.header {
        Header::Rows(rows) => {
            if rows.is_empty() {
                return Err(Error::invalid("header must be integer or list of integers"));
            }

            if options.usecols.is_some() {
                return Err(Error::invalid(
                    "cannot specify usecols when specifying a multi-index header",
                ));
            }

            if options.names.is_some() {
                return Err(Error::invalid(
                    "cannot specify names when specifying a multi-index header",
                ));
            }

            let named_index = options
                .index_col
                .columns()
                .iter()
                .any(|c| matches!(c, ColumnRef::Name(_)));

            if named_index {
                return Err(Error::invalid(
                    "index_col must only contain row numbers when specifying a multi-index header",
                ));
            }
        }
        Header::Row(_) if options.prefix.is_some() => {
            return Err(Error::invalid(
                "Argument prefix must be None if argument header is not None",
            ));
        }
        _ => {}
    }

    if let Some(names) = &options.names {
        let unique: HashSet<&String> = names.iter().collect();

        if unique.len() != names.len() {
            return Err(Error::invalid("Duplicate names are not allowed."));
        }
    }

    if options.chunksize == Some(0) {
        return Err(Error::invalid("'chunksize' must be an integer >=1"));
    }

    if !options.mangle_dupe_cols {
        return Err(Error::new(ErrorKind::Unsupported(
            "Setting mangle_dupe_cols=False is not supported yet".to_string(),
        )));
    }

    if options.delim_whitespace
        && (options.sep != Separator::Default || options.delimiter.is_some())
    {
        return Err(Error::invalid(
            "Specified a delimiter with both sep and delim_whitespace=True; you can only specify one.",
        ));
    }

    if matches!(options.colspecs, Some(ColSpecs::Explicit(_))) && options.widths.is_some() {
        return Err(Error::invalid(
            "You must specify only one of 'widths' and 'colspecs'",
        ));
    }

    Ok(())
}

/// Why the fast engine cannot handle the options, if it cannot.
fn fallback_reason(options: &ParseOptions, source: &Source) -> Option<String> {
    if options.skipfooter > 0 {
        return Some("the 'c' engine does not support skipfooter".to_string());
    }

    if matches!(source, Source::Rows(_)) {
        return Some("the 'c' engine does not support pre-split rows".to_string());
    }

    if !options.delim_whitespace {
        match options.resolved_delimiter() {
            None => {
                return Some(
                    "the 'c' engine does not support sep=None with delim_whitespace=False"
                        .to_string(),
                )
            }
            Some(sep) if sep == r"\s+" => {}
            Some(sep) if sep.chars().count() > 1 => {
                return Some(
                    "the 'c' engine does not support regex separators (separators > 1 char and different from '\\s+' are interpreted as regex)"
                        .to_string(),
                )
            }
            Some(sep) if sep.len() > 1 => {
                return Some(
                    "the separator encoded in utf-8 is > 1 char long, and the 'c' engine does not support such separators"
                        .to_string(),
                )
            }
            _ => {}
        }
    }

    match options.quotechar {
        Some(q) if !q.is_ascii() => Some(
            "ord(quotechar) > 127, meaning the quotechar is larger than one byte, and the 'c' engine does not support such quotechars"
                .to_string(),
        ),
        _ => None,
    }
}

/// Options only the fast engine knows about, with a non-default value.
fn fast_only_options(options: &ParseOptions) -> Vec<&'static str> {
    let defaults = ParseOptions::default();
    let mut found = Vec::new();

    if options.lineterminator != defaults.lineterminator {
        found.push("lineterminator");
    }

    if options.low_memory != defaults.low_memory {
        found.push("low_memory");
    }

    found
}

/// Pick the engine, warning about or refusing any fallback.
fn resolve_engine(
    options: &ParseOptions,
    source: &Source,
    warnings: &mut Vec<ParserWarning>,
) -> Result<Engine> {
    let requested = options.engine.unwrap_or(Engine::Fast);
    let mut engine = requested;
    let mut reason = None;

    if requested == Engine::Fast {
        reason = fallback_reason(options, source);

        if let Some(reason) = &reason {
            if options.engine.is_some() {
                return Err(Error::new(ErrorKind::EngineFallback(reason.clone())));
            }

            engine = Engine::Python;
        }
    }

    if engine.is_python() {
        if let Some(option) = fast_only_options(options).into_iter().next() {
            return Err(Error::new(ErrorKind::UnsupportedOption {
                option,
                engine: engine.as_str(),
                fallback_reason: reason,
            }));
        }
    }

    if let Some(reason) = reason {
        ParserWarning::EngineFallback { reason }.emit(warnings);
    }

    tracing::debug!(engine = engine.as_str(), "resolved engine");

    Ok(engine)
}

/// The engine actually parsing.
enum EngineKind {
    Fast(Box<FastEngine>),
    Line(LineEngine),
    FixedWidth(LineEngine),
}

impl EngineKind {
    fn open(engine: Engine, source: Source, options: ParseOptions) -> Result<Self> {
        Ok(match (engine, source) {
            (Engine::Fast, Source::Reader(reader)) => Self::Fast(Box::new(open_fast(reader, options)?)),
            (Engine::Python, Source::Reader(reader)) => {
                Self::Line(LineEngine::from_reader(reader, options)?)
            }
            (Engine::PythonFwf, Source::Reader(reader)) => Self::FixedWidth(open_fwf(reader, options)?),
            (Engine::PythonFwf, Source::Rows(_)) => {
                return Err(Error::new(ErrorKind::Unsupported(
                    "the 'python-fwf' engine can only read text".to_string(),
                )))
            }
            (_, Source::Rows(rows)) => Self::Line(LineEngine::from_rows(rows, options)?),
        })
    }

    fn read(&mut self, rows: Option<usize>) -> Result<Option<ParseResult>> {
        match self {
            Self::Fast(engine) => engine.read(rows),
            Self::Line(engine) | Self::FixedWidth(engine) => engine.read(rows),
        }
    }

    fn take_warnings(&mut self) -> Vec<ParserWarning> {
        match self {
            Self::Fast(engine) => mem::take(&mut engine.warnings),
            Self::Line(engine) | Self::FixedWidth(engine) => engine.take_warnings(),
        }
    }
}

/// A resumable reader of delimited or fixed-width text.
///
/// Reads can be done all at once, or in successive chunks, the reader being
/// an [`Iterator`] of chunks. The underlying source is released as soon as
/// the reader is exhausted, fails, is closed or dropped.
pub struct TextFileReader {
    engine: Option<EngineKind>,
    engine_name: Engine,
    currow: usize,
    nrows: Option<usize>,
    chunksize: Option<usize>,
    squeeze: bool,
    warnings: Vec<ParserWarning>,
}

impl TextFileReader {
    pub fn open(source: Source, options: ParseOptions) -> Result<Self> {
        let mut options = options;
        let mut warnings = Vec::new();

        validate(&options)?;

        if options.header == Header::Infer {
            options.header = if options.names.is_some() {
                Header::None
            } else {
                Header::Row(0)
            };
        }

        merge_dialect(&mut options, &mut warnings)?;

        let engine_name = resolve_engine(&options, &source, &mut warnings)?;

        let nrows = options.nrows;
        let chunksize = options.chunksize;
        let squeeze = options.squeeze;

        let mut engine = EngineKind::open(engine_name, source, options)?;
        warnings.extend(engine.take_warnings());

        Ok(Self {
            engine: Some(engine),
            engine_name,
            currow: 0,
            nrows,
            chunksize,
            squeeze,
            warnings,
        })
    }

    /// The engine in use, after any fallback.
    pub fn engine(&self) -> Engine {
        self.engine_name
    }

    /// Warnings raised so far.
    pub fn warnings(&self) -> &[ParserWarning] {
        &self.warnings
    }

    pub fn is_closed(&self) -> bool {
        self.engine.is_none()
    }

    /// Release the underlying source. Further reads fail as exhausted.
    pub fn close(&mut self) {
        if self.engine.take().is_some() {
            tracing::debug!(rows = self.currow, "closed reader");
        }
    }

    /// Read up to `nrows` rows, or everything left when `None` (bounded by
    /// the overall `nrows` option).
    pub fn read(&mut self, nrows: Option<usize>) -> Result<Table> {
        let rows = match (nrows, self.nrows) {
            (Some(n), _) => Some(n),
            (None, Some(cap)) => Some(cap.saturating_sub(self.currow)),
            (None, None) => None,
        };

        let engine = self
            .engine
            .as_mut()
            .ok_or_else(|| Error::new(ErrorKind::Exhausted))?;

        let outcome = engine.read(rows);
        self.warnings.extend(engine.take_warnings());

        let mut result = match outcome {
            Ok(Some(result)) => result,
            Ok(None) => {
                self.close();
                return Err(Error::new(ErrorKind::Exhausted));
            }
            Err(err) => return Err(err),
        };

        let new_rows = result.len();

        if let Index::Range { start, stop } = &mut result.index {
            *start += self.currow;
            *stop += self.currow;
        }

        self.currow += new_rows;

        if self.squeeze && result.columns.len() == 1 {
            let name = result.columns.remove(0);
            let values = result.data.remove(0);

            return Ok(Table::Series(Series {
                index: result.index,
                name,
                values,
            }));
        }

        Ok(Table::Frame(result))
    }

    /// Read the next chunk, of `size` rows or of the configured chunk size.
    pub fn get_chunk(&mut self, size: Option<usize>) -> Result<Table> {
        let mut size = size.or(self.chunksize);

        if let Some(cap) = self.nrows {
            if self.currow >= cap {
                return Err(Error::new(ErrorKind::Exhausted));
            }

            size = Some(size.map_or(cap - self.currow, |s| s.min(cap - self.currow)));
        }

        self.read(size)
    }
}

impl Iterator for TextFileReader {
    type Item = Result<Table>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_closed() {
            return None;
        }

        match self.get_chunk(None) {
            Ok(table) => Some(Ok(table)),
            Err(err) => {
                self.close();

                if err.is_exhausted() {
                    None
                } else {
                    Some(Err(err))
                }
            }
        }
    }
}

impl Drop for TextFileReader {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::dialect::Dialect;
    use crate::value::{Column, Label};

    fn frame(table: Table) -> ParseResult {
        table.into_frame().unwrap()
    }

    #[test]
    fn test_read_all() -> Result<()> {
        let mut reader = ReaderBuilder::new().from_str("a,b\n1,x\n2,y\n")?;

        assert_eq!(reader.engine(), Engine::Fast);

        let result = frame(reader.read(None)?);
        assert_eq!(result.columns, vec![Label::name("a"), Label::name("b")]);
        assert_eq!(result.get("a"), Some(&Column::Int64(vec![1, 2])));
        assert_eq!(result.index, Index::Range { start: 0, stop: 2 });

        assert!(reader.read(None).unwrap_err().is_exhausted());
        assert!(reader.is_closed());

        Ok(())
    }

    #[test]
    fn test_chunks_are_gapless() -> Result<()> {
        let reader = ReaderBuilder::new()
            .chunksize(2)
            .from_str("a\n1\n2\n3\n4\n5\n")?;

        let chunks: Vec<ParseResult> = reader.map(|t| t.map(frame)).collect::<Result<_>>()?;

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].index, Index::Range { start: 0, stop: 2 });
        assert_eq!(chunks[1].index, Index::Range { start: 2, stop: 4 });
        assert_eq!(chunks[2].index, Index::Range { start: 4, stop: 5 });
        assert_eq!(chunks[2].get("a"), Some(&Column::Int64(vec![5])));

        Ok(())
    }

    #[test]
    fn test_nrows_cap() -> Result<()> {
        let mut reader = ReaderBuilder::new()
            .nrows(3)
            .from_str("a\n1\n2\n3\n4\n5\n")?;

        assert_eq!(reader.get_chunk(Some(2))?.len(), 2);
        assert_eq!(reader.get_chunk(Some(2))?.len(), 1);
        assert!(reader.get_chunk(Some(2)).unwrap_err().is_exhausted());

        let mut reader = ReaderBuilder::new()
            .nrows(1)
            .from_str("a\n1\n2\n")?;
        assert_eq!(reader.read(None)?.len(), 1);

        Ok(())
    }

    #[test]
    fn test_squeeze() -> Result<()> {
        let mut reader = ReaderBuilder::new().squeeze(true).from_str("a\n1\n2\n")?;

        match reader.read(None)? {
            Table::Series(series) => {
                assert_eq!(series.name, Label::name("a"));
                assert_eq!(series.values, Column::Int64(vec![1, 2]));
            }
            table => panic!("expected a series, got {:?}", table),
        }

        Ok(())
    }

    #[test]
    fn test_validation() {
        let err = |builder: &ReaderBuilder| builder.from_str("a,b\n1,2\n").err().unwrap();

        let mut builder = ReaderBuilder::new();
        builder.skipfooter(1).chunksize(2);
        assert_eq!(
            err(&builder).to_string(),
            "'skipfooter' not supported for 'iteration'"
        );

        let mut builder = ReaderBuilder::new();
        builder.skipfooter(1).nrows(2);
        assert_eq!(
            err(&builder).to_string(),
            "'skipfooter' not supported with 'nrows'"
        );

        let mut builder = ReaderBuilder::new();
        builder.index_col(IndexCol::True);
        assert!(matches!(err(&builder).kind(), ErrorKind::InvalidOption(_)));

        let mut builder = ReaderBuilder::new();
        builder.names(["x", "x"]);
        assert_eq!(err(&builder).to_string(), "Duplicate names are not allowed.");

        let mut builder = ReaderBuilder::new();
        builder
            .header(Header::Rows(vec![0, 1]))
            .usecols(UseCols::Positions(vec![0]));
        assert!(matches!(err(&builder).kind(), ErrorKind::InvalidOption(_)));

        let mut builder = ReaderBuilder::new();
        builder.mangle_dupe_cols(false);
        assert!(matches!(err(&builder).kind(), ErrorKind::Unsupported(_)));

        let mut builder = ReaderBuilder::new();
        builder.sep(";").delim_whitespace(true);
        assert!(matches!(err(&builder).kind(), ErrorKind::InvalidOption(_)));

        let mut builder = ReaderBuilder::new();
        builder.chunksize(0);
        assert!(matches!(err(&builder).kind(), ErrorKind::InvalidOption(_)));
    }

    #[test]
    fn test_engine_fallback() -> Result<()> {
        let mut reader = ReaderBuilder::new().sep("::").from_str("a::b\n1::2\n")?;

        assert_eq!(reader.engine(), Engine::Python);
        assert!(matches!(
            reader.warnings(),
            [ParserWarning::EngineFallback { .. }]
        ));
        assert_eq!(frame(reader.read(None)?).get("b"), Some(&Column::Int64(vec![2])));

        let err = ReaderBuilder::new()
            .sep("::")
            .engine(Engine::Fast)
            .from_str("a::b\n")
            .err()
            .unwrap();
        assert!(matches!(err.kind(), ErrorKind::EngineFallback(_)));

        // Whitespace regex stays on the fast engine
        let reader = ReaderBuilder::new().sep(r"\s+").from_str("a b\n1 2\n")?;
        assert_eq!(reader.engine(), Engine::Fast);
        assert!(reader.warnings().is_empty());

        Ok(())
    }

    #[test]
    fn test_fast_only_options() {
        let err = ReaderBuilder::new()
            .engine(Engine::Python)
            .low_memory(false)
            .from_str("a\n1\n")
            .err()
            .unwrap();
        assert_eq!(
            err.to_string(),
            "The 'low_memory' option is not supported with the 'python' engine"
        );

        let err = ReaderBuilder::new()
            .skipfooter(1)
            .lineterminator('~')
            .from_str("a\n1\n")
            .err()
            .unwrap();
        assert!(err.to_string().starts_with(
            "Falling back to the 'python' engine because the 'c' engine does not support skipfooter"
        ));
    }

    #[test]
    fn test_dialect_and_rows() -> Result<()> {
        let mut reader = ReaderBuilder::new()
            .dialect(Dialect::excel_tab().into())
            .from_str("a\tb\n1\t2\n")?;
        assert_eq!(frame(reader.read(None)?).get("b"), Some(&Column::Int64(vec![2])));

        let rows = vec![
            vec!["x".to_string(), "y".to_string()],
            vec!["1".to_string(), "true".to_string()],
        ];
        let mut reader = ReaderBuilder::new().engine(Engine::Python).from_rows(rows)?;
        assert_eq!(
            frame(reader.read(None)?).get("y"),
            Some(&Column::Bool(vec![true]))
        );

        Ok(())
    }

    #[test]
    fn test_converters_through_builder() -> Result<()> {
        let mut reader = ReaderBuilder::new()
            .converter("a", |s: &str| Value::Int(s.len() as i64))
            .from_str("a\nxyz\nq\n")?;

        assert_eq!(
            frame(reader.read(None)?).get("a"),
            Some(&Column::Int64(vec![3, 1]))
        );

        let predicate: Arc<dyn Fn(usize) -> bool + Send + Sync> = Arc::new(|i| i == 1);
        let mut reader = ReaderBuilder::new()
            .skiprows(SkipRows::Predicate(predicate))
            .from_str("a\nskipped\n2\n")?;
        assert_eq!(
            frame(reader.read(None)?).get("a"),
            Some(&Column::Int64(vec![2]))
        );

        Ok(())
    }

    #[test]
    fn test_fixed_width() -> Result<()> {
        let mut reader = ReaderBuilder::fixed_width().from_str("id name\n1  ab\n2  cd\n")?;

        assert_eq!(reader.engine(), Engine::PythonFwf);

        let result = frame(reader.read(None)?);
        assert_eq!(result.get("id"), Some(&Column::Int64(vec![1, 2])));
        assert_eq!(
            result.get("name"),
            Some(&Column::Object(vec!["ab".into(), "cd".into()]))
        );

        Ok(())
    }
}
