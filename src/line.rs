use std::io::{self, BufRead};
use std::mem;

use regex::Regex;

use crate::base::{ParserBase, RecordSource, Row, SplitRows};
use crate::dialect::{self, Dialect};
use crate::error::{Error, Result};
use crate::fwf::FixedWidthReader;
use crate::options::{ParseOptions, Quoting, Separator, SkipRows};
use crate::utils::{read_line, trim_bom, trim_trailing_crlf};
use crate::value::ParseResult;
use crate::warning::ParserWarning;

const FOOTER_HINT: &str = ". Error could possibly be due to parsing errors in the skipped footer rows (the `skipfooter` keyword is only applied after the tokenizer has parsed all rows)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenState {
    StartRecord,
    StartField,
    Escaped,
    Unquoted,
    Quoted,
    QuotedEscaped,
    Quote,
    EatCrnl,
}

/// A strict line-fed tokenizer: quoted fields may span several lines, and
/// anything but a delimiter or a line end after a closing quote is an error.
#[derive(Debug)]
pub(crate) struct LineTokenizer {
    dialect: Dialect,
    state: TokenState,
    field: String,
    fields: Vec<String>,
    numeric_field: bool,
}

impl LineTokenizer {
    pub(crate) fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            state: TokenState::StartRecord,
            field: String::new(),
            fields: Vec::new(),
            numeric_field: false,
        }
    }

    fn reset(&mut self) {
        self.state = TokenState::StartRecord;
        self.field.clear();
        self.fields.clear();
        self.numeric_field = false;
    }

    #[inline]
    fn is_quote(&self, c: char) -> bool {
        self.dialect.quoting != Quoting::None && self.dialect.quotechar == Some(c)
    }

    fn save_field(&mut self) -> std::result::Result<(), String> {
        let field = mem::take(&mut self.field);

        if self.numeric_field {
            self.numeric_field = false;

            let x = field
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("could not convert string to float: '{}'", field))?;

            self.fields.push(format!("{:?}", x));
        } else {
            self.fields.push(field);
        }

        Ok(())
    }

    /// Process one char, `None` standing for the end of a line.
    fn process(&mut self, c: Option<char>) -> std::result::Result<(), String> {
        use TokenState::*;

        let is_eol = matches!(c, None | Some('\n') | Some('\r'));

        match self.state {
            StartRecord => {
                match c {
                    None => return Ok(()),
                    Some('\n') | Some('\r') => {
                        self.state = EatCrnl;
                        return Ok(());
                    }
                    _ => {}
                }

                self.state = StartField;
                self.process(c)?;
            }
            StartField => match c {
                _ if is_eol => {
                    self.save_field()?;
                    self.state = if c.is_none() { StartRecord } else { EatCrnl };
                }
                Some(c) if self.is_quote(c) => self.state = Quoted,
                Some(c) if Some(c) == self.dialect.escapechar => self.state = Escaped,
                Some(' ') if self.dialect.skipinitialspace => {}
                Some(c) if c == self.dialect.delimiter => self.save_field()?,
                Some(c) => {
                    if self.dialect.quoting == Quoting::NonNumeric {
                        self.numeric_field = true;
                    }

                    self.field.push(c);
                    self.state = Unquoted;
                }
                None => {}
            },
            Escaped => {
                self.field.push(c.unwrap_or('\n'));
                self.state = Unquoted;
            }
            Unquoted => match c {
                _ if is_eol => {
                    self.save_field()?;
                    self.state = if c.is_none() { StartRecord } else { EatCrnl };
                }
                Some(c) if Some(c) == self.dialect.escapechar => self.state = Escaped,
                Some(c) if c == self.dialect.delimiter => {
                    self.save_field()?;
                    self.state = StartField;
                }
                Some(c) => self.field.push(c),
                None => {}
            },
            Quoted => match c {
                None => {}
                Some(c) if Some(c) == self.dialect.escapechar => self.state = QuotedEscaped,
                Some(c) if self.is_quote(c) => {
                    self.state = if self.dialect.doublequote {
                        Quote
                    } else {
                        Unquoted
                    };
                }
                Some(c) => self.field.push(c),
            },
            QuotedEscaped => {
                self.field.push(c.unwrap_or('\n'));
                self.state = Quoted;
            }
            Quote => match c {
                Some(c) if self.is_quote(c) => {
                    self.field.push(c);
                    self.state = Quoted;
                }
                Some(c) if c == self.dialect.delimiter => {
                    self.save_field()?;
                    self.state = StartField;
                }
                _ if is_eol => {
                    self.save_field()?;
                    self.state = if c.is_none() { StartRecord } else { EatCrnl };
                }
                _ => {
                    return Err(format!(
                        "'{}' expected after '{}'",
                        self.dialect.delimiter,
                        self.dialect.quotechar.unwrap_or('"')
                    ))
                }
            },
            EatCrnl => match c {
                Some('\n') | Some('\r') => {}
                None => self.state = StartRecord,
                Some(_) => {
                    return Err("new-line character seen in unquoted field - do you need to open the file in universal-newline mode?".to_string())
                }
            },
        }

        Ok(())
    }

    /// Feed a physical line, terminator included. Returns the record once
    /// complete.
    pub(crate) fn feed_line(
        &mut self,
        line: &str,
    ) -> std::result::Result<Option<Vec<String>>, String> {
        let mut outcome = line.chars().try_for_each(|c| self.process(Some(c)));

        if outcome.is_ok() {
            outcome = self.process(None);
        }

        if let Err(msg) = outcome {
            self.reset();
            return Err(msg);
        }

        if self.state == TokenState::StartRecord {
            return Ok(Some(mem::take(&mut self.fields)));
        }

        Ok(None)
    }

    /// Flush the state at the end of the input.
    pub(crate) fn finish(&mut self) -> std::result::Result<Option<Vec<String>>, String> {
        if !self.field.is_empty() || self.state == TokenState::Quoted {
            self.reset();
            return Err("unexpected end of data".to_string());
        }

        if self.fields.is_empty() {
            return Ok(None);
        }

        let fields = mem::take(&mut self.fields);
        self.reset();

        Ok(Some(fields))
    }
}

/// Physical lines of a stream, terminators kept.
pub(crate) struct LineInput {
    reader: Box<dyn BufRead>,
    scratch: Vec<u8>,
    line: String,
    started: bool,
}

impl LineInput {
    pub(crate) fn new(reader: Box<dyn BufRead>) -> Self {
        Self {
            reader,
            scratch: Vec::new(),
            line: String::new(),
            started: false,
        }
    }

    fn next_line(&mut self) -> io::Result<Option<&str>> {
        if !read_line(&mut self.reader, &mut self.scratch, &mut self.line)? {
            return Ok(None);
        }

        if !self.started {
            self.started = true;
            return Ok(Some(trim_bom(&self.line)));
        }

        Ok(Some(&self.line))
    }
}

pub(crate) enum Splitter {
    Tokenizer(LineTokenizer),
    /// Each stripped line is split on a pattern. Quotes mean nothing.
    Pattern(Regex),
}

/// How the line engine reacts to a row the tokenizer rejects.
#[derive(Debug, Clone, Copy)]
struct MalformedPolicy {
    error: bool,
    warn: bool,
    footer: bool,
}

pub(crate) enum LineSource {
    Text {
        input: LineInput,
        splitter: Splitter,
        line: u64,
        policy: MalformedPolicy,
        warnings: Vec<ParserWarning>,
    },
    Rows(SplitRows),
    FixedWidth(FixedWidthReader<Box<dyn BufRead>>, u64),
}

impl LineSource {
    /// A source over a text stream, splitting lines the way the options say.
    pub(crate) fn text(reader: Box<dyn BufRead>, options: &ParseOptions) -> Result<Self> {
        let separator = match options.resolved_delimiter() {
            _ if options.delim_whitespace => Some(r"\s+".to_string()),
            sep => sep,
        };

        let splitter = match separator {
            Some(sep) if sep.chars().count() > 1 => Splitter::Pattern(Regex::new(&sep)?),
            sep => Splitter::Tokenizer(LineTokenizer::new(Dialect {
                delimiter: sep.and_then(|s| s.chars().next()).unwrap_or(','),
                quotechar: options.quotechar,
                escapechar: options.escapechar,
                doublequote: options.doublequote,
                skipinitialspace: options.skipinitialspace,
                quoting: options.quoting,
            })),
        };

        Ok(Self::Text {
            input: LineInput::new(reader),
            splitter,
            line: 0,
            policy: MalformedPolicy {
                error: options.error_bad_lines,
                warn: options.warn_bad_lines,
                footer: options.skipfooter > 0,
            },
            warnings: Vec::new(),
        })
    }

    /// Find the first line neither skipped nor commented out, guess its
    /// delimiter and return it tokenized.
    fn sniff(&mut self, skiprows: &SkipRows, comment: Option<char>) -> Result<Option<Row>> {
        let (input, splitter, line) = match self {
            Self::Text {
                input,
                splitter: Splitter::Tokenizer(tokenizer),
                line,
                ..
            } => (input, tokenizer, line),
            _ => return Ok(None),
        };

        loop {
            let raw = match input.next_line()? {
                Some(raw) => raw,
                None => return Ok(None),
            };

            let position = *line as usize;
            *line += 1;

            let text = match comment.and_then(|c| raw.find(c)) {
                Some(i) => &raw[..i],
                None => trim_trailing_crlf(raw),
            };

            if skiprows.skips(position) || text.trim().is_empty() {
                continue;
            }

            let sniffed = dialect::sniff(text)?;
            splitter.dialect.delimiter = sniffed.delimiter;

            let fields = splitter
                .feed_line(text)
                .map_err(Error::parser)?
                .unwrap_or_default();

            return Ok(Some(Row::new(*line, fields)));
        }
    }

    fn take_warnings(&mut self) -> Vec<ParserWarning> {
        match self {
            Self::Text { warnings, .. } => mem::take(warnings),
            _ => Vec::new(),
        }
    }
}

impl RecordSource for LineSource {
    fn next_record(&mut self) -> Result<Option<Row>> {
        match self {
            Self::Rows(rows) => rows.next_record(),
            Self::FixedWidth(reader, line) => Ok(reader.read_fields()?.map(|fields| {
                *line += 1;
                Row::new(*line, fields)
            })),
            Self::Text {
                input,
                splitter,
                line,
                policy,
                warnings,
            } => loop {
                let outcome = match splitter {
                    Splitter::Pattern(pattern) => match input.next_line()? {
                        None => return Ok(None),
                        Some(raw) => Ok(Some(
                            pattern.split(raw.trim()).map(String::from).collect(),
                        )),
                    },
                    Splitter::Tokenizer(tokenizer) => loop {
                        match input.next_line()? {
                            None => break tokenizer.finish(),
                            Some(raw) => match tokenizer.feed_line(raw) {
                                Ok(None) => continue,
                                outcome => break outcome,
                            },
                        }
                    },
                };

                *line += 1;

                match outcome {
                    Ok(Some(fields)) => return Ok(Some(Row::new(*line, fields))),
                    Ok(None) => return Ok(None),
                    Err(mut msg) => {
                        if policy.footer {
                            msg.push_str(FOOTER_HINT);
                        }

                        if policy.error {
                            return Err(Error::parser(msg));
                        }

                        if policy.warn {
                            ParserWarning::MalformedLineSkipped {
                                line: *line,
                                reason: msg,
                            }
                            .emit(warnings);
                        }
                    }
                }
            },
        }
    }

    fn is_blank(&self, fields: &[String]) -> bool {
        match self {
            Self::FixedWidth(..) => fields.iter().all(|f| f.trim().is_empty()),
            _ => match fields {
                [] => true,
                [field] => field.trim().is_empty(),
                _ => false,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    SniffingDialect,
    HeaderInference,
    BodyReading,
    Exhausted,
}

/// The line-based engine, also driving fixed-width sources.
pub(crate) struct LineEngine {
    base: ParserBase<LineSource>,
    phase: Phase,
}

impl LineEngine {
    pub(crate) fn from_reader(reader: Box<dyn BufRead>, options: ParseOptions) -> Result<Self> {
        let source = LineSource::text(reader, &options)?;
        Self::start(source, options)
    }

    pub(crate) fn from_rows(rows: Vec<Vec<String>>, options: ParseOptions) -> Result<Self> {
        Self::start(LineSource::Rows(SplitRows::new(rows)), options)
    }

    pub(crate) fn start(source: LineSource, options: ParseOptions) -> Result<Self> {
        let mut engine = Self::new(source, options);

        engine.sniff_dialect()?;
        engine.infer_header()?;

        Ok(engine)
    }

    /// An engine yet to read anything, sniffing first when the separator is
    /// to be guessed.
    fn new(source: LineSource, options: ParseOptions) -> Self {
        let must_sniff = options.sep == Separator::Sniff
            && options.delimiter.is_none()
            && !options.delim_whitespace;

        let phase = if must_sniff {
            Phase::SniffingDialect
        } else {
            Phase::HeaderInference
        };

        tracing::debug!(?phase, "line engine");

        Self {
            base: ParserBase::new(source, options, true),
            phase,
        }
    }

    fn sniff_dialect(&mut self) -> Result<()> {
        if self.phase != Phase::SniffingDialect {
            return Ok(());
        }

        let skiprows = self.base.options.skiprows.clone();
        let comment = self.base.options.comment;

        if let Some(row) = self.base.source_mut().sniff(&skiprows, comment)? {
            self.base.push_row(row);
        }

        self.transition(Phase::HeaderInference);

        Ok(())
    }

    fn infer_header(&mut self) -> Result<()> {
        self.base.initialize()?;
        self.collect_warnings();
        self.transition(Phase::BodyReading);

        Ok(())
    }

    fn transition(&mut self, phase: Phase) {
        tracing::debug!(from = ?self.phase, to = ?phase, "line engine");
        self.phase = phase;
    }

    fn collect_warnings(&mut self) {
        let warnings = self.base.source_mut().take_warnings();
        self.base.warnings.extend(warnings);
    }

    pub(crate) fn read(&mut self, rows: Option<usize>) -> Result<Option<ParseResult>> {
        if self.phase == Phase::Exhausted {
            return Ok(None);
        }

        let result = self.base.read(rows);
        self.collect_warnings();

        match result {
            Ok(None) => {
                self.transition(Phase::Exhausted);
                Ok(None)
            }
            Err(err) => {
                self.transition(Phase::Exhausted);
                Err(err)
            }
            ok => ok,
        }
    }

    pub(crate) fn take_warnings(&mut self) -> Vec<ParserWarning> {
        self.collect_warnings();
        mem::take(&mut self.base.warnings)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::error::ErrorKind;
    use crate::options::Header;
    use crate::value::{Column, Label};

    fn tokenize(dialect: Dialect, data: &str) -> std::result::Result<Vec<Vec<String>>, String> {
        let mut tokenizer = LineTokenizer::new(dialect);
        let mut records = Vec::new();

        for line in data.split_inclusive('\n') {
            if let Some(record) = tokenizer.feed_line(line)? {
                records.push(record);
            }
        }

        if let Some(record) = tokenizer.finish()? {
            records.push(record);
        }

        Ok(records)
    }

    fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    fn engine(data: &'static str, options: ParseOptions) -> Result<LineEngine> {
        let mut options = options;

        if options.header == Header::Infer {
            options.header = Header::Row(0);
        }

        LineEngine::from_reader(Box::new(Cursor::new(data)), options)
    }

    #[test]
    fn test_tokenizer() {
        assert_eq!(
            tokenize(Dialect::excel(), "a,\"b\nc\",d\r\n\ne,\"f\"\"g\"\n"),
            Ok(rows(&[&["a", "b\nc", "d"], &[], &["e", "f\"g"]]))
        );

        assert_eq!(
            tokenize(Dialect::excel(), "a,\"b\"c\n"),
            Err("',' expected after '\"'".to_string())
        );

        assert_eq!(
            tokenize(Dialect::excel(), "a,\"b\n"),
            Err("unexpected end of data".to_string())
        );

        let dialect = Dialect {
            escapechar: Some('\\'),
            skipinitialspace: true,
            ..Dialect::excel()
        };
        assert_eq!(
            tokenize(dialect, "a\\,b,  c\n"),
            Ok(rows(&[&["a,b", "c"]]))
        );
    }

    #[test]
    fn test_tokenizer_quoting() {
        let dialect = Dialect {
            quoting: Quoting::None,
            ..Dialect::excel()
        };
        assert_eq!(
            tokenize(dialect, "\"a\",b\n"),
            Ok(rows(&[&["\"a\"", "b"]]))
        );

        let dialect = Dialect {
            quoting: Quoting::NonNumeric,
            ..Dialect::excel()
        };
        assert_eq!(
            tokenize(dialect.clone(), "\"a\",1,2.5\n"),
            Ok(rows(&[&["a", "1.0", "2.5"]]))
        );
        assert_eq!(
            tokenize(dialect, "\"a\",b\n"),
            Err("could not convert string to float: 'b'".to_string())
        );
    }

    #[test]
    fn test_sniffing() -> Result<()> {
        let mut engine = engine(
            "# comment\nskipped\na;b\n1;2\n",
            ParseOptions {
                sep: Separator::Sniff,
                comment: Some('#'),
                skiprows: SkipRows::Set([1].into_iter().collect()),
                ..Default::default()
            },
        )?;

        assert_eq!(engine.phase, Phase::BodyReading);

        let result = engine.read(None)?.unwrap();
        assert_eq!(result.columns, vec![Label::name("a"), Label::name("b")]);
        assert_eq!(result.get("b"), Some(&Column::Int64(vec![2])));

        assert!(engine.read(None)?.is_none());
        assert_eq!(engine.phase, Phase::Exhausted);

        Ok(())
    }

    #[test]
    fn test_phases() -> Result<()> {
        let source = |data: &'static str, options: &ParseOptions| {
            LineSource::text(Box::new(Cursor::new(data)), options)
        };

        let options = ParseOptions {
            sep: Separator::Sniff,
            header: Header::Row(0),
            ..Default::default()
        };

        let mut engine = LineEngine::new(source("a;b\n1;2\n", &options)?, options);
        assert_eq!(engine.phase, Phase::SniffingDialect);

        engine.sniff_dialect()?;
        assert_eq!(engine.phase, Phase::HeaderInference);

        engine.infer_header()?;
        assert_eq!(engine.phase, Phase::BodyReading);
        assert_eq!(engine.base.column_names(), vec![Label::name("a"), Label::name("b")]);

        let options = ParseOptions {
            header: Header::Row(0),
            ..Default::default()
        };

        let mut engine = LineEngine::new(source("a,b\n", &options)?, options);
        assert_eq!(engine.phase, Phase::HeaderInference);

        // Nothing to sniff
        engine.sniff_dialect()?;
        assert_eq!(engine.phase, Phase::HeaderInference);

        Ok(())
    }

    #[test]
    fn test_regex_separator() -> Result<()> {
        let mut engine = engine(
            "a::b\n1::x\n",
            ParseOptions {
                sep: Separator::Value("::".to_string()),
                ..Default::default()
            },
        )?;

        let result = engine.read(None)?.unwrap();
        assert_eq!(result.get("a"), Some(&Column::Int64(vec![1])));
        assert_eq!(result.get("b"), Some(&Column::Object(vec!["x".into()])));

        Ok(())
    }

    #[test]
    fn test_malformed_lines() -> Result<()> {
        let data = "a,b\n1,\"2\"x\n3,4\n";

        let err = engine(data, ParseOptions::default())
            .and_then(|mut e| e.read(None))
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Parser(_)));

        let mut engine = engine(
            data,
            ParseOptions {
                error_bad_lines: false,
                ..Default::default()
            },
        )?;

        let result = engine.read(None)?.unwrap();
        assert_eq!(result.get("a"), Some(&Column::Int64(vec![3])));

        let warnings = engine.take_warnings();
        assert!(matches!(
            warnings.as_slice(),
            [ParserWarning::MalformedLineSkipped { line: 2, .. }]
        ));

        Ok(())
    }

    #[test]
    fn test_skipfooter() -> Result<()> {
        let mut engine = engine(
            "a,b\n1,2\n3,4\ntotal,2\n",
            ParseOptions {
                skipfooter: 1,
                ..Default::default()
            },
        )?;

        let result = engine.read(None)?.unwrap();
        assert_eq!(result.get("a"), Some(&Column::Int64(vec![1, 3])));

        Ok(())
    }

    #[test]
    fn test_from_rows() -> Result<()> {
        let options = ParseOptions {
            header: Header::None,
            names: Some(vec!["x".to_string(), "y".to_string()]),
            ..Default::default()
        };

        let mut engine = LineEngine::from_rows(rows(&[&["1", "a"], &["2", "b"]]), options)?;
        let result = engine.read(None)?.unwrap();

        assert_eq!(result.get("x"), Some(&Column::Int64(vec![1, 2])));

        Ok(())
    }
}
