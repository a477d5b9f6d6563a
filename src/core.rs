use memchr::{memchr, memchr2};

use crate::error::{Error, Result};
use crate::options::{ParseOptions, Quoting, Separator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delimiter {
    Byte(u8),
    /// Any run of spaces and tabs.
    Whitespace,
}

/// Byte-level dialect of the native tokenizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CoreConfig {
    pub delimiter: Delimiter,
    pub quote: Option<u8>,
    pub escape: Option<u8>,
    pub doublequote: bool,
    pub comment: Option<u8>,
    /// `None` means any of `\n`, `\r` or `\r\n`.
    pub terminator: Option<u8>,
    pub skipinitialspace: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            delimiter: Delimiter::Byte(b','),
            quote: Some(b'"'),
            escape: None,
            doublequote: true,
            comment: None,
            terminator: None,
            skipinitialspace: false,
        }
    }
}

fn ascii_byte(c: char, what: &str) -> Result<u8> {
    if c.is_ascii() {
        Ok(c as u8)
    } else {
        Err(Error::invalid(format!(
            "the 'c' engine only supports ASCII {} characters",
            what
        )))
    }
}

impl CoreConfig {
    pub(crate) fn from_options(options: &ParseOptions) -> Result<Self> {
        let whitespace = options.delim_whitespace
            || matches!(&options.sep, Separator::Value(sep) if sep == r"\s+")
            || options.delimiter.as_deref() == Some(r"\s+");

        let delimiter = if whitespace {
            Delimiter::Whitespace
        } else {
            let resolved = options.resolved_delimiter().unwrap_or_else(|| ",".to_string());
            let mut chars = resolved.chars();

            match (chars.next(), chars.next()) {
                (Some(c), None) => Delimiter::Byte(ascii_byte(c, "delimiter")?),
                _ => {
                    return Err(Error::invalid(
                        "the 'c' engine only supports single character delimiters",
                    ))
                }
            }
        };

        let quote = match (options.quoting, options.quotechar) {
            (Quoting::None, _) | (_, None) => None,
            (_, Some(c)) => Some(ascii_byte(c, "quote")?),
        };

        Ok(Self {
            delimiter,
            quote,
            escape: options
                .escapechar
                .map(|c| ascii_byte(c, "escape"))
                .transpose()?,
            doublequote: options.doublequote,
            comment: options
                .comment
                .map(|c| ascii_byte(c, "comment"))
                .transpose()?,
            terminator: options
                .lineterminator
                .map(|c| ascii_byte(c, "line terminator"))
                .transpose()?,
            skipinitialspace: options.skipinitialspace,
        })
    }
}

/// Fields of one record, stored contiguously.
#[derive(Debug, Default, Clone)]
pub(crate) struct RecordBuilder {
    data: Vec<u8>,
    bounds: Vec<(usize, usize)>,
    start: usize,
}

impl RecordBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn clear(&mut self) {
        self.data.clear();
        self.bounds.clear();
        self.start = 0;
    }

    #[inline(always)]
    fn push_byte(&mut self, byte: u8) {
        self.data.push(byte);
    }

    #[inline(always)]
    fn extend_from_slice(&mut self, slice: &[u8]) {
        self.data.extend_from_slice(slice);
    }

    #[inline]
    fn finalize_field(&mut self) {
        let start = self.start;
        self.start = self.data.len();
        self.bounds.push((start, self.start));
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.bounds.iter().map(|(s, e)| &self.data[*s..*e])
    }

    pub(crate) fn to_strings(&self) -> Vec<String> {
        self.iter()
            .map(|field| String::from_utf8_lossy(field).into_owned())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReadResult {
    InputEmpty,
    Record,
    End,
    /// Input ended inside a quoted field.
    Unterminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    StartRecord,
    StartField,
    Unquoted,
    Escaped,
    Quoted,
    QuotedEscaped,
    Quote,
    Comment,
    LineComment,
    Whitespace,
}

/// Resumable tokenizer state machine, fed with successive slices of input.
#[derive(Debug)]
pub(crate) struct CoreReader {
    config: CoreConfig,
    state: ReadState,
    // NOTE: a record ended on `\r`, so a leading `\n` must be eaten.
    pending_cr: bool,
    special: [bool; 256],
}

impl CoreReader {
    pub(crate) fn new(config: CoreConfig) -> Self {
        let mut special = [false; 256];

        match config.delimiter {
            Delimiter::Byte(b) => special[b as usize] = true,
            Delimiter::Whitespace => {
                special[b' ' as usize] = true;
                special[b'\t' as usize] = true;
            }
        }

        match config.terminator {
            Some(t) => special[t as usize] = true,
            None => {
                special[b'\n' as usize] = true;
                special[b'\r' as usize] = true;
            }
        }

        for b in [config.escape, config.comment].into_iter().flatten() {
            special[b as usize] = true;
        }

        Self {
            config,
            state: ReadState::StartRecord,
            pending_cr: false,
            special,
        }
    }

    #[inline(always)]
    fn is_terminator(&self, byte: u8) -> bool {
        match self.config.terminator {
            Some(t) => byte == t,
            None => byte == b'\n' || byte == b'\r',
        }
    }

    #[inline(always)]
    fn is_delimiter(&self, byte: u8) -> bool {
        match self.config.delimiter {
            Delimiter::Byte(b) => byte == b,
            Delimiter::Whitespace => byte == b' ' || byte == b'\t',
        }
    }

    #[inline(always)]
    fn is(&self, expected: Option<u8>, byte: u8) -> bool {
        expected == Some(byte)
    }

    #[inline]
    fn end_record(&mut self, byte: u8) -> ReadResult {
        self.state = ReadState::StartRecord;
        self.pending_cr = byte == b'\r' && self.config.terminator.is_none();
        ReadResult::Record
    }

    #[inline]
    fn after_delimiter(&mut self) {
        self.state = match self.config.delimiter {
            Delimiter::Whitespace => ReadState::Whitespace,
            Delimiter::Byte(_) => ReadState::StartField,
        };
    }

    fn finish(&mut self, record: &mut RecordBuilder) -> ReadResult {
        use ReadState::*;

        let result = match self.state {
            StartRecord => return ReadResult::End,
            Quoted | QuotedEscaped => return ReadResult::Unterminated,
            StartField | Unquoted | Escaped | Quote => {
                record.finalize_field();
                ReadResult::Record
            }
            Comment | LineComment | Whitespace => ReadResult::Record,
        };

        self.state = StartRecord;
        result
    }

    /// Feed the next slice of input, returning what happened and how many
    /// bytes were consumed. An empty slice signals the end of the input.
    pub(crate) fn read_record(
        &mut self,
        input: &[u8],
        record: &mut RecordBuilder,
    ) -> (ReadResult, usize) {
        use ReadState::*;

        if input.is_empty() {
            return (self.finish(record), 0);
        }

        let mut pos: usize = 0;

        if self.pending_cr {
            self.pending_cr = false;

            if input[0] == b'\n' {
                pos += 1;
            }
        }

        while pos < input.len() {
            let byte = input[pos];

            match self.state {
                StartRecord => {
                    if self.is_terminator(byte) {
                        return (self.end_record(byte), pos + 1);
                    }

                    if self.is(self.config.comment, byte) {
                        pos += 1;
                        self.state = LineComment;
                    } else if self.config.delimiter == Delimiter::Whitespace
                        && self.is_delimiter(byte)
                    {
                        pos += 1;
                    } else {
                        self.state = StartField;
                    }
                }
                StartField => {
                    if self.is_terminator(byte) {
                        record.finalize_field();
                        return (self.end_record(byte), pos + 1);
                    }

                    pos += 1;

                    if self.is(self.config.quote, byte) {
                        self.state = Quoted;
                    } else if self.is(self.config.escape, byte) {
                        self.state = Escaped;
                    } else if self.config.skipinitialspace && byte == b' ' {
                        continue;
                    } else if self.is_delimiter(byte) {
                        record.finalize_field();
                        self.after_delimiter();
                    } else if self.is(self.config.comment, byte) {
                        record.finalize_field();
                        self.state = Comment;
                    } else {
                        record.push_byte(byte);
                        self.state = Unquoted;
                    }
                }
                Unquoted => {
                    // Jump to the next byte having a meaning outside quotes
                    let rest = &input[pos..];
                    let offset = rest
                        .iter()
                        .position(|b| self.special[*b as usize])
                        .unwrap_or(rest.len());

                    record.extend_from_slice(&rest[..offset]);
                    pos += offset;

                    if pos == input.len() {
                        break;
                    }

                    let byte = input[pos];
                    pos += 1;

                    if self.is_terminator(byte) {
                        record.finalize_field();
                        return (self.end_record(byte), pos);
                    } else if self.is_delimiter(byte) {
                        record.finalize_field();
                        self.after_delimiter();
                    } else if self.is(self.config.escape, byte) {
                        self.state = Escaped;
                    } else {
                        // Here, `byte` is guaranteed to be a comment
                        record.finalize_field();
                        self.state = Comment;
                    }
                }
                Escaped => {
                    record.push_byte(byte);
                    pos += 1;
                    self.state = Unquoted;
                }
                Quoted => {
                    let rest = &input[pos..];
                    // Quoted state is only reachable with a quote char
                    let quote = self.config.quote.unwrap_or(b'"');

                    let found = match self.config.escape {
                        Some(escape) => memchr2(quote, escape, rest),
                        None => memchr(quote, rest),
                    };

                    match found {
                        None => {
                            record.extend_from_slice(rest);
                            pos = input.len();
                        }
                        Some(offset) => {
                            record.extend_from_slice(&rest[..offset]);
                            pos += offset + 1;

                            self.state = if rest[offset] == quote {
                                Quote
                            } else {
                                QuotedEscaped
                            };
                        }
                    }
                }
                QuotedEscaped => {
                    record.push_byte(byte);
                    pos += 1;
                    self.state = Quoted;
                }
                Quote => {
                    pos += 1;

                    if self.is(self.config.quote, byte) && self.config.doublequote {
                        record.push_byte(byte);
                        self.state = Quoted;
                    } else if self.is_delimiter(byte) {
                        record.finalize_field();
                        self.after_delimiter();
                    } else if self.is_terminator(byte) {
                        record.finalize_field();
                        return (self.end_record(byte), pos);
                    } else if self.is(self.config.comment, byte) {
                        record.finalize_field();
                        self.state = Comment;
                    } else {
                        record.push_byte(byte);
                        self.state = Unquoted;
                    }
                }
                Comment | LineComment => {
                    let rest = &input[pos..];
                    let found = match self.config.terminator {
                        Some(t) => memchr(t, rest),
                        None => memchr2(b'\n', b'\r', rest),
                    };

                    match found {
                        None => pos = input.len(),
                        Some(offset) => {
                            let byte = rest[offset];
                            return (self.end_record(byte), pos + offset + 1);
                        }
                    }
                }
                Whitespace => {
                    if self.is_delimiter(byte) {
                        pos += 1;
                    } else if self.is_terminator(byte) {
                        return (self.end_record(byte), pos + 1);
                    } else if self.is(self.config.comment, byte) {
                        pos += 1;
                        self.state = Comment;
                    } else {
                        self.state = StartField;
                    }
                }
            }
        }

        (ReadResult::InputEmpty, input.len())
    }
}
