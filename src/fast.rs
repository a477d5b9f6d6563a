use std::io::BufRead;

use crate::base::{ParserBase, RecordSource, Row};
use crate::core::{CoreConfig, CoreReader, ReadResult, RecordBuilder};
use crate::error::{Error, Result};
use crate::options::ParseOptions;
use crate::utils::strip_bom;

/// Records of a byte stream, as cut by the native tokenizer.
pub(crate) struct FastSource<R> {
    buffer: R,
    inner: CoreReader,
    record: RecordBuilder,
    line: u64,
    bom_checked: bool,
}

impl<R: BufRead> FastSource<R> {
    pub(crate) fn new(reader: R, config: CoreConfig) -> Self {
        Self {
            buffer: reader,
            inner: CoreReader::new(config),
            record: RecordBuilder::new(),
            line: 0,
            bom_checked: false,
        }
    }
}

impl<R: BufRead> RecordSource for FastSource<R> {
    fn next_record(&mut self) -> Result<Option<Row>> {
        use ReadResult::*;

        if !self.bom_checked {
            strip_bom(&mut self.buffer)?;
            self.bom_checked = true;
        }

        self.record.clear();

        loop {
            let input = self.buffer.fill_buf()?;

            let (result, pos) = self.inner.read_record(input, &mut self.record);

            self.buffer.consume(pos);

            match result {
                End => return Ok(None),
                InputEmpty => continue,
                Record => {
                    self.line += 1;
                    return Ok(Some(Row::new(self.line, self.record.to_strings())));
                }
                Unterminated => {
                    return Err(Error::parser(format!(
                        "Error tokenizing data. C error: EOF inside string starting at row {}",
                        self.line
                    )))
                }
            }
        }
    }
}

pub(crate) type FastEngine = ParserBase<FastSource<Box<dyn BufRead>>>;

/// Build the native engine and read its header.
pub(crate) fn open_fast(reader: Box<dyn BufRead>, options: ParseOptions) -> Result<FastEngine> {
    let config = CoreConfig::from_options(&options)?;

    tracing::debug!(?config, "opening native tokenizer");

    // NOTE: comments are cut by the tokenizer itself.
    let mut engine = ParserBase::new(FastSource::new(reader, config), options, false);
    engine.initialize()?;

    Ok(engine)
}
