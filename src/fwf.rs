use std::collections::VecDeque;
use std::io::BufRead;

use crate::error::{Error, ErrorKind, Result};
use crate::line::{LineEngine, LineSource};
use crate::options::{ColSpecs, ParseOptions, Separator, SkipRows};
use crate::utils::{read_line, trim_bom};

/// Characters stripped around fixed-width fields when no delimiter is given.
const DEFAULT_FILLER: &str = "\n\r\t ";

/// Infer half-open column intervals from sample lines: a column is a
/// maximal run of positions where at least one line holds a character
/// outside `filler`. Anything after `comment` is ignored.
pub fn detect_colspecs<S: AsRef<str>>(
    rows: &[S],
    filler: &str,
    comment: Option<char>,
) -> Result<Vec<(usize, usize)>> {
    if rows.is_empty() {
        return Err(Error::new(ErrorKind::EmptyData(
            "No rows from which to infer column width".to_string(),
        )));
    }

    let max_len = rows
        .iter()
        .map(|row| row.as_ref().chars().count())
        .max()
        .unwrap_or(0);

    let mut mask = vec![false; max_len + 1];

    for row in rows {
        let mut row = row.as_ref();

        if let Some(c) = comment {
            if let Some(i) = row.find(c) {
                row = &row[..i];
            }
        }

        for (i, c) in row.chars().enumerate() {
            if !filler.contains(c) {
                mask[i] = true;
            }
        }
    }

    let mut colspecs = Vec::new();
    let mut start: Option<usize> = None;

    for (i, filled) in mask.iter().enumerate() {
        match (start, *filled) {
            (None, true) => start = Some(i),
            (Some(s), false) => {
                colspecs.push((s, i));
                start = None;
            }
            _ => {}
        }
    }

    Ok(colspecs)
}

/// Column intervals from successive widths.
pub fn widths_to_colspecs(widths: &[usize]) -> Vec<(usize, usize)> {
    let mut col = 0;

    widths
        .iter()
        .map(|w| {
            let spec = (col, col + w);
            col += w;
            spec
        })
        .collect()
}

/// Slices lines of text into fields by character position.
///
/// Lines sampled to infer the column intervals are kept and replayed before
/// the rest of the stream.
pub(crate) struct FixedWidthReader<R> {
    reader: R,
    buffer: VecDeque<String>,
    colspecs: Vec<(usize, usize)>,
    filler: String,
    scratch: Vec<u8>,
    line: String,
    started: bool,
}

impl<R: BufRead> FixedWidthReader<R> {
    pub(crate) fn new(
        reader: R,
        colspecs: &ColSpecs,
        delimiter: Option<&str>,
        comment: Option<char>,
        skiprows: &SkipRows,
        infer_nrows: usize,
    ) -> Result<Self> {
        let filler = match delimiter {
            Some(d) => format!("\r\n{}", d),
            None => DEFAULT_FILLER.to_string(),
        };

        let mut reader = Self {
            reader,
            buffer: VecDeque::new(),
            colspecs: Vec::new(),
            filler,
            scratch: Vec::new(),
            line: String::new(),
            started: false,
        };

        reader.colspecs = match colspecs {
            ColSpecs::Explicit(specs) => specs.clone(),
            ColSpecs::Infer => {
                let sample = reader.sample(infer_nrows, skiprows)?;
                detect_colspecs(&sample, &reader.filler, comment)?
            }
        };

        tracing::debug!(colspecs = ?reader.colspecs, "fixed-width columns");

        Ok(reader)
    }

    fn next_raw_line(&mut self) -> Result<Option<String>> {
        if !read_line(&mut self.reader, &mut self.scratch, &mut self.line)? {
            return Ok(None);
        }

        let line = if self.started {
            self.line.clone()
        } else {
            self.started = true;
            trim_bom(&self.line).to_string()
        };

        Ok(Some(line))
    }

    /// Read lines until `infer_nrows` non-skipped ones were seen, keeping
    /// all of them for later replay.
    fn sample(&mut self, infer_nrows: usize, skiprows: &SkipRows) -> Result<Vec<String>> {
        let mut detect = Vec::new();
        let mut i = 0;

        while detect.len() < infer_nrows {
            let line = match self.next_raw_line()? {
                Some(line) => line,
                None => break,
            };

            if !skiprows.skips(i) {
                detect.push(line.clone());
            }

            self.buffer.push_back(line);
            i += 1;
        }

        Ok(detect)
    }

    pub(crate) fn read_fields(&mut self) -> Result<Option<Vec<String>>> {
        let line = match self.buffer.pop_front() {
            Some(line) => line,
            None => match self.next_raw_line()? {
                Some(line) => line,
                None => return Ok(None),
            },
        };

        let chars: Vec<char> = line.chars().collect();
        let filler = &self.filler;

        let fields = self
            .colspecs
            .iter()
            .map(|(from, to)| {
                let to = (*to).min(chars.len());
                let from = (*from).min(to);

                chars[from..to]
                    .iter()
                    .collect::<String>()
                    .trim_matches(|c| filler.contains(c))
                    .to_string()
            })
            .collect();

        Ok(Some(fields))
    }
}

/// Resolve the column intervals requested by the options.
fn requested_colspecs(options: &ParseOptions) -> Result<ColSpecs> {
    match (&options.colspecs, &options.widths) {
        (None, None) => Err(Error::invalid("Must specify either colspecs or widths")),
        (Some(ColSpecs::Explicit(_)), Some(_)) => Err(Error::invalid(
            "You must specify only one of 'widths' and 'colspecs'",
        )),
        (_, Some(widths)) => Ok(ColSpecs::Explicit(widths_to_colspecs(widths))),
        (Some(colspecs), None) => Ok(colspecs.clone()),
    }
}

/// Build the fixed-width engine and read its header.
pub(crate) fn open_fwf(reader: Box<dyn BufRead>, options: ParseOptions) -> Result<LineEngine> {
    let colspecs = requested_colspecs(&options)?;

    let delimiter = match (&options.delimiter, &options.sep) {
        (Some(d), _) => Some(d.clone()),
        (None, Separator::Value(sep)) => Some(sep.clone()),
        _ => None,
    };

    let reader = FixedWidthReader::new(
        reader,
        &colspecs,
        delimiter.as_deref(),
        options.comment,
        &options.skiprows,
        options.infer_nrows,
    )?;

    LineEngine::start(LineSource::FixedWidth(reader, 0), options)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::options::Header;
    use crate::value::{Column, Label};

    #[test]
    fn test_detect_colspecs() {
        let rows = ["id   name  score", "1    bob    12.5", "22   alice  3"];
        assert_eq!(
            detect_colspecs(&rows, DEFAULT_FILLER, None).unwrap(),
            vec![(0, 2), (5, 10), (11, 16)]
        );

        let rows = ["ab#cd   ef", "ab     ef"];
        assert_eq!(
            detect_colspecs(&rows, DEFAULT_FILLER, Some('#')).unwrap(),
            vec![(0, 2), (7, 9)]
        );

        let rows = ["aa  bb", "a   bbb"];
        assert_eq!(
            detect_colspecs(&rows, DEFAULT_FILLER, None).unwrap(),
            vec![(0, 2), (4, 7)]
        );

        let empty: [&str; 0] = [];
        let err = detect_colspecs(&empty, DEFAULT_FILLER, None).unwrap_err();
        assert_eq!(err.to_string(), "No rows from which to infer column width");
    }

    #[test]
    fn test_widths_to_colspecs() {
        assert_eq!(widths_to_colspecs(&[3, 2, 4]), vec![(0, 3), (3, 5), (5, 9)]);
    }

    #[test]
    fn test_reader_replays_sample() -> Result<()> {
        let data = "skip me\nA  B\n1  x\n22 yy\r\n";
        let mut reader = FixedWidthReader::new(
            Cursor::new(data),
            &ColSpecs::Infer,
            None,
            None,
            &SkipRows::Count(1),
            3,
        )?;

        assert_eq!(reader.colspecs, vec![(0, 2), (3, 5)]);
        assert_eq!(
            reader.read_fields()?,
            Some(vec!["sk".to_string(), "p".to_string()])
        );
        assert_eq!(
            reader.read_fields()?,
            Some(vec!["A".to_string(), "B".to_string()])
        );
        assert_eq!(
            reader.read_fields()?,
            Some(vec!["1".to_string(), "x".to_string()])
        );
        assert_eq!(
            reader.read_fields()?,
            Some(vec!["22".to_string(), "yy".to_string()])
        );
        assert_eq!(reader.read_fields()?, None);

        Ok(())
    }

    #[test]
    fn test_reader_decodes_inferred_columns() -> Result<()> {
        let mut reader = FixedWidthReader::new(
            Cursor::new("aa  bb\na   bbb\n"),
            &ColSpecs::Infer,
            None,
            None,
            &SkipRows::None,
            100,
        )?;

        assert_eq!(reader.colspecs, vec![(0, 2), (4, 7)]);
        assert_eq!(
            reader.read_fields()?,
            Some(vec!["aa".to_string(), "bb".to_string()])
        );
        assert_eq!(
            reader.read_fields()?,
            Some(vec!["a".to_string(), "bbb".to_string()])
        );
        assert_eq!(reader.read_fields()?, None);

        Ok(())
    }

    #[test]
    fn test_requested_colspecs() {
        let mut options = ParseOptions::default();
        assert_eq!(
            requested_colspecs(&options).unwrap_err().to_string(),
            "Must specify either colspecs or widths"
        );

        options.widths = Some(vec![2, 2]);
        assert_eq!(
            requested_colspecs(&options).unwrap(),
            ColSpecs::Explicit(vec![(0, 2), (2, 4)])
        );

        options.colspecs = Some(ColSpecs::Explicit(vec![(0, 1)]));
        assert_eq!(
            requested_colspecs(&options).unwrap_err().to_string(),
            "You must specify only one of 'widths' and 'colspecs'"
        );
    }

    #[test]
    fn test_open_fwf() -> Result<()> {
        let data = "name   qty\nfoo      1\n\nbar     22\n";
        let options = ParseOptions {
            header: Header::Row(0),
            colspecs: Some(ColSpecs::Infer),
            ..Default::default()
        };

        let mut engine = open_fwf(Box::new(Cursor::new(data)), options)?;
        let result = engine.read(None)?.unwrap();

        assert_eq!(result.columns, vec![Label::name("name"), Label::name("qty")]);
        assert_eq!(
            result.get("name"),
            Some(&Column::Object(vec!["foo".into(), "bar".into()]))
        );
        assert_eq!(result.get("qty"), Some(&Column::Int64(vec![1, 22])));

        Ok(())
    }
}
