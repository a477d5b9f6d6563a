use std::io::{BufWriter, IntoInnerError, Write};

use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::options::Quoting;
use crate::value::{Column, Index, Label, ParseResult, Value};

/// Serializes parsed tables back to delimited text.
///
/// Missing values are written as empty fields and floats with their
/// shortest round-trip representation, so that reading the output back with
/// the same dialect gives the same values.
pub struct Writer<W: Write> {
    dialect: Dialect,
    terminator: String,
    buffer: BufWriter<W>,
    scratch: String,
}

impl<W: Write> Writer<W> {
    pub fn new(writer: W, dialect: Dialect) -> Self {
        Self::with_capacity(writer, 8 * (1 << 10), dialect)
    }

    pub fn with_capacity(writer: W, capacity: usize, dialect: Dialect) -> Self {
        Self {
            dialect,
            terminator: "\n".to_string(),
            buffer: BufWriter::with_capacity(capacity, writer),
            scratch: String::new(),
        }
    }

    /// Will default to `\n`.
    pub fn terminator(&mut self, terminator: &str) -> &mut Self {
        self.terminator = terminator.to_string();
        self
    }

    pub fn flush(&mut self) -> Result<()> {
        self.buffer.flush()?;
        Ok(())
    }

    fn is_special(&self, c: char) -> bool {
        c == self.dialect.delimiter
            || Some(c) == self.dialect.quotechar
            || Some(c) == self.dialect.escapechar
            || c == '\r'
            || c == '\n'
            || self.terminator.contains(c)
    }

    /// Escape `cell` into the scratch buffer, quoted or not.
    fn escape(&mut self, cell: &str, quoted: bool) -> Result<()> {
        let dialect = &self.dialect;

        self.scratch.clear();

        if quoted {
            if let Some(q) = dialect.quotechar {
                self.scratch.push(q);
            }
        }

        for c in cell.chars() {
            let needs_escape = if quoted {
                Some(c) == dialect.quotechar || Some(c) == dialect.escapechar
            } else {
                c == dialect.delimiter
                    || Some(c) == dialect.quotechar
                    || Some(c) == dialect.escapechar
                    || c == '\r'
                    || c == '\n'
                    || self.terminator.contains(c)
            };

            if needs_escape {
                if quoted && dialect.doublequote && Some(c) == dialect.quotechar {
                    self.scratch.push(c);
                } else {
                    match dialect.escapechar {
                        Some(e) => self.scratch.push(e),
                        None => return Err(Error::invalid("need to escape, but no escapechar set")),
                    }
                }
            }

            self.scratch.push(c);
        }

        if quoted {
            if let Some(q) = dialect.quotechar {
                self.scratch.push(q);
            }
        }

        Ok(())
    }

    fn must_quote(&self, value: &Value, text: &str, single: bool) -> bool {
        if self.dialect.quotechar.is_none() {
            return false;
        }

        match self.dialect.quoting {
            Quoting::None => false,
            Quoting::All => true,
            Quoting::NonNumeric => !matches!(value, Value::Int(_) | Value::Float(_) | Value::Na),
            // NOTE: a lone empty field would otherwise read back as a blank line.
            Quoting::Minimal => (single && text.is_empty()) || text.chars().any(|c| self.is_special(c)),
        }
    }

    /// Write one record of values.
    pub fn write_record(&mut self, record: &[Value]) -> Result<()> {
        let last_i = record.len().saturating_sub(1);
        let single = record.len() == 1;

        for (i, value) in record.iter().enumerate() {
            let text = format_value(value);
            let quoted = self.must_quote(value, &text, single);

            self.escape(&text, quoted)?;
            self.buffer.write_all(self.scratch.as_bytes())?;

            if i != last_i {
                let mut utf8 = [0; 4];
                let delimiter = self.dialect.delimiter.encode_utf8(&mut utf8);
                self.buffer.write_all(delimiter.as_bytes())?;
            }
        }

        self.buffer.write_all(self.terminator.as_bytes())?;

        Ok(())
    }

    /// Write the header rows, then every row, of a parsed table. A range
    /// index is not written.
    pub fn write_result(&mut self, result: &ParseResult) -> Result<()> {
        let index_columns: Vec<&Column> = match &result.index {
            Index::Range { .. } => Vec::new(),
            Index::Single { values, .. } => vec![values],
            Index::Multi { levels, .. } => levels.iter().collect(),
        };

        let index_names = match &result.index {
            Index::Range { .. } => Vec::new(),
            index => index.names(),
        };

        let levels = result
            .columns
            .iter()
            .map(|label| match label {
                Label::Tuple(parts) => parts.len(),
                _ => 1,
            })
            .max()
            .unwrap_or(1);

        for level in 0..levels {
            let mut header: Vec<Value> = Vec::with_capacity(index_names.len() + result.columns.len());

            for name in &index_names {
                header.push(match name {
                    Some(name) if level + 1 == levels => Value::Str(name.to_string()),
                    _ => Value::Str(String::new()),
                });
            }

            for label in &result.columns {
                header.push(Value::Str(match label {
                    Label::Tuple(parts) => parts.get(level).cloned().unwrap_or_default(),
                    label => label.to_string(),
                }));
            }

            self.write_record(&header)?;
        }

        let mut record = Vec::with_capacity(index_columns.len() + result.data.len());

        for i in 0..result.len() {
            record.clear();

            for column in index_columns.iter().copied().chain(result.data.iter()) {
                record.push(column.get(i).unwrap_or(Value::Na));
            }

            self.write_record(&record)?;
        }

        Ok(())
    }

    pub fn into_inner(self) -> std::result::Result<W, IntoInnerError<BufWriter<W>>> {
        self.buffer.into_inner()
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Na => String::new(),
        Value::Float(x) if x.is_nan() => String::new(),
        // NOTE: `Debug` gives the shortest representation reading back as `x`.
        Value::Float(x) => format!("{:?}", x),
        Value::Datetime(d) => d.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
        value => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::options::IndexCol;
    use crate::reader::ReaderBuilder;

    fn written(writer: Writer<Cursor<Vec<u8>>>) -> String {
        String::from_utf8(writer.into_inner().unwrap().into_inner()).unwrap()
    }

    #[test]
    fn test_write_record() -> Result<()> {
        let mut writer = Writer::new(Cursor::new(Vec::new()), Dialect::excel());

        writer.write_record(&["name".into(), "surname".into(), "age".into()])?;
        writer.write_record(&["john,".into(), "landis".into(), Value::Int(45)])?;
        writer.write_record(&["lucy".into(), "get\ngot".into(), "\"te,\"st\"".into()])?;
        writer.write_record(&[Value::Na])?;
        writer.write_record(&[Value::Float(0.1), Value::Float(f64::NAN), Value::Bool(true)])?;

        assert_eq!(
            written(writer),
            "name,surname,age\n\"john,\",landis,45\nlucy,\"get\ngot\",\"\"\"te,\"\"st\"\"\"\n\"\"\n0.1,,True\n",
        );

        Ok(())
    }

    #[test]
    fn test_quoting_policies() -> Result<()> {
        let mut dialect = Dialect::excel();
        dialect.quoting = Quoting::NonNumeric;

        let mut writer = Writer::new(Cursor::new(Vec::new()), dialect.clone());
        writer.write_record(&["a".into(), Value::Int(1), Value::Float(2.5), Value::Na])?;
        assert_eq!(written(writer), "\"a\",1,2.5,\n");

        dialect.quoting = Quoting::All;
        let mut writer = Writer::new(Cursor::new(Vec::new()), dialect.clone());
        writer.write_record(&["a".into(), Value::Int(1)])?;
        assert_eq!(written(writer), "\"a\",\"1\"\n");

        dialect.quoting = Quoting::None;
        dialect.escapechar = Some('\\');
        let mut writer = Writer::new(Cursor::new(Vec::new()), dialect.clone());
        writer.write_record(&["a,b".into(), "c\"".into()])?;
        assert_eq!(written(writer), "a\\,b,c\\\"\n");

        dialect.escapechar = None;
        let mut writer = Writer::new(Cursor::new(Vec::new()), dialect.clone());
        assert!(writer.write_record(&["a,b".into()]).is_err());

        dialect.quoting = Quoting::Minimal;
        dialect.doublequote = false;
        dialect.escapechar = Some('\\');
        let mut writer = Writer::new(Cursor::new(Vec::new()), dialect);
        writer.write_record(&["say \"hi\"".into()])?;
        assert_eq!(written(writer), "\"say \\\"hi\\\"\"\n");

        Ok(())
    }

    #[test]
    fn test_round_trip() -> Result<()> {
        let data = "key,n,x,label\nk1,1,0.1,\"a,b\"\nk2,,1e-07,\"multi\nline\"\nk3,3,2.5,\n";

        let mut builder = ReaderBuilder::new();
        builder.index_col(IndexCol::Columns(vec![0.into()]));

        let parsed = builder.from_str(data)?.read(None)?.into_frame().unwrap();

        let mut writer = Writer::new(Cursor::new(Vec::new()), Dialect::excel());
        writer.write_result(&parsed)?;
        let output = written(writer);

        let reparsed = builder.from_str(&output)?.read(None)?.into_frame().unwrap();

        assert_eq!(reparsed.columns, parsed.columns);
        assert_eq!(reparsed.index, parsed.index);
        assert_eq!(reparsed.get("label"), parsed.get("label"));
        assert_eq!(reparsed.get("x"), parsed.get("x"));
        assert_eq!(
            reparsed.get("n").map(Column::na_count),
            parsed.get("n").map(Column::na_count)
        );

        Ok(())
    }
}
