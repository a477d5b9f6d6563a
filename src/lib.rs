/*!
The `frame-csv` crate parses delimited and fixed-width text into typed
columns, ready to be handed to a DataFrame constructor.

It exposes three parsing engines behind a single resumable reader:

- a **fast** engine, built upon a byte-level tokenizer accelerated by
  [`memchr`](https://docs.rs/memchr/latest/memchr/) searches for structural
  characters,
- a **line-based** engine, slower but more flexible, able to split lines
  using regular expressions or multi-byte separators, to sniff the dialect of
  the data or to drop footer rows,
- a **fixed-width** engine slicing lines by character positions, which can
  be inferred from the data itself.

All engines share the same post-processing: header and index extraction,
missing values detection, type inference, converters, casting and date
parsing.

# Examples

*Reading a whole CSV file*

```
use frame_csv::ReaderBuilder;

let mut reader = ReaderBuilder::new().from_path("data.csv")?;
let table = reader.read(None)?;

dbg!(table.len());
```

*Reading by chunks*

```
use frame_csv::ReaderBuilder;

let reader = ReaderBuilder::new()
    .chunksize(10_000)
    .sep(";")
    .from_path("data.csv")?;

for chunk in reader {
    dbg!(chunk?.len());
}
```

*Reading fixed-width data*

```
use frame_csv::ReaderBuilder;

let mut reader = ReaderBuilder::fixed_width().infer_nrows(500).from_path("data.txt")?;
let table = reader.read(None)?;
```

# Engine selection

The fast engine is used by default. When some option cannot be honored by
it, the reader falls back to the line-based engine and reports the reason
as a [`ParserWarning::EngineFallback`]. This happens with:

- `skipfooter`,
- a sniffed separator,
- separators longer than one character (interpreted as regular
  expressions, except for `\s+` which the fast engine handles natively),
- separators or quote characters that are not ASCII.

When the fast engine was explicitly requested through
[`ReaderBuilder::engine`], the reader fails with
[`ErrorKind::EngineFallback`] instead.

# Warnings

Non-fatal conditions (dialect conflicts, dropped bad lines, renamed
duplicate columns...) are logged through
[`tracing`](https://docs.rs/tracing/latest/tracing/) and kept by the reader,
see [`TextFileReader::warnings`]. The crate never installs a subscriber.

# Caveats

## Line numbers

Line numbers reported in errors and warnings count records as cut by the
tokenizer, blank lines and comment lines included, starting at 1. A quoted
field spanning several physical lines counts once.

## Duplicate columns

Duplicate column names are always renamed `name`, `name.1`, `name.2` and so
on. Disabling this behavior is not supported yet.
*/
mod base;
mod core;
mod dates;
mod dialect;
mod error;
mod fast;
mod fwf;
mod infer;
mod line;
mod na;
mod options;
mod reader;
mod utils;
mod value;
mod warning;
mod writer;

pub use dates::{parse_datetime, DateParser, DateStrategy};
pub use dialect::{sniff, Dialect, DialectSpec};
pub use error::{Error, ErrorKind, Result};
pub use fwf::{detect_colspecs, widths_to_colspecs};
pub use na::{floatify_na_values, stringify_na_values, NaSpec, DEFAULT_NA_VALUES};
pub use options::{
    ColSpecs, ColumnPredicate, ColumnRef, Converter, DateSpec, DtypeSpec, Engine, Header,
    IndexCol, NaValues, ParseDates, ParseOptions, Quoting, RowPredicate, Separator, SkipRows,
    UseCols,
};
pub use reader::{ReaderBuilder, Source, TextFileReader};
pub use value::{Column, Dtype, ExtensionType, Index, Label, ParseResult, Series, Table, Value};
pub use warning::ParserWarning;
pub use writer::Writer;
