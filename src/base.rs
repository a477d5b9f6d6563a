use std::collections::{HashMap, HashSet, VecDeque};

use crate::dates::{process_date_conversion, DateContext, DateConverter};
use crate::error::{Error, ErrorKind, Result};
use crate::infer::{cast_types, infer_types, BoolLiterals, RawColumn};
use crate::na::{NaSpec, NaTable};
use crate::options::{
    ColumnRef, DateSpec, IndexCol, ParseDates, ParseOptions, Quoting, UseCols,
};
use crate::value::{Column, Dtype, Index, Label, ParseResult};
use crate::warning::ParserWarning;

pub(crate) const MULTI_CHAR_DELIMITER_HINT: &str =
    "Error could possibly be due to quotes being ignored when a multi-char delimiter is used.";

/// A tokenized record and its 1-indexed position in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Row {
    pub line: u64,
    pub fields: Vec<String>,
}

impl Row {
    pub(crate) fn new(line: u64, fields: Vec<String>) -> Self {
        Self { line, fields }
    }
}

/// What every engine must provide: tokenized records, in order.
pub(crate) trait RecordSource {
    /// Return the next physical record, or `None` when the input is
    /// exhausted. Skipped rows must still be returned, the caller filters
    /// them by position.
    fn next_record(&mut self) -> Result<Option<Row>>;

    /// Whether a record, comments already stripped, is blank.
    fn is_blank(&self, fields: &[String]) -> bool {
        match fields {
            [] => true,
            [field] => field.trim().is_empty(),
            _ => false,
        }
    }
}

/// Mutable cursor of an engine.
#[derive(Debug)]
pub(crate) struct EngineState {
    /// Number of filtered rows pulled so far.
    pub line_pos: usize,
    /// Rows pulled but not consumed yet.
    pub buffer: VecDeque<Row>,
    /// Whether no read has happened yet. An exhausted first read returns an
    /// empty result instead of failing.
    pub first_chunk: bool,
}

impl EngineState {
    pub(crate) fn new() -> Self {
        Self {
            line_pos: 0,
            buffer: VecDeque::new(),
            first_chunk: true,
        }
    }
}

/// Rename duplicated labels as `name`, `name.1`, `name.2`... When such a
/// candidate is already taken, it is suffixed in turn (`name.1.1`). Only the
/// last element of tuples is suffixed.
pub(crate) fn dedup_names(names: Vec<Label>) -> (Vec<Label>, Vec<(String, String)>) {
    let mut counts: HashMap<Label, usize> = HashMap::new();
    let mut renamed = Vec::new();
    let mut result = Vec::with_capacity(names.len());

    for original in names {
        let mut col = original.clone();
        let mut cur_count = counts.get(&col).copied().unwrap_or(0);

        while cur_count > 0 {
            counts.insert(col.clone(), cur_count + 1);

            col = match col {
                Label::Tuple(mut parts) => {
                    if let Some(last) = parts.last_mut() {
                        *last = format!("{}.{}", last, cur_count);
                    }
                    Label::Tuple(parts)
                }
                other => Label::Name(format!("{}.{}", other, cur_count)),
            };

            cur_count = counts.get(&col).copied().unwrap_or(0);
        }

        if col != original {
            renamed.push((original.to_string(), col.to_string()));
        }

        counts.insert(col.clone(), cur_count + 1);
        result.push(col);
    }

    (result, renamed)
}

/// Whether a token only holds digits, signs and the numeric markers.
#[inline]
fn looks_numeric(token: &str, thousands: Option<char>, decimal: char) -> bool {
    token
        .trim()
        .chars()
        .all(|c| c.is_ascii_digit() || c == '-' || c == '^' || Some(c) == thousands || c == decimal)
}

fn python_list(values: &[String]) -> String {
    let quoted: Vec<String> = values.iter().map(|v| format!("'{}'", v)).collect();
    format!("[{}]", quoted.join(", "))
}

/// Services shared by every engine: row cursor, header & index inference,
/// bad line policy and column conversion.
pub(crate) struct ParserBase<S> {
    source: S,
    pub(crate) options: ParseOptions,
    pub(crate) state: EngineState,
    pub(crate) warnings: Vec<ParserWarning>,
    na: NaTable,
    literals: BoolLiterals,
    /// Whether comments must be stripped from tokens, i.e. the tokenizer
    /// does not handle them.
    strip_comments: bool,
    hint: Option<&'static str>,

    orig_names: Vec<Label>,
    num_original_columns: usize,
    unnamed_cols: HashSet<String>,
    col_indices: Option<Vec<usize>>,
    index_col: Vec<usize>,
    index_names: Option<Vec<Option<Label>>>,
    implicit_index: bool,
    column_level_names: Vec<Option<String>>,
    no_thousands: HashSet<usize>,
}

impl<S: RecordSource> ParserBase<S> {
    pub(crate) fn new(source: S, options: ParseOptions, strip_comments: bool) -> Self {
        let na = NaTable::new(options.na_values.as_ref(), options.keep_default_na);
        let literals = BoolLiterals::new(&options.true_values, &options.false_values);

        let hint = match options.resolved_delimiter() {
            Some(d) if d.chars().count() > 1 && options.quoting != Quoting::None => {
                Some(MULTI_CHAR_DELIMITER_HINT)
            }
            _ => None,
        };

        Self {
            source,
            state: EngineState::new(),
            options,
            warnings: Vec::new(),
            na,
            literals,
            strip_comments,
            hint,
            orig_names: Vec::new(),
            num_original_columns: 0,
            unnamed_cols: HashSet::new(),
            col_indices: None,
            index_col: Vec::new(),
            index_names: None,
            implicit_index: false,
            column_level_names: Vec::new(),
            no_thousands: HashSet::new(),
        }
    }

    pub(crate) fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Names of the data columns, index columns excluded.
    pub(crate) fn column_names(&self) -> Vec<Label> {
        self.orig_names
            .iter()
            .enumerate()
            .filter(|(i, _)| self.implicit_index || !self.index_col.contains(i))
            .map(|(_, l)| l.clone())
            .collect()
    }

    /// Put back a row that was read ahead, e.g. while sniffing the dialect.
    pub(crate) fn push_row(&mut self, row: Row) {
        self.state.line_pos += 1;
        self.state.buffer.push_back(row);
    }

    // Cursor

    fn has_complex_date_col(&self) -> bool {
        self.options.parse_dates.has_complex_columns()
    }

    fn strip_comment(&self, fields: Vec<String>) -> Vec<String> {
        let comment = match self.options.comment {
            Some(c) if self.strip_comments => c,
            _ => return fields,
        };

        let mut stripped = Vec::with_capacity(fields.len());

        for field in fields {
            match field.find(comment) {
                None => stripped.push(field),
                Some(i) => {
                    if i > 0 {
                        stripped.push(field[..i].to_string());
                    }
                    break;
                }
            }
        }

        stripped
    }

    /// Next record not excluded by `skiprows`.
    fn pull_raw(&mut self) -> Result<Option<Row>> {
        while let Some(row) = self.source.next_record()? {
            if !self.options.skiprows.skips(row.line.saturating_sub(1) as usize) {
                return Ok(Some(row));
            }
        }

        Ok(None)
    }

    /// Strip comments from a raw row and tell whether it must be kept.
    fn filter(&self, row: Row) -> Option<Row> {
        let fields = self.strip_comment(row.fields);

        if self.options.skip_blank_lines && self.source.is_blank(&fields) {
            return None;
        }

        Some(Row::new(row.line, fields))
    }

    fn pull(&mut self) -> Result<Option<Row>> {
        while let Some(row) = self.pull_raw()? {
            if let Some(row) = self.filter(row) {
                return Ok(Some(row));
            }
        }

        Ok(None)
    }

    fn next_line(&mut self) -> Result<Option<Row>> {
        let row = self.pull()?;

        if let Some(row) = &row {
            self.state.line_pos += 1;
            self.state.buffer.push_back(row.clone());
        }

        Ok(row)
    }

    fn buffered_line(&mut self) -> Result<Option<Row>> {
        match self.state.buffer.front() {
            Some(row) => Ok(Some(row.clone())),
            None => self.next_line(),
        }
    }

    // Header inference

    fn handle_usecols(&mut self, rows: Vec<Vec<Label>>, key: &[Label]) -> Result<Vec<Vec<Label>>> {
        let usecols = match &self.options.usecols {
            None => return Ok(rows),
            Some(usecols) => usecols,
        };

        let col_indices: Vec<usize> = match usecols {
            UseCols::Predicate(predicate) => key
                .iter()
                .enumerate()
                .filter(|(_, name)| predicate(&name.to_string()))
                .map(|(i, _)| i)
                .collect(),
            UseCols::Positions(positions) => positions.clone(),
            UseCols::Names(names) => {
                if rows.len() > 1 {
                    return Err(Error::invalid(
                        "If using multiple headers, usecols must be integers.",
                    ));
                }

                let missing: Vec<String> = names
                    .iter()
                    .filter(|n| !key.iter().any(|k| k.to_string() == **n))
                    .cloned()
                    .collect();

                if !missing.is_empty() {
                    return Err(Error::invalid(format!(
                        "Usecols do not match columns, columns expected but not found: {}",
                        python_list(&missing)
                    )));
                }

                names
                    .iter()
                    .filter_map(|n| key.iter().position(|k| k.to_string() == *n))
                    .collect()
            }
        };

        let rows = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .enumerate()
                    .filter(|(i, _)| col_indices.contains(i))
                    .map(|(_, l)| l)
                    .collect()
            })
            .collect();

        self.col_indices = Some(col_indices);

        Ok(rows)
    }

    fn names_as_labels(&self) -> Option<Vec<Label>> {
        self.options
            .names
            .as_ref()
            .map(|names| names.iter().map(|n| Label::Name(n.clone())).collect())
    }

    /// Read the header rows. Returns the label rows and, for multi-row
    /// headers, the trailing row that may hold the index names.
    fn infer_columns(&mut self) -> Result<(Vec<Vec<Label>>, Option<Option<Vec<String>>>)> {
        let names = self.names_as_labels();

        let header_rows = match self.options.header.rows() {
            Some(rows) => rows,
            None => return self.infer_headerless_columns(names).map(|rows| (rows, None)),
        };

        let have_mi_columns = header_rows.len() > 1;
        let mut header = header_rows.clone();

        if have_mi_columns {
            header.push(header_rows[header_rows.len() - 1] + 1);
        }

        let index_count = self.options.index_col.columns().len();
        let mut columns: Vec<Vec<String>> = Vec::new();
        let mut index_row: Option<Option<Vec<String>>> = None;
        let mut clear_buffer = true;

        for (level, &hr) in header.iter().enumerate() {
            let mut line = self.buffered_line()?;

            while line.is_some() && self.state.line_pos <= hr {
                line = self.next_line()?;
            }

            let fields: Vec<String> = match line {
                Some(row) => row.fields,
                None => {
                    if self.state.line_pos < hr {
                        return Err(Error::parser(format!(
                            "Passed header={} but only {} lines in file",
                            hr, self.state.line_pos
                        )));
                    }

                    if have_mi_columns && hr > 0 {
                        if level == header.len() - 1 {
                            index_row = Some(None);
                            break;
                        }

                        return Err(Error::parser(format!(
                            "Passed header={} but only {} lines in file",
                            hr, self.state.line_pos
                        )));
                    }

                    match &names {
                        None => {
                            return Err(Error::new(ErrorKind::EmptyData(
                                "No columns to parse from file".to_string(),
                            )))
                        }
                        Some(names) => names.iter().map(|n| n.to_string()).collect(),
                    }
                }
            };

            let mut this_columns = Vec::with_capacity(fields.len());
            let mut this_unnamed_cols = Vec::new();

            for (i, c) in fields.into_iter().enumerate() {
                if c.is_empty() {
                    this_unnamed_cols.push(i);
                    this_columns.push(if have_mi_columns {
                        format!("Unnamed: {}_level_{}", i, level)
                    } else {
                        format!("Unnamed: {}", i)
                    });
                } else {
                    this_columns.push(c);
                }
            }

            if have_mi_columns && level == header.len() - 1 {
                let lc = this_columns.len();
                let unnamed_count = this_unnamed_cols.len();

                // NOTE: when the extra row does not look like index names, it
                // is data and goes back to the buffer.
                if lc != unnamed_count && lc.saturating_sub(index_count) > unnamed_count {
                    clear_buffer = false;

                    let last = self.state.buffer.pop_back();
                    self.state.buffer.clear();
                    self.state.buffer.extend(last);

                    index_row = Some(None);
                } else {
                    self.unnamed_cols
                        .extend(this_unnamed_cols.iter().map(|i| this_columns[*i].clone()));
                    index_row = Some(Some(this_columns));
                }

                break;
            }

            if !have_mi_columns && self.options.mangle_dupe_cols {
                let labels = this_columns.into_iter().map(Label::Name).collect();
                let (deduped, renamed) = dedup_names(labels);

                for (original, renamed) in renamed {
                    ParserWarning::DuplicateColumnRenamed { original, renamed }
                        .emit(&mut self.warnings);
                }

                this_columns = deduped.into_iter().map(|l| l.to_string()).collect();
            }

            self.unnamed_cols
                .extend(this_unnamed_cols.iter().map(|i| this_columns[*i].clone()));

            if columns.is_empty() {
                self.num_original_columns = this_columns.len();
            }

            columns.push(this_columns);
        }

        if clear_buffer {
            self.state.buffer.clear();
        }

        let labels: Vec<Vec<Label>> = columns
            .into_iter()
            .map(|row| row.into_iter().map(Label::Name).collect())
            .collect();

        let rows = match names {
            Some(names) => {
                let mismatch = match &self.options.usecols {
                    Some(UseCols::Predicate(_)) => false,
                    Some(UseCols::Positions(p)) => names.len() != p.len(),
                    Some(UseCols::Names(n)) => names.len() != n.len(),
                    None => names.len() != labels[0].len(),
                };

                if mismatch {
                    return Err(Error::invalid(
                        "Number of passed names did not match number of header fields in the file",
                    ));
                }

                if labels.len() > 1 {
                    return Err(Error::invalid("Cannot pass names with multi-index columns"));
                }

                if self.options.usecols.is_some() {
                    let key = labels[0].clone();
                    self.handle_usecols(labels, &key)?;
                } else {
                    self.col_indices = None;
                    self.num_original_columns = names.len();
                }

                vec![names]
            }
            None => {
                let key = labels[0].clone();
                self.handle_usecols(labels, &key)?
            }
        };

        Ok((rows, index_row))
    }

    fn infer_headerless_columns(&mut self, names: Option<Vec<Label>>) -> Result<Vec<Vec<Label>>> {
        let ncols = match self.buffered_line()? {
            Some(row) => row.fields.len(),
            None => match &names {
                None => {
                    return Err(Error::new(ErrorKind::EmptyData(
                        "No columns to parse from file".to_string(),
                    )))
                }
                Some(names) => names.len(),
            },
        };

        self.num_original_columns = ncols;

        match names {
            None => {
                let labels: Vec<Label> = (0..ncols)
                    .map(|i| match &self.options.prefix {
                        Some(prefix) => Label::Name(format!("{}{}", prefix, i)),
                        None => Label::Position(i),
                    })
                    .collect();

                self.handle_usecols(vec![labels.clone()], &labels)
            }
            Some(names) => {
                if self.options.usecols.is_none() || names.len() >= ncols {
                    self.num_original_columns = names.len();
                    self.handle_usecols(vec![names.clone()], &names)
                } else {
                    let mismatch = match &self.options.usecols {
                        Some(UseCols::Positions(p)) => names.len() != p.len(),
                        Some(UseCols::Names(n)) => names.len() != n.len(),
                        _ => false,
                    };

                    if mismatch {
                        return Err(Error::invalid(
                            "Number of passed names did not match number of header fields in the file",
                        ));
                    }

                    self.handle_usecols(vec![names.clone()], &names)?;

                    Ok(vec![names])
                }
            }
        }
    }

    /// Build tuple labels out of a multi-row header.
    fn extract_multi_indexer_columns(
        &mut self,
        header: Vec<Vec<Label>>,
        index_row: Option<Vec<String>>,
    ) -> Result<()> {
        let ic: Vec<usize> = self
            .options
            .index_col
            .columns()
            .iter()
            .filter_map(|c| match c {
                ColumnRef::Position(p) => Some(*p),
                ColumnRef::Name(_) => None,
            })
            .collect();

        let index_names = ic
            .iter()
            .map(|c| {
                index_row
                    .as_ref()
                    .and_then(|row| row.get(*c))
                    .filter(|name| !self.unnamed_cols.contains(*name))
                    .map(|name| Label::Name(name.clone()))
            })
            .collect();

        let field_count = header[0].len();
        let mut orig_names = Vec::with_capacity(field_count);

        for p in 0..field_count {
            if ic.contains(&p) {
                orig_names.push(Label::Position(p));
            } else {
                orig_names.push(Label::Tuple(
                    header
                        .iter()
                        .map(|row| row.get(p).map(|l| l.to_string()).unwrap_or_default())
                        .collect(),
                ));
            }
        }

        for level in 0..header.len() {
            let all_unnamed = orig_names
                .iter()
                .filter_map(|l| match l {
                    Label::Tuple(parts) => Some(parts),
                    _ => None,
                })
                .all(|parts| self.unnamed_cols.contains(&parts[level]));

            if all_unnamed {
                let rows: Vec<String> = self
                    .options
                    .header
                    .rows()
                    .unwrap_or_default()
                    .iter()
                    .map(|r| r.to_string())
                    .collect();

                return Err(Error::parser(format!(
                    "Passed header=[{}] are too many rows for this multi_index of columns",
                    rows.join(",")
                )));
            }
        }

        self.column_level_names = header
            .iter()
            .map(|row| {
                if ic.is_empty() {
                    return None;
                }

                row.first()
                    .map(|l| l.to_string())
                    .filter(|name| !name.is_empty() && !self.unnamed_cols.contains(name))
            })
            .collect();

        let (orig_names, renamed) = if self.options.mangle_dupe_cols {
            dedup_names(orig_names)
        } else {
            (orig_names, Vec::new())
        };

        for (original, renamed) in renamed {
            ParserWarning::DuplicateColumnRenamed { original, renamed }.emit(&mut self.warnings);
        }

        self.num_original_columns = orig_names.len();
        self.orig_names = orig_names;
        self.index_names = Some(index_names);

        Ok(())
    }

    /// Resolve index columns against the given names, returning the index
    /// names (placeholders dropped) and positions.
    fn clean_index_names(
        &self,
        columns: &[Label],
        index_col: &[ColumnRef],
    ) -> Result<(Vec<Option<Label>>, Vec<usize>)> {
        let mut names = Vec::with_capacity(index_col.len());
        let mut positions = Vec::with_capacity(index_col.len());

        for col in index_col {
            let position = match col {
                ColumnRef::Name(name) => columns
                    .iter()
                    .position(|l| l.to_string() == *name)
                    .ok_or_else(|| Error::invalid(format!("Index {} invalid", name)))?,
                ColumnRef::Position(p) => {
                    if *p >= columns.len() {
                        return Err(Error::invalid(format!("Index {} invalid", p)));
                    }
                    *p
                }
            };

            let label = columns[position].clone();
            let placeholder = matches!(&label, Label::Name(n) if self.unnamed_cols.contains(n));

            names.push(if placeholder { None } else { Some(label) });
            positions.push(position);
        }

        Ok((names, positions))
    }

    /// Detect index columns: explicit ones, index names on a row of their
    /// own, or an implicit index when data rows are longer than the header.
    fn get_index_name(&mut self) -> Result<()> {
        let line = self.next_line()?.map(|row| row.fields);
        let next_line = self.next_line()?.map(|row| row.fields);

        let mut implicit_first_cols = 0;

        if let Some(line) = &line {
            if self.options.index_col != IndexCol::False {
                implicit_first_cols = line.len().saturating_sub(self.num_original_columns);
            }

            if let Some(next_line) = &next_line {
                if next_line.len() == line.len() + self.num_original_columns {
                    self.state.buffer.pop_front();

                    let mut columns: Vec<Label> =
                        line.iter().map(|n| Label::Name(n.clone())).collect();
                    columns.extend(self.orig_names.drain(..));

                    self.index_col = (0..line.len()).collect();
                    self.index_names = Some(
                        line.iter()
                            .map(|n| Some(Label::Name(n.clone())))
                            .collect(),
                    );
                    self.num_original_columns = columns.len();
                    self.orig_names = columns;

                    return Ok(());
                }
            }
        }

        if implicit_first_cols > 0 {
            self.implicit_index = true;

            let explicit: Option<Vec<usize>> = self
                .options
                .index_col
                .columns()
                .iter()
                .map(|c| match c {
                    ColumnRef::Position(p) => Some(*p),
                    ColumnRef::Name(_) => None,
                })
                .collect();

            self.index_col = match explicit {
                Some(positions) if !positions.is_empty() => positions,
                _ => (0..implicit_first_cols).collect(),
            };

            if self.index_names.is_none() {
                self.index_names = Some(vec![None; self.index_col.len()]);
            }

            return Ok(());
        }

        let index_col = self.options.index_col.columns().to_vec();

        if index_col.is_empty() {
            return Ok(());
        }

        let (names, positions) = self.clean_index_names(&self.orig_names, &index_col)?;

        self.index_col = positions;

        if self.index_names.is_none() {
            self.index_names = Some(names);
        }

        Ok(())
    }

    fn set_no_thousands_columns(&mut self) {
        let mut positions = HashSet::new();

        let mut add = |col: &ColumnRef, names: &[Label]| match col {
            ColumnRef::Position(p) => {
                positions.insert(*p);
            }
            ColumnRef::Name(name) => {
                if let Some(p) = names.iter().position(|l| l.to_string() == *name) {
                    positions.insert(p);
                }
            }
        };

        match &self.options.parse_dates {
            ParseDates::False => {}
            ParseDates::True => {
                for p in &self.index_col {
                    add(&ColumnRef::Position(*p), &self.orig_names);
                }
            }
            ParseDates::Columns(specs) => {
                for spec in specs {
                    match spec {
                        DateSpec::Single(col) => add(col, &self.orig_names),
                        DateSpec::Combine(cols) => {
                            cols.iter().for_each(|c| add(c, &self.orig_names))
                        }
                    }
                }
            }
            ParseDates::Named(entries) => {
                for (_, cols) in entries {
                    cols.iter().for_each(|c| add(c, &self.orig_names));
                }
            }
        }

        self.no_thousands = positions;
    }

    /// Infer the header, the index and prepare reading the body.
    pub(crate) fn initialize(&mut self) -> Result<()> {
        let (rows, index_row) = self.infer_columns()?;

        if rows.len() > 1 {
            self.extract_multi_indexer_columns(rows, index_row.flatten())?;
        } else {
            self.orig_names = rows.into_iter().next().unwrap_or_default();
        }

        if !self.has_complex_date_col() {
            self.get_index_name()?;
        }

        if self.options.parse_dates.is_enabled() {
            self.set_no_thousands_columns();
        }

        tracing::debug!(
            columns = self.orig_names.len(),
            index = self.index_col.len(),
            implicit_index = self.implicit_index,
            "inferred header"
        );

        Ok(())
    }

    // Body

    fn expected_len(&self) -> usize {
        if self.implicit_index {
            self.num_original_columns + self.index_col.len()
        } else {
            self.num_original_columns
        }
    }

    /// Apply the bad line policy, returning whether the row must be kept.
    fn check_row(&mut self, row: &Row) -> Result<bool> {
        let col_len = self.expected_len();

        if row.fields.len() <= col_len
            || self.options.index_col == IndexCol::False
            || self.options.usecols.is_some()
        {
            return Ok(true);
        }

        if self.options.error_bad_lines {
            return Err(Error::new(ErrorKind::BadLine {
                line: row.line,
                expected: col_len,
                actual: row.fields.len(),
                hint: self.hint,
            }));
        }

        if self.options.warn_bad_lines {
            ParserWarning::BadLineSkipped {
                line: row.line,
                expected: col_len,
                actual: row.fields.len(),
            }
            .emit(&mut self.warnings);
        }

        Ok(false)
    }

    fn normalize_numeric(&self, fields: &mut [String]) {
        let thousands = self.options.thousands;
        let decimal = self.options.decimal;

        if thousands.is_none() && decimal == '.' {
            return;
        }

        for (i, field) in fields.iter_mut().enumerate() {
            if self.no_thousands.contains(&i) || !looks_numeric(field, thousands, decimal) {
                continue;
            }

            if let Some(t) = thousands {
                if field.contains(t) {
                    *field = field.replace(t, "");
                }
            }

            if decimal != '.' && field.contains(decimal) {
                *field = field.replace(decimal, ".");
            }
        }
    }

    /// Read up to `rows` rows, everything when `None`.
    fn get_lines(&mut self, rows: Option<usize>) -> Result<Vec<Row>> {
        let mut lines: Vec<Row> = Vec::new();

        if self.options.skipfooter > 0 {
            lines.extend(self.state.buffer.drain(..));

            let mut raw = Vec::new();

            while let Some(row) = self.pull_raw()? {
                raw.push(row);
            }

            let keep = (lines.len() + raw.len()).saturating_sub(self.options.skipfooter);

            if keep <= lines.len() {
                lines.truncate(keep);
                raw.clear();
            } else {
                raw.truncate(keep - lines.len());
            }

            for row in raw {
                if let Some(row) = self.filter(row) {
                    lines.push(row);
                }
            }

            let mut kept = Vec::with_capacity(lines.len());

            for row in lines {
                if self.check_row(&row)? {
                    kept.push(row);
                }
            }

            lines = kept;
        } else {
            while rows.map_or(true, |n| lines.len() < n) {
                let row = match self.state.buffer.pop_front() {
                    Some(row) => row,
                    None => match self.pull()? {
                        Some(row) => row,
                        None => break,
                    },
                };

                if self.check_row(&row)? {
                    lines.push(row);
                }
            }
        }

        for row in lines.iter_mut() {
            self.normalize_numeric(&mut row.fields);
        }

        Ok(lines)
    }

    /// Transpose rows into columns, padding short rows, and keep the used
    /// columns only.
    fn rows_to_cols(&self, rows: Vec<Row>) -> Vec<Vec<String>> {
        let col_len = self.expected_len();
        let width = rows
            .iter()
            .map(|r| r.fields.len())
            .max()
            .unwrap_or(0)
            .max(col_len);

        let mut columns: Vec<Vec<String>> = (0..width)
            .map(|_| Vec::with_capacity(rows.len()))
            .collect();

        for row in rows {
            let mut fields = row.fields.into_iter();

            for column in columns.iter_mut() {
                column.push(fields.next().unwrap_or_default());
            }
        }

        match &self.col_indices {
            None => columns,
            Some(col_indices) => {
                let offset = if self.implicit_index {
                    self.index_col.len()
                } else {
                    0
                };

                columns
                    .into_iter()
                    .enumerate()
                    .filter(|(i, _)| *i < offset || col_indices.contains(&(i - offset)))
                    .map(|(_, c)| c)
                    .collect()
            }
        }
    }

    fn na_for(&self, position: Option<usize>, name: &str) -> NaSpec {
        if self.options.na_filter {
            self.na.for_column(position, name)
        } else {
            NaSpec::none()
        }
    }

    fn convert_column(&mut self, label: &Label, raw: RawColumn) -> Result<Column> {
        let name = label.to_string();
        let position = self.orig_names.iter().position(|l| l == label);
        let na = self.na_for(position, &name);
        let lookup = position.unwrap_or(usize::MAX);

        let dtype = self.options.dtype_for(lookup, &name).cloned();

        if let (Some(converter), RawColumn::Text(tokens)) =
            (self.options.converter_for(lookup, &name), &raw)
        {
            let values = tokens.iter().map(|t| converter(t)).collect();

            if dtype.is_some() {
                ParserWarning::ConverterOverridesDtype { column: name }.emit(&mut self.warnings);
            }

            return Ok(infer_types(RawColumn::Values(values), &na, false, &self.literals).0);
        }

        let try_num_bool = !dtype.as_ref().map_or(false, Dtype::is_string_like);
        let (column, na_count) = infer_types(raw, &na, try_num_bool, &self.literals);

        match dtype {
            Some(dtype)
                if column.dtype() != dtype || matches!(dtype, Dtype::Extension(_)) =>
            {
                if na_count > 0 && dtype == Dtype::Bool {
                    return Err(Error::parser(format!(
                        "Bool column has NA values in column {}",
                        name
                    )));
                }

                cast_types(column, &dtype, &name)
            }
            _ => Ok(column),
        }
    }

    fn should_parse_dates(&self, i: usize) -> bool {
        match &self.options.parse_dates {
            ParseDates::True => true,
            ParseDates::Columns(specs) => {
                let j = self.index_col.get(i).copied();
                let name = self
                    .index_names
                    .as_ref()
                    .and_then(|names| names.get(i).cloned().flatten());

                specs.iter().any(|spec| match spec {
                    DateSpec::Single(ColumnRef::Position(p)) => Some(*p) == j,
                    DateSpec::Single(ColumnRef::Name(n)) => {
                        name.as_ref().map_or(false, |l| l.to_string() == *n)
                    }
                    DateSpec::Combine(_) => false,
                })
            }
            _ => false,
        }
    }

    fn converter(&self) -> DateConverter<'_> {
        DateConverter {
            parser: self.options.date_parser.as_ref(),
            dayfirst: self.options.dayfirst,
        }
    }

    fn convert_index(
        &mut self,
        arrays: Vec<RawColumn>,
        names: Vec<Option<Label>>,
        try_parse_dates: bool,
    ) -> Result<Index> {
        let mut converted = Vec::with_capacity(arrays.len());

        for (i, raw) in arrays.into_iter().enumerate() {
            let name = names.get(i).cloned().flatten();
            let display = name.as_ref().map(|l| l.to_string()).unwrap_or_default();
            let na = self.na_for(self.index_col.get(i).copied(), &display);

            // NOTE: columns typed by the date converter are kept as they are.
            let raw = match raw {
                RawColumn::Text(tokens) if try_parse_dates && self.should_parse_dates(i) => {
                    self.converter().convert(&display, &[tokens], &na)?
                }
                raw => raw,
            };

            converted.push(infer_types(raw, &na, true, &self.literals).0);
        }

        Ok(Index::from_arrays(names, converted))
    }

    /// Read the next rows, `None` meaning the source is exhausted.
    pub(crate) fn read(&mut self, rows: Option<usize>) -> Result<Option<ParseResult>> {
        let content = self.get_lines(rows)?;

        if content.is_empty() {
            if self.state.first_chunk {
                self.state.first_chunk = false;
                return self.empty_result().map(Some);
            }

            return Ok(None);
        }

        self.state.first_chunk = false;

        let alldata = self.rows_to_cols(content);
        let len = alldata.first().map(Vec::len).unwrap_or(0);

        self.finish(alldata, len).map(Some)
    }

    fn finish(&mut self, mut alldata: Vec<Vec<String>>, len: usize) -> Result<ParseResult> {
        let mut index_arrays: Vec<RawColumn> = Vec::new();
        let mut index_names = self.index_names.clone().unwrap_or_default();

        if self.implicit_index {
            let taken: Vec<usize> = self.index_col.clone();
            let mut sorted = taken.clone();
            sorted.sort_unstable();

            let mut removed: HashMap<usize, Vec<String>> = HashMap::new();

            for p in sorted.iter().rev() {
                if *p < alldata.len() {
                    removed.insert(*p, alldata.remove(*p));
                }
            }

            index_arrays = taken
                .iter()
                .filter_map(|p| removed.remove(p))
                .map(RawColumn::Text)
                .collect();
        }

        alldata.truncate(self.orig_names.len());

        let mut data: Vec<(Label, RawColumn)> = self
            .orig_names
            .iter()
            .cloned()
            .zip(alldata.into_iter().map(RawColumn::Text))
            .collect();

        let complex = self.has_complex_date_col();

        if !self.implicit_index && !complex && !self.index_col.is_empty() {
            let labels: Vec<Label> = self
                .index_col
                .iter()
                .map(|p| self.orig_names[*p].clone())
                .collect();

            for label in labels {
                if let Some(i) = data.iter().position(|(l, _)| *l == label) {
                    let (_, raw) = data.remove(i);
                    index_arrays.push(raw);
                }
            }
        }

        let index_labels: Vec<Label> = if complex {
            Vec::new()
        } else {
            self.index_col
                .iter()
                .filter_map(|p| self.orig_names.get(*p).cloned())
                .collect()
        };

        let na = self.na.clone();
        let orig_names = self.orig_names.clone();
        let is_index = |label: &Label| index_labels.contains(label);
        let ctx = DateContext {
            converter: self.converter(),
            orig_names: &orig_names,
            na: &na,
            keep_date_col: self.options.keep_date_col,
            is_index: &is_index,
        };

        let parse_dates = self.options.parse_dates.clone();
        let mut data = process_date_conversion(data, &parse_dates, &ctx)?;

        let mut try_parse_index_dates = true;

        if complex {
            let current: Vec<Label> = data.iter().map(|(l, _)| l.clone()).collect();
            let index_col = self.options.index_col.columns().to_vec();
            let (names, positions) = self.clean_index_names(&current, &index_col)?;

            index_names = names;

            let mut taken: Vec<(usize, RawColumn)> = Vec::new();
            let mut sorted = positions.clone();
            sorted.sort_unstable();

            for p in sorted.iter().rev() {
                taken.push((*p, data.remove(*p).1));
            }

            for p in &positions {
                if let Some(i) = taken.iter().position(|(q, _)| q == p) {
                    index_arrays.push(taken.remove(i).1);
                }
            }

            try_parse_index_dates = false;
        }

        let mut columns = Vec::with_capacity(data.len());
        let mut converted = Vec::with_capacity(data.len());

        for (label, raw) in data {
            converted.push(self.convert_column(&label, raw)?);
            columns.push(label);
        }

        let index = if index_arrays.is_empty() {
            Index::Range {
                start: 0,
                stop: len,
            }
        } else {
            index_names.resize(index_arrays.len(), None);
            self.convert_index(index_arrays, index_names, try_parse_index_dates)?
        };

        Ok(ParseResult {
            index,
            columns,
            data: converted,
            column_level_names: self.column_level_names.clone(),
        })
    }

    /// A zero-row result with every expected column.
    pub(crate) fn empty_result(&self) -> Result<ParseResult> {
        let dtype_of = |position: usize, name: &str| {
            self.options
                .dtype_for(position, name)
                .cloned()
                .unwrap_or(Dtype::Object)
        };

        let index = if self.index_col.is_empty() {
            Index::Range { start: 0, stop: 0 }
        } else {
            let names = self
                .index_names
                .clone()
                .unwrap_or_else(|| vec![None; self.index_col.len()]);

            let arrays = self
                .index_col
                .iter()
                .zip(names.iter())
                .map(|(p, name)| {
                    let name = name.as_ref().map(|l| l.to_string()).unwrap_or_default();
                    Column::empty(&dtype_of(*p, &name))
                })
                .collect();

            Index::from_arrays(names, arrays)
        };

        let columns = self.column_names();
        let data = columns
            .iter()
            .map(|label| {
                let position = self
                    .orig_names
                    .iter()
                    .position(|l| l == label)
                    .unwrap_or(usize::MAX);

                Column::empty(&dtype_of(position, &label.to_string()))
            })
            .collect();

        Ok(ParseResult {
            index,
            columns,
            data,
            column_level_names: self.column_level_names.clone(),
        })
    }
}

/// Record source over rows split beforehand.
#[derive(Debug)]
pub(crate) struct SplitRows {
    rows: std::vec::IntoIter<Vec<String>>,
    line: u64,
}

impl SplitRows {
    pub(crate) fn new(rows: Vec<Vec<String>>) -> Self {
        Self {
            rows: rows.into_iter(),
            line: 0,
        }
    }
}

impl RecordSource for SplitRows {
    fn next_record(&mut self) -> Result<Option<Row>> {
        Ok(self.rows.next().map(|fields| {
            self.line += 1;
            Row::new(self.line, fields)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Header;
    use crate::value::Value;

    fn rows(data: &[&[&str]]) -> SplitRows {
        SplitRows::new(
            data.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
    }

    fn base(data: &[&[&str]], options: ParseOptions) -> ParserBase<SplitRows> {
        let mut options = options;

        if options.header == Header::Infer {
            options.header = if options.names.is_some() {
                Header::None
            } else {
                Header::Row(0)
            };
        }

        let mut base = ParserBase::new(rows(data), options, true);
        base.initialize().unwrap();
        base
    }

    fn names(labels: &[Label]) -> Vec<String> {
        labels.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn test_dedup_names() {
        let (deduped, renamed) = dedup_names(vec!["A".into(), "A".into(), "A".into()]);
        assert_eq!(names(&deduped), vec!["A", "A.1", "A.2"]);
        assert_eq!(renamed.len(), 2);

        // A taken candidate is suffixed in turn
        let (deduped, _) = dedup_names(vec!["A".into(), "A.1".into(), "A".into()]);
        assert_eq!(names(&deduped), vec!["A", "A.1", "A.1.1"]);

        let (deduped, _) = dedup_names(vec![
            Label::Tuple(vec!["a".into(), "x".into()]),
            Label::Tuple(vec!["a".into(), "x".into()]),
        ]);
        assert_eq!(
            deduped[1],
            Label::Tuple(vec!["a".to_string(), "x.1".to_string()])
        );
    }

    #[test]
    fn test_header_and_widening() {
        let mut base = base(&[&["A", "B"], &["1", "2"], &["3", ""]], ParseOptions::default());
        let result = base.read(None).unwrap().unwrap();

        assert_eq!(names(&result.columns), vec!["A", "B"]);
        assert_eq!(result.get("A"), Some(&Column::Int64(vec![1, 3])));
        assert!(matches!(
            result.get("B"),
            Some(Column::Float64(v)) if v[0] == 2.0 && v[1].is_nan()
        ));
        assert_eq!(result.index, Index::Range { start: 0, stop: 2 });

        // Exhausted
        assert!(base.read(None).unwrap().is_none());
    }

    #[test]
    fn test_empty_first_read() {
        let mut base = base(&[&["A", "B"]], ParseOptions::default());
        let result = base.read(None).unwrap().unwrap();

        assert_eq!(names(&result.columns), vec!["A", "B"]);
        assert!(result.is_empty());
        assert!(base.read(None).unwrap().is_none());
    }

    #[test]
    fn test_no_columns() {
        let mut base = ParserBase::new(
            rows(&[]),
            ParseOptions {
                header: Header::Row(0),
                ..Default::default()
            },
            true,
        );

        let err = base.initialize().unwrap_err();
        assert_eq!(err.to_string(), "No columns to parse from file");
    }

    #[test]
    fn test_header_past_end() {
        let mut base = ParserBase::new(
            rows(&[&["a", "b"], &["1", "2"]]),
            ParseOptions {
                header: Header::Row(5),
                ..Default::default()
            },
            true,
        );

        let err = base.initialize().unwrap_err();
        assert_eq!(err.to_string(), "Passed header=5 but only 2 lines in file");
    }

    #[test]
    fn test_implicit_index() {
        let mut base = base(&[&["A", "B"], &["x", "1", "2"], &["y", "3", "4"]], ParseOptions::default());
        let result = base.read(None).unwrap().unwrap();

        assert_eq!(names(&result.columns), vec!["A", "B"]);
        assert_eq!(
            result.index,
            Index::Single {
                name: None,
                values: Column::Object(vec![Value::from("x"), Value::from("y")])
            }
        );
    }

    #[test]
    fn test_explicit_index() {
        let mut base = base(
            &[&["k", "v"], &["1", "a"], &["2", "b"]],
            ParseOptions {
                index_col: IndexCol::Columns(vec!["k".into()]),
                ..Default::default()
            },
        );
        let result = base.read(None).unwrap().unwrap();

        assert_eq!(names(&result.columns), vec!["v"]);
        assert_eq!(
            result.index,
            Index::Single {
                name: Some(Label::from("k")),
                values: Column::Int64(vec![1, 2])
            }
        );
    }

    #[test]
    fn test_bad_lines() {
        let data: &[&[&str]] = &[&["A", "B"], &["1", "2"], &["3", "4", "5"], &["6", "7"]];

        let mut base1 = base(data, ParseOptions::default());
        let err = base1.read(None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Error tokenizing data. Expected 2 fields in line 3, saw 3"
        );

        let mut base2 = base(
            data,
            ParseOptions {
                error_bad_lines: false,
                ..Default::default()
            },
        );
        let result = base2.read(None).unwrap().unwrap();
        assert_eq!(result.get("A"), Some(&Column::Int64(vec![1, 6])));
        assert_eq!(
            base2.warnings,
            vec![ParserWarning::BadLineSkipped {
                line: 3,
                expected: 2,
                actual: 3
            }]
        );
    }

    #[test]
    fn test_multi_index_header() {
        let mut base = base(
            &[
                &["", "a", "a"],
                &["", "x", "y"],
                &["1", "2", "3"],
            ],
            ParseOptions {
                header: Header::Rows(vec![0, 1]),
                index_col: IndexCol::Columns(vec![ColumnRef::Position(0)]),
                ..Default::default()
            },
        );
        let result = base.read(None).unwrap().unwrap();

        assert_eq!(
            result.columns,
            vec![
                Label::Tuple(vec!["a".into(), "x".into()]),
                Label::Tuple(vec!["a".into(), "y".into()])
            ]
        );
        assert_eq!(result.get("a"), None);
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_multi_index_too_many_rows() {
        let mut base = ParserBase::new(
            rows(&[&["a", "b"], &["", ""], &["1", "2"]]),
            ParseOptions {
                header: Header::Rows(vec![0, 1]),
                ..Default::default()
            },
            true,
        );

        let err = base.initialize().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Passed header=[0,1] are too many rows for this multi_index of columns"
        );
    }

    #[test]
    fn test_usecols() {
        let mut base1 = base(
            &[&["a", "b", "c"], &["1", "2", "3"]],
            ParseOptions {
                usecols: Some(UseCols::Names(vec!["c".into(), "a".into()])),
                ..Default::default()
            },
        );
        let result = base1.read(None).unwrap().unwrap();
        assert_eq!(names(&result.columns), vec!["a", "c"]);
        assert_eq!(result.get("c"), Some(&Column::Int64(vec![3])));

        let mut base2 = ParserBase::new(
            rows(&[&["a", "b"]]),
            ParseOptions {
                header: Header::Row(0),
                usecols: Some(UseCols::Names(vec!["z".into()])),
                ..Default::default()
            },
            true,
        );
        let err = base2.initialize().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Usecols do not match columns, columns expected but not found: ['z']"
        );
    }

    #[test]
    fn test_comments_blank_lines_and_skiprows() {
        let mut base = base(
            &[
                &["junk"],
                &["a", "b"],
                &["#", "whatever"],
                &[""],
                &["1", "2#3"],
            ],
            ParseOptions {
                comment: Some('#'),
                skiprows: crate::options::SkipRows::Count(1),
                ..Default::default()
            },
        );
        let result = base.read(None).unwrap().unwrap();

        assert_eq!(result.get("a"), Some(&Column::Int64(vec![1])));
        assert_eq!(result.get("b"), Some(&Column::Int64(vec![2])));
    }

    #[test]
    fn test_thousands_and_dates() {
        let mut base = base(
            &[&["n", "d"], &["1.000,5", "2020-01-01"]],
            ParseOptions {
                thousands: Some('.'),
                decimal: ',',
                parse_dates: ParseDates::Columns(vec![DateSpec::Single("d".into())]),
                ..Default::default()
            },
        );
        let result = base.read(None).unwrap().unwrap();

        assert_eq!(result.get("n"), Some(&Column::Float64(vec![1000.5])));
        assert!(matches!(result.get("d"), Some(Column::Datetime(_))));
    }

    #[test]
    fn test_combined_date_column_as_index() {
        let mut base = base(
            &[&["a", "b", "c"], &["2020-01-01", "10:00", "2"]],
            ParseOptions {
                parse_dates: ParseDates::Columns(vec![DateSpec::Combine(vec![0.into(), 1.into()])]),
                index_col: IndexCol::Columns(vec![0.into()]),
                ..Default::default()
            },
        );
        let result = base.read(None).unwrap().unwrap();

        let expected = chrono::NaiveDate::from_ymd_opt(2020, 1, 1)
            .and_then(|d| d.and_hms_opt(10, 0, 0))
            .unwrap();

        assert_eq!(
            result.index,
            Index::Single {
                name: Some(Label::name("a_b")),
                values: Column::Datetime(vec![Some(expected)]),
            }
        );
        assert_eq!(names(&result.columns), vec!["c"]);
        assert_eq!(result.get("c"), Some(&Column::Int64(vec![2])));
    }

    #[test]
    fn test_dtype_and_converters() {
        let mut options = ParseOptions {
            dtype: Some(crate::options::DtypeSpec::PerColumn(vec![
                ("a".into(), Dtype::Str),
                ("b".into(), Dtype::Bool),
            ])),
            ..Default::default()
        };
        options.converters.push((
            ColumnRef::Position(2),
            std::sync::Arc::new(|s: &str| Value::Int(s.len() as i64)),
        ));

        let mut base1 = base(&[&["a", "b", "c"], &["1", "True", "xyz"]], options.clone());
        let result = base1.read(None).unwrap().unwrap();

        assert_eq!(
            result.get("a"),
            Some(&Column::Str(vec![Some("1".to_string())]))
        );
        assert_eq!(result.get("b"), Some(&Column::Bool(vec![true])));
        assert_eq!(result.get("c"), Some(&Column::Int64(vec![3])));

        let mut base2 = base(&[&["a", "b", "c"], &["1", "", "xyz"]], options);
        let err = base2.read(None).unwrap_err();
        assert_eq!(err.to_string(), "Bool column has NA values in column b");
    }

    #[test]
    fn test_chunks() {
        let mut base = base(
            &[&["a"], &["1"], &["2"], &["3"]],
            ParseOptions::default(),
        );

        assert_eq!(base.read(Some(2)).unwrap().unwrap().len(), 2);
        assert_eq!(base.read(Some(2)).unwrap().unwrap().len(), 1);
        assert!(base.read(Some(2)).unwrap().is_none());
    }

    #[test]
    fn test_skipfooter() {
        let mut base = base(
            &[&["a"], &["1"], &["2"], &["footer", "x", "y"]],
            ParseOptions {
                skipfooter: 1,
                ..Default::default()
            },
        );

        let result = base.read(None).unwrap().unwrap();
        assert_eq!(result.get("a"), Some(&Column::Int64(vec![1, 2])));
    }
}
