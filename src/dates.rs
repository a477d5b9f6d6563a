//! Datetime parsing: user strategies, a default ISO-first converter and the
//! dispatch of date columns.
use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{Error, Result};
use crate::infer::RawColumn;
use crate::na::{NaSpec, NaTable};
use crate::options::{ColumnRef, DateSpec, ParseDates};
use crate::value::{Column, Label, Value};

const DATETIME_ISO: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];
const DATE_ISO: [&str; 2] = ["%Y-%m-%d", "%Y%m%d"];

const DATETIME_M_D_Y: [&str; 4] = [
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
    "%m-%d-%Y %H:%M:%S%.f",
    "%m-%d-%Y %H:%M",
];
const DATETIME_D_M_Y: [&str; 6] = [
    "%d/%m/%Y %H:%M:%S%.f",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S%.f",
    "%d-%m-%Y %H:%M",
    "%d.%m.%Y %H:%M:%S%.f",
    "%d.%m.%Y %H:%M",
];
const DATETIME_OTHER: [&str; 4] = [
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    "%Y%m%d %H:%M:%S%.f",
    "%Y%m%d %H%M%S",
];

// NOTE: two-digit years must be tried first, "%Y" would happily read "20"
// as the year 20.
const DATE_M_D_Y: [&str; 5] = ["%m/%d/%y", "%m/%d/%Y", "%m-%d-%y", "%m-%d-%Y", "%m.%d.%Y"];
const DATE_D_M_Y: [&str; 5] = ["%d/%m/%y", "%d/%m/%Y", "%d-%m-%y", "%d-%m-%Y", "%d.%m.%Y"];
const DATE_OTHER: [&str; 7] = [
    "%Y/%m/%d",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d %Y",
    "%B %d %Y",
    "%b %d, %Y",
    "%B %d, %Y",
];

fn datetime_pattern(val: &str, dayfirst: bool) -> Option<NaiveDateTime> {
    let (first, second) = if dayfirst {
        (&DATETIME_D_M_Y[..], &DATETIME_M_D_Y[..])
    } else {
        (&DATETIME_M_D_Y[..], &DATETIME_D_M_Y[..])
    };

    first
        .iter()
        .chain(second)
        .chain(DATETIME_OTHER.iter())
        .find_map(|fmt| NaiveDateTime::parse_from_str(val, fmt).ok())
}

fn date_pattern(val: &str, dayfirst: bool) -> Option<NaiveDate> {
    let (first, second) = if dayfirst {
        (&DATE_D_M_Y[..], &DATE_M_D_Y[..])
    } else {
        (&DATE_M_D_Y[..], &DATE_D_M_Y[..])
    };

    first
        .iter()
        .chain(second)
        .chain(DATE_OTHER.iter())
        .find_map(|fmt| NaiveDate::parse_from_str(val, fmt).ok())
}

/// Parse a single datetime the way the default converter does: ISO layouts
/// first, then the usual day/month orders, `dayfirst` deciding which of them
/// is preferred for ambiguous values.
pub fn parse_datetime(val: &str, dayfirst: bool) -> Option<NaiveDateTime> {
    let val = val.trim();

    if val.is_empty() {
        return None;
    }

    // NOTE: "%Y" accepts short years, so the ISO layouts are only tried on
    // values starting with four digits.
    let iso = val.len() >= 8 && val.as_bytes()[..4].iter().all(u8::is_ascii_digit);

    let parsed_iso = if iso {
        DATETIME_ISO
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(val, fmt).ok())
            .or_else(|| {
                DATE_ISO
                    .iter()
                    .find_map(|fmt| NaiveDate::parse_from_str(val, fmt).ok())
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
    } else {
        None
    };

    parsed_iso
        .or_else(|| datetime_pattern(val, dayfirst))
        .or_else(|| date_pattern(val, dayfirst).and_then(|d| d.and_hms_opt(0, 0, 0)))
}

pub type ColumnsFn = Arc<
    dyn Fn(&[Vec<String>]) -> std::result::Result<Vec<Option<NaiveDateTime>>, String>
        + Send
        + Sync,
>;
pub type StringFn = Arc<dyn Fn(&str) -> std::result::Result<NaiveDateTime, String> + Send + Sync>;
pub type FieldsFn =
    Arc<dyn Fn(&[&str]) -> std::result::Result<NaiveDateTime, String> + Send + Sync>;

/// One calling convention of a user date parser.
#[derive(Clone)]
pub enum DateStrategy {
    /// Called once with every source column.
    Columns(ColumnsFn),
    /// Called once per row with the source fields joined by a space.
    Joined(StringFn),
    /// Called once per row with the source fields.
    Fields(FieldsFn),
}

/// A user date parser, as an ordered list of strategies. The first one to
/// succeed on a whole column wins.
#[derive(Clone, Default)]
pub struct DateParser {
    strategies: Vec<DateStrategy>,
}

impl fmt::Debug for DateParser {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("DateParser")
            .field("strategies", &self.strategies.len())
            .finish()
    }
}

impl DateParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse every value with a single `chrono` format string.
    pub fn from_format(format: &str) -> Self {
        let format = format.to_string();

        Self::new().joined(move |s| {
            NaiveDateTime::parse_from_str(s, &format)
                .or_else(|_| {
                    NaiveDate::parse_from_str(s, &format)
                        .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default())
                })
                .map_err(|err| err.to_string())
        })
    }

    pub fn columns<F>(mut self, f: F) -> Self
    where
        F: Fn(&[Vec<String>]) -> std::result::Result<Vec<Option<NaiveDateTime>>, String>
            + Send
            + Sync
            + 'static,
    {
        self.strategies.push(DateStrategy::Columns(Arc::new(f)));
        self
    }

    pub fn joined<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> std::result::Result<NaiveDateTime, String> + Send + Sync + 'static,
    {
        self.strategies.push(DateStrategy::Joined(Arc::new(f)));
        self
    }

    pub fn fields<F>(mut self, f: F) -> Self
    where
        F: Fn(&[&str]) -> std::result::Result<NaiveDateTime, String> + Send + Sync + 'static,
    {
        self.strategies.push(DateStrategy::Fields(Arc::new(f)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    fn apply(
        strategy: &DateStrategy,
        columns: &[Vec<String>],
        na: &NaSpec,
    ) -> std::result::Result<Vec<Option<NaiveDateTime>>, String> {
        let len = columns.first().map(Vec::len).unwrap_or(0);

        if let DateStrategy::Columns(f) = strategy {
            let parsed = f(columns)?;

            if parsed.len() != len {
                return Err(format!("expected {} values, got {}", len, parsed.len()));
            }

            return Ok(parsed);
        }

        let mut parsed = Vec::with_capacity(len);

        for i in 0..len {
            let fields: Vec<&str> = columns.iter().map(|c| c[i].as_str()).collect();

            if fields.iter().all(|f| na.matches(f)) {
                parsed.push(None);
                continue;
            }

            parsed.push(Some(match strategy {
                DateStrategy::Joined(f) => f(&fields.join(" "))?,
                DateStrategy::Fields(f) => f(&fields)?,
                DateStrategy::Columns(_) => unreachable!(),
            }));
        }

        Ok(parsed)
    }

    /// Try every strategy in order, returning the error of the last one when
    /// they all fail.
    pub(crate) fn parse(
        &self,
        columns: &[Vec<String>],
        na: &NaSpec,
    ) -> std::result::Result<Vec<Option<NaiveDateTime>>, String> {
        let mut last_error = "no date parsing strategy".to_string();

        for strategy in &self.strategies {
            match Self::apply(strategy, columns, na) {
                Ok(parsed) => return Ok(parsed),
                Err(reason) => last_error = reason,
            }
        }

        Err(last_error)
    }
}

/// Turns raw date columns into datetime columns.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DateConverter<'a> {
    pub parser: Option<&'a DateParser>,
    pub dayfirst: bool,
}

impl DateConverter<'_> {
    /// Convert one or several (concatenated) columns.
    ///
    /// The default converter leaves values untouched when some of them are not
    /// dates, a user parser failing with every strategy is an error.
    pub(crate) fn convert(
        &self,
        name: &str,
        columns: &[Vec<String>],
        na: &NaSpec,
    ) -> Result<RawColumn> {
        if let Some(parser) = self.parser {
            return parser
                .parse(columns, na)
                .map(|parsed| RawColumn::Typed(Column::Datetime(parsed)))
                .map_err(|reason| {
                    Error::parser(format!("Unable to parse dates in column {}: {}", name, reason))
                });
        }

        let joined: Vec<String> = if columns.len() == 1 {
            columns[0].clone()
        } else {
            let len = columns.first().map(Vec::len).unwrap_or(0);

            (0..len)
                .map(|i| {
                    columns
                        .iter()
                        .map(|c| c[i].as_str())
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .collect()
        };

        let mut parsed = Vec::with_capacity(joined.len());

        for token in joined.iter() {
            if na.matches(token) || token.trim().is_empty() {
                parsed.push(None);
                continue;
            }

            match parse_datetime(token, self.dayfirst) {
                Some(d) => parsed.push(Some(d)),
                None => {
                    tracing::debug!(column = name, value = token.as_str(), "not a date");
                    return Ok(RawColumn::Text(joined));
                }
            }
        }

        Ok(RawColumn::Typed(Column::Datetime(parsed)))
    }
}

/// Raw strings of a column, as handed to date parsers.
pub(crate) fn raw_strings(raw: &RawColumn) -> Vec<String> {
    let show = |v: Value| if v.is_na() { String::new() } else { v.to_string() };

    match raw {
        RawColumn::Text(tokens) => tokens.clone(),
        RawColumn::Values(values) => values.iter().cloned().map(show).collect(),
        RawColumn::Typed(column) => column.iter().map(show).collect(),
    }
}

fn label_of(col: &ColumnRef, orig_names: &[Label]) -> Label {
    match col {
        ColumnRef::Name(name) => Label::Name(name.clone()),
        ColumnRef::Position(i) => orig_names
            .get(*i)
            .cloned()
            .unwrap_or_else(|| Label::Name(i.to_string())),
    }
}

fn position(data: &[(Label, RawColumn)], label: &Label) -> Option<usize> {
    data.iter().position(|(l, _)| l == label)
}

/// Context of [`process_date_conversion`].
pub(crate) struct DateContext<'a> {
    pub converter: DateConverter<'a>,
    pub orig_names: &'a [Label],
    pub na: &'a NaTable,
    pub keep_date_col: bool,
    /// Whether the referenced column was taken as index.
    pub is_index: &'a dyn Fn(&Label) -> bool,
}

fn combine(
    ctx: &DateContext,
    data: &[(Label, RawColumn)],
    cols: &[ColumnRef],
) -> Result<(String, RawColumn, Vec<Label>)> {
    let labels: Vec<Label> = cols.iter().map(|c| label_of(c, ctx.orig_names)).collect();
    let new_name = labels
        .iter()
        .map(|l| l.to_string())
        .collect::<Vec<_>>()
        .join("_");

    let mut sources = Vec::with_capacity(labels.len());

    for label in &labels {
        match position(data, label) {
            Some(i) => sources.push(raw_strings(&data[i].1)),
            None if (ctx.is_index)(label) => continue,
            None => {
                return Err(Error::invalid(format!(
                    "Missing column provided to 'parse_dates': '{}'",
                    label
                )))
            }
        }
    }

    let na = ctx.na.for_column(None, &new_name);
    let column = ctx.converter.convert(&new_name, &sources, &na)?;

    Ok((new_name, column, labels))
}

/// Apply the `parse_dates` directives to the data columns.
///
/// Single columns are parsed in place. Combined columns are prepended under
/// their new name and, unless `keep_date_col`, their sources are dropped.
pub(crate) fn process_date_conversion(
    mut data: Vec<(Label, RawColumn)>,
    spec: &ParseDates,
    ctx: &DateContext,
) -> Result<Vec<(Label, RawColumn)>> {
    let mut new_columns: Vec<(Label, RawColumn)> = Vec::new();
    let mut date_cols: Vec<Label> = Vec::new();

    match spec {
        ParseDates::False | ParseDates::True => return Ok(data),
        ParseDates::Columns(specs) => {
            for date_spec in specs {
                match date_spec {
                    DateSpec::Single(col) => {
                        let label = label_of(col, ctx.orig_names);

                        let i = match position(&data, &label) {
                            Some(i) => i,
                            None if (ctx.is_index)(&label) => continue,
                            None => {
                                return Err(Error::invalid(format!(
                                    "Missing column provided to 'parse_dates': '{}'",
                                    label
                                )))
                            }
                        };

                        let name = label.to_string();
                        let na = ctx.na.for_column(Some(i), &name);
                        let sources = [raw_strings(&data[i].1)];

                        data[i].1 = ctx.converter.convert(&name, &sources, &na)?;
                    }
                    DateSpec::Combine(cols) => {
                        let (new_name, column, labels) = combine(ctx, &data, cols)?;
                        let label = Label::Name(new_name.clone());

                        if position(&data, &label).is_some() {
                            return Err(Error::invalid(format!(
                                "New date column already in dict {}",
                                new_name
                            )));
                        }

                        new_columns.push((label, column));
                        date_cols.extend(labels);
                    }
                }
            }
        }
        ParseDates::Named(entries) => {
            for (new_name, cols) in entries {
                let label = Label::Name(new_name.clone());

                if position(&data, &label).is_some() {
                    return Err(Error::invalid(format!(
                        "Date column {} already in dict",
                        new_name
                    )));
                }

                let (_, column, labels) = combine(ctx, &data, cols)?;

                new_columns.push((label, column));
                date_cols.extend(labels);
            }
        }
    }

    if !ctx.keep_date_col {
        data.retain(|(label, _)| !date_cols.contains(label));
    }

    new_columns.extend(data);

    Ok(new_columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_datetime() {
        assert_eq!(parse_datetime("2020-01-02", false), Some(dt(2020, 1, 2)));
        assert_eq!(parse_datetime("20200102", false), Some(dt(2020, 1, 2)));
        assert_eq!(parse_datetime("01/02/2020", false), Some(dt(2020, 1, 2)));
        assert_eq!(parse_datetime("01/02/2020", true), Some(dt(2020, 2, 1)));
        assert_eq!(parse_datetime("13/01/2020", false), Some(dt(2020, 1, 13)));
        assert_eq!(parse_datetime("01/02/20", false), Some(dt(2020, 1, 2)));
        assert_eq!(parse_datetime("5 Mar 2021", false), Some(dt(2021, 3, 5)));
        assert_eq!(
            parse_datetime("2020-01-02 10:30:00", false),
            dt(2020, 1, 2).with_hour_min(10, 30)
        );
        assert_eq!(parse_datetime("hello", false), None);
    }

    trait WithHourMin {
        fn with_hour_min(self, h: u32, m: u32) -> Option<NaiveDateTime>;
    }

    impl WithHourMin for NaiveDateTime {
        fn with_hour_min(self, h: u32, m: u32) -> Option<NaiveDateTime> {
            self.date().and_hms_opt(h, m, 0)
        }
    }

    #[test]
    fn test_default_converter() {
        let converter = DateConverter {
            parser: None,
            dayfirst: false,
        };

        let column = converter
            .convert("d", &[strings(&["2020-01-01", ""])], &NaSpec::defaults())
            .unwrap();
        assert_eq!(
            column,
            RawColumn::Typed(Column::Datetime(vec![Some(dt(2020, 1, 1)), None]))
        );

        let column = converter
            .convert("d", &[strings(&["2020-01-01", "nope"])], &NaSpec::defaults())
            .unwrap();
        assert_eq!(column, RawColumn::Text(strings(&["2020-01-01", "nope"])));

        let column = converter
            .convert(
                "d_t",
                &[strings(&["2020-01-01"]), strings(&["10:00"])],
                &NaSpec::defaults(),
            )
            .unwrap();
        assert_eq!(
            column,
            RawColumn::Typed(Column::Datetime(vec![dt(2020, 1, 1).with_hour_min(10, 0)]))
        );
    }

    #[test]
    fn test_strategies_order() {
        let parser = DateParser::new()
            .columns(|_| Err("not vectorized".to_string()))
            .fields(|fields| {
                let year: i32 = fields[0].parse().map_err(|_| "bad year".to_string())?;
                Ok(dt(year, 1, 1))
            });

        let parsed = parser
            .parse(&[strings(&["2001", ""])], &NaSpec::defaults())
            .unwrap();
        assert_eq!(parsed, vec![Some(dt(2001, 1, 1)), None]);

        let err = parser
            .parse(&[strings(&["x"])], &NaSpec::defaults())
            .unwrap_err();
        assert_eq!(err, "bad year");

        let converter = DateConverter {
            parser: Some(&parser),
            dayfirst: false,
        };
        assert!(converter
            .convert("y", &[strings(&["x"])], &NaSpec::defaults())
            .is_err());
    }

    #[test]
    fn test_from_format() {
        let parser = DateParser::from_format("%d|%m|%Y");
        let parsed = parser
            .parse(&[strings(&["03|04|2005"])], &NaSpec::none())
            .unwrap();

        assert_eq!(parsed, vec![Some(dt(2005, 4, 3))]);
    }

    #[test]
    fn test_process_date_conversion() {
        let orig_names = vec![Label::from("date"), Label::from("time"), Label::from("v")];
        let data = vec![
            (Label::from("date"), RawColumn::Text(strings(&["2020-01-01"]))),
            (Label::from("time"), RawColumn::Text(strings(&["12:00"]))),
            (Label::from("v"), RawColumn::Text(strings(&["1"]))),
        ];

        let na = NaTable::new(None, true);
        let no_index = |_: &Label| false;
        let mut ctx = DateContext {
            converter: DateConverter {
                parser: None,
                dayfirst: false,
            },
            orig_names: &orig_names,
            na: &na,
            keep_date_col: false,
            is_index: &no_index,
        };

        let spec = ParseDates::Columns(vec![DateSpec::Combine(vec![ColumnRef::Position(0), "time".into()])]);
        let converted = process_date_conversion(data.clone(), &spec, &ctx).unwrap();

        let labels: Vec<String> = converted.iter().map(|(l, _)| l.to_string()).collect();
        assert_eq!(labels, vec!["date_time", "v"]);
        assert_eq!(
            converted[0].1,
            RawColumn::Typed(Column::Datetime(vec![dt(2020, 1, 1).with_hour_min(12, 0)]))
        );

        ctx.keep_date_col = true;
        let converted = process_date_conversion(data.clone(), &spec, &ctx).unwrap();
        assert_eq!(converted.len(), 4);

        let spec = ParseDates::Named(vec![("v".to_string(), vec![ColumnRef::Position(0)])]);
        let err = process_date_conversion(data.clone(), &spec, &ctx).unwrap_err();
        assert_eq!(err.to_string(), "Date column v already in dict");

        let spec = ParseDates::Columns(vec![DateSpec::Single("date".into())]);
        let converted = process_date_conversion(data, &spec, &ctx).unwrap();
        assert_eq!(
            converted[0].1,
            RawColumn::Typed(Column::Datetime(vec![Some(dt(2020, 1, 1))]))
        );
    }
}
