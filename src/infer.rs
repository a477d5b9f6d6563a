//! Value type inference & casting shared by every engine.
use std::collections::BTreeSet;

use crate::dates;
use crate::error::{Error, ErrorKind, Result};
use crate::na::NaSpec;
use crate::value::{Column, Dtype, Value};

const DEFAULT_TRUE_VALUES: [&str; 3] = ["True", "TRUE", "true"];
const DEFAULT_FALSE_VALUES: [&str; 3] = ["False", "FALSE", "false"];

/// Raw content of a column, before inference.
#[derive(Debug, Clone, PartialEq)]
pub enum RawColumn {
    /// Tokens, as read.
    Text(Vec<String>),
    /// Output of a converter.
    Values(Vec<Value>),
    /// Already typed, e.g. by the date converter.
    Typed(Column),
}

/// Literals recognized as booleans, on top of `True`/`False` spellings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoolLiterals {
    true_values: Vec<String>,
    false_values: Vec<String>,
}

impl Default for BoolLiterals {
    fn default() -> Self {
        Self::new(&[], &[])
    }
}

impl BoolLiterals {
    pub fn new(true_values: &[String], false_values: &[String]) -> Self {
        let mut t: Vec<String> = DEFAULT_TRUE_VALUES.iter().map(|s| s.to_string()).collect();
        let mut f: Vec<String> = DEFAULT_FALSE_VALUES.iter().map(|s| s.to_string()).collect();

        t.extend(true_values.iter().cloned());
        f.extend(false_values.iter().cloned());

        Self {
            true_values: t,
            false_values: f,
        }
    }

    #[inline]
    pub fn parse(&self, token: &str) -> Option<bool> {
        if self.true_values.iter().any(|t| t == token) {
            Some(true)
        } else if self.false_values.iter().any(|f| f == token) {
            Some(false)
        } else {
            None
        }
    }
}

/// Outcome of numeric coercion of a single token.
enum Numeric {
    Int(i64),
    Float(f64),
}

#[inline]
fn parse_numeric(token: &str) -> Option<Numeric> {
    let trimmed = token.trim();

    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(Numeric::Int(i));
    }

    trimmed.parse::<f64>().ok().map(Numeric::Float)
}

fn convert_numeric(tokens: &[String], na: &NaSpec) -> Option<(Column, usize)> {
    let mut ints: Vec<i64> = Vec::with_capacity(tokens.len());
    let mut floats: Vec<f64> = Vec::with_capacity(tokens.len());
    let mut all_ints = true;
    let mut na_count: usize = 0;

    for token in tokens {
        if na.strings.contains(token.as_str()) {
            na_count += 1;
            all_ints = false;
            floats.push(f64::NAN);
            continue;
        }

        match parse_numeric(token)? {
            Numeric::Int(i) => {
                if na.matches_float(i as f64) {
                    na_count += 1;
                    all_ints = false;
                    floats.push(f64::NAN);
                } else {
                    ints.push(i);
                    floats.push(i as f64);
                }
            }
            Numeric::Float(x) => {
                all_ints = false;

                if x.is_nan() || na.matches_float(x) {
                    na_count += 1;
                    floats.push(f64::NAN);
                } else {
                    floats.push(x);
                }
            }
        }
    }

    if all_ints {
        Some((Column::Int64(ints), 0))
    } else {
        Some((Column::Float64(floats), na_count))
    }
}

fn sanitize_objects(values: Vec<Value>, na: &NaSpec) -> (Vec<Value>, usize) {
    let mut na_count: usize = 0;

    let values = values
        .into_iter()
        .map(|value| {
            let missing = match &value {
                Value::Na => true,
                Value::Str(s) => na.strings.contains(s.as_str()),
                Value::Float(x) => x.is_nan() || na.matches_float(*x),
                Value::Int(i) => na.matches_float(*i as f64),
                _ => false,
            };

            if missing {
                na_count += 1;
                Value::Na
            } else {
                value
            }
        })
        .collect();

    (values, na_count)
}

fn convert_bool(values: &[Value], literals: &BoolLiterals) -> Option<Column> {
    let mut bools: Vec<Value> = Vec::with_capacity(values.len());
    let mut saw_na = false;

    for value in values {
        match value {
            Value::Na => {
                saw_na = true;
                bools.push(Value::Na);
            }
            Value::Bool(b) => bools.push(Value::Bool(*b)),
            Value::Str(s) => bools.push(Value::Bool(literals.parse(s)?)),
            _ => return None,
        }
    }

    if saw_na {
        Some(Column::Object(bools))
    } else {
        Some(Column::Bool(
            bools
                .into_iter()
                .map(|v| matches!(v, Value::Bool(true)))
                .collect(),
        ))
    }
}

/// Narrow converter outputs to a typed column when they are homogeneous.
fn values_to_column(values: Vec<Value>) -> Column {
    if values.iter().all(|v| matches!(v, Value::Int(_))) && !values.is_empty() {
        return Column::Int64(
            values
                .into_iter()
                .map(|v| if let Value::Int(i) = v { i } else { 0 })
                .collect(),
        );
    }

    if !values.is_empty()
        && values
            .iter()
            .all(|v| matches!(v, Value::Int(_) | Value::Float(_) | Value::Na))
        && values.iter().any(|v| !matches!(v, Value::Na))
    {
        return Column::Float64(
            values
                .into_iter()
                .map(|v| match v {
                    Value::Int(i) => i as f64,
                    Value::Float(x) => x,
                    _ => f64::NAN,
                })
                .collect(),
        );
    }

    if !values.is_empty() && values.iter().all(|v| matches!(v, Value::Bool(_))) {
        return Column::Bool(values.into_iter().map(|v| v == Value::Bool(true)).collect());
    }

    Column::Object(values)
}

fn mask_typed(column: Column, na: &NaSpec) -> (Column, usize) {
    match column {
        Column::Int64(ints) => {
            let na_count = ints.iter().filter(|i| na.matches_float(**i as f64)).count();

            if na_count == 0 {
                return (Column::Int64(ints), 0);
            }

            let floats = ints
                .into_iter()
                .map(|i| {
                    let x = i as f64;
                    if na.matches_float(x) {
                        f64::NAN
                    } else {
                        x
                    }
                })
                .collect();

            (Column::Float64(floats), na_count)
        }
        Column::Float64(floats) => {
            let mut na_count = 0;
            let floats = floats
                .into_iter()
                .map(|x| {
                    if x.is_nan() || na.matches_float(x) {
                        na_count += 1;
                        f64::NAN
                    } else {
                        x
                    }
                })
                .collect();

            (Column::Float64(floats), na_count)
        }
        Column::Bool(bools) => {
            let masked: Vec<bool> = bools
                .iter()
                .map(|b| na.matches_float(if *b { 1.0 } else { 0.0 }))
                .collect();
            let na_count = masked.iter().filter(|m| **m).count();

            if na_count == 0 {
                return (Column::Bool(bools), 0);
            }

            let values = bools
                .into_iter()
                .zip(masked)
                .map(|(b, m)| if m { Value::Na } else { Value::Bool(b) })
                .collect();

            (Column::Object(values), na_count)
        }
        Column::Object(values) => {
            let (values, na_count) = sanitize_objects(values, na);
            (Column::Object(values), na_count)
        }
        other => {
            let na_count = other.na_count();
            (other, na_count)
        }
    }
}

/// Infer the type of a raw column.
///
/// Numeric and boolean sources are masked against the numeric markers and an
/// integer column holding missing values is widened to floats. Text is first
/// coerced to numbers, then, when it stayed text, to booleans. Returns the
/// typed column and its number of missing values.
pub fn infer_types(
    raw: RawColumn,
    na: &NaSpec,
    try_num_bool: bool,
    literals: &BoolLiterals,
) -> (Column, usize) {
    match raw {
        RawColumn::Typed(column) => mask_typed(column, na),
        RawColumn::Values(values) => match values_to_column(values) {
            Column::Object(values) => {
                let (values, na_count) = sanitize_objects(values, na);
                (Column::Object(values), na_count)
            }
            column => mask_typed(column, na),
        },
        RawColumn::Text(tokens) => {
            if try_num_bool {
                if let Some(result) = convert_numeric(&tokens, na) {
                    return result;
                }
            }

            let values: Vec<Value> = tokens.into_iter().map(Value::Str).collect();
            let (values, na_count) = sanitize_objects(values, na);

            if try_num_bool && !values.is_empty() {
                if let Some(column) = convert_bool(&values, literals) {
                    return (column, na_count);
                }
            }

            (Column::Object(values), na_count)
        }
    }
}

fn cast_error(column: &str, dtype: &Dtype, reason: Option<String>) -> Error {
    Error::new(ErrorKind::Cast {
        column: column.to_string(),
        dtype: dtype.to_string(),
        reason,
    })
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Na => None,
        Value::Float(x) if x.is_nan() => None,
        v => Some(v.to_string()),
    }
}

fn column_strings(column: &Column) -> Vec<Option<String>> {
    column.iter().map(|v| value_to_string(&v)).collect()
}

fn to_categorical(column: &Column, known: Option<&Vec<String>>) -> Column {
    let strings = column_strings(column);

    let categories: Vec<String> = match known {
        Some(categories) => categories.clone(),
        None => strings
            .iter()
            .flatten()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect(),
    };

    let codes = strings
        .iter()
        .map(|s| match s {
            None => -1,
            Some(s) => categories
                .iter()
                .position(|c| c == s)
                .map(|p| p as i32)
                .unwrap_or(-1),
        })
        .collect();

    Column::Categorical { categories, codes }
}

/// Cast an inferred column to an explicitly requested type.
///
/// Failures name the offending column.
pub fn cast_types(column: Column, dtype: &Dtype, name: &str) -> Result<Column> {
    if column.dtype() == *dtype && !matches!(dtype, Dtype::Extension(_)) {
        return Ok(column);
    }

    let fail = |reason: Option<String>| cast_error(name, dtype, reason);

    Ok(match dtype {
        Dtype::Categorical(known) => to_categorical(&column, known.as_ref()),
        Dtype::Extension(ext) => {
            let strings = column_strings(&column);

            match ext.from_sequence_of_strings(&strings) {
                None => {
                    return Err(Error::new(ErrorKind::Unsupported(format!(
                        "Extension Array: {} must implement _from_sequence_of_strings in order to be used in parser methods",
                        ext.name()
                    ))))
                }
                Some(Err(reason)) => return Err(fail(Some(reason))),
                Some(Ok(column)) => column,
            }
        }
        Dtype::Object => Column::Object(column.iter().collect()),
        Dtype::Str => Column::Str(column_strings(&column)),
        Dtype::Int64 => {
            let mut ints = Vec::with_capacity(column.len());

            for value in column.iter() {
                let i = match value {
                    Value::Int(i) => i,
                    Value::Bool(b) => b as i64,
                    Value::Float(x) if x.is_finite() => x.trunc() as i64,
                    Value::Str(s) => s.trim().parse::<i64>().map_err(|_| fail(None))?,
                    Value::Na | Value::Float(_) => {
                        return Err(fail(Some(
                            "Cannot convert non-finite values (NA or inf) to integer".to_string(),
                        )))
                    }
                    Value::Datetime(_) => return Err(fail(None)),
                };

                ints.push(i);
            }

            Column::Int64(ints)
        }
        Dtype::Float64 => {
            let mut floats = Vec::with_capacity(column.len());

            for value in column.iter() {
                floats.push(match value {
                    Value::Int(i) => i as f64,
                    Value::Bool(b) => b as u8 as f64,
                    Value::Float(x) => x,
                    Value::Na => f64::NAN,
                    Value::Str(s) => s.trim().parse::<f64>().map_err(|_| fail(None))?,
                    Value::Datetime(_) => return Err(fail(None)),
                });
            }

            Column::Float64(floats)
        }
        Dtype::Bool => {
            let mut bools = Vec::with_capacity(column.len());

            for value in column.iter() {
                bools.push(match value {
                    Value::Bool(b) => b,
                    Value::Int(i) => i != 0,
                    Value::Float(x) => x != 0.0,
                    Value::Str(s) => !s.is_empty(),
                    Value::Na | Value::Datetime(_) => return Err(fail(None)),
                });
            }

            Column::Bool(bools)
        }
        Dtype::Datetime => {
            let mut datetimes = Vec::with_capacity(column.len());

            for value in column.iter() {
                datetimes.push(match value {
                    Value::Na => None,
                    Value::Datetime(d) => Some(d),
                    Value::Str(s) => Some(dates::parse_datetime(&s, false).ok_or_else(|| fail(None))?),
                    _ => return Err(fail(None)),
                });
            }

            Column::Datetime(datetimes)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ExtensionType;

    fn text(tokens: &[&str]) -> RawColumn {
        RawColumn::Text(tokens.iter().map(|s| s.to_string()).collect())
    }

    fn infer(tokens: &[&str]) -> (Column, usize) {
        infer_types(text(tokens), &NaSpec::defaults(), true, &BoolLiterals::default())
    }

    #[test]
    fn test_int_with_na_is_widened() {
        let (column, na_count) = infer(&["1", "2", ""]);

        assert_eq!(na_count, 1);

        match column {
            Column::Float64(v) => {
                assert_eq!(&v[..2], &[1.0, 2.0]);
                assert!(v[2].is_nan());
            }
            other => panic!("expected floats, got {:?}", other),
        }

        assert_eq!(infer(&["1", "2", "3"]), (Column::Int64(vec![1, 2, 3]), 0));
    }

    #[test]
    fn test_floats_and_strings() {
        assert_eq!(infer(&["1.5", " 2 "]), (Column::Float64(vec![1.5, 2.0]), 0));

        assert_eq!(
            infer(&["a", "NA", "b"]),
            (
                Column::Object(vec![Value::from("a"), Value::Na, Value::from("b")]),
                1
            )
        );
    }

    #[test]
    fn test_bools() {
        assert_eq!(
            infer(&["True", "false", "TRUE"]),
            (Column::Bool(vec![true, false, true]), 0)
        );

        assert_eq!(
            infer(&["True", "", "False"]),
            (
                Column::Object(vec![Value::Bool(true), Value::Na, Value::Bool(false)]),
                1
            )
        );

        let literals = BoolLiterals::new(&["yes".to_string()], &["no".to_string()]);
        assert_eq!(
            infer_types(text(&["yes", "no"]), &NaSpec::defaults(), true, &literals),
            (Column::Bool(vec![true, false]), 0)
        );
    }

    #[test]
    fn test_no_inference() {
        let (column, na_count) =
            infer_types(text(&["1", ""]), &NaSpec::defaults(), false, &BoolLiterals::default());

        assert_eq!(column, Column::Object(vec![Value::from("1"), Value::Na]));
        assert_eq!(na_count, 1);
    }

    #[test]
    fn test_typed_masking() {
        let na = NaSpec {
            floats: vec![-1.0],
            ..Default::default()
        };

        let (column, na_count) = infer_types(
            RawColumn::Values(vec![Value::Int(3), Value::Int(-1)]),
            &na,
            false,
            &BoolLiterals::default(),
        );

        assert_eq!(na_count, 1);
        assert!(matches!(column, Column::Float64(ref v) if v[0] == 3.0 && v[1].is_nan()));
    }

    #[test]
    fn test_cast_types() {
        assert_eq!(
            cast_types(Column::Int64(vec![1, 2]), &Dtype::Float64, "a").unwrap(),
            Column::Float64(vec![1.0, 2.0])
        );

        assert_eq!(
            cast_types(Column::Int64(vec![1, 2]), &Dtype::Str, "a").unwrap(),
            Column::Str(vec![Some("1".to_string()), Some("2".to_string())])
        );

        let err = cast_types(
            Column::Object(vec![Value::from("x")]),
            &Dtype::Int64,
            "col",
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Unable to convert column col to type int64");

        let err = cast_types(Column::Float64(vec![f64::NAN]), &Dtype::Int64, "b").unwrap_err();
        assert!(err.to_string().contains("non-finite"));
    }

    #[test]
    fn test_categorical() {
        let column = Column::Object(vec![Value::from("b"), Value::Na, Value::from("a")]);

        assert_eq!(
            cast_types(column.clone(), &Dtype::Categorical(None), "c").unwrap(),
            Column::Categorical {
                categories: vec!["a".to_string(), "b".to_string()],
                codes: vec![1, -1, 0]
            }
        );

        assert_eq!(
            cast_types(column, &Dtype::Categorical(Some(vec!["b".to_string()])), "c").unwrap(),
            Column::Categorical {
                categories: vec!["b".to_string()],
                codes: vec![0, -1, -1]
            }
        );
    }

    #[derive(Debug)]
    struct Opaque;

    impl ExtensionType for Opaque {
        fn name(&self) -> &str {
            "opaque"
        }
    }

    #[derive(Debug)]
    struct Upper;

    impl ExtensionType for Upper {
        fn name(&self) -> &str {
            "upper"
        }

        fn from_sequence_of_strings(
            &self,
            values: &[Option<String>],
        ) -> Option<std::result::Result<Column, String>> {
            Some(Ok(Column::Str(
                values
                    .iter()
                    .map(|v| v.as_ref().map(|s| s.to_uppercase()))
                    .collect(),
            )))
        }
    }

    #[test]
    fn test_extension_types() {
        let column = Column::Object(vec![Value::from("a")]);

        let err = cast_types(
            column.clone(),
            &Dtype::Extension(std::sync::Arc::new(Opaque)),
            "e",
        )
        .unwrap_err();
        assert!(err.to_string().contains("_from_sequence_of_strings"));

        assert_eq!(
            cast_types(column, &Dtype::Extension(std::sync::Arc::new(Upper)), "e").unwrap(),
            Column::Str(vec![Some("A".to_string())])
        );
    }
}
