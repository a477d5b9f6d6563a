use std::collections::HashSet;
use std::sync::OnceLock;

use crate::options::{col_matches, ColumnRef, NaValues};

/// Tokens recognized as missing by default.
pub const DEFAULT_NA_VALUES: [&str; 18] = [
    "-1.#IND", "1.#QNAN", "1.#IND", "-1.#QNAN", "#N/A N/A", "#N/A", "N/A", "n/a", "NA", "<NA>",
    "#NA", "NULL", "null", "NaN", "-NaN", "nan", "-nan", "",
];

fn default_na_set() -> &'static HashSet<String> {
    static SET: OnceLock<HashSet<String>> = OnceLock::new();

    SET.get_or_init(|| DEFAULT_NA_VALUES.iter().map(|s| s.to_string()).collect())
}

/// The resolved missing value markers of one column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NaSpec {
    pub strings: HashSet<String>,
    /// Numeric markers, matched against any token parsing to the same float.
    pub floats: Vec<f64>,
}

impl NaSpec {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn defaults() -> Self {
        Self {
            strings: default_na_set().clone(),
            floats: Vec::new(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty() && self.floats.is_empty()
    }

    /// Whether the given raw token denotes a missing value.
    #[inline]
    pub fn matches(&self, token: &str) -> bool {
        if self.strings.contains(token) {
            return true;
        }

        if self.floats.is_empty() {
            return false;
        }

        match token.trim().parse::<f64>() {
            Ok(x) => self.matches_float(x),
            Err(_) => false,
        }
    }

    #[inline]
    pub fn matches_float(&self, x: f64) -> bool {
        self.floats.iter().any(|f| *f == x)
    }
}

/// Expand user markers with their usual numeric spellings, e.g. `999` also
/// yields `999.0`, and `-1.0` yields `-1`.
pub fn stringify_na_values<S: AsRef<str>>(values: &[S]) -> HashSet<String> {
    let mut result = HashSet::new();

    for value in values {
        let value = value.as_ref();
        result.insert(value.to_string());

        if let Ok(x) = value.trim().parse::<f64>() {
            if x.is_finite() && x == x.trunc() && x.abs() < 1e18 {
                let i = x as i64;
                result.insert(format!("{}.0", i));
                result.insert(i.to_string());
            }

            result.insert(format!("{:?}", x));
        }
    }

    result
}

/// The numeric markers among the given ones. NaN is never kept.
pub fn floatify_na_values<'a, I: IntoIterator<Item = &'a String>>(values: I) -> Vec<f64> {
    let mut result: Vec<f64> = Vec::new();

    for value in values {
        if let Ok(x) = value.trim().parse::<f64>() {
            if !x.is_nan() && !result.contains(&x) {
                result.push(x);
            }
        }
    }

    result
}

/// Missing value markers for a whole parse, before per-column resolution.
#[derive(Debug, Clone)]
pub(crate) enum NaTable {
    Global(NaSpec),
    PerColumn {
        entries: Vec<(ColumnRef, NaSpec)>,
        keep_default_na: bool,
    },
}

impl NaTable {
    pub(crate) fn new(na_values: Option<&NaValues>, keep_default_na: bool) -> Self {
        match na_values {
            None => {
                if keep_default_na {
                    Self::Global(NaSpec::defaults())
                } else {
                    Self::Global(NaSpec::none())
                }
            }
            Some(NaValues::List(values)) => {
                let mut strings = stringify_na_values(values);

                if keep_default_na {
                    strings.extend(default_na_set().iter().cloned());
                }

                let floats = floatify_na_values(&strings);

                Self::Global(NaSpec { strings, floats })
            }
            Some(NaValues::PerColumn(entries)) => {
                let entries = entries
                    .iter()
                    .map(|(col, values)| {
                        let mut strings: HashSet<String> = values.iter().cloned().collect();

                        if keep_default_na {
                            strings.extend(default_na_set().iter().cloned());
                        }

                        let floats = floatify_na_values(&strings);

                        (col.clone(), NaSpec { strings, floats })
                    })
                    .collect();

                Self::PerColumn {
                    entries,
                    keep_default_na,
                }
            }
        }
    }

    /// Resolve the markers of the column at `position` named `name`.
    pub(crate) fn for_column(&self, position: Option<usize>, name: &str) -> NaSpec {
        match self {
            Self::Global(spec) => spec.clone(),
            Self::PerColumn {
                entries,
                keep_default_na,
            } => {
                let found = entries.iter().find(|(col, _)| match (col, position) {
                    (ColumnRef::Position(_), Some(position)) => col_matches(col, position, name),
                    (ColumnRef::Name(n), _) => n == name,
                    _ => false,
                });

                match found {
                    Some((_, spec)) => spec.clone(),
                    None if *keep_default_na => NaSpec::defaults(),
                    None => NaSpec::none(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stringify_na_values() {
        let set = stringify_na_values(&["999", "-1.5", "missing"]);

        assert!(set.contains("999"));
        assert!(set.contains("999.0"));
        assert!(set.contains("-1.5"));
        assert!(set.contains("missing"));
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn test_floatify_na_values() {
        let values: Vec<String> = vec!["999".into(), "nan".into(), "x".into(), "999.0".into()];
        assert_eq!(floatify_na_values(&values), vec![999.0]);
    }

    #[test]
    fn test_na_spec_matches() {
        let table = NaTable::new(Some(&NaValues::List(vec!["-999".into()])), true);
        let spec = table.for_column(Some(0), "a");

        assert!(spec.matches("-999"));
        assert!(spec.matches("-999.00"));
        assert!(spec.matches(""));
        assert!(spec.matches("NA"));
        assert!(!spec.matches("999"));
    }

    #[test]
    fn test_per_column_resolution() {
        let na_values = NaValues::PerColumn(vec![
            (ColumnRef::from("a"), vec!["x".into()]),
            (ColumnRef::Position(2), vec!["y".into()]),
        ]);

        let table = NaTable::new(Some(&na_values), false);

        let a = table.for_column(Some(0), "a");
        assert!(a.matches("x"));
        assert!(!a.matches(""));

        assert!(table.for_column(Some(2), "c").matches("y"));

        let b = table.for_column(Some(1), "b");
        assert!(b.is_empty());

        let table = NaTable::new(Some(&na_values), true);
        assert!(table.for_column(Some(1), "b").matches("NaN"));
    }

    #[test]
    fn test_no_defaults() {
        assert!(NaTable::new(None, false).for_column(None, "a").is_empty());
        assert!(NaTable::new(None, true).for_column(None, "a").matches("null"));
    }
}
