use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;

/// A single parsed cell, as found in object columns.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Na,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Datetime(NaiveDateTime),
}

impl Value {
    #[inline]
    pub fn is_na(&self) -> bool {
        match self {
            Self::Na => true,
            Self::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Na => f.write_str("NaN"),
            Self::Bool(b) => f.write_str(if *b { "True" } else { "False" }),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{:?}", x),
            Self::Str(s) => f.write_str(s),
            Self::Datetime(d) => write!(f, "{}", d),
        }
    }
}

/// Hook used to build extension columns from raw strings.
pub trait ExtensionType: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Build a column from the raw (non-inferred) strings of a column. `None`
    /// entries are missing values.
    ///
    /// Returning `None` means the type does not know how to do so.
    fn from_sequence_of_strings(
        &self,
        _values: &[Option<String>],
    ) -> Option<Result<Column, String>> {
        None
    }
}

/// Target type of a column.
#[derive(Debug, Clone)]
pub enum Dtype {
    Int64,
    Float64,
    Bool,
    Str,
    Object,
    Datetime,
    Categorical(Option<Vec<String>>),
    Extension(Arc<dyn ExtensionType>),
}

impl Dtype {
    /// Whether inference must be skipped for columns of this type.
    pub(crate) fn is_string_like(&self) -> bool {
        matches!(
            self,
            Self::Str | Self::Object | Self::Categorical(_) | Self::Extension(_)
        )
    }
}

impl PartialEq for Dtype {
    fn eq(&self, other: &Self) -> bool {
        use Dtype::*;

        match (self, other) {
            (Int64, Int64)
            | (Float64, Float64)
            | (Bool, Bool)
            | (Str, Str)
            | (Object, Object)
            | (Datetime, Datetime) => true,
            (Categorical(a), Categorical(b)) => a == b,
            (Extension(a), Extension(b)) => a.name() == b.name(),
            _ => false,
        }
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Int64 => f.write_str("int64"),
            Self::Float64 => f.write_str("float64"),
            Self::Bool => f.write_str("bool"),
            Self::Str => f.write_str("str"),
            Self::Object => f.write_str("object"),
            Self::Datetime => f.write_str("datetime64[ns]"),
            Self::Categorical(_) => f.write_str("category"),
            Self::Extension(ext) => f.write_str(ext.name()),
        }
    }
}

/// A typed, homogeneous column.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Int64(Vec<i64>),
    /// Missing values are NaN.
    Float64(Vec<f64>),
    Bool(Vec<bool>),
    Str(Vec<Option<String>>),
    Object(Vec<Value>),
    Datetime(Vec<Option<NaiveDateTime>>),
    /// Code `-1` denotes a missing value.
    Categorical {
        categories: Vec<String>,
        codes: Vec<i32>,
    },
}

impl Column {
    /// An empty column of the given type.
    pub fn empty(dtype: &Dtype) -> Self {
        match dtype {
            Dtype::Int64 => Self::Int64(Vec::new()),
            Dtype::Float64 => Self::Float64(Vec::new()),
            Dtype::Bool => Self::Bool(Vec::new()),
            Dtype::Str => Self::Str(Vec::new()),
            Dtype::Datetime => Self::Datetime(Vec::new()),
            Dtype::Categorical(categories) => Self::Categorical {
                categories: categories.clone().unwrap_or_default(),
                codes: Vec::new(),
            },
            Dtype::Object | Dtype::Extension(_) => Self::Object(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Int64(v) => v.len(),
            Self::Float64(v) => v.len(),
            Self::Bool(v) => v.len(),
            Self::Str(v) => v.len(),
            Self::Object(v) => v.len(),
            Self::Datetime(v) => v.len(),
            Self::Categorical { codes, .. } => codes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> Dtype {
        match self {
            Self::Int64(_) => Dtype::Int64,
            Self::Float64(_) => Dtype::Float64,
            Self::Bool(_) => Dtype::Bool,
            Self::Str(_) => Dtype::Str,
            Self::Object(_) => Dtype::Object,
            Self::Datetime(_) => Dtype::Datetime,
            Self::Categorical { categories, .. } => {
                Dtype::Categorical(Some(categories.clone()))
            }
        }
    }

    /// Return the nth cell as a [`Value`].
    pub fn get(&self, index: usize) -> Option<Value> {
        Some(match self {
            Self::Int64(v) => Value::Int(*v.get(index)?),
            Self::Float64(v) => {
                let x = *v.get(index)?;

                if x.is_nan() {
                    Value::Na
                } else {
                    Value::Float(x)
                }
            }
            Self::Bool(v) => Value::Bool(*v.get(index)?),
            Self::Str(v) => match v.get(index)? {
                Some(s) => Value::Str(s.clone()),
                None => Value::Na,
            },
            Self::Object(v) => v.get(index)?.clone(),
            Self::Datetime(v) => match v.get(index)? {
                Some(d) => Value::Datetime(*d),
                None => Value::Na,
            },
            Self::Categorical { categories, codes } => match *codes.get(index)? {
                -1 => Value::Na,
                code => Value::Str(categories[code as usize].clone()),
            },
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Value> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }

    pub fn na_count(&self) -> usize {
        self.iter().filter(|v| v.is_na()).count()
    }
}

/// A column label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Label {
    Name(String),
    /// Default labels when there is no header row.
    Position(usize),
    /// One entry per header row, for multi-row headers.
    Tuple(Vec<String>),
}

impl Label {
    pub fn name<S: Into<String>>(name: S) -> Self {
        Self::Name(name.into())
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name),
            _ => None,
        }
    }
}

impl From<&str> for Label {
    fn from(value: &str) -> Self {
        Self::Name(value.to_string())
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Position(i) => write!(f, "{}", i),
            Self::Tuple(parts) => {
                write!(f, "(")?;

                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "'{}'", part)?;
                }

                write!(f, ")")
            }
        }
    }
}

/// Row labels of a [`ParseResult`].
#[derive(Debug, Clone, PartialEq)]
pub enum Index {
    Range {
        start: usize,
        stop: usize,
    },
    Single {
        name: Option<Label>,
        values: Column,
    },
    Multi {
        names: Vec<Option<Label>>,
        levels: Vec<Column>,
    },
}

impl Index {
    pub(crate) fn from_arrays(mut names: Vec<Option<Label>>, mut arrays: Vec<Column>) -> Self {
        if arrays.len() == 1 {
            Self::Single {
                name: names.pop().flatten(),
                values: arrays.remove(0),
            }
        } else {
            Self::Multi {
                names,
                levels: arrays,
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Range { start, stop } => stop - start,
            Self::Single { values, .. } => values.len(),
            Self::Multi { levels, .. } => levels.first().map(Column::len).unwrap_or(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn names(&self) -> Vec<Option<Label>> {
        match self {
            Self::Range { .. } => vec![None],
            Self::Single { name, .. } => vec![name.clone()],
            Self::Multi { names, .. } => names.clone(),
        }
    }
}

/// The unit handed to a DataFrame constructor: `(index, columns, data)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseResult {
    pub index: Index,
    pub columns: Vec<Label>,
    /// Parallel to `columns`.
    pub data: Vec<Column>,
    /// Names of the column levels, for multi-row headers.
    pub column_level_names: Vec<Option<String>>,
}

impl ParseResult {
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn column(&self, label: &Label) -> Option<&Column> {
        self.columns
            .iter()
            .position(|l| l == label)
            .map(|i| &self.data[i])
    }

    /// Shorthand for [`Self::column`] with a plain name.
    pub fn get(&self, name: &str) -> Option<&Column> {
        self.column(&Label::name(name))
    }
}

/// A single column together with its index, what a squeezed read returns.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub index: Index,
    pub name: Label,
    pub values: Column,
}

/// What [`TextFileReader::read`](crate::TextFileReader::read) returns.
#[derive(Debug, Clone, PartialEq)]
pub enum Table {
    Frame(ParseResult),
    Series(Series),
}

impl Table {
    pub fn into_frame(self) -> Option<ParseResult> {
        match self {
            Self::Frame(frame) => Some(frame),
            Self::Series(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Frame(frame) => frame.len(),
            Self::Series(series) => series.index.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
