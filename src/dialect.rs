use crate::error::{Error, ErrorKind, Result};
use crate::options::{ParseOptions, Quoting, Separator};
use crate::warning::ParserWarning;

/// Delimiters favored by the sniffer, in order, when several are plausible.
const PREFERRED_DELIMITERS: [char; 5] = [',', '\t', ';', ' ', ':'];

/// Delimiter, quote & escape conventions of some delimited text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialect {
    pub delimiter: char,
    pub quotechar: Option<char>,
    pub escapechar: Option<char>,
    pub doublequote: bool,
    pub skipinitialspace: bool,
    pub quoting: Quoting,
}

impl Default for Dialect {
    fn default() -> Self {
        Self::excel()
    }
}

impl Dialect {
    pub fn excel() -> Self {
        Self {
            delimiter: ',',
            quotechar: Some('"'),
            escapechar: None,
            doublequote: true,
            skipinitialspace: false,
            quoting: Quoting::Minimal,
        }
    }

    pub fn excel_tab() -> Self {
        Self {
            delimiter: '\t',
            ..Self::excel()
        }
    }

    pub fn unix() -> Self {
        Self {
            quoting: Quoting::All,
            ..Self::excel()
        }
    }
}

/// A possibly incomplete dialect as given by a user.
///
/// Every attribute must be present for the spec to be merged into the parsing
/// options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DialectSpec {
    pub name: Option<String>,
    pub delimiter: Option<char>,
    pub quotechar: Option<Option<char>>,
    pub escapechar: Option<Option<char>>,
    pub doublequote: Option<bool>,
    pub skipinitialspace: Option<bool>,
    pub quoting: Option<Quoting>,
}

impl DialectSpec {
    /// One of the registered dialects: `excel`, `excel-tab` or `unix`.
    pub fn named(name: &str) -> Result<Self> {
        let dialect = match name {
            "excel" => Dialect::excel(),
            "excel-tab" => Dialect::excel_tab(),
            "unix" => Dialect::unix(),
            _ => {
                return Err(Error::new(ErrorKind::InvalidDialect(format!(
                    "Invalid dialect {} provided",
                    name
                ))))
            }
        };

        let mut spec = Self::from(dialect);
        spec.name = Some(name.to_string());

        Ok(spec)
    }

    pub fn into_dialect(self) -> Result<Dialect> {
        let name = self.name.as_deref().unwrap_or("<custom>").to_string();
        let invalid =
            || Error::new(ErrorKind::InvalidDialect(format!("Invalid dialect {} provided", name)));

        Ok(Dialect {
            delimiter: self.delimiter.ok_or_else(invalid)?,
            quotechar: self.quotechar.ok_or_else(invalid)?,
            escapechar: self.escapechar.ok_or_else(invalid)?,
            doublequote: self.doublequote.ok_or_else(invalid)?,
            skipinitialspace: self.skipinitialspace.ok_or_else(invalid)?,
            quoting: self.quoting.ok_or_else(invalid)?,
        })
    }
}

impl From<Dialect> for DialectSpec {
    fn from(dialect: Dialect) -> Self {
        Self {
            name: None,
            delimiter: Some(dialect.delimiter),
            quotechar: Some(dialect.quotechar),
            escapechar: Some(dialect.escapechar),
            doublequote: Some(dialect.doublequote),
            skipinitialspace: Some(dialect.skipinitialspace),
            quoting: Some(dialect.quoting),
        }
    }
}

fn show(value: &Option<char>) -> String {
    match value {
        Some(c) => c.to_string(),
        None => "None".to_string(),
    }
}

/// Merge the dialect of `options`, if any, into its explicit options.
///
/// Dialect values always win. A conflict is reported when the provided value
/// differs both from the parser default and from the dialect, except for the
/// delimiter when neither `sep` nor `delimiter` were given.
pub(crate) fn merge_dialect(
    options: &mut ParseOptions,
    warnings: &mut Vec<ParserWarning>,
) -> Result<()> {
    let spec = match options.dialect.take() {
        None => return Ok(()),
        Some(spec) => spec,
    };

    let sep_override = options.delimiter.is_none() && options.sep == Separator::Default;
    let dialect = spec.into_dialect()?;
    let defaults = ParseOptions::default();

    let mut conflicts: Vec<ParserWarning> = Vec::new();
    let mut conflict = |param: &'static str, provided: String, dialect: String| {
        conflicts.push(ParserWarning::DialectConflict {
            param,
            provided,
            dialect,
        })
    };

    // NOTE: the parser default of the delimiter is "nothing", so the aliased
    // comma always counts as provided.
    if let Some(provided) = options.resolved_delimiter() {
        if provided != dialect.delimiter.to_string() && !sep_override {
            conflict("delimiter", provided, dialect.delimiter.to_string());
        }
    }

    if options.doublequote != defaults.doublequote && options.doublequote != dialect.doublequote {
        conflict(
            "doublequote",
            options.doublequote.to_string(),
            dialect.doublequote.to_string(),
        );
    }

    if options.escapechar != defaults.escapechar && options.escapechar != dialect.escapechar {
        conflict(
            "escapechar",
            show(&options.escapechar),
            show(&dialect.escapechar),
        );
    }

    if options.skipinitialspace != defaults.skipinitialspace
        && options.skipinitialspace != dialect.skipinitialspace
    {
        conflict(
            "skipinitialspace",
            options.skipinitialspace.to_string(),
            dialect.skipinitialspace.to_string(),
        );
    }

    if options.quotechar != defaults.quotechar && options.quotechar != dialect.quotechar {
        conflict("quotechar", show(&options.quotechar), show(&dialect.quotechar));
    }

    if options.quoting != defaults.quoting && options.quoting != dialect.quoting {
        conflict(
            "quoting",
            options.quoting.code().to_string(),
            dialect.quoting.code().to_string(),
        );
    }

    for warning in conflicts {
        warning.emit(warnings);
    }

    options.delimiter = Some(dialect.delimiter.to_string());
    options.sep = Separator::Value(dialect.delimiter.to_string());
    options.doublequote = dialect.doublequote;
    options.escapechar = dialect.escapechar;
    options.skipinitialspace = dialect.skipinitialspace;
    options.quotechar = dialect.quotechar;
    options.quoting = dialect.quoting;

    Ok(())
}

fn count_outside_quotes(line: &str, quote: char) -> Vec<(char, usize)> {
    let mut counts: Vec<(char, usize)> = Vec::new();
    let mut quoted = false;

    for c in line.chars() {
        if c == quote {
            quoted = !quoted;
            continue;
        }

        if quoted || c.is_alphanumeric() || c == '\r' || c == '\n' || !c.is_ascii() {
            continue;
        }

        match counts.iter_mut().find(|(d, _)| *d == c) {
            Some((_, n)) => *n += 1,
            None => counts.push((c, 1)),
        }
    }

    counts
}

/// Guess the dialect of some sample of delimited text.
///
/// A delimiter candidate must appear, outside quotes, the same non-zero number
/// of times on every line of the sample. Among consistent candidates, the
/// usual delimiters win in order, then the most frequent character.
pub fn sniff(sample: &str) -> Result<Dialect> {
    let lines: Vec<&str> = sample
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty())
        .collect();

    let could_not = || Error::parser("Could not determine delimiter");

    if lines.is_empty() {
        return Err(could_not());
    }

    let quotechar = ['"', '\'']
        .into_iter()
        .find(|q| {
            let n = sample.matches(*q).count();
            n >= 2 && n % 2 == 0
        })
        .unwrap_or('"');

    let per_line: Vec<Vec<(char, usize)>> = lines
        .iter()
        .map(|line| count_outside_quotes(line, quotechar))
        .collect();

    let mut candidates: Vec<(char, usize)> = per_line[0]
        .iter()
        .copied()
        .filter(|(c, n)| {
            per_line[1..]
                .iter()
                .all(|counts| counts.iter().any(|(d, m)| d == c && m == n))
        })
        .collect();

    if candidates.is_empty() {
        return Err(could_not());
    }

    let delimiter = match PREFERRED_DELIMITERS
        .iter()
        .find(|d| candidates.iter().any(|(c, _)| c == *d))
    {
        Some(d) => *d,
        None => {
            candidates.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
            candidates[0].0
        }
    };

    let skipinitialspace = delimiter != ' '
        && lines.iter().all(|line| {
            line.match_indices(delimiter)
                .all(|(i, _)| line[i + delimiter.len_utf8()..].starts_with(' '))
        });

    let doublequote = sample.contains(&format!("{}{}", quotechar, quotechar));

    tracing::debug!(
        delimiter = %delimiter.escape_debug(),
        quotechar = %quotechar,
        "sniffed dialect"
    );

    Ok(Dialect {
        delimiter,
        quotechar: Some(quotechar),
        escapechar: None,
        doublequote,
        skipinitialspace,
        quoting: Quoting::Minimal,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff() {
        assert_eq!(sniff("a,b,c\n").unwrap().delimiter, ',');
        assert_eq!(sniff("a;b;c\n1;2;3").unwrap().delimiter, ';');
        assert_eq!(sniff("a|b|c").unwrap().delimiter, '|');
        assert_eq!(sniff("a\tb\tc").unwrap().delimiter, '\t');
        assert_eq!(sniff("\"a,b\"|c|d").unwrap().delimiter, '|');
        assert!(sniff("a, b, c").unwrap().skipinitialspace);
        assert!(sniff("abc").is_err());
    }

    #[test]
    fn test_named_dialects() {
        let spec = DialectSpec::named("excel-tab").unwrap();
        assert_eq!(spec.into_dialect().unwrap().delimiter, '\t');

        assert!(DialectSpec::named("whatever").is_err());
    }

    #[test]
    fn test_incomplete_dialect() {
        let spec = DialectSpec {
            delimiter: Some(';'),
            ..Default::default()
        };

        let err = spec.into_dialect().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidDialect(_)));
    }

    #[test]
    fn test_merge_dialect_conflicts() {
        let mut warnings = Vec::new();

        // Nothing passed: no warning even though the comma differs
        let mut options = ParseOptions {
            dialect: Some(Dialect::excel_tab().into()),
            ..Default::default()
        };
        merge_dialect(&mut options, &mut warnings).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(options.delimiter.as_deref(), Some("\t"));

        // Explicit sep conflicting with the dialect
        let mut options = ParseOptions {
            sep: Separator::Value(";".to_string()),
            dialect: Some(Dialect::excel_tab().into()),
            ..Default::default()
        };
        merge_dialect(&mut options, &mut warnings).unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(matches!(
            warnings[0],
            ParserWarning::DialectConflict {
                param: "delimiter",
                ..
            }
        ));
        assert_eq!(options.delimiter.as_deref(), Some("\t"));

        // Default values never warn
        warnings.clear();
        let mut options = ParseOptions {
            sep: Separator::Value("\t".to_string()),
            quotechar: Some('"'),
            dialect: Some(
                Dialect {
                    quotechar: Some('\''),
                    ..Dialect::excel_tab()
                }
                .into(),
            ),
            ..Default::default()
        };
        merge_dialect(&mut options, &mut warnings).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(options.quotechar, Some('\''));

        // Non-default value conflicting
        let mut options = ParseOptions {
            quotechar: Some('|'),
            dialect: Some(Dialect::excel().into()),
            ..Default::default()
        };
        merge_dialect(&mut options, &mut warnings).unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(options.quotechar, Some('"'));
    }
}
