use std::io::BufRead;

use thiserror::Error;

/// Failure reading a board configuration source (§6). Distinct from
/// [`super::error::GameError`]: this is I/O-and-format validation, raised
/// at construction time, outside the concurrency core.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing a \"ROWSxCOLUMNS\" header line")]
    MissingHeader,

    #[error("malformed header line {0:?}, expected \"ROWSxCOLUMNS\" with positive integers")]
    MalformedHeader(String),

    #[error("expected {expected} card values but the source had {found}")]
    WrongCardCount { expected: usize, found: usize },

    #[error("failed to read configuration source: {0}")]
    Io(String),
}

/// The result of successfully parsing a board configuration source: board
/// dimensions plus the initial value of every card, in row-major order.
#[derive(Debug, PartialEq)]
pub struct ParsedGrid {
    pub rows: usize,
    pub columns: usize,
    pub values: Vec<String>,
}

/// Parses the textual board configuration format described in §6: a
/// `"{rows}x{columns}"` header followed by exactly `rows * columns`
/// non-blank value lines, with blank lines skipped everywhere.
pub fn parse_grid<R: BufRead>(source: R) -> Result<ParsedGrid, ConfigError> {
    let mut lines = source.lines().map(|line| line.map_err(|e| ConfigError::Io(e.to_string())));

    let header = loop {
        match lines.next() {
            None => return Err(ConfigError::MissingHeader),
            Some(line) => {
                let line = line?;
                let trimmed = line.trim();
                if !trimmed.is_empty() {
                    break trimmed.to_string();
                }
            }
        }
    };

    let (rows, columns) = parse_header(&header)?;
    let expected = rows * columns;

    let mut values = Vec::with_capacity(expected);
    for line in lines {
        let line = line?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            values.push(trimmed.to_string());
        }
    }

    if values.len() != expected {
        return Err(ConfigError::WrongCardCount { expected, found: values.len() });
    }

    Ok(ParsedGrid { rows, columns, values })
}

fn parse_header(header: &str) -> Result<(usize, usize), ConfigError> {
    let (rows_str, columns_str) =
        header.split_once('x').ok_or_else(|| ConfigError::MalformedHeader(header.to_string()))?;

    let rows: usize = rows_str.trim().parse().map_err(|_| ConfigError::MalformedHeader(header.to_string()))?;
    let columns: usize = columns_str.trim().parse().map_err(|_| ConfigError::MalformedHeader(header.to_string()))?;

    if rows == 0 || columns == 0 {
        return Err(ConfigError::MalformedHeader(header.to_string()));
    }

    Ok((rows, columns))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_canonical_example() {
        let source = "2x2\nA\nB\nA\nB\n";
        let parsed = parse_grid(source.as_bytes()).unwrap();
        assert_eq!(parsed.rows, 2);
        assert_eq!(parsed.columns, 2);
        assert_eq!(parsed.values, vec!["A", "B", "A", "B"]);
    }

    #[test]
    fn skips_blank_lines_everywhere() {
        let source = "\n\n2x2\n\nA\nB\n\nA\nB\n\n";
        let parsed = parse_grid(source.as_bytes()).unwrap();
        assert_eq!(parsed.values, vec!["A", "B", "A", "B"]);
    }

    #[test]
    fn rejects_a_missing_header() {
        assert_eq!(parse_grid("\n\n".as_bytes()), Err(ConfigError::MissingHeader));
    }

    #[test]
    fn rejects_a_malformed_header() {
        let err = parse_grid("2,2\nA\n".as_bytes()).unwrap_err();
        assert!(matches!(err, ConfigError::MalformedHeader(_)));
    }

    #[test]
    fn rejects_the_wrong_card_count() {
        let err = parse_grid("2x2\nA\nB\nA\n".as_bytes()).unwrap_err();
        assert_eq!(err, ConfigError::WrongCardCount { expected: 4, found: 3 });
    }
}
