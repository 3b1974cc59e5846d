use super::{ParseError, ParsedAlignment};

/// Parse an A3M blob into query-aligned rows.
///
/// In A3M, lowercase characters are insertions relative to the query and do
/// not occupy a query column; they are folded into the deletion count of the
/// next match column. Uppercase characters and `-` occupy one column each.
pub fn parse_a3m(text: &str) -> Result<ParsedAlignment, ParseError> {
    let mut rows = Vec::new();
    let mut deletions = Vec::new();
    let mut names = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let line = line.trim_end();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(name) = line.strip_prefix('>') {
            names.push(name.trim().to_string());
            rows.push(String::new());
            deletions.push(Vec::new());
            continue;
        }
        let (row, dels) = match (rows.last_mut(), deletions.last_mut()) {
            (Some(r), Some(d)) => (r, d),
            _ => {
                return Err(ParseError::MalformedRecord {
                    line: idx + 1,
                    message: "sequence data before first header".to_string(),
                });
            }
        };
        let mut deleted = 0;
        for ch in line.chars() {
            if ch.is_ascii_lowercase() {
                deleted += 1;
            } else {
                row.push(ch);
                dels.push(deleted);
                deleted = 0;
            }
        }
    }

    if rows.is_empty() {
        return Err(ParseError::Empty);
    }
    let expected = rows[0].len();
    for row in &rows {
        if row.len() != expected {
            return Err(ParseError::RaggedAlignment {
                expected,
                found: row.len(),
            });
        }
    }
    Ok(ParsedAlignment {
        rows,
        deletions,
        names,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercase_insertions_become_deletion_counts() {
        let text = ">query\nMKVLTT\n>hit\nMKvvVLT-\n";
        let parsed = parse_a3m(text).unwrap();
        assert_eq!(parsed.rows[0], "MKVLTT");
        assert_eq!(parsed.rows[1], "MKVLT-");
        assert_eq!(parsed.deletions[1], vec![0, 0, 2, 0, 0, 0]);
        assert_eq!(parsed.names, vec!["query", "hit"]);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let text = ">a\nMKVL\n>b\nMK\n";
        assert!(matches!(
            parse_a3m(text),
            Err(ParseError::RaggedAlignment {
                expected: 4,
                found: 2
            })
        ));
    }

    #[test]
    fn query_deletion_row_is_all_zero() {
        let parsed = parse_a3m(">q\nMKVL\n").unwrap();
        assert_eq!(parsed.deletions[0], vec![0, 0, 0, 0]);
    }
}
