use super::{ParseError, ParsedAlignment};
use std::collections::HashMap;

/// Parse a Stockholm alignment block into query-aligned rows.
///
/// The first sequence in the file is taken as the query. Columns where the
/// query carries a gap are removed; non-gap characters a hit carries in those
/// columns are counted into the deletion value of the next kept column.
pub fn parse_stockholm(text: &str) -> Result<ParsedAlignment, ParseError> {
    let mut order: Vec<String> = Vec::new();
    let mut aligned: HashMap<String, String> = HashMap::new();

    for (idx, line) in text.lines().enumerate() {
        let line = line.trim_end();
        if line.is_empty() || line.starts_with('#') || line == "//" {
            continue;
        }
        let mut parts = line.split_whitespace();
        let (name, seq) = match (parts.next(), parts.next()) {
            (Some(n), Some(s)) => (n, s),
            _ => {
                return Err(ParseError::MalformedRecord {
                    line: idx + 1,
                    message: "expected '<name> <aligned-sequence>'".to_string(),
                });
            }
        };
        match aligned.get_mut(name) {
            Some(existing) => existing.push_str(seq),
            None => {
                order.push(name.to_string());
                aligned.insert(name.to_string(), seq.to_string());
            }
        }
    }

    if order.is_empty() {
        return Err(ParseError::Empty);
    }
    let query = aligned[&order[0]].clone();
    let width = query.len();

    let mut rows = Vec::with_capacity(order.len());
    let mut deletions = Vec::with_capacity(order.len());
    for name in &order {
        let full = &aligned[name];
        if full.len() != width {
            return Err(ParseError::RaggedAlignment {
                expected: width,
                found: full.len(),
            });
        }
        let mut row = String::new();
        let mut dels = Vec::new();
        let mut deleted = 0;
        for (q, c) in query.chars().zip(full.chars()) {
            if q == '-' || q == '.' {
                if c != '-' && c != '.' {
                    deleted += 1;
                }
            } else {
                row.push(if c == '.' { '-' } else { c });
                dels.push(deleted);
                deleted = 0;
            }
        }
        rows.push(row);
        deletions.push(dels);
    }

    Ok(ParsedAlignment {
        rows,
        deletions,
        names: order,
    })
}

/// Parse a jackhmmer `--tblout` significance table into a map from target
/// name to full-sequence e-value.
pub fn parse_tblout(text: &str) -> Result<HashMap<String, f64>, ParseError> {
    let mut e_values = HashMap::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 5 {
            return Err(ParseError::MalformedRecord {
                line: idx + 1,
                message: "tblout row has fewer than 5 fields".to_string(),
            });
        }
        let e_value = fields[4].parse::<f64>().map_err(|_| ParseError::MalformedRecord {
            line: idx + 1,
            message: format!("unparseable e-value '{}'", fields[4]),
        })?;
        e_values.insert(fields[0].to_string(), e_value);
    }
    Ok(e_values)
}
