use super::ParseError;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Parse FASTA text into `(name, sequence)` records. Sequence lines are
/// concatenated; surrounding whitespace is dropped.
pub fn parse_fasta(text: &str) -> Result<Vec<(String, String)>, ParseError> {
    let mut records: Vec<(String, String)> = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        if let Some(name) = line.strip_prefix('>') {
            records.push((name.trim().to_string(), String::new()));
        } else {
            match records.last_mut() {
                Some((_, seq)) => seq.push_str(line.trim()),
                None => {
                    return Err(ParseError::MalformedRecord {
                        line: idx + 1,
                        message: "sequence data before first header".to_string(),
                    });
                }
            }
        }
    }
    if records.is_empty() {
        return Err(ParseError::Empty);
    }
    Ok(records)
}

/// Write records as FASTA, one `>name` header per sequence.
pub fn write_fasta(path: &Path, records: &[(String, String)]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    for (name, seq) in records {
        writeln!(file, ">{}", name)?;
        writeln!(file, "{}", seq)?;
    }
    Ok(())
}
