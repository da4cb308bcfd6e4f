//! Tab-separated triples.

use super::{is_skippable, parse_error};
use crate::{Result, Triple};
use std::io::{BufRead, BufReader, Read, Write};

/// TSV format handler.
///
/// Columns are `source`, `relation`, `target` and an optional fourth
/// `type` column holding the type classification of the target.
pub struct Tsv;

impl Tsv {
    pub fn read<R: Read>(reader: R) -> Result<Vec<Triple>> {
        let buf = BufReader::new(reader);
        let mut triples = Vec::new();

        for (i, line) in buf.lines().enumerate() {
            let line = line?;
            let lineno = i + 1;
            if is_skippable(&line) {
                continue;
            }
            let line = line.trim_end_matches(['\r', '\n']);
            let cols: Vec<&str> = line.split('\t').collect();
            let (s, r, t, ty) = match cols.as_slice() {
                [s, r, t] => (*s, *r, *t, None),
                [s, r, t, ty] => (*s, *r, *t, Some(ty.trim().to_string())),
                _ => {
                    return Err(parse_error(
                        lineno,
                        format!("expected 3 or 4 tab-separated columns, got {}", cols.len()),
                    ))
                }
            };
            let triple = Triple::try_new(r.trim(), s.trim(), t.trim(), ty)
                .map_err(|e| parse_error(lineno, e.to_string()))?;
            triples.push(triple);
        }
        Ok(triples)
    }

    pub fn write<'a, W: Write>(
        triples: impl IntoIterator<Item = &'a Triple>,
        mut writer: W,
    ) -> Result<()> {
        for t in triples {
            match &t.type_tag {
                Some(ty) => writeln!(writer, "{}\t{}\t{}\t{}", t.source, t.relation, t.target, ty)?,
                None => writeln!(writer, "{}\t{}\t{}", t.source, t.relation, t.target)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_read_with_comments_and_types() {
        let input = "# header\n\nalice\tknows\tbob\nalice\tage\t42\tliteral\n";
        let triples = Tsv::read(input.as_bytes()).unwrap();
        assert_eq!(triples.len(), 2);
        assert_eq!(triples[0], Triple::new("knows", "alice", "bob"));
        assert!(triples[1].is_data_property());
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let input = "a\tr\tb\nonly two\tcols\n";
        match Tsv::read(input.as_bytes()) {
            Err(Error::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_field_rejected() {
        let input = "a\t\tb\n";
        assert!(matches!(
            Tsv::read(input.as_bytes()),
            Err(Error::Parse { line: 1, .. })
        ));
    }
}
