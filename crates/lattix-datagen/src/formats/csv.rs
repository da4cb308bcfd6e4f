//! CSV format support.
//!
//! Headerless rows of `source,relation,target[,type]`. Quoting follows the
//! `csv` crate, so fields may contain commas.

use super::parse_error;
use crate::{Result, Triple};
use std::io::{Read, Write};

/// CSV format handler.
pub struct Csv;

impl Csv {
    pub fn read<R: Read>(reader: R) -> Result<Vec<Triple>> {
        let mut reader = ::csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .comment(Some(b'#'))
            .trim(::csv::Trim::All)
            .from_reader(reader);

        let mut triples = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|e| {
                let line = e.position().map_or(0, |p| p.line() as usize);
                parse_error(line, e.to_string())
            })?;
            let line = record.position().map_or(0, |p| p.line() as usize);

            if record.iter().all(str::is_empty) {
                continue;
            }
            let ty = match record.len() {
                3 => None,
                4 => Some(record[3].to_string()),
                n => {
                    return Err(parse_error(
                        line,
                        format!("expected 3 or 4 columns, got {n}"),
                    ))
                }
            };
            let triple = Triple::try_new(&record[1], &record[0], &record[2], ty)
                .map_err(|e| parse_error(line, e.to_string()))?;
            triples.push(triple);
        }
        Ok(triples)
    }

    pub fn write<'a, W: Write>(
        triples: impl IntoIterator<Item = &'a Triple>,
        writer: W,
    ) -> Result<()> {
        let mut writer = ::csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_writer(writer);
        for t in triples {
            let mut row = vec![t.source.as_str(), t.relation.as_str(), t.target.as_str()];
            if let Some(ty) = &t.type_tag {
                row.push(ty);
            }
            writer.write_record(&row)?;
        }
        writer.flush()?;
        Ok(())
    }
}
