//! Triple file formats.
//!
//! - TSV: `source<TAB>relation<TAB>target[<TAB>type]`
//! - CSV: the same columns, comma separated
//! - N-Triples: `<s> <p> <o> .`, literal objects become data properties
//!
//! Readers ignore blank lines and lines starting with `#`. Any other line
//! that does not parse fails the whole read with [`Error::Parse`]; nothing
//! is skipped silently. Writers produce the same format they read, so a
//! dataset comes out in the shape it went in.

mod csv;
mod gexf;
mod ntriples;
mod summary;
mod tsv;

pub use self::csv::Csv;
pub use gexf::Gexf;
pub use ntriples::NTriples;
pub use summary::{write_entities, write_inverses, write_relations};
pub use tsv::Tsv;

use crate::{Error, Result, Triple};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::str::FromStr;

/// Format of the input file, and of every triple file written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    #[default]
    Tsv,
    Csv,
    NTriples,
}

impl InputFormat {
    /// Parse triples from a reader.
    pub fn read<R: Read>(self, reader: R) -> Result<Vec<Triple>> {
        match self {
            Self::Tsv => Tsv::read(reader),
            Self::Csv => Csv::read(reader),
            Self::NTriples => NTriples::read(reader),
        }
    }

    /// Write triples in this format.
    pub fn write<'a, W: Write>(
        self,
        triples: impl IntoIterator<Item = &'a Triple>,
        writer: W,
    ) -> Result<()> {
        match self {
            Self::Tsv => Tsv::write(triples, writer),
            Self::Csv => Csv::write(triples, writer),
            Self::NTriples => NTriples::write(triples, writer),
        }
    }

    pub fn read_path(self, path: &Path) -> Result<Vec<Triple>> {
        let file = File::open(path)?;
        self.read(BufReader::new(file))
    }

    pub fn write_path<'a>(
        self,
        triples: impl IntoIterator<Item = &'a Triple>,
        path: &Path,
    ) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        self.write(triples, &mut out)?;
        out.flush()?;
        Ok(())
    }
}

impl FromStr for InputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tsv" | "tab" => Ok(Self::Tsv),
            "csv" => Ok(Self::Csv),
            "ntriples" | "nt" | "n-triples" => Ok(Self::NTriples),
            other => Err(Error::config(format!("unknown input format: {other}"))),
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Tsv => "tsv",
            Self::Csv => "csv",
            Self::NTriples => "ntriples",
        })
    }
}

/// Whether a raw line carries no triple.
pub(crate) fn is_skippable(line: &str) -> bool {
    let line = line.trim();
    line.is_empty() || line.starts_with('#')
}

pub(crate) fn parse_error(line: usize, message: impl Into<String>) -> Error {
    Error::Parse {
        line,
        message: message.into(),
    }
}
