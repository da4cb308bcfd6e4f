//! N-Triples format.
//!
//! Each line is `<subject> <predicate> <object> .`. Subjects may be blank
//! nodes (`_:b0`), objects may also be literals such as `"42"^^<xsd:int>`
//! or `"chat"@fr`.
//!
//! IRIs are stored without their angle brackets. Blank nodes keep their
//! `_:` prefix, and literals are stored in their N-Triples form and tagged
//! with [`DATA_PROPERTY_TAG`] so they can be told apart from object
//! properties.
//!
//! Reference: <https://www.w3.org/TR/n-triples/>

use super::{is_skippable, parse_error};
use crate::{EntityId, Error, Result, Triple, DATA_PROPERTY_TAG};
use rio_api::formatter::TriplesFormatter;
use rio_api::model::{BlankNode, NamedNode, Subject, Term};
use rio_api::parser::TriplesParser;
use rio_turtle::{NTriplesFormatter, NTriplesParser};
use std::io::{BufRead, BufReader, Read, Write};

type ParseResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// N-Triples format handler.
pub struct NTriples;

impl NTriples {
    /// Parse N-Triples using Rio, one line at a time so errors carry the
    /// line they came from.
    pub fn read<R: Read>(reader: R) -> Result<Vec<Triple>> {
        let buf = BufReader::new(reader);
        let mut triples = Vec::new();
        for (i, line) in buf.lines().enumerate() {
            let line = line?;
            if is_skippable(&line) {
                continue;
            }
            let before = triples.len();
            parse_line(&line, &mut triples).map_err(|msg| parse_error(i + 1, msg))?;
            if triples.len() == before {
                return Err(parse_error(i + 1, "no triple on line"));
            }
        }
        Ok(triples)
    }

    /// Write triples with Rio's N-Triples formatter.
    pub fn write<'a, W: Write>(
        triples: impl IntoIterator<Item = &'a Triple>,
        writer: W,
    ) -> Result<()> {
        let mut formatter = NTriplesFormatter::new(writer);
        for t in triples {
            let subject = match node(&t.source) {
                Term::NamedNode(n) => Subject::NamedNode(n),
                Term::BlankNode(b) => Subject::BlankNode(b),
                _ => return Err(Error::InvalidTriple(format!("{t}: subject must be a node"))),
            };
            let predicate = NamedNode {
                iri: t.relation.as_str(),
            };
            if t.is_data_property() {
                format_literal(&mut formatter, subject, predicate, t.target.as_str())?;
            } else {
                formatter.format(&rio_api::model::Triple {
                    subject,
                    predicate,
                    object: node(&t.target),
                })?;
            }
        }
        formatter.finish()?;
        Ok(())
    }
}

fn parse_line(line: &str, out: &mut Vec<Triple>) -> std::result::Result<(), String> {
    let mut parser = NTriplesParser::new(line.as_bytes());
    parser
        .parse_all(&mut |triple| -> ParseResult {
            let source = match triple.subject {
                Subject::NamedNode(n) => n.iri.to_string(),
                Subject::BlankNode(b) => format!("_:{}", b.id),
                Subject::Triple(_) => return Err("quoted triples are not supported".into()),
            };
            let (target, tag) = match triple.object {
                Term::NamedNode(n) => (n.iri.to_string(), None),
                Term::BlankNode(b) => (format!("_:{}", b.id), None),
                Term::Literal(l) => (l.to_string(), Some(DATA_PROPERTY_TAG.to_string())),
                Term::Triple(_) => return Err("quoted triples are not supported".into()),
            };
            out.push(Triple::try_new(triple.predicate.iri, source, target, tag)?);
            Ok(())
        })
        .map_err(|e| e.to_string())
}

fn node(entity: &EntityId) -> Term<'_> {
    match entity.as_str().strip_prefix("_:") {
        Some(id) => Term::BlankNode(BlankNode { id }),
        None => Term::NamedNode(NamedNode {
            iri: entity.as_str(),
        }),
    }
}

/// Format a triple whose object is a stored literal.
///
/// The literal is re-read with Rio so its escapes, language tag and
/// datatype go back out exactly as they came in.
fn format_literal<W: Write>(
    formatter: &mut NTriplesFormatter<W>,
    subject: Subject<'_>,
    predicate: NamedNode<'_>,
    literal: &str,
) -> Result<()> {
    let line = format!("<urn:x:s> <urn:x:p> {literal} .");
    let mut parser = NTriplesParser::new(line.as_bytes());
    parser
        .parse_all(&mut |parsed| -> ParseResult {
            formatter.format(&rio_api::model::Triple {
                subject,
                predicate,
                object: parsed.object,
            })?;
            Ok(())
        })
        .map_err(|e| Error::InvalidTriple(format!("not a literal: {literal}: {e}")))
}
