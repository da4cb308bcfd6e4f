//! Plain-text dataset summaries.

use crate::inverse::InversePair;
use crate::{KnowledgeGraph, Result};
use std::io::Write;

/// `relation<TAB>count`, most frequent first.
pub fn write_relations<W: Write>(graph: &KnowledgeGraph, mut writer: W) -> Result<()> {
    for (relation, count) in graph.relation_frequencies() {
        writeln!(writer, "{relation}\t{count}")?;
    }
    Ok(())
}

/// `entity<TAB>degree<TAB>out<TAB>in`, highest degree first.
pub fn write_entities<W: Write>(graph: &KnowledgeGraph, mut writer: W) -> Result<()> {
    for (entity, degree, out_degree, in_degree) in graph.entity_degrees() {
        writeln!(writer, "{entity}\t{degree}\t{out_degree}\t{in_degree}")?;
    }
    Ok(())
}

/// `first<TAB>second<TAB>score` for every detected inverse pair.
pub fn write_inverses<W: Write>(pairs: &[InversePair], mut writer: W) -> Result<()> {
    for p in pairs {
        writeln!(writer, "{}\t{}\t{:.4}", p.first, p.second, p.score)?;
    }
    Ok(())
}
